//! Chunk key prefix layout.
//!
//! An Overworld prefix is 8 bytes (`x`, `z` as little-endian i32). Other
//! dimensions append the dimension id as a fourth little-endian i32, giving
//! 12 bytes. The record tag follows the prefix.

use byteorder::{ByteOrder, LittleEndian};

use crate::world::{ChunkPos, Dimension};

/// Largest accepted chunk coordinate magnitude. Keys outside are treated as
/// coincidental matches of the key length and classified as unknown.
pub const SANE_CHUNK_LIMIT: i32 = 1 << 16;

pub const OVERWORLD_PREFIX_LEN: usize = 8;
pub const DIMENSION_PREFIX_LEN: usize = 12;

/// Build the key prefix shared by every record of a chunk.
pub fn chunk_prefix(pos: ChunkPos, dimension: Dimension) -> Vec<u8> {
    let len = match dimension {
        Dimension::Overworld => OVERWORLD_PREFIX_LEN,
        _ => DIMENSION_PREFIX_LEN,
    };
    let mut prefix = vec![0u8; len];
    LittleEndian::write_i32(&mut prefix[0..4], pos.x);
    LittleEndian::write_i32(&mut prefix[4..8], pos.z);
    if len == DIMENSION_PREFIX_LEN {
        LittleEndian::write_i32(&mut prefix[8..12], dimension.id());
    }
    prefix
}

/// Parse an 8 or 12 byte chunk prefix. Returns `None` for other lengths or
/// an unknown dimension id.
pub fn parse_chunk_prefix(prefix: &[u8]) -> Option<(ChunkPos, Dimension)> {
    let dimension = match prefix.len() {
        OVERWORLD_PREFIX_LEN => Dimension::Overworld,
        DIMENSION_PREFIX_LEN => Dimension::from_id(LittleEndian::read_i32(&prefix[8..12]))?,
        _ => return None,
    };
    let pos = ChunkPos::new(
        LittleEndian::read_i32(&prefix[0..4]),
        LittleEndian::read_i32(&prefix[4..8]),
    );
    Some((pos, dimension))
}

/// Like [`parse_chunk_prefix`] but rejects coordinates beyond [`SANE_CHUNK_LIMIT`].
pub fn parse_sane_chunk_prefix(prefix: &[u8]) -> Option<(ChunkPos, Dimension)> {
    let (pos, dimension) = parse_chunk_prefix(prefix)?;
    if is_sane(pos.x) && is_sane(pos.z) {
        Some((pos, dimension))
    } else {
        None
    }
}

#[inline]
fn is_sane(v: i32) -> bool {
    v.unsigned_abs() <= SANE_CHUNK_LIMIT as u32
}
