//! Builders for synthetic world records, shared by tests across the workspace.

use byteorder::{ByteOrder, LittleEndian};
use fastnbt::Value;

use crate::binary::chunk_prefix;
use crate::key::{ChunkTag, KeyVal};
use crate::nbt;
use crate::subchunk::{BlockState, SUB_CHUNK_VERSION, VOXELS, word_count};
use crate::world::{ChunkPos, Dimension};

/// Pack indices the way sub-chunk records store them.
pub fn pack_indices(bits: u8, indices: &[u16]) -> Vec<u8> {
    assert_eq!(indices.len(), VOXELS);
    let words = word_count(bits).expect("supported bits per block");
    if bits == 0 {
        return Vec::new();
    }
    let per_word = 32 / bits as usize;
    let mut out = vec![0u8; words * 4];
    for (w, group) in indices.chunks(per_word).enumerate() {
        let mut word = 0u32;
        for (i, &index) in group.iter().enumerate() {
            word |= (index as u32) << (i * bits as usize);
        }
        LittleEndian::write_u32(&mut out[w * 4..w * 4 + 4], word);
    }
    out
}

pub fn encode_block(state: &BlockState) -> Vec<u8> {
    let mut out = Vec::new();
    nbt::write_named(&mut out, "", &Value::Compound(state.to_compound())).expect("write to Vec");
    out
}

/// One encoded layer: palette type, words, palette count (when bits > 0)
/// and palette entries.
pub fn encode_layer(bits: u8, indices: &[u16], palette: &[BlockState]) -> Vec<u8> {
    let mut out = vec![bits << 1];
    out.extend_from_slice(&pack_indices(bits, indices));
    if bits > 0 {
        out.extend_from_slice(&(palette.len() as u32).to_le_bytes());
    }
    for state in palette {
        out.extend_from_slice(&encode_block(state));
    }
    out
}

pub fn encode_sub_chunk(index: i8, layers: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![SUB_CHUNK_VERSION, layers.len() as u8, index as u8];
    for layer in layers {
        out.extend_from_slice(layer);
    }
    out
}

pub fn chunk_key(pos: ChunkPos, dimension: Dimension, tag: ChunkTag) -> Vec<u8> {
    let mut key = chunk_prefix(pos, dimension);
    key.push(tag.byte());
    key
}

pub fn sub_chunk_key(pos: ChunkPos, dimension: Dimension, index: i8) -> Vec<u8> {
    let mut key = chunk_key(pos, dimension, ChunkTag::SubChunkPrefix);
    key.push(index as u8);
    key
}

pub fn sub_chunk_record(pos: ChunkPos, dimension: Dimension, index: i8, layers: &[Vec<u8>]) -> KeyVal {
    KeyVal::new(sub_chunk_key(pos, dimension, index), encode_sub_chunk(index, layers))
}

/// A sub-chunk filled with a single block.
pub fn uniform_sub_chunk(pos: ChunkPos, dimension: Dimension, index: i8, name: &str) -> KeyVal {
    let layer = encode_layer(0, &[0; VOXELS], &[BlockState::new(name)]);
    sub_chunk_record(pos, dimension, index, &[layer])
}

/// A sub-chunk that is air except for `name` at each of `blocks` (x, y, z).
pub fn sparse_sub_chunk(
    pos: ChunkPos,
    dimension: Dimension,
    index: i8,
    name: &str,
    blocks: &[(usize, usize, usize)],
) -> KeyVal {
    let mut indices = vec![0u16; VOXELS];
    for &(x, y, z) in blocks {
        indices[crate::subchunk::voxel_offset(x, y, z)] = 1;
    }
    let palette = [BlockState::new("minecraft:air"), BlockState::new(name)];
    sub_chunk_record(pos, dimension, index, &[encode_layer(1, &indices, &palette)])
}

pub fn version_record(pos: ChunkPos, dimension: Dimension) -> KeyVal {
    KeyVal::new(chunk_key(pos, dimension, ChunkTag::Version), vec![40])
}
