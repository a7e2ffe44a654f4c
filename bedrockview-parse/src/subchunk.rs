//! Version 9 sub-chunk records.
//!
//! Layout of the value:
//! - byte 0: format version (9)
//! - byte 1: layer count
//! - byte 2: signed vertical index, repeated from the key
//! - per layer: palette type byte, packed index words, palette count,
//!   palette entries as little-endian NBT compounds

use std::collections::HashMap;
use std::io::{self, Cursor};

use byteorder::{ByteOrder, LittleEndian};
use fastnbt::Value;
use serde::Serialize;

use crate::error::DecodeError;
use crate::nbt;

pub const SUB_CHUNK_VERSION: u8 = 9;
pub const VOXELS: usize = 4096;
const INVALID_PALETTE_TYPE: u8 = 0x7F;

/// Offset of a voxel in a layer's index array.
#[inline]
pub fn voxel_offset(x: usize, y: usize, z: usize) -> usize {
    (x << 8) | (z << 4) | y
}

/// Number of 32-bit words used to store 4096 indices of `bits` each.
pub fn word_count(bits: u8) -> Option<usize> {
    match bits {
        0 => Some(0),
        1 => Some(128),
        2 => Some(256),
        3 => Some(410),
        4 => Some(512),
        5 => Some(683),
        6 => Some(820),
        8 => Some(1024),
        16 => Some(2048),
        _ => None,
    }
}

/// A palette entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockState {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub states: HashMap<String, Value>,
}

impl BlockState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            states: HashMap::new(),
        }
    }

    pub fn from_compound(mut map: HashMap<String, Value>) -> io::Result<Self> {
        let name = match map.remove("name") {
            Some(Value::String(name)) => name,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "palette entry has no string 'name'",
                ));
            }
        };
        let version = match map.remove("version") {
            Some(Value::Int(v)) => Some(v),
            _ => None,
        };
        let states = match map.remove("states") {
            Some(Value::Compound(states)) => states,
            _ => HashMap::new(),
        };
        Ok(Self { name, version, states })
    }

    /// Convert back to the compound form stored on disk.
    pub fn to_compound(&self) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        if let Some(version) = self.version {
            map.insert("version".to_string(), Value::Int(version));
        }
        map.insert("states".to_string(), Value::Compound(self.states.clone()));
        map
    }

    pub fn is_air(&self) -> bool {
        self.name == "minecraft:air" || self.name == "air"
    }
}

/// One block layer of a sub-chunk.
#[derive(Debug, Clone)]
pub struct Layer {
    bits_per_block: u8,
    indices: Box<[u16]>,
    palette: Vec<BlockState>,
    air_index: Option<u16>,
    all_air: bool,
}

impl Layer {
    pub fn bits_per_block(&self) -> u8 {
        self.bits_per_block
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn palette(&self) -> &[BlockState] {
        &self.palette
    }

    pub fn air_index(&self) -> Option<u16> {
        self.air_index
    }

    /// True when the layer is a single air palette entry.
    pub fn is_all_air(&self) -> bool {
        self.all_air
    }

    #[inline]
    pub fn index_at(&self, x: usize, y: usize, z: usize) -> u16 {
        self.indices[voxel_offset(x, y, z)]
    }

    /// Palette entry at a voxel, or `None` if the index is out of range.
    pub fn block_at(&self, x: usize, y: usize, z: usize) -> Option<&BlockState> {
        self.palette.get(self.index_at(x, y, z) as usize)
    }
}

/// A decoded 16x16x16 slab.
#[derive(Debug, Clone)]
pub struct SubChunk {
    pub index: i8,
    pub version: u8,
    /// Layer count reported by the record. May exceed `layers.len()`.
    pub layer_count: u8,
    pub layers: Vec<Layer>,
}

impl SubChunk {
    pub fn layer(&self, layer: usize) -> Option<&Layer> {
        self.layers.get(layer)
    }

    pub fn min_y(&self) -> i32 {
        self.index as i32 * 16
    }
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], DecodeError> {
        let available = self.data.len() - self.pos;
        if n > available {
            return Err(DecodeError::Truncated { what, needed: n, available });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take(1, what)?[0])
    }

    fn u32_le(&mut self, what: &'static str) -> Result<u32, DecodeError> {
        Ok(LittleEndian::read_u32(self.take(4, what)?))
    }

    fn compound(&mut self) -> io::Result<HashMap<String, Value>> {
        let mut cursor = Cursor::new(&self.data[self.pos..]);
        let result = nbt::read_compound(&mut cursor);
        self.pos += cursor.position() as usize;
        result
    }
}

/// Unpack 4096 indices from little-endian words of `bits` each.
///
/// Each word holds `32 / bits` indices starting from the low bits; leftover
/// high bits are padding and indices never span two words. `data` must be
/// consumed exactly.
pub fn unpack_indices(bits: u8, data: &[u8]) -> Result<Vec<u16>, DecodeError> {
    let mut out = vec![0u16; VOXELS];
    if bits == 0 {
        if !data.is_empty() {
            return Err(DecodeError::TrailingWordBytes { words: 0, remaining: data.len() });
        }
        return Ok(out);
    }

    let bits = bits as u32;
    let mask = (1u32 << bits) - 1;
    let mut words = data.chunks_exact(4).map(LittleEndian::read_u32);
    let mut word = 0u32;
    let mut bits_left = 0u32;
    let mut used = 0usize;

    for slot in out.iter_mut() {
        if bits_left < bits {
            word = words.next().ok_or_else(|| DecodeError::Truncated {
                what: "index words",
                needed: (used + 1) * 4,
                available: data.len(),
            })?;
            used += 1;
            bits_left = 32;
        }
        *slot = (word & mask) as u16;
        word >>= bits;
        bits_left -= bits;
    }

    let remaining = data.len() - used * 4;
    if remaining > 0 {
        return Err(DecodeError::TrailingWordBytes { words: used, remaining });
    }
    Ok(out)
}

/// Decode a sub-chunk value. `key_index` is the trailing byte of the key;
/// only the first `max_layers` layers are decoded.
pub fn decode_sub_chunk(key_index: i8, value: &[u8], max_layers: usize) -> Result<SubChunk, DecodeError> {
    let mut reader = ByteReader::new(value);

    let version = reader.u8("sub-chunk header")?;
    if version != SUB_CHUNK_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let layer_count = reader.u8("sub-chunk header")?;
    let index = reader.u8("sub-chunk header")? as i8;
    if index != key_index {
        return Err(DecodeError::IndexMismatch { key: key_index, value: index });
    }

    let decoded = (layer_count as usize).min(max_layers);
    let mut layers = Vec::with_capacity(decoded);
    for layer in 0..decoded {
        layers.push(decode_layer(&mut reader, layer)?);
    }

    Ok(SubChunk { index, version, layer_count, layers })
}

fn decode_layer(reader: &mut ByteReader<'_>, layer: usize) -> Result<Layer, DecodeError> {
    let palette_type = reader.u8("palette type")?;
    if palette_type & 1 == 1 {
        return Err(DecodeError::RuntimePalette { layer });
    }
    let bits = palette_type >> 1;
    if bits == INVALID_PALETTE_TYPE {
        return Err(DecodeError::InvalidBitsPerBlock { layer });
    }
    let words = word_count(bits).ok_or(DecodeError::UnimplementedBitsPerBlock { layer, bits })?;

    let packed = reader.take(words * 4, "index words")?;
    let indices = unpack_indices(bits, packed)?;

    let count = if bits > 0 { reader.u32_le("palette count")? as usize } else { 1 };

    if let Some(&index) = indices.iter().find(|&&i| i as usize >= count) {
        return Err(DecodeError::PaletteIndexOutOfRange { layer, index, count });
    }

    let mut palette = Vec::with_capacity(count.min(VOXELS));
    let mut air_index = None;
    for entry in 0..count {
        let state = reader
            .compound()
            .and_then(BlockState::from_compound)
            .map_err(|source| DecodeError::Palette { layer, entry, source })?;
        if air_index.is_none() && state.is_air() {
            air_index = Some(entry as u16);
        }
        palette.push(state);
    }

    let all_air = bits == 0 && air_index == Some(0);

    Ok(Layer {
        bits_per_block: bits,
        indices: indices.into_boxed_slice(),
        palette,
        air_index,
        all_air,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{encode_layer, encode_sub_chunk, pack_indices};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const ALL_BITS: [u8; 9] = [0, 1, 2, 3, 4, 5, 6, 8, 16];

    fn palette(n: usize) -> Vec<BlockState> {
        let mut out = vec![BlockState::new("minecraft:air")];
        for i in 1..n {
            out.push(BlockState::new(format!("minecraft:block_{}", i)));
        }
        out
    }

    #[test]
    fn test_word_counts() {
        for bits in ALL_BITS {
            let words = word_count(bits).unwrap();
            if bits > 0 {
                let per_word = 32 / bits as usize;
                assert!(words * per_word >= VOXELS);
                assert!((words - 1) * per_word < VOXELS);
            }
        }
        assert_eq!(word_count(7), None);
        assert_eq!(word_count(32), None);
    }

    #[test]
    fn test_unpack_every_width_reproduces_packed() {
        let mut rng = StdRng::seed_from_u64(7);
        for bits in ALL_BITS {
            let limit = if bits == 0 { 1 } else { 1u32 << bits };
            let original: Vec<u16> = (0..VOXELS).map(|_| rng.gen_range(0..limit) as u16).collect();
            let packed = pack_indices(bits, &original);
            assert_eq!(packed.len(), word_count(bits).unwrap() * 4);
            let unpacked = unpack_indices(bits, &packed).unwrap();
            assert_eq!(unpacked.len(), VOXELS);
            assert_eq!(unpacked, original, "bits = {}", bits);
        }
    }

    #[test]
    fn test_unpack_ignores_word_padding() {
        // 3 bits: 10 indices per word, the top 2 bits are padding.
        let mut data = vec![0u8; 410 * 4];
        for chunk in data.chunks_mut(4) {
            chunk.copy_from_slice(&0xC000_0000u32.to_le_bytes());
        }
        let out = unpack_indices(3, &data).unwrap();
        assert!(out.iter().all(|&i| i == 0));
    }

    #[test]
    fn test_unpack_rejects_wrong_length() {
        let packed = pack_indices(4, &[1; VOXELS]);
        assert!(matches!(
            unpack_indices(4, &packed[..packed.len() - 4]),
            Err(DecodeError::Truncated { .. })
        ));

        let mut long = packed.clone();
        long.extend_from_slice(&[0, 0, 0, 0]);
        assert!(matches!(
            unpack_indices(4, &long),
            Err(DecodeError::TrailingWordBytes { remaining: 4, .. })
        ));
    }

    #[test]
    fn test_decode_bits_one_air_and_stone() {
        // Index 1 (stone) only at (x=0, z=0, y=0).
        let mut indices = vec![0u16; VOXELS];
        indices[voxel_offset(0, 0, 0)] = 1;
        let palette = vec![BlockState::new("minecraft:air"), BlockState::new("minecraft:stone")];
        let value = encode_sub_chunk(-4, &[encode_layer(1, &indices, &palette)]);

        let sub = decode_sub_chunk(-4, &value, 1).unwrap();
        assert_eq!(sub.index, -4);
        assert_eq!(sub.layer_count, 1);
        let layer = sub.layer(0).unwrap();
        assert_eq!(layer.bits_per_block(), 1);
        assert_eq!(layer.air_index(), Some(0));
        assert!(!layer.is_all_air());
        assert_eq!(layer.block_at(0, 0, 0).unwrap().name, "minecraft:stone");
        assert_eq!(layer.block_at(0, 1, 0).unwrap().name, "minecraft:air");
        assert_eq!(layer.block_at(15, 15, 15).unwrap().name, "minecraft:air");
    }

    #[test]
    fn test_decode_single_entry_air_layer() {
        let value = encode_sub_chunk(3, &[encode_layer(0, &[0; VOXELS], &palette(1))]);
        let sub = decode_sub_chunk(3, &value, 1).unwrap();
        let layer = sub.layer(0).unwrap();
        assert!(layer.is_all_air());
        assert_eq!(layer.palette().len(), 1);
    }

    #[test]
    fn test_decode_every_width() {
        let mut rng = StdRng::seed_from_u64(42);
        for bits in ALL_BITS {
            let count = if bits == 0 { 1 } else { (1usize << bits).min(40) };
            let indices: Vec<u16> = (0..VOXELS).map(|_| rng.gen_range(0..count) as u16).collect();
            let value = encode_sub_chunk(0, &[encode_layer(bits, &indices, &palette(count))]);
            let sub = decode_sub_chunk(0, &value, 1).unwrap();
            let layer = sub.layer(0).unwrap();
            assert_eq!(layer.indices(), indices.as_slice());
            assert_eq!(layer.palette().len(), count);
        }
    }

    #[test]
    fn test_only_first_layer_by_default() {
        let water = vec![BlockState::new("minecraft:water")];
        let layers = [
            encode_layer(0, &[0; VOXELS], &palette(1)),
            encode_layer(0, &[0; VOXELS], &water),
        ];
        let value = encode_sub_chunk(1, &layers);

        let sub = decode_sub_chunk(1, &value, 1).unwrap();
        assert_eq!(sub.layer_count, 2);
        assert_eq!(sub.layers.len(), 1);

        let sub = decode_sub_chunk(1, &value, 4).unwrap();
        assert_eq!(sub.layers.len(), 2);
        assert_eq!(sub.layer(1).unwrap().palette()[0].name, "minecraft:water");
    }

    #[test]
    fn test_header_errors() {
        let mut value = encode_sub_chunk(2, &[encode_layer(0, &[0; VOXELS], &palette(1))]);
        assert!(matches!(decode_sub_chunk(3, &value, 1), Err(DecodeError::IndexMismatch { key: 3, value: 2 })));

        value[0] = 8;
        assert!(matches!(decode_sub_chunk(2, &value, 1), Err(DecodeError::UnsupportedVersion(8))));

        assert!(matches!(decode_sub_chunk(0, &[], 1), Err(DecodeError::Truncated { .. })));
        assert!(matches!(decode_sub_chunk(0, &[9, 1], 1), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_palette_type_errors() {
        assert!(matches!(
            decode_sub_chunk(0, &[9, 1, 0, 0x03], 1),
            Err(DecodeError::RuntimePalette { layer: 0 })
        ));
        assert!(matches!(
            decode_sub_chunk(0, &[9, 1, 0, 0xFE], 1),
            Err(DecodeError::InvalidBitsPerBlock { layer: 0 })
        ));
        assert!(matches!(
            decode_sub_chunk(0, &[9, 1, 0, 7 << 1], 1),
            Err(DecodeError::UnimplementedBitsPerBlock { bits: 7, .. })
        ));
        assert!(matches!(
            decode_sub_chunk(0, &[9, 1, 0, 4 << 1, 0, 0], 1),
            Err(DecodeError::Truncated { what: "index words", .. })
        ));
    }

    #[test]
    fn test_index_out_of_palette_range() {
        let mut indices = vec![0u16; VOXELS];
        indices[100] = 3;
        let value = encode_sub_chunk(0, &[encode_layer(2, &indices, &palette(3))]);
        assert!(matches!(
            decode_sub_chunk(0, &value, 1),
            Err(DecodeError::PaletteIndexOutOfRange { index: 3, count: 3, .. })
        ));
    }

    #[test]
    fn test_malformed_palette_entry() {
        let mut value = encode_sub_chunk(0, &[encode_layer(0, &[0; VOXELS], &palette(1))]);
        value.truncate(value.len() - 3);
        assert!(matches!(
            decode_sub_chunk(0, &value, 1),
            Err(DecodeError::Palette { layer: 0, entry: 0, .. })
        ));
    }

    #[test]
    fn test_block_state_fields() {
        let mut state = BlockState::new("minecraft:stone");
        state.version = Some(17959425);
        state.states.insert("stone_type".to_string(), Value::String("granite".to_string()));
        let parsed = BlockState::from_compound(state.to_compound()).unwrap();
        assert_eq!(parsed, state);
        assert!(!parsed.is_air());
        assert!(BlockState::new("air").is_air());

        let json = serde_json::to_string(&BlockState::new("minecraft:air")).unwrap();
        assert_eq!(json, r#"{"name":"minecraft:air"}"#);
    }
}
