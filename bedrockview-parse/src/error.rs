use std::io;

use thiserror::Error;

/// Malformed or unsupported record data. Fatal for the chunk being decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported sub-chunk version {0}, only 9 is supported")]
    UnsupportedVersion(u8),

    #[error("sub-chunk index {value} in value does not match index {key} in key")]
    IndexMismatch { key: i8, value: i8 },

    #[error("truncated {what}: need {needed} bytes, {available} available")]
    Truncated { what: &'static str, needed: usize, available: usize },

    #[error("layer {layer}: runtime palette encoding is not supported")]
    RuntimePalette { layer: usize },

    #[error("layer {layer}: invalid bits-per-block marker 0x7F")]
    InvalidBitsPerBlock { layer: usize },

    #[error("layer {layer}: unimplemented bits-per-block {bits}")]
    UnimplementedBitsPerBlock { layer: usize, bits: u8 },

    #[error("{remaining} unconsumed bytes after unpacking {words} words")]
    TrailingWordBytes { words: usize, remaining: usize },

    #[error("layer {layer}: palette index {index} out of range for palette of {count}")]
    PaletteIndexOutOfRange { layer: usize, index: u16, count: usize },

    #[error("layer {layer}: palette entry {entry}: {source}")]
    Palette {
        layer: usize,
        entry: usize,
        #[source]
        source: io::Error,
    },

    #[error("block position out of range: x={x} z={z}")]
    PositionOutOfRange { x: i32, z: i32 },

    #[error("record is not a sub-chunk")]
    NotSubChunk,

    #[error("sub-chunk key has no index byte")]
    MissingSubChunkIndex,
}

/// A [`DecodeError`] tagged with the key of the record that caused it.
#[derive(Debug, Error)]
#[error("record {key:02x?}: {source}")]
pub struct RecordError {
    pub key: Vec<u8>,
    #[source]
    pub source: DecodeError,
}

impl RecordError {
    pub fn new(key: &[u8], source: DecodeError) -> Self {
        Self { key: key.to_vec(), source }
    }
}
