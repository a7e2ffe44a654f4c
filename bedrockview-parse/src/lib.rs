//! Decoding of Bedrock-style world records.
//!
//! The save store is a flat key/value database. Chunk-addressed keys carry
//! the chunk coordinate, the dimension and a record tag; the values of
//! sub-chunk records hold palette-compressed voxel data with little-endian
//! NBT block descriptors.
//!
//! - [`key`]: classification of raw keys into [`KeyType`]
//! - [`subchunk`]: version 9 sub-chunk decoding
//! - [`chunk`]: grouping of a chunk's records into a queryable [`Chunk`]
//! - [`heightmap`]: per-column topmost non-air block

pub mod binary;
pub mod chunk;
pub mod error;
pub mod heightmap;
pub mod key;
pub mod nbt;
pub mod subchunk;
pub mod world;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use chunk::{Chunk, DecodeOptions, Decoder, DecoderStats};
pub use error::{DecodeError, RecordError};
pub use heightmap::{HeightMap, NO_HEIGHT};
pub use key::{ChunkTag, KeyInfo, KeyType, KeyVal};
pub use subchunk::{BlockState, Layer, SubChunk};
pub use world::{ChunkPos, Dimension};
