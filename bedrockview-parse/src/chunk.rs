//! Chunk assembly.
//!
//! A [`Decoder`] turns every record sharing a chunk prefix into a [`Chunk`]:
//! records are filtered to the requested dimension, grouped by tag, and the
//! sub-chunk records are decoded and ordered bottom to top.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{DecodeError, RecordError};
use crate::heightmap::HeightMap;
use crate::key::{ChunkTag, KeyVal};
use crate::subchunk::{BlockState, SubChunk, decode_sub_chunk};
use crate::world::{ChunkPos, Dimension};

/// Decoder limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Layers decoded per sub-chunk. Layer 0 holds the solid blocks; later
    /// layers hold things like water in waterlogged blocks.
    pub max_layers: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self { max_layers: 1 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub chunks: u64,
    pub sub_chunks: u64,
    pub records_skipped: u64,
}

/// Stateful chunk decoder. Tracks which bit widths it has encountered.
#[derive(Debug, Default)]
pub struct Decoder {
    options: DecodeOptions,
    seen_bits_per_block: BTreeSet<u8>,
    stats: DecoderStats,
}

impl Decoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Bit widths seen so far, ascending.
    pub fn seen_bits_per_block(&self) -> impl Iterator<Item = u8> + '_ {
        self.seen_bits_per_block.iter().copied()
    }

    pub fn decode_sub_chunk(&mut self, record: &KeyVal) -> Result<SubChunk, RecordError> {
        let index = record.sub_chunk_index().ok_or_else(|| {
            let err = if record.key_type().is_sub_chunk_prefix() {
                DecodeError::MissingSubChunkIndex
            } else {
                DecodeError::NotSubChunk
            };
            RecordError::new(&record.key, err)
        })?;
        let sub = decode_sub_chunk(index, &record.val, self.options.max_layers)
            .map_err(|e| RecordError::new(&record.key, e))?;

        for layer in &sub.layers {
            let bits = layer.bits_per_block();
            if self.seen_bits_per_block.insert(bits) {
                log::debug!("First sight of {} bits per block", bits);
            }
        }
        self.stats.sub_chunks += 1;
        Ok(sub)
    }

    /// Build a chunk from the records of one chunk prefix. Records of other
    /// dimensions or positions are ignored; any malformed sub-chunk fails
    /// the whole chunk.
    pub fn decode_chunk(
        &mut self,
        pos: ChunkPos,
        dimension: Dimension,
        records: impl IntoIterator<Item = KeyVal>,
    ) -> Result<Chunk, RecordError> {
        let mut by_tag: BTreeMap<ChunkTag, Vec<KeyVal>> = BTreeMap::new();
        for record in records {
            let info = record.key_info();
            match (info.key_type.chunk_tag(), info.location) {
                (Some(tag), Some((p, d))) if p == pos && d == dimension => {
                    by_tag.entry(tag).or_default().push(record);
                }
                _ => self.stats.records_skipped += 1,
            }
        }

        let mut sub_chunks = Vec::new();
        if let Some(records) = by_tag.get(&ChunkTag::SubChunkPrefix) {
            for record in records {
                sub_chunks.push(self.decode_sub_chunk(record)?);
            }
        }
        sub_chunks.sort_by_key(|s| s.index);
        let max_layer = sub_chunks.iter().map(|s| s.layer_count as usize).max().unwrap_or(0);

        self.stats.chunks += 1;
        log::trace!("Decoded chunk {} {} with {} sub-chunks", dimension, pos, sub_chunks.len());

        Ok(Chunk {
            dimension,
            pos,
            sub_chunks,
            max_layer,
            records: by_tag,
            height_maps: HashMap::new(),
        })
    }
}

/// A decoded chunk column.
#[derive(Debug, Clone)]
pub struct Chunk {
    dimension: Dimension,
    pos: ChunkPos,
    sub_chunks: Vec<SubChunk>,
    max_layer: usize,
    records: BTreeMap<ChunkTag, Vec<KeyVal>>,
    height_maps: HashMap<usize, HeightMap>,
}

impl Chunk {
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// Sub-chunks ordered by ascending vertical index.
    pub fn sub_chunks(&self) -> &[SubChunk] {
        &self.sub_chunks
    }

    /// Largest layer count reported by any sub-chunk.
    pub fn max_layer(&self) -> usize {
        self.max_layer
    }

    pub fn is_empty(&self) -> bool {
        self.sub_chunks.is_empty()
    }

    /// Source records with the given tag.
    pub fn records(&self, tag: ChunkTag) -> &[KeyVal] {
        self.records.get(&tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tags(&self) -> impl Iterator<Item = ChunkTag> + '_ {
        self.records.keys().copied()
    }

    pub fn min_y(&self) -> Option<i32> {
        self.sub_chunks.first().map(|s| s.min_y())
    }

    pub fn max_y(&self) -> Option<i32> {
        self.sub_chunks.last().map(|s| s.min_y() + 15)
    }

    pub fn sub_chunk(&self, index: i8) -> Option<&SubChunk> {
        self.sub_chunks
            .binary_search_by_key(&index, |s| s.index)
            .ok()
            .map(|i| &self.sub_chunks[i])
    }

    /// Block at chunk-local `x`, `z` and world `y`. A missing sub-chunk or
    /// layer yields `Ok(None)`.
    pub fn get_block(&self, x: i32, z: i32, y: i32, layer: usize) -> Result<Option<&BlockState>, DecodeError> {
        if !(0..16).contains(&x) || !(0..16).contains(&z) {
            return Err(DecodeError::PositionOutOfRange { x, z });
        }
        let Ok(index) = i8::try_from(y >> 4) else {
            return Ok(None);
        };
        let Some(data) = self.sub_chunk(index).and_then(|s| s.layer(layer)) else {
            return Ok(None);
        };
        let (x, y, z) = (x as usize, (y & 15) as usize, z as usize);
        let palette_index = data.index_at(x, y, z);
        data.block_at(x, y, z)
            .map(Some)
            .ok_or(DecodeError::PaletteIndexOutOfRange {
                layer,
                index: palette_index,
                count: data.palette().len(),
            })
    }

    /// Height map for a layer, computed on first use.
    pub fn height_map(&mut self, layer: usize) -> &HeightMap {
        if !self.height_maps.contains_key(&layer) {
            let map = HeightMap::compute(self, layer);
            self.height_maps.insert(layer, map);
        }
        &self.height_maps[&layer]
    }

    /// Highest non-air block of a column, with its world-Y. `None` also for
    /// `x` or `z` outside `0..16`.
    pub fn top_block(&mut self, x: usize, z: usize, layer: usize) -> Option<(i32, &BlockState)> {
        let y = self.height_map(layer).get(x, z)?;
        if y == crate::heightmap::NO_HEIGHT {
            return None;
        }
        match self.get_block(x as i32, z as i32, y, layer) {
            Ok(Some(block)) => Some((y, block)),
            _ => None,
        }
    }
}
