//! Tile source over one dimension of a world: one unit is one block column,
//! drawn as the colour of its topmost block.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::rc::Rc;

use anyhow::{Result, anyhow};
use lru::LruCache;

use bedrockview_occupancy::OccupancyIndex;
use bedrockview_parse::{Chunk, ChunkPos, Decoder, Dimension};
use bedrockview_storage::{RecordStore, load_chunk};
use bedrockview_tiles::{Image, Rect, TileSource, UNIT_SIZE};

use crate::colors::block_color;

pub struct WorldTileSource {
    store: Rc<dyn RecordStore>,
    dimension: Dimension,
    occupied: HashSet<ChunkPos>,
    occupancy: OccupancyIndex,
    decoder: Decoder,
    chunks: LruCache<ChunkPos, Chunk>,
}

impl WorldTileSource {
    pub fn new(
        store: Rc<dyn RecordStore>,
        dimension: Dimension,
        occupied: HashSet<ChunkPos>,
        decoder: Decoder,
        chunk_cache: NonZeroUsize,
    ) -> Self {
        let occupancy = OccupancyIndex::new(occupied.iter().copied());
        Self {
            store,
            dimension,
            occupied,
            occupancy,
            decoder,
            chunks: LruCache::new(chunk_cache),
        }
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    fn chunk(&mut self, pos: ChunkPos) -> Result<&mut Chunk> {
        if !self.chunks.contains(&pos) {
            let chunk = load_chunk(self.store.as_ref(), &mut self.decoder, pos, self.dimension)?;
            self.chunks.put(pos, chunk);
        }
        self.chunks
            .get_mut(&pos)
            .ok_or_else(|| anyhow!("chunk {} missing from cache", pos))
    }
}

fn chunk_of(x: i32, z: i32) -> ChunkPos {
    ChunkPos::new(x >> 4, z >> 4)
}

impl TileSource for WorldTileSource {
    fn get(&mut self, x: i32, z: i32) -> Result<Option<Image>> {
        let pos = chunk_of(x, z);
        if !self.occupied.contains(&pos) {
            return Ok(None);
        }
        let chunk = self.chunk(pos)?;
        Ok(chunk
            .top_block((x & 15) as usize, (z & 15) as usize, 0)
            .map(|(_, block)| Image::solid(UNIT_SIZE, UNIT_SIZE, block_color(block))))
    }

    fn all_empty(&mut self, area: Rect) -> Result<bool> {
        Ok(self.occupancy.all_empty(
            area.min.x >> 4,
            area.min.y >> 4,
            (area.max.x + 15) >> 4,
            (area.max.y + 15) >> 4,
        ))
    }

    fn info(&mut self, x: i32, z: i32) -> Result<String> {
        let pos = chunk_of(x, z);
        if !self.occupied.contains(&pos) {
            return Ok("empty".to_string());
        }
        let chunk = self.chunk(pos)?;
        match chunk.top_block((x & 15) as usize, (z & 15) as usize, 0) {
            Some((y, block)) => Ok(format!("y={} {}", y, serde_json::to_string(block)?)),
            None => Ok("no blocks".to_string()),
        }
    }
}
