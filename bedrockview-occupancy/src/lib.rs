//! Hierarchical chunk presence index.
//!
//! Level `L` records every aligned block of `16^L x 16^L` chunks that
//! contains at least one occupied chunk, so large empty regions can be
//! confirmed without touching individual chunk coordinates.

use std::collections::HashSet;

use bedrockview_parse::ChunkPos;

pub const LEVELS: usize = 3;

/// Above this summed width + depth, queries start at the coarsest level.
const COARSE_QUERY_SPAN: i64 = 30;

#[derive(Debug, Clone)]
pub struct OccupancyIndex {
    presence: Vec<HashSet<ChunkPos>>,
}

#[inline]
fn gap(level: usize) -> i64 {
    1i64 << (level * 4)
}

#[inline]
fn align(v: i64, level: usize) -> i64 {
    v & !(gap(level) - 1)
}

impl OccupancyIndex {
    pub fn new(occupied: impl IntoIterator<Item = ChunkPos>) -> Self {
        let mut presence = vec![HashSet::new(); LEVELS];
        for pos in occupied {
            for (level, set) in presence.iter_mut().enumerate() {
                let mask = (1i32 << (level * 4)) - 1;
                set.insert(ChunkPos::new(pos.x & !mask, pos.z & !mask));
            }
        }
        log::debug!(
            "Occupancy index: {} chunks, {} / {} coarse cells",
            presence[0].len(),
            presence[1].len(),
            presence[2].len()
        );
        Self { presence }
    }

    /// Number of occupied chunks.
    pub fn len(&self) -> usize {
        self.presence[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.presence[0].is_empty()
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.presence[0].contains(&pos)
    }

    /// True if no occupied chunk lies in `[min_x, max_x) x [min_z, max_z)`.
    pub fn all_empty(&self, min_x: i32, min_z: i32, max_x: i32, max_z: i32) -> bool {
        let (min_x, min_z, max_x, max_z) = (min_x as i64, min_z as i64, max_x as i64, max_z as i64);
        let level = if (max_x - min_x) + (max_z - min_z) < COARSE_QUERY_SPAN { 0 } else { LEVELS - 1 };
        self.all_empty_at_level(level, min_x, min_z, max_x, max_z)
    }

    fn all_empty_at_level(&self, level: usize, min_x: i64, min_z: i64, max_x: i64, max_z: i64) -> bool {
        let gap = gap(level);
        let mut start_x = align(min_x, level);
        while start_x < max_x {
            let mut start_z = align(min_z, level);
            while start_z < max_z {
                if self.is_marked(level, start_x, start_z) {
                    if level == 0 {
                        return false;
                    }
                    let inner = self.all_empty_at_level(
                        level - 1,
                        start_x.max(min_x),
                        start_z.max(min_z),
                        (start_x + gap).min(max_x),
                        (start_z + gap).min(max_z),
                    );
                    if !inner {
                        return false;
                    }
                }
                start_z += gap;
            }
            start_x += gap;
        }
        true
    }

    fn is_marked(&self, level: usize, x: i64, z: i64) -> bool {
        match (i32::try_from(x), i32::try_from(z)) {
            (Ok(x), Ok(z)) => self.presence[level].contains(&ChunkPos::new(x, z)),
            _ => false,
        }
    }
}
