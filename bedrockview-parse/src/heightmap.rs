use serde::Serialize;

use crate::chunk::Chunk;

/// Height of a column with no non-air block.
pub const NO_HEIGHT: i32 = i32::MIN;

/// World-Y of the highest non-air block per column, indexed `[x][z]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeightMap {
    heights: [[i32; 16]; 16],
}

impl Default for HeightMap {
    fn default() -> Self {
        Self { heights: [[NO_HEIGHT; 16]; 16] }
    }
}

impl HeightMap {
    /// Height of column `(x, z)`, or `None` if either is not in `0..16`.
    #[inline]
    pub fn get(&self, x: usize, z: usize) -> Option<i32> {
        self.heights.get(x)?.get(z).copied()
    }

    pub fn rows(&self) -> &[[i32; 16]; 16] {
        &self.heights
    }

    /// Scan every column from the top sub-chunk down. Missing layers and
    /// out-of-range palette indices are skipped.
    pub(crate) fn compute(chunk: &Chunk, layer: usize) -> Self {
        let mut map = HeightMap::default();
        let mut remaining = 256usize;

        for sub in chunk.sub_chunks().iter().rev() {
            let Some(data) = sub.layer(layer) else {
                continue;
            };
            if data.is_all_air() {
                continue;
            }
            for x in 0..16 {
                for z in 0..16 {
                    if map.heights[x][z] != NO_HEIGHT {
                        continue;
                    }
                    for y in (0..16).rev() {
                        match data.block_at(x, y, z) {
                            Some(block) if !block.is_air() => {
                                map.heights[x][z] = sub.min_y() + y as i32;
                                remaining -= 1;
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }
            if remaining == 0 {
                break;
            }
        }
        map
    }
}
