use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};

use crate::geom::{Point, Rect};
use crate::image::Image;
use crate::{BASE_UNITS, MAX_UNITS, TILE_SIZE, TileSource, UNIT_SIZE};

const HALF_TILE: u32 = TILE_SIZE / 2;

/// A tile returned by [`TileServer::get`].
#[derive(Debug, Clone)]
pub struct Tile {
    /// Area covered, in units.
    pub area: Rect,
    pub image: Arc<Image>,
    /// True if the source reported the whole area as empty.
    pub empty: bool,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    image: Arc<Image>,
    empty: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Tiles answered with a shared empty image without composing.
    pub empty_shortcuts: u64,
    pub evictions: u64,
}

/// Cache of tiles generated from a [`TileSource`].
pub struct TileServer<S> {
    source: S,
    cache: HashMap<u32, HashMap<Point, CacheEntry>>,
    empty: HashMap<u32, Arc<Image>>,
    max_units: u32,
    empty_pattern: Option<Arc<Image>>,
    stats: CacheStats,
}

impl<S: TileSource> TileServer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: HashMap::new(),
            empty: HashMap::new(),
            max_units: 0,
            empty_pattern: None,
            stats: CacheStats::default(),
        }
    }

    /// Draw empty areas with this 256x256 pattern instead of composing them.
    pub fn with_empty_pattern(mut self, pattern: Image) -> Self {
        self.empty_pattern = Some(Arc::new(pattern));
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of cached tiles across all levels.
    pub fn cached_tiles(&self) -> usize {
        self.cache.values().map(HashMap::len).sum()
    }

    pub fn info(&mut self, x: i32, y: i32) -> Result<String> {
        self.source.info(x, y)
    }

    /// Tiles of `units` x `units` covering `area`, row by row.
    pub fn get(&mut self, area: Rect, units: u32) -> Result<Vec<Tile>> {
        if units < BASE_UNITS || units > MAX_UNITS || !units.is_power_of_two() {
            bail!(
                "units should be a power of 2 between {} and {}; got {}",
                BASE_UNITS,
                MAX_UNITS,
                units
            );
        }
        self.max_units = self.max_units.max(units);

        let mut tiles = Vec::new();
        for pos in area.cells(units) {
            let covered = tile_area(pos, units)?;
            let (image, empty) = self.tile(pos, units)?;
            tiles.push(Tile {
                area: covered,
                image,
                empty,
            });
        }
        Ok(tiles)
    }

    /// Drop cached tiles overlapping `area` at every level.
    pub fn invalidate(&mut self, area: Rect) {
        let mut units = BASE_UNITS;
        while units <= self.max_units {
            if let Some(level) = self.cache.get_mut(&units) {
                for pos in area.cells(units) {
                    if level.remove(&pos).is_some() {
                        self.stats.evictions += 1;
                    }
                }
            }
            units *= 2;
        }
        log::trace!("Invalidated {:?}", area);
    }

    fn cached(&self, pos: Point, units: u32) -> Option<&CacheEntry> {
        self.cache.get(&units).and_then(|level| level.get(&pos))
    }

    fn store(&mut self, pos: Point, units: u32, image: Arc<Image>, empty: bool) -> (Arc<Image>, bool) {
        self.cache
            .entry(units)
            .or_default()
            .insert(pos, CacheEntry { image: image.clone(), empty });
        (image, empty)
    }

    /// Shared empty image for a level, seeded from the pattern if set.
    fn canonical_empty(&mut self, units: u32) -> Option<Arc<Image>> {
        if !self.empty.contains_key(&units) {
            if let Some(pattern) = &self.empty_pattern {
                self.empty.insert(units, pattern.clone());
            }
        }
        self.empty.get(&units).cloned()
    }

    fn tile(&mut self, pos: Point, units: u32) -> Result<(Arc<Image>, bool)> {
        if let Some(entry) = self.cached(pos, units) {
            let hit = (entry.image.clone(), entry.empty);
            self.stats.hits += 1;
            return Ok(hit);
        }
        self.stats.misses += 1;

        let check = tile_area(pos, units)?;
        if units == BASE_UNITS {
            return self.base_tile(pos, check);
        }

        let half = units / 2;
        let mut all_empty = true;

        // Without the first child cached, ask about the whole area first.
        if self.cached(pos, half).is_none() {
            all_empty = self.source.all_empty(check)?;
            if all_empty {
                if let Some(image) = self.canonical_empty(units) {
                    self.stats.empty_shortcuts += 1;
                    return Ok(self.store(pos, units, image, true));
                }
            }
        }

        let mut canvas = Image::new(TILE_SIZE, TILE_SIZE);
        for qy in 0..2u32 {
            for qx in 0..2u32 {
                let child = Point::new(pos.x + (qx * half) as i32, pos.y + (qy * half) as i32);
                let (image, empty) = self.tile(child, half)?;
                if !empty {
                    all_empty = false;
                }

                let (dx, dy) = ((qx * HALF_TILE) as i32, (qy * HALF_TILE) as i32);
                let quadrant = Rect::new(dx, dy, dx + HALF_TILE as i32, dy + HALF_TILE as i32);
                match &self.empty_pattern {
                    Some(pattern) if empty => canvas.copy_region_from(pattern, quadrant),
                    _ => canvas.scale_from(&image, quadrant),
                }
            }
        }

        let image = if all_empty {
            self.empty.entry(units).or_insert_with(|| Arc::new(canvas)).clone()
        } else {
            Arc::new(canvas)
        };
        Ok(self.store(pos, units, image, all_empty))
    }

    fn base_tile(&mut self, pos: Point, check: Rect) -> Result<(Arc<Image>, bool)> {
        let empty = self.source.all_empty(check)?;
        if empty {
            if let Some(image) = self.canonical_empty(BASE_UNITS) {
                self.stats.empty_shortcuts += 1;
                return Ok(self.store(pos, BASE_UNITS, image, true));
            }
        }

        let mut canvas = Image::new(TILE_SIZE, TILE_SIZE);
        for y in 0..BASE_UNITS {
            for x in 0..BASE_UNITS {
                if let Some(unit) = self.source.get(pos.x + x as i32, pos.y + y as i32)? {
                    canvas.copy_from(&unit, x * UNIT_SIZE, y * UNIT_SIZE);
                }
            }
        }

        let image = Arc::new(canvas);
        if empty {
            self.empty.insert(BASE_UNITS, image.clone());
        }
        Ok(self.store(pos, BASE_UNITS, image, empty))
    }
}

fn tile_area(pos: Point, units: u32) -> Result<Rect> {
    Rect::square(pos, units).with_context(|| format!("Tile of {} units at {:?} is out of range", units, pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Rgba, TRANSPARENT};
    use std::collections::HashSet;

    const RED: Rgba = [255, 0, 0, 255];
    const GRAY: Rgba = [0x33, 0x33, 0x33, 255];
    const BLACK: Rgba = [0, 0, 0, 255];

    #[derive(Default)]
    struct MockSource {
        occupied: HashSet<(i32, i32)>,
        failing: Option<(i32, i32)>,
        gets: usize,
        empty_checks: usize,
    }

    impl MockSource {
        fn with(units: &[(i32, i32)]) -> Self {
            Self {
                occupied: units.iter().copied().collect(),
                ..Default::default()
            }
        }
    }

    impl TileSource for MockSource {
        fn get(&mut self, x: i32, y: i32) -> Result<Option<Image>> {
            self.gets += 1;
            if self.failing == Some((x, y)) {
                bail!("broken unit at {} {}", x, y);
            }
            Ok(self
                .occupied
                .contains(&(x, y))
                .then(|| Image::solid(UNIT_SIZE, UNIT_SIZE, RED)))
        }

        fn all_empty(&mut self, area: Rect) -> Result<bool> {
            self.empty_checks += 1;
            Ok(!self.occupied.iter().any(|&(x, y)| area.contains(Point::new(x, y))))
        }

        fn info(&mut self, x: i32, y: i32) -> Result<String> {
            Ok(format!("unit {} {}", x, y))
        }
    }

    fn pattern() -> Image {
        Image::checkerboard(TILE_SIZE, 8, BLACK, GRAY)
    }

    #[test]
    fn test_units_validation() {
        let mut server = TileServer::new(MockSource::default());
        for bad in [0, 8, 24, 48] {
            assert!(server.get(Rect::new(0, 0, 16, 16), bad).is_err(), "units {}", bad);
        }
        assert!(server.get(Rect::new(0, 0, 16, 16), 16).is_ok());
        assert!(server.get(Rect::new(0, 0, 16, 16), 64).is_ok());
    }

    #[test]
    fn test_huge_units_rejected() {
        let mut server = TileServer::new(MockSource::with(&[(3, 3)]));
        assert!(server.get(Rect::new(1 << 30, 0, (1 << 30) + 1, 1), 1 << 30).is_err());
        assert!(server.get(Rect::new(0, 0, 16, 16), 1 << 31).is_err());
        assert!(server.get(Rect::new(0, 0, 16, 16), MAX_UNITS * 2).is_err());
        assert_eq!(server.cached_tiles(), 0);
        assert_eq!(server.source().gets, 0);
    }

    #[test]
    fn test_tiles_past_coordinate_range_rejected() {
        let mut server = TileServer::new(MockSource::default());
        let err = server.get(Rect::new(i32::MAX - 1, 0, i32::MAX, 16), 16).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{}", err);
        // The last full tile below the limit still works.
        let tiles = server.get(Rect::new(i32::MAX - 17, 0, i32::MAX - 16, 16), 16).unwrap();
        assert_eq!(tiles[0].area, Rect::new(i32::MAX - 31, 0, i32::MAX - 15, 16));
    }

    #[test]
    fn test_area_alignment() {
        let mut server = TileServer::new(MockSource::default());
        let tiles = server.get(Rect::new(5, 5, 6, 6), 16).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].area, Rect::new(0, 0, 16, 16));

        let tiles = server.get(Rect::new(-1, -1, 0, 0), 32).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].area, Rect::new(-32, -32, 0, 0));

        let tiles = server.get(Rect::new(0, 0, 33, 16), 16).unwrap();
        assert_eq!(tiles.len(), 3);
        assert!(server.get(Rect::new(0, 0, 0, 0), 16).unwrap().is_empty());
    }

    #[test]
    fn test_base_tile_composes_units() {
        let mut server = TileServer::new(MockSource::with(&[(1, 2)]));
        let tiles = server.get(Rect::new(0, 0, 16, 16), 16).unwrap();
        let tile = &tiles[0];
        assert!(!tile.empty);
        assert_eq!(tile.image.width(), TILE_SIZE);
        assert_eq!(tile.image.pixel(16, 32), RED);
        assert_eq!(tile.image.pixel(31, 47), RED);
        // Units that were not found stay blank.
        assert_eq!(tile.image.pixel(0, 0), TRANSPARENT);
        assert_eq!(server.source().gets, 256);
    }

    #[test]
    fn test_empty_base_tiles_share_image() {
        let mut server = TileServer::new(MockSource::default());
        let tiles = server.get(Rect::new(0, 0, 48, 16), 16).unwrap();
        assert_eq!(tiles.len(), 3);
        assert!(tiles.iter().all(|t| t.empty));
        assert!(Arc::ptr_eq(&tiles[0].image, &tiles[1].image));
        assert!(Arc::ptr_eq(&tiles[1].image, &tiles[2].image));
        // Only the first tile needed composing.
        assert_eq!(server.source().gets, 256);
        assert_eq!(server.stats().empty_shortcuts, 2);
    }

    #[test]
    fn test_empty_level_shares_one_image() {
        let mut server = TileServer::new(MockSource::default());
        let tiles = server.get(Rect::new(0, 0, 256, 256), 16).unwrap();
        assert_eq!(tiles.len(), 256);
        assert!(tiles.iter().all(|t| t.empty));
        assert!(tiles.iter().all(|t| Arc::ptr_eq(&t.image, &tiles[0].image)));
        assert_eq!(tiles[0].image.pixel(128, 128), TRANSPARENT);
        assert_eq!(server.stats().empty_shortcuts, 255);
    }

    #[test]
    fn test_empty_pattern_is_used() {
        let mut server = TileServer::new(MockSource::default()).with_empty_pattern(pattern());
        let tiles = server.get(Rect::new(0, 0, 32, 16), 16).unwrap();
        assert!(Arc::ptr_eq(&tiles[0].image, &tiles[1].image));
        assert_eq!(*tiles[0].image, pattern());
        assert_eq!(server.source().gets, 0);

        let coarse = server.get(Rect::new(0, 0, 256, 256), 256).unwrap();
        assert!(coarse[0].empty);
        assert!(Arc::ptr_eq(&coarse[0].image, &tiles[0].image));
    }

    #[test]
    fn test_cache_returns_same_image() {
        let mut server = TileServer::new(MockSource::with(&[(3, 3)]));
        let first = server.get(Rect::new(0, 0, 16, 16), 16).unwrap();
        let gets = server.source().gets;
        let second = server.get(Rect::new(0, 0, 16, 16), 16).unwrap();
        assert!(Arc::ptr_eq(&first[0].image, &second[0].image));
        assert_eq!(server.source().gets, gets);
        assert_eq!(server.stats().hits, 1);
    }

    #[test]
    fn test_invalidate_rebuilds_all_levels() {
        let mut server = TileServer::new(MockSource::with(&[(3, 3)]));
        let fine = server.get(Rect::new(0, 0, 16, 16), 16).unwrap();
        let coarse = server.get(Rect::new(0, 0, 64, 64), 64).unwrap();
        assert!(!coarse[0].empty);
        let cached = server.cached_tiles();

        server.invalidate(Rect::new(3, 3, 4, 4));
        // One tile per level: 16, 32 and 64.
        assert_eq!(server.stats().evictions, 3);
        assert_eq!(server.cached_tiles(), cached - 3);

        let fine_again = server.get(Rect::new(0, 0, 16, 16), 16).unwrap();
        assert!(!Arc::ptr_eq(&fine[0].image, &fine_again[0].image));
        assert_eq!(*fine[0].image, *fine_again[0].image);
        let coarse_again = server.get(Rect::new(0, 0, 64, 64), 64).unwrap();
        assert!(!Arc::ptr_eq(&coarse[0].image, &coarse_again[0].image));
    }

    #[test]
    fn test_invalidate_outside_area_keeps_tiles() {
        let mut server = TileServer::new(MockSource::with(&[(3, 3)]));
        let first = server.get(Rect::new(0, 0, 32, 16), 16).unwrap();
        server.invalidate(Rect::new(16, 0, 32, 16));
        let again = server.get(Rect::new(0, 0, 16, 16), 16).unwrap();
        assert!(Arc::ptr_eq(&first[0].image, &again[0].image));
    }

    #[test]
    fn test_downsampled_tile() {
        let mut server = TileServer::new(MockSource::with(&[(0, 0), (16, 16)]));
        let tiles = server.get(Rect::new(0, 0, 32, 32), 32).unwrap();
        let image = &tiles[0].image;
        assert!(!tiles[0].empty);
        // Unit (0, 0) covers 16x16 pixels of the child, 8x8 after halving.
        assert_eq!(image.pixel(0, 0), RED);
        assert_eq!(image.pixel(5, 5), RED);
        assert_eq!(image.pixel(20, 20), TRANSPARENT);
        assert_eq!(image.pixel(128, 128), RED);
        // Empty children were downsampled from the canonical empty tile.
        assert_eq!(image.pixel(200, 50), TRANSPARENT);
    }

    #[test]
    fn test_empty_children_use_pattern_quadrant() {
        let mut server = TileServer::new(MockSource::with(&[(0, 0)])).with_empty_pattern(pattern());
        let tiles = server.get(Rect::new(0, 0, 32, 32), 32).unwrap();
        let image = &tiles[0].image;
        let expected = pattern();
        assert_eq!(image.pixel(128, 0), expected.pixel(128, 0));
        assert_eq!(image.pixel(160, 0), expected.pixel(160, 0));
        assert_eq!(image.pixel(0, 200), expected.pixel(0, 200));
        assert_eq!(image.pixel(0, 0), RED);
    }

    #[test]
    fn test_all_empty_coarse_tiles_collapse() {
        let mut server = TileServer::new(MockSource::default());
        let first = server.get(Rect::new(0, 0, 32, 32), 32).unwrap();
        assert!(first[0].empty);
        let checks = server.source().empty_checks;

        let second = server.get(Rect::new(64, 64, 96, 96), 32).unwrap();
        assert!(second[0].empty);
        assert!(Arc::ptr_eq(&first[0].image, &second[0].image));
        // Answered from the area check alone.
        assert_eq!(server.source().empty_checks, checks + 1);
    }

    #[test]
    fn test_source_errors_propagate() {
        let mut source = MockSource::with(&[(2, 2)]);
        source.failing = Some((5, 5));
        let mut server = TileServer::new(source);
        let err = server.get(Rect::new(0, 0, 64, 64), 64).unwrap_err();
        assert!(err.to_string().contains("broken unit"));
        assert_eq!(server.cached_tiles(), 0);
    }

    #[test]
    fn test_info_passthrough() {
        let mut server = TileServer::new(MockSource::default());
        assert_eq!(server.info(4, -2).unwrap(), "unit 4 -2");
    }
}
