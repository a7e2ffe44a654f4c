/// Integer point in source units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Round both coordinates down to a multiple of `units` (a power of two).
    #[inline]
    pub fn align_down(self, units: u32) -> Self {
        let mask = !((units as i32).wrapping_sub(1));
        Self::new(self.x & mask, self.y & mask)
    }
}

/// Half-open rectangle `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            min: Point::new(x0, y0),
            max: Point::new(x1, y1),
        }
    }

    /// Square of side `size` at `origin`, or `None` if its far corner does
    /// not fit in `i32`.
    pub fn square(origin: Point, size: u32) -> Option<Self> {
        let size = i32::try_from(size).ok()?;
        Some(Self::new(
            origin.x,
            origin.y,
            origin.x.checked_add(size)?,
            origin.y.checked_add(size)?,
        ))
    }

    pub fn width(&self) -> i32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> i32 {
        self.max.y - self.min.y
    }

    pub fn is_empty(&self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    /// Origins of the `units`-aligned cells overlapping this rectangle,
    /// row by row.
    pub fn cells(&self, units: u32) -> impl Iterator<Item = Point> + use<> {
        let start = self.min.align_down(units);
        let step = units as i64;
        let (x0, y0) = (start.x as i64, start.y as i64);
        let (x1, y1) = (self.max.x as i64, self.max.y as i64);
        let rows = if y0 < y1 { (y1 - y0 + step - 1) / step } else { 0 };
        let cols = if x0 < x1 { (x1 - x0 + step - 1) / step } else { 0 };
        (0..rows).flat_map(move |r| {
            (0..cols).map(move |c| Point::new((x0 + c * step) as i32, (y0 + r * step) as i32))
        })
    }
}
