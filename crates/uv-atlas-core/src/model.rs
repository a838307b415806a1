use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in continuous units (pixels or normalized UV).
/// `x,y` is the minimum corner; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn from_min_max(min: DVec2, max: DVec2) -> Self {
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    pub fn min(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    pub fn max(&self) -> DVec2 {
        DVec2::new(self.x + self.w, self.y + self.h)
    }

    pub fn size(&self) -> DVec2 {
        DVec2::new(self.w, self.h)
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.w.is_finite() && self.h.is_finite()
    }

    /// Grows the rectangle by `amount` on every side.
    pub fn expand(&self, amount: f64) -> Rect {
        Rect::new(
            self.x - amount,
            self.y - amount,
            self.w + 2.0 * amount,
            self.h + 2.0 * amount,
        )
    }

    /// Divides every component per axis, e.g. to turn pixels into normalized units.
    pub fn div(&self, by: DVec2) -> Rect {
        Rect::new(self.x / by.x, self.y / by.y, self.w / by.x, self.h / by.y)
    }

    /// Multiplies every component by the same factor.
    pub fn scale(&self, factor: f64) -> Rect {
        Rect::new(
            self.x * factor,
            self.y * factor,
            self.w * factor,
            self.h * factor,
        )
    }

    /// Inclusive point test with a per-axis tolerance.
    pub fn contains_point(&self, p: DVec2, epsilon: DVec2) -> bool {
        let min = self.min() - epsilon;
        let max = self.max() + epsilon;
        min.x <= p.x && p.x <= max.x && min.y <= p.y && p.y <= max.y
    }

    /// Coordinates of `p` relative to this rectangle, `0..1` inside it.
    pub fn to_local(&self, p: DVec2) -> DVec2 {
        (p - self.min()) / self.size()
    }

    /// Inverse of [`Rect::to_local`].
    pub fn from_local(&self, p: DVec2) -> DVec2 {
        p * self.size() + self.min()
    }

    /// Corners as left-bottom, right-bottom, right-top, left-top.
    pub fn corners(&self) -> [DVec2; 4] {
        let (min, max) = (self.min(), self.max());
        [
            min,
            DVec2::new(max.x, min.y),
            max,
            DVec2::new(min.x, max.y),
        ]
    }

    /// True if the interiors of both rectangles overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        let (a0, a1) = (self.min(), self.max());
        let (b0, b1) = (other.min(), other.max());
        a0.x < b1.x && b0.x < a1.x && a0.y < b1.y && b0.y < a1.y
    }
}

/// Axis-aligned rectangle on the integer packing grid. `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GridRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl GridRect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Inclusive right edge coordinate (`x + w - 1`).
    pub fn right(&self) -> u32 {
        self.x + self.w.saturating_sub(1)
    }
    /// Inclusive bottom edge coordinate (`y + h - 1`).
    pub fn bottom(&self) -> u32 {
        self.y + self.h.saturating_sub(1)
    }
    /// Returns true if `r` is fully inside `self` (inclusive edges).
    pub fn contains(&self, r: &GridRect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right() <= self.right() && r.bottom() <= self.bottom()
    }
}

/// Summary of one atlas build.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct AtlasStats {
    /// Mesh objects that took part in the build.
    pub objects: usize,
    /// Source materials that were atlased.
    pub materials: usize,
    /// Islands left after merging, equal to the number of transforms.
    pub islands: usize,
    /// Merge steps performed by all island mergers.
    pub merges: usize,
    /// UV patches rejected as degenerate during discovery.
    pub rejected_patches: usize,
    /// Packing rounds executed.
    pub rounds: usize,
    /// Best packing score (extent of the packed square before normalization).
    pub score: f64,
    /// Share of the atlas covered by packed rectangles (0.0 to 1.0).
    pub occupancy: f64,
    /// Polygons whose UVs were remapped onto the atlas.
    pub remapped_polygons: usize,
}

impl AtlasStats {
    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Objects: {}, Materials: {}, Islands: {}, Merges: {}, Rejected: {}, Rounds: {}, Score: {:.4}, Occupancy: {:.2}%, Remapped polygons: {}",
            self.objects,
            self.materials,
            self.islands,
            self.merges,
            self.rejected_patches,
            self.rounds,
            self.score,
            self.occupancy * 100.0,
            self.remapped_polygons,
        )
    }

    /// Returns unused atlas space as a percentage (0.0 to 100.0).
    pub fn waste_percentage(&self) -> f64 {
        (1.0 - self.occupancy).clamp(0.0, 1.0) * 100.0
    }
}
