use crate::error::{AtlasError, Result};
use crate::model::Rect;
use glam::DVec2;
use serde::{Deserialize, Serialize};

const MATCH_ULPS: f64 = 16.0;

/// Mapping of one island from its material's UV space onto the atlas.
///
/// `origin` is the tight island box and `padded` the same box grown by the padding,
/// both normalized by the material size. `packed` is the destination on the atlas,
/// normalized by the atlas side once packing is done.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UvTransform<M> {
    pub material: M,
    pub origin: Rect,
    pub padded: Rect,
    pub packed: Rect,
}

impl<M> UvTransform<M> {
    pub fn new(material: M, origin: Rect, padded: Rect, packed: Rect) -> Self {
        Self {
            material,
            origin,
            padded,
            packed,
        }
    }

    /// Builds a transform from island bounds given in the material's pixel space.
    ///
    /// `packed` starts as the padded pixel box in atlas units, multiplied by `scale`;
    /// only its size matters until the packer assigns a position.
    pub fn from_island_bounds(
        material: M,
        min: DVec2,
        max: DVec2,
        material_size: DVec2,
        padding: f64,
        atlas_size: DVec2,
        scale: f64,
    ) -> Result<Self> {
        if !(min.is_finite() && max.is_finite()) || min.x > max.x || min.y > max.y {
            return Err(AtlasError::InvalidIsland(format!(
                "bounds {min}..{max} are not a valid box"
            )));
        }
        if !(material_size.is_finite() && material_size.x > 0.0 && material_size.y > 0.0) {
            return Err(AtlasError::InvalidIsland(format!(
                "material size {material_size} must be positive"
            )));
        }
        if !(atlas_size.is_finite() && atlas_size.x > 0.0 && atlas_size.y > 0.0) {
            return Err(AtlasError::InvalidIsland(format!(
                "atlas size {atlas_size} must be positive"
            )));
        }
        if !scale.is_finite() || scale <= 0.0 {
            return Err(AtlasError::InvalidIsland(format!(
                "scale {scale} must be positive"
            )));
        }
        let tight = Rect::from_min_max(min, max);
        let padded_px = tight.expand(padding);
        Ok(Self {
            material,
            origin: tight.div(material_size),
            padded: padded_px.div(material_size),
            packed: padded_px.div(atlas_size).scale(scale),
        })
    }

    pub fn material(&self) -> &M {
        &self.material
    }

    pub fn set_packed(&mut self, packed: Rect) {
        self.packed = packed;
    }

    /// Inclusive test of `point` against `origin` with a per-axis tolerance.
    ///
    /// The tolerance is widened by a few ulps of the compared coordinates, since `origin`
    /// went through pixel space and a polygon mean is rounded on its own.
    pub fn is_match(&self, point: DVec2, eps_x: f64, eps_y: f64) -> bool {
        let magnitude = point
            .abs()
            .max(self.origin.min().abs())
            .max(self.origin.max().abs())
            .max(DVec2::ONE);
        let slack = magnitude * (MATCH_ULPS * f64::EPSILON);
        self.origin.contains_point(point, DVec2::new(eps_x, eps_y) + slack)
    }

    /// Maps a UV point from the padded box onto the packed box. Points outside
    /// `padded` extrapolate linearly.
    pub fn apply(&self, point: DVec2) -> DVec2 {
        self.packed.from_local(self.padded.to_local(point))
    }

    /// `(padded corner, packed corner)` pairs: left-bottom, right-bottom, right-top, left-top.
    pub fn corners(&self) -> [(DVec2, DVec2); 4] {
        let from = self.padded.corners();
        let to = self.packed.corners();
        [
            (from[0], to[0]),
            (from[1], to[1]),
            (from[2], to[2]),
            (from[3], to[3]),
        ]
    }
}
