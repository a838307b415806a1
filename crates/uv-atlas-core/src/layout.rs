use crate::model::Rect;
use crate::transform::UvTransform;
use glam::DVec2;
use serde::Serialize;
use serde_json::{Value, json};

/// One island as the renderer sees it: which part of the source material lands where.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LayoutQuad<M> {
    pub material: M,
    /// Padded island box in the material's normalized UV space.
    pub source: Rect,
    /// Destination box in normalized atlas UV space.
    pub target: Rect,
}

/// Bake layout handed to the renderer: one quad per packed island.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AtlasLayout<M> {
    pub width: u32,
    pub height: u32,
    pub quads: Vec<LayoutQuad<M>>,
}

impl<M: Clone> AtlasLayout<M> {
    pub fn from_transforms<'a, I>(width: u32, height: u32, transforms: I) -> Self
    where
        I: IntoIterator<Item = &'a UvTransform<M>>,
        M: 'a,
    {
        let quads = transforms
            .into_iter()
            .map(|t| LayoutQuad {
                material: t.material.clone(),
                source: t.padded,
                target: t.packed,
            })
            .collect();
        Self {
            width,
            height,
            quads,
        }
    }
}

impl<M> AtlasLayout<M> {
    /// Share of the unit atlas covered by quads, clipped to the canvas.
    pub fn occupancy(&self) -> f64 {
        let covered: f64 = self
            .quads
            .iter()
            .map(|q| {
                let min = q.target.min().clamp(DVec2::ZERO, DVec2::ONE);
                let max = q.target.max().clamp(DVec2::ZERO, DVec2::ONE);
                let size = (max - min).max(DVec2::ZERO);
                size.x * size.y
            })
            .sum();
        covered.min(1.0)
    }
}

/// Serialize a layout as `{ size, quads: [{ material, source, target, pixels }] }`.
/// `pixels` is the target box on the image, with y growing downward.
pub fn layout_to_json<M: ToString>(layout: &AtlasLayout<M>) -> Value {
    let (w, h) = (layout.width as f64, layout.height as f64);
    let quads: Vec<Value> = layout
        .quads
        .iter()
        .map(|q| {
            let source = json!({"x": q.source.x, "y": q.source.y, "w": q.source.w, "h": q.source.h});
            let target = json!({"x": q.target.x, "y": q.target.y, "w": q.target.w, "h": q.target.h});
            let pixels = json!({
                "x": q.target.x * w,
                "y": (1.0 - q.target.y - q.target.h) * h,
                "w": q.target.w * w,
                "h": q.target.h * h,
            });
            json!({
                "material": q.material.to_string(),
                "source": source,
                "target": target,
                "pixels": pixels,
            })
        })
        .collect();
    json!({
        "size": {"w": layout.width, "h": layout.height},
        "occupancy": layout.occupancy(),
        "quads": quads,
    })
}
