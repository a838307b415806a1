//! Contracts between the atlas core and the application that owns the scene.
//!
//! [`SceneHost`] reaches into the scene graph, the geometry tools and the renderer.
//! [`AtlasPolicy`] answers the per-(object, material) questions that decide what gets
//! atlased and how.

use crate::channel::BakeChannel;
use crate::config::IslandMode;
use crate::layout::AtlasLayout;
use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Error reported by host code. Wrapped by the pipeline with stage context.
pub type HostError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type HostResult<T> = std::result::Result<T, HostError>;

/// One face of a mesh: the material slot it uses and one UV per loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Polygon {
    pub slot: usize,
    pub uvs: Vec<DVec2>,
}

impl Polygon {
    pub fn new(slot: usize, uvs: Vec<DVec2>) -> Self {
        Self { slot, uvs }
    }

    /// Mean of the loop UVs, or None for a polygon without loops.
    pub fn mean_uv(&self) -> Option<DVec2> {
        if self.uvs.is_empty() {
            return None;
        }
        Some(self.uvs.iter().copied().sum::<DVec2>() / self.uvs.len() as f64)
    }

    /// Unsigned area of the polygon in UV space (shoelace formula).
    pub fn uv_area(&self) -> f64 {
        let n = self.uvs.len();
        if n < 3 {
            return 0.0;
        }
        let twice: f64 = (0..n)
            .map(|i| {
                let a = self.uvs[i];
                let b = self.uvs[(i + 1) % n];
                a.perp_dot(b)
            })
            .sum();
        twice.abs() * 0.5
    }
}

/// One UV patch fed to island discovery. `polygon` is None for whole-surface patches.
#[derive(Debug, Clone, PartialEq)]
pub struct UvPatch {
    pub polygon: Option<usize>,
    pub points: Vec<DVec2>,
}

/// Splits polygons into UV patches for the given discovery mode.
///
/// With `sort_by_area`, per-polygon patches come largest first so big islands form early
/// and small polygons mostly fall into them.
pub fn uv_patches(polygons: &[Polygon], mode: IslandMode, sort_by_area: bool) -> Vec<UvPatch> {
    match mode {
        IslandMode::WholeObject => {
            let points: Vec<DVec2> = polygons.iter().flat_map(|p| p.uvs.iter().copied()).collect();
            vec![UvPatch {
                polygon: None,
                points,
            }]
        }
        IslandMode::PerPolygon => {
            let mut order: Vec<usize> = (0..polygons.len()).collect();
            if sort_by_area {
                let areas: Vec<f64> = polygons.iter().map(Polygon::uv_area).collect();
                order.sort_by(|&a, &b| areas[b].total_cmp(&areas[a]));
            }
            order
                .into_iter()
                .map(|i| UvPatch {
                    polygon: Some(i),
                    points: polygons[i].uvs.clone(),
                })
                .collect()
        }
    }
}

/// A single-material copy of an object's surface produced by isolation.
#[derive(Debug, Clone)]
pub struct IsolatedSurface<O, M, S> {
    pub object: O,
    pub material: M,
    pub surface: S,
}

/// Per-(object, material) decisions.
pub trait AtlasPolicy<O, M> {
    /// Material the pair is moved to on the atlas. None leaves the pair untouched.
    fn target_material(&self, object: &O, material: &M) -> Option<M>;

    fn island_mode(&self, _object: &O, _material: &M) -> IslandMode {
        IslandMode::PerPolygon
    }

    /// Island merge tolerance in material pixels. None uses the configured default.
    fn epsilon(&self, _object: &O, _material: &M) -> Option<f64> {
        None
    }

    /// Nominal pixel size of a material, used to bring UVs into pixel space.
    fn material_size(&self, material: &M) -> HostResult<Option<(f64, f64)>>;

    /// Extra scale applied to every island of the material on the atlas.
    fn priority_scale(&self, _material: &M) -> f64 {
        1.0
    }
}

/// Access to the host scene, geometry tools and renderer.
///
/// Calls are blocking. The pipeline holds the host mutably for a whole run.
pub trait SceneHost {
    type Object: Clone + Eq + Hash + Debug;
    type Material: Clone + Eq + Hash + Debug;
    type Surface;

    fn is_mesh_object(&self, object: &Self::Object) -> bool;

    /// Materials assigned to the object's slots; empty slots are None.
    fn material_slots(&self, object: &Self::Object) -> HostResult<Vec<Option<Self::Material>>>;

    /// Checks that a source material can be baked.
    fn validate_material(&self, _material: &Self::Material) -> HostResult<()> {
        Ok(())
    }

    /// Produces one single-material surface copy per (object, material) pair.
    fn isolate_by_material(
        &mut self,
        objects: &[Self::Object],
    ) -> HostResult<Vec<IsolatedSurface<Self::Object, Self::Material, Self::Surface>>>;

    fn surface_polygons(&self, surface: &Self::Surface) -> HostResult<Vec<Polygon>>;

    /// UV patches of an isolated surface, one per polygon or one for the whole surface.
    fn iterate_uv_patches<'a>(
        &'a self,
        surface: &'a Self::Surface,
        mode: IslandMode,
        sort_by_area: bool,
    ) -> HostResult<Box<dyn Iterator<Item = UvPatch> + 'a>> {
        let polygons = self.surface_polygons(surface)?;
        Ok(Box::new(uv_patches(&polygons, mode, sort_by_area).into_iter()))
    }

    /// Disposes surface copies made by `isolate_by_material`.
    fn release_surfaces(&mut self, surfaces: Vec<Self::Surface>) -> HostResult<()>;

    fn object_polygons(&self, object: &Self::Object) -> HostResult<Vec<Polygon>>;

    fn before_bake(
        &mut self,
        _layout: &AtlasLayout<Self::Material>,
        _channel: &BakeChannel,
    ) -> HostResult<()> {
        Ok(())
    }

    /// Renders one channel of every source material into the packed layout.
    fn render_channel(
        &mut self,
        layout: &AtlasLayout<Self::Material>,
        channel: &BakeChannel,
    ) -> HostResult<()>;

    fn after_bake(
        &mut self,
        _layout: &AtlasLayout<Self::Material>,
        _channel: &BakeChannel,
    ) -> HostResult<()> {
        Ok(())
    }

    /// Stores remapped polygons and the new slot materials back on the object.
    fn write_back(
        &mut self,
        object: &Self::Object,
        polygons: Vec<Polygon>,
        slots: Vec<Option<Self::Material>>,
    ) -> HostResult<()>;
}
