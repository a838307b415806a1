//! In-memory scene used by the CLI and by tests.
//!
//! A [`SceneDescription`] is plain serde data: objects with material slots and UV polygons,
//! and materials with their atlas settings. [`MemoryScene`] implements [`SceneHost`] on top
//! of it and [`ScenePolicy`] answers the policy questions from the same material table.

use crate::channel::BakeChannel;
use crate::config::IslandMode;
use crate::host::{AtlasPolicy, HostResult, IsolatedSurface, Polygon, SceneHost};
use crate::layout::AtlasLayout;
use crate::preview::{name_color, render_layout_preview};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SceneDescription {
    #[serde(default)]
    pub objects: Vec<SceneObject>,
    #[serde(default)]
    pub materials: Vec<SceneMaterial>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneObject {
    pub name: String,
    /// False for objects without geometry (empties, lights).
    #[serde(default = "default_true")]
    pub mesh: bool,
    #[serde(default)]
    pub slots: Vec<Option<String>>,
    #[serde(default)]
    pub polygons: Vec<Polygon>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneMaterial {
    pub name: String,
    /// Nominal texture size in pixels.
    #[serde(default)]
    pub size: Option<(f64, f64)>,
    /// Atlas material this one is merged into.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub island_mode: IslandMode,
    #[serde(default)]
    pub epsilon: Option<f64>,
    #[serde(default = "default_priority")]
    pub priority: f64,
    /// False marks a material the renderer cannot bake.
    #[serde(default = "default_true")]
    pub bakeable: bool,
    /// Preview color per channel name.
    #[serde(default)]
    pub colors: BTreeMap<String, [u8; 4]>,
}

impl SceneMaterial {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            target: None,
            island_mode: IslandMode::default(),
            epsilon: None,
            priority: default_priority(),
            bakeable: true,
            colors: BTreeMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_priority() -> f64 {
    1.0
}

impl SceneDescription {
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn material(&self, name: &str) -> Option<&SceneMaterial> {
        self.materials.iter().find(|m| m.name == name)
    }
}

/// Single-material copy of an object made by [`MemoryScene::isolate_by_material`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySurface {
    pub object: String,
    pub material: String,
    pub polygons: Vec<Polygon>,
}

/// Host call that [`MemoryScene`] can be told to fail, for exercising error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCall {
    Isolate,
    Render,
    WriteBack,
}

/// A bake hook or render call recorded by [`MemoryScene`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BakeEvent {
    Before(String),
    Render(String),
    After(String),
}

/// Scene host backed by a [`SceneDescription`].
#[derive(Debug, Clone)]
pub struct MemoryScene {
    description: SceneDescription,
    render_previews: bool,
    outlines: bool,
    previews: Vec<(BakeChannel, RgbaImage)>,
    events: Vec<BakeEvent>,
    live_surfaces: usize,
    fail_on: Option<HostCall>,
}

impl MemoryScene {
    pub fn new(description: SceneDescription) -> Self {
        Self {
            description,
            render_previews: false,
            outlines: false,
            previews: Vec::new(),
            events: Vec::new(),
            live_surfaces: 0,
            fail_on: None,
        }
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        SceneDescription::from_json(s).map(Self::new)
    }

    /// Rasterize a flat-color preview for every rendered channel.
    pub fn with_previews(mut self, outlines: bool) -> Self {
        self.render_previews = true;
        self.outlines = outlines;
        self
    }

    pub fn with_failure(mut self, call: HostCall) -> Self {
        self.fail_on = Some(call);
        self
    }

    pub fn description(&self) -> &SceneDescription {
        &self.description
    }

    pub fn into_description(self) -> SceneDescription {
        self.description
    }

    pub fn object_names(&self) -> Vec<String> {
        self.description.objects.iter().map(|o| o.name.clone()).collect()
    }

    pub fn policy(&self) -> ScenePolicy {
        ScenePolicy::new(&self.description.materials)
    }

    pub fn previews(&self) -> &[(BakeChannel, RgbaImage)] {
        &self.previews
    }

    pub fn events(&self) -> &[BakeEvent] {
        &self.events
    }

    /// Surface copies handed out and not yet released.
    pub fn live_surfaces(&self) -> usize {
        self.live_surfaces
    }

    fn object(&self, name: &str) -> HostResult<&SceneObject> {
        self.description
            .object(name)
            .ok_or_else(|| format!("unknown object {name:?}").into())
    }

    fn check(&self, call: HostCall) -> HostResult<()> {
        if self.fail_on == Some(call) {
            return Err(format!("{call:?} failed").into());
        }
        Ok(())
    }

    fn channel_color(&self, material: &str, channel: &BakeChannel) -> Rgba<u8> {
        if let Some(c) = self
            .description
            .material(material)
            .and_then(|m| m.colors.get(channel.name()))
        {
            return Rgba(*c);
        }
        if *channel == BakeChannel::Diffuse {
            return name_color(material);
        }
        Rgba(channel.fallback_rgba().map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8))
    }
}

impl SceneHost for MemoryScene {
    type Object = String;
    type Material = String;
    type Surface = MemorySurface;

    fn is_mesh_object(&self, object: &String) -> bool {
        self.description.object(object).is_some_and(|o| o.mesh)
    }

    fn material_slots(&self, object: &String) -> HostResult<Vec<Option<String>>> {
        Ok(self.object(object)?.slots.clone())
    }

    fn validate_material(&self, material: &String) -> HostResult<()> {
        match self.description.material(material) {
            Some(m) if !m.bakeable => Err(format!("material {material:?} is not bakeable").into()),
            _ => Ok(()),
        }
    }

    fn isolate_by_material(
        &mut self,
        objects: &[String],
    ) -> HostResult<Vec<IsolatedSurface<String, String, MemorySurface>>> {
        self.check(HostCall::Isolate)?;
        let mut out = Vec::new();
        for name in objects {
            let object = self.object(name)?;
            let mut by_material: Vec<(String, Vec<Polygon>)> = Vec::new();
            for polygon in &object.polygons {
                let Some(Some(material)) = object.slots.get(polygon.slot) else {
                    continue;
                };
                match by_material.iter_mut().find(|(m, _)| m == material) {
                    Some((_, polys)) => polys.push(polygon.clone()),
                    None => by_material.push((material.clone(), vec![polygon.clone()])),
                }
            }
            for (material, polygons) in by_material {
                out.push(IsolatedSurface {
                    object: name.clone(),
                    material: material.clone(),
                    surface: MemorySurface {
                        object: name.clone(),
                        material,
                        polygons,
                    },
                });
            }
        }
        self.live_surfaces += out.len();
        debug!(surfaces = out.len(), "isolated surfaces");
        Ok(out)
    }

    fn surface_polygons(&self, surface: &MemorySurface) -> HostResult<Vec<Polygon>> {
        Ok(surface.polygons.clone())
    }

    fn release_surfaces(&mut self, surfaces: Vec<MemorySurface>) -> HostResult<()> {
        self.live_surfaces = self.live_surfaces.saturating_sub(surfaces.len());
        Ok(())
    }

    fn object_polygons(&self, object: &String) -> HostResult<Vec<Polygon>> {
        Ok(self.object(object)?.polygons.clone())
    }

    fn before_bake(
        &mut self,
        _layout: &AtlasLayout<String>,
        channel: &BakeChannel,
    ) -> HostResult<()> {
        self.events.push(BakeEvent::Before(channel.name().to_string()));
        Ok(())
    }

    fn render_channel(
        &mut self,
        layout: &AtlasLayout<String>,
        channel: &BakeChannel,
    ) -> HostResult<()> {
        self.check(HostCall::Render)?;
        self.events.push(BakeEvent::Render(channel.name().to_string()));
        if self.render_previews {
            let image =
                render_layout_preview(layout, |m| self.channel_color(m, channel), self.outlines);
            self.previews.push((channel.clone(), image));
        }
        Ok(())
    }

    fn after_bake(
        &mut self,
        _layout: &AtlasLayout<String>,
        channel: &BakeChannel,
    ) -> HostResult<()> {
        self.events.push(BakeEvent::After(channel.name().to_string()));
        Ok(())
    }

    fn write_back(
        &mut self,
        object: &String,
        polygons: Vec<Polygon>,
        slots: Vec<Option<String>>,
    ) -> HostResult<()> {
        self.check(HostCall::WriteBack)?;
        let target = self
            .description
            .objects
            .iter_mut()
            .find(|o| &o.name == object)
            .ok_or_else(|| format!("unknown object {object:?}"))?;
        target.polygons = polygons;
        target.slots = slots;
        Ok(())
    }
}

/// Policy answering from the material table of a scene.
#[derive(Debug, Clone, Default)]
pub struct ScenePolicy {
    materials: HashMap<String, SceneMaterial>,
}

impl ScenePolicy {
    pub fn new(materials: &[SceneMaterial]) -> Self {
        Self {
            materials: materials
                .iter()
                .map(|m| (m.name.clone(), m.clone()))
                .collect(),
        }
    }
}

impl AtlasPolicy<String, String> for ScenePolicy {
    fn target_material(&self, _object: &String, material: &String) -> Option<String> {
        self.materials.get(material).and_then(|m| m.target.clone())
    }

    fn island_mode(&self, _object: &String, material: &String) -> IslandMode {
        self.materials
            .get(material)
            .map(|m| m.island_mode)
            .unwrap_or_default()
    }

    fn epsilon(&self, _object: &String, material: &String) -> Option<f64> {
        self.materials.get(material).and_then(|m| m.epsilon)
    }

    fn material_size(&self, material: &String) -> HostResult<Option<(f64, f64)>> {
        Ok(self.materials.get(material).and_then(|m| m.size))
    }

    fn priority_scale(&self, material: &String) -> f64 {
        self.materials.get(material).map_or(1.0, |m| m.priority)
    }
}
