use crate::config::AtlasConfig;
use crate::error::{AtlasError, Result};
use crate::host::{AtlasPolicy, IsolatedSurface, SceneHost};
use crate::island::IslandMerger;
use crate::layout::AtlasLayout;
use crate::model::AtlasStats;
use crate::packer::{AtlasPacker, GridPacker, PackReport, PackingBox, RectPacker};
use crate::remap::{SlotRemap, remap_polygons};
use crate::reporter::{ProgressObserver, ProgressReporter};
use crate::transform::UvTransform;
use glam::DVec2;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Steps of an atlas build, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SelectMaterials,
    ResolveSizes,
    Isolate,
    DiscardUnassigned,
    GroupByMaterial,
    DiscoverIslands,
    MaterializeTransforms,
    Pack,
    Bake,
    Remap,
}

impl Stage {
    pub const ALL: [Stage; 10] = [
        Stage::SelectMaterials,
        Stage::ResolveSizes,
        Stage::Isolate,
        Stage::DiscardUnassigned,
        Stage::GroupByMaterial,
        Stage::DiscoverIslands,
        Stage::MaterializeTransforms,
        Stage::Pack,
        Stage::Bake,
        Stage::Remap,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::SelectMaterials => "select materials",
            Stage::ResolveSizes => "resolve material sizes",
            Stage::Isolate => "isolate surfaces",
            Stage::DiscardUnassigned => "discard unassigned surfaces",
            Stage::GroupByMaterial => "group by material",
            Stage::DiscoverIslands => "discover islands",
            Stage::MaterializeTransforms => "materialize transforms",
            Stage::Pack => "pack",
            Stage::Bake => "bake",
            Stage::Remap => "remap",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Back-reference stored in island payloads: which surface copy and polygon a patch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRef {
    /// Index into the isolated surfaces of the run.
    pub surface: usize,
    /// Polygon of that surface, None for a whole-surface patch.
    pub polygon: Option<usize>,
}

/// Everything the pipeline tracks for one source material.
#[derive(Debug, Clone)]
pub struct MaterialAtlasEntry<M> {
    pub material: M,
    /// Nominal pixel size used as the material's pixel space.
    pub size: DVec2,
    pub islands: IslandMerger<PatchRef>,
    pub transforms: Vec<UvTransform<M>>,
    /// Summed polygon area in pixels, collected only when the importance factor is enabled.
    pub polygon_area: f64,
}

impl<M> MaterialAtlasEntry<M> {
    pub fn new(material: M) -> Self {
        Self {
            material,
            size: DVec2::ZERO,
            islands: IslandMerger::new(),
            transforms: Vec::new(),
            polygon_area: 0.0,
        }
    }

    pub fn island_area(&self) -> f64 {
        self.islands.islands().iter().filter_map(|i| i.area()).sum()
    }
}

/// Scale-up for a material whose polygons cover `polygon_area` of `island_area`.
///
/// Tightly filled islands keep their size, gappy ones (fill ratio down to 0.05) are scaled
/// by `fill_ratio^(-exponent)`.
pub fn importance_factor(polygon_area: f64, island_area: f64, exponent: f64) -> f64 {
    if !(island_area.is_finite() && island_area > 0.0 && polygon_area.is_finite()) {
        return 1.0;
    }
    let fill = (polygon_area / island_area).clamp(0.05, 1.0);
    fill.powf(-exponent)
}

/// Result of a finished atlas build.
#[derive(Debug, Clone, Serialize)]
pub struct AtlasOutcome<M> {
    pub layout: AtlasLayout<M>,
    pub transforms: Vec<UvTransform<M>>,
    pub pack: PackReport,
    pub stats: AtlasStats,
}

type Isolated<H> = IsolatedSurface<
    <H as SceneHost>::Object,
    <H as SceneHost>::Material,
    <H as SceneHost>::Surface,
>;

fn pair_epsilon<O: fmt::Debug, M: fmt::Debug, P: AtlasPolicy<O, M>>(
    policy: &P,
    config: &AtlasConfig,
    object: &O,
    material: &M,
) -> f64 {
    match policy.epsilon(object, material) {
        Some(eps) if eps.is_finite() && eps >= 0.0 => eps,
        Some(eps) => {
            warn!(?object, ?material, eps, "invalid epsilon, using default");
            config.default_epsilon
        }
        None => config.default_epsilon,
    }
}

/// Drives one atlas build against a scene host.
///
/// Stages run strictly in order; see [`Stage`]. The host is borrowed mutably for the
/// whole run.
pub struct AtlasBuildPipeline<'a, H: SceneHost, P> {
    host: &'a mut H,
    policy: &'a P,
    config: AtlasConfig,
    objects: Vec<H::Object>,
    packer: Box<dyn RectPacker + 'a>,
    observer: Option<Box<dyn ProgressObserver + 'a>>,
    reporter: ProgressReporter,
    targets: HashMap<(H::Object, H::Material), H::Material>,
    entries: Vec<MaterialAtlasEntry<H::Material>>,
    index: HashMap<H::Material, usize>,
    stats: AtlasStats,
}

impl<'a, H, P> AtlasBuildPipeline<'a, H, P>
where
    H: SceneHost,
    P: AtlasPolicy<H::Object, H::Material>,
{
    pub fn new(
        host: &'a mut H,
        policy: &'a P,
        config: AtlasConfig,
        objects: Vec<H::Object>,
    ) -> Result<Self> {
        config.validate()?;
        let packer = Box::new(GridPacker::from_config(&config));
        let reporter = ProgressReporter::new(config.report_interval_secs);
        Ok(Self {
            host,
            policy,
            config,
            objects,
            packer,
            observer: None,
            reporter,
            targets: HashMap::new(),
            entries: Vec::new(),
            index: HashMap::new(),
            stats: AtlasStats::default(),
        })
    }

    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver + 'a>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replaces the default [`GridPacker`] primitive.
    pub fn with_packer(mut self, packer: Box<dyn RectPacker + 'a>) -> Self {
        self.packer = packer;
        self
    }

    /// Runs every stage: builds the layout, bakes all configured channels and remaps the objects.
    #[instrument(skip_all)]
    pub fn run(self) -> Result<AtlasOutcome<H::Material>> {
        self.execute(true)
    }

    /// Runs the stages up to packing and returns the layout without baking or remapping.
    #[instrument(skip_all)]
    pub fn plan(self) -> Result<AtlasOutcome<H::Material>> {
        self.execute(false)
    }

    fn execute(mut self, apply: bool) -> Result<AtlasOutcome<H::Material>> {
        let started = Instant::now();

        self.enter(Stage::SelectMaterials);
        let meshes = self.select()?;
        info!(
            objects = meshes.len(),
            materials = self.entries.len(),
            pairs = self.targets.len(),
            "selected materials"
        );

        self.enter(Stage::ResolveSizes);
        self.resolve_sizes();

        self.enter(Stage::Isolate);
        let surfaces = self.host.isolate_by_material(&meshes).map_err(|e| {
            AtlasError::external(Stage::Isolate, format!("{} objects", meshes.len()), e)
        })?;
        info!(surfaces = surfaces.len(), "isolated surfaces");

        self.enter(Stage::DiscardUnassigned);
        let kept = self.discard_unassigned(surfaces)?;

        self.enter(Stage::GroupByMaterial);
        let groups = self.group(&kept);

        self.enter(Stage::DiscoverIslands);
        let discovered = self.discover(&kept, &groups);
        let released = self
            .host
            .release_surfaces(kept.into_iter().map(|s| s.surface).collect());
        discovered?;
        released.map_err(|e| AtlasError::external(Stage::DiscoverIslands, "surface copies", e))?;
        self.stats.merges = self.entries.iter().map(|e| e.islands.merges()).sum();
        self.stats.rejected_patches = self.entries.iter().map(|e| e.islands.rejected()).sum();
        info!(
            islands = self.entries.iter().map(|e| e.islands.len()).sum::<usize>(),
            merges = self.stats.merges,
            rejected = self.stats.rejected_patches,
            "discovered islands"
        );

        self.enter(Stage::MaterializeTransforms);
        self.materialize()?;

        self.enter(Stage::Pack);
        let pack = self.pack()?;
        info!(score = pack.score, rounds = pack.rounds.len(), "packed islands");

        let transforms: Vec<UvTransform<H::Material>> = self
            .entries
            .iter()
            .flat_map(|e| e.transforms.iter().cloned())
            .collect();
        let layout = AtlasLayout::from_transforms(
            self.config.atlas_width,
            self.config.atlas_height,
            &transforms,
        );

        if apply {
            self.enter(Stage::Bake);
            self.bake(&layout)?;

            self.enter(Stage::Remap);
            self.stats.remapped_polygons = self.remap(&meshes)?;
        }

        self.stats.objects = meshes.len();
        self.stats.materials = self.entries.len();
        self.stats.islands = transforms.len();
        self.stats.rounds = pack.rounds.len();
        self.stats.score = pack.score;
        self.stats.occupancy = layout.occupancy();
        info!(
            elapsed = ?started.elapsed(),
            "atlas build finished. {}",
            self.stats.summary()
        );
        if let Some(observer) = self.observer.as_mut() {
            observer.on_finish();
        }
        Ok(AtlasOutcome {
            layout,
            transforms,
            pack,
            stats: self.stats,
        })
    }

    fn enter(&mut self, stage: Stage) {
        info!(%stage, "stage started");
        if let Some(observer) = self.observer.as_mut() {
            observer.on_stage(stage);
        }
    }

    fn progress(&mut self, stage: Stage, done: usize, total: usize) {
        self.reporter.tick(stage, done, total, done == total);
        if let Some(observer) = self.observer.as_mut() {
            observer.on_progress(stage, done, total);
        }
    }

    fn select(&mut self) -> Result<Vec<H::Object>> {
        let mut meshes = Vec::new();
        let mut seen = HashSet::new();
        for object in &self.objects {
            if !self.host.is_mesh_object(object) {
                warn!(?object, "skipping object without a mesh");
                continue;
            }
            if seen.insert(object.clone()) {
                meshes.push(object.clone());
            }
        }
        if meshes.is_empty() {
            return Err(AtlasError::Empty("no mesh objects selected".into())
                .in_stage(Stage::SelectMaterials, format!("{} objects", self.objects.len())));
        }

        let mut validated: HashSet<H::Material> = HashSet::new();
        let mut rejected: HashSet<H::Material> = HashSet::new();
        for object in &meshes {
            let slots = self.host.material_slots(object).map_err(|e| {
                AtlasError::external(Stage::SelectMaterials, format!("{object:?}"), e)
            })?;
            for (slot, material) in slots.into_iter().enumerate() {
                let Some(material) = material else {
                    warn!(?object, slot, "skipping empty material slot");
                    continue;
                };
                if rejected.contains(&material) {
                    continue;
                }
                let Some(target) = self.policy.target_material(object, &material) else {
                    debug!(?object, ?material, "no atlas target, pair left untouched");
                    continue;
                };
                if !validated.contains(&material) {
                    if let Err(e) = self.host.validate_material(&material) {
                        warn!(?material, error = %e, "material cannot be baked, excluding it");
                        rejected.insert(material);
                        continue;
                    }
                    validated.insert(material.clone());
                }
                if !self.index.contains_key(&material) {
                    self.index.insert(material.clone(), self.entries.len());
                    self.entries.push(MaterialAtlasEntry::new(material.clone()));
                }
                self.targets.insert((object.clone(), material), target);
            }
        }
        if self.targets.is_empty() {
            return Err(AtlasError::Empty("no material resolves to an atlas target".into())
                .in_stage(Stage::SelectMaterials, format!("{} objects", meshes.len())));
        }
        Ok(meshes)
    }

    fn resolve_sizes(&mut self) {
        let fallback = DVec2::from(self.config.default_material_size);
        for entry in &mut self.entries {
            let material = &entry.material;
            entry.size = match self.policy.material_size(material) {
                Ok(Some((w, h))) if w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0 => {
                    DVec2::new(w, h)
                }
                Ok(Some((w, h))) => {
                    warn!(?material, w, h, "invalid material size, using default");
                    fallback
                }
                Ok(None) => {
                    warn!(?material, "material size unknown, using default");
                    fallback
                }
                Err(e) => {
                    warn!(?material, error = %e, "failed to resolve material size, using default");
                    fallback
                }
            };
            debug!(?material, size = %entry.size, "resolved material size");
        }
    }

    fn discard_unassigned(&mut self, surfaces: Vec<Isolated<H>>) -> Result<Vec<Isolated<H>>> {
        let (kept, dropped): (Vec<_>, Vec<_>) = surfaces.into_iter().partition(|s| {
            self.targets
                .contains_key(&(s.object.clone(), s.material.clone()))
        });
        if dropped.is_empty() {
            return Ok(kept);
        }
        debug!(dropped = dropped.len(), kept = kept.len(), "releasing unassigned surfaces");
        if let Err(e) = self
            .host
            .release_surfaces(dropped.into_iter().map(|s| s.surface).collect())
        {
            if let Err(cleanup) = self
                .host
                .release_surfaces(kept.into_iter().map(|s| s.surface).collect())
            {
                warn!(error = %cleanup, "failed to release surface copies");
            }
            return Err(AtlasError::external(
                Stage::DiscardUnassigned,
                "unassigned surface copies",
                e,
            ));
        }
        Ok(kept)
    }

    fn group(&self, kept: &[Isolated<H>]) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.entries.len()];
        for (i, surface) in kept.iter().enumerate() {
            if let Some(&e) = self.index.get(&surface.material) {
                groups[e].push(i);
            }
        }
        for (entry, members) in self.entries.iter().zip(&groups) {
            if members.is_empty() {
                warn!(material = ?entry.material, "no surfaces isolated for material");
            } else {
                debug!(material = ?entry.material, surfaces = members.len(), "grouped surfaces");
            }
        }
        groups
    }

    fn discover(&mut self, kept: &[Isolated<H>], groups: &[Vec<usize>]) -> Result<()> {
        let total: usize = groups.iter().map(Vec::len).sum();
        self.reporter.restart(total);
        let mut done = 0;
        for (e, members) in groups.iter().enumerate() {
            for &s in members {
                let isolated = &kept[s];
                let context = || format!("{:?} / {:?}", isolated.object, isolated.material);
                let mode = self.policy.island_mode(&isolated.object, &isolated.material);
                let eps =
                    pair_epsilon(self.policy, &self.config, &isolated.object, &isolated.material);
                let host: &H = self.host;
                let entry = &mut self.entries[e];
                let size = entry.size;
                let patches = host
                    .iterate_uv_patches(&isolated.surface, mode, self.config.sort_patches_by_area)
                    .map_err(|err| AtlasError::external(Stage::DiscoverIslands, context(), err))?;
                for patch in patches {
                    let points = patch.points.iter().map(|p| *p * size);
                    entry.islands.add_sequence(
                        points,
                        eps,
                        PatchRef {
                            surface: s,
                            polygon: patch.polygon,
                        },
                    );
                }
                if self.config.area_importance.is_some() {
                    let polygons = host
                        .surface_polygons(&isolated.surface)
                        .map_err(|err| {
                            AtlasError::external(Stage::DiscoverIslands, context(), err)
                        })?;
                    let area: f64 = polygons.iter().map(|p| p.uv_area()).sum();
                    entry.polygon_area += area * size.x * size.y;
                }
                done += 1;
                self.progress(Stage::DiscoverIslands, done, total);
            }
        }
        Ok(())
    }

    fn materialize(&mut self) -> Result<()> {
        let atlas_size = self.config.atlas_size();
        let padding = self.config.padding;
        let area_importance = self.config.area_importance;
        for entry in &mut self.entries {
            let material = &entry.material;
            let priority = match self.policy.priority_scale(material) {
                s if s.is_finite() && s > 0.0 => s,
                s => {
                    warn!(?material, scale = s, "invalid priority scale, using 1");
                    1.0
                }
            };
            let importance = match area_importance {
                Some(k) => importance_factor(entry.polygon_area, entry.island_area(), k),
                None => 1.0,
            };
            let scale = priority * importance;
            debug!(
                ?material,
                priority,
                importance,
                islands = entry.islands.len(),
                "materializing transforms"
            );
            let transforms = entry
                .islands
                .islands()
                .iter()
                .map(|island| match (island.min(), island.max()) {
                    (Some(min), Some(max)) => UvTransform::from_island_bounds(
                        material.clone(),
                        min,
                        max,
                        entry.size,
                        padding,
                        atlas_size,
                        scale,
                    ),
                    _ => Err(AtlasError::InvalidIsland("island has no bounds".into())),
                })
                .collect::<Result<Vec<_>>>()
                .map_err(|e| e.in_stage(Stage::MaterializeTransforms, format!("{material:?}")))?;
            entry.transforms = transforms;
        }
        Ok(())
    }

    fn pack(&mut self) -> Result<PackReport> {
        let mut boxes: Vec<PackingBox<(usize, usize)>> = self
            .entries
            .iter()
            .enumerate()
            .flat_map(|(e, entry)| {
                entry
                    .transforms
                    .iter()
                    .enumerate()
                    .map(move |(t, transform)| PackingBox::new(transform.packed, (e, t)))
            })
            .collect();
        let count = boxes.len();
        let mut packer = AtlasPacker::new(&mut self.packer, self.config.rounds, self.config.seed);
        let report = packer
            .pack(&mut boxes)
            .map_err(|e| e.in_stage(Stage::Pack, format!("{count} islands")))?;
        for b in boxes {
            let (e, t) = b.reference;
            let best = b.best.ok_or_else(|| {
                AtlasError::InvalidPlacement(format!("island {t} of material #{e} was not placed"))
                    .in_stage(Stage::Pack, format!("{count} islands"))
            })?;
            self.entries[e].transforms[t].set_packed(best);
        }
        Ok(report)
    }

    fn bake(&mut self, layout: &AtlasLayout<H::Material>) -> Result<()> {
        let channels = self.config.channels.clone();
        if channels.is_empty() {
            info!("no bake channels configured");
            return Ok(());
        }
        self.reporter.restart(channels.len());
        for (i, channel) in channels.iter().enumerate() {
            info!(
                %channel,
                pass = ?channel.render_pass(),
                quads = layout.quads.len(),
                "baking channel"
            );
            let context = || format!("channel {channel}");
            self.host
                .before_bake(layout, channel)
                .map_err(|e| AtlasError::external(Stage::Bake, context(), e))?;
            let rendered = self.host.render_channel(layout, channel);
            let restored = self.host.after_bake(layout, channel);
            rendered.map_err(|e| AtlasError::external(Stage::Bake, context(), e))?;
            restored.map_err(|e| AtlasError::external(Stage::Bake, context(), e))?;
            self.progress(Stage::Bake, i + 1, channels.len());
        }
        Ok(())
    }

    fn remap(&mut self, meshes: &[H::Object]) -> Result<usize> {
        self.reporter.restart(meshes.len());
        let mut remapped = 0;
        for (i, object) in meshes.iter().enumerate() {
            let context = || format!("{object:?}");
            let mut slots = self
                .host
                .material_slots(object)
                .map_err(|e| AtlasError::external(Stage::Remap, context(), e))?;
            let mut plan = Vec::new();
            for (slot, material) in slots.iter().enumerate() {
                let Some(material) = material else { continue };
                let Some(target) = self.targets.get(&(object.clone(), material.clone())) else {
                    continue;
                };
                let Some(&e) = self.index.get(material) else {
                    continue;
                };
                let entry = &self.entries[e];
                if entry.transforms.is_empty() {
                    continue;
                }
                let eps = pair_epsilon(self.policy, &self.config, object, material);
                plan.push(SlotRemap {
                    slot,
                    transforms: &entry.transforms,
                    eps: DVec2::splat(eps) / entry.size / 2.0,
                    target: target.clone(),
                });
            }
            if !plan.is_empty() {
                let mut polygons = self
                    .host
                    .object_polygons(object)
                    .map_err(|e| AtlasError::external(Stage::Remap, context(), e))?;
                let n = remap_polygons(&mut polygons, &mut slots, &plan)
                    .map_err(|e| e.in_stage(Stage::Remap, context()))?;
                drop(plan);
                self.host
                    .write_back(object, polygons, slots)
                    .map_err(|e| AtlasError::external(Stage::Remap, context(), e))?;
                debug!(?object, polygons = n, "remapped object");
                remapped += n;
            }
            self.progress(Stage::Remap, i + 1, meshes.len());
        }
        Ok(remapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_scales_gappy_islands_up() {
        assert_eq!(importance_factor(100.0, 100.0, 1.0), 1.0);
        assert!((importance_factor(25.0, 100.0, 1.0) - 4.0).abs() < 1e-12);
        assert!((importance_factor(25.0, 100.0, 0.5) - 2.0).abs() < 1e-12);
        // clamped fill ratio
        assert!((importance_factor(0.0, 100.0, 1.0) - 20.0).abs() < 1e-9);
        assert_eq!(importance_factor(10.0, 0.0, 1.0), 1.0);
    }

    #[test]
    fn stages_are_listed_in_order() {
        assert_eq!(Stage::ALL.first(), Some(&Stage::SelectMaterials));
        assert_eq!(Stage::ALL.last(), Some(&Stage::Remap));
        assert_eq!(Stage::Pack.to_string(), "pack");
    }
}
