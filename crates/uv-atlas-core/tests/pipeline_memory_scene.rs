use glam::DVec2;
use uv_atlas_core::prelude::*;
use uv_atlas_core::host::IsolatedSurface;
use uv_atlas_core::scene::{BakeEvent, HostCall, MemorySurface, SceneMaterial, SceneObject};

fn quad(slot: usize, x: f64, y: f64, side: f64) -> Polygon {
    Polygon::new(
        slot,
        vec![
            DVec2::new(x, y),
            DVec2::new(x + side, y),
            DVec2::new(x + side, y + side),
            DVec2::new(x, y + side),
        ],
    )
}

fn material(name: &str, size: Option<(f64, f64)>, target: Option<&str>) -> SceneMaterial {
    SceneMaterial {
        size,
        target: target.map(str::to_string),
        ..SceneMaterial::new(name)
    }
}

fn scene() -> SceneDescription {
    SceneDescription {
        objects: vec![
            SceneObject {
                name: "body".into(),
                mesh: true,
                slots: vec![Some("skin".into()), Some("cloth".into()), Some("glass".into())],
                polygons: vec![
                    quad(0, 0.0, 0.0, 0.2),
                    quad(0, 0.6, 0.6, 0.2),
                    Polygon::new(
                        0,
                        vec![DVec2::new(0.05, 0.05), DVec2::new(0.15, 0.05), DVec2::new(0.1, 0.15)],
                    ),
                    quad(1, 0.3, 0.3, 0.4),
                    quad(2, 0.0, 0.0, 1.0),
                ],
            },
            SceneObject {
                name: "prop".into(),
                mesh: true,
                slots: vec![Some("skin".into()), None],
                polygons: vec![quad(0, 0.1, 0.1, 0.05)],
            },
            SceneObject {
                name: "lamp".into(),
                mesh: false,
                slots: vec![],
                polygons: vec![],
            },
        ],
        materials: vec![
            material("skin", Some((64.0, 64.0)), Some("atlas")),
            material("cloth", Some((32.0, 32.0)), Some("atlas")),
            material("glass", Some((16.0, 16.0)), None),
        ],
    }
}

fn config() -> AtlasConfig {
    AtlasConfig::builder()
        .with_atlas_dimensions(256, 256)
        .rounds(6)
        .seed(Some(42))
        .grid_resolution(64)
        .channel(BakeChannel::Diffuse)
        .channel(BakeChannel::Normal)
        .build()
}

fn run(scene: &mut MemoryScene, cfg: AtlasConfig) -> uv_atlas_core::Result<AtlasOutcome<String>> {
    let policy = scene.policy();
    let objects = scene.object_names();
    AtlasBuildPipeline::new(scene, &policy, cfg, objects)?.run()
}

#[test]
fn builds_bakes_and_remaps_a_scene() {
    let original = scene();
    let mut host = MemoryScene::new(original.clone()).with_previews(true);
    let outcome = run(&mut host, config()).unwrap();

    assert_eq!(outcome.stats.objects, 2);
    assert_eq!(outcome.stats.materials, 2);
    assert_eq!(outcome.stats.islands, 3);
    assert_eq!(outcome.stats.remapped_polygons, 5);
    assert!(outcome.stats.merges >= 2);
    assert_eq!(host.live_surfaces(), 0);

    let quads: Vec<Rect> = outcome.layout.quads.iter().map(|q| q.target).collect();
    for (i, a) in quads.iter().enumerate() {
        assert!(a.x >= 0.0 && a.y >= 0.0 && a.max().x <= 1.0 + 1e-9 && a.max().y <= 1.0 + 1e-9);
        for b in &quads[i + 1..] {
            assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
        }
    }

    assert_eq!(
        host.events(),
        &[
            BakeEvent::Before("diffuse".into()),
            BakeEvent::Render("diffuse".into()),
            BakeEvent::After("diffuse".into()),
            BakeEvent::Before("normal".into()),
            BakeEvent::Render("normal".into()),
            BakeEvent::After("normal".into()),
        ]
    );
    assert_eq!(host.previews().len(), 2);
    assert_eq!(host.previews()[0].1.dimensions(), (256, 256));

    let body = host.description().object("body").unwrap();
    assert_eq!(
        body.slots,
        vec![Some("atlas".to_string()), Some("atlas".to_string()), Some("glass".to_string())]
    );
    let prop = host.description().object("prop").unwrap();
    assert_eq!(prop.slots, vec![Some("atlas".to_string()), None]);
    // glass has no target and keeps its UVs
    assert_eq!(body.polygons[4], original.objects[0].polygons[4]);
}

#[test]
fn every_remapped_polygon_matches_exactly_one_transform() {
    let original = scene();
    let mut host = MemoryScene::new(original.clone());
    let outcome = run(&mut host, config()).unwrap();

    for object in &original.objects {
        let after = host.description().object(&object.name).unwrap();
        for (before, remapped) in object.polygons.iter().zip(&after.polygons) {
            let Some(Some(mat)) = object.slots.get(before.slot) else {
                continue;
            };
            if mat == "glass" {
                continue;
            }
            let size = original.material(mat).and_then(|m| m.size).unwrap();
            let eps = DVec2::splat(1.0) / DVec2::from(size) / 2.0;
            let mean = before.mean_uv().unwrap();
            let matching: Vec<_> = outcome
                .transforms
                .iter()
                .filter(|t| &t.material == mat && t.is_match(mean, eps.x, eps.y))
                .collect();
            assert_eq!(matching.len(), 1, "{} polygon at {mean}", object.name);
            let t = matching[0];
            for (old, new) in before.uvs.iter().zip(&remapped.uvs) {
                assert!((t.apply(*old) - *new).length() < 1e-12);
                assert!(t.packed.contains_point(*new, DVec2::splat(1e-9)));
            }
        }
    }
}

#[test]
fn same_seed_gives_the_same_layout() {
    let mut a = MemoryScene::new(scene());
    let mut b = MemoryScene::new(scene());
    let first = run(&mut a, config()).unwrap();
    let second = run(&mut b, config()).unwrap();
    assert_eq!(first.layout, second.layout);
    assert_eq!(first.pack, second.pack);
    assert_eq!(a.description(), b.description());
}

#[test]
fn plan_does_not_touch_the_scene() {
    let original = scene();
    let mut host = MemoryScene::new(original.clone());
    let policy = host.policy();
    let objects = host.object_names();
    let outcome = AtlasBuildPipeline::new(&mut host, &policy, config(), objects)
        .unwrap()
        .plan()
        .unwrap();
    assert_eq!(outcome.layout.quads.len(), 3);
    assert_eq!(outcome.stats.remapped_polygons, 0);
    assert!(host.events().is_empty());
    assert_eq!(host.description(), &original);
    assert_eq!(host.live_surfaces(), 0);
}

#[test]
fn whole_object_mode_makes_one_island_per_surface() {
    let mut desc = scene();
    desc.materials[0].island_mode = IslandMode::WholeObject;
    let mut host = MemoryScene::new(desc);
    let outcome = run(&mut host, config()).unwrap();
    // skin: body and prop surfaces overlap and merge into one, cloth: one
    assert_eq!(outcome.stats.islands, 2);
}

#[test]
fn missing_size_and_unbakeable_material_are_skipped_per_material() {
    let mut desc = scene();
    desc.materials[0].size = None;
    desc.materials[1].bakeable = false;
    let mut host = MemoryScene::new(desc);
    let outcome = run(&mut host, config()).unwrap();
    assert_eq!(outcome.stats.materials, 1);
    assert!(outcome.layout.quads.iter().all(|q| q.material == "skin"));
    let body = host.description().object("body").unwrap();
    assert_eq!(body.slots[1].as_deref(), Some("cloth"));
    assert_eq!(body.polygons[3], scene().objects[0].polygons[3]);
}

#[test]
fn nothing_to_atlas_is_a_configuration_error() {
    let mut desc = scene();
    for m in &mut desc.materials {
        m.target = None;
    }
    let mut host = MemoryScene::new(desc);
    let err = run(&mut host, config()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(matches!(err.root(), AtlasError::Empty(_)));
    assert!(matches!(
        err,
        AtlasError::Stage {
            stage: Stage::SelectMaterials,
            ..
        }
    ));
}

#[test]
fn no_mesh_objects_is_a_configuration_error() {
    let mut desc = scene();
    for o in &mut desc.objects {
        o.mesh = false;
    }
    let mut host = MemoryScene::new(desc);
    let err = run(&mut host, config()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let mut host = MemoryScene::new(scene());
    let cfg = AtlasConfig::builder().padding(0.0).build();
    let err = run(&mut host, cfg).unwrap_err();
    assert!(matches!(err, AtlasError::InvalidConfig(_)));
}

#[test]
fn isolation_failure_is_external_with_stage() {
    let mut host = MemoryScene::new(scene()).with_failure(HostCall::Isolate);
    let err = run(&mut host, config()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalCollaborator);
    assert!(matches!(
        err,
        AtlasError::External {
            stage: Stage::Isolate,
            ..
        }
    ));
}

#[test]
fn render_failure_still_runs_after_bake_hook() {
    let mut host = MemoryScene::new(scene()).with_failure(HostCall::Render);
    let err = run(&mut host, config()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalCollaborator);
    assert!(matches!(err, AtlasError::External { stage: Stage::Bake, .. }));
    assert_eq!(
        host.events(),
        &[
            BakeEvent::Before("diffuse".into()),
            BakeEvent::After("diffuse".into()),
        ]
    );
    // nothing was remapped
    assert_eq!(host.description(), &scene());
}

struct BrokenPacker;

impl RectPacker for BrokenPacker {
    fn pack(&mut self, sizes: &[DVec2]) -> uv_atlas_core::Result<Placements> {
        Ok(Placements {
            origins: vec![DVec2::ZERO; sizes.len()],
            extent: DVec2::splat(f64::NAN),
        })
    }
}

#[test]
fn packer_without_finite_score_aborts_the_run() {
    let mut host = MemoryScene::new(scene());
    let policy = host.policy();
    let objects = host.object_names();
    let err = AtlasBuildPipeline::new(&mut host, &policy, config(), objects)
        .unwrap()
        .with_packer(Box::new(BrokenPacker))
        .run()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeometryInconsistency);
    assert!(matches!(err.root(), AtlasError::NoFiniteScore { rounds: 6 }));
}

#[derive(Default)]
struct Recorder {
    stages: Vec<Stage>,
    finished: bool,
}

impl ProgressObserver for &mut Recorder {
    fn on_stage(&mut self, stage: Stage) {
        self.stages.push(stage);
    }
    fn on_finish(&mut self) {
        self.finished = true;
    }
}

#[test]
fn observer_sees_every_stage_in_order() {
    let mut recorder = Recorder::default();
    let mut host = MemoryScene::new(scene());
    let policy = host.policy();
    let objects = host.object_names();
    AtlasBuildPipeline::new(&mut host, &policy, config(), objects)
        .unwrap()
        .with_observer(Box::new(&mut recorder))
        .run()
        .unwrap();
    assert_eq!(recorder.stages, Stage::ALL.to_vec());
    assert!(recorder.finished);
}

#[test]
fn zero_epsilon_degenerate_polygon_remaps_onto_its_island() {
    let u = 0.6958328667684435;
    let desc = SceneDescription {
        objects: vec![SceneObject {
            name: "strip".into(),
            mesh: true,
            slots: vec![Some("m".into())],
            polygons: vec![
                quad(0, 0.1, 0.1, 0.2),
                Polygon::new(
                    0,
                    vec![
                        DVec2::new(u, 0.5),
                        DVec2::new(u, 0.6),
                        DVec2::new(u, 0.7),
                        DVec2::new(u, 0.6),
                    ],
                ),
            ],
        }],
        materials: vec![SceneMaterial {
            epsilon: Some(0.0),
            ..material("m", Some((7.0, 7.0)), Some("atlas"))
        }],
    };
    let mut host = MemoryScene::new(desc);
    let outcome = run(&mut host, config()).unwrap();
    assert_eq!(outcome.stats.islands, 2);
    assert_eq!(outcome.stats.remapped_polygons, 2);
    let strip = host.description().object("strip").unwrap();
    assert_eq!(strip.slots, vec![Some("atlas".to_string())]);
}

fn packed_widths(outcome: &AtlasOutcome<String>, material: &str) -> Vec<f64> {
    outcome
        .transforms
        .iter()
        .filter(|t| t.material == material)
        .map(|t| t.packed.w)
        .collect()
}

fn weighted_scene() -> SceneDescription {
    // same bounding box for all three: `b` only half covered, `c` doubled by priority
    SceneDescription {
        objects: vec![SceneObject {
            name: "crate".into(),
            mesh: true,
            slots: vec![Some("a".into()), Some("b".into()), Some("c".into())],
            polygons: vec![
                quad(0, 0.1, 0.1, 0.5),
                Polygon::new(
                    1,
                    vec![DVec2::new(0.1, 0.1), DVec2::new(0.6, 0.1), DVec2::new(0.1, 0.6)],
                ),
                quad(2, 0.1, 0.1, 0.5),
            ],
        }],
        materials: vec![
            material("a", Some((64.0, 64.0)), Some("atlas")),
            material("b", Some((64.0, 64.0)), Some("atlas")),
            SceneMaterial {
                priority: 2.0,
                ..material("c", Some((64.0, 64.0)), Some("atlas"))
            },
        ],
    }
}

#[test]
fn importance_and_priority_scale_packed_sizes() {
    let mut plain = MemoryScene::new(weighted_scene());
    let outcome = run(&mut plain, config()).unwrap();
    let (a, b, c) = (
        packed_widths(&outcome, "a"),
        packed_widths(&outcome, "b"),
        packed_widths(&outcome, "c"),
    );
    assert_eq!((a.len(), b.len(), c.len()), (1, 1, 1));
    assert!((b[0] / a[0] - 1.0).abs() < 1e-9);
    assert!((c[0] / a[0] - 2.0).abs() < 1e-9);

    let mut weighted = MemoryScene::new(weighted_scene());
    let cfg = AtlasConfig {
        area_importance: Some(1.0),
        ..config()
    };
    let outcome = run(&mut weighted, cfg).unwrap();
    let (a, b, c) = (
        packed_widths(&outcome, "a"),
        packed_widths(&outcome, "b"),
        packed_widths(&outcome, "c"),
    );
    // the triangle fills half its island
    assert!((b[0] / a[0] - 2.0).abs() < 1e-9, "{} vs {}", b[0], a[0]);
    assert!((c[0] / a[0] - 2.0).abs() < 1e-9);
    assert_eq!(outcome.stats.remapped_polygons, 3);
}

/// Host whose object geometry moved after isolation, so remap cannot find the islands.
struct DriftingScene {
    inner: MemoryScene,
}

impl SceneHost for DriftingScene {
    type Object = String;
    type Material = String;
    type Surface = MemorySurface;

    fn is_mesh_object(&self, object: &String) -> bool {
        self.inner.is_mesh_object(object)
    }

    fn material_slots(&self, object: &String) -> HostResult<Vec<Option<String>>> {
        self.inner.material_slots(object)
    }

    fn isolate_by_material(
        &mut self,
        objects: &[String],
    ) -> HostResult<Vec<IsolatedSurface<String, String, MemorySurface>>> {
        self.inner.isolate_by_material(objects)
    }

    fn surface_polygons(&self, surface: &MemorySurface) -> HostResult<Vec<Polygon>> {
        self.inner.surface_polygons(surface)
    }

    fn release_surfaces(&mut self, surfaces: Vec<MemorySurface>) -> HostResult<()> {
        self.inner.release_surfaces(surfaces)
    }

    fn object_polygons(&self, object: &String) -> HostResult<Vec<Polygon>> {
        let mut polygons = self.inner.object_polygons(object)?;
        for polygon in &mut polygons {
            for uv in &mut polygon.uvs {
                *uv += DVec2::splat(3.0);
            }
        }
        Ok(polygons)
    }

    fn render_channel(
        &mut self,
        layout: &AtlasLayout<String>,
        channel: &BakeChannel,
    ) -> HostResult<()> {
        self.inner.render_channel(layout, channel)
    }

    fn write_back(
        &mut self,
        object: &String,
        polygons: Vec<Polygon>,
        slots: Vec<Option<String>>,
    ) -> HostResult<()> {
        self.inner.write_back(object, polygons, slots)
    }
}

#[test]
fn unmatched_polygon_aborts_remap_without_writing() {
    let mut host = DriftingScene {
        inner: MemoryScene::new(scene()),
    };
    let policy = host.inner.policy();
    let objects = host.inner.object_names();
    let err = AtlasBuildPipeline::new(&mut host, &policy, config(), objects)
        .unwrap()
        .run()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeometryInconsistency);
    assert!(matches!(err, AtlasError::Stage { stage: Stage::Remap, .. }));
    assert!(matches!(err.root(), AtlasError::NoMatchingTransform { .. }));
    assert_eq!(host.inner.description(), &scene());
    assert_eq!(host.inner.live_surfaces(), 0);
}

#[test]
fn write_back_failure_is_external_at_remap() {
    let mut host = MemoryScene::new(scene()).with_failure(HostCall::WriteBack);
    let err = run(&mut host, config()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalCollaborator);
    assert!(matches!(err, AtlasError::External { stage: Stage::Remap, .. }));
    assert_eq!(host.events().len(), 6);
    assert_eq!(host.description(), &scene());
}
