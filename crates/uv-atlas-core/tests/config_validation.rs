use uv_atlas_core::prelude::*;

fn rejected(cfg: AtlasConfig) -> bool {
    matches!(cfg.validate(), Err(AtlasError::InvalidConfig(_)))
}

#[test]
fn defaults_are_valid() {
    let cfg = AtlasConfig::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.padding, 4.0);
    assert_eq!(cfg.rounds, 15);
    assert_eq!(cfg.default_material_size, (16.0, 16.0));
    assert_eq!(cfg.algorithm, PackingAlgorithm::MaxRects);
    assert!(cfg.seed.is_none());
}

#[test]
fn out_of_range_values_are_rejected() {
    assert!(rejected(AtlasConfig::builder().padding(0.0).build()));
    assert!(rejected(AtlasConfig::builder().padding(f64::NAN).build()));
    assert!(rejected(AtlasConfig::builder().with_atlas_dimensions(0, 512).build()));
    assert!(rejected(AtlasConfig::builder().default_material_size(16.0, 0.0).build()));
    assert!(rejected(AtlasConfig::builder().default_epsilon(-1.0).build()));
    assert!(rejected(AtlasConfig::builder().rounds(0).build()));
    assert!(rejected(AtlasConfig::builder().grid_resolution(4).build()));
    assert!(rejected(AtlasConfig::builder().grow_factor(1.0).build()));
    assert!(rejected(AtlasConfig::builder().area_importance(Some(-0.5)).build()));
    assert!(rejected(AtlasConfig::builder().report_interval_secs(-1.0).build()));
}

#[test]
fn zero_epsilon_and_importance_are_allowed() {
    AtlasConfig::builder()
        .default_epsilon(0.0)
        .area_importance(Some(0.0))
        .report_interval_secs(0.0)
        .build()
        .validate()
        .unwrap();
}

#[test]
fn malformed_aov_channel_is_rejected() {
    let bad = AovSpec {
        name: "roughness".into(),
        kind: AovKind::Value,
        default: AovDefault::Value(0.0),
    };
    assert!(rejected(AtlasConfig::builder().channel(BakeChannel::Aov(bad)).build()));
    let good = AovSpec::new("cavity", AovKind::Value, AovDefault::Value(0.5)).unwrap();
    AtlasConfig::builder()
        .channel(BakeChannel::Diffuse)
        .channel(BakeChannel::Aov(good))
        .build()
        .validate()
        .unwrap();
}

#[test]
fn json_fills_missing_fields_with_defaults() {
    let cfg: AtlasConfig = serde_json::from_str(
        r#"{
            "atlas_width": 2048,
            "rounds": 4,
            "seed": 9,
            "algorithm": "skyline",
            "skyline_heuristic": "minwaste",
            "channels": ["diffuse", "normal", {"aov": {"name": "ao", "kind": "value", "default": 1.0}}]
        }"#,
    )
    .unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.atlas_width, 2048);
    assert_eq!(cfg.atlas_height, 1024);
    assert_eq!(cfg.rounds, 4);
    assert_eq!(cfg.seed, Some(9));
    assert_eq!(cfg.algorithm, PackingAlgorithm::Skyline);
    assert_eq!(cfg.skyline_heuristic, SkylineHeuristic::MinWaste);
    assert_eq!(cfg.padding, 4.0);
    assert_eq!(cfg.channels.len(), 3);
    assert_eq!(cfg.channels[2].name(), "ao");

    let back: AtlasConfig = serde_json::from_str(&serde_json::to_string(&cfg).unwrap()).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn enum_names_parse_from_cli_strings() {
    assert_eq!("maxrects".parse(), Ok(PackingAlgorithm::MaxRects));
    assert_eq!("BSSF".parse(), Ok(MaxRectsHeuristic::BestShortSideFit));
    assert_eq!("mw".parse(), Ok(SkylineHeuristic::MinWaste));
    assert_eq!("object".parse(), Ok(IslandMode::WholeObject));
    assert_eq!("emission".parse(), Ok(BakeChannel::Emit));
    assert_eq!("guillotine".parse::<PackingAlgorithm>(), Err(()));
}
