use glam::DVec2;
use uv_atlas_core::config::{AtlasConfig, MaxRectsHeuristic, PackingAlgorithm, SkylineHeuristic};
use uv_atlas_core::model::Rect;
use uv_atlas_core::packer::{AtlasPacker, GridPacker, PackingBox, RectPacker};

fn disjoint(rects: &[Rect]) -> bool {
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            if rects[i].overlaps(&rects[j]) {
                return false;
            }
        }
    }
    true
}

fn random_sizes(seed: u64, n: usize) -> Vec<DVec2> {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| DVec2::new(rng.gen_range(0.001..0.2), rng.gen_range(0.001..0.2)))
        .collect()
}

fn all_primitives() -> Vec<GridPacker> {
    let mut out = Vec::new();
    for h in [
        MaxRectsHeuristic::BestAreaFit,
        MaxRectsHeuristic::BestShortSideFit,
        MaxRectsHeuristic::BestLongSideFit,
        MaxRectsHeuristic::BottomLeft,
        MaxRectsHeuristic::ContactPoint,
    ] {
        let cfg = AtlasConfig::builder()
            .algorithm(PackingAlgorithm::MaxRects)
            .mr_heuristic(h)
            .grid_resolution(128)
            .build();
        out.push(GridPacker::from_config(&cfg));
    }
    for h in [SkylineHeuristic::BottomLeft, SkylineHeuristic::MinWaste] {
        let cfg = AtlasConfig::builder()
            .algorithm(PackingAlgorithm::Skyline)
            .skyline_heuristic(h)
            .grid_resolution(128)
            .build();
        out.push(GridPacker::from_config(&cfg));
    }
    out
}

#[test]
fn every_primitive_places_all_sizes_without_overlap() {
    let sizes = random_sizes(42, 120);
    for mut packer in all_primitives() {
        let placements = packer.pack(&sizes).unwrap();
        assert_eq!(placements.origins.len(), sizes.len());
        let rects: Vec<Rect> = placements
            .origins
            .iter()
            .zip(&sizes)
            .map(|(o, s)| Rect::new(o.x, o.y, s.x, s.y))
            .collect();
        assert!(disjoint(&rects), "{:?} overlaps", packer.algorithm);
        for r in &rects {
            assert!(r.x >= 0.0 && r.y >= 0.0);
            assert!(r.max().x <= placements.extent.x + 1e-12);
            assert!(r.max().y <= placements.extent.y + 1e-12);
        }
    }
}

#[test]
fn grid_packer_is_repeatable() {
    let sizes = random_sizes(7, 60);
    let mut a = GridPacker::default();
    let mut b = GridPacker::default();
    assert_eq!(a.pack(&sizes).unwrap(), b.pack(&sizes).unwrap());
}

#[test]
fn one_huge_box_among_tiny_ones_still_fits() {
    let mut sizes = vec![DVec2::splat(0.001); 50];
    sizes.push(DVec2::new(5.0, 0.2));
    let mut packer = GridPacker {
        resolution: 32,
        ..GridPacker::default()
    };
    let placements = packer.pack(&sizes).unwrap();
    assert!(placements.extent.x >= 5.0);
}

#[test]
fn atlas_packer_over_grid_normalizes_into_unit_square() {
    let sizes = random_sizes(99, 40);
    let mut boxes: Vec<PackingBox<usize>> = sizes
        .iter()
        .enumerate()
        .map(|(i, s)| PackingBox::new(Rect::new(0.0, 0.0, s.x, s.y), i))
        .collect();
    let cfg = AtlasConfig::builder().grid_resolution(64).build();
    let mut packer = AtlasPacker::new(GridPacker::from_config(&cfg), 5, Some(3));
    let report = packer.pack(&mut boxes).unwrap();
    assert!(report.score > 0.0);
    let rects: Vec<Rect> = boxes.iter().filter_map(|b| b.best).collect();
    assert_eq!(rects.len(), boxes.len());
    assert!(disjoint(&rects));
    let max = rects.iter().fold(DVec2::ZERO, |acc, r| acc.max(r.max()));
    assert!((max.x.max(max.y) - 1.0).abs() < 1e-9, "{max}");
}
