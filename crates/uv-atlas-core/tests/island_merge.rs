use glam::DVec2;
use uv_atlas_core::island::IslandMerger;

fn square(x: f64, y: f64, side: f64) -> Vec<DVec2> {
    vec![
        DVec2::new(x, y),
        DVec2::new(x + side, y),
        DVec2::new(x + side, y + side),
        DVec2::new(x, y + side),
    ]
}

fn pairwise_separated<P>(merger: &IslandMerger<P>, epsilon: f64) -> bool {
    let islands = merger.islands();
    for i in 0..islands.len() {
        for j in (i + 1)..islands.len() {
            if islands[i].intersects(&islands[j], epsilon) {
                return false;
            }
        }
    }
    true
}

#[test]
fn separate_patches_stay_separate() {
    let mut merger = IslandMerger::new();
    merger.add_sequence(square(0.0, 0.0, 2.0), 0.0, 0);
    merger.add_sequence(square(10.0, 10.0, 2.0), 0.0, 1);
    assert_eq!(merger.len(), 2);
    assert_eq!(merger.merges(), 0);
}

#[test]
fn overlapping_patches_merge_into_union() {
    let mut merger = IslandMerger::new();
    merger.add_sequence(square(0.0, 0.0, 2.0), 0.0, 0);
    merger.add_sequence(square(1.0, 1.0, 2.0), 0.0, 1);
    assert_eq!(merger.len(), 1);
    let island = &merger.islands()[0];
    assert_eq!(island.min(), Some(DVec2::new(0.0, 0.0)));
    assert_eq!(island.max(), Some(DVec2::new(3.0, 3.0)));
    assert_eq!(island.payload(), &[0, 1]);
}

#[test]
fn random_patches_never_leave_touching_islands() {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    for &epsilon in &[0.0, 0.5, 2.0] {
        let mut merger = IslandMerger::new();
        for i in 0..300 {
            let x = rng.gen_range(0.0..200.0);
            let y = rng.gen_range(0.0..200.0);
            let n = rng.gen_range(1..6);
            let points: Vec<DVec2> = (0..n)
                .map(|_| DVec2::new(x + rng.gen_range(0.0..6.0), y + rng.gen_range(0.0..6.0)))
                .collect();
            assert!(merger.add_sequence(points, epsilon, i));
            assert!(pairwise_separated(&merger, epsilon), "eps {epsilon} after patch {i}");
        }
        let payloads: usize = merger.islands().iter().map(|i| i.payload().len()).sum();
        assert_eq!(payloads, 300);
    }
}

#[test]
fn feeding_a_patch_twice_is_idempotent() {
    let mut merger = IslandMerger::new();
    merger.add_sequence(square(0.0, 0.0, 4.0), 1.0, "a");
    merger.add_sequence(square(20.0, 0.0, 4.0), 1.0, "b");
    let before = merger.len();
    merger.add_sequence(square(0.0, 0.0, 4.0), 1.0, "a again");
    assert_eq!(merger.len(), before);
    let first = merger
        .islands()
        .iter()
        .find(|i| i.payload().contains(&"a"))
        .unwrap();
    assert_eq!(first.payload(), &["a", "a again"]);
}

#[test]
fn payloads_only_grow_across_merges() {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(9);
    let mut merger = IslandMerger::new();
    for i in 0..100usize {
        let x = rng.gen_range(0.0..50.0);
        let y = rng.gen_range(0.0..50.0);
        let snapshot: Vec<Vec<usize>> =
            merger.islands().iter().map(|i| i.payload().to_vec()).collect();
        merger.add_sequence(square(x, y, 3.0), 0.5, i);
        for old in snapshot {
            assert!(
                merger
                    .islands()
                    .iter()
                    .any(|island| old.iter().all(|p| island.payload().contains(p))),
                "payload set {old:?} was split"
            );
        }
    }
}

#[test]
fn whole_chain_collapses_when_bridged() {
    let mut merger = IslandMerger::new();
    for i in 0..5 {
        merger.add_sequence(square(i as f64 * 10.0, 0.0, 2.0), 0.0, i);
    }
    assert_eq!(merger.len(), 5);
    merger.add_sequence([DVec2::new(1.0, 1.0), DVec2::new(41.0, 1.0)], 0.0, 99);
    assert_eq!(merger.len(), 1);
    assert_eq!(merger.islands()[0].payload().len(), 6);
    assert_eq!(merger.merges(), 5);
}
