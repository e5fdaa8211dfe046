//! Tests for duplicate and singleton removal

use geosplit::synthetic::SyntheticScenario;
use geosplit::{DuplicateFilter, Observation, SplitConfig};

fn species_at(start_id: u64, species: &str, xs: &[f64]) -> Vec<Observation> {
    xs.iter()
        .enumerate()
        .map(|(i, &x)| Observation::new(start_id + i as u64, x, 0.0, species))
        .collect()
}

fn ids(observations: &[Observation]) -> Vec<u64> {
    observations.iter().map(|o| o.id).collect()
}

/// Co-occurrence radius 15 m, duplicate radius 150 m, tight radius 75 m.
fn filter() -> DuplicateFilter {
    DuplicateFilter::new(15.0, 150.0, 75.0, 4)
}

#[test]
fn test_small_species_dropped() {
    let mut observations = species_at(0, "rare", &[0.0, 1000.0, 2000.0, 3000.0]);
    observations.extend(species_at(10, "common", &[0.0, 1000.0, 2000.0, 3000.0, 4000.0]));

    let (kept, report) = filter().filter(observations);
    assert_eq!(ids(&kept), vec![10, 11, 12, 13, 14]);
    assert!(report.small_species.contains("rare"));
}

#[test]
fn test_singleton_species_removed() {
    // Six observations within 10 m of each other
    let mut observations = species_at(0, "clumped", &[0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
    observations.extend(species_at(10, "spread", &[0.0, 1000.0, 2000.0, 3000.0, 4000.0]));

    let (kept, report) = filter().filter(observations);
    assert!(kept.iter().all(|o| o.species == "spread"));
    assert!(report.singleton_species.contains("clumped"));
    assert_eq!(report.duplicates_removed, 0);
}

#[test]
fn test_is_singleton() {
    let f = filter();
    assert!(f.is_singleton(&[[0.0, 0.0], [10.0, 0.0], [0.0, 10.0]]));
    // Two points 20 m apart exceed the 15 m radius
    assert!(!f.is_singleton(&[[0.0, 0.0], [20.0, 0.0]]));
}

#[test]
fn test_lone_tight_duplicate() {
    let observations = species_at(0, "a", &[0.0, 30.0, 1000.0, 2000.0, 3000.0, 4000.0]);
    let (kept, report) = filter().filter(observations);

    assert_eq!(ids(&kept), vec![0, 2, 3, 4, 5]);
    assert_eq!(report.duplicates_removed, 1);
}

#[test]
fn test_lone_loose_neighbor_kept() {
    // 100 m lies inside the duplicate radius but outside the tight radius
    let observations = species_at(0, "a", &[0.0, 100.0, 1000.0, 2000.0, 3000.0]);
    let (kept, report) = filter().filter(observations);

    assert_eq!(kept.len(), 5);
    assert_eq!(report.duplicates_removed, 0);
    assert_eq!(report.passes, 1);
}

#[test]
fn test_dense_group_keeps_anchor_and_farthest() {
    let observations = species_at(
        0,
        "a",
        &[0.0, 30.0, 60.0, 100.0, 10_000.0, 20_000.0, 30_000.0, 40_000.0],
    );
    let (kept, report) = filter().filter(observations);

    assert_eq!(ids(&kept), vec![0, 3, 4, 5, 6, 7]);
    assert_eq!(report.duplicates_removed, 2);
    assert_eq!(report.passes, 2);
}

#[test]
fn test_species_are_independent() {
    // Co-located observations of different species are not duplicates
    let mut observations = species_at(0, "a", &[0.0, 1000.0, 2000.0, 3000.0, 4000.0]);
    observations.extend(species_at(10, "b", &[1.0, 1001.0, 2001.0, 3001.0, 4001.0]));

    let (kept, _) = filter().filter(observations);
    assert_eq!(kept.len(), 10);
}

#[test]
fn test_removal_cascades_to_fixed_point() {
    // Dropping the duplicate leaves four observations, which is too few
    let observations = species_at(0, "a", &[0.0, 30.0, 1000.0, 2000.0, 3000.0]);
    let (kept, report) = filter().filter(observations);

    assert!(kept.is_empty());
    assert_eq!(report.duplicates_removed, 1);
    assert!(report.small_species.contains("a"));
    assert_eq!(report.passes, 3);
}

#[test]
fn test_idempotent() {
    let observations = SyntheticScenario {
        site_count: 9,
        observations_per_site: 60,
        site_spread_meters: 200.0,
        species_count: 8,
        seed: 17,
        ..SyntheticScenario::default()
    }
    .generate()
    .observations;

    let f = DuplicateFilter::from_config(&SplitConfig::default());
    let (once, first) = f.filter(observations);
    assert!(first.duplicates_removed > 0);

    let (twice, second) = f.filter(once.clone());
    assert_eq!(once, twice);
    assert_eq!(second.duplicates_removed, 0);
    assert_eq!(second.passes, 1);
}
