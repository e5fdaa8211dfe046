//! Tests for taxon vocabulary and synthetic data helpers

use std::collections::BTreeSet;

use geosplit::synthetic::{taxonomy_for, SyntheticScenario};
use geosplit::{Observation, OverlapColumns, TaxonRank, TaxonVocabulary};

fn sample() -> Vec<Observation> {
    vec![
        Observation::new(1, 0.0, 0.0, "Acer rubrum").with_taxonomy("Acer", "Sapindaceae"),
        Observation::new(2, 0.0, 0.0, "Quercus alba").with_taxonomy("Quercus", "Fagaceae"),
        Observation::new(3, 0.0, 0.0, "Acer saccharum").with_taxonomy("Acer", "Sapindaceae"),
    ]
}

#[test]
fn test_first_seen_order() {
    let vocab = TaxonVocabulary::from_observations(&sample());
    assert_eq!(
        vocab.species,
        vec!["Acer rubrum", "Quercus alba", "Acer saccharum"]
    );
    assert_eq!(vocab.genus, vec!["Acer", "Quercus"]);
    assert_eq!(vocab.id(TaxonRank::Family, "Fagaceae"), Some(1));
    assert_eq!(vocab.label(TaxonRank::Genus, 0), Some("Acer"));
    assert_eq!(vocab.id(TaxonRank::Species, "Pinus strobus"), None);
}

#[test]
fn test_encode_row() {
    let observations = sample();
    let vocab = TaxonVocabulary::from_observations(&observations);
    let overlap = OverlapColumns {
        overlapping_species: ["Quercus alba", "Acer rubrum", "Unknown"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        ..OverlapColumns::default()
    };

    let ids = vocab.encode(&observations[2], &overlap);
    assert_eq!(ids.species_id, 2);
    assert_eq!(ids.genus_id, 0);
    assert_eq!(ids.family_id, 0);
    // Unknown labels are skipped, ids sorted
    assert_eq!(ids.overlapping_species_ids, vec![0, 1]);
}

#[test]
fn test_reindex_after_json() {
    let vocab = TaxonVocabulary::from_observations(&sample());
    let json = serde_json::to_string(&vocab).unwrap();

    let mut restored: TaxonVocabulary = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.id(TaxonRank::Species, "Quercus alba"), None);
    restored.reindex();
    assert_eq!(restored.id(TaxonRank::Species, "Quercus alba"), Some(1));
    assert_eq!(restored, vocab);
}

#[test]
fn test_synthetic_deterministic() {
    let scenario = SyntheticScenario {
        site_count: 4,
        observations_per_site: 10,
        seed: 99,
        ..SyntheticScenario::default()
    };
    let a = scenario.generate();
    let b = scenario.generate();

    assert_eq!(a.observations, b.observations);
    assert_eq!(a.metadata.total_observations, 40);
    assert_eq!(a.metadata.site_centres.len(), 4);
    assert_eq!(a.site_of[39], 3);

    let ids: BTreeSet<u64> = a.observations.iter().map(|o| o.id).collect();
    assert_eq!(ids.len(), 40);
}

#[test]
fn test_taxonomy_for() {
    let (species, genus, family) = taxonomy_for(10);
    assert_eq!(genus, "Genus03");
    assert_eq!(family, "Family01");
    assert_eq!(species, "Genus03 sp010");
}
