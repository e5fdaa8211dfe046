//! Duplicate and singleton removal.
//!
//! Works one species at a time:
//! - Species with too few observations are dropped outright.
//! - A species whose observations all lie within one co-occurrence radius of
//!   each other (a singleton) is dropped, since it cannot supply independent
//!   train and test samples.
//! - Near-identical observations of the same species are thinned: a lone
//!   close duplicate is dropped, and a dense group keeps only its anchor and
//!   its farthest member.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::spatial_index::SpatialIndex;
use crate::{Observation, SplitConfig};

/// Summary of what the duplicate filter removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Species dropped for having too few observations
    pub small_species: BTreeSet<String>,
    /// Species dropped because every observation lies within one radius
    pub singleton_species: BTreeSet<String>,
    /// Observations dropped as duplicates
    pub duplicates_removed: usize,
    /// Passes run until nothing more was removed
    pub passes: usize,
}

/// Per-species duplicate and singleton filter.
#[derive(Debug, Clone)]
pub struct DuplicateFilter {
    overlap_radius: f64,
    duplicate_radius: f64,
    tight_radius: f64,
    min_species_observations: usize,
}

impl DuplicateFilter {
    pub fn new(
        overlap_radius: f64,
        duplicate_radius: f64,
        tight_radius: f64,
        min_species_observations: usize,
    ) -> Self {
        Self {
            overlap_radius,
            duplicate_radius,
            tight_radius,
            min_species_observations,
        }
    }

    pub fn from_config(config: &SplitConfig) -> Self {
        Self::new(
            config.overlap_radius(),
            config.duplicate_radius(),
            config.tight_duplicate_radius(),
            config.min_species_observations,
        )
    }

    /// Remove small species, singleton species and duplicates.
    ///
    /// Passes repeat until one removes nothing, so filtering the output again
    /// is a no-op. Surviving rows keep their input order.
    pub fn filter(&self, mut observations: Vec<Observation>) -> (Vec<Observation>, DuplicateReport) {
        let mut report = DuplicateReport::default();
        let start = observations.len();

        loop {
            report.passes += 1;
            let before = observations.len();
            observations = self.pass(observations, &mut report);
            if observations.len() == before {
                break;
            }
        }

        info!(
            "[Dedup] {} -> {} observations in {} passes: {} duplicates, {} singleton species, {} small species",
            start,
            observations.len(),
            report.passes,
            report.duplicates_removed,
            report.singleton_species.len(),
            report.small_species.len()
        );

        (observations, report)
    }

    fn pass(&self, observations: Vec<Observation>, report: &mut DuplicateReport) -> Vec<Observation> {
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, obs) in observations.iter().enumerate() {
            groups.entry(obs.species.as_str()).or_default().push(idx);
        }

        let mut drop: HashSet<usize> = HashSet::new();
        for (species, rows) in &groups {
            if rows.len() <= self.min_species_observations {
                report.small_species.insert(species.to_string());
                drop.extend(rows.iter().copied());
                continue;
            }

            let points: Vec<[f64; 2]> = rows.iter().map(|&r| observations[r].point()).collect();
            if self.is_singleton(&points) {
                debug!("[Dedup] {} is a singleton species ({} observations)", species, rows.len());
                report.singleton_species.insert(species.to_string());
                drop.extend(rows.iter().copied());
                continue;
            }

            let duplicates = self.find_duplicates(&points);
            report.duplicates_removed += duplicates.len();
            drop.extend(duplicates.into_iter().map(|local| rows[local]));
        }

        observations
            .into_iter()
            .enumerate()
            .filter_map(|(idx, obs)| (!drop.contains(&idx)).then_some(obs))
            .collect()
    }

    /// True if every point has every other point within the co-occurrence
    /// radius.
    pub fn is_singleton(&self, points: &[[f64; 2]]) -> bool {
        if points.len() < 2 {
            return true;
        }
        let index = SpatialIndex::build(points, points.len());
        points.iter().all(|p| {
            index
                .query_knn(*p, points.len())
                .last()
                .is_some_and(|farthest| farthest.distance <= self.overlap_radius)
        })
    }

    /// Positions (within `points`) of duplicates to drop in one sweep.
    ///
    /// Points are visited in order; a point already dropped or already kept
    /// as part of an earlier group is not used as an anchor.
    pub fn find_duplicates(&self, points: &[[f64; 2]]) -> BTreeSet<usize> {
        let index = SpatialIndex::build(points, points.len());
        let mut dropped: BTreeSet<usize> = BTreeSet::new();
        let mut kept: HashSet<usize> = HashSet::new();

        for (anchor, point) in points.iter().enumerate() {
            if dropped.contains(&anchor) || kept.contains(&anchor) {
                continue;
            }

            let close: Vec<_> = index
                .query_knn(*point, points.len())
                .into_iter()
                .filter(|n| n.idx != anchor && n.distance <= self.duplicate_radius)
                .collect();

            match close.as_slice() {
                [] => {}
                [only] => {
                    if only.distance < self.tight_radius {
                        dropped.insert(only.idx);
                        kept.insert(anchor);
                    }
                }
                [inner @ .., farthest] => {
                    dropped.extend(inner.iter().map(|n| n.idx));
                    kept.insert(anchor);
                    kept.insert(farthest.idx);
                }
            }
        }

        dropped
    }
}
