//! Co-occurrence neighborhoods.
//!
//! For every observation, finds all observations within the co-occurrence
//! radius (the ground footprint of one image window), counts in how many
//! neighborhoods each species appears, and drops species below a frequency
//! threshold from both the table and every neighborhood.

use std::collections::{BTreeMap, BTreeSet};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::spatial_index::{Neighbor, SpatialIndex};
use crate::{
    ensure_finite_coordinates, ensure_unique_ids, Observation, ObservationId, SplitConfig,
    TaxonRank,
};

/// Finds co-occurrence neighborhoods with a fixed radius.
#[derive(Debug, Clone)]
pub struct OverlapGraphBuilder {
    radius: f64,
    max_neighbors: usize,
}

impl OverlapGraphBuilder {
    /// Create a builder for an explicit radius (metres) and neighbor bound K.
    pub fn new(radius: f64, max_neighbors: usize) -> Self {
        Self {
            radius,
            max_neighbors,
        }
    }

    /// Builder using the co-occurrence radius and K from `config`.
    pub fn from_config(config: &SplitConfig) -> Self {
        Self::new(config.overlap_radius(), config.max_neighbors)
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Query the neighborhood of every observation.
    ///
    /// Fails if ids are not unique or if any neighborhood saturates K.
    pub fn build(&self, observations: Vec<Observation>) -> Result<OverlapGraph> {
        ensure_unique_ids(&observations)?;
        ensure_finite_coordinates(&observations)?;

        let points: Vec<[f64; 2]> = observations.iter().map(Observation::point).collect();
        let index = SpatialIndex::build(&points, self.max_neighbors);
        let neighbors = index.query_radius_batch(&points, self.radius)?;

        let max_density = neighbors.iter().map(Vec::len).max().unwrap_or(0);
        info!(
            "[Overlap] {} observations, radius {} m, densest neighborhood {} (bound {})",
            observations.len(),
            self.radius,
            max_density,
            self.max_neighbors
        );

        Ok(OverlapGraph {
            radius: self.radius,
            observations,
            neighbors,
        })
    }
}

/// Raw co-occurrence neighborhoods before species filtering.
///
/// Each neighborhood includes the observation itself.
#[derive(Debug)]
pub struct OverlapGraph {
    radius: f64,
    observations: Vec<Observation>,
    neighbors: Vec<Vec<Neighbor>>,
}

impl OverlapGraph {
    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Neighbors of observation `idx` within the radius, nearest first.
    pub fn neighbors(&self, idx: usize) -> &[Neighbor] {
        &self.neighbors[idx]
    }

    /// Ids of the observations overlapping observation `idx`.
    pub fn neighbor_ids(&self, idx: usize) -> BTreeSet<ObservationId> {
        self.neighbors[idx]
            .iter()
            .map(|n| self.observations[n.idx].id)
            .collect()
    }

    /// Distinct labels at `rank` among the neighbors of observation `idx`.
    pub fn neighbor_taxa(&self, idx: usize, rank: TaxonRank) -> BTreeSet<String> {
        self.neighbors[idx]
            .iter()
            .map(|n| self.observations[n.idx].taxon(rank).to_string())
            .collect()
    }

    /// Number of neighborhoods in which each species appears.
    pub fn species_histogram(&self) -> BTreeMap<String, usize> {
        let mut histogram: BTreeMap<String, usize> = BTreeMap::new();
        for idx in 0..self.len() {
            for species in self.neighbor_taxa(idx, TaxonRank::Species) {
                *histogram.entry(species).or_insert(0) += 1;
            }
        }
        histogram
    }

    /// Drop species seen in fewer than `threshold` neighborhoods.
    ///
    /// Removal applies to the table and to every neighborhood, so the
    /// returned overlap sets never reference a removed observation. The
    /// surviving rows keep their input order.
    pub fn filter(self, threshold: usize) -> OverlapTable {
        let histogram = self.species_histogram();
        let removed_species: BTreeSet<String> = histogram
            .iter()
            .filter(|(_, count)| **count < threshold)
            .map(|(species, _)| species.clone())
            .collect();

        let keep: Vec<bool> = self
            .observations
            .iter()
            .map(|o| !removed_species.contains(&o.species))
            .collect();

        let mut overlaps = Vec::new();
        for (idx, neighbors) in self.neighbors.iter().enumerate() {
            if !keep[idx] {
                continue;
            }
            let retained: Vec<&Observation> = neighbors
                .iter()
                .filter(|n| keep[n.idx])
                .map(|n| &self.observations[n.idx])
                .collect();
            overlaps.push(OverlapColumns::from_neighbors(&retained));
        }

        let observations: Vec<Observation> = self
            .observations
            .into_iter()
            .zip(keep)
            .filter_map(|(obs, kept)| kept.then_some(obs))
            .collect();

        let counts = TaxonCounts::from_overlaps(&overlaps);

        info!(
            "[Overlap] Removed {} species below threshold {}, {} observations remain",
            removed_species.len(),
            threshold,
            observations.len()
        );

        OverlapTable {
            radius: self.radius,
            observations,
            overlaps,
            removed_species,
            histogram,
            counts,
        }
    }
}

/// Co-occurrence columns appended to one observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlapColumns {
    pub overlapping_ids: BTreeSet<ObservationId>,
    pub overlapping_species: BTreeSet<String>,
    pub overlapping_genus: BTreeSet<String>,
    pub overlapping_family: BTreeSet<String>,
    /// Number of distinct overlapping species
    pub overlap_count: usize,
}

impl OverlapColumns {
    fn from_neighbors(neighbors: &[&Observation]) -> Self {
        let overlapping_species: BTreeSet<String> =
            neighbors.iter().map(|o| o.species.clone()).collect();
        Self {
            overlapping_ids: neighbors.iter().map(|o| o.id).collect(),
            overlapping_genus: neighbors.iter().map(|o| o.genus.clone()).collect(),
            overlapping_family: neighbors.iter().map(|o| o.family.clone()).collect(),
            overlap_count: overlapping_species.len(),
            overlapping_species,
        }
    }

    /// Label set at the given rank.
    pub fn taxa(&self, rank: TaxonRank) -> &BTreeSet<String> {
        match rank {
            TaxonRank::Species => &self.overlapping_species,
            TaxonRank::Genus => &self.overlapping_genus,
            TaxonRank::Family => &self.overlapping_family,
        }
    }
}

/// Number of neighborhoods containing each label, per rank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxonCounts {
    pub species: BTreeMap<String, usize>,
    pub genus: BTreeMap<String, usize>,
    pub family: BTreeMap<String, usize>,
}

impl TaxonCounts {
    fn from_overlaps(overlaps: &[OverlapColumns]) -> Self {
        let mut counts = Self::default();
        for columns in overlaps {
            for rank in TaxonRank::ALL {
                let map = counts.for_rank_mut(rank);
                for label in columns.taxa(rank) {
                    *map.entry(label.clone()).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    pub fn for_rank(&self, rank: TaxonRank) -> &BTreeMap<String, usize> {
        match rank {
            TaxonRank::Species => &self.species,
            TaxonRank::Genus => &self.genus,
            TaxonRank::Family => &self.family,
        }
    }

    fn for_rank_mut(&mut self, rank: TaxonRank) -> &mut BTreeMap<String, usize> {
        match rank {
            TaxonRank::Species => &mut self.species,
            TaxonRank::Genus => &mut self.genus,
            TaxonRank::Family => &mut self.family,
        }
    }
}

/// Observations that survived species filtering, with their overlap columns.
///
/// `observations[i]` and `overlaps[i]` describe the same row.
#[derive(Debug, Clone)]
pub struct OverlapTable {
    pub radius: f64,
    pub observations: Vec<Observation>,
    pub overlaps: Vec<OverlapColumns>,
    /// Species dropped for falling below the threshold
    pub removed_species: BTreeSet<String>,
    /// Species histogram before filtering
    pub histogram: BTreeMap<String, usize>,
    /// Label counts over the filtered neighborhoods
    pub counts: TaxonCounts,
}

impl OverlapTable {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// The overlap sets keyed by observation id.
    pub fn overlap_set(&self) -> BTreeMap<ObservationId, BTreeSet<ObservationId>> {
        self.observations
            .iter()
            .zip(&self.overlaps)
            .map(|(obs, columns)| (obs.id, columns.overlapping_ids.clone()))
            .collect()
    }
}
