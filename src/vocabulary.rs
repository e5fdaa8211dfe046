//! Dense integer ids for taxon labels.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::overlap::OverlapColumns;
use crate::{Observation, TaxonRank};

/// Label -> id maps for each taxonomic rank.
///
/// Ids are assigned in first-appearance order over the table, starting at 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxonVocabulary {
    pub species: Vec<String>,
    pub genus: Vec<String>,
    pub family: Vec<String>,
    #[serde(skip)]
    lookup: [HashMap<String, u32>; 3],
}

/// Encoded taxa of one row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonIds {
    pub species_id: u32,
    pub genus_id: u32,
    pub family_id: u32,
    pub overlapping_species_ids: Vec<u32>,
    pub overlapping_genus_ids: Vec<u32>,
    pub overlapping_family_ids: Vec<u32>,
}

impl TaxonVocabulary {
    /// Vocabulary over the labels of `observations`.
    pub fn from_observations(observations: &[Observation]) -> Self {
        let mut vocab = Self::default();
        for obs in observations {
            for rank in TaxonRank::ALL {
                vocab.insert(rank, obs.taxon(rank));
            }
        }
        vocab
    }

    /// Id of `label`, adding it if unseen.
    pub fn insert(&mut self, rank: TaxonRank, label: &str) -> u32 {
        let slot = rank_slot(rank);
        if let Some(&id) = self.lookup[slot].get(label) {
            return id;
        }
        let labels = self.labels_mut(rank);
        let id = labels.len() as u32;
        labels.push(label.to_string());
        self.lookup[slot].insert(label.to_string(), id);
        id
    }

    pub fn id(&self, rank: TaxonRank, label: &str) -> Option<u32> {
        self.lookup[rank_slot(rank)].get(label).copied()
    }

    pub fn label(&self, rank: TaxonRank, id: u32) -> Option<&str> {
        self.labels(rank).get(id as usize).map(String::as_str)
    }

    pub fn labels(&self, rank: TaxonRank) -> &[String] {
        match rank {
            TaxonRank::Species => &self.species,
            TaxonRank::Genus => &self.genus,
            TaxonRank::Family => &self.family,
        }
    }

    fn labels_mut(&mut self, rank: TaxonRank) -> &mut Vec<String> {
        match rank {
            TaxonRank::Species => &mut self.species,
            TaxonRank::Genus => &mut self.genus,
            TaxonRank::Family => &mut self.family,
        }
    }

    /// Encode one row. Labels missing from the vocabulary are skipped in the
    /// overlap lists and map to `u32::MAX` for the row's own taxa.
    pub fn encode(&self, obs: &Observation, overlap: &OverlapColumns) -> TaxonIds {
        let own = |rank| self.id(rank, obs.taxon(rank)).unwrap_or(u32::MAX);
        let set = |rank| self.encode_set(rank, overlap.taxa(rank));
        TaxonIds {
            species_id: own(TaxonRank::Species),
            genus_id: own(TaxonRank::Genus),
            family_id: own(TaxonRank::Family),
            overlapping_species_ids: set(TaxonRank::Species),
            overlapping_genus_ids: set(TaxonRank::Genus),
            overlapping_family_ids: set(TaxonRank::Family),
        }
    }

    /// Sorted ids of the known labels in `labels`.
    pub fn encode_set(&self, rank: TaxonRank, labels: &BTreeSet<String>) -> Vec<u32> {
        let mut ids: Vec<u32> = labels
            .iter()
            .filter_map(|label| self.id(rank, label))
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Rebuild the lookup maps after deserializing.
    pub fn reindex(&mut self) {
        for rank in TaxonRank::ALL {
            let map: HashMap<String, u32> = self
                .labels(rank)
                .iter()
                .enumerate()
                .map(|(id, label)| (label.clone(), id as u32))
                .collect();
            self.lookup[rank_slot(rank)] = map;
        }
    }
}

fn rank_slot(rank: TaxonRank) -> usize {
    match rank {
        TaxonRank::Species => 0,
        TaxonRank::Genus => 1,
        TaxonRank::Family => 2,
    }
}
