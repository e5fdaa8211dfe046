//! End-to-end dataset preparation.
//!
//! Raw observations -> duplicate filter -> co-occurrence table -> band split
//! and cluster split -> encoded rows plus metadata.

use std::collections::{BTreeMap, BTreeSet};

use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bands::{Band, BandMembership, BandReport, BandSplitter};
use crate::cluster::{ClusterId, ClusterSplitter, ClusterSummary, SplitAssignment, SplitLabel};
use crate::dedup::{DuplicateFilter, DuplicateReport};
use crate::error::Result;
use crate::overlap::{OverlapColumns, OverlapGraphBuilder, TaxonCounts};
use crate::progress::{NoopProgress, PipelinePhase, ProgressCallback};
use crate::vocabulary::{TaxonIds, TaxonVocabulary};
use crate::{ensure_finite_coordinates, ensure_unique_ids, Observation, SplitConfig};

/// One observation with every derived column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub observation: Observation,
    pub overlap: OverlapColumns,
    pub split: SplitAssignment,
    /// One entry per band, indexed like `Dataset::bands`
    pub bands: Vec<BandMembership>,
    pub taxon_ids: TaxonIds,
}

/// Dataset-level summaries persisted next to the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub train_clusters: BTreeMap<ClusterId, ClusterSummary>,
    pub test_clusters: BTreeMap<ClusterId, ClusterSummary>,
    pub initial_test_fraction: f64,
    pub test_fraction: f64,
    pub relabeled_clusters: Vec<ClusterId>,
    pub counts: TaxonCounts,
    pub vocabulary: TaxonVocabulary,
    pub removed_species: BTreeSet<String>,
    pub duplicates: DuplicateReport,
    pub bands: Vec<BandReport>,
    pub config: SplitConfig,
}

/// Output of [`build_dataset`].
#[derive(Debug, Clone)]
pub struct Dataset {
    pub rows: Vec<DatasetRow>,
    pub bands: Vec<Band>,
    pub metadata: DatasetMetadata,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with the given cluster split label.
    pub fn rows_with_label(&self, label: SplitLabel) -> impl Iterator<Item = &DatasetRow> {
        self.rows.iter().filter(move |r| r.split.label == label)
    }
}

/// Build the full dataset.
///
/// `rng` drives cluster rebalancing only; seed it from `config.seed` for
/// reproducible output.
pub fn build_dataset<R: Rng + ?Sized>(
    observations: Vec<Observation>,
    config: &SplitConfig,
    rng: &mut R,
) -> Result<Dataset> {
    build_dataset_with_progress(observations, config, rng, &NoopProgress)
}

/// Build the full dataset, reporting phase progress.
pub fn build_dataset_with_progress<R: Rng + ?Sized>(
    observations: Vec<Observation>,
    config: &SplitConfig,
    rng: &mut R,
    progress: &dyn ProgressCallback,
) -> Result<Dataset> {
    config.validate()?;
    ensure_unique_ids(&observations)?;
    ensure_finite_coordinates(&observations)?;
    let band_splitter = BandSplitter::from_config(config)?;

    info!(
        "[Pipeline] Building dataset from {} observations (radius {} m, exclusion {} m)",
        observations.len(),
        config.overlap_radius(),
        config.exclusion_distance_m
    );

    progress.on_phase(PipelinePhase::Deduplicating, 1);
    let (observations, duplicates) = DuplicateFilter::from_config(config).filter(observations);
    progress.on_progress();

    progress.on_phase(PipelinePhase::FindingOverlaps, 1);
    let table = OverlapGraphBuilder::from_config(config)
        .build(observations)?
        .filter(config.species_threshold);
    progress.on_progress();

    progress.on_phase(PipelinePhase::BandSplitting, 1);
    let band_split = band_splitter.split(&table.observations)?;
    progress.on_progress();

    progress.on_phase(PipelinePhase::Clustering, 1);
    let cluster_split = ClusterSplitter::from_config(config).split(&table, rng)?;
    progress.on_progress();

    progress.on_phase(PipelinePhase::Encoding, table.len() as u32);
    let vocabulary = TaxonVocabulary::from_observations(&table.observations);

    let metadata = DatasetMetadata {
        train_clusters: cluster_split.summaries(SplitLabel::Train),
        test_clusters: cluster_split.summaries(SplitLabel::Test),
        initial_test_fraction: cluster_split.initial_test_fraction,
        test_fraction: cluster_split.test_fraction(),
        relabeled_clusters: cluster_split.relabeled.clone(),
        counts: table.counts.clone(),
        vocabulary: vocabulary.clone(),
        removed_species: table.removed_species.clone(),
        duplicates,
        bands: band_split.reports,
        config: config.clone(),
    };

    let rows: Vec<DatasetRow> = table
        .observations
        .into_iter()
        .zip(table.overlaps)
        .zip(cluster_split.assignments)
        .zip(band_split.membership)
        .map(|(((observation, overlap), split), bands)| {
            let taxon_ids = vocabulary.encode(&observation, &overlap);
            progress.on_progress();
            DatasetRow {
                observation,
                overlap,
                split,
                bands,
                taxon_ids,
            }
        })
        .collect();

    info!(
        "[Pipeline] {} rows: {} train clusters, {} test clusters ({:.2}% test), {} bands",
        rows.len(),
        metadata.train_clusters.len(),
        metadata.test_clusters.len(),
        metadata.test_fraction * 100.0,
        band_split.bands.len()
    );

    Ok(Dataset {
        rows,
        bands: band_split.bands,
        metadata,
    })
}
