//! # geosplit
//!
//! Spatial co-occurrence and leakage-safe train/test splitting for
//! geolocated species observations.
//!
//! Nearby observations share environmental covariates and imagery, so a
//! naive random split lets near-duplicates land on both sides of the
//! train/test boundary. This library provides:
//! - Co-occurrence sets: every observation within an image-footprint radius
//! - Species frequency filtering on co-occurrence neighborhoods
//! - Cluster split: connected co-occurrence clusters assigned whole to train
//!   or test by their distance to the nearest outside observation
//! - Seeded rebalancing of the cluster split toward a test-fraction cap
//! - Latitude-banded split with buffer strips between train and test
//! - Per-species duplicate and singleton removal
//!
//! ## Features
//!
//! - **`parallel`** - Run per-point neighbor queries in parallel with rayon
//! - **`cli`** - Build the `geosplit-cli` binary
//!
//! ## Quick Start
//!
//! ```rust
//! use geosplit::{build_dataset, Observation, SplitConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Two sites 5 km apart, each a chain of observations 200 m apart
//! let observations: Vec<Observation> = (0..8)
//!     .map(|i| {
//!         let site = (i / 4) as f64 * 5000.0;
//!         let species = if i % 2 == 0 { "Quercus alba" } else { "Acer rubrum" };
//!         Observation::new(i, site + (i % 4) as f64 * 200.0, 0.0, species)
//!             .with_location(45.0 + site / 111_000.0, -85.0)
//!     })
//!     .collect();
//!
//! let config = SplitConfig {
//!     species_threshold: 0,
//!     min_species_observations: 0,
//!     ..SplitConfig::default()
//! };
//! let mut rng = StdRng::seed_from_u64(config.seed);
//! let dataset = build_dataset(observations, &config, &mut rng).unwrap();
//! assert_eq!(dataset.rows.len(), 8);
//! ```

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{OptionExt, Result, SplitError};

// Index arena union-find for cluster discovery
pub mod union_find;
pub use union_find::UnionFind;

pub mod spatial_index;
pub use spatial_index::{Neighbor, NeighborResult, SpatialIndex};

// Co-occurrence neighborhoods and species threshold filter
pub mod overlap;
pub use overlap::{OverlapColumns, OverlapGraph, OverlapGraphBuilder, OverlapTable, TaxonCounts};

// Cluster-based train/test split with rebalancing
pub mod cluster;
pub use cluster::{
    Cluster, ClusterId, ClusterSplit, ClusterSplitter, ClusterSummary, SplitAssignment, SplitLabel,
};

// Latitude-banded split with buffer zones
pub mod bands;
pub use bands::{Band, BandMembership, BandRegions, BandReport, BandSplit, BandSplitter, BandZone};

// Duplicate and singleton removal
pub mod dedup;
pub use dedup::{DuplicateFilter, DuplicateReport};

pub mod vocabulary;
pub use vocabulary::{TaxonIds, TaxonVocabulary};

pub mod progress;
pub use progress::{AtomicProgressTracker, NoopProgress, PipelinePhase, ProgressCallback};

// End-to-end dataset preparation
pub mod pipeline;
pub use pipeline::{build_dataset, build_dataset_with_progress, Dataset, DatasetMetadata, DatasetRow};

pub mod synthetic;

// ============================================================================
// Constants
// ============================================================================

/// Approximate degrees of latitude per kilometre.
pub const KM_TO_DEG: f64 = 0.008;

/// Smallest accepted imagery resolution (sub-decimetre aerial imagery).
pub const MIN_RESOLUTION_M: f64 = 0.09;

/// Largest accepted imagery resolution (Landsat).
pub const MAX_RESOLUTION_M: f64 = 30.0;

// ============================================================================
// Core Types
// ============================================================================

/// Unique observation identifier (e.g. a GBIF occurrence id).
pub type ObservationId = u64;

/// A single geolocated species observation.
///
/// `x`/`y` are metres in a planar projection and drive every distance
/// computation. `latitude`/`longitude` are WGS84 degrees and are only used
/// for band assignment and for reporting cluster locations. Re-projection
/// is the caller's job.
///
/// # Example
/// ```
/// use geosplit::Observation;
/// let obs = Observation::new(42, 512_000.0, 4_980_000.0, "Quercus alba")
///     .with_location(44.97, -84.85)
///     .with_taxonomy("Quercus", "Fagaceae");
/// assert_eq!(obs.point(), [512_000.0, 4_980_000.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    pub species: String,
    #[serde(default)]
    pub genus: String,
    #[serde(default)]
    pub family: String,
}

impl Observation {
    /// Create an observation with projected coordinates and a species label.
    pub fn new(id: ObservationId, x: f64, y: f64, species: impl Into<String>) -> Self {
        Self {
            id,
            x,
            y,
            latitude: 0.0,
            longitude: 0.0,
            species: species.into(),
            genus: String::new(),
            family: String::new(),
        }
    }

    /// Set the geographic (WGS84) location.
    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }

    /// Set genus and family labels.
    pub fn with_taxonomy(mut self, genus: impl Into<String>, family: impl Into<String>) -> Self {
        self.genus = genus.into();
        self.family = family.into();
        self
    }

    /// Projected point in metres.
    pub fn point(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Geographic point as `[longitude, latitude]`.
    pub fn geo_point(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    /// Label at the given taxonomic rank.
    pub fn taxon(&self, rank: TaxonRank) -> &str {
        match rank {
            TaxonRank::Species => &self.species,
            TaxonRank::Genus => &self.genus,
            TaxonRank::Family => &self.family,
        }
    }
}

/// Taxonomic granularity of a co-occurrence label set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonRank {
    Species,
    Genus,
    Family,
}

impl TaxonRank {
    pub const ALL: [TaxonRank; 3] = [TaxonRank::Species, TaxonRank::Genus, TaxonRank::Family];
}

/// Reject tables where two observations share an id.
pub fn ensure_unique_ids(observations: &[Observation]) -> Result<()> {
    let mut seen = std::collections::HashSet::with_capacity(observations.len());
    for obs in observations {
        if !seen.insert(obs.id) {
            return Err(SplitError::DuplicateObservationId(obs.id));
        }
    }
    Ok(())
}

/// Reject tables with a NaN or infinite coordinate.
///
/// Runs before any index is built; the R-tree cannot place such points.
pub fn ensure_finite_coordinates(observations: &[Observation]) -> Result<()> {
    for obs in observations {
        let fields = [
            ("x", obs.x),
            ("y", obs.y),
            ("latitude", obs.latitude),
            ("longitude", obs.longitude),
        ];
        if let Some(&(field, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SplitError::NonFiniteCoordinate {
                id: obs.id,
                field,
                value,
            });
        }
    }
    Ok(())
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for co-occurrence, splitting and duplicate filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Imagery resolution in metres per pixel. Must lie in [0.09, 30].
    /// Default: 1.0
    pub resolution_m_per_px: f64,

    /// Image window in pixels. Co-occurrence radius is
    /// `ceil(window_px * resolution_m_per_px)`.
    /// Default: 256
    pub window_px: u32,

    /// A cluster must be farther than this from every outside observation
    /// to be eligible for the test split.
    /// Default: 1300.0 metres
    pub exclusion_distance_m: f64,

    /// Species appearing in fewer co-occurrence neighborhoods than this are
    /// removed.
    /// Default: 200
    pub species_threshold: usize,

    /// Upper bound on the fraction of observations in the cluster test split.
    /// Default: 0.1
    pub test_fraction_cap: f64,

    /// Width of each latitude band in degrees.
    /// Default: 1.0
    pub band_width_deg: f64,

    /// Edge length of the coarsest covariate raster cell, in degrees.
    /// Default: 0.008 (~1 km)
    pub covariate_cell_deg: f64,

    /// Buffer strip excluded from both splits on each inner band edge.
    /// Must be at least the covariate cell diagonal.
    /// Default: 0.012 (1.5 cells)
    pub band_buffer_deg: f64,

    /// Latitude range covered by bands. `None` uses the data extent.
    /// Default: None
    pub band_lat_range: Option<(f64, f64)>,

    /// Neighbor bound K for radius queries.
    /// Default: 2000
    pub max_neighbors: usize,

    /// Species with this many observations or fewer are dropped before
    /// duplicate filtering.
    /// Default: 4
    pub min_species_observations: usize,

    /// Duplicate search window in pixels.
    /// Default: 150
    pub duplicate_window_px: u32,

    /// Window in pixels inside which a lone duplicate is dropped.
    /// Default: 75
    pub tight_duplicate_window_px: u32,

    /// Seed for the rebalancing random source.
    /// Default: 0
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            resolution_m_per_px: 1.0,
            window_px: 256,
            exclusion_distance_m: 1300.0,
            species_threshold: 200,
            test_fraction_cap: 0.1,
            band_width_deg: 1.0,
            covariate_cell_deg: KM_TO_DEG,
            band_buffer_deg: KM_TO_DEG * 1.5,
            band_lat_range: None,
            max_neighbors: spatial_index::DEFAULT_MAX_NEIGHBORS,
            min_species_observations: 4,
            duplicate_window_px: 150,
            tight_duplicate_window_px: 75,
            seed: 0,
        }
    }
}

impl SplitConfig {
    /// Co-occurrence radius in metres.
    ///
    /// ```
    /// use geosplit::SplitConfig;
    /// assert_eq!(SplitConfig::default().overlap_radius(), 256.0);
    /// ```
    pub fn overlap_radius(&self) -> f64 {
        pixels_to_metres(self.window_px, self.resolution_m_per_px)
    }

    /// Radius in metres within which same-species observations count as
    /// duplicates.
    pub fn duplicate_radius(&self) -> f64 {
        pixels_to_metres(self.duplicate_window_px, self.resolution_m_per_px)
    }

    /// Radius in metres inside which a lone duplicate is dropped.
    pub fn tight_duplicate_radius(&self) -> f64 {
        pixels_to_metres(self.tight_duplicate_window_px, self.resolution_m_per_px)
    }

    /// Check every value against its valid range.
    ///
    /// Runs before any index is built so misconfiguration fails fast.
    pub fn validate(&self) -> Result<()> {
        let res = self.resolution_m_per_px;
        if !(MIN_RESOLUTION_M..=MAX_RESOLUTION_M).contains(&res) {
            return Err(SplitError::config(
                "resolution_m_per_px",
                res,
                format!("must lie in [{MIN_RESOLUTION_M}, {MAX_RESOLUTION_M}] metres"),
            ));
        }
        if self.window_px == 0 {
            return Err(SplitError::config("window_px", self.window_px, "must be positive"));
        }
        if !(self.exclusion_distance_m.is_finite() && self.exclusion_distance_m > 0.0) {
            return Err(SplitError::config(
                "exclusion_distance_m",
                self.exclusion_distance_m,
                "must be a positive distance",
            ));
        }
        if !(0.0..=1.0).contains(&self.test_fraction_cap) {
            return Err(SplitError::config(
                "test_fraction_cap",
                self.test_fraction_cap,
                "must lie in [0, 1]",
            ));
        }
        if !(self.band_width_deg.is_finite() && self.band_width_deg > 0.0) {
            return Err(SplitError::config(
                "band_width_deg",
                self.band_width_deg,
                "must be positive",
            ));
        }
        if !(self.covariate_cell_deg.is_finite() && self.covariate_cell_deg > 0.0) {
            return Err(SplitError::config(
                "covariate_cell_deg",
                self.covariate_cell_deg,
                "must be positive",
            ));
        }
        if !(self.band_buffer_deg.is_finite() && self.band_buffer_deg > 0.0) {
            return Err(SplitError::config(
                "band_buffer_deg",
                self.band_buffer_deg,
                "must be positive",
            ));
        }
        if self.band_width_deg <= 2.0 * self.band_buffer_deg {
            return Err(SplitError::config(
                "band_width_deg",
                self.band_width_deg,
                format!(
                    "must exceed twice the buffer width ({})",
                    2.0 * self.band_buffer_deg
                ),
            ));
        }
        if let Some((low, high)) = self.band_lat_range {
            if !(low.is_finite() && high.is_finite() && low < high) {
                return Err(SplitError::config(
                    "band_lat_range",
                    format!("({low}, {high})"),
                    "must be a finite, non-empty latitude range",
                ));
            }
        }
        if self.max_neighbors < 2 {
            return Err(SplitError::config(
                "max_neighbors",
                self.max_neighbors,
                "must allow at least one neighbor besides the query point",
            ));
        }
        if self.duplicate_window_px < self.tight_duplicate_window_px {
            return Err(SplitError::config(
                "tight_duplicate_window_px",
                self.tight_duplicate_window_px,
                "must not exceed duplicate_window_px",
            ));
        }
        Ok(())
    }
}

fn pixels_to_metres(pixels: u32, resolution: f64) -> f64 {
    (pixels as f64 * resolution).ceil()
}
