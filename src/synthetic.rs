//! Synthetic observation generator for tests and benchmarking.
//!
//! Observations are clumped around survey sites laid out on a jittered grid,
//! with species drawn from a skewed abundance distribution. Site membership
//! is kept as ground truth so tests can reason about expected clusters.
//!
//! # Example
//!
//! ```rust
//! use geosplit::synthetic::SyntheticScenario;
//!
//! let scenario = SyntheticScenario {
//!     site_count: 9,
//!     observations_per_site: 20,
//!     seed: 7,
//!     ..SyntheticScenario::default()
//! };
//!
//! let dataset = scenario.generate();
//! assert_eq!(dataset.observations.len(), 180);
//! ```

use std::collections::BTreeSet;
use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::Observation;

// ============================================================================
// Types
// ============================================================================

/// Scenario configuration for generating synthetic data.
#[derive(Debug, Clone)]
pub struct SyntheticScenario {
    /// Latitude of the grid's south-west corner.
    pub origin_latitude: f64,
    /// Longitude of the grid's south-west corner.
    pub origin_longitude: f64,
    /// Number of survey sites.
    pub site_count: usize,
    /// Observations generated around each site.
    pub observations_per_site: usize,
    /// Distance between neighbouring grid sites in meters.
    pub site_spacing_meters: f64,
    /// Standard deviation of observation scatter around a site in meters.
    pub site_spread_meters: f64,
    /// Size of the species pool.
    pub species_count: usize,
    /// RNG seed for deterministic reproduction.
    pub seed: u64,
}

impl Default for SyntheticScenario {
    fn default() -> Self {
        Self {
            origin_latitude: 44.0,
            origin_longitude: -85.0,
            site_count: 16,
            observations_per_site: 50,
            site_spacing_meters: 5_000.0,
            site_spread_meters: 150.0,
            species_count: 30,
            seed: 42,
        }
    }
}

/// Statistics about a generated dataset.
#[derive(Debug, Clone)]
pub struct SyntheticMetadata {
    pub total_observations: usize,
    /// Species that actually occur in the output.
    pub species_present: usize,
    /// Site centres as projected `[x, y]` in meters.
    pub site_centres: Vec<[f64; 2]>,
}

/// A generated dataset with ground truth.
pub struct SyntheticDataset {
    pub observations: Vec<Observation>,
    /// Site index of each observation.
    pub site_of: Vec<usize>,
    pub metadata: SyntheticMetadata,
}

// ============================================================================
// Coordinate Helpers
// ============================================================================

/// Meters per degree of latitude (approximately constant).
const METERS_PER_DEG_LAT: f64 = 111_320.0;

fn meters_to_deg_lat(meters: f64) -> f64 {
    meters / METERS_PER_DEG_LAT
}

fn meters_to_deg_lng(meters: f64, latitude: f64) -> f64 {
    let meters_per_deg_lng = METERS_PER_DEG_LAT * latitude.to_radians().cos();
    if meters_per_deg_lng.abs() < 1e-10 {
        return 0.0;
    }
    meters / meters_per_deg_lng
}

/// Pair of independent standard normal samples (Box-Muller).
fn gaussian_pair(rng: &mut StdRng) -> (f64, f64) {
    let u1: f64 = rng.gen_range(0.0001..1.0);
    let u2: f64 = rng.r#gen();
    let r = (-2.0 * u1.ln()).sqrt();
    (r * (2.0 * PI * u2).cos(), r * (2.0 * PI * u2).sin())
}

/// Species, genus and family labels for pool index `i`.
pub fn taxonomy_for(i: usize) -> (String, String, String) {
    let genus = format!("Genus{:02}", i / 3);
    let family = format!("Family{:02}", i / 9);
    (format!("{genus} sp{i:03}"), genus, family)
}

// ============================================================================
// Scenario Implementation
// ============================================================================

impl SyntheticScenario {
    /// Site centres on a square grid, jittered by up to a tenth of the spacing.
    fn site_centres(&self, rng: &mut StdRng) -> Vec<[f64; 2]> {
        let columns = (self.site_count as f64).sqrt().ceil().max(1.0) as usize;
        let jitter = self.site_spacing_meters * 0.1;
        (0..self.site_count)
            .map(|s| {
                let (col, row) = (s % columns, s / columns);
                let dx = if jitter > 0.0 { rng.gen_range(-jitter..jitter) } else { 0.0 };
                let dy = if jitter > 0.0 { rng.gen_range(-jitter..jitter) } else { 0.0 };
                [
                    col as f64 * self.site_spacing_meters + dx,
                    row as f64 * self.site_spacing_meters + dy,
                ]
            })
            .collect()
    }

    /// Generate a complete synthetic dataset from this scenario.
    pub fn generate(&self) -> SyntheticDataset {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let centres = self.site_centres(&mut rng);
        let pool = self.species_count.max(1);

        let total = self.site_count * self.observations_per_site;
        let mut observations = Vec::with_capacity(total);
        let mut site_of = Vec::with_capacity(total);
        let mut species_present = BTreeSet::new();

        for (site, centre) in centres.iter().enumerate() {
            for _ in 0..self.observations_per_site {
                let (zx, zy) = gaussian_pair(&mut rng);
                let x = centre[0] + zx * self.site_spread_meters;
                let y = centre[1] + zy * self.site_spread_meters;

                // Squaring a uniform sample skews abundance toward low indices
                let u: f64 = rng.r#gen();
                let species_idx = ((u * u) * pool as f64) as usize % pool;
                species_present.insert(species_idx);
                let (species, genus, family) = taxonomy_for(species_idx);

                let latitude = self.origin_latitude + meters_to_deg_lat(y);
                let longitude = self.origin_longitude + meters_to_deg_lng(x, latitude);

                let id = observations.len() as u64 + 1;
                observations.push(
                    Observation::new(id, x, y, species)
                        .with_location(latitude, longitude)
                        .with_taxonomy(genus, family),
                );
                site_of.push(site);
            }
        }

        SyntheticDataset {
            metadata: SyntheticMetadata {
                total_observations: observations.len(),
                species_present: species_present.len(),
                site_centres: centres,
            },
            observations,
            site_of,
        }
    }
}
