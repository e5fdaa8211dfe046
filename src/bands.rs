//! Latitude-banded geographic split.
//!
//! The latitude range is cut into fixed-width bands. For each band the
//! interior (minus a buffer strip on both edges) is the test region and
//! everything outside the band is the training region. Bands are independent
//! partitions: every observation gets one train/test flag pair per band.

use geo::{coord, Coord, Intersects, Rect};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SplitError};
use crate::spatial_index::SpatialIndex;
use crate::{Observation, SplitConfig, KM_TO_DEG};

/// Slack for floating point comparisons in degree space.
const VERIFY_TOLERANCE: f64 = 1e-9;

/// One latitude band and its buffer edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub index: usize,
    pub lat_low: f64,
    pub lat_high: f64,
    /// Top of the lower buffer strip (bottom of the test region)
    pub exclusion_low: f64,
    /// Bottom of the upper buffer strip (top of the test region)
    pub exclusion_high: f64,
}

impl Band {
    /// Train, test and exclusion rectangles spanning `[lon_min, lon_max]`
    /// within the overall `[lat_min, lat_max]` range.
    pub fn regions(&self, lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> BandRegions {
        let rect = |low: f64, high: f64| {
            Rect::new(
                coord! { x: lon_min, y: low },
                coord! { x: lon_max, y: high },
            )
        };
        BandRegions {
            index: self.index,
            train: [
                rect(lat_min, self.lat_low),
                rect(self.lat_high, lat_max.max(self.lat_high)),
            ],
            test: rect(self.exclusion_low, self.exclusion_high),
            exclusion: [
                rect(self.lat_low, self.exclusion_low),
                rect(self.exclusion_high, self.lat_high),
            ],
        }
    }
}

/// Region of a band a point falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandZone {
    Train,
    Test,
    Buffer,
}

/// Rectangular regions of one band, in `(longitude, latitude)` space.
#[derive(Debug, Clone, PartialEq)]
pub struct BandRegions {
    pub index: usize,
    /// Below and above the band
    pub train: [Rect<f64>; 2],
    pub test: Rect<f64>,
    /// Lower and upper buffer strips
    pub exclusion: [Rect<f64>; 2],
}

impl BandRegions {
    pub fn zone(&self, point: Coord<f64>) -> BandZone {
        if self.test.intersects(&point) {
            BandZone::Test
        } else if self.train.iter().any(|r| r.intersects(&point)) {
            BandZone::Train
        } else {
            BandZone::Buffer
        }
    }
}

/// Train/test flags of one observation for one band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandMembership {
    pub train: bool,
    pub test: bool,
}

/// Verification outcome for one band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandReport {
    pub band: Band,
    pub train_count: usize,
    pub test_count: usize,
    /// Minimum test-to-train distance in degrees (None if either side is empty)
    pub min_separation_deg: Option<f64>,
}

/// Result of a band split.
#[derive(Debug, Clone, Default)]
pub struct BandSplit {
    pub bands: Vec<Band>,
    /// `membership[row][band]`
    pub membership: Vec<Vec<BandMembership>>,
    pub reports: Vec<BandReport>,
}

/// Builds latitude bands with buffer zones.
#[derive(Debug, Clone)]
pub struct BandSplitter {
    band_width: f64,
    buffer: f64,
    lat_range: Option<(f64, f64)>,
}

impl BandSplitter {
    /// Create a splitter, rejecting geometry that could leak covariates.
    ///
    /// The buffer must be at least the diagonal of one covariate cell, and
    /// the band must be wider than its two buffers.
    pub fn new(band_width: f64, buffer: f64, covariate_cell: f64) -> Result<Self> {
        let cell_diagonal = covariate_cell * std::f64::consts::SQRT_2;
        if buffer < cell_diagonal {
            return Err(SplitError::GeometryInconsistency {
                band: None,
                reason: format!(
                    "buffer of {buffer} deg is narrower than the covariate cell diagonal of {cell_diagonal:.5} deg"
                ),
            });
        }
        if !(band_width > 2.0 * buffer) {
            return Err(SplitError::config(
                "band_width_deg",
                band_width,
                format!("must exceed twice the buffer width ({})", 2.0 * buffer),
            ));
        }
        Ok(Self {
            band_width,
            buffer,
            lat_range: None,
        })
    }

    pub fn from_config(config: &SplitConfig) -> Result<Self> {
        Ok(Self::new(
            config.band_width_deg,
            config.band_buffer_deg,
            config.covariate_cell_deg,
        )?
        .with_lat_range(config.band_lat_range))
    }

    /// Fix the latitude range instead of using the data extent.
    pub fn with_lat_range(mut self, lat_range: Option<(f64, f64)>) -> Self {
        self.lat_range = lat_range;
        self
    }

    pub fn buffer(&self) -> f64 {
        self.buffer
    }

    /// Bands covering `[lat_min, lat_max)`, starting at `lat_min`.
    pub fn bands_for_range(&self, lat_min: f64, lat_max: f64) -> Vec<Band> {
        let mut bands = Vec::new();
        let mut index = 0;
        loop {
            let lat_low = lat_min + index as f64 * self.band_width;
            if lat_low >= lat_max {
                break;
            }
            let lat_high = lat_low + self.band_width;
            bands.push(Band {
                index,
                lat_low,
                lat_high,
                exclusion_low: lat_low + self.buffer,
                exclusion_high: lat_high - self.buffer,
            });
            index += 1;
        }
        bands
    }

    /// Bands for the configured range, or the data's latitude extent.
    pub fn bands(&self, observations: &[Observation]) -> Vec<Band> {
        match self.lat_range(observations) {
            Some((low, high)) if high > low => self.bands_for_range(low, high),
            // All observations on one parallel still get one band
            Some((low, _)) => self.bands_for_range(low, low + self.band_width),
            None => Vec::new(),
        }
    }

    /// Rectangles for every band, spanning the data's longitude extent.
    pub fn band_regions(&self, observations: &[Observation]) -> Vec<BandRegions> {
        let Some((lat_min, lat_max)) = self.lat_range(observations) else {
            return Vec::new();
        };
        let (lon_min, lon_max) = extent(observations.iter().map(|o| o.longitude))
            .unwrap_or((0.0, 0.0));
        self.bands(observations)
            .iter()
            .map(|band| band.regions(lon_min, lon_max, lat_min, lat_max))
            .collect()
    }

    /// Assign every observation to each band's train/test regions and verify
    /// that test and train stay at least one buffer apart.
    pub fn split(&self, observations: &[Observation]) -> Result<BandSplit> {
        let bands = self.bands(observations);
        let regions = self.band_regions(observations);
        let points: Vec<Coord<f64>> = observations
            .iter()
            .map(|o| coord! { x: o.longitude, y: o.latitude })
            .collect();

        let mut membership = vec![vec![BandMembership::default(); bands.len()]; observations.len()];
        let mut reports = Vec::with_capacity(bands.len());

        for (band, region) in bands.iter().zip(&regions) {
            let mut train_pts = Vec::new();
            let mut test_pts = Vec::new();

            for (row, point) in points.iter().enumerate() {
                match region.zone(*point) {
                    BandZone::Train => {
                        membership[row][band.index].train = true;
                        train_pts.push([point.x, point.y]);
                    }
                    BandZone::Test => {
                        membership[row][band.index].test = true;
                        test_pts.push([point.x, point.y]);
                    }
                    BandZone::Buffer => {}
                }
            }

            let report = self.verify(band, &train_pts, &test_pts)?;
            reports.push(report);
        }

        Ok(BandSplit {
            bands,
            membership,
            reports,
        })
    }

    /// Minimum distance between a band's test and train points.
    ///
    /// Points are `[longitude, latitude]`. Fails with
    /// [`SplitError::GeometryInconsistency`] when any test point lies closer
    /// than the buffer to a train point.
    pub fn verify(&self, band: &Band, train: &[[f64; 2]], test: &[[f64; 2]]) -> Result<BandReport> {
        let min_separation_deg = if train.is_empty() || test.is_empty() {
            None
        } else {
            let index = SpatialIndex::build(train, 1);
            test.iter()
                .filter_map(|p| index.nearest(*p))
                .map(|n| n.distance)
                .min_by(f64::total_cmp)
        };

        let total = (train.len() + test.len()).max(1) as f64;
        match min_separation_deg {
            Some(dist) => info!(
                "[Bands] band {}: {} training points, {} testing points, {:.3}% train, {:.3}% test, {:.3} km between test and train",
                band.index,
                train.len(),
                test.len(),
                train.len() as f64 / total * 100.0,
                test.len() as f64 / total * 100.0,
                dist / KM_TO_DEG
            ),
            None => info!(
                "[Bands] band {}: {} training points, {} testing points, nothing to verify",
                band.index,
                train.len(),
                test.len()
            ),
        }

        if let Some(dist) = min_separation_deg {
            if dist + VERIFY_TOLERANCE < self.buffer {
                return Err(SplitError::GeometryInconsistency {
                    band: Some(band.index),
                    reason: format!(
                        "test and train points are {dist} deg apart, less than the {} deg buffer",
                        self.buffer
                    ),
                });
            }
        }

        Ok(BandReport {
            band: *band,
            train_count: train.len(),
            test_count: test.len(),
            min_separation_deg,
        })
    }

    fn lat_range(&self, observations: &[Observation]) -> Option<(f64, f64)> {
        self.lat_range
            .or_else(|| extent(observations.iter().map(|o| o.latitude)))
    }
}

fn extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}
