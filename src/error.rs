//! Unified error handling for the split engine.
//!
//! Every variant is fatal to a run. A leakage-control pass has no partial
//! success mode: a silently wrong split invalidates every downstream
//! experiment, so callers should surface these errors rather than recover.

use thiserror::Error;

use crate::ObservationId;

/// Errors produced while building co-occurrence sets and splits.
#[derive(Debug, Error)]
pub enum SplitError {
    /// A configuration value lies outside its valid physical range.
    #[error("invalid configuration: {field} = {value} ({reason})")]
    Configuration {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// A radius query saturated the neighbor bound K.
    #[error(
        "radius query of {radius} m at ({x:.1}, {y:.1}) reached the neighbor bound of {bound}; increase max_neighbors"
    )]
    InsufficientNeighbors {
        x: f64,
        y: f64,
        radius: f64,
        bound: usize,
    },

    /// A co-occurrence cluster contains every observation in the table.
    #[error(
        "cluster {cluster_id} spans all {size} observations; the co-occurrence radius is too large for the data extent"
    )]
    DegenerateCluster { cluster_id: usize, size: usize },

    /// Band geometry cannot guarantee separation between train and test.
    #[error("band geometry inconsistent{}: {reason}", .band.map(|b| format!(" in band {b}")).unwrap_or_default())]
    GeometryInconsistency { band: Option<usize>, reason: String },

    /// Two observations share the same id.
    #[error("duplicate observation id {0}")]
    DuplicateObservationId(ObservationId),

    /// An observation coordinate is NaN or infinite.
    #[error("observation {id} has non-finite {field} ({value})")]
    NonFiniteCoordinate {
        id: ObservationId,
        field: &'static str,
        value: f64,
    },

    /// An overlap set references an id that is not in the table.
    #[error("overlap set of observation {owner} references unknown observation {missing}")]
    UnknownObservation {
        owner: ObservationId,
        missing: ObservationId,
    },

    /// `b` is in the overlap set of `a` but not the other way around.
    #[error("overlap sets are not symmetric: {b} overlaps {a} but {a} does not overlap {b}")]
    AsymmetricOverlap { a: ObservationId, b: ObservationId },
}

impl SplitError {
    /// Shorthand for a [`SplitError::Configuration`] error.
    pub fn config(field: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        SplitError::Configuration {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SplitError>;

/// Convert missing lookups into [`SplitError::UnknownObservation`].
pub trait OptionExt<T> {
    fn ok_or_unknown_observation(self, owner: ObservationId, missing: ObservationId) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_unknown_observation(self, owner: ObservationId, missing: ObservationId) -> Result<T> {
        self.ok_or(SplitError::UnknownObservation { owner, missing })
    }
}
