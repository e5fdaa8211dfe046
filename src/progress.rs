//! Progress callback for dataset preparation phases.
//!
//! Implementations receive phase transitions and per-item progress updates.
//! A callback may be shared across threads, so implementations must be
//! `Send + Sync`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Pipeline phases, ordered by execution sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Per-species singleton and duplicate removal
    Deduplicating,
    /// Radius queries for every observation
    FindingOverlaps,
    /// Band assignment and buffer verification, one item per band
    BandSplitting,
    /// Union-find, isolation distances and rebalancing
    Clustering,
    /// Vocabulary and row assembly
    Encoding,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Deduplicating => "deduplicating",
            PipelinePhase::FindingOverlaps => "finding_overlaps",
            PipelinePhase::BandSplitting => "band_splitting",
            PipelinePhase::Clustering => "clustering",
            PipelinePhase::Encoding => "encoding",
        }
    }
}

/// Receives progress updates while a dataset is built.
pub trait ProgressCallback: Send + Sync {
    /// Called when entering a new phase. `total` is the number of items in this phase.
    fn on_phase(&self, phase: PipelinePhase, total: u32);
    /// Called after completing one item in the current phase.
    fn on_progress(&self);
}

pub struct NoopProgress;

impl ProgressCallback for NoopProgress {
    fn on_phase(&self, _phase: PipelinePhase, _total: u32) {}
    fn on_progress(&self) {}
}

/// Progress tracker that can be polled from another thread.
pub struct AtomicProgressTracker {
    pub phase: Mutex<String>,
    pub completed: AtomicU32,
    pub total: AtomicU32,
    /// Phases seen so far, in order
    pub history: Mutex<Vec<PipelinePhase>>,
}

impl Default for AtomicProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicProgressTracker {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(String::new()),
            completed: AtomicU32::new(0),
            total: AtomicU32::new(0),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn phases(&self) -> Vec<PipelinePhase> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

impl ProgressCallback for AtomicProgressTracker {
    fn on_phase(&self, phase: PipelinePhase, total: u32) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase.as_str().to_string();
        }
        if let Ok(mut history) = self.history.lock() {
            history.push(phase);
        }
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    fn on_progress(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}
