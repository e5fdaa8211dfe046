//! Cluster-based train/test split.
//!
//! Observations linked transitively by co-occurrence form a cluster. A
//! cluster goes to the test split only when every outside observation is
//! farther than the exclusion distance, so no test observation can share
//! covariates or imagery with a training observation. Whole clusters are then
//! moved back to train at random until the test fraction respects its cap.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result, SplitError};
use crate::overlap::OverlapTable;
use crate::spatial_index::SpatialIndex;
use crate::union_find::UnionFind;
use crate::{ObservationId, SplitConfig};

/// Cluster identifier, assigned in discovery order starting at 0.
pub type ClusterId = usize;

/// Which partition an observation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitLabel {
    Train,
    Test,
}

impl SplitLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitLabel::Train => "train",
            SplitLabel::Test => "test",
        }
    }
}

impl fmt::Display for SplitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A connected component of the overlap graph.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: ClusterId,
    /// Row indices of the members, ascending
    pub members: Vec<usize>,
    /// First member in table order; its location stands in for the cluster
    pub representative: usize,
    pub latitude: f64,
    pub longitude: f64,
    /// Minimum distance from any member to any non-member (metres)
    pub next_dist: f64,
    pub label: SplitLabel,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn summary(&self) -> ClusterSummary {
        ClusterSummary {
            next_dist: self.next_dist,
            size: self.size(),
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Persisted description of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub next_dist: f64,
    pub size: usize,
    pub latitude: f64,
    pub longitude: f64,
}

/// Split columns for one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitAssignment {
    pub label: SplitLabel,
    pub cluster_id: ClusterId,
    /// The owning cluster's `next_dist`
    pub cluster_next_dist: f64,
    /// This observation's own distance to the nearest non-member
    pub member_next_dist: f64,
    /// Distance to the nearest observation outside the co-occurrence radius
    pub neighbor_dist: Option<f64>,
}

/// Result of a cluster split.
#[derive(Debug, Clone, Default)]
pub struct ClusterSplit {
    /// One entry per row of the input table
    pub assignments: Vec<SplitAssignment>,
    pub clusters: Vec<Cluster>,
    /// Test fraction before rebalancing
    pub initial_test_fraction: f64,
    /// Clusters moved from test to train, in relabel order
    pub relabeled: Vec<ClusterId>,
}

impl ClusterSplit {
    pub fn test_count(&self) -> usize {
        self.assignments
            .iter()
            .filter(|a| a.label == SplitLabel::Test)
            .count()
    }

    pub fn test_fraction(&self) -> f64 {
        if self.assignments.is_empty() {
            return 0.0;
        }
        self.test_count() as f64 / self.assignments.len() as f64
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id)
    }

    /// Ids of the clusters currently labelled test, ascending.
    pub fn test_clusters(&self) -> Vec<ClusterId> {
        self.clusters
            .iter()
            .filter(|c| c.label == SplitLabel::Test)
            .map(|c| c.id)
            .collect()
    }

    /// Summaries of the clusters with the given label.
    pub fn summaries(&self, label: SplitLabel) -> BTreeMap<ClusterId, ClusterSummary> {
        self.clusters
            .iter()
            .filter(|c| c.label == label)
            .map(|c| (c.id, c.summary()))
            .collect()
    }

    fn relabel(&mut self, id: ClusterId, label: SplitLabel) {
        let cluster = &mut self.clusters[id];
        cluster.label = label;
        for &member in &cluster.members {
            self.assignments[member].label = label;
        }
    }
}

/// Assigns co-occurrence clusters to train or test.
#[derive(Debug, Clone)]
pub struct ClusterSplitter {
    exclusion_distance: f64,
    test_fraction_cap: f64,
    overlap_radius: f64,
}

impl ClusterSplitter {
    pub fn new(exclusion_distance: f64, test_fraction_cap: f64, overlap_radius: f64) -> Self {
        Self {
            exclusion_distance,
            test_fraction_cap,
            overlap_radius,
        }
    }

    pub fn from_config(config: &SplitConfig) -> Self {
        Self::new(
            config.exclusion_distance_m,
            config.test_fraction_cap,
            config.overlap_radius(),
        )
    }

    /// Connected components of the overlap sets, as row indices.
    ///
    /// Fails if a set references an unknown id or the sets are not
    /// symmetric. Components are ordered by their first row.
    pub fn find_clusters(&self, table: &OverlapTable) -> Result<Vec<Vec<usize>>> {
        let index_of: HashMap<ObservationId, usize> = table
            .observations
            .iter()
            .enumerate()
            .map(|(idx, obs)| (obs.id, idx))
            .collect();

        let mut uf = UnionFind::new(table.len());
        for (idx, columns) in table.overlaps.iter().enumerate() {
            let owner = table.observations[idx].id;
            for &other_id in &columns.overlapping_ids {
                let other = index_of
                    .get(&other_id)
                    .copied()
                    .ok_or_unknown_observation(owner, other_id)?;
                if !table.overlaps[other].overlapping_ids.contains(&owner) {
                    return Err(SplitError::AsymmetricOverlap {
                        a: other_id,
                        b: owner,
                    });
                }
                uf.union(idx, other);
            }
        }

        Ok(uf.components())
    }

    /// Cluster the table, label clusters by isolation, then rebalance.
    pub fn split<R: Rng + ?Sized>(&self, table: &OverlapTable, rng: &mut R) -> Result<ClusterSplit> {
        let n = table.len();
        if n == 0 {
            return Ok(ClusterSplit::default());
        }

        let components = self.find_clusters(table)?;

        let points: Vec<[f64; 2]> = table.observations.iter().map(|o| o.point()).collect();
        let mut index = SpatialIndex::build(&points, n);

        let mut cluster_of = vec![0usize; n];
        for (id, members) in components.iter().enumerate() {
            for &member in members {
                cluster_of[member] = id;
            }
        }

        let mut member_dist = vec![0.0f64; n];
        let mut clusters = Vec::with_capacity(components.len());

        for (id, members) in components.into_iter().enumerate() {
            if members.len() == n {
                return Err(SplitError::DegenerateCluster {
                    cluster_id: id,
                    size: n,
                });
            }

            let mut next_dist = f64::INFINITY;
            let outside = index.nearest_outside(&members, &points);
            for (&member, nearest) in members.iter().zip(outside) {
                let nearest = nearest.ok_or(SplitError::DegenerateCluster {
                    cluster_id: id,
                    size: members.len(),
                })?;
                member_dist[member] = nearest.distance;
                next_dist = next_dist.min(nearest.distance);
            }

            let representative = members[0];
            let rep = &table.observations[representative];
            let label = if next_dist > self.exclusion_distance {
                SplitLabel::Test
            } else {
                SplitLabel::Train
            };

            clusters.push(Cluster {
                id,
                members,
                representative,
                latitude: rep.latitude,
                longitude: rep.longitude,
                next_dist,
                label,
            });
        }

        let assignments = (0..n)
            .map(|idx| {
                let cluster = &clusters[cluster_of[idx]];
                SplitAssignment {
                    label: cluster.label,
                    cluster_id: cluster.id,
                    cluster_next_dist: cluster.next_dist,
                    member_next_dist: member_dist[idx],
                    neighbor_dist: index
                        .nearest_beyond(points[idx], self.overlap_radius)
                        .map(|nb| nb.distance),
                }
            })
            .collect();

        let mut split = ClusterSplit {
            assignments,
            clusters,
            initial_test_fraction: 0.0,
            relabeled: Vec::new(),
        };
        split.initial_test_fraction = split.test_fraction();

        info!(
            "[Clusters] {} clusters over {} observations, {} test clusters ({:.2}% of observations) at exclusion distance {} m",
            split.clusters.len(),
            n,
            split.test_clusters().len(),
            split.initial_test_fraction * 100.0,
            self.exclusion_distance
        );

        self.rebalance(&mut split, rng);
        Ok(split)
    }

    /// Move random test clusters to train until the test fraction is at or
    /// below the cap.
    ///
    /// Only test -> train moves happen and the last test cluster is never
    /// moved, so the final fraction is at most the cap plus one cluster.
    /// Returns the relabelled cluster ids.
    pub fn rebalance<R: Rng + ?Sized>(&self, split: &mut ClusterSplit, rng: &mut R) -> Vec<ClusterId> {
        let total = split.assignments.len();
        if total == 0 {
            return Vec::new();
        }

        let mut test_clusters = split.test_clusters();
        let mut test_count = split.test_count();
        let mut moved = Vec::new();

        if test_count as f64 / total as f64 > self.test_fraction_cap {
            info!(
                "[Clusters] Trimming test set from {:.3}% of dataset to {:.3}%",
                test_count as f64 / total as f64 * 100.0,
                self.test_fraction_cap * 100.0
            );
        }

        while test_count as f64 / total as f64 > self.test_fraction_cap && test_clusters.len() > 1
        {
            let pick = rng.gen_range(0..test_clusters.len());
            let id = test_clusters.remove(pick);
            test_count -= split.clusters[id].size();
            split.relabel(id, SplitLabel::Train);
            debug!(
                "[Clusters] Relabelled cluster {} ({} observations) to train",
                id,
                split.clusters[id].size()
            );
            moved.push(id);
        }

        if test_count as f64 / total as f64 > self.test_fraction_cap {
            warn!(
                "[Clusters] Single remaining test cluster holds {:.3}% of observations, above the {:.3}% cap",
                test_count as f64 / total as f64 * 100.0,
                self.test_fraction_cap * 100.0
            );
        }

        split.relabeled.extend(moved.iter().copied());
        moved
    }
}
