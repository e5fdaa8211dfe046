//! Planar nearest-neighbor search.
//!
//! Wraps an R-tree of indexed points. The metric is plain Euclidean
//! distance, so callers must project coordinates into an equal-distance-per-axis
//! system (metres for co-occurrence work, degrees of latitude for band
//! verification) before building the index.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::error::{Result, SplitError};

/// Default neighbor bound K for radius queries.
pub const DEFAULT_MAX_NEIGHBORS: usize = 2000;

/// A point with its position in the source table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedPoint {
    pub idx: usize,
    pub x: f64,
    pub y: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y])
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        dx * dx + dy * dy
    }
}

/// One neighbor of a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Position of the neighbor in the indexed point set
    pub idx: usize,
    /// Euclidean distance to the query point
    pub distance: f64,
}

/// Neighbors of one query point, ascending by distance.
pub type NeighborResult = Vec<Neighbor>;

/// Static R-tree over a point set with a configured neighbor bound.
#[derive(Debug)]
pub struct SpatialIndex {
    tree: RTree<IndexedPoint>,
    max_neighbors: usize,
}

impl SpatialIndex {
    /// Bulk-load an index. Point `i` is reported back as `idx == i`.
    pub fn build(points: &[[f64; 2]], max_neighbors: usize) -> Self {
        let indexed: Vec<IndexedPoint> = points
            .iter()
            .enumerate()
            .map(|(idx, p)| IndexedPoint {
                idx,
                x: p[0],
                y: p[1],
            })
            .collect();

        Self {
            tree: RTree::bulk_load(indexed),
            max_neighbors,
        }
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// The bound K used by radius queries.
    pub fn max_neighbors(&self) -> usize {
        self.max_neighbors
    }

    /// The `k` nearest points (the query point itself included if indexed).
    ///
    /// Equal distances are ordered by index so results are reproducible.
    pub fn query_knn(&self, point: [f64; 2], k: usize) -> NeighborResult {
        let mut neighbors: NeighborResult = self
            .tree
            .nearest_neighbor_iter_with_distance_2(&point)
            .take(k)
            .map(|(p, d2)| Neighbor {
                idx: p.idx,
                distance: d2.sqrt(),
            })
            .collect();
        sort_neighbors(&mut neighbors);
        neighbors
    }

    /// All points within `radius` (inclusive), via a K-bounded knn query.
    ///
    /// Fails with [`SplitError::InsufficientNeighbors`] when the in-radius
    /// count reaches K, since the result may have been truncated.
    pub fn query_radius(&self, point: [f64; 2], radius: f64) -> Result<NeighborResult> {
        let mut neighbors = self.query_knn(point, self.max_neighbors);
        neighbors.retain(|n| n.distance <= radius);

        if neighbors.len() >= self.max_neighbors {
            return Err(SplitError::InsufficientNeighbors {
                x: point[0],
                y: point[1],
                radius,
                bound: self.max_neighbors,
            });
        }
        Ok(neighbors)
    }

    /// Radius query for every point in `points`.
    pub fn query_radius_batch(
        &self,
        points: &[[f64; 2]],
        radius: f64,
    ) -> Result<Vec<NeighborResult>> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            points
                .par_iter()
                .map(|p| self.query_radius(*p, radius))
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            points
                .iter()
                .map(|p| self.query_radius(*p, radius))
                .collect()
        }
    }

    /// The single nearest point.
    pub fn nearest(&self, point: [f64; 2]) -> Option<Neighbor> {
        self.nearest_excluding(point, |_| false)
    }

    /// Nearest point whose index is not excluded.
    ///
    /// Walks the tree outward without any K bound, visiting every excluded
    /// point nearer than the answer. Use [`SpatialIndex::nearest_outside`]
    /// when the excluded set is a large group of indexed points.
    pub fn nearest_excluding<F>(&self, point: [f64; 2], is_excluded: F) -> Option<Neighbor>
    where
        F: Fn(usize) -> bool,
    {
        self.tree
            .nearest_neighbor_iter_with_distance_2(&point)
            .find(|(p, _)| !is_excluded(p.idx))
            .map(|(p, d2)| Neighbor {
                idx: p.idx,
                distance: d2.sqrt(),
            })
    }

    /// Nearest point outside `group` for each member of `group`, in order.
    ///
    /// `points` must be the slice the index was built from. The group is
    /// taken out of the tree for the lookups and re-inserted afterwards, so
    /// each lookup is O(log n) however many members surround it.
    pub fn nearest_outside(
        &mut self,
        group: &[usize],
        points: &[[f64; 2]],
    ) -> Vec<Option<Neighbor>> {
        let removed: Vec<IndexedPoint> = group
            .iter()
            .filter_map(|&idx| {
                let [x, y] = points[idx];
                self.tree.remove(&IndexedPoint { idx, x, y })
            })
            .collect();

        let nearest = group
            .iter()
            .map(|&idx| {
                self.tree
                    .nearest_neighbor_iter_with_distance_2(&points[idx])
                    .next()
                    .map(|(p, d2)| Neighbor {
                        idx: p.idx,
                        distance: d2.sqrt(),
                    })
            })
            .collect();

        for point in removed {
            self.tree.insert(point);
        }
        nearest
    }

    /// Nearest point strictly farther than `radius`.
    pub fn nearest_beyond(&self, point: [f64; 2], radius: f64) -> Option<Neighbor> {
        self.tree
            .nearest_neighbor_iter_with_distance_2(&point)
            .find(|(_, d2)| d2.sqrt() > radius)
            .map(|(p, d2)| Neighbor {
                idx: p.idx,
                distance: d2.sqrt(),
            })
    }
}

fn sort_neighbors(neighbors: &mut [Neighbor]) {
    neighbors.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.idx.cmp(&b.idx))
    });
}
