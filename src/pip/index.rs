//! Spatial index for fast boundary lookups.

use geo::{Contains, Point};
use rstar::{RTree, RTreeObject, AABB};
use std::sync::Arc;
use tracing::info;

use crate::models::Boundary;

/// Wrapper for R-tree indexing of boundaries
#[derive(Clone)]
pub struct IndexedBoundary {
    pub boundary: Arc<Boundary>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedBoundary {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedBoundary {
    pub fn new(boundary: Boundary) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = boundary.bbox()?;
        Some(Self {
            boundary: Arc::new(boundary),
            envelope: AABB::from_corners([min_x, min_y], [max_x, max_y]),
        })
    }
}

/// Spatial index for one boundary layer using R-tree
pub struct BoundaryIndex {
    tree: RTree<IndexedBoundary>,
}

impl BoundaryIndex {
    /// Build spatial index from boundaries
    pub fn build(boundaries: Vec<Boundary>) -> Self {
        let indexed: Vec<IndexedBoundary> = boundaries
            .into_iter()
            .filter_map(IndexedBoundary::new)
            .collect();

        let tree = RTree::bulk_load(indexed);
        info!("Boundary index built with {} entries", tree.size());

        Self { tree }
    }

    /// Find the boundary containing a point
    pub fn lookup(&self, lon: f64, lat: f64) -> Option<Arc<Boundary>> {
        let point = Point::new(lon, lat);
        let query_envelope = AABB::from_point([lon, lat]);

        // Envelope candidates first, then exact containment
        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .find(|ib| ib.boundary.geometry.contains(&point))
            .map(|ib| Arc::clone(&ib.boundary))
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
