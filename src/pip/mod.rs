//! Point-in-Polygon (PIP) boundary lookup.
//!
//! Indexes boundary polygons in an R-tree and resolves the boundary
//! that contains a coordinate.

mod index;
mod service;

pub use index::BoundaryIndex;
pub use service::CountyResolver;
