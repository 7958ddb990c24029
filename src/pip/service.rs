//! Assigns each business the county that contains it.

use tracing::{debug, info};

use super::BoundaryIndex;
use crate::models::{Boundary, Business};

/// Point-in-Polygon county resolver
pub struct CountyResolver {
    index: BoundaryIndex,
}

impl CountyResolver {
    pub fn new(counties: Vec<Boundary>) -> Self {
        Self {
            index: BoundaryIndex::build(counties),
        }
    }

    /// County name for a coordinate
    pub fn county_at(&self, lon: f64, lat: f64) -> Option<String> {
        self.index.lookup(lon, lat).map(|b| b.name.clone())
    }

    /// Fill in `county` for every business; returns how many were resolved
    pub fn assign(&self, businesses: &mut [Business]) -> usize {
        let mut resolved = 0;
        for business in businesses.iter_mut() {
            business.county = self.county_at(business.lon, business.lat);
            match &business.county {
                Some(_) => resolved += 1,
                None => debug!(
                    "No county contains '{}' at ({}, {})",
                    business.name, business.lon, business.lat
                ),
            }
        }
        info!(
            "Resolved counties for {}/{} businesses",
            resolved,
            businesses.len()
        );
        resolved
    }

    pub fn index(&self) -> &BoundaryIndex {
        &self.index
    }
}
