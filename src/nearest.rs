//! Nearest-shop lookup over business coordinates.

use geo::{Distance, Haversine, Point};
use rstar::primitives::GeomWithData;
use rstar::RTree;
use serde::Serialize;
use tracing::{debug, info};

use crate::models::Business;

/// Neighbors returned when the caller does not ask for a count
pub const DEFAULT_NEIGHBORS: usize = 5;
/// Upper bound on neighbors per query
pub const MAX_NEIGHBORS: usize = 20;

type ShopPoint = GeomWithData<[f64; 2], usize>;

/// Haversine kilometres per degree of latitude
const KM_PER_DEGREE: f64 = 111.195;

/// A neighbor and its great-circle distance from the selected shop
#[derive(Debug, Clone, Serialize)]
pub struct Neighbor {
    pub business_id: usize,
    pub distance_km: f64,
}

/// R-tree over business locations keyed by business id
pub struct ShopIndex {
    tree: RTree<ShopPoint>,
    /// Lower bound on km per planar degree anywhere in the index
    min_km_per_degree: f64,
}

impl ShopIndex {
    pub fn build(businesses: &[Business]) -> Self {
        let points: Vec<ShopPoint> = businesses
            .iter()
            .map(|b| GeomWithData::new([b.lon, b.lat], b.id))
            .collect();
        let max_abs_lat = businesses
            .iter()
            .map(|b| b.lat.abs())
            .fold(0.0_f64, f64::max)
            .min(89.0);
        let tree = RTree::bulk_load(points);
        info!("Shop index built with {} entries", tree.size());
        Self {
            tree,
            min_km_per_degree: KM_PER_DEGREE * max_abs_lat.to_radians().cos() * 0.99,
        }
    }

    /// The `k` businesses closest to `origin` by great-circle distance,
    /// excluding `origin` itself, nearest first.
    ///
    /// The tree yields candidates in planar lon/lat order, which differs from
    /// great-circle order away from the equator. Candidates are taken until
    /// the planar distance alone puts every remaining point beyond the k-th
    /// best great-circle distance.
    pub fn neighbors(&self, origin: &Business, k: usize) -> Vec<Neighbor> {
        let k = k.clamp(1, MAX_NEIGHBORS);
        let query = [origin.lon, origin.lat];
        let from = origin.point();

        let mut neighbors: Vec<Neighbor> = Vec::with_capacity(k + 1);
        let mut scanned = 0usize;

        for (p, planar_d2) in self.tree.nearest_neighbor_iter_with_distance_2(&query) {
            if neighbors.len() == k {
                let bound_km = planar_d2.sqrt() * self.min_km_per_degree;
                if bound_km > neighbors[k - 1].distance_km {
                    break;
                }
            }
            scanned += 1;
            if p.data == origin.id {
                continue;
            }

            let [lon, lat] = *p.geom();
            let distance_km = Haversine.distance(from, Point::new(lon, lat)) / 1000.0;
            let at = neighbors.partition_point(|n| n.distance_km <= distance_km);
            if at < k {
                neighbors.insert(
                    at,
                    Neighbor {
                        business_id: p.data,
                        distance_km,
                    },
                );
                neighbors.truncate(k);
            }
        }

        debug!(
            "Found {} neighbors for '{}' (k={}, scanned {})",
            neighbors.len(),
            origin.name,
            k,
            scanned
        );
        neighbors
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BusinessType;

    fn shop(id: usize, lon: f64, lat: f64) -> Business {
        Business {
            id,
            name: format!("Shop {}", id),
            address: None,
            city: None,
            state: None,
            postal_code: None,
            phone: None,
            lat,
            lon,
            business_type: BusinessType::Other,
            county: None,
        }
    }

    #[test]
    fn test_neighbors_exclude_origin_and_are_ordered() {
        let shops = vec![
            shop(0, -86.78, 36.16),
            shop(1, -86.70, 36.16),
            shop(2, -86.78, 36.20),
            shop(3, -85.00, 35.00),
            shop(4, -86.79, 36.16),
        ];
        let index = ShopIndex::build(&shops);
        assert_eq!(index.len(), 5);

        let neighbors = index.neighbors(&shops[0], 3);
        let ids: Vec<usize> = neighbors.iter().map(|n| n.business_id).collect();
        assert_eq!(ids, vec![4, 2, 1]);
        assert!(neighbors
            .windows(2)
            .all(|w| w[0].distance_km <= w[1].distance_km));
        assert!(neighbors[0].distance_km > 0.5 && neighbors[0].distance_km < 1.5);
    }

    #[test]
    fn test_neighbors_with_shared_coordinates() {
        // Same spot, different ids: only the origin id is excluded
        let shops = vec![shop(0, -86.0, 36.0), shop(1, -86.0, 36.0), shop(2, -86.5, 36.0)];
        let index = ShopIndex::build(&shops);
        let ids: Vec<usize> = index
            .neighbors(&shops[0], 5)
            .iter()
            .map(|n| n.business_id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_east_west_neighbor_beats_closer_planar_one() {
        // 0.1 degrees of longitude at 36N is ~9.0 km; 0.091 of latitude is ~10.1 km
        let shops = vec![
            shop(0, -86.0, 36.0),
            shop(1, -85.90, 36.0),
            shop(2, -86.0, 36.091),
        ];
        let index = ShopIndex::build(&shops);

        let nearest = index.neighbors(&shops[0], 1);
        assert_eq!(nearest.len(), 1);
        assert_eq!(nearest[0].business_id, 1);
        assert!((nearest[0].distance_km - 9.0).abs() < 0.1);

        let both = index.neighbors(&shops[0], 2);
        let ids: Vec<usize> = both.iter().map(|n| n.business_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(both[0].distance_km < both[1].distance_km);
    }

    #[test]
    fn test_k_is_capped() {
        let shops: Vec<Business> = (0..30)
            .map(|i| shop(i, -86.0 + i as f64 * 0.01, 36.0))
            .collect();
        let index = ShopIndex::build(&shops);
        assert_eq!(index.neighbors(&shops[0], 100).len(), MAX_NEIGHBORS);
    }
}
