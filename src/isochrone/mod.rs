//! Drive-time polygons from the OpenRouteService isochrones API.
//!
//! `OrsClient` talks to the API, `IsochroneCache` keeps results per
//! (business, minutes) for the lifetime of the process.

mod cache;
mod client;

pub use cache::{IsochroneCache, IsochroneKey};
pub use client::{IsochroneError, OrsClient, OrsSettings, MAX_MINUTES, MIN_MINUTES};

#[cfg(test)]
pub(crate) use client::tests as test_support;

use geo::{Contains, MultiPolygon, Point};
use geojson::{Feature, JsonObject};

/// A polygon reachable from a business within a drive time
#[derive(Debug, Clone)]
pub struct Isochrone {
    pub business_id: usize,
    /// Origin as (lon, lat)
    pub origin: Point<f64>,
    pub minutes: u32,
    pub geometry: MultiPolygon<f64>,
}

impl Isochrone {
    pub fn contains_origin(&self) -> bool {
        self.geometry.contains(&self.origin)
    }

    pub fn key(&self) -> IsochroneKey {
        IsochroneKey {
            business_id: self.business_id,
            minutes: self.minutes,
        }
    }

    /// GeoJSON feature for the map overlay and on-disk export
    pub fn to_feature(&self) -> Feature {
        let mut props = JsonObject::new();
        props.insert("business_id".to_string(), self.business_id.into());
        props.insert("minutes".to_string(), self.minutes.into());
        props.insert(
            "center".to_string(),
            serde_json::json!([self.origin.x(), self.origin.y()]),
        );
        Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&self.geometry))),
            id: None,
            properties: Some(props),
            foreign_members: None,
        }
    }

    /// Inverse of [`Isochrone::to_feature`]
    pub fn from_feature(feature: &Feature) -> Option<Self> {
        let props = feature.properties.as_ref()?;
        let business_id = props.get("business_id")?.as_u64()? as usize;
        let minutes = props.get("minutes")?.as_u64()? as u32;
        let center = props.get("center")?.as_array()?;
        let lon = center.first()?.as_f64()?;
        let lat = center.get(1)?.as_f64()?;
        let geometry = client::feature_polygons(feature)?;
        Some(Self {
            business_id,
            origin: Point::new(lon, lat),
            minutes,
            geometry,
        })
    }
}
