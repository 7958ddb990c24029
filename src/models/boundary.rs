//! Geographic boundary layers drawn under the business markers.

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Boundary layer selectable on the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoLayer {
    /// County boundaries
    Counties,
    /// Hospital service areas
    Hsas,
    /// Hospital referral regions
    Hrrs,
}

impl GeoLayer {
    pub fn all() -> &'static [GeoLayer] {
        &[GeoLayer::Counties, GeoLayer::Hsas, GeoLayer::Hrrs]
    }

    /// Human-readable layer name
    pub fn title(&self) -> &'static str {
        match self {
            GeoLayer::Counties => "Counties",
            GeoLayer::Hsas => "HSAs",
            GeoLayer::Hrrs => "HRRs",
        }
    }

    /// Attribute names that may hold a feature's display name, in priority order
    pub fn name_fields(&self) -> &'static [&'static str] {
        match self {
            GeoLayer::Counties => &["NAME", "name", "cntyname", "COUNTYNAME", "NAMELSAD"],
            GeoLayer::Hsas => &["hsaname", "HSANAME", "hsacity", "HSACITY", "NAME", "name"],
            GeoLayer::Hrrs => &["hrrcity", "HRRCITY", "hrrname", "HRRNAME", "NAME", "name"],
        }
    }

    /// Attribute names that may hold a feature's identifier
    pub fn id_fields(&self) -> &'static [&'static str] {
        match self {
            GeoLayer::Counties => &["GEOID", "geoid", "COUNTYFP", "countyfp"],
            GeoLayer::Hsas => &["hsanum", "HSANUM", "hsa", "HSA"],
            GeoLayer::Hrrs => &["hrrnum", "HRRNUM", "hrr", "HRR"],
        }
    }
}

impl fmt::Display for GeoLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for GeoLayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "counties" | "county" => Ok(GeoLayer::Counties),
            "hsas" | "hsa" => Ok(GeoLayer::Hsas),
            "hrrs" | "hrr" => Ok(GeoLayer::Hrrs),
            other => Err(format!("unknown layer '{}'", other)),
        }
    }
}

/// A single boundary polygon with metadata
#[derive(Debug, Clone)]
pub struct Boundary {
    pub id: String,
    pub name: String,
    pub state_fips: String,
    pub geometry: MultiPolygon<f64>,
}

impl Boundary {
    /// Get the bounding box of this boundary
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        use geo::BoundingRect;
        self.geometry
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_layer() {
        assert_eq!("Counties".parse::<GeoLayer>().unwrap(), GeoLayer::Counties);
        assert_eq!("HSAs".parse::<GeoLayer>().unwrap(), GeoLayer::Hsas);
        assert_eq!("hrr".parse::<GeoLayer>().unwrap(), GeoLayer::Hrrs);
        assert!("zips".parse::<GeoLayer>().is_err());
    }
}
