//! Auto-business records loaded from the locations CSV.

use geo::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of an auto business, derived from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BusinessType {
    Autozone,
    NapaAuto,
    Firestone,
    OReillyAuto,
    AdvanceAuto,
    CarDealership,
    Other,
}

impl BusinessType {
    /// All types in classification order
    pub fn all() -> &'static [BusinessType] {
        &[
            BusinessType::Autozone,
            BusinessType::NapaAuto,
            BusinessType::Firestone,
            BusinessType::OReillyAuto,
            BusinessType::AdvanceAuto,
            BusinessType::CarDealership,
            BusinessType::Other,
        ]
    }

    /// Display label, also used on the wire
    pub fn label(&self) -> &'static str {
        match self {
            BusinessType::Autozone => "Autozone",
            BusinessType::NapaAuto => "Napa Auto",
            BusinessType::Firestone => "Firestone",
            BusinessType::OReillyAuto => "O'Reilly Auto",
            BusinessType::AdvanceAuto => "Advance Auto",
            BusinessType::CarDealership => "Car Dealership",
            BusinessType::Other => "Other Auto Repair Shops",
        }
    }

    /// Marker color on the map
    pub fn color(&self) -> &'static str {
        match self {
            BusinessType::Autozone => "#d62728",
            BusinessType::NapaAuto => "#1f3f8f",
            BusinessType::Firestone => "#8c564b",
            BusinessType::OReillyAuto => "#2ca02c",
            BusinessType::AdvanceAuto => "#ff7f0e",
            BusinessType::CarDealership => "#9467bd",
            BusinessType::Other => "#1f77b4",
        }
    }
}

impl fmt::Display for BusinessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BusinessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        BusinessType::all()
            .iter()
            .find(|t| t.label().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown business type '{}'", s))
    }
}

impl Serialize for BusinessType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for BusinessType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A single business location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    /// Position in the loaded dataset
    pub id: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub business_type: BusinessType,
    /// County containing the location, resolved against the county layer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
}

impl Business {
    /// Five-digit ZIP code, if the postal code has one
    pub fn zip5(&self) -> Option<&str> {
        self.postal_code.as_deref().and_then(normalize_zip)
    }

    pub fn point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// Reduce "37214", "37214-1234" or " 37214 " to "37214"
pub fn normalize_zip(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    let zip = raw.get(..5)?;
    if zip.bytes().all(|b| b.is_ascii_digit()) {
        Some(zip)
    } else {
        None
    }
}
