//! Census population records.

use serde::{Deserialize, Serialize};

/// Population of a single census block group (2010 census)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockGroupPopulation {
    pub block_group: String,
    pub county: String,
    pub population_2010: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub land_area_sqmi: Option<f64>,
}

/// County totals for the 2010 vs 2020 comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CountyPopulation {
    pub county: String,
    #[serde(rename = "Population_2010")]
    pub population_2010: u64,
    #[serde(rename = "Population_2020")]
    pub population_2020: u64,
    #[serde(rename = "LandAreaSqmi", skip_serializing_if = "Option::is_none")]
    pub land_area_sqmi: Option<f64>,
}

impl CountyPopulation {
    pub fn change(&self) -> i64 {
        self.population_2020 as i64 - self.population_2010 as i64
    }

    /// Percent change from 2010 to 2020
    pub fn percent_change(&self) -> Option<f64> {
        if self.population_2010 == 0 {
            return None;
        }
        Some(self.change() as f64 / self.population_2010 as f64 * 100.0)
    }

    /// Residents per square mile in 2020
    pub fn density_2020(&self) -> Option<f64> {
        self.land_area_sqmi
            .filter(|a| *a > 0.0)
            .map(|a| self.population_2020 as f64 / a)
    }
}
