//! Census block-group population loader and 2010/2020 county comparison.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use super::reader::{field, find_column, open_csv};
use crate::models::{BlockGroupPopulation, CountyPopulation};

/// 2020 census counts for the fifteen most populous Tennessee counties
const POPULATION_2020: &[(&str, u64)] = &[
    ("Shelby", 929_744),
    ("Davidson", 715_884),
    ("Knox", 478_971),
    ("Hamilton", 366_207),
    ("Rutherford", 341_486),
    ("Williamson", 247_726),
    ("Montgomery", 220_069),
    ("Sumner", 196_281),
    ("Blount", 135_280),
    ("Washington", 133_001),
    ("Madison", 98_823),
    ("Sevier", 98_380),
    ("Maury", 100_974),
    ("Wilson", 147_737),
    ("Bradley", 108_620),
];

/// Per-county 2010 aggregate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountyTotal {
    pub population: u64,
    pub land_area_sqmi: Option<f64>,
}

/// Strip state and "County" suffixes: "Shelby County TN" -> "Shelby"
pub fn normalize_county(raw: &str) -> String {
    let mut name = raw.trim();
    for suffix in [",TN", " TN", ",", " County", " county"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.trim_end();
        }
    }
    name.to_string()
}

/// Load block-group populations from the geographic correspondence CSV
pub fn load_block_groups(path: &Path) -> Result<Vec<BlockGroupPopulation>> {
    info!("Loading block-group population from {}", path.display());

    let mut csv_reader = open_csv(path)?;
    let headers = csv_reader.headers()?.clone();

    let county_idx = find_column(&headers, &["cntyname", "county", "county_name"])
        .context("Column 'cntyname' not found")?;
    let pop_idx = find_column(&headers, &["pop10", "population", "population_2010"])
        .context("Column 'pop10' not found")?;
    let id_idx = find_column(&headers, &["cbg", "geoid", "bg", "block_group"]);
    let area_idx = find_column(&headers, &["landsqmi", "aland_sqmi", "land_area"]);

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (row, result) in csv_reader.records().enumerate() {
        let record = result.with_context(|| format!("Malformed CSV row {}", row + 2))?;

        let county = match field(&record, Some(county_idx)) {
            Some(c) => normalize_county(&c),
            None => {
                skipped += 1;
                continue;
            }
        };
        let population_2010 = match field(&record, Some(pop_idx)).and_then(|p| parse_count(&p)) {
            Some(p) => p,
            None => {
                skipped += 1;
                continue;
            }
        };

        records.push(BlockGroupPopulation {
            block_group: field(&record, id_idx).unwrap_or_else(|| row.to_string()),
            county,
            population_2010,
            land_area_sqmi: field(&record, area_idx).and_then(|a| a.parse().ok()),
        });
    }

    if skipped > 0 {
        warn!("Skipped {} block-group rows without county or population", skipped);
    }
    info!("Loaded {} block groups", records.len());
    Ok(records)
}

/// Accepts "1234", "1,234" and "1234.0"
fn parse_count(raw: &str) -> Option<u64> {
    let cleaned = raw.replace(',', "");
    cleaned
        .parse::<u64>()
        .ok()
        .or_else(|| cleaned.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v.round() as u64))
}

/// Sum 2010 population and land area per county
pub fn totals_2010(records: &[BlockGroupPopulation]) -> HashMap<String, CountyTotal> {
    let mut totals: HashMap<String, CountyTotal> = HashMap::new();
    for r in records {
        let total = totals.entry(r.county.clone()).or_default();
        total.population += r.population_2010;
        if let Some(area) = r.land_area_sqmi {
            *total.land_area_sqmi.get_or_insert(0.0) += area;
        }
    }
    totals
}

/// Built-in 2020 county table
pub fn population_2020() -> HashMap<String, u64> {
    POPULATION_2020
        .iter()
        .map(|(county, pop)| (county.to_string(), *pop))
        .collect()
}

/// Load a `County,Population_2020` table
pub fn load_population_2020(path: &Path) -> Result<HashMap<String, u64>> {
    let mut csv_reader = open_csv(path)?;
    let headers = csv_reader.headers()?.clone();

    let county_idx =
        find_column(&headers, &["County", "cntyname"]).context("Column 'County' not found")?;
    let pop_idx = find_column(&headers, &["Population_2020", "pop20", "population"])
        .context("Column 'Population_2020' not found")?;

    let mut table = HashMap::new();
    for result in csv_reader.records() {
        let record = result?;
        if let (Some(county), Some(pop)) = (
            field(&record, Some(county_idx)),
            field(&record, Some(pop_idx)).and_then(|p| parse_count(&p)),
        ) {
            table.insert(normalize_county(&county), pop);
        }
    }

    info!("Loaded 2020 population for {} counties", table.len());
    Ok(table)
}

/// Join 2010 totals with 2020 counts; ordered by 2010 population descending
pub fn merge_population(
    totals_2010: &HashMap<String, CountyTotal>,
    table_2020: &HashMap<String, u64>,
) -> Vec<CountyPopulation> {
    let mut merged: Vec<CountyPopulation> = totals_2010
        .iter()
        .filter_map(|(county, total)| {
            table_2020.get(county).map(|pop_2020| CountyPopulation {
                county: county.clone(),
                population_2010: total.population,
                population_2020: *pop_2020,
                land_area_sqmi: total.land_area_sqmi,
            })
        })
        .collect();

    merged.sort_by(|a, b| {
        b.population_2010
            .cmp(&a.population_2010)
            .then_with(|| a.county.cmp(&b.county))
    });
    merged
}
