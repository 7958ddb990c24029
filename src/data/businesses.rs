//! Business locations CSV loader and name-based classification.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

use super::reader::{field, find_column, open_csv};
use crate::models::{Business, BusinessType};

const NAME_COLUMNS: &[&str] = &["name", "location_name", "business_name"];
const ADDRESS_COLUMNS: &[&str] = &["address", "street_address"];
const CITY_COLUMNS: &[&str] = &["city"];
const STATE_COLUMNS: &[&str] = &["state", "region"];
const POSTAL_COLUMNS: &[&str] = &["postal_code", "zip", "zip_code", "zipcode"];
const PHONE_COLUMNS: &[&str] = &["phone", "phone_number", "telephone"];
const LAT_COLUMNS: &[&str] = &["md_y", "lat", "latitude"];
const LON_COLUMNS: &[&str] = &["md_x", "lon", "lng", "longitude"];

/// Name patterns checked in order; the first match wins
const RULES: &[(&str, BusinessType)] = &[
    ("Autozone", BusinessType::Autozone),
    ("Napa Auto Parts", BusinessType::NapaAuto),
    ("Firestone Complete Auto Care", BusinessType::Firestone),
    ("O'Reilly Auto Parts", BusinessType::OReillyAuto),
    ("Advance Auto Parts", BusinessType::AdvanceAuto),
];

const DEALERSHIP_PATTERN: &str = r"(?i)Toyota|Honda|Kia|Nissan|Chevy|Ford|Carmax|GMC";

fn rules() -> &'static [(Regex, BusinessType)] {
    static RULES_RE: OnceLock<Vec<(Regex, BusinessType)>> = OnceLock::new();
    RULES_RE.get_or_init(|| {
        let mut compiled: Vec<(Regex, BusinessType)> = RULES
            .iter()
            .filter_map(|(pattern, t)| {
                Regex::new(&format!("(?i){}", regex::escape(pattern)))
                    .ok()
                    .map(|re| (re, *t))
            })
            .collect();
        if let Ok(re) = Regex::new(DEALERSHIP_PATTERN) {
            compiled.push((re, BusinessType::CarDealership));
        }
        compiled
    })
}

/// Categorize a business by its name
pub fn classify(name: &str) -> BusinessType {
    rules()
        .iter()
        .find(|(re, _)| re.is_match(name))
        .map(|(_, t)| *t)
        .unwrap_or(BusinessType::Other)
}

/// Load business locations, skipping rows without usable coordinates
pub fn load_businesses(path: &Path) -> Result<Vec<Business>> {
    info!("Loading businesses from {}", path.display());

    let mut csv_reader = open_csv(path)?;
    let headers = csv_reader.headers()?.clone();

    let name_idx = find_column(&headers, NAME_COLUMNS).context("Column 'name' not found")?;
    let lat_idx = find_column(&headers, LAT_COLUMNS).context("Latitude column not found")?;
    let lon_idx = find_column(&headers, LON_COLUMNS).context("Longitude column not found")?;
    let address_idx = find_column(&headers, ADDRESS_COLUMNS);
    let city_idx = find_column(&headers, CITY_COLUMNS);
    let state_idx = find_column(&headers, STATE_COLUMNS);
    let postal_idx = find_column(&headers, POSTAL_COLUMNS);
    let phone_idx = find_column(&headers, PHONE_COLUMNS);

    let mut businesses = Vec::new();
    let mut skipped = 0usize;

    for (row, result) in csv_reader.records().enumerate() {
        let record = result.with_context(|| format!("Malformed CSV row {}", row + 2))?;

        let name = match field(&record, Some(name_idx)) {
            Some(n) => n,
            None => {
                skipped += 1;
                continue;
            }
        };

        let coords = parse_coord(&record, lat_idx, -90.0, 90.0)
            .zip(parse_coord(&record, lon_idx, -180.0, 180.0));
        let (lat, lon) = match coords {
            Some(c) => c,
            None => {
                skipped += 1;
                continue;
            }
        };

        let business_type = classify(&name);
        businesses.push(Business {
            id: businesses.len(),
            name,
            address: field(&record, address_idx),
            city: field(&record, city_idx),
            state: field(&record, state_idx),
            postal_code: field(&record, postal_idx),
            phone: field(&record, phone_idx),
            lat,
            lon,
            business_type,
            county: None,
        });
    }

    if skipped > 0 {
        warn!(
            "Skipped {} rows without a name or valid coordinates in {}",
            skipped,
            path.display()
        );
    }
    info!("Loaded {} businesses", businesses.len());
    Ok(businesses)
}

fn parse_coord(record: &csv::StringRecord, idx: usize, min: f64, max: f64) -> Option<f64> {
    record
        .get(idx)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= min && *v <= max)
}
