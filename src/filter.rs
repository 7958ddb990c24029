//! Narrowing the business dataset by dropdown selections.

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

use crate::models::{normalize_zip, Business, BusinessType};

/// Business-type selection; `All` is the reset state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TypeSelection {
    #[default]
    All,
    Only(HashSet<BusinessType>),
}

impl TypeSelection {
    /// Parse comma-separated labels. An empty list or one containing "All"
    /// selects everything.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let labels: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if labels.is_empty() || labels.iter().any(|l| l.eq_ignore_ascii_case("all")) {
            return Ok(TypeSelection::All);
        }
        let types = labels
            .into_iter()
            .map(|l| l.parse::<BusinessType>())
            .collect::<Result<HashSet<BusinessType>, _>>()?;
        Ok(TypeSelection::Only(types))
    }

    pub fn matches(&self, business_type: BusinessType) -> bool {
        match self {
            TypeSelection::All => true,
            TypeSelection::Only(types) => types.contains(&business_type),
        }
    }
}

/// Equality filters combined with AND
#[derive(Debug, Clone, Default)]
pub struct BusinessFilter {
    pub zip: Option<String>,
    pub types: TypeSelection,
    pub county: Option<String>,
}

impl BusinessFilter {
    pub fn matches(&self, business: &Business) -> bool {
        if let Some(zip) = &self.zip {
            let wanted = normalize_zip(zip).unwrap_or(zip.trim());
            if business.zip5() != Some(wanted) {
                return false;
            }
        }
        if !self.types.matches(business.business_type) {
            return false;
        }
        if let Some(county) = &self.county {
            match &business.county {
                Some(c) if c.eq_ignore_ascii_case(county.trim()) => {}
                _ => return false,
            }
        }
        true
    }

    /// Matching businesses in load order
    pub fn apply<'a>(&self, businesses: &'a [Business]) -> Vec<&'a Business> {
        businesses.iter().filter(|b| self.matches(b)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.is_none() && self.types == TypeSelection::All && self.county.is_none()
    }
}

/// Values offered in the filter dropdowns
#[derive(Debug, Clone, Serialize)]
pub struct FilterOptions {
    pub business_types: Vec<String>,
    pub zip_codes: Vec<String>,
    pub counties: Vec<String>,
    pub shop_names: Vec<String>,
}

impl FilterOptions {
    pub fn from_businesses(businesses: &[Business]) -> Self {
        let types: BTreeSet<&str> = businesses
            .iter()
            .map(|b| b.business_type.label())
            .collect();
        let zips: BTreeSet<&str> = businesses.iter().filter_map(|b| b.zip5()).collect();
        let counties: BTreeSet<&str> = businesses
            .iter()
            .filter_map(|b| b.county.as_deref())
            .collect();
        let names: BTreeSet<&str> = businesses.iter().map(|b| b.name.as_str()).collect();

        let mut business_types = vec!["All".to_string()];
        business_types.extend(types.into_iter().map(String::from));

        Self {
            business_types,
            zip_codes: zips.into_iter().map(String::from).collect(),
            counties: counties.into_iter().map(String::from).collect(),
            shop_names: names.into_iter().map(String::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn business(id: usize, name: &str, zip: &str, t: BusinessType, county: &str) -> Business {
        Business {
            id,
            name: name.to_string(),
            address: None,
            city: None,
            state: None,
            postal_code: Some(zip.to_string()),
            phone: None,
            lat: 36.0,
            lon: -86.0,
            business_type: t,
            county: Some(county.to_string()),
        }
    }

    fn sample() -> Vec<Business> {
        vec![
            business(0, "AutoZone #1", "37214", BusinessType::Autozone, "Davidson"),
            business(1, "AutoZone #2", "37217-4410", BusinessType::Autozone, "Davidson"),
            business(2, "Napa Auto Parts", "37214", BusinessType::NapaAuto, "Davidson"),
            business(3, "Ford of Murfreesboro", "37129", BusinessType::CarDealership, "Rutherford"),
        ]
    }

    #[test]
    fn test_filter_by_zip_returns_only_matching() {
        let data = sample();
        let filter = BusinessFilter {
            zip: Some("37214".to_string()),
            ..Default::default()
        };
        let result = filter.apply(&data);
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|b| b.zip5() == Some("37214")));

        let filter = BusinessFilter {
            zip: Some("37217".to_string()),
            ..Default::default()
        };
        let ids: Vec<usize> = filter.apply(&data).iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_filter_combines_criteria() {
        let data = sample();
        let filter = BusinessFilter {
            zip: Some("37214".to_string()),
            types: TypeSelection::parse("Autozone").unwrap(),
            county: None,
        };
        let ids: Vec<usize> = filter.apply(&data).iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![0]);

        let filter = BusinessFilter {
            county: Some("rutherford".to_string()),
            ..Default::default()
        };
        let ids: Vec<usize> = filter.apply(&data).iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn test_type_selection_all_and_empty() {
        assert_eq!(TypeSelection::parse("").unwrap(), TypeSelection::All);
        assert_eq!(
            TypeSelection::parse("Autozone,All").unwrap(),
            TypeSelection::All
        );
        assert!(TypeSelection::parse("Autozone, Pep Boys").is_err());
        assert!(BusinessFilter::default().is_empty());
        assert_eq!(BusinessFilter::default().apply(&sample()).len(), 4);
    }

    #[test]
    fn test_filter_options_sorted() {
        let options = FilterOptions::from_businesses(&sample());
        assert_eq!(
            options.business_types,
            vec!["All", "Autozone", "Car Dealership", "Napa Auto"]
        );
        assert_eq!(options.zip_codes, vec!["37129", "37214", "37217"]);
        assert_eq!(options.counties, vec!["Davidson", "Rutherford"]);
        assert_eq!(options.shop_names.len(), 4);
    }
}
