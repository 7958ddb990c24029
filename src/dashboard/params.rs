//! Query-string parameters and their conversion into library types.

use axum::http::StatusCode;
use serde::Deserialize;

use tnauto::filter::{BusinessFilter, TypeSelection};
use tnauto::isochrone::IsochroneError;
use tnauto::{DashboardError, GeoLayer};

pub type ApiError = (StatusCode, String);

/// Dropdown selections shared by the businesses and map endpoints
#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    pub zip: Option<String>,
    /// Comma-separated business type labels, or "All"
    pub types: Option<String>,
    pub county: Option<String>,
}

impl FilterParams {
    pub fn to_filter(&self) -> Result<BusinessFilter, ApiError> {
        build_filter(&self.zip, &self.types, &self.county)
    }
}

/// Empty values and "All" are treated as a reset
fn build_filter(
    zip: &Option<String>,
    types: &Option<String>,
    county: &Option<String>,
) -> Result<BusinessFilter, ApiError> {
    let types = match types.as_deref() {
        Some(raw) => TypeSelection::parse(raw).map_err(bad_request)?,
        None => TypeSelection::All,
    };
    Ok(BusinessFilter {
        zip: selected(zip),
        types,
        county: selected(county),
    })
}

fn selected(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
        .map(String::from)
}

/// Map selections. The filter fields stay inline so `isochrones` still
/// decodes as a number.
#[derive(Debug, Default, Deserialize)]
pub struct MapParams {
    pub zip: Option<String>,
    pub types: Option<String>,
    pub county: Option<String>,
    /// counties, hsas or hrrs
    pub layer: Option<String>,
    /// Drive time in minutes for isochrone overlays
    pub isochrones: Option<u32>,
}

impl MapParams {
    pub fn to_filter(&self) -> Result<BusinessFilter, ApiError> {
        build_filter(&self.zip, &self.types, &self.county)
    }

    pub fn layer(&self) -> Result<Option<GeoLayer>, ApiError> {
        match self.layer.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(bad_request),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NearestParams {
    pub name: String,
    pub k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct IsochroneParams {
    pub business_id: usize,
    pub minutes: Option<u32>,
}

pub fn bad_request(message: String) -> ApiError {
    (StatusCode::BAD_REQUEST, message)
}

/// Status code for a failed dashboard query
pub fn status_for(err: &DashboardError) -> StatusCode {
    match err {
        DashboardError::UnknownBusiness(_)
        | DashboardError::ShopNotFound(_)
        | DashboardError::LayerNotLoaded(_) => StatusCode::NOT_FOUND,
        DashboardError::IsochronesDisabled
        | DashboardError::Isochrone(IsochroneError::MissingApiKey) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        DashboardError::Isochrone(IsochroneError::InvalidMinutes(_)) => StatusCode::BAD_REQUEST,
        DashboardError::Isochrone(_) => StatusCode::BAD_GATEWAY,
    }
}

pub fn api_error(err: DashboardError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("Dashboard query failed: {}", err);
    }
    (status, err.to_string())
}
