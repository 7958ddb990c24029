//! OpenRouteService isochrones client.

use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::Isochrone;
use crate::models::Business;

pub const MIN_MINUTES: u32 = 1;
/// ORS caps driving isochrones at one hour
pub const MAX_MINUTES: u32 = 60;

const DEFAULT_BASE_URL: &str = "https://api.openrouteservice.org";

#[derive(Debug, Error)]
pub enum IsochroneError {
    #[error("OpenRouteService API key is not configured (set ORS_API_KEY)")]
    MissingApiKey,
    #[error("drive time must be between 1 and 60 minutes, got {0}")]
    InvalidMinutes(u32),
    #[error("invalid OpenRouteService endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("OpenRouteService request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("OpenRouteService returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("OpenRouteService returned no isochrone polygon")]
    EmptyResponse,
    #[error("OpenRouteService returned invalid geometry: {0}")]
    InvalidGeometry(String),
}

impl IsochroneError {
    /// Whether a later attempt may succeed
    fn is_transient(&self) -> bool {
        match self {
            IsochroneError::Transport(e) => !e.is_decode(),
            IsochroneError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            _ => false,
        }
    }
}

/// `[isochrone]` configuration section
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OrsSettings {
    pub base_url: String,
    pub profile: String,
    pub api_key: Option<Secret<String>>,
    pub default_minutes: u32,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Requests in flight when fetching for many businesses
    pub concurrency: usize,
    /// Most businesses a single map render may request isochrones for
    pub max_locations: usize,
}

impl Default for OrsSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            profile: "driving-car".to_string(),
            api_key: None,
            default_minutes: 15,
            timeout_secs: 30,
            max_attempts: 2,
            retry_delay_ms: 2000,
            concurrency: 2,
            max_locations: 25,
        }
    }
}

#[derive(Debug, Serialize)]
struct IsochroneRequest {
    locations: Vec<[f64; 2]>,
    range: Vec<u32>,
    range_type: &'static str,
}

/// Client for `POST /v2/isochrones/{profile}`
pub struct OrsClient {
    client: Client,
    endpoint: Url,
    api_key: Secret<String>,
    settings: OrsSettings,
}

impl OrsClient {
    pub fn new(settings: OrsSettings) -> Result<Self, IsochroneError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.expose_secret().trim().is_empty())
            .ok_or(IsochroneError::MissingApiKey)?;

        let endpoint = Url::parse(&format!(
            "{}/v2/isochrones/{}",
            settings.base_url.trim_end_matches('/'),
            settings.profile
        ))?;

        let client = Client::builder()
            .user_agent("tnauto/0.1 (auto business dashboard)")
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        info!(
            "Isochrones via {} (default {} min)",
            endpoint, settings.default_minutes
        );

        Ok(Self {
            client,
            endpoint,
            api_key,
            settings,
        })
    }

    pub fn settings(&self) -> &OrsSettings {
        &self.settings
    }

    /// Fetch the drive-time polygon around a business
    pub async fn fetch(
        &self,
        business: &Business,
        minutes: u32,
    ) -> Result<Isochrone, IsochroneError> {
        if !(MIN_MINUTES..=MAX_MINUTES).contains(&minutes) {
            return Err(IsochroneError::InvalidMinutes(minutes));
        }

        let origin = business.point();
        let body = IsochroneRequest {
            locations: vec![[business.lon, business.lat]],
            range: vec![minutes * 60],
            range_type: "time",
        };

        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.request(&body).await {
                Ok(collection) => {
                    let geometry = first_polygon(&collection)?;
                    let isochrone = Isochrone {
                        business_id: business.id,
                        origin,
                        minutes,
                        geometry,
                    };
                    if !isochrone.contains_origin() {
                        warn!(
                            "Isochrone for '{}' does not contain its origin ({}, {})",
                            business.name, business.lon, business.lat
                        );
                    }
                    debug!(
                        "Fetched {}-minute isochrone for '{}'",
                        minutes, business.name
                    );
                    return Ok(isochrone);
                }
                Err(e) if e.is_transient() && attempts < max_attempts => {
                    warn!(
                        "Isochrone request for '{}' failed (attempt {}/{}): {}",
                        business.name, attempts, max_attempts, e
                    );
                    tokio::time::sleep(Duration::from_millis(self.settings.retry_delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request(&self, body: &IsochroneRequest) -> Result<FeatureCollection, IsochroneError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Authorization", self.api_key.expose_secret().as_str())
            .header("Accept", "application/geo+json, application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IsochroneError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<FeatureCollection>().await?)
    }
}

fn first_polygon(collection: &FeatureCollection) -> Result<MultiPolygon<f64>, IsochroneError> {
    let feature = collection
        .features
        .first()
        .ok_or(IsochroneError::EmptyResponse)?;
    feature_polygons(feature).ok_or_else(|| {
        let found = match feature.geometry.as_ref().map(|g| &g.value) {
            None => "no geometry",
            Some(geojson::Value::Point(_)) | Some(geojson::Value::MultiPoint(_)) => "points",
            Some(geojson::Value::LineString(_)) | Some(geojson::Value::MultiLineString(_)) => {
                "lines"
            }
            Some(_) => "an unsupported geometry",
        };
        IsochroneError::InvalidGeometry(format!("expected a polygon, found {}", found))
    })
}

/// Polygon or MultiPolygon geometry of a feature
pub(crate) fn feature_polygons(feature: &Feature) -> Option<MultiPolygon<f64>> {
    let value = feature.geometry.as_ref()?.value.clone();
    match geo::Geometry::<f64>::try_from(value).ok()? {
        geo::Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        _ => None,
    }
}

impl std::fmt::Debug for OrsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrsClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::BusinessType;
    use httpmock::prelude::*;
    use serde_json::{json, Value};

    pub(crate) fn shop(id: usize, lon: f64, lat: f64) -> Business {
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

    /// ORS-shaped response with a square around the origin
    pub(crate) fn square_response(lon: f64, lat: f64, minutes: u32) -> Value {
        let d = 0.1;
        json!({
            "type": "FeatureCollection",
            "bbox": [lon - d, lat - d, lon + d, lat + d],
            "features": [{
                "type": "Feature",
                "properties": {"group_index": 0, "value": minutes * 60, "center": [lon, lat]},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [lon - d, lat - d], [lon + d, lat - d], [lon + d, lat + d],
                        [lon - d, lat + d], [lon - d, lat - d]
                    ]]
                }
            }],
            "metadata": {"service": "isochrones"}
        })
    }

    pub(crate) fn settings_for(server: &MockServer) -> OrsSettings {
        OrsSettings {
            base_url: server.base_url(),
            api_key: Some(Secret::new("test-key".to_string())),
            retry_delay_ms: 10,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_returns_polygon_containing_origin() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v2/isochrones/driving-car")
                    .header("Authorization", "test-key")
                    .json_body(json!({
                        "locations": [[-86.78, 36.16]],
                        "range": [900],
                        "range_type": "time"
                    }));
                then.status(200)
                    .header("content-type", "application/geo+json")
                    .json_body(square_response(-86.78, 36.16, 15));
            })
            .await;

        let client = OrsClient::new(settings_for(&server)).unwrap();
        let isochrone = client.fetch(&shop(7, -86.78, 36.16), 15).await.unwrap();

        mock.assert_async().await;
        assert_eq!(isochrone.business_id, 7);
        assert_eq!(isochrone.minutes, 15);
        assert!(isochrone.contains_origin());
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v2/isochrones/driving-car");
                then.status(403).body("Access to this API has been disallowed");
            })
            .await;

        let client = OrsClient::new(settings_for(&server)).unwrap();
        let err = client.fetch(&shop(0, -86.0, 36.0), 15).await.unwrap_err();

        mock.assert_hits_async(1).await;
        match err {
            IsochroneError::Status { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("disallowed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v2/isochrones/driving-car");
                then.status(503).body("busy");
            })
            .await;

        let client = OrsClient::new(settings_for(&server)).unwrap();
        let err = client.fetch(&shop(0, -86.0, 36.0), 15).await.unwrap_err();

        mock.assert_hits_async(2).await;
        assert!(matches!(err, IsochroneError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_empty_feature_collection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v2/isochrones/driving-car");
                then.status(200)
                    .json_body(json!({"type": "FeatureCollection", "features": []}));
            })
            .await;

        let client = OrsClient::new(settings_for(&server)).unwrap();
        let err = client.fetch(&shop(0, -86.0, 36.0), 15).await.unwrap_err();
        assert!(matches!(err, IsochroneError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_minutes_out_of_range() {
        let server = MockServer::start_async().await;
        let client = OrsClient::new(settings_for(&server)).unwrap();
        for minutes in [0, 61] {
            let err = client.fetch(&shop(0, -86.0, 36.0), minutes).await.unwrap_err();
            assert!(matches!(err, IsochroneError::InvalidMinutes(m) if m == minutes));
        }
    }

    #[test]
    fn test_missing_api_key() {
        let err = OrsClient::new(OrsSettings::default()).unwrap_err();
        assert!(matches!(err, IsochroneError::MissingApiKey));

        let blank = OrsSettings {
            api_key: Some(Secret::new("  ".to_string())),
            ..Default::default()
        };
        assert!(matches!(
            OrsClient::new(blank).unwrap_err(),
            IsochroneError::MissingApiKey
        ));
    }
}
