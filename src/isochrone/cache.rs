//! In-memory isochrone cache with GeoJSON import/export.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use geojson::{FeatureCollection, GeoJson, JsonObject, JsonValue};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{Isochrone, IsochroneError, OrsClient, MAX_MINUTES, MIN_MINUTES};
use crate::models::Business;

/// Largest distance in degrees between a stored center and its business
pub const CENTER_TOLERANCE_DEG: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IsochroneKey {
    pub business_id: usize,
    pub minutes: u32,
}

/// Isochrones keyed by (business, minutes)
#[derive(Default)]
pub struct IsochroneCache {
    entries: RwLock<HashMap<IsochroneKey, Arc<Isochrone>>>,
}

impl IsochroneCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, business_id: usize, minutes: u32) -> Option<Arc<Isochrone>> {
        let key = IsochroneKey {
            business_id,
            minutes,
        };
        self.entries.read().await.get(&key).cloned()
    }

    pub async fn insert(&self, isochrone: Isochrone) -> Arc<Isochrone> {
        let isochrone = Arc::new(isochrone);
        self.entries
            .write()
            .await
            .insert(isochrone.key(), Arc::clone(&isochrone));
        isochrone
    }

    /// Cached isochrones for `businesses` in input order, without fetching
    pub async fn cached_many(&self, businesses: &[&Business], minutes: u32) -> Vec<Arc<Isochrone>> {
        let entries = self.entries.read().await;
        businesses
            .iter()
            .filter_map(|b| {
                entries
                    .get(&IsochroneKey {
                        business_id: b.id,
                        minutes,
                    })
                    .cloned()
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Cached isochrone, fetching it on a miss.
    ///
    /// The lock is not held across the request, so two concurrent misses
    /// for the same key may both reach the API.
    pub async fn get_or_fetch(
        &self,
        client: &OrsClient,
        business: &Business,
        minutes: u32,
    ) -> Result<Arc<Isochrone>, IsochroneError> {
        if let Some(hit) = self.get(business.id, minutes).await {
            debug!("Isochrone cache hit for '{}' ({} min)", business.name, minutes);
            return Ok(hit);
        }
        let isochrone = client.fetch(business, minutes).await?;
        Ok(self.insert(isochrone).await)
    }

    /// Isochrones for many businesses in input order.
    ///
    /// At most `max_locations` businesses are considered, with `concurrency`
    /// requests in flight. Failures are logged and skipped.
    pub async fn get_or_fetch_many(
        &self,
        client: &OrsClient,
        businesses: &[&Business],
        minutes: u32,
    ) -> Vec<Arc<Isochrone>> {
        let settings = client.settings();
        if businesses.len() > settings.max_locations {
            warn!(
                "Requested isochrones for {} businesses, limiting to {}",
                businesses.len(),
                settings.max_locations
            );
        }

        let requests: Vec<_> = businesses
            .iter()
            .take(settings.max_locations)
            .map(|&business| self.fetch_or_skip(client, business, minutes))
            .collect();

        let results: Vec<Option<Arc<Isochrone>>> = stream::iter(requests)
            .buffered(settings.concurrency.max(1))
            .collect()
            .await;

        results.into_iter().flatten().collect()
    }

    async fn fetch_or_skip(
        &self,
        client: &OrsClient,
        business: &Business,
        minutes: u32,
    ) -> Option<Arc<Isochrone>> {
        match self.get_or_fetch(client, business, minutes).await {
            Ok(isochrone) => Some(isochrone),
            Err(e) => {
                warn!("Skipping isochrone for '{}': {}", business.name, e);
                None
            }
        }
    }

    /// All cached isochrones as a FeatureCollection, ordered by key
    pub async fn to_feature_collection(&self) -> FeatureCollection {
        let entries = self.entries.read().await;
        let mut isochrones: Vec<&Arc<Isochrone>> = entries.values().collect();
        isochrones.sort_by_key(|i| (i.business_id, i.minutes));

        FeatureCollection {
            bbox: None,
            features: isochrones.iter().map(|i| i.to_feature()).collect(),
            foreign_members: None,
        }
    }

    /// Write the cache to a GeoJSON file stamped with the export time
    pub async fn save(&self, path: &Path) -> Result<usize> {
        let mut collection = self.to_feature_collection().await;
        let mut stamp = JsonObject::new();
        stamp.insert(
            "generated_at".to_string(),
            JsonValue::from(Utc::now().to_rfc3339()),
        );
        collection.foreign_members = Some(stamp);
        let count = collection.features.len();

        let bytes = serde_json::to_vec(&collection).context("Failed to encode isochrones")?;
        tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {} isochrones to {}", count, path.display());
        Ok(count)
    }

    /// Load isochrones previously written by [`IsochroneCache::save`].
    ///
    /// Business ids are row positions, so a feature is only kept when its
    /// id exists in `businesses`, its stored center matches that business
    /// and its minutes are in range. Anything else is logged and dropped.
    pub async fn load(&self, path: &Path, businesses: &[Business]) -> Result<usize> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let geojson = GeoJson::from_reader(bytes.as_slice()).context("Failed to parse isochrones")?;
        let collection = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            _ => bail!("Isochrone file must be a FeatureCollection"),
        };

        let mut loaded = 0;
        let mut rejected = 0;
        for feature in &collection.features {
            let Some(isochrone) = Isochrone::from_feature(feature) else {
                warn!("Skipping malformed isochrone feature in {}", path.display());
                rejected += 1;
                continue;
            };
            if let Err(reason) = check_stored(&isochrone, businesses) {
                warn!(
                    "Skipping isochrone for business {} ({} min) in {}: {}",
                    isochrone.business_id,
                    isochrone.minutes,
                    path.display(),
                    reason
                );
                rejected += 1;
                continue;
            }
            self.insert(isochrone).await;
            loaded += 1;
        }

        if rejected > 0 {
            warn!("Dropped {} isochrones from {}", rejected, path.display());
        }
        info!("Loaded {} isochrones from {}", loaded, path.display());
        Ok(loaded)
    }
}

/// A stored isochrone must still describe the business at its id
fn check_stored(isochrone: &Isochrone, businesses: &[Business]) -> Result<(), String> {
    if !(MIN_MINUTES..=MAX_MINUTES).contains(&isochrone.minutes) {
        return Err(format!(
            "minutes outside {}..={}",
            MIN_MINUTES, MAX_MINUTES
        ));
    }
    let business = businesses
        .get(isochrone.business_id)
        .filter(|b| b.id == isochrone.business_id)
        .ok_or_else(|| "unknown business id".to_string())?;

    let dx = (isochrone.origin.x() - business.lon).abs();
    let dy = (isochrone.origin.y() - business.lat).abs();
    if dx > CENTER_TOLERANCE_DEG || dy > CENTER_TOLERANCE_DEG {
        return Err(format!(
            "center ({}, {}) does not match '{}' at ({}, {})",
            isochrone.origin.x(),
            isochrone.origin.y(),
            business.name,
            business.lon,
            business.lat
        ));
    }
    Ok(())
}
