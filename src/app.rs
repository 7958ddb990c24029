//! Dashboard state loaded once at startup and the queries the page runs
//! against it.

use anyhow::{Context, Result};
use geojson::FeatureCollection;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::{self, BusinessDensity};
use crate::charts::{self, Figure, ScatterTrace};
use crate::config::{Config, MapConfig};
use crate::data;
use crate::filter::{BusinessFilter, FilterOptions};
use crate::isochrone::{
    Isochrone, IsochroneCache, IsochroneError, OrsClient, MAX_MINUTES, MIN_MINUTES,
};
use crate::map::MapView;
use crate::models::{Boundary, Business, CountyPopulation, GeoLayer};
use crate::nearest::{Neighbor, ShopIndex, DEFAULT_NEIGHBORS};
use crate::pip::CountyResolver;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("no business with id {0}")]
    UnknownBusiness(usize),
    #[error("no shop named '{0}'")]
    ShopNotFound(String),
    #[error("{0} layer is not loaded")]
    LayerNotLoaded(GeoLayer),
    #[error("isochrones are disabled: no OpenRouteService API key configured")]
    IsochronesDisabled,
    #[error(transparent)]
    Isochrone(#[from] IsochroneError),
}

struct LoadedLayer {
    count: usize,
    geojson: Arc<FeatureCollection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PopulationRow {
    #[serde(flatten)]
    pub county: CountyPopulation,
    pub change: i64,
    pub percent_change: Option<f64>,
    pub density_2020: Option<f64>,
}

impl From<&CountyPopulation> for PopulationRow {
    fn from(c: &CountyPopulation) -> Self {
        Self {
            county: c.clone(),
            change: c.change(),
            percent_change: c.percent_change(),
            density_2020: c.density_2020(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PopulationCharts {
    pub comparison: Figure,
    pub population_2010: Figure,
    pub population_2020: Figure,
}

/// Business counts against population, with the scatter chart
#[derive(Debug, Clone, Serialize)]
pub struct BusinessDensityView {
    #[serde(flatten)]
    pub analysis: BusinessDensity,
    pub chart: Figure<ScatterTrace>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub charts: PopulationCharts,
    pub table: Vec<PopulationRow>,
    pub business_density: BusinessDensityView,
    pub business_count: usize,
    pub layers: Vec<LayerSummary>,
    pub isochrones_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayerSummary {
    pub layer: GeoLayer,
    pub title: &'static str,
    pub boundaries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearestResult {
    pub selected: Business,
    pub neighbors: Vec<NearestShop>,
    pub map: MapView,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearestShop {
    #[serde(flatten)]
    pub business: Business,
    pub distance_km: f64,
}

pub struct Dashboard {
    businesses: Vec<Business>,
    population: Vec<CountyPopulation>,
    density: BusinessDensity,
    layers: HashMap<GeoLayer, LoadedLayer>,
    options: FilterOptions,
    shops: ShopIndex,
    map: MapConfig,
    client: Option<OrsClient>,
    cache: IsochroneCache,
    default_minutes: u32,
}

impl Dashboard {
    /// Load every dataset named in the config
    pub async fn load(config: &Config) -> Result<Self> {
        let mut businesses = data::load_businesses(&config.data.businesses_csv)?;

        let mut layers = HashMap::new();
        for &layer in GeoLayer::all() {
            let Some(layer_config) = config.layers.get(layer) else {
                info!("{} layer not configured", layer);
                continue;
            };
            let boundaries = data::load_layer(
                &layer_config.path,
                layer,
                &config.data.state_fips,
                layer_config.name_field.as_deref(),
            )
            .with_context(|| format!("Failed to load {} layer", layer))?;
            layers.insert(layer, boundaries);
        }

        match layers.get(&GeoLayer::Counties) {
            Some(counties) => {
                CountyResolver::new(counties.clone()).assign(&mut businesses);
            }
            None => warn!("No county layer; county filter will match nothing"),
        }

        let block_groups = data::load_block_groups(&config.data.block_groups_csv)?;
        let table_2020 = match &config.data.population_2020_csv {
            Some(path) => data::load_population_2020(path)?,
            None => data::population_2020(),
        };
        let population = data::merge_population(&data::totals_2010(&block_groups), &table_2020);
        info!("Population comparison covers {} counties", population.len());

        let client = match OrsClient::new(config.isochrone.clone()) {
            Ok(client) => Some(client),
            Err(IsochroneError::MissingApiKey) => {
                warn!("No OpenRouteService API key; isochrones disabled");
                None
            }
            Err(e) => return Err(e).context("Failed to create OpenRouteService client"),
        };

        let dashboard = Self::new(
            businesses,
            population,
            layers,
            config.map.clone(),
            client,
            config.isochrone.default_minutes,
        );

        if let Some(path) = &config.data.isochrones_geojson {
            dashboard.cache.load(path, &dashboard.businesses).await?;
        }

        Ok(dashboard)
    }

    pub fn new(
        businesses: Vec<Business>,
        population: Vec<CountyPopulation>,
        layers: HashMap<GeoLayer, Vec<Boundary>>,
        map: MapConfig,
        client: Option<OrsClient>,
        default_minutes: u32,
    ) -> Self {
        let layers = layers
            .into_iter()
            .map(|(layer, boundaries)| {
                let loaded = LoadedLayer {
                    count: boundaries.len(),
                    geojson: Arc::new(data::to_feature_collection(&boundaries)),
                };
                (layer, loaded)
            })
            .collect();

        Self {
            options: FilterOptions::from_businesses(&businesses),
            shops: ShopIndex::build(&businesses),
            density: analysis::business_density(&businesses, &population),
            businesses,
            population,
            layers,
            map,
            client,
            cache: IsochroneCache::new(),
            default_minutes,
        }
    }

    pub fn all_businesses(&self) -> &[Business] {
        &self.businesses
    }

    pub fn cache(&self) -> &IsochroneCache {
        &self.cache
    }

    pub fn isochrones_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub fn population(&self) -> &[CountyPopulation] {
        &self.population
    }

    pub fn population_charts(&self) -> PopulationCharts {
        PopulationCharts {
            comparison: charts::population_comparison(&self.population),
            population_2010: charts::population_2010(&self.population),
            population_2020: charts::population_2020(&self.population),
        }
    }

    pub fn business_density(&self) -> BusinessDensityView {
        BusinessDensityView {
            chart: charts::business_density(&self.density),
            analysis: self.density.clone(),
        }
    }

    pub fn overview(&self) -> Overview {
        let mut layers: Vec<LayerSummary> = self
            .layers
            .iter()
            .map(|(&layer, loaded)| LayerSummary {
                layer,
                title: layer.title(),
                boundaries: loaded.count,
            })
            .collect();
        layers.sort_by_key(|l| l.layer);

        Overview {
            charts: self.population_charts(),
            table: self.population.iter().map(PopulationRow::from).collect(),
            business_density: self.business_density(),
            business_count: self.businesses.len(),
            layers,
            isochrones_enabled: self.isochrones_enabled(),
        }
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    pub fn businesses(&self, filter: &BusinessFilter) -> Vec<&Business> {
        filter.apply(&self.businesses)
    }

    pub fn business(&self, id: usize) -> Result<&Business, DashboardError> {
        self.businesses
            .get(id)
            .ok_or(DashboardError::UnknownBusiness(id))
    }

    /// Filtered markers over an optional boundary layer, with drive-time
    /// polygons for the filtered shops when `isochrone_minutes` is given.
    pub async fn map(
        &self,
        layer: Option<GeoLayer>,
        filter: &BusinessFilter,
        isochrone_minutes: Option<u32>,
    ) -> Result<MapView, DashboardError> {
        let filtered = self.businesses(filter);
        let mut view = MapView::overview(self.map.center(), self.map.zoom, &filtered);

        if let Some(layer) = layer {
            let loaded = self
                .layers
                .get(&layer)
                .ok_or(DashboardError::LayerNotLoaded(layer))?;
            view = view.with_boundaries(layer, Arc::clone(&loaded.geojson));
        }

        if let Some(minutes) = isochrone_minutes {
            if !(MIN_MINUTES..=MAX_MINUTES).contains(&minutes) {
                return Err(IsochroneError::InvalidMinutes(minutes).into());
            }
            let isochrones = match &self.client {
                Some(client) => {
                    self.cache
                        .get_or_fetch_many(client, &filtered, minutes)
                        .await
                }
                // Without a key only preloaded polygons can be drawn
                None => {
                    let cached = self.cache.cached_many(&filtered, minutes).await;
                    if cached.is_empty() {
                        return Err(DashboardError::IsochronesDisabled);
                    }
                    cached
                }
            };
            view = view.with_isochrones(&isochrones);
        }

        Ok(view)
    }

    /// The `k` shops closest to the first shop named `name`
    pub fn nearest(&self, name: &str, k: Option<usize>) -> Result<NearestResult, DashboardError> {
        let selected = self
            .businesses
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| DashboardError::ShopNotFound(name.to_string()))?;

        let neighbors = self
            .shops
            .neighbors(selected, k.unwrap_or(DEFAULT_NEIGHBORS));
        let pairs: Vec<(&Business, &Neighbor)> = neighbors
            .iter()
            .filter_map(|n| self.businesses.get(n.business_id).map(|b| (b, n)))
            .collect();

        let map = MapView::nearest(selected, &pairs);
        let neighbors = pairs
            .into_iter()
            .map(|(business, n)| NearestShop {
                business: business.clone(),
                distance_km: n.distance_km,
            })
            .collect();

        Ok(NearestResult {
            selected: selected.clone(),
            neighbors,
            map,
        })
    }

    /// Drive-time polygon around one business, cached
    pub async fn isochrone(
        &self,
        business_id: usize,
        minutes: Option<u32>,
    ) -> Result<Arc<Isochrone>, DashboardError> {
        let business = self.business(business_id)?;
        let minutes = minutes.unwrap_or(self.default_minutes);
        if let Some(hit) = self.cache.get(business.id, minutes).await {
            return Ok(hit);
        }
        let client = self
            .client
            .as_ref()
            .ok_or(DashboardError::IsochronesDisabled)?;
        Ok(self.cache.get_or_fetch(client, business, minutes).await?)
    }
}
