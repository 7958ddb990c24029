use anyhow::{Context, Result};
use secrecy::Secret;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::isochrone::OrsSettings;
use crate::map::{DEFAULT_CENTER, DEFAULT_ZOOM};
use crate::models::GeoLayer;

/// Environment variable holding the OpenRouteService key
pub const API_KEY_ENV: &str = "ORS_API_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub layers: LayersConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub isochrone: OrsSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:7860".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    pub businesses_csv: PathBuf,
    pub block_groups_csv: PathBuf,
    /// Replaces the built-in 2020 county table
    pub population_2020_csv: Option<PathBuf>,
    #[serde(default = "default_state_fips")]
    pub state_fips: String,
    /// Isochrones preloaded into the cache at startup
    pub isochrones_geojson: Option<PathBuf>,
}

fn default_state_fips() -> String {
    "47".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LayersConfig {
    pub counties: Option<LayerConfig>,
    pub hsas: Option<LayerConfig>,
    pub hrrs: Option<LayerConfig>,
}

impl LayersConfig {
    pub fn get(&self, layer: GeoLayer) -> Option<&LayerConfig> {
        match layer {
            GeoLayer::Counties => self.counties.as_ref(),
            GeoLayer::Hsas => self.hsas.as_ref(),
            GeoLayer::Hrrs => self.hrrs.as_ref(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LayerConfig {
    pub path: PathBuf,
    pub name_field: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_lat: DEFAULT_CENTER[0],
            center_lon: DEFAULT_CENTER[1],
            zoom: DEFAULT_ZOOM,
        }
    }
}

impl MapConfig {
    pub fn center(&self) -> [f64; 2] {
        [self.center_lat, self.center_lon]
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env(std::env::var(API_KEY_ENV).ok());

        // Relative data paths are resolved against the config file's directory
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// An API key from the environment wins over the file
    pub fn apply_env(&mut self, api_key: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.isochrone.api_key = Some(Secret::new(key));
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.data.businesses_csv);
        resolve(&mut self.data.block_groups_csv);
        if let Some(p) = self.data.population_2020_csv.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.data.isochrones_geojson.as_mut() {
            resolve(p);
        }
        for layer in [
            self.layers.counties.as_mut(),
            self.layers.hsas.as_mut(),
            self.layers.hrrs.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            resolve(&mut layer.path);
        }
    }
}
