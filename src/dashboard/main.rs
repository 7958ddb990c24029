//! Dashboard server.
//!
//! Loads the business, population and boundary datasets once, then serves a
//! single-page UI and the JSON API it renders from.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::{Html, Json},
    routing::get,
    Router,
};
use clap::Parser;
use geojson::Feature;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tnauto::app::{BusinessDensityView, NearestResult, Overview, PopulationCharts};
use tnauto::filter::FilterOptions;
use tnauto::map::MapView;
use tnauto::{Business, Config, Dashboard};

mod params;
use params::{api_error, ApiError, FilterParams, IsochroneParams, MapParams, NearestParams};

const INDEX_HTML: &str = include_str!("index.html");

#[derive(Parser, Debug)]
#[command(name = "dashboard")]
#[command(about = "Tennessee auto business and population dashboard")]
struct Args {
    /// Config file
    #[arg(short, long, default_value = "dashboard.toml")]
    config: PathBuf,

    /// Listen address (overrides the config file)
    #[arg(short, long)]
    listen: Option<String>,
}

/// Application state shared across handlers
struct AppState {
    dashboard: Dashboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("Tennessee Auto Business Dashboard");
    info!("Loading config from {}", args.config.display());

    let config = Config::load_from_file(&args.config)?;
    let listen = args.listen.unwrap_or_else(|| config.server.listen.clone());

    let dashboard = Dashboard::load(&config).await?;
    info!(
        "Loaded {} businesses; isochrones {}",
        dashboard.all_businesses().len(),
        if dashboard.isochrones_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );

    let state = Arc::new(AppState { dashboard });

    // Build router
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/options", get(options_handler))
        .route("/api/overview", get(overview_handler))
        .route("/api/population", get(population_handler))
        .route("/api/business-density", get(business_density_handler))
        .route("/api/businesses", get(businesses_handler))
        .route("/api/map", get(map_handler))
        .route("/api/nearest", get(nearest_handler))
        .route("/api/isochrone", get(isochrone_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", listen);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        businesses: state.dashboard.all_businesses().len(),
        isochrones: state.dashboard.isochrones_enabled(),
        cached_isochrones: state.dashboard.cache().len().await,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    businesses: usize,
    isochrones: bool,
    cached_isochrones: usize,
}

/// Dropdown values
async fn options_handler(State(state): State<Arc<AppState>>) -> Json<FilterOptions> {
    Json(state.dashboard.options().clone())
}

/// Charts and population table for the overview tab
async fn overview_handler(State(state): State<Arc<AppState>>) -> Json<Overview> {
    Json(state.dashboard.overview())
}

async fn population_handler(State(state): State<Arc<AppState>>) -> Json<PopulationCharts> {
    Json(state.dashboard.population_charts())
}

/// Business counts per county against 2020 population
async fn business_density_handler(
    State(state): State<Arc<AppState>>,
) -> Json<BusinessDensityView> {
    Json(state.dashboard.business_density())
}

/// Filtered business table
async fn businesses_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterParams>,
) -> Result<Json<BusinessesResponse>, ApiError> {
    let filter = params.to_filter()?;
    let businesses: Vec<Business> = state
        .dashboard
        .businesses(&filter)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(BusinessesResponse {
        count: businesses.len(),
        businesses,
    }))
}

#[derive(Serialize)]
struct BusinessesResponse {
    count: usize,
    businesses: Vec<Business>,
}

/// Markers, boundary overlay and optional isochrones
async fn map_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MapParams>,
) -> Result<Json<MapView>, ApiError> {
    let filter = params.to_filter()?;
    let layer = params.layer()?;

    let view = state
        .dashboard
        .map(layer, &filter, params.isochrones)
        .await
        .map_err(api_error)?;

    Ok(Json(view))
}

/// Nearest shop finder
async fn nearest_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearestParams>,
) -> Result<Json<NearestResult>, ApiError> {
    state
        .dashboard
        .nearest(&params.name, params.k)
        .map(Json)
        .map_err(api_error)
}

/// Drive-time polygon around one business as a GeoJSON Feature
async fn isochrone_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IsochroneParams>,
) -> Result<Json<Feature>, ApiError> {
    let isochrone = state
        .dashboard
        .isochrone(params.business_id, params.minutes)
        .await
        .map_err(api_error)?;

    Ok(Json(isochrone.to_feature()))
}
