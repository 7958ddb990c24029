//! Batch isochrone fetcher.
//!
//! Requests drive-time polygons from OpenRouteService for a filtered set of
//! businesses and writes them to a GeoJSON file the dashboard can preload.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tnauto::data;
use tnauto::filter::{BusinessFilter, TypeSelection};
use tnauto::isochrone::{IsochroneCache, OrsClient};
use tnauto::pip::CountyResolver;
use tnauto::{Business, Config, GeoLayer};

#[derive(Parser, Debug)]
#[command(name = "isochrones")]
#[command(about = "Fetch drive-time isochrones for auto businesses")]
struct Args {
    /// Config file
    #[arg(short, long, default_value = "dashboard.toml")]
    config: PathBuf,

    /// Drive time in minutes (defaults to isochrone.default_minutes)
    #[arg(short, long)]
    minutes: Option<u32>,

    /// Comma-separated business type labels
    #[arg(long)]
    types: Option<String>,

    /// Five-digit zip code
    #[arg(long)]
    zip: Option<String>,

    /// County name (needs a county layer in the config)
    #[arg(long)]
    county: Option<String>,

    /// Raise the per-run business cap from the config
    #[arg(long)]
    max_locations: Option<usize>,

    /// Output GeoJSON file
    #[arg(short, long, default_value = "isochrones.geojson")]
    output: PathBuf,

    /// Load an existing output file first and only fetch what is missing
    #[arg(long)]
    resume: bool,
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
    let start = Instant::now();

    info!("Tennessee Auto Business Isochrones");

    let mut config = Config::load_from_file(&args.config)?;
    if let Some(max_locations) = args.max_locations {
        config.isochrone.max_locations = max_locations;
    }
    let minutes = args.minutes.unwrap_or(config.isochrone.default_minutes);

    let client =
        OrsClient::new(config.isochrone.clone()).context("Failed to create OpenRouteService client")?;

    let mut businesses = data::load_businesses(&config.data.businesses_csv)?;

    if args.county.is_some() {
        let Some(layer) = config.layers.get(GeoLayer::Counties) else {
            bail!("--county needs a [layers.counties] entry in the config");
        };
        let counties = data::load_layer(
            &layer.path,
            GeoLayer::Counties,
            &config.data.state_fips,
            layer.name_field.as_deref(),
        )?;
        CountyResolver::new(counties).assign(&mut businesses);
    }

    let filter = BusinessFilter {
        zip: args.zip.clone(),
        types: match args.types.as_deref() {
            Some(raw) => TypeSelection::parse(raw).map_err(anyhow::Error::msg)?,
            None => TypeSelection::All,
        },
        county: args.county.clone(),
    };
    let selected: Vec<&Business> = filter.apply(&businesses);
    info!(
        "{} of {} businesses match the filter",
        selected.len(),
        businesses.len()
    );
    if selected.is_empty() {
        warn!("Nothing to fetch");
        return Ok(());
    }

    let cache = IsochroneCache::new();
    if args.resume && args.output.exists() {
        cache.load(&args.output, &businesses).await?;
    }
    let before = cache.len().await;

    let isochrones = cache.get_or_fetch_many(&client, &selected, minutes).await;
    let fetched = cache.len().await - before;

    let written = cache.save(&args.output).await?;

    info!(
        "Done: {} isochrones for this run ({} new), {} written to {} in {:.1}s",
        isochrones.len(),
        fetched,
        written,
        args.output.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
