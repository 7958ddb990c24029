//! tnauto - Tennessee auto business and population dashboard
//!
//! This library provides the loaders, indexes and view builders shared by the
//! dashboard server and the isochrones batch binary.

pub mod analysis;
pub mod app;
pub mod charts;
pub mod config;
pub mod data;
pub mod filter;
pub mod isochrone;
pub mod map;
pub mod models;
pub mod nearest;
pub mod pip;

pub use app::{Dashboard, DashboardError};
pub use config::Config;
pub use models::{Boundary, Business, BusinessType, CountyPopulation, GeoLayer};
