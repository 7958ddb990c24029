//! Core data models for the dashboard.

pub mod boundary;
pub mod business;
pub mod population;

pub use boundary::{Boundary, GeoLayer};
pub use business::{normalize_zip, Business, BusinessType};
pub use population::{BlockGroupPopulation, CountyPopulation};
