//! Loaders for the static datasets read at startup.

mod reader;

pub mod businesses;
pub mod population;
pub mod shapes;

pub use businesses::{classify, load_businesses};
pub use population::{
    load_block_groups, load_population_2020, merge_population, normalize_county,
    population_2020, totals_2010, CountyTotal,
};
pub use shapes::{load_layer, to_feature_collection};
