//! Business counts per county against 2020 population.
//!
//! Fits `business_count = intercept + slope * population_2020` by least
//! squares over every county in the population table. The slope's two-tailed
//! p-value comes from a Student's t distribution with `n - 2` degrees of
//! freedom.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::debug;

use crate::models::{Business, CountyPopulation};

/// Fewest counties a fit is attempted on
pub const MIN_FIT_COUNTIES: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct CountyBusinessCount {
    pub county: String,
    pub population_2020: u64,
    pub business_count: usize,
    /// Businesses per 100,000 residents
    pub per_100k: Option<f64>,
}

/// Ordinary least squares line with goodness-of-fit figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// `None` when every observed count is the same
    pub r_squared: Option<f64>,
    pub mse: f64,
    /// `None` for an exact fit
    pub slope_p_value: Option<f64>,
    pub samples: usize,
}

impl LinearFit {
    /// `None` with fewer than [`MIN_FIT_COUNTIES`] points or no spread in `xs`
    pub fn fit(xs: &[f64], ys: &[f64]) -> Option<Self> {
        let n = xs.len();
        if n != ys.len() || n < MIN_FIT_COUNTIES {
            return None;
        }
        let nf = n as f64;
        let mean_x = xs.iter().sum::<f64>() / nf;
        let mean_y = ys.iter().sum::<f64>() / nf;

        let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
        if sxx == 0.0 {
            return None;
        }
        let sxy: f64 = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (x - mean_x) * (y - mean_y))
            .sum();

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;

        let ss_res: f64 = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
            .sum();
        let ss_tot: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();

        let r_squared = (ss_tot > 0.0).then(|| 1.0 - ss_res / ss_tot);

        // Residuals at rounding level count as an exact fit
        let exact = ss_res <= f64::EPSILON * ss_tot;
        let slope_p_value = if exact {
            None
        } else {
            let df = nf - 2.0;
            let t = slope / (ss_res / df / sxx).sqrt();
            StudentsT::new(0.0, 1.0, df)
                .ok()
                .map(|dist| 2.0 * (1.0 - dist.cdf(t.abs())))
        };

        Some(Self {
            slope,
            intercept,
            r_squared,
            mse: ss_res / nf,
            slope_p_value,
            samples: n,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Per-county counts and the fitted relationship
#[derive(Debug, Clone, Serialize)]
pub struct BusinessDensity {
    pub counties: Vec<CountyBusinessCount>,
    pub fit: Option<LinearFit>,
    /// Statewide rate over the counties in the table
    pub per_100k: Option<f64>,
}

fn per_100k(count: usize, population: u64) -> Option<f64> {
    (population > 0).then(|| count as f64 / population as f64 * 100_000.0)
}

/// Count businesses per county and fit the count against 2020 population.
///
/// Businesses without a resolved county, or in a county missing from the
/// population table, are not counted.
pub fn business_density(
    businesses: &[Business],
    population: &[CountyPopulation],
) -> BusinessDensity {
    let counties: Vec<CountyBusinessCount> = population
        .iter()
        .map(|c| {
            let business_count = businesses
                .iter()
                .filter(|b| {
                    b.county
                        .as_deref()
                        .is_some_and(|name| name.eq_ignore_ascii_case(&c.county))
                })
                .count();
            CountyBusinessCount {
                county: c.county.clone(),
                population_2020: c.population_2020,
                business_count,
                per_100k: per_100k(business_count, c.population_2020),
            }
        })
        .collect();

    let xs: Vec<f64> = counties.iter().map(|c| c.population_2020 as f64).collect();
    let ys: Vec<f64> = counties.iter().map(|c| c.business_count as f64).collect();
    let fit = LinearFit::fit(&xs, &ys);
    if fit.is_none() {
        debug!("Not enough county data for a fit ({} counties)", counties.len());
    }

    let total_businesses: usize = counties.iter().map(|c| c.business_count).sum();
    let total_population: u64 = counties.iter().map(|c| c.population_2020).sum();

    BusinessDensity {
        per_100k: per_100k(total_businesses, total_population),
        counties,
        fit,
    }
}
