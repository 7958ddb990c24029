//! Population charts as Plotly figure JSON.
//!
//! The page hands these straight to `Plotly.newPlot(el, fig.data, fig.layout)`.

use serde::Serialize;

use crate::analysis::BusinessDensity;
use crate::models::CountyPopulation;

#[derive(Debug, Clone, Serialize)]
pub struct Figure<T = BarTrace> {
    pub data: Vec<T>,
    pub layout: Layout,
}

#[derive(Debug, Clone, Serialize)]
pub struct BarTrace {
    #[serde(rename = "type")]
    pub trace_type: &'static str,
    pub name: String,
    pub x: Vec<String>,
    pub y: Vec<u64>,
    pub marker: Marker,
}

/// Points or a fitted line
#[derive(Debug, Clone, Serialize)]
pub struct ScatterTrace {
    #[serde(rename = "type")]
    pub trace_type: &'static str,
    pub mode: &'static str,
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Vec<String>>,
    pub marker: Marker,
}

#[derive(Debug, Clone, Serialize)]
pub struct Marker {
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    pub title: Title,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barmode: Option<&'static str>,
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub plot_bgcolor: &'static str,
    pub paper_bgcolor: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Title {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Axis {
    pub title: Title,
    #[serde(rename = "categoryorder", skip_serializing_if = "Option::is_none")]
    pub category_order: Option<&'static str>,
    pub gridcolor: &'static str,
}

/// Light gridlines on a white background
const GRID_COLOR: &str = "#ebf0f8";

fn axis(title: &str, category_order: Option<&'static str>) -> Axis {
    Axis {
        title: Title {
            text: title.to_string(),
        },
        category_order,
        gridcolor: GRID_COLOR,
    }
}

fn bar(
    name: &str,
    color: &str,
    counties: &[CountyPopulation],
    value: fn(&CountyPopulation) -> u64,
) -> BarTrace {
    BarTrace {
        trace_type: "bar",
        name: name.to_string(),
        x: counties.iter().map(|c| c.county.clone()).collect(),
        y: counties.iter().map(value).collect(),
        marker: Marker {
            color: color.to_string(),
        },
    }
}

fn layout(title: &str, barmode: Option<&'static str>, xaxis: Axis, yaxis: Axis) -> Layout {
    Layout {
        title: Title {
            text: title.to_string(),
        },
        barmode,
        xaxis,
        yaxis,
        plot_bgcolor: "white",
        paper_bgcolor: "white",
    }
}

fn bar_layout(title: &str, barmode: Option<&'static str>) -> Layout {
    layout(
        title,
        barmode,
        axis("County", Some("total descending")),
        axis("Population", None),
    )
}

/// Grouped 2010 vs 2020 bars per county
pub fn population_comparison(counties: &[CountyPopulation]) -> Figure {
    Figure {
        data: vec![
            bar("Population_2010", "purple", counties, |c| c.population_2010),
            bar("Population_2020", "blue", counties, |c| c.population_2020),
        ],
        layout: bar_layout(
            "Tennessee Population Comparison: 2010 vs 2020",
            Some("group"),
        ),
    }
}

pub fn population_2010(counties: &[CountyPopulation]) -> Figure {
    Figure {
        data: vec![bar("Population_2010", "purple", counties, |c| c.population_2010)],
        layout: bar_layout("Tennessee Population 2010", None),
    }
}

pub fn population_2020(counties: &[CountyPopulation]) -> Figure {
    Figure {
        data: vec![bar("Population_2020", "blue", counties, |c| c.population_2020)],
        layout: bar_layout("Tennessee Population 2020", None),
    }
}

/// Business count per county against 2020 population, with the fitted line
pub fn business_density(analysis: &BusinessDensity) -> Figure<ScatterTrace> {
    let counties = &analysis.counties;
    let mut data = vec![ScatterTrace {
        trace_type: "scatter",
        mode: "markers",
        name: "Counties".to_string(),
        x: counties.iter().map(|c| c.population_2020 as f64).collect(),
        y: counties.iter().map(|c| c.business_count as f64).collect(),
        text: Some(counties.iter().map(|c| c.county.clone()).collect()),
        marker: Marker {
            color: "blue".to_string(),
        },
    }];

    if let Some(fit) = &analysis.fit {
        let (lo, hi) = counties
            .iter()
            .map(|c| c.population_2020 as f64)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                (lo.min(x), hi.max(x))
            });
        data.push(ScatterTrace {
            trace_type: "scatter",
            mode: "lines",
            name: "Fitted".to_string(),
            x: vec![lo, hi],
            y: vec![fit.predict(lo), fit.predict(hi)],
            text: None,
            marker: Marker {
                color: "red".to_string(),
            },
        });
    }

    Figure {
        data,
        layout: layout(
            "Auto Businesses vs 2020 Population by County",
            None,
            axis("Population 2020", None),
            axis("Businesses", None),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counties() -> Vec<CountyPopulation> {
        vec![
            CountyPopulation {
                county: "Shelby".to_string(),
                population_2010: 927_644,
                population_2020: 929_744,
                land_area_sqmi: None,
            },
            CountyPopulation {
                county: "Davidson".to_string(),
                population_2010: 626_681,
                population_2020: 715_884,
                land_area_sqmi: None,
            },
        ]
    }

    #[test]
    fn test_comparison_has_two_grouped_traces() {
        let fig = population_comparison(&counties());
        assert_eq!(fig.data.len(), 2);
        assert_eq!(fig.data[0].name, "Population_2010");
        assert_eq!(fig.data[1].y, vec![929_744, 715_884]);
        assert_eq!(fig.data[0].x, vec!["Shelby", "Davidson"]);

        let json = serde_json::to_value(&fig).unwrap();
        assert_eq!(json["layout"]["barmode"], "group");
        assert_eq!(json["layout"]["xaxis"]["categoryorder"], "total descending");
        assert_eq!(json["data"][0]["type"], "bar");
        assert_eq!(json["data"][0]["marker"]["color"], "purple");
        assert_eq!(json["layout"]["plot_bgcolor"], "white");
        assert_eq!(json["layout"]["yaxis"]["gridcolor"], GRID_COLOR);
        assert!(json["layout"].get("template").is_none());
    }

    #[test]
    fn test_single_year_charts() {
        let fig = population_2020(&counties());
        assert_eq!(fig.data.len(), 1);
        assert!(fig.layout.barmode.is_none());
        assert_eq!(population_2010(&counties()).data[0].y, vec![927_644, 626_681]);
    }

    #[test]
    fn test_business_density_scatter_with_fit() {
        use crate::models::{Business, BusinessType};

        let shop = |id: usize, county: &str| Business {
            id,
            name: format!("Shop {}", id),
            address: None,
            city: None,
            state: None,
            postal_code: None,
            phone: None,
            lat: 36.0,
            lon: -86.0,
            business_type: BusinessType::Other,
            county: Some(county.to_string()),
        };
        let mut population = counties();
        population.push(CountyPopulation {
            county: "Knox".to_string(),
            population_2010: 432_226,
            population_2020: 478_971,
            land_area_sqmi: None,
        });
        let businesses = vec![shop(0, "Shelby"), shop(1, "Shelby"), shop(2, "Davidson")];

        let analysis = crate::analysis::business_density(&businesses, &population);
        let fig = business_density(&analysis);
        assert_eq!(fig.data.len(), 2);
        assert_eq!(fig.data[0].mode, "markers");
        assert_eq!(fig.data[0].y, vec![2.0, 1.0, 0.0]);
        assert_eq!(fig.data[1].x, vec![478_971.0, 929_744.0]);

        let json = serde_json::to_value(&fig).unwrap();
        assert_eq!(json["data"][0]["type"], "scatter");
        assert_eq!(json["data"][0]["text"][2], "Knox");
        assert!(json["data"][1].get("text").is_none());
    }
}
