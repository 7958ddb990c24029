//! Map view documents rendered by Leaflet in the dashboard page.

use geojson::FeatureCollection;
use serde::Serialize;
use std::sync::Arc;

use crate::isochrone::Isochrone;
use crate::models::{Business, GeoLayer};
use crate::nearest::Neighbor;

/// Center of Tennessee
pub const DEFAULT_CENTER: [f64; 2] = [35.8601, -86.6602];
pub const DEFAULT_ZOOM: u8 = 7;
pub const NEAREST_ZOOM: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerIcon {
    InfoSign,
    Star,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapMarker {
    pub business_id: usize,
    pub lat: f64,
    pub lon: f64,
    /// HTML popup, already escaped
    pub popup: String,
    pub color: String,
    pub icon: MarkerIcon,
}

#[derive(Debug, Clone, Serialize)]
pub struct Polyline {
    /// [[lat, lon], [lat, lon]]
    pub points: Vec<[f64; 2]>,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundaryOverlay {
    pub name: String,
    pub geojson: Arc<FeatureCollection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapView {
    /// [lat, lon]
    pub center: [f64; 2],
    pub zoom: u8,
    pub cluster_markers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundaries: Option<BoundaryOverlay>,
    pub markers: Vec<MapMarker>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<Polyline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isochrones: Option<FeatureCollection>,
}

impl MapView {
    pub fn new(center: [f64; 2], zoom: u8) -> Self {
        Self {
            center,
            zoom,
            cluster_markers: true,
            boundaries: None,
            markers: Vec::new(),
            lines: Vec::new(),
            isochrones: None,
        }
    }

    /// Statewide map with one clustered marker per business
    pub fn overview(center: [f64; 2], zoom: u8, businesses: &[&Business]) -> Self {
        let mut view = Self::new(center, zoom);
        view.markers = businesses
            .iter()
            .map(|b| MapMarker {
                business_id: b.id,
                lat: b.lat,
                lon: b.lon,
                popup: popup(b, None),
                color: b.business_type.color().to_string(),
                icon: MarkerIcon::InfoSign,
            })
            .collect();
        view
    }

    pub fn with_boundaries(mut self, layer: GeoLayer, geojson: Arc<FeatureCollection>) -> Self {
        self.boundaries = Some(BoundaryOverlay {
            name: layer.title().to_string(),
            geojson,
        });
        self
    }

    pub fn with_isochrones(mut self, isochrones: &[Arc<Isochrone>]) -> Self {
        self.isochrones = Some(FeatureCollection {
            bbox: None,
            features: isochrones.iter().map(|i| i.to_feature()).collect(),
            foreign_members: None,
        });
        self
    }

    /// Selected shop, its neighbors and a line to each
    pub fn nearest(selected: &Business, neighbors: &[(&Business, &Neighbor)]) -> Self {
        let mut view = Self::new([selected.lat, selected.lon], NEAREST_ZOOM);
        view.cluster_markers = false;

        view.markers.push(MapMarker {
            business_id: selected.id,
            lat: selected.lat,
            lon: selected.lon,
            popup: popup(selected, Some("Selected Shop:")),
            color: "red".to_string(),
            icon: MarkerIcon::Star,
        });

        for (business, neighbor) in neighbors {
            let mut text = popup(business, Some("Nearest Shop:"));
            text.push_str(&format!("<br>{:.2} km away", neighbor.distance_km));
            view.markers.push(MapMarker {
                business_id: business.id,
                lat: business.lat,
                lon: business.lon,
                popup: text,
                color: "blue".to_string(),
                icon: MarkerIcon::InfoSign,
            });
            view.lines.push(Polyline {
                points: vec![[selected.lat, selected.lon], [business.lat, business.lon]],
                color: "blue".to_string(),
            });
        }
        view
    }
}

/// "<b>Name</b><br>address, city, TN zip"
pub fn popup(business: &Business, label: Option<&str>) -> String {
    let or_na = |v: &Option<String>| v.as_deref().map(escape_html).unwrap_or_else(|| "N/A".into());
    let heading = match label {
        Some(label) => format!("<b>{}</b> {}", label, escape_html(&business.name)),
        None => format!("<b>{}</b>", escape_html(&business.name)),
    };
    format!(
        "{}<br>{}, {}, TN {}",
        heading,
        or_na(&business.address),
        or_na(&business.city),
        or_na(&business.postal_code)
    )
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
