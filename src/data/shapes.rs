//! Boundary layer loading from shapefiles or GeoJSON, filtered to one state.

use anyhow::{anyhow, bail, Context, Result};
use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

use crate::models::{Boundary, GeoLayer};

const STATE_FIELDS: &[&str] = &["STATEFP", "statefp"];

/// Load a boundary layer, keeping only features in `state_fips`
pub fn load_layer(
    path: &Path,
    layer: GeoLayer,
    state_fips: &str,
    name_field: Option<&str>,
) -> Result<Vec<Boundary>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .ok_or_else(|| anyhow!("Layer file has no extension: {}", path.display()))?;

    info!("Loading {} layer from {}", layer, path.display());

    let boundaries = match extension.as_str() {
        "shp" => load_shapefile(path, layer, state_fips, name_field)?,
        "json" | "geojson" => load_geojson(path, layer, state_fips, name_field)?,
        _ => bail!("Unsupported geometry format: {}", extension),
    };

    info!(
        "Loaded {} {} boundaries for state {}",
        boundaries.len(),
        layer,
        state_fips
    );
    Ok(boundaries)
}

fn name_candidates<'a>(layer: GeoLayer, name_field: Option<&'a str>) -> Vec<&'a str> {
    name_field
        .into_iter()
        .chain(layer.name_fields().iter().copied())
        .collect()
}

fn load_shapefile(
    path: &Path,
    layer: GeoLayer,
    state_fips: &str,
    name_field: Option<&str>,
) -> Result<Vec<Boundary>> {
    use shapefile::dbase::{FieldValue, Record};

    fn value(record: &Record, names: &[&str]) -> Option<String> {
        names.iter().find_map(|n| match record.get(n)? {
            FieldValue::Character(Some(s)) => Some(s.trim().to_string()),
            FieldValue::Numeric(Some(v)) => Some(format_number(*v)),
            FieldValue::Double(v) => Some(format_number(*v)),
            FieldValue::Float(Some(v)) => Some(format_number(*v as f64)),
            FieldValue::Integer(v) => Some(v.to_string()),
            _ => None,
        })
    }

    let mut reader = shapefile::Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {}", path.display()))?;

    let names = name_candidates(layer, name_field);
    let mut boundaries = Vec::new();

    for (idx, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result?;

        if !STATE_FIELDS.iter().any(|f| record.get(f).is_some()) {
            bail!("State FIPS column not found in {}", path.display());
        }
        if value(&record, STATE_FIELDS).as_deref() != Some(state_fips) {
            continue;
        }

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?,
            shapefile::Shape::PolygonM(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?,
            shapefile::Shape::PolygonZ(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?,
            _ => {
                debug!("Skipping non-polygon shape {} in {}", idx, path.display());
                continue;
            }
        };

        boundaries.push(Boundary {
            id: value(&record, layer.id_fields()).unwrap_or_else(|| idx.to_string()),
            name: value(&record, &names).unwrap_or_else(|| format!("{} {}", layer, idx)),
            state_fips: state_fips.to_string(),
            geometry,
        });
    }

    Ok(boundaries)
}

fn load_geojson(
    path: &Path,
    layer: GeoLayer,
    state_fips: &str,
    name_field: Option<&str>,
) -> Result<Vec<Boundary>> {
    fn value(props: &JsonObject, names: &[&str]) -> Option<String> {
        names.iter().find_map(|n| match props.get(*n)? {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            serde_json::Value::Number(num) => Some(num.to_string()),
            _ => None,
        })
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open GeoJSON file: {}", path.display()))?;
    let geojson = GeoJson::from_reader(BufReader::new(file)).context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => bail!("GeoJSON must be a FeatureCollection"),
    };

    let names = name_candidates(layer, name_field);
    let mut boundaries = Vec::new();

    for (idx, feature) in collection.features.into_iter().enumerate() {
        let empty = JsonObject::new();
        let props = feature.properties.as_ref().unwrap_or(&empty);

        if !STATE_FIELDS.iter().any(|f| props.contains_key(*f)) {
            bail!("State FIPS column not found in {}", path.display());
        }
        if value(props, STATE_FIELDS).as_deref() != Some(state_fips) {
            continue;
        }

        let geometry = match feature.geometry {
            Some(geom) => {
                let converted: geo::Geometry<f64> = geom
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert GeoJSON geometry: {:?}", e))?;
                match converted {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue,
                }
            }
            None => continue,
        };

        boundaries.push(Boundary {
            id: value(props, layer.id_fields()).unwrap_or_else(|| idx.to_string()),
            name: value(props, &names).unwrap_or_else(|| format!("{} {}", layer, idx)),
            state_fips: state_fips.to_string(),
            geometry,
        });
    }

    Ok(boundaries)
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// Convert a boundary layer to GeoJSON for the map overlay
pub fn to_feature_collection(boundaries: &[Boundary]) -> FeatureCollection {
    let features = boundaries
        .iter()
        .map(|b| {
            let mut props = JsonObject::new();
            props.insert("id".to_string(), b.id.clone().into());
            props.insert("name".to_string(), b.name.clone().into());
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&b.geometry))),
                id: None,
                properties: Some(props),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
    use shapefile::{Point, Polygon, PolygonRing, Polyline};
    use std::io::Write;

    fn square_feature(statefp: &str, name: &str, x: f64) -> String {
        format!(
            r#"{{"type":"Feature","properties":{{"STATEFP":"{statefp}","NAME":"{name}","GEOID":"{statefp}{x}"}},
            "geometry":{{"type":"Polygon","coordinates":[[[{x},35.0],[{x1},35.0],[{x1},36.0],[{x},36.0],[{x},35.0]]]}}}}"#,
            statefp = statefp,
            name = name,
            x = x,
            x1 = x + 1.0
        )
    }

    fn write_geojson(features: &[String]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".geojson").tempfile().unwrap();
        write!(
            file,
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            features.join(",")
        )
        .unwrap();
        file
    }

    #[test]
    fn test_geojson_filtered_by_state() {
        let file = write_geojson(&[
            square_feature("47", "Davidson", -87.0),
            square_feature("21", "Warren", -86.0),
            square_feature("47", "Knox", -84.0),
        ]);

        let layer = load_layer(file.path(), GeoLayer::Counties, "47", None).unwrap();
        let names: Vec<&str> = layer.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Davidson", "Knox"]);
        assert!(layer.iter().all(|b| b.state_fips == "47"));
        assert_eq!(layer[0].bbox(), Some((-87.0, 35.0, -86.0, 36.0)));
    }

    #[test]
    fn test_missing_state_column_is_error() {
        let feature = r#"{"type":"Feature","properties":{"NAME":"Nowhere"},
            "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}"#;
        let file = write_geojson(&[feature.to_string()]);
        let err = load_layer(file.path(), GeoLayer::Counties, "47", None).unwrap_err();
        assert!(err.to_string().contains("State FIPS column not found"));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".kml").tempfile().unwrap();
        assert!(load_layer(file.path(), GeoLayer::Hsas, "47", None).is_err());
    }


    fn square(x: f64, y: f64) -> Polygon {
        Polygon::new(PolygonRing::Outer(vec![
            Point::new(x, y),
            Point::new(x, y + 1.0),
            Point::new(x + 1.0, y + 1.0),
            Point::new(x + 1.0, y),
            Point::new(x, y),
        ]))
    }

    fn field(name: &str) -> FieldName {
        FieldName::try_from(name).unwrap()
    }

    fn record(values: &[(&str, FieldValue)]) -> Record {
        let mut record = Record::default();
        for (name, value) in values {
            record.insert(name.to_string(), value.clone());
        }
        record
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Character(Some(s.to_string()))
    }

    fn county_fields() -> TableWriterBuilder {
        TableWriterBuilder::new()
            .add_character_field(field("STATEFP"), 2)
            .add_character_field(field("NAME"), 40)
            .add_numeric_field(field("GEOID"), 10, 0)
    }

    #[test]
    fn test_shapefile_filtered_by_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counties.shp");
        {
            let mut writer = shapefile::Writer::from_path(&path, county_fields()).unwrap();
            for (statefp, name, geoid, x) in [
                ("47", "Davidson", 47037.0, -87.0),
                ("21", "Warren", 21227.0, -86.0),
                ("47", "Knox", 47093.0, -84.0),
            ] {
                let rec = record(&[
                    ("STATEFP", text(statefp)),
                    ("NAME", text(name)),
                    ("GEOID", FieldValue::Numeric(Some(geoid))),
                ]);
                writer.write_shape_and_record(&square(x, 35.0), &rec).unwrap();
            }
        }

        let layer = load_layer(&path, GeoLayer::Counties, "47", None).unwrap();
        let names: Vec<&str> = layer.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Davidson", "Knox"]);
        // Whole numbers from numeric columns keep no decimal point
        let ids: Vec<&str> = layer.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["47037", "47093"]);
        assert_eq!(layer[0].bbox(), Some((-87.0, 35.0, -86.0, 36.0)));
    }

    #[test]
    fn test_shapefile_numeric_state_and_name_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hsa.shp");
        {
            let fields = TableWriterBuilder::new()
                .add_numeric_field(field("STATEFP"), 2, 0)
                .add_numeric_field(field("hsanum"), 6, 0)
                .add_character_field(field("hsacity"), 40)
                .add_character_field(field("label"), 40);
            let mut writer = shapefile::Writer::from_path(&path, fields).unwrap();
            let rec = record(&[
                ("STATEFP", FieldValue::Numeric(Some(47.0))),
                ("hsanum", FieldValue::Numeric(Some(44001.0))),
                ("hsacity", text("Nashville")),
                ("label", text("  Middle TN  ")),
            ]);
            writer.write_shape_and_record(&square(-87.0, 36.0), &rec).unwrap();
        }

        let layer = load_layer(&path, GeoLayer::Hsas, "47", None).unwrap();
        assert_eq!(layer.len(), 1);
        assert_eq!(layer[0].id, "44001");
        assert_eq!(layer[0].name, "Nashville");

        let layer = load_layer(&path, GeoLayer::Hsas, "47", Some("label")).unwrap();
        assert_eq!(layer[0].name, "Middle TN");
    }

    #[test]
    fn test_shapefile_missing_state_column_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nostate.shp");
        {
            let fields = TableWriterBuilder::new().add_character_field(field("NAME"), 40);
            let mut writer = shapefile::Writer::from_path(&path, fields).unwrap();
            let rec = record(&[("NAME", text("Nowhere"))]);
            writer.write_shape_and_record(&square(0.0, 0.0), &rec).unwrap();
        }

        let err = load_layer(&path, GeoLayer::Counties, "47", None).unwrap_err();
        assert!(err.to_string().contains("State FIPS column not found"));
    }

    #[test]
    fn test_shapefile_non_polygons_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roads.shp");
        {
            let mut writer = shapefile::Writer::from_path(&path, county_fields()).unwrap();
            let rec = record(&[
                ("STATEFP", text("47")),
                ("NAME", text("I-40")),
                ("GEOID", FieldValue::Numeric(Some(1.0))),
            ]);
            let line = Polyline::new(vec![Point::new(-87.0, 36.0), Point::new(-86.0, 36.1)]);
            writer.write_shape_and_record(&line, &rec).unwrap();
        }

        let layer = load_layer(&path, GeoLayer::Counties, "47", None).unwrap();
        assert!(layer.is_empty());
    }

    #[test]
    fn test_feature_collection_keeps_names() {
        let file = write_geojson(&[square_feature("47", "Shelby", -90.0)]);
        let layer = load_layer(file.path(), GeoLayer::Counties, "47", None).unwrap();
        let fc = to_feature_collection(&layer);
        assert_eq!(fc.features.len(), 1);
        let props = fc.features[0].properties.as_ref().unwrap();
        assert_eq!(props["name"], "Shelby");
    }
}
