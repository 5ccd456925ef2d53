//! GeoJSON export (RFC 7946).
//!
//! Each layer becomes a `FeatureCollection` with positions in
//! `[longitude, latitude]` order.

use hydroscan_pipeline::{GeoPoint, InferenceResult};
use serde_json::{Value, json};

use crate::{FormatError, Layer};

fn position(p: GeoPoint) -> Value {
    json!([p.lon, p.lat])
}

fn feature(name: String, geometry: Value, mut properties: Value) -> Value {
    if let Some(map) = properties.as_object_mut() {
        map.insert("name".to_string(), Value::String(name));
    }
    json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": properties,
    })
}

/// Build one layer as a GeoJSON `FeatureCollection` value.
#[must_use]
pub fn layer_to_value(result: &InferenceResult, layer: Layer) -> Value {
    let features: Vec<Value> = match layer {
        Layer::Lines => result
            .lines_geographic()
            .into_iter()
            .zip(&result.lines)
            .enumerate()
            .map(|(i, (vertices, line))| {
                feature(
                    format!("{layer}_{i}"),
                    json!({
                        "type": "LineString",
                        "coordinates": vertices.map(position),
                    }),
                    json!({ "salient": line.indices }),
                )
            })
            .collect(),
        Layer::Intersections => result
            .intersections_geographic()
            .into_iter()
            .zip(&result.intersections)
            .enumerate()
            .map(|(i, (p, ix))| {
                feature(
                    format!("{layer}_{i}"),
                    json!({ "type": "Point", "coordinates": position(p) }),
                    json!({ "lines": ix.lines }),
                )
            })
            .collect(),
        Layer::Dolines => result
            .doline_geographic()
            .into_iter()
            .zip(&result.doline)
            .map(|(ring, doline)| {
                let ring: Vec<Value> = ring.into_iter().map(position).collect();
                feature(
                    format!("{layer}_0"),
                    json!({ "type": "Polygon", "coordinates": [ring] }),
                    json!({
                        "sample_count": doline.sample_count,
                        "cutoff": doline.cutoff,
                        "area": doline.area,
                    }),
                )
            })
            .collect(),
        Layer::Contour => result
            .contour_ring()
            .into_iter()
            .map(|ring| {
                let area = result.contour_area();
                let ring: Vec<Value> = ring.into_iter().map(position).collect();
                feature(
                    format!("{layer}_0"),
                    json!({ "type": "Polygon", "coordinates": [ring] }),
                    json!({ "area": area }),
                )
            })
            .collect(),
    };

    json!({
        "type": "FeatureCollection",
        "name": layer.name(),
        "features": features,
    })
}

/// Serialize one layer as a pretty-printed GeoJSON document.
///
/// # Errors
///
/// Returns [`FormatError::Json`] if serialization fails.
pub fn layer_to_geojson(result: &InferenceResult, layer: Layer) -> Result<String, FormatError> {
    Ok(serde_json::to_string_pretty(&layer_to_value(result, layer))?)
}
