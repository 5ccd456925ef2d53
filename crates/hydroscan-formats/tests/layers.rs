//! Integration test: run an inference over a zone read from a KMZ and
//! export every layer in every format, checking that the formats agree
//! on feature counts.

#![allow(clippy::unwrap_used)]

use hydroscan_formats::geojson::layer_to_value;
use hydroscan_formats::gpx::{layer_to_gpx, read_samples, trajectory_to_gpx};
use hydroscan_formats::kml::layer_to_kml;
use hydroscan_formats::archive::zip_entries;
use hydroscan_formats::{ContourFormat, Layer, SvgMetadata, read_contour, to_map_svg};
use hydroscan_pipeline::{GeoPoint, InferenceConfig, InferenceResult, Sample, process};

const STEP_DEG: f64 = 0.0001;

/// Two perpendicular ridges crossing near (-1.52, 12.37) plus a bowl to
/// the south-east.
fn survey() -> Vec<Sample> {
    let ridge = |i: u32| if i % 3 == 1 { 302.0 } else { 300.0 };
    let mut samples = Vec::new();
    for i in 0..21_u32 {
        let d = (f64::from(i) - 10.0) * STEP_DEG;
        samples.push(Sample::new(-1.52 + d, 12.37, ridge(i)));
    }
    for i in 0..21_u32 {
        let d = (f64::from(i) - 10.0) * STEP_DEG;
        samples.push(Sample::new(-1.52 - STEP_DEG / 2.0, 12.37 + d, ridge(i)));
    }
    for row in 0..6_u32 {
        for col in 0..6_u32 {
            let dr = f64::from(row) - 2.5;
            let dc = f64::from(col) - 2.5;
            samples.push(Sample::new(
                -1.518 + f64::from(col) * STEP_DEG,
                12.368 + f64::from(row) * STEP_DEG,
                dc.mul_add(dc, dr * dr).mul_add(0.5, 290.0),
            ));
        }
    }
    samples
}

/// A square zone around the survey, zipped as `doc.kml` in a KMZ.
fn zone_kmz() -> Vec<u8> {
    let kml = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>zone</name>
      <Polygon><outerBoundaryIs><LinearRing>
        <coordinates>-1.5215,12.3685,0 -1.5165,12.3685,0 -1.5165,12.3715,0 -1.5215,12.3715,0 -1.5215,12.3685,0</coordinates>
      </LinearRing></outerBoundaryIs></Polygon>
    </Placemark>
  </Document>
</kml>"#;
    zip_entries([("doc.kml", kml.as_bytes())]).unwrap()
}

fn feature_count(result: &InferenceResult, layer: Layer) -> usize {
    match layer {
        Layer::Lines => result.lines.len(),
        Layer::Intersections => result.intersections.len(),
        Layer::Dolines => usize::from(result.doline.is_some()),
        Layer::Contour => usize::from(result.contour_ring().is_some()),
    }
}

#[test]
fn every_format_agrees_on_feature_counts() {
    let samples = survey();
    let contour = read_contour(ContourFormat::Kmz, &zone_kmz()).unwrap();
    assert_eq!(contour.len(), 5);
    let result = process(&samples, &InferenceConfig::default())
        .unwrap()
        .with_contour(contour);
    assert!(result.doline.is_some());
    assert_eq!(feature_count(&result, Layer::Contour), 1);
    // Roughly 545 m by 333 m.
    let hectares = result.contour_area().unwrap() / 10_000.0;
    assert!((15.0..21.0).contains(&hectares), "{hectares} ha");

    for layer in Layer::ALL {
        let expected = feature_count(&result, layer);

        let geojson = layer_to_value(&result, layer);
        assert_eq!(
            geojson["features"].as_array().unwrap().len(),
            expected,
            "{layer} geojson"
        );

        let kml = layer_to_kml(&result, layer, "survey");
        assert_eq!(kml.matches("<Placemark>").count(), expected, "{layer} kml");

        let gpx_text = layer_to_gpx(&result, layer).unwrap();
        let doc = gpx::read(std::io::Cursor::new(gpx_text.as_bytes())).unwrap();
        let gpx_count = match layer {
            Layer::Intersections => doc.waypoints.len(),
            Layer::Lines | Layer::Dolines | Layer::Contour => doc.tracks.len(),
        };
        assert_eq!(gpx_count, expected, "{layer} gpx");
    }

    let svg = to_map_svg(&result, &samples, &SvgMetadata::default());
    assert_eq!(
        svg.matches("<circle").count(),
        samples.len() + result.intersections.len()
    );
    assert_eq!(svg.matches("<path").count(), result.lines.len());
    assert!(svg.contains(r#"id="CONTOUR""#));
    assert_eq!(svg.matches("<polygon").count(), 2);
}

#[test]
fn exported_geometry_is_geographic() {
    let samples = survey();
    let result = process(&samples, &InferenceConfig::default()).unwrap();
    let geojson = layer_to_value(&result, Layer::Intersections);
    for feature in geojson["features"].as_array().unwrap() {
        let lon = feature["geometry"]["coordinates"][0].as_f64().unwrap();
        let lat = feature["geometry"]["coordinates"][1].as_f64().unwrap();
        assert!((lon + 1.52).abs() < 0.01, "lon {lon}");
        assert!((lat - 12.37).abs() < 0.01, "lat {lat}");
    }
}

#[test]
fn trajectory_reads_back_as_samples() {
    let points: Vec<GeoPoint> = (0..5_u32)
        .map(|i| GeoPoint::new(-1.52, 12.37 + f64::from(i) * STEP_DEG))
        .collect();
    let xml = trajectory_to_gpx(&points).unwrap();
    let samples = read_samples(xml.as_bytes()).unwrap();
    assert_eq!(samples.len(), points.len());
    for (sample, point) in samples.iter().zip(&points) {
        assert!((sample.lat - point.lat).abs() < 1e-9);
    }
}
