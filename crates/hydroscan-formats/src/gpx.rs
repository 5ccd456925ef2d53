//! GPX reading and writing.
//!
//! Enriched trajectories come back from the elevation service as GPX
//! with an `<ele>` per point. Points are read in document order:
//! waypoints, then track points, then route points. A point without
//! `<ele>` gets elevation `0.0`, the service's own value for "unknown".

use std::io::Cursor;

use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use hydroscan_pipeline::{GeoPoint, InferenceResult, Sample};

use crate::{FormatError, Layer};

const CREATOR: &str = "hydroscan";

fn parse(bytes: &[u8]) -> Result<Gpx, FormatError> {
    gpx::read(Cursor::new(bytes)).map_err(|e| FormatError::Gpx(e.to_string()))
}

fn position(waypoint: &Waypoint) -> GeoPoint {
    let p = waypoint.point();
    GeoPoint::new(p.x(), p.y())
}

fn track_points(doc: &Gpx) -> impl Iterator<Item = &Waypoint> {
    doc.tracks
        .iter()
        .flat_map(|t| &t.segments)
        .flat_map(|s| &s.points)
}

fn route_points(doc: &Gpx) -> impl Iterator<Item = &Waypoint> {
    doc.routes.iter().flat_map(|r| &r.points)
}

/// Read every point of an enriched GPX document as a sample.
///
/// # Errors
///
/// Returns [`FormatError::Gpx`] if the document cannot be parsed.
pub fn read_samples(bytes: &[u8]) -> Result<Vec<Sample>, FormatError> {
    let doc = parse(bytes)?;
    let samples = doc
        .waypoints
        .iter()
        .chain(track_points(&doc))
        .chain(route_points(&doc))
        .map(|w| {
            let p = position(w);
            Sample::new(p.lon, p.lat, w.elevation.unwrap_or(0.0))
        })
        .collect();
    Ok(samples)
}

/// Read a zone contour.
///
/// Track points are preferred, then route points, then waypoints.
///
/// # Errors
///
/// Returns [`FormatError::Gpx`] if the document cannot be parsed.
pub fn read_contour(bytes: &[u8]) -> Result<Vec<GeoPoint>, FormatError> {
    let doc = parse(bytes)?;
    let mut contour: Vec<GeoPoint> = track_points(&doc).map(position).collect();
    if contour.is_empty() {
        contour = route_points(&doc).map(position).collect();
    }
    if contour.is_empty() {
        contour = doc.waypoints.iter().map(position).collect();
    }
    Ok(contour)
}

fn waypoint(p: GeoPoint, name: Option<String>) -> Waypoint {
    let mut w = Waypoint::new(geo::Point::new(p.lon, p.lat));
    w.name = name;
    w
}

fn track(name: String, points: impl IntoIterator<Item = GeoPoint>) -> Track {
    let mut segment = TrackSegment::new();
    segment.points = points.into_iter().map(|p| waypoint(p, None)).collect();
    let mut track = Track::new();
    track.name = Some(name);
    track.segments.push(segment);
    track
}

fn write(doc: &Gpx) -> Result<String, FormatError> {
    let mut buf = Vec::new();
    gpx::write(doc, &mut buf).map_err(|e| FormatError::Write(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| FormatError::Write(e.to_string()))
}

fn document() -> Gpx {
    Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.to_string()),
        ..Default::default()
    }
}

/// Serialize scan points as plain waypoints for the elevation service.
///
/// # Errors
///
/// Returns [`FormatError::Write`] if serialization fails.
pub fn trajectory_to_gpx(points: &[GeoPoint]) -> Result<String, FormatError> {
    let mut doc = document();
    doc.waypoints = points.iter().map(|&p| waypoint(p, None)).collect();
    write(&doc)
}

/// Serialize one output layer.
///
/// Lines, the doline ring and the zone contour become tracks,
/// intersections become waypoints. Features are named `{LAYER}_{index}`.
///
/// # Errors
///
/// Returns [`FormatError::Write`] if serialization fails.
pub fn layer_to_gpx(result: &InferenceResult, layer: Layer) -> Result<String, FormatError> {
    let mut doc = document();
    match layer {
        Layer::Lines => {
            doc.tracks = result
                .lines_geographic()
                .into_iter()
                .enumerate()
                .map(|(i, vertices)| track(format!("{layer}_{i}"), vertices))
                .collect();
        }
        Layer::Intersections => {
            doc.waypoints = result
                .intersections_geographic()
                .into_iter()
                .enumerate()
                .map(|(i, p)| waypoint(p, Some(format!("{layer}_{i}"))))
                .collect();
        }
        Layer::Dolines => {
            doc.tracks = result
                .doline_geographic()
                .into_iter()
                .enumerate()
                .map(|(i, ring)| track(format!("{layer}_{i}"), ring))
                .collect();
        }
        Layer::Contour => {
            doc.tracks = result
                .contour_ring()
                .into_iter()
                .map(|ring| track(format!("{layer}_0"), ring))
                .collect();
        }
    }
    write(&doc)
}
