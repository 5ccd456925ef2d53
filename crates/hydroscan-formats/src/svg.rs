//! SVG map preview.
//!
//! Renders the survey, the zone contour and the inference layers as a
//! north-up map
//! using the [`svg`] crate. Planar coordinates are fitted into a
//! document whose longer side is 200 units, with the y
//! axis flipped so north is up.
//!
//! Each layer lives in its own `<g>` whose `id` is the layer name, so
//! the file can be restyled or split without re-running the pipeline.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Circle, Description, Element, Group, Path, Polygon, Title};
use svg::node::{Node, Text};

use hydroscan_pipeline::{InferenceResult, Point, Sample};

use crate::Layer;

/// Length of the longer document side in user units.
const DOCUMENT_SIZE: f64 = 200.0;
/// Blank border around the plotted extent, in user units.
const MARGIN: f64 = 5.0;

const SAMPLE_RADIUS: f64 = 0.6;
const INTERSECTION_RADIUS: f64 = 1.5;

/// Metadata to embed in the map.
///
/// All fields are optional and XML-escaped by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    pub title: Option<&'a str>,

    /// Free-form description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized inference configuration, embedded under `<metadata>`
    /// so the map records how it was produced.
    pub config_json: Option<&'a str>,
}

/// Maps planar coordinates into document space.
#[derive(Debug, Clone, Copy)]
struct MapTransform {
    min_x: f64,
    max_y: f64,
    scale: f64,
    width: f64,
    height: f64,
}

impl MapTransform {
    fn fit(points: impl IntoIterator<Item = Point>) -> Self {
        let mut min = Point::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in points {
            min = Point::new(min.x.min(p.x), min.y.min(p.y));
            max = Point::new(max.x.max(p.x), max.y.max(p.y));
        }
        if !min.x.is_finite() {
            min = Point::new(0.0, 0.0);
            max = min;
        }

        let extent_x = max.x - min.x;
        let extent_y = max.y - min.y;
        let longer = extent_x.max(extent_y);
        let scale = if longer > 0.0 {
            2.0f64.mul_add(-MARGIN, DOCUMENT_SIZE) / longer
        } else {
            1.0
        };
        Self {
            min_x: min.x,
            max_y: max.y,
            scale,
            width: 2.0f64.mul_add(MARGIN, extent_x * scale),
            height: 2.0f64.mul_add(MARGIN, extent_y * scale),
        }
    }

    fn apply(self, p: Point) -> (f64, f64) {
        (
            (p.x - self.min_x).mul_add(self.scale, MARGIN),
            (self.max_y - p.y).mul_add(self.scale, MARGIN),
        )
    }
}

fn polyline_data(transform: MapTransform, points: &[Point]) -> Option<Data> {
    let (first, rest) = points.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let mut data = Data::new().move_to(transform.apply(*first));
    for &p in rest {
        data = data.line_to(transform.apply(p));
    }
    Some(data)
}

fn polygon_points(transform: MapTransform, ring: &[Point]) -> String {
    ring.iter()
        .map(|&p| {
            let (x, y) = transform.apply(p);
            format!("{x},{y}")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn dot(transform: MapTransform, p: Point, radius: f64) -> Circle {
    let (cx, cy) = transform.apply(p);
    Circle::new()
        .set("cx", cx)
        .set("cy", cy)
        .set("r", radius)
}

/// Render the survey and the inference layers as an SVG map.
///
/// `samples` are the input samples of the run that produced `result`;
/// they are projected with the run's planar frame and drawn as small
/// grey dots underneath the layers.
///
/// # Examples
///
/// ```
/// use hydroscan_formats::{SvgMetadata, to_map_svg};
/// use hydroscan_pipeline::{CoordinateFrame, InferenceConfig, Sample, process};
///
/// let samples: Vec<Sample> = (0..12_i32)
///     .map(|i| Sample::new(f64::from(i), 0.0, if i % 4 == 1 { 3.0 } else { 1.0 }))
///     .collect();
/// let config = InferenceConfig { frame: CoordinateFrame::Geographic, ..InferenceConfig::default() };
/// let result = process(&samples, &config).unwrap();
/// let metadata = SvgMetadata { title: Some("zone-a"), ..SvgMetadata::default() };
/// let svg = to_map_svg(&result, &samples, &metadata);
/// assert!(svg.contains("<title>zone-a</title>"));
/// assert!(svg.contains(r#"id="LIGNES""#));
/// ```
#[must_use]
pub fn to_map_svg(
    result: &InferenceResult,
    samples: &[Sample],
    metadata: &SvgMetadata<'_>,
) -> String {
    let projected: Vec<Point> = samples
        .iter()
        .map(|s| result.frame.forward(s.position()))
        .collect();
    let transform = MapTransform::fit(
        projected
            .iter()
            .copied()
            .chain(result.lines.iter().flat_map(|l| l.vertices))
            .chain(result.intersections.iter().map(|ix| ix.point))
            .chain(result.doline.iter().flat_map(|d| d.ring.iter().copied()))
            .chain(result.contour.iter().map(|&p| result.frame.forward(p))),
    );

    let mut doc = Document::new()
        .set("width", transform.width)
        .set("height", transform.height)
        .set("viewBox", (0.0, 0.0, transform.width, transform.height));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }
    if let Some(config_json) = metadata.config_json {
        let mut config_el = Element::new("hydroscan:config");
        config_el.assign("xmlns:hydroscan", "urn:hydroscan:config:1");
        config_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(config_el);
        doc = doc.add(metadata_el);
    }

    let mut survey = Group::new().set("id", "samples").set("fill", "#9e9e9e");
    for &p in &projected {
        survey = survey.add(dot(transform, p, SAMPLE_RADIUS));
    }
    doc = doc.add(survey);

    let mut contour = Group::new()
        .set("id", Layer::Contour.name())
        .set("fill", "none")
        .set("stroke", "#2e7d32")
        .set("stroke-width", 0.6)
        .set("stroke-dasharray", "2,1");
    if let Some(ring) = result.contour_ring() {
        let ring: Vec<Point> = ring.into_iter().map(|p| result.frame.forward(p)).collect();
        let points = polygon_points(transform, &ring);
        contour = contour.add(Polygon::new().set("points", points));
    }
    doc = doc.add(contour);

    // Dolines first so lines and drilling points stay visible on top.
    let mut dolines = Group::new()
        .set("id", Layer::Dolines.name())
        .set("fill", "#4fc3f7")
        .set("fill-opacity", 0.35)
        .set("stroke", "#0277bd")
        .set("stroke-width", 0.5);
    if let Some(doline) = &result.doline {
        let points = polygon_points(transform, &doline.ring);
        dolines = dolines.add(Polygon::new().set("points", points));
    }
    doc = doc.add(dolines);

    let mut lines = Group::new()
        .set("id", Layer::Lines.name())
        .set("fill", "none")
        .set("stroke", "#6d4c41")
        .set("stroke-width", 0.8);
    for line in &result.lines {
        if let Some(data) = polyline_data(transform, &line.vertices) {
            lines = lines.add(Path::new().set("d", data));
        }
    }
    doc = doc.add(lines);

    let mut intersections = Group::new()
        .set("id", Layer::Intersections.name())
        .set("fill", "#d32f2f");
    for ix in &result.intersections {
        intersections = intersections.add(dot(transform, ix.point, INTERSECTION_RADIUS));
    }
    doc = doc.add(intersections);

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hydroscan_pipeline::{CandidateLine, Doline, GeoPoint, IntersectionPoint, PlanarFrame};

    use super::*;

    fn result() -> InferenceResult {
        InferenceResult {
            frame: PlanarFrame::Geographic,
            sample_count: 4,
            threshold: 1.0,
            salient: vec![0, 1, 2],
            aligned: vec![0, 1, 2],
            lines: vec![CandidateLine::new(
                [0, 1, 2],
                [
                    Point::new(0.0, 0.0),
                    Point::new(50.0, 0.0),
                    Point::new(100.0, 0.0),
                ],
            )],
            intersections: vec![IntersectionPoint {
                point: Point::new(50.0, 0.0),
                lines: [0, 1],
            }],
            doline: Some(Doline {
                ring: vec![
                    Point::new(0.0, 0.0),
                    Point::new(100.0, 0.0),
                    Point::new(0.0, 50.0),
                    Point::new(0.0, 0.0),
                ],
                sample_count: 3,
                cutoff: 1.0,
                area: 2500.0,
            }),
            notices: Vec::new(),
            contour: Vec::new(),
        }
    }

    #[test]
    fn transform_flips_y_and_keeps_margin() {
        let t = MapTransform::fit([Point::new(0.0, 0.0), Point::new(100.0, 50.0)]);
        assert!((t.scale - 1.9).abs() < 1e-12);
        assert!((t.width - 200.0).abs() < 1e-9);
        assert!((t.height - 105.0).abs() < 1e-9);

        let (x, y) = t.apply(Point::new(0.0, 50.0));
        assert!((x - MARGIN).abs() < 1e-12);
        assert!((y - MARGIN).abs() < 1e-12);
        let (x, y) = t.apply(Point::new(100.0, 0.0));
        assert!((x - 195.0).abs() < 1e-9);
        assert!((y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn transform_of_nothing_is_finite() {
        let t = MapTransform::fit(std::iter::empty());
        assert!((t.scale - 1.0).abs() < f64::EPSILON);
        assert!((t.width - 2.0 * MARGIN).abs() < f64::EPSILON);
    }

    #[test]
    fn map_has_declaration_and_all_groups() {
        let samples = [Sample::new(0.0, 0.0, 1.0), Sample::new(100.0, 50.0, 2.0)];
        let svg = to_map_svg(&result(), &samples, &SvgMetadata::default());
        assert!(svg.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<svg"));
        for id in ["samples", "CONTOUR", "LIGNES", "INTERSECTIONS", "DOLINES"] {
            assert!(svg.contains(&format!("id=\"{id}\"")), "missing group {id}");
        }
        assert_eq!(svg.matches("<circle").count(), 3);
        assert_eq!(svg.matches("<path").count(), 1);
        assert_eq!(svg.matches("<polygon").count(), 1);
        assert!(!svg.contains("<title>"));
    }

    #[test]
    fn contour_is_drawn_below_the_layers() {
        let zone = result().with_contour(vec![
            GeoPoint::new(-10.0, -10.0),
            GeoPoint::new(110.0, -10.0),
            GeoPoint::new(110.0, 60.0),
            GeoPoint::new(-10.0, 60.0),
        ]);
        let svg = to_map_svg(&zone, &[], &SvgMetadata::default());
        assert_eq!(svg.matches("<polygon").count(), 2);
        let contour_at = svg.find("id=\"CONTOUR\"").unwrap();
        let dolines_at = svg.find("id=\"DOLINES\"").unwrap();
        assert!(contour_at < dolines_at);
        // The contour sets the extent, so its western corners sit on the margin.
        assert!(svg.contains("points=\"5,"));
    }

    #[test]
    fn metadata_is_escaped() {
        let metadata = SvgMetadata {
            title: Some("zone <a>"),
            description: Some("dry & season"),
            config_json: Some(r#"{"frame":"utm"}"#),
        };
        let svg = to_map_svg(&result(), &[], &metadata);
        assert!(svg.contains("<title>zone &lt;a&gt;</title>"));
        assert!(svg.contains("dry &amp; season"));
        assert!(svg.contains("<hydroscan:config"));
    }

    #[test]
    fn empty_result_renders_empty_groups() {
        let empty = InferenceResult {
            lines: Vec::new(),
            intersections: Vec::new(),
            doline: None,
            ..result()
        };
        let svg = to_map_svg(&empty, &[], &SvgMetadata::default());
        assert!(svg.contains("id=\"DOLINES\""));
        assert!(!svg.contains("<polygon"));
        assert!(!svg.contains("<path"));
    }
}
