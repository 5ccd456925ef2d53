//! KML 2.2 export and contour reading.
//!
//! One document per layer, one `<Placemark>` per feature, named
//! `{LAYER}_{index}`. Coordinates are written `lon,lat` as KML expects.

use std::fmt::Write;

use hydroscan_pipeline::{GeoPoint, InferenceResult};
use xml::reader::{EventReader, XmlEvent};

use crate::{FormatError, Layer};

/// Escape the five XML special characters.
fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn coordinates(points: &[GeoPoint]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.lon, p.lat))
        .collect::<Vec<_>>()
        .join(" ")
}

fn polygon(out: &mut String, ring: &[GeoPoint]) {
    let _ = writeln!(out, "      <Polygon><outerBoundaryIs><LinearRing>");
    let _ = writeln!(out, "        <coordinates>{}</coordinates>", coordinates(ring));
    let _ = writeln!(out, "      </LinearRing></outerBoundaryIs></Polygon>");
}

fn open_placemark(out: &mut String, name: &str, description: Option<&str>) {
    let _ = writeln!(out, "    <Placemark>");
    let _ = writeln!(out, "      <name>{}</name>", xml_escape(name));
    if let Some(description) = description {
        let _ = writeln!(
            out,
            "      <description>{}</description>",
            xml_escape(description)
        );
    }
}

/// Serialize one layer as a KML document.
///
/// `document_name` labels the enclosing `<Document>`, typically the
/// prospecting zone.
///
/// # Examples
///
/// ```
/// use hydroscan_formats::{Layer, kml::layer_to_kml};
/// use hydroscan_pipeline::{CoordinateFrame, InferenceConfig, Sample, process};
///
/// let samples = [Sample::new(0.0, 0.0, 1.0)];
/// let config = InferenceConfig { frame: CoordinateFrame::Geographic, ..InferenceConfig::default() };
/// let result = process(&samples, &config).unwrap();
/// let kml = layer_to_kml(&result, Layer::Lines, "zone A & B");
/// assert!(kml.contains("<name>zone A &amp; B</name>"));
/// assert!(!kml.contains("<Placemark>"));
/// ```
#[must_use]
pub fn layer_to_kml(result: &InferenceResult, layer: Layer, document_name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(out, r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#);
    let _ = writeln!(out, "  <Document>");
    let _ = writeln!(out, "    <name>{}</name>", xml_escape(document_name));

    match layer {
        Layer::Lines => {
            for (i, vertices) in result.lines_geographic().iter().enumerate() {
                open_placemark(&mut out, &format!("{layer}_{i}"), None);
                let _ = writeln!(
                    out,
                    "      <LineString><coordinates>{}</coordinates></LineString>",
                    coordinates(vertices)
                );
                let _ = writeln!(out, "    </Placemark>");
            }
        }
        Layer::Intersections => {
            let points = result.intersections_geographic();
            for (i, (p, ix)) in points.iter().zip(&result.intersections).enumerate() {
                let description = format!("lines {} and {}", ix.lines[0], ix.lines[1]);
                open_placemark(&mut out, &format!("{layer}_{i}"), Some(&description));
                let _ = writeln!(
                    out,
                    "      <Point><coordinates>{}</coordinates></Point>",
                    coordinates(std::slice::from_ref(p))
                );
                let _ = writeln!(out, "    </Placemark>");
            }
        }
        Layer::Dolines => {
            if let (Some(ring), Some(doline)) = (result.doline_geographic(), &result.doline) {
                let description = format!(
                    "{} samples below {} m",
                    doline.sample_count, doline.cutoff
                );
                open_placemark(&mut out, &format!("{layer}_0"), Some(&description));
                polygon(&mut out, &ring);
                let _ = writeln!(out, "    </Placemark>");
            }
        }
        Layer::Contour => {
            if let Some(ring) = result.contour_ring() {
                let description = result
                    .contour_area()
                    .map(|area| format!("area {area:.1}"));
                open_placemark(&mut out, &format!("{layer}_0"), description.as_deref());
                polygon(&mut out, &ring);
                let _ = writeln!(out, "    </Placemark>");
            }
        }
    }

    let _ = writeln!(out, "  </Document>");
    let _ = writeln!(out, "</kml>");
    out
}

/// Parse a `<coordinates>` body: whitespace-separated `lon,lat[,alt]`
/// tuples.
fn parse_coordinates(text: &str) -> Result<Vec<GeoPoint>, FormatError> {
    text.split_whitespace()
        .map(|tuple| {
            let mut parts = tuple.split(',');
            let mut next = || -> Result<f64, FormatError> {
                parts
                    .next()
                    .and_then(|v| v.trim().parse().ok())
                    .ok_or_else(|| FormatError::Kml(format!("bad coordinate tuple {tuple:?}")))
            };
            let lon = next()?;
            let lat = next()?;
            Ok(GeoPoint::new(lon, lat))
        })
        .collect()
}

/// Read a zone contour from a KML document.
///
/// Only `<coordinates>` inside a `<Polygon>` inside a `<Placemark>` are
/// used. Rings with fewer than 3 positions are skipped; the remaining
/// rings are concatenated in document order.
///
/// # Errors
///
/// Returns [`FormatError::Kml`] if the document is not well-formed, a
/// coordinate tuple does not parse, or no usable polygon is found.
pub fn read_contour(bytes: &[u8]) -> Result<Vec<GeoPoint>, FormatError> {
    let mut placemark_depth = 0_usize;
    let mut polygon_depth = 0_usize;
    let mut text: Option<String> = None;
    let mut contour = Vec::new();

    for event in EventReader::new(bytes) {
        match event.map_err(|e| FormatError::Kml(e.to_string()))? {
            XmlEvent::StartElement { name, .. } => match name.local_name.as_str() {
                "Placemark" => placemark_depth += 1,
                "Polygon" => polygon_depth += 1,
                "coordinates" if placemark_depth > 0 && polygon_depth > 0 => {
                    text = Some(String::new());
                }
                _ => {}
            },
            XmlEvent::Characters(chunk) | XmlEvent::CData(chunk) | XmlEvent::Whitespace(chunk) => {
                if let Some(buf) = text.as_mut() {
                    buf.push_str(&chunk);
                }
            }
            XmlEvent::EndElement { name } => match name.local_name.as_str() {
                "Placemark" => placemark_depth = placemark_depth.saturating_sub(1),
                "Polygon" => polygon_depth = polygon_depth.saturating_sub(1),
                "coordinates" => {
                    if let Some(buf) = text.take() {
                        let ring = parse_coordinates(&buf)?;
                        if ring.len() >= 3 {
                            contour.extend(ring);
                        }
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    if contour.is_empty() {
        return Err(FormatError::Kml(
            "no polygon with at least 3 positions".to_string(),
        ));
    }
    log::debug!("read {} contour positions from KML", contour.len());
    Ok(contour)
}
