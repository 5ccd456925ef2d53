//! hydroscan-formats: Pure format readers and serializers (sans-IO)
//!
//! Reads zone contours (GPX, KML, KMZ) and enriched trajectories, and
//! writes the inference layers as GPX, KML and GeoJSON, plus an SVG map
//! preview and a ZIP report archive. Every function works on byte
//! slices or returns a `String`/`Vec<u8>`; the filesystem belongs to
//! the binary.

use hydroscan_pipeline::GeoPoint;

pub mod archive;
pub mod geojson;
pub mod gpx;
pub mod kml;
pub mod svg;

pub use svg::{SvgMetadata, to_map_svg};

/// One of the three output layers of an inference run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Candidate fracture lines.
    Lines,
    /// Candidate drilling points.
    Intersections,
    /// Depression zone.
    Dolines,
    /// Outline of the prospecting zone.
    Contour,
}

impl Layer {
    /// All layers, in export order.
    pub const ALL: [Self; 4] = [
        Self::Lines,
        Self::Intersections,
        Self::Dolines,
        Self::Contour,
    ];

    /// Layer name used for file names and feature labels.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Lines => "LIGNES",
            Self::Intersections => "INTERSECTIONS",
            Self::Dolines => "DOLINES",
            Self::Contour => "CONTOUR",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from reading or writing an exchange format.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The GPX document could not be parsed.
    #[error("invalid GPX: {0}")]
    Gpx(String),

    /// The KML document could not be parsed or holds no polygon.
    #[error("invalid KML: {0}")]
    Kml(String),

    /// A ZIP archive (KMZ or report) could not be read or written.
    #[error("archive error: {0}")]
    Archive(String),

    /// A document could not be written.
    #[error("failed to write document: {0}")]
    Write(String),

    /// JSON serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// File formats accepted for a zone contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContourFormat {
    /// GPS exchange format.
    Gpx,
    /// Keyhole markup.
    Kml,
    /// Zipped KML.
    Kmz,
}

impl ContourFormat {
    /// Pick the format from a file extension, case-insensitively.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "gpx" => Some(Self::Gpx),
            "kml" => Some(Self::Kml),
            "kmz" => Some(Self::Kmz),
            _ => None,
        }
    }
}

/// Read a zone contour in the given format.
///
/// # Errors
///
/// Returns the reader's [`FormatError`] for a malformed document, and
/// [`FormatError::Kml`] when a KML or KMZ contour holds no polygon.
pub fn read_contour(format: ContourFormat, bytes: &[u8]) -> Result<Vec<GeoPoint>, FormatError> {
    match format {
        ContourFormat::Gpx => gpx::read_contour(bytes),
        ContourFormat::Kml => kml::read_contour(bytes),
        ContourFormat::Kmz => kml::read_contour(&archive::kml_from_kmz(bytes)?),
    }
}
