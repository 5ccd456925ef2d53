//! Planar working frame: UTM projection of geographic samples.
//!
//! Angles and distances are only meaningful in a locally Euclidean
//! frame, so every geometric step runs on projected coordinates. The
//! zone is picked from the centroid of the input, the same way the
//! field workflow chooses its EPSG:326xx/327xx reference system.
//!
//! The transverse Mercator series below are the classic USGS
//! formulation on the WGS84 ellipsoid. Inside a zone the
//! forward/inverse round trip is accurate to well under a millimetre,
//! which is far finer than GPS or elevation noise.

use geo::{Centroid, MultiPoint};
use serde::{Deserialize, Serialize};

use crate::types::{GeoPoint, PipelineError, Point};

/// WGS84 semi-major axis in metres.
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// UTM central meridian scale factor.
const K0: f64 = 0.9996;
/// False easting in metres.
const FALSE_EASTING: f64 = 500_000.0;
/// False northing applied in the southern hemisphere, in metres.
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
/// Southern limit of the UTM system.
const MIN_LAT: f64 = -80.0;
/// Northern limit of the UTM system.
const MAX_LAT: f64 = 84.0;

/// Which planar frame the pipeline works in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoordinateFrame {
    /// Project to the UTM zone containing the input centroid.
    #[default]
    Utm,
    /// Use longitude/latitude directly as x/y (no projection).
    Geographic,
}

/// A UTM zone: number `1..=60` and hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmZone {
    /// Zone number, `1..=60`.
    pub number: u8,
    /// `true` for the northern hemisphere.
    pub north: bool,
}

impl UtmZone {
    /// Zone containing the given position.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidLatitude`] outside `[-80, 84]`.
    pub fn containing(p: GeoPoint) -> Result<Self, PipelineError> {
        if !(MIN_LAT..=MAX_LAT).contains(&p.lat) {
            return Err(PipelineError::InvalidLatitude { lat: p.lat });
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let number = (((p.lon + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u8;
        Ok(Self {
            number,
            north: p.lat >= 0.0,
        })
    }

    /// Zone containing the centroid of `points`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] when `points` is empty and
    /// [`PipelineError::InvalidLatitude`] when the centroid lies outside
    /// the UTM band.
    pub fn from_centroid(points: &[GeoPoint]) -> Result<Self, PipelineError> {
        let multi: MultiPoint<f64> = points
            .iter()
            .map(|p| geo::Point::new(p.lon, p.lat))
            .collect();
        let centroid = multi.centroid().ok_or(PipelineError::EmptyInput)?;
        Self::containing(GeoPoint::new(centroid.x(), centroid.y()))
    }

    /// EPSG code of this zone on WGS84 (`326xx` north, `327xx` south).
    #[must_use]
    pub fn epsg(self) -> u32 {
        let base = if self.north { 32_600 } else { 32_700 };
        base + u32::from(self.number)
    }

    /// Longitude of the zone's central meridian, in degrees.
    #[must_use]
    pub fn central_meridian(self) -> f64 {
        f64::from(self.number).mul_add(6.0, -183.0)
    }

    /// Project a geographic position into this zone.
    #[must_use]
    pub fn forward(self, p: GeoPoint) -> Point {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);

        let phi = p.lat.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();

        let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let a = cos_phi * (p.lon - self.central_meridian()).to_radians();
        let m = meridian_arc(phi, e2);

        let a2 = a * a;
        let a3 = a2 * a;
        let a4 = a3 * a;
        let a5 = a4 * a;
        let a6 = a5 * a;

        let x = K0
            * n
            * (a + (1.0 - t + c) * a3 / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a5 / 120.0)
            + FALSE_EASTING;
        let mut y = K0
            * (m + n
                * tan_phi
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a6 / 720.0));
        if !self.north {
            y += FALSE_NORTHING_SOUTH;
        }
        Point::new(x, y)
    }

    /// Convert a point in this zone back to geographic coordinates.
    #[must_use]
    pub fn inverse(self, p: Point) -> GeoPoint {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);
        let e4 = e2 * e2;
        let e6 = e4 * e2;

        let x = p.x - FALSE_EASTING;
        let y = if self.north {
            p.y
        } else {
            p.y - FALSE_NORTHING_SOUTH
        };

        let m = y / K0;
        let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
        let sqrt_1me2 = (1.0 - e2).sqrt();
        let e1 = (1.0 - sqrt_1me2) / (1.0 + sqrt_1me2);
        let e1_2 = e1 * e1;
        let e1_3 = e1_2 * e1;
        let e1_4 = e1_3 * e1;

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

        let (sin_phi1, cos_phi1) = phi1.sin_cos();
        let tan_phi1 = phi1.tan();
        let denom = 1.0 - e2 * sin_phi1 * sin_phi1;
        let n1 = WGS84_A / denom.sqrt();
        let r1 = WGS84_A * (1.0 - e2) / denom.powf(1.5);
        let t1 = tan_phi1 * tan_phi1;
        let c1 = ep2 * cos_phi1 * cos_phi1;
        let d = x / (n1 * K0);

        let d2 = d * d;
        let d3 = d2 * d;
        let d4 = d3 * d;
        let d5 = d4 * d;
        let d6 = d5 * d;

        let phi = phi1
            - (n1 * tan_phi1 / r1)
                * (d2 / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d4 / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * ep2
                        - 3.0 * c1 * c1)
                        * d6
                        / 720.0);
        let lambda = (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d5
                / 120.0)
            / cos_phi1;

        GeoPoint::new(
            self.central_meridian() + lambda.to_degrees(),
            phi.to_degrees(),
        )
    }
}

impl std::fmt::Display for UtmZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hemisphere = if self.north { 'N' } else { 'S' };
        write!(
            f,
            "UTM {}{hemisphere} (EPSG:{})",
            self.number,
            self.epsg()
        )
    }
}

/// Distance along the meridian from the equator to latitude `phi` (radians).
fn meridian_arc(phi: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

/// The planar frame a run actually used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanarFrame {
    /// Projected to a UTM zone.
    Utm(UtmZone),
    /// Longitude/latitude used as x/y.
    Geographic,
}

impl PlanarFrame {
    /// Resolve the frame for a set of positions.
    ///
    /// # Errors
    ///
    /// Propagates [`UtmZone::from_centroid`] errors for the UTM frame.
    pub fn resolve(kind: CoordinateFrame, points: &[GeoPoint]) -> Result<Self, PipelineError> {
        match kind {
            CoordinateFrame::Utm => UtmZone::from_centroid(points).map(Self::Utm),
            CoordinateFrame::Geographic => Ok(Self::Geographic),
        }
    }

    /// Geographic → planar.
    #[must_use]
    pub fn forward(self, p: GeoPoint) -> Point {
        match self {
            Self::Utm(zone) => zone.forward(p),
            Self::Geographic => Point::new(p.lon, p.lat),
        }
    }

    /// Planar → geographic.
    #[must_use]
    pub fn inverse(self, p: Point) -> GeoPoint {
        match self {
            Self::Utm(zone) => zone.inverse(p),
            Self::Geographic => GeoPoint::new(p.x, p.y),
        }
    }
}

impl std::fmt::Display for PlanarFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Utm(zone) => write!(f, "{zone}"),
            Self::Geographic => f.write_str("geographic (EPSG:4326)"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn zone_numbering() {
        let paris = UtmZone::containing(GeoPoint::new(2.35, 48.85)).unwrap();
        assert_eq!(paris.number, 31);
        assert!(paris.north);
        assert_eq!(paris.epsg(), 32631);

        let dakar = UtmZone::containing(GeoPoint::new(-17.44, 14.69)).unwrap();
        assert_eq!(dakar.number, 28);

        let antananarivo = UtmZone::containing(GeoPoint::new(47.52, -18.91)).unwrap();
        assert_eq!(antananarivo.number, 38);
        assert!(!antananarivo.north);
        assert_eq!(antananarivo.epsg(), 32738);
    }

    #[test]
    fn zone_edges_are_clamped() {
        assert_eq!(UtmZone::containing(GeoPoint::new(-180.0, 0.0)).unwrap().number, 1);
        assert_eq!(UtmZone::containing(GeoPoint::new(180.0, 0.0)).unwrap().number, 60);
    }

    #[test]
    fn polar_latitude_is_rejected() {
        let err = UtmZone::containing(GeoPoint::new(10.0, 85.0)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidLatitude { .. }));
    }

    #[test]
    fn empty_centroid_is_empty_input() {
        assert_eq!(
            UtmZone::from_centroid(&[]).unwrap_err(),
            PipelineError::EmptyInput
        );
    }

    #[test]
    fn central_meridian_on_equator_maps_to_false_origin() {
        let zone = UtmZone {
            number: 31,
            north: true,
        };
        assert!((zone.central_meridian() - 3.0).abs() < 1e-12);
        let p = zone.forward(GeoPoint::new(3.0, 0.0));
        assert!((p.x - FALSE_EASTING).abs() < 1e-6);
        assert!(p.y.abs() < 1e-6);
    }

    #[test]
    fn meridian_distance_near_equator() {
        // One hundredth of a degree of latitude is about 1105.7 m on the
        // ellipsoid, scaled by k0 on the central meridian.
        let zone = UtmZone {
            number: 31,
            north: true,
        };
        let a = zone.forward(GeoPoint::new(3.0, 0.0));
        let b = zone.forward(GeoPoint::new(3.0, 0.01));
        let d = a.distance(b);
        assert!((d - 1105.74 * K0).abs() < 0.5, "got {d}");
    }

    #[test]
    fn round_trip_north_and_south() {
        for &(lon, lat) in &[(2.35, 48.85), (47.52, -18.91), (-1.2, 12.4), (0.5, 0.001)] {
            let original = GeoPoint::new(lon, lat);
            let zone = UtmZone::containing(original).unwrap();
            let back = zone.inverse(zone.forward(original));
            assert!((back.lon - lon).abs() < 1e-7, "lon {lon} -> {}", back.lon);
            assert!((back.lat - lat).abs() < 1e-7, "lat {lat} -> {}", back.lat);
        }
    }

    #[test]
    fn geographic_frame_is_identity() {
        let frame = PlanarFrame::Geographic;
        let p = frame.forward(GeoPoint::new(1.5, -2.5));
        assert_eq!(p, Point::new(1.5, -2.5));
        assert_eq!(frame.inverse(p), GeoPoint::new(1.5, -2.5));
    }

    #[test]
    fn resolve_picks_centroid_zone() {
        let points = [GeoPoint::new(5.9, 45.0), GeoPoint::new(6.1, 45.1)];
        let frame = PlanarFrame::resolve(CoordinateFrame::Utm, &points).unwrap();
        assert_eq!(
            frame,
            PlanarFrame::Utm(UtmZone {
                number: 32,
                north: true
            })
        );
        assert_eq!(frame.to_string(), "UTM 32N (EPSG:32632)");
    }
}
