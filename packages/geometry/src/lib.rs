#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry service for wildfire enrichment.
//!
//! Parses the serialized geometries found in the reference exports (hex
//! WKB / PostGIS EWKB and WKT), and provides the spatial predicates and
//! measurements the resolver, filter and enrichment steps need:
//!
//! * [`intersects`] for footprint overlap,
//! * [`geodesic_area_km2`] on the WGS84 ellipsoid,
//! * [`distance_km`] after reprojection to Web Mercator, scale-corrected
//!   at the latitude of the first geometry,
//! * point distances for weather-station lookup ([`planar_point_distance`]
//!   and [`haversine_km`]).
//!
//! All inputs are lon/lat (EPSG:4326).

pub mod projection;

use geo::{Centroid, Distance, Euclidean, GeodesicArea, Geometry, Haversine, Intersects, Point};
use geozero::{ToGeo as _, wkb::Ewkb};
use thiserror::Error;
use wkt::{ToWkt, TryFromWkt};

/// Errors from decoding a serialized geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// Input was empty or whitespace.
    #[error("empty geometry input")]
    Empty,

    /// Hex text could not be decoded to bytes.
    #[error("invalid hex encoding: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Bytes are not a valid WKB or EWKB geometry.
    #[error("invalid WKB: {0}")]
    Wkb(#[from] geozero::error::GeozeroError),

    /// WKT text failed to parse.
    #[error("invalid WKT: {message}")]
    Wkt {
        /// Parser message.
        message: String,
    },
}

/// Parses a serialized geometry.
///
/// Text made only of hex digits (with even length) is decoded as WKB or
/// PostGIS EWKB in either byte order; the SRID is dropped since every
/// table is lon/lat. Anything else is parsed as WKT.
///
/// # Errors
///
/// Returns [`GeometryError`] if the input is empty or cannot be decoded.
pub fn parse(serialized: &str) -> Result<Geometry<f64>, GeometryError> {
    let trimmed = serialized.trim();
    if trimmed.is_empty() {
        return Err(GeometryError::Empty);
    }

    if is_hex(trimmed) {
        let bytes = hex::decode(trimmed)?;
        return Ok(Ewkb(bytes).to_geo()?);
    }

    Geometry::<f64>::try_from_wkt_str(trimmed).map_err(|e| GeometryError::Wkt {
        message: e.to_string(),
    })
}

fn is_hex(text: &str) -> bool {
    text.len() % 2 == 0 && text.bytes().all(|b| b.is_ascii_hexdigit())
}

/// WKT rendering, readable back by [`parse`].
#[must_use]
pub fn to_wkt(geometry: &Geometry<f64>) -> String {
    geometry.wkt_string()
}

/// Whether two geometries share at least one point.
#[must_use]
pub fn intersects(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.intersects(b)
}

/// Geodesic area on the WGS84 ellipsoid, in square kilometres.
#[must_use]
pub fn geodesic_area_km2(geometry: &Geometry<f64>) -> f64 {
    geometry.geodesic_area_unsigned() / 1e6
}

/// Minimum distance between two geometries in kilometres.
///
/// Both geometries are reprojected to Web Mercator and measured in the
/// plane; the result is multiplied by the Mercator scale factor at the
/// latitude of `a`'s centroid to recover ground distance. Intersecting
/// geometries are 0 km apart.
#[must_use]
pub fn distance_km(a: &Geometry<f64>, b: &Geometry<f64>) -> f64 {
    let scale = reference_latitude(a).to_radians().cos();
    let projected_a = projection::to_web_mercator(a);
    let projected_b = projection::to_web_mercator(b);
    Euclidean.distance(&projected_a, &projected_b) * scale / 1000.0
}

fn reference_latitude(geometry: &Geometry<f64>) -> f64 {
    geometry.centroid().map_or(0.0, |point| point.y())
}

/// Centroid as `(latitude, longitude)`.
#[must_use]
pub fn centroid_lat_lon(geometry: &Geometry<f64>) -> Option<(f64, f64)> {
    geometry.centroid().map(|point| (point.y(), point.x()))
}

/// Euclidean distance between two coordinate pairs in degrees.
///
/// Treats latitude and longitude differences as planar; cheap but
/// distorted away from the equator.
#[must_use]
pub fn planar_point_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Great-circle distance between two `(latitude, longitude)` pairs in km.
#[must_use]
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    Haversine.distance(Point::new(a.1, a.0), Point::new(b.1, b.0)) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min_x: f64, min_y: f64, size: f64) -> Geometry<f64> {
        let max_x = min_x + size;
        let max_y = min_y + size;
        parse(&format!(
            "POLYGON(({min_x} {min_y}, {max_x} {min_y}, {max_x} {max_y}, {min_x} {max_y}, {min_x} {min_y}))"
        ))
        .unwrap()
    }

    #[test]
    fn wkt_output_parses_back() {
        let polygon = square(104.0, 52.0, 0.5);
        assert_eq!(parse(&to_wkt(&polygon)).unwrap(), polygon);
    }

    #[test]
    fn parses_wkt_polygon() {
        assert!(matches!(square(0.0, 0.0, 1.0), Geometry::Polygon(_)));
    }

    /// `ST_AsEWKB(ST_GeomFromText('POLYGON((104 52, 105 52, 105 53, 104 53, 104 52))', 4326), 'XDR')`
    const EWKB_POLYGON_XDR: &str = "0020000003000010E60000000100000005\
        405A000000000000404A000000000000405A400000000000404A000000000000\
        405A400000000000404A800000000000405A000000000000404A800000000000\
        405A000000000000404A000000000000";

    /// `ST_AsEWKB(ST_SetSRID(ST_MakePoint(104.5, 52.25), 4326))`
    const EWKB_POINT_NDR: &str = "0101000020E61000000000000000205A400000000000204A40";

    #[test]
    fn parses_big_endian_postgis_polygon() {
        let geometry = parse(EWKB_POLYGON_XDR).unwrap();
        assert_eq!(geometry, square(104.0, 52.0, 1.0));
    }

    #[test]
    fn parses_little_endian_postgis_point_in_either_case() {
        let expected = Geometry::Point(Point::new(104.5, 52.25));
        assert_eq!(parse(EWKB_POINT_NDR).unwrap(), expected);
        assert_eq!(parse(&EWKB_POINT_NDR.to_lowercase()).unwrap(), expected);
    }

    #[test]
    fn truncated_wkb_is_an_error() {
        let truncated = &EWKB_POINT_NDR[..EWKB_POINT_NDR.len() - 16];
        assert!(matches!(parse(truncated), Err(GeometryError::Wkb(_))));
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(parse("  "), Err(GeometryError::Empty)));
        assert!(matches!(parse("POLYGON((oops"), Err(GeometryError::Wkt { .. })));
    }

    #[test]
    fn overlapping_squares_intersect() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(0.5, 0.5, 1.0);
        let c = square(5.0, 5.0, 1.0);
        assert!(intersects(&a, &b));
        assert!(intersects(&b, &a));
        assert!(!intersects(&a, &c));
    }

    #[test]
    fn touching_squares_intersect() {
        assert!(intersects(&square(0.0, 0.0, 1.0), &square(1.0, 0.0, 1.0)));
    }

    #[test]
    fn one_degree_box_at_equator_area() {
        let area = geodesic_area_km2(&square(0.0, 0.0, 1.0));
        assert!((12_000.0..12_500.0).contains(&area), "area was {area}");
    }

    #[test]
    fn distance_between_separated_squares() {
        let distance = distance_km(&square(0.0, 0.0, 1.0), &square(2.0, 0.0, 1.0));
        assert!((110.0..112.5).contains(&distance), "distance was {distance}");
    }

    #[test]
    fn distance_is_zero_when_overlapping() {
        let distance = distance_km(&square(0.0, 0.0, 1.0), &square(0.5, 0.5, 1.0));
        assert!(distance.abs() < 1e-9);
    }

    #[test]
    fn distance_to_line_geometry() {
        let road = parse("LINESTRING(3 0, 3 1)").unwrap();
        let distance = distance_km(&square(0.0, 0.0, 1.0), &road);
        assert!((220.0..225.0).contains(&distance), "distance was {distance}");
    }

    #[test]
    fn haversine_one_degree_of_latitude() {
        let km = haversine_km((52.0, 104.0), (53.0, 104.0));
        assert!((110.0..112.5).contains(&km), "distance was {km}");
    }

    #[test]
    fn planar_distance_in_degrees() {
        let d = planar_point_distance((0.0, 0.0), (3.0, 4.0));
        assert!((d - 5.0).abs() < f64::EPSILON);
    }
}
