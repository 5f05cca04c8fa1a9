//! Reprojection from WGS84 lon/lat to spherical Web Mercator (EPSG:3857).

use std::f64::consts::FRAC_PI_4;

use geo::{Coord, Geometry, MapCoords};

/// WGS84 semi-major axis used by EPSG:3857.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Latitude where Web Mercator becomes square; poles are clamped here.
pub const MAX_LATITUDE: f64 = 85.051_128_78;

/// Projects one lon/lat coordinate to Web Mercator metres.
#[must_use]
pub fn project(coord: Coord<f64>) -> Coord<f64> {
    let lat = coord.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    Coord {
        x: EARTH_RADIUS_M * coord.x.to_radians(),
        y: EARTH_RADIUS_M * (FRAC_PI_4 + lat / 2.0).tan().ln(),
    }
}

/// Projects every coordinate of a geometry to Web Mercator metres.
#[must_use]
pub fn to_web_mercator(geometry: &Geometry<f64>) -> Geometry<f64> {
    geometry.map_coords(project)
}
