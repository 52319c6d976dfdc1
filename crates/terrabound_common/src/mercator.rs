//! Web Mercator (EPSG:3857) projection math.
//!
//! Spherical Mercator is the CRS of every common XYZ tile scheme, so the
//! imagery and vectorization stages both work in these coordinates.

use std::f64::consts::PI;

/// Half the earth's circumference in Web Mercator meters
pub const HALF_EARTH: f64 = 20_037_508.342_789_244;

/// Web Mercator latitude cutoff; beyond this the projection diverges
pub const MAX_LAT: f64 = 85.051_128_779_806_59;

/// Longitude (degrees) to Web Mercator X (meters)
#[inline]
pub fn lon_to_x(lon: f64) -> f64 {
    lon * HALF_EARTH / 180.0
}

/// Latitude (degrees) to Web Mercator Y (meters)
#[inline]
pub fn lat_to_y(lat: f64) -> f64 {
    let rad = lat.to_radians();
    ((PI / 4.0 + rad / 2.0).tan()).ln() * HALF_EARTH / PI
}

/// Web Mercator X (meters) to longitude (degrees)
#[inline]
pub fn x_to_lon(x: f64) -> f64 {
    x * 180.0 / HALF_EARTH
}

/// Web Mercator Y (meters) to latitude (degrees)
#[inline]
pub fn y_to_lat(y: f64) -> f64 {
    let y_rad = y * PI / HALF_EARTH;
    (2.0 * y_rad.exp().atan() - PI / 2.0).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_origin() {
        assert_eq!(lon_to_x(0.0), 0.0);
        assert!(lat_to_y(0.0).abs() < 1e-9);
    }

    #[test]
    fn test_antimeridian() {
        assert!((lon_to_x(180.0) - HALF_EARTH).abs() < 1e-6);
        assert!((lon_to_x(-180.0) + HALF_EARTH).abs() < 1e-6);
    }

    #[test]
    fn test_forward_inverse_round_trip() {
        for &(lon, lat) in &[(20.05, 10.05), (-122.4, 37.7), (151.2, -33.8)] {
            assert!((x_to_lon(lon_to_x(lon)) - lon).abs() < 1e-9);
            assert!((y_to_lat(lat_to_y(lat)) - lat).abs() < 1e-9);
        }
    }

    #[test]
    fn test_mercator_cutoff_reaches_half_earth() {
        // The square Web Mercator world: y(MAX_LAT) == x(180)
        assert!((lat_to_y(MAX_LAT) - HALF_EARTH).abs() < 1.0);
    }
}
