//! Distance metrics and the Web Mercator tile projection.
//!
//! Airports are ranked by great-circle distance while flights are ranked by
//! a flat Euclidean distance on raw degrees. The two metrics are kept as
//! separate functions so either can be swapped without touching callers.

use std::f64::consts::PI;

use crate::models::{Coordinate, TileCoordinate};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres (haversine).
pub fn great_circle_km(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Pythagorean distance on latitude/longitude deltas, in degrees.
pub fn planar_degrees(from: &Coordinate, to: &Coordinate) -> f64 {
    let d_lat = to.latitude - from.latitude;
    let d_lon = to.longitude - from.longitude;

    (d_lat * d_lat + d_lon * d_lon).sqrt()
}

/// Slippy-map tile containing `location` at `zoom`.
///
/// Positions beyond the Mercator limits (about ±85.0511°) are clamped onto
/// the first or last tile row.
pub fn tile_for(location: &Coordinate, zoom: u8) -> TileCoordinate {
    let n = 2.0_f64.powi(zoom as i32);
    let max = n - 1.0;

    let x = ((location.longitude + 180.0) / 360.0 * n).floor();

    let lat_rad = location.latitude * PI / 180.0;
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    TileCoordinate {
        zoom,
        x: clamp_tile(x, max),
        y: clamp_tile(y, max),
    }
}

fn clamp_tile(value: f64, max: f64) -> u32 {
    // NaN shows up at the poles, where ln() gets a non-positive argument
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, max) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_great_circle_one_degree_at_equator() {
        let d = great_circle_km(&Coordinate::new(0.0, 0.0), &Coordinate::new(0.0, 1.0));
        assert!((d - 111.19).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_great_circle_known_city_pair() {
        // Paris CDG to London Heathrow, roughly 347 km
        let cdg = Coordinate::new(49.0097, 2.5479);
        let lhr = Coordinate::new(51.4700, -0.4543);
        let d = great_circle_km(&cdg, &lhr);
        assert!((d - 347.0).abs() < 3.0, "got {}", d);
    }

    #[test]
    fn test_planar_degrees() {
        let d = planar_degrees(&Coordinate::new(0.0, 0.0), &Coordinate::new(3.0, 4.0));
        assert_eq!(d, 5.0);
    }

    #[test]
    fn test_tile_at_origin() {
        let tile = tile_for(&Coordinate::new(0.0, 0.0), 14);
        assert_eq!(tile, TileCoordinate { zoom: 14, x: 8192, y: 8192 });
    }

    #[test]
    fn test_tile_near_north_east_corner() {
        let tile = tile_for(&Coordinate::new(85.0, 179.9), 14);
        assert_eq!(tile.x, 16379);
        assert!(tile.x <= (1 << 14) - 1);
        assert!(tile.y < 64, "got {}", tile.y);
    }

    #[test]
    fn test_tile_new_york_at_zoom_16() {
        let tile = tile_for(&Coordinate::new(40.7128, -74.0060), 16);
        assert_eq!(tile.x, 19295);
        assert_eq!(tile.y, 24640);
    }

    #[test]
    fn test_tile_clamped_at_poles() {
        let north = tile_for(&Coordinate::new(90.0, 180.0), 14);
        assert_eq!(north.x, (1 << 14) - 1);
        assert_eq!(north.y, 0);

        let south = tile_for(&Coordinate::new(-89.9, -180.0), 14);
        assert_eq!(south.x, 0);
        assert_eq!(south.y, (1 << 14) - 1);
    }
}
