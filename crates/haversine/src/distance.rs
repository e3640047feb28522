//! Great-circle distance.

use crate::pairs::HaversinePair;

/// Mean Earth radius used for the reference computation, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6372.8;

/// Distance between the two points of `pair` on a sphere of `radius`.
///
/// Coordinates are degrees with `x` as longitude and `y` as latitude.
#[must_use]
pub fn haversine(pair: &HaversinePair, radius: f64) -> f64 {
    let d_lat = (pair.y1 - pair.y0).to_radians();
    let d_lon = (pair.x1 - pair.x0).to_radians();
    let lat0 = pair.y0.to_radians();
    let lat1 = pair.y1.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat0.cos() * lat1.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    radius * c
}

/// Average [`haversine`] distance over `pairs` using [`EARTH_RADIUS_KM`].
///
/// Returns `0.0` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_haversine(pairs: &[HaversinePair]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let coefficient = 1.0 / pairs.len() as f64;
    pairs
        .iter()
        .map(|pair| coefficient * haversine(pair, EARTH_RADIUS_KM))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(x0: f64, y0: f64, x1: f64, y1: f64) -> HaversinePair {
        HaversinePair { x0, y0, x1, y1 }
    }

    #[test]
    fn identical_points_are_zero_apart() {
        assert!(haversine(&pair(12.5, -40.0, 12.5, -40.0), EARTH_RADIUS_KM).abs() < 1e-9);
    }

    #[test]
    fn quarter_meridian() {
        let d = haversine(&pair(0.0, 0.0, 0.0, 90.0), EARTH_RADIUS_KM);
        let expected = EARTH_RADIUS_KM * core::f64::consts::FRAC_PI_2;
        assert!((d - expected).abs() < 1e-6, "{d} vs {expected}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = haversine(&pair(-73.9, 40.7, 2.35, 48.85), EARTH_RADIUS_KM);
        let b = haversine(&pair(2.35, 48.85, -73.9, 40.7), EARTH_RADIUS_KM);
        assert!((a - b).abs() < 1e-9);
        // New York to Paris, roughly
        assert!((5_800.0..5_900.0).contains(&a), "{a}");
    }

    #[test]
    fn mean_of_empty_is_zero() {
        assert!(mean_haversine(&[]).abs() < f64::EPSILON);
    }

    #[test]
    fn mean_averages_distances() {
        let pairs = [pair(0.0, 0.0, 0.0, 90.0), pair(0.0, 0.0, 0.0, 0.0)];
        let expected = EARTH_RADIUS_KM * core::f64::consts::FRAC_PI_2 / 2.0;
        assert!((mean_haversine(&pairs) - expected).abs() < 1e-6);
    }
}
