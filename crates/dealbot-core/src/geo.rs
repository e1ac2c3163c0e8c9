//! Great-circle distance on a spherical earth.

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Radius comparisons absorb float noise below one millimetre.
const RADIUS_EPSILON_KM: f64 = 1e-6;

/// Haversine distance in kilometres between two WGS-84 points given in
/// decimal degrees.
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// `true` when `distance_km ≤ radius_km`, inclusive of the boundary.
#[must_use]
pub fn within_radius_km(distance_km: f64, radius_km: f64) -> bool {
    distance_km <= radius_km + RADIUS_EPSILON_KM
}

/// `true` when both values are finite and inside the WGS-84 ranges.
#[must_use]
pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Latitude offset (degrees) that spans `km` along a meridian.
    fn lat_offset_for_km(km: f64) -> f64 {
        (km / EARTH_RADIUS_KM).to_degrees()
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert!(haversine_km(1.3521, 103.8198, 1.3521, 103.8198).abs() < f64::EPSILON);
    }

    #[test]
    fn distance_is_symmetric() {
        let ab = haversine_km(1.3718338, 103.8995563, 1.2834, 103.8607);
        let ba = haversine_km(1.2834, 103.8607, 1.3718338, 103.8995563);
        assert!((ab - ba).abs() < 1e-9, "ab={ab} ba={ba}");
    }

    #[test]
    fn known_distance_hougang_to_marina_bay() {
        let d = haversine_km(1.3718338, 103.8995563, 1.2834, 103.8607);
        assert!((10.0..11.5).contains(&d), "unexpected distance {d}");
    }

    #[test]
    fn exactly_two_km_is_within_radius() {
        let lat = 1.35;
        let d = haversine_km(lat, 103.8, lat + lat_offset_for_km(2.0), 103.8);
        assert!(within_radius_km(d, 2.0), "distance {d} should match");
    }

    #[test]
    fn two_point_zero_zero_one_km_is_outside_radius() {
        let lat = 1.35;
        let d = haversine_km(lat, 103.8, lat + lat_offset_for_km(2.001), 103.8);
        assert!(!within_radius_km(d, 2.0), "distance {d} should not match");
    }

    #[test]
    fn coordinate_validation() {
        assert!(valid_coordinates(1.3521, 103.8198));
        assert!(!valid_coordinates(91.0, 0.0));
        assert!(!valid_coordinates(0.0, -181.0));
        assert!(!valid_coordinates(f64::NAN, 0.0));
    }
}
