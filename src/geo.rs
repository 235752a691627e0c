// 🌍 Great-circle distance helpers

use std::f64::consts::PI;

/// Mean Earth radius in km
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points in km
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1 * PI / 180.0;
    let lat2_rad = lat2 * PI / 180.0;
    let dlat = (lat2 - lat1) * PI / 180.0;
    let dlon = (lon2 - lon1) * PI / 180.0;

    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

pub fn is_valid_latitude(lat: f64) -> bool {
    lat.is_finite() && (-90.0..=90.0).contains(&lat)
}

pub fn is_valid_longitude(lon: f64) -> bool {
    lon.is_finite() && (-180.0..=180.0).contains(&lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        assert_eq!(haversine_km(33.5731, -7.5898, 33.5731, -7.5898), 0.0);
    }

    #[test]
    fn test_casablanca_to_rabat() {
        // Casablanca centre to Rabat centre is roughly 85 km
        let d = haversine_km(33.5731, -7.5898, 34.0209, -6.8416);
        assert!((d - 85.0).abs() < 3.0, "got {}", d);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = haversine_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111.19).abs() < 0.1);
    }

    #[test]
    fn test_coordinate_ranges() {
        assert!(is_valid_latitude(-90.0));
        assert!(is_valid_latitude(90.0));
        assert!(!is_valid_latitude(999.0));
        assert!(!is_valid_latitude(f64::NAN));
        assert!(is_valid_longitude(-180.0));
        assert!(!is_valid_longitude(180.5));
    }
}
