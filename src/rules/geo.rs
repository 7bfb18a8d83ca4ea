use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    #[schema(example = 1.3521)]
    pub latitude: f64,
    #[schema(example = 103.8198)]
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Rejects NaN/infinite values and out-of-range coordinates.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err("coordinates must be finite numbers");
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err("latitude must be between -90 and 90");
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err("longitude must be between -180 and 180");
        }
        Ok(())
    }
}

/// Great-circle distance in metres.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// `Ok(distance)` when `point` lies within `radius_m` of `center`,
/// `Err(distance)` otherwise.
pub fn within_geofence(center: GeoPoint, radius_m: f64, point: GeoPoint) -> Result<f64, f64> {
    let distance = haversine_m(center, point);
    if distance <= radius_m {
        Ok(distance)
    } else {
        Err(distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero_distance() {
        let p = GeoPoint::new(1.3521, 103.8198);
        assert!(haversine_m(p, p).abs() < 1e-6);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let a = GeoPoint::new(0.0, 103.0);
        let b = GeoPoint::new(1.0, 103.0);
        let d = haversine_m(a, b);
        assert!((d - 111_195.0).abs() < 50.0, "got {d}");
    }

    #[test]
    fn geofence_accepts_inside_and_rejects_outside() {
        let site = GeoPoint::new(1.3000, 103.8000);
        // ~55 m north
        let near = GeoPoint::new(1.3005, 103.8000);
        // ~1.1 km north
        let far = GeoPoint::new(1.3100, 103.8000);

        let inside = within_geofence(site, 100.0, near);
        assert!(inside.is_ok());

        let outside = within_geofence(site, 100.0, far);
        let distance = outside.unwrap_err();
        assert!(distance > 1_000.0);
    }

    #[test]
    fn validate_rejects_bad_coordinates() {
        assert!(GeoPoint::new(91.0, 0.0).validate().is_err());
        assert!(GeoPoint::new(0.0, -181.0).validate().is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).validate().is_err());
        assert!(GeoPoint::new(1.35, 103.8).validate().is_ok());
    }
}
