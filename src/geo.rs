use derive_more::Display;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Display, Clone, Copy, PartialEq)]
pub enum GeoError {
    #[display(fmt = "latitude {} is outside [-90, 90]", _0)]
    InvalidLatitude(f64),
    #[display(fmt = "longitude {} is outside [-180, 180]", _0)]
    InvalidLongitude(f64),
    #[display(fmt = "radius {} must be a positive number of meters", _0)]
    InvalidRadius(f64),
}

impl std::error::Error for GeoError {}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    #[schema(example = 28.7041)]
    pub latitude: f64,
    #[schema(example = 77.1025)]
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        let point = Self {
            latitude,
            longitude,
        };
        point.validate()?;
        Ok(point)
    }

    /// Range check for points that arrived through deserialization.
    pub fn validate(&self) -> Result<(), GeoError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(GeoError::InvalidLatitude(self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(GeoError::InvalidLongitude(self.longitude));
        }
        Ok(())
    }
}

/// Great-circle distance between two points in meters (haversine, spherical Earth).
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);

    // rounding can push h a hair past 1 for antipodal points
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Circular admissible region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeofenceConfig {
    pub center: GeoPoint,
    #[schema(example = 100.0)]
    pub radius_meters: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct GeofenceStatus {
    #[schema(example = 42.7)]
    pub distance_meters: f64,
    #[schema(example = 100.0)]
    pub radius_meters: f64,
    pub inside: bool,
}

impl GeofenceConfig {
    pub fn new(center: GeoPoint, radius_meters: f64) -> Result<Self, GeoError> {
        let config = Self {
            center,
            radius_meters,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GeoError> {
        self.center.validate()?;
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(GeoError::InvalidRadius(self.radius_meters));
        }
        Ok(())
    }

    /// Inclusive: a point exactly on the boundary is inside.
    pub fn contains(&self, point: GeoPoint) -> bool {
        self.locate(point).inside
    }

    pub fn locate(&self, point: GeoPoint) -> GeofenceStatus {
        let distance = distance_meters(point, self.center);
        GeofenceStatus {
            distance_meters: distance,
            radius_meters: self.radius_meters,
            inside: distance <= self.radius_meters,
        }
    }
}

/// Point `meters` due north of `origin`, used to build fixtures at known distances.
#[cfg(test)]
pub(crate) fn offset_north(origin: GeoPoint, meters: f64) -> GeoPoint {
    let d_lat = (meters / EARTH_RADIUS_METERS).to_degrees();
    GeoPoint {
        latitude: origin.latitude + d_lat,
        longitude: origin.longitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delhi() -> GeoPoint {
        GeoPoint::new(28.7041, 77.1025).unwrap()
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        for p in [
            delhi(),
            GeoPoint::new(0.0, 0.0).unwrap(),
            GeoPoint::new(-89.9, 179.9).unwrap(),
        ] {
            assert_eq!(distance_meters(p, p), 0.0);
        }
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = delhi();
        let b = GeoPoint::new(19.0760, 72.8777).unwrap();
        assert_eq!(distance_meters(a, b), distance_meters(b, a));
    }

    #[test]
    fn test_distance_delhi_to_mumbai() {
        let a = delhi();
        let b = GeoPoint::new(19.0760, 72.8777).unwrap();
        let d = distance_meters(a, b);
        // roughly 1150 km great-circle
        assert!((1_140_000.0..1_160_000.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let a = GeoPoint::new(0.0, 0.0).unwrap();
        let b = GeoPoint::new(1.0, 0.0).unwrap();
        let expected = EARTH_RADIUS_METERS * 1f64.to_radians();
        assert!((distance_meters(a, b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_antipodal_points_do_not_produce_nan() {
        let a = GeoPoint::new(0.0, 0.0).unwrap();
        let b = GeoPoint::new(0.0, 180.0).unwrap();
        let d = distance_meters(a, b);
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1.0);
    }

    #[test]
    fn test_point_range_validation() {
        assert_eq!(
            GeoPoint::new(90.5, 0.0),
            Err(GeoError::InvalidLatitude(90.5))
        );
        assert_eq!(
            GeoPoint::new(0.0, -180.1),
            Err(GeoError::InvalidLongitude(-180.1))
        );
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn test_geofence_radius_validation() {
        let center = GeoPoint::new(0.0, 0.0).unwrap();
        assert!(GeofenceConfig::new(center, 0.0).is_err());
        assert!(GeofenceConfig::new(center, -5.0).is_err());
        assert!(GeofenceConfig::new(center, f64::INFINITY).is_err());
        assert!(GeofenceConfig::new(center, 0.5).is_ok());
    }

    #[test]
    fn test_geofence_contains() {
        let center = GeoPoint::new(0.0, 0.0).unwrap();
        let fence = GeofenceConfig::new(center, 100.0).unwrap();

        assert!(fence.contains(offset_north(center, 50.0)));
        assert!(!fence.contains(offset_north(center, 200.0)));

        let status = fence.locate(offset_north(center, 200.0));
        assert!(!status.inside);
        assert!((status.distance_meters - 200.0).abs() < 1e-6);
        assert_eq!(status.radius_meters, 100.0);
    }
}
