use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use dotenvy::dotenv;

use crate::geo::{GeoPoint, GeofenceConfig};
use crate::registration::ReRegistrationMode;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,

    // Rate limiting
    pub rate_protected_per_min: u32,
    pub rate_attendance_per_min: u32,

    pub api_prefix: String,

    /// Used until an admin saves a geofence.
    pub default_geofence: GeofenceConfig,
    pub geofence_cache_ttl: Duration,
    pub reregistration: ReRegistrationMode,
    /// Offset that decides which calendar day a check-in belongs to.
    pub attendance_utc_offset: FixedOffset,
    /// Interval of the client-side advisory geofence poll.
    pub location_poll_interval: Duration,
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let latitude: f64 = var_or("GEOFENCE_DEFAULT_LATITUDE", 28.7041)?;
        let longitude: f64 = var_or("GEOFENCE_DEFAULT_LONGITUDE", 77.1025)?;
        let radius: f64 = var_or("GEOFENCE_DEFAULT_RADIUS", 100.0)?;
        let default_geofence = GeoPoint::new(latitude, longitude)
            .and_then(|center| GeofenceConfig::new(center, radius))
            .context("GEOFENCE_DEFAULT_* describe an invalid geofence")?;

        let reregistration = match env::var("DEVICE_REREGISTRATION") {
            Ok(raw) => ReRegistrationMode::from_str(raw.trim())
                .with_context(|| format!("DEVICE_REREGISTRATION must be 'replace' or 'queue', got '{raw}'"))?,
            Err(_) => ReRegistrationMode::default(),
        };

        let offset_minutes: i32 = var_or("ATTENDANCE_UTC_OFFSET_MINUTES", 0)?;
        let attendance_utc_offset = FixedOffset::east_opt(offset_minutes * 60)
            .context("ATTENDANCE_UTC_OFFSET_MINUTES is out of range")?;

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,

            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", 1000)?,
            rate_attendance_per_min: var_or("RATE_ATTENDANCE_PER_MIN", 30)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),

            default_geofence,
            geofence_cache_ttl: Duration::from_secs(var_or("GEOFENCE_CACHE_TTL_SECS", 60)?),
            reregistration,
            attendance_utc_offset,
            location_poll_interval: Duration::from_secs(var_or("LOCATION_POLL_SECS", 30)?),
        })
    }
}
