use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::geo::{GeoPoint, GeofenceConfig};
use crate::service::AttendanceService;
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LocationQuery {
    #[schema(example = 28.7042)]
    /// Latitude in decimal degrees
    pub latitude: f64,
    #[schema(example = 77.1026)]
    /// Longitude in decimal degrees
    pub longitude: f64,
}

#[derive(Serialize, ToSchema)]
pub struct GeofenceStatusResponse {
    #[schema(example = 42.7)]
    pub distance_meters: f64,
    #[schema(example = 100.0)]
    pub radius_meters: f64,
    pub inside: bool,
    /// How long the client should wait before polling again
    #[schema(example = 30)]
    pub poll_interval_secs: u64,
}

/// Active geofence
#[utoipa::path(
    get,
    path = "/api/v1/geofence",
    responses(
        (status = 200, description = "Active geofence", body = GeofenceConfig),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Geofence"
)]
pub async fn get_geofence(
    _auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(service.geofence().await?))
}

/// Replace the geofence (Admin)
#[utoipa::path(
    put,
    path = "/api/v1/geofence",
    request_body = GeofenceConfig,
    responses(
        (status = 200, description = "Geofence updated", body = Object, example = json!({
            "message": "Geofence configuration updated"
        })),
        (status = 422, description = "Coordinates out of range or radius not positive"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Geofence"
)]
pub async fn update_geofence(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<GeofenceConfig>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    service.update_geofence(payload.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Geofence configuration updated"
    })))
}

/// Advisory inside/outside check backing the client's periodic location poll
#[utoipa::path(
    get,
    path = "/api/v1/geofence/status",
    params(LocationQuery),
    responses(
        (status = 200, description = "Distance from the geofence center", body = GeofenceStatusResponse),
        (status = 422, description = "Invalid coordinates"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Geofence"
)]
pub async fn geofence_status(
    _auth: AuthUser,
    service: web::Data<AttendanceService>,
    config: web::Data<Config>,
    query: web::Query<LocationQuery>,
) -> actix_web::Result<impl Responder> {
    let status = service
        .geofence_status(GeoPoint {
            latitude: query.latitude,
            longitude: query.longitude,
        })
        .await?;

    Ok(HttpResponse::Ok().json(GeofenceStatusResponse {
        distance_meters: status.distance_meters,
        radius_meters: status.radius_meters,
        inside: status.inside,
        poll_interval_secs: config.location_poll_interval.as_secs(),
    }))
}
