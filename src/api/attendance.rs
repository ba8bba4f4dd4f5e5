use crate::auth::auth::AuthUser;
use crate::geo::GeoPoint;
use crate::model::attendance::{
    AttendancePhase, AttendanceRecord, AttendanceState, EmployeeOverview,
};
use crate::service::{AdmissionReceipt, AdmissionRequest, AttendanceService};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CheckInPayload {
    #[schema(example = 28.7042)]
    pub latitude: f64,
    #[schema(example = 77.1026)]
    pub longitude: f64,
    #[schema(example = "eyJ3ZWJnbCI6IkFOR0xFIChJbnRlbC...")]
    pub device_fingerprint: Option<String>,
    /// Reference to the verification photo stored by the upload service
    #[schema(example = "photos/1001/2026-01-05.jpg")]
    pub photo_ref: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckOutPayload {
    #[schema(example = 28.7042)]
    pub latitude: f64,
    #[schema(example = 77.1026)]
    pub longitude: f64,
    pub device_fingerprint: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AdmissionResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "2026-01-05T09:02:11Z", format = "date-time", value_type = String)]
    pub timestamp: DateTime<Utc>,
    /// Presented fingerprint differs from the registered device
    #[schema(example = false)]
    pub device_flagged: bool,
}

impl From<AdmissionReceipt> for AdmissionResponse {
    fn from(receipt: AdmissionReceipt) -> Self {
        Self {
            success: true,
            timestamp: receipt.timestamp,
            device_flagged: receipt.fingerprint.is_flagged(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TodayResponse {
    pub phase: AttendancePhase,
    pub attendance: Option<AttendanceRecord>,
}

#[derive(Serialize, ToSchema)]
pub struct OverviewResponse {
    pub data: Vec<EmployeeOverview>,
    #[schema(example = 42)]
    pub total: usize,
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-in",
    request_body = CheckInPayload,
    responses(
        (status = 200, description = "Checked in successfully", body = AdmissionResponse),
        (status = 409, description = "Check-in denied by policy", body = Object, example = json!({
            "success": false,
            "code": "OUTSIDE_GEOFENCE",
            "message": "Outside the geofence (212m from center, radius 100m)"
        })),
        (status = 422, description = "Invalid coordinates"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<CheckInPayload>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let payload = payload.into_inner();

    let receipt = service
        .check_in(
            employee_id,
            AdmissionRequest {
                location: GeoPoint {
                    latitude: payload.latitude,
                    longitude: payload.longitude,
                },
                device_fingerprint: payload.device_fingerprint,
                photo_ref: payload.photo_ref,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(AdmissionResponse::from(receipt)))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-out",
    request_body = CheckOutPayload,
    responses(
        (status = 200, description = "Checked out successfully", body = AdmissionResponse),
        (status = 409, description = "Check-out denied by policy", body = Object, example = json!({
            "success": false,
            "code": "NOT_CHECKED_IN_YET",
            "message": "No check-in found for today"
        })),
        (status = 422, description = "Invalid coordinates"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<CheckOutPayload>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let payload = payload.into_inner();

    let receipt = service
        .check_out(
            employee_id,
            AdmissionRequest {
                location: GeoPoint {
                    latitude: payload.latitude,
                    longitude: payload.longitude,
                },
                device_fingerprint: payload.device_fingerprint,
                photo_ref: None,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(AdmissionResponse::from(receipt)))
}

/// Today's attendance for the calling employee
#[utoipa::path(
    get,
    path = "/api/v1/attendance/today",
    responses(
        (status = 200, description = "Today's attendance (null before check-in)", body = TodayResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let attendance = service.attendance_today(employee_id).await?;

    Ok(HttpResponse::Ok().json(TodayResponse {
        phase: AttendanceState::from_record(attendance.as_ref()).phase(),
        attendance,
    }))
}

/// Roster of employees with their device and latest check-in (HR/Admin)
#[utoipa::path(
    get,
    path = "/api/v1/attendance/overview",
    responses(
        (status = 200, description = "One row per employee, ordered by employee id", body = OverviewResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn overview(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let data = service.attendance_overview().await?;
    Ok(HttpResponse::Ok().json(OverviewResponse {
        total: data.len(),
        data,
    }))
}
