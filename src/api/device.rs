use crate::auth::auth::AuthUser;
use crate::fingerprint::{self, BrowserSignals, FINGERPRINT_MAX_LEN};
use crate::model::device::{DeviceRegistration, DeviceState, RegistrationStatus};
use crate::service::AttendanceService;
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Either a precomputed fingerprint or the raw signals to derive it from.
#[derive(Deserialize, ToSchema)]
pub struct RegisterDevicePayload {
    #[schema(example = "eyJ3ZWJnbCI6IkFOR0xFIChJbnRlbC...")]
    pub device_fingerprint: Option<String>,
    pub signals: Option<BrowserSignals>,
}

#[derive(Serialize, ToSchema)]
pub struct RegisterDeviceResponse {
    #[schema(example = "6f1c2a7e-2d0b-4c55-9a57-0f3f0c7e9b11")]
    pub registration_id: String,
    pub status: RegistrationStatus,
    #[schema(example = "eyJ3ZWJnbCI6IkFOR0xFIChJbnRlbC...")]
    pub device_fingerprint: String,
}

#[derive(Serialize, ToSchema)]
pub struct PendingRegistrationsResponse {
    pub data: Vec<DeviceRegistration>,
    #[schema(example = 1)]
    pub total: usize,
}

/// Device registration status of the calling employee
#[utoipa::path(
    get,
    path = "/api/v1/device/status",
    responses(
        (status = 200, description = "Registered fingerprint and approval flag", body = DeviceState),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Device"
)]
pub async fn device_status(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let state = service.device_status(employee_id).await?;
    Ok(HttpResponse::Ok().json(state))
}

/// Request registration of the caller's device
#[utoipa::path(
    post,
    path = "/api/v1/device/register",
    request_body = RegisterDevicePayload,
    responses(
        (status = 200, description = "Registration submitted, awaiting approval", body = RegisterDeviceResponse),
        (status = 400, description = "No usable fingerprint", body = Object, example = json!({
            "message": "Provide device_fingerprint or signals"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Device"
)]
pub async fn register_device(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<RegisterDevicePayload>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let payload = payload.into_inner();

    let device_fingerprint = match (payload.device_fingerprint, payload.signals) {
        (Some(fp), _) if !fp.trim().is_empty() => fp.trim().to_string(),
        (_, Some(signals)) => fingerprint::fingerprint(&signals),
        _ => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": "Provide device_fingerprint or signals"
            })));
        }
    };

    if device_fingerprint.len() > FINGERPRINT_MAX_LEN {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": format!("device_fingerprint exceeds {FINGERPRINT_MAX_LEN} characters")
        })));
    }

    let reg = service
        .register_device(employee_id, device_fingerprint)
        .await?;

    Ok(HttpResponse::Ok().json(RegisterDeviceResponse {
        registration_id: reg.id,
        status: reg.status,
        device_fingerprint: reg.device_fingerprint,
    }))
}

/// Pending device registrations, newest first (HR/Admin)
#[utoipa::path(
    get,
    path = "/api/v1/device/registrations/pending",
    responses(
        (status = 200, description = "Pending registrations", body = PendingRegistrationsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Device"
)]
pub async fn pending_registrations(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let data = service.pending_registrations().await?;
    Ok(HttpResponse::Ok().json(PendingRegistrationsResponse {
        total: data.len(),
        data,
    }))
}

/// Approve a pending device registration (Admin)
#[utoipa::path(
    post,
    path = "/api/v1/device/registrations/{registration_id}/approve",
    params(
        ("registration_id" = String, Path, description = "ID of the registration to approve")
    ),
    responses(
        (status = 200, description = "Device approved", body = Object, example = json!({
            "message": "Device approved"
        })),
        (status = 404, description = "Registration not found or already processed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Device"
)]
pub async fn approve_device(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let registration_id = path.into_inner();
    let reg = service.approve_device(&registration_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Device approved",
        "employee_id": reg.employee_id
    })))
}

/// Reject a pending device registration (Admin)
#[utoipa::path(
    post,
    path = "/api/v1/device/registrations/{registration_id}/reject",
    params(
        ("registration_id" = String, Path, description = "ID of the registration to reject")
    ),
    responses(
        (status = 200, description = "Registration rejected", body = Object, example = json!({
            "message": "Device registration rejected"
        })),
        (status = 404, description = "Registration not found or already processed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Device"
)]
pub async fn reject_device(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let registration_id = path.into_inner();
    let reg = service.reject_device(&registration_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Device registration rejected",
        "employee_id": reg.employee_id
    })))
}
