use crate::api::attendance::{
    AdmissionResponse, CheckInPayload, CheckOutPayload, OverviewResponse, TodayResponse,
};
use crate::api::device::{
    PendingRegistrationsResponse, RegisterDevicePayload, RegisterDeviceResponse,
};
use crate::api::geofence::{GeofenceStatusResponse, LocationQuery};
use crate::fingerprint::{BrowserSignals, SignalProbe};
use crate::geo::{GeoPoint, GeofenceConfig, GeofenceStatus};
use crate::model::attendance::{AttendancePhase, AttendanceRecord, EmployeeOverview};
use crate::model::device::{DeviceRegistration, DeviceState, RegistrationStatus};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Geofenced Attendance API",
        version = "1.0.0",
        description = r#"
## Geofenced, device-bound attendance

Employees check in from inside an office geofence, on a device an
administrator has approved.

### Key Features
- **Device registration**
  - Employees submit a browser fingerprint; admins approve or reject it
- **Geofence**
  - Admin-managed circular region; advisory inside/outside status for clients
- **Attendance**
  - One check-in and one check-out per employee per day, server-timestamped

### Security
Every endpoint requires a **JWT Bearer** access token.
Approving, rejecting and geofence changes are **Admin** only.
The attendance overview is open to **HR** and **Admin**.

### Denials
Policy denials return `409` with a machine-readable `code`:
`DEVICE_NOT_REGISTERED`, `DEVICE_NOT_APPROVED`, `OUTSIDE_GEOFENCE`,
`ALREADY_CHECKED_IN_TODAY`, `ALREADY_CHECKED_OUT_TODAY`, `NOT_CHECKED_IN_YET`.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::overview,

        crate::api::device::device_status,
        crate::api::device::register_device,
        crate::api::device::pending_registrations,
        crate::api::device::approve_device,
        crate::api::device::reject_device,

        crate::api::geofence::get_geofence,
        crate::api::geofence::update_geofence,
        crate::api::geofence::geofence_status
    ),
    components(
        schemas(
            CheckInPayload,
            CheckOutPayload,
            AdmissionResponse,
            TodayResponse,
            OverviewResponse,
            EmployeeOverview,
            AttendancePhase,
            AttendanceRecord,
            RegisterDevicePayload,
            RegisterDeviceResponse,
            PendingRegistrationsResponse,
            DeviceRegistration,
            DeviceState,
            RegistrationStatus,
            BrowserSignals,
            SignalProbe,
            GeoPoint,
            GeofenceConfig,
            GeofenceStatus,
            LocationQuery,
            GeofenceStatusResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Geofenced check-in and check-out"),
        (name = "Device", description = "Device registration and approval"),
        (name = "Geofence", description = "Geofence configuration"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes_and_security() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/v1/attendance/check-in"));
        assert!(paths.contains_key("/api/v1/device/registrations/{registration_id}/approve"));
        assert!(paths.contains_key("/api/v1/geofence/status"));
        assert!(paths.contains_key("/api/v1/attendance/overview"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
