use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::Serialize;
use utoipa::ToSchema;

use crate::geo::{GeoPoint, GeofenceConfig};
use crate::model::EmployeeId;
use crate::model::attendance::AttendanceState;
use crate::model::device::DeviceState;

#[derive(Debug, Display, Clone, Copy, PartialEq, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyDenial {
    #[display(fmt = "No device registered for this employee")]
    DeviceNotRegistered,
    #[display(fmt = "Device registration is awaiting admin approval")]
    DeviceNotApproved,
    #[display(
        fmt = "Outside the geofence ({:.0}m from center, radius {:.0}m)",
        distance_meters,
        radius_meters
    )]
    OutsideGeofence {
        distance_meters: f64,
        radius_meters: f64,
    },
    #[display(fmt = "Already checked in today")]
    AlreadyCheckedInToday,
    #[display(fmt = "Already checked out today")]
    AlreadyCheckedOutToday,
    #[display(fmt = "No check-in found for today")]
    NotCheckedInYet,
}

impl std::error::Error for PolicyDenial {}

impl PolicyDenial {
    /// Stable machine-readable code, e.g. `OUTSIDE_GEOFENCE`.
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

pub type Decision<E> = Result<E, PolicyDenial>;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CheckInEvent {
    pub employee_id: EmployeeId,
    pub location: GeoPoint,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: DateTime<Utc>,
    pub photo_ref: Option<String>,
}

impl CheckInEvent {
    pub fn with_photo(mut self, photo_ref: Option<String>) -> Self {
        self.photo_ref = photo_ref;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CheckOutEvent {
    pub employee_id: EmployeeId,
    pub location: GeoPoint,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: DateTime<Utc>,
}

fn require_approved_device(device: &DeviceState) -> Decision<()> {
    if device.device_fingerprint.is_none() {
        return Err(PolicyDenial::DeviceNotRegistered);
    }
    if !device.approved {
        return Err(PolicyDenial::DeviceNotApproved);
    }
    Ok(())
}

/// `now` must be the confirmation instant, not the moment the location was captured.
pub fn evaluate_check_in(
    employee_id: EmployeeId,
    candidate: GeoPoint,
    device: &DeviceState,
    attendance: &AttendanceState,
    geofence: &GeofenceConfig,
    now: DateTime<Utc>,
) -> Decision<CheckInEvent> {
    require_approved_device(device)?;

    if attendance.check_out_time.is_some() {
        return Err(PolicyDenial::AlreadyCheckedOutToday);
    }
    if attendance.check_in_time.is_some() {
        return Err(PolicyDenial::AlreadyCheckedInToday);
    }

    let status = geofence.locate(candidate);
    if !status.inside {
        return Err(PolicyDenial::OutsideGeofence {
            distance_meters: status.distance_meters,
            radius_meters: status.radius_meters,
        });
    }

    Ok(CheckInEvent {
        employee_id,
        location: candidate,
        timestamp: now,
        photo_ref: None,
    })
}

/// Check-out is deliberately not geofence-gated.
pub fn evaluate_check_out(
    employee_id: EmployeeId,
    candidate: GeoPoint,
    device: &DeviceState,
    attendance: &AttendanceState,
    now: DateTime<Utc>,
) -> Decision<CheckOutEvent> {
    require_approved_device(device)?;

    let Some(checked_in_at) = attendance.check_in_time else {
        return Err(PolicyDenial::NotCheckedInYet);
    };
    if attendance.check_out_time.is_some() {
        return Err(PolicyDenial::AlreadyCheckedOutToday);
    }

    // check-out never precedes check-in, even if the clock stepped back
    Ok(CheckOutEvent {
        employee_id,
        location: candidate,
        timestamp: now.max(checked_in_at),
    })
}
