use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::EmployeeId;

/// Snapshot of an employee's device record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeviceState {
    #[schema(nullable = true)]
    pub device_fingerprint: Option<String>,
    pub approved: bool,
}

impl DeviceState {
    pub fn unregistered() -> Self {
        Self::default()
    }

    pub fn pending(fingerprint: impl Into<String>) -> Self {
        Self {
            device_fingerprint: Some(fingerprint.into()),
            approved: false,
        }
    }

    pub fn approved(fingerprint: impl Into<String>) -> Self {
        Self {
            device_fingerprint: Some(fingerprint.into()),
            approved: true,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
}

/// A device registration request awaiting (or past) admin review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "6f1c2a7e-2d0b-4c55-9a57-0f3f0c7e9b11",
    "employee_id": 1001,
    "device_fingerprint": "eyJ3ZWJnbCI6IkFOR0xFIChJbnRlbCwgTWVzYSBJbnRlbChSKSBVSEQgR3JhcGhpY3MgNjIwKSIs",
    "requested_at": "2026-01-05T08:55:00Z",
    "status": "pending"
}))]
pub struct DeviceRegistration {
    pub id: String,
    pub employee_id: EmployeeId,
    pub device_fingerprint: String,
    #[schema(value_type = String, format = "date-time")]
    pub requested_at: DateTime<Utc>,
    pub status: RegistrationStatus,
}
