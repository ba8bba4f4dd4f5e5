use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::geo::GeoPoint;
use crate::model::EmployeeId;

/// Matches the `check_in_photo_ref` column width.
pub const PHOTO_REF_MAX_LEN: usize = 512;

/// Admin roster row: the employee's device and most recent check-in.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EmployeeOverview {
    #[schema(example = 1001)]
    pub employee_id: EmployeeId,
    pub device_fingerprint: Option<String>,
    pub device_approved: bool,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_check_in: Option<DateTime<Utc>>,
}

/// One employee's attendance for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "employee_id": 1001,
    "date": "2026-01-05",
    "check_in_time": "2026-01-05T09:02:11Z",
    "check_in_location": { "latitude": 28.7041, "longitude": 77.1025 },
    "check_in_photo_ref": "photos/1001/2026-01-05.jpg",
    "check_out_time": null,
    "check_out_location": null
}))]
pub struct AttendanceRecord {
    pub employee_id: EmployeeId,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_in_location: Option<GeoPoint>,
    pub check_in_photo_ref: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out_time: Option<DateTime<Utc>>,
    pub check_out_location: Option<GeoPoint>,
}

/// Per (employee, day) state machine: `NoCheckIn -> CheckedIn -> CheckedOut`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendancePhase {
    NoCheckIn,
    CheckedIn,
    CheckedOut,
}

/// The slice of an attendance record the admission policy reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceState {
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
}

impl AttendanceState {
    pub fn from_record(record: Option<&AttendanceRecord>) -> Self {
        record
            .map(|r| AttendanceState {
                check_in_time: r.check_in_time,
                check_out_time: r.check_out_time,
            })
            .unwrap_or_default()
    }

    pub fn phase(&self) -> AttendancePhase {
        match (self.check_in_time, self.check_out_time) {
            (_, Some(_)) => AttendancePhase::CheckedOut,
            (Some(_), None) => AttendancePhase::CheckedIn,
            (None, None) => AttendancePhase::NoCheckIn,
        }
    }
}

impl AttendanceRecord {
    pub fn state(&self) -> AttendanceState {
        AttendanceState::from_record(Some(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_phase_follows_timestamps() {
        let t = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();

        assert_eq!(AttendanceState::default().phase(), AttendancePhase::NoCheckIn);
        assert_eq!(
            AttendanceState {
                check_in_time: Some(t),
                check_out_time: None
            }
            .phase(),
            AttendancePhase::CheckedIn
        );
        assert_eq!(
            AttendanceState {
                check_in_time: Some(t),
                check_out_time: Some(t)
            }
            .phase(),
            AttendancePhase::CheckedOut
        );
    }

    #[test]
    fn test_state_from_missing_record() {
        assert_eq!(AttendanceState::from_record(None), AttendanceState::default());
    }
}
