use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::EmployeeId;
use crate::model::device::{DeviceRegistration, DeviceState, RegistrationStatus};

/// What happens to an employee's earlier pending requests when a new one arrives.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReRegistrationMode {
    /// The newest request supersedes any pending ones.
    #[default]
    Replace,
    /// Pending requests accumulate until an admin acts on each.
    Queue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTransition {
    pub registration: DeviceRegistration,
    pub device: DeviceState,
    /// Pending registrations to delete.
    pub withdraw: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveTransition {
    pub registration: DeviceRegistration,
    pub device: DeviceState,
    pub withdraw: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectTransition {
    pub registration: DeviceRegistration,
    /// Device record to write back, `None` to leave it untouched.
    pub device: Option<DeviceState>,
}

fn other_pending(pending: &[DeviceRegistration], except: Option<&str>) -> Vec<String> {
    pending
        .iter()
        .filter(|r| r.status == RegistrationStatus::Pending)
        .filter(|r| Some(r.id.as_str()) != except)
        .map(|r| r.id.clone())
        .collect()
}

/// `pending` is the employee's current pending registrations.
pub fn request(
    employee_id: EmployeeId,
    device_fingerprint: String,
    pending: &[DeviceRegistration],
    mode: ReRegistrationMode,
    now: DateTime<Utc>,
) -> RequestTransition {
    let withdraw = match mode {
        ReRegistrationMode::Replace => other_pending(pending, None),
        ReRegistrationMode::Queue => Vec::new(),
    };

    RequestTransition {
        device: DeviceState::pending(device_fingerprint.clone()),
        registration: DeviceRegistration {
            id: Uuid::new_v4().to_string(),
            employee_id,
            device_fingerprint,
            requested_at: now,
            status: RegistrationStatus::Pending,
        },
        withdraw,
    }
}

/// `registration` must be pending; `pending` is the owning employee's pending list.
pub fn approve(
    registration: &DeviceRegistration,
    pending: &[DeviceRegistration],
    mode: ReRegistrationMode,
) -> ApproveTransition {
    let withdraw = match mode {
        ReRegistrationMode::Replace => other_pending(pending, Some(&registration.id)),
        ReRegistrationMode::Queue => Vec::new(),
    };

    ApproveTransition {
        registration: DeviceRegistration {
            status: RegistrationStatus::Approved,
            ..registration.clone()
        },
        device: DeviceState::approved(registration.device_fingerprint.clone()),
        withdraw,
    }
}

/// Drops the request. The device record returns to unregistered only while it
/// still holds the rejected, unapproved fingerprint.
pub fn reject(registration: &DeviceRegistration, current: &DeviceState) -> RejectTransition {
    let points_at_rejected = !current.approved
        && current.device_fingerprint.as_deref() == Some(registration.device_fingerprint.as_str());

    RejectTransition {
        registration: registration.clone(),
        device: points_at_rejected.then(DeviceState::unregistered),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap()
    }

    fn pending_reg(id: &str, fp: &str) -> DeviceRegistration {
        DeviceRegistration {
            id: id.into(),
            employee_id: 7,
            device_fingerprint: fp.into(),
            requested_at: now(),
            status: RegistrationStatus::Pending,
        }
    }

    #[test]
    fn test_request_starts_pending() {
        let t = request(7, "fp-new".into(), &[], ReRegistrationMode::Replace, now());
        assert_eq!(t.registration.status, RegistrationStatus::Pending);
        assert_eq!(t.registration.employee_id, 7);
        assert_eq!(t.registration.requested_at, now());
        assert_eq!(t.device, DeviceState::pending("fp-new"));
        assert!(t.withdraw.is_empty());
        assert!(Uuid::parse_str(&t.registration.id).is_ok());
    }

    #[test]
    fn test_request_replace_withdraws_pending() {
        let existing = vec![pending_reg("a", "fp-a"), pending_reg("b", "fp-b")];
        let t = request(7, "fp-c".into(), &existing, ReRegistrationMode::Replace, now());
        assert_eq!(t.withdraw, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_request_queue_keeps_pending() {
        let existing = vec![pending_reg("a", "fp-a")];
        let t = request(7, "fp-c".into(), &existing, ReRegistrationMode::Queue, now());
        assert!(t.withdraw.is_empty());
        assert_eq!(t.device, DeviceState::pending("fp-c"));
    }

    #[test]
    fn test_approve_sets_device() {
        let reg = pending_reg("a", "fp-a");
        let others = vec![reg.clone(), pending_reg("b", "fp-b")];

        let t = approve(&reg, &others, ReRegistrationMode::Replace);
        assert_eq!(t.registration.status, RegistrationStatus::Approved);
        assert_eq!(t.device, DeviceState::approved("fp-a"));
        assert_eq!(t.withdraw, vec!["b".to_string()]);

        let t = approve(&reg, &others, ReRegistrationMode::Queue);
        assert!(t.withdraw.is_empty());
    }

    #[test]
    fn test_reject_clears_matching_pending_device() {
        let reg = pending_reg("a", "fp-a");
        let t = reject(&reg, &DeviceState::pending("fp-a"));
        assert_eq!(t.device, Some(DeviceState::unregistered()));
    }

    #[test]
    fn test_reject_leaves_other_devices_alone() {
        let reg = pending_reg("a", "fp-a");
        assert_eq!(reject(&reg, &DeviceState::approved("fp-a")).device, None);
        assert_eq!(reject(&reg, &DeviceState::pending("fp-b")).device, None);
        assert_eq!(reject(&reg, &DeviceState::unregistered()).device, None);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            ReRegistrationMode::from_str("queue").unwrap(),
            ReRegistrationMode::Queue
        );
        assert_eq!(ReRegistrationMode::Replace.to_string(), "replace");
        assert!(ReRegistrationMode::from_str("stack").is_err());
    }
}
