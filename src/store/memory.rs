use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::geo::GeofenceConfig;
use crate::model::EmployeeId;
use crate::model::attendance::{AttendanceRecord, EmployeeOverview};
use crate::model::device::{DeviceRegistration, DeviceState, RegistrationStatus};
use crate::policy::{CheckInEvent, CheckOutEvent};
use crate::registration::{self, ReRegistrationMode};
use crate::store::{
    AttendanceStore, DeviceStore, GeofenceStore, StoreError, StoreResult,
};

#[derive(Default)]
struct Tables {
    attendance: HashMap<(EmployeeId, NaiveDate), AttendanceRecord>,
    devices: HashMap<EmployeeId, DeviceState>,
    registrations: Vec<DeviceRegistration>,
    geofence: Option<GeofenceConfig>,
}

impl Tables {
    fn pending_for(&self, employee_id: EmployeeId) -> Vec<DeviceRegistration> {
        self.registrations
            .iter()
            .filter(|r| r.employee_id == employee_id && r.status == RegistrationStatus::Pending)
            .cloned()
            .collect()
    }

    fn pending_by_id(&self, registration_id: &str) -> StoreResult<DeviceRegistration> {
        self.registrations
            .iter()
            .find(|r| r.id == registration_id && r.status == RegistrationStatus::Pending)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("registration {registration_id}")))
    }

    fn withdraw(&mut self, ids: &[String]) {
        self.registrations.retain(|r| !ids.contains(&r.id));
    }
}

/// Process-local store. Every operation runs under one lock, which gives the
/// same at-most-one-winner behaviour as the database constraints.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_geofence(config: GeofenceConfig) -> Self {
        let store = Self::default();
        store.tables().geofence = Some(config);
        store
    }

    /// Seed a device record directly, bypassing the registration flow.
    pub fn set_device(&self, employee_id: EmployeeId, device: DeviceState) {
        self.tables().devices.insert(employee_id, device);
    }

    // every write completes under the lock, so a poisoned table is still consistent
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn find_attendance(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>> {
        Ok(self.tables().attendance.get(&(employee_id, date)).cloned())
    }

    async fn insert_check_in(&self, date: NaiveDate, event: &CheckInEvent) -> StoreResult<()> {
        let mut tables = self.tables();
        let key = (event.employee_id, date);
        if tables.attendance.contains_key(&key) {
            return Err(StoreError::Conflict);
        }

        tables.attendance.insert(
            key,
            AttendanceRecord {
                employee_id: event.employee_id,
                date,
                check_in_time: Some(event.timestamp),
                check_in_location: Some(event.location),
                check_in_photo_ref: event.photo_ref.clone(),
                check_out_time: None,
                check_out_location: None,
            },
        );
        Ok(())
    }

    async fn record_check_out(
        &self,
        date: NaiveDate,
        event: &CheckOutEvent,
    ) -> StoreResult<bool> {
        let mut tables = self.tables();
        match tables.attendance.get_mut(&(event.employee_id, date)) {
            Some(record) if record.check_in_time.is_some() && record.check_out_time.is_none() => {
                record.check_out_time = Some(event.timestamp);
                record.check_out_location = Some(event.location);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn attendance_overview(&self) -> StoreResult<Vec<EmployeeOverview>> {
        let tables = self.tables();
        let mut roster: BTreeMap<EmployeeId, EmployeeOverview> = BTreeMap::new();

        for (&employee_id, device) in &tables.devices {
            roster.insert(
                employee_id,
                EmployeeOverview {
                    employee_id,
                    device_fingerprint: device.device_fingerprint.clone(),
                    device_approved: device.approved,
                    last_check_in: None,
                },
            );
        }

        for record in tables.attendance.values() {
            let row = roster
                .entry(record.employee_id)
                .or_insert_with(|| EmployeeOverview {
                    employee_id: record.employee_id,
                    device_fingerprint: None,
                    device_approved: false,
                    last_check_in: None,
                });
            row.last_check_in = row.last_check_in.max(record.check_in_time);
        }

        Ok(roster.into_values().collect())
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn device_state(&self, employee_id: EmployeeId) -> StoreResult<DeviceState> {
        Ok(self
            .tables()
            .devices
            .get(&employee_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn request_registration(
        &self,
        employee_id: EmployeeId,
        device_fingerprint: String,
        mode: ReRegistrationMode,
        now: DateTime<Utc>,
    ) -> StoreResult<DeviceRegistration> {
        let mut tables = self.tables();
        let pending = tables.pending_for(employee_id);
        let t = registration::request(employee_id, device_fingerprint, &pending, mode, now);

        tables.withdraw(&t.withdraw);
        tables.registrations.push(t.registration.clone());
        tables.devices.insert(employee_id, t.device);
        Ok(t.registration)
    }

    async fn pending_registrations(&self) -> StoreResult<Vec<DeviceRegistration>> {
        let tables = self.tables();
        let mut pending: Vec<_> = tables
            .registrations
            .iter()
            .filter(|r| r.status == RegistrationStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(pending)
    }

    async fn approve_registration(
        &self,
        registration_id: &str,
        mode: ReRegistrationMode,
    ) -> StoreResult<DeviceRegistration> {
        let mut tables = self.tables();
        let reg = tables.pending_by_id(registration_id)?;
        let pending = tables.pending_for(reg.employee_id);
        let t = registration::approve(&reg, &pending, mode);

        tables.withdraw(&t.withdraw);
        if let Some(stored) = tables.registrations.iter_mut().find(|r| r.id == reg.id) {
            *stored = t.registration.clone();
        }
        tables.devices.insert(reg.employee_id, t.device);
        Ok(t.registration)
    }

    async fn reject_registration(
        &self,
        registration_id: &str,
    ) -> StoreResult<DeviceRegistration> {
        let mut tables = self.tables();
        let reg = tables.pending_by_id(registration_id)?;
        let current = tables
            .devices
            .get(&reg.employee_id)
            .cloned()
            .unwrap_or_default();
        let t = registration::reject(&reg, &current);

        tables.withdraw(std::slice::from_ref(&reg.id));
        if let Some(device) = t.device {
            tables.devices.insert(reg.employee_id, device);
        }
        Ok(t.registration)
    }
}

#[async_trait]
impl GeofenceStore for MemoryStore {
    async fn load_geofence(&self) -> StoreResult<Option<GeofenceConfig>> {
        Ok(self.tables().geofence)
    }

    async fn save_geofence(&self, config: &GeofenceConfig) -> StoreResult<()> {
        self.tables().geofence = Some(*config);
        Ok(())
    }
}
