use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use derive_more::Display;

use crate::geo::GeofenceConfig;
use crate::model::EmployeeId;
use crate::model::attendance::{AttendanceRecord, EmployeeOverview};
use crate::model::device::{DeviceRegistration, DeviceState};
use crate::policy::{CheckInEvent, CheckOutEvent};
use crate::registration::ReRegistrationMode;

pub mod memory;
pub mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

#[derive(Debug, Display)]
pub enum StoreError {
    #[display(fmt = "{} not found", _0)]
    NotFound(String),
    /// A uniqueness guard rejected the write.
    #[display(fmt = "conflicting write")]
    Conflict,
    #[display(fmt = "corrupt row: {}", _0)]
    Corrupt(String),
    #[display(fmt = "database error: {}", _0)]
    Database(sqlx::Error),
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn find_attendance(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>>;

    /// Creates the day's record. `Conflict` if one already exists.
    async fn insert_check_in(&self, date: NaiveDate, event: &CheckInEvent) -> StoreResult<()>;

    /// Closes the day's record. `false` when there was no open check-in to close.
    async fn record_check_out(&self, date: NaiveDate, event: &CheckOutEvent)
    -> StoreResult<bool>;

    /// Every employee with a device record or any attendance, by employee id.
    async fn attendance_overview(&self) -> StoreResult<Vec<EmployeeOverview>>;
}

#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn device_state(&self, employee_id: EmployeeId) -> StoreResult<DeviceState>;

    async fn request_registration(
        &self,
        employee_id: EmployeeId,
        device_fingerprint: String,
        mode: ReRegistrationMode,
        now: DateTime<Utc>,
    ) -> StoreResult<DeviceRegistration>;

    /// Newest first.
    async fn pending_registrations(&self) -> StoreResult<Vec<DeviceRegistration>>;

    /// `NotFound` unless the registration exists and is pending.
    async fn approve_registration(
        &self,
        registration_id: &str,
        mode: ReRegistrationMode,
    ) -> StoreResult<DeviceRegistration>;

    /// `NotFound` unless the registration exists and is pending.
    async fn reject_registration(&self, registration_id: &str)
    -> StoreResult<DeviceRegistration>;
}

#[async_trait]
pub trait GeofenceStore: Send + Sync {
    async fn load_geofence(&self) -> StoreResult<Option<GeofenceConfig>>;

    async fn save_geofence(&self, config: &GeofenceConfig) -> StoreResult<()>;
}
