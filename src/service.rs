use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use derive_more::Display;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::fingerprint::{self, FingerprintMatch};
use crate::geo::{GeoError, GeoPoint, GeofenceConfig, GeofenceStatus};
use crate::model::EmployeeId;
use crate::model::attendance::{
    AttendanceRecord, AttendanceState, EmployeeOverview, PHOTO_REF_MAX_LEN,
};
use crate::model::device::{DeviceRegistration, DeviceState};
use crate::policy::{self, PolicyDenial};
use crate::registration::ReRegistrationMode;
use crate::store::{AttendanceStore, DeviceStore, GeofenceStore, StoreError};
use crate::utils::geofence_cache::GeofenceCache;

#[derive(Debug, Display)]
pub enum ServiceError {
    #[display(fmt = "{}", _0)]
    Denied(PolicyDenial),
    #[display(fmt = "{}", _0)]
    InvalidInput(GeoError),
    #[display(fmt = "photo_ref is {} characters, at most {} allowed", _0, PHOTO_REF_MAX_LEN)]
    PhotoRefTooLong(usize),
    #[display(fmt = "{}", _0)]
    Store(StoreError),
}

impl std::error::Error for ServiceError {}

impl From<PolicyDenial> for ServiceError {
    fn from(d: PolicyDenial) -> Self {
        ServiceError::Denied(d)
    }
}

impl From<GeoError> for ServiceError {
    fn from(e: GeoError) -> Self {
        ServiceError::InvalidInput(e)
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        ServiceError::Store(e)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// A check-in or check-out attempt as submitted by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionRequest {
    pub location: GeoPoint,
    /// Fingerprint the client computed for this attempt, if it sent one.
    pub device_fingerprint: Option<String>,
    pub photo_ref: Option<String>,
}

impl AdmissionRequest {
    /// Rejects input storage could not hold, before any policy decision.
    pub fn validate(&self) -> ServiceResult<()> {
        self.location.validate()?;
        match self.photo_ref.as_deref().map(|r| r.chars().count()) {
            Some(len) if len > PHOTO_REF_MAX_LEN => Err(ServiceError::PhotoRefTooLong(len)),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionReceipt {
    pub timestamp: DateTime<Utc>,
    pub fingerprint: FingerprintMatch,
}

#[derive(Clone)]
pub struct ServiceSettings {
    pub default_geofence: GeofenceConfig,
    pub geofence_cache_ttl: Duration,
    pub reregistration: ReRegistrationMode,
    pub utc_offset: FixedOffset,
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_geofence: config.default_geofence,
            geofence_cache_ttl: config.geofence_cache_ttl,
            reregistration: config.reregistration,
            utc_offset: config.attendance_utc_offset,
        }
    }
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct AttendanceService {
    devices: Arc<dyn DeviceStore>,
    attendance: Arc<dyn AttendanceStore>,
    geofence: GeofenceCache,
    reregistration: ReRegistrationMode,
    utc_offset: FixedOffset,
    clock: Clock,
}

/// Calendar day of `instant` in the organisation's offset.
pub fn day_key(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

impl AttendanceService {
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        attendance: Arc<dyn AttendanceStore>,
        geofence: Arc<dyn GeofenceStore>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            devices,
            attendance,
            geofence: GeofenceCache::new(
                geofence,
                settings.default_geofence,
                settings.geofence_cache_ttl,
            ),
            reregistration: settings.reregistration,
            utc_offset: settings.utc_offset,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, e.g. to pin "today" in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        day_key(now, self.utc_offset)
    }

    // ---------- device registration ----------

    pub async fn device_status(&self, employee_id: EmployeeId) -> ServiceResult<DeviceState> {
        Ok(self.devices.device_state(employee_id).await?)
    }

    #[instrument(skip(self, device_fingerprint))]
    pub async fn register_device(
        &self,
        employee_id: EmployeeId,
        device_fingerprint: String,
    ) -> ServiceResult<DeviceRegistration> {
        let reg = self
            .devices
            .request_registration(
                employee_id,
                device_fingerprint,
                self.reregistration,
                (self.clock)(),
            )
            .await?;
        info!(registration_id = %reg.id, mode = %self.reregistration, "Device registration requested");
        Ok(reg)
    }

    pub async fn pending_registrations(&self) -> ServiceResult<Vec<DeviceRegistration>> {
        Ok(self.devices.pending_registrations().await?)
    }

    #[instrument(skip(self))]
    pub async fn approve_device(&self, registration_id: &str) -> ServiceResult<DeviceRegistration> {
        let reg = self
            .devices
            .approve_registration(registration_id, self.reregistration)
            .await?;
        info!(employee_id = reg.employee_id, "Device approved");
        Ok(reg)
    }

    #[instrument(skip(self))]
    pub async fn reject_device(&self, registration_id: &str) -> ServiceResult<DeviceRegistration> {
        let reg = self.devices.reject_registration(registration_id).await?;
        info!(employee_id = reg.employee_id, "Device registration rejected");
        Ok(reg)
    }

    // ---------- geofence ----------

    pub async fn geofence(&self) -> ServiceResult<GeofenceConfig> {
        Ok(self.geofence.get().await?)
    }

    #[instrument(skip(self))]
    pub async fn update_geofence(&self, config: GeofenceConfig) -> ServiceResult<()> {
        config.validate()?;
        self.geofence.replace(config).await?;
        info!("Geofence updated");
        Ok(())
    }

    /// Advisory only; admission re-checks at confirmation.
    pub async fn geofence_status(&self, location: GeoPoint) -> ServiceResult<GeofenceStatus> {
        location.validate()?;
        Ok(self.geofence.get().await?.locate(location))
    }

    // ---------- attendance ----------

    pub async fn attendance_today(
        &self,
        employee_id: EmployeeId,
    ) -> ServiceResult<Option<AttendanceRecord>> {
        let date = self.today((self.clock)());
        Ok(self.attendance.find_attendance(employee_id, date).await?)
    }

    pub async fn attendance_overview(&self) -> ServiceResult<Vec<EmployeeOverview>> {
        Ok(self.attendance.attendance_overview().await?)
    }

    fn check_fingerprint(
        &self,
        employee_id: EmployeeId,
        device: &DeviceState,
        presented: Option<&str>,
    ) -> FingerprintMatch {
        let Some(presented) = presented else {
            return FingerprintMatch::NoReference;
        };
        let outcome = fingerprint::compare(device.device_fingerprint.as_deref(), presented);
        if outcome.is_flagged() {
            warn!(employee_id, "Device fingerprint differs from the registered device");
        }
        outcome
    }

    #[instrument(skip(self, request), fields(lat = request.location.latitude, lon = request.location.longitude))]
    pub async fn check_in(
        &self,
        employee_id: EmployeeId,
        request: AdmissionRequest,
    ) -> ServiceResult<AdmissionReceipt> {
        request.validate()?;

        // timestamp is taken at confirmation, before the snapshots are read
        let now = (self.clock)();
        let date = self.today(now);

        let device = self.devices.device_state(employee_id).await?;
        let record = self.attendance.find_attendance(employee_id, date).await?;
        let state = AttendanceState::from_record(record.as_ref());
        let geofence = self.geofence.get().await?;

        let event = policy::evaluate_check_in(
            employee_id,
            request.location,
            &device,
            &state,
            &geofence,
            now,
        )
        .inspect_err(|denial| info!(code = denial.code(), "Check-in denied"))?
        .with_photo(request.photo_ref);

        let fingerprint =
            self.check_fingerprint(employee_id, &device, request.device_fingerprint.as_deref());

        match self.attendance.insert_check_in(date, &event).await {
            Ok(()) => {}
            Err(StoreError::Conflict) => {
                info!("Concurrent check-in lost the race");
                return Err(PolicyDenial::AlreadyCheckedInToday.into());
            }
            Err(e) => return Err(e.into()),
        }

        info!(timestamp = %event.timestamp, "Checked in");
        Ok(AdmissionReceipt {
            timestamp: event.timestamp,
            fingerprint,
        })
    }

    #[instrument(skip(self, request), fields(lat = request.location.latitude, lon = request.location.longitude))]
    pub async fn check_out(
        &self,
        employee_id: EmployeeId,
        request: AdmissionRequest,
    ) -> ServiceResult<AdmissionReceipt> {
        request.validate()?;

        let now = (self.clock)();
        let date = self.today(now);

        let device = self.devices.device_state(employee_id).await?;
        let record = self.attendance.find_attendance(employee_id, date).await?;
        let state = AttendanceState::from_record(record.as_ref());

        let event = policy::evaluate_check_out(employee_id, request.location, &device, &state, now)
            .inspect_err(|denial| info!(code = denial.code(), "Check-out denied"))?;

        let fingerprint =
            self.check_fingerprint(employee_id, &device, request.device_fingerprint.as_deref());

        if !self.attendance.record_check_out(date, &event).await? {
            // lost a race; report whatever state won
            let record = self.attendance.find_attendance(employee_id, date).await?;
            let state = AttendanceState::from_record(record.as_ref());
            let denial = if state.check_out_time.is_some() {
                PolicyDenial::AlreadyCheckedOutToday
            } else {
                PolicyDenial::NotCheckedInYet
            };
            return Err(denial.into());
        }

        info!(timestamp = %event.timestamp, "Checked out");
        Ok(AdmissionReceipt {
            timestamp: event.timestamp,
            fingerprint,
        })
    }
}
