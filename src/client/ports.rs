use async_trait::async_trait;
use derive_more::Display;

use crate::geo::{GeoPoint, GeofenceConfig};
use crate::model::EmployeeId;
use crate::model::device::{DeviceRegistration, DeviceState};
use crate::policy::PolicyDenial;
use crate::service::{AdmissionReceipt, AdmissionRequest, AttendanceService, ServiceError};

#[derive(Debug, Display)]
pub enum SessionError {
    /// No coordinate; check-in and check-out cannot proceed without one.
    #[display(fmt = "Location unavailable: {}", _0)]
    LocationUnavailable(String),
    #[display(fmt = "Camera unavailable: {}", _0)]
    CameraUnavailable(String),
    /// Refused locally before anything was submitted.
    #[display(fmt = "{}", _0)]
    Denied(PolicyDenial),
    #[display(fmt = "{}", _0)]
    Backend(ServiceError),
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ServiceError> for SessionError {
    fn from(e: ServiceError) -> Self {
        SessionError::Backend(e)
    }
}

impl From<PolicyDenial> for SessionError {
    fn from(d: PolicyDenial) -> Self {
        SessionError::Denied(d)
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn current_position(&self) -> SessionResult<GeoPoint>;
}

/// An open camera stream. Dropping it releases the device.
#[async_trait]
pub trait CameraStream: Send {
    /// Captures a frame and returns a reference to the stored photo.
    async fn capture(&mut self) -> SessionResult<String>;
}

#[async_trait]
pub trait Camera: Send + Sync {
    type Stream: CameraStream;

    async fn open(&self) -> SessionResult<Self::Stream>;
}

#[async_trait]
pub trait AttendanceBackend: Send + Sync {
    async fn device_status(&self, employee_id: EmployeeId) -> Result<DeviceState, ServiceError>;

    async fn register_device(
        &self,
        employee_id: EmployeeId,
        device_fingerprint: String,
    ) -> Result<DeviceRegistration, ServiceError>;

    async fn geofence(&self) -> Result<GeofenceConfig, ServiceError>;

    async fn check_in(
        &self,
        employee_id: EmployeeId,
        request: AdmissionRequest,
    ) -> Result<AdmissionReceipt, ServiceError>;

    async fn check_out(
        &self,
        employee_id: EmployeeId,
        request: AdmissionRequest,
    ) -> Result<AdmissionReceipt, ServiceError>;
}

// In-process backend
#[async_trait]
impl AttendanceBackend for AttendanceService {
    async fn device_status(&self, employee_id: EmployeeId) -> Result<DeviceState, ServiceError> {
        AttendanceService::device_status(self, employee_id).await
    }

    async fn register_device(
        &self,
        employee_id: EmployeeId,
        device_fingerprint: String,
    ) -> Result<DeviceRegistration, ServiceError> {
        AttendanceService::register_device(self, employee_id, device_fingerprint).await
    }

    async fn geofence(&self) -> Result<GeofenceConfig, ServiceError> {
        AttendanceService::geofence(self).await
    }

    async fn check_in(
        &self,
        employee_id: EmployeeId,
        request: AdmissionRequest,
    ) -> Result<AdmissionReceipt, ServiceError> {
        AttendanceService::check_in(self, employee_id, request).await
    }

    async fn check_out(
        &self,
        employee_id: EmployeeId,
        request: AdmissionRequest,
    ) -> Result<AdmissionReceipt, ServiceError> {
        AttendanceService::check_out(self, employee_id, request).await
    }
}
