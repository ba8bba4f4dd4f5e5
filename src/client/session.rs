use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::ports::{
    AttendanceBackend, Camera, CameraStream, LocationSource, SessionError, SessionResult,
};
use crate::fingerprint::{self, BrowserSignals, FingerprintMatch};
use crate::geo::{GeoPoint, GeofenceStatus};
use crate::model::EmployeeId;
use crate::model::device::{DeviceRegistration, DeviceState};
use crate::policy::PolicyDenial;
use crate::service::{AdmissionReceipt, AdmissionRequest};

/// Background geofence poll. Aborted when dropped.
pub struct LocationWatch {
    handle: JoinHandle<()>,
    status: watch::Receiver<Option<GeofenceStatus>>,
}

impl LocationWatch {
    pub fn subscribe(&self) -> watch::Receiver<Option<GeofenceStatus>> {
        self.status.clone()
    }

    /// Most recent poll result; `None` until the first successful poll.
    pub fn latest(&self) -> Option<GeofenceStatus> {
        *self.status.borrow()
    }
}

impl Drop for LocationWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn locate<L, B>(location: &L, backend: &B) -> SessionResult<(GeoPoint, GeofenceStatus)>
where
    L: LocationSource + ?Sized,
    B: AttendanceBackend + ?Sized,
{
    let position = location.current_position().await?;
    position
        .validate()
        .map_err(|e| SessionError::LocationUnavailable(e.to_string()))?;
    let geofence = backend.geofence().await?;
    Ok((position, geofence.locate(position)))
}

pub struct ClientSession<L, C, B> {
    employee_id: EmployeeId,
    device_fingerprint: String,
    location: Arc<L>,
    camera: C,
    backend: Arc<B>,
    require_photo: bool,
    watch: Option<LocationWatch>,
}

impl<L, C, B> ClientSession<L, C, B>
where
    L: LocationSource + 'static,
    C: Camera,
    B: AttendanceBackend + 'static,
{
    pub fn new(
        employee_id: EmployeeId,
        signals: &BrowserSignals,
        location: L,
        camera: C,
        backend: Arc<B>,
    ) -> Self {
        Self {
            employee_id,
            device_fingerprint: fingerprint::fingerprint(signals),
            location: Arc::new(location),
            camera,
            backend,
            require_photo: false,
            watch: None,
        }
    }

    /// Fail check-in when no photo can be taken instead of submitting without one.
    pub fn require_photo(mut self, required: bool) -> Self {
        self.require_photo = required;
        self
    }

    pub fn employee_id(&self) -> EmployeeId {
        self.employee_id
    }

    pub fn device_fingerprint(&self) -> &str {
        &self.device_fingerprint
    }

    /// Registered device state, and whether this browser matches it.
    pub async fn device_status(&self) -> SessionResult<(DeviceState, FingerprintMatch)> {
        let state = self.backend.device_status(self.employee_id).await?;
        let outcome = fingerprint::compare(
            state.device_fingerprint.as_deref(),
            &self.device_fingerprint,
        );
        Ok((state, outcome))
    }

    pub async fn register_device(&self) -> SessionResult<DeviceRegistration> {
        let reg = self
            .backend
            .register_device(self.employee_id, self.device_fingerprint.clone())
            .await?;
        info!(employee_id = self.employee_id, registration_id = %reg.id, "Device registration submitted");
        Ok(reg)
    }

    /// Starts (or restarts) the periodic geofence poll.
    pub fn start_location_watch(
        &mut self,
        interval: Duration,
    ) -> watch::Receiver<Option<GeofenceStatus>> {
        let (tx, rx) = watch::channel(None);
        let location = self.location.clone();
        let backend = self.backend.clone();
        let employee_id = self.employee_id;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match locate(&*location, &*backend).await {
                    Ok((_, status)) => {
                        tx.send_replace(Some(status));
                    }
                    Err(e) => debug!(employee_id, error = %e, "Location poll failed"),
                }
            }
        });

        let watch = LocationWatch {
            handle,
            status: rx.clone(),
        };
        // replacing the guard aborts any previous poll
        self.watch = Some(watch);
        rx
    }

    pub fn stop_location_watch(&mut self) {
        self.watch = None;
    }

    pub fn location_watch(&self) -> Option<&LocationWatch> {
        self.watch.as_ref()
    }

    /// First phase of a check-in: capture location and check the geofence.
    ///
    /// The server re-checks on submit; this only avoids opening the camera
    /// for an attempt that cannot succeed.
    pub async fn begin_check_in(&self) -> SessionResult<PendingCheckIn<'_, L, C, B>> {
        let (location, status) = locate(&*self.location, &*self.backend).await?;
        if !status.inside {
            return Err(PolicyDenial::OutsideGeofence {
                distance_meters: status.distance_meters,
                radius_meters: status.radius_meters,
            }
            .into());
        }

        Ok(PendingCheckIn {
            session: self,
            location,
            geofence: status,
            photo_ref: None,
        })
    }

    pub async fn check_out(&self) -> SessionResult<AdmissionReceipt> {
        let location = self.location.current_position().await?;
        let receipt = self
            .backend
            .check_out(
                self.employee_id,
                AdmissionRequest {
                    location,
                    device_fingerprint: Some(self.device_fingerprint.clone()),
                    photo_ref: None,
                },
            )
            .await?;
        Ok(receipt)
    }

    /// Ends the session, stopping the location poll and dropping the stored fingerprint.
    pub fn logout(self) {
        info!(employee_id = self.employee_id, "Session closed");
    }
}

/// A check-in whose location has passed the geofence, awaiting photo and submit.
pub struct PendingCheckIn<'a, L, C, B> {
    session: &'a ClientSession<L, C, B>,
    location: GeoPoint,
    geofence: GeofenceStatus,
    photo_ref: Option<String>,
}

impl<L, C, B> PendingCheckIn<'_, L, C, B>
where
    L: LocationSource + 'static,
    C: Camera,
    B: AttendanceBackend + 'static,
{
    pub fn location(&self) -> GeoPoint {
        self.location
    }

    pub fn geofence(&self) -> GeofenceStatus {
        self.geofence
    }

    pub fn photo_ref(&self) -> Option<&str> {
        self.photo_ref.as_deref()
    }

    /// Opens the camera for a single capture.
    ///
    /// Without `require_photo` a camera failure is logged and the check-in
    /// continues without a photo.
    pub async fn capture_photo(&mut self) -> SessionResult<()> {
        let captured = match self.session.camera.open().await {
            Ok(mut stream) => stream.capture().await,
            Err(e) => Err(e),
        };

        match captured {
            Ok(photo_ref) => {
                self.photo_ref = Some(photo_ref);
                Ok(())
            }
            Err(e) if !self.session.require_photo => {
                warn!(employee_id = self.session.employee_id, error = %e, "Continuing without a photo");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn submit(self) -> SessionResult<AdmissionReceipt> {
        let session = self.session;
        let receipt = session
            .backend
            .check_in(
                session.employee_id,
                AdmissionRequest {
                    location: self.location,
                    device_fingerprint: Some(session.device_fingerprint.clone()),
                    photo_ref: self.photo_ref,
                },
            )
            .await?;
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::sample_signals;
    use crate::geo::offset_north;
    use crate::model::device::RegistrationStatus;
    use crate::service::ServiceError;
    use crate::service::tests::{EMP, center, manual_clock, service_with};
    use crate::service::AttendanceService;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct FakeLocation(Arc<Mutex<Option<GeoPoint>>>);

    impl FakeLocation {
        fn at(point: GeoPoint) -> Self {
            Self(Arc::new(Mutex::new(Some(point))))
        }

        fn move_to(&self, point: Option<GeoPoint>) {
            *self.0.lock().unwrap() = point;
        }
    }

    #[async_trait]
    impl LocationSource for FakeLocation {
        async fn current_position(&self) -> SessionResult<GeoPoint> {
            self.0
                .lock()
                .unwrap()
                .ok_or_else(|| SessionError::LocationUnavailable("permission denied".into()))
        }
    }

    #[derive(Default)]
    struct CameraCounters {
        opened: AtomicUsize,
        live: AtomicUsize,
    }

    struct FakeCamera {
        counters: Arc<CameraCounters>,
        available: bool,
        capture_fails: bool,
    }

    impl FakeCamera {
        fn working() -> Self {
            Self {
                counters: Arc::default(),
                available: true,
                capture_fails: false,
            }
        }
    }

    struct FakeStream {
        counters: Arc<CameraCounters>,
        capture_fails: bool,
    }

    impl Drop for FakeStream {
        fn drop(&mut self) {
            self.counters.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl CameraStream for FakeStream {
        async fn capture(&mut self) -> SessionResult<String> {
            if self.capture_fails {
                Err(SessionError::CameraUnavailable("frame dropped".into()))
            } else {
                Ok("photos/1001/selfie.jpg".into())
            }
        }
    }

    #[async_trait]
    impl Camera for FakeCamera {
        type Stream = FakeStream;

        async fn open(&self) -> SessionResult<FakeStream> {
            if !self.available {
                return Err(SessionError::CameraUnavailable("no camera".into()));
            }
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            self.counters.live.fetch_add(1, Ordering::SeqCst);
            Ok(FakeStream {
                counters: self.counters.clone(),
                capture_fails: self.capture_fails,
            })
        }
    }

    fn backend(approved: bool) -> Arc<AttendanceService> {
        let (clock, _) = manual_clock(Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap());
        let store = Arc::new(MemoryStore::new());
        if approved {
            let fp = fingerprint::fingerprint(&sample_signals());
            store.set_device(EMP, DeviceState::approved(fp));
        }
        Arc::new(service_with(store, clock))
    }

    fn session(
        location: FakeLocation,
        camera: FakeCamera,
        backend: Arc<AttendanceService>,
    ) -> ClientSession<FakeLocation, FakeCamera, AttendanceService> {
        ClientSession::new(EMP, &sample_signals(), location, camera, backend)
    }

    #[tokio::test]
    async fn test_check_in_with_photo() {
        let camera = FakeCamera::working();
        let counters = camera.counters.clone();
        let backend = backend(true);
        let session = session(FakeLocation::at(center()), camera, backend.clone());

        let mut pending = session.begin_check_in().await.unwrap();
        assert!(pending.geofence().inside);
        pending.capture_photo().await.unwrap();
        assert_eq!(pending.photo_ref(), Some("photos/1001/selfie.jpg"));
        assert_eq!(counters.live.load(Ordering::SeqCst), 0);

        let receipt = pending.submit().await.unwrap();
        assert_eq!(receipt.fingerprint, FingerprintMatch::Match);

        let record = backend.attendance_today(EMP).await.unwrap().unwrap();
        assert_eq!(record.check_in_photo_ref.as_deref(), Some("photos/1001/selfie.jpg"));
    }

    #[tokio::test]
    async fn test_outside_geofence_never_opens_camera() {
        let camera = FakeCamera::working();
        let counters = camera.counters.clone();
        let session = session(
            FakeLocation::at(offset_north(center(), 300.0)),
            camera,
            backend(true),
        );

        let err = session.begin_check_in().await.err().unwrap();
        assert!(matches!(
            err,
            SessionError::Denied(PolicyDenial::OutsideGeofence { .. })
        ));
        assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_location_is_fatal() {
        let location = FakeLocation::default();
        let session = session(location, FakeCamera::working(), backend(true));

        assert!(matches!(
            session.begin_check_in().await.err().unwrap(),
            SessionError::LocationUnavailable(_)
        ));
        assert!(matches!(
            session.check_out().await.unwrap_err(),
            SessionError::LocationUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_camera_failure_degrades_without_required_photo() {
        let camera = FakeCamera {
            available: false,
            ..FakeCamera::working()
        };
        let session = session(FakeLocation::at(center()), camera, backend(true));

        let mut pending = session.begin_check_in().await.unwrap();
        pending.capture_photo().await.unwrap();
        assert_eq!(pending.photo_ref(), None);
        pending.submit().await.unwrap();
    }

    #[tokio::test]
    async fn test_required_photo_releases_stream_on_failure() {
        let camera = FakeCamera {
            capture_fails: true,
            ..FakeCamera::working()
        };
        let counters = camera.counters.clone();
        let session =
            session(FakeLocation::at(center()), camera, backend(true)).require_photo(true);

        let mut pending = session.begin_check_in().await.unwrap();
        let err = pending.capture_photo().await.unwrap_err();
        assert!(matches!(err, SessionError::CameraUnavailable(_)));
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backend_denial_surfaces() {
        let session = session(FakeLocation::at(center()), FakeCamera::working(), backend(false));

        let pending = session.begin_check_in().await.unwrap();
        let err = pending.submit().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Backend(ServiceError::Denied(PolicyDenial::DeviceNotRegistered))
        ));
    }

    #[tokio::test]
    async fn test_registration_and_device_status() {
        let backend = backend(false);
        let session = session(FakeLocation::at(center()), FakeCamera::working(), backend);

        let (state, outcome) = session.device_status().await.unwrap();
        assert_eq!(state, DeviceState::unregistered());
        assert_eq!(outcome, FingerprintMatch::NoReference);

        let reg = session.register_device().await.unwrap();
        assert_eq!(reg.status, RegistrationStatus::Pending);

        let (state, outcome) = session.device_status().await.unwrap();
        assert!(!state.approved);
        assert_eq!(outcome, FingerprintMatch::Match);
    }

    #[tokio::test]
    async fn test_check_out_outside_geofence() {
        let location = FakeLocation::at(center());
        let session = session(location.clone(), FakeCamera::working(), backend(true));

        session.begin_check_in().await.unwrap().submit().await.unwrap();
        location.move_to(Some(offset_north(center(), 5_000.0)));
        session.check_out().await.unwrap();
    }

    #[tokio::test]
    async fn test_location_watch_publishes_and_stops() {
        let location = FakeLocation::at(center());
        let mut session = session(location.clone(), FakeCamera::working(), backend(true));

        let mut rx = session.start_location_watch(Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(rx.borrow_and_update().unwrap().inside);

        location.move_to(Some(offset_north(center(), 1_000.0)));
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                rx.changed().await.unwrap();
                if !rx.borrow_and_update().unwrap().inside {
                    break;
                }
            }
        })
        .await
        .unwrap();

        session.logout();
        // the aborted task drops its sender
        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            while rx.changed().await.is_ok() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
