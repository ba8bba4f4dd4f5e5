pub mod ports;
pub mod session;

pub use ports::{
    AttendanceBackend, Camera, CameraStream, LocationSource, SessionError, SessionResult,
};
pub use session::{ClientSession, LocationWatch, PendingCheckIn};
