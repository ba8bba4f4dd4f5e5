pub mod attendance;
pub mod device;
pub mod geofence;
