pub mod geofence_cache;
