pub mod attendance;
pub mod device;
pub mod role;

/// Employee id as carried in the access token.
pub type EmployeeId = u64;
