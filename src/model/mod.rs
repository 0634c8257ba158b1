pub mod attendance;
pub mod correction;
pub mod role;
