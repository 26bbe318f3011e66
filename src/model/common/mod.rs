pub mod address;
pub mod cedula;
pub mod election;
pub mod permissions;
