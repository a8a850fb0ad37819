//! Command implementations

pub mod realize;
pub mod verify;
pub mod version;
