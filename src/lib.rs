pub mod admin_console;
pub mod client;
pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod network;
pub mod session_management;
pub mod storage;
pub mod validation;

pub use session_management::*;
pub use validation::{validate, TimezoneReport};
