//! Report validation.
//!
//! Turns one raw client line into a canonical [`TimezoneReport`] or a
//! [`RejectionReason`](crate::error_handling::types::RejectionReason). Nothing in here
//! touches I/O or shared state.

pub mod report;
pub mod validator;

pub use report::TimezoneReport;
pub use validator::validate;
