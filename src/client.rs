//! Thin interactive client for the line protocol.

pub mod terminal_client;

pub use terminal_client::run_client;
