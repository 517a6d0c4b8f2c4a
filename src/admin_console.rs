//! Operator console.
//!
//! Reads commands from a local input stream (standard input in the server binary)
//! and prints sink contents and the active client count.

pub mod console;

pub use console::{AdminConsole, ConsoleCommand, ConsoleExit};
