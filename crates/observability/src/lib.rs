//! Process-wide tracing/logging setup shared by the server binary and tools.

pub mod tracing;

pub use self::tracing::{LogFormat, init, init_with};
