//! Structured logging for hsm-load
//!
//! Logs go to stderr so that the text summary printed on stdout at the end
//! of a run can be piped or redirected on its own.

pub mod init;

pub use init::{build_env_filter, init_logging, init_simple_tracing};
