//! Logger bootstrap for binaries built on the layout stack.
//!
//! Library code only talks to the `log` facade; this module picks the
//! `env_logger` backend and its filter once per process.

mod init;

pub use init::{init_logging, LoggingConfig};
