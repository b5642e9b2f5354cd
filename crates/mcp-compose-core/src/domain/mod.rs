//! Domain types
//!
//! - Workloads (spec, record, status) and networks
//! - The compose manifest and environment overrides
//! - Activity events and streamed log lines

mod activity;
mod log_line;
pub mod manifest;
mod workload;

pub use activity::{kinds, ActivityEvent, Severity};
pub use log_line::*;
pub use manifest::{
    EnvOverrides, Manifest, NetworkConfig, Protocol, ServerConfig,
};
pub use workload::*;
