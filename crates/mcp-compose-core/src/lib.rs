//! # mcp-compose core
//!
//! Domain types and shared services for the mcp-compose control plane.
//!
//! ## Modules
//!
//! - `branding` - Naming constants (container prefix, default network, ports)
//! - `domain` - Workload specs/records, manifest, activity events, log lines
//! - `repository` - Storage and control traits implemented by other crates
//! - `service` - Activity publishing (local bus or cross-process webhook)
//! - `event_bus` - The activity bus (owner task + mailboxes)

pub mod branding;
pub mod domain;
pub mod error;
pub mod event_bus;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use domain::*;
pub use error::ConfigError;
pub use repository::*;
pub use service::*;

pub use event_bus::{
    ActivityBus, ActivityBusConfig, ActivitySink, BusCounters, SinkError, SubscriberHandle,
};
