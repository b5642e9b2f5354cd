//! # mcp-compose orchestrator
//!
//! Brings the manifest to life on a container engine.
//!
//! ```text
//!              ┌──────────────┐   ps / reload / start / stop
//!  CLI ───────▶│   Compose    │◀──────────────────────────── proxy, dashboard
//!              └──────┬───────┘         (ComposeControl)
//!         up/down     │ reload: list ─▶ plan (config hash) ─▶ converge
//!                     ▼
//!      networks ─▶ servers (deps first) ─▶ auxiliary services
//!                     │
//!                     ▼
//!              ContainerRuntime
//! ```
//!
//! Every lifecycle transition is published as a `service` activity event.

mod compose;
pub mod error;
pub mod plan;
pub mod services;

pub use compose::{Compose, UpSummary};
pub use error::{ComposeError, ComposeResult};
pub use plan::{plan_reload, ReloadPlan};
pub use services::{AuxiliaryService, ServiceContext, ServiceTiming, StartOutcome};
