//! # mcp-compose runtime
//!
//! Container engine drivers. The orchestrator talks to a [`ContainerRuntime`];
//! at boot [`Runtime::detect`] picks docker, podman, or the null driver.
//!
//! ```text
//! Runtime ──┬── Docker(CliRuntime) ──▶ `docker …` children
//!           ├── Podman(CliRuntime) ──▶ `podman …` children
//!           └── Null ────────────────▶ EngineAbsent on every call
//! ```

pub mod cli;
mod driver;
pub mod error;
mod exec;
mod logs;
mod null;
mod select;

pub use cli::{build_args, run_args, CliRuntime, EngineKind, EngineTimeouts};
pub use driver::ContainerRuntime;
pub use error::{EngineErrorKind, RuntimeError, RuntimeResult};
pub use exec::{ExecHandle, ExecSession};
pub use logs::{LogEvent, LogOptions, LogSource, LogStream};
pub use null::NullRuntime;
pub use select::Runtime;
