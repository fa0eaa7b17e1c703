//! Covgate: coverage lifecycle coordination for test runs
//!
//! Covgate decides who measures coverage, when, and who reports it, for a
//! test run that executes in one process, across distributed workers, or in
//! forked children. Measurement itself sits behind the [`CoverageEngine`]
//! trait; [`LineEngine`] is the bundled line-level engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      COVGATE Architecture                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐             │
//! │   │ Scheduler  │    │ CovPlugin  │    │ Controller │             │
//! │   │ (host)     │───►│ lifecycle  │───►│ central /  │──► report   │
//! │   │            │    │ + gate     │    │ master /   │             │
//! │   └────────────┘    └────────────┘    │ slave      │             │
//! │                                       └─────┬──────┘             │
//! │                                             ▼                    │
//! │                           data files <base>.<label>.<pid>        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod config;
mod data;
mod options;
mod process;
mod result;

/// Coverage controllers for the central, master and worker topologies
pub mod controller;

/// Data file naming and discovery
pub mod datafile;

/// Coverage engine seam and the bundled line engine
pub mod engine;

/// Master/worker protocol messages
pub mod node;

/// Session lifecycle and coverage gate
pub mod plugin;

/// Report renderers
pub mod report;

/// Secondary-process bootstrap
pub mod subprocess;

pub use config::EngineConfig;
pub use controller::{Controller, ControllerState, Role, Topology};
pub use data::{CoverageData, CoverageSummary, FileCoverage};
pub use engine::{CoverageEngine, EngineSettings, LineEngine};
pub use node::{DataLocation, NodeInput, NodeOutput, WorkerId, WorkerNode};
pub use options::{CovOptions, DistOptions, ReportKind, DEFAULT_CONFIG_PATH};
pub use plugin::{CovPlugin, CoverageVerdict, RunOutcome, SessionHost};
pub use process::{Pid, ProcessIdentity};
pub use result::{CovError, CovResult};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        CovError, CovOptions, CovPlugin, CovResult, CoverageData, CoverageEngine,
        CoverageVerdict, DistOptions, LineEngine, ReportKind, RunOutcome, SessionHost,
    };
}
