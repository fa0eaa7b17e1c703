//! Worker protocol
//!
//! Messages exchanged between the master and its workers through the
//! scheduler. The master fills a worker's [`NodeInput`] when the worker
//! attaches; the worker answers with a [`NodeOutput`] when it finishes.

use crate::data::CoverageData;
use crate::datafile::{host_name, SessionTag};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifier of a distributed worker, e.g. `gw0`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(String);

impl WorkerId {
    /// Wrap a worker id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id as text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration the master hands to a newly attached worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInput {
    /// Worker id assigned by the scheduler
    pub worker_id: WorkerId,
    /// Host the master runs on
    pub master_host: Option<String>,
    /// Top directory of the master's checkout
    pub master_topdir: Option<PathBuf>,
    /// Directories the scheduler synchronises to remote workers
    pub rsync_roots: Vec<PathBuf>,
    /// Master's session tag, scoping the worker's subprocess data files
    #[serde(default)]
    pub session: Option<SessionTag>,
}

impl NodeInput {
    /// Input carrying only the worker id (no master configuration)
    #[must_use]
    pub fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            master_host: None,
            master_topdir: None,
            rsync_roots: Vec::new(),
            session: None,
        }
    }

    /// Whether a worker on `host` in `topdir` shares storage with the master
    #[must_use]
    pub fn is_collocated(&self, host: &str, topdir: &std::path::Path) -> bool {
        match (&self.master_host, &self.master_topdir) {
            (Some(master_host), Some(master_topdir)) => {
                master_host == host && master_topdir == topdir
            }
            // Without master details assume a shared filesystem
            _ => true,
        }
    }
}

/// Where a worker's measurement data can be found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataLocation {
    /// Data file on storage shared with the master
    Shared {
        /// Path of the worker's data file
        data_file: PathBuf,
    },
    /// Dataset sent inline by a worker with its own checkout
    Inline {
        /// Worker's top directory, remapped onto the master's
        topdir: PathBuf,
        /// Worker's measurement data
        data: CoverageData,
    },
}

/// What a finished worker reports back to the master
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    /// Reporting worker
    pub worker_id: WorkerId,
    /// Human-readable description of the worker's platform
    pub node_desc: String,
    /// Location of the worker's data
    pub location: DataLocation,
}

/// A worker as seen by the master
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerNode {
    /// Worker id
    pub id: WorkerId,
    /// Configuration sent to the worker
    pub input: Option<NodeInput>,
    /// Report received from the worker
    pub output: Option<NodeOutput>,
}

impl WorkerNode {
    /// A freshly attached worker
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: WorkerId::new(id),
            input: None,
            output: None,
        }
    }

    /// Attach the worker's report
    #[must_use]
    pub fn with_output(mut self, output: NodeOutput) -> Self {
        self.output = Some(output);
        self
    }
}

/// Description of the running platform, as shown in the summary header
#[must_use]
pub fn platform_desc() -> String {
    format!(
        "platform {}-{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Description of a worker's platform
#[must_use]
pub fn node_desc(worker: &WorkerId) -> String {
    format!("[{worker}] {}, host {}", platform_desc(), host_name())
}
