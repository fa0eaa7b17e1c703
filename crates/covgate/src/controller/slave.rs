//! Distributed worker topology
//!
//! A worker measures into `<base>.<worker id>.<pid>`. When it finishes it
//! tells the master where the data is: the file path when both share host
//! and top directory, the dataset itself otherwise.

use crate::datafile::{host_name, DataFileName};
use crate::engine::{CoverageEngine, EngineSettings};
use crate::node::{node_desc, DataLocation, NodeInput, NodeOutput};
use crate::process::Pid;
use crate::result::CovResult;
use tracing::debug;

/// Worker-side state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveRole {
    input: NodeInput,
}

impl SlaveRole {
    /// Worker configured by the master's input
    #[must_use]
    pub fn new(input: NodeInput) -> Self {
        Self { input }
    }

    /// Input received from the master
    #[must_use]
    pub fn input(&self) -> &NodeInput {
        &self.input
    }

    pub(super) fn start_engine<E: CoverageEngine>(&self, settings: EngineSettings) -> CovResult<E> {
        let data_file = DataFileName::for_worker(
            &settings.config.data_file,
            &self.input.worker_id,
            Pid::current(),
        );
        let mut engine = E::create(settings.with_data_file(data_file.path()))?;
        engine.start()?;
        Ok(engine)
    }

    pub(super) fn output<E: CoverageEngine>(&self, engine: &E) -> CovResult<NodeOutput> {
        let host = host_name();
        let topdir = std::env::current_dir()?;
        let location = if self.input.is_collocated(&host, &topdir) {
            let data_file = &engine.settings().data_file;
            DataLocation::Shared {
                data_file: if data_file.is_relative() {
                    topdir.join(data_file)
                } else {
                    data_file.clone()
                },
            }
        } else {
            debug!(%host, topdir = %topdir.display(), "worker not collocated, sending data inline");
            DataLocation::Inline {
                topdir,
                data: engine.data().clone(),
            }
        };
        Ok(NodeOutput {
            worker_id: self.input.worker_id.clone(),
            node_desc: node_desc(&self.input.worker_id),
            location,
        })
    }
}
