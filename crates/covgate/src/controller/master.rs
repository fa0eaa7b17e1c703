//! Distributed master topology
//!
//! The master measures nothing itself. It hands each attaching worker its
//! host and top directory, collects where every worker left its data and
//! merges it all before reporting. Workers that crash or never report are
//! listed in the summary but never fail the run, and contribute no data.

use crate::datafile::{derives_from, discover, host_name, resolve, SessionTag};
use crate::engine::CoverageEngine;
use crate::node::{DataLocation, NodeInput, WorkerId, WorkerNode};
use crate::report::sep;
use crate::result::CovResult;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Master-side worker bookkeeping
#[derive(Debug, Clone)]
pub struct MasterRole {
    host: String,
    topdir: PathBuf,
    rsync_roots: Vec<PathBuf>,
    reported: BTreeMap<WorkerId, DataLocation>,
    node_descs: BTreeSet<String>,
    failed_workers: BTreeSet<WorkerId>,
}

impl MasterRole {
    /// Master rooted at the current directory
    pub fn new() -> CovResult<Self> {
        Ok(Self::with_topdir(host_name(), std::env::current_dir()?))
    }

    /// Master on `host` whose checkout lives at `topdir`
    #[must_use]
    pub fn with_topdir(host: impl Into<String>, topdir: impl Into<PathBuf>) -> Self {
        let topdir = topdir.into();
        Self {
            host: host.into(),
            rsync_roots: vec![topdir.clone()],
            topdir,
            reported: BTreeMap::new(),
            node_descs: BTreeSet::new(),
            failed_workers: BTreeSet::new(),
        }
    }

    /// Top directory workers are remapped onto
    #[must_use]
    pub fn topdir(&self) -> &std::path::Path {
        &self.topdir
    }

    /// Data location each worker reported
    #[must_use]
    pub fn reported(&self) -> &BTreeMap<WorkerId, DataLocation> {
        &self.reported
    }

    /// Workers that went down without usable coverage
    #[must_use]
    pub fn failed_workers(&self) -> &BTreeSet<WorkerId> {
        &self.failed_workers
    }

    /// Descriptions of the workers that reported
    pub fn node_descs(&self) -> impl Iterator<Item = &String> {
        self.node_descs.iter()
    }

    pub(super) fn configure_node(&self, node: &mut WorkerNode, session: &SessionTag) {
        debug!(worker = %node.id, %session, "configuring worker for coverage");
        node.input = Some(NodeInput {
            worker_id: node.id.clone(),
            master_host: Some(self.host.clone()),
            master_topdir: Some(self.topdir.clone()),
            rsync_roots: self.rsync_roots.clone(),
            session: Some(session.clone()),
        });
    }

    pub(super) fn node_down(&mut self, node: &WorkerNode, error: Option<&str>) {
        if let Some(error) = error {
            warn!(worker = %node.id, %error, "worker went down, its coverage is lost");
            let _ = self.failed_workers.insert(node.id.clone());
            return;
        }
        let Some(output) = &node.output else {
            warn!(worker = %node.id, "worker reported no coverage");
            let _ = self.failed_workers.insert(node.id.clone());
            return;
        };
        debug!(worker = %node.id, desc = %output.node_desc, "worker coverage received");
        let _ = self.node_descs.insert(output.node_desc.clone());
        let _ = self
            .reported
            .insert(output.worker_id.clone(), output.location.clone());
    }

    /// Merge reported worker files, this session's subprocess files and
    /// inline worker data into `engine`
    pub(super) fn combine_into<E: CoverageEngine>(
        &self,
        engine: &mut E,
        session: &SessionTag,
    ) -> CovResult<usize> {
        let base = engine.settings().config.data_file.clone();
        let mut files: BTreeSet<PathBuf> = self
            .reported
            .values()
            .filter_map(|location| match location {
                DataLocation::Shared { data_file } => Some(resolve(data_file)),
                DataLocation::Inline { .. } => None,
            })
            .collect();

        for path in discover(&session.scope(&base))? {
            if let Some(worker) = self
                .failed_workers
                .iter()
                .find(|worker| derives_from(&path, &session.worker_scope(&base, worker)))
            {
                debug!(%worker, data_file = %path.display(), "skipping data of failed worker");
                continue;
            }
            let _ = files.insert(resolve(&path));
        }

        let files: Vec<PathBuf> = files.into_iter().collect();
        let mut merged = engine.combine(&files)?;

        for (worker, location) in &self.reported {
            if let DataLocation::Inline { topdir, data } = location {
                let mut data = data.clone();
                data.remap_paths(topdir, &self.topdir);
                engine.data_mut().merge(&data);
                debug!(%worker, from = %topdir.display(), "merged inline worker data");
                merged += 1;
            }
        }
        info!(
            workers = self.reported.len(),
            failed = self.failed_workers.len(),
            "combined worker coverage"
        );
        Ok(merged)
    }

    pub(super) fn write_failed_workers(&self, out: &mut dyn Write) -> CovResult<()> {
        if self.failed_workers.is_empty() {
            return Ok(());
        }
        sep(out, '-', "coverage: failed workers")?;
        writeln!(
            out,
            "The following workers failed to return coverage data, ensure that covgate is installed on these workers."
        )?;
        for worker in &self.failed_workers {
            writeln!(out, "{worker}")?;
        }
        Ok(())
    }
}
