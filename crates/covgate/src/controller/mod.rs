//! Coverage controllers
//!
//! A controller owns one coverage engine and drives it through
//! `Unstarted → Started → Stopped → Reported` for one of three topologies:
//!
//! ```text
//! ┌──────────────┐   start/stop/save/combine/report   ┌──────────┐
//! │  Central     │ ─────────────────────────────────► │  report  │
//! └──────────────┘                                    └──────────┘
//! ┌──────────────┐  node down (data file / dataset)   ┌──────────┐
//! │  DistSlave   │ ─────────────────────────────────► │DistMaster│ ─► report
//! └──────────────┘          (one per worker)          └──────────┘
//! ```
//!
//! Only the central and master controllers ever report.

mod central;
mod master;
mod slave;

pub use master::MasterRole;
pub use slave::SlaveRole;

use crate::config::EngineConfig;
use crate::datafile::SessionTag;
use crate::engine::{CoverageEngine, EngineSettings};
use crate::node::{platform_desc, NodeInput, NodeOutput, WorkerNode};
use crate::options::{CovOptions, ReportKind};
use crate::report::sep;
use crate::result::{CovError, CovResult};
use crate::subprocess::SubprocessEnv;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

/// Lifecycle state of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Engine not created yet
    Unstarted,
    /// Measurement running (or, for a master, waiting for workers)
    Started,
    /// Measurement halted, data retained
    Stopped,
    /// Final report produced
    Reported,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unstarted => write!(f, "unstarted"),
            Self::Started => write!(f, "started"),
            Self::Stopped => write!(f, "stopped"),
            Self::Reported => write!(f, "reported"),
        }
    }
}

/// Execution topology a controller coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Single process measures and reports
    Central,
    /// Orchestrator of remote workers, combines and reports
    DistMaster,
    /// Remote worker, measures and hands its data to the master
    DistSlave,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Central => write!(f, "central"),
            Self::DistMaster => write!(f, "dist-master"),
            Self::DistSlave => write!(f, "dist-slave"),
        }
    }
}

/// Topology-specific controller state
#[derive(Debug)]
pub enum Role {
    /// Single-process run
    Central,
    /// Distributed master with its worker bookkeeping
    DistMaster(MasterRole),
    /// Distributed worker with the input it received from the master
    DistSlave(SlaveRole),
}

/// Coordinates one coverage engine for one topology
#[derive(Debug)]
pub struct Controller<E: CoverageEngine> {
    source: Vec<PathBuf>,
    reports: Vec<ReportKind>,
    config_path: PathBuf,
    config: EngineConfig,
    role: Role,
    session: SessionTag,
    engine: Option<E>,
    state: ControllerState,
    saved: bool,
    combined: bool,
}

impl<E: CoverageEngine> Controller<E> {
    /// Controller for a single-process run
    #[must_use]
    pub fn central(options: &CovOptions, config: EngineConfig) -> Self {
        Self::new(options, config, Role::Central)
    }

    /// Controller for the master of a distributed run
    pub fn dist_master(options: &CovOptions, config: EngineConfig) -> CovResult<Self> {
        Ok(Self::new(
            options,
            config,
            Role::DistMaster(MasterRole::new()?),
        ))
    }

    /// Controller for a worker of a distributed run
    #[must_use]
    pub fn dist_slave(options: &CovOptions, config: EngineConfig, input: NodeInput) -> Self {
        Self::new(options, config, Role::DistSlave(SlaveRole::new(input)))
    }

    fn new(options: &CovOptions, config: EngineConfig, role: Role) -> Self {
        let session = match &role {
            Role::DistSlave(slave) => slave
                .input()
                .session
                .clone()
                .unwrap_or_else(SessionTag::generate),
            Role::Central | Role::DistMaster(_) => SessionTag::generate(),
        };
        Self {
            source: options.source.clone(),
            reports: options.effective_reports(),
            config_path: options.config_path.clone(),
            config,
            role,
            session,
            engine: None,
            state: ControllerState::Unstarted,
            saved: false,
            combined: false,
        }
    }

    /// Topology of this controller
    #[must_use]
    pub fn topology(&self) -> Topology {
        match self.role {
            Role::Central => Topology::Central,
            Role::DistMaster(_) => Topology::DistMaster,
            Role::DistSlave(_) => Topology::DistSlave,
        }
    }

    /// Topology-specific state
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Tag scoping this session's subprocess data files
    #[must_use]
    pub fn session(&self) -> &SessionTag {
        &self.session
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Report kinds this controller renders
    #[must_use]
    pub fn reports(&self) -> &[ReportKind] {
        &self.reports
    }

    /// The live engine, once started
    #[must_use]
    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    /// The live engine, mutably
    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.as_mut()
    }

    /// Settings handed to subprocesses, for started measuring controllers
    ///
    /// Subprocess data files derive from a base scoped by the session tag,
    /// and for workers also by the worker id.
    #[must_use]
    pub fn subprocess_env(&self) -> Option<SubprocessEnv> {
        let engine = self.engine.as_ref()?;
        let base = &engine.settings().config.data_file;
        let scoped = match &self.role {
            Role::DistMaster(_) => return None,
            Role::Central => self.session.scope(base),
            Role::DistSlave(slave) => self.session.worker_scope(base, &slave.input().worker_id),
        };
        let mut env = SubprocessEnv::from_settings(engine.settings());
        env.data_file = scoped;
        Some(env)
    }

    fn base_settings(&self) -> EngineSettings {
        EngineSettings::new(
            self.source.clone(),
            self.config_path.clone(),
            self.config.clone(),
        )
    }

    fn expect_state(&self, expected: ControllerState, operation: &str) -> CovResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CovError::invalid_state(format!(
                "{operation} requires a {expected} {} controller, it is {}",
                self.topology(),
                self.state
            )))
        }
    }

    fn engine_or_err(&mut self) -> CovResult<&mut E> {
        self.engine
            .as_mut()
            .ok_or_else(|| CovError::invalid_state("controller has no engine"))
    }

    /// Create the engine and begin measuring
    pub fn start(&mut self) -> CovResult<()> {
        self.expect_state(ControllerState::Unstarted, "start")?;
        let base = self.base_settings();

        let engine = match &self.role {
            Role::Central => central::start_engine::<E>(base)?,
            Role::DistMaster(_) => {
                // Workers measure, the master only combines
                E::create(base)?
            }
            Role::DistSlave(slave) => slave.start_engine::<E>(base)?,
        };
        self.engine = Some(engine);
        self.state = ControllerState::Started;
        info!(topology = %self.topology(), "coverage controller started");
        Ok(())
    }

    /// Halt measurement
    pub fn stop(&mut self) -> CovResult<()> {
        self.expect_state(ControllerState::Started, "stop")?;
        let engine = self.engine_or_err()?;
        if engine.is_measuring() {
            engine.stop()?;
        }
        self.state = ControllerState::Stopped;
        debug!(topology = %self.topology(), "coverage controller stopped");
        Ok(())
    }

    /// Flush measured data to the data file
    pub fn save(&mut self) -> CovResult<()> {
        self.expect_state(ControllerState::Stopped, "save")?;
        if matches!(self.role, Role::DistMaster(_)) {
            debug!("master measured nothing locally, nothing to save");
        } else {
            self.engine_or_err()?.save()?;
        }
        self.saved = true;
        Ok(())
    }

    /// Merge other processes' data into this controller's dataset
    ///
    /// Returns the number of data sources merged.
    pub fn combine(&mut self) -> CovResult<usize> {
        self.expect_state(ControllerState::Stopped, "combine")?;
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| CovError::invalid_state("controller has no engine"))?;
        let merged = match &self.role {
            Role::Central => central::combine(engine, &self.session)?,
            Role::DistMaster(master) => master.combine_into(engine, &self.session)?,
            Role::DistSlave(_) => 0,
        };
        self.combined = true;
        info!(topology = %self.topology(), merged, "combined coverage data");
        Ok(merged)
    }

    /// Stop and save, returning the worker's report for the master
    pub fn finish(&mut self) -> CovResult<Option<NodeOutput>> {
        if self.state == ControllerState::Started {
            self.stop()?;
        }
        if self.state == ControllerState::Stopped && !self.saved {
            self.save()?;
        }
        match &self.role {
            Role::DistSlave(slave) => {
                let engine = self
                    .engine
                    .as_ref()
                    .ok_or_else(|| CovError::invalid_state("controller has no engine"))?;
                Ok(Some(slave.output(engine)?))
            }
            Role::Central | Role::DistMaster(_) => Ok(None),
        }
    }

    /// Render every requested report kind, returning the total percentage
    ///
    /// May be called once; a second call is an error.
    pub fn report(&mut self, out: &mut dyn Write) -> CovResult<f64> {
        self.expect_state(ControllerState::Stopped, "report")?;
        if matches!(self.role, Role::DistSlave(_)) {
            return Err(CovError::invalid_state(
                "workers never report, the master does",
            ));
        }
        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| CovError::invalid_state("controller has no engine"))?;

        let mut total = engine.data().coverage_percent();
        let printable: Vec<ReportKind> = self
            .reports
            .iter()
            .copied()
            .filter(|kind| *kind != ReportKind::Empty)
            .collect();

        if !printable.is_empty() {
            self.write_header(out)?;
        }

        let term = printable.contains(&ReportKind::Term);
        let term_missing = printable.contains(&ReportKind::TermMissing);
        if term || term_missing {
            total = engine.report(out, term_missing)?;
        }
        if printable.contains(&ReportKind::Annotate) {
            total = engine.annotate()?;
            writeln!(out, "Coverage annotated source written next to source")?;
        }
        if printable.contains(&ReportKind::Html) {
            total = engine.html_report()?;
            writeln!(
                out,
                "Coverage HTML written to dir {}",
                engine.settings().config.html_dir.display()
            )?;
        }
        if printable.contains(&ReportKind::Xml) {
            total = engine.xml_report()?;
            writeln!(
                out,
                "Coverage XML written to file {}",
                engine.settings().config.xml_output.display()
            )?;
        }

        if let Role::DistMaster(master) = &self.role {
            master.write_failed_workers(out)?;
        }

        self.state = ControllerState::Reported;
        info!(topology = %self.topology(), total, "coverage reported");
        Ok(total)
    }

    fn write_header(&self, out: &mut dyn Write) -> CovResult<()> {
        let descs: Vec<String> = match &self.role {
            Role::DistMaster(master) => master.node_descs().cloned().collect(),
            Role::Central | Role::DistSlave(_) => vec![platform_desc()],
        };
        if let [desc] = descs.as_slice() {
            sep(out, '-', &format!("coverage: {desc}"))?;
        } else {
            sep(out, '-', "coverage")?;
            for desc in &descs {
                sep(out, ' ', desc)?;
            }
        }
        Ok(())
    }

    /// End-of-session path: stop, save, combine, then report
    ///
    /// Returns `None` on workers, which leave reporting to the master.
    pub fn summary(&mut self, out: &mut dyn Write) -> CovResult<Option<f64>> {
        let _ = self.finish()?;
        if matches!(self.role, Role::DistSlave(_)) {
            debug!("worker finished, reporting is left to the master");
            return Ok(None);
        }
        if !self.combined {
            let _ = self.combine()?;
        }
        self.report(out).map(Some)
    }

    /// Hand this session's coverage configuration to a newly attached worker
    pub fn configure_node(&self, node: &mut WorkerNode) {
        if let Role::DistMaster(master) = &self.role {
            master.configure_node(node, &self.session);
        }
    }

    /// Record a worker's final report, or its failure to produce one
    pub fn test_node_down(&mut self, node: &WorkerNode, error: Option<&str>) {
        if let Role::DistMaster(master) = &mut self.role {
            master.node_down(node, error);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::engine::LineEngine;
    use crate::datafile::DataFileName;
    use crate::node::{DataLocation, WorkerId};
    use crate::process::Pid;
    use std::path::Path;

    fn options() -> CovOptions {
        CovOptions::new().with_source("pkg")
    }

    fn config_in(dir: &Path) -> EngineConfig {
        EngineConfig::default().rooted_at(dir)
    }

    fn exercise(controller: &mut Controller<LineEngine>, hit: u32, total: u32) {
        let engine = controller.engine_mut().unwrap();
        engine.add_statements("pkg/mod.rs", 1..=total);
        for line in 1..=hit {
            engine.record_hit("pkg/mod.rs", line);
        }
    }

    #[test]
    fn test_central_state_machine() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller: Controller<LineEngine> =
            Controller::central(&options(), config_in(dir.path()));
        assert_eq!(controller.topology(), Topology::Central);
        assert_eq!(controller.state(), ControllerState::Unstarted);
        assert!(controller.engine().is_none());

        controller.start().unwrap();
        assert_eq!(controller.state(), ControllerState::Started);
        assert!(controller.engine().unwrap().is_measuring());

        controller.stop().unwrap();
        assert_eq!(controller.state(), ControllerState::Stopped);
        assert!(!controller.engine().unwrap().is_measuring());
    }

    #[test]
    fn test_operations_out_of_order_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller: Controller<LineEngine> =
            Controller::central(&options(), config_in(dir.path()));
        assert!(matches!(
            controller.stop().unwrap_err(),
            CovError::InvalidState { .. }
        ));
        controller.start().unwrap();
        assert!(controller.start().is_err());
        assert!(controller.combine().is_err());
        assert!(controller.report(&mut Vec::new()).is_err());
    }

    #[test]
    fn test_second_report_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller: Controller<LineEngine> =
            Controller::central(&options(), config_in(dir.path()));
        controller.start().unwrap();
        exercise(&mut controller, 3, 4);

        let mut out = Vec::new();
        let total = controller.summary(&mut out).unwrap();
        assert_eq!(total, Some(75.0));
        assert_eq!(controller.state(), ControllerState::Reported);

        let err = controller.report(&mut out).unwrap_err();
        assert!(matches!(err, CovError::InvalidState { .. }));
        assert!(controller.summary(&mut out).is_err());
    }

    #[test]
    fn test_central_summary_saves_and_prints_header() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller: Controller<LineEngine> =
            Controller::central(&options(), config_in(dir.path()));
        controller.start().unwrap();
        exercise(&mut controller, 1, 2);

        let mut out = Vec::new();
        controller.summary(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("-"));
        assert!(text.contains("coverage: platform "));
        assert!(text.contains("pkg/mod.rs"));
        assert!(dir.path().join(".coverage").exists());
    }

    #[test]
    fn test_central_combines_subprocess_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller: Controller<LineEngine> =
            Controller::central(&options(), config_in(dir.path()));
        controller.start().unwrap();
        exercise(&mut controller, 1, 4);

        let env = controller.subprocess_env().unwrap();
        let mut child = crate::data::CoverageData::new();
        child.add_statements("pkg/mod.rs", 1..=4);
        child.record_hit("pkg/mod.rs", 4);
        child
            .save(&DataFileName::for_process(&env.data_file, Pid::new(99)).path())
            .unwrap();

        let total = controller.summary(&mut Vec::new()).unwrap();
        assert_eq!(total, Some(50.0));
    }

    #[test]
    fn test_central_ignores_files_of_earlier_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let mut stale = crate::data::CoverageData::new();
        stale.add_statements("pkg/mod.rs", 1..=4);
        stale.record_hit("pkg/mod.rs", 4);
        stale.save(&dir.path().join(".coverage.otherhost.99")).unwrap();
        let earlier = SessionTag::generate().scope(&dir.path().join(".coverage"));
        stale
            .save(&DataFileName::for_process(&earlier, Pid::new(98)).path())
            .unwrap();

        let mut controller: Controller<LineEngine> =
            Controller::central(&options(), config_in(dir.path()));
        controller.start().unwrap();
        exercise(&mut controller, 1, 4);

        let total = controller.summary(&mut Vec::new()).unwrap();
        assert_eq!(total, Some(25.0));
    }

    #[test]
    fn test_start_leaves_process_environment_alone() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller: Controller<LineEngine> =
            Controller::central(&options(), config_in(dir.path()));
        controller.start().unwrap();
        let env = controller.subprocess_env().unwrap();
        let exported = std::env::var_os(crate::subprocess::ENV_DATA_FILE);
        assert_ne!(exported.as_deref(), Some(env.data_file.as_os_str()));
    }

    #[test]
    fn test_empty_report_kind_prints_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options().with_report(ReportKind::Empty);
        let mut controller: Controller<LineEngine> =
            Controller::central(&opts, config_in(dir.path()));
        controller.start().unwrap();
        exercise(&mut controller, 1, 4);

        let mut out = Vec::new();
        assert_eq!(controller.summary(&mut out).unwrap(), Some(25.0));
        assert!(out.is_empty());
    }

    #[test]
    fn test_xml_and_term_missing_together() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options()
            .with_report(ReportKind::TermMissing)
            .with_report(ReportKind::Xml);
        let mut controller: Controller<LineEngine> =
            Controller::central(&opts, config_in(dir.path()));
        controller.start().unwrap();
        exercise(&mut controller, 2, 4);

        let mut out = Vec::new();
        controller.summary(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Missing"));
        assert!(text.contains("3-4"));
        assert!(text.contains("Coverage XML written to file"));
        assert!(dir.path().join("coverage.xml").exists());
    }

    #[test]
    fn test_master_does_not_measure() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller: Controller<LineEngine> =
            Controller::dist_master(&options(), config_in(dir.path())).unwrap();
        controller.start().unwrap();
        assert_eq!(controller.topology(), Topology::DistMaster);
        assert!(!controller.engine().unwrap().is_measuring());
        assert!(controller.subprocess_env().is_none());
    }

    #[test]
    fn test_master_configures_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let controller: Controller<LineEngine> =
            Controller::dist_master(&options(), config_in(dir.path())).unwrap();
        let mut node = WorkerNode::new("gw0");
        controller.configure_node(&mut node);
        let input = node.input.unwrap();
        assert_eq!(input.worker_id, WorkerId::new("gw0"));
        assert!(input.master_host.is_some());
        assert!(input.master_topdir.is_some());
        assert_eq!(input.session.as_ref(), Some(controller.session()));
    }

    #[test]
    fn test_slave_subprocess_files_live_under_master_session() {
        let dir = tempfile::tempdir().unwrap();
        let master: Controller<LineEngine> =
            Controller::dist_master(&options(), config_in(dir.path())).unwrap();
        let mut node = WorkerNode::new("gw3");
        master.configure_node(&mut node);

        let mut slave: Controller<LineEngine> =
            Controller::dist_slave(&options(), config_in(dir.path()), node.input.unwrap());
        assert_eq!(slave.session(), master.session());
        slave.start().unwrap();
        let env = slave.subprocess_env().unwrap();
        let expected = master
            .session()
            .worker_scope(&dir.path().join(".coverage"), &WorkerId::new("gw3"));
        assert_eq!(env.data_file, expected);
    }

    #[test]
    fn test_central_ignores_worker_hooks() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller: Controller<LineEngine> =
            Controller::central(&options(), config_in(dir.path()));
        let mut node = WorkerNode::new("gw0");
        controller.configure_node(&mut node);
        controller.test_node_down(&node, Some("boom"));
        assert!(node.input.is_none());
    }

    #[test]
    fn test_slave_finish_publishes_shared_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = NodeInput::new(WorkerId::new("gw4"));
        let mut controller: Controller<LineEngine> =
            Controller::dist_slave(&options(), config_in(dir.path()), input);
        controller.start().unwrap();
        exercise(&mut controller, 1, 2);

        let output = controller.finish().unwrap().unwrap();
        assert_eq!(output.worker_id, WorkerId::new("gw4"));
        let DataLocation::Shared { data_file } = output.location else {
            panic!("collocated worker must publish a shared data file");
        };
        assert!(data_file.exists());
        let name = data_file.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".coverage.gw4."));
    }

    #[test]
    fn test_slave_summary_never_reports() {
        let dir = tempfile::tempdir().unwrap();
        let input = NodeInput::new(WorkerId::new("gw1"));
        let mut controller: Controller<LineEngine> =
            Controller::dist_slave(&options(), config_in(dir.path()), input);
        controller.start().unwrap();

        let mut out = Vec::new();
        assert_eq!(controller.summary(&mut out).unwrap(), None);
        assert!(out.is_empty());
        assert_eq!(controller.state(), ControllerState::Stopped);
        assert!(controller.report(&mut out).is_err());
    }
}
