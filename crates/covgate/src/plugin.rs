//! Session lifecycle
//!
//! [`CovPlugin`] sits between a test scheduler and the coverage controllers.
//! It picks the topology, forwards the scheduler's session, worker and
//! per-test events, and turns the final percentage into a [`RunOutcome`].

use crate::config::EngineConfig;
use crate::controller::{Controller, ControllerState, Topology};
use crate::engine::CoverageEngine;
use crate::node::{NodeInput, NodeOutput, WorkerNode};
use crate::options::{CovOptions, DistOptions};
use crate::process::ProcessIdentity;
use crate::result::{CovError, CovResult};
use crate::subprocess::{self, SubprocessEnv};
use std::io::Write;
use tracing::{debug, info, warn};

/// What the plugin needs from the test scheduler's session
pub trait SessionHost {
    /// Input the master sent, when this session runs inside a worker
    fn worker_input(&self) -> Option<&NodeInput>;

    /// Send a finished worker's coverage report back to the master
    fn publish_worker_output(&mut self, output: NodeOutput);
}

/// Coverage part of the run verdict
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoverageVerdict {
    /// A report was produced and met any configured minimum
    Reported {
        /// Total percentage
        total: f64,
    },
    /// The run failed and reporting on failure is disabled
    Suppressed,
    /// This process does not report (worker session)
    NotReported,
    /// A report was produced below the configured minimum
    BelowThreshold {
        /// Configured minimum percentage
        required: u32,
        /// Total percentage
        total: f64,
    },
}

/// Verdict of a finished session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOutcome {
    /// Whether the test suite itself failed
    pub tests_failed: bool,
    /// Coverage verdict
    pub coverage: CoverageVerdict,
}

impl RunOutcome {
    /// Whether both the tests and the coverage gate passed
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.tests_failed && !matches!(self.coverage, CoverageVerdict::BelowThreshold { .. })
    }
}

/// Coverage plugin for one test session
#[derive(Debug)]
pub struct CovPlugin<E: CoverageEngine> {
    options: CovOptions,
    config: EngineConfig,
    identity: Option<ProcessIdentity>,
    controller: Controller<E>,
    subprocess_env: Option<SubprocessEnv>,
    secondary: Option<E>,
    session_active: bool,
    failed: bool,
    outcome: Option<RunOutcome>,
}

impl<E: CoverageEngine> CovPlugin<E> {
    /// Build the plugin for a run, or `None` when no source path is configured
    ///
    /// The topology is chosen here from `dist`. With `start` the controller
    /// starts measuring immediately; otherwise it starts at
    /// [`session_start`](Self::session_start).
    pub fn activate(
        options: CovOptions,
        dist: &DistOptions,
        start: bool,
    ) -> CovResult<Option<Self>> {
        if !options.is_active() {
            debug!("no coverage source configured, plugin inactive");
            return Ok(None);
        }
        let config = EngineConfig::load(&options.config_path)?;
        let controller = if dist.is_distributed() {
            Controller::dist_master(&options, config.clone())?
        } else {
            Controller::central(&options, config.clone())
        };
        info!(topology = %controller.topology(), "coverage plugin active");

        let mut plugin = Self {
            options,
            config,
            identity: None,
            controller,
            subprocess_env: None,
            secondary: None,
            session_active: false,
            failed: false,
            outcome: None,
        };
        if start {
            plugin.start_controller()?;
        }
        Ok(Some(plugin))
    }

    /// Use a session process identity captured elsewhere
    ///
    /// Otherwise the identity is captured at [`session_start`](Self::session_start).
    #[must_use]
    pub fn with_identity(mut self, identity: ProcessIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Identity of the process that started the session
    #[must_use]
    pub fn identity(&self) -> Option<ProcessIdentity> {
        self.identity
    }

    /// Options the plugin was activated with
    #[must_use]
    pub fn options(&self) -> &CovOptions {
        &self.options
    }

    /// The active controller
    #[must_use]
    pub fn controller(&self) -> &Controller<E> {
        &self.controller
    }

    /// Verdict of the session, once the terminal summary ran
    #[must_use]
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome
    }

    /// Live engine of the active controller, available during the session
    #[must_use]
    pub fn coverage(&self) -> Option<&E> {
        if self.session_active {
            self.controller.engine()
        } else {
            None
        }
    }

    /// Live engine of the active controller, mutably
    pub fn coverage_mut(&mut self) -> Option<&mut E> {
        if self.session_active {
            self.controller.engine_mut()
        } else {
            None
        }
    }

    /// Engine measuring the current test in a secondary process
    pub fn secondary_coverage_mut(&mut self) -> Option<&mut E> {
        self.secondary.as_mut()
    }

    fn start_controller(&mut self) -> CovResult<()> {
        self.controller.start()?;
        self.subprocess_env = self.controller.subprocess_env();
        if let Some(env) = self.subprocess_env.as_ref().filter(|_| self.options.export_env) {
            env.export()?;
        }
        Ok(())
    }

    /// Scheduler event: the session begins
    ///
    /// Captures the session process identity. A worker session replaces the
    /// topology chosen at activation.
    pub fn session_start(&mut self, host: &dyn SessionHost) -> CovResult<()> {
        if self.identity.is_none() {
            self.identity = Some(ProcessIdentity::capture());
        }
        if let Some(input) = host.worker_input() {
            if self.controller.state() == ControllerState::Started {
                debug!("discarding controller started before the worker session was known");
                self.controller.stop()?;
            }
            info!(worker = %input.worker_id, "worker session, measuring for the master");
            self.controller =
                Controller::dist_slave(&self.options, self.config.clone(), input.clone());
            self.start_controller()?;
        } else if self.controller.state() == ControllerState::Unstarted {
            self.start_controller()?;
        }
        self.session_active = true;
        Ok(())
    }

    /// Worker event: a worker attached to the master
    pub fn configure_node(&self, node: &mut WorkerNode) {
        self.controller.configure_node(node);
    }

    /// Worker event: a worker finished, possibly with an error
    pub fn test_node_down(&mut self, node: &WorkerNode, error: Option<&str>) {
        self.controller.test_node_down(node, error);
    }

    /// Per-test event before a test runs
    ///
    /// In a process other than the session's, a fresh engine measures the
    /// test since the session's own hooks never run there.
    pub fn runtest_setup(&mut self) -> CovResult<()> {
        let Some(identity) = self.identity else {
            return Ok(());
        };
        if self.secondary.is_some() || !identity.is_secondary_process() {
            return Ok(());
        }
        let Some(env) = &self.subprocess_env else {
            return Ok(());
        };
        debug!(session_pid = %identity.session_pid(), "test runs in a secondary process");
        self.secondary = Some(subprocess::init(env)?);
        Ok(())
    }

    /// Per-test event after a test ran
    pub fn runtest_teardown(&mut self) -> CovResult<()> {
        if let Some(mut engine) = self.secondary.take() {
            subprocess::finish(&mut engine)?;
        }
        Ok(())
    }

    /// Scheduler event: the session ends with `exit_status`
    ///
    /// Workers stop, save and publish their report to the master here.
    pub fn session_finish(
        &mut self,
        host: &mut dyn SessionHost,
        exit_status: i32,
    ) -> CovResult<()> {
        self.failed = exit_status != 0;
        if self.controller.topology() == Topology::DistSlave {
            if let Some(output) = self.controller.finish()? {
                debug!(worker = %output.worker_id, "publishing worker coverage");
                host.publish_worker_output(output);
            }
        }
        self.session_active = false;
        Ok(())
    }

    /// Scheduler event: print the coverage summary
    ///
    /// Returns [`CovError::ThresholdNotReached`] when the total falls below
    /// the configured minimum; the outcome is recorded either way.
    pub fn terminal_summary(&mut self, out: &mut dyn Write) -> CovResult<RunOutcome> {
        let coverage = self.summary_verdict(out)?;
        let outcome = RunOutcome {
            tests_failed: self.failed,
            coverage,
        };
        self.outcome = Some(outcome);

        match coverage {
            CoverageVerdict::BelowThreshold { required, total } => {
                warn!(required, total, "coverage below minimum");
                Err(CovError::ThresholdNotReached { required, total })
            }
            _ => Ok(outcome),
        }
    }

    fn summary_verdict(&mut self, out: &mut dyn Write) -> CovResult<CoverageVerdict> {
        if self.controller.topology() == Topology::DistSlave {
            return Ok(CoverageVerdict::NotReported);
        }
        if self.failed && self.options.no_cov_on_fail {
            info!("tests failed, coverage report suppressed");
            return Ok(CoverageVerdict::Suppressed);
        }
        let Some(total) = self.controller.summary(out)? else {
            return Ok(CoverageVerdict::NotReported);
        };
        Ok(match self.options.cov_min {
            Some(required) if total < f64::from(required) => {
                CoverageVerdict::BelowThreshold { required, total }
            }
            _ => {
                debug!(total, "coverage gate passed");
                CoverageVerdict::Reported { total }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::engine::LineEngine;
    use crate::node::{DataLocation, WorkerId};
    use crate::process::Pid;
    use std::path::Path;

    #[derive(Default)]
    struct FakeHost {
        input: Option<NodeInput>,
        published: Vec<NodeOutput>,
    }

    impl SessionHost for FakeHost {
        fn worker_input(&self) -> Option<&NodeInput> {
            self.input.as_ref()
        }

        fn publish_worker_output(&mut self, output: NodeOutput) {
            self.published.push(output);
        }
    }

    fn options_in(dir: &Path) -> CovOptions {
        let config = dir.join("cov.yml");
        std::fs::write(
            &config,
            format!("data_file: {}\n", dir.join(".coverage").display()),
        )
        .unwrap();
        CovOptions::new()
            .with_source("pkg")
            .with_config_path(config)
            .with_export_env(false)
    }

    fn central(options: CovOptions) -> CovPlugin<LineEngine> {
        CovPlugin::activate(options, &DistOptions::default(), true)
            .unwrap()
            .unwrap()
    }

    fn exercise(engine: &mut LineEngine, hit: u32, total: u32) {
        engine.add_statements("pkg/mod.rs", 1..=total);
        for line in 1..=hit {
            engine.record_hit("pkg/mod.rs", line);
        }
    }

    #[test]
    fn test_inactive_without_source() {
        let plugin =
            CovPlugin::<LineEngine>::activate(CovOptions::new(), &DistOptions::default(), true)
                .unwrap();
        assert!(plugin.is_none());
    }

    #[test]
    fn test_missing_explicit_config_fails_activation() {
        let dir = tempfile::tempdir().unwrap();
        let options = CovOptions::new()
            .with_source("pkg")
            .with_config_path(dir.path().join("absent.yml"));
        let err = CovPlugin::<LineEngine>::activate(options, &DistOptions::default(), true)
            .unwrap_err();
        assert!(matches!(err, CovError::Config { .. }));
    }

    #[test]
    fn test_topology_follows_dist_options() {
        let dir = tempfile::tempdir().unwrap();
        let dist = DistOptions::default().with_numprocesses(2);
        let plugin = CovPlugin::<LineEngine>::activate(options_in(dir.path()), &dist, false)
            .unwrap()
            .unwrap();
        assert_eq!(plugin.controller().topology(), Topology::DistMaster);
        assert_eq!(plugin.controller().state(), ControllerState::Unstarted);
    }

    #[test]
    fn test_accessor_lives_for_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = central(options_in(dir.path()));
        let mut host = FakeHost::default();
        assert!(plugin.coverage().is_none());

        plugin.session_start(&host).unwrap();
        assert!(plugin.coverage().unwrap().is_measuring());

        plugin.session_finish(&mut host, 0).unwrap();
        assert!(plugin.coverage().is_none());
    }

    #[test]
    fn test_deferred_start_happens_at_session_start() {
        let dir = tempfile::tempdir().unwrap();
        let options = options_in(dir.path());
        let mut plugin = CovPlugin::<LineEngine>::activate(options, &DistOptions::default(), false)
            .unwrap()
            .unwrap();
        assert_eq!(plugin.controller().state(), ControllerState::Unstarted);
        plugin.session_start(&FakeHost::default()).unwrap();
        assert_eq!(plugin.controller().state(), ControllerState::Started);
    }

    #[test]
    fn test_worker_session_overrides_topology() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = central(options_in(dir.path()));
        let mut host = FakeHost {
            input: Some(NodeInput::new(WorkerId::new("gw0"))),
            published: Vec::new(),
        };
        plugin.session_start(&host).unwrap();
        assert_eq!(plugin.controller().topology(), Topology::DistSlave);
        exercise(plugin.coverage_mut().unwrap(), 1, 2);

        plugin.session_finish(&mut host, 0).unwrap();
        assert_eq!(host.published.len(), 1);
        assert!(matches!(
            host.published[0].location,
            DataLocation::Shared { .. }
        ));

        let mut out = Vec::new();
        let outcome = plugin.terminal_summary(&mut out).unwrap();
        assert_eq!(outcome.coverage, CoverageVerdict::NotReported);
        assert!(out.is_empty());
    }

    #[test]
    fn test_suppressed_on_failed_run() {
        let dir = tempfile::tempdir().unwrap();
        let options = options_in(dir.path())
            .with_no_cov_on_fail(true)
            .with_cov_min(90);
        let mut plugin = central(options);
        let mut host = FakeHost::default();
        plugin.session_start(&host).unwrap();
        exercise(plugin.coverage_mut().unwrap(), 1, 10);
        plugin.session_finish(&mut host, 1).unwrap();

        let mut out = Vec::new();
        let outcome = plugin.terminal_summary(&mut out).unwrap();
        assert_eq!(outcome.coverage, CoverageVerdict::Suppressed);
        assert!(outcome.tests_failed);
        assert!(!outcome.is_success());
        assert!(out.is_empty());
        assert_eq!(plugin.controller().state(), ControllerState::Started);
    }

    #[test]
    fn test_failed_run_still_reports_without_suppression() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = central(options_in(dir.path()));
        let mut host = FakeHost::default();
        plugin.session_start(&host).unwrap();
        exercise(plugin.coverage_mut().unwrap(), 1, 2);
        plugin.session_finish(&mut host, 1).unwrap();

        let outcome = plugin.terminal_summary(&mut Vec::new()).unwrap();
        assert_eq!(outcome.coverage, CoverageVerdict::Reported { total: 50.0 });
        assert!(outcome.tests_failed);
    }

    #[test]
    fn test_threshold_met_at_exact_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = central(options_in(dir.path()).with_cov_min(50));
        let mut host = FakeHost::default();
        plugin.session_start(&host).unwrap();
        exercise(plugin.coverage_mut().unwrap(), 1, 2);
        plugin.session_finish(&mut host, 0).unwrap();

        let outcome = plugin.terminal_summary(&mut Vec::new()).unwrap();
        assert!(outcome.is_success());
    }

    #[test]
    fn test_secondary_process_measures_each_test() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = central(options_in(dir.path()))
            .with_identity(ProcessIdentity::from_pid(Pid::new(u32::MAX)));
        let mut host = FakeHost::default();
        plugin.session_start(&host).unwrap();
        exercise(plugin.coverage_mut().unwrap(), 1, 4);

        plugin.runtest_setup().unwrap();
        let secondary = plugin.secondary_coverage_mut().unwrap();
        assert!(secondary.is_measuring());
        secondary.add_statements("pkg/mod.rs", 1..=4);
        secondary.record_hit("pkg/mod.rs", 3);
        plugin.runtest_teardown().unwrap();
        assert!(plugin.secondary_coverage_mut().is_none());

        plugin.session_finish(&mut host, 0).unwrap();
        let outcome = plugin.terminal_summary(&mut Vec::new()).unwrap();
        assert_eq!(outcome.coverage, CoverageVerdict::Reported { total: 50.0 });
    }

    #[test]
    fn test_secondary_process_keeps_every_test() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = central(options_in(dir.path()))
            .with_identity(ProcessIdentity::from_pid(Pid::new(u32::MAX)));
        let mut host = FakeHost::default();
        plugin.session_start(&host).unwrap();
        exercise(plugin.coverage_mut().unwrap(), 0, 4);

        for line in [1, 2] {
            plugin.runtest_setup().unwrap();
            let secondary = plugin.secondary_coverage_mut().unwrap();
            secondary.add_statements("pkg/mod.rs", 1..=4);
            secondary.record_hit("pkg/mod.rs", line);
            plugin.runtest_teardown().unwrap();
        }

        plugin.session_finish(&mut host, 0).unwrap();
        let outcome = plugin.terminal_summary(&mut Vec::new()).unwrap();
        assert_eq!(outcome.coverage, CoverageVerdict::Reported { total: 50.0 });
    }

    #[test]
    fn test_identity_captured_at_session_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = central(options_in(dir.path()));
        assert!(plugin.identity().is_none());
        plugin.runtest_setup().unwrap();
        assert!(plugin.secondary_coverage_mut().is_none());

        plugin.session_start(&FakeHost::default()).unwrap();
        let identity = plugin.identity().unwrap();
        assert_eq!(identity.session_pid(), Pid::current());
        assert!(!identity.is_secondary_process());
    }

    #[test]
    fn test_preset_identity_survives_session_start() {
        let dir = tempfile::tempdir().unwrap();
        let preset = ProcessIdentity::from_pid(Pid::new(7));
        let mut plugin = central(options_in(dir.path())).with_identity(preset);
        plugin.session_start(&FakeHost::default()).unwrap();
        assert_eq!(plugin.identity(), Some(preset));
    }

    #[test]
    fn test_primary_process_needs_no_per_test_engine() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = central(options_in(dir.path()));
        plugin.session_start(&FakeHost::default()).unwrap();
        plugin.runtest_setup().unwrap();
        assert!(plugin.secondary_coverage_mut().is_none());
        plugin.runtest_teardown().unwrap();
    }
}
