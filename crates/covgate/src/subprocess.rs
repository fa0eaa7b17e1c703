//! Secondary-process bootstrap
//!
//! Central and worker controllers hand their settings to subprocesses through
//! the environment. A subprocess (or a test running in a forked child) uses
//! them to start its own engine writing a suffixed data file, which the
//! owning controller picks up when it combines.
//!
//! One process may start several engines in turn, one per test. They share
//! the process's data file, so each finish folds in what earlier engines
//! saved there.

use crate::config::EngineConfig;
use crate::datafile::DataFileName;
use crate::engine::{CoverageEngine, EngineSettings};
use crate::process::Pid;
use crate::result::{CovError, CovResult};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::debug;

/// Source path list, joined with the platform path separator
pub const ENV_SOURCE: &str = "COVGATE_SOURCE";
/// Base data file
pub const ENV_DATA_FILE: &str = "COVGATE_DATA_FILE";
/// Engine config file
pub const ENV_CONFIG: &str = "COVGATE_CONFIG";

/// Settings handed from a measuring controller to its subprocesses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubprocessEnv {
    /// Source paths to measure
    pub source: Vec<PathBuf>,
    /// Base data file
    pub data_file: PathBuf,
    /// Engine config file
    pub config_path: PathBuf,
}

impl SubprocessEnv {
    /// Environment derived from a controller's engine settings
    #[must_use]
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            source: settings.source.clone(),
            data_file: settings.config.data_file.clone(),
            config_path: settings.config_path.clone(),
        }
    }

    /// Variables to set in a child's environment
    pub fn vars(&self) -> CovResult<Vec<(&'static str, OsString)>> {
        let source = std::env::join_paths(&self.source)
            .map_err(|e| CovError::config(format!("source path not exportable: {e}")))?;
        Ok(vec![
            (ENV_SOURCE, source),
            (ENV_DATA_FILE, self.data_file.clone().into_os_string()),
            (ENV_CONFIG, self.config_path.clone().into_os_string()),
        ])
    }

    /// Export the variables into this process's environment
    pub fn export(&self) -> CovResult<()> {
        for (key, value) in self.vars()? {
            std::env::set_var(key, value);
        }
        debug!(data_file = %self.data_file.display(), "exported subprocess coverage environment");
        Ok(())
    }

    /// Read settings from the process environment
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_vars(std::env::vars_os())
    }

    /// Read settings from a set of variables
    ///
    /// Returns `None` unless a source list is present.
    #[must_use]
    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Option<Self>
    where
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let mut source = None;
        let mut data_file = None;
        let mut config_path = None;
        for (key, value) in vars {
            let key: OsString = key.into();
            let value: OsString = value.into();
            match key.to_str() {
                Some(ENV_SOURCE) => source = Some(value),
                Some(ENV_DATA_FILE) => data_file = Some(PathBuf::from(value)),
                Some(ENV_CONFIG) => config_path = Some(PathBuf::from(value)),
                _ => {}
            }
        }
        let source: Vec<PathBuf> = std::env::split_paths(&source?)
            .filter(|path| !path.as_os_str().is_empty())
            .collect();
        if source.is_empty() {
            return None;
        }
        Some(Self {
            source,
            data_file: data_file.unwrap_or_else(|| EngineConfig::default().data_file),
            config_path: config_path
                .unwrap_or_else(|| PathBuf::from(crate::options::DEFAULT_CONFIG_PATH)),
        })
    }

    /// Engine settings for the calling process's suffixed data file
    pub fn settings_for(&self, pid: Pid) -> CovResult<EngineSettings> {
        let mut config = EngineConfig::load(&self.config_path)?;
        config.data_file = self.data_file.clone();
        let data_file = DataFileName::for_process(&self.data_file, pid).path();
        Ok(EngineSettings::new(self.source.clone(), self.config_path.clone(), config)
            .with_data_file(data_file))
    }
}

/// Start a measuring engine for the calling process
pub fn init<E: CoverageEngine>(env: &SubprocessEnv) -> CovResult<E> {
    let settings = env.settings_for(Pid::current())?;
    debug!(data_file = %settings.data_file.display(), "starting subprocess coverage");
    let mut engine = E::create(settings)?;
    engine.start()?;
    Ok(engine)
}

/// Start a measuring engine if the environment requests coverage
pub fn init_from_env<E: CoverageEngine>() -> CovResult<Option<E>> {
    SubprocessEnv::from_env().map(|env| init(&env)).transpose()
}

/// Stop a subprocess engine and flush its data
///
/// Data an earlier engine of the same process saved is merged in first.
pub fn finish<E: CoverageEngine>(engine: &mut E) -> CovResult<()> {
    engine.stop()?;
    let data_file = engine.settings().data_file.clone();
    if data_file.is_file() {
        let merged = engine.combine(std::slice::from_ref(&data_file))?;
        debug!(data_file = %data_file.display(), merged, "folded earlier data of this process");
    }
    engine.save()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::engine::LineEngine;

    fn sample_env(dir: &std::path::Path) -> SubprocessEnv {
        SubprocessEnv {
            source: vec![PathBuf::from("pkg"), PathBuf::from("lib")],
            data_file: dir.join(".coverage"),
            config_path: PathBuf::from(".coveragerc"),
        }
    }

    #[test]
    fn test_vars_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let env = sample_env(dir.path());
        let parsed = SubprocessEnv::from_vars(env.vars().unwrap()).unwrap();
        assert_eq!(parsed, env);
    }

    #[test]
    fn test_from_vars_without_source_is_inactive() {
        let vars = vec![(ENV_DATA_FILE, "/tmp/.coverage")];
        assert!(SubprocessEnv::from_vars(vars).is_none());
        assert!(SubprocessEnv::from_vars(vec![(ENV_SOURCE, "")]).is_none());
    }

    #[test]
    fn test_settings_use_suffixed_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let env = sample_env(dir.path());
        let settings = env.settings_for(Pid::new(77)).unwrap();
        assert_eq!(settings.config.data_file, dir.path().join(".coverage"));
        let name = settings.data_file.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(".coverage."));
        assert!(name.ends_with(".77"));
    }

    #[test]
    fn test_init_and_finish_write_suffixed_file() {
        let dir = tempfile::tempdir().unwrap();
        let env = sample_env(dir.path());
        let mut engine: LineEngine = init(&env).unwrap();
        assert!(engine.is_measuring());
        engine.add_statements("pkg/a.rs", [1]);
        engine.record_hit("pkg/a.rs", 1);
        finish(&mut engine).unwrap();

        assert!(!engine.is_measuring());
        let found = crate::datafile::discover(&dir.path().join(".coverage")).unwrap();
        assert_eq!(found, vec![engine.settings().data_file.clone()]);
    }

    #[test]
    fn test_successive_engines_in_one_process_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let env = sample_env(dir.path());
        for line in [1, 2] {
            let mut engine: LineEngine = init(&env).unwrap();
            engine.add_statements("pkg/a.rs", 1..=4);
            engine.record_hit("pkg/a.rs", line);
            finish(&mut engine).unwrap();
        }

        let path = env.settings_for(Pid::current()).unwrap().data_file;
        let saved = crate::data::CoverageData::load(&path).unwrap();
        assert_eq!(saved.coverage_percent(), 50.0);
        assert_eq!(saved.file("pkg/a.rs").unwrap().hit_count(1), 1);
    }
}
