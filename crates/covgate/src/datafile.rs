//! Data file naming and discovery
//!
//! Suffixed data files are named `<base>.<label>.<pid>`, where the label is
//! the worker id for distributed workers and the host name for any other
//! secondary process. The pid is always the last dot-separated segment.
//!
//! Subprocess files of a session derive from a base scoped by that session's
//! [`SessionTag`], so files left by earlier sessions are never discovered.

use crate::node::WorkerId;
use crate::process::Pid;
use crate::result::{CovError, CovResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Tag scoping the subprocess data files of one session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionTag(String);

impl SessionTag {
    /// Fresh tag for a new session
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Tag as text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<base>.<tag>`, the base of this session's subprocess files
    #[must_use]
    pub fn scope(&self, base: &Path) -> PathBuf {
        with_suffix(base, &self.0)
    }

    /// `<base>.<tag>.<worker>`, the base of one worker's subprocess files
    #[must_use]
    pub fn worker_scope(&self, base: &Path, worker: &WorkerId) -> PathBuf {
        with_suffix(&self.scope(base), &sanitize(worker.as_str()))
    }
}

impl fmt::Display for SessionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique name of one process's data file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataFileName {
    base: PathBuf,
    label: String,
    pid: Pid,
}

impl DataFileName {
    /// Data file of a distributed worker
    #[must_use]
    pub fn for_worker(base: &Path, worker: &WorkerId, pid: Pid) -> Self {
        Self {
            base: base.to_path_buf(),
            label: sanitize(worker.as_str()),
            pid,
        }
    }

    /// Data file of a subprocess on this host
    #[must_use]
    pub fn for_process(base: &Path, pid: Pid) -> Self {
        Self {
            base: base.to_path_buf(),
            label: sanitize(&host_name()),
            pid,
        }
    }

    /// Base data file this name derives from
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Label segment
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Process id segment
    #[must_use]
    pub const fn pid(&self) -> Pid {
        self.pid
    }

    /// Full path of the data file
    #[must_use]
    pub fn path(&self) -> PathBuf {
        with_suffix(&self.base, &format!("{}.{}", self.label, self.pid))
    }
}

impl fmt::Display for DataFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

/// Name of this host, `localhost` when it cannot be determined
#[must_use]
pub fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Find every suffixed data file next to `base`, in path order
pub fn discover(base: &Path) -> CovResult<Vec<PathBuf>> {
    let pattern = format!("{}.*", glob::Pattern::escape(&base.to_string_lossy()));
    let entries =
        glob::glob(&pattern).map_err(|e| CovError::config(format!("bad data file path: {e}")))?;

    let mut found: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .collect();
    found.sort();
    debug!(base = %base.display(), count = found.len(), "discovered suffixed data files");
    Ok(found)
}

/// Whether `path` is a suffixed name derived from `base`
#[must_use]
pub fn derives_from(path: &Path, base: &Path) -> bool {
    let prefix = with_suffix(base, "");
    path.as_os_str()
        .to_string_lossy()
        .starts_with(&*prefix.as_os_str().to_string_lossy())
}

/// Absolute, symlink-free form of `path` for comparing data file locations
///
/// Paths that do not exist are only made absolute.
#[must_use]
pub fn resolve(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        if path.is_relative() {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        } else {
            path.to_path_buf()
        }
    })
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
