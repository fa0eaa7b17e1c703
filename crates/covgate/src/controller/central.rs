//! Single-process topology

use crate::datafile::{discover, SessionTag};
use crate::engine::{CoverageEngine, EngineSettings};
use crate::result::CovResult;

pub(super) fn start_engine<E: CoverageEngine>(settings: EngineSettings) -> CovResult<E> {
    let mut engine = E::create(settings)?;
    engine.start()?;
    Ok(engine)
}

/// Merge the suffixed files left by this session's subprocesses
pub(super) fn combine<E: CoverageEngine>(
    engine: &mut E,
    session: &SessionTag,
) -> CovResult<usize> {
    let found = discover(&session.scope(&engine.settings().config.data_file))?;
    engine.combine(&found)
}
