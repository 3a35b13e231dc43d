//! Per-build state: the unpack cache and the prepare task registry.

use std::sync::Arc;

use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

use crate::bundle::{self, UnpackStatus};
use crate::cache::{SharedArtifactCache, UnpackOutcome};
use crate::error::EngineError;
use crate::prepare::{PrepareTask, PrepareTaskRegistry};

/// Result of running one prepare task.
#[derive(Debug)]
pub struct PrepareResult {
    pub task: String,
    pub outcome: Result<PrepareOutcome, EngineError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    Extracted,
    UpToDate,
    /// Another task of this session unpacked the same bundle.
    Reused,
}

/// Created at the start of a build and disposed at the end. Nothing in it
/// outlives the session.
#[derive(Default)]
pub struct BuildSession {
    cache: Arc<SharedArtifactCache>,
    prepare: PrepareTaskRegistry,
}

impl BuildSession {
    pub fn create() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &Arc<SharedArtifactCache> {
        &self.cache
    }

    pub fn prepare_registry(&self) -> &PrepareTaskRegistry {
        &self.prepare
    }

    pub fn prepare_registry_mut(&mut self) -> &mut PrepareTaskRegistry {
        &mut self.prepare
    }

    /// Run `tasks` on the rayon pool. Each bundle is unpacked at most once
    /// however many tasks name it. Results keep the order of `tasks`.
    pub fn run_prepare_tasks(&self, tasks: &[PrepareTask]) -> Vec<PrepareResult> {
        tasks
            .par_iter()
            .map(|task| PrepareResult {
                task: task.name.clone(),
                outcome: self.run_prepare_task(task),
            })
            .collect()
    }

    fn run_prepare_task(&self, task: &PrepareTask) -> Result<PrepareOutcome, EngineError> {
        let mut status = None;
        let outcome = self.cache.acquire_unpack(&task.unpack_key(), || {
            status = Some(bundle::unpack(task)?);
            Ok(())
        })?;
        Ok(match (outcome, status) {
            (UnpackOutcome::Reused, _) => PrepareOutcome::Reused,
            (UnpackOutcome::Unpacked, Some(UnpackStatus::UpToDate)) => PrepareOutcome::UpToDate,
            (UnpackOutcome::Unpacked, _) => PrepareOutcome::Extracted,
        })
    }

    /// End the session, clearing the cache and the registry.
    pub fn dispose(mut self) {
        let stats = self.cache.stats();
        tracing::debug!(
            "disposing session: {} unpack(s), {} reuse(s)",
            stats.misses,
            stats.hits
        );
        self.cache.reset();
        self.prepare.unload();
    }
}
