//! Keyed latch cache: each library bundle is unpacked at most once per session.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use trellis_util::fs::canonical_key;
use trellis_util::hash::composite_digest;

use crate::error::EngineError;

/// Identity of one unpack operation: bundle file plus destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnpackKey(String);

impl UnpackKey {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Key for unpacking `bundle` into `dest`. Paths are canonicalized
    /// when they exist, so two spellings of one file share a key.
    pub fn for_bundle(bundle: &Path, dest: &Path) -> Self {
        let digest = composite_digest(&[&canonical_key(bundle), &canonical_key(dest)]);
        let short = digest.get(..12).unwrap_or(&digest);
        let name = bundle
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self(format!("{name}#{short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnpackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a caller's request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpackOutcome {
    /// This caller ran the unpack.
    Unpacked,
    /// Another caller ran it, or had already.
    Reused,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Single-use latch holding the outcome of one unpack.
struct Latch {
    outcome: Mutex<Option<Result<(), String>>>,
    ready: Condvar,
}

impl Latch {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn complete(&self, result: Result<(), String>) {
        let mut outcome = self.outcome.lock();
        if outcome.is_none() {
            *outcome = Some(result);
        }
        self.ready.notify_all();
    }

    fn wait(&self) -> Result<(), String> {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            self.ready.wait(&mut outcome);
        }
    }
}

/// Completes the latch with a failure if the unpack body unwinds.
struct CompletionGuard<'a> {
    latch: &'a Latch,
    completed: bool,
}

impl<'a> CompletionGuard<'a> {
    fn new(latch: &'a Latch) -> Self {
        Self {
            latch,
            completed: false,
        }
    }

    fn complete(mut self, result: Result<(), String>) {
        self.latch.complete(result);
        self.completed = true;
    }
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.latch
                .complete(Err("unpack was interrupted before completing".to_owned()));
        }
    }
}

/// Session-wide unpack cache.
///
/// The map lock is held only while looking up or inserting a latch. Unpack
/// bodies run outside it, so distinct keys unpack in parallel.
#[derive(Default)]
pub struct SharedArtifactCache {
    entries: Mutex<HashMap<UnpackKey, Arc<Latch>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SharedArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `unpack` for `key` unless some caller already has.
    ///
    /// The first caller runs `unpack` and gets its result back. Every other
    /// caller blocks until that run finishes and observes its outcome.
    ///
    /// # Errors
    /// The first caller receives the error returned by `unpack`. Later
    /// callers receive `EngineError::UnpackFailed` carrying its message.
    pub fn acquire_unpack<F>(&self, key: &UnpackKey, unpack: F) -> Result<UnpackOutcome, EngineError>
    where
        F: FnOnce() -> Result<(), EngineError>,
    {
        let (latch, owner) = {
            let mut entries = self.entries.lock();
            match entries.entry(key.clone()) {
                Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
                Entry::Vacant(entry) => {
                    let latch = Arc::new(Latch::new());
                    entry.insert(Arc::clone(&latch));
                    (latch, true)
                }
            }
        };

        if owner {
            self.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("unpacking {key}");
            let guard = CompletionGuard::new(&latch);
            let result = unpack();
            guard.complete(result.as_ref().map(|_| ()).map_err(ToString::to_string));
            return result.map(|()| UnpackOutcome::Unpacked);
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        latch
            .wait()
            .map(|()| UnpackOutcome::Reused)
            .map_err(|message| EngineError::UnpackFailed {
                key: key.to_string(),
                message,
            })
    }

    /// Forget every entry and zero the counters.
    pub fn reset(&self) {
        self.entries.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().len(),
        }
    }
}
