//! Get-or-load store for decoded signals.
//!
//! Entries are grouped by [`ScopeKey`]: one global slot in single-user mode,
//! one slot per user otherwise. Each slot holds at most one file. Every slot
//! owns a mutex that is held across the whole load-and-install sequence, so
//! concurrent misses on the same scope collapse into a single decode and the
//! later callers observe a hit.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use parking_lot::Mutex;
use serde::Serialize;

use crate::data::loader::{SignalLoader, SignalSource};
use crate::data::model::Signal;
use crate::error::{EngineError, Result};

/// Default ceiling on tracked scopes in multi-user mode.
pub const DEFAULT_MAX_SCOPES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    /// Legacy single-user slot.
    Global,
    /// Sanitized user id.
    User(String),
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Global => write!(f, "<global>"),
            ScopeKey::User(id) => write!(f, "user:{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOutcome {
    Hit,
    Miss,
}

/// One loaded file. Never mutated; a new load always builds a new entry.
#[derive(Debug)]
pub struct CacheEntry {
    pub scope: ScopeKey,
    pub path: PathBuf,
    pub signals: Vec<Arc<Signal>>,
    pub loaded_at: Instant,
}

impl CacheEntry {
    pub fn signal(&self, index: usize) -> Result<Arc<Signal>> {
        self.signals
            .get(index)
            .cloned()
            .ok_or_else(|| EngineError::Index {
                path: self.path.clone(),
                index,
                count: self.signals.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// Result of [`SignalCache::get_or_load`].
#[derive(Debug, Clone)]
pub struct Lookup {
    pub entry: Arc<CacheEntry>,
    pub outcome: CacheOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Successful decodes; failed loads count as misses only.
    pub loads: u64,
    pub evictions: u64,
    pub scopes: usize,
}

struct Slot {
    admitted: u64,
    created_at: Instant,
    entry: Mutex<Option<Arc<CacheEntry>>>,
}

pub struct SignalCache<S: SignalSource = SignalLoader> {
    source: S,
    max_scopes: usize,
    slots: Mutex<HashMap<ScopeKey, Arc<Slot>>>,
    admissions: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    evictions: AtomicU64,
}

impl<S: SignalSource> SignalCache<S> {
    /// Cache tracking at most `max_scopes` scopes (minimum 1).
    pub fn new(source: S, max_scopes: usize) -> Self {
        Self {
            source,
            max_scopes: max_scopes.max(1),
            slots: Mutex::new(HashMap::new()),
            admissions: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Legacy mode: a single entry, replaced on every file switch.
    pub fn single_user(source: S) -> Self {
        Self::new(source, 1)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Return the cached signals for `path` in `scope`, decoding on a miss.
    ///
    /// A miss replaces whatever file the scope held before. A failed load
    /// leaves the cache as it was.
    pub fn get_or_load(&self, scope: &ScopeKey, path: &Path) -> Result<Lookup> {
        let slot = self.slot_for(scope);
        let mut current = slot.entry.lock();

        if let Some(entry) = current.as_ref() {
            if entry.path == path {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {} in {scope}", path.display());
                return Ok(Lookup {
                    entry: Arc::clone(entry),
                    outcome: CacheOutcome::Hit,
                });
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Cache miss for {} in {scope}", path.display());

        let signals = match self.source.load(path) {
            Ok(signals) => signals,
            Err(err) => {
                let vacant = current.is_none();
                drop(current);
                if vacant {
                    self.discard_vacant(scope, &slot);
                }
                return Err(err);
            }
        };
        self.loads.fetch_add(1, Ordering::Relaxed);

        let entry = Arc::new(CacheEntry {
            scope: scope.clone(),
            path: path.to_path_buf(),
            signals: signals.into_iter().map(Arc::new).collect(),
            loaded_at: Instant::now(),
        });

        if let Some(previous) = current.replace(Arc::clone(&entry)) {
            info!(
                "Replacing cached {} with {} in {scope}",
                previous.path.display(),
                path.display()
            );
            // Release our reference now; the arrays go once readers finish.
            drop(previous);
        }

        Ok(Lookup {
            entry,
            outcome: CacheOutcome::Miss,
        })
    }

    /// Single signal at `index`, or [`EngineError::Index`].
    pub fn get_signal(&self, scope: &ScopeKey, path: &Path, index: usize) -> Result<Arc<Signal>> {
        self.get_or_load(scope, path)?.entry.signal(index)
    }

    /// Drop one scope. Returns whether it was tracked.
    pub fn evict(&self, scope: &ScopeKey) -> bool {
        let removed = self.slots.lock().remove(scope).is_some();
        if removed {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            info!("Evicted {scope}");
        }
        removed
    }

    /// Drop scopes created at least `max_age` ago. Returns how many went.
    pub fn evict_expired(&self, max_age: Duration) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|scope, slot| {
            let keep = slot.created_at.elapsed() < max_age;
            if !keep {
                info!("Session {scope} expired");
            }
            keep
        });
        let removed = before - slots.len();
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn clear(&self) {
        let mut slots = self.slots.lock();
        self.evictions
            .fetch_add(slots.len() as u64, Ordering::Relaxed);
        slots.clear();
    }

    /// Number of loaded entries. A scope whose first load is still in
    /// flight is not counted.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.entry.try_lock().is_some_and(|e| e.is_some()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path currently cached for `scope`, if any. Waits for an in-flight load.
    pub fn cached_path(&self, scope: &ScopeKey) -> Option<PathBuf> {
        let slot = self.slots.lock().get(scope).cloned()?;
        let entry = slot.entry.lock();
        entry.as_ref().map(|e| e.path.clone())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            scopes: self.slots.lock().len(),
        }
    }

    /// Fetch or admit the slot for `scope`, evicting the oldest admitted
    /// scope when the ceiling is reached.
    fn slot_for(&self, scope: &ScopeKey) -> Arc<Slot> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(scope) {
            return Arc::clone(slot);
        }

        while slots.len() >= self.max_scopes {
            let oldest = slots
                .iter()
                .min_by_key(|(_, slot)| slot.admitted)
                .map(|(key, _)| key.clone());
            let Some(oldest) = oldest else { break };
            slots.remove(&oldest);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            info!("Scope limit ({}) reached, evicted {oldest}", self.max_scopes);
        }

        let slot = Arc::new(Slot {
            admitted: self.admissions.fetch_add(1, Ordering::Relaxed),
            created_at: Instant::now(),
            entry: Mutex::new(None),
        });
        slots.insert(scope.clone(), Arc::clone(&slot));
        slot
    }

    /// Remove a slot admitted for a load that failed, unless another caller
    /// has started using it.
    fn discard_vacant(&self, scope: &ScopeKey, slot: &Arc<Slot>) {
        let mut slots = self.slots.lock();
        let same = slots.get(scope).is_some_and(|s| Arc::ptr_eq(s, slot));
        let vacant = slot.entry.try_lock().is_some_and(|e| e.is_none());
        if same && vacant {
            slots.remove(scope);
        }
    }
}
