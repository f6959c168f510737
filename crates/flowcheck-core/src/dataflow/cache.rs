//! CFG and analysis result caches
//!
//! The CFG cache holds exactly one graph. Installing a new graph first purges
//! every cached analysis result, so a result is only ever served for the
//! resident CFG.

use super::builder::build_cfg;
use super::cfg::{Cfg, CfgId};
use super::fragment::Fragment;
use super::solver::{AnalysisResult, FixpointSolver, ForwardTransferFunction};
use crate::env::ProgramEnv;
use crate::error::{DataflowError, DataflowResult};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Counters shared by both caches
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    cfg_builds: AtomicUsize,
    cfg_hits: AtomicUsize,
    cfg_evictions: AtomicUsize,
    build_failures: AtomicUsize,
    analysis_runs: AtomicUsize,
    analysis_hits: AtomicUsize,
    analysis_purges: AtomicUsize,
}

impl CacheCounters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            cfg_builds: self.cfg_builds.load(Ordering::Relaxed),
            cfg_hits: self.cfg_hits.load(Ordering::Relaxed),
            cfg_evictions: self.cfg_evictions.load(Ordering::Relaxed),
            build_failures: self.build_failures.load(Ordering::Relaxed),
            analysis_runs: self.analysis_runs.load(Ordering::Relaxed),
            analysis_hits: self.analysis_hits.load(Ordering::Relaxed),
            analysis_purges: self.analysis_purges.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    pub cfg_builds: usize,
    pub cfg_hits: usize,
    pub cfg_evictions: usize,
    pub build_failures: usize,
    pub analysis_runs: usize,
    pub analysis_hits: usize,
    /// Cached results discarded because their CFG was evicted
    pub analysis_purges: usize,
}

// ============================================================================
// Analysis keys
// ============================================================================

/// Object-safe equality and hashing for transfer functions used as keys
trait TransferKey: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn TransferKey) -> bool;
    fn dyn_hash(&self, state: &mut dyn Hasher);
}

impl<T> TransferKey for T
where
    T: Eq + Hash + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn TransferKey) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|other| self == other)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        std::any::TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }
}

/// (transfer function by value, CFG identity)
#[derive(Clone)]
struct AnalysisKey {
    transfer: Arc<dyn TransferKey>,
    cfg: CfgId,
}

impl PartialEq for AnalysisKey {
    fn eq(&self, other: &Self) -> bool {
        self.cfg == other.cfg && self.transfer.dyn_eq(other.transfer.as_ref())
    }
}

impl Eq for AnalysisKey {}

impl Hash for AnalysisKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cfg.hash(state);
        self.transfer.dyn_hash(state);
    }
}

type ErasedResult = Arc<dyn Any + Send + Sync>;

/// One cached analysis; the lock is held while the result is computed so
/// identical concurrent requests wait instead of recomputing
#[derive(Default)]
struct AnalysisSlot {
    result: Mutex<Option<ErasedResult>>,
}

#[derive(Default)]
struct AnalysisState {
    /// CFG whose results may be stored
    resident: Option<CfgId>,
    slots: HashMap<AnalysisKey, Arc<AnalysisSlot>>,
}

/// Memoized analysis results for the resident CFG
#[derive(Default)]
pub struct AnalysisCache {
    state: Mutex<AnalysisState>,
    counters: Arc<CacheCounters>,
}

impl AnalysisCache {
    pub(crate) fn with_counters(counters: Arc<CacheCounters>) -> Self {
        Self {
            state: Mutex::new(AnalysisState::default()),
            counters,
        }
    }

    /// Cached result of `tf` over `cfg`, computing it on a miss
    pub fn get_or_run<T>(
        &self,
        cfg: &Arc<Cfg>,
        tf: &T,
        solver: &FixpointSolver,
    ) -> DataflowResult<Arc<AnalysisResult<T::Value, T::Store>>>
    where
        T: ForwardTransferFunction + Clone + Eq + Hash + Send + Sync + 'static,
        T::Value: Send + Sync + 'static,
        T::Store: Send + Sync + 'static,
    {
        let key = AnalysisKey {
            transfer: Arc::new(tf.clone()),
            cfg: cfg.id(),
        };

        let slot = {
            let mut state = self.state.lock();
            if state.resident != Some(cfg.id()) {
                drop(state);
                // Superseded while the caller held it: answer without caching
                debug!(cfg = %cfg.id(), "cfg is not resident, running analysis uncached");
                CacheCounters::bump(&self.counters.analysis_runs);
                let result = solver.solve(cfg, tf, tf.initial_store(cfg))?;
                return Ok(Arc::new(result));
            }
            Arc::clone(state.slots.entry(key.clone()).or_default())
        };

        let mut guard = slot.result.lock();
        if let Some(existing) = guard.as_ref() {
            CacheCounters::bump(&self.counters.analysis_hits);
            return downcast(Arc::clone(existing));
        }

        debug!(cfg = %cfg.id(), fragment = cfg.label(), "running dataflow analysis");
        CacheCounters::bump(&self.counters.analysis_runs);
        match solver.solve(cfg, tf, tf.initial_store(cfg)) {
            Ok(result) => {
                let result = Arc::new(result);
                *guard = Some(Arc::clone(&result) as ErasedResult);
                Ok(result)
            }
            Err(err) => {
                drop(guard);
                self.forget(&key, &slot);
                Err(err)
            }
        }
    }

    /// Remove a slot left empty by a failed analysis
    ///
    /// A slot another thread is already solving stays; that thread either
    /// fills it or forgets it in turn. The slot lock is taken before the
    /// state lock and never waited on while `state` is held.
    fn forget(&self, key: &AnalysisKey, slot: &Arc<AnalysisSlot>) {
        let Some(result) = slot.result.try_lock() else {
            return;
        };
        if result.is_some() {
            return;
        }
        let mut state = self.state.lock();
        if state.slots.get(key).is_some_and(|existing| Arc::ptr_eq(existing, slot)) {
            state.slots.remove(key);
        }
    }

    /// Drop every result and forget the resident CFG
    pub fn invalidate_all(&self) {
        let mut state = self.state.lock();
        let purged = state.slots.len();
        state.slots.clear();
        state.resident = None;
        if purged > 0 {
            self.counters.analysis_purges.fetch_add(purged, Ordering::Relaxed);
            debug!(purged, "purged analysis results");
        }
    }

    fn bind(&self, cfg: CfgId) {
        self.state.lock().resident = Some(cfg);
    }

    /// Number of cached analyses, counting ones still being computed
    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn downcast<V, S>(erased: ErasedResult) -> DataflowResult<Arc<AnalysisResult<V, S>>>
where
    V: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    erased
        .downcast::<AnalysisResult<V, S>>()
        .map_err(|_| DataflowError::Internal("cached analysis result has an unexpected type".to_string()))
}

// ============================================================================
// CFG cache
// ============================================================================

struct Resident {
    key: Fragment,
    cfg: Arc<Cfg>,
}

/// Single-entry CFG cache keyed by fragment position
///
/// The environment is consulted by the builder on a miss and does not take
/// part in key equality.
#[derive(Default)]
pub struct CfgCache {
    slot: RwLock<Option<Resident>>,
    counters: Arc<CacheCounters>,
}

impl CfgCache {
    pub(crate) fn with_counters(counters: Arc<CacheCounters>) -> Self {
        Self {
            slot: RwLock::new(None),
            counters,
        }
    }

    /// The resident CFG for `fragment`, building (and evicting) on a miss
    pub fn get_or_build<E: ProgramEnv + ?Sized>(
        &self,
        fragment: &Fragment,
        env: &E,
        analyses: &AnalysisCache,
    ) -> DataflowResult<Arc<Cfg>> {
        if let Some(resident) = self.slot.read().as_ref() {
            if resident.key == *fragment {
                CacheCounters::bump(&self.counters.cfg_hits);
                return Ok(Arc::clone(&resident.cfg));
            }
        }

        let mut slot = self.slot.write();
        // Another thread may have installed it while we waited
        if let Some(resident) = slot.as_ref() {
            if resident.key == *fragment {
                CacheCounters::bump(&self.counters.cfg_hits);
                return Ok(Arc::clone(&resident.cfg));
            }
        }

        if let Some(evicted) = slot.take() {
            CacheCounters::bump(&self.counters.cfg_evictions);
            debug!(cfg = %evicted.cfg.id(), fragment = %evicted.key, "evicting cfg");
        }
        analyses.invalidate_all();

        let cfg = match build_cfg(fragment, env) {
            Ok(cfg) => Arc::new(cfg),
            Err(err) => {
                CacheCounters::bump(&self.counters.build_failures);
                debug!(fragment = %fragment, error = %err, "cfg construction failed");
                return Err(err);
            }
        };
        CacheCounters::bump(&self.counters.cfg_builds);
        debug!(cfg = %cfg.id(), fragment = %fragment, nodes = cfg.len(), "installed cfg");

        analyses.bind(cfg.id());
        *slot = Some(Resident {
            key: fragment.clone(),
            cfg: Arc::clone(&cfg),
        });
        Ok(cfg)
    }

    pub fn resident(&self) -> Option<Arc<Cfg>> {
        self.slot.read().as_ref().map(|r| Arc::clone(&r.cfg))
    }

    pub fn resident_fragment(&self) -> Option<Fragment> {
        self.slot.read().as_ref().map(|r| r.key.clone())
    }
}
