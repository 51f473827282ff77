//! Concurrent plan cache.
//!
//! One entry per query shape. The structural translation of a shape is
//! computed at most once, even when the first executions race. Finalized
//! plans hang off the shape entry, keyed by the nullness signature the
//! postprocessor reported (`Cacheability::nullness_key`). Plans whose text
//! depends on the bound values themselves are never retained.
//!
//! `max_entries` bounds both the shape entries and the finalized plans.
//! Once either is full, new ones are still produced for the caller but not
//! kept.

use crate::compiler::FinalizedPlan;
use crate::error::Result;
use crate::expression::SelectExpression;
use crate::postprocess::Cacheability;
use crate::query::ShapedQuery;
use crate::value::ParameterValues;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Cache entry for one query shape
#[derive(Debug, Default)]
pub struct ShapeEntry {
    translation: OnceCell<Arc<SelectExpression>>,
    cacheability: OnceCell<Cacheability>,
    plans: DashMap<Vec<bool>, Arc<FinalizedPlan>>,
    /// Whether the entry lives in the cache; detached entries hold no plans
    retained: bool,
}

impl ShapeEntry {
    /// The shape's structural translation, running `translate` only if no
    /// other caller has produced it yet. A failed translation is not
    /// retained.
    pub fn translation<F>(&self, translate: F) -> Result<Arc<SelectExpression>>
    where
        F: FnOnce() -> Result<SelectExpression>,
    {
        self.translation
            .get_or_try_init(|| translate().map(Arc::new))
            .map(Arc::clone)
    }

    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }

    pub fn is_retained(&self) -> bool {
        self.retained
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanCacheStats {
    pub shapes: usize,
    pub plans: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
pub struct PlanCache {
    shapes: DashMap<Arc<ShapedQuery>, Arc<ShapeEntry>>,
    max_entries: usize,
    shape_count: AtomicUsize,
    plans: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PlanCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            shapes: DashMap::new(),
            max_entries,
            shape_count: AtomicUsize::new(0),
            plans: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Entry for `shape`, created on first use. When the cache already
    /// holds `max_entries` shapes the entry is detached: usable for one
    /// compilation, never stored.
    pub fn shape_entry(&self, shape: &ShapedQuery) -> Arc<ShapeEntry> {
        if let Some(entry) = self.shapes.get(shape) {
            return Arc::clone(entry.value());
        }
        if !reserve(&self.shape_count, self.max_entries) {
            debug!(max_entries = self.max_entries, "Shape cache full, translation not retained");
            return Arc::new(ShapeEntry::default());
        }
        match self.shapes.entry(Arc::new(shape.clone())) {
            Entry::Occupied(existing) => {
                // Another thread inserted the shape in the meantime.
                self.shape_count.fetch_sub(1, Ordering::AcqRel);
                Arc::clone(existing.get())
            }
            Entry::Vacant(vacant) => {
                let entry = Arc::new(ShapeEntry {
                    retained: true,
                    ..ShapeEntry::default()
                });
                vacant.insert(Arc::clone(&entry));
                entry
            }
        }
    }

    /// Previously finalized plan reusable for `values`
    pub fn lookup(&self, entry: &ShapeEntry, values: &ParameterValues) -> Option<Arc<FinalizedPlan>> {
        let plan = entry
            .cacheability
            .get()
            .and_then(|cacheability| cacheability.nullness_key(values))
            .and_then(|key| entry.plans.get(&key).map(|plan| Arc::clone(plan.value())));

        match &plan {
            Some(plan) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(cacheability = ?plan.cacheability, "Plan cache hit");
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Plan cache miss");
            }
        }
        plan
    }

    /// Retain `plan` for later executions with the same nullness signature.
    /// Returns whether the plan was stored.
    pub fn store(&self, entry: &ShapeEntry, plan: &Arc<FinalizedPlan>, values: &ParameterValues) -> bool {
        if !entry.retained {
            return false;
        }
        let Some(key) = plan.cacheability.nullness_key(values) else {
            debug!("Plan depends on bound values, not cached");
            return false;
        };
        let recorded = entry.cacheability.get_or_init(|| plan.cacheability.clone());
        if recorded != &plan.cacheability {
            debug!(
                recorded = ?recorded,
                reported = ?plan.cacheability,
                "Plan cacheability differs from the shape's, not cached"
            );
            return false;
        }
        if entry.plans.contains_key(&key) {
            return true;
        }

        if !reserve(&self.plans, self.max_entries) {
            debug!(max_entries = self.max_entries, "Plan cache full, plan not retained");
            return false;
        }
        if entry.plans.insert(key, Arc::clone(plan)).is_some() {
            // Another thread stored the same key in the meantime.
            self.plans.fetch_sub(1, Ordering::AcqRel);
        }
        true
    }

    pub fn stats(&self) -> PlanCacheStats {
        PlanCacheStats {
            shapes: self.shapes.len(),
            plans: self.plans.load(Ordering::Acquire),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.shapes.clear();
        self.shape_count.store(0, Ordering::Release);
        self.plans.store(0, Ordering::Release);
    }
}

/// Take one slot of `counter` if it is below `limit`
fn reserve(counter: &AtomicUsize, limit: usize) -> bool {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
            (count < limit).then_some(count + 1)
        })
        .is_ok()
}
