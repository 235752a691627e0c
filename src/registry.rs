// 🗂️ ATM Registry - the live, lock-protected ATM collection
//
// One lock guards the collection. Readers get an `Arc` snapshot and compute
// without holding the lock; writers replace or copy-on-write the whole Vec,
// so a snapshot always reflects either the full pre- or post-mutation state.
//
// Two views are kept under that lock:
//   live    - what readers and the analyzer see
//   durable - reconciled baseline + explicit changes; the only view persisted
// Simulated churn (transient status flips and insertions) touches `live` only.

use crate::entities::{AtmRecord, AtmStatus};
use crate::error::{AtmError, AtmResult};
use crate::reconciliation::{CatalogReconciler, ReconciliationReport};
use crate::store::AtmStore;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

/// Immutable view of the registry at one point in time
pub type RegistrySnapshot = Arc<Vec<AtmRecord>>;

#[derive(Debug, Default)]
struct RegistryState {
    live: RegistrySnapshot,
    durable: Vec<AtmRecord>,
}

pub struct AtmRegistry {
    state: RwLock<RegistryState>,
    store: Arc<dyn AtmStore>,
    reconciler: CatalogReconciler,
    // Serializes persist() so an older view never overwrites a newer one
    save_gate: Mutex<()>,
}

impl AtmRegistry {
    /// Empty registry; call `reload` to populate it
    pub fn new(store: Arc<dyn AtmStore>, reconciler: CatalogReconciler) -> Self {
        AtmRegistry {
            state: RwLock::new(RegistryState::default()),
            store,
            reconciler,
            save_gate: Mutex::new(()),
        }
    }

    /// Registry loaded from `store`, reconciled against the reference catalog
    pub fn load(store: Arc<dyn AtmStore>) -> (Self, ReconciliationReport) {
        let registry = Self::new(store, CatalogReconciler::with_reference_catalog());
        let report = registry.reload();
        (registry, report)
    }

    // The collection is only ever replaced whole or mutated through
    // `Arc::make_mut`, so a poisoned guard still holds a consistent value.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Re-run reconciliation against the latest persisted snapshot and swap
    /// it in atomically
    ///
    /// Storage errors degrade to "reference catalog only". The store is read
    /// and reconciled before the lock is taken; only the swap holds it.
    pub fn reload(&self) -> ReconciliationReport {
        let persisted = match self.store.load() {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "Could not load persisted ATMs, using reference catalog only");
                Vec::new()
            }
        };

        let report = self.reconciler.reconcile(&persisted);
        for rejected in &report.rejected {
            warn!(
                index = rejected.index,
                atm_id = %rejected.id,
                reason = %rejected.reason,
                "Skipping malformed persisted ATM"
            );
        }
        if report.dropped_without_identity > 0 {
            debug!(count = report.dropped_without_identity, "Dropped persisted ATMs without identity");
        }

        {
            let mut state = self.write();
            state.live = Arc::new(report.records.clone());
            state.durable = report.records.clone();
        }
        info!(summary = %report.summary(), "Registry reloaded");

        report
    }

    /// Add `record`, or replace the record with the same id
    ///
    /// Explicit change: lands in both the live and the persisted view.
    /// Returns the replaced live record, if any.
    pub fn insert_or_replace(&self, record: AtmRecord) -> AtmResult<Option<AtmRecord>> {
        record.validate()?;

        let mut guard = self.write();
        let state = &mut *guard;

        match state.durable.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => state.durable.push(record.clone()),
        }

        let live = Arc::make_mut(&mut state.live);
        match live.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => Ok(Some(std::mem::replace(existing, record))),
            None => {
                live.push(record);
                Ok(None)
            }
        }
    }

    /// Add `record` to the live view only if its id is not yet present
    ///
    /// Transient: never persisted.
    pub fn insert_transient(&self, record: AtmRecord) -> AtmResult<bool> {
        record.validate()?;

        let mut state = self.write();
        if state.live.iter().any(|r| r.id == record.id) {
            return Ok(false);
        }
        Arc::make_mut(&mut state.live).push(record);
        Ok(true)
    }

    /// Change the status of one ATM, returning its previous status
    ///
    /// Explicit change: lands in both views.
    pub fn set_status(&self, id: &str, status: AtmStatus) -> AtmResult<AtmStatus> {
        let mut guard = self.write();
        let state = &mut *guard;

        let atm = Arc::make_mut(&mut state.live)
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AtmError::UnknownAtm(id.to_string()))?;
        let previous = std::mem::replace(&mut atm.status, status);

        if let Some(durable) = state.durable.iter_mut().find(|r| r.id == id) {
            durable.status = status;
        }

        Ok(previous)
    }

    /// Decide and apply transient status changes in one write section
    ///
    /// `decide` sees each live record as it currently is and returns its new
    /// status, if any. Returns the changes applied, in registry order.
    pub fn update_statuses<F>(&self, mut decide: F) -> Vec<(String, AtmStatus)>
    where
        F: FnMut(&AtmRecord) -> Option<AtmStatus>,
    {
        let mut state = self.write();

        let changes: Vec<(usize, AtmStatus)> = state
            .live
            .iter()
            .enumerate()
            .filter_map(|(i, atm)| match decide(atm) {
                Some(status) if status != atm.status => Some((i, status)),
                _ => None,
            })
            .collect();

        if changes.is_empty() {
            return Vec::new();
        }

        let live = Arc::make_mut(&mut state.live);
        changes
            .into_iter()
            .map(|(i, status)| {
                live[i].status = status;
                (live[i].id.clone(), status)
            })
            .collect()
    }

    /// Consistent, immutable view of the current collection
    pub fn snapshot(&self) -> RegistrySnapshot {
        Arc::clone(&self.read().live)
    }

    pub fn get(&self, id: &str) -> Option<AtmRecord> {
        self.read().live.iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().live.is_empty()
    }

    /// Records `persist` would write: baseline plus explicit changes
    pub fn durable_records(&self) -> Vec<AtmRecord> {
        self.read().durable.clone()
    }

    /// Write the durable view back to the store
    pub fn persist(&self) -> AtmResult<()> {
        let _gate = self.save_gate.lock().unwrap_or_else(|e| e.into_inner());
        let records = self.durable_records();
        self.store.save(&records)
    }

    pub fn catalog(&self) -> &[AtmRecord] {
        self.reconciler.catalog()
    }
}

// ============================================================================
// TESTS
// ============================================================================
