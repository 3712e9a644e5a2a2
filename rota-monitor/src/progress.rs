//! Validation progress registry.
//!
//! Active validations live in an indexed table; callers hold integer
//! handles, never references into the validator. Cancellation flips an
//! atomic flag that the batch loop polls between batches.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub type ValidationId = u64;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub validation_id: ValidationId,
    pub total: usize,
    pub processed: usize,
    pub compliant: usize,
    pub violations: usize,
    pub errors: usize,
    pub elapsed_sec: f64,
    /// Linear extrapolation from the average per-employee time so far.
    pub eta_sec: Option<f64>,
    pub cancelled: bool,
    pub finished: bool,
}

#[derive(Debug)]
pub struct ValidationSlot {
    cancel: AtomicBool,
    progress: RwLock<ProgressUpdate>,
}

impl ValidationSlot {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ProgressUpdate {
        self.progress.read().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut ProgressUpdate)) {
        let mut progress = self.progress.write();
        f(&mut progress);
    }
}

#[derive(Debug, Default)]
pub struct ValidationRegistry {
    slots: RwLock<HashMap<ValidationId, Arc<ValidationSlot>>>,
    next_id: AtomicU64,
}

impl ValidationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, total: usize) -> (ValidationId, Arc<ValidationSlot>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let slot = Arc::new(ValidationSlot {
            cancel: AtomicBool::new(false),
            progress: RwLock::new(ProgressUpdate {
                validation_id: id,
                total,
                ..Default::default()
            }),
        });
        self.slots.write().insert(id, slot.clone());
        (id, slot)
    }

    /// Request cancellation; in-flight batches finish, nothing further is
    /// scheduled. Returns false for unknown or finished validations.
    pub fn cancel(&self, id: ValidationId) -> bool {
        match self.slots.read().get(&id) {
            Some(slot) if !slot.snapshot().finished => {
                slot.cancel.store(true, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    pub fn progress(&self, id: ValidationId) -> Option<ProgressUpdate> {
        self.slots.read().get(&id).map(|s| s.snapshot())
    }

    /// Drop a finished validation's slot.
    pub fn remove(&self, id: ValidationId) {
        self.slots.write().remove(&id);
    }

    pub fn active_count(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|s| !s.snapshot().finished)
            .count()
    }
}
