//! Per-fingerprint single-flight gate.
//!
//! The backing store has no conditional write, so collapsing concurrent misses
//! for one prompt is only possible inside a single process. Holders of the gate
//! for a fingerprint run one at a time; later holders re-read the store and find
//! the artifact the first one wrote.

use super::key::Fingerprint;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::OwnedMutexGuard;

type Slot = tokio::sync::Mutex<()>;

#[derive(Default)]
pub(crate) struct InflightGate {
    slots: Mutex<HashMap<Fingerprint, Weak<Slot>>>,
}

/// Held for the duration of one get-or-generate pass.
pub(crate) struct InflightGuard {
    _guard: OwnedMutexGuard<()>,
}

impl InflightGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn acquire(&self, fp: &Fingerprint) -> InflightGuard {
        let slot = {
            // the map only holds weak pointers, so a poisoned lock is still consistent
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.retain(|_, w| w.strong_count() > 0);
            match slots.get(fp).and_then(Weak::upgrade) {
                Some(slot) => slot,
                None => {
                    let slot = Arc::new(Slot::new(()));
                    slots.insert(fp.clone(), Arc::downgrade(&slot));
                    slot
                }
            }
        };
        InflightGuard {
            _guard: slot.lock_owned().await,
        }
    }

    /// Fingerprints with at least one holder or waiter.
    pub(crate) fn active(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.values().filter(|w| w.strong_count() > 0).count()
    }
}
