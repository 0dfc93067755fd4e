//! Outbound queue: pending updates and removes awaiting the next flush.
//!
//! Both sides are sets keyed by record identity, so a record submitted N
//! times between flushes is encoded once. A remove drops the record's
//! pending update for the same type; should an update land again afterwards,
//! updates are encoded before removes in the fused frame, so the remote's
//! terminal state for a record present in both sets is always "removed".

use std::collections::{HashMap, HashSet};

use shardsync_core::{RecordIdentity, RecordRef};

/// Insertion-ordered set of records keyed by allocation identity.
#[derive(Default)]
struct RecordSet {
    order: Vec<RecordRef>,
    seen: HashSet<RecordIdentity>,
}

impl RecordSet {
    /// Insert `record`, returning `false` if it was already pending.
    fn insert(&mut self, record: RecordRef) -> bool {
        if self.seen.insert(RecordIdentity::of(&record)) {
            self.order.push(record);
            true
        } else {
            false
        }
    }

    fn remove(&mut self, identity: RecordIdentity) -> bool {
        if self.seen.remove(&identity) {
            self.order.retain(|r| RecordIdentity::of(r) != identity);
            true
        } else {
            false
        }
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// One type's drained pending sets, in submission order.
pub(crate) struct DrainedType {
    pub name: String,
    pub updates: Vec<RecordRef>,
    pub removes: Vec<RecordRef>,
}

/// Pending outbound changes, keyed by type name.
#[derive(Default)]
pub(crate) struct OutboundQueue {
    updates: HashMap<String, RecordSet>,
    removes: HashMap<String, RecordSet>,
}

impl OutboundQueue {
    /// Queue an insert/update. Returns `false` when it coalesced into an
    /// already-pending entry.
    pub fn enqueue_update(&mut self, type_name: &str, record: RecordRef) -> bool {
        self.updates
            .entry(type_name.to_string())
            .or_default()
            .insert(record)
    }

    /// Queue a remove, dropping any pending update for the same record.
    pub fn enqueue_remove(&mut self, type_name: &str, record: RecordRef) -> bool {
        if let Some(pending) = self.updates.get_mut(type_name) {
            pending.remove(RecordIdentity::of(&record));
        }
        self.removes
            .entry(type_name.to_string())
            .or_default()
            .insert(record)
    }

    /// Drop everything pending for `type_name`.
    pub fn discard_type(&mut self, type_name: &str) {
        self.updates.remove(type_name);
        self.removes.remove(type_name);
    }

    pub fn is_empty(&self) -> bool {
        self.updates.values().all(RecordSet::is_empty)
            && self.removes.values().all(RecordSet::is_empty)
    }

    /// Swap both maps for fresh ones and return the previous contents as
    /// per-type batches, sorted by type name for a fixed flush order.
    pub fn drain(&mut self) -> Vec<DrainedType> {
        let mut updates = std::mem::take(&mut self.updates);
        let mut removes = std::mem::take(&mut self.removes);

        let mut names: Vec<String> = updates.keys().chain(removes.keys()).cloned().collect();
        names.sort_unstable();
        names.dedup();

        names
            .into_iter()
            .filter_map(|name| {
                let update_set = updates.remove(&name).unwrap_or_default();
                let remove_set = removes.remove(&name).unwrap_or_default();
                if update_set.is_empty() && remove_set.is_empty() {
                    return None;
                }
                Some(DrainedType {
                    name,
                    updates: update_set.order,
                    removes: remove_set.order,
                })
            })
            .collect()
    }
}
