//! Notify queue
//!
//! Changes made while processing a request are accumulated in a
//! [`NotifyQueue`] and flushed once. Entries are ordered by Object ID and
//! resource changes by `(IID, RID)`; queuing the same change twice leaves a
//! single record.

use std::collections::{btree_map, BTreeMap, BTreeSet};

use crate::ids::{Iid, Oid, Rid};

/// Instance-level changes of one Object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceSetChanges {
    /// Instances were added or removed (or possibly were)
    pub instance_set_changed: bool,
    /// Instances known to have been created
    pub known_added_iids: BTreeSet<Iid>,
}

/// Pending changes of one Object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyEntry {
    pub instance_set_changes: InstanceSetChanges,
    pub resources_changed: BTreeSet<(Iid, Rid)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyQueue {
    entries: BTreeMap<Oid, NotifyEntry>,
}

impl NotifyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, oid: Oid) -> &mut NotifyEntry {
        self.entries.entry(oid).or_default()
    }

    pub fn instance_created(&mut self, oid: Oid, iid: Iid) {
        let changes = &mut self.entry(oid).instance_set_changes;
        changes.instance_set_changed = true;
        changes.known_added_iids.insert(iid);
    }

    pub fn instance_removed(&mut self, oid: Oid, _iid: Iid) {
        self.instance_set_unknown_change(oid);
    }

    /// The set of instances of `oid` may have changed in an unspecified way
    pub fn instance_set_unknown_change(&mut self, oid: Oid) {
        self.entry(oid).instance_set_changes.instance_set_changed = true;
    }

    pub fn resource_change(&mut self, oid: Oid, iid: Iid, rid: Rid) {
        self.entry(oid).resources_changed.insert((iid, rid));
    }

    /// Drop everything queued for `oid`
    pub fn remove_object(&mut self, oid: Oid) -> Option<NotifyEntry> {
        self.entries.remove(&oid)
    }

    pub fn get(&self, oid: Oid) -> Option<&NotifyEntry> {
        self.entries.get(&oid)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Oid, NotifyEntry> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any Object had its instance set changed
    pub fn any_instance_set_changed(&self) -> bool {
        self.entries
            .values()
            .any(|entry| entry.instance_set_changes.instance_set_changed)
    }

    pub fn take(&mut self) -> NotifyQueue {
        core::mem::take(self)
    }
}

impl<'a> IntoIterator for &'a NotifyQueue {
    type Item = (&'a Oid, &'a NotifyEntry);
    type IntoIter = btree_map::Iter<'a, Oid, NotifyEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
