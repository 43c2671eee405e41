//! Access Control synchronization
//!
//! # Purpose
//! Keeps the Access Control Object consistent with the rest of the data
//! model whenever a notify queue is flushed:
//! 1. removes AC instances whose target no longer exists (or that
//!    duplicate another AC instance's target),
//! 2. strips ACL entries of servers that are gone; an AC instance left
//!    with an empty ACL is removed together with its target, otherwise a
//!    new owner is elected if the old one was stripped,
//! 3. creates AC instances for instances created by an LwM2M Server,
//! 4. reports ACL changes as instance set changes of the target Objects.
//!
//! The steps run in this order inside one nested transaction; the first
//! failure skips the remaining ones and rolls the transaction back.
//!
//! # Re-entrancy
//! The changes made here are flushed through
//! [`DataModel::notify_perform`], which calls back into this engine; that
//! nested call does nothing.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, error, info, trace};

use super::{
    elect_instance_owner, find_ac_instance_by_target, read_ac_target, read_acl, read_owner,
    valid_ssids, AccessMask, AclEntry,
};
use crate::dm::DataModel;
use crate::error::{DmError, Result};
use crate::ids::{oid, rid, Iid, Oid, Ssid, UriPath, ID_INVALID, SSID_ANY, SSID_BOOTSTRAP};
use crate::io::{write_resource, Value};
use crate::iterate::instance_ids;
use crate::notify::NotifyQueue;
use crate::object::{DmObject, ResourceKind};
use crate::path::{instance_present, resource_kind_and_presence, select_free_iid};

/// What a notify queue may imply for the Access Control Object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncChanges {
    pub might_have_orphans: bool,
    pub might_have_removes: bool,
    pub have_adds: bool,
}

/// Classify the changes recorded in `queue`
pub fn what_changed(origin: Ssid, queue: &NotifyQueue) -> SyncChanges {
    let mut changes = SyncChanges::default();
    for (&changed_oid, entry) in queue {
        let instances = &entry.instance_set_changes;
        if !instances.instance_set_changed {
            continue;
        }
        match changed_oid {
            oid::SECURITY | oid::ACCESS_CONTROL => changes.might_have_orphans = true,
            oid::SERVER => {
                changes.might_have_orphans = true;
                changes.might_have_removes = true;
            }
            _ => changes.might_have_removes = true,
        }
        if changed_oid != oid::SECURITY
            && changed_oid != oid::ACCESS_CONTROL
            && !instances.known_added_iids.is_empty()
        {
            if origin == SSID_BOOTSTRAP {
                // the Bootstrap Server manages AC instances on its own
                changes.might_have_orphans = true;
            } else {
                changes.have_adds = true;
            }
        }
    }
    changes
}

fn ac_path(ac_iid: Iid, resource: u16) -> UriPath {
    UriPath::resource(oid::ACCESS_CONTROL, ac_iid, resource)
}

impl DataModel {
    /// Bring the Access Control Object in line with the changes in `queue`
    ///
    /// Does nothing when Access Control is disabled, `/2` is not registered
    /// or the engine is already running.
    pub fn sync_access_control(&mut self, origin: Ssid, queue: &NotifyQueue) -> Result<()> {
        if self.access_sync_in_progress
            || !self.config.access_control
            || !self.objects.contains(oid::ACCESS_CONTROL)
        {
            return Ok(());
        }
        let changes = what_changed(origin, queue);
        trace!("access control sync from SSID {}: {:?}", origin, changes);

        self.access_sync_in_progress = true;
        self.transaction.begin();
        let mut own_queue = NotifyQueue::new();
        let mut result = self.run_sync_steps(origin, queue, changes, &mut own_queue);
        if result.is_ok() && !own_queue.is_empty() {
            result = self.notify_perform(origin, &own_queue);
        }
        let result = self.transaction.finish(&mut self.objects, result);
        self.access_sync_in_progress = false;

        if let Err(err) = result {
            error!("access control synchronization failed: {}", err);
        }
        result
    }

    fn run_sync_steps(
        &mut self,
        origin: Ssid,
        queue: &NotifyQueue,
        changes: SyncChanges,
        own_queue: &mut NotifyQueue,
    ) -> Result<()> {
        if changes.might_have_removes {
            self.perform_removes(own_queue)?;
        }
        if changes.might_have_orphans {
            self.remove_orphaned_instances(own_queue)?;
        }
        if changes.have_adds {
            self.perform_adds(origin, queue, own_queue)?;
        }
        self.generate_apparent_instance_set_change_notifications(queue, own_queue)
    }

    /// Remove AC instances that do not point at an existing instance, and
    /// all but the first of AC instances sharing a target
    fn perform_removes(&mut self, own_queue: &mut NotifyQueue) -> Result<()> {
        let mut allowed: BTreeMap<Oid, BTreeSet<Iid>> = BTreeMap::new();
        for target_oid in self.objects.oids() {
            if target_oid == oid::SECURITY || target_oid == oid::ACCESS_CONTROL {
                continue;
            }
            let Some(obj) = self.objects.find_mut(target_oid) else {
                continue;
            };
            let mut iids: BTreeSet<Iid> = instance_ids(obj)?.into_iter().collect();
            // object-level AC instances
            iids.insert(ID_INVALID);
            allowed.insert(target_oid, iids);
        }

        let ac = self.object_mut(oid::ACCESS_CONTROL)?;
        let mut to_remove = Vec::new();
        for ac_iid in instance_ids(ac)? {
            let (target_oid, target_iid) = read_ac_target(ac, ac_iid)?;
            let valid = allowed
                .get_mut(&target_oid)
                .is_some_and(|iids| iids.remove(&target_iid));
            if !valid {
                debug!(
                    "/2/{} targets /{}/{} which is gone or already covered",
                    ac_iid, target_oid, target_iid
                );
                to_remove.push(ac_iid);
            }
        }

        for ac_iid in to_remove {
            self.touch_object(oid::ACCESS_CONTROL)?.instance_remove(ac_iid)?;
            own_queue.instance_removed(oid::ACCESS_CONTROL, ac_iid);
            info!("removed stale access control instance /2/{}", ac_iid);
        }
        Ok(())
    }

    /// Strip ACL entries of servers no longer configured
    fn remove_orphaned_instances(&mut self, own_queue: &mut NotifyQueue) -> Result<()> {
        if !self.objects.contains(oid::SECURITY) {
            debug!("no Security object, skipping orphan cleanup");
            return Ok(());
        }
        let ssids = valid_ssids(&mut self.objects)?;
        let is_valid = |ssid: Ssid| ssid == SSID_BOOTSTRAP || ssid == SSID_ANY || ssids.contains(&ssid);

        let ac_iids = instance_ids(self.object_mut(oid::ACCESS_CONTROL)?)?;
        let mut unbootstrap = Vec::new();
        for ac_iid in ac_iids {
            let ac = self.object_mut(oid::ACCESS_CONTROL)?;
            let acl = read_acl(ac, ac_iid)?;
            let (kept, stripped): (Vec<AclEntry>, Vec<AclEntry>) =
                acl.into_iter().partition(|entry| is_valid(entry.ssid));
            if stripped.is_empty() {
                continue;
            }
            if kept.is_empty() {
                unbootstrap.push((ac_iid, read_ac_target(ac, ac_iid)?));
                continue;
            }

            let owner = read_owner(ac, ac_iid)?;
            let ac = self.touch_object(oid::ACCESS_CONTROL)?;
            if stripped.iter().any(|entry| entry.ssid == owner) {
                let new_owner = elect_instance_owner(&kept);
                write_resource(
                    ac,
                    &ac_path(ac_iid, rid::access_control::OWNER),
                    Value::Int(i64::from(new_owner)),
                )?;
                own_queue.resource_change(oid::ACCESS_CONTROL, ac_iid, rid::access_control::OWNER);
                info!("/2/{}: owner {} is gone, elected {}", ac_iid, owner, new_owner);
            }
            write_acl(ac, ac_iid, &kept)?;
            own_queue.resource_change(oid::ACCESS_CONTROL, ac_iid, rid::access_control::ACL);
        }

        for (ac_iid, (target_oid, target_iid)) in unbootstrap {
            self.touch_object(oid::ACCESS_CONTROL)?.instance_remove(ac_iid)?;
            own_queue.instance_removed(oid::ACCESS_CONTROL, ac_iid);
            info!(
                "/2/{}: no server has access left, removing it and /{}/{}",
                ac_iid, target_oid, target_iid
            );
            if target_iid == ID_INVALID {
                continue;
            }
            let removed = self
                .touch_object(target_oid)
                .and_then(|target| target.instance_remove(target_iid));
            match removed {
                Ok(()) => own_queue.instance_removed(target_oid, target_iid),
                Err(err) => debug!("could not remove /{}/{}: {}", target_oid, target_iid, err),
            }
        }
        Ok(())
    }

    /// Create AC instances for instances created by `origin`
    fn perform_adds(&mut self, origin: Ssid, queue: &NotifyQueue, own_queue: &mut NotifyQueue) -> Result<()> {
        for (&target_oid, entry) in queue {
            if target_oid == oid::SECURITY || target_oid == oid::ACCESS_CONTROL {
                continue;
            }
            for &target_iid in &entry.instance_set_changes.known_added_iids {
                let ac = self.object_mut(oid::ACCESS_CONTROL)?;
                if find_ac_instance_by_target(ac, target_oid, target_iid)?.is_some() {
                    continue;
                }
                let target_exists = match self.objects.find_mut(target_oid) {
                    Some(target) => instance_present(target, target_iid)?,
                    None => false,
                };
                if !target_exists {
                    debug!("/{}/{} vanished before getting an AC instance", target_oid, target_iid);
                    continue;
                }
                self.create_ac_instance(target_oid, target_iid, origin, own_queue)?;
            }
        }
        Ok(())
    }

    fn create_ac_instance(
        &mut self,
        target_oid: Oid,
        target_iid: Iid,
        owner: Ssid,
        own_queue: &mut NotifyQueue,
    ) -> Result<()> {
        let ac = self.touch_object(oid::ACCESS_CONTROL)?;
        let ac_iid = select_free_iid(ac)?;
        ac.instance_create(ac_iid)?;
        verify_ac_resources(ac, ac_iid)?;

        write_resource(
            ac,
            &ac_path(ac_iid, rid::access_control::OID),
            Value::Int(i64::from(target_oid)),
        )?;
        write_resource(
            ac,
            &ac_path(ac_iid, rid::access_control::OIID),
            Value::Int(i64::from(target_iid)),
        )?;
        write_resource(
            ac,
            &UriPath::resource_instance(oid::ACCESS_CONTROL, ac_iid, rid::access_control::ACL, owner),
            Value::Int(i64::from(AccessMask::OWNER_DEFAULT.bits())),
        )?;
        write_resource(
            ac,
            &ac_path(ac_iid, rid::access_control::OWNER),
            Value::Int(i64::from(owner)),
        )?;
        own_queue.instance_created(oid::ACCESS_CONTROL, ac_iid);
        info!(
            "created /2/{} for /{}/{} owned by SSID {}",
            ac_iid, target_oid, target_iid, owner
        );
        Ok(())
    }

    /// ACL changes alter what the target instance looks like to servers
    fn generate_apparent_instance_set_change_notifications(
        &mut self,
        queue: &NotifyQueue,
        own_queue: &mut NotifyQueue,
    ) -> Result<()> {
        let Some(entry) = queue.get(oid::ACCESS_CONTROL) else {
            return Ok(());
        };
        let ac = self.object_mut(oid::ACCESS_CONTROL)?;
        let mut last_iid = None;
        for &(ac_iid, _) in &entry.resources_changed {
            if last_iid == Some(ac_iid) {
                continue;
            }
            last_iid = Some(ac_iid);
            if !instance_present(ac, ac_iid)? {
                continue;
            }
            let (target_oid, _) = read_ac_target(ac, ac_iid)?;
            own_queue.instance_set_unknown_change(target_oid);
        }
        Ok(())
    }
}

/// Rewrite the whole ACL of `ac_iid`
fn write_acl(ac: &mut dyn DmObject, ac_iid: Iid, acl: &[AclEntry]) -> Result<()> {
    ac.resource_reset(ac_iid, rid::access_control::ACL)?;
    for entry in acl {
        write_resource(
            ac,
            &UriPath::resource_instance(oid::ACCESS_CONTROL, ac_iid, rid::access_control::ACL, entry.ssid),
            Value::Int(i64::from(entry.mask.bits())),
        )?;
    }
    Ok(())
}

/// A freshly created AC instance must expose its four resources with the
/// expected kinds
fn verify_ac_resources(ac: &mut dyn DmObject, ac_iid: Iid) -> Result<()> {
    fn single_readable(kind: ResourceKind) -> bool {
        !kind.is_multiple() && kind.is_readable_by(true)
    }

    let checks: [(u16, fn(ResourceKind) -> bool); 4] = [
        (rid::access_control::OID, single_readable),
        (rid::access_control::OIID, single_readable),
        (rid::access_control::ACL, ResourceKind::is_multiple),
        (rid::access_control::OWNER, single_readable),
    ];
    for (resource, check) in checks {
        match resource_kind_and_presence(ac, ac_iid, resource)? {
            Some((kind, _)) if check(kind) => {}
            other => {
                error!(
                    "/2/{}/{} is not usable as an Access Control resource: {:?}",
                    ac_iid, resource, other
                );
                return Err(DmError::Internal);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_what_changed_adds_by_server() {
        let mut queue = NotifyQueue::new();
        queue.instance_created(10, 0);
        let changes = what_changed(1, &queue);
        assert!(changes.have_adds);
        assert!(changes.might_have_removes);
        assert!(!changes.might_have_orphans);
    }

    #[test]
    fn test_what_changed_adds_by_bootstrap() {
        let mut queue = NotifyQueue::new();
        queue.instance_created(10, 0);
        let changes = what_changed(SSID_BOOTSTRAP, &queue);
        assert!(!changes.have_adds);
        assert!(changes.might_have_orphans);
    }

    #[test]
    fn test_what_changed_special_objects() {
        let mut queue = NotifyQueue::new();
        queue.instance_removed(oid::SECURITY, 1);
        assert_eq!(
            what_changed(1, &queue),
            SyncChanges {
                might_have_orphans: true,
                ..Default::default()
            }
        );

        queue.instance_created(oid::ACCESS_CONTROL, 3);
        assert!(!what_changed(1, &queue).have_adds);

        let mut server = NotifyQueue::new();
        server.instance_removed(oid::SERVER, 0);
        let changes = what_changed(1, &server);
        assert!(changes.might_have_orphans && changes.might_have_removes);
    }

    #[test]
    fn test_resource_changes_alone_trigger_nothing() {
        let mut queue = NotifyQueue::new();
        queue.resource_change(10, 0, 1);
        assert_eq!(what_changed(1, &queue), SyncChanges::default());
    }
}
