//! Access Control
//!
//! # Purpose
//! Decides whether an LwM2M Server may perform an action on an Object
//! Instance, based on the Access Control Object (`/2`). Each AC instance
//! binds a target `(OID, IID)` to an ACL (Resource 2, Resource Instance ID
//! = SSID, value = [`AccessMask`]) and an Owner (Resource 3).
//!
//! # Architecture
//! - [`instance_action_allowed`]: the decision, read-only
//! - [`sync`]: keeps `/2` consistent with the rest of the data model
//!
//! Access Control only matters with more than one LwM2M Server: with a
//! single server (or none), or without `/2` registered, everything is
//! allowed. The Bootstrap Server is never subject to it.
//!
//! # Testing Strategy
//! - Unit tests: mask resolution and owner election on in-memory ACLs
//! - Integration tests: `tests/access_control.rs` against the mock objects

pub mod sync;

use std::collections::BTreeSet;

use bitflags::bitflags;
use log::{trace, warn};

use crate::config::DmConfig;
use crate::error::{DmError, Result};
use crate::ids::{oid, rid, Iid, Oid, Ssid, UriPath, ID_INVALID, SSID_ANY, SSID_BOOTSTRAP};
use crate::io::{read_resource, read_resource_bool, read_resource_u16};
use crate::iterate::{instance_ids, resource_instance_ids};
use crate::object::{DmObject, ResourcePresence};
use crate::path::resource_kind_and_presence;
use crate::registry::ObjectRegistry;
use crate::request::Action;

bitflags! {
    /// Rights granted by one ACL entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessMask: u16 {
        const READ    = 1 << 0;
        const WRITE   = 1 << 1;
        const EXECUTE = 1 << 2;
        const DELETE  = 1 << 3;
        const CREATE  = 1 << 4;

        const FULL = Self::READ.bits()
            | Self::WRITE.bits()
            | Self::EXECUTE.bits()
            | Self::DELETE.bits()
            | Self::CREATE.bits();
    }
}

impl AccessMask {
    /// Granted to the owner of a newly created instance
    pub const OWNER_DEFAULT: Self = Self::from_bits_truncate(Self::FULL.bits() & !Self::CREATE.bits());

    /// Owner election score: one point each for WRITE and DELETE
    fn owner_score(self) -> u8 {
        u8::from(self.contains(Self::WRITE)) + u8::from(self.contains(Self::DELETE))
    }
}

/// Authorization query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionInfo {
    pub oid: Oid,
    /// `ID_INVALID` when the action does not address an instance
    pub iid: Iid,
    pub ssid: Ssid,
    pub action: Action,
}

/// One ACL Resource Instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclEntry {
    pub ssid: Ssid,
    pub mask: AccessMask,
}

/// Target `(OID, IID)` of AC instance `ac_iid`
pub fn read_ac_target(ac: &mut dyn DmObject, ac_iid: Iid) -> Result<(Oid, Iid)> {
    let target_oid = read_resource_u16(
        ac,
        &UriPath::resource(oid::ACCESS_CONTROL, ac_iid, rid::access_control::OID),
    )?;
    let target_iid = read_resource_u16(
        ac,
        &UriPath::resource(oid::ACCESS_CONTROL, ac_iid, rid::access_control::OIID),
    )?;
    Ok((target_oid, target_iid))
}

pub fn read_owner(ac: &mut dyn DmObject, ac_iid: Iid) -> Result<Ssid> {
    read_resource_u16(
        ac,
        &UriPath::resource(oid::ACCESS_CONTROL, ac_iid, rid::access_control::OWNER),
    )
}

/// ACL of AC instance `ac_iid`, ordered by SSID; empty if the resource is
/// absent
pub fn read_acl(ac: &mut dyn DmObject, ac_iid: Iid) -> Result<Vec<AclEntry>> {
    let acl_rid = rid::access_control::ACL;
    match resource_kind_and_presence(ac, ac_iid, acl_rid)? {
        Some((_, ResourcePresence::Present)) => {}
        _ => return Ok(Vec::new()),
    }
    let mut acl = Vec::new();
    for riid in resource_instance_ids(ac, ac_iid, acl_rid)? {
        let path = UriPath::resource_instance(oid::ACCESS_CONTROL, ac_iid, acl_rid, riid);
        let bits = read_resource(ac, &path)?
            .as_i64()
            .and_then(|v| u16::try_from(v).ok())
            .ok_or(DmError::Internal)?;
        acl.push(AclEntry {
            ssid: riid,
            mask: AccessMask::from_bits_truncate(bits),
        });
    }
    Ok(acl)
}

/// AC instance whose target is `(target_oid, target_iid)`
pub fn find_ac_instance_by_target(
    ac: &mut dyn DmObject,
    target_oid: Oid,
    target_iid: Iid,
) -> Result<Option<Iid>> {
    for ac_iid in instance_ids(ac)? {
        if read_ac_target(ac, ac_iid)? == (target_oid, target_iid) {
            return Ok(Some(ac_iid));
        }
    }
    Ok(None)
}

/// Effective rights of `ssid` on `(target_oid, target_iid)`
///
/// An entry for `ssid` itself wins over the default entry (SSID 0). An
/// instance with an empty ACL grants [`AccessMask::OWNER_DEFAULT`] to its
/// owner only. No AC instance means no rights.
pub fn access_control_mask(
    registry: &mut ObjectRegistry,
    target_oid: Oid,
    target_iid: Iid,
    ssid: Ssid,
) -> Result<AccessMask> {
    let Some(ac) = registry.find_mut(oid::ACCESS_CONTROL) else {
        return Ok(AccessMask::empty());
    };
    let Some(ac_iid) = find_ac_instance_by_target(ac, target_oid, target_iid)? else {
        return Ok(AccessMask::empty());
    };
    let acl = read_acl(ac, ac_iid)?;
    if acl.is_empty() {
        return Ok(if read_owner(ac, ac_iid)? == ssid {
            AccessMask::OWNER_DEFAULT
        } else {
            AccessMask::empty()
        });
    }
    Ok(resolve_acl(&acl, ssid))
}

fn resolve_acl(acl: &[AclEntry], ssid: Ssid) -> AccessMask {
    let mut default = AccessMask::empty();
    for entry in acl {
        if entry.ssid == ssid {
            return entry.mask;
        }
        if entry.ssid == SSID_ANY {
            default = entry.mask;
        }
    }
    default
}

/// Owner for an ACL: the entry with most of WRITE and DELETE; on a tie the
/// later entry wins. An empty ACL leaves the instance to the Bootstrap
/// Server.
pub fn elect_instance_owner(acl: &[AclEntry]) -> Ssid {
    let mut owner = SSID_BOOTSTRAP;
    let mut best = None;
    for entry in acl {
        let score = entry.mask.owner_score();
        if best.map_or(true, |b| score >= b) {
            best = Some(score);
            owner = entry.ssid;
        }
    }
    owner
}

/// True if `ssid` may create instances of `target_oid`
pub fn can_instantiate(registry: &mut ObjectRegistry, target_oid: Oid, ssid: Ssid) -> Result<bool> {
    Ok(access_control_mask(registry, target_oid, ID_INVALID, ssid)?.contains(AccessMask::CREATE))
}

/// SSIDs of the non-bootstrap Security instances
pub fn valid_ssids(registry: &mut ObjectRegistry) -> Result<BTreeSet<Ssid>> {
    let mut ssids = BTreeSet::new();
    let Some(security) = registry.find_mut(oid::SECURITY) else {
        return Ok(ssids);
    };
    for iid in instance_ids(security)? {
        let bootstrap = UriPath::resource(oid::SECURITY, iid, rid::security::BOOTSTRAP);
        match read_resource_bool(security, &bootstrap) {
            Ok(true) => continue,
            Ok(false) | Err(DmError::NotFound) => {}
            Err(err) => return Err(err),
        }
        let ssid_path = UriPath::resource(oid::SECURITY, iid, rid::security::SSID);
        match read_resource_u16(security, &ssid_path) {
            Ok(ssid) => {
                ssids.insert(ssid);
            }
            Err(DmError::NotFound) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(ssids)
}

/// At most one non-bootstrap LwM2M Server is configured
pub fn is_single_ssid_environment(registry: &mut ObjectRegistry) -> Result<bool> {
    Ok(valid_ssids(registry)?.len() <= 1)
}

fn required_mask(action: Action) -> Option<AccessMask> {
    match action {
        Action::Read | Action::ReadComposite | Action::WriteAttributes => Some(AccessMask::READ),
        Action::Write | Action::WriteUpdate | Action::WriteComposite => Some(AccessMask::WRITE),
        Action::Execute => Some(AccessMask::EXECUTE),
        Action::Delete => Some(AccessMask::DELETE),
        Action::Create => Some(AccessMask::CREATE),
        Action::Discover => None,
    }
}

fn access_control_action_allowed(registry: &mut ObjectRegistry, info: &ActionInfo) -> Result<bool> {
    match info.action {
        Action::Read | Action::ReadComposite | Action::WriteAttributes => Ok(true),
        Action::Create | Action::Delete => Ok(false),
        _ => {
            let ac = registry
                .find_mut(oid::ACCESS_CONTROL)
                .ok_or(DmError::NotFound)?;
            Ok(read_owner(ac, info.iid)? == info.ssid)
        }
    }
}

fn check_action_allowed(
    registry: &mut ObjectRegistry,
    config: &DmConfig,
    info: &ActionInfo,
) -> Result<bool> {
    if info.ssid == SSID_BOOTSTRAP || info.action == Action::Discover {
        return Ok(true);
    }
    if !config.access_control
        || !registry.contains(oid::ACCESS_CONTROL)
        || is_single_ssid_environment(registry)?
    {
        return Ok(true);
    }
    if info.oid == oid::ACCESS_CONTROL {
        return access_control_action_allowed(registry, info);
    }
    if info.action == Action::Create {
        return can_instantiate(registry, info.oid, info.ssid);
    }
    let Some(required) = required_mask(info.action) else {
        return Ok(false);
    };
    Ok(access_control_mask(registry, info.oid, info.iid, info.ssid)?.contains(required))
}

/// Decide whether `info.ssid` may perform `info.action` on
/// `/info.oid/info.iid`
///
/// Failures while consulting the data model deny the action.
pub fn instance_action_allowed(
    registry: &mut ObjectRegistry,
    config: &DmConfig,
    info: &ActionInfo,
) -> bool {
    match check_action_allowed(registry, config, info) {
        Ok(allowed) => {
            trace!(
                "{} on /{}/{} by SSID {}: {}",
                info.action,
                info.oid,
                info.iid,
                info.ssid,
                if allowed { "allowed" } else { "denied" }
            );
            allowed
        }
        Err(err) => {
            warn!(
                "could not check {} on /{}/{} by SSID {}: {}",
                info.action, info.oid, info.iid, info.ssid, err
            );
            false
        }
    }
}
