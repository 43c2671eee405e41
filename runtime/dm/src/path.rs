//! Path resolution
//!
//! Turns a [`UriPath`] into a [`PathInfo`] describing whether the addressed
//! entity exists and what it is, by walking the iteration contracts of the
//! owning Object. Absence at any level is reported through
//! `PathInfo::is_present`; only handler failures are errors.

use core::ops::ControlFlow;

use log::error;

use crate::error::{DmError, Result};
use crate::ids::{Iid, Rid, Riid, UriPath, ID_INVALID};
use crate::iterate::{foreach_instance, foreach_resource, foreach_resource_instance};
use crate::object::{DmObject, ResourceKind, ResourcePresence};
use crate::registry::ObjectRegistry;

/// What a path points to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathInfo {
    pub uri: UriPath,
    pub is_present: bool,
    /// The entity aggregates children (root, object, instance, multiple
    /// resource)
    pub is_hierarchical: bool,
    /// A resource was resolved; `kind` is meaningful
    pub has_resource: bool,
    pub kind: Option<ResourceKind>,
}

impl PathInfo {
    fn absent(uri: UriPath) -> Self {
        Self {
            uri,
            is_present: false,
            is_hierarchical: false,
            has_resource: false,
            kind: None,
        }
    }
}

/// Resolve `uri` against the registry
pub fn path_info(registry: &mut ObjectRegistry, uri: &UriPath) -> Result<PathInfo> {
    let Some(oid) = uri.oid() else {
        return Ok(PathInfo {
            uri: *uri,
            is_present: true,
            is_hierarchical: true,
            has_resource: false,
            kind: None,
        });
    };
    match registry.find_mut(oid) {
        Some(obj) => object_path_info(obj, uri),
        None => Ok(PathInfo::absent(*uri)),
    }
}

/// Resolve `uri` within an already looked-up object
pub fn object_path_info(obj: &mut dyn DmObject, uri: &UriPath) -> Result<PathInfo> {
    let mut info = PathInfo {
        uri: *uri,
        is_present: true,
        is_hierarchical: true,
        has_resource: false,
        kind: None,
    };

    let Some(iid) = uri.iid() else {
        return Ok(info);
    };
    if !instance_present(obj, iid)? {
        return Ok(PathInfo::absent(*uri));
    }

    let Some(rid) = uri.rid() else {
        return Ok(info);
    };
    match resource_kind_and_presence(obj, iid, rid)? {
        None => return Ok(PathInfo::absent(*uri)),
        Some((kind, presence)) => {
            info.has_resource = true;
            info.kind = Some(kind);
            info.is_present = presence == ResourcePresence::Present;
            info.is_hierarchical = kind.is_multiple();
        }
    }

    if let Some(riid) = uri.riid() {
        info.is_present = info.is_present
            && info.is_hierarchical
            && resource_instance_present(obj, iid, rid, riid)?;
        info.is_hierarchical = false;
    }
    Ok(info)
}

/// True if instance `iid` exists
pub fn instance_present(obj: &mut dyn DmObject, iid: Iid) -> Result<bool> {
    if iid == ID_INVALID {
        return Ok(false);
    }
    let mut found = false;
    foreach_instance(obj, |listed| {
        if listed >= iid {
            found = listed == iid;
            return Ok(ControlFlow::Break(()));
        }
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(found)
}

/// Kind and presence of resource `rid`; `None` if the instance does not
/// support it
pub fn resource_kind_and_presence(
    obj: &mut dyn DmObject,
    iid: Iid,
    rid: Rid,
) -> Result<Option<(ResourceKind, ResourcePresence)>> {
    let mut found = None;
    foreach_resource(obj, iid, |entry| {
        if entry.rid >= rid {
            if entry.rid == rid {
                found = Some((entry.kind, entry.presence));
            }
            return Ok(ControlFlow::Break(()));
        }
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(found)
}

fn resource_instance_present(obj: &mut dyn DmObject, iid: Iid, rid: Rid, riid: Riid) -> Result<bool> {
    let mut found = false;
    foreach_resource_instance(obj, iid, rid, |listed| {
        if listed >= riid {
            found = listed == riid;
            return Ok(ControlFlow::Break(()));
        }
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(found)
}

/// Kind of a supported and present resource
///
/// # Errors
/// `NotFound` if the resource is unsupported or absent
pub fn verify_resource_present(obj: &mut dyn DmObject, iid: Iid, rid: Rid) -> Result<ResourceKind> {
    match resource_kind_and_presence(obj, iid, rid)? {
        Some((kind, ResourcePresence::Present)) => Ok(kind),
        _ => Err(DmError::NotFound),
    }
}

/// `NotFound` unless instance `iid` exists
pub fn verify_instance_present(obj: &mut dyn DmObject, iid: Iid) -> Result<()> {
    if instance_present(obj, iid)? {
        Ok(())
    } else {
        Err(DmError::NotFound)
    }
}

/// Lowest Instance ID not used by `obj`
///
/// # Errors
/// `BadRequest` if all 65535 instances already exist
pub fn select_free_iid(obj: &mut dyn DmObject) -> Result<Iid> {
    let mut candidate: Iid = 0;
    foreach_instance(obj, |iid| {
        if iid != candidate {
            return Ok(ControlFlow::Break(()));
        }
        candidate += 1;
        Ok(ControlFlow::Continue(()))
    })?;
    if candidate == ID_INVALID {
        error!("65535 instances of /{} already exist", obj.oid());
        return Err(DmError::BadRequest);
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Oid;
    use crate::iterate::{InstanceListCtx, ResourceInstanceListCtx, ResourceListCtx};

    /// Instances 0..n, resources 0 (R, present), 1 (Rwm, present, riids
    /// 0 and 2), 2 (W, absent)
    struct Fixture {
        iids: Vec<Iid>,
    }

    impl DmObject for Fixture {
        fn oid(&self) -> Oid {
            7
        }

        fn list_instances(&mut self, ctx: &mut InstanceListCtx<'_>) -> Result<()> {
            for iid in &self.iids {
                ctx.emit(*iid);
            }
            Ok(())
        }

        fn list_resources(&mut self, _iid: Iid, ctx: &mut ResourceListCtx<'_>) -> Result<()> {
            ctx.emit_res(0, ResourceKind::R, ResourcePresence::Present);
            ctx.emit_res(1, ResourceKind::Rwm, ResourcePresence::Present);
            ctx.emit_res(2, ResourceKind::W, ResourcePresence::Absent);
            Ok(())
        }

        fn list_resource_instances(
            &mut self,
            _iid: Iid,
            _rid: Rid,
            ctx: &mut ResourceInstanceListCtx<'_>,
        ) -> Result<()> {
            ctx.emit(0);
            ctx.emit(2);
            Ok(())
        }
    }

    fn registry() -> ObjectRegistry {
        let mut registry = ObjectRegistry::new();
        registry.insert(Box::new(Fixture { iids: vec![0, 3] })).unwrap();
        registry
    }

    #[test]
    fn test_root_and_object() {
        let mut registry = registry();
        let root = path_info(&mut registry, &UriPath::root()).unwrap();
        assert!(root.is_present && root.is_hierarchical);
        assert!(path_info(&mut registry, &UriPath::object(7)).unwrap().is_present);
        assert!(!path_info(&mut registry, &UriPath::object(8)).unwrap().is_present);
    }

    #[test]
    fn test_instance_and_resource() {
        let mut registry = registry();
        assert!(!path_info(&mut registry, &UriPath::instance(7, 1)).unwrap().is_present);

        let single = path_info(&mut registry, &UriPath::resource(7, 3, 0)).unwrap();
        assert!(single.is_present && !single.is_hierarchical);
        assert_eq!(single.kind, Some(ResourceKind::R));

        let multiple = path_info(&mut registry, &UriPath::resource(7, 3, 1)).unwrap();
        assert!(multiple.is_present && multiple.is_hierarchical);

        let absent = path_info(&mut registry, &UriPath::resource(7, 0, 2)).unwrap();
        assert!(!absent.is_present && absent.has_resource);

        let unsupported = path_info(&mut registry, &UriPath::resource(7, 0, 9)).unwrap();
        assert!(!unsupported.is_present && !unsupported.has_resource);
    }

    #[test]
    fn test_resource_instance() {
        let mut registry = registry();
        let present = path_info(&mut registry, &UriPath::resource_instance(7, 0, 1, 2)).unwrap();
        assert!(present.is_present && !present.is_hierarchical);
        let missing = path_info(&mut registry, &UriPath::resource_instance(7, 0, 1, 1)).unwrap();
        assert!(!missing.is_present);
        let single = path_info(&mut registry, &UriPath::resource_instance(7, 0, 0, 0)).unwrap();
        assert!(!single.is_present);
    }

    #[test]
    fn test_select_free_iid_fills_first_gap() {
        let mut obj = Fixture { iids: vec![0, 1, 2, 5] };
        assert_eq!(select_free_iid(&mut obj), Ok(3));
        let mut obj = Fixture { iids: vec![] };
        assert_eq!(select_free_iid(&mut obj), Ok(0));
        let mut obj = Fixture { iids: vec![1] };
        assert_eq!(select_free_iid(&mut obj), Ok(0));
    }

    #[test]
    fn test_select_free_iid_full_object() {
        let mut obj = Fixture { iids: (0..ID_INVALID).collect() };
        assert_eq!(select_free_iid(&mut obj), Err(DmError::BadRequest));
    }
}
