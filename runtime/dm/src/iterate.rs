//! Iteration contracts over Object handlers
//!
//! Each `foreach_*` function performs exactly one call to the matching
//! `list_*` handler. The handler emits identifiers through a [`ListCtx`],
//! which checks the contract before forwarding them:
//! - the identifier is not `0xFFFF`,
//! - it is strictly greater than the previously emitted one.
//!
//! A violation means the Object implementation is broken, so it is logged
//! at `error!` and reported as `DmError::Internal`; the caller's callback is
//! not invoked for the offending identifier nor for anything emitted after
//! it. A failure returned by the `list_*` handler itself is propagated
//! unchanged and logged at `warn!`.
//!
//! Callbacks steer the iteration with `ControlFlow`: `Continue` goes on,
//! `Break` ends it successfully, an error aborts it.

use core::ops::ControlFlow;

use log::{error, warn};

use crate::error::{DmError, Result};
use crate::ids::{Iid, Rid, Riid, UriPath, ID_INVALID};
use crate::object::{DmObject, ResourceKind, ResourcePresence};

/// Resource as reported by `list_resources`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceEntry {
    pub rid: Rid,
    pub kind: ResourceKind,
    pub presence: ResourcePresence,
}

impl ResourceEntry {
    #[inline]
    pub fn is_present(&self) -> bool {
        self.presence == ResourcePresence::Present
    }
}

/// Anything a `list_*` handler can emit
pub trait Listed: Copy {
    fn listed_id(&self) -> u16;
}

impl Listed for u16 {
    fn listed_id(&self) -> u16 {
        *self
    }
}

impl Listed for ResourceEntry {
    fn listed_id(&self) -> u16 {
        self.rid
    }
}

type Callback<'a, T> = dyn FnMut(T) -> Result<ControlFlow<()>> + 'a;

/// Emitter handed to `list_*` handlers
pub struct ListCtx<'a, T: Listed> {
    /// Path being listed, for diagnostics only
    path: UriPath,
    /// Last accepted identifier; -1 before the first one
    last_id: i32,
    state: Result<ControlFlow<()>>,
    callback: &'a mut Callback<'a, T>,
}

pub type InstanceListCtx<'a> = ListCtx<'a, Iid>;
pub type ResourceListCtx<'a> = ListCtx<'a, ResourceEntry>;
pub type ResourceInstanceListCtx<'a> = ListCtx<'a, Riid>;

impl<'a, T: Listed> ListCtx<'a, T> {
    fn new(path: UriPath, callback: &'a mut Callback<'a, T>) -> Self {
        Self {
            path,
            last_id: -1,
            state: Ok(ControlFlow::Continue(())),
            callback,
        }
    }

    /// Report one item; items emitted after a break or failure are ignored
    pub fn emit(&mut self, item: T) {
        if !matches!(self.state, Ok(ControlFlow::Continue(()))) {
            return;
        }
        let id = item.listed_id();
        if id == ID_INVALID {
            error!("{}: handler emitted the reserved ID 65535", self.path);
            self.state = Err(DmError::Internal);
            return;
        }
        if i32::from(id) <= self.last_id {
            error!(
                "{}: handler emitted ID {} after {}, IDs must be strictly ascending",
                self.path, id, self.last_id
            );
            self.state = Err(DmError::Internal);
            return;
        }
        self.last_id = i32::from(id);
        self.state = (self.callback)(item);
    }

    fn finish(self) -> Result<()> {
        self.state.map(|_| ())
    }
}

impl<'a> ResourceListCtx<'a> {
    /// Report one resource
    pub fn emit_res(&mut self, rid: Rid, kind: ResourceKind, presence: ResourcePresence) {
        self.emit(ResourceEntry { rid, kind, presence });
    }
}

fn finish_listing<T: Listed>(
    path: &UriPath,
    handler_result: Result<()>,
    ctx: ListCtx<'_, T>,
) -> Result<()> {
    if let Err(err) = handler_result {
        warn!("{}: list handler failed: {}", path, err);
        return Err(err);
    }
    ctx.finish()
}

/// Visit every instance of `obj`
pub fn foreach_instance<F>(obj: &mut dyn DmObject, mut f: F) -> Result<()>
where
    F: FnMut(Iid) -> Result<ControlFlow<()>>,
{
    let path = UriPath::object(obj.oid());
    let mut callback = |iid: Iid| f(iid);
    let mut ctx = ListCtx::new(path, &mut callback);
    let result = obj.list_instances(&mut ctx);
    finish_listing(&path, result, ctx)
}

/// Visit every resource of instance `iid`
pub fn foreach_resource<F>(obj: &mut dyn DmObject, iid: Iid, mut f: F) -> Result<()>
where
    F: FnMut(ResourceEntry) -> Result<ControlFlow<()>>,
{
    let path = UriPath::instance(obj.oid(), iid);
    let mut callback = |entry: ResourceEntry| f(entry);
    let mut ctx = ListCtx::new(path, &mut callback);
    let result = obj.list_resources(iid, &mut ctx);
    finish_listing(&path, result, ctx)
}

/// Visit every instance of the multiple resource `/oid/iid/rid`
pub fn foreach_resource_instance<F>(obj: &mut dyn DmObject, iid: Iid, rid: Rid, mut f: F) -> Result<()>
where
    F: FnMut(Riid) -> Result<ControlFlow<()>>,
{
    let path = UriPath::resource(obj.oid(), iid, rid);
    let mut callback = |riid: Riid| f(riid);
    let mut ctx = ListCtx::new(path, &mut callback);
    let result = obj.list_resource_instances(iid, rid, &mut ctx);
    finish_listing(&path, result, ctx)
}

/// Collect all Instance IDs of `obj`
pub fn instance_ids(obj: &mut dyn DmObject) -> Result<Vec<Iid>> {
    let mut iids = Vec::new();
    foreach_instance(obj, |iid| {
        iids.push(iid);
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(iids)
}

/// Collect all resources of instance `iid`
pub fn resource_entries(obj: &mut dyn DmObject, iid: Iid) -> Result<Vec<ResourceEntry>> {
    let mut entries = Vec::new();
    foreach_resource(obj, iid, |entry| {
        entries.push(entry);
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(entries)
}

/// Collect all Resource Instance IDs of `/oid/iid/rid`
pub fn resource_instance_ids(obj: &mut dyn DmObject, iid: Iid, rid: Rid) -> Result<Vec<Riid>> {
    let mut riids = Vec::new();
    foreach_resource_instance(obj, iid, rid, |riid| {
        riids.push(riid);
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(riids)
}
