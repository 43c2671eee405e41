//! Write, Write-Update and Write-Composite
//!
//! Payload entries are consumed in order. A single-instance resource takes
//! exactly one entry addressing the resource itself. A multiple resource
//! takes an optional array marker followed by any number of consecutive
//! Resource Instance entries.

use log::warn;

use crate::dm::DataModel;
use crate::error::{DmError, Result};
use crate::ids::{is_restricted_oid, Iid, Rid, UriPath, SSID_BOOTSTRAP};
use crate::io::{Decoder, InputCtx};
use crate::notify::NotifyQueue;
use crate::object::DmObject;
use crate::path::{resource_kind_and_presence, verify_instance_present};
use crate::request::{Action, Request};

/// How a write treats existing content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Plain Write: the target is reset before the payload is written
    Replace,
    /// Write-Update: existing values are overwritten, nothing is removed
    Update,
    /// Resources of a freshly created instance
    Create,
}

/// Write the payload entries of resource `/oid/iid/rid`
///
/// With `reset_multiple`, a multiple resource is emptied first.
pub(crate) fn write_resource_entries(
    obj: &mut dyn DmObject,
    iid: Iid,
    rid: Rid,
    input: &mut InputCtx<'_>,
    reset_multiple: bool,
    bootstrap: bool,
    queue: &mut NotifyQueue,
) -> Result<()> {
    let oid = obj.oid();
    let resource_path = UriPath::resource(oid, iid, rid);
    let entry = input.get_path()?.ok_or(DmError::BadRequest)?;
    let Some((kind, _)) = resource_kind_and_presence(obj, iid, rid)? else {
        warn!("{} is not supported", resource_path);
        return Err(DmError::MethodNotAllowed);
    };
    if !kind.is_writable_by(bootstrap) {
        warn!("{} is not writable", resource_path);
        return Err(DmError::MethodNotAllowed);
    }

    if !kind.is_multiple() {
        if entry.is_array || entry.path != resource_path {
            return Err(DmError::BadRequest);
        }
        obj.resource_write(iid, rid, None, input)?;
        input.next_entry()?;
    } else {
        if entry.is_array {
            if entry.path != resource_path {
                return Err(DmError::BadRequest);
            }
        } else if !entry.path.has_riid() || entry.path.truncated(3) != resource_path {
            return Err(DmError::BadRequest);
        }
        if reset_multiple {
            obj.resource_reset(iid, rid)?;
        }
        if entry.is_array {
            input.next_entry()?;
        }
        while let Some(next) = input.get_path()? {
            if next.is_array || !next.path.has_riid() || next.path.truncated(3) != resource_path {
                break;
            }
            obj.resource_write(iid, rid, next.path.riid(), input)?;
            input.next_entry()?;
        }
    }
    queue.resource_change(oid, iid, rid);
    Ok(())
}

/// Write every payload entry into instance `iid`; all entries must belong
/// to it
pub(crate) fn write_instance(
    obj: &mut dyn DmObject,
    iid: Iid,
    input: &mut InputCtx<'_>,
    mode: WriteMode,
    bootstrap: bool,
    queue: &mut NotifyQueue,
) -> Result<()> {
    let oid = obj.oid();
    if mode == WriteMode::Replace {
        obj.instance_reset(iid)?;
    }
    while let Some(entry) = input.get_path()? {
        if entry.path.oid() != Some(oid) || entry.path.iid() != Some(iid) {
            warn!("payload entry {} outside of /{}/{}", entry.path, oid, iid);
            return Err(DmError::BadRequest);
        }
        let rid = entry.path.rid().ok_or(DmError::BadRequest)?;
        write_resource_entries(obj, iid, rid, input, false, bootstrap, queue)?;
    }
    Ok(())
}

fn write_resource_instance(
    obj: &mut dyn DmObject,
    uri: &UriPath,
    input: &mut InputCtx<'_>,
    bootstrap: bool,
    queue: &mut NotifyQueue,
) -> Result<()> {
    let (Some(iid), Some(rid), Some(riid)) = (uri.iid(), uri.rid(), uri.riid()) else {
        return Err(DmError::BadRequest);
    };
    let Some((kind, _)) = resource_kind_and_presence(obj, iid, rid)? else {
        return Err(DmError::NotFound);
    };
    if !kind.is_multiple() || !kind.is_writable_by(bootstrap) {
        return Err(DmError::MethodNotAllowed);
    }
    match input.get_path()? {
        Some(entry) if !entry.is_array && entry.path == *uri => {}
        _ => return Err(DmError::BadRequest),
    }
    obj.resource_write(iid, rid, Some(riid), input)?;
    input.next_entry()?;
    queue.resource_change(obj.oid(), iid, rid);
    Ok(())
}

/// Consume the entries under `prefix`
fn skip_entries(input: &mut InputCtx<'_>, prefix: &UriPath) -> Result<()> {
    while let Some(entry) = input.get_path()? {
        if !entry.path.starts_with(prefix) {
            break;
        }
        input.next_entry()?;
    }
    Ok(())
}

impl DataModel {
    pub(super) fn write(&mut self, request: &Request, decoder: &mut dyn Decoder, mode: WriteMode) -> Result<()> {
        let uri = request.uri;
        let (Some(oid), Some(iid)) = (uri.oid(), uri.iid()) else {
            return Err(DmError::MethodNotAllowed);
        };
        if uri.has_riid() && !self.config.lwm2m_version.supports_composite() {
            return Err(DmError::BadRequest);
        }
        verify_instance_present(self.object_mut(oid)?, iid)?;
        self.authorize(request.ssid, request.action, oid, iid)?;

        let bootstrap = request.ssid == SSID_BOOTSTRAP;
        let mut queue = NotifyQueue::new();
        let mut input = InputCtx::new(decoder);
        let obj = self.touch_object(oid)?;
        match uri.rid() {
            None => write_instance(obj, iid, &mut input, mode, bootstrap, &mut queue)?,
            Some(_) if uri.has_riid() => {
                write_resource_instance(obj, &uri, &mut input, bootstrap, &mut queue)?
            }
            Some(rid) => {
                if resource_kind_and_presence(obj, iid, rid)?.is_none() {
                    return Err(DmError::NotFound);
                }
                let reset = mode == WriteMode::Replace;
                write_resource_entries(obj, iid, rid, &mut input, reset, bootstrap, &mut queue)?;
            }
        }
        if input.get_path()?.is_some() {
            warn!("{}: payload has entries outside of the target", uri);
            return Err(DmError::BadRequest);
        }
        self.notify_flush(request.ssid, queue)
    }

    /// Write-Composite: entries failing with a client error are skipped
    pub(super) fn write_composite(&mut self, request: &Request, decoder: &mut dyn Decoder) -> Result<()> {
        let mut queue = NotifyQueue::new();
        let mut input = InputCtx::new(decoder);
        while let Some(entry) = input.get_path()? {
            match self.write_composite_entry(request, &entry.path, &mut input, &mut queue) {
                Ok(()) => {}
                Err(err) if err.is_client_error() => {
                    warn!("Write-Composite: {} failed: {}", entry.path, err);
                    skip_entries(&mut input, &entry.path.truncated(3))?;
                }
                Err(err) => return Err(err),
            }
        }
        self.notify_flush(request.ssid, queue)
    }

    fn write_composite_entry(
        &mut self,
        request: &Request,
        path: &UriPath,
        input: &mut InputCtx<'_>,
        queue: &mut NotifyQueue,
    ) -> Result<()> {
        let (Some(oid), Some(iid), Some(rid)) = (path.oid(), path.iid(), path.rid()) else {
            return Err(DmError::BadRequest);
        };
        if is_restricted_oid(oid) {
            return Err(DmError::Unauthorized);
        }
        verify_instance_present(self.object_mut(oid)?, iid)?;
        self.authorize(request.ssid, Action::WriteComposite, oid, iid)?;

        let bootstrap = request.ssid == SSID_BOOTSTRAP;
        let obj = self.touch_object(oid)?;
        if path.has_riid() {
            write_resource_instance(obj, path, input, bootstrap, queue)
        } else {
            write_resource_entries(obj, iid, rid, input, false, bootstrap, queue)
        }
    }
}
