//! Read, Read-Composite and the Observe hand-off

use log::{error, trace, warn};

use crate::dm::DataModel;
use crate::error::{DmError, MsgCode, Result};
use crate::ids::{is_restricted_oid, Iid, PathLevel, Rid, Ssid, UriPath, SSID_BOOTSTRAP};
use crate::io::{Decoder, Encoder, OutputCtx};
use crate::iterate::{instance_ids, resource_entries, resource_instance_ids};
use crate::object::DmObject;
use crate::path::path_info;
use crate::request::{Action, Request, Response};

/// Read one value into `enc`
fn read_value(obj: &mut dyn DmObject, path: &UriPath, enc: &mut dyn Encoder) -> Result<()> {
    let (Some(iid), Some(rid)) = (path.iid(), path.rid()) else {
        return Err(DmError::BadRequest);
    };
    enc.set_path(path)?;
    let mut out = OutputCtx::new(&mut *enc);
    obj.resource_read(iid, rid, path.riid(), &mut out)?;
    if !out.value_returned() {
        error!("{}: read handler succeeded without returning a value", path);
        return Err(DmError::Internal);
    }
    enc.clear_path()
}

fn read_resource(
    obj: &mut dyn DmObject,
    iid: Iid,
    rid: Rid,
    multiple: bool,
    enc: &mut dyn Encoder,
) -> Result<()> {
    let oid = obj.oid();
    let path = UriPath::resource(oid, iid, rid);
    if !multiple {
        return read_value(obj, &path, enc);
    }
    let riids = resource_instance_ids(obj, iid, rid)?;
    if riids.is_empty() {
        enc.set_path(&path)?;
        enc.start_aggregate()?;
        return enc.clear_path();
    }
    for riid in riids {
        read_value(obj, &UriPath::resource_instance(oid, iid, rid, riid), enc)?;
    }
    Ok(())
}

/// Read every present and readable resource of instance `iid`
fn read_instance(obj: &mut dyn DmObject, iid: Iid, bootstrap: bool, enc: &mut dyn Encoder) -> Result<()> {
    for entry in resource_entries(obj, iid)? {
        if !entry.is_present() || !entry.kind.is_readable_by(bootstrap) {
            continue;
        }
        read_resource(obj, iid, entry.rid, entry.kind.is_multiple(), enc)?;
    }
    Ok(())
}

impl DataModel {
    pub(super) fn read_or_observe(&mut self, request: &Request, response: &mut Response) -> Result<()> {
        let uri = request.uri;
        let info = path_info(&mut self.objects, &uri)?;
        if !info.is_present {
            return Err(DmError::NotFound);
        }
        let bootstrap = request.ssid == SSID_BOOTSTRAP;
        if info.kind.is_some_and(|kind| !kind.is_readable_by(bootstrap)) {
            return Err(DmError::MethodNotAllowed);
        }
        if let (Some(oid), Some(iid)) = (uri.oid(), uri.iid()) {
            self.authorize(request.ssid, Action::Read, oid, iid)?;
        }

        let (format, mut encoder) = self.make_encoder(request.requested_format, &uri)?;
        self.read_path(request.ssid, Action::Read, &uri, encoder.as_mut())?;
        let payload = encoder.finish()?;
        response.setup(MsgCode::CONTENT, Some(format))?;
        response.payload = payload;

        if let Some(observe) = request.observe {
            if let Err(err) = self.hooks.observe(request.ssid, &uri, observe, format) {
                warn!("observe hand-off for {} failed: {}", uri, err);
            }
        }
        Ok(())
    }

    pub(super) fn read_composite(
        &mut self,
        request: &Request,
        input: &mut dyn Decoder,
        response: &mut Response,
    ) -> Result<()> {
        let mut paths = Vec::new();
        while let Some(entry) = input.get_path()? {
            paths.push(entry.path);
            input.next_entry()?;
        }

        let (format, mut encoder) = self.make_encoder(request.requested_format, &UriPath::root())?;
        for path in &paths {
            self.read_composite_entry(request.ssid, path, encoder.as_mut())?;
        }
        let payload = encoder.finish()?;
        response.setup(MsgCode::CONTENT, Some(format))?;
        response.payload = payload;
        Ok(())
    }

    fn read_composite_entry(&mut self, ssid: Ssid, path: &UriPath, enc: &mut dyn Encoder) -> Result<()> {
        if path.oid().is_some_and(is_restricted_oid) {
            trace!("Read-Composite: skipping restricted {}", path);
            return Ok(());
        }
        let info = path_info(&mut self.objects, path)?;
        let bootstrap = ssid == SSID_BOOTSTRAP;
        if !info.is_present || info.kind.is_some_and(|kind| !kind.is_readable_by(bootstrap)) {
            trace!("Read-Composite: skipping {}", path);
            return Ok(());
        }
        if let (Some(oid), Some(iid)) = (path.oid(), path.iid()) {
            if !self.is_allowed(ssid, Action::ReadComposite, oid, iid) {
                trace!("Read-Composite: skipping unauthorized {}", path);
                return Ok(());
            }
        }
        self.read_path(ssid, Action::ReadComposite, path, enc)
    }

    /// Read everything under `uri`, which must be present
    ///
    /// At root and Object level, instances `ssid` may not read are skipped.
    fn read_path(&mut self, ssid: Ssid, action: Action, uri: &UriPath, enc: &mut dyn Encoder) -> Result<()> {
        let bootstrap = ssid == SSID_BOOTSTRAP;
        match (uri.level(), uri.oid(), uri.iid(), uri.rid()) {
            (PathLevel::Root, ..) => {
                for oid in self.objects.oids() {
                    if !is_restricted_oid(oid) {
                        self.read_path(ssid, action, &UriPath::object(oid), enc)?;
                    }
                }
                Ok(())
            }
            (PathLevel::Object, Some(oid), ..) => {
                for iid in instance_ids(self.object_mut(oid)?)? {
                    if !self.is_allowed(ssid, action, oid, iid) {
                        trace!("skipping unauthorized /{}/{}", oid, iid);
                        continue;
                    }
                    read_instance(self.object_mut(oid)?, iid, bootstrap, enc)?;
                }
                Ok(())
            }
            (PathLevel::Instance, Some(oid), Some(iid), _) => {
                read_instance(self.object_mut(oid)?, iid, bootstrap, enc)
            }
            (PathLevel::Resource, Some(oid), Some(iid), Some(rid)) => {
                let info = path_info(&mut self.objects, uri)?;
                read_resource(self.object_mut(oid)?, iid, rid, info.is_hierarchical, enc)
            }
            (PathLevel::ResourceInstance, Some(oid), ..) => read_value(self.object_mut(oid)?, uri, enc),
            _ => Err(DmError::BadRequest),
        }
    }
}
