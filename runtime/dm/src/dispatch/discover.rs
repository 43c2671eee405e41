//! Discover
//!
//! Produces a CoRE Link Format listing, e.g. for `/3/0`:
//! `</3/0>;pmax=60,</3/0/0>,</3/0/7>;dim=2`. Only present resources are
//! listed; attributes are the ones stored for the requesting server.

use core::fmt::Write as _;

use crate::attributes::LinkAttrs;
use crate::dm::DataModel;
use crate::error::{DmError, MsgCode, Result};
use crate::ids::{Iid, Rid, Ssid, UriPath};
use crate::io::content_format;
use crate::iterate::{instance_ids, resource_entries, resource_instance_ids};
use crate::object::DmObject;
use crate::path::path_info;
use crate::request::{Request, Response};

fn link_error(_: core::fmt::Error) -> DmError {
    DmError::Internal
}

struct Links {
    out: String,
}

impl Links {
    fn push(&mut self, path: &UriPath, params: &str) -> Result<()> {
        if !self.out.is_empty() {
            self.out.push(',');
        }
        write!(self.out, "<{}>{}", path, params).map_err(link_error)
    }
}

/// `;dim=N` for multiple resources
fn dim_param(obj: &mut dyn DmObject, iid: Iid, rid: Rid, multiple: bool) -> Result<String> {
    if !multiple {
        return Ok(String::new());
    }
    Ok(format!(";dim={}", resource_instance_ids(obj, iid, rid)?.len()))
}

fn discover_resources(obj: &mut dyn DmObject, iid: Iid, links: &mut Links) -> Result<()> {
    let oid = obj.oid();
    for entry in resource_entries(obj, iid)? {
        if !entry.is_present() {
            continue;
        }
        let dim = dim_param(obj, iid, entry.rid, entry.kind.is_multiple())?;
        links.push(&UriPath::resource(oid, iid, entry.rid), &dim)?;
    }
    Ok(())
}

impl DataModel {
    pub(super) fn discover(&mut self, request: &Request, response: &mut Response) -> Result<()> {
        let uri = request.uri;
        if uri.has_riid() {
            return Err(DmError::BadRequest);
        }
        let info = path_info(&mut self.objects, &uri)?;
        if !info.is_present {
            return Err(DmError::NotFound);
        }
        let list_resource_instances =
            info.is_hierarchical && self.config.lwm2m_version.supports_composite();
        let obj = self.object_mut(uri.oid().ok_or(DmError::BadRequest)?)?;
        let links = discover_path(obj, &uri, request.ssid, list_resource_instances)?;

        response.setup(MsgCode::CONTENT, Some(content_format::LINK_FORMAT))?;
        response.payload = links.out.into_bytes();
        Ok(())
    }
}

fn discover_path(
    obj: &mut dyn DmObject,
    uri: &UriPath,
    ssid: Ssid,
    list_resource_instances: bool,
) -> Result<Links> {
    let oid = obj.oid();
    let mut links = Links { out: String::new() };
    match (uri.iid(), uri.rid()) {
        (None, _) => {
            let attrs = obj.object_read_default_attrs(ssid)?;
            let mut params = match obj.version() {
                Some(version) => format!(";ver={}", version),
                None => String::new(),
            };
            write!(params, "{}", LinkAttrs(&attrs)).map_err(link_error)?;
            links.push(uri, &params)?;
            for iid in instance_ids(obj)? {
                links.push(&UriPath::instance(oid, iid), "")?;
                discover_resources(obj, iid, &mut links)?;
            }
        }
        (Some(iid), None) => {
            let attrs = obj.instance_read_default_attrs(iid, ssid)?;
            links.push(uri, &LinkAttrs(&attrs).to_string())?;
            discover_resources(obj, iid, &mut links)?;
        }
        (Some(iid), Some(rid)) => {
            let multiple = resource_entries(obj, iid)?
                .iter()
                .any(|entry| entry.rid == rid && entry.kind.is_multiple());
            let attrs = obj.resource_read_attrs(iid, rid, ssid)?;
            let mut params = dim_param(obj, iid, rid, multiple)?;
            write!(params, "{}", LinkAttrs(&attrs)).map_err(link_error)?;
            links.push(uri, &params)?;
            if list_resource_instances {
                for riid in resource_instance_ids(obj, iid, rid)? {
                    let attrs = obj.resource_instance_read_attrs(iid, rid, riid, ssid)?;
                    let path = UriPath::resource_instance(oid, iid, rid, riid);
                    links.push(&path, &LinkAttrs(&attrs).to_string())?;
                }
            }
        }
    }
    Ok(links)
}
