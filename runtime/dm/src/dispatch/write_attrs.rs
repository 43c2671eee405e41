//! Write-Attributes

use log::warn;

use crate::dm::DataModel;
use crate::error::{DmError, Result};
use crate::ids::PathLevel;
use crate::path::path_info;
use crate::request::{Action, Request};

impl DataModel {
    pub(super) fn write_attributes(&mut self, request: &Request) -> Result<()> {
        let uri = request.uri;
        let attrs = &request.attributes;
        if attrs.has_resource_specific() && !uri.has_rid() {
            warn!("gt/lt/st are only valid on resources, not {}", uri);
            return Err(DmError::BadRequest);
        }
        if uri.has_riid() && !self.config.lwm2m_version.supports_composite() {
            return Err(DmError::BadRequest);
        }
        if !path_info(&mut self.objects, &uri)?.is_present {
            return Err(DmError::NotFound);
        }
        if let (Some(oid), Some(iid)) = (uri.oid(), uri.iid()) {
            self.authorize(request.ssid, Action::WriteAttributes, oid, iid)?;
        }

        let ssid = request.ssid;
        let obj = self.object_mut(uri.oid().ok_or(DmError::BadRequest)?)?;
        match (uri.level(), uri.iid(), uri.rid(), uri.riid()) {
            (PathLevel::Object, ..) => {
                let mut current = obj.object_read_default_attrs(ssid)?;
                attrs.apply_common(&mut current);
                current.validate()?;
                obj.object_write_default_attrs(ssid, &current)?;
            }
            (PathLevel::Instance, Some(iid), ..) => {
                let mut current = obj.instance_read_default_attrs(iid, ssid)?;
                attrs.apply_common(&mut current);
                current.validate()?;
                obj.instance_write_default_attrs(iid, ssid, &current)?;
            }
            (PathLevel::Resource, Some(iid), Some(rid), _) => {
                let mut current = obj.resource_read_attrs(iid, rid, ssid)?;
                attrs.apply_resource(&mut current);
                current.validate()?;
                obj.resource_write_attrs(iid, rid, ssid, &current)?;
            }
            (PathLevel::ResourceInstance, Some(iid), Some(rid), Some(riid)) => {
                let mut current = obj.resource_instance_read_attrs(iid, rid, riid, ssid)?;
                attrs.apply_resource(&mut current);
                current.validate()?;
                obj.resource_instance_write_attrs(iid, rid, riid, ssid, &current)?;
            }
            _ => return Err(DmError::BadRequest),
        }

        if let Err(err) = self.hooks.attributes_changed(ssid, &uri, attrs) {
            warn!("attribute change of {} not propagated: {}", uri, err);
        }
        Ok(())
    }
}
