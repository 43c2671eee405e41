//! Create

use log::{info, warn};

use crate::dm::DataModel;
use crate::error::{DmError, Result};
use crate::ids::{UriPath, ID_INVALID, SSID_BOOTSTRAP};
use crate::io::{Decoder, InputCtx};
use crate::notify::NotifyQueue;
use crate::path::{instance_present, select_free_iid};
use crate::request::{Action, Request, Response};

use super::write::{write_instance, WriteMode};

impl DataModel {
    /// Create an instance of the Object addressed by `request`
    ///
    /// The new Instance ID comes from the payload if it names one, otherwise
    /// the lowest free ID is used. The Location-Path of `response` is set to
    /// the created instance.
    pub(super) fn create(
        &mut self,
        request: &Request,
        decoder: &mut dyn Decoder,
        response: &mut Response,
    ) -> Result<()> {
        let uri = request.uri;
        let oid = match (uri.oid(), uri.len()) {
            (Some(oid), 1) => oid,
            _ => return Err(DmError::BadRequest),
        };
        self.authorize(request.ssid, Action::Create, oid, ID_INVALID)?;

        let mut input = InputCtx::new(decoder);
        let requested_iid = input.get_path()?.and_then(|entry| entry.path.iid());
        let obj = self.touch_object(oid)?;
        let iid = match requested_iid {
            Some(iid) => {
                if instance_present(obj, iid)? {
                    warn!("/{}/{} already exists", oid, iid);
                    return Err(DmError::BadRequest);
                }
                iid
            }
            None => {
                let iid = select_free_iid(obj)?;
                input.update_root_path(&UriPath::instance(oid, iid))?;
                iid
            }
        };

        obj.instance_create(iid)?;
        info!("created /{}/{}", oid, iid);
        response.location_path = vec![oid.to_string(), iid.to_string()];

        let mut queue = NotifyQueue::new();
        queue.instance_created(oid, iid);
        let bootstrap = request.ssid == SSID_BOOTSTRAP;
        write_instance(obj, iid, &mut input, WriteMode::Create, bootstrap, &mut queue)?;
        self.notify_flush(request.ssid, queue)
    }
}
