//! Delete

use log::info;

use crate::dm::DataModel;
use crate::error::{DmError, Result};
use crate::notify::NotifyQueue;
use crate::path::verify_instance_present;
use crate::request::{Action, Request};

impl DataModel {
    pub(super) fn delete(&mut self, request: &Request) -> Result<()> {
        let uri = request.uri;
        let (Some(oid), Some(iid), 2) = (uri.oid(), uri.iid(), uri.len()) else {
            return Err(DmError::MethodNotAllowed);
        };
        verify_instance_present(self.object_mut(oid)?, iid)?;
        self.authorize(request.ssid, Action::Delete, oid, iid)?;

        self.touch_object(oid)?.instance_remove(iid)?;
        info!("removed /{}/{}", oid, iid);

        let mut queue = NotifyQueue::new();
        queue.instance_removed(oid, iid);
        self.notify_flush(request.ssid, queue)
    }
}
