//! Execute

use log::warn;

use crate::dm::DataModel;
use crate::error::{DmError, Result};
use crate::execute::ExecuteCtx;
use crate::io::content_format;
use crate::path::{verify_instance_present, verify_resource_present};
use crate::request::{Action, Request};

impl DataModel {
    pub(super) fn execute(&mut self, request: &Request) -> Result<()> {
        let uri = request.uri;
        let (Some(oid), Some(iid), Some(rid), 3) = (uri.oid(), uri.iid(), uri.rid(), uri.len()) else {
            return Err(DmError::MethodNotAllowed);
        };
        if !matches!(request.content_format, None | Some(content_format::PLAINTEXT)) {
            return Err(DmError::UnsupportedContentFormat);
        }
        verify_instance_present(self.object_mut(oid)?, iid)?;
        self.authorize(request.ssid, Action::Execute, oid, iid)?;

        let obj = self.object_mut(oid)?;
        let kind = verify_resource_present(obj, iid, rid)?;
        if !kind.is_executable() {
            warn!("{} is not executable", uri);
            return Err(DmError::MethodNotAllowed);
        }
        let mut ctx = ExecuteCtx::new(&request.payload);
        obj.resource_execute(iid, rid, &mut ctx)
    }
}
