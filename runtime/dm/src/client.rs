//! Shared client handle
//!
//! All data model entry points run under one lock held for the whole call.
//! Handlers are invoked with the lock held and must not call back into the
//! same [`Lwm2mClient`].

use spin::Mutex;

use crate::config::DmConfig;
use crate::dm::DataModel;
use crate::request::{Request, Response};

pub struct Lwm2mClient {
    dm: Mutex<DataModel>,
}

impl Lwm2mClient {
    pub fn new(dm: DataModel) -> Self {
        Self { dm: Mutex::new(dm) }
    }

    /// Client with an empty data model
    pub fn with_config(config: DmConfig) -> Self {
        Self::new(DataModel::new(config))
    }

    /// Process one request
    pub fn perform(&self, request: &Request) -> Response {
        self.dm.lock().perform(request)
    }

    /// Run `f` with exclusive access to the data model
    pub fn with_dm<R>(&self, f: impl FnOnce(&mut DataModel) -> R) -> R {
        let mut dm = self.dm.lock();
        f(&mut *dm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MsgCode;
    use crate::ids::UriPath;
    use crate::request::Action;

    #[test]
    fn test_unknown_object_through_client() {
        let client = Lwm2mClient::with_config(DmConfig::default());
        let response = client.perform(&Request::new(1, Action::Read, UriPath::object(3)));
        assert_eq!(response.code(), MsgCode::NOT_FOUND);
        assert!(client.with_dm(|dm| dm.object_ids().is_empty()));
    }

    #[test]
    fn test_security_is_never_exposed() {
        let client = Lwm2mClient::with_config(DmConfig::default());
        let response = client.perform(&Request::new(1, Action::Read, UriPath::instance(0, 0)));
        assert_eq!(response.code(), MsgCode::UNAUTHORIZED);
    }
}
