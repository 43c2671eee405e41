//! Action dispatcher
//!
//! # Purpose
//! Executes one decoded LwM2M request against the data model:
//! 1. checks the request targets an Object (Composite operations target the
//!    root instead),
//! 2. rejects anything addressing Security or OSCORE,
//! 3. creates the payload decoder if the action carries data,
//! 4. runs the action, inside a transaction if
//!    [`Action::is_transactional`],
//! 5. closes the decoder and fills the response.
//!
//! Authorization is checked per instance by each action.
//!
//! # Testing Strategy
//! - Integration tests: `tests/dispatcher.rs` drives every action against
//!   the mock objects and the bincode codec

mod create;
mod delete;
#[cfg(feature = "discover")]
mod discover;
mod execute;
mod read;
mod write;
mod write_attrs;

pub use write::WriteMode;

use log::{debug, warn};

use crate::access::{instance_action_allowed, ActionInfo};
use crate::dm::DataModel;
use crate::error::{update_result, DmError, Result};
use crate::ids::{is_restricted_oid, Iid, Oid, Ssid, UriPath};
use crate::io::{Decoder, EmptyDecoder, Encoder};
use crate::request::{Action, Request, Response};

impl DataModel {
    /// Handle `request`, turning any failure into an error response
    pub fn perform(&mut self, request: &Request) -> Response {
        let mut response = Response::default();
        match self.perform_action(request, &mut response) {
            Ok(()) => response,
            Err(err) => {
                debug!(
                    "{} {} by SSID {} failed: {}",
                    request.action, request.uri, request.ssid, err
                );
                Response::from_error(err)
            }
        }
    }

    /// Handle `request`, filling `response` on success
    pub fn perform_action(&mut self, request: &Request, response: &mut Response) -> Result<()> {
        let action = request.action;
        debug!("{} {} by SSID {}", action, request.uri, request.ssid);

        if action.is_composite() {
            if !self.config.lwm2m_version.supports_composite() {
                return Err(DmError::MethodNotAllowed);
            }
            if !request.uri.is_root() {
                return Err(DmError::BadRequest);
            }
        } else {
            let oid = request.uri.oid().ok_or(DmError::BadRequest)?;
            if is_restricted_oid(oid) {
                return Err(DmError::Unauthorized);
            }
            if !self.objects.contains(oid) {
                return Err(DmError::NotFound);
            }
        }

        let mut decoder = if action.has_payload() {
            Some(self.make_decoder(request)?)
        } else {
            None
        };

        let mut result = if action.is_transactional() {
            self.in_transaction(|dm| dm.run_action(request, &mut decoder, response))
        } else {
            self.run_action(request, &mut decoder, response)
        };

        if let Some(input) = decoder.as_deref_mut() {
            update_result(&mut result, input.close());
        }
        result?;
        if !response.is_set_up() {
            response.setup(action.success_code(), None)?;
        }
        Ok(())
    }

    fn run_action(
        &mut self,
        request: &Request,
        decoder: &mut Option<Box<dyn Decoder>>,
        response: &mut Response,
    ) -> Result<()> {
        match (request.action, decoder.as_deref_mut()) {
            (Action::Read, _) => self.read_or_observe(request, response),
            (Action::ReadComposite, Some(input)) => self.read_composite(request, input, response),
            (Action::Discover, _) => self.discover_action(request, response),
            (Action::Write, Some(input)) => self.write(request, input, WriteMode::Replace),
            (Action::WriteUpdate, Some(input)) => self.write(request, input, WriteMode::Update),
            (Action::WriteComposite, Some(input)) => self.write_composite(request, input),
            (Action::Create, Some(input)) => self.create(request, input, response),
            (Action::Delete, _) => self.delete(request),
            (Action::WriteAttributes, _) => self.write_attributes(request),
            (Action::Execute, _) => self.execute(request),
            (_, None) => Err(DmError::Internal),
        }
    }

    #[cfg(feature = "discover")]
    fn discover_action(&mut self, request: &Request, response: &mut Response) -> Result<()> {
        self.discover(request, response)
    }

    #[cfg(not(feature = "discover"))]
    fn discover_action(&mut self, _request: &Request, _response: &mut Response) -> Result<()> {
        Err(DmError::NotImplemented)
    }

    fn make_decoder(&self, request: &Request) -> Result<Box<dyn Decoder>> {
        if request.action == Action::Create && request.payload.is_empty() {
            return Ok(Box::new(EmptyDecoder));
        }
        let codec = self.codec.as_ref().ok_or(DmError::UnsupportedContentFormat)?;
        codec.decoder(request.content_format, &request.payload, &request.uri)
    }

    pub(crate) fn make_encoder(
        &self,
        requested_format: Option<u16>,
        base: &UriPath,
    ) -> Result<(u16, Box<dyn Encoder>)> {
        let codec = self.codec.as_ref().ok_or(DmError::NotAcceptable)?;
        codec.encoder(requested_format, base)
    }

    /// Run `f` inside a (possibly nested) transaction
    pub(crate) fn in_transaction<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.transaction.begin();
        let result = f(self);
        self.transaction.finish(&mut self.objects, result)
    }

    /// `Unauthorized` unless `ssid` may perform `action` on `/oid/iid`
    pub(crate) fn authorize(&mut self, ssid: Ssid, action: Action, oid: Oid, iid: Iid) -> Result<()> {
        if self.is_allowed(ssid, action, oid, iid) {
            Ok(())
        } else {
            warn!("SSID {} may not {} /{}/{}", ssid, action, oid, iid);
            Err(DmError::Unauthorized)
        }
    }

    pub(crate) fn is_allowed(&mut self, ssid: Ssid, action: Action, oid: Oid, iid: Iid) -> bool {
        let info = ActionInfo {
            oid,
            iid,
            ssid,
            action,
        };
        instance_action_allowed(&mut self.objects, &self.config, &info)
    }
}
