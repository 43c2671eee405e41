//! Request and response envelopes
//!
//! A [`Request`] is what the protocol layer hands to the data model once it
//! has decoded a CoAP message; a [`Response`] is what it gets back.

use core::fmt;

use crate::attributes::RequestAttributes;
use crate::error::{DmError, MsgCode, Result};
use crate::ids::{Ssid, UriPath};

/// LwM2M Device Management operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    ReadComposite,
    Discover,
    /// Write with REPLACE semantics (CoAP PUT)
    Write,
    /// Partial update (CoAP POST)
    WriteUpdate,
    WriteComposite,
    WriteAttributes,
    Execute,
    Create,
    Delete,
}

impl Action {
    /// Response code of a successful request
    pub fn success_code(self) -> MsgCode {
        match self {
            Action::Read | Action::ReadComposite | Action::Discover => MsgCode::CONTENT,
            Action::Write
            | Action::WriteUpdate
            | Action::WriteComposite
            | Action::WriteAttributes
            | Action::Execute => MsgCode::CHANGED,
            Action::Create => MsgCode::CREATED,
            Action::Delete => MsgCode::DELETED,
        }
    }

    /// Addresses the root and lists its targets in the payload
    pub fn is_composite(self) -> bool {
        matches!(self, Action::ReadComposite | Action::WriteComposite)
    }

    /// Payload is decoded as data model content
    pub fn has_payload(self) -> bool {
        matches!(
            self,
            Action::ReadComposite
                | Action::Write
                | Action::WriteUpdate
                | Action::WriteComposite
                | Action::Create
        )
    }

    /// Runs inside a data model transaction
    pub fn is_transactional(self) -> bool {
        matches!(
            self,
            Action::Write
                | Action::WriteUpdate
                | Action::WriteComposite
                | Action::Create
                | Action::Delete
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Read => "Read",
            Action::ReadComposite => "Read-Composite",
            Action::Discover => "Discover",
            Action::Write => "Write",
            Action::WriteUpdate => "Write-Update",
            Action::WriteComposite => "Write-Composite",
            Action::WriteAttributes => "Write-Attributes",
            Action::Execute => "Execute",
            Action::Create => "Create",
            Action::Delete => "Delete",
        };
        f.write_str(name)
    }
}

/// Observe option carried by a Read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observe {
    Register,
    Deregister,
}

/// Decoded LwM2M request
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub ssid: Ssid,
    pub action: Action,
    pub uri: UriPath,
    /// Content-Format of the payload
    pub content_format: Option<u16>,
    /// Accept option
    pub requested_format: Option<u16>,
    pub observe: Option<Observe>,
    pub attributes: RequestAttributes,
    pub payload: Vec<u8>,
}

impl Request {
    pub fn new(ssid: Ssid, action: Action, uri: UriPath) -> Self {
        Self {
            ssid,
            action,
            uri,
            content_format: None,
            requested_format: None,
            observe: None,
            attributes: RequestAttributes::default(),
            payload: Vec::new(),
        }
    }

    pub fn with_payload(mut self, content_format: u16, payload: Vec<u8>) -> Self {
        self.content_format = Some(content_format);
        self.payload = payload;
        self
    }

    pub fn with_requested_format(mut self, format: u16) -> Self {
        self.requested_format = Some(format);
        self
    }

    pub fn with_observe(mut self, observe: Observe) -> Self {
        self.observe = Some(observe);
        self
    }

    pub fn with_attributes(mut self, attributes: RequestAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Response produced by the data model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    code: Option<MsgCode>,
    pub content_format: Option<u16>,
    /// Location-Path segments (set by Create)
    pub location_path: Vec<String>,
    pub payload: Vec<u8>,
}

impl Response {
    /// Response carrying only the code of `err`
    pub fn from_error(err: DmError) -> Self {
        Self {
            code: Some(err.coap_code()),
            ..Self::default()
        }
    }

    /// Fix the response code and content format
    ///
    /// # Errors
    /// `Internal` if the response was already set up
    pub fn setup(&mut self, code: MsgCode, content_format: Option<u16>) -> Result<()> {
        if self.code.is_some() {
            log::error!("response set up twice");
            return Err(DmError::Internal);
        }
        self.code = Some(code);
        self.content_format = content_format;
        Ok(())
    }

    pub fn is_set_up(&self) -> bool {
        self.code.is_some()
    }

    /// Response code; 5.00 if the response was never set up
    pub fn code(&self) -> MsgCode {
        self.code.unwrap_or(MsgCode::INTERNAL_SERVER_ERROR)
    }
}
