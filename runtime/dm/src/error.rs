//! Error types for data model operations
//!
//! Every failure in the data model is a `DmError`. Protocol-visible variants
//! map one-to-one onto CoAP response codes through [`DmError::coap_code`];
//! the remaining variants describe local conditions (registry misuse, opaque
//! handler codes) and surface to the peer as 5.00 Internal Server Error.

use core::fmt;

use thiserror::Error;

use crate::ids::Oid;

/// CoAP message code (`class.detail`, packed as `class << 5 | detail`)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MsgCode(u8);

impl MsgCode {
    pub const CREATED: Self = Self::new(2, 1);
    pub const DELETED: Self = Self::new(2, 2);
    pub const CHANGED: Self = Self::new(2, 4);
    pub const CONTENT: Self = Self::new(2, 5);
    pub const BAD_REQUEST: Self = Self::new(4, 0);
    pub const UNAUTHORIZED: Self = Self::new(4, 1);
    pub const NOT_FOUND: Self = Self::new(4, 4);
    pub const METHOD_NOT_ALLOWED: Self = Self::new(4, 5);
    pub const NOT_ACCEPTABLE: Self = Self::new(4, 6);
    pub const UNSUPPORTED_CONTENT_FORMAT: Self = Self::new(4, 15);
    pub const INTERNAL_SERVER_ERROR: Self = Self::new(5, 0);
    pub const NOT_IMPLEMENTED: Self = Self::new(5, 1);
    pub const SERVICE_UNAVAILABLE: Self = Self::new(5, 3);

    /// Build a code from its class and detail parts
    pub const fn new(class: u8, detail: u8) -> Self {
        Self(((class & 0x07) << 5) | (detail & 0x1F))
    }

    #[inline]
    pub const fn class(self) -> u8 {
        self.0 >> 5
    }

    #[inline]
    pub const fn detail(self) -> u8 {
        self.0 & 0x1F
    }

    /// Raw single-byte representation used on the wire
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_success(self) -> bool {
        self.class() == 2
    }
}

impl fmt::Display for MsgCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())
    }
}

impl fmt::Debug for MsgCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MsgCode({})", self)
    }
}

/// Data model error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DmError {
    #[error("Bad request")]
    BadRequest,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Not acceptable")]
    NotAcceptable,

    #[error("Unsupported content format")]
    UnsupportedContentFormat,

    #[error("Internal error")]
    Internal,

    #[error("Not implemented")]
    NotImplemented,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Object /{oid} is already registered")]
    ObjectAlreadyRegistered { oid: Oid },

    #[error("Object /{oid} is not registered")]
    ObjectNotRegistered { oid: Oid },

    #[error("Object handler failed with code {0}")]
    Handler(i32),
}

impl DmError {
    /// CoAP response code reported to the peer for this error
    pub fn coap_code(&self) -> MsgCode {
        match self {
            DmError::BadRequest => MsgCode::BAD_REQUEST,
            DmError::Unauthorized => MsgCode::UNAUTHORIZED,
            DmError::NotFound => MsgCode::NOT_FOUND,
            DmError::MethodNotAllowed => MsgCode::METHOD_NOT_ALLOWED,
            DmError::NotAcceptable => MsgCode::NOT_ACCEPTABLE,
            DmError::UnsupportedContentFormat => MsgCode::UNSUPPORTED_CONTENT_FORMAT,
            DmError::NotImplemented => MsgCode::NOT_IMPLEMENTED,
            DmError::ServiceUnavailable => MsgCode::SERVICE_UNAVAILABLE,
            DmError::Internal
            | DmError::ObjectAlreadyRegistered { .. }
            | DmError::ObjectNotRegistered { .. }
            | DmError::Handler(_) => MsgCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for errors reported with a 4.xx code
    pub fn is_client_error(&self) -> bool {
        self.coap_code().class() == 4
    }
}

pub type Result<T> = core::result::Result<T, DmError>;

/// Keep the first error of a sequence of best-effort steps
pub(crate) fn update_result(result: &mut Result<()>, next: Result<()>) {
    if result.is_ok() {
        *result = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_code_parts() {
        assert_eq!(MsgCode::CONTENT.class(), 2);
        assert_eq!(MsgCode::CONTENT.detail(), 5);
        assert_eq!(MsgCode::CONTENT.as_u8(), 0x45);
        assert_eq!(MsgCode::UNSUPPORTED_CONTENT_FORMAT.to_string(), "4.15");
        assert!(MsgCode::DELETED.is_success());
        assert!(!MsgCode::NOT_FOUND.is_success());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(DmError::Unauthorized.coap_code(), MsgCode::UNAUTHORIZED);
        assert_eq!(DmError::Handler(-17).coap_code(), MsgCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            DmError::ObjectNotRegistered { oid: 3 }.coap_code(),
            MsgCode::INTERNAL_SERVER_ERROR
        );
        assert!(DmError::NotFound.is_client_error());
        assert!(!DmError::Internal.is_client_error());
    }

    #[test]
    fn test_update_result_keeps_first_error() {
        let mut result = Ok(());
        update_result(&mut result, Err(DmError::NotFound));
        update_result(&mut result, Err(DmError::Internal));
        update_result(&mut result, Ok(()));
        assert_eq!(result, Err(DmError::NotFound));
    }
}
