//! Payload input/output contracts
//!
//! # Purpose
//! The wire encodings (TLV, SenML, plain text, ...) live outside this crate.
//! They plug in through three traits:
//! - [`Decoder`]: walks the entries of a request payload,
//! - [`Encoder`]: builds a response payload,
//! - [`Codec`]: creates both for a given content format.
//!
//! Object handlers never see those traits directly; they receive an
//! [`InputCtx`] or [`OutputCtx`] offering typed getters and `ret_*` calls.
//!
//! # Internal IO
//! [`SingleValueDecoder`] and [`CaptureEncoder`] let the data model read and
//! write individual resources on its own behalf (the Access Control engine
//! does this all the time), see [`read_resource`] and [`write_resource`].

use log::error;
use serde::{Deserialize, Serialize};

use crate::error::{DmError, Result};
use crate::ids::{Iid, Oid, UriPath};
use crate::object::DmObject;

/// Registered CoAP Content-Format numbers used by the core
pub mod content_format {
    pub const PLAINTEXT: u16 = 0;
    pub const LINK_FORMAT: u16 = 40;
    pub const OPAQUE: u16 = 42;
    pub const CBOR: u16 = 60;
    pub const SENML_JSON: u16 = 110;
    pub const SENML_CBOR: u16 = 112;
    pub const TLV: u16 = 11542;
    pub const LWM2M_JSON: u16 = 11543;
}

/// Typed resource value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Uint(u64),
    Double(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Objlnk(Oid, Iid),
}

/// Type requested by a getter, forwarded to the decoder as a hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Uint,
    Double,
    Bool,
    String,
    Bytes,
    Objlnk,
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::Uint(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Uint(v) => Some(v),
            Value::Int(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Double(v) => Some(v),
            Value::Int(v) => Some(v as f64),
            Value::Uint(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
}

/// Payload entry position reported by a [`Decoder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadEntry {
    pub path: UriPath,
    /// Entry introduces the instances of a multiple resource rather than
    /// carrying a value
    pub is_array: bool,
}

impl PayloadEntry {
    pub fn value(path: UriPath) -> Self {
        Self { path, is_array: false }
    }

    pub fn array(path: UriPath) -> Self {
        Self { path, is_array: true }
    }
}

/// Sequential reader over a decoded payload
pub trait Decoder {
    /// Position of the current entry, `None` once the payload is exhausted
    fn get_path(&mut self) -> Result<Option<PayloadEntry>>;

    /// Value of the current entry
    fn get_value(&mut self, hint: ValueType) -> Result<Value>;

    /// Advance to the next entry
    fn next_entry(&mut self) -> Result<()>;

    /// Narrow the root entries are resolved against (used by Create once
    /// the new Instance ID is known)
    fn update_root_path(&mut self, _root: &UriPath) -> Result<()> {
        Ok(())
    }

    /// Called once when the request is done with the decoder
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sequential writer building a response payload
pub trait Encoder {
    /// Set the path of the next value
    fn set_path(&mut self, path: &UriPath) -> Result<()>;

    fn clear_path(&mut self) -> Result<()>;

    /// Report an aggregate (multiple resource) with no instances at the
    /// current path
    fn start_aggregate(&mut self) -> Result<()>;

    fn put_value(&mut self, value: Value) -> Result<()>;

    /// Produce the encoded payload
    fn finish(&mut self) -> Result<Vec<u8>>;
}

/// Factory for decoders and encoders
pub trait Codec: Send {
    /// Decoder over `payload` in `content_format`, entries relative to `base`
    fn decoder(
        &self,
        content_format: Option<u16>,
        payload: &[u8],
        base: &UriPath,
    ) -> Result<Box<dyn Decoder>>;

    /// Encoder for a response to `base`; returns the chosen content format
    fn encoder(
        &self,
        requested_format: Option<u16>,
        base: &UriPath,
    ) -> Result<(u16, Box<dyn Encoder>)>;
}

/// Decoder for a request without payload
#[derive(Debug, Default)]
pub struct EmptyDecoder;

impl Decoder for EmptyDecoder {
    fn get_path(&mut self) -> Result<Option<PayloadEntry>> {
        Ok(None)
    }

    fn get_value(&mut self, _hint: ValueType) -> Result<Value> {
        Err(DmError::BadRequest)
    }

    fn next_entry(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Typed view of a [`Decoder`] handed to `resource_write`
pub struct InputCtx<'a> {
    decoder: &'a mut dyn Decoder,
}

impl<'a> InputCtx<'a> {
    pub fn new(decoder: &'a mut dyn Decoder) -> Self {
        Self { decoder }
    }

    pub fn get_value(&mut self, hint: ValueType) -> Result<Value> {
        self.decoder.get_value(hint)
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        self.get_value(ValueType::Int)?
            .as_i64()
            .ok_or(DmError::BadRequest)
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        i32::try_from(self.get_i64()?).map_err(|_| DmError::BadRequest)
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        u16::try_from(self.get_i64()?).map_err(|_| DmError::BadRequest)
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        self.get_value(ValueType::Uint)?
            .as_u64()
            .ok_or(DmError::BadRequest)
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        self.get_value(ValueType::Double)?
            .as_f64()
            .ok_or(DmError::BadRequest)
    }

    pub fn get_bool(&mut self) -> Result<bool> {
        self.get_value(ValueType::Bool)?
            .as_bool()
            .ok_or(DmError::BadRequest)
    }

    pub fn get_string(&mut self) -> Result<String> {
        match self.get_value(ValueType::String)? {
            Value::String(s) => Ok(s),
            _ => Err(DmError::BadRequest),
        }
    }

    pub fn get_bytes(&mut self) -> Result<Vec<u8>> {
        match self.get_value(ValueType::Bytes)? {
            Value::Bytes(b) => Ok(b),
            _ => Err(DmError::BadRequest),
        }
    }

    pub fn get_objlnk(&mut self) -> Result<(Oid, Iid)> {
        match self.get_value(ValueType::Objlnk)? {
            Value::Objlnk(oid, iid) => Ok((oid, iid)),
            _ => Err(DmError::BadRequest),
        }
    }

    pub(crate) fn get_path(&mut self) -> Result<Option<PayloadEntry>> {
        self.decoder.get_path()
    }

    pub(crate) fn next_entry(&mut self) -> Result<()> {
        self.decoder.next_entry()
    }

    pub(crate) fn update_root_path(&mut self, root: &UriPath) -> Result<()> {
        self.decoder.update_root_path(root)
    }
}

/// Typed view of an [`Encoder`] handed to `resource_read`
pub struct OutputCtx<'a> {
    encoder: &'a mut dyn Encoder,
    value_returned: bool,
}

impl<'a> OutputCtx<'a> {
    pub fn new(encoder: &'a mut dyn Encoder) -> Self {
        Self {
            encoder,
            value_returned: false,
        }
    }

    pub fn ret_value(&mut self, value: Value) -> Result<()> {
        self.encoder.put_value(value)?;
        self.value_returned = true;
        Ok(())
    }

    pub fn ret_i64(&mut self, value: i64) -> Result<()> {
        self.ret_value(Value::Int(value))
    }

    pub fn ret_u64(&mut self, value: u64) -> Result<()> {
        self.ret_value(Value::Uint(value))
    }

    pub fn ret_f64(&mut self, value: f64) -> Result<()> {
        self.ret_value(Value::Double(value))
    }

    pub fn ret_bool(&mut self, value: bool) -> Result<()> {
        self.ret_value(Value::Bool(value))
    }

    pub fn ret_string(&mut self, value: &str) -> Result<()> {
        self.ret_value(Value::String(value.to_owned()))
    }

    pub fn ret_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.ret_value(Value::Bytes(value.to_vec()))
    }

    pub fn ret_objlnk(&mut self, oid: Oid, iid: Iid) -> Result<()> {
        self.ret_value(Value::Objlnk(oid, iid))
    }

    /// True once the handler returned a value
    pub fn value_returned(&self) -> bool {
        self.value_returned
    }
}

/// Decoder serving a single value at a fixed path
#[derive(Debug)]
pub struct SingleValueDecoder {
    path: UriPath,
    value: Value,
    consumed: bool,
}

impl SingleValueDecoder {
    pub fn new(path: UriPath, value: Value) -> Self {
        Self {
            path,
            value,
            consumed: false,
        }
    }
}

impl Decoder for SingleValueDecoder {
    fn get_path(&mut self) -> Result<Option<PayloadEntry>> {
        Ok((!self.consumed).then(|| PayloadEntry::value(self.path)))
    }

    fn get_value(&mut self, _hint: ValueType) -> Result<Value> {
        if self.consumed {
            return Err(DmError::BadRequest);
        }
        Ok(self.value.clone())
    }

    fn next_entry(&mut self) -> Result<()> {
        self.consumed = true;
        Ok(())
    }
}

/// Encoder keeping the last value put into it
#[derive(Debug, Default)]
pub struct CaptureEncoder {
    value: Option<Value>,
}

impl CaptureEncoder {
    pub fn take(&mut self) -> Option<Value> {
        self.value.take()
    }
}

impl Encoder for CaptureEncoder {
    fn set_path(&mut self, _path: &UriPath) -> Result<()> {
        Ok(())
    }

    fn clear_path(&mut self) -> Result<()> {
        Ok(())
    }

    fn start_aggregate(&mut self) -> Result<()> {
        Ok(())
    }

    fn put_value(&mut self, value: Value) -> Result<()> {
        if self.value.is_some() {
            return Err(DmError::Internal);
        }
        self.value = Some(value);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Read one resource (or resource instance) of `obj` directly
///
/// `path` must address a resource or resource instance of `obj`.
pub fn read_resource(obj: &mut dyn DmObject, path: &UriPath) -> Result<Value> {
    let (Some(iid), Some(rid)) = (path.iid(), path.rid()) else {
        return Err(DmError::BadRequest);
    };
    let mut encoder = CaptureEncoder::default();
    let mut out = OutputCtx::new(&mut encoder);
    obj.resource_read(iid, rid, path.riid(), &mut out)?;
    encoder.take().ok_or_else(|| {
        error!("{}: read handler succeeded without returning a value", path);
        DmError::Internal
    })
}

pub fn read_resource_i64(obj: &mut dyn DmObject, path: &UriPath) -> Result<i64> {
    read_resource(obj, path)?.as_i64().ok_or(DmError::Internal)
}

pub fn read_resource_u16(obj: &mut dyn DmObject, path: &UriPath) -> Result<u16> {
    u16::try_from(read_resource_i64(obj, path)?).map_err(|_| DmError::Internal)
}

pub fn read_resource_bool(obj: &mut dyn DmObject, path: &UriPath) -> Result<bool> {
    read_resource(obj, path)?.as_bool().ok_or(DmError::Internal)
}

/// Write one resource (or resource instance) of `obj` directly
pub fn write_resource(obj: &mut dyn DmObject, path: &UriPath, value: Value) -> Result<()> {
    let (Some(iid), Some(rid)) = (path.iid(), path.rid()) else {
        return Err(DmError::BadRequest);
    };
    let mut decoder = SingleValueDecoder::new(*path, value);
    let mut input = InputCtx::new(&mut decoder);
    obj.resource_write(iid, rid, path.riid(), &mut input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::Uint(7).as_i64(), Some(7));
        assert_eq!(Value::Uint(u64::MAX).as_i64(), None);
        assert_eq!(Value::Int(-1).as_u64(), None);
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::String("x".into()).as_bool(), None);
    }

    #[test]
    fn test_input_ctx_range_checks() {
        let mut decoder = SingleValueDecoder::new(UriPath::resource(1, 0, 0), Value::Int(70000));
        let mut input = InputCtx::new(&mut decoder);
        assert_eq!(input.get_i64(), Ok(70000));
        assert_eq!(input.get_u16(), Err(DmError::BadRequest));
        assert_eq!(input.get_string(), Err(DmError::BadRequest));
    }

    #[test]
    fn test_single_value_decoder_consumes_once() {
        let path = UriPath::resource(2, 0, 3);
        let mut decoder = SingleValueDecoder::new(path, Value::Bool(true));
        assert_eq!(decoder.get_path(), Ok(Some(PayloadEntry::value(path))));
        decoder.next_entry().unwrap();
        assert_eq!(decoder.get_path(), Ok(None));
        assert_eq!(decoder.get_value(ValueType::Bool), Err(DmError::BadRequest));
    }

    #[test]
    fn test_output_ctx_tracks_returned_value() {
        let mut encoder = CaptureEncoder::default();
        let mut out = OutputCtx::new(&mut encoder);
        assert!(!out.value_returned());
        out.ret_string("hello").unwrap();
        assert!(out.value_returned());
        assert_eq!(encoder.take(), Some(Value::String("hello".into())));
    }
}
