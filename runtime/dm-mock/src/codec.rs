//! Bincode payload codec
//!
//! A payload is a bincode-encoded `Vec<WireEntry>`. Paths are absolute; a
//! Create payload may use `ID_INVALID` as the Instance ID, which the decoder
//! replaces once the data model picks the new instance.

use log::warn;
use serde::{Deserialize, Serialize};

use lwm2m_dm::io::{content_format, PayloadEntry};
use lwm2m_dm::{Codec, Decoder, DmError, Encoder, Result, UriPath, Value, ValueType, ID_INVALID};

/// Content-Format of mock payloads
pub const MOCK_FORMAT: u16 = content_format::SENML_CBOR;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEntry {
    pub path: Vec<u16>,
    pub is_array: bool,
    pub value: Option<Value>,
}

impl WireEntry {
    pub fn value(path: &[u16], value: Value) -> Self {
        Self {
            path: path.to_vec(),
            is_array: false,
            value: Some(value),
        }
    }

    /// Start of a multiple resource
    pub fn array(path: &[u16]) -> Self {
        Self {
            path: path.to_vec(),
            is_array: true,
            value: None,
        }
    }

    /// Bare path, as listed by Read-Composite
    pub fn path(path: &[u16]) -> Self {
        Self {
            path: path.to_vec(),
            is_array: false,
            value: None,
        }
    }
}

pub fn encode(entries: &[WireEntry]) -> Vec<u8> {
    bincode::serialize(entries).unwrap_or_default()
}

pub fn decode(payload: &[u8]) -> core::result::Result<Vec<WireEntry>, bincode::Error> {
    bincode::deserialize(payload)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn decoder(&self, format: Option<u16>, payload: &[u8], _base: &UriPath) -> Result<Box<dyn Decoder>> {
        if !matches!(format, None | Some(MOCK_FORMAT)) {
            return Err(DmError::UnsupportedContentFormat);
        }
        let entries = decode(payload).map_err(|err| {
            warn!("malformed payload: {}", err);
            DmError::BadRequest
        })?;
        Ok(Box::new(BincodeDecoder {
            entries,
            position: 0,
            instance: None,
        }))
    }

    fn encoder(&self, requested: Option<u16>, _base: &UriPath) -> Result<(u16, Box<dyn Encoder>)> {
        match requested {
            None | Some(MOCK_FORMAT) => Ok((MOCK_FORMAT, Box::new(BincodeEncoder::default()))),
            Some(_) => Err(DmError::NotAcceptable),
        }
    }
}

struct BincodeDecoder {
    entries: Vec<WireEntry>,
    position: usize,
    /// Instance ID substituted for `ID_INVALID`
    instance: Option<u16>,
}

impl Decoder for BincodeDecoder {
    fn get_path(&mut self) -> Result<Option<PayloadEntry>> {
        let Some(entry) = self.entries.get(self.position) else {
            return Ok(None);
        };
        let mut ids = entry.path.clone();
        if ids.get(1) == Some(&ID_INVALID) {
            match self.instance {
                Some(iid) => ids[1] = iid,
                None => ids.truncate(1),
            }
        }
        let path = UriPath::from_ids(&ids)?;
        Ok(Some(if entry.is_array {
            PayloadEntry::array(path)
        } else {
            PayloadEntry::value(path)
        }))
    }

    fn get_value(&mut self, _hint: ValueType) -> Result<Value> {
        self.entries
            .get(self.position)
            .and_then(|entry| entry.value.clone())
            .ok_or(DmError::BadRequest)
    }

    fn next_entry(&mut self) -> Result<()> {
        if self.position < self.entries.len() {
            self.position += 1;
        }
        Ok(())
    }

    fn update_root_path(&mut self, root: &UriPath) -> Result<()> {
        self.instance = root.iid();
        Ok(())
    }
}

#[derive(Default)]
struct BincodeEncoder {
    entries: Vec<WireEntry>,
    path: Option<UriPath>,
}

impl Encoder for BincodeEncoder {
    fn set_path(&mut self, path: &UriPath) -> Result<()> {
        if self.path.is_some() {
            return Err(DmError::Internal);
        }
        self.path = Some(*path);
        Ok(())
    }

    fn clear_path(&mut self) -> Result<()> {
        self.path = None;
        Ok(())
    }

    fn start_aggregate(&mut self) -> Result<()> {
        let path = self.path.ok_or(DmError::Internal)?;
        self.entries.push(WireEntry::array(path.ids()));
        Ok(())
    }

    fn put_value(&mut self, value: Value) -> Result<()> {
        let path = self.path.ok_or(DmError::Internal)?;
        self.entries.push(WireEntry::value(path.ids(), value));
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        bincode::serialize(&self.entries).map_err(|_| DmError::Internal)
    }
}
