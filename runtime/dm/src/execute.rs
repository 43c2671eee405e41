//! Execute argument parsing
//!
//! An Execute payload is either empty or a comma-separated list of
//! arguments, each a single digit optionally followed by `='value'`:
//!
//! ```text
//! 0,1='http://example.com',5
//! ```
//!
//! A malformed payload is reported as `BadRequest` by the first
//! [`ExecuteCtx::next_arg`] call.

use crate::error::{DmError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ExecuteArg {
    arg: u8,
    value: Option<String>,
}

fn parse_args(payload: &[u8]) -> Result<Vec<ExecuteArg>> {
    let mut args = Vec::new();
    let mut pos = 0;
    while pos < payload.len() {
        let arg = match payload[pos] {
            digit @ b'0'..=b'9' => digit - b'0',
            _ => return Err(DmError::BadRequest),
        };
        pos += 1;

        let mut value = None;
        if payload.get(pos) == Some(&b'=') {
            if payload.get(pos + 1) != Some(&b'\'') {
                return Err(DmError::BadRequest);
            }
            let start = pos + 2;
            let len = payload[start.min(payload.len())..]
                .iter()
                .position(|&b| b == b'\'')
                .ok_or(DmError::BadRequest)?;
            let text = core::str::from_utf8(&payload[start..start + len])
                .map_err(|_| DmError::BadRequest)?;
            value = Some(text.to_owned());
            pos = start + len + 1;
        }
        args.push(ExecuteArg { arg, value });

        match payload.get(pos) {
            None => {}
            // trailing comma is not allowed
            Some(b',') if pos + 1 < payload.len() => pos += 1,
            Some(_) => return Err(DmError::BadRequest),
        }
    }
    Ok(args)
}

/// Argument reader handed to `resource_execute`
#[derive(Debug)]
pub struct ExecuteCtx<'a> {
    payload: &'a [u8],
    args: Option<Result<Vec<ExecuteArg>>>,
    current: Option<usize>,
}

impl<'a> ExecuteCtx<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            payload,
            args: None,
            current: None,
        }
    }

    fn args(&mut self) -> Result<&[ExecuteArg]> {
        let payload = self.payload;
        match self.args.get_or_insert_with(|| parse_args(payload)) {
            Ok(args) => Ok(args.as_slice()),
            Err(err) => Err(*err),
        }
    }

    /// Advance to the next argument
    ///
    /// Returns the argument number and whether it carries a value, or
    /// `None` when all arguments were consumed.
    pub fn next_arg(&mut self) -> Result<Option<(u8, bool)>> {
        let next = self.current.map_or(0, |i| i + 1);
        let args = self.args()?;
        let found = args.get(next).map(|a| (a.arg, a.value.is_some()));
        if found.is_some() {
            self.current = Some(next);
        }
        Ok(found)
    }

    /// Value of the current argument
    ///
    /// # Errors
    /// `BadRequest` if no argument is current or it has no value
    pub fn arg_value(&mut self) -> Result<String> {
        let current = self.current.ok_or(DmError::BadRequest)?;
        let args = self.args()?;
        args.get(current)
            .and_then(|a| a.value.clone())
            .ok_or(DmError::BadRequest)
    }

    /// Raw payload bytes
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }
}
