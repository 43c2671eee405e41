//! Hooks into the collaborators around the data model
//!
//! Registration, Observe and notification delivery live outside this
//! crate. The data model reaches them through [`DmHooks`]; every hook is
//! best-effort, so failures are logged by the caller and never undo a
//! change that already happened.

use crate::attributes::RequestAttributes;
use crate::error::Result;
use crate::ids::{Ssid, UriPath};
use crate::notify::NotifyQueue;
use crate::request::Observe;

pub trait DmHooks: Send {
    /// The set of registered Objects or instances changed; `ssid` is
    /// `SSID_ANY` for all servers
    fn schedule_registration_update(&mut self, _ssid: Ssid) -> Result<()> {
        Ok(())
    }

    /// Deliver changes to the Observe subsystem
    fn notify(&mut self, _origin: Ssid, _queue: &NotifyQueue) -> Result<()> {
        Ok(())
    }

    /// Read with the Observe option was served for `uri`
    fn observe(
        &mut self,
        _ssid: Ssid,
        _uri: &UriPath,
        _observe: Observe,
        _content_format: u16,
    ) -> Result<()> {
        Ok(())
    }

    /// Write-Attributes succeeded on `uri`
    fn attributes_changed(&mut self, _ssid: Ssid, _uri: &UriPath, _attrs: &RequestAttributes) -> Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl DmHooks for NoopHooks {}
