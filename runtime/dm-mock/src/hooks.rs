//! Hooks recording every call

use std::sync::Arc;

use spin::Mutex;

use lwm2m_dm::{DmHooks, NotifyQueue, Observe, RequestAttributes, Result, Ssid, UriPath};

#[derive(Debug, Default, Clone)]
pub struct HookLog {
    pub registration_updates: Vec<Ssid>,
    pub notifications: Vec<(Ssid, NotifyQueue)>,
    pub observations: Vec<(Ssid, UriPath, Observe, u16)>,
    pub attribute_changes: Vec<(Ssid, UriPath, RequestAttributes)>,
}

#[derive(Clone, Default)]
pub struct RecordingHooks {
    log: Arc<Mutex<HookLog>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn log(&self) -> HookLog {
        self.log.lock().clone()
    }

    pub fn clear(&self) {
        *self.log.lock() = HookLog::default();
    }
}

impl DmHooks for RecordingHooks {
    fn schedule_registration_update(&mut self, ssid: Ssid) -> Result<()> {
        self.log.lock().registration_updates.push(ssid);
        Ok(())
    }

    fn notify(&mut self, origin: Ssid, queue: &NotifyQueue) -> Result<()> {
        self.log.lock().notifications.push((origin, queue.clone()));
        Ok(())
    }

    fn observe(&mut self, ssid: Ssid, uri: &UriPath, observe: Observe, content_format: u16) -> Result<()> {
        self.log
            .lock()
            .observations
            .push((ssid, *uri, observe, content_format));
        Ok(())
    }

    fn attributes_changed(&mut self, ssid: Ssid, uri: &UriPath, attrs: &RequestAttributes) -> Result<()> {
        self.log.lock().attribute_changes.push((ssid, *uri, *attrs));
        Ok(())
    }
}
