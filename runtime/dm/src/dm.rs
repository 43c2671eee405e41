//! Data model context
//!
//! [`DataModel`] owns everything the core works with: the object registry,
//! installed modules, the transaction state, the scheduled notify queue,
//! the hooks into outer layers, the payload codec and the configuration.
//! It is created once per client and torn down with it.

use log::{debug, info, warn};

use crate::config::DmConfig;
use crate::error::{update_result, DmError, Result};
use crate::hooks::{DmHooks, NoopHooks};
use crate::ids::{Iid, Oid, Rid, Ssid, SSID_ANY, SSID_BOOTSTRAP};
use crate::io::Codec;
use crate::notify::NotifyQueue;
use crate::object::DmObject;
use crate::registry::{DmModule, ObjectRegistry};
use crate::transaction::TransactionState;

pub struct DataModel {
    pub(crate) objects: ObjectRegistry,
    modules: Vec<Box<dyn DmModule>>,
    pub(crate) transaction: TransactionState,
    /// Changes reported by the application, delivered by
    /// [`DataModel::flush_scheduled_notifications`]
    scheduled_notify: NotifyQueue,
    pub(crate) hooks: Box<dyn DmHooks>,
    pub(crate) codec: Option<Box<dyn Codec>>,
    pub(crate) config: DmConfig,
    pub(crate) access_sync_in_progress: bool,
}

impl DataModel {
    pub fn new(config: DmConfig) -> Self {
        Self {
            objects: ObjectRegistry::new(),
            modules: Vec::new(),
            transaction: TransactionState::default(),
            scheduled_notify: NotifyQueue::new(),
            hooks: Box::new(NoopHooks),
            codec: None,
            config,
            access_sync_in_progress: false,
        }
    }

    pub fn with_hooks(mut self, hooks: Box<dyn DmHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Codec used for request and response payloads
    pub fn with_codec(mut self, codec: Box<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn config(&self) -> &DmConfig {
        &self.config
    }

    /// Register `object`
    ///
    /// The change is announced as an instance set change of the new Object
    /// and a registration update is scheduled. Failures of those are only
    /// logged.
    pub fn register_object(&mut self, object: Box<dyn DmObject>) -> Result<()> {
        let oid = object.oid();
        self.objects.insert(object)?;
        info!("registered object /{}", oid);

        if let Err(err) = self.notify_instances_changed_now(oid) {
            warn!("could not notify about instances of /{}: {}", oid, err);
        }
        self.schedule_registration_update();
        Ok(())
    }

    /// Unregister object `oid` and hand it back
    ///
    /// If the object takes part in a running transaction it is rolled back
    /// first. Notifications scheduled for it are discarded.
    pub fn unregister_object(&mut self, oid: Oid) -> Result<Box<dyn DmObject>> {
        let mut object = self.objects.remove(oid)?;
        if self.transaction.forget(oid) {
            if let Err(err) = object.transaction_rollback() {
                warn!("/{}: rollback on unregister failed: {}", oid, err);
            }
        }
        info!("unregistered object /{}", oid);

        if let Err(err) = self.notify_instances_changed_now(oid) {
            warn!("could not notify about instances of /{}: {}", oid, err);
        }
        self.scheduled_notify.remove_object(oid);
        self.schedule_registration_update();
        Ok(object)
    }

    /// # Errors
    /// `NotFound` if `oid` is not registered
    pub(crate) fn object_mut(&mut self, oid: Oid) -> Result<&mut (dyn DmObject + 'static)> {
        self.objects.find_mut(oid).ok_or(DmError::NotFound)
    }

    /// Object `oid`, made part of the running transaction
    pub(crate) fn touch_object(&mut self, oid: Oid) -> Result<&mut (dyn DmObject + 'static)> {
        let obj = self.objects.find_mut(oid).ok_or(DmError::NotFound)?;
        self.transaction.include_object(&mut *obj)?;
        Ok(obj)
    }

    /// Registered Object IDs, ascending
    pub fn object_ids(&self) -> Vec<Oid> {
        self.objects.oids()
    }

    /// Install a module; names must be unique
    pub fn install_module(&mut self, module: Box<dyn DmModule>) -> Result<()> {
        if self.module(module.name()).is_some() {
            warn!("module {} is already installed", module.name());
            return Err(DmError::BadRequest);
        }
        debug!("installed module {}", module.name());
        self.modules.push(module);
        Ok(())
    }

    pub fn module(&self, name: &str) -> Option<&dyn DmModule> {
        self.modules
            .iter()
            .find(|m| m.name() == name)
            .map(|m| m.as_ref())
    }

    /// Drop every object and module, running module cleanup callbacks
    pub fn cleanup(&mut self) {
        if !self.objects.is_empty() || !self.modules.is_empty() {
            debug!(
                "cleaning up {} objects and {} modules",
                self.objects.len(),
                self.modules.len()
            );
        }
        self.objects.clear();
        for mut module in self.modules.drain(..) {
            module.on_cleanup();
        }
        self.scheduled_notify = NotifyQueue::new();
        self.transaction = TransactionState::default();
    }

    /// Application reports that `/oid/iid/rid` changed
    pub fn notify_changed(&mut self, oid: Oid, iid: Iid, rid: Rid) {
        self.scheduled_notify.resource_change(oid, iid, rid);
    }

    /// Application reports that instances of `oid` were added or removed
    pub fn notify_instances_changed(&mut self, oid: Oid) {
        self.scheduled_notify.instance_set_unknown_change(oid);
    }

    /// Deliver everything reported through `notify_*`
    pub fn flush_scheduled_notifications(&mut self) -> Result<()> {
        let queue = self.scheduled_notify.take();
        if queue.is_empty() {
            return Ok(());
        }
        self.notify_flush(SSID_BOOTSTRAP, queue)
    }

    fn notify_instances_changed_now(&mut self, oid: Oid) -> Result<()> {
        let mut queue = NotifyQueue::new();
        queue.instance_set_unknown_change(oid);
        self.notify_flush(SSID_BOOTSTRAP, queue)
    }

    fn schedule_registration_update(&mut self) {
        if let Err(err) = self.hooks.schedule_registration_update(SSID_ANY) {
            warn!("could not schedule registration update: {}", err);
        }
    }

    /// Process and consume `queue`
    pub fn notify_flush(&mut self, origin: Ssid, queue: NotifyQueue) -> Result<()> {
        self.notify_perform(origin, &queue)
    }

    /// Deliver `queue`, originating from server `origin`
    ///
    /// Runs Access Control synchronization, then hands the queue to the
    /// Observe hook, then schedules a registration update if any instance
    /// set changed. The first error is returned; the later steps still run.
    pub fn notify_perform(&mut self, origin: Ssid, queue: &NotifyQueue) -> Result<()> {
        let mut result = Ok(());
        update_result(&mut result, self.sync_access_control(origin, queue));
        if let Err(err) = self.hooks.notify(origin, queue) {
            warn!("notification delivery failed: {}", err);
        }
        if queue.any_instance_set_changed() {
            self.schedule_registration_update();
        }
        result
    }
}

impl Drop for DataModel {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Iid;
    use crate::iterate::{InstanceListCtx, ResourceListCtx};
    use spin::Mutex;
    use std::sync::Arc;

    struct Plain(Oid);

    impl DmObject for Plain {
        fn oid(&self) -> Oid {
            self.0
        }

        fn list_instances(&mut self, _ctx: &mut InstanceListCtx<'_>) -> Result<()> {
            Ok(())
        }

        fn list_resources(&mut self, _iid: Iid, _ctx: &mut ResourceListCtx<'_>) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Counts {
        updates: u32,
        notifies: u32,
        cleanups: u32,
    }

    struct CountingHooks(Arc<Mutex<Counts>>);

    impl DmHooks for CountingHooks {
        fn schedule_registration_update(&mut self, _ssid: Ssid) -> Result<()> {
            self.0.lock().updates += 1;
            Err(DmError::ServiceUnavailable)
        }

        fn notify(&mut self, _origin: Ssid, _queue: &NotifyQueue) -> Result<()> {
            self.0.lock().notifies += 1;
            Ok(())
        }
    }

    struct Module(Arc<Mutex<Counts>>);

    impl DmModule for Module {
        fn name(&self) -> &str {
            "counter"
        }

        fn on_cleanup(&mut self) {
            self.0.lock().cleanups += 1;
        }

        fn as_any(&self) -> &dyn core::any::Any {
            self
        }
    }

    #[test]
    fn test_register_schedules_update_despite_failure() {
        let counts = Arc::new(Mutex::new(Counts::default()));
        let mut dm = DataModel::new(DmConfig::default()).with_hooks(Box::new(CountingHooks(counts.clone())));
        assert_eq!(dm.register_object(Box::new(Plain(10))), Ok(()));
        assert_eq!(dm.object_ids(), vec![10]);
        // one from the instance set change, one from the registration itself
        assert_eq!(counts.lock().updates, 2);
        assert_eq!(counts.lock().notifies, 1);
    }

    #[test]
    fn test_unregister_discards_scheduled_notifications() {
        let mut dm = DataModel::new(DmConfig::default());
        dm.register_object(Box::new(Plain(10))).unwrap();
        dm.register_object(Box::new(Plain(11))).unwrap();
        dm.notify_changed(10, 0, 1);
        dm.notify_changed(11, 0, 1);
        let object = dm.unregister_object(10).unwrap();
        assert_eq!(object.oid(), 10);
        assert!(dm.scheduled_notify.get(10).is_none());
        assert!(dm.scheduled_notify.get(11).is_some());
        assert_eq!(
            dm.unregister_object(10).err(),
            Some(DmError::ObjectNotRegistered { oid: 10 })
        );
    }

    #[test]
    fn test_modules_are_cleaned_up() {
        let counts = Arc::new(Mutex::new(Counts::default()));
        let mut dm = DataModel::new(DmConfig::default());
        dm.install_module(Box::new(Module(counts.clone()))).unwrap();
        assert_eq!(
            dm.install_module(Box::new(Module(counts.clone()))),
            Err(DmError::BadRequest)
        );
        assert!(dm.module("counter").is_some());
        dm.cleanup();
        assert!(dm.module("counter").is_none());
        assert_eq!(counts.lock().cleanups, 1);
    }
}
