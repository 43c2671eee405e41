//! In-memory Object

use std::collections::BTreeMap;
use std::sync::Arc;

use log::trace;
use spin::{Mutex, MutexGuard};

use lwm2m_dm::attributes::{OiAttributes, ResourceAttributes};
use lwm2m_dm::{
    DmError, DmObject, ExecuteCtx, Iid, InputCtx, InstanceListCtx, Oid, OutputCtx, ResourceInstanceListCtx,
    ResourceKind, ResourceListCtx, ResourcePresence, Result, Rid, Riid, Ssid, Value, ValueType,
};

/// Resource supported by every instance of a [`MockObject`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDef {
    pub rid: Rid,
    pub kind: ResourceKind,
    pub value_type: ValueType,
}

impl ResourceDef {
    pub const fn new(rid: Rid, kind: ResourceKind, value_type: ValueType) -> Self {
        Self { rid, kind, value_type }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Single(Value),
    Multiple(BTreeMap<Riid, Value>),
}

/// Everything a [`MockObject`] stores; restored on rollback
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectState {
    pub instances: BTreeMap<Iid, BTreeMap<Rid, StoredValue>>,
    pub object_attrs: BTreeMap<Ssid, OiAttributes>,
    pub instance_attrs: BTreeMap<(Iid, Ssid), OiAttributes>,
    pub resource_attrs: BTreeMap<(Iid, Rid, Option<Riid>, Ssid), ResourceAttributes>,
}

#[derive(Debug, Default)]
struct Shared {
    state: ObjectState,
    snapshot: Option<ObjectState>,
    calls: Vec<&'static str>,
    executions: Vec<(Iid, Rid, Vec<(u8, Option<String>)>)>,
    fail_validation: bool,
}

/// Object storing its instances in memory
pub struct MockObject {
    oid: Oid,
    version: Option<String>,
    resources: Vec<ResourceDef>,
    shared: Arc<Mutex<Shared>>,
}

impl MockObject {
    /// `resources` must be sorted by Resource ID
    pub fn new(oid: Oid, resources: &[ResourceDef]) -> Self {
        Self {
            oid,
            version: None,
            resources: resources.to_vec(),
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Handle sharing this object's state, usable after registration
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            oid: self.oid,
            shared: self.shared.clone(),
        }
    }

    fn def(&self, rid: Rid) -> Result<ResourceDef> {
        self.resources
            .iter()
            .find(|def| def.rid == rid)
            .copied()
            .ok_or(DmError::NotFound)
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock()
    }
}

fn instance_mut(state: &mut ObjectState, iid: Iid) -> Result<&mut BTreeMap<Rid, StoredValue>> {
    state.instances.get_mut(&iid).ok_or(DmError::NotFound)
}

impl DmObject for MockObject {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn list_instances(&mut self, ctx: &mut InstanceListCtx<'_>) -> Result<()> {
        let iids: Vec<Iid> = self.lock().state.instances.keys().copied().collect();
        for iid in iids {
            ctx.emit(iid);
        }
        Ok(())
    }

    fn instance_create(&mut self, iid: Iid) -> Result<()> {
        let mut shared = self.lock();
        shared.calls.push("instance_create");
        if shared.state.instances.contains_key(&iid) {
            return Err(DmError::BadRequest);
        }
        shared.state.instances.insert(iid, BTreeMap::new());
        Ok(())
    }

    fn instance_remove(&mut self, iid: Iid) -> Result<()> {
        let mut shared = self.lock();
        shared.calls.push("instance_remove");
        shared.state.instances.remove(&iid).ok_or(DmError::NotFound)?;
        shared.state.instance_attrs.retain(|&(i, _), _| i != iid);
        shared.state.resource_attrs.retain(|&(i, ..), _| i != iid);
        Ok(())
    }

    fn instance_reset(&mut self, iid: Iid) -> Result<()> {
        let mut shared = self.lock();
        shared.calls.push("instance_reset");
        instance_mut(&mut shared.state, iid)?.clear();
        Ok(())
    }

    fn list_resources(&mut self, iid: Iid, ctx: &mut ResourceListCtx<'_>) -> Result<()> {
        let shared = self.lock();
        let instance = shared.state.instances.get(&iid).ok_or(DmError::NotFound)?;
        for def in &self.resources {
            let presence = if instance.contains_key(&def.rid) {
                ResourcePresence::Present
            } else {
                ResourcePresence::Absent
            };
            ctx.emit_res(def.rid, def.kind, presence);
        }
        Ok(())
    }

    fn resource_read(&mut self, iid: Iid, rid: Rid, riid: Option<Riid>, out: &mut OutputCtx<'_>) -> Result<()> {
        let value = {
            let mut shared = self.lock();
            let instance = instance_mut(&mut shared.state, iid)?;
            match (instance.get(&rid), riid) {
                (Some(StoredValue::Single(value)), None) => value.clone(),
                (Some(StoredValue::Multiple(values)), Some(riid)) => {
                    values.get(&riid).cloned().ok_or(DmError::NotFound)?
                }
                _ => return Err(DmError::NotFound),
            }
        };
        out.ret_value(value)
    }

    fn resource_write(&mut self, iid: Iid, rid: Rid, riid: Option<Riid>, input: &mut InputCtx<'_>) -> Result<()> {
        let def = self.def(rid)?;
        let value = input.get_value(def.value_type)?;
        trace!("/{}/{}/{} <- {:?}", self.oid, iid, rid, value);
        let mut shared = self.lock();
        let instance = instance_mut(&mut shared.state, iid)?;
        match riid {
            None if !def.kind.is_multiple() => {
                instance.insert(rid, StoredValue::Single(value));
            }
            Some(riid) if def.kind.is_multiple() => {
                let entry = instance
                    .entry(rid)
                    .or_insert_with(|| StoredValue::Multiple(BTreeMap::new()));
                if let StoredValue::Multiple(values) = entry {
                    values.insert(riid, value);
                }
            }
            _ => return Err(DmError::BadRequest),
        }
        Ok(())
    }

    fn resource_execute(&mut self, iid: Iid, rid: Rid, ctx: &mut ExecuteCtx<'_>) -> Result<()> {
        let mut args = Vec::new();
        while let Some((arg, has_value)) = ctx.next_arg()? {
            let value = if has_value { Some(ctx.arg_value()?) } else { None };
            args.push((arg, value));
        }
        let mut shared = self.lock();
        instance_mut(&mut shared.state, iid)?;
        shared.executions.push((iid, rid, args));
        Ok(())
    }

    fn resource_reset(&mut self, iid: Iid, rid: Rid) -> Result<()> {
        let def = self.def(rid)?;
        let mut shared = self.lock();
        let instance = instance_mut(&mut shared.state, iid)?;
        if def.kind.is_multiple() {
            instance.insert(rid, StoredValue::Multiple(BTreeMap::new()));
        } else {
            instance.remove(&rid);
        }
        Ok(())
    }

    fn list_resource_instances(&mut self, iid: Iid, rid: Rid, ctx: &mut ResourceInstanceListCtx<'_>) -> Result<()> {
        let shared = self.lock();
        let instance = shared.state.instances.get(&iid).ok_or(DmError::NotFound)?;
        match instance.get(&rid) {
            Some(StoredValue::Multiple(values)) => {
                for &riid in values.keys() {
                    ctx.emit(riid);
                }
                Ok(())
            }
            Some(StoredValue::Single(_)) => Err(DmError::MethodNotAllowed),
            None => Ok(()),
        }
    }

    fn object_read_default_attrs(&mut self, ssid: Ssid) -> Result<OiAttributes> {
        Ok(self.lock().state.object_attrs.get(&ssid).copied().unwrap_or_default())
    }

    fn object_write_default_attrs(&mut self, ssid: Ssid, attrs: &OiAttributes) -> Result<()> {
        self.lock().state.object_attrs.insert(ssid, *attrs);
        Ok(())
    }

    fn instance_read_default_attrs(&mut self, iid: Iid, ssid: Ssid) -> Result<OiAttributes> {
        Ok(self
            .lock()
            .state
            .instance_attrs
            .get(&(iid, ssid))
            .copied()
            .unwrap_or_default())
    }

    fn instance_write_default_attrs(&mut self, iid: Iid, ssid: Ssid, attrs: &OiAttributes) -> Result<()> {
        self.lock().state.instance_attrs.insert((iid, ssid), *attrs);
        Ok(())
    }

    fn resource_read_attrs(&mut self, iid: Iid, rid: Rid, ssid: Ssid) -> Result<ResourceAttributes> {
        Ok(self
            .lock()
            .state
            .resource_attrs
            .get(&(iid, rid, None, ssid))
            .copied()
            .unwrap_or_default())
    }

    fn resource_write_attrs(&mut self, iid: Iid, rid: Rid, ssid: Ssid, attrs: &ResourceAttributes) -> Result<()> {
        self.lock().state.resource_attrs.insert((iid, rid, None, ssid), *attrs);
        Ok(())
    }

    fn resource_instance_read_attrs(
        &mut self,
        iid: Iid,
        rid: Rid,
        riid: Riid,
        ssid: Ssid,
    ) -> Result<ResourceAttributes> {
        Ok(self
            .lock()
            .state
            .resource_attrs
            .get(&(iid, rid, Some(riid), ssid))
            .copied()
            .unwrap_or_default())
    }

    fn resource_instance_write_attrs(
        &mut self,
        iid: Iid,
        rid: Rid,
        riid: Riid,
        ssid: Ssid,
        attrs: &ResourceAttributes,
    ) -> Result<()> {
        self.lock()
            .state
            .resource_attrs
            .insert((iid, rid, Some(riid), ssid), *attrs);
        Ok(())
    }

    fn transaction_begin(&mut self) -> Result<()> {
        let mut shared = self.lock();
        shared.calls.push("transaction_begin");
        shared.snapshot = Some(shared.state.clone());
        Ok(())
    }

    fn transaction_validate(&mut self) -> Result<()> {
        let mut shared = self.lock();
        shared.calls.push("transaction_validate");
        if shared.fail_validation {
            return Err(DmError::Handler(-1));
        }
        Ok(())
    }

    fn transaction_commit(&mut self) -> Result<()> {
        let mut shared = self.lock();
        shared.calls.push("transaction_commit");
        shared.snapshot = None;
        Ok(())
    }

    fn transaction_rollback(&mut self) -> Result<()> {
        let mut shared = self.lock();
        shared.calls.push("transaction_rollback");
        if let Some(snapshot) = shared.snapshot.take() {
            shared.state = snapshot;
        }
        Ok(())
    }
}

/// Shared view of a [`MockObject`]'s state
///
/// Must not be used while the data model is calling into the object.
#[derive(Clone)]
pub struct MockHandle {
    oid: Oid,
    shared: Arc<Mutex<Shared>>,
}

impl MockHandle {
    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// Add instance `iid` holding `values`
    pub fn add_instance(&self, iid: Iid, values: &[(Rid, Value)]) {
        let mut shared = self.shared.lock();
        let instance = shared.state.instances.entry(iid).or_default();
        for (rid, value) in values {
            instance.insert(*rid, StoredValue::Single(value.clone()));
        }
    }

    pub fn remove_instance(&self, iid: Iid) -> bool {
        self.shared.lock().state.instances.remove(&iid).is_some()
    }

    pub fn set(&self, iid: Iid, rid: Rid, value: Value) {
        let mut shared = self.shared.lock();
        shared
            .state
            .instances
            .entry(iid)
            .or_default()
            .insert(rid, StoredValue::Single(value));
    }

    pub fn set_multiple(&self, iid: Iid, rid: Rid, values: &[(Riid, Value)]) {
        let mut shared = self.shared.lock();
        let map = values.iter().cloned().collect();
        shared
            .state
            .instances
            .entry(iid)
            .or_default()
            .insert(rid, StoredValue::Multiple(map));
    }

    pub fn instance_ids(&self) -> Vec<Iid> {
        self.shared.lock().state.instances.keys().copied().collect()
    }

    pub fn has_instance(&self, iid: Iid) -> bool {
        self.shared.lock().state.instances.contains_key(&iid)
    }

    /// Value of a single-instance resource
    pub fn value(&self, iid: Iid, rid: Rid) -> Option<Value> {
        match self.shared.lock().state.instances.get(&iid)?.get(&rid)? {
            StoredValue::Single(value) => Some(value.clone()),
            StoredValue::Multiple(_) => None,
        }
    }

    /// Resource instances of a multiple resource
    pub fn values(&self, iid: Iid, rid: Rid) -> Option<BTreeMap<Riid, Value>> {
        match self.shared.lock().state.instances.get(&iid)?.get(&rid)? {
            StoredValue::Multiple(values) => Some(values.clone()),
            StoredValue::Single(_) => None,
        }
    }

    pub fn state(&self) -> ObjectState {
        self.shared.lock().state.clone()
    }

    /// Handler calls made so far (creation, removal, reset, transactions)
    pub fn calls(&self) -> Vec<&'static str> {
        self.shared.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.shared.lock().calls.clear();
    }

    /// Executions as `(iid, rid, [(argument, value)])`
    pub fn executions(&self) -> Vec<(Iid, Rid, Vec<(u8, Option<String>)>)> {
        self.shared.lock().executions.clone()
    }

    /// Make `transaction_validate` fail
    pub fn fail_validation(&self, fail: bool) {
        self.shared.lock().fail_validation = fail;
    }
}
