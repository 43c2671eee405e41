//! Object handler interface
//!
//! # Purpose
//! An LwM2M Object is anything implementing [`DmObject`]. The data model
//! owns registered objects as `Box<dyn DmObject>` and never sees concrete
//! types; which handlers an object overrides decides what it supports.
//!
//! # Handler Contract
//! - `list_*` handlers emit identifiers in strictly ascending order and never
//!   emit `0xFFFF`. Violations are reported as internal errors.
//! - A handler that is not overridden answers `NotImplemented`, except
//!   transaction handlers (no-op success) and attribute reads (empty
//!   attribute set).
//! - Handlers must not modify the collection they are listing while a
//!   `list_*` call is in progress.

use crate::attributes::{OiAttributes, ResourceAttributes};
use crate::error::{DmError, Result};
use crate::execute::ExecuteCtx;
use crate::ids::{Iid, Oid, Rid, Riid, Ssid};
use crate::io::{InputCtx, OutputCtx};
use crate::iterate::{InstanceListCtx, ResourceInstanceListCtx, ResourceListCtx};

/// Operations and multiplicity allowed on a Resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Read-only, single instance
    R,
    /// Write-only, single instance
    W,
    /// Read/write, single instance
    Rw,
    /// Read-only, multiple instances
    Rm,
    /// Write-only, multiple instances
    Wm,
    /// Read/write, multiple instances
    Rwm,
    /// Executable
    E,
    /// Readable and writable only by the Bootstrap Server
    BsRw,
}

impl ResourceKind {
    pub fn is_multiple(self) -> bool {
        matches!(self, ResourceKind::Rm | ResourceKind::Wm | ResourceKind::Rwm)
    }

    pub fn is_readable(self) -> bool {
        matches!(
            self,
            ResourceKind::R | ResourceKind::Rw | ResourceKind::Rm | ResourceKind::Rwm
        )
    }

    pub fn is_writable(self) -> bool {
        matches!(
            self,
            ResourceKind::W | ResourceKind::Rw | ResourceKind::Wm | ResourceKind::Rwm
        )
    }

    pub fn is_executable(self) -> bool {
        self == ResourceKind::E
    }

    /// Writable by the Bootstrap Server
    pub fn is_bootstrappable(self) -> bool {
        self != ResourceKind::E
    }

    /// Readable by the server identified as bootstrap (`bootstrap == true`)
    /// or by a regular LwM2M Server
    pub fn is_readable_by(self, bootstrap: bool) -> bool {
        self.is_readable() || (bootstrap && self == ResourceKind::BsRw)
    }

    pub fn is_writable_by(self, bootstrap: bool) -> bool {
        if bootstrap {
            self.is_bootstrappable()
        } else {
            self.is_writable()
        }
    }
}

/// Whether a listed Resource currently holds a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourcePresence {
    Present,
    Absent,
}

/// LwM2M Object handlers
pub trait DmObject: Send {
    /// Object ID; must stay constant while the object is registered
    fn oid(&self) -> Oid;

    /// Object version reported by Discover and Register (`None` means 1.0)
    fn version(&self) -> Option<&str> {
        None
    }

    /// Emit every Instance ID, ascending
    fn list_instances(&mut self, ctx: &mut InstanceListCtx<'_>) -> Result<()>;

    fn instance_create(&mut self, _iid: Iid) -> Result<()> {
        Err(DmError::NotImplemented)
    }

    fn instance_remove(&mut self, _iid: Iid) -> Result<()> {
        Err(DmError::NotImplemented)
    }

    /// Bring an instance back to its just-created state
    fn instance_reset(&mut self, _iid: Iid) -> Result<()> {
        Err(DmError::NotImplemented)
    }

    /// Emit every Resource supported by the instance, ascending
    fn list_resources(&mut self, iid: Iid, ctx: &mut ResourceListCtx<'_>) -> Result<()>;

    /// Return exactly one value through `out`
    ///
    /// `riid` is `Some` only for multiple-instance resources.
    fn resource_read(
        &mut self,
        _iid: Iid,
        _rid: Rid,
        _riid: Option<Riid>,
        _out: &mut OutputCtx<'_>,
    ) -> Result<()> {
        Err(DmError::NotImplemented)
    }

    fn resource_write(
        &mut self,
        _iid: Iid,
        _rid: Rid,
        _riid: Option<Riid>,
        _input: &mut InputCtx<'_>,
    ) -> Result<()> {
        Err(DmError::NotImplemented)
    }

    fn resource_execute(&mut self, _iid: Iid, _rid: Rid, _ctx: &mut ExecuteCtx<'_>) -> Result<()> {
        Err(DmError::NotImplemented)
    }

    /// Remove every Resource Instance of a multiple resource (or clear a
    /// single one)
    fn resource_reset(&mut self, _iid: Iid, _rid: Rid) -> Result<()> {
        Err(DmError::NotImplemented)
    }

    /// Emit every Resource Instance ID, ascending
    fn list_resource_instances(
        &mut self,
        _iid: Iid,
        _rid: Rid,
        _ctx: &mut ResourceInstanceListCtx<'_>,
    ) -> Result<()> {
        Err(DmError::NotImplemented)
    }

    fn object_read_default_attrs(&mut self, _ssid: Ssid) -> Result<OiAttributes> {
        Ok(OiAttributes::default())
    }

    fn object_write_default_attrs(&mut self, _ssid: Ssid, _attrs: &OiAttributes) -> Result<()> {
        Err(DmError::NotImplemented)
    }

    fn instance_read_default_attrs(&mut self, _iid: Iid, _ssid: Ssid) -> Result<OiAttributes> {
        Ok(OiAttributes::default())
    }

    fn instance_write_default_attrs(
        &mut self,
        _iid: Iid,
        _ssid: Ssid,
        _attrs: &OiAttributes,
    ) -> Result<()> {
        Err(DmError::NotImplemented)
    }

    fn resource_read_attrs(&mut self, _iid: Iid, _rid: Rid, _ssid: Ssid) -> Result<ResourceAttributes> {
        Ok(ResourceAttributes::default())
    }

    fn resource_write_attrs(
        &mut self,
        _iid: Iid,
        _rid: Rid,
        _ssid: Ssid,
        _attrs: &ResourceAttributes,
    ) -> Result<()> {
        Err(DmError::NotImplemented)
    }

    fn resource_instance_read_attrs(
        &mut self,
        _iid: Iid,
        _rid: Rid,
        _riid: Riid,
        _ssid: Ssid,
    ) -> Result<ResourceAttributes> {
        Ok(ResourceAttributes::default())
    }

    fn resource_instance_write_attrs(
        &mut self,
        _iid: Iid,
        _rid: Rid,
        _riid: Riid,
        _ssid: Ssid,
        _attrs: &ResourceAttributes,
    ) -> Result<()> {
        Err(DmError::NotImplemented)
    }

    fn transaction_begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// Check the object state is consistent before commit
    fn transaction_validate(&mut self) -> Result<()> {
        Ok(())
    }

    fn transaction_commit(&mut self) -> Result<()> {
        Ok(())
    }

    /// Restore the state from before `transaction_begin`
    fn transaction_rollback(&mut self) -> Result<()> {
        Ok(())
    }
}
