//! Object registry
//!
//! Registered Objects are kept in a `Vec` sorted by Object ID. The number of
//! objects in a client is small (tens), so lookups are linear scans.

use log::error;

use crate::error::{DmError, Result};
use crate::ids::{Oid, ID_INVALID};
use crate::object::DmObject;

/// Ordered collection of registered Objects
#[derive(Default)]
pub struct ObjectRegistry {
    objects: Vec<Box<dyn DmObject>>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `object` keeping the OID order
    ///
    /// # Errors
    /// - `BadRequest` if the object reports the reserved OID 65535
    /// - `ObjectAlreadyRegistered` if its OID is taken
    pub fn insert(&mut self, object: Box<dyn DmObject>) -> Result<()> {
        let oid = object.oid();
        if oid == ID_INVALID {
            error!("cannot register object with reserved ID 65535");
            return Err(DmError::BadRequest);
        }
        let mut index = self.objects.len();
        for (i, registered) in self.objects.iter().enumerate() {
            let registered_oid = registered.oid();
            if registered_oid == oid {
                error!("object /{} is already registered", oid);
                return Err(DmError::ObjectAlreadyRegistered { oid });
            }
            if registered_oid > oid {
                index = i;
                break;
            }
        }
        self.objects.insert(index, object);
        Ok(())
    }

    /// Take object `oid` out of the registry
    pub fn remove(&mut self, oid: Oid) -> Result<Box<dyn DmObject>> {
        let index = self
            .objects
            .iter()
            .position(|obj| obj.oid() == oid)
            .ok_or(DmError::ObjectNotRegistered { oid })?;
        Ok(self.objects.remove(index))
    }

    pub fn contains(&self, oid: Oid) -> bool {
        self.objects.iter().any(|obj| obj.oid() == oid)
    }

    pub fn find_mut(&mut self, oid: Oid) -> Option<&mut (dyn DmObject + 'static)> {
        self.objects
            .iter_mut()
            .find(|obj| obj.oid() == oid)
            .map(|obj| obj.as_mut())
    }

    /// Registered Object IDs, ascending
    pub fn oids(&self) -> Vec<Oid> {
        self.objects.iter().map(|obj| obj.oid()).collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drop every registered object
    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

/// Component installed into the data model next to its objects
///
/// Modules are looked up by name and torn down by `DataModel::cleanup`.
pub trait DmModule: Send {
    fn name(&self) -> &str;

    fn on_cleanup(&mut self) {}

    fn as_any(&self) -> &dyn core::any::Any;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterate::{InstanceListCtx, ResourceListCtx};
    use crate::ids::Iid;

    struct Empty(Oid);

    impl DmObject for Empty {
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

    #[test]
    fn test_insert_keeps_order() {
        let mut registry = ObjectRegistry::new();
        for oid in [10, 1, 3, 0] {
            registry.insert(Box::new(Empty(oid))).unwrap();
        }
        assert_eq!(registry.oids(), vec![0, 1, 3, 10]);
        assert!(registry.contains(3));
        assert!(!registry.contains(4));
    }

    #[test]
    fn test_insert_rejects_duplicates_and_reserved() {
        let mut registry = ObjectRegistry::new();
        registry.insert(Box::new(Empty(3))).unwrap();
        assert_eq!(
            registry.insert(Box::new(Empty(3))).err(),
            Some(DmError::ObjectAlreadyRegistered { oid: 3 })
        );
        assert_eq!(
            registry.insert(Box::new(Empty(ID_INVALID))).err(),
            Some(DmError::BadRequest)
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut registry = ObjectRegistry::new();
        registry.insert(Box::new(Empty(5))).unwrap();
        assert_eq!(registry.remove(5).map(|obj| obj.oid()).ok(), Some(5));
        assert!(registry.is_empty());
        assert_eq!(
            registry.remove(5).err(),
            Some(DmError::ObjectNotRegistered { oid: 5 })
        );
    }
}
