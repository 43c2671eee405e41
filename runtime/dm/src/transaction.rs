//! Data model transactions
//!
//! Mutating operations run between `begin` and `finish`. Each Object taking
//! part gets exactly one `transaction_begin` call, when it is first touched
//! ([`TransactionState::include_object`]). Transactions nest: only the
//! outermost `finish` talks to the Objects, first validating all of them,
//! then either committing all of them or rolling all of them back.
//!
//! An error from a nested transaction is returned to its caller, which is
//! expected to propagate it up to the outermost `finish`.

use std::collections::BTreeSet;

use log::{debug, error, warn};

use crate::error::{update_result, DmError, Result};
use crate::ids::Oid;
use crate::object::DmObject;
use crate::registry::ObjectRegistry;

#[derive(Debug, Default)]
pub struct TransactionState {
    depth: u32,
    objects: BTreeSet<Oid>,
}

impl TransactionState {
    pub fn begin(&mut self) {
        self.depth += 1;
        debug!("transaction begin (depth {})", self.depth);
    }

    #[inline]
    pub fn in_progress(&self) -> bool {
        self.depth > 0
    }

    /// Make `obj` part of the current transaction
    pub fn include_object(&mut self, obj: &mut dyn DmObject) -> Result<()> {
        if self.depth == 0 {
            error!("/{} touched outside of a transaction", obj.oid());
            return Err(DmError::Internal);
        }
        let oid = obj.oid();
        if self.objects.contains(&oid) {
            return Ok(());
        }
        obj.transaction_begin().map_err(|err| {
            warn!("/{}: transaction_begin failed: {}", oid, err);
            err
        })?;
        self.objects.insert(oid);
        Ok(())
    }

    /// Drop `oid` from the transaction without finishing it (used when the
    /// object is unregistered mid-transaction)
    pub fn forget(&mut self, oid: Oid) -> bool {
        self.objects.remove(&oid)
    }

    /// Close one transaction level
    ///
    /// `result` is the outcome of the work done inside it. At the outermost
    /// level a successful `result` leads to validation and commit; any
    /// failure leads to rollback. Returns the combined result.
    pub fn finish(&mut self, registry: &mut ObjectRegistry, result: Result<()>) -> Result<()> {
        if self.depth == 0 {
            error!("transaction finished more times than begun");
            return Err(DmError::Internal);
        }
        self.depth -= 1;
        if self.depth > 0 {
            return result;
        }

        let objects = core::mem::take(&mut self.objects);
        let mut result = result;
        if result.is_ok() {
            for oid in &objects {
                if let Some(obj) = registry.find_mut(*oid) {
                    if let Err(err) = obj.transaction_validate() {
                        warn!("/{}: transaction validation failed: {}", oid, err);
                        // a failed validation is the peer's fault
                        result = Err(match err {
                            DmError::Handler(_) => DmError::BadRequest,
                            other => other,
                        });
                        break;
                    }
                }
            }
        }

        let mut final_result = result;
        for oid in &objects {
            let Some(obj) = registry.find_mut(*oid) else {
                continue;
            };
            let step = if result.is_ok() {
                obj.transaction_commit()
            } else {
                obj.transaction_rollback()
            };
            if let Err(err) = step {
                error!(
                    "/{}: transaction {} failed: {}",
                    oid,
                    if result.is_ok() { "commit" } else { "rollback" },
                    err
                );
                update_result(&mut final_result, Err(err));
            }
        }
        debug!(
            "transaction {} ({} objects)",
            if result.is_ok() { "committed" } else { "rolled back" },
            objects.len()
        );
        final_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Iid;
    use crate::iterate::{InstanceListCtx, ResourceListCtx};
    use spin::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Calls {
        log: Vec<&'static str>,
        fail_validate: bool,
    }

    struct Tracked {
        oid: Oid,
        calls: Arc<Mutex<Calls>>,
    }

    impl DmObject for Tracked {
        fn oid(&self) -> Oid {
            self.oid
        }

        fn list_instances(&mut self, _ctx: &mut InstanceListCtx<'_>) -> Result<()> {
            Ok(())
        }

        fn list_resources(&mut self, _iid: Iid, _ctx: &mut ResourceListCtx<'_>) -> Result<()> {
            Ok(())
        }

        fn transaction_begin(&mut self) -> Result<()> {
            self.calls.lock().log.push("begin");
            Ok(())
        }

        fn transaction_validate(&mut self) -> Result<()> {
            let mut calls = self.calls.lock();
            calls.log.push("validate");
            if calls.fail_validate {
                Err(DmError::Handler(-1))
            } else {
                Ok(())
            }
        }

        fn transaction_commit(&mut self) -> Result<()> {
            self.calls.lock().log.push("commit");
            Ok(())
        }

        fn transaction_rollback(&mut self) -> Result<()> {
            self.calls.lock().log.push("rollback");
            Ok(())
        }
    }

    fn setup() -> (ObjectRegistry, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut registry = ObjectRegistry::new();
        registry
            .insert(Box::new(Tracked { oid: 4, calls: calls.clone() }))
            .unwrap();
        (registry, calls)
    }

    fn include(state: &mut TransactionState, registry: &mut ObjectRegistry) {
        state.include_object(registry.find_mut(4).unwrap()).unwrap();
    }

    #[test]
    fn test_nested_commit_happens_once() {
        let (mut registry, calls) = setup();
        let mut state = TransactionState::default();
        state.begin();
        include(&mut state, &mut registry);
        state.begin();
        include(&mut state, &mut registry);
        assert_eq!(state.finish(&mut registry, Ok(())), Ok(()));
        assert_eq!(calls.lock().log, vec!["begin"]);
        assert_eq!(state.finish(&mut registry, Ok(())), Ok(()));
        assert_eq!(calls.lock().log, vec!["begin", "validate", "commit"]);
        assert!(!state.in_progress());
    }

    #[test]
    fn test_failure_rolls_back() {
        let (mut registry, calls) = setup();
        let mut state = TransactionState::default();
        state.begin();
        include(&mut state, &mut registry);
        assert_eq!(
            state.finish(&mut registry, Err(DmError::NotFound)),
            Err(DmError::NotFound)
        );
        assert_eq!(calls.lock().log, vec!["begin", "rollback"]);
    }

    #[test]
    fn test_validation_failure_rolls_back() {
        let (mut registry, calls) = setup();
        calls.lock().fail_validate = true;
        let mut state = TransactionState::default();
        state.begin();
        include(&mut state, &mut registry);
        assert_eq!(state.finish(&mut registry, Ok(())), Err(DmError::BadRequest));
        assert_eq!(calls.lock().log, vec!["begin", "validate", "rollback"]);
    }

    #[test]
    fn test_unbalanced_finish() {
        let (mut registry, _) = setup();
        let mut state = TransactionState::default();
        assert_eq!(state.finish(&mut registry, Ok(())), Err(DmError::Internal));
        assert_eq!(
            state.include_object(registry.find_mut(4).unwrap()),
            Err(DmError::Internal)
        );
    }
}
