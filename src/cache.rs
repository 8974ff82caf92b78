use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, error};

use crate::{any::RcAny, binding::BindingId, errors::DisposalError, finalizer::BoxedFinalizer, key::TypeKey};

/// Instances cached by one owner, keyed by the binding record that produced them
#[derive(Default)]
pub(crate) struct Cache {
    map: BTreeMap<BindingId, RcAny>,
    resolved: ResolvedSet,
}

impl Cache {
    #[inline]
    #[must_use]
    pub(crate) fn get(&self, id: BindingId) -> Option<RcAny> {
        self.map.get(&id).cloned()
    }

    /// Caches the instance unless the slot is already filled, returning the cached one
    pub(crate) fn insert(&mut self, id: BindingId, dependency: RcAny) -> RcAny {
        self.map.entry(id).or_insert(dependency).clone()
    }

    #[inline]
    pub(crate) fn push_resolved(&mut self, resolved: Resolved) {
        self.resolved.push(resolved);
    }

    #[inline]
    #[must_use]
    pub(crate) fn take_resolved_set(&mut self) -> ResolvedSet {
        core::mem::take(&mut self.resolved)
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn clear(&mut self) {
        self.map.clear();
    }
}

/// Cached instance waiting for its finalizer
pub(crate) struct Resolved {
    pub(crate) key: TypeKey,
    pub(crate) dependency: RcAny,
    pub(crate) finalizer: BoxedFinalizer,
}

#[derive(Default)]
pub(crate) struct ResolvedSet(VecDeque<Resolved>);

impl ResolvedSet {
    #[inline]
    pub(crate) fn push(&mut self, resolved: Resolved) {
        self.0.push_back(resolved);
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    /// Calls the finalizers in LIFO order of registration.
    /// A failing finalizer doesn't stop the rest, all failures are returned together.
    pub(crate) fn finalize(mut self) -> Result<(), DisposalError> {
        debug!(count = self.len(), "Calling finalizers");

        let mut failures = Vec::new();
        while let Some(Resolved { key, dependency, finalizer }) = self.0.pop_back() {
            match finalizer(dependency) {
                Ok(()) => debug!(%key, "Finalizer called"),
                Err(err) => {
                    error!(%key, "Finalizer failed: {}", err);
                    failures.push((key, err));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DisposalError { failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cache, Resolved, ResolvedSet};
    use crate::{
        binding::Binding,
        errors::FinalizeErrorKind,
        finalizer::boxed_finalizer,
        key::TypeKey,
    };

    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing_test::traced_test;

    struct Connection(u8);

    fn resolved(id: u8, order: &Arc<Mutex<Vec<u8>>>, fail: bool) -> Resolved {
        let order = order.clone();
        Resolved {
            key: TypeKey::of::<Connection>(),
            dependency: Arc::new(Connection(id)),
            finalizer: boxed_finalizer(move |connection: Arc<Connection>| {
                order.lock().push(connection.0);
                if fail {
                    Err(FinalizeErrorKind::from(anyhow::anyhow!("connection {} is broken", connection.0)))
                } else {
                    Ok(())
                }
            }),
        }
    }

    #[test]
    fn test_insert_keeps_first() {
        let id = Binding::instance(Connection(0)).into_data().id;
        let mut cache = Cache::default();

        let first = cache.insert(id, Arc::new(Connection(1)));
        let second = cache.insert(id, Arc::new(Connection(2)));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.get(id).and_then(|value| value.downcast_ref::<Connection>().map(|c| c.0)), Some(1));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.get(id).is_none());
    }

    #[test]
    #[traced_test]
    fn test_finalize_lifo() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut set = ResolvedSet::default();
        set.push(resolved(1, &order, false));
        set.push(resolved(2, &order, false));
        set.push(resolved(3, &order, false));
        assert_eq!(set.len(), 3);

        set.finalize().unwrap();
        assert_eq!(*order.lock(), [3, 2, 1]);
    }

    #[test]
    #[traced_test]
    fn test_finalize_collects_failures() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut cache = Cache::default();
        cache.push_resolved(resolved(1, &order, true));
        cache.push_resolved(resolved(2, &order, false));
        cache.push_resolved(resolved(3, &order, true));

        let err = cache.take_resolved_set().finalize().unwrap_err();
        assert_eq!(*order.lock(), [3, 2, 1]);
        assert_eq!(err.failures.len(), 2);
        assert!(logs_contain("connection 3 is broken"));
        assert_eq!(cache.take_resolved_set().len(), 0);
    }
}
