use core::sync::atomic::{AtomicU64, Ordering};
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use tracing::{debug, error};

use crate::{
    any::RcAny,
    binding::{BindingData, BindingId},
    errors::ResolveErrorKind,
    key::TypeKey,
};

/// Identity of one top-level resolution, shared by all the keys it builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct ResolutionId(u64);

#[derive(Default)]
struct State {
    /// Resolution building each singleton right now
    owners: BTreeMap<BindingId, ResolutionId>,
    /// Singleton each blocked resolution waits for
    waiting: BTreeMap<ResolutionId, (BindingId, TypeKey)>,
}

impl State {
    /// Follows the wait-for chain from `owner`.
    /// Returns the cycle path if it leads back to `resolution`, so that waiting would never end.
    fn cycle(&self, resolution: ResolutionId, owner: ResolutionId, key: TypeKey) -> Option<Vec<TypeKey>> {
        let mut path = vec![key];
        let mut current = owner;
        loop {
            if current == resolution {
                path.push(key);
                return Some(path);
            }
            let (binding, waited) = self.waiting.get(&current)?;
            path.push(*waited);
            current = *self.owners.get(binding)?;
        }
    }
}

/// Exclusive construction of singletons across threads.
///
/// A resolution that needs a singleton built by another one waits for it,
/// unless the other one waits (directly or through a chain) for a singleton this resolution builds.
/// In that case the wait would never end and [`ResolveErrorKind::CircularDependency`] is returned.
#[derive(Default)]
pub(crate) struct SingletonLocks {
    state: Mutex<State>,
    released: Condvar,
    resolution_ids: AtomicU64,
}

impl SingletonLocks {
    pub(crate) fn next_resolution(&self) -> ResolutionId {
        ResolutionId(self.resolution_ids.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the cached singleton of the binding, or builds it with `construct` and caches it.
    /// The flag is `true` if the instance was built by this call.
    /// A failed construction isn't cached, the next waiter tries itself.
    pub(crate) fn get_or_try_init(
        &self,
        resolution: ResolutionId,
        binding: &BindingData,
        construct: impl FnOnce() -> Result<RcAny, ResolveErrorKind>,
    ) -> Result<(RcAny, bool), ResolveErrorKind> {
        let mut state = self.state.lock();
        loop {
            if let Some(dependency) = binding.singleton.get() {
                return Ok((dependency.clone(), false));
            }
            let Some(owner) = state.owners.get(&binding.id).copied() else {
                break;
            };
            if let Some(path) = state.cycle(resolution, owner, binding.key) {
                let err = ResolveErrorKind::CircularDependency { path };
                error!("{}", err);
                return Err(err);
            }

            debug!(key = %binding.key, "Waiting for another resolution");
            state.waiting.insert(resolution, (binding.id, binding.key));
            self.released.wait(&mut state);
            state.waiting.remove(&resolution);
        }
        state.owners.insert(binding.id, resolution);
        drop(state);

        let owned = Owned { locks: self, binding: binding.id };
        let dependency = construct()?;
        let dependency = binding.singleton.get_or_init(|| dependency).clone();
        drop(owned);

        Ok((dependency, true))
    }
}

/// Releases the ownership of a singleton and wakes the waiters, also on a failure or a panic
struct Owned<'a> {
    locks: &'a SingletonLocks,
    binding: BindingId,
}

impl Drop for Owned<'_> {
    fn drop(&mut self) {
        self.locks.state.lock().owners.remove(&self.binding);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::{ResolutionId, SingletonLocks, State};
    use crate::{
        any::RcAny,
        binding::Binding,
        errors::{InstantiateErrorKind, ResolveErrorKind},
        key::TypeKey,
    };

    use std::sync::Arc;
    use tracing_test::traced_test;

    struct A;
    struct B;

    #[test]
    fn test_cycle_through_waiting_resolution() {
        let a = Binding::factory(|| Ok::<_, InstantiateErrorKind>(A)).into_data();
        let b = Binding::factory(|| Ok::<_, InstantiateErrorKind>(B)).into_data();

        let mut state = State::default();
        state.owners.insert(a.id, ResolutionId(1));
        state.owners.insert(b.id, ResolutionId(2));

        assert!(state.cycle(ResolutionId(1), ResolutionId(2), b.key).is_none());

        state.waiting.insert(ResolutionId(2), (a.id, a.key));
        assert_eq!(
            state.cycle(ResolutionId(1), ResolutionId(2), b.key),
            Some(vec![TypeKey::of::<B>(), TypeKey::of::<A>(), TypeKey::of::<B>()])
        );
    }

    #[test]
    #[traced_test]
    fn test_failure_releases_ownership() {
        let locks = SingletonLocks::default();
        let binding = Binding::factory(|| Ok::<_, InstantiateErrorKind>(A)).singleton().into_data();

        let failed = locks.get_or_try_init(locks.next_resolution(), &binding, || {
            Err(ResolveErrorKind::Unresolved { key: TypeKey::of::<B>() })
        });
        assert!(failed.is_err());
        assert!(locks.state.lock().owners.is_empty());

        let (first, constructed) = locks
            .get_or_try_init(locks.next_resolution(), &binding, || Ok(Arc::new(A) as RcAny))
            .unwrap();
        assert!(constructed);

        let (second, constructed) = locks
            .get_or_try_init(locks.next_resolution(), &binding, || Ok(Arc::new(A) as RcAny))
            .unwrap();
        assert!(!constructed);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
