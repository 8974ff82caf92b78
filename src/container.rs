use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info_span};

use crate::{
    any::RcAny,
    binding::Binding,
    cache::ResolvedSet,
    dependency_resolver::{downcast, Dependencies},
    errors::{DisposalError, RegistryErrorKind, ResolveErrorKind},
    instantiator::Instantiator,
    interceptor::Interceptor,
    key::{Key, TypeKey},
    lock::SingletonLocks,
    module::Module,
    registry::Registry,
    resolver::{ResolutionContext, Site},
    scope::Scope,
};

/// Root of the resolution: owns the registry and the singleton instances.
/// Cloning is cheap, all clones share the same state.
///
/// The registry is sealed on the first resolution. After that, mutators fail.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

impl Container {
    #[inline]
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                pending: Mutex::new(Some(registry)),
                registry: OnceCell::new(),
                resolved: Mutex::new(ResolvedSet::default()),
                singletons: SingletonLocks::default(),
                closed: AtomicBool::new(false),
                scope_ids: AtomicU64::new(0),
            }),
        }
    }

    /// # Errors
    /// - Returns [`RegistryErrorKind::DuplicateBinding`] if the container is sealed and the key is already bound
    /// - Returns [`RegistryErrorKind::Sealed`] if the container is sealed
    pub fn bind<T: Send + Sync + 'static>(&self, binding: Binding<T>) -> Result<(), RegistryErrorKind> {
        let key = binding.key();
        self.inner.mutate(Some(key), |registry| {
            registry.bind(binding);
        })
    }

    /// # Errors
    /// Returns [`RegistryErrorKind::Sealed`] if the container is sealed
    pub fn multibind<T: Send + Sync + 'static>(&self, binding: Binding<T>) -> Result<(), RegistryErrorKind> {
        self.inner.mutate(None, |registry| {
            registry.multibind(binding);
        })
    }

    /// # Errors
    /// Returns [`RegistryErrorKind::Sealed`] if the container is sealed
    pub fn install<M: Module + ?Sized>(&self, module: &M) -> Result<(), RegistryErrorKind> {
        self.inner.mutate(None, |registry| {
            registry.install(module);
        })
    }

    /// # Errors
    /// - Returns [`RegistryErrorKind::DuplicateBinding`] if the container is sealed and the key is already bound
    /// - Returns [`RegistryErrorKind::Sealed`] if the container is sealed
    pub fn factory<Inst, Deps>(&self, instantiator: Inst) -> Result<(), RegistryErrorKind>
    where
        Inst: Instantiator<Deps>,
        Inst::Provides: Send + Sync,
        Deps: Dependencies,
    {
        self.bind(Binding::factory(instantiator))
    }

    /// # Errors
    /// Returns [`RegistryErrorKind::Sealed`] if the container is sealed
    pub fn intercept<T: Send + Sync + 'static>(&self, order: i32, interceptor: impl Interceptor<T>) -> Result<(), RegistryErrorKind> {
        self.inner.mutate(None, |registry| {
            registry.intercept(order, interceptor);
        })
    }

    /// Seals the registry without resolving anything
    #[inline]
    pub fn seal(&self) {
        self.inner.sealed();
    }

    #[inline]
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.inner.registry.get().is_some()
    }

    /// Gets a dependency from the container.
    /// Singleton and transient bindings are resolved here, scoped ones need [`Self::open_scope`].
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::Unresolved`] if the dependency or one of its required dependencies isn't bound
    /// - Returns [`ResolveErrorKind::Ambiguous`] if the dependency has multi-bindings
    /// - Returns [`ResolveErrorKind::CircularDependency`] if the dependency graph has a cycle
    /// - Returns [`ResolveErrorKind::ScopedOutsideScope`] if a scoped binding is met
    /// - Returns [`ResolveErrorKind::Instantiate`] if a producer failed
    /// - Returns [`ResolveErrorKind::Closed`] if the container is closed
    #[inline]
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_key(Key::new())
    }

    /// Gets a dependency bound under a named key
    ///
    /// # Errors
    /// See [`Self::get`]
    #[inline]
    pub fn get_named<T: Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_key(Key::named(name))
    }

    /// # Errors
    /// See [`Self::get`]
    pub fn get_key<T: Send + Sync + 'static>(&self, key: Key<T>) -> Result<Arc<T>, ResolveErrorKind> {
        let key = key.erase();
        let span = info_span!("get", dependency = %key, scope = "root");
        let _guard = span.enter();

        match self.inner.resolve(None, key, false)? {
            Some(dependency) => downcast(dependency),
            None => Err(ResolveErrorKind::Unresolved { key }),
        }
    }

    /// Gets a dependency, or `None` if it isn't bound.
    /// Errors of a bound dependency are returned as is.
    ///
    /// # Errors
    /// See [`Self::get`]
    #[inline]
    pub fn get_optional<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        self.get_optional_key(Key::new())
    }

    /// Gets a dependency bound under `key`, or `None` if it isn't bound
    ///
    /// # Errors
    /// See [`Self::get`]
    pub fn get_optional_key<T: Send + Sync + 'static>(&self, key: Key<T>) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        let key = key.erase();
        let span = info_span!("get_optional", dependency = %key, scope = "root");
        let _guard = span.enter();

        self.inner.resolve(None, key, true)?.map(downcast::<T>).transpose()
    }

    /// Gets all multi-bindings of `T` in registration order
    ///
    /// # Errors
    /// See [`Self::get`]
    #[inline]
    pub fn get_all<T: Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        self.get_all_key(Key::new())
    }

    /// Gets all multi-bindings registered under `key` in registration order
    ///
    /// # Errors
    /// See [`Self::get`]
    pub fn get_all_key<T: Send + Sync + 'static>(&self, key: Key<T>) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        let key = key.erase();
        let span = info_span!("get_all", dependency = %key, scope = "root");
        let _guard = span.enter();

        self.inner.resolve_all(None, key)?.into_iter().map(downcast::<T>).collect()
    }

    /// Opens a new scope for scoped bindings.
    /// Scopes don't share cached instances, each one builds its own.
    #[must_use]
    pub fn open_scope(&self) -> Scope {
        Scope::new(self.clone(), None)
    }

    /// Closes the container, calling finalizers of the resolved singletons in LIFO order.
    /// Resolution fails after that. Next calls do nothing.
    ///
    /// # Errors
    /// Returns [`DisposalError`] with all failed finalizers, the rest are called anyway
    pub fn close(&self) -> Result<(), DisposalError> {
        self.inner.close()
    }

    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl Default for Container {
    #[inline]
    fn default() -> Self {
        Self::new(Registry::new())
    }
}

pub(crate) struct ContainerInner {
    /// Registry filled before sealing, taken on the first resolution
    pending: Mutex<Option<Registry>>,
    registry: OnceCell<Registry>,
    /// Singletons with finalizers, in order of construction
    pub(crate) resolved: Mutex<ResolvedSet>,
    pub(crate) singletons: SingletonLocks,
    closed: AtomicBool,
    scope_ids: AtomicU64,
}

impl ContainerInner {
    pub(crate) fn sealed(&self) -> &Registry {
        self.registry.get_or_init(|| {
            let registry = self.pending.lock().take().unwrap_or_default();
            debug!("Container sealed");
            registry.seal()
        })
    }

    fn mutate(&self, key: Option<TypeKey>, f: impl FnOnce(&mut Registry)) -> Result<(), RegistryErrorKind> {
        let mut pending = self.pending.lock();
        let Some(registry) = pending.as_mut() else {
            let err = match key {
                Some(key) if self.registry.get().is_some_and(|registry| registry.is_bound(&key)) => {
                    RegistryErrorKind::DuplicateBinding { key }
                }
                _ => RegistryErrorKind::Sealed,
            };
            error!("{}", err);
            return Err(err);
        };
        f(registry);
        Ok(())
    }

    pub(crate) fn next_scope_id(&self) -> u64 {
        self.scope_ids.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn check_open(&self) -> Result<(), ResolveErrorKind> {
        if self.closed.load(Ordering::Acquire) {
            let err = ResolveErrorKind::Closed;
            error!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    pub(crate) fn resolve(&self, scope: Option<&Scope>, key: TypeKey, optional: bool) -> Result<Option<RcAny>, ResolveErrorKind> {
        self.check_open()?;
        ResolutionContext::new(self.sealed(), self, scope).resolve(key, Site::root(optional))
    }

    pub(crate) fn resolve_all(&self, scope: Option<&Scope>, key: TypeKey) -> Result<Vec<RcAny>, ResolveErrorKind> {
        self.check_open()?;
        ResolutionContext::new(self.sealed(), self, scope).resolve_all(key, None)
    }

    fn close(&self) -> Result<(), DisposalError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("Container already closed");
            return Ok(());
        }

        let resolved_set = core::mem::take(&mut *self.resolved.lock());
        let result = resolved_set.finalize();
        debug!("Container closed");
        result
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            error!("{}", err);
        }
        debug!("Container closed on drop");
    }
}

#[cfg(test)]
mod tests {
    use super::{Container, ContainerInner};
    use crate::{
        binding::Binding,
        errors::{FinalizeErrorKind, InstantiateErrorKind, RegistryErrorKind, ResolveErrorKind},
        inject::Inject,
        registry::Registry,
    };

    use core::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;
    use tracing::debug;
    use tracing_test::traced_test;

    struct Request1;
    struct Request2(Arc<Request1>);

    #[test]
    #[traced_test]
    fn test_singleton_get() {
        let call_count = Arc::new(AtomicU8::new(0));

        let mut registry = Registry::new();
        registry
            .bind(
                Binding::factory({
                    let call_count = call_count.clone();
                    move || {
                        call_count.fetch_add(1, Ordering::SeqCst);

                        debug!("Call instantiator request 1");
                        Ok::<_, InstantiateErrorKind>(Request1)
                    }
                })
                .singleton(),
            )
            .factory(|Inject(request): Inject<Request1>| Ok::<_, InstantiateErrorKind>(Request2(request)));
        let container = Container::new(registry);

        let request_1 = container.get::<Request1>().unwrap();
        let request_2 = container.get::<Request2>().unwrap();
        let request_3 = container.get::<Request2>().unwrap();

        assert!(Arc::ptr_eq(&request_1, &request_2.0));
        assert!(Arc::ptr_eq(&request_2.0, &request_3.0));
        assert!(!Arc::ptr_eq(&request_2, &request_3));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(logs_contain("Found in cache"));
    }

    #[test]
    #[traced_test]
    fn test_seal_on_first_get() {
        let container = Container::default();
        container.bind(Binding::instance(Request1)).unwrap();
        assert!(!container.is_sealed());

        let _ = container.get::<Request1>().unwrap();
        assert!(container.is_sealed());

        assert!(matches!(
            container.bind(Binding::instance(Request1)),
            Err(RegistryErrorKind::DuplicateBinding { .. })
        ));
        assert!(matches!(
            container.factory(|Inject(request): Inject<Request1>| Ok::<_, InstantiateErrorKind>(Request2(request))),
            Err(RegistryErrorKind::Sealed)
        ));
        assert!(matches!(
            container.multibind(Binding::instance(Request1)),
            Err(RegistryErrorKind::Sealed)
        ));
        assert!(matches!(container.get::<Request2>(), Err(ResolveErrorKind::Unresolved { .. })));
    }

    #[test]
    #[traced_test]
    fn test_close() {
        let finalizer_call_count = Arc::new(AtomicU8::new(0));

        let mut registry = Registry::new();
        registry.bind(
            Binding::factory(|| Ok::<_, InstantiateErrorKind>(Request1))
                .singleton()
                .finalizer({
                    let finalizer_call_count = finalizer_call_count.clone();
                    move |_: Arc<Request1>| {
                        finalizer_call_count.fetch_add(1, Ordering::SeqCst);

                        debug!("Finalizer called");
                        Ok::<_, FinalizeErrorKind>(())
                    }
                }),
        );
        let container = Container::new(registry);

        let _ = container.get::<Request1>().unwrap();
        let _ = container.get::<Request1>().unwrap();
        assert_eq!(container.inner.resolved.lock().len(), 1);

        container.close().unwrap();
        container.close().unwrap();

        assert!(container.is_closed());
        assert_eq!(finalizer_call_count.load(Ordering::SeqCst), 1);
        assert!(matches!(container.get::<Request1>(), Err(ResolveErrorKind::Closed)));
    }

    #[test]
    #[traced_test]
    fn test_close_on_drop() {
        let finalizer_call_count = Arc::new(AtomicU8::new(0));

        let mut registry = Registry::new();
        registry.bind(
            Binding::factory(|| Ok::<_, InstantiateErrorKind>(Request1))
                .singleton()
                .finalizer({
                    let finalizer_call_count = finalizer_call_count.clone();
                    move |_: Arc<Request1>| {
                        finalizer_call_count.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, FinalizeErrorKind>(())
                    }
                }),
        );
        let container = Container::new(registry);
        let _ = container.clone().get::<Request1>().unwrap();
        drop(container);

        assert_eq!(finalizer_call_count.load(Ordering::SeqCst), 1);
        assert!(logs_contain("Container closed on drop"));
    }

    #[test]
    #[traced_test]
    fn test_thread_safe() {
        fn impl_bounds<T: Send + Sync + 'static>() {}

        impl_bounds::<(Container, ContainerInner)>();

        let mut registry = Registry::new();
        registry.bind(Binding::factory(|| Ok::<_, InstantiateErrorKind>(Request1)).singleton());
        let container = Container::new(registry);

        let handle = std::thread::spawn({
            let container = container.clone();
            move || container.get::<Request1>().map(|_| ())
        });
        assert!(handle.join().unwrap().is_ok());
        assert!(container.get::<Request1>().is_ok());
    }
}
