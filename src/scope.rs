use core::{
    fmt::{self, Display, Formatter},
    sync::atomic::{AtomicBool, Ordering},
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info_span};

use crate::{
    cache::Cache,
    container::Container,
    dependency_resolver::downcast,
    errors::{DisposalError, ResolveErrorKind},
    key::Key,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeData {
    pub id: u64,
    pub parent: Option<u64>,
    /// `0` for a scope opened from the container
    pub depth: u32,
}

impl Display for ScopeData {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.id)
    }
}

/// Unit of work owning the instances of scoped bindings and their finalizers.
///
/// A scope is meant to be used by one logical unit of work (a request, a job):
/// concurrent resolution of the same scoped binding from two threads may build it twice.
/// Child scopes don't see the cached instances of their parent.
pub struct Scope {
    container: Container,
    data: ScopeData,
    pub(crate) cache: Mutex<Cache>,
    closed: AtomicBool,
}

impl Scope {
    pub(crate) fn new(container: Container, parent: Option<&ScopeData>) -> Self {
        let data = ScopeData {
            id: container.inner.next_scope_id(),
            parent: parent.map(|parent| parent.id),
            depth: parent.map_or(0, |parent| parent.depth + 1),
        };
        debug!(scope = %data, "Scope opened");

        Self {
            container,
            data,
            cache: Mutex::new(Cache::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// Opens a nested scope. It is closed independently of this one.
    #[must_use]
    pub fn open_child(&self) -> Scope {
        Scope::new(self.container.clone(), Some(&self.data))
    }

    #[inline]
    #[must_use]
    pub const fn data(&self) -> &ScopeData {
        &self.data
    }

    #[inline]
    #[must_use]
    pub const fn container(&self) -> &Container {
        &self.container
    }

    /// Gets a dependency within the scope.
    /// Scoped instances are cached here, singletons in the container.
    ///
    /// # Errors
    /// See [`Container::get`]. Returns [`ResolveErrorKind::Closed`] if the scope is closed.
    #[inline]
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_key(Key::new())
    }

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
        let span = info_span!("get", dependency = %key, scope = %self.data);
        let _guard = span.enter();

        self.check_open()?;
        match self.container.inner.resolve(Some(self), key, false)? {
            Some(dependency) => downcast(dependency),
            None => Err(ResolveErrorKind::Unresolved { key }),
        }
    }

    /// # Errors
    /// See [`Container::get_optional`]
    #[inline]
    pub fn get_optional<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        self.get_optional_key(Key::new())
    }

    /// # Errors
    /// See [`Container::get_optional`]
    pub fn get_optional_key<T: Send + Sync + 'static>(&self, key: Key<T>) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        let key = key.erase();
        let span = info_span!("get_optional", dependency = %key, scope = %self.data);
        let _guard = span.enter();

        self.check_open()?;
        self.container.inner.resolve(Some(self), key, true)?.map(downcast::<T>).transpose()
    }

    /// # Errors
    /// See [`Container::get_all`]
    #[inline]
    pub fn get_all<T: Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        self.get_all_key(Key::new())
    }

    /// # Errors
    /// See [`Container::get_all`]
    pub fn get_all_key<T: Send + Sync + 'static>(&self, key: Key<T>) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        let key = key.erase();
        let span = info_span!("get_all", dependency = %key, scope = %self.data);
        let _guard = span.enter();

        self.check_open()?;
        self.container
            .inner
            .resolve_all(Some(self), key)?
            .into_iter()
            .map(downcast::<T>)
            .collect()
    }

    /// Closes the scope, calling finalizers of its instances in reverse order of resolution, each exactly once.
    /// Resolution in the scope fails after that. Next calls do nothing.
    ///
    /// # Errors
    /// Returns [`DisposalError`] with all failed finalizers, the rest are called anyway
    pub fn close(&self) -> Result<(), DisposalError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!(scope = %self.data, "Scope already closed");
            return Ok(());
        }

        let resolved_set = {
            let mut cache = self.cache.lock();
            debug!(scope = %self.data, cached = cache.len(), "Scope closing");
            let resolved_set = cache.take_resolved_set();
            cache.clear();
            resolved_set
        };
        let result = resolved_set.finalize();
        debug!(scope = %self.data, "Scope closed");
        result
    }

    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_open(&self) -> Result<(), ResolveErrorKind> {
        if self.is_closed() {
            let err = ResolveErrorKind::Closed;
            error!("{}", err);
            return Err(err);
        }
        Ok(())
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            error!("{}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        binding::Binding,
        container::Container,
        errors::{FinalizeErrorKind, InstantiateErrorKind, ResolveErrorKind},
        inject::Inject,
        registry::Registry,
    };

    use core::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;
    use tracing::debug;
    use tracing_test::traced_test;

    struct Session;
    struct Request(Arc<Session>);

    fn container(finalizer_call_count: &Arc<AtomicU8>) -> Container {
        let mut registry = Registry::new();
        registry
            .bind(Binding::factory(|| Ok::<_, InstantiateErrorKind>(Session)).scoped().finalizer({
                let finalizer_call_count = finalizer_call_count.clone();
                move |_: Arc<Session>| {
                    finalizer_call_count.fetch_add(1, Ordering::SeqCst);

                    debug!("Finalizer called");
                    Ok::<_, FinalizeErrorKind>(())
                }
            }))
            .factory(|Inject(session): Inject<Session>| Ok::<_, InstantiateErrorKind>(Request(session)));
        Container::new(registry)
    }

    #[test]
    #[traced_test]
    fn test_scoped_get() {
        let finalizer_call_count = Arc::new(AtomicU8::new(0));
        let container = container(&finalizer_call_count);

        let scope_1 = container.open_scope();
        let scope_2 = container.open_scope();

        let request_1 = scope_1.get::<Request>().unwrap();
        let request_2 = scope_1.get::<Request>().unwrap();
        let request_3 = scope_2.get::<Request>().unwrap();

        assert!(Arc::ptr_eq(&request_1.0, &request_2.0));
        assert!(!Arc::ptr_eq(&request_1.0, &request_3.0));
        assert!(matches!(
            container.get::<Request>(),
            Err(ResolveErrorKind::ScopedOutsideScope { .. })
        ));
        assert_ne!(scope_1.data().id, scope_2.data().id);
    }

    #[test]
    #[traced_test]
    fn test_child_scope_builds_own_instances() {
        let finalizer_call_count = Arc::new(AtomicU8::new(0));
        let container = container(&finalizer_call_count);

        let parent = container.open_scope();
        let child = parent.open_child();

        assert_eq!(child.data().parent, Some(parent.data().id));
        assert_eq!(child.data().depth, 1);

        let session_1 = parent.get::<Session>().unwrap();
        let session_2 = child.get::<Session>().unwrap();
        assert!(!Arc::ptr_eq(&session_1, &session_2));

        child.close().unwrap();
        assert_eq!(finalizer_call_count.load(Ordering::SeqCst), 1);
        assert!(parent.get::<Session>().is_ok());
    }

    #[test]
    #[traced_test]
    fn test_close() {
        let finalizer_call_count = Arc::new(AtomicU8::new(0));
        let container = container(&finalizer_call_count);

        let scope = container.open_scope();
        let _ = scope.get::<Request>().unwrap();
        let _ = scope.get::<Session>().unwrap();

        scope.close().unwrap();
        scope.close().unwrap();

        assert!(scope.is_closed());
        assert_eq!(finalizer_call_count.load(Ordering::SeqCst), 1);
        assert!(matches!(scope.get::<Session>(), Err(ResolveErrorKind::Closed)));
    }

    #[test]
    #[traced_test]
    fn test_close_on_drop() {
        let finalizer_call_count = Arc::new(AtomicU8::new(0));
        let container = container(&finalizer_call_count);

        {
            let scope = container.open_scope();
            let _ = scope.get::<Session>().unwrap();
        }

        assert_eq!(finalizer_call_count.load(Ordering::SeqCst), 1);
        assert!(logs_contain("Scope closed"));
    }
}
