use core::{
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
    sync::atomic::{AtomicU64, Ordering},
};
use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::{
    any::RcAny,
    config::Config,
    context::PredicateContext,
    dependency_resolver::Dependencies,
    finalizer::{boxed_finalizer, BoxedFinalizer, Finalizer},
    instantiator::{
        boxed_bound_converter, boxed_converter, boxed_injectable, boxed_instantiator, BoxedBoundConverter, BoxedConstructor,
        BoxedConverter, Injectable, Instantiator,
    },
    key::{Key, TypeKey},
    lifetime::Lifetime,
    signature::Signature,
};

pub(crate) type Predicate = Arc<dyn Fn(&PredicateContext<'_>) -> bool + Send + Sync>;

/// Identity of a single binding record, used as the cache slot of its instances.
/// Two bindings under the same key never share cached instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct BindingId(u64);

impl BindingId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) enum Producer {
    /// Concrete type built by its [`Injectable`] impl, then converted into the bound type
    Class {
        class: TypeKey,
        construct: BoxedConstructor,
        convert: BoxedConverter,
    },
    Factory {
        construct: BoxedConstructor,
    },
    Instance(RcAny),
    /// Resolves the binding of another type with its own lifetime, then converts the shared instance
    Bound {
        target: TypeKey,
        convert: BoxedBoundConverter,
    },
    /// Resolves another key of the same type with its own binding and lifetime
    Alias(TypeKey),
}

impl Producer {
    #[inline]
    #[must_use]
    pub(crate) const fn kind(&self) -> &'static str {
        match self {
            Producer::Class { .. } => "class",
            Producer::Factory { .. } => "factory",
            Producer::Instance(_) => "instance",
            Producer::Bound { .. } => "bound",
            Producer::Alias(_) => "alias",
        }
    }
}

/// Type-erased binding as it is stored in the registry
pub(crate) struct BindingData {
    pub(crate) id: BindingId,
    pub(crate) key: TypeKey,
    pub(crate) producer: Producer,
    pub(crate) signature: Signature,
    pub(crate) lifetime: Lifetime,
    pub(crate) predicate: Option<Predicate>,
    pub(crate) finalizer: Option<BoxedFinalizer>,
    pub(crate) singleton: OnceCell<RcAny>,
}

impl BindingData {
    /// Key the producer parameters are resolved on behalf of
    #[inline]
    #[must_use]
    pub(crate) fn consumer(&self) -> TypeKey {
        match &self.producer {
            Producer::Class { class, .. } => *class,
            Producer::Factory { .. } | Producer::Instance(_) | Producer::Bound { .. } | Producer::Alias(_) => self.key,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn accepts(&self, context: &PredicateContext<'_>) -> bool {
        self.predicate.as_ref().map_or(true, |predicate| predicate(context))
    }
}

impl Debug for BindingData {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingData")
            .field("key", &self.key)
            .field("producer", &self.producer.kind())
            .field("lifetime", &self.lifetime)
            .field("contextual", &self.predicate.is_some())
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Declaration of how to produce a `T`.
///
/// # Examples
/// ```rust
/// use bindery::{Binding, Container, Inject, InstantiateErrorKind, Lifetime, Registry};
///
/// struct Config {
///     url: &'static str,
/// }
///
/// struct Pool {
///     url: &'static str,
/// }
///
/// let mut registry = Registry::new();
/// registry
///     .bind(Binding::instance(Config { url: "postgres://localhost" }))
///     .bind(
///         Binding::factory(|Inject(config): Inject<Config>| Ok::<_, InstantiateErrorKind>(Pool { url: config.url }))
///             .lifetime(Lifetime::Singleton),
///     );
///
/// let container = Container::new(registry);
/// let pool_1 = container.get::<Pool>().unwrap();
/// let pool_2 = container.get::<Pool>().unwrap();
///
/// assert_eq!(pool_1.url, "postgres://localhost");
/// assert!(std::sync::Arc::ptr_eq(&pool_1, &pool_2));
/// ```
#[must_use]
pub struct Binding<T> {
    key: TypeKey,
    producer: Producer,
    signature: Signature,
    config: Config,
    predicate: Option<Predicate>,
    finalizer: Option<BoxedFinalizer>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Binding<T> {
    fn with_producer(producer: Producer, signature: Signature) -> Self {
        Self {
            key: TypeKey::of::<T>(),
            producer,
            signature,
            config: Config::default(),
            predicate: None,
            finalizer: None,
            _marker: PhantomData,
        }
    }

    /// Binds `T` to a factory function, keyed by its return type
    pub fn factory<Inst, Deps>(instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Provides = T>,
        Deps: Dependencies,
    {
        Self::with_producer(
            Producer::Factory {
                construct: boxed_instantiator(instantiator),
            },
            Signature::new(Deps::parameters(), &[]),
        )
    }

    /// Binds `T` to the concrete type `Impl`, converted with [`Into`]
    pub fn to<Impl>() -> Self
    where
        Impl: Injectable + Into<T>,
    {
        Self::to_with::<Impl>(|value: Impl| value.into())
    }

    /// Binds `T` to the concrete type `Impl`, converted with `convert`.
    /// Use it to bind trait objects: `Binding::<Box<dyn Repo + Send + Sync>>::to_with::<PgRepo>(|repo| boxed!(repo; Repo + Send + Sync))`
    pub fn to_with<Impl>(convert: impl Fn(Impl) -> T + Send + Sync + 'static) -> Self
    where
        Impl: Injectable,
    {
        Self::with_producer(
            Producer::Class {
                class: TypeKey::of::<Impl>(),
                construct: boxed_injectable::<Impl>(),
                convert: boxed_converter::<Impl, T, _>(convert),
            },
            Signature::new(<Impl::Dependencies as Dependencies>::parameters(), Impl::PARAMETER_NAMES),
        )
    }

    /// Binds `T` to the binding of `Impl`, so that both keys share the instance cached by `Impl`'s lifetime.
    /// Unlike [`Self::to_with`], `Impl` isn't built here and must be bound itself.
    ///
    /// ```rust
    /// use bindery::{Binding, Container, InstantiateErrorKind, Registry};
    /// use std::sync::Arc;
    ///
    /// trait FileSystem: Send + Sync {}
    ///
    /// struct InMemoryFileSystem;
    ///
    /// impl FileSystem for InMemoryFileSystem {}
    ///
    /// let mut registry = Registry::new();
    /// registry
    ///     .bind(Binding::factory(|| Ok::<_, InstantiateErrorKind>(InMemoryFileSystem)).singleton())
    ///     .bind(Binding::<Arc<dyn FileSystem>>::to_bound::<InMemoryFileSystem>(|fs| fs as Arc<dyn FileSystem>));
    ///
    /// let container = Container::new(registry);
    /// let fs = container.get::<Arc<dyn FileSystem>>().unwrap();
    /// let concrete = container.get::<InMemoryFileSystem>().unwrap();
    ///
    /// assert_eq!(Arc::as_ptr(&*fs).cast::<()>(), Arc::as_ptr(&concrete).cast::<()>());
    /// ```
    pub fn to_bound<Impl>(convert: impl Fn(Arc<Impl>) -> T + Send + Sync + 'static) -> Self
    where
        Impl: Send + Sync + 'static,
    {
        Self::with_producer(
            Producer::Bound {
                target: TypeKey::of::<Impl>(),
                convert: boxed_bound_converter::<Impl, T, _>(convert),
            },
            Signature::default(),
        )
    }

    /// Binds `T` to a value built outside the container.
    /// The same instance is returned on each resolution. Interceptors and finalizers don't apply to it.
    pub fn instance(value: T) -> Self {
        Self::with_producer(Producer::Instance(Arc::new(value)), Signature::default())
    }

    /// Binds `T` to another key of the same type, resolved with that key's own binding
    pub fn alias(target: Key<T>) -> Self {
        Self::with_producer(Producer::Alias(target.erase()), Signature::default())
    }

    /// Registers the binding under a named key instead of the plain one
    pub fn named(mut self, name: &'static str) -> Self {
        self.key = self.key.qualified(name);
        self
    }

    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.config.lifetime = lifetime;
        self
    }

    #[inline]
    pub fn singleton(self) -> Self {
        self.lifetime(Lifetime::Singleton)
    }

    #[inline]
    pub fn scoped(self) -> Self {
        self.lifetime(Lifetime::Scoped)
    }

    #[inline]
    pub fn transient(self) -> Self {
        self.lifetime(Lifetime::Transient)
    }

    pub fn with_config(mut self, config: Config) -> Self {
        if let Some(names) = config.parameter_names {
            self.signature = self.signature.renamed(names);
        }
        self.config = config;
        self
    }

    /// Names the producer parameters in declaration order, for contextual predicates
    pub fn parameter_names(self, names: &'static [&'static str]) -> Self {
        let config = Config {
            parameter_names: Some(names),
            ..self.config
        };
        self.with_config(config)
    }

    /// Makes the binding contextual: it is used only where `predicate` holds.
    /// Contextual bindings take precedence over the default one, the first registered wins.
    pub fn when(mut self, predicate: impl Fn(&PredicateContext<'_>) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Shortcut of [`Self::when`] for bindings used only by the consumer of type `C`
    pub fn when_injected_into<C: ?Sized + 'static>(self) -> Self {
        self.when(|context| context.is_injected_into::<C>())
    }

    /// Adds a finalizer called when the owner of the instance is closed, in LIFO order of resolution.
    ///
    /// # Warning
    /// The finalizer is only called for singleton and scoped bindings,
    /// because a transient instance isn't cached and its owner is the caller.
    pub fn finalizer(mut self, finalizer: impl Finalizer<T>) -> Self {
        self.finalizer = Some(boxed_finalizer(finalizer));
        self
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    #[must_use]
    pub(crate) fn into_data(self) -> BindingData {
        BindingData {
            id: BindingId::next(),
            key: self.key,
            producer: self.producer,
            signature: self.signature,
            lifetime: self.config.lifetime,
            predicate: self.predicate,
            finalizer: self.finalizer,
            singleton: OnceCell::new(),
        }
    }
}

impl<T: Injectable> Binding<T> {
    /// Binds `T` to itself, built by its [`Injectable`] impl
    pub fn injectable() -> Self {
        Self::to::<T>()
    }
}
