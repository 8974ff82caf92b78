use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, warn};

use crate::{
    binding::{Binding, BindingData},
    context::PredicateContext,
    dependency_resolver::Dependencies,
    instantiator::Instantiator,
    interceptor::{Interceptor, Interceptors},
    key::{Key, TypeKey},
    lifetime::Lifetime,
    module::Module,
};

#[derive(Default)]
struct KeyBindings {
    default: Option<Arc<BindingData>>,
    /// Bindings with a predicate, in registration order
    contextual: Vec<Arc<BindingData>>,
    multi: Vec<Arc<BindingData>>,
}

impl KeyBindings {
    #[inline]
    fn is_empty(&self) -> bool {
        self.default.is_none() && self.contextual.is_empty() && self.multi.is_empty()
    }
}

pub(crate) enum Lookup<'a> {
    Found(&'a BindingData),
    Ambiguous,
    Unbound,
}

/// Registry of bindings and interceptors, filled at composition time.
/// It is sealed by the container on the first resolution and can't be changed after that.
#[derive(Default)]
pub struct Registry {
    bindings: BTreeMap<TypeKey, KeyBindings>,
    interceptors: Interceptors,
}

impl Registry {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the default binding of its key, overriding the previous one.
    /// A binding with a predicate is added to the contextual bindings of the key instead.
    pub fn bind<T: Send + Sync + 'static>(&mut self, binding: Binding<T>) -> &mut Self {
        let data = into_data(binding);
        let key = data.key;
        let bindings = self.bindings.entry(key).or_default();

        if data.predicate.is_some() {
            bindings.contextual.push(data);
            debug!(%key, "Contextual binding added");
        } else if bindings.default.replace(data).is_some() {
            debug!(%key, "Overridden");
        }
        self
    }

    /// Appends a binding to the ordered multi-binding list of its key.
    /// After that the key can only be resolved as a list.
    pub fn multibind<T: Send + Sync + 'static>(&mut self, binding: Binding<T>) -> &mut Self {
        let data = into_data(binding);
        self.bindings.entry(data.key).or_default().multi.push(data);
        self
    }

    pub fn install<M: Module + ?Sized>(&mut self, module: &M) -> &mut Self {
        module.configure(self);
        self
    }

    /// Binds a factory with transient lifetime, keyed by its return type
    pub fn factory<Inst, Deps>(&mut self, instantiator: Inst) -> &mut Self
    where
        Inst: Instantiator<Deps>,
        Inst::Provides: Send + Sync,
        Deps: Dependencies,
    {
        self.bind(Binding::factory(instantiator))
    }

    pub fn factory_with<Inst, Deps>(&mut self, lifetime: Lifetime, instantiator: Inst) -> &mut Self
    where
        Inst: Instantiator<Deps>,
        Inst::Provides: Send + Sync,
        Deps: Dependencies,
    {
        self.bind(Binding::factory(instantiator).lifetime(lifetime))
    }

    /// Adds an interceptor for freshly built instances of `T`.
    /// Interceptors of one key run in ascending `order`, equal orders in registration order.
    pub fn intercept<T: Send + Sync + 'static>(&mut self, order: i32, interceptor: impl Interceptor<T>) -> &mut Self {
        self.intercept_key(Key::<T>::new(), order, interceptor)
    }

    pub fn intercept_key<T: Send + Sync + 'static>(&mut self, key: Key<T>, order: i32, interceptor: impl Interceptor<T>) -> &mut Self {
        self.interceptors.add(key.erase(), order, interceptor);
        self
    }

    /// `true` if the key has any binding, contextual and multi-bindings included
    #[must_use]
    pub fn is_bound(&self, key: &TypeKey) -> bool {
        self.bindings.get(key).is_some_and(|bindings| !bindings.is_empty())
    }
}

impl Registry {
    /// Finds the single binding applicable to the context:
    /// the first contextual binding whose predicate holds, then the default one
    pub(crate) fn lookup(&self, key: &TypeKey, context: &PredicateContext<'_>) -> Lookup<'_> {
        let Some(bindings) = self.bindings.get(key) else {
            return Lookup::Unbound;
        };
        if !bindings.multi.is_empty() {
            return Lookup::Ambiguous;
        }
        if let Some(binding) = bindings.contextual.iter().find(|binding| binding.accepts(context)) {
            return Lookup::Found(binding);
        }
        match &bindings.default {
            Some(binding) => Lookup::Found(binding),
            None => Lookup::Unbound,
        }
    }

    #[must_use]
    pub(crate) fn multi(&self, key: &TypeKey) -> &[Arc<BindingData>] {
        match self.bindings.get(key) {
            Some(bindings) => &bindings.multi,
            None => &[],
        }
    }

    #[inline]
    #[must_use]
    pub(crate) const fn interceptors(&self) -> &Interceptors {
        &self.interceptors
    }

    #[must_use]
    pub(crate) fn seal(mut self) -> Self {
        self.interceptors.sort();
        self
    }
}

fn into_data<T: Send + Sync + 'static>(binding: Binding<T>) -> Arc<BindingData> {
    let data = binding.into_data();
    if data.finalizer.is_some() && !data.lifetime.is_cached() {
        warn!(key = %data.key, "Finalizer of a transient binding is never called");
    }
    Arc::new(data)
}
