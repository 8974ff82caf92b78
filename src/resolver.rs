use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    any::{BoxedAny, RcAny},
    binding::{BindingData, Producer},
    cache::Resolved,
    container::ContainerInner,
    context::PredicateContext,
    dependency_resolver::Argument,
    errors::{InstantiatorErrorKind, ResolveErrorKind},
    instantiator::BoxedConstructor,
    key::TypeKey,
    lifetime::Lifetime,
    lock::ResolutionId,
    registry::{Lookup, Registry},
    scope::Scope,
    signature::ParameterKind,
};

/// Where a dependency is requested from
#[derive(Clone, Copy, Default)]
pub(crate) struct Site<'p> {
    pub(crate) consuming: Option<TypeKey>,
    pub(crate) parameter: Option<&'p str>,
    /// An unbound key resolves to `None` instead of failing
    pub(crate) optional: bool,
}

impl Site<'_> {
    #[inline]
    pub(crate) const fn root(optional: bool) -> Self {
        Self {
            consuming: None,
            parameter: None,
            optional,
        }
    }
}

/// State of one top-level resolution: the owners of cached instances and the keys under construction
pub(crate) struct ResolutionContext<'a> {
    registry: &'a Registry,
    container: &'a ContainerInner,
    scope: Option<&'a Scope>,
    resolution: ResolutionId,
    stack: Vec<TypeKey>,
}

impl<'a> ResolutionContext<'a> {
    #[inline]
    #[must_use]
    pub(crate) fn new(registry: &'a Registry, container: &'a ContainerInner, scope: Option<&'a Scope>) -> Self {
        Self {
            registry,
            container,
            scope,
            resolution: container.singletons.next_resolution(),
            stack: Vec::new(),
        }
    }

    pub(crate) fn resolve(&mut self, key: TypeKey, site: Site<'_>) -> Result<Option<RcAny>, ResolveErrorKind> {
        self.check_cycle(key)?;

        let context = PredicateContext::new(site.consuming, site.parameter);
        let binding = match self.registry.lookup(&key, &context) {
            Lookup::Found(binding) => binding,
            Lookup::Unbound if site.optional => {
                debug!(%key, "Not bound, fallback to default");
                return Ok(None);
            }
            Lookup::Unbound => {
                let err = ResolveErrorKind::Unresolved { key };
                error!("{}", err);
                return Err(err);
            }
            Lookup::Ambiguous => {
                let err = ResolveErrorKind::Ambiguous { key };
                error!("{}", err);
                return Err(err);
            }
        };

        self.resolve_binding(binding).map(Some)
    }

    /// Resolves every multi-binding of the key in registration order.
    /// The list isn't cached, each member is cached by its own lifetime.
    pub(crate) fn resolve_all(&mut self, key: TypeKey, consuming: Option<TypeKey>) -> Result<Vec<RcAny>, ResolveErrorKind> {
        self.check_cycle(key)?;

        let context = PredicateContext::new(consuming, None);
        let registry = self.registry;
        let mut dependencies = Vec::new();
        for binding in registry.multi(&key).iter().filter(|binding| binding.accepts(&context)) {
            dependencies.push(self.resolve_binding(binding)?);
        }
        debug!(%key, count = dependencies.len(), "Resolved list");

        Ok(dependencies)
    }

    fn check_cycle(&self, key: TypeKey) -> Result<(), ResolveErrorKind> {
        if let Some(position) = self.stack.iter().position(|in_progress| *in_progress == key) {
            let mut path = self.stack[position..].to_vec();
            path.push(key);

            let err = ResolveErrorKind::CircularDependency { path };
            error!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    fn resolve_binding(&mut self, binding: &'a BindingData) -> Result<RcAny, ResolveErrorKind> {
        if let Producer::Instance(instance) = &binding.producer {
            debug!(key = %binding.key, "Instance");
            return Ok(instance.clone());
        }

        match binding.lifetime {
            Lifetime::Transient => self.construct(binding),
            Lifetime::Singleton => self.resolve_singleton(binding),
            Lifetime::Scoped => self.resolve_scoped(binding),
        }
    }

    fn resolve_singleton(&mut self, binding: &'a BindingData) -> Result<RcAny, ResolveErrorKind> {
        if let Some(dependency) = binding.singleton.get() {
            debug!(key = %binding.key, "Found in cache");
            return Ok(dependency.clone());
        }
        debug!(key = %binding.key, "Not found in cache");

        // Dependencies of a singleton are resolved outside of any scope
        let container = self.container;
        let resolution = self.resolution;
        let scope = self.scope.take();
        let result = container
            .singletons
            .get_or_try_init(resolution, binding, || self.construct(binding));
        self.scope = scope;
        let (dependency, constructed) = result?;

        if constructed {
            debug!(key = %binding.key, "Cached");
            if let Some(finalizer) = &binding.finalizer {
                self.container.resolved.lock().push(Resolved {
                    key: binding.key,
                    dependency: dependency.clone(),
                    finalizer: finalizer.clone(),
                });
                debug!(key = %binding.key, "Finalizer registered");
            }
        }

        Ok(dependency)
    }

    fn resolve_scoped(&mut self, binding: &'a BindingData) -> Result<RcAny, ResolveErrorKind> {
        let Some(scope) = self.scope else {
            let err = ResolveErrorKind::ScopedOutsideScope { key: binding.key };
            error!("{}", err);
            return Err(err);
        };

        if let Some(dependency) = scope.cache.lock().get(binding.id) {
            debug!(key = %binding.key, "Found in cache");
            return Ok(dependency);
        }
        debug!(key = %binding.key, "Not found in cache");

        let dependency = self.construct(binding)?;

        let mut cache = scope.cache.lock();
        if scope.is_closed() {
            let err = ResolveErrorKind::Closed;
            error!("{}", err);
            return Err(err);
        }
        let cached = cache.insert(binding.id, dependency.clone());
        if !Arc::ptr_eq(&cached, &dependency) {
            debug!(key = %binding.key, "Cached by another resolution");
            return Ok(cached);
        }
        debug!(key = %binding.key, "Cached");
        if let Some(finalizer) = &binding.finalizer {
            cache.push_resolved(Resolved {
                key: binding.key,
                dependency: dependency.clone(),
                finalizer: finalizer.clone(),
            });
            debug!(key = %binding.key, "Finalizer registered");
        }

        Ok(dependency)
    }

    /// Builds a new instance with the key on the in-progress stack.
    /// The key is popped whatever the outcome.
    fn construct(&mut self, binding: &'a BindingData) -> Result<RcAny, ResolveErrorKind> {
        debug!(
            key = %binding.key,
            producer = binding.producer.kind(),
            lifetime = binding.lifetime.name(),
            "Constructing"
        );
        self.stack.push(binding.key);
        let result = self.instantiate(binding);
        self.stack.pop();
        result
    }

    fn instantiate(&mut self, binding: &'a BindingData) -> Result<RcAny, ResolveErrorKind> {
        let registry = self.registry;
        let interceptors = registry.interceptors();

        match &binding.producer {
            Producer::Instance(instance) => Ok(instance.clone()),
            Producer::Alias(target) => {
                let site = Site {
                    consuming: Some(binding.key),
                    parameter: None,
                    optional: false,
                };
                self.resolve(*target, site)?.ok_or(ResolveErrorKind::Unresolved { key: *target })
            }
            Producer::Bound { target, convert } => {
                let site = Site {
                    consuming: Some(binding.key),
                    parameter: None,
                    optional: false,
                };
                let target_dependency = self.resolve(*target, site)?.ok_or(ResolveErrorKind::Unresolved { key: *target })?;
                let mut dependency = convert(target_dependency).map_err(|err| {
                    error!("{}", err);
                    err
                })?;

                interceptors.run(&binding.key, &mut *dependency);
                Ok(Arc::from(dependency))
            }
            Producer::Factory { construct } => {
                let arguments = self.resolve_arguments(binding)?;
                let mut dependency = call(binding.key, construct, arguments)?;

                interceptors.run(&binding.key, &mut *dependency);
                Ok(Arc::from(dependency))
            }
            Producer::Class { class, construct, convert } => {
                let arguments = self.resolve_arguments(binding)?;
                let mut dependency = call(binding.key, construct, arguments)?;

                if *class != binding.key {
                    interceptors.run(class, &mut *dependency);
                }
                let mut dependency = convert(dependency).map_err(|err| {
                    error!("{}", err);
                    err
                })?;
                interceptors.run(&binding.key, &mut *dependency);
                Ok(Arc::from(dependency))
            }
        }
    }

    /// Resolves the signature left to right on behalf of the binding's consumer
    fn resolve_arguments(&mut self, binding: &'a BindingData) -> Result<Vec<Argument>, ResolveErrorKind> {
        let consuming = Some(binding.consumer());
        let parameters = binding.signature.parameters();

        let mut arguments = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            let argument = match parameter.kind() {
                ParameterKind::List => Argument::List(self.resolve_all(parameter.key(), consuming)?),
                ParameterKind::Required | ParameterKind::Optional => {
                    let site = Site {
                        consuming,
                        parameter: Some(parameter.name()),
                        optional: parameter.is_optional(),
                    };
                    match self.resolve(parameter.key(), site)? {
                        Some(dependency) => Argument::Single(dependency),
                        None => parameter.default_value().map_or(Argument::Absent, Argument::Single),
                    }
                }
            };
            arguments.push(argument);
        }

        Ok(arguments)
    }
}

fn call(key: TypeKey, construct: &BoxedConstructor, arguments: Vec<Argument>) -> Result<BoxedAny, ResolveErrorKind> {
    construct(arguments).map_err(|err| {
        let err = match err {
            InstantiatorErrorKind::Deps(err) => err,
            InstantiatorErrorKind::Factory(source) => ResolveErrorKind::Instantiate { key, source },
        };
        error!("{}", err);
        err
    })
}
