use std::{marker::PhantomData, sync::Arc};

use crate::{
    dependency_resolver::{Argument, DependencyResolver},
    key::{Qualifier, TypeKey},
    signature::Parameter,
    ResolveErrorKind,
};

/// Required dependency
pub struct Inject<Dep>(pub Arc<Dep>);

impl<Dep: Send + Sync + 'static> DependencyResolver for Inject<Dep> {
    fn parameter() -> Parameter {
        Parameter::required(TypeKey::of::<Dep>())
    }

    fn from_argument(argument: Argument) -> Result<Self, ResolveErrorKind> {
        argument.into_single().map(Self)
    }
}

/// Required dependency registered under the name of `Q`
pub struct InjectNamed<Dep, Q>(pub Arc<Dep>, pub PhantomData<Q>);

impl<Dep: Send + Sync + 'static, Q: Qualifier> DependencyResolver for InjectNamed<Dep, Q> {
    fn parameter() -> Parameter {
        Parameter::required(TypeKey::named::<Dep>(Q::NAME))
    }

    fn from_argument(argument: Argument) -> Result<Self, ResolveErrorKind> {
        argument.into_single().map(|dependency| Self(dependency, PhantomData))
    }
}

/// Dependency that is `None` when no binding exists for it
pub struct InjectOptional<Dep>(pub Option<Arc<Dep>>);

impl<Dep: Send + Sync + 'static> DependencyResolver for InjectOptional<Dep> {
    fn parameter() -> Parameter {
        Parameter::optional(TypeKey::of::<Dep>())
    }

    fn from_argument(argument: Argument) -> Result<Self, ResolveErrorKind> {
        argument.into_optional().map(Self)
    }
}

/// Dependency that falls back to [`Default::default`] when no binding exists for it.
/// The default value isn't cached, each fallback creates a new one.
pub struct InjectOrDefault<Dep>(pub Arc<Dep>);

impl<Dep: Default + Send + Sync + 'static> DependencyResolver for InjectOrDefault<Dep> {
    fn parameter() -> Parameter {
        Parameter::or_default::<Dep>(TypeKey::of::<Dep>())
    }

    fn from_argument(argument: Argument) -> Result<Self, ResolveErrorKind> {
        argument.into_single().map(Self)
    }
}

/// All multi-bindings of the dependency in registration order
pub struct InjectAll<Dep>(pub Vec<Arc<Dep>>);

impl<Dep: Send + Sync + 'static> DependencyResolver for InjectAll<Dep> {
    fn parameter() -> Parameter {
        Parameter::list(TypeKey::of::<Dep>())
    }

    fn from_argument(argument: Argument) -> Result<Self, ResolveErrorKind> {
        argument.into_list().map(Self)
    }
}
