use std::sync::Arc;
use tracing::debug;

use super::{
    dependency_resolver::{downcast, Argument, Dependencies},
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
};
use crate::any::{BoxedAny, RcAny};

/// Factory producer: a function whose parameters are [`crate::DependencyResolver`]s
/// and whose return type decides the key it is bound under.
pub trait Instantiator<Deps>: Send + Sync + 'static
where
    Deps: Dependencies,
{
    type Provides: 'static;
    type Error: Into<InstantiateErrorKind>;

    fn instantiate(&self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Result<Response, Err> + Send + Sync + 'static,
            Response: 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: crate::dependency_resolver::DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            #[inline]
            fn instantiate(&self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);

/// Class producer: a type that declares its own dependencies and how to build itself from them.
///
/// # Examples
/// ```rust
/// use bindery::{Inject, Injectable, InstantiateErrorKind};
/// use std::sync::Arc;
///
/// struct Clock;
///
/// struct Scheduler {
///     clock: Arc<Clock>,
/// }
///
/// impl Injectable for Scheduler {
///     type Dependencies = (Inject<Clock>,);
///
///     const PARAMETER_NAMES: &'static [&'static str] = &["clock"];
///
///     fn construct((Inject(clock),): Self::Dependencies) -> Result<Self, InstantiateErrorKind> {
///         Ok(Self { clock })
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    type Dependencies: Dependencies;

    /// Parameter names visible to contextual predicates, in declaration order
    const PARAMETER_NAMES: &'static [&'static str] = &[];

    /// # Errors
    /// Returns an error if the instance can't be built from the resolved dependencies
    fn construct(dependencies: Self::Dependencies) -> Result<Self, InstantiateErrorKind>;
}

pub(crate) type ConstructResult = Result<BoxedAny, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>>;

pub(crate) type BoxedConstructor = Box<dyn Fn(Vec<Argument>) -> ConstructResult + Send + Sync>;

pub(crate) type BoxedConverter = Box<dyn Fn(BoxedAny) -> Result<BoxedAny, ResolveErrorKind> + Send + Sync>;

#[must_use]
pub(crate) fn boxed_instantiator<Inst, Deps>(instantiator: Inst) -> BoxedConstructor
where
    Inst: Instantiator<Deps>,
    Inst::Provides: Send + Sync,
    Deps: Dependencies,
{
    Box::new(move |arguments| {
        let dependencies = Deps::from_arguments(arguments).map_err(InstantiatorErrorKind::Deps)?;
        let dependency = instantiator
            .instantiate(dependencies)
            .map_err(|err| InstantiatorErrorKind::Factory(err.into()))?;

        debug!("Instantiated");

        Ok(Box::new(dependency) as BoxedAny)
    })
}

#[must_use]
pub(crate) fn boxed_injectable<Impl: Injectable>() -> BoxedConstructor {
    Box::new(|arguments| {
        let dependencies = Impl::Dependencies::from_arguments(arguments).map_err(InstantiatorErrorKind::Deps)?;
        let dependency = Impl::construct(dependencies).map_err(InstantiatorErrorKind::Factory)?;

        debug!("Constructed");

        Ok(Box::new(dependency) as BoxedAny)
    })
}

#[must_use]
pub(crate) fn boxed_converter<Impl, T, F>(convert: F) -> BoxedConverter
where
    Impl: Send + Sync + 'static,
    T: Send + Sync + 'static,
    F: Fn(Impl) -> T + Send + Sync + 'static,
{
    Box::new(move |value| match value.downcast::<Impl>() {
        Ok(value) => Ok(Box::new(convert(*value)) as BoxedAny),
        Err(value) => Err(ResolveErrorKind::IncorrectType {
            expected: crate::any::TypeInfo::of::<Impl>(),
            actual: (*value).type_id(),
        }),
    })
}

pub(crate) type BoxedBoundConverter = Box<dyn Fn(RcAny) -> Result<BoxedAny, ResolveErrorKind> + Send + Sync>;

#[must_use]
pub(crate) fn boxed_bound_converter<Impl, T, F>(convert: F) -> BoxedBoundConverter
where
    Impl: Send + Sync + 'static,
    T: Send + Sync + 'static,
    F: Fn(Arc<Impl>) -> T + Send + Sync + 'static,
{
    Box::new(move |value| {
        let value = downcast::<Impl>(value)?;
        Ok(Box::new(convert(value)) as BoxedAny)
    })
}

/// Creates a `Box<dyn Trait>` from a value, optionally including supertraits.
/// Handy as the conversion of [`crate::Binding::to_with`].
///
/// # Syntax
/// ```text
/// boxed!(value; Trait [+ SuperTrait1 [+ SuperTrait2 ...]])
/// ```
///
/// # Examples
/// ```rust
/// use bindery::boxed;
///
/// trait FileSystem {}
///
/// struct InMemoryFileSystem;
///
/// impl FileSystem for InMemoryFileSystem {}
///
/// let fs: Box<dyn FileSystem + Send + Sync> = boxed!(InMemoryFileSystem; FileSystem + Send + Sync);
/// ```
#[macro_export]
macro_rules! boxed {
    ($val:expr ; $trait:tt $($super_traits:tt)*) => {{
        Box::new($val) as Box<dyn $r#trait $($super_traits)*>
    }};
}

#[cfg(test)]
mod tests {
    use super::{boxed_converter, boxed_injectable, boxed_instantiator, Injectable, InstantiateErrorKind, Instantiator};
    use crate::{
        dependency_resolver::{Argument, Dependencies},
        errors::{InstantiatorErrorKind, ResolveErrorKind},
        inject::{Inject, InjectOptional},
    };

    use core::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;
    use tracing::debug;
    use tracing_test::traced_test;

    struct Request(bool);
    struct Response(bool);

    struct Handler(Arc<Request>);

    impl Injectable for Handler {
        type Dependencies = (Inject<Request>,);

        fn construct((Inject(request),): Self::Dependencies) -> Result<Self, InstantiateErrorKind> {
            Ok(Self(request))
        }
    }

    #[test]
    #[allow(dead_code)]
    fn test_factory_helper() {
        fn resolver<Deps: Dependencies, F: Instantiator<Deps>>(_f: F) {}
        fn resolver_with_dep() {
            resolver(|| Ok::<_, InstantiateErrorKind>(()));
            resolver(|Inject(val): Inject<u8>, InjectOptional(_): InjectOptional<u16>| Ok::<_, InstantiateErrorKind>(*val));
        }
    }

    #[test]
    #[traced_test]
    fn test_boxed_instantiator() {
        let call_count = Arc::new(AtomicU8::new(0));

        let instantiator = boxed_instantiator({
            let call_count = call_count.clone();
            move |Inject(request): Inject<Request>| {
                call_count.fetch_add(1, Ordering::SeqCst);

                debug!("Call instantiator response");
                Ok::<_, InstantiateErrorKind>(Response(request.0))
            }
        });

        let response_1 = instantiator(vec![Argument::Single(Arc::new(Request(true)))]).unwrap();
        let response_2 = instantiator(vec![Argument::Single(Arc::new(Request(false)))]).unwrap();

        assert!(response_1.downcast::<Response>().unwrap().0);
        assert!(!response_2.downcast::<Response>().unwrap().0);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_boxed_instantiator_errors() {
        let failing = boxed_instantiator(|| Err::<Response, _>(InstantiateErrorKind::from(anyhow::anyhow!("boom"))));
        assert!(matches!(failing(vec![]), Err(InstantiatorErrorKind::Factory(_))));

        let mismatched = boxed_instantiator(|Inject(request): Inject<Request>| Ok::<_, InstantiateErrorKind>(Response(request.0)));
        assert!(matches!(
            mismatched(vec![]),
            Err(InstantiatorErrorKind::Deps(ResolveErrorKind::SignatureMismatch { .. }))
        ));
    }

    #[test]
    #[traced_test]
    fn test_boxed_injectable_and_converter() {
        struct Wrapped(Handler);

        let constructor = boxed_injectable::<Handler>();
        let converter = boxed_converter::<Handler, Wrapped, _>(Wrapped);

        let handler = constructor(vec![Argument::Single(Arc::new(Request(true)))]).unwrap();
        let wrapped = converter(handler).unwrap().downcast::<Wrapped>().unwrap();
        assert!(wrapped.0 .0 .0);

        assert!(matches!(
            converter(Box::new(Request(true))),
            Err(ResolveErrorKind::IncorrectType { .. })
        ));
    }
}
