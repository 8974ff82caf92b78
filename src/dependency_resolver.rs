use std::sync::Arc;

use super::errors::ResolveErrorKind;
use crate::{
    any::{RcAny, TypeInfo},
    signature::Parameter,
};

/// Value the engine resolved for one [`Parameter`]
pub enum Argument {
    Single(RcAny),
    /// Optional parameter without binding and without a default value
    Absent,
    List(Vec<RcAny>),
}

impl Argument {
    /// # Errors
    /// Returns [`ResolveErrorKind::IncorrectType`] if the argument isn't a single value of type `T`
    pub fn into_single<T: Send + Sync + 'static>(self) -> Result<Arc<T>, ResolveErrorKind> {
        match self {
            Argument::Single(value) => downcast(value),
            Argument::Absent | Argument::List(_) => Err(incorrect_shape::<T>(&self)),
        }
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::IncorrectType`] if the argument is a list or has another type
    pub fn into_optional<T: Send + Sync + 'static>(self) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        match self {
            Argument::Single(value) => downcast(value).map(Some),
            Argument::Absent => Ok(None),
            Argument::List(_) => Err(incorrect_shape::<T>(&self)),
        }
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::IncorrectType`] if the argument isn't a list of `T`
    pub fn into_list<T: Send + Sync + 'static>(self) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        match self {
            Argument::List(values) => values.into_iter().map(downcast).collect(),
            Argument::Single(_) | Argument::Absent => Err(incorrect_shape::<Vec<Arc<T>>>(&self)),
        }
    }
}

#[inline]
fn incorrect_shape<T: 'static>(argument: &Argument) -> ResolveErrorKind {
    let actual = match argument {
        Argument::Single(value) => (**value).type_id(),
        Argument::Absent => TypeInfo::of::<()>().id,
        Argument::List(_) => TypeInfo::of::<Vec<RcAny>>().id,
    };
    ResolveErrorKind::IncorrectType {
        expected: TypeInfo::of::<T>(),
        actual,
    }
}

pub(crate) fn downcast<T: Send + Sync + 'static>(value: RcAny) -> Result<Arc<T>, ResolveErrorKind> {
    value.downcast::<T>().map_err(|value| ResolveErrorKind::IncorrectType {
        expected: TypeInfo::of::<T>(),
        actual: (*value).type_id(),
    })
}

/// A single injectable parameter of a producer. See [`crate::Inject`] and its siblings.
pub trait DependencyResolver: Sized + 'static {
    /// Parameter this type stands for. The engine names it.
    fn parameter() -> Parameter;

    /// # Errors
    /// Returns [`ResolveErrorKind::IncorrectType`] if the argument doesn't match the parameter
    fn from_argument(argument: Argument) -> Result<Self, ResolveErrorKind>;
}

/// Ordered parameters of a producer, implemented for tuples of [`DependencyResolver`]
pub trait Dependencies: Sized + 'static {
    fn parameters() -> Vec<Parameter>;

    /// # Errors
    /// - Returns [`ResolveErrorKind::SignatureMismatch`] if argument count differs from parameter count
    /// - Returns [`ResolveErrorKind::IncorrectType`] if some argument doesn't match its parameter
    fn from_arguments(arguments: Vec<Argument>) -> Result<Self, ResolveErrorKind>;
}

macro_rules! impl_dependencies {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut)]
        impl<$($ty,)*> Dependencies for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            #[inline]
            fn parameters() -> Vec<Parameter> {
                vec![$($ty::parameter(),)*]
            }

            #[inline]
            #[allow(unused_variables)]
            fn from_arguments(arguments: Vec<Argument>) -> Result<Self, ResolveErrorKind> {
                let expected = <[&str]>::len(&[$(stringify!($ty),)*]);
                let actual = arguments.len();
                if expected != actual {
                    return Err(ResolveErrorKind::SignatureMismatch { expected, actual });
                }

                let mut arguments = arguments.into_iter();
                Ok(($(
                    $ty::from_argument(arguments.next().ok_or(ResolveErrorKind::SignatureMismatch { expected, actual })?)?,
                )*))
            }
        }
    };
}

all_the_tuples!(impl_dependencies);
