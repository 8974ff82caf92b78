use crate::any::TypeInfo;

/// Error returned by a producer.
/// Any error convertible into [`anyhow::Error`] can be turned into it with `?` or `Into`.
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

/// Error returned by a finalizer
#[derive(thiserror::Error, Debug)]
pub enum FinalizeErrorKind {
    #[error("Finalizer received a value of unexpected type, expected: {}", expected.name)]
    IncorrectType { expected: TypeInfo },
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
