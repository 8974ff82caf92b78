use core::{
    any::TypeId,
    fmt::{self, Display, Formatter},
};

use super::instantiate::InstantiateErrorKind;
use crate::{any::TypeInfo, key::TypeKey};

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("Binding for {key} not found in registry")]
    Unresolved { key: TypeKey },
    #[error("{key} has several bindings, it can only be requested as a list")]
    Ambiguous { key: TypeKey },
    #[error("{}", CyclePath(path))]
    CircularDependency { path: Vec<TypeKey> },
    #[error("{key} is scoped. You can't resolve it outside of an open scope")]
    ScopedOutsideScope { key: TypeKey },
    #[error("Container or scope is already closed")]
    Closed,
    #[error("Incorrect binding provides type. Actual: {actual:?}, expected: {}", expected.name)]
    IncorrectType { expected: TypeInfo, actual: TypeId },
    #[error("Signature declares {expected} parameters, but {actual} arguments were resolved")]
    SignatureMismatch { expected: usize, actual: usize },
    #[error("Instantiation of {key} failed: {source}")]
    Instantiate { key: TypeKey, source: InstantiateErrorKind },
}

struct CyclePath<'a>(&'a [TypeKey]);

impl Display for CyclePath<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependency detected: ")?;
        let mut keys = self.0.iter();
        if let Some(key) = keys.next() {
            write!(f, "{key}")?;
        }
        for key in keys {
            write!(f, " -> {key}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ResolveErrorKind;
    use crate::key::TypeKey;

    use std::string::ToString as _;

    struct A;
    struct B;

    #[test]
    fn test_cycle_display() {
        let err = ResolveErrorKind::CircularDependency {
            path: vec![TypeKey::of::<A>(), TypeKey::of::<B>(), TypeKey::of::<A>()],
        };
        assert_eq!(err.to_string(), "Circular dependency detected: A -> B -> A");
    }
}
