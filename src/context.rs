use crate::{any::TypeInfo, key::TypeKey};

/// What a contextual predicate sees: who consumes the dependency and through which parameter.
/// Both are `None` for a dependency requested directly from a container or a scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredicateContext<'a> {
    consuming: Option<TypeKey>,
    parameter: Option<&'a str>,
}

impl<'a> PredicateContext<'a> {
    #[inline]
    #[must_use]
    pub const fn new(consuming: Option<TypeKey>, parameter: Option<&'a str>) -> Self {
        Self { consuming, parameter }
    }

    /// Key of the class (or of the factory binding) being constructed
    #[inline]
    #[must_use]
    pub const fn consuming(&self) -> Option<TypeKey> {
        self.consuming
    }

    #[inline]
    #[must_use]
    pub const fn parameter(&self) -> Option<&'a str> {
        self.parameter
    }

    /// `true` if the consumer is of type `C`, regardless of the name it is bound under
    #[inline]
    #[must_use]
    pub fn is_injected_into<C: ?Sized + 'static>(&self) -> bool {
        self.consuming.is_some_and(|key| key.type_info() == TypeInfo::of::<C>())
    }
}
