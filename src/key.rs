use core::{
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
    marker::PhantomData,
};

use crate::any::TypeInfo;

/// Identity a binding is registered and looked up under.
///
/// Two keys are equal when they refer to the same type and carry the same qualifier.
/// The qualifier is the way to register several bindings of one underlying type,
/// for example a primary and a replica connection pool.
#[derive(Clone, Copy)]
pub struct TypeKey {
    type_info: TypeInfo,
    qualifier: Option<&'static str>,
}

impl TypeKey {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            qualifier: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn named<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            qualifier: Some(name),
        }
    }

    /// Wraps the key into a named one. An already named key gets its name replaced.
    #[inline]
    #[must_use]
    pub const fn qualified(self, name: &'static str) -> Self {
        Self {
            type_info: self.type_info,
            qualifier: Some(name),
        }
    }

    #[inline]
    #[must_use]
    pub const fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    #[must_use]
    pub const fn qualifier(&self) -> Option<&'static str> {
        self.qualifier
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_info == other.type_info && self.qualifier == other.qualifier
    }
}

impl Eq for TypeKey {}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_info
            .cmp(&other.type_info)
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_info.hash(state);
        self.qualifier.hash(state);
    }
}

impl Display for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_info.short_name())?;
        if let Some(qualifier) = self.qualifier {
            write!(f, "@{qualifier}")?;
        }
        Ok(())
    }
}

impl Debug for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_info.name)?;
        if let Some(qualifier) = self.qualifier {
            write!(f, "@{qualifier}")?;
        }
        Ok(())
    }
}

/// Marker for a named key known at compile time, used by [`crate::InjectNamed`] and [`Key::qualified_by`].
///
/// ```rust
/// use bindery::Qualifier;
///
/// struct Replica;
///
/// impl Qualifier for Replica {
///     const NAME: &'static str = "replica";
/// }
/// ```
pub trait Qualifier: 'static {
    const NAME: &'static str;
}

/// Typed view over a [`TypeKey`], so that the value type of a named key is checked at compile time
pub struct Key<T: ?Sized> {
    key: TypeKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ?Sized + 'static> Key<T> {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            _marker: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub fn named(name: &'static str) -> Self {
        Self {
            key: TypeKey::named::<T>(name),
            _marker: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub fn qualified_by<Q: Qualifier>() -> Self {
        Self::named(Q::NAME)
    }

    #[inline]
    #[must_use]
    pub const fn erase(self) -> TypeKey {
        self.key
    }
}

impl<T: ?Sized + 'static> Default for Key<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Key<T> {}

impl<T: ?Sized> From<Key<T>> for TypeKey {
    fn from(key: Key<T>) -> Self {
        key.key
    }
}

#[cfg(test)]
mod tests {
    use super::{Key, Qualifier, TypeKey};

    use std::{collections::BTreeSet, string::ToString as _};

    struct Database;
    struct Replica;

    impl Qualifier for Replica {
        const NAME: &'static str = "replica";
    }

    #[test]
    fn test_named_key_differs_from_plain() {
        let plain = TypeKey::of::<Database>();
        let named = TypeKey::named::<Database>("replica");

        assert_ne!(plain, named);
        assert_eq!(named, plain.qualified("replica"));
        assert_eq!(named, Key::<Database>::qualified_by::<Replica>().erase());
        assert_eq!(BTreeSet::from([plain, named, plain]).len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeKey::of::<Database>().to_string(), "Database");
        assert_eq!(TypeKey::named::<Database>("replica").to_string(), "Database@replica");
    }
}
