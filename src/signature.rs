use std::{borrow::Cow, sync::Arc};

use crate::{any::RcAny, key::TypeKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Resolution fails if the key is unbound
    Required,
    /// Falls back to the parameter default if the key is unbound
    Optional,
    /// Ordered multi-binding list
    List,
}

/// A single parameter a producer needs
#[derive(Debug, Clone)]
pub struct Parameter {
    name: Cow<'static, str>,
    key: TypeKey,
    kind: ParameterKind,
    default: Option<fn() -> RcAny>,
}

fn default_value<T: Default + Send + Sync + 'static>() -> RcAny {
    Arc::new(T::default())
}

impl Parameter {
    #[inline]
    #[must_use]
    pub const fn required(key: TypeKey) -> Self {
        Self {
            name: Cow::Borrowed(""),
            key,
            kind: ParameterKind::Required,
            default: None,
        }
    }

    /// Optional parameter whose default is the absence of a value
    #[inline]
    #[must_use]
    pub const fn optional(key: TypeKey) -> Self {
        Self {
            name: Cow::Borrowed(""),
            key,
            kind: ParameterKind::Optional,
            default: None,
        }
    }

    /// Optional parameter whose default is [`Default::default`] of `T`
    #[inline]
    #[must_use]
    pub fn or_default<T: Default + Send + Sync + 'static>(key: TypeKey) -> Self {
        Self {
            name: Cow::Borrowed(""),
            key,
            kind: ParameterKind::Optional,
            default: Some(default_value::<T>),
        }
    }

    #[inline]
    #[must_use]
    pub const fn list(key: TypeKey) -> Self {
        Self {
            name: Cow::Borrowed(""),
            key,
            kind: ParameterKind::List,
            default: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub const fn key(&self) -> TypeKey {
        self.key
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ParameterKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        matches!(self.kind, ParameterKind::Optional)
    }

    #[inline]
    #[must_use]
    pub const fn has_default(&self) -> bool {
        self.default.is_some()
    }

    #[inline]
    #[must_use]
    pub(crate) fn default_value(&self) -> Option<RcAny> {
        self.default.map(|default| default())
    }
}

/// Ordered parameters of a producer.
/// Built once when the binding is created and never inspected again.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    parameters: Box<[Parameter]>,
}

impl Signature {
    /// Names each parameter by `names` in order, the rest positionally
    #[must_use]
    pub(crate) fn new(parameters: Vec<Parameter>, names: &[&'static str]) -> Self {
        let parameters = parameters
            .into_iter()
            .enumerate()
            .map(|(index, parameter)| match names.get(index) {
                Some(name) => parameter.with_name(*name),
                None => parameter.with_name(format!("arg{index}")),
            })
            .collect();

        Self { parameters }
    }

    #[must_use]
    pub(crate) fn renamed(self, names: &[&'static str]) -> Self {
        Self::new(self.parameters.into_vec(), names)
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Parameter, ParameterKind, Signature};
    use crate::key::TypeKey;

    struct Clock;

    #[test]
    fn test_names() {
        let signature = Signature::new(
            vec![
                Parameter::required(TypeKey::of::<Clock>()),
                Parameter::optional(TypeKey::of::<u8>()),
                Parameter::list(TypeKey::of::<u16>()),
            ],
            &["clock"],
        );
        let names: Vec<_> = signature.parameters().iter().map(Parameter::name).collect();
        assert_eq!(names, ["clock", "arg1", "arg2"]);

        let renamed = signature.renamed(&["clock", "retries", "ports"]);
        assert_eq!(renamed.parameters()[2].name(), "ports");
        assert_eq!(renamed.parameters()[2].kind(), ParameterKind::List);
    }

    #[test]
    fn test_default_value() {
        let parameter = Parameter::or_default::<u8>(TypeKey::of::<u8>());
        assert!(parameter.is_optional());
        assert!(parameter.has_default());

        let value = parameter.default_value().unwrap();
        assert_eq!(*value.downcast::<u8>().unwrap(), 0);

        assert!(Parameter::optional(TypeKey::of::<u8>()).default_value().is_none());
    }
}
