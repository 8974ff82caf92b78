use crate::key::TypeKey;

#[derive(thiserror::Error, Debug)]
pub enum RegistryErrorKind {
    #[error("Registry is sealed, bindings can't be changed after the first resolution")]
    Sealed,
    #[error("Binding for {key} already exists and the registry is sealed")]
    DuplicateBinding { key: TypeKey },
}
