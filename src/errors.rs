mod dependency_resolver;
mod disposal;
mod instantiate;
mod instantiator;
mod registry;

pub use dependency_resolver::ResolveErrorKind;
pub use disposal::DisposalError;
pub use instantiate::{FinalizeErrorKind, InstantiateErrorKind};
pub use instantiator::InstantiatorErrorKind;
pub use registry::RegistryErrorKind;
