#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod binding;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod context;
pub(crate) mod dependency_resolver;
pub(crate) mod errors;
pub(crate) mod finalizer;
pub(crate) mod inject;
pub(crate) mod instantiator;
pub(crate) mod interceptor;
pub(crate) mod key;
pub(crate) mod lifetime;
pub(crate) mod lock;
pub(crate) mod module;
pub(crate) mod registry;
pub(crate) mod resolver;
pub(crate) mod scope;
pub(crate) mod signature;

pub use any::{RcAny, TypeInfo};
pub use binding::Binding;
pub use config::Config;
pub use container::Container;
pub use context::PredicateContext;
pub use dependency_resolver::{Argument, Dependencies, DependencyResolver};
pub use errors::{DisposalError, FinalizeErrorKind, InstantiateErrorKind, InstantiatorErrorKind, RegistryErrorKind, ResolveErrorKind};
pub use finalizer::Finalizer;
pub use inject::{Inject, InjectAll, InjectNamed, InjectOptional, InjectOrDefault};
pub use instantiator::{Injectable, Instantiator};
pub use interceptor::Interceptor;
pub use key::{Key, Qualifier, TypeKey};
pub use lifetime::Lifetime;
pub use module::Module;
pub use registry::Registry;
pub use scope::{Scope, ScopeData};
pub use signature::{Parameter, ParameterKind, Signature};
