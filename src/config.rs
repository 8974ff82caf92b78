use crate::lifetime::Lifetime;

/// Config for a binding
/// ## Fields
/// - `lifetime`:
///   Reuse policy of the instance provided by the binding.
///
///   This does **not** affect the dependencies of the instance.
///   Each of them is cached according to its own binding.
/// - `parameter_names`:
///   Names of the producer parameters in declaration order, visible to contextual predicates.
///   Parameters without a name here are named by their position: `arg0`, `arg1`, ...
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    pub lifetime: Lifetime,
    pub parameter_names: Option<&'static [&'static str]>,
}

impl Config {
    #[inline]
    #[must_use]
    pub const fn with_lifetime(lifetime: Lifetime) -> Self {
        Self {
            lifetime,
            parameter_names: None,
        }
    }
}
