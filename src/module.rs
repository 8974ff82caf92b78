use crate::registry::Registry;

/// Bundle of related bindings, factories and interceptors.
/// Installing a module replays its declarations into the registry,
/// so a module installed later overrides single bindings of the earlier ones and appends to their multi-bindings.
///
/// # Examples
/// ```rust
/// use bindery::{Binding, Container, InstantiateErrorKind, Module, Registry};
///
/// struct EventBus(&'static str);
///
/// struct InMemoryModule;
///
/// impl Module for InMemoryModule {
///     fn configure(&self, registry: &mut Registry) {
///         registry.factory(|| Ok::<_, InstantiateErrorKind>(EventBus("in-memory")));
///     }
/// }
///
/// let mut registry = Registry::new();
/// registry
///     .install(&InMemoryModule)
///     .install(&|registry: &mut Registry| {
///         registry.bind(Binding::instance(EventBus("kafka")));
///     });
///
/// let container = Container::new(registry);
/// assert_eq!(container.get::<EventBus>().unwrap().0, "kafka");
/// ```
pub trait Module {
    fn configure(&self, registry: &mut Registry);
}

impl<F> Module for F
where
    F: Fn(&mut Registry),
{
    #[inline]
    fn configure(&self, registry: &mut Registry) {
        self(registry);
    }
}
