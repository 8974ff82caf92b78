/// Policy that decides whether a constructed instance is reused.
///
/// The lifetime belongs to the binding, not to the site requesting it.
/// Binding `Box<dyn Repo>` to `PostgresRepo` as [`Lifetime::Singleton`] doesn't make `PostgresRepo` itself a singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifetime {
    /// A new instance on every resolution
    #[default]
    Transient,
    /// One instance for the whole container, disposed on container close
    Singleton,
    /// One instance per open scope, disposed on scope close
    Scoped,
}

impl Lifetime {
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Lifetime::Transient => "transient",
            Lifetime::Singleton => "singleton",
            Lifetime::Scoped => "scoped",
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_cached(self) -> bool {
        !matches!(self, Lifetime::Transient)
    }
}
