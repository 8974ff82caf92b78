use std::sync::Arc;

use crate::{
    any::{RcAny, TypeInfo},
    errors::FinalizeErrorKind,
};

/// Disposal callback of a cached instance.
/// Called exactly once, when the owner of the instance is closed:
/// the container for singletons, the scope for scoped instances.
pub trait Finalizer<Dep>: Send + Sync + 'static {
    /// # Errors
    /// Returns an error if the dependency can't be disposed. Other finalizers are called anyway.
    fn finalize(&self, dependency: Arc<Dep>) -> Result<(), FinalizeErrorKind>;
}

impl<F, Dep, Err> Finalizer<Dep> for F
where
    F: Fn(Arc<Dep>) -> Result<(), Err> + Send + Sync + 'static,
    Err: Into<FinalizeErrorKind>,
{
    #[inline]
    fn finalize(&self, dependency: Arc<Dep>) -> Result<(), FinalizeErrorKind> {
        self(dependency).map_err(Into::into)
    }
}

pub(crate) type BoxedFinalizer = Arc<dyn Fn(RcAny) -> Result<(), FinalizeErrorKind> + Send + Sync>;

#[must_use]
pub(crate) fn boxed_finalizer<Dep, Fin>(finalizer: Fin) -> BoxedFinalizer
where
    Dep: Send + Sync + 'static,
    Fin: Finalizer<Dep>,
{
    Arc::new(move |dependency: RcAny| match dependency.downcast::<Dep>() {
        Ok(dependency) => finalizer.finalize(dependency),
        Err(_) => Err(FinalizeErrorKind::IncorrectType {
            expected: TypeInfo::of::<Dep>(),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::boxed_finalizer;
    use crate::errors::FinalizeErrorKind;

    use core::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;

    struct Connection;

    #[test]
    fn test_boxed_finalizer() {
        let call_count = Arc::new(AtomicU8::new(0));
        let finalizer = boxed_finalizer({
            let call_count = call_count.clone();
            move |_: Arc<Connection>| {
                call_count.fetch_add(1, Ordering::SeqCst);
                Ok::<_, FinalizeErrorKind>(())
            }
        });

        finalizer(Arc::new(Connection)).unwrap();
        assert!(matches!(
            finalizer(Arc::new(1u8)),
            Err(FinalizeErrorKind::IncorrectType { .. })
        ));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }
}
