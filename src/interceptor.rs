use std::{any::Any, collections::BTreeMap, sync::Arc};
use tracing::{debug, warn};

use crate::key::TypeKey;

/// Post-construction hook of a `T`, allowed to mutate the instance before anyone observes it
pub trait Interceptor<T>: Send + Sync + 'static {
    fn intercept(&self, instance: &mut T);
}

impl<F, T> Interceptor<T> for F
where
    F: Fn(&mut T) + Send + Sync + 'static,
{
    #[inline]
    fn intercept(&self, instance: &mut T) {
        self(instance);
    }
}

type BoxedInterceptor = Arc<dyn Fn(&mut (dyn Any + Send + Sync)) -> bool + Send + Sync>;

struct InterceptorData {
    order: i32,
    action: BoxedInterceptor,
}

/// Interceptors grouped by the key whose freshly built instances they receive
#[derive(Default)]
pub(crate) struct Interceptors {
    map: BTreeMap<TypeKey, Vec<InterceptorData>>,
}

impl Interceptors {
    pub(crate) fn add<T: Send + Sync + 'static>(&mut self, key: TypeKey, order: i32, interceptor: impl Interceptor<T>) {
        let action: BoxedInterceptor = Arc::new(move |instance: &mut (dyn Any + Send + Sync)| match instance.downcast_mut::<T>() {
            Some(instance) => {
                interceptor.intercept(instance);
                true
            }
            None => false,
        });
        self.map.entry(key).or_default().push(InterceptorData { order, action });
    }

    /// Orders each group by `order`, keeping registration order for equal ones
    pub(crate) fn sort(&mut self) {
        for interceptors in self.map.values_mut() {
            interceptors.sort_by_key(|data| data.order);
        }
    }

    pub(crate) fn run(&self, key: &TypeKey, instance: &mut (dyn Any + Send + Sync)) {
        let Some(interceptors) = self.map.get(key) else {
            return;
        };
        for InterceptorData { order, action } in interceptors {
            if action(instance) {
                debug!(%key, order, "Interceptor called");
            } else {
                warn!(%key, order, "Interceptor skipped, instance has another type");
            }
        }
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn len(&self, key: &TypeKey) -> usize {
        self.map.get(key).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::Interceptors;
    use crate::key::TypeKey;

    use std::any::Any;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Router {
        routes: Vec<&'static str>,
    }

    #[test]
    #[traced_test]
    fn test_run_in_order() {
        let key = TypeKey::of::<Router>();
        let mut interceptors = Interceptors::default();
        interceptors.add(key, 2, |router: &mut Router| router.routes.push("second"));
        interceptors.add(key, 1, |router: &mut Router| router.routes.push("first"));
        interceptors.add(key, 2, |router: &mut Router| router.routes.push("third"));
        interceptors.sort();

        let mut router: Box<dyn Any + Send + Sync> = Box::new(Router::default());
        interceptors.run(&key, &mut *router);

        let router = router.downcast::<Router>().unwrap();
        assert_eq!(router.routes, ["first", "second", "third"]);
        assert_eq!(interceptors.len(&key), 3);
        assert_eq!(interceptors.len(&TypeKey::named::<Router>("admin")), 0);
    }

    #[test]
    #[traced_test]
    fn test_skip_other_type() {
        let key = TypeKey::of::<Router>();
        let mut interceptors = Interceptors::default();
        interceptors.add(key, 0, |router: &mut Router| router.routes.push("route"));

        let mut value: Box<dyn Any + Send + Sync> = Box::new(1u8);
        interceptors.run(&key, &mut *value);

        assert!(logs_contain("Interceptor skipped"));
    }
}
