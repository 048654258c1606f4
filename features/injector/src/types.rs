use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

/// Boxed error returned by constructor bodies and factories
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// The container is shared between threads
/// So anything injectable needs to be Send + Sync + 'static
///
/// Implemented for trait objects as well, e.g. `dyn Greeter` where `Greeter: Send + Sync`.
pub trait Injectable: Send + Sync + 'static {}
impl<T: ?Sized + Send + Sync + 'static> Injectable for T {}

/// A resolved service, type erased
///
/// Holds an `Arc<S>` where `S` is the service type it was produced for.
/// Cloning an instance never clones the service itself.
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    value: Arc<dyn Any + Send + Sync + 'static>,
}

impl Instance {
    pub fn new<S: Injectable + ?Sized>(service: Arc<S>) -> Self {
        Instance {
            info: TypeInfo::of::<S>(),
            value: Arc::new(service),
        }
    }

    /// Wraps an owned value
    pub fn from_value<V: Injectable>(value: V) -> Self {
        Self::new(Arc::new(value))
    }

    pub fn downcast<S: Injectable + ?Sized>(&self) -> Result<Arc<S>, &'static str> {
        match self.value.downcast_ref::<Arc<S>>() {
            Some(service) => Ok(service.clone()),
            None => Err(self.info.type_name),
        }
    }

    /// True if both handles point to the same service
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

/// Information about a dependency of a constructor parameter or property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyInfo {
    /// The required service type
    pub type_info: TypeInfo,
    /// If it is optional or required
    pub optional: bool,
    /// If the dependency is resolved lazily
    pub lazy: bool,
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// Identifies a registration: the service type plus an optional name
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ServiceKey {
    pub service: TypeInfo,
    pub name: Option<Arc<str>>,
}

impl ServiceKey {
    pub fn new(service: TypeInfo, name: Option<&str>) -> Self {
        ServiceKey {
            service,
            name: name.map(Arc::from),
        }
    }

    pub fn of<S: ?Sized + 'static>() -> Self {
        Self::new(TypeInfo::of::<S>(), None)
    }

    pub fn named<S: ?Sized + 'static>(name: &str) -> Self {
        Self::new(TypeInfo::of::<S>(), Some(name))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} (name: \"{}\")", self.service, name),
            None => write!(f, "{}", self.service),
        }
    }
}

/// Converts a shared implementation into the shared service it is bound to.
///
/// Every type upcasts to itself. Trait object bindings are declared with [`implements!`](crate::implements).
pub trait Upcast<S: ?Sized>: Injectable {
    fn upcast(self: Arc<Self>) -> Arc<S>;
}
impl<T: Injectable> Upcast<T> for T {
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Declares that an implementation can be bound to one or more trait object services
///
/// ```ignore
/// trait Greeter: Send + Sync {}
/// struct English;
/// impl Greeter for English {}
///
/// injector::implements!(English => dyn Greeter);
/// ```
#[macro_export]
macro_rules! implements {
    ($implementation:ty => $($service:ty),+ $(,)?) => {
        $(
            impl $crate::Upcast<$service> for $implementation {
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$service> {
                    self
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Shape: Send + Sync {
        fn corners(&self) -> usize;
    }
    struct Square;
    impl Shape for Square {
        fn corners(&self) -> usize {
            4
        }
    }
    crate::implements!(Square => dyn Shape);

    #[test]
    fn instance_keeps_identity_of_the_service() {
        let shape: Arc<dyn Shape> = <Square as Upcast<dyn Shape>>::upcast(Arc::new(Square));
        let instance = Instance::new(shape.clone());

        let resolved = instance.downcast::<dyn Shape>().unwrap();
        assert!(Arc::ptr_eq(&shape, &resolved));
        assert_eq!(resolved.corners(), 4);
        assert!(instance.ptr_eq(&instance.clone()));
    }

    #[test]
    fn downcast_to_wrong_type_reports_actual_type() {
        let instance = Instance::from_value(7u32);
        assert_eq!(instance.downcast::<String>().unwrap_err(), "u32");
    }

    #[test]
    fn service_keys_distinguish_names() {
        assert_ne!(ServiceKey::of::<u32>(), ServiceKey::named::<u32>("port"));
        assert_eq!(ServiceKey::named::<u32>("port").to_string(), "u32 (name: \"port\")");
    }
}
