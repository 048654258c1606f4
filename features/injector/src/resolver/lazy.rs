use std::{
    any::type_name,
    fmt::Debug,
    ops::Deref,
    sync::{Arc, OnceLock, Weak},
};

use crate::{
    container::{Injector, InjectorInner},
    errors::ResolveError,
    resolver::{arc::downcast_instance, Argument, Dependency},
    types::{DependencyInfo, Injectable, ServiceKey, TypeInfo},
};

/// A pending resolution of a service, held by [`Lazy`]
///
/// Keeps only a weak reference to the injector, so singletons holding a `Lazy` do not keep it alive.
#[derive(Debug, Clone)]
pub struct DeferredResolution {
    injector: Weak<InjectorInner>,
    key: ServiceKey,
}

impl DeferredResolution {
    pub(crate) fn new(injector: &Injector, key: ServiceKey) -> Self {
        DeferredResolution {
            injector: Arc::downgrade(&injector.0),
            key,
        }
    }

    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    fn resolve<S: Injectable + ?Sized>(&self) -> Result<Arc<S>, ResolveError> {
        let inner = self
            .injector
            .upgrade()
            .ok_or_else(|| ResolveError::InjectorDropped(self.key.clone()))?;
        let instance = Injector(inner).resolve(&self.key, false)?;
        downcast_instance(&instance)
    }
}

/// Lazily resolved dependency
///
/// The service is resolved on first access, which allows two components to depend on each other.
///
/// ### Panics
///
/// [`Lazy::get`] and `Deref` panic if the resolution fails - use [`Lazy::try_get`] to handle the error.
pub struct Lazy<S: Injectable + ?Sized>(Arc<LazyInner<S>>);

struct LazyInner<S: Injectable + ?Sized> {
    source: Option<DeferredResolution>,
    once: OnceLock<Result<Arc<S>, ResolveError>>,
}

impl<S: Injectable + ?Sized> Clone for Lazy<S> {
    fn clone(&self) -> Self {
        Lazy(self.0.clone())
    }
}

impl<S: Injectable + ?Sized + Debug> Debug for Lazy<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.once.get() {
            Some(Ok(service)) => f.debug_tuple("Lazy").field(service).finish(),
            Some(Err(_)) => f.debug_tuple("Lazy").field(&"<failed>").finish(),
            None => f.debug_tuple("Lazy").field(&"<pending>").finish(),
        }
    }
}

impl<S: Injectable + ?Sized> Deref for Lazy<S> {
    type Target = Arc<S>;

    fn deref(&self) -> &Self::Target {
        self.get()
    }
}

impl<S: Injectable + ?Sized> Lazy<S> {
    fn deferred(source: DeferredResolution) -> Self {
        Lazy(Arc::new(LazyInner {
            source: Some(source),
            once: OnceLock::new(),
        }))
    }

    fn ready(result: Result<Arc<S>, ResolveError>) -> Self {
        Lazy(Arc::new(LazyInner {
            source: None,
            once: OnceLock::from(result),
        }))
    }

    /// Accesses the lazy dependency
    ///
    /// # Panics
    /// - When the dependency cannot be resolved
    pub fn get(&self) -> &Arc<S> {
        match self.try_get() {
            Ok(service) => service,
            Err(err) => panic!("Lazy dependency on '{}' failed: {err}", type_name::<S>()),
        }
    }

    /// Try to access the lazy dependency, resolving it on first access
    pub fn try_get(&self) -> Result<&Arc<S>, &ResolveError> {
        self.0
            .once
            .get_or_init(|| match &self.0.source {
                Some(source) => source.resolve::<S>(),
                None => Err(ResolveError::DowncastFailed {
                    required_type: type_name::<S>(),
                    actual_type: "<empty>",
                }),
            })
            .as_ref()
    }

    /// True once the dependency was resolved (successfully or not)
    pub fn is_resolved(&self) -> bool {
        self.0.once.get().is_some()
    }
}

impl<S: Injectable + ?Sized> Dependency for Lazy<S> {
    fn dependency_info() -> DependencyInfo {
        DependencyInfo {
            type_info: TypeInfo::of::<S>(),
            optional: false,
            lazy: true,
        }
    }

    fn from_argument(argument: Argument) -> Result<Self, ResolveError> {
        match argument {
            Argument::Deferred(source) => Ok(Lazy::deferred(source)),
            // Value overrides arrive already resolved
            Argument::Resolved(instance) => Ok(Lazy::ready(downcast_instance(&instance))),
            Argument::Absent => Err(ResolveError::DowncastFailed {
                required_type: type_name::<S>(),
                actual_type: "<absent>",
            }),
        }
    }
}
