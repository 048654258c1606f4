use std::{cell::RefCell, sync::Arc};

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::{
    container::Injector,
    errors::{ResolutionPath, ResolveError},
    factories::Built,
    introspector::TypeMetadata,
    registration::{Binding, Registration, TypeBinding},
    resolver::{Argument, DeferredResolution},
    types::{DependencyInfo, DynError, Instance, ServiceKey},
};

/// Constructed singleton instances
///
/// Each key owns a slot; the first resolution initializes it while later ones wait for it.
#[derive(Default)]
pub struct SingletonCache {
    slots: DashMap<ServiceKey, Arc<OnceCell<Instance>>>,
}

impl SingletonCache {
    /// The slot of a key, created if missing
    pub(crate) fn slot(&self, key: &ServiceKey) -> Arc<OnceCell<Instance>> {
        if let Some(slot) = self.slots.get(key) {
            return slot.clone();
        }
        self.slots.entry(key.clone()).or_default().clone()
    }

    pub fn get(&self, key: &ServiceKey) -> Option<Instance> {
        self.slots.get(key).and_then(|slot| slot.value().get().cloned())
    }

    /// True if the key holds a constructed instance
    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.get(key).is_some()
    }

    /// Drops the slot of a key, returns true if it held an instance
    pub fn evict(&self, key: &ServiceKey) -> bool {
        self.slots
            .remove(key)
            .map(|(_, slot)| slot.get().is_some())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value().get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots.clear();
    }
}

thread_local! {
    /// Keys currently being resolved on this thread, outermost first
    static RESOLUTION_PATH: RefCell<Vec<ServiceKey>> = const { RefCell::new(Vec::new()) };
}

/// Marks a key as being resolved on the current thread until dropped
///
/// The path is per thread, so resolutions started from within a constructor (e.g. by a `Lazy`
/// accessed during construction) still see the keys of the outer resolution.
struct PathGuard;

impl PathGuard {
    fn enter(key: &ServiceKey, max_depth: usize) -> Result<PathGuard, ResolveError> {
        RESOLUTION_PATH.with(|path| {
            let mut path = path.borrow_mut();
            if path.contains(key) {
                let mut chain = path.clone();
                chain.push(key.clone());
                return Err(ResolveError::CircularDependency {
                    key: key.clone(),
                    path: ResolutionPath(chain),
                });
            }
            if path.len() >= max_depth {
                let mut chain = path.clone();
                chain.push(key.clone());
                return Err(ResolveError::DepthExceeded {
                    key: key.clone(),
                    max_depth,
                    path: ResolutionPath(chain),
                });
            }
            path.push(key.clone());
            Ok(PathGuard)
        })
    }

    fn current() -> ResolutionPath {
        RESOLUTION_PATH.with(|path| ResolutionPath(path.borrow().clone()))
    }

    fn is_outermost() -> bool {
        RESOLUTION_PATH.with(|path| path.borrow().is_empty())
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        RESOLUTION_PATH.with(|path| {
            path.borrow_mut().pop();
        });
    }
}

/// What a lookup found for a key
enum Target {
    Registered {
        registration: Registration,
        slot: Option<Arc<OnceCell<Instance>>>,
    },
    Scanned(Registration),
}

impl Injector {
    /// Resolves the instance bound to `key`
    ///
    /// With `new_instance` set, a new instance is constructed even for singletons and the
    /// singleton cache is neither read nor written.
    pub fn resolve(&self, key: &ServiceKey, new_instance: bool) -> Result<Instance, ResolveError> {
        let outermost = PathGuard::is_outermost();
        let result = self.resolve_key(key, new_instance);
        if outermost {
            if let Err(error) = &result {
                tracing::debug!("Failed to resolve {}: {}", key, error);
            }
        }
        result
    }

    fn resolve_key(&self, key: &ServiceKey, new_instance: bool) -> Result<Instance, ResolveError> {
        let _guard = PathGuard::enter(key, self.0.options.max_depth)?;

        match self.lookup(key, new_instance)? {
            Target::Registered {
                registration,
                slot: Some(slot),
            } => self.resolve_singleton(&registration, &slot),
            Target::Registered {
                registration,
                slot: None,
            } => {
                let instance = match &registration.binding {
                    Binding::Instance(instance) => instance.clone(),
                    _ => self.produce(&registration)?,
                };
                registration.notify(&instance);
                Ok(instance)
            }
            Target::Scanned(registration) => {
                let instance = self.produce(&registration)?;
                registration.notify(&instance);
                Ok(instance)
            }
        }
    }

    /// Finds the registration of a key, falling back to the scanner for unnamed keys
    ///
    /// The singleton slot is taken while the registration entry is locked, so a concurrent
    /// switch to multi instance cannot leave a slot behind.
    fn lookup(&self, key: &ServiceKey, new_instance: bool) -> Result<Target, ResolveError> {
        if let Some(entry) = self.0.registrations.entries.get(key) {
            let registration = entry.value().clone();
            let cacheable = registration.singleton
                && !new_instance
                && !matches!(registration.binding, Binding::Instance(_));
            let slot = cacheable.then(|| self.0.singletons.slot(key));
            drop(entry);
            return Ok(Target::Registered { registration, slot });
        }

        if key.name.is_none() {
            let scanned = self
                .0
                .scanner
                .scan(key.service)
                .map_err(|error| error.within(PathGuard::current()))?;
            if let Some(binding) = scanned {
                return Ok(Target::Scanned(Registration::new(
                    key.clone(),
                    Binding::Type(binding),
                )));
            }
        }

        Err(ResolveError::Unresolvable {
            key: key.clone(),
            path: PathGuard::current(),
        })
    }

    fn resolve_singleton(
        &self,
        registration: &Registration,
        slot: &OnceCell<Instance>,
    ) -> Result<Instance, ResolveError> {
        if let Some(cached) = slot.get() {
            tracing::trace!("Using cached instance of {}", registration.key);
            return Ok(cached.clone());
        }

        let mut constructed = false;
        let instance = slot
            .get_or_try_init(|| {
                constructed = true;
                self.produce(registration)
            })?
            .clone();

        if constructed {
            tracing::debug!("Cached singleton instance of {}", registration.key);
            registration.notify(&instance);
        }
        Ok(instance)
    }

    /// Produces a new instance for a type or factory binding
    fn produce(&self, registration: &Registration) -> Result<Instance, ResolveError> {
        match &registration.binding {
            Binding::Instance(instance) => Ok(instance.clone()),
            Binding::Factory(factory) => {
                tracing::debug!("Calling factory of {}", registration.key);
                Ok(factory())
            }
            Binding::Type(binding) => self.construct(registration, binding),
        }
    }

    fn construct(
        &self,
        registration: &Registration,
        binding: &TypeBinding,
    ) -> Result<Instance, ResolveError> {
        let metadata = self
            .0
            .introspector
            .metadata(binding.implementation, binding.describe)?;

        tracing::debug!(
            "Constructing {} for {}",
            binding.implementation.type_name,
            registration.key
        );

        let mut built = self.invoke_constructor(registration, binding, &metadata)?;
        self.inject_properties(&metadata, &mut built)?;
        (binding.finish)(built, metadata.type_info)
    }

    fn invoke_constructor(
        &self,
        registration: &Registration,
        binding: &TypeBinding,
        metadata: &TypeMetadata,
    ) -> Result<Built, ResolveError> {
        let constructor = &metadata.constructor;
        let result = if constructor.parameters.is_empty() {
            let factory = self
                .0
                .invoker
                .parameterless_factory(metadata.type_info, constructor);
            factory()
        } else {
            let mut arguments = Vec::with_capacity(constructor.arity());
            for parameter in &constructor.parameters {
                let argument = match registration.overrides.find(parameter) {
                    Some(value) => {
                        tracing::trace!(
                            "Using override for parameter '{}' of {}",
                            parameter.name,
                            metadata.type_info.type_name
                        );
                        Argument::Resolved(value.clone())
                    }
                    None => self.resolve_dependency(parameter.service_key(), parameter.dependency)?,
                };
                arguments.push(argument);
            }
            let factory = self
                .0
                .invoker
                .parameterized_factory(metadata.type_info, constructor);
            factory(arguments)
        };

        result.map_err(|error| construction_error(registration, binding, error))
    }

    fn inject_properties(
        &self,
        metadata: &TypeMetadata,
        built: &mut Built,
    ) -> Result<(), ResolveError> {
        for property in &metadata.properties {
            let argument = self.resolve_dependency(property.service_key(), property.dependency)?;
            tracing::trace!(
                "Injecting property '{}' of {}",
                property.name,
                metadata.type_info.type_name
            );
            (property.setter)(&mut **built, metadata.type_info, argument)?;
        }
        Ok(())
    }

    /// Resolves one constructor parameter or property
    fn resolve_dependency(
        &self,
        key: ServiceKey,
        dependency: DependencyInfo,
    ) -> Result<Argument, ResolveError> {
        if dependency.lazy {
            if dependency.optional && !self.can_resolve(&key)? {
                return Ok(Argument::Absent);
            }
            return Ok(Argument::Deferred(DeferredResolution::new(self, key)));
        }

        match self.resolve_key(&key, false) {
            Ok(instance) => Ok(Argument::Resolved(instance)),
            // Only a missing registration of the dependency itself makes it absent,
            // failures further down the graph are still errors
            Err(error) if dependency.optional && error.missing_key() == Some(&key) => {
                Ok(Argument::Absent)
            }
            Err(error) => Err(error),
        }
    }

    /// True if a key is registered or, for unnamed keys, has a unique scanned implementation
    ///
    /// An ambiguous scan is an error, not an absent implementation.
    pub(crate) fn can_resolve(&self, key: &ServiceKey) -> Result<bool, ResolveError> {
        if self.0.registrations.contains(key) {
            return Ok(true);
        }
        if key.name.is_some() {
            return Ok(false);
        }
        self.0
            .scanner
            .scan(key.service)
            .map(|scanned| scanned.is_some())
            .map_err(|error| error.within(PathGuard::current()))
    }
}

/// Constructor bodies report argument errors as boxed [`ResolveError`]s, unwrap those
fn construction_error(
    registration: &Registration,
    binding: &TypeBinding,
    error: DynError,
) -> ResolveError {
    match error.downcast::<ResolveError>() {
        Ok(resolve_error) => *resolve_error,
        Err(error) => {
            tracing::error!(
                "Constructor of {} failed: {}",
                binding.implementation.type_name,
                error
            );
            ResolveError::ConstructionFailed {
                key: registration.key.clone(),
                implementation: binding.implementation,
                error: Arc::new(error),
                path: PathGuard::current(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_shared_until_evicted() {
        let cache = SingletonCache::default();
        let key = ServiceKey::of::<u8>();

        let slot = cache.slot(&key);
        assert!(Arc::ptr_eq(&slot, &cache.slot(&key)));
        assert!(!cache.contains(&key));

        slot.set(Instance::from_value(7u8)).unwrap();
        assert!(cache.contains(&key));
        assert_eq!(cache.len(), 1);

        assert!(cache.evict(&key));
        assert!(!cache.evict(&key));
        assert!(cache.is_empty());
        assert!(!Arc::ptr_eq(&slot, &cache.slot(&key)));
    }

    #[test]
    fn path_guard_detects_reentry_and_unwinds() {
        let outer = ServiceKey::of::<u8>();
        let inner = ServiceKey::of::<u16>();
        {
            let _outer = PathGuard::enter(&outer, 8).unwrap();
            let _inner = PathGuard::enter(&inner, 8).unwrap();
            let Err(ResolveError::CircularDependency { path, .. }) = PathGuard::enter(&outer, 8)
            else {
                panic!("expected a circular dependency");
            };
            assert_eq!(path.keys(), &[outer.clone(), inner.clone(), outer.clone()]);
            assert!(matches!(
                PathGuard::enter(&ServiceKey::of::<u32>(), 2),
                Err(ResolveError::DepthExceeded { max_depth: 2, .. })
            ));
        }
        assert!(PathGuard::is_outermost());
    }
}
