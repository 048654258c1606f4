use std::{fmt::Debug, sync::Arc};

use crate::{
    builder::{InjectorBuilder, InjectorOptions},
    component::Component,
    dependency_graph::{DependencyGraph, DependencyGraphErrors},
    engine::SingletonCache,
    errors::ResolveError,
    factories::ConstructorInvoker,
    introspector::TypeIntrospector,
    registration::{Binding, Registration, RegistrationHandle, RegistrationStore, TypeBinding},
    resolver::arc::downcast_instance,
    scanner::{ImplementationScanner, Module},
    types::{Injectable, Instance, ServiceKey, Upcast},
};

/// The dependency injection container
///
/// Cheap to clone, all clones share the same registrations and caches.
#[derive(Clone)]
pub struct Injector(pub(crate) Arc<InjectorInner>);

pub struct InjectorInner {
    pub(crate) options: InjectorOptions,
    pub(crate) registrations: RegistrationStore,
    pub(crate) singletons: SingletonCache,
    pub(crate) introspector: TypeIntrospector,
    pub(crate) scanner: ImplementationScanner,
    pub(crate) invoker: Arc<dyn ConstructorInvoker>,
}

impl Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_struct("Injector");
        for registration in self.0.registrations.snapshot() {
            let state = match (registration.singleton, self.0.singletons.contains(&registration.key)) {
                (true, true) => "singleton (cached)",
                (true, false) => "singleton",
                (false, _) => "multi instance",
            };
            map.field(&registration.key.to_string(), &state);
        }
        map.finish()
    }
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

impl Injector {
    /// An injector with default options and no modules
    pub fn new() -> Self {
        InjectorBuilder::new().build()
    }

    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::new()
    }

    pub(crate) fn from_parts(options: InjectorOptions, modules: Vec<Module>) -> Self {
        let invoker = options.invoker.create();
        tracing::debug!(
            "Creating injector with {} invoker, max depth {} and {} modules",
            invoker.kind(),
            options.max_depth,
            modules.len()
        );
        Injector(Arc::new(InjectorInner {
            options,
            registrations: RegistrationStore::default(),
            singletons: SingletonCache::default(),
            introspector: TypeIntrospector::new(),
            scanner: ImplementationScanner::new(modules),
            invoker,
        }))
    }

    pub fn options(&self) -> &InjectorOptions {
        &self.0.options
    }

    pub fn introspector(&self) -> &TypeIntrospector {
        &self.0.introspector
    }

    pub fn scanner(&self) -> &ImplementationScanner {
        &self.0.scanner
    }

    pub fn registrations(&self) -> &RegistrationStore {
        &self.0.registrations
    }

    /// Attaches a module to search for implementations of unregistered interfaces
    pub fn add_module(&self, module: Module) {
        self.0.scanner.add_module(module);
    }
}

/// Registration
impl Injector {
    /// Binds the service `S` to the implementation `T`, constructing a new `T` on every resolution
    pub fn register_type<S, T>(&self) -> RegistrationHandle<'_, S>
    where
        S: Injectable + ?Sized,
        T: Component + Upcast<S>,
    {
        self.register(ServiceKey::of::<S>(), Binding::Type(TypeBinding::of::<S, T>()))
    }

    pub fn register_type_named<S, T>(&self, name: &str) -> RegistrationHandle<'_, S>
    where
        S: Injectable + ?Sized,
        T: Component + Upcast<S>,
    {
        self.register(ServiceKey::named::<S>(name), Binding::Type(TypeBinding::of::<S, T>()))
    }

    /// Binds the service `S` to the implementation `T`, constructed once and then shared
    pub fn register_singleton<S, T>(&self) -> RegistrationHandle<'_, S>
    where
        S: Injectable + ?Sized,
        T: Component + Upcast<S>,
    {
        self.register_type::<S, T>().as_singleton()
    }

    pub fn register_singleton_named<S, T>(&self, name: &str) -> RegistrationHandle<'_, S>
    where
        S: Injectable + ?Sized,
        T: Component + Upcast<S>,
    {
        self.register_type_named::<S, T>(name).as_singleton()
    }

    /// Binds the service `S` to an existing instance, which is returned as is on every resolution
    pub fn register_instance<S: Injectable + ?Sized>(
        &self,
        instance: Arc<S>,
    ) -> RegistrationHandle<'_, S> {
        self.register(ServiceKey::of::<S>(), Binding::Instance(Instance::new(instance)))
    }

    pub fn register_instance_named<S: Injectable + ?Sized>(
        &self,
        instance: Arc<S>,
        name: &str,
    ) -> RegistrationHandle<'_, S> {
        self.register(ServiceKey::named::<S>(name), Binding::Instance(Instance::new(instance)))
    }

    /// Binds the service `S` to a factory function, called on every resolution unless the
    /// registration is made a singleton
    pub fn register_factory<S, F>(&self, factory: F) -> RegistrationHandle<'_, S>
    where
        S: Injectable + ?Sized,
        F: Fn() -> Arc<S> + Send + Sync + 'static,
    {
        self.register(ServiceKey::of::<S>(), factory_binding(factory))
    }

    pub fn register_factory_named<S, F>(&self, factory: F, name: &str) -> RegistrationHandle<'_, S>
    where
        S: Injectable + ?Sized,
        F: Fn() -> Arc<S> + Send + Sync + 'static,
    {
        self.register(ServiceKey::named::<S>(name), factory_binding(factory))
    }

    /// Stores a registration, replacing and evicting any previous one with the same key
    pub fn register_raw(&self, registration: Registration) -> bool {
        let key = registration.key.clone();
        tracing::debug!("Registering {} as {:?} binding", key, registration.kind());
        let replaced = self.0.registrations.insert_with(registration, |stored| {
            self.0.singletons.evict(&stored.key);
        });
        if replaced {
            tracing::debug!("Replaced previous registration of {}", key);
        }
        replaced
    }

    fn register<S: Injectable + ?Sized>(
        &self,
        key: ServiceKey,
        binding: Binding,
    ) -> RegistrationHandle<'_, S> {
        self.register_raw(Registration::new(key.clone(), binding));
        RegistrationHandle::new(self, key)
    }

    pub(crate) fn set_singleton(&self, key: &ServiceKey, singleton: bool) {
        self.0.registrations.update(key, |registration| {
            registration.singleton = singleton;
            if !singleton && self.0.singletons.evict(key) {
                tracing::debug!("Evicted cached instance of {} (now multi instance)", key);
            }
        });
    }
}

fn factory_binding<S, F>(factory: F) -> Binding
where
    S: Injectable + ?Sized,
    F: Fn() -> Arc<S> + Send + Sync + 'static,
{
    Binding::Factory(Arc::new(move || Instance::new(factory())))
}

/// Resolution
impl Injector {
    /// Resolves the service `S`
    ///
    /// Singletons are constructed on first request and shared afterwards.
    pub fn get_instance<S: Injectable + ?Sized>(&self) -> Result<Arc<S>, ResolveError> {
        self.get(&ServiceKey::of::<S>(), false)
    }

    pub fn get_instance_named<S: Injectable + ?Sized>(
        &self,
        name: &str,
    ) -> Result<Arc<S>, ResolveError> {
        self.get(&ServiceKey::named::<S>(name), false)
    }

    /// Resolves the service `S`, or `None` if it is neither registered nor discoverable
    ///
    /// Failures of nested dependencies are still returned as errors.
    pub fn try_get_instance<S: Injectable + ?Sized>(
        &self,
    ) -> Result<Option<Arc<S>>, ResolveError> {
        self.try_get(&ServiceKey::of::<S>())
    }

    pub fn try_get_instance_named<S: Injectable + ?Sized>(
        &self,
        name: &str,
    ) -> Result<Option<Arc<S>>, ResolveError> {
        self.try_get(&ServiceKey::named::<S>(name))
    }

    /// Constructs a new `S`, even if it is registered as a singleton
    ///
    /// Neither reads nor writes the singleton cache.
    pub fn get_new_instance<S: Injectable + ?Sized>(&self) -> Result<Arc<S>, ResolveError> {
        self.get(&ServiceKey::of::<S>(), true)
    }

    pub fn get_new_instance_named<S: Injectable + ?Sized>(
        &self,
        name: &str,
    ) -> Result<Arc<S>, ResolveError> {
        self.get(&ServiceKey::named::<S>(name), true)
    }

    fn get<S: Injectable + ?Sized>(
        &self,
        key: &ServiceKey,
        new_instance: bool,
    ) -> Result<Arc<S>, ResolveError> {
        let instance = self.resolve(key, new_instance)?;
        downcast_instance(&instance)
    }

    fn try_get<S: Injectable + ?Sized>(
        &self,
        key: &ServiceKey,
    ) -> Result<Option<Arc<S>>, ResolveError> {
        match self.get(key, false) {
            Ok(service) => Ok(Some(service)),
            Err(error) if error.missing_key() == Some(key) => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// Cache and registration state
impl Injector {
    pub fn is_registered<S: Injectable + ?Sized>(&self) -> bool {
        self.0.registrations.contains(&ServiceKey::of::<S>())
    }

    pub fn is_registered_named<S: Injectable + ?Sized>(&self, name: &str) -> bool {
        self.0.registrations.contains(&ServiceKey::named::<S>(name))
    }

    /// True if a singleton instance of `S` has been constructed and cached
    pub fn is_cached<S: Injectable + ?Sized>(&self) -> bool {
        self.0.singletons.contains(&ServiceKey::of::<S>())
    }

    pub fn is_cached_named<S: Injectable + ?Sized>(&self, name: &str) -> bool {
        self.0.singletons.contains(&ServiceKey::named::<S>(name))
    }

    /// Drops the cached singleton instance of `S`, returns true if one was cached
    pub fn remove_from_cache<S: Injectable + ?Sized>(&self) -> bool {
        self.0.singletons.evict(&ServiceKey::of::<S>())
    }

    pub fn remove_from_cache_named<S: Injectable + ?Sized>(&self, name: &str) -> bool {
        self.0.singletons.evict(&ServiceKey::named::<S>(name))
    }

    /// Removes every registration and cached singleton
    pub fn clear(&self) {
        tracing::debug!("Clearing {} registrations", self.0.registrations.len());
        self.0.registrations.clear();
        self.0.singletons.clear();
    }

    /// Forgets the computed type metadata and scan results
    pub fn reset_metadata_caches(&self) {
        self.0.introspector.clear();
        self.0.scanner.clear_cache();
    }

    /// Checks every registration for missing dependencies, cycles and invalid components
    /// without constructing anything
    pub fn validate(&self) -> Result<DependencyGraph, DependencyGraphErrors> {
        let (graph, mut errors) = DependencyGraph::new(self);
        errors.extend(graph.issues());
        if !errors.is_empty() {
            return Err(DependencyGraphErrors { errors });
        }
        Ok(graph)
    }
}
