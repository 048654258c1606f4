use std::{any::TypeId, fmt, marker::PhantomData, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{
    component::{Component, ParameterInfo},
    container::Injector,
    errors::ResolveError,
    factories::Built,
    introspector::{describe, Describe},
    types::{Injectable, Instance, ServiceKey, TypeInfo, Upcast},
};

/// Callback invoked with every instance a registration produces
pub type OnResolved = Arc<dyn Fn(&Registration, &Instance) + Send + Sync>;
/// Produces an instance for a factory binding
pub type FactoryFn = Arc<dyn Fn() -> Instance + Send + Sync>;
/// Shares a freshly built component as the bound service
/// Turns a built value into an instance; `produced_by` names the type whose manifest built it
pub(crate) type Finish = fn(Built, TypeInfo) -> Result<Instance, ResolveError>;

/// How a registration produces its instances
#[derive(Clone)]
pub enum Binding {
    /// Construct an implementation type
    Type(TypeBinding),
    /// Hand out an instance supplied by the caller, as is
    Instance(Instance),
    /// Call a factory function
    Factory(FactoryFn),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Type,
    Instance,
    Factory,
}

impl Binding {
    pub fn kind(&self) -> BindingKind {
        match self {
            Binding::Type(_) => BindingKind::Type,
            Binding::Instance(_) => BindingKind::Instance,
            Binding::Factory(_) => BindingKind::Factory,
        }
    }
}

/// Binding of a service to an implementation type
#[derive(Clone, Copy)]
pub struct TypeBinding {
    pub implementation: TypeInfo,
    pub(crate) describe: Describe,
    pub(crate) finish: Finish,
}

impl TypeBinding {
    pub fn of<S, T>() -> Self
    where
        S: Injectable + ?Sized,
        T: Component + Upcast<S>,
    {
        TypeBinding {
            implementation: TypeInfo::of::<T>(),
            describe: describe::<T>,
            finish: finish::<S, T>,
        }
    }
}

impl fmt::Debug for TypeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeBinding")
            .field(&self.implementation.type_name)
            .finish()
    }
}

fn finish<S, T>(built: Built, produced_by: TypeInfo) -> Result<Instance, ResolveError>
where
    S: Injectable + ?Sized,
    T: Component + Upcast<S>,
{
    let built = built
        .downcast::<T>()
        .map_err(|_| ResolveError::DowncastFailed {
            required_type: std::any::type_name::<T>(),
            actual_type: produced_by.type_name,
        })?;
    let shared: Arc<T> = Arc::from(built);
    Ok(Instance::new::<S>(shared.upcast()))
}

/// Selects the constructor parameter a value override applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterSelector {
    Position(usize),
    Name(Arc<str>),
    Type(TypeId),
}

impl ParameterSelector {
    fn rank(&self, parameter: &ParameterInfo) -> Option<u8> {
        match self {
            ParameterSelector::Position(position) if *position == parameter.position => Some(0),
            ParameterSelector::Name(name) if **name == *parameter.name => Some(1),
            ParameterSelector::Type(type_id)
                if *type_id == parameter.dependency.type_info.type_id =>
            {
                Some(2)
            }
            _ => None,
        }
    }
}

/// Literal values used instead of resolving constructor parameters
///
/// When several overrides match a parameter, position beats name beats type.
#[derive(Debug, Clone, Default)]
pub struct ValueOverrides {
    entries: Vec<(ParameterSelector, Instance)>,
}

impl ValueOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the parameter at the given position
    pub fn at<V: Injectable>(self, position: usize, value: V) -> Self {
        self.with(ParameterSelector::Position(position), Instance::from_value(value))
    }

    /// Overrides the parameter with the given name
    pub fn named<V: Injectable>(self, name: &str, value: V) -> Self {
        self.with(ParameterSelector::Name(Arc::from(name)), Instance::from_value(value))
    }

    /// Overrides every parameter whose service type is `S`
    pub fn typed<S: Injectable + ?Sized>(self, value: Arc<S>) -> Self {
        self.with(ParameterSelector::Type(TypeId::of::<S>()), Instance::new(value))
    }

    pub fn with(mut self, selector: ParameterSelector, value: Instance) -> Self {
        self.entries.push((selector, value));
        self
    }

    pub fn find(&self, parameter: &ParameterInfo) -> Option<&Instance> {
        self.entries
            .iter()
            .filter_map(|(selector, value)| selector.rank(parameter).map(|rank| (rank, value)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A stored rule describing how to produce an instance for a service key
#[derive(Clone)]
pub struct Registration {
    pub key: ServiceKey,
    pub binding: Binding,
    pub singleton: bool,
    pub overrides: ValueOverrides,
    pub(crate) on_resolved: Option<OnResolved>,
}

impl Registration {
    pub fn new(key: ServiceKey, binding: Binding) -> Self {
        Registration {
            key,
            binding,
            singleton: false,
            overrides: ValueOverrides::default(),
            on_resolved: None,
        }
    }

    pub fn kind(&self) -> BindingKind {
        self.binding.kind()
    }

    /// The constructed implementation, for type bindings
    pub fn implementation(&self) -> Option<TypeInfo> {
        match &self.binding {
            Binding::Type(binding) => Some(binding.implementation),
            _ => None,
        }
    }

    pub(crate) fn notify(&self, instance: &Instance) {
        if let Some(hook) = &self.on_resolved {
            hook(self, instance);
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("kind", &self.kind())
            .field("implementation", &self.implementation())
            .field("singleton", &self.singleton)
            .field("overrides", &self.overrides.len())
            .field("on_resolved", &self.on_resolved.is_some())
            .finish()
    }
}

/// All registrations of an injector, at most one per service key
#[derive(Default)]
pub struct RegistrationStore {
    pub(crate) entries: DashMap<ServiceKey, Registration>,
}

impl RegistrationStore {
    pub fn get(&self, key: &ServiceKey) -> Option<Registration> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies of all registrations
    pub fn snapshot(&self) -> Vec<Registration> {
        self.entries.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Inserts or replaces a registration, running `on_stored` while the entry is still locked
    pub(crate) fn insert_with(
        &self,
        registration: Registration,
        on_stored: impl FnOnce(&Registration),
    ) -> bool {
        match self.entries.entry(registration.key.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(registration);
                on_stored(entry.get());
                true
            }
            Entry::Vacant(entry) => {
                let stored = entry.insert(registration);
                on_stored(stored.value());
                false
            }
        }
    }

    /// Changes a registration in place, running `f` while the entry is locked
    pub(crate) fn update<R>(
        &self,
        key: &ServiceKey,
        f: impl FnOnce(&mut Registration) -> R,
    ) -> Option<R> {
        self.entries.get_mut(key).map(|mut entry| f(entry.value_mut()))
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }
}

/// Fluent options on a stored registration
pub struct RegistrationHandle<'a, S: ?Sized> {
    injector: &'a Injector,
    key: ServiceKey,
    _service: PhantomData<fn() -> Arc<S>>,
}

impl<'a, S: Injectable + ?Sized> RegistrationHandle<'a, S> {
    pub(crate) fn new(injector: &'a Injector, key: ServiceKey) -> Self {
        RegistrationHandle {
            injector,
            key,
            _service: PhantomData,
        }
    }

    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// Cache the first instance and hand it out for every later resolution
    pub fn as_singleton(self) -> Self {
        self.injector.set_singleton(&self.key, true);
        self
    }

    /// Construct a new instance on every resolution, dropping any cached instance
    pub fn as_multi_instance(self) -> Self {
        self.injector.set_singleton(&self.key, false);
        self
    }

    pub fn with_value_overrides(self, overrides: ValueOverrides) -> Self {
        self.injector.0.registrations.update(&self.key, |registration| {
            registration.overrides = overrides;
        });
        self
    }

    /// Runs `callback` with every instance this registration produces
    pub fn on_resolved<F>(self, callback: F) -> Self
    where
        F: Fn(&Registration, &Arc<S>) + Send + Sync + 'static,
    {
        let hook: OnResolved = Arc::new(move |registration: &Registration, instance: &Instance| {
            if let Ok(service) = instance.downcast::<S>() {
                callback(registration, &service);
            }
        });
        self.injector.0.registrations.update(&self.key, |registration| {
            registration.on_resolved = Some(hook);
        });
        self
    }
}
