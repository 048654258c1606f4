use std::{
    any::TypeId,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{
    component::{erase_body, erase_setter, Component, ComponentManifest, ErasedBody, ErasedSetter},
    errors::ConfigurationError,
    types::{DependencyInfo, ServiceKey, TypeInfo},
};

pub use crate::component::ParameterInfo;

/// Produces the metadata of one component type
pub type Describe = fn() -> Result<TypeMetadata, ConfigurationError>;

/// Selected constructor and injectable properties of a concrete type
///
/// Immutable once computed, one per type and container.
pub struct TypeMetadata {
    pub type_info: TypeInfo,
    pub constructor: Arc<ConstructorDescriptor>,
    /// Number of constructors the type declares
    pub declared_constructors: usize,
    pub properties: Vec<InjectableProperty>,
}

impl TypeMetadata {
    /// Every dependency of the type: constructor parameters first, then properties
    pub fn dependencies(&self) -> impl Iterator<Item = (ServiceKey, DependencyInfo)> + '_ {
        let parameters = self
            .constructor
            .parameters
            .iter()
            .map(|parameter| (parameter.service_key(), parameter.dependency));
        let properties = self
            .properties
            .iter()
            .map(|property| (property.service_key(), property.dependency));
        parameters.chain(properties)
    }
}

/// A constructor, as seen by the invokers
pub struct ConstructorDescriptor {
    /// Declaration order among the type's constructors
    pub index: usize,
    pub parameters: Vec<ParameterInfo>,
    pub preferred: bool,
    pub(crate) body: ErasedBody,
}

impl ConstructorDescriptor {
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

/// A property receiving a dependency after construction
pub struct InjectableProperty {
    pub name: &'static str,
    /// Registration name used to resolve the property
    pub key: Option<Arc<str>>,
    pub dependency: DependencyInfo,
    pub(crate) setter: ErasedSetter,
}

impl InjectableProperty {
    pub fn service_key(&self) -> ServiceKey {
        ServiceKey {
            service: self.dependency.type_info,
            name: self.key.clone(),
        }
    }
}

/// Builds the metadata of a component from its manifest
pub fn describe<T: Component>() -> Result<TypeMetadata, ConfigurationError> {
    let mut manifest = ComponentManifest::<T>::new();
    T::manifest(&mut manifest);
    let ComponentManifest {
        constructors,
        properties,
    } = manifest;

    let type_info = TypeInfo::of::<T>();
    let mut candidates: Vec<ConstructorDescriptor> = constructors
        .into_iter()
        .enumerate()
        .map(|(index, constructor)| ConstructorDescriptor {
            index,
            parameters: constructor.parameters,
            preferred: constructor.preferred,
            body: erase_body(constructor.body),
        })
        .collect();

    let declared_constructors = candidates.len();
    let selected = select_constructor(type_info, &candidates)?;
    let constructor = candidates.swap_remove(selected);

    let properties = properties
        .into_iter()
        .map(|property| InjectableProperty {
            name: property.name,
            key: property.key,
            dependency: property.dependency,
            setter: erase_setter(property.setter),
        })
        .collect();

    Ok(TypeMetadata {
        type_info,
        constructor: Arc::new(constructor),
        declared_constructors,
        properties,
    })
}

/// Picks the constructor to invoke
///
/// 1. The single constructor marked as preferred
/// 2. Else the first constructor without parameters
/// 3. Else the constructor with the most parameters, the first declared one on ties
fn select_constructor(
    component: TypeInfo,
    constructors: &[ConstructorDescriptor],
) -> Result<usize, ConfigurationError> {
    let preferred: Vec<usize> = constructors
        .iter()
        .filter(|constructor| constructor.preferred)
        .map(|constructor| constructor.index)
        .collect();
    match preferred.as_slice() {
        [single] => return Ok(*single),
        [] => {}
        many => {
            return Err(ConfigurationError::MultiplePreferredConstructors {
                component,
                count: many.len(),
            })
        }
    }

    if let Some(parameterless) = constructors.iter().find(|c| c.parameters.is_empty()) {
        return Ok(parameterless.index);
    }

    let mut widest: Option<&ConstructorDescriptor> = None;
    for constructor in constructors {
        match widest {
            Some(current) if current.arity() >= constructor.arity() => {}
            _ => widest = Some(constructor),
        }
    }

    widest
        .map(|constructor| constructor.index)
        .ok_or(ConfigurationError::MissingConstructor(component))
}

/// Hit and miss counters of the metadata cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntrospectionStats {
    pub hits: usize,
    pub misses: usize,
}

/// Computes and caches [`TypeMetadata`] per concrete type
#[derive(Default)]
pub struct TypeIntrospector {
    cache: DashMap<TypeId, Arc<TypeMetadata>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl TypeIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached metadata of a type, computing it on first request
    ///
    /// The computation runs while holding the cache entry, so it happens at most once per type.
    /// Failed computations are not cached.
    pub fn metadata(
        &self,
        info: TypeInfo,
        describe: Describe,
    ) -> Result<Arc<TypeMetadata>, ConfigurationError> {
        if let Some(found) = self.cache.get(&info.type_id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(found.clone());
        }

        match self.cache.entry(info.type_id) {
            Entry::Occupied(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(entry.get().clone())
            }
            Entry::Vacant(entry) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let metadata = Arc::new(describe()?);
                tracing::debug!(
                    "Inspected {}: constructor #{} of {} with {} parameters, {} injectable properties",
                    info.type_name,
                    metadata.constructor.index,
                    metadata.declared_constructors,
                    metadata.constructor.arity(),
                    metadata.properties.len()
                );
                entry.insert(metadata.clone());
                Ok(metadata)
            }
        }
    }

    /// Number of types with cached metadata
    pub fn cached_types(&self) -> usize {
        self.cache.len()
    }

    pub fn is_cached(&self, type_id: TypeId) -> bool {
        self.cache.contains_key(&type_id)
    }

    pub fn stats(&self) -> IntrospectionStats {
        IntrospectionStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.cache.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}
