//! Declarative component metadata
//!
//! Rust has no runtime reflection, so every concrete type the injector builds describes itself
//! through a [`ComponentManifest`]: its constructors (in declaration order), which one is
//! preferred, and which properties receive dependencies after construction.

use std::{any::Any, sync::Arc};

use crate::{
    errors::ResolveError,
    resolver::{Argument, Arguments, Dependency},
    types::{DependencyInfo, DynError, Injectable, ServiceKey, TypeInfo},
};

/// A concrete type the injector can construct
pub trait Component: Injectable + Sized {
    /// Declares the constructors and injectable properties of this type
    fn manifest(manifest: &mut ComponentManifest<Self>);
}

/// Constructors and injectable properties declared by a [`Component`]
pub struct ComponentManifest<T> {
    pub(crate) constructors: Vec<Constructor<T>>,
    pub(crate) properties: Vec<Property<T>>,
}

impl<T: Injectable> ComponentManifest<T> {
    pub(crate) fn new() -> Self {
        ComponentManifest {
            constructors: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn constructor(&mut self, constructor: Constructor<T>) -> &mut Self {
        self.constructors.push(constructor);
        self
    }

    /// Declares a no-argument constructor using `Default`
    pub fn default_constructor(&mut self) -> &mut Self
    where
        T: Default,
    {
        self.constructor(Constructor::new(|_| Ok(T::default())))
    }

    pub fn property(&mut self, property: Property<T>) -> &mut Self {
        self.properties.push(property);
        self
    }
}

pub(crate) type ConstructorBody<T> =
    Arc<dyn Fn(&mut Arguments) -> Result<T, DynError> + Send + Sync + 'static>;

/// A constructor: its parameters in order and the body building the value from them
pub struct Constructor<T> {
    pub(crate) parameters: Vec<ParameterInfo>,
    pub(crate) preferred: bool,
    pub(crate) body: ConstructorBody<T>,
}

impl<T: Injectable> Constructor<T> {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&mut Arguments) -> Result<T, DynError> + Send + Sync + 'static,
    {
        Constructor {
            parameters: Vec::new(),
            preferred: false,
            body: Arc::new(body),
        }
    }

    /// Adds a parameter resolved by its type
    pub fn param<D: Dependency>(self, name: &'static str) -> Self {
        self.push_param::<D>(name, None)
    }

    /// Adds a parameter resolved by its type and registration name
    pub fn named_param<D: Dependency>(self, name: &'static str, key: &str) -> Self {
        self.push_param::<D>(name, Some(Arc::from(key)))
    }

    /// Marks this constructor as the one to use, regardless of the others
    pub fn preferred(mut self) -> Self {
        self.preferred = true;
        self
    }

    fn push_param<D: Dependency>(mut self, name: &'static str, key: Option<Arc<str>>) -> Self {
        let position = self.parameters.len();
        self.parameters.push(ParameterInfo {
            name,
            position,
            key,
            dependency: D::dependency_info(),
        });
        self
    }
}

/// Describes a single constructor parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    pub name: &'static str,
    pub position: usize,
    /// Registration name used to resolve the parameter
    pub key: Option<Arc<str>>,
    pub dependency: DependencyInfo,
}

impl ParameterInfo {
    pub fn service_key(&self) -> ServiceKey {
        ServiceKey {
            service: self.dependency.type_info,
            name: self.key.clone(),
        }
    }
}

pub(crate) type PropertySetter<T> =
    Arc<dyn Fn(&mut T, Argument) -> Result<(), ResolveError> + Send + Sync + 'static>;

/// A property which is assigned a dependency after construction
pub struct Property<T> {
    pub(crate) name: &'static str,
    pub(crate) key: Option<Arc<str>>,
    pub(crate) dependency: DependencyInfo,
    pub(crate) setter: PropertySetter<T>,
}

impl<T: Injectable> Property<T> {
    pub fn new<D, F>(name: &'static str, setter: F) -> Self
    where
        D: Dependency,
        F: Fn(&mut T, D) + Send + Sync + 'static,
    {
        Property {
            name,
            key: None,
            dependency: D::dependency_info(),
            setter: Arc::new(move |target: &mut T, argument: Argument| {
                setter(target, D::from_argument(argument)?);
                Ok(())
            }),
        }
    }

    /// Resolve the property by registration name
    pub fn named(mut self, key: &str) -> Self {
        self.key = Some(Arc::from(key));
        self
    }
}

/// Type erased constructor body
pub(crate) type ErasedBody = Arc<
    dyn Fn(&mut Arguments) -> Result<Box<dyn Any + Send + Sync>, DynError> + Send + Sync + 'static,
>;
/// Type erased property setter
pub(crate) type ErasedSetter = Arc<
    dyn Fn(&mut (dyn Any + Send + Sync + 'static), TypeInfo, Argument) -> Result<(), ResolveError>
        + Send
        + Sync
        + 'static,
>;

pub(crate) fn erase_body<T: Injectable>(body: ConstructorBody<T>) -> ErasedBody {
    Arc::new(move |arguments: &mut Arguments| {
        body(arguments).map(|built| Box::new(built) as Box<dyn Any + Send + Sync>)
    })
}

pub(crate) fn erase_setter<T: Injectable>(setter: PropertySetter<T>) -> ErasedSetter {
    Arc::new(
        move |target: &mut (dyn Any + Send + Sync + 'static),
              target_info: TypeInfo,
              argument: Argument| {
            let target = target
                .downcast_mut::<T>()
                .ok_or(ResolveError::DowncastFailed {
                    required_type: std::any::type_name::<T>(),
                    actual_type: target_info.type_name,
                })?;
            setter(target, argument)
        },
    )
}
