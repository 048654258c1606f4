use crate::{
    errors::ResolveError,
    types::{DependencyInfo, Instance, TypeInfo},
};

pub mod arc;
pub mod lazy;

pub use lazy::{DeferredResolution, Lazy};

/// A value produced by the engine for one constructor parameter or property
#[derive(Debug, Clone)]
pub enum Argument {
    /// The dependency was resolved or overridden
    Resolved(Instance),
    /// An optional dependency that has no registration
    Absent,
    /// A lazy dependency, resolved on first access
    Deferred(DeferredResolution),
}

impl Argument {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Argument::Resolved(instance) => instance.info.type_name,
            Argument::Absent => "<absent>",
            Argument::Deferred(_) => "<deferred>",
        }
    }
}

/// Shape of an injected value
///
/// Decides how a dependency is requested from the engine ([`Dependency::dependency_info`]) and how
/// the produced [`Argument`] is turned into the value handed to a constructor or property setter.
pub trait Dependency: Sized {
    fn dependency_info() -> DependencyInfo;

    fn from_argument(argument: Argument) -> Result<Self, ResolveError>;
}

/// Arguments handed to a constructor body, in parameter order
pub struct Arguments {
    component: TypeInfo,
    values: std::vec::IntoIter<Argument>,
    position: usize,
}

impl Arguments {
    pub(crate) fn new(component: TypeInfo, values: Vec<Argument>) -> Self {
        Arguments {
            component,
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Takes the next argument
    pub fn next<D: Dependency>(&mut self) -> Result<D, ResolveError> {
        let Some(argument) = self.values.next() else {
            return Err(ResolveError::ArgumentCount {
                component: self.component,
                expected: self.position + 1,
                received: self.position,
            });
        };
        self.position += 1;
        D::from_argument(argument)
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    pub fn component(&self) -> TypeInfo {
        self.component
    }
}

impl<Inner: Dependency> Dependency for Option<Inner> {
    fn dependency_info() -> DependencyInfo {
        DependencyInfo {
            optional: true,
            ..Inner::dependency_info()
        }
    }

    fn from_argument(argument: Argument) -> Result<Self, ResolveError> {
        match argument {
            // Missing registrations do not fail an optional dependency
            Argument::Absent => Ok(None),
            other => Inner::from_argument(other).map(Some),
        }
    }
}
