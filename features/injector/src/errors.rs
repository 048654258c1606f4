use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::types::{DynError, ServiceKey, TypeInfo};

/// Errors when trying to resolve a service
///
/// Any failure inside a nested resolution fails the whole call; no partially built object is returned.
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// Neither a registration nor a unique scanned implementation exists
    #[error("No registration or unique implementation found for '{key}' (resolution path: {path})")]
    Unresolvable {
        key: ServiceKey,
        path: ResolutionPath,
    },
    /// The scanner found several implementations and none is marked as preferred
    #[error("Multiple implementations of '{interface}' found, none marked as preferred: [{}] (resolution path: {path})", join_types(.candidates))]
    AmbiguousImplementation {
        interface: TypeInfo,
        candidates: Vec<TypeInfo>,
        path: ResolutionPath,
    },
    #[error("A circular dependency on '{key}' was detected: {path} - Consider using `Lazy`")]
    CircularDependency {
        key: ServiceKey,
        path: ResolutionPath,
    },
    #[error("Resolving '{key}' exceeded the maximum depth of {max_depth} (resolution path: {path})")]
    DepthExceeded {
        key: ServiceKey,
        max_depth: usize,
        path: ResolutionPath,
    },
    #[error(transparent)]
    InvalidConfiguration(#[from] ConfigurationError),
    /// A constructor body or factory returned an error
    #[error("Constructing '{implementation}' for '{key}' failed (resolution path: {path}) - error: {error}")]
    ConstructionFailed {
        key: ServiceKey,
        implementation: TypeInfo,
        error: Arc<DynError>,
        path: ResolutionPath,
    },
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
    #[error("'{component}' expects {expected} constructor arguments but received {received}")]
    ArgumentCount {
        component: TypeInfo,
        expected: usize,
        received: usize,
    },
    /// A `Lazy` was accessed after its injector was dropped
    #[error("The injector behind a lazy dependency on '{0}' was dropped")]
    InjectorDropped(ServiceKey),
}

impl ResolveError {
    /// The key no registration could be found for, if that is the cause
    pub fn missing_key(&self) -> Option<&ServiceKey> {
        match self {
            ResolveError::Unresolvable { key, .. } => Some(key),
            _ => None,
        }
    }

    /// The top level request the failing resolution started from
    pub fn origin(&self) -> Option<&ServiceKey> {
        match self {
            ResolveError::Unresolvable { path, .. }
            | ResolveError::CircularDependency { path, .. }
            | ResolveError::DepthExceeded { path, .. }
            | ResolveError::AmbiguousImplementation { path, .. }
            | ResolveError::ConstructionFailed { path, .. } => path.0.first(),
            _ => None,
        }
    }

    /// Records where in a resolution an error raised outside of it occurred
    pub(crate) fn within(mut self, current: ResolutionPath) -> Self {
        if let ResolveError::AmbiguousImplementation { path, .. } = &mut self {
            if path.0.is_empty() {
                *path = current;
            }
        }
        self
    }
}

/// Invalid component metadata
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("'{0}' does not declare a constructor")]
    MissingConstructor(TypeInfo),
    #[error("'{component}' marks {count} constructors as preferred, at most one is allowed")]
    MultiplePreferredConstructors { component: TypeInfo, count: usize },
}

/// The chain of services being resolved, outermost first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionPath(pub Vec<ServiceKey>);

impl ResolutionPath {
    pub fn keys(&self) -> &[ServiceKey] {
        &self.0
    }
}

impl fmt::Display for ResolutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&keys.join(" -> "))
    }
}

fn join_types(types: &[TypeInfo]) -> String {
    let names: Vec<&str> = types.iter().map(|info| info.type_name).collect();
    names.join(", ")
}
