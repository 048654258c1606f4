use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::{
    container::Injector,
    errors::{ConfigurationError, ResolutionPath, ResolveError},
    introspector::TypeMetadata,
    registration::{Binding, TypeBinding, ValueOverrides},
    types::{DependencyInfo, ServiceKey, TypeInfo},
};

/// Graph of every registration and the dependencies of their implementations
/// Used to find missing and circular dependencies without constructing anything
pub struct DependencyGraph {
    map: HashMap<ServiceKey, DependencyGraphEntry>,
}

struct DependencyGraphEntry {
    key: ServiceKey,
    implementation: Option<TypeInfo>,
    dependencies: Vec<(ServiceKey, DependencyInfo)>,
}

impl DependencyGraph {
    /// Builds the graph of all registrations, adding scanned implementations of unregistered
    /// dependencies
    ///
    /// Returns the graph and the issues found while inspecting the components
    pub(crate) fn new(injector: &Injector) -> (Self, Vec<DependencyGraphError>) {
        let mut graph = Self {
            map: HashMap::new(),
        };
        let mut errors = Vec::new();
        let mut scanned = HashSet::new();

        let mut pending: Vec<(ServiceKey, Option<TypeBinding>, ValueOverrides)> = injector
            .registrations()
            .snapshot()
            .into_iter()
            .map(|registration| match registration.binding {
                Binding::Type(binding) => {
                    (registration.key, Some(binding), registration.overrides)
                }
                _ => (registration.key, None, registration.overrides),
            })
            .collect();

        while let Some((key, binding, overrides)) = pending.pop() {
            if graph.map.contains_key(&key) {
                continue;
            }

            let dependencies = match binding {
                Some(binding) => match injector
                    .introspector()
                    .metadata(binding.implementation, binding.describe)
                {
                    Ok(metadata) => dependencies_of(&metadata, &overrides),
                    Err(error) => {
                        errors.push(DependencyGraphError::InvalidComponent {
                            component: binding.implementation,
                            error,
                        });
                        Vec::new()
                    }
                },
                None => Vec::new(),
            };

            for (dependency, _) in &dependencies {
                if dependency.name.is_some()
                    || injector.registrations().contains(dependency)
                    || !scanned.insert(dependency.clone())
                {
                    continue;
                }
                match injector.scanner().scan(dependency.service) {
                    Ok(Some(binding)) => {
                        pending.push((dependency.clone(), Some(binding), ValueOverrides::new()))
                    }
                    Ok(None) => {}
                    Err(error) => errors.push(DependencyGraphError::Scan(error.within(
                        ResolutionPath(vec![key.clone(), dependency.clone()]),
                    ))),
                }
            }

            graph.map.insert(
                key.clone(),
                DependencyGraphEntry {
                    key,
                    implementation: binding.map(|binding| binding.implementation),
                    dependencies,
                },
            );
        }

        (graph, errors)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.map.contains_key(key)
    }

    /// The constructed implementation behind a key, if it is a type binding
    pub fn implementation(&self, key: &ServiceKey) -> Option<TypeInfo> {
        self.map.get(key).and_then(|entry| entry.implementation)
    }

    /// Keys the implementation behind `key` depends on
    pub fn dependencies(&self, key: &ServiceKey) -> Option<Vec<&ServiceKey>> {
        self.map
            .get(key)
            .map(|entry| entry.dependencies.iter().map(|(key, _)| key).collect())
    }

    /// Validate the graph
    ///
    /// Returns a list of all issues
    pub fn check(&self) -> Result<(), DependencyGraphErrors> {
        let errors = self.issues();
        if !errors.is_empty() {
            return Err(DependencyGraphErrors { errors });
        }
        Ok(())
    }

    pub(crate) fn issues(&self) -> Vec<DependencyGraphError> {
        let mut checked = HashSet::new();
        let mut errors = Vec::new();

        // Sorted for a stable error order
        let mut entries: Vec<&DependencyGraphEntry> = self.map.values().collect();
        entries.sort_by_cached_key(|entry| entry.key.to_string());

        for entry in entries {
            let mut dependency_chain = Vec::new();
            check_recurse(
                self,
                &mut checked,
                &mut errors,
                &mut dependency_chain,
                entry,
            );
        }

        return errors;

        fn check_recurse(
            graph: &DependencyGraph,
            checked: &mut HashSet<ServiceKey>,
            errors: &mut Vec<DependencyGraphError>,
            dependency_chain: &mut Vec<ServiceKey>,
            entry: &DependencyGraphEntry,
        ) {
            // Circular Dependency Check
            if dependency_chain.contains(&entry.key) {
                let mut chain = dependency_chain.clone();
                chain.push(entry.key.clone());
                errors.push(DependencyGraphError::CircularDependency {
                    key: entry.key.clone(),
                    chain: ResolutionPath(chain),
                });
                return;
            }

            // Skip other checks if already checked
            if !checked.insert(entry.key.clone()) {
                return;
            };

            dependency_chain.push(entry.key.clone());

            for (dependency, info) in &entry.dependencies {
                let Some(next_entry) = graph.map.get(dependency) else {
                    if !info.optional {
                        errors.push(DependencyGraphError::MissingDependency {
                            dependency: dependency.clone(),
                            required_by: entry.key.clone(),
                        });
                    }

                    continue;
                };

                if info.lazy {
                    // Don't recurse, this will be checked by itself
                    continue;
                }

                check_recurse(graph, checked, errors, dependency_chain, next_entry);
            }

            dependency_chain.pop();
        }
    }
}

/// Dependencies of a component which are not replaced by a value override
fn dependencies_of(
    metadata: &TypeMetadata,
    overrides: &ValueOverrides,
) -> Vec<(ServiceKey, DependencyInfo)> {
    let parameters = metadata
        .constructor
        .parameters
        .iter()
        .filter(|parameter| overrides.find(parameter).is_none())
        .map(|parameter| (parameter.service_key(), parameter.dependency));
    let properties = metadata
        .properties
        .iter()
        .map(|property| (property.service_key(), property.dependency));
    parameters.chain(properties).collect()
}

#[derive(Error, Debug, Clone)]
pub enum DependencyGraphError {
    #[error("'{required_by}' needs '{dependency}' but it is missing")]
    MissingDependency {
        dependency: ServiceKey,
        required_by: ServiceKey,
    },
    #[error("A Circular Dependency exists on '{key}' through {chain} - Consider using `Lazy`")]
    CircularDependency {
        key: ServiceKey,
        chain: ResolutionPath,
    },
    #[error("'{component}' cannot be constructed: {error}")]
    InvalidComponent {
        component: TypeInfo,
        error: ConfigurationError,
    },
    #[error(transparent)]
    Scan(ResolveError),
}

impl std::fmt::Display for DependencyGraphErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("The dependency graph had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}

#[derive(Error, Debug, Clone)]
pub struct DependencyGraphErrors {
    pub errors: Vec<DependencyGraphError>,
}
