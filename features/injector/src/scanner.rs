use std::{any::TypeId, collections::HashSet};

use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::RwLock;

use crate::{
    component::Component,
    errors::{ResolutionPath, ResolveError},
    registration::TypeBinding,
    types::{Injectable, TypeInfo, Upcast},
};

/// A group of implementation declarations, searched when an interface has no registration
///
/// ```ignore
/// let module = Module::new("greetings")
///     .owns::<dyn Greeter>()
///     .implementation::<dyn Greeter, English>()
///     .preferred_implementation::<dyn Greeter, German>();
/// ```
#[derive(Debug, Clone)]
pub struct Module {
    name: &'static str,
    owned: HashSet<TypeId>,
    declarations: Vec<ImplementationDeclaration>,
}

impl Module {
    pub fn new(name: &'static str) -> Self {
        Module {
            name,
            owned: HashSet::new(),
            declarations: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Marks the interface as declared by this module
    ///
    /// An owned interface is only searched in the modules owning it.
    pub fn owns<I: Injectable + ?Sized>(mut self) -> Self {
        self.owned.insert(TypeId::of::<I>());
        self
    }

    pub fn implementation<I, T>(self) -> Self
    where
        I: Injectable + ?Sized,
        T: Component + Upcast<I>,
    {
        self.declare::<I, T>(false)
    }

    /// Declares an implementation which wins when several implement the interface
    pub fn preferred_implementation<I, T>(self) -> Self
    where
        I: Injectable + ?Sized,
        T: Component + Upcast<I>,
    {
        self.declare::<I, T>(true)
    }

    pub fn declarations(&self) -> &[ImplementationDeclaration] {
        &self.declarations
    }

    fn declare<I, T>(mut self, preferred: bool) -> Self
    where
        I: Injectable + ?Sized,
        T: Component + Upcast<I>,
    {
        self.declarations.push(ImplementationDeclaration {
            interface: TypeInfo::of::<I>(),
            binding: TypeBinding::of::<I, T>(),
            preferred,
        });
        self
    }
}

/// A concrete type implementing an interface
#[derive(Debug, Clone, Copy)]
pub struct ImplementationDeclaration {
    pub interface: TypeInfo,
    pub binding: TypeBinding,
    pub preferred: bool,
}

impl ImplementationDeclaration {
    pub fn implementation(&self) -> TypeInfo {
        self.binding.implementation
    }
}

/// Finds the implementation of an interface among the attached modules
///
/// A found implementation is cached per interface and never searched again,
/// even when modules declaring further implementations are attached later.
#[derive(Default)]
pub struct ImplementationScanner {
    modules: RwLock<Vec<Module>>,
    cache: DashMap<TypeId, ImplementationDeclaration>,
}

impl ImplementationScanner {
    pub fn new(modules: Vec<Module>) -> Self {
        ImplementationScanner {
            modules: RwLock::new(modules),
            cache: DashMap::new(),
        }
    }

    pub fn add_module(&self, module: Module) {
        tracing::debug!(
            "Attaching module '{}' with {} implementations",
            module.name,
            module.declarations.len()
        );
        self.modules.write().push(module);
    }

    /// Looks up the implementation of `interface`
    ///
    /// - `Ok(None)` if nothing implements it
    /// - An error if several implement it and not exactly one is preferred
    pub fn scan(&self, interface: TypeInfo) -> Result<Option<TypeBinding>, ResolveError> {
        if let Some(found) = self.cache.get(&interface.type_id) {
            return Ok(Some(found.binding));
        }

        let candidates = self.candidates(interface);
        let selected = match candidates.as_slice() {
            [] => {
                tracing::trace!("No implementation of {} found", interface.type_name);
                return Ok(None);
            }
            [single] => *single,
            many => {
                let preferred: Vec<&ImplementationDeclaration> =
                    many.iter().filter(|candidate| candidate.preferred).collect();
                match preferred.as_slice() {
                    [single] => **single,
                    _ => {
                        return Err(ResolveError::AmbiguousImplementation {
                            interface,
                            candidates: many.iter().map(|c| c.implementation()).collect(),
                            path: ResolutionPath::default(),
                        })
                    }
                }
            }
        };

        // A concurrent scan may have stored its result first, keep that one
        let stored = match self.cache.entry(interface.type_id) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                tracing::debug!(
                    "Scanned {} -> {}",
                    interface.type_name,
                    selected.implementation().type_name
                );
                *entry.insert(selected)
            }
        };
        Ok(Some(stored.binding))
    }

    /// Declarations for the interface, one per implementation type
    fn candidates(&self, interface: TypeInfo) -> Vec<ImplementationDeclaration> {
        let modules = self.modules.read();
        let owners: Vec<&Module> = modules
            .iter()
            .filter(|module| module.owned.contains(&interface.type_id))
            .collect();
        let searched: Vec<&Module> = if owners.is_empty() {
            modules.iter().collect()
        } else {
            owners
        };

        let mut candidates: Vec<ImplementationDeclaration> = Vec::new();
        for declaration in searched
            .iter()
            .flat_map(|module| module.declarations.iter())
            .filter(|declaration| declaration.interface == interface)
        {
            match candidates
                .iter_mut()
                .find(|known| known.implementation() == declaration.implementation())
            {
                Some(known) => known.preferred |= declaration.preferred,
                None => candidates.push(*declaration),
            }
        }
        candidates
    }

    /// Number of interfaces with a cached implementation
    pub fn cached_interfaces(&self) -> usize {
        self.cache.len()
    }

    pub fn is_cached(&self, interface: TypeId) -> bool {
        self.cache.contains_key(&interface)
    }

    /// Forgets all scan results, the attached modules are kept
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
