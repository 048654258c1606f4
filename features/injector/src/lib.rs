//! A dependency injection container which builds object graphs from component manifests.
//!
//! The injector consists of the following parts:
//! 1. Registrations: bind a service to an implementation type, an existing instance or a factory
//! 2. Introspection: every [`Component`] describes its constructors and injectable properties,
//!    the injector picks the constructor to call and caches the result per type
//! 3. Invokers: turn the selected constructor into a callable, see [`InvokerKind`]
//! 4. Scanning: unregistered interfaces are looked up in the attached [`Module`]s
//! 5. Resolution: resolves constructor arguments and properties recursively,
//!    caches singletons and calls the `on_resolved` hooks
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use injector::{implements, Component, ComponentManifest, Constructor, Injector};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "Hello".to_string()
//!     }
//! }
//! impl Component for English {
//!     fn manifest(manifest: &mut ComponentManifest<Self>) {
//!         manifest.constructor(Constructor::new(|_| Ok(English)));
//!     }
//! }
//! implements!(English => dyn Greeter);
//!
//! struct Welcome {
//!     greeter: Arc<dyn Greeter>,
//! }
//! impl Component for Welcome {
//!     fn manifest(manifest: &mut ComponentManifest<Self>) {
//!         manifest.constructor(
//!             Constructor::new(|args| Ok(Welcome { greeter: args.next()? }))
//!                 .param::<Arc<dyn Greeter>>("greeter"),
//!         );
//!     }
//! }
//!
//! let injector = Injector::new();
//! injector.register_singleton::<dyn Greeter, English>();
//! injector.register_type::<Welcome, Welcome>();
//!
//! let welcome = injector.get_instance::<Welcome>().unwrap();
//! assert_eq!(welcome.greeter.greet(), "Hello");
//! ```

pub mod builder;
pub mod component;
pub mod container;
pub mod dependency_graph;
pub mod engine;
pub mod errors;
pub mod factories;
pub mod introspector;
pub mod registration;
pub mod resolver;
pub mod scanner;
pub mod types;

pub use builder::{InjectorBuilder, InjectorOptions};
pub use component::{Component, ComponentManifest, Constructor, ParameterInfo, Property};
pub use container::Injector;
pub use dependency_graph::{DependencyGraph, DependencyGraphError, DependencyGraphErrors};
pub use errors::{ConfigurationError, ResolutionPath, ResolveError};
pub use factories::{ConstructorInvoker, InvokerKind};
pub use introspector::{TypeIntrospector, TypeMetadata};
pub use registration::{Registration, RegistrationHandle, ValueOverrides};
pub use resolver::{Argument, Arguments, Dependency, Lazy};
pub use scanner::{ImplementationScanner, Module};
pub use types::{DependencyInfo, DynError, Injectable, Instance, ServiceKey, TypeInfo, Upcast};
