use std::{any::type_name, ops::Deref, sync::Arc};

use injector::{Argument, Dependency, DependencyInfo, Injectable, ResolveError, TypeInfo};

/// A wrapper type to allow for config injections
///
/// This provides a simple way to retrieve configs from the config registry,
/// and inject them into a component as a dependency
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use injector::{Component, ComponentManifest, Constructor, Injector};
/// use injector_config::{config::Config, provider::ConfigProvider};
///
/// pub struct MyModuleConfig {
///     enabled: bool,
/// }
///
/// pub struct MyModule {
///     enabled: bool,
/// }
/// impl Component for MyModule {
///     fn manifest(manifest: &mut ComponentManifest<Self>) {
///         manifest.constructor(
///             Constructor::new(|args| {
///                 let config: Config<MyModuleConfig> = args.next()?;
///                 Ok(MyModule { enabled: config.enabled })
///             })
///             .param::<Config<MyModuleConfig>>("config"),
///         );
///     }
/// }
///
/// let injector = Injector::new();
/// let mut config_provider = ConfigProvider::new();
/// config_provider.add_config(MyModuleConfig { enabled: true }).unwrap();
/// config_provider.install(&injector);
///
/// injector.register_type::<MyModule, MyModule>();
/// assert!(injector.get_instance::<MyModule>().unwrap().enabled);
/// ```
pub struct Config<T: ?Sized> {
    inner: Arc<T>,
}

impl<T: ?Sized> Clone for Config<T> {
    fn clone(&self) -> Self {
        Config {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ?Sized> Deref for Config<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T: ?Sized> Config<T> {
    pub fn new(inner: Arc<T>) -> Self {
        Config { inner }
    }

    pub fn inner(&self) -> Arc<T> {
        self.inner.clone()
    }

    pub fn into_inner(self) -> Arc<T> {
        self.inner
    }
}

impl<T: Injectable> Dependency for Config<T> {
    fn dependency_info() -> DependencyInfo {
        DependencyInfo {
            type_info: TypeInfo::of::<Config<T>>(),
            optional: false,
            lazy: false,
        }
    }

    fn from_argument(argument: Argument) -> Result<Self, ResolveError> {
        match argument {
            Argument::Resolved(instance) => instance
                .downcast::<Config<T>>()
                .map(|config| (*config).clone())
                .map_err(|actual_type| ResolveError::DowncastFailed {
                    required_type: type_name::<Config<T>>(),
                    actual_type,
                }),
            other => Err(ResolveError::DowncastFailed {
                required_type: type_name::<Config<T>>(),
                actual_type: match other {
                    Argument::Absent => "<absent>",
                    _ => "<deferred>",
                },
            }),
        }
    }
}
