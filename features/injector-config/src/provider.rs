use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use injector::{Injector, TypeInfo};

use crate::{config::Config, errors::ConfigError};

type StoredConfig = Arc<dyn Any + Send + Sync + 'static>;

struct ConfigEntry {
    info: TypeInfo,
    value: StoredConfig,
    install: fn(&Injector, &StoredConfig),
}

/// A provider to register all configs.
///
/// Configs can be registered and retrieved based on type,
/// and installed into an [`Injector`] to be injected as [`Config<T>`].
#[derive(Default)]
pub struct ConfigProvider {
    configs: HashMap<TypeId, ConfigEntry>,
}

impl ConfigProvider {
    /// Initializes an empty Config Provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve a config with specified type.
    ///
    /// Returns `Ok(None)` if no config of this type was added
    pub fn get_config<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, ConfigError> {
        self.configs
            .get(&TypeId::of::<T>())
            .map(|entry| entry.value.clone().downcast())
            .transpose()
            .map_err(|_| ConfigError::Missing(TypeInfo::of::<T>()))
    }

    /// Retrieve a config which has to exist
    pub fn require_config<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ConfigError> {
        self.get_config()?
            .ok_or_else(|| ConfigError::Missing(TypeInfo::of::<T>()))
    }

    /// Add a config to the registry.
    ///
    /// If the config type is already registered, it will return a
    /// [`ConfigError`] runtime error
    pub fn add_config<T: Send + Sync + 'static>(
        &mut self,
        config: T,
    ) -> Result<&mut Self, ConfigError> {
        let info = TypeInfo::of::<T>();

        if self.configs.contains_key(&info.type_id) {
            return Err(ConfigError::AlreadyRegistered(info));
        }

        tracing::debug!("Adding config {}", info);
        self.configs.insert(
            info.type_id,
            ConfigEntry {
                info,
                value: Arc::new(config),
                install: install_config::<T>,
            },
        );
        Ok(self)
    }

    /// Can optionally add a config to the registry.
    ///
    /// If the config provided is `Some(T)`, it will be the same as calling [`ConfigProvider::add_config`]
    /// If the config provided is `None`, then the function just returns `Ok(self)` for chaining
    pub fn maybe_add_config<T: Send + Sync + 'static>(
        &mut self,
        config: Option<T>,
    ) -> Result<&mut Self, ConfigError> {
        match config {
            Some(c) => self.add_config(c),
            None => Ok(self),
        }
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Registers every config as an instance of `Config<T>`, and the provider itself
    ///
    /// Configs replace earlier registrations of the same type.
    pub fn install(self, injector: &Injector) -> Arc<ConfigProvider> {
        for entry in self.configs.values() {
            tracing::debug!("Installing config {}", entry.info);
            (entry.install)(injector, &entry.value);
        }
        let provider = Arc::new(self);
        injector.register_instance(provider.clone());
        provider
    }
}

fn install_config<T: Send + Sync + 'static>(injector: &Injector, value: &StoredConfig) {
    match value.clone().downcast::<T>() {
        Ok(config) => {
            injector.register_instance(Arc::new(Config::new(config)));
        }
        Err(_) => tracing::error!("Stored config is not a '{}'", TypeInfo::of::<T>()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Database {
        url: String,
    }

    #[test]
    fn configs_are_stored_by_type() {
        let mut provider = ConfigProvider::new();
        provider
            .add_config(Database {
                url: "postgres://localhost".to_string(),
            })
            .unwrap()
            .maybe_add_config::<u16>(None)
            .unwrap();

        let database = provider.get_config::<Database>().unwrap().unwrap();
        assert_eq!(database.url, "postgres://localhost");
        assert_eq!(provider.get_config::<u16>(), Ok(None));
        assert_eq!(
            provider.require_config::<u16>(),
            Err(ConfigError::Missing(TypeInfo::of::<u16>()))
        );
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn adding_a_config_twice_fails() {
        let mut provider = ConfigProvider::new();
        provider.add_config(8080u16).unwrap();

        let error = provider.add_config(9090u16).err().unwrap();
        assert_eq!(error, ConfigError::AlreadyRegistered(TypeInfo::of::<u16>()));
        assert_eq!(*provider.require_config::<u16>().unwrap(), 8080);
    }
}
