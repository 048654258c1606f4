use injector::TypeInfo;

/// Errors when registering or acquiring a config
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The config type was added before
    #[error("The config type '{0}' is already registered")]
    AlreadyRegistered(TypeInfo),
    /// The required config type is not known
    #[error("The config type '{0}' is not known")]
    Missing(TypeInfo),
}
