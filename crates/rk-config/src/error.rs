#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("failed to read configuration file: {0}")]
    Io(String),
    #[error("failed to parse configuration TOML: {0}")]
    Parse(String),
    #[error("[{object}] is not a valid configuration object")]
    MissingObject { object: String },
    #[error("'{key}' in [{object}] is not defined")]
    MissingKey { object: String, key: String },
    #[error("'{key}' in [{object}] is not a {expected}")]
    TypeMismatch { object: String, key: String, expected: &'static str },
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
