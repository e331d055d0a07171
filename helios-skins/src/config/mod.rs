mod config_toml;
mod log_level;
mod toml_merge;

pub use config_toml::{
    ConfigReadError, ConfigToml, LoggingToml, RegistryToml, RetryToml, UpstreamToml,
    VerifierKind, VerifierToml, DEFAULT_CONFIG,
};
pub use log_level::{LogLevel, LogLevelError, ModuleLevel};
pub use toml_merge::MergeError;
