//! Configuration file for the registry.
//!
//! All default values live in `config.default.toml`, which is embedded at
//! compile time. A user file only needs the keys it wants to change.

use std::{fs, num::NonZeroU64, path::Path, path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use url::Url;

use super::{
    log_level::{LogLevel, ModuleLevel},
    toml_merge,
};
use crate::RetrySettings;

/// Embedded copy of the default configuration.
pub const DEFAULT_CONFIG: &str = include_str!("config.default.toml");

/// Error that can occur when reading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigReadError {
    /// The file did not exist or could not be read.
    #[error("config file not found: {0}")]
    ConfigFileNotFound(#[from] std::io::Error),
    /// The TOML was syntactically invalid or didn't match the schema.
    #[error("config file is not valid TOML: {0}")]
    ConfigFileNotValid(#[from] toml::de::Error),
    /// A user value has a different type than its default.
    #[error("failed to merge embedded and user TOML: {0}")]
    ConfigMergeError(#[from] toml_merge::MergeError),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RegistryToml {
    /// Seconds a record is fresh for [crate::Registry::lookup_default].
    pub ttl_s: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RetryToml {
    pub max_retries: u8,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryToml {
    pub fn to_settings(&self) -> RetrySettings {
        let mut settings = RetrySettings::new();
        settings
            .max_retries(self.max_retries)
            .initial_retry_delay(Duration::from_millis(self.initial_delay_ms))
            .max_retry_delay(Duration::from_millis(self.max_delay_ms));
        settings
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UpstreamToml {
    pub session_server: Url,
    pub profile_api: Url,
    pub request_timeout_ms: NonZeroU64,
}

/// Signature scheme of the texture issuer.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerifierKind {
    /// RSA PKCS#1 v1.5 over SHA-1, the scheme of Mojang's session server.
    Yggdrasil,
    Ed25519,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VerifierToml {
    pub kind: VerifierKind,
    /// PEM for `yggdrasil`, hex for `ed25519`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LoggingToml {
    /// Set to `false` to leave subscriber setup to the host.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub level: LogLevel,
    #[serde(default)]
    pub module_levels: Vec<ModuleLevel>,
}

fn enabled_by_default() -> bool {
    true
}

impl LoggingToml {
    /// Filter for `level` with every module override applied on top.
    pub fn filter(&self) -> EnvFilter {
        self.module_levels
            .iter()
            .fold(EnvFilter::default().add_directive(self.level.0.into()), |filter, module| {
                filter.add_directive(module.directive())
            })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConfigToml {
    pub registry: RegistryToml,
    pub retry: RetryToml,
    pub upstream: UpstreamToml,
    pub verifier: VerifierToml,
    /// Tracing setup. Always present when loaded over the defaults, `None`
    /// only for configs built in code.
    #[serde(default)]
    pub logging: Option<LoggingToml>,
}

impl Default for ConfigToml {
    fn default() -> Self {
        ConfigToml::from_str(DEFAULT_CONFIG).expect("Embedded config.default.toml must be valid")
    }
}

impl ConfigToml {
    /// Read a configuration file and overlay it on top of the embedded defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigReadError> {
        let raw = fs::read_to_string(path)?;
        Self::from_str_with_defaults(&raw)
    }

    /// Parse a raw TOML string and overlay it on top of the embedded defaults.
    pub fn from_str_with_defaults(raw: &str) -> Result<Self, ConfigReadError> {
        let defaults: toml::Value = DEFAULT_CONFIG.parse()?;
        let overrides: toml::Value = raw.parse()?;
        let merged = toml_merge::merge(defaults, overrides)?;
        Ok(merged.try_into()?)
    }

    /// Returns a default config tuned for unit tests.
    ///
    /// Uses an ed25519 verifier without a key, so tests set the key they sign with.
    pub fn test() -> Self {
        let mut config = Self::default();
        config.verifier.kind = VerifierKind::Ed25519;
        config.verifier.public_key = None;
        config.retry.initial_delay_ms = 10;
        config.retry.max_delay_ms = 50;
        config.logging = None;
        config
    }
}

impl FromStr for ConfigToml {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}
