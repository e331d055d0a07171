//! Log verbosity values as written in the `[logging]` section.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::{Directive, LevelFilter};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LogLevelError {
    #[error("unknown log level `{0}`")]
    Level(String),
    #[error("module level `{0}` is not of the form `target=level`")]
    ModuleLevel(String),
}

/// Verbosity for everything without a module override, e.g. `info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogLevel(pub LevelFilter);

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel(LevelFilter::INFO)
    }
}

impl TryFrom<String> for LogLevel {
    type Error = LogLevelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_level(&value).map(LogLevel)
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.to_string()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Verbosity override for one module, e.g. `helios_skins::coordinator=debug`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleLevel {
    target: String,
    level: LevelFilter,
    directive: Directive,
}

impl ModuleLevel {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn directive(&self) -> Directive {
        self.directive.clone()
    }
}

impl TryFrom<String> for ModuleLevel {
    type Error = LogLevelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let invalid = || LogLevelError::ModuleLevel(value.clone());
        let (target, level) = value.split_once('=').ok_or_else(invalid)?;
        let target = target.trim();
        if target.is_empty() {
            return Err(invalid());
        }
        let level = parse_level(level.trim())?;
        let directive = format!("{target}={level}").parse().map_err(|_| invalid())?;
        Ok(Self {
            target: target.to_string(),
            level,
            directive,
        })
    }
}

impl From<ModuleLevel> for String {
    fn from(module: ModuleLevel) -> Self {
        module.to_string()
    }
}

impl fmt::Display for ModuleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.target, self.level)
    }
}

fn parse_level(value: &str) -> Result<LevelFilter, LogLevelError> {
    value
        .parse()
        .map_err(|_| LogLevelError::Level(value.to_string()))
}
