//!
//! Installs the process-wide tracing subscriber from the `[logging]` section.
//!
//! Hosts that already run their own subscriber set `enabled = false` and
//! keep receiving the registry's events through it.
//!

use tracing_subscriber::EnvFilter;

use crate::ConfigToml;

/// Installs a `fmt` subscriber for `config.logging`.
///
/// `RUST_LOG`, when set, replaces the configured levels. Returns `false` if the
/// section is absent or disabled, in which case nothing is installed.
pub fn init_from_config(config: &ConfigToml) -> anyhow::Result<bool> {
    let Some(logging) = config.logging.as_ref().filter(|logging| logging.enabled) else {
        return Ok(false);
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| logging.filter());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("a tracing subscriber is already installed: {e}"))?;
    tracing::debug!(level = %logging.level, "Registry logging initialized.");

    Ok(true)
}
