use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use helios_skins::{
    logging::init_from_config, ConfigToml, Identity, MojangProvider, Registry,
};
use tracing::info;

#[derive(Parser)]
#[command(version, about = "Look up and verify the textures of a player.")]
struct Cli {
    /// TOML config file. Built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Player name or account UUID.
    player: String,
}

fn looks_like_uuid(value: &str) -> bool {
    let undashed = value.replace('-', "");
    undashed.len() == 32 && undashed.chars().all(|c| c.is_ascii_hexdigit())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ConfigToml::from_file(path)?,
        None => ConfigToml::default(),
    };
    init_from_config(&config)?;

    let registry = Registry::from_config(&config)?;
    if let Some(path) = &config.registry.snapshot_path {
        registry.restore_snapshot(path)?;
    }

    let identity = if looks_like_uuid(&cli.player) {
        Identity::from(cli.player.as_str())
    } else {
        let provider = MojangProvider::with_endpoints(
            config.upstream.session_server.clone(),
            config.upstream.profile_api.clone(),
            Duration::from_millis(config.upstream.request_timeout_ms.get()),
        )?;
        let identity = provider.resolve_name(&cli.player).await?;
        info!(player = %cli.player, %identity, "Resolved player name");
        identity
    };

    let record = registry.lookup_default(&identity).await?;
    let document = record.payload().decode()?;
    info!(%identity, source = ?record.source(), "Verified textures");

    if let Some(skin) = &document.textures.skin {
        println!("skin: {} ({:?})", skin.url, skin.model());
    }
    if let Some(cape) = &document.textures.cape {
        println!("cape: {}", cape.url);
    }

    if let Some(path) = &config.registry.snapshot_path {
        registry.save_snapshot(path)?;
    }
    Ok(())
}
