//! castrelay host: entry point.
//!
//! ```text
//! castrelay-server                   Run in the foreground
//! castrelay-server --config <path>   Load a custom config TOML
//! castrelay-server --listen <addr>   Override the listen address
//! castrelay-server --gen-config      Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use castrelay_server::config::ServerConfig;
use castrelay_server::service::RelayService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "castrelay-server", about = "castrelay remote-desktop relay host")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "castrelay.toml")]
    config: PathBuf,

    /// Listen address, overriding the config file.
    #[arg(short, long)]
    listen: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ServerConfig::load(&cli.config);
    if let Some(listen) = cli.listen {
        config.network.listen_address = listen;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("castrelay-server v{}", env!("CARGO_PKG_VERSION"));
    info!("listen address: {}", config.network.listen_address);
    info!(
        "webrtc relay: {} ({} ICE servers)",
        if config.webrtc.enabled { "enabled" } else { "disabled" },
        config.webrtc.ice_servers.len()
    );

    let service = RelayService::new(config);
    let stop = service.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    service.run().await?;

    Ok(())
}
