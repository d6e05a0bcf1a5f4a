//! rclink - Remote-control client for a networked vehicle controller
//!
//! This is the binary entry point. All logic lives in the library crates.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;

use rclink_app::config::{default_config_path, init_config_file, load_settings};

/// rclink - drive a networked vehicle from the command line
#[derive(Parser, Debug)]
#[command(name = "rclink")]
#[command(about = "Remote-control client for a networked vehicle controller", long_about = None)]
struct Args {
    /// Vehicle host (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Vehicle port (overrides the config file)
    #[arg(long, short)]
    port: Option<u16>,

    /// Shared secret sent during the handshake
    #[arg(long, env = "RCLINK_CREDENTIAL", hide_env_values = true)]
    credential: Option<String>,

    /// Path to config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write a default config file and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(default_config_path);

    if args.init_config {
        if init_config_file(&config_path)? {
            eprintln!("Created {}", config_path.display());
        } else {
            eprintln!("Config already exists: {}", config_path.display());
        }
        return Ok(());
    }

    rclink_core::logging::init()?;

    let mut settings = load_settings(&config_path);
    if let Some(host) = args.host {
        settings.connection.host = host;
    }
    if let Some(port) = args.port {
        settings.connection.port = port;
    }

    rclink::run_headless(settings, args.credential.as_deref()).await?;
    Ok(())
}
