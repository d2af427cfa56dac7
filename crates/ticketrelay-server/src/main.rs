//! ticketrelay server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), overlays
//! `TICKETRELAY__*` environment variables, opens the SQLite store, builds
//! the PSA and chat clients, and serves the webhook and control API.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `admin_password_hash`:
//!
//! ```
//! cargo run -p ticketrelay-server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use ticketrelay_engine::Relay;
use ticketrelay_server::{ServerConfig, auth::hash_password};
use ticketrelay_store_sqlite::SqliteStore;
use ticketrelay_upstream::{ConnectWise, Webex};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Ticket-to-chat notification relay")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    let hash     = hash_password(&password).context("failed to hash password")?;
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("TICKETRELAY").prefix_separator("__").separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig =
    settings.try_deserialize().context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(dir) = store_path.parent()
    && !dir.as_os_str().is_empty()
  {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {dir:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let psa  = ConnectWise::new(server_cfg.psa.client.clone()).context("invalid [psa] settings")?;
  let chat = Webex::new(server_cfg.chat.clone()).context("invalid [chat] settings")?;

  let relay = Relay::new(store, psa, chat, server_cfg.relay_options())
    .await
    .context("failed to load runtime config")?;
  let relay = Arc::new(relay);
  relay.spawn_launch_syncs().await;

  let app     = ticketrelay_server::app(relay, server_cfg.auth());
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener =
    TcpListener::bind(&address).await.with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
