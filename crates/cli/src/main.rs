mod commands;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use clap_complete::{Shell, generate};
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "purge-relay")]
#[command(version, about = "Purge cached pages from the local cache and Cloudflare on publish", long_about = None)]
struct Cli {
    /// Settings file (TOML); environment variables override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Purge one published URL from every configured target
    Publish {
        /// Canonical URL of the published content
        url: String,

        /// Content identifier, included in logs
        #[arg(long)]
        id: Option<String>,
    },

    /// Flush everything from every configured target
    PurgeAll,

    /// List the keys held by the local cache
    CacheList,

    /// Show which purge targets are configured
    Check,

    /// Accept publish events over HTTP
    Listen {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        /// Port to serve on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "purge-relay", &mut io::stdout());
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,purge_relay=debug,purge_relay_targets=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let settings = purge_relay_core::load_settings(cli.config.as_deref())
        .context("Failed to load settings")?;

    match cli.command {
        Command::Publish { url, id } => commands::publish::run(&settings, url, id).await,
        Command::PurgeAll => commands::publish::purge_all(&settings).await,
        Command::CacheList => commands::cache_list::run(&settings).await,
        Command::Check => commands::check::run(&settings),
        Command::Listen { host, port } => commands::listen::run(settings, host, port).await,
        Command::Completions { .. } => Ok(()),
    }
}
