//! hubbub — an IRC bot whose behavior lives entirely in plugins.

mod console;
mod watcher;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use hubbub_config::FileSource;
use hubbub_core::{BotConnection, BotRegistry, RoutePublisher};
use hubbub_web::ServingTable;

#[derive(Parser)]
#[command(name = "hubbub", about = "Plugin-driven IRC bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot: bring up configured servers, load plugins, serve HTTP
    Run {
        /// Config file path (defaults to ~/.hubbub/config.json5)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Web port override
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Validate the configuration and print a summary
    Check {
        /// Config file path (defaults to ~/.hubbub/config.json5)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run(config, port))
        }
        Commands::Check { config } => check(config),
    }
}

fn config_source(path: Option<PathBuf>) -> anyhow::Result<FileSource> {
    Ok(match path {
        Some(p) => FileSource::new(p),
        None => FileSource::default_path()?,
    })
}

async fn run(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let source = Arc::new(config_source(config_path)?);
    let config = hubbub_config::ConfigSource::load(source.as_ref())?;

    let plugins = Arc::new(hubbub_plugins::registry());
    let registry = Arc::new(BotRegistry::new());
    let serving = Arc::new(ServingTable::new());

    // Bring up each configured server connection.
    for id in config.server_ids() {
        let server = config.servers[&id].clone();
        let (tx, rx) = tokio::sync::mpsc::channel(256);
        let bot = BotConnection::new(&id, server, tx);
        console::spawn_outbound_printer(id.clone(), rx);
        registry.insert(bot.clone());
        let loaded = hubbub_core::load_all(&plugins, &bot).await;
        tracing::info!(server = %id, modules = loaded, "connection ready");
    }

    serving.publish(hubbub_core::collect_routes(&registry).await);

    // Web server.
    let mut web = config.web.clone();
    if let Some(p) = port {
        web.port = p;
    }
    let web_serving = serving.clone();
    tokio::spawn(async move {
        if let Err(e) = hubbub_web::serve(&web, web_serving).await {
            tracing::error!("web server failed: {e:#}");
        }
    });

    // Config watcher for hot-reload.
    let _watcher = watcher::start_config_watcher(
        source.clone(),
        registry.clone(),
        plugins.clone(),
        serving.clone(),
    );

    // Console event source; returns when stdin closes or on /quit.
    console::run(registry.clone()).await;
    Ok(())
}

fn check(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let source = config_source(config_path)?;
    let config = hubbub_config::ConfigSource::load(&source)?;

    println!("config ok ({})", source.path().display());
    println!("  web: {}:{}", config.web.host, config.web.port);
    println!("  servers: {}", config.servers.len());
    for id in config.server_ids() {
        let server = &config.servers[&id];
        println!(
            "    {id}: {}:{} as {} (plugins: {})",
            server.host,
            server.port,
            server.nick,
            server.plugins.join(", ")
        );
    }
    Ok(())
}
