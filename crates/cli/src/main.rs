use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use bookshelf_http::router::{endpoint_listing, openapi_document};
use bookshelf_kernel::settings::Settings;

/// Book catalogue and review API backed by flat JSON files
#[derive(Debug, Parser)]
#[command(name = "bookshelf", version, about)]
struct Cli {
    /// Directory holding base.toml and <env>.toml (default: ./config)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Print every endpoint the server exposes
    Routes,
    /// Create empty data files that do not exist yet
    InitData,
    /// Print the resolved configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config_dir {
        Some(dir) => Settings::load_from(dir),
        None => Settings::load(),
    }
    .with_context(|| "failed to load bookshelf settings")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            bookshelf_telemetry::init(&settings.telemetry)?;
            tracing::info!(env = ?settings.environment, "bookshelf serve");
            bookshelf_app::run(settings).await
        }
        Command::Routes => {
            let registry = bookshelf_app::build_registry(&settings);
            let endpoints = endpoint_listing(&openapi_document(&registry));
            let width = endpoints.keys().map(String::len).max().unwrap_or(0);
            for (endpoint, summary) in endpoints {
                println!("{endpoint:<width$}  {summary}");
            }
            Ok(())
        }
        Command::InitData => {
            bookshelf_telemetry::init(&settings.telemetry)?;
            bookshelf_app::init_data(&settings).await?;
            println!("data directory ready: {}", settings.storage.data_dir.display());
            Ok(())
        }
        Command::Config => {
            let rendered = serde_json::to_string_pretty(&settings)
                .context("failed to render settings")?;
            println!("{rendered}");
            Ok(())
        }
    }
}
