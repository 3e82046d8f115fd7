//! Main entry point for Tiered Translator CLI

#![forbid(unsafe_code)]

use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiered_translator::cli::commands::{self, Commands};

/// Tiered Translator - multi-provider translation with tiered fallback
#[derive(Parser, Debug)]
#[command(name = "tiered-translator", version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}={}", env!("CARGO_PKG_NAME").replace('-', "_"), log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Execute command
    match args.command {
        Some(Commands::Translate {
            file,
            output,
            source_lang,
            target_lang,
        }) => {
            commands::handle_translate(args.config, file, output, source_lang, target_lang).await?;
        }
        Some(Commands::Text {
            texts,
            target_lang,
            source_lang,
        }) => {
            commands::handle_text(args.config, texts, target_lang, source_lang).await?;
        }
        Some(Commands::Providers { target_lang }) => {
            commands::handle_providers(args.config, target_lang).await?;
        }
        Some(Commands::Server { host, port }) => {
            commands::handle_server(args.config, host, port).await?;
        }
        None => {
            println!("Please specify a command. Use --help for more information.");
        }
    }

    Ok(())
}
