//! CLI command definitions and handlers

use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::models::AUTO_DETECT;
use crate::core::router::FallbackRouter;
use crate::processors::bundle::{BundleFormat, BundleProcessor};

/// Commands for Tiered Translator
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Translate JSON/YAML string bundles
    Translate {
        /// Input bundle file or directory (required)
        #[arg(short, long)]
        file: PathBuf,

        /// Output directory (defaults to next to each input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Source language
        #[arg(long, default_value = AUTO_DETECT)]
        source_lang: String,

        /// Target languages, repeatable
        #[arg(short, long = "target-lang", required = true)]
        target_lang: Vec<String>,
    },

    /// Translate texts given on the command line
    Text {
        /// Texts to translate
        #[arg(required = true)]
        texts: Vec<String>,

        /// Target language
        #[arg(short, long)]
        target_lang: String,

        /// Source language
        #[arg(long, default_value = AUTO_DETECT)]
        source_lang: String,
    },

    /// List configured providers and their fallback order
    Providers {
        /// Show the selection order for this target language
        #[arg(short, long)]
        target_lang: Option<String>,
    },

    /// Start HTTP API server
    Server {
        /// Bind address (default: 0.0.0.0)
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Listen port (default: 8000)
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },
}

fn load_router(config: Option<&Path>) -> anyhow::Result<Arc<FallbackRouter>> {
    Ok(Arc::new(FallbackRouter::from_env(config)?))
}

/// Cancels the returned token on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight translations");
            child.cancel();
        }
    });
    token
}

/// Previously written outputs such as `en.fi.json` for target `fi`
fn is_translated_output(path: &Path, target_langs: &[String]) -> bool {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    target_langs
        .iter()
        .any(|lang| stem.ends_with(&format!(".{}", lang)))
}

/// Handle bundle translation command
pub async fn handle_translate(
    config: Option<PathBuf>,
    file: PathBuf,
    output: Option<PathBuf>,
    source_lang: String,
    target_langs: Vec<String>,
) -> anyhow::Result<()> {
    let start_time = Instant::now();

    info!("Starting bundle translation");
    info!("Input: {}", file.display());
    if let Some(output) = &output {
        info!("Output: {}", output.display());
    }
    info!("Target languages: {}", target_langs.join(", "));

    let cancel = cancel_on_ctrl_c();
    let processor = BundleProcessor::new(load_router(config.as_deref())?)
        .with_cancellation(cancel.clone());

    let input_root = if file.is_dir() {
        file.clone()
    } else {
        file.parent().map(Path::to_path_buf).unwrap_or_default()
    };

    // Find files
    let files: Vec<PathBuf> = if file.is_dir() {
        processor
            .find_files(&file)?
            .into_iter()
            .filter(|p| !is_translated_output(p, &target_langs))
            .collect()
    } else if BundleFormat::from_path(&file).is_some() {
        vec![file]
    } else {
        anyhow::bail!("Unsupported bundle format: {}", file.display());
    };

    if files.is_empty() {
        anyhow::bail!("No bundle files found");
    }

    // Create progress bar
    let pb = ProgressBar::new((files.len() * target_langs.len()) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )?
            .progress_chars("=>-"),
    );

    let mut processed = 0;
    let mut failed = 0;

    'files: for file_path in &files {
        for lang in &target_langs {
            if cancel.is_cancelled() {
                break 'files;
            }
            pb.set_message(format!("{} -> {}", file_path.display(), lang));

            let out =
                BundleProcessor::output_path(file_path, &input_root, output.as_deref(), lang);
            match processor
                .translate_file(file_path, &out, &source_lang, lang)
                .await
            {
                Ok(_) => processed += 1,
                Err(e) => {
                    failed += 1;
                    pb.println(format!(
                        "Error translating {} to {}: {}",
                        file_path.display(),
                        lang,
                        e
                    ));
                }
            }
            pb.inc(1);
        }
    }

    pb.finish_with_message("Completed");

    let duration = start_time.elapsed();
    info!(
        "Completed: {} processed, {} failed in {:?}",
        processed, failed, duration
    );

    println!("\n✅ Translation completed!");
    println!("   Processed: {}", processed);
    println!("   Failed: {}", failed);
    println!("   Time: {:?}", duration);

    if failed > 0 {
        anyhow::bail!("{} translation(s) failed", failed);
    }

    Ok(())
}

/// Handle inline text translation command
pub async fn handle_text(
    config: Option<PathBuf>,
    texts: Vec<String>,
    target_lang: String,
    source_lang: String,
) -> anyhow::Result<()> {
    let processor =
        BundleProcessor::new(load_router(config.as_deref())?).with_cancellation(cancel_on_ctrl_c());

    let routed = processor
        .translate_texts(&texts, &source_lang, &target_lang)
        .await?;

    for failure in &routed.failures {
        eprintln!("⚠️  {}", failure);
    }
    for text in &routed.texts {
        println!("{}", text);
    }
    eprintln!(
        "Served by {} after {} fallback(s)",
        routed.provider_used, routed.fallback_count
    );

    Ok(())
}

/// Handle providers command
pub async fn handle_providers(
    config: Option<PathBuf>,
    target_lang: Option<String>,
) -> anyhow::Result<()> {
    let router = load_router(config.as_deref())?;

    println!(
        "{:<16} {:<8} {:>4} {:<8} {:<10} PREFERRED",
        "NAME", "KIND", "TIER", "ENABLED", "AVAILABLE"
    );
    for provider in router.providers() {
        let descriptor = provider.descriptor();
        println!(
            "{:<16} {:<8} {:>4} {:<8} {:<10} {}",
            descriptor.name,
            descriptor.kind.to_string(),
            descriptor.tier,
            descriptor.enabled,
            provider.is_available(),
            descriptor.preferred_languages.join(",")
        );
    }

    if let Some(lang) = target_lang {
        let order: Vec<_> = router
            .select(&lang)
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        if order.is_empty() {
            println!("\nNo providers available for {}", lang);
        } else {
            println!("\nFallback order for {}: {}", lang, order.join(" -> "));
        }
    }

    Ok(())
}

/// Handle server command
pub async fn handle_server(config: Option<PathBuf>, host: String, port: u16) -> anyhow::Result<()> {
    use crate::server::api::run_server;

    let router = load_router(config.as_deref())?;

    info!("Starting HTTP server on {}:{}", host, port);
    println!("🚀 Server starting on http://{}:{}", host, port);

    run_server(router, host, port).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(subcommand)]
        command: Commands,
    }

    #[test]
    fn test_translate_accepts_repeated_targets() {
        let cli = Cli::try_parse_from([
            "tiered-translator",
            "translate",
            "-f",
            "locales/en.json",
            "-t",
            "fi",
            "-t",
            "de",
        ])
        .unwrap();
        match cli.command {
            Commands::Translate {
                target_lang,
                source_lang,
                output,
                ..
            } => {
                assert_eq!(target_lang, vec!["fi", "de"]);
                assert_eq!(source_lang, AUTO_DETECT);
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_translate_requires_target() {
        assert!(Cli::try_parse_from(["tiered-translator", "translate", "-f", "en.json"]).is_err());
    }

    #[test]
    fn test_is_translated_output() {
        let targets = vec!["fi".to_string()];
        assert!(is_translated_output(Path::new("en.fi.json"), &targets));
        assert!(!is_translated_output(Path::new("en.json"), &targets));
        assert!(!is_translated_output(Path::new("en.de.json"), &targets));
    }
}
