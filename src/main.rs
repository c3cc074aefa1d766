use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nanozilla_reactor::ai::mime::sniff_format;
use nanozilla_reactor::app::{App, ColorizeOptions};
use nanozilla_reactor::config::Config;
use nanozilla_reactor::models::{OutputFormat, Quality, SafetyLevel, UploadedImage};
use nanozilla_reactor::server;
use nanozilla_reactor::spelling::{SpellChecker, SpellingIssue};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "nanozilla-reactor")]
#[command(about = "AI image colorization and restyling service")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        /// Overrides HOST.
        #[arg(long)]
        host: Option<String>,
        /// Overrides PORT.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Colorize a single image and write the result to disk.
    Colorize {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
        /// Style description applied to the image.
        #[arg(short, long)]
        prompt: String,
        #[arg(long, value_parser = parse_arg::<Quality>)]
        quality: Option<Quality>,
        #[arg(long, value_parser = parse_arg::<SafetyLevel>)]
        safety_level: Option<SafetyLevel>,
        /// Total attempts (1-5).
        #[arg(long)]
        retries: Option<u32>,
        #[arg(long, default_value = "png", value_parser = parse_arg::<OutputFormat>)]
        format: OutputFormat,
        /// Defaults to `nanozilla_<stem>.<ext>` next to the working directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Spell-check a style prompt.
    CheckPrompt {
        #[arg(value_name = "TEXT")]
        text: String,
    },
}

fn parse_arg<T>(input: &str) -> std::result::Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    input.parse::<T>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nanozilla_reactor=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    if let Err(e) = run(args.command).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Serve { host, port } => {
            let config = Config::from_env().context("Failed to load configuration")?;
            let host = host.unwrap_or_else(|| config.host.clone());
            let port = port.unwrap_or(config.port);
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

            info!("Starting nanozilla-reactor with model {}", config.model_name);
            let app = Arc::new(App::from_config(&config));
            server::serve(app, addr).await?;
        }
        Command::Colorize {
            image,
            prompt,
            quality,
            safety_level,
            retries,
            format,
            output,
        } => {
            let config = Config::from_env().context("Failed to load configuration")?;
            let app = App::from_config(&config);

            let defaults = app.default_options();
            let options = ColorizeOptions {
                quality: quality.unwrap_or(defaults.quality),
                safety_level: safety_level.unwrap_or(defaults.safety_level),
                output_format: format,
                retry_attempts: retries.unwrap_or(defaults.retry_attempts),
            };

            let upload = load_upload(&image).await?;
            let outcome = app.colorize(upload, &prompt, options).await?;

            print_issues(&outcome.spelling_issues);
            let source = &outcome.source;
            println!(
                "Source: {}x{} {} ({:.2} MB)",
                source.width, source.height, source.format, source.file_size_mb
            );
            if let Some(analysis) = source.color_analysis {
                println!("Color analysis: {:?}", analysis.color_mode);
            }

            let output = output.unwrap_or_else(|| default_output_path(&image, format));
            tokio::fs::write(&output, &outcome.image)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;

            println!(
                "Wrote {} ({} bytes) in {:.2}s after {} attempt(s) using {}",
                output.display(),
                outcome.image.len(),
                outcome.processing_time.as_secs_f64(),
                outcome.attempts,
                outcome.model
            );
        }
        Command::CheckPrompt { text } => {
            let (corrected, issues) = SpellChecker::new().check(&text);
            if issues.is_empty() {
                println!("No issues found");
            } else {
                print_issues(&issues);
                println!("Corrected: {}", corrected);
            }
        }
    }

    Ok(())
}

async fn load_upload(path: &Path) -> Result<UploadedImage> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let content_type = sniff_format(&bytes)
        .map(|format| format.mime_type())
        .unwrap_or("application/octet-stream");
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(UploadedImage::new(bytes, filename, content_type))
}

fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    PathBuf::from(format!("nanozilla_{}.{}", stem, format.extension()))
}

fn print_issues(issues: &[SpellingIssue]) {
    for issue in issues {
        match issue {
            SpellingIssue::Spelling {
                original,
                suggestion,
                ..
            } => println!("Corrected '{}' -> '{}'", original, suggestion),
            SpellingIssue::Suggestion {
                original,
                suggestions,
                ..
            } => println!("'{}': did you mean {}?", original, suggestions.join(", ")),
        }
    }
}
