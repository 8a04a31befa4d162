//! Lesson CLI
//!
//! Generates a progressive language lesson from a source text, or serves the
//! lesson generation HTTP API.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use lesson_generator::{
    create_router, AppState, CefrLevel, CliCompletion, Config, GeneratedLesson, LessonGenerator,
    LessonRequest, ProgressCallback, ProgressUpdate,
};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Lesson type used when none is given.
const DEFAULT_LESSON_TYPE: &str = "discussion";

/// Progressive Lesson Generator
///
/// Builds a CEFR-levelled lesson section by section from an article or
/// passage, falling back to template content whenever the completion tool
/// fails.
#[derive(Parser, Debug)]
#[command(name = "lesson")]
#[command(version, about, long_about = None)]
struct Args {
    /// Source text file, or `-` to read from stdin
    #[arg(value_name = "SOURCE")]
    source: Option<String>,

    /// Lesson type (discussion, grammar, pronunciation, travel, business, ...)
    #[arg(short = 't', long, default_value = DEFAULT_LESSON_TYPE)]
    lesson_type: String,

    /// CEFR level (A1-C2); overrides the config file
    #[arg(short, long)]
    level: Option<CefrLevel>,

    /// Lesson language; overrides the config file
    #[arg(long, value_name = "LANGUAGE")]
    language: Option<String>,

    /// Path to configuration file (default: lesson.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Write the lesson JSON here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// Serve the HTTP API instead of generating one lesson
    #[arg(long)]
    serve: bool,

    /// Port for the HTTP API server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?args.config, "Config file");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(level) = args.level {
        config.default_level = level;
    }
    if let Some(ref language) = args.language {
        config.target_language.clone_from(language);
    }

    // Re-validate after overrides
    config.validate()?;

    let service = Arc::new(CliCompletion::new(
        config.provider,
        config.completion_timeout(),
    ));

    if args.serve {
        return serve(config, service, args.port).await;
    }

    let Some(source) = args.source.as_deref() else {
        anyhow::bail!(
            "No source text given\n\nSuggestion: Pass a file path, `-` for stdin, or use --serve"
        );
    };
    let source_text = read_source(source).await?;

    let request = LessonRequest::new(source_text, &args.lesson_type)
        .with_level(config.default_level)
        .with_target_language(config.target_language.clone());
    let plan = config.plan_for(&args.lesson_type);

    eprintln!(
        "Generating {} lesson at {} ({} sections)",
        request.lesson_type,
        request.level,
        plan.sections.len()
    );

    let callback: ProgressCallback = Arc::new(print_progress);
    let generator = LessonGenerator::new(service)
        .with_weights(config.weights())
        .with_context_settings(config.context_settings())
        .with_progress_callback(callback);

    let lesson = generator.generate_lesson(&request, &plan).await?;
    write_lesson(&lesson, args.output.as_deref()).await
}

/// Serves the HTTP API until Ctrl+C.
async fn serve(config: Config, service: Arc<CliCompletion>, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let router = create_router(AppState::new(config, service));

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!("HTTP API server running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received Ctrl+C, shutting down");
        })
        .await?;

    Ok(())
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Reads the source text from a file, or from stdin for `-`.
async fn read_source(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        return Ok(text);
    }

    tokio::fs::read_to_string(source).await.map_err(|e| {
        anyhow::anyhow!("Failed to read source text '{source}': {e}\n\nSuggestion: Check the path")
    })
}

fn print_progress(update: &ProgressUpdate) {
    match update.section.as_deref() {
        Some(word) => eprintln!("[{:>3}%] {} ({word})", update.progress, update.step),
        None => eprintln!("[{:>3}%] {}", update.progress, update.step),
    }
}

/// Writes the lesson as pretty JSON to `output`, or stdout.
async fn write_lesson(lesson: &GeneratedLesson, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(lesson)?;
    match output {
        Some(path) => {
            tokio::fs::write(path, json).await.map_err(|e| {
                anyhow::anyhow!("Failed to write lesson to '{}': {e}", path.display())
            })?;
            eprintln!(
                "Lesson written to {} ({} sections, ~{} tokens)",
                path.display(),
                lesson.sections.len(),
                lesson.total_tokens
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}
