use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use eyre::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ds_tutor::cli::chat::ChatContext;
use ds_tutor::config::{Overrides, TutorConfig};
use ds_tutor::gemini_client::GeminiClient;
use ds_tutor::TutorSession;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ask a single question and exit
    #[arg(short, long)]
    input: Option<String>,

    /// Gemini model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature between 0 and 1
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Seconds to wait for the model before giving up
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Number of most recent turns sent with each question (0 sends all)
    #[arg(long)]
    history_window: Option<usize>,

    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error); overrides --verbose
    #[arg(long)]
    log_level: Option<Level>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    let log_level = cli
        .log_level
        .unwrap_or(if cli.verbose { Level::DEBUG } else { Level::INFO });

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Starting Data Science Tutor");

    let overrides = Overrides {
        model: cli.model,
        temperature: cli.temperature,
        timeout_secs: cli.timeout_secs,
        history_window: cli.history_window,
    };

    let config = match TutorConfig::load(cli.config.as_deref(), &overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let client = match GeminiClient::from_config(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };
    let session = Arc::new(TutorSession::from_config(&config, client));

    let mut chat_context = ChatContext::new(Box::new(io::stdout()), cli.input, true, session);
    chat_context.run().await
}
