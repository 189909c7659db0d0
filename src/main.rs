mod cli;
mod color;
mod utils;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use cli::{infer::infer_cmd, list::list_cmd, list::resolve_cmd, ColorMode};
use lx_litellm::config::read_config;
use lx_litellm::providers::InferenceOptions;
use tracing_subscriber::EnvFilter;

#[derive(
    Parser, Default, Clone, Copy, ValueEnum, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum RequestedColorMode {
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "lx-litellm")]
#[command(
    about = "Run extraction prompts through a LiteLLM gateway",
    version = "0.0.1"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, default_value_t = RequestedColorMode::default())]
    color: RequestedColorMode,
    /// Read the configuration from this file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a batch of prompts
    Infer(InferArgs),
    /// List registered provider patterns
    List(ListArgs),
    /// Show which provider serves a model
    Resolve(ResolveArgs),
}

/// Output formats for inference results
#[derive(
    Parser, ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum OutputFormat {
    /// One line per candidate
    #[default]
    Text,
    /// One JSON object per prompt
    Json,
}

#[derive(Parser)]
pub(crate) struct InferArgs {
    /// The model identifier, e.g. litellm-gpt-4o-mini
    #[arg(short, long)]
    model: Option<String>,
    /// Answer with a placeholder instead of calling the gateway
    #[arg(long)]
    dry_run: bool,
    /// Output format
    #[arg(short, long, default_value_t = OutputFormat::default())]
    format: OutputFormat,
    /// Gateway URL
    #[arg(long)]
    api_base: Option<String>,
    #[arg(long)]
    temperature: Option<f64>,
    #[arg(long)]
    max_tokens: Option<u32>,
    #[arg(long)]
    top_p: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    frequency_penalty: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    presence_penalty: Option<f64>,
    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,
    /// Number of candidates per prompt
    #[arg(short, long)]
    n: Option<u32>,
    /// The prompts. When omitted, prompts are read from standard input, one per line
    prompts: Vec<String>,
}

impl InferArgs {
    pub(crate) fn options(&self) -> InferenceOptions {
        InferenceOptions {
            api_base: self.api_base.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            timeout: self.timeout,
            n: self.n,
            ..Default::default()
        }
    }
}

/// Listing formats
#[derive(
    Parser, ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum ListingFormat {
    /// Format the output as a table
    #[default]
    Table,
    /// Format the output as JSON
    Json,
    /// Format the output as a table without a header
    HeaderlessTable,
}

#[derive(Parser)]
pub(crate) struct ListArgs {
    /// Output the listing with the specified format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
}

#[derive(Parser)]
pub(crate) struct ResolveArgs {
    /// The model identifier to resolve
    model: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    color::configure_color(ColorMode::resolve_auto(cli.color));

    init_tracing();

    let config = match read_config(cli.config.clone()) {
        Ok(config) => config,
        Err(err) => die!("{}", err),
    };

    match &cli.command {
        Commands::Infer(args) => infer_cmd(&config, args).await,
        Commands::List(args) => list_cmd(&config, args),
        Commands::Resolve(args) => resolve_cmd(&config, args),
    }
}
