//! lumafx command line
//!
//! `apply` runs one operator on a file (or stdin), `list` prints the operator
//! table and `serve` starts the HTTP front end.

use super::config::CliConfigBuilder;
use crate::{
    config::ServiceConfig,
    inference::BackendType,
    models::ModelRegistry,
    operators::{OperatorRegistry, SEED_PARAM},
    processor::FxProcessor,
    services::OutputFormatHandler,
    tracing_config::{init_cli_tracing, TracingFormat},
    types::OutputFormat,
};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Image stylization and enhancement filters
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "lumafx")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console, global = true)]
    pub log_format: CliLogFormat,

    /// JSON configuration file; flags below override its values
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Inference backend for the learned operators (onnx, tract)
    #[arg(long, global = true)]
    pub backend: Option<BackendType>,

    /// Directory or file searched for model files (repeatable)
    #[arg(long = "model-dir", value_name = "PATH", global = true)]
    pub model_dirs: Vec<PathBuf>,

    /// JPEG quality (1-100)
    #[arg(long, global = true)]
    pub jpeg_quality: Option<u8>,

    /// Inference threads (0 = auto-detect)
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply one operator to an image
    Apply {
        /// Operator name or alias (see `lumafx list`)
        #[arg(long = "op", value_name = "NAME")]
        operator: String,

        /// Operator parameter (repeatable)
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        /// Seed for the randomized operators
        #[arg(long)]
        seed: Option<u64>,

        /// Output container [default: from the output extension, else by content]
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Input image (use "-" for stdin)
        #[arg(value_name = "INPUT")]
        input: String,

        /// Output file (use "-" for stdout)
        #[arg(short, long, value_name = "OUTPUT", default_value = "-")]
        output: String,
    },

    /// List operators and their parameters
    List {
        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve the HTTP API
    Serve {
        /// Address to listen on (host:port)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => Self::Console,
            CliLogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => Self::Json,
        }
    }
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{s}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose, cli.log_format.into()).context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    debug!(?config, "Configuration resolved");

    match &cli.command {
        Command::Apply {
            operator,
            params,
            seed,
            format,
            input,
            output,
        } => apply(config, operator, params, *seed, *format, input, output),
        Command::List { json } => list(*json),
        Command::Serve { .. } => serve(config).await,
    }
}

fn apply(
    config: ServiceConfig,
    operator: &str,
    params: &[(String, String)],
    seed: Option<u64>,
    format: Option<OutputFormat>,
    input: &str,
    output: &str,
) -> Result<()> {
    let op = OperatorRegistry::new().get(operator)?;

    // Only the learned operators pay for model loading
    let processor = if op.required_model().is_some() {
        FxProcessor::from_config(config)?
    } else {
        FxProcessor::new(config, Arc::new(ModelRegistry::empty()))?
    };

    let mut raw: Vec<(&str, String)> = params.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    if let Some(seed) = seed {
        raw.push((SEED_PARAM, seed.to_string()));
    }

    let bytes = if input == "-" {
        info!("Reading image from stdin");
        read_stdin()?
    } else {
        std::fs::read(input).with_context(|| format!("Failed to read input image '{input}'"))?
    };

    let preferred = format.or_else(|| {
        (output != "-")
            .then(|| OutputFormatHandler::from_path(Path::new(output)).ok())
            .flatten()
    });

    let start = Instant::now();
    let encoded = processor
        .process_with_format(&bytes, op.name(), raw.iter().map(|(k, v)| (*k, v.as_str())), preferred)
        .with_context(|| format!("Failed to apply '{op}'"))?;

    if output == "-" {
        write_stdout(&encoded.bytes)?;
    } else {
        std::fs::write(output, &encoded.bytes).with_context(|| format!("Failed to write output image '{output}'"))?;
    }

    info!(
        "✅ {op}: {}x{} {} ({} bytes) in {:.2}s",
        encoded.dimensions.0,
        encoded.dimensions.1,
        encoded.format,
        encoded.bytes.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn list(json: bool) -> Result<()> {
    let registry = OperatorRegistry::new();
    let descriptors = registry.describe();

    if json {
        let text = serde_json::to_string_pretty(&descriptors).context("Failed to serialize operator list")?;
        println!("{text}");
        return Ok(());
    }

    println!("🎨 Operators");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for d in &descriptors {
        let mut title = d.name.to_string();
        if !d.aliases.is_empty() {
            title.push_str(&format!(" ({})", d.aliases.join(", ")));
        }
        if d.randomized {
            title.push_str(" [seedable]");
        }
        println!("• {title}: {}", d.description);
        for spec in d.params {
            println!(
                "    └─ {}={} [{}..{}] {}",
                spec.name, spec.default, spec.min, spec.max, spec.description
            );
        }
    }
    println!("\n💡 Example:");
    println!("  lumafx apply --op sharpen -p amount=0.8 input.jpg -o output.jpg");
    Ok(())
}

async fn serve(config: ServiceConfig) -> Result<()> {
    #[cfg(feature = "server")]
    {
        let processor = FxProcessor::from_config(config).context("Failed to create processor")?;
        crate::server::serve(Arc::new(processor)).await
    }
    #[cfg(not(feature = "server"))]
    {
        let _ = config;
        anyhow::bail!("lumafx was built without the \"server\" feature")
    }
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin()
        .read_to_end(&mut buffer)
        .context("Failed to read image data from stdin")?;

    if buffer.is_empty() {
        anyhow::bail!("No data received from stdin");
    }

    Ok(buffer)
}

fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(data)
        .context("Failed to write image data to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}
