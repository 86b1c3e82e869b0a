//! Merge the configuration file with command line overrides

use crate::cli::main_impl::{Cli, Command};
use crate::{
    config::{ServiceConfig, ServiceConfigBuilder},
    utils::NumericValidator,
};
use anyhow::{Context, Result};

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build a `ServiceConfig` from `--config` (or the defaults) plus flags
    ///
    /// `--model-dir` entries are searched before the file's model paths.
    pub(crate) fn from_cli(cli: &Cli) -> Result<ServiceConfig> {
        let mut base = match &cli.config {
            Some(path) => ServiceConfig::from_file(path)
                .with_context(|| format!("Failed to load config file '{}'", path.display()))?,
            None => ServiceConfig::default(),
        };

        let file_paths = std::mem::take(&mut base.model_paths);
        let mut builder = ServiceConfigBuilder::from_config(base);
        for dir in cli.model_dirs.iter().chain(file_paths.iter()) {
            builder = builder.model_path(dir);
        }

        if let Some(quality) = cli.jpeg_quality {
            builder = builder.jpeg_quality(quality);
        }
        if let Some(backend) = cli.backend {
            builder = builder.backend(backend);
        }
        if let Some(threads) = cli.threads {
            builder = builder.inference_threads(threads);
        }
        if let Command::Serve { bind: Some(addr) } = &cli.command {
            builder = builder.bind_address(addr.as_str());
        }

        builder.build().context("Invalid configuration")
    }

    /// Reject flag values the builder would otherwise clamp silently
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if let Some(quality) = cli.jpeg_quality {
            NumericValidator::validate_quality(quality).context("Invalid --jpeg-quality")?;
        }
        if let Some(threads) = cli.threads {
            NumericValidator::validate_thread_count(threads).context("Invalid --threads")?;
        }
        if let Some(path) = &cli.config {
            if !path.is_file() {
                anyhow::bail!("Config file '{}' does not exist", path.display());
            }
        }
        Ok(())
    }
}
