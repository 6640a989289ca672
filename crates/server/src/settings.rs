//! Layered configuration loading
//!
//! Precedence, lowest first: built-in defaults, optional config file,
//! `OVERWATCH__SECTION__KEY` environment variables, command-line flags.

use config::{Config, Environment, File, Map};
use thiserror::Error;

use overwatch_core::{ConfigError, OverwatchConfig};

use crate::cli::Cli;

pub const ENV_PREFIX: &str = "OVERWATCH";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Load configuration from the process environment
pub fn load(cli: &Cli) -> Result<OverwatchConfig, SettingsError> {
    load_with_env(cli, None)
}

/// Load configuration, reading variables from `env` instead of the process
/// environment when given
pub fn load_with_env(
    cli: &Cli,
    env: Option<Map<String, String>>,
) -> Result<OverwatchConfig, SettingsError> {
    let mut builder = Config::builder().add_source(Config::try_from(&OverwatchConfig::default())?);

    if let Some(path) = &cli.config {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("collector.currencies")
            .source(env),
    );

    let mut config: OverwatchConfig = builder.build()?.try_deserialize()?;
    cli.apply(&mut config);
    config.validate()?;

    Ok(config)
}
