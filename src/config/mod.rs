mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{BrokerSettings, Framing, ServerSettings, Settings};

/// Environment variables start with this prefix, e.g. `POPQ_SERVER__PORT`.
pub const ENV_PREFIX: &str = "POPQ";

/// Default configuration file, looked up relative to the working directory.
pub const DEFAULT_CONFIG: &str = "config/default";

/// Loads the configuration from the default file and environment variables.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(DEFAULT_CONFIG)
}

/// Loads the configuration from `name` (any format `config` understands,
/// extension optional) and environment variables, then merges the result
/// over `Settings::default()`. A missing file is not an error.
pub fn load_config_from(name: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(name).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}

#[cfg(test)]
mod tests;
