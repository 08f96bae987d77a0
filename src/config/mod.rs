//! Configuration loading for a benchmark run.
//!
//! Values are layered: built-in defaults, then `config/default.*` if present,
//! then `POPBENCH_*` environment variables (`__` separates sections, e.g.
//! `POPBENCH_LOAD__COUNT=500`). The CLI applies its overrides on top of the
//! result before `Settings::validate` runs.

mod settings;

use config::{Config, ConfigError, Environment, File};

use crate::utils::BenchError;

pub use settings::{
    BrokerSettings, LoadSettings, OutputFormat, OutputSettings, PartialBrokerSettings,
    PartialLoadSettings, PartialOutputSettings, PartialRemoteSettings, PartialSettings,
    RemoteSettings, Settings,
};

pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Same as [`load_config`] with an explicit base file name (extension optional).
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("POPBENCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}

impl Settings {
    /// Reject configurations no benchmark can run with.
    pub fn validate(&self) -> Result<(), BenchError> {
        let load = &self.load;
        if load.topic_count < 1 {
            return Err(BenchError::invalid(format!(
                "number of topics should be >= 1, given: {}",
                load.topic_count
            )));
        }
        if load.publishers < 1 {
            return Err(BenchError::invalid(format!(
                "number of publishers should be >= 1, given: {}",
                load.publishers
            )));
        }
        if load.subscribers < 1 {
            return Err(BenchError::invalid(format!(
                "number of subscribers should be >= 1, given: {}",
                load.subscribers
            )));
        }
        if load.count < 1 {
            return Err(BenchError::invalid(format!(
                "messages count should be >= 1, given: {}",
                load.count
            )));
        }
        if self.broker.qos > 2 {
            return Err(BenchError::invalid(format!(
                "qos must be 0, 1 or 2, given: {}",
                self.broker.qos
            )));
        }
        match (&self.broker.client_cert, &self.broker.client_key) {
            (Some(_), None) => Err(BenchError::invalid("private client key path missing")),
            (None, Some(_)) => Err(BenchError::invalid("certificate path missing")),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests;
