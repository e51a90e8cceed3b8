use std::{env, error::Error, fmt, path::PathBuf, str::FromStr, time::Duration};

use simulation::{pool::PoolConfig, registry::DEFAULT_MAILBOX_CAPACITY};

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_FIXTURE_PATH: &str = "./resources/fixture.json";
pub const DEFAULT_STREAM_INTERVAL: Duration = Duration::from_millis(1000);

/// An environment variable that is set but can not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub variable: &'static str,
    pub value: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value '{}' for {}", self.value, self.variable)
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub fixture_path: PathBuf,
    pub max_workers: Option<usize>,
    pub mailbox_capacity: usize,
    pub stream_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_owned(),
            fixture_path: PathBuf::from(DEFAULT_FIXTURE_PATH),
            max_workers: None,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            stream_interval: DEFAULT_STREAM_INTERVAL,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|variable| env::var(variable).ok())
    }

    /// Reads the configuration through `lookup`, falling back to the default
    /// of every variable that is not set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let stream_interval_millis: Option<u64> =
            parse(&lookup, "SIMULATOR_STREAM_INTERVAL_MILLIS")?;
        Ok(Self {
            bind_address: lookup("SIMULATOR_BIND_ADDRESS").unwrap_or(defaults.bind_address),
            fixture_path: lookup("SIMULATOR_FIXTURE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.fixture_path),
            max_workers: parse(&lookup, "SIMULATOR_MAX_WORKERS")?,
            mailbox_capacity: parse(&lookup, "SIMULATOR_MAILBOX_CAPACITY")?
                .unwrap_or(defaults.mailbox_capacity),
            stream_interval: stream_interval_millis
                .map(Duration::from_millis)
                .unwrap_or(defaults.stream_interval),
        })
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_workers: self.max_workers,
        }
    }
}

fn parse<F, T>(lookup: &F, variable: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(variable) {
        None => Ok(None),
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError { variable, value }),
        },
    }
}
