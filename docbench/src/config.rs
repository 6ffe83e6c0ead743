//! Configuration for docbench.
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Command-line flags
//! 2. Environment variables (prefixed with `DOCBENCH__`)
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! # Environment Variables
//!
//! Environment variables use `DOCBENCH__` as a prefix, for example:
//!
//! - `DOCBENCH__URL=http://search:9200` sets the service URL
//! - `DOCBENCH__CONCURRENCY=32` sets the number of workers
//!
//! # YAML Configuration File
//!
//! ```yaml
//! url: http://search:9200
//! index: bench
//! count: 100000
//! concurrency: 32
//! bulk_size: 500
//! distribution: shared_cursor
//! timeout: 30s
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::engine::Distribution;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "DOCBENCH__";

/// Main configuration struct for docbench.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Base URL of the document service.
    ///
    /// # Default
    ///
    /// `http://localhost:9200`
    pub url: String,

    /// Name of the index that documents are written to and searched in.
    ///
    /// # Default
    ///
    /// `docbench`
    pub index: String,

    /// Optional document type for services that still use typed URLs.
    pub doc_type: Option<String>,

    /// Number of documents to create, or number of searches to run.
    ///
    /// # Default
    ///
    /// `1000`
    pub count: usize,

    /// Number of concurrent workers.
    ///
    /// # Default
    ///
    /// `10`
    pub concurrency: usize,

    /// Creates documents in batches of this size with the bulk API when set.
    pub bulk_size: Option<usize>,

    /// How work items are distributed to workers.
    ///
    /// # Default
    ///
    /// `round_robin`
    pub distribution: Distribution,

    /// Path of the log of successfully created records, sampled by `search`.
    ///
    /// # Default
    ///
    /// `records.txt`
    pub record_log: PathBuf,

    /// Timeout of individual HTTP requests.
    ///
    /// # Default
    ///
    /// `60s`
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Time unit of the reported rate.
    ///
    /// # Default
    ///
    /// `1s`, reporting queries per second.
    #[serde(with = "humantime_serde")]
    pub rate_unit: Duration,

    /// Shows a progress bar while a run is in progress.
    ///
    /// # Default
    ///
    /// `true`
    pub progress: bool,

    /// Logs the requests of the client.
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_owned(),
            index: "docbench".to_owned(),
            doc_type: None,
            count: 1000,
            concurrency: 10,
            bulk_size: None,
            distribution: Distribution::default(),
            record_log: PathBuf::from("records.txt"),
            timeout: Duration::from_secs(60),
            rate_unit: Duration::from_secs(1),
            progress: true,
            verbose: false,
        }
    }
}

/// Values given on the command line, overriding all other sources.
#[derive(Debug, Default, Serialize)]
pub struct Overrides {
    /// Overrides [`Config::url`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Overrides [`Config::index`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Overrides [`Config::doc_type`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    /// Overrides [`Config::count`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Overrides [`Config::concurrency`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    /// Overrides [`Config::bulk_size`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulk_size: Option<usize>,
    /// Overrides [`Config::distribution`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
    /// Overrides [`Config::record_log`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_log: Option<PathBuf>,
    /// Enables [`Config::verbose`] when set.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub verbose: bool,
}

impl Config {
    /// Loads configuration from defaults, the optional YAML file, the environment and the command
    /// line, in this order.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if any source contains
    /// invalid values.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
            .extract()?;

        Ok(config)
    }

    /// Checks the constraints between configuration values.
    ///
    /// Runs before any network I/O so that invalid invocations fail fast.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.index.is_empty(), "index must be specified");
        ensure!(self.concurrency > 0, "concurrency must be greater than 0");
        ensure!(
            self.count >= self.concurrency,
            "count must be greater than or equal to concurrency"
        );
        ensure!(self.bulk_size != Some(0), "bulk size must be greater than 0");
        ensure!(!self.rate_unit.is_zero(), "rate unit must be greater than 0");
        Ok(())
    }
}
