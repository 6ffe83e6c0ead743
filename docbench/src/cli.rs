//! The command line interface of docbench.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use argh::FromArgs;

use crate::config::{Config, Overrides};
use crate::engine::Distribution;
use crate::http::HttpRemote;
use crate::{bench, observability};

/// Load benchmark for Elasticsearch-compatible document services.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    /// base URL of the document service
    #[argh(option)]
    pub url: Option<String>,

    /// name of the index
    #[argh(option)]
    pub index: Option<String>,

    /// document type, for services that still use typed URLs
    #[argh(option, long = "type")]
    pub doc_type: Option<String>,

    /// number of documents to create or searches to run
    #[argh(option)]
    pub count: Option<usize>,

    /// number of concurrent workers
    #[argh(option)]
    pub concurrency: Option<usize>,

    /// create documents in batches of this size with the bulk API
    #[argh(option)]
    pub bulk_size: Option<usize>,

    /// how work is distributed to workers: `round_robin` or `shared_cursor`
    #[argh(option)]
    pub distribution: Option<Distribution>,

    /// path of the log of created records
    #[argh(option)]
    pub record_log: Option<PathBuf>,

    /// log the requests of the client
    #[argh(switch, short = 'v')]
    pub verbose: bool,

    #[argh(subcommand)]
    pub command: Command,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            url: self.url.clone(),
            index: self.index.clone(),
            doc_type: self.doc_type.clone(),
            count: self.count,
            concurrency: self.concurrency,
            bulk_size: self.bulk_size,
            distribution: self.distribution,
            record_log: self.record_log.clone(),
            verbose: self.verbose,
        }
    }
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Setup(SetupCommand),
    Create(CreateCommand),
    Search(SearchCommand),
    Version(VersionCommand),
}

/// provision the index and its mapping
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "setup")]
struct SetupCommand {}

/// create documents and append them to the record log
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "create")]
struct CreateCommand {}

/// search for documents sampled from the record log
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "search")]
struct SearchCommand {}

/// print the docbench version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("docbench {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref(), &args.overrides())?;
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("docbench-rt")
        .enable_all()
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    runtime.block_on(run(args.command, config))
}

async fn run(command: Command, config: Config) -> Result<()> {
    let (client, index) = bench::connect(&config)?;

    let report = match command {
        Command::Setup(SetupCommand {}) => {
            let info = bench::setup(&client, &index)
                .await
                .context("failed to set up index")?;
            println!(
                "Name: {}, Cluster Name: {}, Version: {}",
                info.name, info.cluster_name, info.version.number
            );
            return Ok(());
        }
        Command::Create(CreateCommand {}) => {
            let remote = Arc::new(HttpRemote::new(client, index));
            bench::create(&config, remote).await?
        }
        Command::Search(SearchCommand {}) => {
            let remote = Arc::new(HttpRemote::new(client, index));
            bench::search(&config, remote).await?
        }
        Command::Version(VersionCommand {}) => unreachable!(),
    };

    report.print(config.rate_unit);
    Ok(())
}
