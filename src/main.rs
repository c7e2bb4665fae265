use std::path::PathBuf;
use std::process;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crudbench::aggregate::RoundEvent;
use crudbench::bench;
use crudbench::config::{self, BenchConfig, FileConfig};
use crudbench::display;
use crudbench::store::{self, StoreOptions};
use crudbench::types::{Backend, OutputFormat};

#[derive(Parser)]
#[command(
    name = "crudbench",
    version,
    about = "Time insert/find/update/remove rounds against a storage backend"
)]
struct Cli {
    /// Storage backend (memory, sqlite, sqlite-file)
    backend: String,

    /// Users inserted per round
    #[arg(short, long)]
    count: Option<usize>,

    /// Measured rounds, not counting warm-up
    #[arg(short, long)]
    rounds: Option<usize>,

    /// Leading rounds excluded from the statistics
    #[arg(short, long)]
    warmup: Option<usize>,

    /// Fetch-all invocations per timed find span
    #[arg(long)]
    find_repeat: Option<usize>,

    /// Database file for the sqlite-file backend
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "table")]
    format: OutputFormat,

    #[arg(long)]
    json: bool,

    /// Print every measurement and enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "crudbench=debug" } else { "crudbench=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let backend: Backend = cli.backend.parse()?;

    let file = config::load_file(cli.config.as_deref())?;
    let overrides = FileConfig {
        count: cli.count,
        rounds: cli.rounds,
        warmup: cli.warmup,
        find_repeat: cli.find_repeat,
        db_path: cli.db_path,
    };
    let config = BenchConfig::resolve(file, overrides);
    config.validate()?;

    eprintln!("{}", display::format_header(backend, &config));

    let options = StoreOptions {
        backend,
        db_path: config.db_path.clone(),
    };
    let store = store::open(&options).await?;

    let verbose = cli.verbose;
    let plan = config.plan()?;
    let report = bench::run(store.as_ref(), &config, |event| match event {
        RoundEvent::Started { index, total } => {
            eprint!("{}", display::format_progress(index, total, plan.is_warmup(index)));
        }
        RoundEvent::Finished { measurements, .. } if verbose => {
            eprint!("{}", display::clear_progress(plan.total()));
            for m in measurements {
                eprintln!("{}", display::format_measurement(m));
            }
        }
        RoundEvent::Finished { .. } => {}
    })
    .await;
    eprint!("{}", display::clear_progress(plan.total()));
    let report = report?;

    let output = if cli.json {
        display::format_json(&report, backend, &config, Utc::now())
    } else {
        match cli.format {
            OutputFormat::Json => display::format_json(&report, backend, &config, Utc::now()),
            OutputFormat::Table => display::format_table(&report.summary),
        }
    };

    print!("{}", output);
    if !output.ends_with('\n') {
        println!();
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = tokio::runtime::Runtime::new()
        .map_err(anyhow::Error::from)
        .and_then(|runtime| runtime.block_on(run(cli)));

    if let Err(err) = result {
        eprintln!("{:#}", err);
        process::exit(1);
    }
}
