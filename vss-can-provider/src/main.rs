//! VSS CAN Provider
//!
//! Command-line application that forwards VSS actuator targets onto a CAN
//! bus. It uses the vss-can-mapper library and adds:
//! - Configuration (provider.toml plus command-line overrides)
//! - The update source (JSON-lines replay of server batches)
//! - The frame sink (candump log format)
//! - The provider loop and graceful shutdown

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use vss_can_mapper::{FrameCodec, FrameDefaults, MappingTable};

mod config;
mod provider;
mod shutdown;
mod sink;
mod source;

use config::{AppConfig, Overrides};
use provider::Provider;
use sink::CandumpSink;
use source::JsonLinesSource;

/// VSS CAN Provider - Write VSS actuator targets to CAN frames
#[derive(Parser, Debug)]
#[command(name = "vss-can-provider")]
#[command(about = "Map VSS actuator targets onto CAN frames described by a DBC file", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (provider.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to DBC file
    #[arg(long, value_name = "FILE")]
    dbc: Option<PathBuf>,

    /// Path to VSS to DBC mapping file (JSON)
    #[arg(short, long, value_name = "FILE")]
    mapping: Option<PathBuf>,

    /// JSON-lines file with update batches (default: stdin)
    #[arg(short, long, value_name = "FILE")]
    updates: Option<PathBuf>,

    /// CAN interface name for the frame log
    #[arg(short, long, value_name = "NAME")]
    interface: Option<String>,

    /// Output file for the frame log (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("VSS CAN Provider v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using mapper library v{}", vss_can_mapper::VERSION);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run(args));
    // A pending stdin read would otherwise keep the runtime alive
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}

async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    let settings = config.resolve(Overrides {
        dbc_file: args.dbc,
        mapping_file: args.mapping,
        updates: args.updates,
        interface: args.interface,
        output: args.output,
    })?;

    let codec = FrameCodec::from_dbc_file(&settings.dbc_file)
        .with_context(|| format!("Failed to load DBC: {:?}", settings.dbc_file))?;
    let stats = codec.database_stats();
    log::info!(
        "Signal database: {} messages, {} signals",
        stats.num_messages,
        stats.num_signals
    );

    log::info!("Using mapping: {:?}", settings.mapping_file);
    let table = MappingTable::from_file(&settings.mapping_file, &codec)
        .with_context(|| format!("Failed to load mapping: {:?}", settings.mapping_file))?;
    if table.is_empty() {
        log::warn!("Mapping contains no signals, nothing will be sent");
    }

    let mut source = match settings.updates {
        Some(path) => JsonLinesSource::from_file(path),
        None => JsonLinesSource::stdin(),
    };
    let mut sink = match &settings.output {
        Some(path) => CandumpSink::create(path, settings.interface.clone()).await?,
        None => CandumpSink::stdout(settings.interface.clone()),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(shutdown::watch_signals(shutdown_tx));

    let mut provider = Provider::new(codec, table, FrameDefaults::builtin());
    log::info!(
        "Starting CAN provider for {} mapped VSS paths",
        provider.table().paths().len()
    );
    let stats = provider.run(&mut source, &mut sink, shutdown_rx).await?;

    log::info!(
        "Processed {} update batches ({} failed), sent {} frames",
        stats.batches,
        stats.failed_batches,
        stats.frames_sent
    );
    Ok(())
}

/// Initialize logging based on verbosity level
///
/// `LOG_LEVEL` (env_logger filter syntax, e.g. `info,vss_can_mapper::mapping=debug`)
/// takes precedence over the command-line flags.
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = Builder::new();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("LOG_LEVEL") {
        builder.parse_filters(&filters);
    }

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{} {}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();
}
