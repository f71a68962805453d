use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use geolens_core::StackingPolicy;
use geolens_replay::{Replay, Scenario};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Stacking {
    Displace,
    Fade,
}

impl From<Stacking> for StackingPolicy {
    fn from(value: Stacking) -> Self {
        match value {
            Stacking::Displace => StackingPolicy::Displace,
            Stacking::Fade => StackingPolicy::Fade,
        }
    }
}

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "Replay a sensor scenario through the geolens engine", long_about = None)]
struct Cli {
    /// Scenario JSON file
    scenario: PathBuf,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    /// Follow the wall clock instead of replaying as fast as possible
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Override the scenario's stacking policy
    #[arg(long, value_enum)]
    stacking: Option<Stacking>,

    /// Use the flat-earth bearing approximation
    #[arg(long, default_value_t = false)]
    approximate_bearing: bool,

    /// Maximum number of visible markers
    #[arg(long)]
    max_visible: Option<usize>,

    /// Write records here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::new();
    logger.filter_level(cli.verbose.log_level_filter()).init();

    let mut scenario = Scenario::load(&cli.scenario)?;
    if let Some(stacking) = cli.stacking {
        scenario.config.stacking.policy = stacking.into();
    }
    if cli.approximate_bearing {
        scenario.config.projector.approximate_bearing = true;
    }
    if let Some(max_visible) = cli.max_visible {
        scenario.config.projector.max_visible_annotations = max_visible;
    }

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Cannot create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };

    log::info!(
        "Replaying {} ({} ms at {} ms per tick{})",
        cli.scenario.display(),
        scenario.duration_ms(),
        scenario.tick_ms,
        if cli.realtime { ", real time" } else { "" }
    );

    let mut replay = Replay::new(scenario)?;
    let written = if cli.realtime {
        replay.run_realtime(&mut out).await?
    } else {
        replay.run_simulated(&mut out)?
    };
    out.flush()?;

    log::info!(
        "{} records, {} markers attached at the end",
        written,
        replay.surface().attached()
    );
    Ok(())
}
