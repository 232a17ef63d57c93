mod cli;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use cli::{Cli, Commands};
use gaze_trace::data::filter::IndexRange;
use gaze_trace::{AnalysisConfig, AnalysisError, Session};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = match &cli.config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    match cli.command {
        Commands::Heatmap { file, output } => heatmap(&file, output, config),
        Commands::Trail { file, max_distance } => trail(&file, max_distance, config),
        Commands::Cull {
            file,
            output,
            from,
            to,
        } => cull(&file, &output, from.zip(to), config),
        Commands::Replay {
            file,
            tick,
            duration,
            faster,
        } => replay(&file, tick, duration, faster, config),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn open(file: &Path, config: AnalysisConfig) -> Result<Session> {
    Session::load(file, config).with_context(|| format!("failed to load {}", file.display()))
}

fn heatmap(file: &Path, output: Option<PathBuf>, config: AnalysisConfig) -> Result<()> {
    let mut session = open(file, config)?;
    let output = output.unwrap_or_else(|| file.with_extension("heatmap.csv"));
    let report = session.score()?;
    println!(
        "{} points: {} clustered, {} below threshold, max neighbours {}",
        report.scores.len(),
        report.clustered,
        report.below_threshold,
        report.max_neighbor_count
    );
    session
        .save_scored(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(())
}

fn trail(file: &Path, max_distance: Option<f64>, mut config: AnalysisConfig) -> Result<()> {
    config.trail.enabled = true;
    if let Some(max) = max_distance {
        config.trail.close_only = true;
        config.trail.max_distance = max;
    }
    let session = open(file, config)?;
    let segments = session.trail()?;
    println!("{}", serde_json::to_string_pretty(&segments)?);
    Ok(())
}

fn cull(
    file: &Path,
    output: &Path,
    range: Option<(usize, usize)>,
    mut config: AnalysisConfig,
) -> Result<()> {
    if let Some((from, to)) = range {
        config.cull.range = Some(IndexRange { from, to });
    }
    let session = open(file, config)?;
    session
        .save_culled(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "kept {} of {} records",
        session.culled().len(),
        session.dataset().len()
    );
    Ok(())
}

fn replay(
    file: &Path,
    tick: f64,
    duration: Option<f64>,
    faster: u32,
    config: AnalysisConfig,
) -> Result<()> {
    if !(tick.is_finite() && tick > 0.0) {
        bail!("tick must be a positive number of seconds, got {tick}");
    }
    let session = open(file, config)?;
    let mut player = session.replayer()?;
    if player.is_empty() {
        return Err(AnalysisError::EmptyDataset).context(format!("cannot replay {}", file.display()));
    }
    for _ in 0..faster {
        player.speed_up();
    }
    info!("replaying {} rows at {:.2}x", player.len(), player.speed());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Some(frame) = player.frame() {
        writeln!(out, "{}", serde_json::to_string(&frame)?)?;
    }
    player.toggle();
    let mut last = player.cursor();
    let mut played = 0.0;
    while let Some(frame) = player.advance(tick) {
        played += tick;
        if frame.index != last {
            last = frame.index;
            writeln!(out, "{}", serde_json::to_string(&frame)?)?;
        }
        if duration.is_some_and(|limit| played >= limit) {
            break;
        }
    }
    out.flush()?;
    Ok(())
}
