mod report;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use deeptime_core::scale::clamp_seconds_per_pixel;
use deeptime_core::{LayoutConfig, LayoutCoordinator, RationalScale, ThreadWorker, Viewport};
use deeptime_protocol::Event;
use deeptime_protocol::decimal::parse_decimal;
use num_bigint::BigInt;
use tracing_subscriber::{EnvFilter, fmt};

/// Lay out a deep-time event file and print the resulting frame.
#[derive(Parser, Debug)]
#[command(name = "deeptime")]
#[command(about = "Lay out a deep-time event file and print the resulting frame")]
struct Args {
    /// JSON array of events; times are decimal strings in seconds
    events: PathBuf,

    /// Viewport start in seconds (defaults to the earliest event)
    #[arg(long, value_parser = parse_decimal, allow_hyphen_values = true)]
    start: Option<BigInt>,

    /// Seconds per pixel (defaults to fitting every event on the canvas)
    #[arg(long)]
    spp: Option<f64>,

    /// Canvas width in pixels
    #[arg(long, default_value_t = 1200)]
    width: u32,

    /// Layout config as JSON; fields it leaves out keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Event count at which lane assignment moves to the background worker
    #[arg(long)]
    worker_threshold: Option<usize>,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => LayoutConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => LayoutConfig::default(),
    };
    if let Some(threshold) = args.worker_threshold {
        config.worker_threshold = threshold;
    }

    let events = load_events(&args.events)?;
    let viewport = initial_viewport(&args, &events)?;
    tracing::info!(
        events = events.len(),
        start = %viewport.start,
        spp = viewport.seconds_per_pixel(),
        width = viewport.canvas_width,
        "laying out"
    );

    let wait = config.worker_timeout() + Duration::from_millis(100);
    let mut coordinator = LayoutCoordinator::new(config, viewport);
    if events.len() >= coordinator.config().worker_threshold {
        let worker = ThreadWorker::spawn().context("starting layout worker")?;
        coordinator = coordinator.with_transport(Box::new(worker));
    }

    let total = events.len();
    coordinator.set_events(events);
    for outcome in coordinator.settle(wait) {
        tracing::info!(?outcome, "layout finished");
    }

    let frame = coordinator.frame();
    let mut out = std::io::stdout().lock();
    report::write_report(&mut out, &frame, total, coordinator.state())
        .context("writing report")?;
    out.flush()?;
    Ok(())
}

fn load_events(path: &Path) -> Result<Vec<Event>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing events from {}", path.display()))
}

fn initial_viewport(args: &Args, events: &[Event]) -> Result<Viewport> {
    if args.width == 0 {
        bail!("--width must be at least 1");
    }
    let fitted = Viewport::fit(events, args.width);

    let scale = match args.spp {
        Some(spp) if spp.is_finite() && spp > 0.0 => {
            RationalScale::from_seconds_per_pixel(clamp_seconds_per_pixel(spp))
        }
        Some(spp) => bail!("--spp must be a positive number, got {spp}"),
        None => fitted
            .as_ref()
            .map(|viewport| viewport.scale.clone())
            .unwrap_or_else(|| RationalScale::from_seconds_per_pixel(1.0)),
    };
    let start = args
        .start
        .clone()
        .or_else(|| fitted.map(|viewport| viewport.start))
        .unwrap_or_default();

    Ok(Viewport::new(start, scale, args.width))
}
