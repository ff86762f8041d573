//! gesturectl - drive a desktop pointer from hand landmarks.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use gesturectl::backend::{self, BackendKind};
use gesturectl::gesture_loop::{JsonLinesObserver, SexpLinesObserver};
use gesturectl::tracking::source::JsonLinesProducer;
use gesturectl::tracking::{LandmarkSource, ReplaySource, ThreadedSource};
use gesturectl::{GestureConfig, GestureService};

/// Set by the signal handler, polled by the service loop.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[command(name = "gesturectl", about = "Hand-gesture desktop control")]
struct Cli {
    /// Backend to use: local or remote
    #[arg(long, default_value = "local")]
    backend: String,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay landmark frames from a JSON-lines file (default: JSON lines on stdin)
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Write one JSON snapshot per poll to stdout
    #[arg(long, conflicts_with = "sexp")]
    json: bool,

    /// Write one s-expression snapshot per poll to stdout
    #[arg(long)]
    sexp: bool,

    /// Screen resolution as WxH (e.g. 2560x1440)
    #[arg(long)]
    resolution: Option<String>,

    /// Target poll rate
    #[arg(long)]
    fps: Option<f64>,

    /// Halve the poll rate
    #[arg(long)]
    performance: bool,

    /// Gesture hold time in milliseconds
    #[arg(long)]
    hold_ms: Option<u64>,

    /// Container name for the remote backend
    #[arg(long)]
    container: Option<String>,

    /// Exit after N seconds (testing)
    #[arg(long)]
    exit_after: Option<u64>,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("gesturectl {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Logs go to stderr so snapshot output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gesturectl=info".into()),
        )
        .init();

    info!("gesturectl v{} starting", env!("CARGO_PKG_VERSION"));

    let kind = match cli.backend.as_str() {
        "local" => BackendKind::Local,
        "remote" => BackendKind::Remote,
        other => bail!("unknown backend: {other}. Use: local or remote"),
    };

    let config = load_config(&cli)?;
    let source = open_source(&cli)?;
    let backend = backend::build(kind, &config);
    info!(backend = kind.as_str(), source = source.name(), "pipeline assembled");

    let mut service = GestureService::new(&config, source, backend)
        .context("invalid configuration")?
        .with_exit_after(cli.exit_after.map(Duration::from_secs));
    if cli.json {
        service.add_observer(Box::new(JsonLinesObserver::new(io::stdout())));
    } else if cli.sexp {
        service.add_observer(Box::new(SexpLinesObserver::new(io::stdout())));
    }

    install_signal_handlers();
    let summary = service.run(&SHUTDOWN_REQUESTED);
    info!(
        reason = summary.reason.as_str(),
        frames = summary.frames,
        p50_ms = summary.timing.total_p50,
        p99_ms = summary.timing.total_p99,
        missed_pct = summary.timing.missed_pct,
        "gesturectl exiting"
    );
    Ok(())
}

/// Config file (or defaults) with CLI overrides applied, then validated.
fn load_config(cli: &Cli) -> anyhow::Result<GestureConfig> {
    let mut config = match &cli.config {
        Some(path) => GestureConfig::load(path)?,
        None => GestureConfig::default(),
    };
    if let Some(res) = &cli.resolution {
        let Some((w, h)) = GestureConfig::parse_resolution(res) else {
            bail!("invalid resolution {res:?}, expected WxH");
        };
        config.screen_width = w;
        config.screen_height = h;
    }
    if let Some(fps) = cli.fps {
        config.target_fps = fps;
    }
    if cli.performance {
        config.performance_mode = true;
    }
    if let Some(ms) = cli.hold_ms {
        config.hold_time_ms = ms;
    }
    if let Some(name) = &cli.container {
        config.remote.container = name.clone();
    }
    config.validate()?;
    Ok(config)
}

fn open_source(cli: &Cli) -> anyhow::Result<Box<dyn LandmarkSource>> {
    match &cli.replay {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open replay {}", path.display()))?;
            Ok(Box::new(ReplaySource::new(BufReader::new(file))))
        }
        None => {
            let producer = JsonLinesProducer::new(BufReader::new(io::stdin()));
            Ok(Box::new(ThreadedSource::spawn("stdin", producer)))
        }
    }
}

/// Install signal handlers for graceful shutdown (SIGTERM, SIGINT).
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}
