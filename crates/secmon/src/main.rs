mod input;
mod theme;
mod ui;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use secmon_core::config::{
    DEFAULT_BUCKET_SECS, DEFAULT_LOGS_PATTERN, DEFAULT_METRICS_PATTERN, DEFAULT_STATUS_COMMAND,
    MIN_REFRESH_MS,
};
use secmon_core::{ControlLoop, MonitorConfig, SimulationConfig, Simulator, Summary};
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const REDRAW_INTERVAL_MS: u64 = 1000;

#[derive(Parser, Debug)]
#[command(name = "secmon")]
#[command(about = "Live dashboard for worker logs and metrics files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[command(flatten)]
    monitor: MonitorArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print totals for a complete metrics file
    Summarize(SummarizeArgs),
}

#[derive(Args, Debug)]
struct SummarizeArgs {
    #[arg(long)]
    input: PathBuf,
    /// Also write <input stem>.summary.csv next to the input
    #[arg(long)]
    csv: bool,
}

#[derive(Args, Debug, Clone)]
struct MonitorArgs {
    /// Glob for worker log files
    #[arg(long, env = "SECMON_LOGS", default_value = DEFAULT_LOGS_PATTERN)]
    logs: String,
    /// Glob for JSONL metrics files
    #[arg(long, env = "SECMON_METRICS", default_value = DEFAULT_METRICS_PATTERN)]
    metrics: String,
    /// Refresh interval in seconds
    #[arg(long, env = "SECMON_REFRESH", default_value_t = 1.0)]
    refresh: f64,
    /// Timeline bucket width in seconds
    #[arg(long, env = "SECMON_BUCKET", default_value_t = DEFAULT_BUCKET_SECS)]
    bucket: u32,
    /// Write header/stats/timeline/logs snapshots here every tick
    #[arg(long, env = "SECMON_SNAPSHOT_DIR")]
    snapshot_dir: Option<PathBuf>,
    /// Stop after this many seconds
    #[arg(long, env = "SECMON_QUIT_AFTER")]
    quit_after: Option<f64>,
    /// Run without the terminal UI
    #[arg(long)]
    headless: bool,
    /// Generate synthetic metrics and logs into a scratch directory
    #[arg(long)]
    simulate: bool,
    #[arg(long)]
    debug: bool,
    /// Write tracing output to this file
    #[arg(long, env = "SECMON_DEBUG_LOG")]
    debug_log: Option<PathBuf>,
    #[arg(long, env = "SECMON_STATUS_COMMAND", default_value = DEFAULT_STATUS_COMMAND)]
    status_command: String,
}

impl MonitorArgs {
    fn to_config(&self) -> MonitorConfig {
        MonitorConfig {
            logs_pattern: self.logs.clone(),
            metrics_pattern: self.metrics.clone(),
            refresh: secs_to_duration(self.refresh)
                .unwrap_or(Duration::from_millis(MIN_REFRESH_MS)),
            bucket_secs: self.bucket,
            snapshot_dir: self.snapshot_dir.clone(),
            quit_after: self.quit_after.and_then(secs_to_duration),
            headless: self.headless,
            simulate: self.simulate,
            status_command: self.status_command.clone(),
        }
        .normalized()
    }
}

fn secs_to_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(Commands::Summarize(args)) = &cli.command {
        return summarize(args);
    }
    init_logging(&cli.monitor)?;
    run(cli.monitor.to_config()).await
}

fn summarize(args: &SummarizeArgs) -> Result<()> {
    if !args.input.exists() {
        bail!("metrics file not found: {}", args.input.display());
    }
    let summary = Summary::from_file(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    if summary.is_empty() {
        bail!("no metrics found in {}", args.input.display());
    }
    println!("{}", summary.report());
    if args.csv {
        let path = summary
            .write_csv(&args.input)
            .context("Failed to write summary CSV")?;
        println!("Wrote summary CSV: {}", path.display());
    }
    Ok(())
}

/// The interactive UI owns the terminal, so tracing goes to a file or
/// nowhere; headless runs log to stderr.
fn init_logging(args: &MonitorArgs) -> Result<()> {
    let level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if let Some(path) = &args.debug_log {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open debug log {}", path.display()))?;
        let _ = builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init();
    } else if args.headless {
        let _ = builder.with_writer(io::stderr).try_init();
    } else {
        let _ = builder.with_writer(io::sink).try_init();
    }
    Ok(())
}

async fn run(mut config: MonitorConfig) -> Result<()> {
    let simulation = if config.simulate {
        let dir = simulation_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create simulation dir {}", dir.display()))?;
        let sim = SimulationConfig::new(&dir);
        sim.redirect(&mut config);
        Some(sim)
    } else {
        None
    };

    let headless = config.headless;
    let mut control = ControlLoop::new(config);
    let simulator = simulation.map(|sim| tokio::spawn(Simulator::new(sim).run(control.stop_signal())));
    control.start();

    let result = if headless {
        run_headless(&control).await
    } else {
        run_interactive(&control).await
    };

    control.shutdown().await;
    if let Some(handle) = simulator {
        if let Err(err) = handle.await {
            debug!(event = "simulator_join_failed", error = %err);
        }
    }
    result
}

fn simulation_dir() -> PathBuf {
    std::env::temp_dir().join(format!("secmon-sim-{}", std::process::id()))
}

async fn run_headless(control: &ControlLoop) -> Result<()> {
    info!(event = "headless_started", snapshot_dir = ?control.config().snapshot_dir);
    tokio::select! {
        _ = control.stopped() => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            control.request_stop();
        }
    }
    Ok(())
}

async fn run_interactive(control: &ControlLoop) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = ui_loop(&mut terminal, control).await;
    restore_terminal(&mut terminal)?;
    result
}

async fn ui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    control: &ControlLoop,
) -> Result<()> {
    let dashboard = control.dashboard();
    let mut events = EventStream::new();
    let mut renders = control.subscribe_renders();
    let mut stop = control.stop_signal();
    let mut redraw = tokio::time::interval(Duration::from_millis(REDRAW_INTERVAL_MS));

    loop {
        let view = dashboard.view();
        terminal.draw(|frame| ui::render(frame, &view))?;
        tokio::select! {
            _ = stop.wait_for(|stopping| *stopping) => break,
            changed = renders.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = redraw.tick() => {}
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if let Some(command) = input::command_for_key(&key) {
                        if control.command(command) {
                            break;
                        }
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => debug!(event = "terminal_event_error", error = %err),
                None => break,
            },
        }
    }
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
