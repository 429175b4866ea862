//! SerialPlot - headless entry point
//!
//! Loads a config, optionally replays a saved raw log, optionally records
//! from the configured serial port until Enter (or end of input), then logs
//! a per-label summary and optionally saves the raw log.

use anyhow::{bail, Context};
use clap::Parser;
use crossbeam_channel::{bounded, Receiver};
use serialplot_rs::{
    config::{self, AppConfig},
    session::default_save_name,
    transport::list_ports,
    PipelineController, PipelineEvent, ScriptEngine,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// SerialPlot - record, replay and save serial telemetry
#[derive(Debug, Parser)]
#[command(name = "serialplot-rs")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the one in the app data directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Replay a saved raw log before anything else
    #[arg(long, value_name = "FILE")]
    load: Option<PathBuf>,

    /// Save the raw log on exit; without FILE a timestamped name is used
    #[arg(long, value_name = "FILE", num_args = 0..=1)]
    save: Option<Option<PathBuf>>,

    /// Record from the configured port until Enter or end of input
    #[arg(long)]
    record: bool,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

/// Returns the appender guard, which must outlive logging
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let (file_layer, guard) = match config::ensure_app_data_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "serialplot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,serialplot_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Fires once when stdin yields a line or reaches EOF
fn stdin_signal() -> Receiver<()> {
    let (tx, rx) = bounded(1);
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        let _ = tx.send(());
    });
    rx
}

fn record(controller: &mut PipelineController) -> anyhow::Result<()> {
    controller.start_recording_configured()?;
    println!("Recording, press Enter to stop");
    let stop = stdin_signal();

    loop {
        // The lease ends before the failure is reported, so check first
        let recording = controller.is_recording();
        for event in controller.poll_events() {
            match event {
                PipelineEvent::ConnectionStatus {
                    message, success, ..
                } => {
                    if success {
                        tracing::info!("{}", message);
                    } else {
                        tracing::error!("{}", message);
                    }
                }
                PipelineEvent::Stats(stats) => tracing::debug!(
                    "{} lines, {} samples, {:.1}% rejected",
                    stats.lines_received,
                    stats.samples_decoded,
                    stats.reject_rate()
                ),
                _ => {}
            }
        }
        if !recording {
            bail!("Recording ended unexpectedly");
        }
        if stop.recv_timeout(Duration::from_millis(100)).is_ok() {
            break;
        }
    }

    controller.stop_recording()?;
    Ok(())
}

fn log_summary(controller: &PipelineController) {
    let store = controller.store();
    tracing::info!("{} raw lines", store.raw_log_len());
    for label in store.labels() {
        let series = store.snapshot(&label);
        match (series.timestamps.last(), series.values.last()) {
            (Some(ts), Some(value)) => tracing::info!(
                "  {}: {} samples, last {} @ {}",
                label,
                series.len(),
                value,
                ts
            ),
            _ => tracing::info!("  {}: no samples", label),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let _guard = init_logging();

    if args.list_ports {
        for port in list_ports() {
            println!("{}", port);
        }
        return Ok(());
    }

    tracing::info!("Starting SerialPlot");

    let app_config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_or_default(),
    };
    let pipeline_config = app_config
        .compile(&ScriptEngine::new())
        .context("Invalid configuration")?;

    let mut controller = PipelineController::with_serial(pipeline_config)?;

    if let Some(path) = &args.load {
        let summary = controller.load_file(path)?;
        tracing::info!(
            "Loaded {} lines ({} rejected)",
            summary.lines,
            summary.rejected
        );
    }

    if args.record {
        record(&mut controller)?;
    }

    log_summary(&controller);

    if let Some(path) = args.save {
        let path = path.unwrap_or_else(default_save_name);
        controller
            .save_raw_log(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        println!("Saved {}", path.display());
    }

    tracing::info!("Shutting down...");
    controller.shutdown();
    Ok(())
}
