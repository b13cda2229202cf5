//! linewatch - production line device analytics
//!
//! One process runs one monitor for one device, sensor or machine.
//!
//! # Usage
//!
//! ```bash
//! # Electrical analytics from the simulator, printed as line protocol
//! simulation electrical | linewatch electrical --stdin --dry-run
//!
//! # Vibration analytics from a TCP line server into InfluxDB
//! linewatch vibration --tcp gateway:9000
//!
//! # Replay a capture at 50 ms per message
//! linewatch electrical --replay capture.jsonl --speed-ms 50
//! ```
//!
//! # Environment Variables
//!
//! - `LINEWATCH_CONFIG`: path to the TOML config file
//! - `LINE_NAME`, `MACHINE_NAME`, `DEVICE_NAME`, `SENSOR_NAME`: identity
//! - `MODEL_WINDOW_SIZE`, `ANOMALY_LIST_SIZE`, `Z_SCORE_THRESHOLD`, ...: detection
//! - `INFLUX_HOST`, `INFLUX_BUCKET_NAME`, `INFLUX_ORG`, `INFLUX_TOKEN`, ...: output
//! - `RUST_LOG`: logging level (default: info)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use linewatch::acquisition::{MessageSource, ReplaySource, StdinSource, TcpSource};
use linewatch::config::{AppConfig, MonitorKind};
use linewatch::pipeline::{
    ElectricalMonitor, InrushSettings, LoopStats, Monitor, ProcessingLoop, StateMonitor,
    VibrationMonitor,
};
use linewatch::sink::{InfluxSink, PointSink, WriterSink};

/// How long the processor gets to flush after Ctrl+C.
const SHUTDOWN_GRACE_SECS: u64 = 10;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "linewatch")]
#[command(about = "Adaptive anomaly detection for production line sensors")]
#[command(version)]
struct CliArgs {
    #[command(subcommand)]
    monitor: MonitorCommand,

    /// Read JSON payloads from stdin, one per line (default input)
    #[arg(long, global = true, conflicts_with_all = ["tcp", "replay"])]
    stdin: bool,

    /// Read line-delimited JSON payloads from a TCP server
    #[arg(long, global = true, value_name = "HOST:PORT", conflicts_with = "replay")]
    tcp: Option<String>,

    /// Replay a file of JSON payloads, one per line
    #[arg(long, global = true, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Delay between replayed messages in milliseconds (0 = no delay)
    #[arg(long, global = true, default_value = "0")]
    speed_ms: u64,

    /// Print line protocol to stdout instead of writing to InfluxDB
    #[arg(long, global = true)]
    dry_run: bool,

    /// Config file (default: $LINEWATCH_CONFIG, then ./linewatch.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum MonitorCommand {
    /// Three-phase current analytics for one device
    Electrical,
    /// Vibration RMS analytics for one sensor
    Vibration,
    /// Pass-through of generic machine states
    States,
}

impl MonitorCommand {
    fn kind(self) -> MonitorKind {
        match self {
            Self::Electrical => MonitorKind::Electrical,
            Self::Vibration => MonitorKind::Vibration,
            Self::States => MonitorKind::States,
        }
    }
}

// ============================================================================
// Startup
// ============================================================================

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // stdout is reserved for --dry-run output
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_monitor(kind: MonitorKind, config: &AppConfig) -> Result<Box<dyn Monitor>> {
    let id = &config.identity;
    let spec = config.detector_spec(kind);

    let monitor: Box<dyn Monitor> = match kind {
        MonitorKind::Electrical => Box::new(
            ElectricalMonitor::new(
                &id.line_name,
                &id.machine_name,
                &id.device_name,
                &spec,
                InrushSettings {
                    peak_height: config.inrush.peak_height,
                    peak_number: config.inrush.peak_number,
                },
            )
            .context("Failed to build electrical detectors")?,
        ),
        MonitorKind::Vibration => Box::new(
            VibrationMonitor::new(&id.line_name, &id.machine_name, &id.sensor_name, &spec)
                .context("Failed to build vibration detector")?,
        ),
        MonitorKind::States => Box::new(StateMonitor::new(&id.line_name, &id.machine_name)),
    };

    if kind != MonitorKind::States {
        info!(
            policy = %spec.policy,
            model_size = spec.model_size,
            anomaly_list_size = spec.anomaly_list_size,
            z_score_threshold = spec.z_score_threshold,
            sigma_floor_limit = spec.sigma_floor_limit,
            "Detection configured"
        );
    }
    Ok(monitor)
}

async fn open_source(args: &CliArgs) -> Result<Box<dyn MessageSource>> {
    if let Some(address) = &args.tcp {
        let (host, port) = TcpSource::parse_address(address)?;
        info!("📥 Input: TCP line server at {}", address);
        let source = TcpSource::connect(&host, port)
            .await
            .with_context(|| format!("Failed to connect to {address}"))?;
        return Ok(Box::new(source));
    }

    if let Some(path) = &args.replay {
        info!(
            "📥 Input: replay of {} ({} ms between messages)",
            path.display(),
            args.speed_ms
        );
        let source = ReplaySource::from_file(path, args.speed_ms).await?;
        return Ok(Box::new(source));
    }

    info!(
        explicit = args.stdin,
        "📥 Input: stdin (JSON payloads, one per line)"
    );
    Ok(Box::new(StdinSource::new()))
}

fn build_sink(config: &AppConfig, dry_run: bool) -> Result<Box<dyn PointSink>> {
    if dry_run {
        info!("📤 Output: line protocol on stdout (dry run)");
        return Ok(Box::new(WriterSink::stdout()));
    }

    let settings = config.influx_settings();
    info!(
        url = %settings.url,
        bucket = %settings.bucket,
        batch_size = settings.batch_size,
        "📤 Output: InfluxDB"
    );
    let sink = InfluxSink::new(settings).context("Failed to create InfluxDB writer")?;
    Ok(Box::new(sink))
}

// ============================================================================
// Supervisor
// ============================================================================

/// Wait for the processor; on Ctrl+C give it a grace period to flush.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<LoopStats>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("🛑 Supervisor: Shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(stats))) => {
                        info!(messages = stats.messages, "Processor completed normally");
                    }
                    Some(Ok(Err(e))) => {
                        error!("Processor failed: {:#}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Processor panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Processor panicked: {}", e));
                    }
                    None => return Ok(()),
                }
            }
        }
    }

    let drain = async {
        while let Some(result) = task_set.join_next().await {
            if let Ok(Err(e)) | Err(e) = result.map_err(anyhow::Error::from) {
                warn!("Processor ended with error during shutdown: {:#}", e);
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(SHUTDOWN_GRACE_SECS), drain)
        .await
        .is_err()
    {
        warn!(
            grace_secs = SHUTDOWN_GRACE_SECS,
            "Processor did not stop in time, aborting"
        );
        task_set.abort_all();
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let kind = args.monitor.kind();

    let config = AppConfig::load_with(args.config.as_deref(), |key| std::env::var(key).ok())
        .context("Failed to load configuration")?;
    config
        .validate_for(kind, args.dry_run)
        .context("Configuration incomplete")?;

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  linewatch - {} monitor", kind);
    info!(
        "  Line: {} | Machine: {}",
        config.identity.line_name, config.identity.machine_name
    );
    match kind {
        MonitorKind::Electrical => info!("  Device: {}", config.identity.device_name),
        MonitorKind::Vibration => info!("  Sensor: {}", config.identity.sensor_name),
        MonitorKind::States => info!("  States: all"),
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let monitor = build_monitor(kind, &config)?;
    let sink = build_sink(&config, args.dry_run)?;
    let mut source = open_source(&args).await?;

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let mut task_set = JoinSet::new();
    let loop_token = cancel_token.clone();
    task_set.spawn(async move {
        let mut pipeline = ProcessingLoop::new(monitor, sink, loop_token);
        Ok(pipeline.run(&mut source).await)
    });

    run_supervisor(&mut task_set, cancel_token).await
}
