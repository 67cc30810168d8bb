//! CLI Entry Point for rig-capture
//!
//! Provides command-line interface for:
//! - Listing serial ports
//! - An interactive console (open ports, zero, start/stop captures)
//! - Headless single captures for scripted use
//!
//! # Usage
//!
//! Record 10 s at 30 fps from a real rig:
//! ```bash
//! rig-capture capture --fps 30 --duration 10 --sensor-port /dev/ttyUSB0 --trigger-port /dev/ttyACM0
//! ```
//!
//! Try it without hardware:
//! ```bash
//! rig-capture console --simulate
//! ```

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use rig_capture::app::{commands::HELP, AppEvent, ControlCommand, RigApp, RunMode};
use rig_capture::config::RigConfig;
use rig_capture::display::{render_progress, PROGRESS_BAR_WIDTH};
use rig_capture::hardware::{available_ports, mock::MockSensor};
use rig_capture::tracing_setup::{self, OutputFormat, TracingConfig};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::warn;

/// Frame rate of the simulated sensor.
const SIMULATED_SENSOR_HZ: f64 = 20.0;

/// How long the event printer may take to catch up after the loop ends.
const PRINTER_DRAIN_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "rig-capture")]
#[command(about = "Timed CSV capture of a three-channel force sensor rig", long_about = None)]
struct Cli {
    /// Configuration file (default: config/rig_capture.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format (pretty, compact, json)
    #[arg(long, global = true, default_value = "compact")]
    log_format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct LinkArgs {
    /// Serial port of the sensing device
    #[arg(long)]
    sensor_port: Option<String>,

    /// Serial port of the trigger peripheral
    #[arg(long)]
    trigger_port: Option<String>,

    /// Use a simulated sensor instead of a serial port
    #[arg(long, conflicts_with = "sensor_port")]
    simulate: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available serial ports
    Ports,

    /// Interactive console reading commands from stdin
    Console {
        #[command(flatten)]
        links: LinkArgs,
    },

    /// Run a single capture and exit
    Capture {
        /// Frames per second (default from config)
        #[arg(long)]
        fps: Option<f64>,

        /// Capture length in seconds (default from config)
        #[arg(long)]
        duration: Option<f64>,

        /// Directory for the CSV file (default from config, else the desktop)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        links: LinkArgs,
    },

    /// Print the default configuration as TOML
    DefaultConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::DefaultConfig = cli.command {
        print!("{}", RigConfig::default().to_toml()?);
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => RigConfig::load_from(path),
        None => RigConfig::load(),
    }
    .map_err(|e| anyhow!("Failed to load configuration: {e}"))?;
    if let Some(level) = cli.log_level {
        config.application.log_level = level;
    }
    config.validate().map_err(|e| anyhow!(e))?;

    let tracing_config = TracingConfig::from_rig_config(&config)
        .map_err(|e| anyhow!(e))?
        .with_format(cli.log_format)
        .with_ansi(std::io::stdout().is_terminal());
    tracing_setup::init(tracing_config).map_err(|e| anyhow!(e))?;

    match cli.command {
        Commands::Ports => list_ports(),
        Commands::Console { links } => run_console(config, links).await,
        Commands::Capture {
            fps,
            duration,
            output_dir,
            links,
        } => run_capture(config, fps, duration, output_dir, links).await,
        Commands::DefaultConfig => Ok(()),
    }
}

fn list_ports() -> Result<()> {
    let ports = available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

/// Open whatever links were asked for on the command line or in the config.
fn open_links(app: &mut RigApp, links: LinkArgs) -> Result<()> {
    let sensor_port = links
        .sensor_port
        .or_else(|| app.config().sensor.port_name.clone());
    let trigger_port = links
        .trigger_port
        .or_else(|| app.config().trigger.port_name.clone());

    if links.simulate {
        app.attach_sensor(MockSensor::spawn(SIMULATED_SENSOR_HZ));
    } else if let Some(port) = sensor_port {
        app.open_sensor(&port)?;
    }

    if let Some(port) = trigger_port {
        app.open_trigger(&port)?;
    }
    Ok(())
}

fn forward_ctrl_c(control: mpsc::Sender<ControlCommand>, command: ControlCommand) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = control.send(command).await;
        }
    });
}

async fn run_console(config: RigConfig, links: LinkArgs) -> Result<()> {
    let mut app = RigApp::new(config);
    let printer = tokio::spawn(print_events(app.subscribe()));
    open_links(&mut app, links)?;

    let (control_tx, control_rx) = mpsc::channel(16);
    forward_ctrl_c(control_tx.clone(), ControlCommand::Quit);
    tokio::spawn(read_commands(control_tx));

    println!("{HELP}");
    app.run(control_rx, RunMode::Interactive).await;
    drop(app);
    finish_printer(printer).await;
    Ok(())
}

async fn run_capture(
    mut config: RigConfig,
    fps: Option<f64>,
    duration: Option<f64>,
    output_dir: Option<PathBuf>,
    links: LinkArgs,
) -> Result<()> {
    if output_dir.is_some() {
        config.capture.output_dir = output_dir;
    }
    let fps = fps.unwrap_or(config.capture.frames_per_second);
    let duration = duration.unwrap_or(config.capture.duration_seconds);

    let mut app = RigApp::new(config);
    let printer = tokio::spawn(print_events(app.subscribe()));
    if links.sensor_port.is_none() && !links.simulate && app.config().sensor.port_name.is_none() {
        warn!("no sensor port given, all values will read zero");
    }
    open_links(&mut app, links)?;

    let (control_tx, control_rx) = mpsc::channel(4);
    forward_ctrl_c(control_tx, ControlCommand::Stop);

    app.start_capture(fps, duration)?;
    let path = app
        .engine()
        .session()
        .map(|s| s.path().to_path_buf())
        .unwrap_or_default();

    app.run(control_rx, RunMode::UntilCaptureEnds).await;
    let state = app.capture_state();
    let progress = app.progress();
    drop(app);
    finish_printer(printer).await;

    println!(
        "Capture {}: {} of {} frames written to {}",
        state,
        progress.frames_captured,
        progress.total_frames,
        path.display()
    );
    Ok(())
}

async fn read_commands(control: mpsc::Sender<ControlCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "help" {
            println!("{HELP}");
            continue;
        }
        match line.parse::<ControlCommand>() {
            Ok(command) => {
                if control.send(command).await.is_err() {
                    return;
                }
            }
            Err(e) => eprintln!("{e}"),
        }
    }
    let _ = control.send(ControlCommand::Quit).await;
}

/// Wait for the printer to show what was emitted before the app went away.
///
/// The printer ends once every event sender is dropped.
async fn finish_printer(printer: JoinHandle<()>) {
    if tokio::time::timeout(PRINTER_DRAIN_TIMEOUT, printer)
        .await
        .is_err()
    {
        warn!("event printer did not finish in time");
    }
}

async fn print_events(mut events: broadcast::Receiver<AppEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            AppEvent::Reading(_) => {}
            AppEvent::Progress(progress) => {
                print!("\r{}", render_progress(progress, PROGRESS_BAR_WIDTH));
                let _ = std::io::stdout().flush();
            }
            AppEvent::CaptureStarted { path, total_frames } => {
                println!("Recording {total_frames} frames to {}", path.display());
            }
            AppEvent::CaptureFinished { state, progress } => {
                println!(
                    "\nCapture {state} after {} of {} frames",
                    progress.frames_captured, progress.total_frames
                );
            }
            AppEvent::SensorOpened(name) => println!("Sensor connected: {name}"),
            AppEvent::SensorClosed(reason) => println!("Sensor disconnected: {reason}"),
            AppEvent::Notice(text) => println!("{text}"),
            AppEvent::Error(text) => eprintln!("Error: {text}"),
        }
    }
}
