//! NodeMonitor - serial bridge between a LightingUPS controller and its UI.
//!
//! Run with: `cargo run -p nodemonitor-app -- --demo`
//!
//! UI commands are read from stdin, one per line; device value changes are
//! printed to stdout as JSON lines. Logs go to stderr.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};

use nodemonitor_core::config::MonitorConfig;
use nodemonitor_core::demo::{Dialect, SimulatedDevice};
use nodemonitor_core::device::FieldEvent;
use nodemonitor_core::process::Launcher;
use nodemonitor_core::protocol::{list_ports, open_port};
use nodemonitor_core::runtime::{Monitor, MonitorHandle};

/// NodeMonitor - live monitor and reprogramming bridge for LightingUPS.
#[derive(Parser, Debug)]
#[command(name = "nodemonitor")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port of the controller (overrides config).
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate (overrides config).
    #[arg(short, long)]
    baud: Option<u32>,

    /// Talk to a simulated controller instead of a serial port.
    #[arg(long)]
    demo: bool,

    /// Simulate legacy firmware (implies --demo).
    #[arg(long)]
    legacy: bool,

    /// List available serial ports and exit.
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.list_ports {
        for port in list_ports() {
            match (port.vid, port.pid) {
                (Some(vid), Some(pid)) => println!(
                    "{}\t{:04x}:{:04x}\t{}",
                    port.name,
                    vid,
                    pid,
                    port.product.unwrap_or_default()
                ),
                _ => println!("{}", port.name),
            }
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => MonitorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MonitorConfig::load_default().unwrap_or_else(|e| {
            warn!("ignoring config: {}", e);
            MonitorConfig::default()
        }),
    };
    if let Some(port) = args.port {
        config.serial.port = port;
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }

    if args.demo || args.legacy {
        let dialect = if args.legacy {
            Dialect::Legacy
        } else {
            Dialect::Current
        };
        info!("running against simulated {:?} controller", dialect);
        let (link, device_end) = tokio::io::duplex(1024);
        tokio::spawn(async move {
            if let Err(e) = SimulatedDevice::new(dialect).serve(device_end).await {
                warn!("simulated device stopped: {}", e);
            }
        });
        run(link, config).await
    } else {
        info!(
            "opening {} at {} baud",
            config.serial.port, config.serial.baud_rate
        );
        let link = open_port(&config.serial.port, config.serial.baud_rate)
            .with_context(|| format!("opening serial port {}", config.serial.port))?;
        run(link, config).await
    }
}

async fn run<T>(link: T, config: MonitorConfig) -> anyhow::Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (monitor, handle) = Monitor::new(link, &config);
    let events = handle.subscribe();
    tokio::spawn(print_events(events));

    let launcher = Launcher::from_config(&config.launcher);
    let has_launcher = launcher.is_some();
    if let Some(launcher) = launcher {
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = launcher.run().await {
                error!("UI launcher failed: {}", e);
            }
            let _ = handle.launcher_exited().await;
        });
    }

    spawn_stdin_reader(handle.clone(), !has_launcher);

    let ctrl_c = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, closing after the current command");
            let _ = ctrl_c.launcher_exited().await;
        }
    });

    monitor.run().await.context("monitor stopped")?;
    info!("bye");
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<FieldEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => println!("{}", event.to_envelope()),
            Err(RecvError::Lagged(n)) => warn!("UI fell behind, {} events dropped", n),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Forward stdin lines as UI commands
///
/// Runs on a plain thread: a blocking stdin read must not hold up runtime
/// shutdown.
fn spawn_stdin_reader(handle: MonitorHandle, exit_on_eof: bool) {
    let runtime = tokio::runtime::Handle::current();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if runtime.block_on(handle.send_text(&line)).is_err() {
                return;
            }
        }
        if exit_on_eof {
            let _ = runtime.block_on(handle.launcher_exited());
        }
    });
}
