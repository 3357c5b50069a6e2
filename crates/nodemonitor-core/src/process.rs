//! External processes
//!
//! The firmware flashing tool and the UI launcher are opaque child
//! processes. The engine only ever learns that they exited; exit status is
//! logged, never acted upon.

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::config::{FlashConfig, LauncherConfig};
use crate::protocol::ProtocolError;

/// Render child output for the log, non-printable bytes as `(NN)`
pub fn escape_diagnostic(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if (32..=126).contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("({})", b));
        }
    }
    out
}

async fn log_output<R: AsyncRead + Unpin>(stream: &'static str, mut reader: R) {
    let mut buf = [0u8; 256];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => info!("child {}: \"{}\"", stream, escape_diagnostic(&buf[..n])),
            Err(e) => {
                warn!("child {} read failed: {}", stream, e);
                break;
            }
        }
    }
}

/// Firmware flashing tool (avrdude by default)
#[derive(Debug, Clone)]
pub struct FlashTool {
    config: FlashConfig,
}

impl FlashTool {
    /// Create a tool from its configuration
    pub fn new(config: FlashConfig) -> Self {
        Self { config }
    }

    /// Program and argument vector that will be run
    pub fn invocation(&self) -> (String, Vec<String>) {
        (self.config.program.clone(), self.config.args())
    }

    /// Run the tool to completion, logging its output
    ///
    /// Returns the exit status if the tool could be started and waited on.
    /// Completion is reported either way; a failed flash is only visible in
    /// the log.
    pub async fn run(self) -> Option<ExitStatus> {
        let (program, args) = self.invocation();
        info!("starting flash: {} {}", program, args.join(" "));

        let mut child = match Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                error!("{}", ProtocolError::SpawnFailed { program, source });
                return None;
            }
        };

        let stdout = child.stdout.take().map(|s| tokio::spawn(log_output("stdout", s)));
        let stderr = child.stderr.take().map(|s| tokio::spawn(log_output("stderr", s)));

        let status = child.wait().await;
        for task in [stdout, stderr].into_iter().flatten() {
            let _ = task.await;
        }

        match status {
            Ok(status) => {
                info!("child exited: {}", status);
                Some(status)
            }
            Err(e) => {
                warn!("failed to wait for flashing tool: {}", e);
                None
            }
        }
    }
}

/// Browser/UI launcher pointed at the local UI endpoint
#[derive(Debug, Clone)]
pub struct Launcher {
    program: String,
    args: Vec<String>,
}

impl Launcher {
    /// Build a launcher, or `None` if the configuration disables it
    pub fn from_config(config: &LauncherConfig) -> Option<Self> {
        let program = config.program.clone()?;
        let mut args = config.args.clone();
        args.push(config.url.clone());
        Some(Self { program, args })
    }

    /// Spawn the launcher and wait for it to close
    pub async fn run(self) -> Result<ExitStatus, ProtocolError> {
        info!("launching UI: {} {}", self.program, self.args.join(" "));
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| ProtocolError::SpawnFailed {
                program: self.program.clone(),
                source,
            })?;
        let status = child.wait().await?;
        info!("UI launcher exited: {}", status);
        Ok(status)
    }
}
