//! Monitor runtime
//!
//! Single tokio task that owns the link, the engine and the response
//! timer. Serial lines, timer expiry, UI commands and process completions
//! are all funnelled through one `select!` loop and handled one at a time,
//! in arrival order.

use std::process::ExitStatus;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::config::MonitorConfig;
use crate::device::FieldEvent;
use crate::engine::{Effect, Engine, UiCommand};
use crate::process::FlashTool;
use crate::protocol::{LineFramer, ProtocolError};

const INPUT_CAPACITY: usize = 32;
const EVENT_CAPACITY: usize = 256;

/// External events delivered to the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A command from a UI client
    Ui(UiCommand),
    /// The UI launcher process closed
    LauncherExited,
}

/// Cloneable handle for UI collaborators
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    inputs: mpsc::Sender<Input>,
    events: broadcast::Sender<FieldEvent>,
}

impl MonitorHandle {
    /// Receive every named-value change from now on
    pub fn subscribe(&self) -> broadcast::Receiver<FieldEvent> {
        self.events.subscribe()
    }

    /// Deliver a UI command
    pub async fn send(&self, command: UiCommand) -> Result<(), ProtocolError> {
        self.deliver(Input::Ui(command)).await
    }

    /// Parse and deliver a UI message; empty messages are ignored
    pub async fn send_text(&self, text: &str) -> Result<(), ProtocolError> {
        match UiCommand::parse(text) {
            Some(command) => self.send(command).await,
            None => Ok(()),
        }
    }

    /// Report that the UI launcher closed
    pub async fn launcher_exited(&self) -> Result<(), ProtocolError> {
        self.deliver(Input::LauncherExited).await
    }

    async fn deliver(&self, input: Input) -> Result<(), ProtocolError> {
        self.inputs
            .send(input)
            .await
            .map_err(|_| ProtocolError::LinkClosed)
    }
}

enum Event {
    Line(Option<Result<String, std::io::Error>>),
    Timeout,
    Input(Option<Input>),
    FlashDone,
}

enum Flow {
    Continue,
    Stop,
}

/// The protocol engine bound to a link
pub struct Monitor<T> {
    framed: Framed<T, LineFramer>,
    engine: Engine,
    flash_tool: FlashTool,
    flash: Option<JoinHandle<Option<ExitStatus>>>,
    response_timeout: Duration,
    deadline: Option<Instant>,
    inputs: mpsc::Receiver<Input>,
    events: broadcast::Sender<FieldEvent>,
}

impl<T> Monitor<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Bind a monitor to an open link
    pub fn new(link: T, config: &MonitorConfig) -> (Self, MonitorHandle) {
        let (input_tx, input_rx) = mpsc::channel(INPUT_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let handle = MonitorHandle {
            inputs: input_tx,
            events: events.clone(),
        };
        let monitor = Self {
            framed: Framed::new(link, LineFramer::new()),
            engine: Engine::new(),
            flash_tool: FlashTool::new(config.flash.clone()),
            flash: None,
            response_timeout: config.response_timeout(),
            deadline: None,
            inputs: input_rx,
            events,
        };
        (monitor, handle)
    }

    /// Run until the engine closes the link
    ///
    /// Dropping every [`MonitorHandle`] counts as the launcher exiting.
    pub async fn run(mut self) -> Result<(), ProtocolError> {
        let effects = self.engine.start();
        if let Flow::Stop = self.apply(effects).await? {
            return Ok(());
        }

        let mut inputs_open = true;
        loop {
            let deadline = self.deadline;
            let event = tokio::select! {
                line = self.framed.next() => Event::Line(line),
                _ = async move {
                    match deadline {
                        Some(at) => sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                } => Event::Timeout,
                input = self.inputs.recv(), if inputs_open => Event::Input(input),
                _ = wait_flash(&mut self.flash), if self.flash.is_some() => Event::FlashDone,
            };

            let effects = match event {
                Event::Line(Some(Ok(line))) => self.engine.handle_line(&line),
                Event::Line(Some(Err(e))) => return Err(e.into()),
                Event::Line(None) => return Err(ProtocolError::LinkClosed),
                Event::Timeout => {
                    self.deadline = None;
                    self.engine.handle_timeout()
                }
                Event::Input(Some(Input::Ui(command))) => self.engine.handle_ui(command),
                Event::Input(Some(Input::LauncherExited)) => self.engine.handle_launcher_exit(),
                Event::Input(None) => {
                    debug!("all UI handles dropped");
                    inputs_open = false;
                    self.engine.handle_launcher_exit()
                }
                Event::FlashDone => {
                    self.flash = None;
                    self.engine.handle_flash_finished()
                }
            };

            if let Flow::Stop = self.apply(effects).await? {
                break;
            }
        }
        Ok(())
    }

    async fn apply(&mut self, effects: Vec<Effect>) -> Result<Flow, ProtocolError> {
        for effect in effects {
            match effect {
                Effect::Transmit(command) => {
                    self.framed.send(command).await?;
                    self.deadline = Some(Instant::now() + self.response_timeout);
                }
                Effect::CancelTimeout => self.deadline = None,
                Effect::Notify(event) => {
                    // No subscribers is fine
                    let _ = self.events.send(event);
                }
                Effect::ResetReceiver => {
                    self.framed.codec_mut().reset();
                    self.framed.read_buffer_mut().clear();
                }
                Effect::StartFlash => {
                    let tool = self.flash_tool.clone();
                    self.flash = Some(tokio::spawn(tool.run()));
                }
                Effect::CloseLink => {
                    info!("serial port closed");
                    self.deadline = None;
                    self.framed.close().await?;
                    return Ok(Flow::Stop);
                }
            }
        }
        Ok(Flow::Continue)
    }
}

async fn wait_flash(flash: &mut Option<JoinHandle<Option<ExitStatus>>>) {
    match flash {
        Some(handle) => {
            let _ = handle.await;
        }
        None => std::future::pending().await,
    }
}
