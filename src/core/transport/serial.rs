use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Span};

use super::arbiter::OwnershipArbiter;
use super::framer::LineFramer;
use crate::core::events::{Event, EventBus};
use crate::domain::command::{Command, Response};
use crate::domain::config::TimingSettings;
use crate::domain::error::{AtCliError, AtCliResult};

/// Appended to every outbound command
pub const LINE_TERMINATOR: &str = "\r\n";

/// Pause between polls when a read returns no bytes
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Write half of the serial line, gated by the ownership arbiter.
pub struct SerialTransport {
    writer: Mutex<Box<dyn Write + Send>>,
    arbiter: Arc<OwnershipArbiter>,
    bus: Arc<EventBus>,
    span: Span,
}

impl SerialTransport {
    pub fn new(
        writer: Box<dyn Write + Send>,
        arbiter: Arc<OwnershipArbiter>,
        bus: Arc<EventBus>,
        span: Span,
    ) -> Self {
        Self {
            writer: Mutex::new(writer),
            arbiter,
            bus,
            span,
        }
    }

    pub fn arbiter(&self) -> &Arc<OwnershipArbiter> {
        &self.arbiter
    }

    /// Write a command and publish its echo. Failures are returned to the
    /// caller and nothing is published for them.
    pub fn send(&self, command: &Command) -> AtCliResult<()> {
        {
            let _grant = self.arbiter.authorize(command.owner.as_ref())?;
            let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            writer
                .write_all(format!("{}{}", command.text, LINE_TERMINATOR).as_bytes())
                .and_then(|_| writer.flush())
                .map_err(AtCliError::Write)?;
        }

        debug!(parent: &self.span, command = %command.text, owner = ?command.owner, "-> {}", command.text);
        self.bus
            .publish(Event::ResponseReceived(Response::echo(command.text.trim())));
        Ok(())
    }

    /// Best-effort write for single commands: any failure becomes a
    /// transport-error event and is not returned.
    pub fn write(&self, command: &Command) {
        if let Err(e) = self.send(command) {
            warn!(parent: &self.span, command = %command.text, error = %e, "command not sent");
            self.bus.publish(Event::transport_error(e));
        }
    }
}

/// Continuously drains the read half of the port, framing bytes into lines.
pub struct ReadLoop {
    reader: Box<dyn Read + Send>,
    framer: LineFramer,
    bus: Arc<EventBus>,
    chunk_size: usize,
    backoff: Duration,
    cancel: CancellationToken,
    span: Span,
}

impl ReadLoop {
    pub fn new(
        reader: Box<dyn Read + Send>,
        bus: Arc<EventBus>,
        timing: &TimingSettings,
        cancel: CancellationToken,
        span: Span,
    ) -> Self {
        Self {
            reader,
            framer: LineFramer::new(),
            bus,
            chunk_size: timing.read_chunk_size.max(1),
            backoff: timing.read_backoff(),
            cancel,
            span,
        }
    }

    /// Read until cancelled. Blocks the calling thread.
    pub fn run(mut self) {
        info!(parent: &self.span, "serial read loop started");
        let mut buffer = vec![0u8; self.chunk_size];

        while !self.cancel.is_cancelled() {
            match self.reader.read(&mut buffer) {
                Ok(0) => std::thread::sleep(IDLE_POLL),
                Ok(n) => {
                    debug!(parent: &self.span, "Received {} bytes over serial", n);
                    for line in self.framer.push(&buffer[..n]) {
                        self.bus
                            .publish(Event::ResponseReceived(Response::device(line)));
                    }
                    let discarded = self.framer.take_discarded();
                    if discarded > 0 {
                        warn!(parent: &self.span, discarded, "Dropped over-long serial lines; check the baud rate");
                    }
                }
                Err(ref e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    error!(parent: &self.span, error = %e, "Failed to read from serial port");
                    self.bus.publish(Event::transport_error(AtCliError::Read(e)));
                    std::thread::sleep(self.backoff);
                }
            }
        }

        info!(parent: &self.span, "serial read loop stopped");
    }
}
