#![allow(dead_code)]

use atcli::{Event, EventBus, EventKind, ModemEngine, PortLink, Response, TimingSettings};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::Span;

/// Poll interval of the fake device when nothing is pending
const READ_POLL: Duration = Duration::from_millis(20);

enum Incoming {
    Bytes(Vec<u8>),
    Error(io::ErrorKind),
}

/// In-memory modem: records what the transport writes and answers scripted
/// replies for each complete command line it receives.
#[derive(Clone)]
pub struct ScriptedModem {
    written: Arc<Mutex<Vec<u8>>>,
    replies: Arc<Mutex<HashMap<String, Vec<String>>>>,
    fail_writes: Arc<AtomicBool>,
    incoming: mpsc::Sender<Incoming>,
}

struct ModemReader {
    incoming: mpsc::Receiver<Incoming>,
    pending: Vec<u8>,
}

struct ModemWriter {
    modem: ScriptedModem,
    line: Vec<u8>,
}

impl ScriptedModem {
    pub fn new() -> (Self, PortLink) {
        let (incoming, receiver) = mpsc::channel();
        let modem = Self {
            written: Arc::new(Mutex::new(Vec::new())),
            replies: Arc::new(Mutex::new(HashMap::new())),
            fail_writes: Arc::new(AtomicBool::new(false)),
            incoming,
        };
        let reader = ModemReader {
            incoming: receiver,
            pending: Vec::new(),
        };
        let writer = ModemWriter {
            modem: modem.clone(),
            line: Vec::new(),
        };
        (modem, PortLink::new(Box::new(reader), Box::new(writer)))
    }

    /// Lines the device sends back after receiving `command`
    pub fn reply_to(&self, command: &str, lines: &[&str]) {
        self.replies.lock().unwrap().insert(
            command.to_string(),
            lines.iter().map(|line| line.to_string()).collect(),
        );
    }

    /// Raw bytes the device emits on its own
    pub fn inject(&self, bytes: &[u8]) {
        let _ = self.incoming.send(Incoming::Bytes(bytes.to_vec()));
    }

    /// Make the next read fail
    pub fn inject_read_error(&self, kind: io::ErrorKind) {
        let _ = self.incoming.send(Incoming::Error(kind));
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.written.lock().unwrap()).to_string()
    }

    /// Command lines received so far, terminators stripped
    pub fn commands(&self) -> Vec<String> {
        self.written()
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Read for ModemReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.incoming.recv_timeout(READ_POLL) {
                Ok(Incoming::Bytes(bytes)) => self.pending = bytes,
                Ok(Incoming::Error(kind)) => {
                    return Err(io::Error::new(kind, "injected read failure"))
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::ErrorKind::TimedOut.into())
                }
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

impl Write for ModemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.modem.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        self.modem.written.lock().unwrap().extend_from_slice(buf);

        for &byte in buf {
            if byte != b'\n' {
                self.line.push(byte);
                continue;
            }
            let command = String::from_utf8_lossy(&self.line).trim().to_string();
            self.line.clear();
            let replies = self.modem.replies.lock().unwrap().get(&command).cloned();
            for reply in replies.unwrap_or_default() {
                self.modem.inject(format!("{}\r\n", reply).as_bytes());
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Records every response and transport-error event published on a bus.
#[derive(Clone)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventRecorder {
    pub fn attach(bus: &EventBus) -> Self {
        let recorder = Self {
            events: Arc::new(Mutex::new(Vec::new())),
        };
        for kind in [EventKind::ResponseReceived, EventKind::TransportError] {
            let events = Arc::clone(&recorder.events);
            bus.subscribe(kind, move |event| {
                events.lock().unwrap().push(event.clone());
                Ok(())
            });
        }
        recorder
    }

    pub fn responses(&self) -> Vec<Response> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                Event::ResponseReceived(response) => Some(response.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn device_lines(&self) -> Vec<String> {
        self.responses()
            .into_iter()
            .filter(|response| !response.is_echo())
            .map(|response| response.text)
            .collect()
    }

    pub fn echoes(&self) -> Vec<String> {
        self.responses()
            .into_iter()
            .filter(Response::is_echo)
            .map(|response| response.text)
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                Event::TransportError(error) => Some(error.to_string()),
                _ => None,
            })
            .collect()
    }

    /// Poll until `check` passes or `timeout` elapses; returns whether it passed
    pub async fn wait_until<F>(&self, timeout: Duration, check: F) -> bool
    where
        F: Fn(&Self) -> bool,
    {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if check(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        check(self)
    }
}

/// Short timeouts so failing paths finish quickly
pub fn fast_timing() -> TimingSettings {
    TimingSettings {
        lease_timeout_ms: 2000,
        step_timeout_ms: 300,
        read_backoff_ms: 100,
        read_chunk_size: 64,
    }
}

pub struct Harness {
    pub bus: Arc<EventBus>,
    pub modem: ScriptedModem,
    pub recorder: EventRecorder,
    pub engine: ModemEngine,
}

pub fn start_engine(timing: TimingSettings) -> Harness {
    let bus = Arc::new(EventBus::default());
    let recorder = EventRecorder::attach(&bus);
    let (modem, link) = ScriptedModem::new();
    let engine = ModemEngine::start(Arc::clone(&bus), link, timing, Span::none());
    Harness {
        bus,
        modem,
        recorder,
        engine,
    }
}
