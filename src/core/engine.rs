use std::io::{Read, Write};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Span};

use crate::core::events::{Event, EventBus, EventKind, SubscriptionToken};
use crate::core::flow::{FlowReport, FlowRunner};
use crate::core::transport::{OwnershipArbiter, ReadLoop, SerialTransport};
use crate::domain::command::Flow;
use crate::domain::config::TimingSettings;

/// The two halves of an open serial line
pub struct PortLink {
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
}

impl PortLink {
    pub fn new(reader: Box<dyn Read + Send>, writer: Box<dyn Write + Send>) -> Self {
        Self { reader, writer }
    }
}

/// Owns the serial line and connects it to the event bus.
///
/// Command-requested events are written synchronously on the publisher's thread.
/// Flow-requested events each get their own task. The read loop runs on a
/// dedicated blocking thread.
pub struct ModemEngine {
    bus: Arc<EventBus>,
    transport: Arc<SerialTransport>,
    runner: Arc<FlowRunner>,
    shutdown: CancellationToken,
    subscriptions: Vec<SubscriptionToken>,
    reader: Option<JoinHandle<()>>,
    span: Span,
}

impl ModemEngine {
    /// Start the read loop and subscribe to command and flow requests.
    /// Must be called from within a tokio runtime.
    pub fn start(bus: Arc<EventBus>, link: PortLink, timing: TimingSettings, span: Span) -> Self {
        let arbiter = Arc::new(OwnershipArbiter::new(
            info_span!(parent: &span, "arbiter"),
        ));
        let transport = Arc::new(SerialTransport::new(
            link.writer,
            arbiter,
            Arc::clone(&bus),
            info_span!(parent: &span, "transport"),
        ));
        let runner = Arc::new(FlowRunner::new(
            Arc::clone(&transport),
            Arc::clone(&bus),
            timing.clone(),
            info_span!(parent: &span, "flow"),
        ));
        let shutdown = CancellationToken::new();

        let read_loop = ReadLoop::new(
            link.reader,
            Arc::clone(&bus),
            &timing,
            shutdown.child_token(),
            info_span!(parent: &span, "reader"),
        );
        let reader = tokio::task::spawn_blocking(move || read_loop.run());

        let mut subscriptions = Vec::with_capacity(2);

        let command_transport = Arc::clone(&transport);
        subscriptions.push(bus.subscribe(EventKind::CommandRequested, move |event| {
            if let Event::CommandRequested(command) = event {
                command_transport.write(command);
            }
            Ok(())
        }));

        let flow_runner = Arc::clone(&runner);
        let flow_shutdown = shutdown.clone();
        let runtime = Handle::current();
        subscriptions.push(bus.subscribe(EventKind::FlowRequested, move |event| {
            if let Event::FlowRequested(flow) = event {
                let runner = Arc::clone(&flow_runner);
                let flow = flow.clone();
                let cancel = flow_shutdown.child_token();
                runtime.spawn(async move {
                    runner.run(flow, cancel).await;
                });
            }
            Ok(())
        }));

        info!(parent: &span, "modem engine started");

        Self {
            bus,
            transport,
            runner,
            shutdown,
            subscriptions,
            reader: Some(reader),
            span,
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn arbiter(&self) -> &Arc<OwnershipArbiter> {
        self.transport.arbiter()
    }

    /// Run a flow and wait for its report
    pub async fn run_flow(&self, flow: Flow) -> FlowReport {
        self.runner.run(flow, self.shutdown.child_token()).await
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Cancel running flows, stop the read loop and drop the engine's subscriptions.
    pub async fn shutdown(mut self) {
        self.stop_listening();
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                warn!(parent: &self.span, "Read loop completed with error: {}", e);
            }
        }
        info!(parent: &self.span, "modem engine stopped");
    }

    fn stop_listening(&mut self) {
        self.shutdown.cancel();
        for token in self.subscriptions.drain(..) {
            self.bus.unsubscribe(token);
        }
    }
}

impl Drop for ModemEngine {
    fn drop(&mut self) {
        self.stop_listening();
    }
}
