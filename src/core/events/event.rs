use std::fmt;
use std::sync::Arc;

use crate::domain::command::{Command, Flow, Response};
use crate::domain::error::AtCliError;

/// Event type used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CommandRequested,
    FlowRequested,
    ResponseReceived,
    TransportError,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::CommandRequested => write!(f, "command-requested"),
            EventKind::FlowRequested => write!(f, "flow-requested"),
            EventKind::ResponseReceived => write!(f, "response-received"),
            EventKind::TransportError => write!(f, "transport-error"),
        }
    }
}

/// Everything that travels over the event bus. The payload shape is fixed per kind.
#[derive(Debug, Clone)]
pub enum Event {
    /// A caller wants a single line written to the modem
    CommandRequested(Command),
    /// A caller wants a multi-step flow run under one lease
    FlowRequested(Flow),
    /// A trimmed line, either echoed by the transport or framed from the device
    ResponseReceived(Response),
    /// A recoverable transport failure
    TransportError(Arc<AtCliError>),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::CommandRequested(_) => EventKind::CommandRequested,
            Event::FlowRequested(_) => EventKind::FlowRequested,
            Event::ResponseReceived(_) => EventKind::ResponseReceived,
            Event::TransportError(_) => EventKind::TransportError,
        }
    }

    pub fn transport_error(error: AtCliError) -> Self {
        Event::TransportError(Arc::new(error))
    }
}
