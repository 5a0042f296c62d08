// Core module - Serial command transport and flow control
pub mod engine;
pub mod events;
pub mod flow;
pub mod transport;

pub use engine::{ModemEngine, PortLink};
pub use events::{Event, EventBus, EventKind, SubscriptionToken};
pub use flow::{FlowReport, FlowRunner, FlowState};
pub use transport::{LineFramer, OwnershipArbiter, SerialTransport};
