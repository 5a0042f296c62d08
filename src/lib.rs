//! ATCLI Library
//!
//! Serial AT command transport for modems: line framing, single-owner
//! arbitration of the serial line, and multi-step command flows that wait for
//! expected replies, all wired together through a typed event bus.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::engine::{ModemEngine, PortLink};
pub use crate::core::events::{Event, EventBus, EventKind, SubscriptionToken};
pub use crate::core::flow::{FlowReport, FlowRunner, FlowState};
pub use crate::core::transport::{LineFramer, OwnershipArbiter, SerialTransport};
pub use crate::domain::command::{Command, Flow, FlowStep, OwnerId, Response, ResponseSource};
pub use crate::domain::config::{AtCliConfig, TimingSettings};
pub use crate::domain::error::{AtCliError, AtCliResult};
