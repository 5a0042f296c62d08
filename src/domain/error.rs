use std::time::Duration;
use thiserror::Error;

use crate::domain::command::OwnerId;

/// ATCLI unified error type
#[derive(Error, Debug)]
pub enum AtCliError {
    #[error("Failed to open serial port {port}: {source}")]
    PortOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Serial read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("Serial write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("Serial line is held by another owner: ownerId={holder}")]
    OwnershipConflict { holder: OwnerId },

    #[error("Timed out after {waited:?} acquiring serial line for {owner}")]
    LockTimeout { owner: OwnerId, waited: Duration },

    #[error("Step {step} ('{command}') timed out waiting for: {}", .missing.join(", "))]
    StepTimeout {
        step: usize,
        command: String,
        missing: Vec<String>,
    },

    #[error("Flow cancelled at step {step}")]
    FlowCancelled { step: usize },

    #[error("Invalid flow: {0}")]
    InvalidFlow(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AtCliError {
    /// Only a port that cannot be opened stops the process; everything else is
    /// reported as a transport-error event and the tool keeps running.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AtCliError::PortOpen { .. })
    }
}

pub type AtCliResult<T> = Result<T, AtCliError>;
