use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identity of whoever holds (or asks for) the serial line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh identity for a single flow run
    pub fn for_flow() -> Self {
        Self(format!("flow-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single line to write to the modem.
///
/// `owner` is `None` for ad-hoc commands typed by the user; flows tag every
/// write with the owner that holds the lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub text: String,
    pub owner: Option<OwnerId>,
}

impl Command {
    pub fn unowned(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            owner: None,
        }
    }

    pub fn owned(text: impl Into<String>, owner: OwnerId) -> Self {
        Self {
            text: text.into(),
            owner: Some(owner),
        }
    }
}

/// One command plus every reply line it must produce before the flow moves on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStep {
    pub command: String,
    pub expected_responses: BTreeSet<String>,
}

impl FlowStep {
    pub fn new<I, S>(command: impl Into<String>, expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            expected_responses: expected
                .into_iter()
                .map(Into::into)
                .filter(|expected: &String| !expected.trim().is_empty())
                .collect(),
        }
    }
}

/// Ordered, all-or-nothing sequence of steps run under one lease.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub name: Option<String>,
    pub steps: Vec<FlowStep>,
}

impl Flow {
    pub fn new(steps: Vec<FlowStep>) -> Self {
        Self { name: None, steps }
    }

    pub fn named(name: impl Into<String>, steps: Vec<FlowStep>) -> Self {
        Self {
            name: Some(name.into()),
            steps,
        }
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }
}

/// Where a published line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    /// Outbound command echoed back by the transport after a successful write
    Echo,
    /// Line framed from the device's output
    Device,
}

/// One trimmed line seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub text: String,
    pub source: ResponseSource,
}

impl Response {
    pub fn echo(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: ResponseSource::Echo,
        }
    }

    pub fn device(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: ResponseSource::Device,
        }
    }

    pub fn is_echo(&self) -> bool {
        self.source == ResponseSource::Echo
    }
}
