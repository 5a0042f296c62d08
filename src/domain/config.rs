use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::command::{Flow, FlowStep};
use crate::domain::error::{AtCliError, AtCliResult};

/// ATCLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtCliConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// Serial line settings
    #[serde(default)]
    pub serial: SerialSettings,
    /// Timeouts and read loop tuning
    #[serde(default)]
    pub timing: TimingSettings,
    /// Named command flows
    #[serde(default = "default_flows")]
    pub flows: Vec<FlowDefinition>,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Serial port settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialSettings {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: ParityConfig,
    #[serde(default)]
    pub flow_control: FlowControlConfig,
    /// Blocking read timeout; a timed-out read is an idle poll, not a failure
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

/// Flow and read loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    /// How long a flow waits for the serial line before giving up
    #[serde(default = "default_lease_timeout")]
    pub lease_timeout_ms: u64,
    /// How long a flow step waits for all of its expected responses
    #[serde(default = "default_step_timeout")]
    pub step_timeout_ms: u64,
    /// Pause after a failed read before reading again
    #[serde(default = "default_read_backoff")]
    pub read_backoff_ms: u64,
    /// Bytes requested per read call
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
}

impl TimingSettings {
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_millis(self.lease_timeout_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn read_backoff(&self) -> Duration {
        Duration::from_millis(self.read_backoff_ms)
    }
}

/// Parity configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityConfig {
    #[default]
    None,
    Odd,
    Even,
}

/// Flow control configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControlConfig {
    #[default]
    None,
    Hardware,
    Software,
}

/// A flow as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<FlowStepDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStepDefinition {
    pub command: String,
    #[serde(default)]
    pub expect: Vec<String>,
}

impl FlowDefinition {
    pub fn to_flow(&self) -> Flow {
        let steps = self
            .steps
            .iter()
            .map(|step| FlowStep::new(step.command.clone(), step.expect.iter().cloned()))
            .collect();
        Flow::named(self.name.clone(), steps)
    }
}

impl AtCliConfig {
    pub fn find_flow(&self, name: &str) -> Option<&FlowDefinition> {
        self.flows.iter().find(|flow| flow.name == name)
    }

    /// Reject flows that could never run
    pub fn validate(&self) -> AtCliResult<()> {
        validate_flows(&self.flows)
    }
}

/// Every flow needs a unique name, and no step may have a blank command or a
/// blank expectation (blank device lines are common and would match it).
pub fn validate_flows(flows: &[FlowDefinition]) -> AtCliResult<()> {
    for (index, flow) in flows.iter().enumerate() {
        if flow.name.trim().is_empty() {
            return Err(AtCliError::InvalidFlow(format!("flow #{} has no name", index + 1)));
        }
        if flows[..index].iter().any(|other| other.name == flow.name) {
            return Err(AtCliError::InvalidFlow(format!(
                "flow '{}' is defined twice",
                flow.name
            )));
        }
        for (position, step) in flow.steps.iter().enumerate() {
            if step.command.trim().is_empty() {
                return Err(AtCliError::InvalidFlow(format!(
                    "flow '{}' step {} has an empty command",
                    flow.name,
                    position + 1
                )));
            }
            if step.expect.iter().any(|expected| expected.trim().is_empty()) {
                return Err(AtCliError::InvalidFlow(format!(
                    "flow '{}' step {} expects an empty response",
                    flow.name,
                    position + 1
                )));
            }
        }
    }
    Ok(())
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> String {
    "/dev/serial0".to_string()
}

fn default_baud_rate() -> u32 {
    115200
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_read_timeout() -> u64 {
    100
}

fn default_lease_timeout() -> u64 {
    120_000
}

fn default_step_timeout() -> u64 {
    3000
}

fn default_read_backoff() -> u64 {
    1000
}

fn default_read_chunk_size() -> usize {
    256
}

fn flow_step(command: &str, expect: &[&str]) -> FlowStepDefinition {
    FlowStepDefinition {
        command: command.to_string(),
        expect: expect.iter().map(|e| e.to_string()).collect(),
    }
}

fn default_flows() -> Vec<FlowDefinition> {
    vec![
        FlowDefinition {
            name: "gps-start".to_string(),
            description: "Power-cycle the GNSS engine and route NMEA to the AT port".to_string(),
            steps: vec![
                flow_step("AT+CGNSSPWR=0", &["OK"]),
                flow_step("AT+CGNSSPWR=1", &["OK", "+CGNSSPWR: READY!"]),
                flow_step("AT+CGNSSTST=1", &["OK"]),
                flow_step("AT+CGNSSPORTSWITCH=0,1", &["OK"]),
            ],
        },
        FlowDefinition {
            name: "gps-stop".to_string(),
            description: "Stop NMEA output and power down the GNSS engine".to_string(),
            steps: vec![
                flow_step("AT+CGNSSTST=0", &["OK"]),
                flow_step("AT+CGNSSPORTSWITCH=0,0", &["OK"]),
                flow_step("AT+CGNSSPWR=0", &["OK"]),
            ],
        },
    ]
}

impl Default for AtCliConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            serial: SerialSettings::default(),
            timing: TimingSettings::default(),
            flows: default_flows(),
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: ParityConfig::default(),
            flow_control: FlowControlConfig::default(),
            read_timeout_ms: default_read_timeout(),
        }
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            lease_timeout_ms: default_lease_timeout(),
            step_timeout_ms: default_step_timeout(),
            read_backoff_ms: default_read_backoff(),
            read_chunk_size: default_read_chunk_size(),
        }
    }
}
