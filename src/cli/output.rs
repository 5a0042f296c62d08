use crate::cli::args::OutputFormat;
use crate::core::flow::FlowReport;
use crate::domain::command::Response;
use crate::domain::config::{AtCliConfig, FlowDefinition};
use serde_json::json;
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter: Send + Sync {
    fn write_response(&self, response: &Response) -> Result<(), OutputError>;
    fn write_transport_error(&self, error: &str) -> Result<(), OutputError>;
    fn write_flow_report(&self, report: &FlowReport) -> Result<(), OutputError>;
    fn write_flows(&self, flows: &[FlowDefinition]) -> Result<(), OutputError>;
    fn write_ports(&self, ports: &[String]) -> Result<(), OutputError>;
    fn write_config(&self, config: &AtCliConfig) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("TOML serialization error: {0}")]
    TomlError(#[from] toml::ser::Error),
}

impl From<OutputError> for crate::domain::error::AtCliError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

/// Text rendering of a wire line: echoes are prefixed with `-> `
pub fn format_response(response: &Response) -> String {
    if response.is_echo() {
        format!("-> {}", response.text)
    } else {
        response.text.clone()
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_response(&self, response: &Response) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => println!("{}", format_response(response)),
            OutputFormat::Json => println!("{}", serde_json::to_string(response)?),
        }
        Ok(())
    }

    fn write_transport_error(&self, error: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => eprintln!("Serial error: {}", error),
            OutputFormat::Json => {
                let output = json!({ "error": error, "level": "transport" });
                eprintln!("{}", serde_json::to_string(&output)?);
            }
        }
        Ok(())
    }

    fn write_flow_report(&self, report: &FlowReport) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => println!("{}", report),
            OutputFormat::Json => {
                let output = json!({
                    "flow": report.name,
                    "owner": report.owner,
                    "state": report.state.to_string(),
                    "succeeded": report.succeeded(),
                    "steps_completed": report.steps_completed,
                    "total_steps": report.total_steps,
                    "error": report.error.as_ref().map(|e| e.to_string()),
                });
                println!("{}", serde_json::to_string(&output)?);
            }
        }
        Ok(())
    }

    fn write_flows(&self, flows: &[FlowDefinition]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                if !flows.is_empty() {
                    let rows: Vec<FlowTableRow> = flows.iter().map(FlowTableRow::from).collect();
                    println!("{}", Table::new(rows));
                }
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(flows)?),
        }
        Ok(())
    }

    fn write_ports(&self, ports: &[String]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                if ports.is_empty() {
                    println!("No serial ports found");
                } else {
                    let rows: Vec<PortTableRow> = ports
                        .iter()
                        .map(|port| PortTableRow { port: port.clone() })
                        .collect();
                    println!("{}", Table::new(rows));
                }
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(ports)?),
        }
        Ok(())
    }

    fn write_config(&self, config: &AtCliConfig) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => println!("{}", toml::to_string_pretty(config)?),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        }
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = json!({ "message": message, "level": "info" });
                println!("{}", serde_json::to_string(&output)?);
            }
            OutputFormat::Text => println!("{}", message),
        }
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = json!({ "error": error, "level": "error" });
                eprintln!("{}", serde_json::to_string(&output)?);
            }
            OutputFormat::Text => eprintln!("Error: {}", error),
        }
        Ok(())
    }
}

#[derive(Tabled)]
struct PortTableRow {
    port: String,
}

/// Table row for flow definitions
#[derive(Tabled)]
struct FlowTableRow {
    name: String,
    steps: String,
    description: String,
}

impl From<&FlowDefinition> for FlowTableRow {
    fn from(flow: &FlowDefinition) -> Self {
        Self {
            name: flow.name.clone(),
            steps: flow
                .steps
                .iter()
                .map(|step| step.command.as_str())
                .collect::<Vec<_>>()
                .join(" > "),
            description: flow.description.clone(),
        }
    }
}
