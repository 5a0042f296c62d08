use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command line arguments for ATCLI
#[derive(Parser, Debug)]
#[command(
    name = "atcli",
    disable_version_flag = true,
    about = "AT Command Line Interface for serial modems",
    long_about = "A terminal console for talking to serial modems with AT commands, running multi-step command flows that wait for the replies they expect."
)]
pub struct Args {
    /// Print version information and exit
    #[arg(short = 'V', long, global = true)]
    pub version: bool,

    /// Serial port to use (overrides configuration)
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    /// Baud rate (overrides configuration)
    #[arg(short, long, global = true)]
    pub baud: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress diagnostic logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Command to execute (defaults to the interactive console)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Interactive AT command console
    Console,
    /// Send a single AT command and print the replies
    Send {
        /// Command text, e.g. "AT+CSQ"
        text: String,
        /// How long to collect replies
        #[arg(short, long, default_value = "1000")]
        wait_ms: u64,
    },
    /// Run a configured command flow
    Flow {
        /// Flow name from the configuration
        name: String,
    },
    /// List available serial ports
    Ports,
    /// Configuration management commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Configuration management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Create a default project configuration
    Init {
        /// Directory to create `.atcli/config.toml` in
        #[arg(short, long)]
        dir: Option<String>,
    },
    /// List configured flows
    Flows,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output, one object per line
    Json,
}

impl Args {
    /// Command to run, falling back to the console
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Console)
    }

    /// Whether the command needs the serial port open
    pub fn needs_port(&self) -> bool {
        matches!(
            self.command(),
            Command::Console | Command::Send { .. } | Command::Flow { .. }
        )
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_console() {
        let args = Args::try_parse_from(["atcli"]).unwrap();
        assert!(matches!(args.command(), Command::Console));
        assert!(args.needs_port());
        assert!(!args.version);
        assert_eq!(args.output, OutputFormat::Text);
    }

    #[test]
    fn test_port_and_baud_flags() {
        let args = Args::try_parse_from(["atcli", "--port", "/dev/ttyUSB2", "--baud", "9600"]).unwrap();
        assert_eq!(args.port.as_deref(), Some("/dev/ttyUSB2"));
        assert_eq!(args.baud, Some(9600));
    }

    #[test]
    fn test_version_flag_parses_without_port() {
        let args = Args::try_parse_from(["atcli", "--version"]).unwrap();
        assert!(args.version);

        let args = Args::try_parse_from(["atcli", "-V"]).unwrap();
        assert!(args.version);
    }

    #[test]
    fn test_subcommands() {
        let args = Args::try_parse_from(["atcli", "send", "AT+CSQ", "--wait-ms", "250"]).unwrap();
        match args.command() {
            Command::Send { text, wait_ms } => {
                assert_eq!(text, "AT+CSQ");
                assert_eq!(wait_ms, 250);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let args = Args::try_parse_from(["atcli", "ports"]).unwrap();
        assert!(!args.needs_port());

        let args = Args::try_parse_from(["atcli", "-o", "json", "flow", "gps-start"]).unwrap();
        assert!(matches!(args.command(), Command::Flow { ref name } if name == "gps-start"));
        assert_eq!(args.output, OutputFormat::Json);
    }

    #[test]
    fn test_invalid_baud_rejected() {
        assert!(Args::try_parse_from(["atcli", "--baud", "fast"]).is_err());
    }
}
