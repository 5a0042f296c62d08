use crate::cli::commands::{subscribe_printers, unsubscribe_all};
use crate::cli::output::OutputWriter;
use crate::core::engine::ModemEngine;
use crate::core::events::Event;
use crate::domain::command::Command;
use crate::domain::config::AtCliConfig;
use crate::domain::error::AtCliResult;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// What one line typed at the console asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Empty,
    /// Raw AT command text
    Command(String),
    RunFlow(String),
    ListFlows,
    Quit,
    Unknown(String),
}

/// Lines starting with `/` are console commands; anything else goes to the modem.
pub fn parse_input(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Empty;
    }

    let Some(request) = line.strip_prefix('/') else {
        return ConsoleInput::Command(line.to_string());
    };

    let mut parts = request.split_whitespace();
    match (parts.next(), parts.collect::<Vec<_>>()) {
        (Some("atmodem"), args) if !args.is_empty() => ConsoleInput::Command(args.join(" ")),
        (Some("flow"), args) if args.len() == 1 => ConsoleInput::RunFlow(args[0].to_string()),
        (Some("flows"), _) => ConsoleInput::ListFlows,
        (Some("quit"), _) => ConsoleInput::Quit,
        (Some(name), _) => ConsoleInput::Unknown(name.to_string()),
        (None, _) => ConsoleInput::Empty,
    }
}

/// Read commands from stdin until EOF, `/quit` or Ctrl+C
pub async fn run_console(
    engine: &ModemEngine,
    config: &AtCliConfig,
    writer: Arc<dyn OutputWriter>,
) -> AtCliResult<()> {
    let bus = engine.bus();
    let printers = subscribe_printers(bus, &writer);
    writer.write_message("Type AT commands, /flows, /flow NAME or /quit")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result = loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => break Ok(()),
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e.into()),
        };

        match parse_input(&line) {
            ConsoleInput::Empty => {}
            ConsoleInput::Command(text) => {
                bus.publish(Event::CommandRequested(Command::unowned(text)));
            }
            ConsoleInput::RunFlow(name) => match config.find_flow(&name) {
                Some(definition) => {
                    debug!(flow = %name, "flow requested from console");
                    bus.publish(Event::FlowRequested(definition.to_flow()));
                }
                None => writer.write_error(&format!("Unknown flow: {}", name))?,
            },
            ConsoleInput::ListFlows => writer.write_flows(&config.flows)?,
            ConsoleInput::Quit => break Ok(()),
            ConsoleInput::Unknown(name) => {
                writer.write_error(&format!("Unknown command: /{}", name))?;
            }
        }
    };

    unsubscribe_all(bus, printers);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_modem_command() {
        assert_eq!(parse_input("AT+CSQ\n"), ConsoleInput::Command("AT+CSQ".to_string()));
        assert_eq!(
            parse_input("/atmodem AT+CMGF=1"),
            ConsoleInput::Command("AT+CMGF=1".to_string())
        );
    }

    #[test]
    fn test_console_commands() {
        assert_eq!(parse_input("   "), ConsoleInput::Empty);
        assert_eq!(parse_input("/"), ConsoleInput::Empty);
        assert_eq!(parse_input("/flows"), ConsoleInput::ListFlows);
        assert_eq!(parse_input("/quit"), ConsoleInput::Quit);
        assert_eq!(
            parse_input("/flow gps-start"),
            ConsoleInput::RunFlow("gps-start".to_string())
        );
        assert_eq!(parse_input("/flow"), ConsoleInput::Unknown("flow".to_string()));
        assert_eq!(parse_input("/signal"), ConsoleInput::Unknown("signal".to_string()));
    }
}
