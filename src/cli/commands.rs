use crate::cli::args::{Args, Command, ConfigCommand};
use crate::cli::console::run_console;
use crate::cli::output::{ConsoleWriter, OutputWriter};
use crate::core::engine::ModemEngine;
use crate::core::events::{Event, EventBus, EventKind, SubscriptionToken};
use crate::domain::command::Command as AtCommand;
use crate::domain::config::AtCliConfig;
use crate::domain::error::{AtCliError, AtCliResult};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::serial::{list_ports, open_port};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info_span;

/// Version metadata, optionally stamped in at build time
pub fn version_text() -> String {
    format!(
        "ATCLI - AT Command Line Interface\nVersion: {}\nBuild Time: {}\nGit Commit: {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("ATCLI_BUILD_TIME").unwrap_or("not set"),
        option_env!("ATCLI_GIT_COMMIT").unwrap_or("not set"),
    )
}

/// Load configuration and apply command line overrides
pub fn load_config(args: &Args) -> AtCliResult<AtCliConfig> {
    let config_manager = ConfigManager::new();
    let mut config = match &args.config {
        Some(path) => config_manager.load_config_from_path(path.as_ref())?,
        None => config_manager.load_config()?,
    };

    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    Ok(config)
}

/// Execute CLI command
pub async fn execute_command(args: Args) -> AtCliResult<ExitCode> {
    let writer: Arc<dyn OutputWriter> = Arc::new(ConsoleWriter::new(args.output));
    let config = load_config(&args)?;

    if !args.quiet {
        if let Err(e) = init_logging(&config.global.log_level, args.verbose) {
            writer.write_error(&format!("Failed to initialize logging: {}", e))?;
        }
    }

    match args.command() {
        Command::Ports => {
            writer.write_ports(&list_ports()?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { command } => execute_config_command(command, writer.as_ref(), &config),
        command => {
            // Anything that talks to the modem needs the port; failing to open it is fatal.
            let link = open_port(&config.serial)?;
            let span = info_span!("atcli", port = %config.serial.port);
            let bus = Arc::new(EventBus::new(info_span!(parent: &span, "events")));
            let engine = ModemEngine::start(bus, link, config.timing.clone(), span);

            let result = execute_modem_command(command, &engine, &config, writer).await;
            engine.shutdown().await;
            result
        }
    }
}

async fn execute_modem_command(
    command: Command,
    engine: &ModemEngine,
    config: &AtCliConfig,
    writer: Arc<dyn OutputWriter>,
) -> AtCliResult<ExitCode> {
    match command {
        Command::Send { text, wait_ms } => {
            let printers = subscribe_printers(engine.bus(), &writer);
            engine
                .bus()
                .publish(Event::CommandRequested(AtCommand::unowned(text)));
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            unsubscribe_all(engine.bus(), printers);
            Ok(ExitCode::SUCCESS)
        }
        Command::Flow { name } => {
            let definition = config
                .find_flow(&name)
                .ok_or_else(|| AtCliError::InvalidInput(format!("Unknown flow: {}", name)))?;

            let printers = subscribe_printers(engine.bus(), &writer);
            let report = engine.run_flow(definition.to_flow()).await;
            unsubscribe_all(engine.bus(), printers);

            writer.write_flow_report(&report)?;
            Ok(if report.succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        _ => {
            run_console(engine, config, writer).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn execute_config_command(
    command: ConfigCommand,
    writer: &dyn OutputWriter,
    config: &AtCliConfig,
) -> AtCliResult<ExitCode> {
    match command {
        ConfigCommand::Show => writer.write_config(config)?,
        ConfigCommand::Flows => writer.write_flows(&config.flows)?,
        ConfigCommand::Init { dir } => {
            let root = match dir {
                Some(dir) => PathBuf::from(dir),
                None => std::env::current_dir()?,
            };
            let path = ConfigManager::new().init_project_config(&root)?;
            writer.write_message(&format!(
                "Project configuration initialized at '{}'",
                path.display()
            ))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Render response and transport-error events through the writer
pub fn subscribe_printers(bus: &EventBus, writer: &Arc<dyn OutputWriter>) -> Vec<SubscriptionToken> {
    let responses = Arc::clone(writer);
    let errors = Arc::clone(writer);
    vec![
        bus.subscribe(EventKind::ResponseReceived, move |event| {
            if let Event::ResponseReceived(response) = event {
                responses.write_response(response)?;
            }
            Ok(())
        }),
        bus.subscribe(EventKind::TransportError, move |event| {
            if let Event::TransportError(error) = event {
                errors.write_transport_error(&error.to_string())?;
            }
            Ok(())
        }),
    ]
}

pub fn unsubscribe_all(bus: &EventBus, tokens: Vec<SubscriptionToken>) {
    for token in tokens {
        bus.unsubscribe(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_version_text() {
        let text = version_text();
        assert!(text.starts_with("ATCLI - AT Command Line Interface"));
        assert!(text.contains(env!("CARGO_PKG_VERSION")));
        assert!(text.contains("Git Commit:"));
    }

    #[test]
    fn test_cli_overrides_config() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("atcli.toml");
        std::fs::write(&path, "[serial]\nport = \"/dev/ttyS1\"\nbaud_rate = 9600\n").unwrap();

        let path_str = path.to_str().unwrap();
        let args = Args::try_parse_from(["atcli", "--config", path_str, "--baud", "57600"]).unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyS1");
        assert_eq!(config.serial.baud_rate, 57600);
    }

    #[test]
    fn test_printers_subscribe_and_unsubscribe() {
        let bus = EventBus::default();
        let writer: Arc<dyn OutputWriter> =
            Arc::new(ConsoleWriter::new(crate::cli::args::OutputFormat::Text));

        let tokens = subscribe_printers(&bus, &writer);
        assert_eq!(bus.handler_count(EventKind::ResponseReceived), 1);
        assert_eq!(bus.handler_count(EventKind::TransportError), 1);

        unsubscribe_all(&bus, tokens);
        assert_eq!(bus.handler_count(EventKind::ResponseReceived), 0);
        assert_eq!(bus.handler_count(EventKind::TransportError), 0);
    }
}
