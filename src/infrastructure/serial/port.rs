use std::time::Duration;
use tracing::info;

use crate::core::engine::PortLink;
use crate::domain::config::{FlowControlConfig, ParityConfig, SerialSettings};
use crate::domain::error::{AtCliError, AtCliResult};

/// Open the configured port and split it into independent read and write halves.
pub fn open_port(settings: &SerialSettings) -> AtCliResult<PortLink> {
    let data_bits = match settings.data_bits {
        5 => serialport::DataBits::Five,
        6 => serialport::DataBits::Six,
        7 => serialport::DataBits::Seven,
        8 => serialport::DataBits::Eight,
        other => {
            return Err(AtCliError::Config {
                message: format!("Invalid data bits: {}", other),
            })
        }
    };

    let stop_bits = match settings.stop_bits {
        1 => serialport::StopBits::One,
        2 => serialport::StopBits::Two,
        other => {
            return Err(AtCliError::Config {
                message: format!("Invalid stop bits: {}", other),
            })
        }
    };

    let parity = match settings.parity {
        ParityConfig::None => serialport::Parity::None,
        ParityConfig::Even => serialport::Parity::Even,
        ParityConfig::Odd => serialport::Parity::Odd,
    };

    let flow_control = match settings.flow_control {
        FlowControlConfig::None => serialport::FlowControl::None,
        FlowControlConfig::Software => serialport::FlowControl::Software,
        FlowControlConfig::Hardware => serialport::FlowControl::Hardware,
    };

    let port_error = |source: serialport::Error| AtCliError::PortOpen {
        port: settings.port.clone(),
        source,
    };

    let reader = serialport::new(&settings.port, settings.baud_rate)
        .data_bits(data_bits)
        .stop_bits(stop_bits)
        .parity(parity)
        .flow_control(flow_control)
        .timeout(Duration::from_millis(settings.read_timeout_ms))
        .open()
        .map_err(port_error)?;
    let writer = reader.try_clone().map_err(port_error)?;

    info!(port = %settings.port, baud = settings.baud_rate, "Serial port opened successfully");

    Ok(PortLink::new(Box::new(reader), Box::new(writer)))
}

/// Names of the serial ports present on this machine
pub fn list_ports() -> AtCliResult<Vec<String>> {
    let ports = serialport::available_ports().map_err(|e| AtCliError::Config {
        message: format!("Failed to list serial ports: {}", e),
    })?;
    Ok(ports.into_iter().map(|port| port.port_name).collect())
}
