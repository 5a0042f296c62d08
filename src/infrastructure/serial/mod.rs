// Serial module - Opening physical serial ports
pub mod port;

pub use port::{list_ports, open_port};
