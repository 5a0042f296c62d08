// Transport module - Serial line ownership, framing and I/O
pub mod arbiter;
pub mod framer;
pub mod serial;

pub use arbiter::{OwnershipArbiter, WriteGrant};
pub use framer::{LineFramer, MAX_LINE_BYTES};
pub use serial::{ReadLoop, SerialTransport, LINE_TERMINATOR};
