//! # GrblKit Protocol
//!
//! Client-side protocol engine for GRBL/FluidNC-style CNC controllers:
//! command encoding, incremental response framing, status-report
//! decoding, and the command/acknowledgement handshake. Transport
//! adapters live in `grblkit-transport`; this crate only consumes the
//! [`Transport`] capability.

pub mod command;
pub mod machine;
pub mod response;
pub mod transport;

pub use command::{Command, CommandWriter};
pub use machine::{GrblMachine, COMMAND_RESPONSE_TIMEOUT};
pub use response::{classify, Response, ResponseKind, StatusFields};
pub use transport::Transport;
