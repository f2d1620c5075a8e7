//! # GrblKit Transport
//!
//! Concrete transport adapters for the protocol engine: a serial port
//! adapter over the `serialport` crate and a WebSocket adapter (for
//! FluidNC's network interface) over `tungstenite`. The adapters own
//! connection lifecycle and keepalive policy; the engine sees only the
//! byte-level [`Transport`](grblkit_protocol::Transport) capability.

pub mod serial;
pub mod websocket;

pub use serial::{list_ports, SerialPortInfo, SerialTransport};
pub use websocket::{LinkConfig, LinkState, WebsocketTransport};
