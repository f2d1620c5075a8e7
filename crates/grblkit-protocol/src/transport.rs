//! Transport capability consumed by the protocol engine
//!
//! The engine talks to the controller exclusively through this trait;
//! concrete adapters (serial, websocket) live in `grblkit-transport`
//! and own reconnection/keepalive policy themselves.

use grblkit_core::Result;

/// Byte-level transport to a GRBL controller.
pub trait Transport {
    /// Number of bytes ready to read without blocking.
    fn available(&mut self) -> usize;

    /// Read one byte. Returns `None` when nothing is available.
    fn read_byte(&mut self) -> Option<u8>;

    /// Write one byte.
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    /// Write a full buffer. Defaults to repeated `write_byte`.
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        for &byte in data {
            self.write_byte(byte)?;
        }
        Ok(())
    }
}
