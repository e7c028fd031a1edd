//! Duplex stream abstraction, the shape the host terminal expects of its
//! backing transport.
//!
//! Concrete implementations:
//! - [`ChunkedNotifyStream`](crate::stream::ChunkedNotifyStream): BLE TX notify / RX write
//! - [`NullStream`]: nothing attached
//!
//! The [`Terminal`](crate::terminal::Terminal) is generic over
//! `DuplexStream`, so swapping the console from UART to BLE changes no
//! terminal logic.

/// Byte-oriented, non-blocking duplex channel.
pub trait DuplexStream {
    /// Take up to `size` bytes (all available for `None`).  Empty when
    /// nothing is buffered.
    fn read(&mut self, size: Option<usize>) -> Vec<u8>;

    /// Copy up to `buf.len()` bytes into `buf`.
    ///
    /// Returns `None` when no bytes were available.  There is no separate
    /// "closed" signal: `None` always means "nothing right now".
    fn read_into(&mut self, buf: &mut [u8]) -> Option<usize>;

    /// Queue `data` for output.  Returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> usize;

    /// Whether `read` would return data.
    fn poll_readable(&self) -> bool;
}

/// A stream that discards all writes and never has input.
/// Stands in for the console when no BLE transport is attached.
pub struct NullStream;

impl DuplexStream for NullStream {
    fn read(&mut self, _size: Option<usize>) -> Vec<u8> {
        Vec::new()
    }

    fn read_into(&mut self, _buf: &mut [u8]) -> Option<usize> {
        None
    }

    fn write(&mut self, data: &[u8]) -> usize {
        data.len()
    }

    fn poll_readable(&self) -> bool {
        false
    }
}
