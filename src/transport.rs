//! # Character transport
//!
//! The byte channel (typically a UART) the AT engine talks over. Implementations are provided by the board
//! support layer; this crate only consumes the trait.
use fugit::MicrosDurationU32;

/// Failure of a single transport call
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// No (more) data arrived within the given timeout
    #[error("transport timed out")]
    Timeout,

    /// Hardware or driver failure
    #[error("transport device error")]
    Device,
}

/// Byte-oriented duplex channel with per call timeouts
pub trait Transport {
    /// Blocking transmission of the whole buffer
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Reads up to `buffer.len()` bytes and returns the number of bytes read.
    ///
    /// Waits at most `first_byte_timeout` for the first byte and at most `inter_char_timeout` between any two
    /// following bytes. Returns [TransportError::Timeout] if no byte arrived at all. Returning less than
    /// `buffer.len()` bytes is allowed.
    fn read_timeout(
        &mut self,
        buffer: &mut [u8],
        first_byte_timeout: MicrosDurationU32,
        inter_char_timeout: MicrosDurationU32,
    ) -> Result<usize, TransportError>;

    /// Returns the number of received bytes which are readable without blocking
    fn available(&mut self) -> Result<usize, TransportError>;

    /// Drains all pending receive data until the line stays quiet
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Returns the currently configured baud rate
    fn baud_rate(&mut self) -> Result<u32, TransportError>;

    /// Changes the baud rate
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), TransportError>;
}

/// Cooperative hook invoked during long blocking operations, e.g. for refreshing a watchdog
pub trait BusyHandler {
    fn on_busy(&mut self);
}

impl<F: FnMut()> BusyHandler for F {
    fn on_busy(&mut self) {
        self()
    }
}

/// Busy handler doing nothing
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopBusyHandler;

impl BusyHandler for NoopBusyHandler {
    fn on_busy(&mut self) {}
}
