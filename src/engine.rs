//! # AT engine
//!
//! Turns typed requests into wire bytes and wire bytes into typed responses, always under timeout.
//!
//! Commands are composed from [templates](crate::template), prefixed with `AT` and terminated by `\r`. Responses
//! are matched byte by byte against a response template. The most recent response bytes are retained in a small
//! last line buffer, so that a response which did not match can be interpreted again against a different template,
//! e.g. an error report.
//!
//! ## Example
//!
//! ````
//! use sara_at::engine::AtEngine;
//! use sara_at::template::Capture;
//! use sara_at::example::ExampleTransport;
//! use sara_at::transport::NoopBusyHandler;
//! use fugit::ExtU32;
//!
//! let mut engine: AtEngine<_, _, 256> = AtEngine::new(ExampleTransport::default(), NoopBusyHandler).unwrap();
//! engine.send(b"+CSQ", &[]).unwrap();
//!
//! let (mut power, mut quality) = (0, 0);
//! engine
//!     .expect(b"+CSQ: %u,%u", 200.millis(), &mut [Capture::Uint(&mut power), Capture::Uint(&mut quality)])
//!     .unwrap();
//! assert_eq!((17, 99), (power, quality));
//! ````
use crate::fmt::printable;
use crate::template::{compose, match_template, Arg, ByteSource, Capture, Replay, END_CHARACTER};
use crate::transport::{BusyHandler, Transport, TransportError};
use embedded_io::{Read, Write};
use fugit::{MicrosDurationU32, MillisDurationU32};
use heapless::Vec;

/// Prefix of every composed command
pub const COMMAND_PREFIX: &[u8] = b"AT";

/// Max. length of a composed command including prefix and terminator
pub const MAX_COMMAND_SIZE: usize = 256;

/// Capacity of the last line buffer
pub const LAST_LINE_SIZE: usize = 64;

/// HTTP status code signaling success
pub const HTTP_CODE_SUCCESS: u16 = 200;

/// Start/stop bit + 8 data bits
const BITS_PER_CHARACTER: u32 = 10;

/// Inter character timeout in multiples of a single character transmission time
const TIMING_MARGIN: u32 = 100;

const HTTP_STATUS_LINE: &[u8] = b"HTTP/%u.%u %u";
const HTTP_HEADER_END: &[u8] = b"\r\n\r\n";

/// AT engine errors
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No (complete) response within the timeout
    #[error("timeout")]
    Timeout,

    /// Buffered response did not match the template
    #[error("unexpected response")]
    UnexpectedResponse,

    /// Transport or file store failure
    #[error("device error")]
    Device,

    /// Unknown placeholder or placeholder without matching argument/capture
    #[error("format not supported")]
    FormatNotSupported,

    /// Captured integer or composed command exceeds its bound
    #[error("buffer overflow")]
    BufferOverflow,

    /// HTTP response with the given non-success status code
    #[error("HTTP status {0}")]
    Http(u16),
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Timeout => Error::Timeout,
            TransportError::Device => Error::Device,
        }
    }
}

/// Result of a successfully scanned HTTP header
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HttpHeader {
    /// HTTP status code
    pub status: u16,

    /// Consumed header length in bytes, including the terminating empty line
    pub length: u32,
}

/// AT session on top of a transport
///
/// CHUNK_SIZE: Chunk size in bytes for bulk transfers from/to files or buffers. The busy handler is called after
/// every chunk. Higher values result in better performance, but introduce also higher stack memory footprint.
pub struct AtEngine<T: Transport, B: BusyHandler, const CHUNK_SIZE: usize> {
    /// Underlying byte channel
    pub(crate) transport: T,

    /// Called during long blocking operations
    busy: B,

    /// Max. time between two characters
    char_timeout: MicrosDurationU32,

    /// Most recently received response bytes, reset on each expect() call
    last_line: Vec<u8, LAST_LINE_SIZE>,
}

impl<T: Transport, B: BusyHandler, const CHUNK_SIZE: usize> AtEngine<T, B, CHUNK_SIZE> {
    /// Creates a new engine. The inter character timeout is derived from the current baud rate of the transport.
    pub fn new(mut transport: T, busy: B) -> Result<Self, Error> {
        let baud_rate = transport.baud_rate()?;
        if baud_rate == 0 {
            return Err(Error::Device);
        }

        let micros = (BITS_PER_CHARACTER * TIMING_MARGIN * 1_000_000) / baud_rate;
        debug!("AT engine: baud rate {}, char timeout {} us", baud_rate, micros);

        Ok(Self {
            transport,
            busy,
            char_timeout: MicrosDurationU32::from_ticks(micros.max(1)),
            last_line: Vec::new(),
        })
    }

    /// Composes and sends a command: `AT` + expanded template + `\r`
    pub fn send(&mut self, template: &[u8], args: &[Arg<'_>]) -> Result<(), Error> {
        let mut command: Vec<u8, MAX_COMMAND_SIZE> = Vec::new();
        command.extend_from_slice(COMMAND_PREFIX).map_err(|_| Error::BufferOverflow)?;
        compose(&mut command, template, args)?;

        trace!("AT send: {}", printable(&command));
        self.transport.send(&command).map_err(|_| Error::Device)
    }

    /// Sends the given bytes unmodified
    pub fn send_raw(&mut self, data: &[u8]) -> Result<(), Error> {
        trace!("AT send raw: {} bytes", data.len());
        self.transport.send(data)?;
        Ok(())
    }

    /// Sends the given bytes unmodified, followed by a separate `\r` transmission
    pub fn send_raw_with_cr(&mut self, data: &[u8]) -> Result<(), Error> {
        self.send_raw(data)?;
        self.transport.send(&[END_CHARACTER])?;
        Ok(())
    }

    /// Reads until the template is matched. Returns the number of bytes consumed from the wire.
    ///
    /// The first byte needs to arrive within `timeout`, every following byte within the inter character timeout.
    pub fn expect(
        &mut self,
        template: &[u8],
        timeout: MillisDurationU32,
        captures: &mut [Capture<'_>],
    ) -> Result<usize, Error> {
        self.last_line.clear();

        let mut wire = Wire {
            transport: &mut self.transport,
            last_line: &mut self.last_line,
            first_byte_timeout: to_micros(timeout),
            char_timeout: self.char_timeout,
            bytes_read: 0,
        };

        let result = match_template(&mut wire, template, captures);
        let bytes_read = wire.bytes_read;

        match result {
            Ok(()) => {
                trace!("AT expect: matched {} ({} bytes)", printable(template), bytes_read);
                Ok(bytes_read)
            }
            Err(error) => {
                trace!(
                    "AT expect: {} failed with {:?}, received {}",
                    printable(template),
                    error,
                    printable(&self.last_line)
                );
                Err(error)
            }
        }
    }

    /// Matches the template against the bytes retained from the last [expect](Self::expect) call
    pub fn expect_last_line(&mut self, template: &[u8], captures: &mut [Capture<'_>]) -> Result<(), Error> {
        match_template(&mut Replay::new(&self.last_line), template, captures)
    }

    /// Returns the bytes retained from the last [expect](Self::expect) call
    pub fn last_line(&self) -> &[u8] {
        &self.last_line
    }

    /// Scans a HTTP header, which is part of a response of `total_length` bytes.
    ///
    /// On success status (200) the header is consumed up to and including the terminating empty line. On any other
    /// status the remaining response (`total_length` - consumed bytes) is discarded and [Error::Http] returned.
    pub fn expect_http_header(&mut self, total_length: u32) -> Result<HttpHeader, Error> {
        let (mut major, mut minor, mut status) = (0, 0, 0);
        let timeout = self.char_timeout_ms();

        let mut length = self.expect(
            HTTP_STATUS_LINE,
            timeout,
            &mut [
                Capture::Uint(&mut major),
                Capture::Uint(&mut minor),
                Capture::Uint(&mut status),
            ],
        )? as u32;

        let status = u16::try_from(status).map_err(|_| Error::UnexpectedResponse)?;
        debug!("HTTP/{}.{} status {}", major, minor, status);

        if status != HTTP_CODE_SUCCESS {
            self.discard(total_length.saturating_sub(length))?;
            return Err(Error::Http(status));
        }

        length += self.expect(HTTP_HEADER_END, timeout, &mut [])? as u32;
        Ok(HttpHeader { status, length })
    }

    /// Reads `length` bytes and writes them to the given file
    pub fn read_raw_to_file<F: Write>(
        &mut self,
        timeout: MillisDurationU32,
        length: u32,
        file: &mut F,
    ) -> Result<(), Error> {
        let mut buffer = [0x0; CHUNK_SIZE];
        let mut remaining = length as usize;

        while remaining > 0 {
            let chunk_length = remaining.min(CHUNK_SIZE);
            let received = self.read_chunk(timeout, &mut buffer[..chunk_length])?;
            remaining -= received;

            let written = file.write(&buffer[..received]).map_err(|_| Error::Device)?;
            if written != received {
                return Err(Error::Device);
            }

            self.busy.on_busy();
        }

        Ok(())
    }

    /// Reads exactly `buffer.len()` bytes into the buffer
    pub fn read_raw_to_buffer(&mut self, timeout: MillisDurationU32, buffer: &mut [u8]) -> Result<(), Error> {
        let mut position = 0;

        while position < buffer.len() {
            let end = buffer.len().min(position + CHUNK_SIZE);
            position += self.read_chunk(timeout, &mut buffer[position..end])?;
            self.busy.on_busy();
        }

        Ok(())
    }

    /// Streams `length` bytes of the given file to the wire
    pub fn send_raw_from_file<F: Read>(&mut self, file: &mut F, length: u32) -> Result<(), Error> {
        let mut buffer = [0x0; CHUNK_SIZE];
        let mut remaining = length as usize;

        while remaining > 0 {
            let chunk_length = remaining.min(CHUNK_SIZE);
            let read = file.read(&mut buffer[..chunk_length]).map_err(|_| Error::Device)?;

            // File is shorter than announced
            if read == 0 {
                return Err(Error::Device);
            }

            self.transport.send(&buffer[..read]).map_err(|_| Error::Device)?;
            remaining -= read;
            self.busy.on_busy();
        }

        Ok(())
    }

    /// Reads and drops `length` bytes
    pub fn discard(&mut self, length: u32) -> Result<(), Error> {
        trace!("AT discard: {} bytes", length);
        let mut byte = [0x0; 1];
        let mut discarded = 0;

        while discarded < length {
            let received = self.transport.read_timeout(&mut byte, self.char_timeout, self.char_timeout)?;
            if received == 0 {
                return Err(Error::Timeout);
            }
            discarded += received as u32;
        }

        Ok(())
    }

    /// Reads whatever arrives within the timeout, up to `buffer.len()` bytes
    pub fn receive_raw(&mut self, timeout: MillisDurationU32, buffer: &mut [u8]) -> Result<usize, Error> {
        let received = self.transport.read_timeout(buffer, to_micros(timeout), self.char_timeout)?;
        Ok(received)
    }

    /// Returns the number of received bytes pending in the transport
    pub fn available_raw(&mut self) -> Result<usize, Error> {
        Ok(self.transport.available()?)
    }

    /// Drains the receive buffer of the transport
    pub fn flush(&mut self) -> Result<(), Error> {
        self.transport.flush().map_err(|_| Error::Device)
    }

    /// Invokes the busy handler
    pub fn busy(&mut self) {
        self.busy.on_busy();
    }

    /// Returns the inter character timeout
    pub fn char_timeout(&self) -> MicrosDurationU32 {
        self.char_timeout
    }

    /// Inter character timeout in milliseconds, never zero
    fn char_timeout_ms(&self) -> MillisDurationU32 {
        MillisDurationU32::from_ticks((self.char_timeout.ticks() / 1_000).max(1))
    }

    /// Reads a single chunk, first byte within the given timeout
    fn read_chunk(&mut self, timeout: MillisDurationU32, buffer: &mut [u8]) -> Result<usize, Error> {
        let received = self.transport.read_timeout(buffer, to_micros(timeout), self.char_timeout)?;
        if received == 0 {
            return Err(Error::Timeout);
        }

        Ok(received)
    }

    /// Returns the transport and busy handler
    pub fn release(self) -> (T, B) {
        (self.transport, self.busy)
    }
}

/// Converts to microseconds, saturating at the max. representable duration (~71 minutes)
fn to_micros(timeout: MillisDurationU32) -> MicrosDurationU32 {
    MicrosDurationU32::from_ticks(timeout.ticks().saturating_mul(1_000))
}

/// Live byte source reading from the transport
struct Wire<'a, T: Transport> {
    transport: &'a mut T,
    last_line: &'a mut Vec<u8, LAST_LINE_SIZE>,
    first_byte_timeout: MicrosDurationU32,
    char_timeout: MicrosDurationU32,
    bytes_read: usize,
}

impl<T: Transport> Wire<'_, T> {
    fn read(&mut self, timeout: MicrosDurationU32) -> Result<u8, Error> {
        let mut byte = [0x0; 1];
        if self.transport.read_timeout(&mut byte, timeout, self.char_timeout)? == 0 {
            return Err(Error::Timeout);
        }

        self.bytes_read += 1;

        // Bytes beyond capacity are dropped
        let _ = self.last_line.push(byte[0]);
        Ok(byte[0])
    }
}

impl<T: Transport> ByteSource for Wire<'_, T> {
    fn first(&mut self) -> Result<u8, Error> {
        self.read(self.first_byte_timeout)
    }

    fn next(&mut self) -> Result<u8, Error> {
        self.read(self.char_timeout)
    }
}
