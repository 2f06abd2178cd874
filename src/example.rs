//! Mocks for doc examples
use crate::transport::{Transport, TransportError};
use core::convert::Infallible;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use fugit::{MicrosDurationU32, TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;
use heapless::Vec;

/// Transport mock answering complete command lines with canned modem responses
#[derive(Default)]
pub struct ExampleTransport {
    /// Sent bytes of the current command line
    line: Vec<u8, 256>,

    /// Pending response bytes
    rx: Vec<u8, 256>,

    /// Read position in `rx`
    position: usize,
}

impl ExampleTransport {
    fn respond(&mut self) {
        let response: &[u8] = match self.line.as_slice() {
            b"AT+CIMI\r" => b"\r\n234150000000001\r\n\r\nOK\r\n",
            b"AT+CSQ\r" => b"\r\n+CSQ: 17,99\r\n\r\nOK\r\n",
            b"AT+COPS?\r" => b"\r\n+COPS: 0,0,\"EE\",2\r\n\r\nOK\r\n",
            b"AT+CREG?\r" => b"\r\n+CREG: 2,1,\"1A2B\",\"00C3D4E5\",2\r\n\r\nOK\r\n",
            _ => b"\r\nOK\r\n",
        };

        self.line.clear();
        self.rx.clear();
        self.position = 0;
        let _ = self.rx.extend_from_slice(response);
    }
}

impl Transport for ExampleTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        for byte in data {
            self.line.push(*byte).map_err(|_| TransportError::Device)?;

            if *byte == b'\r' {
                self.respond();
            }
        }

        Ok(())
    }

    fn read_timeout(
        &mut self,
        buffer: &mut [u8],
        _first_byte_timeout: MicrosDurationU32,
        _inter_char_timeout: MicrosDurationU32,
    ) -> Result<usize, TransportError> {
        let pending = &self.rx[self.position..];
        if pending.is_empty() {
            return Err(TransportError::Timeout);
        }

        let length = pending.len().min(buffer.len());
        buffer[..length].copy_from_slice(&pending[..length]);
        self.position += length;
        Ok(length)
    }

    fn available(&mut self) -> Result<usize, TransportError> {
        Ok(self.rx.len() - self.position)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.rx.clear();
        self.position = 0;
        Ok(())
    }

    fn baud_rate(&mut self) -> Result<u32, TransportError> {
        Ok(115_200)
    }

    fn set_baud_rate(&mut self, _baud_rate: u32) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Power pin mock
#[derive(Default)]
pub struct ExamplePin {
    pub high: bool,
}

impl ErrorType for ExamplePin {
    type Error = Infallible;
}

impl OutputPin for ExamplePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

/// Delay mock returning immediately
pub struct ExampleDelay;

impl DelayNs for ExampleDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Timer mock, advancing by one millisecond on every `now()` call
#[derive(Default)]
pub struct ExampleTimer {
    ticks: u32,
}

impl Timer<1_000_000> for ExampleTimer {
    type Error = u32;

    fn now(&mut self) -> TimerInstantU32<1000000> {
        self.ticks = self.ticks.wrapping_add(1_000);
        TimerInstantU32::from_ticks(self.ticks)
    }

    fn start(&mut self, _duration: TimerDurationU32<1000000>) -> Result<(), Self::Error> {
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        nb::Result::Err(nb::Error::WouldBlock)
    }
}
