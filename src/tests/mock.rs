use crate::transport::{Transport, TransportError};
use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::convert::Infallible;
use core::sync::atomic::{AtomicU32, Ordering};
use embedded_hal::delay::DelayNs;
use embedded_io::{ErrorKind as IoErrorKind, ErrorType, Read, Write};
use fugit::{MicrosDurationU32, TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer as FugitTimer;
use mockall::mock;

/// Scripted transport: every complete command line (terminated by `\r`) pops the next reply, which then becomes
/// readable. A `None` reply simulates a silent modem.
pub struct MockTransport {
    /// Bytes of each send() call
    chunks: Vec<Vec<u8>>,

    /// Complete command lines
    commands: Vec<Vec<u8>>,

    /// Current incomplete command line
    line: Vec<u8>,

    /// Replies which get returned in the same order as inserted
    replies: VecDeque<Option<&'static [u8]>>,

    /// Readable bytes
    rx: VecDeque<u8>,

    baud_rate: u32,

    /// Baud rate passed to set_baud_rate()
    changed_baud_rate: Option<u32>,

    flush_count: usize,

    /// Simulates a device error on send()
    send_fails: bool,

    /// Max. bytes returned by a single read_timeout() call
    read_limit: usize,

    /// First byte timeout of the last read_timeout() call
    last_timeout: Option<MicrosDurationU32>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            chunks: vec![],
            commands: vec![],
            line: vec![],
            replies: VecDeque::new(),
            rx: VecDeque::new(),
            baud_rate: 115_200,
            changed_baud_rate: None,
            flush_count: 0,
            send_fails: false,
            read_limit: usize::MAX,
            last_timeout: None,
        }
    }

    /// Adds a reply to the next command line
    pub fn add_reply(&mut self, reply: &'static [u8]) {
        self.replies.push_back(Some(reply));
    }

    /// Simulates a standard OK reply
    pub fn add_ok_reply(&mut self) {
        self.add_reply(b"\r\nOK\r\n");
    }

    /// Next command line is not answered
    pub fn add_no_reply(&mut self) {
        self.replies.push_back(None);
    }

    /// Makes the bytes readable immediately, independent of any command
    pub fn add_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    pub fn set_baud(&mut self, baud_rate: u32) {
        self.baud_rate = baud_rate;
    }

    pub fn fail_send(&mut self) {
        self.send_fails = true;
    }

    pub fn limit_reads(&mut self, limit: usize) {
        self.read_limit = limit;
    }

    /// Returns a copy of the sent command lines
    pub fn get_commands_as_strings(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|command| String::from_utf8(command.clone()).unwrap())
            .collect()
    }

    /// Returns all bytes of every send() call
    pub fn get_chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    pub fn get_changed_baud_rate(&self) -> Option<u32> {
        self.changed_baud_rate
    }

    pub fn get_flush_count(&self) -> usize {
        self.flush_count
    }

    /// Returns the number of bytes not read yet
    pub fn get_pending_count(&self) -> usize {
        self.rx.len()
    }

    pub fn get_last_timeout(&self) -> Option<MicrosDurationU32> {
        self.last_timeout
    }

    /// Returns the number of replies not consumed yet
    pub fn get_reply_count(&self) -> usize {
        self.replies.len()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.send_fails {
            return Err(TransportError::Device);
        }

        self.chunks.push(data.to_vec());

        for byte in data {
            self.line.push(*byte);

            if *byte == b'\r' {
                self.commands.push(core::mem::take(&mut self.line));

                if let Some(Some(reply)) = self.replies.pop_front() {
                    self.rx.extend(reply.iter().copied());
                }
            }
        }

        Ok(())
    }

    fn read_timeout(
        &mut self,
        buffer: &mut [u8],
        first_byte_timeout: MicrosDurationU32,
        _inter_char_timeout: MicrosDurationU32,
    ) -> Result<usize, TransportError> {
        self.last_timeout = Some(first_byte_timeout);

        if self.rx.is_empty() {
            return Err(TransportError::Timeout);
        }

        let length = buffer.len().min(self.rx.len()).min(self.read_limit);
        for (target, byte) in buffer.iter_mut().zip(self.rx.drain(..length)) {
            *target = byte;
        }

        Ok(length)
    }

    fn available(&mut self) -> Result<usize, TransportError> {
        Ok(self.rx.len())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.flush_count += 1;
        self.rx.clear();
        Ok(())
    }

    fn baud_rate(&mut self) -> Result<u32, TransportError> {
        Ok(self.baud_rate)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        self.changed_baud_rate = Some(baud_rate);
        self.baud_rate = baud_rate;
        Ok(())
    }
}

/// In-memory file
#[derive(Default)]
pub struct MockFile {
    pub data: Vec<u8>,

    /// Read position
    position: usize,

    /// Max. bytes accepted by a single write() call
    write_limit: Option<usize>,
}

impl MockFile {
    pub fn with_content(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            ..Self::default()
        }
    }

    /// Simulates a full file store
    pub fn limit_writes(&mut self, limit: usize) {
        self.write_limit = Some(limit);
    }
}

impl ErrorType for MockFile {
    type Error = IoErrorKind;
}

impl Read for MockFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let length = buf.len().min(self.data.len() - self.position);
        buf[..length].copy_from_slice(&self.data[self.position..self.position + length]);
        self.position += length;
        Ok(length)
    }
}

impl Write for MockFile {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let length = self.write_limit.map_or(buf.len(), |limit| buf.len().min(limit));
        self.data.extend_from_slice(&buf[..length]);
        Ok(length)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Shared uptime in milliseconds, advanced by [MockDelay]
#[derive(Clone, Default)]
pub struct MockClock(Arc<AtomicU32>);

impl MockClock {
    pub fn millis(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn advance(&self, millis: u32) {
        self.0.fetch_add(millis, Ordering::SeqCst);
    }

    /// Returns a timer mock reporting this clock
    pub fn timer(&self) -> MockTimer {
        let clock = self.clone();
        let mut timer = MockTimer::new();
        timer
            .expect_now()
            .returning(move || TimerInstantU32::from_ticks(clock.millis() * 1_000));
        timer
    }
}

/// Delay mock recording all delays and advancing the clock
pub struct MockDelay {
    clock: MockClock,

    /// Milliseconds of each delay_ms() call
    pub delays: Vec<u32>,
}

impl MockDelay {
    pub fn new(clock: MockClock) -> Self {
        Self { clock, delays: vec![] }
    }

    pub fn total_ms(&self) -> u32 {
        self.delays.iter().sum()
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.advance(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
        self.clock.advance(ms);
    }
}

/// Counts busy handler calls
#[derive(Clone, Default)]
pub struct BusyCounter(Arc<AtomicU32>);

impl BusyCounter {
    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn handler(&self) -> impl FnMut() {
        let counter = self.0.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

mock! {
    pub Timer{}

    impl FugitTimer<1_000_000> for Timer {
        type Error = Infallible;

        fn now(&mut self) -> TimerInstantU32<1000000>;
        fn start(&mut self, duration: TimerDurationU32<1000000>) -> Result<(), Infallible>;
        fn cancel(&mut self) -> Result<(), Infallible>;
        fn wait(&mut self) -> nb::Result<(), Infallible>;
    }
}
