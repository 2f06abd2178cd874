//! # SARA-U270 cellular modem
//!
//! Drives the modem through power-up, provisioning and HTTPS data transfer, using the [AT engine](crate::engine).
//!
//! The modem is powered by a dedicated output pin. After power-on the modem is considered `Booting` until it
//! acknowledges an attention command. Every operation first checks that the modem booted, polling it if required.
//!
//! When a response does not match, the modem may have reported a `+CME ERROR`. The numeric code gets recovered from
//! the already received bytes and is returned as part of the [Error].
//!
//! ## Example
//!
//! ````
//! use sara_at::cellular::{Config, Modem};
//! use sara_at::example::{ExampleDelay, ExamplePin, ExampleTimer, ExampleTransport};
//! use sara_at::transport::NoopBusyHandler;
//!
//! let mut modem: Modem<_, _, _, _, _, 1_000_000, 512> = Modem::new(
//!     ExampleTransport::default(),
//!     NoopBusyHandler,
//!     ExamplePin::default(),
//!     ExampleDelay,
//!     ExampleTimer::default(),
//!     Config::default(),
//! )
//! .unwrap();
//!
//! modem.power_on().unwrap();
//! modem.sync_comms().unwrap();
//!
//! let imsi = modem.check_sim().unwrap();
//! assert_eq!("234150000000001", imsi.as_str());
//! ````
use crate::commands::*;
use crate::engine::{AtEngine, Error as AtError};
use crate::responses::{
    to_string, to_u8, Download, Imsi, NetworkInfo, Rat, ABORTED, CELL_ID_LEN, CME_ERROR, DATA_PROMPT, FILE_HEADER,
    HTTP_GET_SUCCEEDED, HTTP_POST_SUCCEEDED, IMSI, IMSI_LEN, LOCAL_AREA_CODE_LEN, OK, OK_HTTP, OPERATOR, OPERATOR_LEN,
    REGISTRATION, SCAN_RESULT, SIGNAL_QUALITY,
};
use crate::template::{Arg, Capture};
use crate::transport::{BusyHandler, Transport};
use core::panic::Location;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_io::{Read, Write};
use fugit::{MillisDurationU32, TimerInstantU32};
use fugit_timer::Timer;
use heapless::Vec;

/// Duration the power line is held low when resetting an unresponsive modem
const RESET_PULSE_MS: u32 = 50;

/// Max. length of a remote file name echoed by the modem
const FILE_NAME_LEN: usize = 32;

/// Power and responsiveness state of the modem
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModemState {
    /// Power line is low
    Off,

    /// Powered, but did not acknowledge an attention command yet
    Booting,

    /// Powered and responsive
    On,

    /// Did not respond within the boot timeout. Power line was forced low, a new power-on attempts a reset.
    Unresponsive,
}

/// Cellular error kinds
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    #[error("timeout")]
    Timeout,

    #[error("unexpected response")]
    UnexpectedResponse,

    /// Transport, power pin or file store failure
    #[error("device error")]
    Device,

    #[error("format not supported")]
    FormatNotSupported,

    /// Captured value, command or payload exceeds its bound
    #[error("buffer overflow")]
    BufferOverflow,

    /// HTTP response with the given non-success status code
    #[error("HTTP status {0}")]
    Http(u16),

    /// Modem is off or did not respond within the boot timeout
    #[error("modem failed to boot")]
    FailedToBoot,
}

impl From<AtError> for ErrorKind {
    fn from(error: AtError) -> Self {
        match error {
            AtError::Timeout => ErrorKind::Timeout,
            AtError::UnexpectedResponse => ErrorKind::UnexpectedResponse,
            AtError::Device => ErrorKind::Device,
            AtError::FormatNotSupported => ErrorKind::FormatNotSupported,
            AtError::BufferOverflow => ErrorKind::BufferOverflow,
            AtError::Http(status) => ErrorKind::Http(status),
        }
    }
}

/// Error of a cellular operation
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("{kind}")]
pub struct Error {
    kind: ErrorKind,

    /// Code of a `+CME ERROR` report received instead of the expected response
    cme_code: Option<u16>,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the CME error code reported by the modem, if any
    pub fn cme_code(&self) -> Option<u16> {
        self.cme_code
    }

    fn with_cme_code(mut self, cme_code: Option<u16>) -> Self {
        self.cme_code = cme_code;
        self
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self { kind, cme_code: None }
    }
}

impl From<AtError> for Error {
    fn from(error: AtError) -> Self {
        ErrorKind::from(error).into()
    }
}

/// Packet switched data context credentials. Username and password are only configured if the username is not
/// empty.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Apn<'a> {
    pub name: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

/// Modem configuration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// UART baud rate set on initialization
    pub baud_rate: u32,

    /// Response timeout of regular commands
    pub command_timeout: MillisDurationU32,

    /// Response timeout of file system and query commands
    pub file_timeout: MillisDurationU32,

    /// Max. time between power-on and the first acknowledged attention command
    pub boot_timeout: MillisDurationU32,

    /// Delay between two boot polls
    pub poll_interval: MillisDurationU32,

    /// Max. IMSI query attempts
    pub sim_retries: u32,

    /// Delay between two IMSI query attempts
    pub sim_retry_delay: MillisDurationU32,

    /// Delay before starting a network scan
    pub scan_settle_delay: MillisDurationU32,

    /// Delay between the first scan result and aborting the scan
    pub scan_abort_delay: MillisDurationU32,

    /// Modem file names of the TLS credentials
    pub root_ca: &'static str,
    pub device_cert: &'static str,
    pub device_key: &'static str,

    /// Modem file storing HTTP responses and upload payloads
    pub temp_file: &'static str,

    /// Modem file storing the response of a POST request
    pub result_file: &'static str,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            baud_rate: 115_200,
            command_timeout: MillisDurationU32::millis(200),
            file_timeout: MillisDurationU32::millis(2_000),
            boot_timeout: MillisDurationU32::secs(10),
            poll_interval: MillisDurationU32::millis(100),
            sim_retries: 20,
            sim_retry_delay: MillisDurationU32::millis(100),
            scan_settle_delay: MillisDurationU32::millis(1_000),
            scan_abort_delay: MillisDurationU32::millis(50),
            root_ca: "root-CA.pem",
            device_cert: "deviceCert.pem",
            device_key: "deviceCert.key",
            temp_file: "TEMP.DAT",
            result_file: "RESULT.DAT",
        }
    }

    pub const fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub const fn with_command_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub const fn with_file_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.file_timeout = timeout;
        self
    }

    pub const fn with_boot_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.boot_timeout = timeout;
        self
    }

    pub const fn with_poll_interval(mut self, interval: MillisDurationU32) -> Self {
        self.poll_interval = interval;
        self
    }

    pub const fn with_sim_retries(mut self, retries: u32, delay: MillisDurationU32) -> Self {
        self.sim_retries = retries;
        self.sim_retry_delay = delay;
        self
    }

    pub const fn with_scan_delays(mut self, settle: MillisDurationU32, abort: MillisDurationU32) -> Self {
        self.scan_settle_delay = settle;
        self.scan_abort_delay = abort;
        self
    }

    pub const fn with_credentials(
        mut self,
        root_ca: &'static str,
        device_cert: &'static str,
        device_key: &'static str,
    ) -> Self {
        self.root_ca = root_ca;
        self.device_cert = device_cert;
        self.device_key = device_key;
        self
    }

    pub const fn with_files(mut self, temp_file: &'static str, result_file: &'static str) -> Self {
        self.temp_file = temp_file;
        self.result_file = result_file;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// SARA-U270 modem controller
///
/// TIMER_HZ: Tick rate of the uptime clock
///
/// CHUNK_SIZE: Chunk size in bytes for file transfers, s. [AtEngine]
pub struct Modem<
    T: Transport,
    B: BusyHandler,
    P: OutputPin,
    D: DelayNs,
    C: Timer<TIMER_HZ>,
    const TIMER_HZ: u32,
    const CHUNK_SIZE: usize,
> {
    engine: AtEngine<T, B, CHUNK_SIZE>,

    /// Power enable line
    power_pin: P,

    pub(crate) delay: D,

    /// Uptime clock used for boot timeout measurement
    clock: C,

    state: ModemState,

    /// Uptime of the last transition to Booting
    boot_started_at: TimerInstantU32<TIMER_HZ>,

    /// Source location of the last failure
    last_fault: Option<&'static Location<'static>>,

    config: Config,
}

impl<T, B, P, D, C, const TIMER_HZ: u32, const CHUNK_SIZE: usize> Modem<T, B, P, D, C, TIMER_HZ, CHUNK_SIZE>
where
    T: Transport,
    B: BusyHandler,
    P: OutputPin,
    D: DelayNs,
    C: Timer<TIMER_HZ>,
{
    /// Drives the power line low, changes the transport baud rate and sets up the AT engine
    pub fn new(mut transport: T, busy: B, mut power_pin: P, delay: D, clock: C, config: Config) -> Result<Self, Error> {
        power_pin.set_low().map_err(|_| ErrorKind::Device)?;
        transport.set_baud_rate(config.baud_rate).map_err(|_| ErrorKind::Device)?;

        Ok(Self {
            engine: AtEngine::new(transport, busy)?,
            power_pin,
            delay,
            clock,
            state: ModemState::Off,
            boot_started_at: TimerInstantU32::from_ticks(0),
            last_fault: None,
            config,
        })
    }

    /// Powers the modem. An unresponsive modem is reset by pulling the power line low first.
    pub fn power_on(&mut self) -> Result<(), Error> {
        self.last_fault = None;

        if self.state == ModemState::Unresponsive {
            warn!("Modem unresponsive, resetting");
            self.power_pin.set_low().map_err(|_| self.fail(ErrorKind::Device))?;
            self.delay.delay_ms(RESET_PULSE_MS);
        }

        self.power_pin.set_high().map_err(|_| self.fail(ErrorKind::Device))?;

        if matches!(self.state, ModemState::Off | ModemState::Unresponsive) {
            self.boot_started_at = self.clock.now();
            self.state = ModemState::Booting;
            debug!("Modem booting");
        }

        Ok(())
    }

    /// Cuts the modem power
    pub fn power_off(&mut self) -> Result<(), Error> {
        self.last_fault = None;
        self.power_pin.set_low().map_err(|_| self.fail(ErrorKind::Device))?;
        self.state = ModemState::Off;
        debug!("Modem off");
        Ok(())
    }

    /// Powers the modem and synchronizes communication. Returns true if the modem responded.
    pub fn is_present(&mut self) -> bool {
        self.power_on().is_ok() && self.sync_comms().is_ok()
    }

    /// Disables command echo and message waiting indications, enables numeric error reports
    pub fn sync_comms(&mut self) -> Result<(), Error> {
        self.last_fault = None;
        self.ensure_booted()?;

        self.engine.flush().map_err(|error| self.fail(error))?;
        self.engine.send_raw_with_cr(DISABLE_ECHO).map_err(|error| self.fail(error))?;
        self.expect_response(OK, self.config.command_timeout, &mut [])?;

        self.transaction(DISABLE_UMWI, &[], self.config.command_timeout)?;
        self.transaction(ENABLE_CME_ERRORS, &[], self.config.command_timeout)
    }

    /// Waits until the SIM is ready and returns its IMSI.
    ///
    /// The query is repeated as long as the modem times out, reports malformed digits or an all-zero IMSI, which is
    /// the case while the SIM is still booting. Returns [ErrorKind::Timeout] once all attempts are exhausted.
    pub fn check_sim(&mut self) -> Result<Imsi, Error> {
        self.last_fault = None;
        self.ensure_booted()?;

        let mut cme_code = None;

        for attempt in 1..=self.config.sim_retries {
            self.command(REQUEST_IMSI, &[])?;

            let mut captured: Vec<u8, IMSI_LEN> = Vec::new();
            match self.engine.expect(IMSI, self.config.command_timeout, &mut [Capture::Str(&mut captured)]) {
                Ok(_) => {}
                Err(AtError::Timeout) => {
                    cme_code = self.recover_cme_code();
                    warn!("IMSI query timed out (attempt {})", attempt);
                    self.delay.delay_ms(self.config.sim_retry_delay.ticks());
                    continue;
                }
                Err(error) => {
                    let cme_code = self.recover_cme_code();
                    return Err(self.fail(error).with_cme_code(cme_code));
                }
            }

            let Some(imsi) = Imsi::from_captured(&captured) else {
                cme_code = self.recover_cme_code();
                warn!("Malformed IMSI {} (attempt {})", crate::fmt::printable(&captured), attempt);
                self.delay.delay_ms(self.config.sim_retry_delay.ticks());
                continue;
            };

            self.expect_response(OK, self.config.command_timeout, &mut [])?;

            if !imsi.is_zero() {
                debug!("SIM ready, IMSI {}", imsi.as_str());
                return Ok(imsi);
            }

            warn!("SIM not ready (attempt {})", attempt);
            self.delay.delay_ms(self.config.sim_retry_delay.ticks());
        }

        Err(self.fail(ErrorKind::Timeout).with_cme_code(cme_code))
    }

    /// Sets up secure profile 0: no certificate validation, min. TLS 1.2 and the configured credential files
    pub fn create_secure_profile(&mut self) -> Result<(), Error> {
        self.last_fault = None;
        self.ensure_booted()?;

        let timeout = self.config.command_timeout;
        let (root_ca, device_cert, device_key) =
            (self.config.root_ca, self.config.device_cert, self.config.device_key);

        self.transaction(RESET_SECURE_PROFILE, &[], timeout)?;
        self.transaction(SECURE_PROFILE_LEVEL, &[], timeout)?;
        self.transaction(SECURE_PROFILE_MIN_TLS, &[], timeout)?;
        self.transaction(SECURE_PROFILE_ROOT_CA, &[Arg::Str(root_ca)], timeout)?;
        self.transaction(SECURE_PROFILE_DEVICE_CERT, &[Arg::Str(device_cert)], timeout)?;
        self.transaction(SECURE_PROFILE_DEVICE_KEY, &[Arg::Str(device_key)], timeout)
    }

    /// Selects the radio access technology
    pub fn set_rat(&mut self, timeout: MillisDurationU32, rat: Rat) -> Result<(), Error> {
        self.last_fault = None;
        self.ensure_booted()?;
        self.transaction(SET_RAT, &[Arg::Uint(rat.into())], timeout)
    }

    /// Starts an extended network search and returns the mobile country code of the first cell found. The search
    /// gets aborted afterwards.
    pub fn scan(&mut self, timeout: MillisDurationU32) -> Result<u32, Error> {
        self.last_fault = None;
        self.ensure_booted()?;

        self.delay.delay_ms(self.config.scan_settle_delay.ticks());
        self.command(NETWORK_SCAN, &[])?;

        let mut country_code = 0;
        match self.engine.expect(SCAN_RESULT, timeout, &mut [Capture::Uint(&mut country_code)]) {
            Ok(_) => {}
            Err(AtError::Timeout) => {
                let cme_code = self.recover_cme_code();

                // Best effort, the scan already failed
                let _ = self.engine.send_raw_with_cr(ABORT);
                let _ = self.engine.expect(ABORTED, self.config.command_timeout, &mut []);

                return Err(self.fail(ErrorKind::Timeout).with_cme_code(cme_code));
            }
            Err(error) => {
                let cme_code = self.recover_cme_code();
                return Err(self.fail(error).with_cme_code(cme_code));
            }
        }

        // Remaining scan output needs to arrive before flushing
        self.delay.delay_ms(self.config.scan_abort_delay.ticks());

        self.engine.flush().map_err(|error| self.fail(error))?;
        self.engine.send_raw_with_cr(ABORT).map_err(|error| self.fail(error))?;
        self.engine
            .expect(ABORTED, self.config.command_timeout, &mut [])
            .map_err(|error| self.fail(error))?;

        debug!("Scan found MCC {}", country_code);
        Ok(country_code)
    }

    /// Registers automatically to the network
    pub fn attach(&mut self, timeout: MillisDurationU32) -> Result<(), Error> {
        self.last_fault = None;
        self.ensure_booted()?;
        self.transaction(NETWORK_ATTACH, &[], timeout)
    }

    /// Deregisters from the network
    pub fn detach(&mut self, timeout: MillisDurationU32) -> Result<(), Error> {
        self.last_fault = None;
        self.ensure_booted()?;
        self.transaction(NETWORK_DETACH, &[], timeout)
    }

    /// Configures and activates packet switched data profile 0. The given timeout applies to the activation.
    pub fn activate_pdp(&mut self, apn: &Apn<'_>, timeout: MillisDurationU32) -> Result<(), Error> {
        self.last_fault = None;
        self.ensure_booted()?;

        let command_timeout = self.config.command_timeout;
        self.transaction(PSD_APN, &[Arg::Str(apn.name)], command_timeout)?;

        if !apn.username.is_empty() {
            self.transaction(PSD_USERNAME, &[Arg::Str(apn.username)], command_timeout)?;
            self.transaction(PSD_PASSWORD, &[Arg::Str(apn.password)], command_timeout)?;
        }

        self.transaction(PSD_AUTO_AUTHENTICATION, &[], command_timeout)?;
        self.transaction(PSD_ACTIVATE, &[], timeout)
    }

    /// Performs a HTTPS GET request. The response is stored in the temporary modem file and may be read by
    /// [read_file_to_fs](Self::read_file_to_fs) or [read_file_to_buffer](Self::read_file_to_buffer).
    pub fn https_get(&mut self, timeout: MillisDurationU32, domain: &str, port: u16, path: &str) -> Result<(), Error> {
        self.last_fault = None;
        self.ensure_booted()?;
        self.configure_http(domain, port)?;

        let temp_file = self.config.temp_file;
        self.command(HTTP_GET, &[Arg::Str(path), Arg::Str(temp_file)])?;
        self.expect_response(OK_HTTP, timeout, &mut [])?;
        self.expect_response(HTTP_GET_SUCCEEDED, timeout, &mut [])?;
        Ok(())
    }

    /// Posts the content of the temporary modem file. The response is stored in the result file.
    pub fn https_post(&mut self, timeout: MillisDurationU32, domain: &str, port: u16, path: &str) -> Result<(), Error> {
        self.last_fault = None;
        self.ensure_booted()?;
        self.configure_http(domain, port)?;

        let (result_file, temp_file) = (self.config.result_file, self.config.temp_file);
        self.command(HTTP_POST, &[Arg::Str(path), Arg::Str(result_file), Arg::Str(temp_file)])?;
        self.expect_response(OK_HTTP, timeout, &mut [])?;
        self.expect_response(HTTP_POST_SUCCEEDED, timeout, &mut [])?;
        Ok(())
    }

    /// Transfers the payload of the downloaded HTTP response to the given file
    pub fn read_file_to_fs<F: Write>(&mut self, file: &mut F) -> Result<Download, Error> {
        self.last_fault = None;
        self.ensure_booted()?;

        let download = self.read_file_header()?;
        self.engine
            .read_raw_to_file(self.config.file_timeout, download.length, file)
            .map_err(|error| self.fail(error))?;

        Ok(download)
    }

    /// Transfers the payload of the downloaded HTTP response to the buffer. If the payload exceeds the buffer, it
    /// gets discarded and [ErrorKind::BufferOverflow] is returned.
    pub fn read_file_to_buffer(&mut self, buffer: &mut [u8]) -> Result<Download, Error> {
        self.last_fault = None;
        self.ensure_booted()?;

        let download = self.read_file_header()?;
        let length = download.length as usize;

        if length > buffer.len() {
            warn!("Payload of {} bytes exceeds buffer of {} bytes", length, buffer.len());
            self.engine.discard(download.length).map_err(|error| self.fail(error))?;
            return Err(self.fail(ErrorKind::BufferOverflow));
        }

        self.engine
            .read_raw_to_buffer(self.config.file_timeout, &mut buffer[..length])
            .map_err(|error| self.fail(error))?;

        Ok(download)
    }

    /// Replaces the temporary modem file by the given data
    pub fn write_buffer_to_file(&mut self, data: &[u8]) -> Result<(), Error> {
        self.last_fault = None;
        self.ensure_booted()?;

        let length = u32::try_from(data.len()).map_err(|_| self.fail(ErrorKind::BufferOverflow))?;
        self.start_file_download(length)?;

        self.engine.send_raw_with_cr(data).map_err(|error| self.fail(error))?;
        self.expect_response(OK, self.config.file_timeout, &mut [])?;
        Ok(())
    }

    /// Replaces the temporary modem file by `length` bytes read from the given file
    pub fn write_fs_to_file<F: Read>(&mut self, file: &mut F, length: u32) -> Result<(), Error> {
        self.last_fault = None;
        self.ensure_booted()?;
        self.start_file_download(length)?;

        self.engine.send_raw_from_file(file, length).map_err(|error| self.fail(error))?;
        self.engine.send_raw(b"\r").map_err(|error| self.fail(error))?;
        self.expect_response(OK, self.config.file_timeout, &mut [])?;
        Ok(())
    }

    /// Queries operator, signal quality and the serving cell
    pub fn network_info(&mut self) -> Result<NetworkInfo, Error> {
        self.last_fault = None;
        self.ensure_booted()?;

        let (command_timeout, query_timeout) = (self.config.command_timeout, self.config.file_timeout);

        let mut operator: Vec<u8, OPERATOR_LEN> = Vec::new();
        let (mut mode, mut format, mut technology) = (0, 0, 0);
        self.command(REQUEST_OPERATOR, &[])?;
        self.expect_response(
            OPERATOR,
            query_timeout,
            &mut [
                Capture::Uint(&mut mode),
                Capture::Uint(&mut format),
                Capture::Str(&mut operator),
                Capture::Uint(&mut technology),
            ],
        )?;
        self.expect_plain(OK, command_timeout)?;

        let (mut signal_power, mut quality) = (0, 0);
        self.command(REQUEST_SIGNAL_QUALITY, &[])?;
        self.expect_response(
            SIGNAL_QUALITY,
            query_timeout,
            &mut [Capture::Uint(&mut signal_power), Capture::Uint(&mut quality)],
        )?;
        self.expect_plain(OK, command_timeout)?;

        self.command(ENABLE_REGISTRATION_URC, &[])?;
        self.expect_plain(OK, command_timeout)?;

        let mut local_area_code: Vec<u8, LOCAL_AREA_CODE_LEN> = Vec::new();
        let mut cell_id: Vec<u8, CELL_ID_LEN> = Vec::new();
        let (mut urc_mode, mut status, mut access_technology) = (0, 0, 0);
        self.command(REQUEST_REGISTRATION, &[])?;
        self.expect_response(
            REGISTRATION,
            query_timeout,
            &mut [
                Capture::Uint(&mut urc_mode),
                Capture::Uint(&mut status),
                Capture::Str(&mut local_area_code),
                Capture::Str(&mut cell_id),
                Capture::Uint(&mut access_technology),
            ],
        )?;
        trace!(
            "Operator mode {}, format {}, registration URC mode {}, status {}, access technology {}",
            mode,
            format,
            urc_mode,
            status,
            access_technology
        );
        self.expect_plain(OK, command_timeout)?;

        self.command(DISABLE_REGISTRATION_URC, &[])?;
        self.expect_plain(OK, command_timeout)?;

        Ok(NetworkInfo {
            signal_power: to_u8(signal_power),
            quality: to_u8(quality),
            technology: to_u8(technology),
            operator: to_string(operator),
            local_area_code: to_string(local_area_code),
            cell_id: to_string(cell_id),
        })
    }

    /// Sends the data unmodified
    pub fn send_raw(&mut self, data: &[u8]) -> Result<(), Error> {
        self.last_fault = None;
        self.engine.send_raw(data).map_err(|error| self.fail(error))
    }

    /// Receives whatever arrives within the timeout. Returns the number of received bytes.
    pub fn receive_raw(&mut self, timeout: MillisDurationU32, buffer: &mut [u8]) -> Result<usize, Error> {
        self.last_fault = None;
        self.engine.receive_raw(timeout, buffer).map_err(|error| self.fail(error))
    }

    /// Returns the number of received bytes which can be read without waiting
    pub fn available_raw(&mut self) -> Result<usize, Error> {
        self.last_fault = None;
        self.engine.available_raw().map_err(|error| self.fail(error))
    }

    /// Returns the current power state
    pub fn state(&self) -> ModemState {
        self.state
    }

    /// Returns the source location of the last failure. Gets reset by every operation.
    pub fn last_fault(&self) -> Option<&'static Location<'static>> {
        self.last_fault
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &AtEngine<T, B, CHUNK_SIZE> {
        &self.engine
    }

    /// Access to the AT engine, e.g. for commands not covered by this driver
    pub fn engine_mut(&mut self) -> &mut AtEngine<T, B, CHUNK_SIZE> {
        &mut self.engine
    }

    /// Releases the transport, busy handler, power pin, delay and clock
    pub fn release(self) -> (T, B, P, D, C) {
        let (transport, busy) = self.engine.release();
        (transport, busy, self.power_pin, self.delay, self.clock)
    }

    /// Fails with [ErrorKind::FailedToBoot] unless the modem is on. A booting modem is polled until it responds or
    /// the boot timeout elapsed.
    #[track_caller]
    fn ensure_booted(&mut self) -> Result<(), Error> {
        let caller = Location::caller();

        let booted = match self.state {
            ModemState::On => true,
            ModemState::Booting => self.await_boot(),
            ModemState::Off | ModemState::Unresponsive => false,
        };

        if !booted {
            return Err(self.record(caller, ErrorKind::FailedToBoot));
        }

        Ok(())
    }

    /// Polls the modem until acknowledged. Marks the modem unresponsive and cuts the power once the boot timeout
    /// elapsed.
    fn await_boot(&mut self) -> bool {
        loop {
            if self.engine.flush().is_err() {
                return false;
            }

            let acknowledged = match self.engine.send_raw_with_cr(ATTENTION) {
                Ok(()) => self.engine.expect(OK, self.config.command_timeout, &mut []),
                Err(error) => Err(error),
            };

            match acknowledged {
                Ok(_) => {
                    debug!("Modem booted");
                    self.state = ModemState::On;
                    return true;
                }
                Err(AtError::Timeout) => {}
                Err(_error) => {
                    debug!("Boot poll failed: {:?}", _error);
                    return false;
                }
            }

            self.delay.delay_ms(self.config.poll_interval.ticks());
            self.engine.busy();

            let elapsed = self.clock.now().checked_duration_since(self.boot_started_at);
            if elapsed.map_or(true, |elapsed| elapsed.to_millis() >= self.config.boot_timeout.to_millis()) {
                break;
            }
        }

        error!("Modem unresponsive after {} ms", self.config.boot_timeout.to_millis());
        self.state = ModemState::Unresponsive;
        let _ = self.power_pin.set_low();
        false
    }

    /// Resets HTTP profile 0 and sets domain, TLS and port
    fn configure_http(&mut self, domain: &str, port: u16) -> Result<(), Error> {
        let timeout = self.config.command_timeout;

        self.transaction(HTTP_RESET, &[], timeout)?;
        self.transaction(HTTP_DOMAIN, &[Arg::Str(domain)], timeout)?;
        self.transaction(HTTP_SECURE, &[], timeout)?;
        self.transaction(HTTP_PORT, &[Arg::Uint(port.into())], timeout)
    }

    /// Requests the temporary file and scans its HTTP header. A non-success status is returned as
    /// [ErrorKind::Http], the file content is discarded in this case.
    fn read_file_header(&mut self) -> Result<Download, Error> {
        let temp_file = self.config.temp_file;
        self.command(READ_FILE, &[Arg::Str(temp_file)])?;

        let mut file_name: Vec<u8, FILE_NAME_LEN> = Vec::new();
        let mut file_size = 0;
        self.expect_response(
            FILE_HEADER,
            self.config.file_timeout,
            &mut [Capture::Str(&mut file_name), Capture::Uint(&mut file_size)],
        )?;
        trace!("Reading {}: {} bytes", crate::fmt::printable(&file_name), file_size);

        let header = self.engine.expect_http_header(file_size).map_err(|error| self.fail(error))?;
        if header.length > file_size {
            return Err(self.fail(ErrorKind::UnexpectedResponse));
        }

        Ok(Download {
            http_status: header.status,
            file_size,
            length: file_size - header.length,
        })
    }

    /// Deletes the temporary file, which may not exist, and announces a download of `length` bytes
    fn start_file_download(&mut self, length: u32) -> Result<(), Error> {
        let (temp_file, timeout) = (self.config.temp_file, self.config.command_timeout);

        self.command(DELETE_FILE, &[Arg::Str(temp_file)])?;
        if let Err(error) = self.expect_response(OK, timeout, &mut []) {
            if error.kind != ErrorKind::UnexpectedResponse && error.cme_code.is_none() {
                return Err(error);
            }

            warn!("Remote file {} not deleted: {}", temp_file, error.kind);
            self.last_fault = None;
        }

        self.command(DOWNLOAD_FILE, &[Arg::Str(temp_file), Arg::Uint(length)])?;
        match self.engine.expect(DATA_PROMPT, self.config.file_timeout, &mut []) {
            Ok(_) => Ok(()),
            Err(error) => {
                let cme_code = self.recover_cme_code();
                Err(self.fail(error).with_cme_code(cme_code))
            }
        }
    }

    /// Flushes, sends the command and expects `OK`
    #[track_caller]
    fn transaction(&mut self, template: &[u8], args: &[Arg<'_>], timeout: MillisDurationU32) -> Result<(), Error> {
        let caller = Location::caller();
        self.send_command(caller, template, args)?;
        self.expect_at(caller, OK, timeout, &mut [])?;
        Ok(())
    }

    /// Flushes and sends the command
    #[track_caller]
    fn command(&mut self, template: &[u8], args: &[Arg<'_>]) -> Result<(), Error> {
        self.send_command(Location::caller(), template, args)
    }

    fn send_command(
        &mut self,
        caller: &'static Location<'static>,
        template: &[u8],
        args: &[Arg<'_>],
    ) -> Result<(), Error> {
        if let Err(error) = self.engine.flush() {
            return Err(self.record(caller, error));
        }

        self.engine.send(template, args).map_err(|error| self.record(caller, error))
    }

    /// Expects the response, recovering a CME error code on failure
    #[track_caller]
    fn expect_response(
        &mut self,
        template: &[u8],
        timeout: MillisDurationU32,
        captures: &mut [Capture<'_>],
    ) -> Result<usize, Error> {
        self.expect_at(Location::caller(), template, timeout, captures)
    }

    /// Expects the response without recovering a CME error code
    #[track_caller]
    fn expect_plain(&mut self, template: &[u8], timeout: MillisDurationU32) -> Result<(), Error> {
        let caller = Location::caller();
        self.engine.expect(template, timeout, &mut []).map_err(|error| self.record(caller, error))?;
        Ok(())
    }

    fn expect_at(
        &mut self,
        caller: &'static Location<'static>,
        template: &[u8],
        timeout: MillisDurationU32,
        captures: &mut [Capture<'_>],
    ) -> Result<usize, Error> {
        match self.engine.expect(template, timeout, captures) {
            Ok(length) => Ok(length),
            Err(error) => {
                let cme_code = self.recover_cme_code();
                Err(self.record(caller, error).with_cme_code(cme_code))
            }
        }
    }

    /// Interprets the last received line as CME error report
    fn recover_cme_code(&mut self) -> Option<u16> {
        let mut code = 0;
        self.engine.expect_last_line(CME_ERROR, &mut [Capture::Uint(&mut code)]).ok()?;

        let code = u16::try_from(code).ok()?;
        warn!("Modem reported CME error {}", code);
        Some(code)
    }

    #[track_caller]
    fn fail<E: Into<Error>>(&mut self, error: E) -> Error {
        self.record(Location::caller(), error)
    }

    fn record<E: Into<Error>>(&mut self, caller: &'static Location<'static>, error: E) -> Error {
        let error = error.into();
        debug!("Cellular operation failed: {:?}", error.kind);
        self.last_fault = Some(caller);
        error
    }
}
