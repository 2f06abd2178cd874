//! Example that runs on Linux using a serial-USB-adapter connected to a SARA-U270 modem.
//!
//! Registers to the network, activates the packet data context and downloads a file by HTTPS GET.
use std::{
    env,
    io::{self, Read, Write},
    thread,
    time::Duration,
};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use fugit::{ExtU32, MicrosDurationU32};
use sara_at::cellular::{Apn, Config, Modem};
use sara_at::transport::{Transport, TransportError};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

// Chunk size in bytes for file transfers. Higher value results in better
// performance, but introduces also higher stack memory footprint.
const CHUNK_SIZE: usize = 512;

// Buffer size for the downloaded payload
const RX_SIZE: usize = 4096;

// Timer frequency in Hz
const TIMER_HZ: u32 = 1000;

fn main() {
    env_logger::init();

    // Parse args
    let args: Vec<String> = env::args().collect();
    if args.len() != 6 {
        println!("Usage: {} <path-to-serial> <baudrate> <apn> <domain> <path>", args[0]);
        println!("Example: {} /dev/ttyUSB0 115200 internet example.com /index.html", args[0]);
        println!("\nNote: To run the example with debug logging, run it like this:");
        println!("\n  RUST_LOG=trace cargo run --example linux --features log -- /dev/ttyUSB0 115200 internet example.com /index.html");
        std::process::exit(1);
    }
    let dev = &args[1];
    let baud_rate: u32 = args[2].parse().expect("Invalid baud rate");
    let apn = Apn {
        name: &args[3],
        ..Apn::default()
    };
    let domain = &args[4];
    let path = &args[5];

    println!("Starting (dev={}, baud={:?})...", dev, baud_rate);

    // Open serial port
    let port = serialport::new(dev, baud_rate)
        .data_bits(DataBits::Eight)
        .flow_control(FlowControl::None)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(Duration::from_millis(500))
        .open()
        .expect("Could not open serial port");

    let config = Config::default().with_baud_rate(baud_rate);
    let mut modem: Modem<_, _, _, _, _, TIMER_HZ, CHUNK_SIZE> = Modem::new(
        SerialTransport { port },
        || log::trace!("Busy"),
        SysPowerPin,
        SysDelay,
        timer::SysTimer::new(),
        config,
    )
    .expect("Could not set up modem");

    println!("Powering modem...");
    modem.power_on().expect("Power on failed");
    modem.sync_comms().expect("Modem did not respond");

    let imsi = modem.check_sim().expect("SIM not ready");
    println!("SIM ready, IMSI {}", imsi.as_str());

    println!("Attaching to network...");
    modem.attach(180.secs()).expect("Network attach failed");

    let info = modem.network_info().expect("Network info query failed");
    println!(
        "Registered to {} (signal {}, LAC {}, cell {})",
        info.operator, info.signal_power, info.local_area_code, info.cell_id
    );

    println!("Activating packet data on APN \"{}\"...", apn.name);
    modem.activate_pdp(&apn, 30.secs()).expect("PDP activation failed");
    modem.create_secure_profile().expect("Secure profile setup failed");

    println!("Requesting https://{}{}...", domain, path);
    modem.https_get(60.secs(), domain, 443, path).expect("HTTPS GET failed");

    let mut buffer = vec![0x0; RX_SIZE];
    let download = modem.read_file_to_buffer(&mut buffer).unwrap_or_else(|error| {
        panic!(
            "Reading response failed: {} (CME code {:?}, at {:?})",
            error,
            error.cme_code(),
            modem.last_fault()
        )
    });

    println!(
        "HTTP status {}, received {} of {} bytes",
        download.http_status, download.length, download.file_size
    );
    println!("---\n{}\n---", String::from_utf8_lossy(&buffer[..download.length as usize]));

    modem.detach(10.secs()).expect("Network detach failed");
    modem.power_off().expect("Power off failed");
}

/// Serial port transport
struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    fn read_once(&mut self, buffer: &mut [u8], timeout: MicrosDurationU32) -> Result<usize, TransportError> {
        self.port
            .set_timeout(Duration::from_micros(timeout.ticks().into()))
            .map_err(|_| TransportError::Device)?;

        match self.port.read(buffer) {
            Ok(length) => Ok(length),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => Ok(0),
            Err(e) => {
                log::error!("Serial read failed: {}", e);
                Err(TransportError::Device)
            }
        }
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(data).map_err(|_| TransportError::Device)
    }

    fn read_timeout(
        &mut self,
        buffer: &mut [u8],
        first_byte_timeout: MicrosDurationU32,
        inter_char_timeout: MicrosDurationU32,
    ) -> Result<usize, TransportError> {
        let mut length = self.read_once(buffer, first_byte_timeout)?;
        if length == 0 {
            return Err(TransportError::Timeout);
        }

        while length < buffer.len() {
            let received = self.read_once(&mut buffer[length..], inter_char_timeout)?;
            if received == 0 {
                break;
            }
            length += received;
        }

        Ok(length)
    }

    fn available(&mut self) -> Result<usize, TransportError> {
        let pending = self.port.bytes_to_read().map_err(|_| TransportError::Device)?;
        usize::try_from(pending).map_err(|_| TransportError::Device)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.port.clear(ClearBuffer::Input).map_err(|_| TransportError::Device)
    }

    fn baud_rate(&mut self) -> Result<u32, TransportError> {
        self.port.baud_rate().map_err(|_| TransportError::Device)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        self.port.set_baud_rate(baud_rate).map_err(|_| TransportError::Device)
    }
}

/// Power line stand-in, the modem of a USB adapter is powered permanently
struct SysPowerPin;

impl ErrorType for SysPowerPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for SysPowerPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        log::debug!("Power line low");
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        log::debug!("Power line high");
        Ok(())
    }
}

/// Thread sleep based delay
struct SysDelay;

impl DelayNs for SysDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(ns.into()));
    }
}

mod timer {
    use std::{convert::TryInto, time::Instant as StdInstant};

    use fugit::Instant;

    /// A timer with millisecond precision.
    pub struct SysTimer {
        start: StdInstant,
        duration_ms: u32,
        started: bool,
    }

    impl SysTimer {
        pub fn new() -> SysTimer {
            SysTimer {
                start: StdInstant::now(),
                duration_ms: 0,
                started: false,
            }
        }
    }

    impl fugit_timer::Timer<1000> for SysTimer {
        type Error = &'static str;

        /// Return current time `Instant`
        fn now(&mut self) -> fugit::TimerInstantU32<1000> {
            let milliseconds = (StdInstant::now() - self.start).as_millis();
            let ticks: u32 = milliseconds.try_into().expect("u32 timer overflow");
            Instant::<u32, 1, 1000>::from_ticks(ticks)
        }

        /// Start timer with a `duration`
        fn start(&mut self, duration: fugit::TimerDurationU32<1000>) -> Result<(), Self::Error> {
            self.start = StdInstant::now();
            self.duration_ms = duration.ticks();
            self.started = true;
            Ok(())
        }

        fn cancel(&mut self) -> Result<(), Self::Error> {
            if !self.started {
                Err("cannot cancel stopped timer")
            } else {
                self.started = false;
                Ok(())
            }
        }

        fn wait(&mut self) -> nb::Result<(), Self::Error> {
            if (StdInstant::now() - self.start).as_millis() > self.duration_ms.into() {
                Ok(())
            } else {
                Err(nb::Error::WouldBlock)
            }
        }
    }
}
