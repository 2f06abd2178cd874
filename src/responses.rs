//! SARA-U270 response templates and parsed response types
use heapless::{String, Vec};

/// Max. length of the operator name
pub const OPERATOR_LEN: usize = 25;

/// Max. length of the local area code
pub const LOCAL_AREA_CODE_LEN: usize = 5;

/// Max. length of the cell id
pub const CELL_ID_LEN: usize = 9;

/// Length of an IMSI
pub const IMSI_LEN: usize = 15;

pub(crate) const OK: &[u8] = b"OK";

/// Framing acknowledgement of a HTTP command
pub(crate) const OK_HTTP: &[u8] = b"OK\r\n";

pub(crate) const IMSI: &[u8] = b"\r\n%s";
pub(crate) const SCAN_RESULT: &[u8] = b"MCC:%u";
pub(crate) const ABORTED: &[u8] = b"ABORTED";
pub(crate) const HTTP_GET_SUCCEEDED: &[u8] = b"+UUHTTPCR: 0,1,1";
pub(crate) const HTTP_POST_SUCCEEDED: &[u8] = b"+UUHTTPCR: 0,4,1";

/// File name and size header of a file read
pub(crate) const FILE_HEADER: &[u8] = b"+URDFILE: \"%s\",%u,\"";

/// Prompt for payload data
pub(crate) const DATA_PROMPT: &[u8] = b">";

pub(crate) const CME_ERROR: &[u8] = b"+CME ERROR: %u";

/// Mode, format, operator, access technology
pub(crate) const OPERATOR: &[u8] = b"+COPS: %u,%u,\"%s\",%u";

/// Signal power, quality
pub(crate) const SIGNAL_QUALITY: &[u8] = b"+CSQ: %u,%u";

/// URC mode, status, local area code, cell id, access technology
pub(crate) const REGISTRATION: &[u8] = b"+CREG: %u,%u,\"%s\",\"%s\",%u";

/// International mobile subscriber identity
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Imsi(pub(crate) String<IMSI_LEN>);

impl Imsi {
    /// Validates the captured bytes: exactly 15 decimal digits
    pub(crate) fn from_captured(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != IMSI_LEN || !bytes.iter().all(u8::is_ascii_digit) {
            return None;
        }

        let bytes = Vec::from_slice(bytes).ok()?;
        String::from_utf8(bytes).ok().map(Self)
    }

    /// Returns true if every digit is zero, which the modem reports as long as the SIM has not booted
    pub fn is_zero(&self) -> bool {
        self.0.bytes().all(|digit| digit == b'0')
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Radio access technology
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rat {
    /// GSM only (2G)
    Gsm = 0,

    /// GSM/UMTS dual mode
    Dual = 1,

    /// UMTS only (3G)
    Umts = 2,
}

impl From<Rat> for u32 {
    fn from(rat: Rat) -> Self {
        rat as u32
    }
}

/// Result of a network information query
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Received signal strength indicator (0-31, 99 = unknown)
    pub signal_power: u8,

    /// Bit error rate (0-7, 99 = unknown)
    pub quality: u8,

    /// Access technology of the selected operator
    pub technology: u8,

    pub operator: String<OPERATOR_LEN>,

    /// Hexadecimal local area code
    pub local_area_code: String<LOCAL_AREA_CODE_LEN>,

    /// Hexadecimal cell id
    pub cell_id: String<CELL_ID_LEN>,
}

/// Result of reading the downloaded HTTP response file
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Download {
    /// HTTP status code
    pub http_status: u16,

    /// Total file size including the HTTP header
    pub file_size: u32,

    /// Transferred payload length (file size - header length)
    pub length: u32,
}

/// Converts captured text, replacing it by an empty string if not valid UTF-8
pub(crate) fn to_string<const N: usize>(bytes: Vec<u8, N>) -> String<N> {
    String::from_utf8(bytes).unwrap_or_default()
}

/// Truncates a captured integer to a single byte, saturating
pub(crate) fn to_u8(value: u32) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}
