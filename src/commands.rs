//! SARA-U270 command templates, sent with the `AT` prefix unless noted otherwise

/// Responsiveness check, sent raw
pub(crate) const ATTENTION: &[u8] = b"AT";

/// Disables command echo, sent raw
pub(crate) const DISABLE_ECHO: &[u8] = b"ATE0";

/// Disables message waiting indication URCs
pub(crate) const DISABLE_UMWI: &[u8] = b"+UMWI=0";

/// Enables numeric +CME error reports
pub(crate) const ENABLE_CME_ERRORS: &[u8] = b"+CMEE=1";

/// Requests the IMSI
pub(crate) const REQUEST_IMSI: &[u8] = b"+CIMI";

// Secure profile 0
pub(crate) const RESET_SECURE_PROFILE: &[u8] = b"+USECPRF=0";
/// Security level 0: no certificate validation
pub(crate) const SECURE_PROFILE_LEVEL: &[u8] = b"+USECPRF=0,0,0";
/// Min. TLS version 1.2
pub(crate) const SECURE_PROFILE_MIN_TLS: &[u8] = b"+USECPRF=0,1,3";
pub(crate) const SECURE_PROFILE_ROOT_CA: &[u8] = b"+USECPRF=0,3,\"%s\"";
pub(crate) const SECURE_PROFILE_DEVICE_CERT: &[u8] = b"+USECPRF=0,5,\"%s\"";
pub(crate) const SECURE_PROFILE_DEVICE_KEY: &[u8] = b"+USECPRF=0,6,\"%s\"";

/// Selects the radio access technology
pub(crate) const SET_RAT: &[u8] = b"+URAT=%u";

/// Extended network search
pub(crate) const NETWORK_SCAN: &[u8] = b"+COPS=5";

/// Automatic network registration
pub(crate) const NETWORK_ATTACH: &[u8] = b"+COPS=0";

/// Deregisters from the network
pub(crate) const NETWORK_DETACH: &[u8] = b"+COPS=2";

/// Aborts a running command, sent raw
pub(crate) const ABORT: &[u8] = b"abort";

// Packet switched data profile 0
pub(crate) const PSD_APN: &[u8] = b"+UPSD=0,1,\"%s\"";
pub(crate) const PSD_USERNAME: &[u8] = b"+UPSD=0,2,\"%s\"";
pub(crate) const PSD_PASSWORD: &[u8] = b"+UPSD=0,3,\"%s\"";
/// Automatic authentication protocol selection
pub(crate) const PSD_AUTO_AUTHENTICATION: &[u8] = b"+UPSD=0,6,3";
pub(crate) const PSD_ACTIVATE: &[u8] = b"+UPSDA=0,3";

// HTTP profile 0
pub(crate) const HTTP_RESET: &[u8] = b"+UHTTP=0";
pub(crate) const HTTP_DOMAIN: &[u8] = b"+UHTTP=0,1,\"%s\"";
/// Secure connection using secure profile 0
pub(crate) const HTTP_SECURE: &[u8] = b"+UHTTP=0,6,1,0";
pub(crate) const HTTP_PORT: &[u8] = b"+UHTTP=0,5,%u";
/// GET path, response stored in the given file
pub(crate) const HTTP_GET: &[u8] = b"+UHTTPC=0,1,\"%s\",\"%s\"";
/// POST of the content of the second file to path, response stored in the first file
pub(crate) const HTTP_POST: &[u8] = b"+UHTTPC=0,4,\"%s\",\"%s\",\"%s\",0";

// File system
pub(crate) const READ_FILE: &[u8] = b"+URDFILE=\"%s\"";
pub(crate) const DELETE_FILE: &[u8] = b"+UDELFILE=\"%s\"";
pub(crate) const DOWNLOAD_FILE: &[u8] = b"+UDWNFILE=\"%s\",%u";

// Network information
pub(crate) const REQUEST_OPERATOR: &[u8] = b"+COPS?";
pub(crate) const REQUEST_SIGNAL_QUALITY: &[u8] = b"+CSQ";
pub(crate) const ENABLE_REGISTRATION_URC: &[u8] = b"+CREG=2";
pub(crate) const DISABLE_REGISTRATION_URC: &[u8] = b"+CREG=0";
pub(crate) const REQUEST_REGISTRATION: &[u8] = b"+CREG?";
