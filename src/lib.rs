//! # AT command engine and SARA-U270 cellular modem driver
//!
//! `no_std` driver for the u-blox SARA-U270 cellular modem, built on a generic, template driven AT command engine.
//!
//! * [engine]: Composes commands, matches responses, transfers raw data from/to files and buffers
//! * [cellular]: Modem power state machine and multi step transactions (SIM check, TLS profile, network
//!   registration, packet data activation, HTTPS GET/POST and remote file transfer)
//!
//! The byte channel is abstracted by the [Transport](transport::Transport) trait, which needs to be implemented by
//! the board support layer. Power line, delay and uptime clock are consumed through `embedded-hal` and
//! `fugit-timer` traits, file stores through `embedded-io`.
//!
//! ## Logging
//!
//! Enable the `log` or `defmt` feature for tracing the AT communication.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]

extern crate alloc;

mod fmt;

pub mod cellular;
pub(crate) mod commands;
pub mod engine;
pub mod responses;
pub mod template;
pub mod transport;

#[cfg(feature = "examples")]
pub mod example;

#[cfg(test)]
mod tests;
