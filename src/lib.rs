//! Talk to your coffee machine from the command-line!
//!
//! Primadonna is an API and command-line application for DeLonghi PrimaDonna-class espresso
//! machines over Bluetooth-Low-Energy. The [`protocol`] module implements the wire format (framing,
//! checksums, command templates and message decoding), while [`device`] owns the connection,
//! correlates commands with their responses and keeps a per-machine state snapshot.
//!
//! # Examples
//!
//! Show the current state of a machine:
//! ```text
//! $ primadonna --address 00:A0:50:12:34:56 status
//! Ready
//! ```
//!
//! Brew a beverage:
//!
//! ```text
//! $ primadonna --address 00:A0:50:12:34:56 brew espresso
//! Dispensing... [####=====================================]
//! ```
//!
//! Try everything against the built-in simulator:
//!
//! ```text
//! $ primadonna --simulator statistics
//! ```

pub mod config;
pub mod device;
pub mod display;
pub mod logging;
mod prelude;
pub mod protocol;
