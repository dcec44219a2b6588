//! pairlink CLI Library
//!
//! Subcommands for the `pairlink` binary: token inspection and a loopback
//! pairing demo.

pub mod demo_cmd;
pub mod inspect_cmd;
