// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hardware device-programming subsystem for Gemini-family FPGAs.
//!
//! Drives an external OpenOCD binary as a protocol endpoint: discovers
//! attached debug cables, identifies devices on their JTAG chains against
//! a static database, and runs programming operations whose progress and
//! failures are recovered from the tool's text output stream.

pub mod device;
pub mod error;
pub mod executor;
pub mod hardware;
pub mod openocd;
pub mod programmer;
pub mod session;
