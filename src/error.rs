// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the programming subsystem.
//!
//! Every public entry point reports failure through [`ProgrammerError`]. Each
//! variant carries a stable signed integer code ([`ProgrammerError::code`])
//! that calling CLIs and GUIs can pattern-match without depending on the
//! message text.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProgrammerError>;

#[derive(Debug, Error)]
pub enum ProgrammerError
{
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	#[error("Device not found")]
	DeviceNotFound,

	#[error("Cable not found")]
	CableNotFound,

	#[error("Cable not supported")]
	CableNotSupported,

	#[error("No supported tap found")]
	NoSupportedTapFound,

	#[error("Failed to execute command")]
	FailedExecuteCommand(#[source] Option<std::io::Error>),

	#[error("Failed to parse output")]
	FailedToParseOutput,

	#[error("Bitfile not found")]
	BitfileNotFound,

	#[error("Failed to program FPGA")]
	FailedToProgramFpga,

	#[error("OpenOCD executable not found")]
	OpenOcdExecutableNotFound,

	#[error("Failed to program device OTP")]
	FailedToProgramOtp,

	#[error("Invalid flash size")]
	InvalidFlashSize,

	#[error("Unsupported function")]
	UnsupportedFunc,

	#[error("Operation cancelled")]
	Cancelled,
}

impl ProgrammerError
{
	/// Stable integer code for this error, safe to match on across versions.
	pub fn code(&self) -> i32
	{
		match self {
			Self::InvalidArgument(_) => -100,
			Self::DeviceNotFound => -101,
			Self::CableNotFound => -102,
			Self::CableNotSupported => -104,
			Self::NoSupportedTapFound => -105,
			Self::FailedExecuteCommand(_) => -106,
			Self::FailedToParseOutput => -107,
			Self::BitfileNotFound => -108,
			Self::FailedToProgramFpga => -109,
			Self::OpenOcdExecutableNotFound => -110,
			Self::FailedToProgramOtp => -111,
			Self::InvalidFlashSize => -112,
			Self::UnsupportedFunc => -113,
			Self::Cancelled => -114,
		}
	}
}
