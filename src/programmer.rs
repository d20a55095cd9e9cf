// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operation layer: validate preconditions, delegate to the adapter, and
//! report one taxonomy code per call.
//!
//! All four entry points share a shape: check the artifact on disk before
//! any subprocess is spawned, hand the resolved device plus the complete
//! tap list to the adapter, and let callbacks carry progress and raw
//! output back to the caller. Cancellation rides on the shared stop flag;
//! a device's state after a cancelled write is undefined and has to be
//! re-queried through [`ProgrammerTool::query_fpga_status`].

use std::path::Path;
use std::sync::atomic::AtomicBool;

use bitmask_enum::bitmask;
use log::info;

use crate::device::{CfgStatus, Device, Tap};
use crate::error::{ProgrammerError, Result};
use crate::openocd::ProgrammingAdapter;

/// Flash sub-operations, independently combinable. When several are set
/// they execute in declaration order, short-circuiting on first failure.
#[bitmask(u8)]
pub enum FlashOperation
{
	Erase,
	BlankCheck,
	Program,
	Verify,
}

pub struct ProgrammerTool<'adapter>
{
	adapter: &'adapter dyn ProgrammingAdapter,
}

impl<'adapter> ProgrammerTool<'adapter>
{
	pub fn new(adapter: &'adapter dyn ProgrammingAdapter) -> Self
	{
		Self {
			adapter,
		}
	}

	fn check_bitfile(bitfile: &Path) -> Result<()>
	{
		if !bitfile.is_file() {
			return Err(ProgrammerError::BitfileNotFound);
		}
		Ok(())
	}

	fn check_programmable(device: &Device) -> Result<()>
	{
		if !device.device_type.is_programmable() {
			return Err(ProgrammerError::UnsupportedFunc);
		}
		Ok(())
	}

	/// Load a bitstream into the FPGA fabric. Volatile: lost on power cycle.
	pub fn program_fpga(
		&self, device: &Device, taps: &[Tap], bitfile: &Path, stop: &AtomicBool,
		on_line: Option<&mut dyn FnMut(&str)>, on_progress: &mut dyn FnMut(f64),
	) -> Result<()>
	{
		Self::check_bitfile(bitfile)?;
		Self::check_programmable(device)?;
		info!("programming FPGA fabric of {} from {}", device.name, bitfile.display());
		self.adapter.program_fpga(device, taps, bitfile, stop, on_line, on_progress)
	}

	/// Write the device's one-time-programmable memory. Irreversible, so
	/// the caller must thread through an explicit confirmation; without it
	/// this refuses before any subprocess is spawned.
	pub fn program_otp(
		&self, device: &Device, taps: &[Tap], bitfile: &Path, confirm: bool, stop: &AtomicBool,
		on_line: Option<&mut dyn FnMut(&str)>, on_progress: &mut dyn FnMut(f64),
	) -> Result<()>
	{
		if !confirm {
			return Err(ProgrammerError::InvalidArgument(
				"OTP programming is not reversible and requires explicit confirmation".into(),
			));
		}
		Self::check_bitfile(bitfile)?;
		Self::check_programmable(device)?;
		info!("programming OTP of {} from {}", device.name, bitfile.display());
		self.adapter.program_otp(device, taps, bitfile, stop, on_line, on_progress)
	}

	/// Run the requested flash sub-operations against the device's flash.
	pub fn program_flash(
		&self, device: &Device, taps: &[Tap], bitfile: &Path, operations: FlashOperation, stop: &AtomicBool,
		on_line: Option<&mut dyn FnMut(&str)>, on_progress: &mut dyn FnMut(f64),
	) -> Result<()>
	{
		if operations.is_none() {
			return Err(ProgrammerError::InvalidArgument("no flash operation requested".into()));
		}
		Self::check_bitfile(bitfile)?;
		Self::check_programmable(device)?;
		if device.flash_size == 0 {
			return Err(ProgrammerError::UnsupportedFunc);
		}
		let image_size = bitfile
			.metadata()
			.map_err(|source| ProgrammerError::FailedExecuteCommand(Some(source)))?
			.len();
		if image_size > device.flash_size {
			return Err(ProgrammerError::InvalidFlashSize);
		}
		info!("flash operations on {} from {}", device.name, bitfile.display());
		self.adapter
			.program_flash(device, taps, bitfile, operations, stop, on_line, on_progress)
	}

	/// Query the device's configuration status. Returns the parsed fields
	/// and the tool's raw print-out for verbose display.
	pub fn query_fpga_status(&self, device: &Device, taps: &[Tap], stop: &AtomicBool)
	-> Result<(CfgStatus, String)>
	{
		self.adapter.query_status(device, taps, stop)
	}
}
