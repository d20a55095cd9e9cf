// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenOCD-backed implementation of the adapter capability traits.
//!
//! [`OpenocdAdapter`] turns Cable/Tap/Device configuration into tool
//! invocations (see [`command`]), streams the tool's stdout through the
//! classifier (see [`output`]), and folds the observed events into one
//! terminal result per operation.

pub mod command;
pub mod output;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use log::{debug, warn};

use crate::device::{Cable, CfgStatus, Device, Tap};
use crate::error::{ProgrammerError, Result};
use crate::executor::{CommandExecutor, CommandSpec, ExitStatus, SystemExecutor};
use crate::openocd::output::{OutputEvent, classify_line, parse_cfg_status, parse_scan_chain};
use crate::programmer::FlashOperation;

// Quiets the tool's own debug spew down to the structured lines we parse.
const DEBUG_LEVEL_ENV: (&str, &str) = ("OPENOCD_DEBUG_LEVEL", "-3");

/// Values below 100 pass through unchanged; 100 and above report this
/// until the tool confirms the fabric actually configured, and only that
/// confirmation drives the bar to 100.
const PROGRESS_CEILING: f64 = 99.99;

/// Discovery-side capability: enumerate cables and walk their scan chains.
pub trait JtagAdapter
{
	fn list_cables(&self) -> Result<Vec<Cable>>;
	fn scan_chain(&self, cable: &Cable) -> Result<Vec<Tap>>;
}

/// Programming-side capability: long-running operations against one device.
///
/// `taps` must describe the complete chain of the device's cable, not just
/// the target position; the tool refuses a partially declared chain.
/// `on_line` receives every raw output line before classification.
pub trait ProgrammingAdapter
{
	fn program_fpga(
		&self, device: &Device, taps: &[Tap], bitfile: &Path, stop: &AtomicBool,
		on_line: Option<&mut dyn FnMut(&str)>, on_progress: &mut dyn FnMut(f64),
	) -> Result<()>;

	fn program_otp(
		&self, device: &Device, taps: &[Tap], bitfile: &Path, stop: &AtomicBool,
		on_line: Option<&mut dyn FnMut(&str)>, on_progress: &mut dyn FnMut(f64),
	) -> Result<()>;

	fn program_flash(
		&self, device: &Device, taps: &[Tap], bitfile: &Path, operations: FlashOperation, stop: &AtomicBool,
		on_line: Option<&mut dyn FnMut(&str)>, on_progress: &mut dyn FnMut(f64),
	) -> Result<()>;

	fn query_status(&self, device: &Device, taps: &[Tap], stop: &AtomicBool) -> Result<(CfgStatus, String)>;
}

/// Everything classification observed during one tool run.
#[derive(Debug, Default)]
struct RunSummary
{
	command_error: Option<i32>,
	config_error: bool,
	task_timeout: bool,
	cbuffer_timeout: bool,
	unknown_firmware: bool,
	invalid_bitstream: bool,
	config_success: bool,
}

impl RunSummary
{
	/// Fold the summary and the process exit status into a terminal result.
	/// Priority: explicit command error, then fabric config error, task
	/// timeout, circular buffer timeout, unknown firmware, bad bitstream
	/// header, then an unclassified nonzero exit. A confirmed fabric
	/// configuration outranks exit-code noise from tool shutdown.
	fn into_result(self, status: ExitStatus, failure: ProgrammerError) -> Result<()>
	{
		if let ExitStatus::Cancelled = status {
			return Err(ProgrammerError::Cancelled);
		}
		if let Some(code) = self.command_error {
			debug!("tool reported command error {code}");
			return Err(failure);
		}
		if self.config_error
			|| self.task_timeout
			|| self.cbuffer_timeout
			|| self.unknown_firmware
			|| self.invalid_bitstream
		{
			return Err(failure);
		}
		match status {
			ExitStatus::Exited(0) => Ok(()),
			ExitStatus::Exited(code) if self.config_success => {
				warn!("ignoring exit code {code} after successful fabric configuration");
				Ok(())
			},
			ExitStatus::Exited(_) => Err(ProgrammerError::FailedExecuteCommand(None)),
			ExitStatus::Cancelled => Err(ProgrammerError::Cancelled),
		}
	}
}

/// Drives a specific OpenOCD binary through the process bridge.
#[derive(Debug)]
pub struct OpenocdAdapter<E = SystemExecutor>
{
	openocd: PathBuf,
	executor: E,
}

impl OpenocdAdapter<SystemExecutor>
{
	pub fn new(openocd: impl Into<PathBuf>) -> Result<Self>
	{
		Self::with_executor(openocd, SystemExecutor)
	}
}

impl<E: CommandExecutor> OpenocdAdapter<E>
{
	/// Checked at construction and again before each spawn; the binary can
	/// disappear between the two.
	pub fn with_executor(openocd: impl Into<PathBuf>, executor: E) -> Result<Self>
	{
		let openocd = openocd.into();
		if !openocd.is_file() {
			return Err(ProgrammerError::OpenOcdExecutableNotFound);
		}
		Ok(Self {
			openocd,
			executor,
		})
	}

	pub fn executable(&self) -> &Path
	{
		&self.openocd
	}

	#[cfg(test)]
	pub(crate) fn executor(&self) -> &E
	{
		&self.executor
	}

	fn command_spec(&self, args: Vec<String>) -> Result<CommandSpec>
	{
		if !self.openocd.is_file() {
			return Err(ProgrammerError::OpenOcdExecutableNotFound);
		}
		Ok(CommandSpec {
			program: self.openocd.clone(),
			args,
			env: vec![(DEBUG_LEVEL_ENV.0.into(), DEBUG_LEVEL_ENV.1.into())],
		})
	}

	/// Run one programming operation and fold its output into a result.
	fn run_operation(
		&self, device: &Device, taps: &[Tap], operation: &str, stop: &AtomicBool,
		mut on_line: Option<&mut dyn FnMut(&str)>, on_progress: &mut dyn FnMut(f64),
		failure: ProgrammerError,
	) -> Result<()>
	{
		let spec = self.command_spec(command::full_args(&device.cable, taps, Some(device), operation))?;
		let mut summary = RunSummary::default();

		let status = self.executor.execute_streaming(&spec, stop, &mut |line| {
			// Raw sink sees every line, classified or not.
			if let Some(sink) = on_line.as_mut() {
				sink(line);
			}
			match classify_line(line) {
				Some(OutputEvent::Progress(percent)) => {
					on_progress(if percent < 100.0 { percent } else { PROGRESS_CEILING })
				},
				Some(OutputEvent::CommandError(code)) => summary.command_error = Some(code),
				Some(OutputEvent::TaskTimeout) => summary.task_timeout = true,
				Some(OutputEvent::CircularBufferTimeout) => summary.cbuffer_timeout = true,
				Some(OutputEvent::UnknownFirmware) => summary.unknown_firmware = true,
				Some(OutputEvent::ConfigError {
					..
				}) => summary.config_error = true,
				Some(OutputEvent::ConfigSuccess) => {
					on_progress(100.0);
					summary.config_success = true;
				},
				Some(OutputEvent::InvalidBitstream(version)) => {
					warn!("unsupported bitstream header version {version}");
					summary.invalid_bitstream = true;
				},
				None => {},
			}
		})?;

		summary.into_result(status, failure)
	}

	/// Run a short command under cable config only and capture its output.
	fn run_captured(&self, cable: &Cable, operation: &str, stop: &AtomicBool) -> Result<String>
	{
		let spec = self.command_spec(command::full_args(cable, &[], None, operation))?;
		let (status, captured) = self.executor.execute(&spec, stop)?;
		match status {
			ExitStatus::Exited(0) => Ok(captured),
			ExitStatus::Exited(_) => Err(ProgrammerError::FailedExecuteCommand(None)),
			ExitStatus::Cancelled => Err(ProgrammerError::Cancelled),
		}
	}
}

impl<E: CommandExecutor> JtagAdapter for OpenocdAdapter<E>
{
	fn list_cables(&self) -> Result<Vec<Cable>>
	{
		crate::hardware::enumerate_usb_cables()
	}

	fn scan_chain(&self, cable: &Cable) -> Result<Vec<Tap>>
	{
		let stop = AtomicBool::new(false);
		let report = self.run_captured(cable, "scan_chain", &stop)?;
		Ok(parse_scan_chain(&report))
	}
}

impl<E: CommandExecutor> ProgrammingAdapter for OpenocdAdapter<E>
{
	fn program_fpga(
		&self, device: &Device, taps: &[Tap], bitfile: &Path, stop: &AtomicBool,
		on_line: Option<&mut dyn FnMut(&str)>, on_progress: &mut dyn FnMut(f64),
	) -> Result<()>
	{
		let operation = command::load_command(device, "fpga", bitfile);
		self.run_operation(
			device,
			taps,
			&operation,
			stop,
			on_line,
			on_progress,
			ProgrammerError::FailedToProgramFpga,
		)
	}

	fn program_otp(
		&self, device: &Device, taps: &[Tap], bitfile: &Path, stop: &AtomicBool,
		on_line: Option<&mut dyn FnMut(&str)>, on_progress: &mut dyn FnMut(f64),
	) -> Result<()>
	{
		let operation = command::load_command(device, "otp", bitfile);
		self.run_operation(
			device,
			taps,
			&operation,
			stop,
			on_line,
			on_progress,
			ProgrammerError::FailedToProgramOtp,
		)
	}

	fn program_flash(
		&self, device: &Device, taps: &[Tap], bitfile: &Path, operations: FlashOperation, stop: &AtomicBool,
		mut on_line: Option<&mut dyn FnMut(&str)>, on_progress: &mut dyn FnMut(f64),
	) -> Result<()>
	{
		// Sub-operations run in a fixed relative order, one tool invocation
		// each, stopping at the first failure.
		for operation in [
			FlashOperation::Erase,
			FlashOperation::BlankCheck,
			FlashOperation::Program,
			FlashOperation::Verify,
		] {
			if !operations.contains(operation) {
				continue;
			}
			let script = command::flash_command(device, operation, bitfile);
			// Reborrow the sink for this iteration only.
			let sink = match &mut on_line {
				Some(sink) => Some(&mut **sink as &mut dyn FnMut(&str)),
				None => None,
			};
			self.run_operation(
				device,
				taps,
				&script,
				stop,
				sink,
				on_progress,
				ProgrammerError::FailedToProgramFpga,
			)?;
		}
		Ok(())
	}

	fn query_status(&self, device: &Device, taps: &[Tap], stop: &AtomicBool) -> Result<(CfgStatus, String)>
	{
		let operation = command::status_command(device);
		let spec = self.command_spec(command::full_args(&device.cable, taps, Some(device), &operation))?;
		let (status, captured) = self.executor.execute(&spec, stop)?;
		match status {
			ExitStatus::Exited(0) => {},
			ExitStatus::Exited(_) => return Err(ProgrammerError::FailedExecuteCommand(None)),
			ExitStatus::Cancelled => return Err(ProgrammerError::Cancelled),
		}
		let parsed = parse_cfg_status(&captured).ok_or(ProgrammerError::FailedToParseOutput)?;
		Ok((parsed, captured))
	}
}
