// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound half of the adapter protocol: building the tool's command line.
//!
//! An invocation is composed of four independent fragments concatenated in
//! fixed order: cable config, tap config, target config, operation command.
//! The tool interprets its `-c` scripts sequentially, so fragment order is
//! load-bearing. Numeric hardware IDs render as `0x`-prefixed hex, all other
//! fields as decimal.

use std::fmt::Write;
use std::path::Path;

use crate::device::{Cable, CableType, Device, DeviceType, Tap};
use crate::programmer::FlashOperation;

// Fixed FTDI GPIO initialisation for the supported cable layout.
const FTDI_LAYOUT_INIT: &str = "0x0c08 0x0f1b";

/// Cable fragment: adapter driver selection plus the session-wide transport
/// settings. Incidental network services are switched off.
pub fn cable_args(cable: &Cable) -> Vec<String>
{
	let mut script = String::new();
	match cable.cable_type {
		CableType::Ftdi => {
			let _ = write!(
				script,
				"adapter driver ftdi;ftdi vid_pid {:#x} {:#x};ftdi layout_init {FTDI_LAYOUT_INIT};",
				cable.vendor_id, cable.product_id
			);
			if let Some(serial) = &cable.serial_number {
				let _ = write!(script, "adapter serial {serial};");
			}
		},
		CableType::Jlink => script.push_str("adapter driver jlink;"),
	}
	let _ = write!(
		script,
		"adapter speed {};transport select {};telnet_port disabled;gdb_port disabled;",
		cable.speed, cable.transport
	);
	vec!["-c".into(), script]
}

/// Tap fragment: one declaration per tap on the chain, target or not. The
/// tool verifies each expected IDCODE itself when it walks the chain.
pub fn tap_args(taps: &[Tap]) -> Vec<String>
{
	if taps.is_empty() {
		return Vec::new();
	}
	let mut script = String::new();
	for tap in taps {
		let _ = write!(
			script,
			"jtag newtap tap{} tap -irlen {} -expected-id {:#x};",
			tap.index, tap.irlength, tap.idcode
		);
	}
	vec!["-c".into(), script]
}

/// Target fragment: bind a target to the device's chain position and, for
/// programmable families, load the pld driver.
pub fn target_args(device: &Device) -> Vec<String>
{
	match device.device_type {
		DeviceType::Gemini | DeviceType::Virgo => vec![
			"-c".into(),
			format!(
				"target create gemini{} riscv -endian little -chain-position tap{}.tap;",
				device.index, device.tap.index
			),
			"-c".into(),
			format!("pld device gemini gemini{}", device.index),
		],
		DeviceType::Ocla => vec![
			"-c".into(),
			format!(
				"target create gemini{} testee -chain-position tap{}.tap;",
				device.index, device.tap.index
			),
		],
	}
}

/// Operation command loading a bitstream into the fabric or the OTP array.
pub fn load_command(device: &Device, destination: &str, bitfile: &Path) -> String
{
	format!(
		"gemini load {} {destination} {} -p 1 -d {}",
		device.index,
		bitfile.display(),
		device.device_type.family()
	)
}

/// Operation command for one flash sub-operation.
pub fn flash_command(device: &Device, operation: FlashOperation, bitfile: &Path) -> String
{
	let index = device.index;
	let family = device.device_type.family();
	match operation {
		FlashOperation::Erase => format!("gemini flash erase {index} -d {family}"),
		FlashOperation::BlankCheck => format!("gemini flash blankcheck {index} -d {family}"),
		FlashOperation::Program => {
			format!("gemini flash program {index} {} -p 1 -d {family}", bitfile.display())
		},
		_ => format!("gemini flash verify {index} {} -d {family}", bitfile.display()),
	}
}

/// Operation command querying the fabric configuration status.
pub fn status_command(device: &Device) -> String
{
	format!("gemini status {} -d {}", device.index, device.device_type.family())
}

/// Assemble a complete argument list: logging prologue, the three config
/// fragments, then `init`, the operation, and `exit`.
pub fn full_args(cable: &Cable, taps: &[Tap], target: Option<&Device>, operation: &str) -> Vec<String>
{
	let mut args: Vec<String> = vec!["-l".into(), "/dev/stdout".into(), "-d2".into()];
	args.extend(cable_args(cable));
	args.extend(tap_args(taps));
	if let Some(device) = target {
		args.extend(target_args(device));
	}
	for script in ["init", operation, "exit"] {
		args.push("-c".into());
		args.push(script.into());
	}
	args
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::device::TransportType;

	pub(crate) fn ftdi_cable() -> Cable
	{
		Cable {
			name: "RsFtdi_1_7".into(),
			index: 1,
			cable_type: CableType::Ftdi,
			vendor_id: 0x0403,
			product_id: 0x6011,
			serial_number: None,
			speed: 1000,
			transport: TransportType::Jtag,
			bus_addr: 1,
			port_addr: 2,
			device_addr: 7,
			channel: 0,
		}
	}

	pub(crate) fn gemini_device(cable: Cable) -> Device
	{
		let tap = Tap {
			index: 0,
			idcode: 0x1000_563d,
			irlength: 5,
			irmask: 0x1f,
		};
		Device {
			name: "Gemini".into(),
			index: 1,
			idcode: tap.idcode,
			irlength: tap.irlength,
			irmask: tap.irmask,
			device_type: DeviceType::Gemini,
			flash_size: 16 * 1024 * 1024,
			cable,
			tap,
		}
	}

	#[test]
	fn ftdi_cable_fragment()
	{
		let args = cable_args(&ftdi_cable());
		assert_eq!(args, vec![
			"-c".to_string(),
			"adapter driver ftdi;ftdi vid_pid 0x403 0x6011;ftdi layout_init 0x0c08 0x0f1b;\
			 adapter speed 1000;transport select jtag;telnet_port disabled;gdb_port disabled;"
				.to_string(),
		]);
	}

	#[test]
	fn ftdi_serial_disambiguation()
	{
		let mut cable = ftdi_cable();
		cable.serial_number = Some("FT7XA9QC".into());
		let script = &cable_args(&cable)[1];
		assert!(script.contains("adapter serial FT7XA9QC;"));
	}

	#[test]
	fn jlink_cable_fragment()
	{
		let mut cable = ftdi_cable();
		cable.cable_type = CableType::Jlink;
		let script = &cable_args(&cable)[1];
		assert!(script.starts_with("adapter driver jlink;"));
		assert!(!script.contains("vid_pid"));
	}

	#[test]
	fn tap_fragment_declares_whole_chain()
	{
		let taps = [
			Tap {
				index: 0,
				idcode: 0x1000_563d,
				irlength: 5,
				irmask: 0x1f,
			},
			Tap {
				index: 1,
				idcode: 0x0692_602f,
				irlength: 4,
				irmask: 0x0f,
			},
		];
		let args = tap_args(&taps);
		assert_eq!(args[1], "jtag newtap tap0 tap -irlen 5 -expected-id 0x1000563d;\
		                     jtag newtap tap1 tap -irlen 4 -expected-id 0x692602f;");
		assert!(tap_args(&[]).is_empty());
	}

	#[test]
	fn target_fragment_by_family()
	{
		let device = gemini_device(ftdi_cable());
		let args = target_args(&device);
		assert_eq!(args, vec![
			"-c".to_string(),
			"target create gemini1 riscv -endian little -chain-position tap0.tap;".to_string(),
			"-c".to_string(),
			"pld device gemini gemini1".to_string(),
		]);

		let mut ocla = device;
		ocla.device_type = DeviceType::Ocla;
		let args = target_args(&ocla);
		assert_eq!(args, vec![
			"-c".to_string(),
			"target create gemini1 testee -chain-position tap0.tap;".to_string(),
		]);
	}

	#[test]
	fn operation_commands()
	{
		let device = gemini_device(ftdi_cable());
		let bitfile = Path::new("/tmp/top.bit");
		assert_eq!(
			load_command(&device, "fpga", bitfile),
			"gemini load 1 fpga /tmp/top.bit -p 1 -d gemini"
		);
		assert_eq!(
			load_command(&device, "otp", bitfile),
			"gemini load 1 otp /tmp/top.bit -p 1 -d gemini"
		);
		assert_eq!(
			flash_command(&device, FlashOperation::Erase, bitfile),
			"gemini flash erase 1 -d gemini"
		);
		assert_eq!(
			flash_command(&device, FlashOperation::Program, bitfile),
			"gemini flash program 1 /tmp/top.bit -p 1 -d gemini"
		);
		assert_eq!(status_command(&device), "gemini status 1 -d gemini");
	}

	#[test]
	fn virgo_family_discriminator()
	{
		let mut device = gemini_device(ftdi_cable());
		device.device_type = DeviceType::Virgo;
		assert!(load_command(&device, "fpga", Path::new("a.bit")).ends_with("-d virgo"));
	}

	#[test]
	fn assembly_is_deterministic()
	{
		let device = gemini_device(ftdi_cable());
		let taps = [device.tap];
		let operation = load_command(&device, "fpga", Path::new("/tmp/top.bit"));
		let first = full_args(&device.cable, &taps, Some(&device), &operation);
		let second = full_args(&device.cable, &taps, Some(&device), &operation);
		assert_eq!(first, second);

		// Fragment order: prologue, cable, taps, target, init/operation/exit.
		assert_eq!(first[0..3], ["-l".to_string(), "/dev/stdout".to_string(), "-d2".to_string()]);
		assert!(first[4].starts_with("adapter driver"));
		assert!(first[6].starts_with("jtag newtap"));
		assert!(first[8].starts_with("target create"));
		assert_eq!(first[first.len() - 1], "exit");
		assert_eq!(first[first.len() - 3], operation);
	}
}
