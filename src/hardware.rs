// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery and identification layer.
//!
//! [`HardwareManager`] resolves user-supplied cable/device selectors into
//! concrete [`Cable`] and [`Device`] records by enumerating the USB bus,
//! walking scan chains, and matching what it finds against the compiled-in
//! hardware database. Every call recomputes from scratch and returns an
//! owned snapshot; nothing is cached here.

use log::debug;

use crate::device::{Cable, Device, Tap, TransportType, lookup_cable, lookup_device};
use crate::error::{ProgrammerError, Result};
use crate::openocd::JtagAdapter;

/// Default adapter clock until a caller overrides it, in kHz.
const DEFAULT_SPEED_KHZ: u32 = 1000;

/// Enumerate attached debug cables by filtering the USB bus against the
/// known vendor/product ID pairs. Unrecognised devices are skipped.
pub fn enumerate_usb_cables() -> Result<Vec<Cable>>
{
	let devices = nusb::list_devices().map_err(|source| ProgrammerError::FailedExecuteCommand(Some(source)))?;

	let mut cables = Vec::new();
	for device_info in devices {
		let Some(info) = lookup_cable(device_info.vendor_id(), device_info.product_id()) else {
			continue;
		};
		let index = cables.len() as u32 + 1;
		let bus_addr = device_info.bus_number();
		let device_addr = device_info.device_address();
		cables.push(Cable {
			name: format!("{}_{}_{}", info.name, bus_addr, device_addr),
			index,
			cable_type: info.cable_type,
			vendor_id: info.vid,
			product_id: info.pid,
			serial_number: device_info.serial_number().map(str::to_string),
			speed: DEFAULT_SPEED_KHZ,
			transport: TransportType::Jtag,
			bus_addr,
			// Bus and device address are enough to tell identical adapters
			// apart; finer USB topology is not needed for any command.
			port_addr: 0,
			device_addr,
			channel: 0,
		});
	}
	debug!("found {} cable(s)", cables.len());
	Ok(cables)
}

pub struct HardwareManager<'adapter>
{
	adapter: &'adapter dyn JtagAdapter,
}

impl<'adapter> HardwareManager<'adapter>
{
	pub fn new(adapter: &'adapter dyn JtagAdapter) -> Self
	{
		Self {
			adapter,
		}
	}

	/// All detected cables, in stable discovery order. Empty when none are
	/// attached; never an error for that case.
	pub fn list_cables(&self) -> Result<Vec<Cable>>
	{
		self.adapter.list_cables()
	}

	/// Resolve a selector to a cable. The selector is an exact name, or,
	/// when `numeric_name_as_index` is set and it parses as a number, a
	/// 1-based index into discovery order. Out-of-range never errors.
	pub fn resolve_cable(&self, selector: &str, numeric_name_as_index: bool) -> Result<Option<Cable>>
	{
		let cables = self.list_cables()?;
		if numeric_name_as_index && let Ok(index) = selector.parse::<u32>() {
			return Ok(cables.into_iter().find(|cable| cable.index == index));
		}
		Ok(cables.into_iter().find(|cable| cable.name == selector))
	}

	pub fn cable_exists(&self, selector: &str, numeric_name_as_index: bool) -> Result<bool>
	{
		Ok(self.resolve_cable(selector, numeric_name_as_index)?.is_some())
	}

	/// Scan the cable's chain and surface every tap with a database match
	/// as a device. Unknown silicon is valid on a chain and is silently
	/// dropped, not an error.
	pub fn list_devices(&self, cable: &Cable) -> Result<Vec<Device>>
	{
		let taps = self.adapter.scan_chain(cable)?;
		Ok(Self::match_devices(cable, &taps))
	}

	/// Resolve a cable selector, then find the device with the given
	/// 1-based index on it. Also returns the complete tap list of the
	/// chain, which later programming calls must declare in full.
	pub fn find_device(
		&self, cable_selector: &str, device_index: u32, numeric_name_as_index: bool,
	) -> Result<Option<(Device, Vec<Tap>)>>
	{
		let Some(cable) = self.resolve_cable(cable_selector, numeric_name_as_index)? else {
			return Ok(None);
		};
		let taps = self.adapter.scan_chain(&cable)?;
		let found = Self::match_devices(&cable, &taps)
			.into_iter()
			.find(|device| device.index == device_index);
		Ok(found.map(|device| (device, taps)))
	}

	fn match_devices(cable: &Cable, taps: &[Tap]) -> Vec<Device>
	{
		let mut devices = Vec::new();
		for tap in taps {
			let Some(info) = lookup_device(tap.idcode, tap.irlength) else {
				debug!("tap {} (idcode {:#010x}) has no database match, skipping", tap.index, tap.idcode);
				continue;
			};
			devices.push(Device {
				name: info.name.to_string(),
				index: devices.len() as u32 + 1,
				idcode: info.idcode,
				irlength: info.irlength,
				irmask: info.irmask,
				device_type: info.device_type,
				flash_size: info.flash_size,
				cable: cable.clone(),
				tap: *tap,
			});
		}
		devices
	}
}

#[cfg(test)]
mod tests
{
	use std::cell::RefCell;

	use super::*;
	use crate::device::CableType;

	/// Canned discovery results standing in for the USB bus and the tool.
	struct FakeJtag
	{
		cables: Vec<Cable>,
		chains: RefCell<Vec<Vec<Tap>>>,
	}

	impl JtagAdapter for FakeJtag
	{
		fn list_cables(&self) -> Result<Vec<Cable>>
		{
			Ok(self.cables.clone())
		}

		fn scan_chain(&self, _cable: &Cable) -> Result<Vec<Tap>>
		{
			Ok(self.chains.borrow_mut().remove(0))
		}
	}

	fn cable(index: u32) -> Cable
	{
		Cable {
			name: format!("RsFtdi_1_{index}"),
			index,
			cable_type: CableType::Ftdi,
			vendor_id: 0x0403,
			product_id: 0x6011,
			serial_number: None,
			speed: 1000,
			transport: TransportType::Jtag,
			bus_addr: 1,
			port_addr: 0,
			device_addr: index as u8,
			channel: 0,
		}
	}

	fn tap(index: u32, idcode: u32, irlength: u32) -> Tap
	{
		Tap {
			index,
			idcode,
			irlength,
			irmask: 0x03,
		}
	}

	#[test]
	fn selector_by_name_and_index()
	{
		let adapter = FakeJtag {
			cables: vec![cable(1), cable(2)],
			chains: RefCell::new(vec![]),
		};
		let manager = HardwareManager::new(&adapter);

		assert!(manager.cable_exists("RsFtdi_1_2", false).unwrap());
		assert!(!manager.cable_exists("2", false).unwrap());
		assert!(manager.cable_exists("2", true).unwrap());
		// Out of range resolves to not-found, never an error.
		assert!(!manager.cable_exists("7", true).unwrap());
		assert!(!manager.cable_exists("nonsense", true).unwrap());
	}

	#[test]
	fn unknown_taps_are_dropped()
	{
		let adapter = FakeJtag {
			cables: vec![cable(1)],
			chains: RefCell::new(vec![vec![
				tap(0, 0x03df_1d81, 38), // unknown silicon
				tap(1, 0x1000_563d, 5),  // Gemini
				tap(2, 0x1000_0db3, 5),  // Ocla
			]]),
		};
		let manager = HardwareManager::new(&adapter);

		let devices = manager.list_devices(&cable(1)).unwrap();
		assert_eq!(devices.len(), 2);
		assert_eq!(devices[0].name, "Gemini");
		assert_eq!(devices[0].index, 1);
		assert_eq!(devices[0].tap.index, 1);
		assert_eq!(devices[1].name, "Ocla");
		assert_eq!(devices[1].index, 2);
	}

	#[test]
	fn find_device_returns_full_tap_list()
	{
		let chain = vec![tap(0, 0x03df_1d81, 38), tap(1, 0x1000_563d, 5)];
		let adapter = FakeJtag {
			cables: vec![cable(1)],
			chains: RefCell::new(vec![chain.clone()]),
		};
		let manager = HardwareManager::new(&adapter);

		let (device, taps) = manager.find_device("1", 1, true).unwrap().unwrap();
		assert_eq!(device.name, "Gemini");
		assert_eq!(device.tap.index, 1);
		// The whole chain comes back, including the unmatched tap.
		assert_eq!(taps, chain);
	}

	#[test]
	fn find_device_consistent_with_list_devices()
	{
		let chain = vec![tap(0, 0x1000_563d, 5)];
		let adapter = FakeJtag {
			cables: vec![cable(1)],
			chains: RefCell::new(vec![chain.clone(), chain]),
		};
		let manager = HardwareManager::new(&adapter);

		let listed = manager.list_devices(&cable(1)).unwrap();
		let (found, _) = manager.find_device("RsFtdi_1_1", 1, false).unwrap().unwrap();
		assert_eq!(listed[0], found);
	}

	#[test]
	fn missing_cable_and_device_resolve_to_none()
	{
		let adapter = FakeJtag {
			cables: vec![],
			chains: RefCell::new(vec![]),
		};
		let manager = HardwareManager::new(&adapter);

		assert!(manager.list_cables().unwrap().is_empty());
		assert!(!manager.cable_exists("RsFtdi_1_1", true).unwrap());
		assert!(manager.find_device("RsFtdi_1_1", 1, true).unwrap().is_none());
	}
}
