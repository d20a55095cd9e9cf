// SPDX-License-Identifier: MIT OR Apache-2.0

//! Value types describing the attached hardware, plus the compiled-in
//! database of recognised cables and devices.
//!
//! Cables, taps and devices are purely descriptive: they hold no open
//! handles and are recomputed from scratch on every discovery cycle.

use std::fmt::{self, Display};

/// Kind of debug adapter hardware, selecting the driver the external tool
/// must load.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CableType
{
	Ftdi,
	Jlink,
}

/// Wire protocol spoken to the target over the cable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransportType
{
	Jtag,
}

impl Display for TransportType
{
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
	{
		match self {
			Self::Jtag => write!(f, "jtag"),
		}
	}
}

/// Identity of one physical debug adapter, as discovered on the USB bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cable
{
	/// Display alias, unique within one discovery snapshot.
	pub name: String,
	/// 1-based position in discovery order; usable as a selector.
	pub index: u32,
	pub cable_type: CableType,
	pub vendor_id: u16,
	pub product_id: u16,
	/// Disambiguates multiple identical adapters, when the hardware reports one.
	pub serial_number: Option<String>,
	/// Adapter clock rate in kHz.
	pub speed: u32,
	pub transport: TransportType,
	pub bus_addr: u8,
	pub port_addr: u8,
	pub device_addr: u8,
	pub channel: u8,
}

/// One position on a JTAG scan chain, as reported by a live chain scan.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Tap
{
	/// 0-based position in the chain.
	pub index: u32,
	/// 32-bit identity read from the silicon.
	pub idcode: u32,
	/// Instruction register width in bits.
	pub irlength: u32,
	pub irmask: u32,
}

/// Family of a recognised target device.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceType
{
	Gemini,
	Virgo,
	Ocla,
}

impl DeviceType
{
	/// Family discriminator passed to the adapter tool's operation commands.
	pub fn family(&self) -> &'static str
	{
		match self {
			Self::Virgo => "virgo",
			Self::Gemini | Self::Ocla => "gemini",
		}
	}

	/// Whether bitstreams can be loaded into this family at all.
	pub fn is_programmable(&self) -> bool
	{
		matches!(self, Self::Gemini | Self::Virgo)
	}
}

/// A logical target device sitting at a specific tap of a specific cable.
///
/// Only taps whose `(idcode, irlength)` match an entry of [`DEVICE_INFO`]
/// are ever surfaced as devices.
#[derive(Debug, Clone, PartialEq)]
pub struct Device
{
	pub name: String,
	/// 1-based user-facing selector, counted over recognised devices on the cable.
	pub index: u32,
	pub idcode: u32,
	pub irlength: u32,
	pub irmask: u32,
	pub device_type: DeviceType,
	/// Flash capacity in bytes; 0 marks a device without programmable flash.
	pub flash_size: u64,
	pub cable: Cable,
	pub tap: Tap,
}

/// Result of a configuration status query against a device.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct CfgStatus
{
	pub cfg_done: bool,
	pub cfg_error: bool,
}

/// A cable model this subsystem knows how to drive.
#[derive(Debug)]
pub struct CableInfo
{
	pub name: &'static str,
	pub cable_type: CableType,
	pub vid: u16,
	pub pid: u16,
}

/// A device signature this subsystem can recognise on a scan chain.
#[derive(Debug)]
pub struct DeviceInfo
{
	pub name: &'static str,
	pub idcode: u32,
	pub irlength: u32,
	pub irmask: u32,
	pub device_type: DeviceType,
	pub flash_size: u64,
}

/// Known debug cable models, keyed by USB vendor/product ID.
pub const CABLE_INFO: &[CableInfo] = &[
	CableInfo {
		name: "RsFtdi",
		cable_type: CableType::Ftdi,
		vid: 0x0403,
		pid: 0x6011,
	},
	CableInfo {
		name: "Jlink",
		cable_type: CableType::Jlink,
		vid: 0x1366,
		pid: 0x0101,
	},
];

/// Known device signatures. A scanned tap becomes a [`Device`] only on an
/// exact `(idcode, irlength)` match here.
pub const DEVICE_INFO: &[DeviceInfo] = &[
	DeviceInfo {
		name: "Gemini",
		idcode: 0x1000_563d,
		irlength: 5,
		irmask: 0x1f,
		device_type: DeviceType::Gemini,
		flash_size: 16 * 1024 * 1024,
	},
	DeviceInfo {
		name: "Virgo",
		idcode: 0x1000_1db3,
		irlength: 5,
		irmask: 0x1f,
		device_type: DeviceType::Virgo,
		flash_size: 8 * 1024 * 1024,
	},
	DeviceInfo {
		name: "Ocla",
		idcode: 0x1000_0db3,
		irlength: 5,
		irmask: 0x1f,
		device_type: DeviceType::Ocla,
		flash_size: 0,
	},
];

/// Look up a cable model by its USB vendor/product ID pair.
pub fn lookup_cable(vid: u16, pid: u16) -> Option<&'static CableInfo>
{
	CABLE_INFO.iter().find(|info| info.vid == vid && info.pid == pid)
}

/// Look up a device signature by the identity a chain scan reported.
pub fn lookup_device(idcode: u32, irlength: u32) -> Option<&'static DeviceInfo>
{
	DEVICE_INFO
		.iter()
		.find(|info| info.idcode == idcode && info.irlength == irlength)
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn database_lookup_is_exact()
	{
		let info = lookup_device(0x1000_563d, 5).unwrap();
		assert_eq!(info.name, "Gemini");
		assert_eq!(info.device_type, DeviceType::Gemini);

		// Right idcode but wrong IR length must not match.
		assert!(lookup_device(0x1000_563d, 4).is_none());
		// Unknown silicon must not match.
		assert!(lookup_device(0x03df_1d81, 38).is_none());
	}

	#[test]
	fn cable_lookup()
	{
		let info = lookup_cable(0x0403, 0x6011).unwrap();
		assert_eq!(info.cable_type, CableType::Ftdi);
		assert!(lookup_cable(0x0403, 0x6001).is_none());
	}

	#[test]
	fn family_discriminator()
	{
		assert_eq!(DeviceType::Gemini.family(), "gemini");
		assert_eq!(DeviceType::Virgo.family(), "virgo");
		assert!(DeviceType::Gemini.is_programmable());
		assert!(!DeviceType::Ocla.is_programmable());
	}
}
