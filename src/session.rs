// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caller-owned session context.
//!
//! Holds the configured adapter-tool path for the lifetime of one session
//! and hands out the discovery and programming front-ends borrowing it.
//! There is no hidden process-wide state: create one [`Session`] per
//! session, drop it when done.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::hardware::HardwareManager;
use crate::openocd::OpenocdAdapter;
use crate::programmer::ProgrammerTool;

#[derive(Debug)]
pub struct Session
{
	adapter: OpenocdAdapter,
}

impl Session
{
	/// Validates the tool binary up front so a missing installation fails
	/// here rather than halfway into an operation.
	pub fn new(openocd: impl Into<PathBuf>) -> Result<Self>
	{
		Ok(Self {
			adapter: OpenocdAdapter::new(openocd)?,
		})
	}

	pub fn openocd_path(&self) -> &Path
	{
		self.adapter.executable()
	}

	pub fn hardware_manager(&self) -> HardwareManager<'_>
	{
		HardwareManager::new(&self.adapter)
	}

	pub fn programmer(&self) -> ProgrammerTool<'_>
	{
		ProgrammerTool::new(&self.adapter)
	}
}
