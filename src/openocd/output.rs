// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound half of the adapter protocol: classifying the tool's stdout.
//!
//! The tool emits an unstructured text stream. Every line is tested against
//! a fixed, ordered pattern table; the first match wins and yields a typed
//! event. Lines matching nothing are ordinary chatter, not errors.

use std::sync::LazyLock;

use regex::Regex;

use crate::device::{CfgStatus, Tap};

/// A typed event recovered from one line of tool output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent
{
	/// Transfer progress in percent, `[0, 100]`.
	Progress(f64),
	/// Generic command failure carrying the tool's numeric code.
	CommandError(i32),
	/// The tool gave up waiting on a firmware task.
	TaskTimeout,
	/// The firmware-side circular buffer stalled.
	CircularBufferTimeout,
	/// The device runs firmware this tool does not recognise.
	UnknownFirmware,
	/// Fabric configuration finished in a bad state.
	ConfigError
	{
		cfg_done: u32,
		cfg_error: u32,
	},
	/// Fabric configuration completed; overrides later exit-code noise.
	ConfigSuccess,
	/// The bitstream's container header version is unsupported.
	InvalidBitstream(String),
}

/// Discriminant of [`OutputEvent`], used to key the pattern table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EventKind
{
	Progress,
	CommandError,
	TaskTimeout,
	CircularBufferTimeout,
	UnknownFirmware,
	ConfigError,
	ConfigSuccess,
	InvalidBitstream,
}

static PATTERNS: LazyLock<Vec<(EventKind, Regex)>> = LazyLock::new(|| {
	// Order is priority: when a synthetic line could match two entries, the
	// earlier one must win. Patterns are disjoint on real tool output.
	[
		(EventKind::Progress, r"(?i)Progress +(\d+\.\d+)% +\((\d+)/(\d+) +bytes\)"),
		(EventKind::CommandError, r"(?i)\[RS\] Command error (\d+)\."),
		(EventKind::TaskTimeout, r"(?i)\[RS\] Timed out waiting for task to complete\."),
		(EventKind::CircularBufferTimeout, r"(?i)\[RS\] Circular buffer timed out\."),
		(EventKind::UnknownFirmware, r"(?i)\[RS\] Unknown firmware"),
		(
			EventKind::ConfigError,
			r"(?i)\[RS\] FPGA fabric configuration error \(cfg_done *= *(\d+), *cfg_error *= *(\d+)\)",
		),
		(EventKind::ConfigSuccess, r"(?i)\[RS\] Configured FPGA fabric successfully"),
		(EventKind::InvalidBitstream, r"(?i)\[RS\] Unsupported UBI header version ([0-9a-f]+)"),
	]
	.into_iter()
	.map(|(kind, pattern)| {
		let regex = Regex::new(pattern).unwrap_or_else(|error| panic!("bad pattern {pattern:?}: {error}"));
		(kind, regex)
	})
	.collect()
});

/// The ordered classification table, exposed so tests can enumerate it.
pub fn pattern_table() -> &'static [(EventKind, Regex)]
{
	&PATTERNS
}

/// Classify one line of tool output. Returns `None` for unrecognised
/// chatter, which callers forward verbatim to any raw-output sink.
pub fn classify_line(line: &str) -> Option<OutputEvent>
{
	for (kind, regex) in PATTERNS.iter() {
		let Some(caps) = regex.captures(line) else {
			continue;
		};
		let event = match kind {
			EventKind::Progress => OutputEvent::Progress(caps[1].parse().unwrap_or_default()),
			EventKind::CommandError => OutputEvent::CommandError(caps[1].parse().unwrap_or_default()),
			EventKind::TaskTimeout => OutputEvent::TaskTimeout,
			EventKind::CircularBufferTimeout => OutputEvent::CircularBufferTimeout,
			EventKind::UnknownFirmware => OutputEvent::UnknownFirmware,
			EventKind::ConfigError => OutputEvent::ConfigError {
				cfg_done: caps[1].parse().unwrap_or_default(),
				cfg_error: caps[2].parse().unwrap_or_default(),
			},
			EventKind::ConfigSuccess => OutputEvent::ConfigSuccess,
			EventKind::InvalidBitstream => OutputEvent::InvalidBitstream(caps[1].to_string()),
		};
		return Some(event);
	}
	None
}

// One row per tap, fixed columns: index, name, enabled, idcode, expected
// idcode, IR length, IR capture, IR mask. Banner and separator lines fail
// the match and are skipped.
static SCAN_ROW: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)(\d+) +(\w+\.\w+) +([YN]) +(0x[0-9a-f]+) +(0x[0-9a-f]+) +(\d+) +(0x[0-9a-f]+) +(0x[0-9a-f]+)")
		.unwrap_or_else(|error| panic!("bad scan row pattern: {error}"))
});

fn parse_hex(text: &str) -> Option<u32>
{
	let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))?;
	u32::from_str_radix(digits, 16).ok()
}

fn parse_scan_row(line: &str) -> Option<Tap>
{
	let caps = SCAN_ROW.captures(line)?;
	Some(Tap {
		index: caps[1].parse().ok()?,
		idcode: parse_hex(&caps[4])?,
		irlength: caps[6].parse().ok()?,
		irmask: parse_hex(&caps[8])?,
	})
}

/// Parse the tool's `scan_chain` tabular report into tap records.
pub fn parse_scan_chain(report: &str) -> Vec<Tap>
{
	report.lines().filter_map(parse_scan_row).collect()
}

static CFG_STATUS: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)cfg_done *= *(\d+)[, ]+cfg_error *= *(\d+)")
		.unwrap_or_else(|error| panic!("bad status pattern: {error}"))
});

/// Extract the configuration status fields from a status query print-out.
pub fn parse_cfg_status(output: &str) -> Option<CfgStatus>
{
	let caps = CFG_STATUS.captures(output)?;
	Some(CfgStatus {
		cfg_done: &caps[1] != "0",
		cfg_error: &caps[2] != "0",
	})
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn progress_line()
	{
		let event = classify_line("Progress 45.00% (450/1000 bytes)");
		assert_eq!(event, Some(OutputEvent::Progress(45.0)));
	}

	#[test]
	fn command_error_line()
	{
		let event = classify_line("[RS] Command error 6.");
		assert_eq!(event, Some(OutputEvent::CommandError(6)));
	}

	#[test]
	fn timeout_lines()
	{
		assert_eq!(
			classify_line("[RS] Timed out waiting for task to complete."),
			Some(OutputEvent::TaskTimeout)
		);
		assert_eq!(
			classify_line("[RS] Circular buffer timed out."),
			Some(OutputEvent::CircularBufferTimeout)
		);
	}

	#[test]
	fn config_outcome_lines()
	{
		assert_eq!(
			classify_line("[RS] FPGA fabric configuration error (cfg_done = 0, cfg_error = 1)"),
			Some(OutputEvent::ConfigError {
				cfg_done: 0,
				cfg_error: 1
			})
		);
		assert_eq!(
			classify_line("[RS] Configured FPGA fabric successfully"),
			Some(OutputEvent::ConfigSuccess)
		);
		assert_eq!(
			classify_line("[RS] Unknown firmware"),
			Some(OutputEvent::UnknownFirmware)
		);
		assert_eq!(
			classify_line("[RS] Unsupported UBI header version 2a"),
			Some(OutputEvent::InvalidBitstream("2a".into()))
		);
	}

	#[test]
	fn chatter_is_unclassified()
	{
		assert_eq!(classify_line("Open On-Chip Debugger 0.12.0"), None);
		assert_eq!(classify_line("Info : clock speed 1000 kHz"), None);
		assert_eq!(classify_line(""), None);
	}

	#[test]
	fn classification_is_case_insensitive()
	{
		assert_eq!(
			classify_line("[rs] configured fpga FABRIC successfully"),
			Some(OutputEvent::ConfigSuccess)
		);
	}

	#[test]
	fn priority_order_is_first_match()
	{
		// A line engineered to satisfy two patterns must classify as the
		// earlier table entry.
		let line = "Progress 10.00% (100/1000 bytes) [RS] Command error 3.";
		assert_eq!(classify_line(line), Some(OutputEvent::Progress(10.0)));

		// And the table itself is in the documented order.
		let kinds: Vec<EventKind> = pattern_table().iter().map(|(kind, _)| *kind).collect();
		assert_eq!(kinds, vec![
			EventKind::Progress,
			EventKind::CommandError,
			EventKind::TaskTimeout,
			EventKind::CircularBufferTimeout,
			EventKind::UnknownFirmware,
			EventKind::ConfigError,
			EventKind::ConfigSuccess,
			EventKind::InvalidBitstream,
		]);
	}

	#[test]
	fn scan_report_row()
	{
		let taps = parse_scan_chain(" 0 omap5912.dsp Y 0x03df1d81 0x03df1d81 38 0x01 0x03");
		assert_eq!(taps, vec![Tap {
			index: 0,
			idcode: 0x03df_1d81,
			irlength: 38,
			irmask: 0x03,
		}]);
	}

	#[test]
	fn scan_report_skips_banner_lines()
	{
		let report = "   TapName            Enabled IdCode     Expected   IrLen IrCap IrMask\n\
		              -- ------------------ ------- ---------- ---------- ----- ----- ------\n\
		              0 omap5912.dsp          Y    0x03df1d81 0x03df1d81    38 0x01  0x03\n\
		              1 omap5912.arm          Y    0x0692602F 0x0692602f     4 0x01  0x0f\n";
		let taps = parse_scan_chain(report);
		assert_eq!(taps.len(), 2);
		assert_eq!(taps[0].idcode, 0x03df_1d81);
		// Hex parsing tolerates either case.
		assert_eq!(taps[1].idcode, 0x0692_602f);
		assert_eq!(taps[1].irlength, 4);
	}

	#[test]
	fn cfg_status_parse()
	{
		let status = parse_cfg_status("[RS] cfg_done = 1, cfg_error = 0").unwrap();
		assert!(status.cfg_done);
		assert!(!status.cfg_error);
		assert!(parse_cfg_status("no structured answer here").is_none());
	}
}
