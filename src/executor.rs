// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process execution bridge.
//!
//! The external adapter tool is driven as a child process whose stdout is
//! consumed line by line. The bridge owns the subprocess for the duration of
//! one call and honours a shared stop flag with at most one line-read of
//! latency. Cancellation is cooperative: the read loop stops and the child
//! is reaped through normal handle teardown, never signalled from here.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace};

use crate::error::{ProgrammerError, Result};

/// A fully rendered invocation of the external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec
{
	pub program: PathBuf,
	pub args: Vec<String>,
	pub env: Vec<(String, String)>,
}

impl CommandSpec
{
	/// Deterministic single-line rendering, for logs and test fixtures.
	///
	/// Arguments containing whitespace or `;` are double-quoted, matching
	/// how the equivalent shell command line would read.
	pub fn render(&self) -> String
	{
		let mut rendered = String::new();
		for (key, value) in &self.env {
			rendered.push_str(key);
			rendered.push('=');
			rendered.push_str(value);
			rendered.push(' ');
		}
		rendered.push_str(&self.program.display().to_string());
		for arg in &self.args {
			rendered.push(' ');
			if arg.contains(' ') || arg.contains(';') {
				rendered.push('"');
				rendered.push_str(arg);
				rendered.push('"');
			} else {
				rendered.push_str(arg);
			}
		}
		rendered
	}
}

/// How a bridged subprocess run ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExitStatus
{
	/// The subprocess ran to completion with this exit code.
	Exited(i32),
	/// The stop flag was observed and the read loop abandoned the stream.
	Cancelled,
}

/// Contract for running the external tool and streaming its output.
///
/// `on_line` is invoked for every stdout line, in emission order, before any
/// classification the caller may perform. Implementations must check `stop`
/// at least once per line read and must not hang when the subprocess
/// produces no output.
pub trait CommandExecutor
{
	fn execute_streaming(
		&self, spec: &CommandSpec, stop: &AtomicBool, on_line: &mut dyn FnMut(&str),
	) -> Result<ExitStatus>;

	/// Buffered variant: capture all output and return it with the status.
	fn execute(&self, spec: &CommandSpec, stop: &AtomicBool) -> Result<(ExitStatus, String)>
	{
		let mut captured = String::new();
		let status = self.execute_streaming(spec, stop, &mut |line| {
			captured.push_str(line);
			captured.push('\n');
		})?;
		Ok((status, captured))
	}
}

/// The real bridge, backed by `std::process`.
#[derive(Debug, Default)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor
{
	fn execute_streaming(
		&self, spec: &CommandSpec, stop: &AtomicBool, on_line: &mut dyn FnMut(&str),
	) -> Result<ExitStatus>
	{
		debug!("executing: {}", spec.render());

		let mut child = Command::new(&spec.program)
			.args(&spec.args)
			.envs(spec.env.iter().map(|(key, value)| (key, value)))
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::null())
			.spawn()
			.map_err(|source| ProgrammerError::FailedExecuteCommand(Some(source)))?;

		let stdout = child
			.stdout
			.take()
			.ok_or(ProgrammerError::FailedExecuteCommand(None))?;
		let reader = BufReader::new(stdout);

		let mut cancelled = false;
		for line in reader.lines() {
			if stop.load(Ordering::Relaxed) {
				cancelled = true;
				break;
			}
			let line = line.map_err(|source| ProgrammerError::FailedExecuteCommand(Some(source)))?;
			trace!("tool: {line}");
			on_line(&line);
		}

		if cancelled {
			// Dropping our end of the pipe lets the tool wind down on its
			// own; wait() only reaps it afterwards.
			let _ = child.wait();
			return Ok(ExitStatus::Cancelled);
		}

		let status = child
			.wait()
			.map_err(|source| ProgrammerError::FailedExecuteCommand(Some(source)))?;
		Ok(ExitStatus::Exited(status.code().unwrap_or(-1)))
	}
}
