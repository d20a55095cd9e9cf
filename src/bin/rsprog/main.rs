// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::stdout;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use clap::builder::styling::Styles;
use clap::{Args, CommandFactory, Parser, Subcommand, crate_description, crate_version};
use clap_complete::{Shell, generate};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use rsprog::device::{Cable, Device, Tap};
use rsprog::error::ProgrammerError;
use rsprog::programmer::FlashOperation;
use rsprog::session::Session;

#[derive(Parser)]
#[command(
	version,
	about = format!("{} v{}", crate_description!(), crate_version!()),
	styles(style()),
	arg_required_else_help(true)
)]
struct CliArguments
{
	#[arg(global = true, long = "openocd")]
	/// Path to the OpenOCD executable (defaults to $OPENOCD_PATH)
	openocd: Option<PathBuf>,

	#[command(subcommand)]
	subcommand: ToplevelCommands,
}

#[derive(Subcommand)]
enum ToplevelCommands
{
	/// List attached debug cables
	ListCable(ListCableArguments),
	/// List recognised devices, on one cable or on all of them
	ListDevice(ListDeviceArguments),
	/// Query the configuration status of a device
	FpgaStatus(TargetArguments),
	/// Load a bitstream into a device's FPGA fabric
	FpgaConfig(BitfileArguments),
	/// Write a device's one-time-programmable memory (irreversible!)
	Otp(OtpArguments),
	/// Run flash operations against a device's SPI flash
	Flash(FlashArguments),
	/// Generate shell completions for this tool
	Complete(CompletionArguments),
}

#[derive(Args)]
struct ListCableArguments
{
	#[arg(short = 'v', long = "verbose", default_value_t = false)]
	verbose: bool,
}

#[derive(Args)]
struct ListDeviceArguments
{
	/// Cable name, or 1-based cable index
	cable: Option<String>,

	#[arg(short = 'v', long = "verbose", default_value_t = false)]
	verbose: bool,
}

#[derive(Args)]
struct TargetArguments
{
	#[arg(short = 'c', long = "cable")]
	/// Cable name, or 1-based cable index
	cable: String,

	#[arg(short = 'i', long = "index", default_value_t = 1)]
	/// 1-based device index on the cable
	index: u32,

	#[arg(short = 'v', long = "verbose", default_value_t = false)]
	verbose: bool,
}

#[derive(Args)]
struct BitfileArguments
{
	/// Bitstream file to load
	bitfile: PathBuf,

	#[command(flatten)]
	target: TargetArguments,
}

#[derive(Args)]
struct OtpArguments
{
	#[command(flatten)]
	bitfile: BitfileArguments,

	#[arg(short = 'y', long = "confirm", default_value_t = false)]
	/// Acknowledge that OTP programming cannot be undone
	confirm: bool,
}

#[derive(Args)]
struct FlashArguments
{
	#[command(flatten)]
	bitfile: BitfileArguments,

	#[arg(long = "operations", default_value = "program")]
	/// Comma-separated subset of: erase, blankcheck, program, verify
	operations: String,
}

#[derive(Args)]
struct CompletionArguments
{
	shell: Shell,
}

/// Clap v3 style (approximate)
/// See https://stackoverflow.com/a/75343828
fn style() -> Styles
{
	Styles::styled()
		.usage(
			anstyle::Style::new()
				.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow)))
				.bold(),
		)
		.header(
			anstyle::Style::new()
				.bold()
				.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
		)
		.literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
}

fn open_session(cli_args: &CliArguments) -> Result<Session>
{
	let openocd = cli_args
		.openocd
		.clone()
		.or_else(|| std::env::var_os("OPENOCD_PATH").map(PathBuf::from))
		.ok_or_else(|| eyre!("no OpenOCD path given; pass --openocd or set $OPENOCD_PATH"))?;
	Ok(Session::new(openocd)?)
}

/// Alias string in the `<cable>-<device><index>-<size>KB` form callers
/// script against.
fn device_alias(device: &Device) -> String
{
	format!(
		"{}-{}<{}>-{}KB",
		device.cable.name,
		device.name,
		device.index,
		device.flash_size / 1024
	)
}

fn print_cables(cables: &[Cable], verbose: bool)
{
	for cable in cables {
		if verbose {
			println!(
				"{}  index {}  vid:pid {:04x}:{:04x}  serial {}",
				cable.name,
				cable.index,
				cable.vendor_id,
				cable.product_id,
				cable.serial_number.as_deref().unwrap_or("-")
			);
		} else {
			println!("{}", cable.name);
		}
	}
}

fn print_devices(devices: &[Device], verbose: bool)
{
	for device in devices {
		if verbose {
			println!(
				"{}  index {}  idcode {:#010x}  irlen {}  flash {}KB",
				device_alias(device),
				device.index,
				device.idcode,
				device.irlength,
				device.flash_size / 1024
			);
		} else {
			println!("{}", device_alias(device));
		}
	}
}

fn list_cable_command(cli_args: &CliArguments, list_args: &ListCableArguments) -> Result<()>
{
	let session = open_session(cli_args)?;
	let cables = session.hardware_manager().list_cables()?;
	if cables.is_empty() {
		warn!("No cable is connected.");
		return Ok(());
	}
	print_cables(&cables, list_args.verbose);
	Ok(())
}

fn list_device_command(cli_args: &CliArguments, list_args: &ListDeviceArguments) -> Result<()>
{
	let session = open_session(cli_args)?;
	let manager = session.hardware_manager();

	if let Some(selector) = &list_args.cable {
		let Some(cable) = manager.resolve_cable(selector, true)? else {
			error!("Cable '{selector}' not found");
			return Err(ProgrammerError::CableNotFound.into());
		};
		print_devices(&manager.list_devices(&cable)?, list_args.verbose);
		return Ok(());
	}

	let cables = manager.list_cables()?;
	if cables.is_empty() {
		warn!("No cable is connected.");
		return Ok(());
	}
	for cable in &cables {
		print_devices(&manager.list_devices(cable)?, list_args.verbose);
	}
	Ok(())
}

fn resolve_target(session: &Session, target: &TargetArguments) -> Result<(Device, Vec<Tap>)>
{
	let manager = session.hardware_manager();
	if !manager.cable_exists(&target.cable, true)? {
		error!("Cable '{}' not found", target.cable);
		return Err(ProgrammerError::CableNotFound.into());
	}
	let Some(found) = manager.find_device(&target.cable, target.index, true)? else {
		error!("Device {} not found", target.index);
		return Err(ProgrammerError::DeviceNotFound.into());
	};
	Ok(found)
}

fn progress_bar() -> ProgressBar
{
	ProgressBar::new(100).with_style(
		ProgressStyle::default_bar()
			.template(" {percent:>3}% |{bar:50}| [{elapsed}]")
			.unwrap_or_else(|_| ProgressStyle::default_bar()),
	)
}

fn fpga_status_command(cli_args: &CliArguments, target: &TargetArguments) -> Result<()>
{
	let session = open_session(cli_args)?;
	let (device, taps) = resolve_target(&session, target)?;
	let stop = AtomicBool::new(false);

	let (status, raw) = session.programmer().query_fpga_status(&device, &taps, &stop)?;
	if target.verbose {
		println!("{raw}");
	}
	println!("{} {}", status.cfg_done as u8, status.cfg_error as u8);
	Ok(())
}

fn fpga_config_command(cli_args: &CliArguments, config_args: &BitfileArguments) -> Result<()>
{
	let session = open_session(cli_args)?;
	let (device, taps) = resolve_target(&session, &config_args.target)?;
	let stop = AtomicBool::new(false);

	let bar = progress_bar();
	let mut on_progress = |percent: f64| bar.set_position(percent as u64);
	let mut sink = |line: &str| bar.println(line);
	let result = session.programmer().program_fpga(
		&device,
		&taps,
		&config_args.bitfile,
		&stop,
		config_args.target.verbose.then_some(&mut sink as &mut dyn FnMut(&str)),
		&mut on_progress,
	);
	bar.finish();

	match result {
		Ok(()) => {
			info!("Programmed '{}' successfully.", config_args.bitfile.display());
			Ok(())
		},
		Err(error) => {
			error!("Failed to program FPGA. Error code: {}", error.code());
			Err(error.into())
		},
	}
}

fn otp_command(cli_args: &CliArguments, otp_args: &OtpArguments) -> Result<()>
{
	if !otp_args.confirm {
		warn!("The OTP programming is not reversable. Please use -y to indicate your consensus to proceed.");
		return Ok(());
	}

	let session = open_session(cli_args)?;
	let (device, taps) = resolve_target(&session, &otp_args.bitfile.target)?;
	let stop = AtomicBool::new(false);

	let bar = progress_bar();
	let mut on_progress = |percent: f64| bar.set_position(percent as u64);
	let mut sink = |line: &str| bar.println(line);
	let result = session.programmer().program_otp(
		&device,
		&taps,
		&otp_args.bitfile.bitfile,
		true,
		&stop,
		otp_args.bitfile.target.verbose.then_some(&mut sink as &mut dyn FnMut(&str)),
		&mut on_progress,
	);
	bar.finish();

	match result {
		Ok(()) => {
			info!("Programmed '{}' successfully.", otp_args.bitfile.bitfile.display());
			Ok(())
		},
		Err(error) => {
			error!("Failed to program device OTP. Error code: {}", error.code());
			Err(error.into())
		},
	}
}

fn parse_operations(text: &str) -> Result<FlashOperation, ProgrammerError>
{
	let mut operations = FlashOperation::none();
	for word in text.split(',').map(str::trim).filter(|word| !word.is_empty()) {
		operations |= match word.to_ascii_lowercase().as_str() {
			"erase" => FlashOperation::Erase,
			"blankcheck" => FlashOperation::BlankCheck,
			"program" => FlashOperation::Program,
			"verify" => FlashOperation::Verify,
			_ => return Err(ProgrammerError::InvalidArgument(format!("unknown flash operation '{word}'"))),
		};
	}
	Ok(operations)
}

fn flash_command(cli_args: &CliArguments, flash_args: &FlashArguments) -> Result<()>
{
	let operations = parse_operations(&flash_args.operations)?;
	let session = open_session(cli_args)?;
	let (device, taps) = resolve_target(&session, &flash_args.bitfile.target)?;
	let stop = AtomicBool::new(false);

	let bar = progress_bar();
	let mut on_progress = |percent: f64| bar.set_position(percent as u64);
	let mut sink = |line: &str| bar.println(line);
	let result = session.programmer().program_flash(
		&device,
		&taps,
		&flash_args.bitfile.bitfile,
		operations,
		&stop,
		flash_args.bitfile.target.verbose.then_some(&mut sink as &mut dyn FnMut(&str)),
		&mut on_progress,
	);
	bar.finish();

	match result {
		Ok(()) => {
			info!("Programmed '{}' successfully.", flash_args.bitfile.bitfile.display());
			Ok(())
		},
		Err(error) => {
			error!("Failed Flash programming. Error code: {}", error.code());
			Err(error.into())
		},
	}
}

fn main() -> Result<()>
{
	color_eyre::install()?;
	env_logger::Builder::new()
		.filter_level(log::LevelFilter::Info)
		.parse_default_env()
		.init();

	let cli_args = CliArguments::parse();

	match &cli_args.subcommand {
		ToplevelCommands::ListCable(list_args) => list_cable_command(&cli_args, list_args),
		ToplevelCommands::ListDevice(list_args) => list_device_command(&cli_args, list_args),
		ToplevelCommands::FpgaStatus(target) => fpga_status_command(&cli_args, target),
		ToplevelCommands::FpgaConfig(config_args) => fpga_config_command(&cli_args, config_args),
		ToplevelCommands::Otp(otp_args) => otp_command(&cli_args, otp_args),
		ToplevelCommands::Flash(flash_args) => flash_command(&cli_args, flash_args),
		ToplevelCommands::Complete(comp_args) => {
			let mut cmd = CliArguments::command();
			generate(comp_args.shell, &mut cmd, "rsprog", &mut stdout());
			Ok(())
		},
	}
}
