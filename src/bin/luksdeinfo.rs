//! luksdeinfo: determines information about a Linux Unified Key Setup (LUKS) volume.

use std::{path::PathBuf, process::ExitCode};
use anyhow::{Context, Result};
use clap::Parser;
use luksde::{Volume, VolumeOptions};

#[derive(Parser, Debug)]
#[command(
	name = "luksdeinfo",
	version,
	about = "Determines information about a Linux Unified Key Setup (LUKS) volume."
)]
struct Cli {
	/// The master key, formatted in base16.
	#[arg(short = 'k', value_name = "KEYS")]
	keys: Option<String>,

	/// The byte offset of the LUKS volume within the source.
	#[arg(short = 'o', value_name = "OFFSET", default_value_t = 0)]
	offset: u64,

	/// The password/passphrase.
	#[arg(short = 'p', value_name = "PASSWORD")]
	password: Option<String>,

	/// Verbose output to stderr.
	#[arg(short = 'v')]
	verbose: bool,

	/// The source file or device.
	source: PathBuf,
}

fn init_logging(verbose: bool) {
	let level = if verbose { "debug" } else { "warn" };
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
		.format_timestamp(None)
		.init();
}

fn new_volume(cli: &Cli) -> Volume {
	Volume::with_options(VolumeOptions::default().with_volume_offset(cli.offset))
}

/// Prints the volume information and returns whether the volume is unlocked.
fn run(cli: &Cli, volume: &mut Volume) -> Result<bool> {
	if let Some(keys) = &cli.keys {
		volume.set_keys(keys).context("Unable to set keys")?;
	}
	if let Some(password) = &cli.password {
		volume.set_password(password);
	}
	volume
		.open(&cli.source)
		.with_context(|| format!("Unable to open: {}", cli.source.display()))?;

	let header = volume
		.header()
		.context("Unable to print volume information")?;
	println!("Linux Unified Key Setup (LUKS) information:");
	println!("{}", header);
	if !volume.is_locked() {
		println!("Volume size: {} bytes", volume.size()?);
	}
	println!();

	let unlocked = !volume.is_locked();
	volume.close().context("Unable to close volume")?;
	Ok(unlocked)
}

/// 0 for an unlocked volume, 1 for a locked one or an error.
fn exit_status(outcome: &Result<bool>) -> u8 {
	match outcome {
		Ok(true) => 0,
		Ok(false) => {
			eprintln!("Unable to unlock volume.");
			1
		}
		Err(e) => {
			eprintln!("{:#}", e);
			1
		}
	}
}

fn main() -> ExitCode {
	let cli = Cli::parse();
	init_logging(cli.verbose);

	let mut volume = new_volume(&cli);
	let abort = volume.abort_signal();
	let outcome = ctrlc::set_handler(move || abort.signal())
		.context("Unable to install signal handler")
		.and_then(|()| run(&cli, &mut volume));
	ExitCode::from(exit_status(&outcome))
}
