#![allow(clippy::upper_case_acronyms)]

use crate::error::EmuError;
use crate::gb::system::System;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

mod error;
mod gb;
mod utils;

/// Headless DMG emulation core: runs a cartridge and reports what it wrote
/// to the serial port. There is no display or audio output here — wire
/// `System` up to a frontend for that.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path of the ROM to load.
    rom: PathBuf,

    /// Optional boot ROM image (256 bytes DMG or 2048 bytes CGB).
    #[arg(long, value_name = "PATH")]
    boot_rom: Option<PathBuf>,

    /// Stop after this many frames instead of running indefinitely.
    #[arg(long, value_name = "N")]
    frames: Option<u64>,
}

fn main() -> ExitCode {
    env_logger::init();

    if let Err(err) = run(Cli::parse()) {
        log::error!("{err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(cli: Cli) -> Result<(), EmuError> {
    let mut system = System::load(&cli.rom, cli.boot_rom.as_deref())?;

    match cli.frames {
        Some(frames) => {
            for frame in 0..frames {
                system.run_one_frame()?;
                log::trace!("completed frame {frame}");
            }
        }
        None => loop {
            system.run_one_frame()?;
        },
    }

    let serial = system.serial_output();
    if !serial.is_empty() {
        print!("{}", String::from_utf8_lossy(serial));
    }
    Ok(())
}
