//! Ties the CPU and bus together into something a frontend can drive:
//! load a ROM (and optionally a boot image), run it frame by frame or in
//! real time, and pull out audio samples / serial output / joypad input
//! along the way.
use crate::error::{EmuError, LoadErrorKind};
use crate::gb::DISPLAY_REFRESH_RATE;
use crate::gb::boot_rom::BootRom;
use crate::gb::bus::Bus;
use crate::gb::cartridge::Cartridge;
use crate::gb::cpu::CPU;
use crate::gb::joypad::JoypadInput;
use std::path::Path;
use std::time::{Duration, Instant};

pub struct System {
    cpu: CPU,
    bus: Bus,
    paused: bool,
}

impl System {
    pub fn new(cartridge: Cartridge, boot_rom: Option<BootRom>) -> Self {
        log::info!("booting system, title={:?}", cartridge.meta.title);
        match boot_rom {
            Some(boot_rom) => Self {
                cpu: CPU::default(),
                bus: Bus::new(cartridge, boot_rom),
                paused: false,
            },
            None => {
                log::debug!("no boot rom supplied, skipping straight to 0x0100");
                Self {
                    cpu: CPU::after_boot_rom(),
                    bus: Bus::new(cartridge, BootRom::none()),
                    paused: false,
                }
            }
        }
    }

    /// Reads a cartridge image (and, optionally, a boot ROM image) from
    /// disk and constructs a [`System`] from them.
    pub fn load(rom_path: &Path, boot_rom_path: Option<&Path>) -> Result<Self, EmuError> {
        let rom_bytes = std::fs::read(rom_path).map_err(|err| EmuError::Load {
            path: rom_path.to_path_buf(),
            source: LoadErrorKind::Io(err),
        })?;
        let cartridge = Cartridge::from_bytes(rom_bytes).map_err(|source| EmuError::Load {
            path: rom_path.to_path_buf(),
            source,
        })?;

        let boot_rom = boot_rom_path
            .map(|path| {
                let bytes = std::fs::read(path).map_err(|err| EmuError::Load {
                    path: path.to_path_buf(),
                    source: LoadErrorKind::Io(err),
                })?;
                BootRom::load(bytes).map_err(|source| EmuError::Load {
                    path: path.to_path_buf(),
                    source,
                })
            })
            .transpose()?;

        Ok(Self::new(cartridge, boot_rom))
    }

    /// Restarts emulation from the cartridge's entry point, as if the
    /// console had been power-cycled. The boot ROM, if any was used for the
    /// initial power-on, is not replayed.
    pub fn reset(&mut self) {
        log::info!("resetting system");
        let rom = self.bus.cartridge().rom_bytes().to_vec();
        let cartridge = Cartridge::from_bytes(rom).expect("already-validated cartridge image");
        self.bus = Bus::new(cartridge, BootRom::none());
        self.cpu = CPU::after_boot_rom();
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn handle_joypad_event(&mut self, input: JoypadInput) {
        self.bus.handle_joypad_event(input);
    }

    /// Runs a single CPU step, irrespective of the pause flag.
    pub fn step(&mut self) -> Result<u16, EmuError> {
        self.cpu.step(&mut self.bus)
    }

    /// Runs until the PPU completes one more frame, unless paused.
    pub fn run_one_frame(&mut self) -> Result<(), EmuError> {
        if self.paused {
            return Ok(());
        }
        let target = self.bus.ppu().frame_count() + 1;
        while self.bus.ppu().frame_count() < target {
            self.step()?;
        }
        Ok(())
    }

    pub fn take_audio_samples(&mut self) -> Vec<(i16, i16)> {
        self.bus.take_audio_samples()
    }

    pub fn serial_output(&self) -> &[u8] {
        self.bus.serial_output()
    }

    /// Drives the system at real hardware speed, calling `on_frame` once
    /// per completed frame. `on_frame` returns `false` to stop the loop.
    pub fn run(&mut self, mut on_frame: impl FnMut(&mut Self) -> bool) -> Result<(), EmuError> {
        let frame_duration = Duration::from_secs_f64(1.0 / DISPLAY_REFRESH_RATE);
        loop {
            let started = Instant::now();
            self.run_one_frame()?;
            if !on_frame(self) {
                return Ok(());
            }
            if let Some(remaining) = frame_duration.checked_sub(started.elapsed()) {
                spin_sleep::sleep(remaining);
            }
        }
    }
}

impl Drop for System {
    fn drop(&mut self) {
        log::debug!("shutting down system");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_cartridge() -> Cartridge {
        Cartridge::from_bytes(vec![0u8; 0x8000]).unwrap()
    }

    #[test]
    fn booting_without_a_boot_rom_starts_at_the_cartridge_entry_point() {
        let system = System::new(blank_cartridge(), None);
        assert_eq!(system.cpu.pc, 0x0100);
        assert_eq!(system.cpu.sp, 0xFFFE);
    }

    #[test]
    fn booting_with_a_boot_rom_starts_at_zero() {
        let system = System::new(blank_cartridge(), Some(BootRom::load(vec![0; 256]).unwrap()));
        assert_eq!(system.cpu.pc, 0x0000);
    }

    #[test]
    fn pausing_skips_frame_advancement() {
        let mut system = System::new(blank_cartridge(), None);
        system.pause();
        assert!(system.run_one_frame().is_ok());
        assert!(system.is_paused());
    }

    #[test]
    fn reset_returns_to_the_cartridge_entry_point() {
        let mut system = System::new(blank_cartridge(), None);
        system.step().unwrap();
        system.reset();
        assert_eq!(system.cpu.pc, 0x0100);
    }
}
