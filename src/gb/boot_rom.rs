//! The boot ROM shadows the bottom of the address space until the firmware
//! writes to 0xFF50, at which point it's permanently unmapped for the rest
//! of the session — there's no way back short of a full reset.
use crate::error::LoadErrorKind;
use crate::gb::constants::{BOOT_BEGIN, BOOT_END, CGB_BOOT_BEGIN, CGB_BOOT_END};

const DMG_SIZE: usize = 256;
const CGB_SIZE: usize = 2048;

#[derive(Clone)]
pub struct BootRom {
    data: Vec<u8>,
    enabled: bool,
}

impl BootRom {
    /// Loads a 256-byte DMG or 2048-byte CGB boot image.
    pub fn load(data: Vec<u8>) -> Result<Self, LoadErrorKind> {
        match data.len() {
            DMG_SIZE | CGB_SIZE => Ok(Self { data, enabled: true }),
            other => Err(LoadErrorKind::InvalidBootRomSize(other)),
        }
    }

    /// No boot ROM was supplied: the cartridge's own entry point runs from
    /// power-on, as if the boot sequence had already completed.
    pub fn none() -> Self {
        Self {
            data: Vec::new(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn contains(&self, address: u16) -> bool {
        if !self.enabled {
            return false;
        }
        (BOOT_BEGIN..=BOOT_END).contains(&address)
            || (self.data.len() == CGB_SIZE && (CGB_BOOT_BEGIN..=CGB_BOOT_END).contains(&address))
    }

    pub fn read(&self, address: u16) -> u8 {
        let index = if address <= BOOT_END {
            address as usize
        } else {
            (address - CGB_BOOT_BEGIN) as usize + DMG_SIZE
        };
        self.data[index]
    }

    /// Writing any value to 0xFF50 disables the boot ROM for good.
    pub fn disable(&mut self) {
        self.enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_images_of_the_wrong_size() {
        assert!(BootRom::load(vec![0; 100]).is_err());
    }

    #[test]
    fn dmg_image_shadows_only_the_low_256_bytes() {
        let boot = BootRom::load(vec![0xAA; DMG_SIZE]).unwrap();
        assert!(boot.contains(0x00FF));
        assert!(!boot.contains(0x0100));
        assert!(!boot.contains(0x0300));
    }

    #[test]
    fn cgb_image_also_shadows_the_second_window() {
        let boot = BootRom::load(vec![0xAA; CGB_SIZE]).unwrap();
        assert!(boot.contains(0x0300));
    }

    #[test]
    fn disabling_unmaps_it_permanently() {
        let mut boot = BootRom::load(vec![0; DMG_SIZE]).unwrap();
        boot.disable();
        assert!(!boot.contains(0x0000));
        assert!(!boot.is_enabled());
    }
}
