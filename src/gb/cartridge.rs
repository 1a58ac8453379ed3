use crate::error::LoadErrorKind;
use crate::gb::AddressSpace;
use crate::gb::constants::{
    CRAM_BEGIN, CRAM_END, CRAM_SIZE, ROM_BANK_0_BEGIN, ROM_BANK_0_END, ROM_BANK_N_BEGIN,
    ROM_BANK_N_END, ROM_BANK_N_SIZE, UNDEFINED_READ,
};
use crate::utils::bit_at;
use std::fmt;

/// This area of memory contains ROM title
const TITLE_BEGIN: u16 = 0x0134;
const TITLE_END: u16 = 0x0142;

/// When using any CGB registers (including those in the Video/Link chapters),
/// you must first unlock CGB features by changing byte 0143h in the cartridge header.
/// Typically use a value of 80h for games which support both CGB and monochrome gameboys,
/// and C0h for games which work on CGBs only. Otherwise,
/// the CGB will operate in monochrome "Non CGB" compatibility mode.
const CARTRIDGE_CGB_FLAG: u16 = 0x0143;

/// This address contains the number of ROM banks
/// 0     => No memory banking
/// 1..3  => MBC1
/// 5     => MBC2
const CARTRIDGE_ROM_BANKS: u16 = 0x0147;

/// This address contains the number of RAM banks,
/// maximum are 4 banks.
const CARTRIDGE_RAM_BANKS: u16 = 0x0148;

/// Only the banking schemes needed to boot a ROM and let it bank-switch are
/// modeled; anything else (MBC3 RTC, MBC5 rumble, ...) falls back to `None`
/// rather than reject the image outright.
#[derive(Debug, PartialEq, Copy, Clone)]
#[repr(u8)]
pub enum BankingMode {
    None,
    MBC1,
    MBC2, // RAM banking is not used in MBC2; it has its own built-in 512x4-bit RAM.
}

impl From<u8> for BankingMode {
    fn from(value: u8) -> Self {
        match value {
            1..=3 => BankingMode::MBC1,
            5..=6 => BankingMode::MBC2,
            _ => BankingMode::None,
        }
    }
}

/// Contains parsed metadata of Cartridge
#[derive(Clone)]
pub struct Metadata {
    pub title: String,
    pub banking: BankingMode,
    pub cgb_flag: u8,
}

impl Metadata {
    pub fn from_buf(buf: &[u8]) -> Self {
        Self {
            title: Metadata::parse_title(buf),
            banking: BankingMode::from(buf[CARTRIDGE_ROM_BANKS as usize]),
            cgb_flag: buf[CARTRIDGE_CGB_FLAG as usize],
        }
    }

    fn parse_title(buf: &[u8]) -> String {
        buf[TITLE_BEGIN as usize..=TITLE_END as usize]
            .iter()
            .filter(|b| b.is_ascii_alphanumeric())
            .map(|b| char::from(*b))
            .collect()
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Title: {} (banking: {:?}, cgb_flag: {:#04X})",
            self.title, self.banking, self.cgb_flag
        )
    }
}

/// Contains all data for a cartridge
#[derive(Clone)]
pub struct Cartridge {
    pub meta: Metadata,
    rom: Vec<u8>,
    ram: [u8; CRAM_SIZE * 4],
    cur_rom_bank: u8,
    cur_ram_bank: u8,
    enable_ram: bool,
    // This variable is responsible for how to act when the game writes to
    // memory address 0x4000-0x6000
    rom_banking: bool,
}

impl Cartridge {
    /// Parses a cartridge image already read into memory.
    pub fn from_bytes(buffer: Vec<u8>) -> Result<Self, LoadErrorKind> {
        if buffer.len() <= CARTRIDGE_RAM_BANKS as usize {
            return Err(LoadErrorKind::TruncatedCartridge);
        }
        let meta = Metadata::from_buf(&buffer);

        Ok(Self {
            meta,
            rom: buffer,
            ram: [0u8; CRAM_SIZE * 4],
            cur_rom_bank: 1,
            cur_ram_bank: 0,
            enable_ram: false,
            rom_banking: true,
        })
    }

    /// The raw image this cartridge was parsed from, for dumping or
    /// re-parsing (e.g. on a system reset).
    pub fn rom_bytes(&self) -> &[u8] {
        &self.rom
    }

    fn handle_banking(&mut self, address: u16, value: u8) {
        match address {
            ROM_BANK_0_BEGIN..=0x1FFF => {
                if self.meta.banking == BankingMode::MBC1 || self.meta.banking == BankingMode::MBC2
                {
                    self.toggle_ram_banking(address, value);
                }
            }
            0x2000..=ROM_BANK_0_END => match self.meta.banking {
                BankingMode::MBC1 | BankingMode::MBC2 => self.change_low_rom_bank(value),
                // ROM banking requested, but the cartridge only has one ROM bank.
                BankingMode::None => {}
            },
            ROM_BANK_N_BEGIN..=0x5FFF => {
                // There is no RAM bank in MBC2 so we always use RAM bank 0.
                if self.meta.banking != BankingMode::MBC1 {
                    return;
                }
                if self.rom_banking {
                    self.change_hi_rom_bank(value);
                    return;
                }
                self.cur_ram_bank = value & 0x03;
            }
            0x6000..=ROM_BANK_N_END => {
                if self.meta.banking == BankingMode::MBC1 {
                    self.change_rom_ram_mode(value);
                }
            }
            _ => {}
        }
    }

    /// Enables or disables RAM banking. MBC2's bottom 512x4 bits of built-in
    /// RAM are out of scope; the enable latch is tracked but nothing backs
    /// it, so MBC2 titles that rely on battery RAM won't persist state.
    #[inline]
    fn toggle_ram_banking(&mut self, address: u16, value: u8) {
        if self.meta.banking == BankingMode::MBC2 && bit_at(address as u8, 4) {
            return;
        }
        self.enable_ram = value & 0x0F == 0x0A;
    }

    /// Change ROM banking mode (lower 5 bits)
    #[inline]
    fn change_low_rom_bank(&mut self, value: u8) {
        if self.meta.banking == BankingMode::MBC2 {
            self.cur_rom_bank = value & 0x0F;
            self.sanitize_rom_bank();
            return;
        }

        // Turn of the 5 lower bits of the current bank
        // and turn of the higher 5 bits of the passed value
        self.cur_rom_bank = (self.cur_rom_bank & 0xE0) | (value & 0x1F);
        self.sanitize_rom_bank();
    }

    /// Change ROM banking mode (bits 5 & 6)
    #[inline]
    fn change_hi_rom_bank(&mut self, value: u8) {
        // Turn of the upper 3 bits of the current bank
        // and turn of the lower 5 bits of the passed value
        self.cur_rom_bank = (self.cur_rom_bank & 0x1F) | (value & 0xE0);
        self.sanitize_rom_bank();
    }

    /// Selects either ROM or RAM banking mode
    #[inline]
    fn change_rom_ram_mode(&mut self, value: u8) {
        // The bit 0 defines whether we enable ROM banking
        self.rom_banking = (value & 0x01) == 0;
        if self.rom_banking {
            self.cur_ram_bank = 0;
        }
    }

    #[inline]
    fn sanitize_rom_bank(&mut self) {
        if self.cur_rom_bank == 0 {
            self.cur_rom_bank = 1;
        }
    }
}

impl AddressSpace for Cartridge {
    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=ROM_BANK_N_END => self.handle_banking(address, value),
            CRAM_BEGIN..=CRAM_END if self.enable_ram => {
                let offset = self.cur_ram_bank as usize * CRAM_SIZE;
                self.ram[(address - CRAM_BEGIN) as usize + offset] = value
            }
            CRAM_BEGIN..=CRAM_END => {} // RAM disabled: writes are dropped
            _ => {}
        }
    }

    fn read(&mut self, address: u16) -> u8 {
        match address {
            ROM_BANK_0_BEGIN..=ROM_BANK_0_END => self.rom.get(address as usize).copied().unwrap_or(UNDEFINED_READ),
            ROM_BANK_N_BEGIN..=ROM_BANK_N_END => {
                let offset = self.cur_rom_bank as usize * ROM_BANK_N_SIZE;
                self.rom
                    .get((address - ROM_BANK_N_BEGIN) as usize + offset)
                    .copied()
                    .unwrap_or(UNDEFINED_READ)
            }
            CRAM_BEGIN..=CRAM_END if self.enable_ram => {
                let offset = self.cur_ram_bank as usize * CRAM_SIZE;
                self.ram[(address - CRAM_BEGIN) as usize + offset]
            }
            CRAM_BEGIN..=CRAM_END => UNDEFINED_READ,
            _ => UNDEFINED_READ,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_of(size: usize, banking_byte: u8) -> Vec<u8> {
        let mut buf = vec![0u8; size];
        buf[CARTRIDGE_ROM_BANKS as usize] = banking_byte;
        buf
    }

    #[test]
    fn rejects_a_truncated_image() {
        assert!(Cartridge::from_bytes(vec![0; 16]).is_err());
    }

    #[test]
    fn rom_only_cartridge_ignores_bank_switch_writes() {
        let mut cart = Cartridge::from_bytes(rom_of(0x8000, 0x00)).unwrap();
        cart.write(0x2000, 0x05);
        assert_eq!(cart.read(ROM_BANK_N_BEGIN), cart.rom[ROM_BANK_N_BEGIN as usize]);
    }

    #[test]
    fn mbc1_switches_the_low_rom_bank() {
        let mut cart = Cartridge::from_bytes(rom_of(0x40000, 0x01)).unwrap();
        cart.rom[ROM_BANK_N_SIZE * 5] = 0xEE;
        cart.write(0x2000, 0x05);
        assert_eq!(cart.read(ROM_BANK_N_BEGIN), 0xEE);
    }

    #[test]
    fn mbc1_bank_0_is_remapped_to_bank_1() {
        let mut cart = Cartridge::from_bytes(rom_of(0x40000, 0x01)).unwrap();
        cart.write(0x2000, 0x00);
        assert_eq!(cart.cur_rom_bank, 1);
    }

    #[test]
    fn cartridge_ram_is_inert_until_enabled() {
        let mut cart = Cartridge::from_bytes(rom_of(0x8000, 0x01)).unwrap();
        cart.write(CRAM_BEGIN, 0x42);
        assert_eq!(cart.read(CRAM_BEGIN), UNDEFINED_READ);
        cart.write(0x0000, 0x0A);
        cart.write(CRAM_BEGIN, 0x42);
        assert_eq!(cart.read(CRAM_BEGIN), 0x42);
    }
}
