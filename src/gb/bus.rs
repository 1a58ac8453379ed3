//! Wires every peripheral onto the 16-bit address space and drives their
//! internal clocks. A single [`AddressSpace`] access (the only way the CPU
//! ever touches memory) always costs exactly one machine cycle: `cycle()`
//! steps the timer, PPU, APU and any in-flight OAM DMA once before the
//! address is decoded.
use crate::gb::audio::AudioProcessor;
use crate::gb::boot_rom::BootRom;
use crate::gb::cartridge::Cartridge;
use crate::gb::constants::*;
use crate::gb::cpu::ImeState;
use crate::gb::dma::OamDma;
use crate::gb::interrupt::{InterruptRegister, Irq};
use crate::gb::joypad::{Joypad, JoypadInput};
use crate::gb::ppu::PPU;
use crate::gb::serial::Serial;
use crate::gb::timer::Timer;
use crate::gb::{AddressSpace, HardwareContext};

pub struct Bus {
    cartridge: Cartridge,
    boot_rom: BootRom,
    timer: Timer,
    dma: OamDma,
    ppu: PPU,
    audio: AudioProcessor,
    joypad: Joypad,
    serial: Serial,
    wram: [u8; WRAM_SIZE],
    hram: [u8; HRAM_SIZE],
    interrupt_enable: InterruptRegister,
    interrupt_flag: InterruptRegister,
    ime: ImeState,
    cycles: u64,
    dma_source_high: u8,
}

impl Bus {
    pub fn new(cartridge: Cartridge, boot_rom: BootRom) -> Self {
        Self {
            cartridge,
            boot_rom,
            timer: Timer::default(),
            dma: OamDma::default(),
            ppu: PPU::default(),
            audio: AudioProcessor::default(),
            joypad: Joypad::default(),
            serial: Serial::default(),
            wram: [0; WRAM_SIZE],
            hram: [0; HRAM_SIZE],
            interrupt_enable: InterruptRegister::empty(),
            interrupt_flag: InterruptRegister::empty(),
            ime: ImeState::Disabled,
            cycles: 0,
            dma_source_high: 0,
        }
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    pub fn ppu(&self) -> &PPU {
        &self.ppu
    }

    pub fn serial_output(&self) -> &[u8] {
        self.serial.output()
    }

    pub fn take_audio_samples(&mut self) -> Vec<(i16, i16)> {
        self.audio.take_samples()
    }

    pub fn handle_joypad_event(&mut self, input: JoypadInput) {
        self.joypad.handle_input(input);
    }

    fn read_io(&mut self, address: u16) -> u8 {
        match address {
            JOYPAD => self.joypad.read(),
            SERIAL_TRANSFER_DATA | SERIAL_TRANSFER_CTRL => self.serial.read(address),
            0xFF03 => 0xFF, // undocumented
            TIMER_DIVIDER..=TIMER_CTRL => self.timer.read(address),
            0xFF08..=0xFF0E => 0xFF, // undocumented
            INTERRUPT_FLAG => self.interrupt_flag.bits() | 0b1110_0000,
            AUDIO_REGISTERS_START..=AUDIO_REGISTERS_END => self.audio.read(address),
            PPU_DMA => self.dma_source_high,
            PPU_REGISTER_START..=PPU_REGISTER_END => self.ppu.read(address),
            CGB_PREPARE_SPEED_SWITCH => 0xFF, // CGB-only
            BOOT_ROM_OFF => u8::from(!self.boot_rom.is_enabled()),
            CGB_WRAM_BANK => 0xFF, // CGB-only
            PCM_AMPLITUDES12 | PCM_AMPLITUDES34 => 0xFF,
            _ => UNDEFINED_READ,
        }
    }

    fn write_io(&mut self, address: u16, value: u8) {
        match address {
            JOYPAD => self.joypad.write(value, &mut self.interrupt_flag),
            SERIAL_TRANSFER_DATA | SERIAL_TRANSFER_CTRL => {
                self.serial.write(address, value, &mut self.interrupt_flag)
            }
            0xFF03 => {} // undocumented
            TIMER_DIVIDER..=TIMER_CTRL => self.timer.write(address, value, &mut self.interrupt_flag),
            0xFF08..=0xFF0E => {} // undocumented
            INTERRUPT_FLAG => self.interrupt_flag = InterruptRegister::from_bits_truncate(value),
            AUDIO_REGISTERS_START..=AUDIO_REGISTERS_END => self.audio.write(address, value),
            PPU_DMA => {
                self.dma_source_high = value;
                self.dma.request(value);
            }
            PPU_REGISTER_START..=PPU_REGISTER_END => self.ppu.write(address, value),
            CGB_PREPARE_SPEED_SWITCH => {} // CGB-only
            BOOT_ROM_OFF => {
                if value & 0x01 != 0 {
                    self.boot_rom.disable();
                }
            }
            CGB_WRAM_BANK => {} // CGB-only
            PCM_AMPLITUDES12 | PCM_AMPLITUDES34 => {} // read-only shadows
            _ => {}
        }
    }

    fn raw_read(&mut self, address: u16) -> u8 {
        if self.boot_rom.contains(address) {
            return self.boot_rom.read(address);
        }
        match address {
            ROM_BANK_0_BEGIN..=ROM_BANK_N_END | CRAM_BEGIN..=CRAM_END => self.cartridge.read(address),
            VRAM_BEGIN..=VRAM_END => self.ppu.read(address),
            OAM_BEGIN..=OAM_END if self.dma.is_active() => UNDEFINED_READ,
            OAM_BEGIN..=OAM_END => self.ppu.read(address),
            WRAM_BEGIN..=WRAM_END => self.wram[(address - WRAM_BEGIN) as usize],
            ERAM_BEGIN..=ERAM_END => self.wram[(address - ERAM_BEGIN) as usize],
            UNUSED_BEGIN..=UNUSED_END => UNDEFINED_READ,
            IO_BEGIN..=IO_END => self.read_io(address),
            HRAM_BEGIN..=HRAM_END => self.hram[(address - HRAM_BEGIN) as usize],
            INTERRUPT_ENABLE => self.interrupt_enable.bits(),
            _ => UNDEFINED_READ,
        }
    }

    fn raw_write(&mut self, address: u16, value: u8) {
        match address {
            ROM_BANK_0_BEGIN..=ROM_BANK_N_END | CRAM_BEGIN..=CRAM_END => self.cartridge.write(address, value),
            VRAM_BEGIN..=VRAM_END | OAM_BEGIN..=OAM_END => self.ppu.write(address, value),
            WRAM_BEGIN..=WRAM_END => self.wram[(address - WRAM_BEGIN) as usize] = value,
            ERAM_BEGIN..=ERAM_END => self.wram[(address - ERAM_BEGIN) as usize] = value,
            UNUSED_BEGIN..=UNUSED_END => {}
            IO_BEGIN..=IO_END => self.write_io(address, value),
            HRAM_BEGIN..=HRAM_END => self.hram[(address - HRAM_BEGIN) as usize] = value,
            INTERRUPT_ENABLE => self.interrupt_enable = InterruptRegister::from_bits_truncate(value),
            _ => {}
        }
    }

    /// Steps every peripheral by one machine cycle. Called once per bus
    /// access, so an instruction that touches memory N times charges
    /// exactly N machine cycles to everything listening on the clock.
    fn cycle(&mut self) {
        if self.ime == ImeState::Pending {
            self.ime = ImeState::Enabled;
        }
        self.timer.step(&mut self.interrupt_flag);
        self.ppu.step(&mut self.interrupt_flag);
        self.audio.step();
        if let Some((source, dest)) = self.dma.step() {
            let byte = self.raw_read(source);
            self.raw_write(dest, byte);
        }
        self.cycles += 4;
    }
}

impl AddressSpace for Bus {
    fn read(&mut self, address: u16) -> u8 {
        self.cycle();
        self.raw_read(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.cycle();
        self.raw_write(address, value);
    }
}

impl HardwareContext for Bus {
    fn set_ime(&mut self, ime: ImeState) {
        self.ime = ime;
    }

    fn ime(&self) -> ImeState {
        self.ime
    }

    fn tick(&mut self) {
        self.cycle();
    }

    fn elapsed_cycles(&self) -> u64 {
        self.cycles
    }

    fn pending_irq(&self) -> Option<Irq> {
        Irq::ALL
            .into_iter()
            .find(|irq| self.interrupt_enable.contains(irq.bit()) && self.interrupt_flag.contains(irq.bit()))
    }

    fn ack_irq(&mut self, irq: Irq) {
        self.interrupt_flag.remove(irq.bit());
    }

    fn reset_div(&mut self) {
        self.timer.reset_div(&mut self.interrupt_flag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gb::cartridge::Cartridge;

    fn bus_with_rom(rom: Vec<u8>) -> Bus {
        Bus::new(Cartridge::from_bytes(rom).unwrap(), BootRom::none())
    }

    fn blank_rom() -> Vec<u8> {
        vec![0u8; 0x8000]
    }

    #[test]
    fn wram_round_trips_through_echo_ram() {
        let mut bus = bus_with_rom(blank_rom());
        bus.write(WRAM_BEGIN, 0x42);
        assert_eq!(bus.read(ERAM_BEGIN), 0x42);
    }

    #[test]
    fn oam_dma_copies_160_bytes_from_the_requested_page() {
        let mut bus = bus_with_rom(blank_rom());
        for i in 0..0xA0u16 {
            bus.write(WRAM_BEGIN + i, i as u8);
        }
        bus.write(PPU_DMA, 0xC0);
        for _ in 0..200 {
            bus.tick();
        }
        assert_eq!(bus.read(OAM_BEGIN), 0x00);
        assert_eq!(bus.read(OAM_BEGIN + 0x9F), 0x9F);
    }

    #[test]
    fn disabled_interrupt_lines_never_surface_as_pending() {
        let mut bus = bus_with_rom(blank_rom());
        bus.write_io(INTERRUPT_FLAG, InterruptRegister::VBLANK.bits());
        assert_eq!(bus.pending_irq(), None);
        bus.interrupt_enable = InterruptRegister::VBLANK;
        assert_eq!(bus.pending_irq(), Some(Irq::VBlank));
    }

    #[test]
    fn boot_rom_shadows_the_cartridge_until_disabled() {
        let mut bus = Bus::new(
            Cartridge::from_bytes(blank_rom()).unwrap(),
            BootRom::load(vec![0xAA; 256]).unwrap(),
        );
        assert_eq!(bus.read(0x0000), 0xAA);
        bus.write(BOOT_ROM_OFF, 1);
        assert_eq!(bus.read(0x0000), 0x00);
    }
}
