//! Address ranges and fixed I/O register locations for the DMG memory map.
//! See <https://gbdev.io/pandocs/Memory_Map.html>.

/// When the Game Boy first boots the very bottom 256 bytes of memory is
/// occupied with the boot ROM (and, on CGB images, a second window further up).
pub const BOOT_BEGIN: u16 = 0x0000;
pub const BOOT_END: u16 = 0x00FF;

/// The CGB boot image additionally intercepts this range; a DMG-sized boot
/// ROM never maps it.
pub const CGB_BOOT_BEGIN: u16 = 0x0200;
pub const CGB_BOOT_END: u16 = 0x08FF;

/// This area of memory always contains the first bank from the cartridge.
pub const ROM_BANK_0_BEGIN: u16 = 0x0000;
pub const ROM_BANK_0_END: u16 = 0x3FFF;

/// This area of memory contains a switchable bank from the cartridge (01..nn).
/// Writing to this area of memory changes the currently selected bank.
pub const ROM_BANK_N_BEGIN: u16 = 0x4000;
pub const ROM_BANK_N_END: u16 = 0x7FFF;
pub const ROM_BANK_N_SIZE: usize = (ROM_BANK_N_END - ROM_BANK_N_BEGIN + 1) as usize;

/// This area of memory contains data about the graphics that can be displayed to the screen.
pub const VRAM_BEGIN: u16 = 0x8000;
pub const VRAM_END: u16 = 0x9FFF;
pub const VRAM_SIZE: usize = (VRAM_END - VRAM_BEGIN + 1) as usize;

/// Cartridge RAM, if present, is mapped into this area.
pub const CRAM_BEGIN: u16 = 0xA000;
pub const CRAM_END: u16 = 0xBFFF;
pub const CRAM_SIZE: usize = (CRAM_END - CRAM_BEGIN + 1) as usize;

/// This is the RAM that the Game Boy allows a game to use.
pub const WRAM_BEGIN: u16 = 0xC000;
pub const WRAM_END: u16 = 0xDFFF;
pub const WRAM_SIZE: usize = (WRAM_END - WRAM_BEGIN + 1) as usize;

/// This section of memory directly mirrors Work RAM.
pub const ERAM_BEGIN: u16 = 0xE000;
pub const ERAM_END: u16 = 0xFDFF;

/// This area of memory contains the description of graphical sprites.
pub const OAM_BEGIN: u16 = 0xFE00;
pub const OAM_END: u16 = 0xFE9F;
pub const OAM_SIZE: usize = (OAM_END - OAM_BEGIN + 1) as usize;

/// This area is unmapped: reads return 0xFF, writes are dropped.
pub const UNUSED_BEGIN: u16 = 0xFEA0;
pub const UNUSED_END: u16 = 0xFEFF;

/// Practically every byte in this area has a special meaning; it's used by
/// the screen, the sound system and the timer to determine various settings.
pub const IO_BEGIN: u16 = 0xFF00;
pub const IO_END: u16 = 0xFF7F;

/// Pixel Processing Unit register area
pub const PPU_REGISTER_START: u16 = 0xFF40;
pub const PPU_REGISTER_END: u16 = 0xFF4B;
pub const PPU_DMA: u16 = 0xFF46;

/// Audio register area
pub const AUDIO_REGISTERS_START: u16 = 0xFF10;
pub const AUDIO_REGISTERS_END: u16 = 0xFF3F;
pub const AUDIO_REGISTERS_SIZE: usize = (AUDIO_REGISTERS_END - AUDIO_REGISTERS_START + 1) as usize;

/// This is also just normal RAM, but used a lot because several instruction
/// forms can address it in a single extra byte; it's also sometimes used for
/// the stack.
pub const HRAM_BEGIN: u16 = 0xFF80;
pub const HRAM_END: u16 = 0xFFFE;
pub const HRAM_SIZE: usize = (HRAM_END - HRAM_BEGIN + 1) as usize;

/// Joypad Input Register
pub const JOYPAD: u16 = 0xFF00;

pub const SERIAL_TRANSFER_DATA: u16 = 0xFF01;
pub const SERIAL_TRANSFER_CTRL: u16 = 0xFF02;

// Timer Registers
/// Counts up at a fixed 16384Hz rate, resets to 0 whenever written to (DIV).
pub const TIMER_DIVIDER: u16 = 0xFF04;
/// Counts up at a specified rate. Requests a Timer interrupt on overflow (TIMA).
pub const TIMER_COUNTER: u16 = 0xFF05;
/// When TIMA overflows it's reloaded with this value (TMA).
pub const TIMER_MODULO: u16 = 0xFF06;
/// Timer Controller (TAC): bit 2 enables counting, bits 0-1 select the rate.
pub const TIMER_CTRL: u16 = 0xFF07;

/// CGB-only double-speed switch register; always reads 0xFF in DMG mode.
pub const CGB_PREPARE_SPEED_SWITCH: u16 = 0xFF4D;
/// CGB-only WRAM bank select; always reads 0xFF in DMG mode.
pub const CGB_WRAM_BANK: u16 = 0xFF70;

/// Boot ROM lock bit.
/// 0 = boot ROM is active and intercepts access to the boot window.
/// Non-zero = boot ROM is disabled, permanently, until the next system reset.
pub const BOOT_ROM_OFF: u16 = 0xFF50;

/// Read-only PCM amplitude shadows of channels 1/2 and 3/4, CGB-only.
pub const PCM_AMPLITUDES12: u16 = 0xFF76;
pub const PCM_AMPLITUDES34: u16 = 0xFF77;

// Interrupt Controller Registers
pub const INTERRUPT_FLAG: u16 = 0xFF0F;
pub const INTERRUPT_ENABLE: u16 = 0xFFFF;

/// The value returned when reading from an undefined memory address, or a
/// memory region that is currently not readable (e.g. OAM during DMA).
pub const UNDEFINED_READ: u8 = 0xFF;
