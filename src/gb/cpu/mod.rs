//! The Sharp LR35902 interpreter: fetch/decode/execute plus interrupt
//! dispatch. The CPU never touches memory directly; every access goes
//! through the [`AddressSpace`] the bus implements, so a single access
//! always costs exactly one machine cycle charged by the bus itself.

mod instruction;
mod registers;

pub use instruction::*;
pub use registers::{FlagsRegister, Registers};

use crate::error::EmuError;
use crate::gb::AddressSpace;
use crate::gb::interrupt::Irq;

/// Tracks the interrupt master enable flip-flop, including the one
/// instruction of delay `EI` imposes before interrupts actually unmask.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ImeState {
    #[default]
    Disabled,
    Enabled,
    /// Set by `EI`; becomes `Enabled` after the *next* bus access completes.
    Pending,
}

/// The slice of bus state the CPU needs that isn't plain memory-mapped I/O:
/// the IME flip-flop, pending interrupt lines, and peripheral stepping.
/// Implemented by [`crate::gb::bus::Bus`]; kept as a trait so CPU unit tests
/// can supply a minimal fake.
pub trait HardwareContext {
    fn set_ime(&mut self, ime: ImeState);
    fn ime(&self) -> ImeState;
    /// Advances peripherals by one machine cycle without any address decode.
    /// Used to charge "internal" cycles instructions spend that never touch
    /// the bus (ALU-only 16-bit ops, the pipeline bubble in conditional
    /// branches, etc).
    fn tick(&mut self);
    /// Total machine cycles elapsed since power-on, in T-cycles.
    fn elapsed_cycles(&self) -> u64;
    /// The highest-priority interrupt that is both requested and enabled,
    /// regardless of IME — this is what wakes the CPU from `HALT`.
    fn pending_irq(&self) -> Option<Irq>;
    /// Clears the IF bit for `irq`; called once its ISR is dispatched.
    fn ack_irq(&mut self, irq: Irq);
    /// Zeroes the timer's free-running DIV counter. `STOP` resets it as a
    /// side effect, same as a write to the DIV register would.
    fn reset_div(&mut self);
}

pub struct CPU {
    pub r: Registers,
    pub pc: u16,
    pub sp: u16,
    pub is_halted: bool,
}

impl Default for CPU {
    fn default() -> Self {
        Self {
            r: Registers::default(),
            pc: 0x0000,
            sp: 0x0000,
            is_halted: false,
        }
    }
}

impl CPU {
    /// The register state the DMG boot ROM leaves behind right before
    /// jumping to 0x0100. Used when a session starts without a boot image,
    /// skipping straight to the cartridge entry point.
    pub fn after_boot_rom() -> Self {
        let mut r = Registers::default();
        r.set_af(0x01B0);
        r.set_bc(0x0013);
        r.set_de(0x00D8);
        r.set_hl(0x014D);
        Self {
            r,
            pc: 0x0100,
            sp: 0xFFFE,
            is_halted: false,
        }
    }

    /// Runs one fetch/execute step, or services a pending interrupt instead.
    /// Returns the number of T-cycles the step consumed.
    pub fn step<T: AddressSpace + HardwareContext>(&mut self, bus: &mut T) -> Result<u16, EmuError> {
        let start = bus.elapsed_cycles();

        if self.service_interrupt(bus) {
            return Ok((bus.elapsed_cycles() - start) as u16);
        }

        if self.is_halted {
            bus.tick();
            return Ok((bus.elapsed_cycles() - start) as u16);
        }

        let pc = self.pc;
        let mut opcode = self.consume_byte(bus);
        let prefixed = opcode == 0xCB;
        if prefixed {
            opcode = self.consume_byte(bus);
        }

        match Instruction::from_byte(opcode, prefixed) {
            Some(instruction) => {
                self.execute(instruction, bus);
                Ok((bus.elapsed_cycles() - start) as u16)
            }
            None => Err(EmuError::UnknownOpcode { pc, opcode }),
        }
    }

    /// Resolves IME pending -> enabled transitions are the bus's job (they
    /// happen on every access, not just instruction boundaries); this only
    /// decides whether to wake from `HALT` and/or dispatch an ISR.
    fn service_interrupt<T: AddressSpace + HardwareContext>(&mut self, bus: &mut T) -> bool {
        let Some(irq) = bus.pending_irq() else {
            return false;
        };
        if self.is_halted {
            self.is_halted = false;
        }
        if bus.ime() != ImeState::Enabled {
            return false;
        }

        bus.set_ime(ImeState::Disabled);
        bus.ack_irq(irq);
        bus.tick();
        bus.tick();
        self.push_word(bus, self.pc);
        self.pc = irq.vector();
        true
    }

    fn consume_byte<T: AddressSpace>(&mut self, bus: &mut T) -> u8 {
        let byte = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn consume_word<T: AddressSpace>(&mut self, bus: &mut T) -> u16 {
        let lo = self.consume_byte(bus) as u16;
        let hi = self.consume_byte(bus) as u16;
        (hi << 8) | lo
    }

    fn push_word<T: AddressSpace>(&mut self, bus: &mut T, value: u16) {
        self.sp = self.sp.wrapping_sub(1);
        bus.write(self.sp, (value >> 8) as u8);
        self.sp = self.sp.wrapping_sub(1);
        bus.write(self.sp, value as u8);
    }

    fn pop_word<T: AddressSpace>(&mut self, bus: &mut T) -> u16 {
        let lo = bus.read(self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        let hi = bus.read(self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        (hi << 8) | lo
    }

    fn execute<T: AddressSpace + HardwareContext>(&mut self, instruction: Instruction, bus: &mut T) {
        match instruction {
            Instruction::NOP => {}
            Instruction::HALT => self.is_halted = true,
            Instruction::STOP => {
                // The second STOP byte is always 0x00 padding; consume it and
                // park the CPU the same way HALT does. Double-speed switching
                // never happens on DMG so there's nothing else to model.
                self.consume_byte(bus);
                self.is_halted = true;
                bus.reset_div();
            }
            Instruction::DI => bus.set_ime(ImeState::Disabled),
            Instruction::EI => bus.set_ime(ImeState::Pending),

            Instruction::ADD(src) => self.handle_add(src, bus),
            Instruction::ADC(src) => self.handle_adc(src, bus),
            Instruction::SUB(src) => self.handle_sub(src, bus),
            Instruction::SBC(src) => self.handle_sbc(src, bus),
            Instruction::AND(src) => self.handle_and(src, bus),
            Instruction::OR(src) => self.handle_or(src, bus),
            Instruction::XOR(src) => self.handle_xor(src, bus),
            Instruction::CP(src) => self.handle_cp(src, bus),
            Instruction::INC(target) => self.handle_inc(target, bus),
            Instruction::DEC(target) => self.handle_dec(target, bus),
            Instruction::ADDHL(src) => self.handle_addhl(src, bus),
            Instruction::ADDSP => self.handle_addsp(bus),
            Instruction::INC2(target) => self.handle_inc2(target, bus),
            Instruction::DEC2(target) => self.handle_dec2(target, bus),

            Instruction::CPL => self.handle_cpl(),
            Instruction::CCF => self.handle_ccf(),
            Instruction::SCF => self.handle_scf(),
            Instruction::DAA => self.handle_daa(),

            Instruction::RLCA => self.handle_rlca(),
            Instruction::RLA => self.handle_rla(),
            Instruction::RRCA => self.handle_rrca(),
            Instruction::RRA => self.handle_rra(),
            Instruction::RLC(src) => self.handle_rlc(src, bus),
            Instruction::RL(src) => self.handle_rl(src, bus),
            Instruction::RRC(src) => self.handle_rrc(src, bus),
            Instruction::RR(src) => self.handle_rr(src, bus),
            Instruction::SLA(src) => self.handle_sla(src, bus),
            Instruction::SRA(src) => self.handle_sra(src, bus),
            Instruction::SRL(src) => self.handle_srl(src, bus),
            Instruction::SWAP(src) => self.handle_swap(src, bus),
            Instruction::BIT(bit, src) => self.handle_bit(bit, src, bus),
            Instruction::RES(bit, src) => self.handle_res(bit, src, bus),
            Instruction::SET(bit, src) => self.handle_set(bit, src, bus),

            Instruction::JR(test) => self.handle_jr(test, bus),
            Instruction::JP(test, src) => self.handle_jp(test, src, bus),
            Instruction::CALL(test) => self.handle_call(test, bus),
            Instruction::RET(test) => self.handle_ret(test, bus),
            Instruction::RETI => self.handle_reti(bus),
            Instruction::RST(code) => self.handle_rst(code, bus),

            Instruction::PUSH(target) => self.handle_push(target, bus),
            Instruction::POP(target) => self.handle_pop(target, bus),

            Instruction::LD(load) => self.handle_ld(load, bus),
        }
    }

    fn handle_add<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        let value = src.read(self, bus);
        let a = self.r.a;
        let (result, carry) = a.overflowing_add(value);
        let half_carry = (a & 0x0F) + (value & 0x0F) > 0x0F;
        self.r.a = result;
        self.r.f.update(result == 0, false, half_carry, carry);
    }

    fn handle_adc<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        let value = src.read(self, bus);
        let a = self.r.a;
        let carry_in = self.r.f.carry() as u8;
        let result = a.wrapping_add(value).wrapping_add(carry_in);
        let half_carry = (a & 0x0F) + (value & 0x0F) + carry_in > 0x0F;
        let carry = a as u16 + value as u16 + carry_in as u16 > 0xFF;
        self.r.a = result;
        self.r.f.update(result == 0, false, half_carry, carry);
    }

    fn handle_sub<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        let value = src.read(self, bus);
        let a = self.r.a;
        let (result, carry) = a.overflowing_sub(value);
        let half_carry = (a & 0x0F) < (value & 0x0F);
        self.r.a = result;
        self.r.f.update(result == 0, true, half_carry, carry);
    }

    fn handle_sbc<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        let value = src.read(self, bus);
        let a = self.r.a;
        let carry_in = self.r.f.carry() as u8;
        let result = a.wrapping_sub(value).wrapping_sub(carry_in);
        let half_carry = (a & 0x0F) < (value & 0x0F) + carry_in;
        let carry = (a as i16) - (value as i16) - (carry_in as i16) < 0;
        self.r.a = result;
        self.r.f.update(result == 0, true, half_carry, carry);
    }

    fn handle_and<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        let value = src.read(self, bus);
        self.r.a &= value;
        self.r.f.update(self.r.a == 0, false, true, false);
    }

    fn handle_or<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        let value = src.read(self, bus);
        self.r.a |= value;
        self.r.f.update(self.r.a == 0, false, false, false);
    }

    fn handle_xor<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        let value = src.read(self, bus);
        self.r.a ^= value;
        self.r.f.update(self.r.a == 0, false, false, false);
    }

    fn handle_cp<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        let value = src.read(self, bus);
        let a = self.r.a;
        let (result, carry) = a.overflowing_sub(value);
        let half_carry = (a & 0x0F) < (value & 0x0F);
        self.r.f.update(result == 0, true, half_carry, carry);
    }

    fn handle_inc<T: AddressSpace>(&mut self, target: ByteTarget, bus: &mut T) {
        let value = read_byte_target(self, bus, target);
        let result = value.wrapping_add(1);
        target.write(self, bus, result);
        self.r.f.set(FlagsRegister::ZERO, result == 0);
        self.r.f.set(FlagsRegister::SUBTRACTION, false);
        self.r.f.set(FlagsRegister::HALF_CARRY, value & 0x0F == 0x0F);
    }

    fn handle_dec<T: AddressSpace>(&mut self, target: ByteTarget, bus: &mut T) {
        let value = read_byte_target(self, bus, target);
        let result = value.wrapping_sub(1);
        target.write(self, bus, result);
        self.r.f.set(FlagsRegister::ZERO, result == 0);
        self.r.f.set(FlagsRegister::SUBTRACTION, true);
        self.r.f.set(FlagsRegister::HALF_CARRY, value & 0x0F == 0x00);
    }

    fn handle_addhl<T: AddressSpace + HardwareContext>(&mut self, src: WordSource, bus: &mut T) {
        let hl = self.r.get_hl();
        let value = src.read(self, bus);
        let (result, carry) = hl.overflowing_add(value);
        let half_carry = (hl & 0x0FFF) + (value & 0x0FFF) > 0x0FFF;
        bus.tick();
        self.r.set_hl(result);
        self.r.f.set(FlagsRegister::SUBTRACTION, false);
        self.r.f.set(FlagsRegister::HALF_CARRY, half_carry);
        self.r.f.set(FlagsRegister::CARRY, carry);
    }

    fn handle_addsp<T: AddressSpace + HardwareContext>(&mut self, bus: &mut T) {
        let e = self.consume_byte(bus) as i8;
        let (result, half_carry, carry) = add_sp_e8(self.sp, e);
        bus.tick();
        bus.tick();
        self.sp = result;
        self.r.f.update(false, false, half_carry, carry);
    }

    fn handle_inc2<T: AddressSpace + HardwareContext>(&mut self, target: WordTarget, bus: &mut T) {
        let value = read_word_target(self, target);
        bus.tick();
        target.write(self, value.wrapping_add(1));
    }

    fn handle_dec2<T: AddressSpace + HardwareContext>(&mut self, target: WordTarget, bus: &mut T) {
        let value = read_word_target(self, target);
        bus.tick();
        target.write(self, value.wrapping_sub(1));
    }

    fn handle_cpl(&mut self) {
        self.r.a = !self.r.a;
        self.r.f.set(FlagsRegister::SUBTRACTION, true);
        self.r.f.set(FlagsRegister::HALF_CARRY, true);
    }

    fn handle_ccf(&mut self) {
        let carry = !self.r.f.carry();
        self.r.f.set(FlagsRegister::SUBTRACTION, false);
        self.r.f.set(FlagsRegister::HALF_CARRY, false);
        self.r.f.set(FlagsRegister::CARRY, carry);
    }

    fn handle_scf(&mut self) {
        self.r.f.set(FlagsRegister::SUBTRACTION, false);
        self.r.f.set(FlagsRegister::HALF_CARRY, false);
        self.r.f.set(FlagsRegister::CARRY, true);
    }

    fn handle_daa(&mut self) {
        let negative = self.r.f.negative();
        let half_carry = self.r.f.half_carry();
        let mut carry = self.r.f.carry();
        let mut a = self.r.a;

        if !negative {
            if carry || a > 0x99 {
                a = a.wrapping_add(0x60);
                carry = true;
            }
            if half_carry || (a & 0x0F) > 0x09 {
                a = a.wrapping_add(0x06);
            }
        } else {
            if carry {
                a = a.wrapping_sub(0x60);
            }
            if half_carry {
                a = a.wrapping_sub(0x06);
            }
        }

        self.r.a = a;
        self.r.f.set(FlagsRegister::ZERO, a == 0);
        self.r.f.set(FlagsRegister::HALF_CARRY, false);
        self.r.f.set(FlagsRegister::CARRY, carry);
    }

    fn handle_rlca(&mut self) {
        let (result, carry) = rotate_left(self.r.a);
        self.r.a = result;
        self.r.f.update(false, false, false, carry);
    }

    fn handle_rla(&mut self) {
        let (result, carry) = rotate_left_through_carry(self.r.a, self.r.f.carry());
        self.r.a = result;
        self.r.f.update(false, false, false, carry);
    }

    fn handle_rrca(&mut self) {
        let (result, carry) = rotate_right(self.r.a);
        self.r.a = result;
        self.r.f.update(false, false, false, carry);
    }

    fn handle_rra(&mut self) {
        let (result, carry) = rotate_right_through_carry(self.r.a, self.r.f.carry());
        self.r.a = result;
        self.r.f.update(false, false, false, carry);
    }

    fn handle_rlc<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        self.shift_op(src, bus, rotate_left);
    }

    fn handle_rl<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        let carry_in = self.r.f.carry();
        self.shift_op(src, bus, |v| rotate_left_through_carry(v, carry_in));
    }

    fn handle_rrc<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        self.shift_op(src, bus, rotate_right);
    }

    fn handle_rr<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        let carry_in = self.r.f.carry();
        self.shift_op(src, bus, |v| rotate_right_through_carry(v, carry_in));
    }

    fn handle_sla<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        self.shift_op(src, bus, |v| (v << 1, v & 0x80 != 0));
    }

    fn handle_sra<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        self.shift_op(src, bus, |v| ((v >> 1) | (v & 0x80), v & 0x01 != 0));
    }

    fn handle_srl<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        self.shift_op(src, bus, |v| (v >> 1, v & 0x01 != 0));
    }

    fn handle_swap<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T) {
        let target = byte_source_as_target(src);
        let value = src.read(self, bus);
        let result = (value << 4) | (value >> 4);
        target.write(self, bus, result);
        self.r.f.update(result == 0, false, false, false);
    }

    /// Shared body for the CB-prefixed rotate/shift family: read, transform,
    /// write back, set flags from the transform's `(result, carry)` pair.
    fn shift_op<T: AddressSpace>(&mut self, src: ByteSource, bus: &mut T, op: impl Fn(u8) -> (u8, bool)) {
        let target = byte_source_as_target(src);
        let value = src.read(self, bus);
        let (result, carry) = op(value);
        target.write(self, bus, result);
        self.r.f.update(result == 0, false, false, carry);
    }

    fn handle_bit<T: AddressSpace>(&mut self, bit: u8, src: ByteSource, bus: &mut T) {
        let value = src.read(self, bus);
        let is_zero = value & (1 << bit) == 0;
        self.r.f.set(FlagsRegister::ZERO, is_zero);
        self.r.f.set(FlagsRegister::SUBTRACTION, false);
        self.r.f.set(FlagsRegister::HALF_CARRY, true);
    }

    fn handle_res<T: AddressSpace>(&mut self, bit: u8, src: ByteSource, bus: &mut T) {
        let target = byte_source_as_target(src);
        let value = src.read(self, bus);
        target.write(self, bus, value & !(1 << bit));
    }

    fn handle_set<T: AddressSpace>(&mut self, bit: u8, src: ByteSource, bus: &mut T) {
        let target = byte_source_as_target(src);
        let value = src.read(self, bus);
        target.write(self, bus, value | (1 << bit));
    }

    fn handle_jr<T: AddressSpace + HardwareContext>(&mut self, test: JumpTest, bus: &mut T) {
        let offset = self.consume_byte(bus) as i8;
        if test.resolve(self) {
            bus.tick();
            self.pc = self.pc.wrapping_add_signed(offset as i16);
        }
    }

    fn handle_jp<T: AddressSpace + HardwareContext>(&mut self, test: JumpTest, src: WordSource, bus: &mut T) {
        let target = src.read(self, bus);
        if test.resolve(self) {
            if src != WordSource::HL {
                bus.tick();
            }
            self.pc = target;
        }
    }

    fn handle_call<T: AddressSpace + HardwareContext>(&mut self, test: JumpTest, bus: &mut T) {
        let target = self.consume_word(bus);
        if test.resolve(self) {
            bus.tick();
            self.push_word(bus, self.pc);
            self.pc = target;
        }
    }

    fn handle_ret<T: AddressSpace + HardwareContext>(&mut self, test: JumpTest, bus: &mut T) {
        if test != JumpTest::Always {
            bus.tick();
        }
        if test.resolve(self) {
            let target = self.pop_word(bus);
            bus.tick();
            self.pc = target;
        }
    }

    fn handle_reti<T: AddressSpace + HardwareContext>(&mut self, bus: &mut T) {
        let target = self.pop_word(bus);
        bus.tick();
        self.pc = target;
        bus.set_ime(ImeState::Enabled);
    }

    fn handle_rst<T: AddressSpace + HardwareContext>(&mut self, code: ResetCode, bus: &mut T) {
        bus.tick();
        self.push_word(bus, self.pc);
        self.pc = code.address();
    }

    fn handle_push<T: AddressSpace + HardwareContext>(&mut self, target: StackTarget, bus: &mut T) {
        let value = match target {
            StackTarget::AF => self.r.get_af(),
            StackTarget::BC => self.r.get_bc(),
            StackTarget::DE => self.r.get_de(),
            StackTarget::HL => self.r.get_hl(),
        };
        bus.tick();
        self.push_word(bus, value);
    }

    fn handle_pop<T: AddressSpace>(&mut self, target: StackTarget, bus: &mut T) {
        let value = self.pop_word(bus);
        match target {
            StackTarget::AF => self.r.set_af(value),
            StackTarget::BC => self.r.set_bc(value),
            StackTarget::DE => self.r.set_de(value),
            StackTarget::HL => self.r.set_hl(value),
        }
    }

    fn handle_ld<T: AddressSpace + HardwareContext>(&mut self, load: Load, bus: &mut T) {
        match load {
            Load::Byte(target, source) => {
                let value = source.read(self, bus);
                target.write(self, bus, value);
            }
            Load::Word(target, source) => {
                let value = source.read(self, bus);
                if target == WordTarget::SP && source == WordSource::HL {
                    bus.tick();
                }
                target.write(self, value);
            }
            Load::IndirectFrom(target, source) => {
                let value = source.read(self, bus);
                let address = match target {
                    IndirectByteTarget::BCI => self.r.get_bc(),
                    IndirectByteTarget::DEI => self.r.get_de(),
                    IndirectByteTarget::HLI => self.r.get_hl(),
                    IndirectByteTarget::D16I => self.consume_word(bus),
                    IndirectByteTarget::CIFF00 => 0xFF00 | u16::from(self.r.c),
                    IndirectByteTarget::D8IFF00 => 0xFF00 | u16::from(self.consume_byte(bus)),
                };
                bus.write(address, value);
            }
            Load::IndirectFromAInc => {
                bus.write(self.r.get_hl(), self.r.a);
                self.r.set_hl(self.r.get_hl().wrapping_add(1));
            }
            Load::IndirectFromADec => {
                bus.write(self.r.get_hl(), self.r.a);
                self.r.set_hl(self.r.get_hl().wrapping_sub(1));
            }
            Load::FromIndirectAInc => {
                self.r.a = bus.read(self.r.get_hl());
                self.r.set_hl(self.r.get_hl().wrapping_add(1));
            }
            Load::FromIndirectADec => {
                self.r.a = bus.read(self.r.get_hl());
                self.r.set_hl(self.r.get_hl().wrapping_sub(1));
            }
            Load::IndirectFromWord => {
                let address = self.consume_word(bus);
                bus.write(address, self.sp as u8);
                bus.write(address.wrapping_add(1), (self.sp >> 8) as u8);
            }
            Load::IndirectFromSPi8 => {
                let e = self.consume_byte(bus) as i8;
                let (result, half_carry, carry) = add_sp_e8(self.sp, e);
                bus.tick();
                self.r.set_hl(result);
                self.r.f.update(false, false, half_carry, carry);
            }
        }
    }
}

fn read_byte_target<T: AddressSpace>(cpu: &mut CPU, bus: &mut T, target: ByteTarget) -> u8 {
    match target {
        ByteTarget::A => cpu.r.a,
        ByteTarget::B => cpu.r.b,
        ByteTarget::C => cpu.r.c,
        ByteTarget::D => cpu.r.d,
        ByteTarget::E => cpu.r.e,
        ByteTarget::H => cpu.r.h,
        ByteTarget::L => cpu.r.l,
        ByteTarget::HLI => bus.read(cpu.r.get_hl()),
    }
}

fn read_word_target(cpu: &CPU, target: WordTarget) -> u16 {
    match target {
        WordTarget::BC => cpu.r.get_bc(),
        WordTarget::DE => cpu.r.get_de(),
        WordTarget::HL => cpu.r.get_hl(),
        WordTarget::SP => cpu.sp,
    }
}

/// Every CB-prefixed opcode both reads and writes the same register/memory
/// cell, so the decode table only needs to carry a [`ByteSource`] for it.
fn byte_source_as_target(src: ByteSource) -> ByteTarget {
    match src {
        ByteSource::A => ByteTarget::A,
        ByteSource::B => ByteTarget::B,
        ByteSource::C => ByteTarget::C,
        ByteSource::D => ByteTarget::D,
        ByteSource::E => ByteTarget::E,
        ByteSource::H => ByteTarget::H,
        ByteSource::L => ByteTarget::L,
        ByteSource::HLI => ByteTarget::HLI,
        _ => unreachable!("CB-prefixed opcodes never address an immediate or 16-bit indirect"),
    }
}

fn rotate_left(value: u8) -> (u8, bool) {
    (value.rotate_left(1), value & 0x80 != 0)
}

fn rotate_right(value: u8) -> (u8, bool) {
    (value.rotate_right(1), value & 0x01 != 0)
}

fn rotate_left_through_carry(value: u8, carry_in: bool) -> (u8, bool) {
    ((value << 1) | carry_in as u8, value & 0x80 != 0)
}

fn rotate_right_through_carry(value: u8, carry_in: bool) -> (u8, bool) {
    ((value >> 1) | ((carry_in as u8) << 7), value & 0x01 != 0)
}

/// `ADD SP,e8` and `LD HL,SP+e8` share this: the result sign-extends `e`,
/// but the flags are computed as if `e` were added unsigned to the low byte.
fn add_sp_e8(sp: u16, e: i8) -> (u16, bool, bool) {
    let e_u8 = e as u8 as u16;
    let half_carry = (sp & 0x000F) + (e_u8 & 0x000F) > 0x000F;
    let carry = (sp & 0x00FF) + e_u8 > 0x00FF;
    let result = sp.wrapping_add(e as i16 as u16);
    (result, half_carry, carry)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A flat 64KiB array standing in for the bus in CPU unit tests. IME is
    /// tracked but interrupts are never injected unless a test asks for one.
    struct MockBus {
        data: [u8; 0x1_0000],
        ime: ImeState,
        cycles: u64,
        irq: Option<Irq>,
    }

    impl MockBus {
        fn new() -> Self {
            Self {
                data: [0; 0x1_0000],
                ime: ImeState::Disabled,
                cycles: 0,
                irq: None,
            }
        }

        fn load(&mut self, address: u16, bytes: &[u8]) {
            for (i, byte) in bytes.iter().enumerate() {
                self.data[address as usize + i] = *byte;
            }
        }

        fn cycle(&mut self) {
            self.cycles += 4;
        }
    }

    impl AddressSpace for MockBus {
        fn read(&mut self, address: u16) -> u8 {
            self.cycle();
            self.data[address as usize]
        }

        fn write(&mut self, address: u16, value: u8) {
            self.cycle();
            self.data[address as usize] = value;
        }
    }

    impl HardwareContext for MockBus {
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
            self.irq
        }

        fn ack_irq(&mut self, irq: Irq) {
            if self.irq == Some(irq) {
                self.irq = None;
            }
        }

        fn reset_div(&mut self) {}
    }

    #[test]
    fn add_sets_half_carry_and_carry() {
        let mut cpu = CPU::default();
        let mut bus = MockBus::new();
        cpu.r.a = 0xFF;
        cpu.r.b = 0x01;
        bus.load(0, &[0x80]); // ADD A,B
        let cycles = cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.r.a, 0x00);
        assert!(cpu.r.f.zero());
        assert!(cpu.r.f.half_carry());
        assert!(cpu.r.f.carry());
        assert_eq!(cycles, 4);
    }

    #[test]
    fn ld_immediate_costs_two_machine_cycles() {
        let mut cpu = CPU::default();
        let mut bus = MockBus::new();
        bus.load(0, &[0x3E, 0x42]); // LD A,d8
        let cycles = cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.r.a, 0x42);
        assert_eq!(cycles, 8);
    }

    #[test]
    fn conditional_jump_not_taken_skips_the_internal_cycle() {
        let mut cpu = CPU::default();
        let mut bus = MockBus::new();
        cpu.r.f.set(FlagsRegister::ZERO, false);
        bus.load(0, &[0xCA, 0x00, 0x10]); // JP Z,0x1000
        let cycles = cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.pc, 3);
        assert_eq!(cycles, 12);
    }

    #[test]
    fn conditional_jump_taken_pays_the_internal_cycle() {
        let mut cpu = CPU::default();
        let mut bus = MockBus::new();
        cpu.r.f.set(FlagsRegister::ZERO, true);
        bus.load(0, &[0xCA, 0x00, 0x10]); // JP Z,0x1000
        let cycles = cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.pc, 0x1000);
        assert_eq!(cycles, 16);
    }

    #[test]
    fn unresolved_opcode_is_an_error() {
        let mut cpu = CPU::default();
        let mut bus = MockBus::new();
        bus.load(0, &[0xD3]);
        let err = cpu.step(&mut bus).unwrap_err();
        assert!(matches!(err, EmuError::UnknownOpcode { pc: 0, opcode: 0xD3 }));
    }

    #[test]
    fn call_and_ret_round_trip_the_return_address() {
        let mut cpu = CPU::default();
        let mut bus = MockBus::new();
        cpu.sp = 0xFFFE;
        bus.load(0, &[0xCD, 0x10, 0x00]); // CALL 0x0010
        bus.load(0x10, &[0xC9]); // RET
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.pc, 0x0010);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.pc, 0x0003);
    }

    #[test]
    fn ei_takes_effect_one_instruction_later() {
        let mut cpu = CPU::default();
        let mut bus = MockBus::new();
        bus.load(0, &[0xFB, 0x00]); // EI; NOP
        cpu.step(&mut bus).unwrap();
        assert_eq!(bus.ime(), ImeState::Pending);
    }

    #[test]
    fn halt_wakes_on_pending_irq_without_ime() {
        let mut cpu = CPU::default();
        let mut bus = MockBus::new();
        cpu.is_halted = true;
        bus.irq = Some(Irq::VBlank);
        cpu.step(&mut bus).unwrap();
        assert!(!cpu.is_halted);
        assert_eq!(bus.irq, Some(Irq::VBlank)); // not serviced: IME was off
    }

    #[test]
    fn enabled_interrupt_is_serviced_and_acked() {
        let mut cpu = CPU::default();
        let mut bus = MockBus::new();
        cpu.sp = 0xFFFE;
        cpu.pc = 0x1234;
        bus.ime = ImeState::Enabled;
        bus.irq = Some(Irq::Timer);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.pc, Irq::Timer.vector());
        assert_eq!(bus.ime(), ImeState::Disabled);
        assert_eq!(bus.irq, None);
        assert_eq!(cpu.pop_word(&mut bus), 0x1234);
    }
}
