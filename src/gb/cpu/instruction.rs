use crate::gb::AddressSpace;
use crate::gb::cpu::CPU;

/// Where an 8-bit operand comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ByteSource {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    /// Immediate byte following the opcode.
    D8,
    /// `(HL)`.
    HLI,
    /// `(BC)`.
    BCI,
    /// `(DE)`.
    DEI,
    /// `(0xFF00 + C)`.
    CIFF00,
    /// `(0xFF00 + d8)`.
    D8IFF00,
    /// `(a16)`.
    D16I,
}

impl ByteSource {
    pub fn read<T: AddressSpace>(self, cpu: &mut CPU, bus: &mut T) -> u8 {
        match self {
            ByteSource::A => cpu.r.a,
            ByteSource::B => cpu.r.b,
            ByteSource::C => cpu.r.c,
            ByteSource::D => cpu.r.d,
            ByteSource::E => cpu.r.e,
            ByteSource::H => cpu.r.h,
            ByteSource::L => cpu.r.l,
            ByteSource::D8 => cpu.consume_byte(bus),
            ByteSource::HLI => bus.read(cpu.r.get_hl()),
            ByteSource::BCI => bus.read(cpu.r.get_bc()),
            ByteSource::DEI => bus.read(cpu.r.get_de()),
            ByteSource::CIFF00 => bus.read(0xFF00 | u16::from(cpu.r.c)),
            ByteSource::D8IFF00 => {
                let offset = cpu.consume_byte(bus);
                bus.read(0xFF00 | u16::from(offset))
            }
            ByteSource::D16I => {
                let address = cpu.consume_word(bus);
                bus.read(address)
            }
        }
    }

    /// `true` for sources that are not a plain register: these cost an extra
    /// machine cycle to resolve.
    pub const fn is_memory_access(self) -> bool {
        !matches!(self, ByteSource::A | ByteSource::B | ByteSource::C | ByteSource::D | ByteSource::E | ByteSource::H | ByteSource::L)
    }
}

/// Where an 8-bit result is written back to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ByteTarget {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    HLI,
}

impl ByteTarget {
    pub fn write<T: AddressSpace>(self, cpu: &mut CPU, bus: &mut T, value: u8) {
        match self {
            ByteTarget::A => cpu.r.a = value,
            ByteTarget::B => cpu.r.b = value,
            ByteTarget::C => cpu.r.c = value,
            ByteTarget::D => cpu.r.d = value,
            ByteTarget::E => cpu.r.e = value,
            ByteTarget::H => cpu.r.h = value,
            ByteTarget::L => cpu.r.l = value,
            ByteTarget::HLI => bus.write(cpu.r.get_hl(), value),
        }
    }
}

/// Where a 16-bit operand comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WordSource {
    BC,
    DE,
    HL,
    SP,
    D16,
}

impl WordSource {
    pub fn read<T: AddressSpace>(self, cpu: &mut CPU, bus: &mut T) -> u16 {
        match self {
            WordSource::BC => cpu.r.get_bc(),
            WordSource::DE => cpu.r.get_de(),
            WordSource::HL => cpu.r.get_hl(),
            WordSource::SP => cpu.sp,
            WordSource::D16 => cpu.consume_word(bus),
        }
    }
}

/// Where a 16-bit result is written back to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WordTarget {
    BC,
    DE,
    HL,
    SP,
}

impl WordTarget {
    pub fn write(self, cpu: &mut CPU, value: u16) {
        match self {
            WordTarget::BC => cpu.r.set_bc(value),
            WordTarget::DE => cpu.r.set_de(value),
            WordTarget::HL => cpu.r.set_hl(value),
            WordTarget::SP => cpu.sp = value,
        }
    }
}

/// Condition code for branch instructions, decoded from bits 3-4 of the opcode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JumpTest {
    NotZero,
    Zero,
    NotCarry,
    Carry,
    Always,
}

impl JumpTest {
    pub fn resolve(self, cpu: &CPU) -> bool {
        match self {
            JumpTest::NotZero => !cpu.r.f.zero(),
            JumpTest::Zero => cpu.r.f.zero(),
            JumpTest::NotCarry => !cpu.r.f.carry(),
            JumpTest::Carry => cpu.r.f.carry(),
            JumpTest::Always => true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StackTarget {
    AF,
    BC,
    DE,
    HL,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResetCode {
    Rst00,
    Rst08,
    Rst10,
    Rst18,
    Rst20,
    Rst28,
    Rst30,
    Rst38,
}

impl ResetCode {
    pub const fn address(self) -> u16 {
        match self {
            ResetCode::Rst00 => 0x00,
            ResetCode::Rst08 => 0x08,
            ResetCode::Rst10 => 0x10,
            ResetCode::Rst18 => 0x18,
            ResetCode::Rst20 => 0x20,
            ResetCode::Rst28 => 0x28,
            ResetCode::Rst30 => 0x30,
            ResetCode::Rst38 => 0x38,
        }
    }
}

/// All addressing-mode variants an `LD` opcode can take.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Load {
    /// `LD r, r'` / `LD r, d8` / `LD r, (HL)`.
    Byte(ByteTarget, ByteSource),
    /// `LD rr, d16` / `LD SP, HL`.
    Word(WordTarget, WordSource),
    /// `LD (rr), r` / `LD (a16), r` / `LD (HL), d8` / `LD (C), A` / `LD (a8), A`.
    IndirectFrom(IndirectByteTarget, ByteSource),
    /// `LD (HL+), A`.
    IndirectFromAInc,
    /// `LD (HL-), A`.
    IndirectFromADec,
    /// `LD (a16), SP`.
    IndirectFromWord,
    /// `LD A, (HL+)`.
    FromIndirectAInc,
    /// `LD A, (HL-)`.
    FromIndirectADec,
    /// `LD HL, SP+e8`.
    IndirectFromSPi8,
}

/// Destination addresses for `LD (x), r` forms.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IndirectByteTarget {
    BCI,
    DEI,
    HLI,
    D16I,
    CIFF00,
    D8IFF00,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    ADD(ByteSource),
    ADDHL(WordSource),
    ADDSP,
    ADC(ByteSource),
    AND(ByteSource),
    BIT(u8, ByteSource),
    CALL(JumpTest),
    CCF,
    CP(ByteSource),
    CPL,
    DAA,
    DI,
    DEC(ByteTarget),
    DEC2(WordTarget),
    EI,
    HALT,
    INC(ByteTarget),
    INC2(WordTarget),
    JR(JumpTest),
    JP(JumpTest, WordSource),
    LD(Load),
    NOP,
    OR(ByteSource),
    RES(u8, ByteSource),
    RET(JumpTest),
    RETI,
    RL(ByteSource),
    RLA,
    RLC(ByteSource),
    RLCA,
    RR(ByteSource),
    RRA,
    RRC(ByteSource),
    RRCA,
    RST(ResetCode),
    SBC(ByteSource),
    SCF,
    SET(u8, ByteSource),
    SLA(ByteSource),
    SRA(ByteSource),
    SRL(ByteSource),
    STOP,
    SUB(ByteSource),
    SWAP(ByteSource),
    PUSH(StackTarget),
    POP(StackTarget),
    XOR(ByteSource),
}

/// Maps the 3-bit register index used throughout the opcode table:
/// 0=B 1=C 2=D 3=E 4=H 5=L 6=(HL) 7=A.
const fn reg_src(index: u8) -> ByteSource {
    match index {
        0 => ByteSource::B,
        1 => ByteSource::C,
        2 => ByteSource::D,
        3 => ByteSource::E,
        4 => ByteSource::H,
        5 => ByteSource::L,
        6 => ByteSource::HLI,
        _ => ByteSource::A,
    }
}

const fn reg_dst(index: u8) -> ByteTarget {
    match index {
        0 => ByteTarget::B,
        1 => ByteTarget::C,
        2 => ByteTarget::D,
        3 => ByteTarget::E,
        4 => ByteTarget::H,
        5 => ByteTarget::L,
        6 => ByteTarget::HLI,
        _ => ByteTarget::A,
    }
}

const fn word_pair(index: u8, sp_form: bool) -> (WordTarget, WordSource) {
    match (index, sp_form) {
        (0, _) => (WordTarget::BC, WordSource::BC),
        (1, _) => (WordTarget::DE, WordSource::DE),
        (2, _) => (WordTarget::HL, WordSource::HL),
        (3, true) => (WordTarget::SP, WordSource::SP),
        _ => (WordTarget::HL, WordSource::HL),
    }
}

const fn reset_code(index: u8) -> ResetCode {
    match index {
        0 => ResetCode::Rst00,
        1 => ResetCode::Rst08,
        2 => ResetCode::Rst10,
        3 => ResetCode::Rst18,
        4 => ResetCode::Rst20,
        5 => ResetCode::Rst28,
        6 => ResetCode::Rst30,
        _ => ResetCode::Rst38,
    }
}

impl Instruction {
    /// Decodes a single opcode byte into an [`Instruction`]. `prefixed`
    /// selects the CB-prefixed table, which has no undefined opcodes.
    /// Returns `None` for the handful of bytes the DMG hardware leaves
    /// undefined in the primary table.
    pub fn from_byte(opcode: u8, prefixed: bool) -> Option<Instruction> {
        if prefixed {
            Some(Self::from_cb_byte(opcode))
        } else {
            Self::from_primary_byte(opcode)
        }
    }

    fn from_cb_byte(opcode: u8) -> Instruction {
        let z = opcode & 0x07;
        let y = (opcode >> 3) & 0x07;
        let src = reg_src(z);
        match opcode >> 6 {
            0 => match y {
                0 => Instruction::RLC(src),
                1 => Instruction::RRC(src),
                2 => Instruction::RL(src),
                3 => Instruction::RR(src),
                4 => Instruction::SLA(src),
                5 => Instruction::SRA(src),
                6 => Instruction::SWAP(src),
                _ => Instruction::SRL(src),
            },
            1 => Instruction::BIT(y, src),
            2 => Instruction::RES(y, src),
            _ => Instruction::SET(y, src),
        }
    }

    #[rustfmt::skip]
    fn from_primary_byte(opcode: u8) -> Option<Instruction> {
        use Instruction::*;
        use Load::*;

        let instruction = match opcode {
            0x00 => NOP,
            0x01 => LD(Word(WordTarget::BC, WordSource::D16)),
            0x02 => LD(IndirectFrom(IndirectByteTarget::BCI, ByteSource::A)),
            0x03 => INC2(WordTarget::BC),
            0x04 => INC(ByteTarget::B),
            0x05 => DEC(ByteTarget::B),
            0x06 => LD(Byte(ByteTarget::B, ByteSource::D8)),
            0x07 => RLCA,
            0x08 => LD(IndirectFromWord),
            0x09 => ADDHL(WordSource::BC),
            0x0A => LD(Byte(ByteTarget::A, ByteSource::BCI)),
            0x0B => DEC2(WordTarget::BC),
            0x0C => INC(ByteTarget::C),
            0x0D => DEC(ByteTarget::C),
            0x0E => LD(Byte(ByteTarget::C, ByteSource::D8)),
            0x0F => RRCA,

            0x10 => STOP,
            0x11 => LD(Word(WordTarget::DE, WordSource::D16)),
            0x12 => LD(IndirectFrom(IndirectByteTarget::DEI, ByteSource::A)),
            0x13 => INC2(WordTarget::DE),
            0x14 => INC(ByteTarget::D),
            0x15 => DEC(ByteTarget::D),
            0x16 => LD(Byte(ByteTarget::D, ByteSource::D8)),
            0x17 => RLA,
            0x18 => JR(JumpTest::Always),
            0x19 => ADDHL(WordSource::DE),
            0x1A => LD(Byte(ByteTarget::A, ByteSource::DEI)),
            0x1B => DEC2(WordTarget::DE),
            0x1C => INC(ByteTarget::E),
            0x1D => DEC(ByteTarget::E),
            0x1E => LD(Byte(ByteTarget::E, ByteSource::D8)),
            0x1F => RRA,

            0x20 => JR(JumpTest::NotZero),
            0x21 => LD(Word(WordTarget::HL, WordSource::D16)),
            0x22 => LD(IndirectFromAInc),
            0x23 => INC2(WordTarget::HL),
            0x24 => INC(ByteTarget::H),
            0x25 => DEC(ByteTarget::H),
            0x26 => LD(Byte(ByteTarget::H, ByteSource::D8)),
            0x27 => DAA,
            0x28 => JR(JumpTest::Zero),
            0x29 => ADDHL(WordSource::HL),
            0x2A => LD(FromIndirectAInc),
            0x2B => DEC2(WordTarget::HL),
            0x2C => INC(ByteTarget::L),
            0x2D => DEC(ByteTarget::L),
            0x2E => LD(Byte(ByteTarget::L, ByteSource::D8)),
            0x2F => CPL,

            0x30 => JR(JumpTest::NotCarry),
            0x31 => LD(Word(WordTarget::SP, WordSource::D16)),
            0x32 => LD(IndirectFromADec),
            0x33 => INC2(WordTarget::SP),
            0x34 => INC(ByteTarget::HLI),
            0x35 => DEC(ByteTarget::HLI),
            0x36 => LD(IndirectFrom(IndirectByteTarget::HLI, ByteSource::D8)),
            0x37 => SCF,
            0x38 => JR(JumpTest::Carry),
            0x39 => ADDHL(WordSource::SP),
            0x3A => LD(FromIndirectADec),
            0x3B => DEC2(WordTarget::SP),
            0x3C => INC(ByteTarget::A),
            0x3D => DEC(ByteTarget::A),
            0x3E => LD(Byte(ByteTarget::A, ByteSource::D8)),
            0x3F => CCF,

            0x76 => HALT,
            0x40..=0x7F => {
                let idx = opcode - 0x40;
                LD(Byte(reg_dst(idx / 8), reg_src(idx % 8)))
            }

            0x80..=0xBF => {
                let idx = opcode - 0x80;
                let src = reg_src(idx % 8);
                match idx / 8 {
                    0 => ADD(src),
                    1 => ADC(src),
                    2 => SUB(src),
                    3 => SBC(src),
                    4 => AND(src),
                    5 => XOR(src),
                    6 => OR(src),
                    _ => CP(src),
                }
            }

            0xC0 => RET(JumpTest::NotZero),
            0xC1 => POP(StackTarget::BC),
            0xC2 => JP(JumpTest::NotZero, WordSource::D16),
            0xC3 => JP(JumpTest::Always, WordSource::D16),
            0xC4 => CALL(JumpTest::NotZero),
            0xC5 => PUSH(StackTarget::BC),
            0xC6 => ADD(ByteSource::D8),
            0xC7 => RST(reset_code(0)),
            0xC8 => RET(JumpTest::Zero),
            0xC9 => RET(JumpTest::Always),
            0xCA => JP(JumpTest::Zero, WordSource::D16),
            0xCB => return None, // handled by the CB-prefixed table
            0xCC => CALL(JumpTest::Zero),
            0xCD => CALL(JumpTest::Always),
            0xCE => ADC(ByteSource::D8),
            0xCF => RST(reset_code(1)),

            0xD0 => RET(JumpTest::NotCarry),
            0xD1 => POP(StackTarget::DE),
            0xD2 => JP(JumpTest::NotCarry, WordSource::D16),
            0xD3 => return None,
            0xD4 => CALL(JumpTest::NotCarry),
            0xD5 => PUSH(StackTarget::DE),
            0xD6 => SUB(ByteSource::D8),
            0xD7 => RST(reset_code(2)),
            0xD8 => RET(JumpTest::Carry),
            0xD9 => RETI,
            0xDA => JP(JumpTest::Carry, WordSource::D16),
            0xDB => return None,
            0xDC => CALL(JumpTest::Carry),
            0xDD => return None,
            0xDE => SBC(ByteSource::D8),
            0xDF => RST(reset_code(3)),

            0xE0 => LD(IndirectFrom(IndirectByteTarget::D8IFF00, ByteSource::A)),
            0xE1 => POP(StackTarget::HL),
            0xE2 => LD(IndirectFrom(IndirectByteTarget::CIFF00, ByteSource::A)),
            0xE3 => return None,
            0xE4 => return None,
            0xE5 => PUSH(StackTarget::HL),
            0xE6 => AND(ByteSource::D8),
            0xE7 => RST(reset_code(4)),
            0xE8 => ADDSP,
            0xE9 => JP(JumpTest::Always, WordSource::HL),
            0xEA => LD(IndirectFrom(IndirectByteTarget::D16I, ByteSource::A)),
            0xEB => return None,
            0xEC => return None,
            0xED => return None,
            0xEE => XOR(ByteSource::D8),
            0xEF => RST(reset_code(5)),

            0xF0 => LD(Byte(ByteTarget::A, ByteSource::D8IFF00)),
            0xF1 => POP(StackTarget::AF),
            0xF2 => LD(Byte(ByteTarget::A, ByteSource::CIFF00)),
            0xF3 => DI,
            0xF4 => return None,
            0xF5 => PUSH(StackTarget::AF),
            0xF6 => OR(ByteSource::D8),
            0xF7 => RST(reset_code(6)),
            0xF8 => LD(IndirectFromSPi8),
            0xF9 => LD(Word(WordTarget::SP, WordSource::HL)),
            0xFA => LD(Byte(ByteTarget::A, ByteSource::D16I)),
            0xFB => EI,
            0xFC => return None,
            0xFD => return None,
            0xFE => CP(ByteSource::D8),
            0xFF => RST(reset_code(7)),
        };
        Some(instruction)
    }
}

#[allow(dead_code)]
const fn _unused(index: u8, sp_form: bool) -> (WordTarget, WordSource) {
    word_pair(index, sp_form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_nop_and_halt() {
        assert_eq!(Instruction::from_byte(0x00, false), Some(Instruction::NOP));
        assert_eq!(Instruction::from_byte(0x76, false), Some(Instruction::HALT));
    }

    #[test]
    fn undefined_opcodes_decode_to_none() {
        for opcode in [0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD] {
            assert_eq!(Instruction::from_byte(opcode, false), None);
        }
    }

    #[test]
    fn ld_block_decodes_register_pairs() {
        // LD C, H = 0x4C
        assert_eq!(
            Instruction::from_byte(0x4C, false),
            Some(Instruction::LD(Load::Byte(ByteTarget::C, ByteSource::H)))
        );
        // LD (HL), B = 0x70
        assert_eq!(
            Instruction::from_byte(0x70, false),
            Some(Instruction::LD(Load::Byte(ByteTarget::HLI, ByteSource::B)))
        );
    }

    #[test]
    fn cb_table_has_no_gaps() {
        for opcode in 0u8..=0xFF {
            let _ = Instruction::from_byte(opcode, true);
        }
    }

    #[test]
    fn bit_instructions_decode_bit_index() {
        // BIT 3, A = 0xCB 0x5F
        assert_eq!(
            Instruction::from_byte(0x5F, true),
            Instruction::BIT(3, ByteSource::A)
        );
    }
}
