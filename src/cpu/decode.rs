/*
    z80core: ZiLOG Z80 processor emulation engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Op-code bit-field decomposition and the instruction tables of the main, `0xCB` and `0xED` pages.
//!
//! Every op-code is split into the octal fields:
//!
//! ```text
//!   7 6 5 4 3 2 1 0
//!  [ x ][  y  ][ z ]
//!       [ p ][q]
//! ```
//!
//! and each page is turned into a 256-entry table of [Instruction]s at compile time.
//! The tables don't know about the `0xDD`/`0xFD` prefixes: the index mode is applied by the
//! executor (or by the disassembler) to the instructions that refer to `HL`, `H`, `L` or `(HL)`.
#![allow(clippy::inconsistent_digit_grouping)]
use core::fmt;
use arrayvec::ArrayVec;
#[cfg(feature = "serde")] use serde::{Serialize, Deserialize};
use crate::host::{Bus, MEMORY_SIZE};
use crate::CpuError;
use super::flags::CpuFlags;
use super::registers::InterruptMode;

/// A prefix enum that switches the decoder into the index mode.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Prefix {
    Xdd = 0xDD,
    Yfd = 0xFD
}

impl Prefix {
    /// Returns the prefix the op-code `code` stands for.
    #[inline]
    pub const fn from_code(code: u8) -> Option<Prefix> {
        match code {
            0xDD => Some(Prefix::Xdd),
            0xFD => Some(Prefix::Yfd),
            _ => None
        }
    }
}

/// Displays prefix as a corresponding register pair.
impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Prefix::Xdd => "IX",
            Prefix::Yfd => "IY",
        })
    }
}

/// The octal fields of an op-code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OpcodeFields {
    /// Bits 7-6.
    pub x: u8,
    /// Bits 5-3.
    pub y: u8,
    /// Bits 2-0.
    pub z: u8,
    /// Bits 5-4.
    pub p: u8,
    /// Bit 3.
    pub q: u8,
}

impl OpcodeFields {
    /// Splits `code` into its fields.
    #[inline]
    pub const fn new(code: u8) -> Self {
        let y = (code >> 3) & 0b111;
        OpcodeFields {
            x: code >> 6,
            y,
            z: code & 0b111,
            p: y >> 1,
            q: y & 1
        }
    }
}

macro_rules! field_enum {
    ($(#[$meta:meta])* $name:ident & ($mask:expr) {$($n:ident = $e:literal;)*}) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($n = $e,)*
        }

        impl $name {
            /// Converts the field value. Bits outside the field mask are ignored.
            #[inline]
            pub const fn from_field(value: u8) -> Self {
                match value & ($mask) {
                    $($e => $name::$n,)*
                    _ => unreachable!()
                }
            }
        }
    };
}

/// An 8-bit register selected by the 3-bit `r` field.
///
/// The field value `0b110` selects the memory operand, see [Arg8].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reg8 {
    B = 0b000,
    C = 0b001,
    D = 0b010,
    E = 0b011,
    H = 0b100,
    L = 0b101,
    A = 0b111
}

/// An 8-bit operand selected by the 3-bit `r` field: a register or the memory addressed by `HL`
/// (or by `IX+d`/`IY+d` in the index mode).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Arg8 {
    Reg(Reg8),
    MemHl
}

impl Arg8 {
    /// Decodes the 3-bit `r` field.
    #[inline]
    pub const fn from_field(value: u8) -> Self {
        match value & 0b111 {
            0b000 => Arg8::Reg(Reg8::B),
            0b001 => Arg8::Reg(Reg8::C),
            0b010 => Arg8::Reg(Reg8::D),
            0b011 => Arg8::Reg(Reg8::E),
            0b100 => Arg8::Reg(Reg8::H),
            0b101 => Arg8::Reg(Reg8::L),
            0b110 => Arg8::MemHl,
            _ => Arg8::Reg(Reg8::A)
        }
    }

    /// Returns `true` for the memory operand.
    #[inline]
    pub const fn is_mem(self) -> bool {
        matches!(self, Arg8::MemHl)
    }
}

field_enum!{
    /// A 16-bit register pair selected by the `p` field (the `rp` table).
    Reg16 & (0b11) {
        BC = 0b00;
        DE = 0b01;
        HL = 0b10;
        SP = 0b11;
    }
}

field_enum!{
    /// A 16-bit register pair of the `PUSH` and `POP` instructions (the `rp2` table).
    StkReg16 & (0b11) {
        BC = 0b00;
        DE = 0b01;
        HL = 0b10;
        AF = 0b11;
    }
}

field_enum!{
    /// An 8-bit arithmetic or logic operation selected by the `y` field.
    Ops8 & (0b111) {
        ADD = 0b000;
        ADC = 0b001;
        SUB = 0b010;
        SBC = 0b011;
        AND = 0b100;
        XOR = 0b101;
        OR  = 0b110;
        CP  = 0b111;
    }
}

field_enum!{
    /// A rotate or shift operation of the `0xCB` page selected by the `y` field.
    Rot & (0b111) {
        RLC = 0b000;
        RRC = 0b001;
        RL  = 0b010;
        RR  = 0b011;
        SLA = 0b100;
        SRA = 0b101;
        SLL = 0b110;
        SRL = 0b111;
    }
}

field_enum!{
    /// A branching condition selected by the `y` field.
    Condition & (0b111) {
        NZ = 0b000;
        Z  = 0b001;
        NC = 0b010;
        C  = 0b011;
        PO = 0b100;
        PE = 0b101;
        P  = 0b110;
        M  = 0b111;
    }
}

impl Condition {
    /// Returns `true` if the condition is met by the given `flags`.
    #[inline]
    pub fn is_satisfied(self, flags: CpuFlags) -> bool {
        match self {
            Condition::NZ => !flags.zf(),
            Condition::Z  =>  flags.zf(),
            Condition::NC => !flags.cf(),
            Condition::C  =>  flags.cf(),
            Condition::PO => !flags.pvf(),
            Condition::PE =>  flags.pvf(),
            Condition::P  => !flags.sf(),
            Condition::M  =>  flags.sf(),
        }
    }
}

/// The kind of a block instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Ld,
    Cp,
    In,
    Out
}

/// The direction of a block instruction: `HL` is incremented or decremented after each step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum BlockDelta {
    Increase = 1,
    Decrease = -1
}

impl BlockDelta {
    /// Applies the delta to `val`.
    #[inline]
    pub fn apply(self, val: u16) -> u16 {
        val.wrapping_add(self as i8 as u16)
    }
}

/// A block instruction: `LDI`, `CPDR`, `OTIR` and the rest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockOp {
    pub kind: BlockKind,
    pub delta: BlockDelta,
    pub repeat: bool
}

impl BlockOp {
    const fn from_fields(y: u8, z: u8) -> Self {
        BlockOp {
            kind: match z & 0b11 {
                0 => BlockKind::Ld,
                1 => BlockKind::Cp,
                2 => BlockKind::In,
                _ => BlockKind::Out
            },
            delta: if y & 1 == 0 { BlockDelta::Increase } else { BlockDelta::Decrease },
            repeat: y & 0b10 != 0
        }
    }
}

/// An instruction kind with its operands encoded in the op-code.
///
/// Immediate values and displacements are not part of the instruction; see
/// [Instruction::immediate_len] and [Instruction::has_displacement].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Instruction {
    // main page
    Nop,
    ExAfAf,
    Djnz,
    Jr,
    JrCc(Condition),
    LdRpImm(Reg16),
    AddHlRp(Reg16),
    LdIndA(Reg16),
    LdAInd(Reg16),
    LdMemHl,
    LdHlMem,
    LdMemA,
    LdAMem,
    IncRp(Reg16),
    DecRp(Reg16),
    Inc8(Arg8),
    Dec8(Arg8),
    Ld8Imm(Arg8),
    Rlca,
    Rrca,
    Rla,
    Rra,
    Daa,
    Cpl,
    Scf,
    Ccf,
    Halt,
    Ld8(Arg8, Arg8),
    Alu(Ops8, Arg8),
    AluImm(Ops8),
    RetCc(Condition),
    Pop(StkReg16),
    Ret,
    Exx,
    JpHl,
    LdSpHl,
    JpCc(Condition),
    Jp,
    CallCc(Condition),
    Call,
    Push(StkReg16),
    Rst(u8),
    OutImmA,
    InAImm,
    ExSpHl,
    ExDeHl,
    Di,
    Ei,
    PrefixCb,
    PrefixEd,
    PrefixDd,
    PrefixFd,
    // 0xCB page
    Rot(Rot, Arg8),
    Bit(u8, Arg8),
    Res(u8, Arg8),
    Set(u8, Arg8),
    // 0xED page
    /// `IN r,(C)`; `None` only affects the flags.
    InC(Option<Reg8>),
    /// `OUT (C),r`; `None` outputs `0`.
    OutC(Option<Reg8>),
    SbcHlRp(Reg16),
    AdcHlRp(Reg16),
    LdMemRp(Reg16),
    LdRpMem(Reg16),
    Neg,
    Retn,
    Reti,
    Im(InterruptMode),
    LdIA,
    LdRA,
    LdAI,
    LdAR,
    Rrd,
    Rld,
    Block(BlockOp),
    /// An undefined `0xED` op-code, executed as an 8 T-states no-op.
    EdNop,
}

const fn decode_main(code: u8) -> Instruction {
    use Instruction::*;
    let OpcodeFields { x, y, z, p, q } = OpcodeFields::new(code);
    match x {
        0 => match z {
            0 => match y {
                0 => Nop,
                1 => ExAfAf,
                2 => Djnz,
                3 => Jr,
                _ => JrCc(Condition::from_field(y - 4))
            },
            1 if q == 0 => LdRpImm(Reg16::from_field(p)),
            1 => AddHlRp(Reg16::from_field(p)),
            2 => match (q, p) {
                (0, 0|1) => LdIndA(Reg16::from_field(p)),
                (0, 2) => LdMemHl,
                (0, _) => LdMemA,
                (_, 0|1) => LdAInd(Reg16::from_field(p)),
                (_, 2) => LdHlMem,
                _ => LdAMem
            },
            3 if q == 0 => IncRp(Reg16::from_field(p)),
            3 => DecRp(Reg16::from_field(p)),
            4 => Inc8(Arg8::from_field(y)),
            5 => Dec8(Arg8::from_field(y)),
            6 => Ld8Imm(Arg8::from_field(y)),
            _ => match y {
                0 => Rlca,
                1 => Rrca,
                2 => Rla,
                3 => Rra,
                4 => Daa,
                5 => Cpl,
                6 => Scf,
                _ => Ccf
            }
        },
        1 if y == 6 && z == 6 => Halt,
        1 => Ld8(Arg8::from_field(y), Arg8::from_field(z)),
        2 => Alu(Ops8::from_field(y), Arg8::from_field(z)),
        _ => match z {
            0 => RetCc(Condition::from_field(y)),
            1 if q == 0 => Pop(StkReg16::from_field(p)),
            1 => match p {
                0 => Ret,
                1 => Exx,
                2 => JpHl,
                _ => LdSpHl
            },
            2 => JpCc(Condition::from_field(y)),
            3 => match y {
                0 => Jp,
                1 => PrefixCb,
                2 => OutImmA,
                3 => InAImm,
                4 => ExSpHl,
                5 => ExDeHl,
                6 => Di,
                _ => Ei
            },
            4 => CallCc(Condition::from_field(y)),
            5 if q == 0 => Push(StkReg16::from_field(p)),
            5 => match p {
                0 => Call,
                1 => PrefixDd,
                2 => PrefixEd,
                _ => PrefixFd
            },
            6 => AluImm(Ops8::from_field(y)),
            _ => Rst(y << 3)
        }
    }
}

const fn decode_cb(code: u8) -> Instruction {
    let OpcodeFields { x, y, z, .. } = OpcodeFields::new(code);
    let arg = Arg8::from_field(z);
    match x {
        0 => Instruction::Rot(Rot::from_field(y), arg),
        1 => Instruction::Bit(y, arg),
        2 => Instruction::Res(y, arg),
        _ => Instruction::Set(y, arg)
    }
}

const fn decode_ed(code: u8) -> Instruction {
    use Instruction::*;
    let OpcodeFields { x, y, z, p, q } = OpcodeFields::new(code);
    match (x, z) {
        (1, 0) => InC(match Arg8::from_field(y) { Arg8::Reg(r) => Some(r), Arg8::MemHl => None }),
        (1, 1) => OutC(match Arg8::from_field(y) { Arg8::Reg(r) => Some(r), Arg8::MemHl => None }),
        (1, 2) if q == 0 => SbcHlRp(Reg16::from_field(p)),
        (1, 2) => AdcHlRp(Reg16::from_field(p)),
        (1, 3) if q == 0 => LdMemRp(Reg16::from_field(p)),
        (1, 3) => LdRpMem(Reg16::from_field(p)),
        (1, 4) => Neg,
        (1, 5) if y == 1 => Reti,
        (1, 5) => Retn,
        (1, 6) => Im(match y & 0b11 {
            0 | 1 => InterruptMode::Mode0,
            2 => InterruptMode::Mode1,
            _ => InterruptMode::Mode2
        }),
        (1, _) => match y {
            0 => LdIA,
            1 => LdRA,
            2 => LdAI,
            3 => LdAR,
            4 => Rrd,
            5 => Rld,
            _ => EdNop
        },
        (2, 0..=3) if y >= 4 => Block(BlockOp::from_fields(y, z)),
        _ => EdNop
    }
}

const fn build_table(decode: u8) -> [Instruction; 256] {
    let mut table = [Instruction::Nop; 256];
    let mut code: usize = 0;
    while code < 256 {
        table[code] = match decode {
            0 => decode_main(code as u8),
            1 => decode_cb(code as u8),
            _ => decode_ed(code as u8),
        };
        code += 1;
    }
    table
}

/// The main page instructions indexed by op-code.
pub static MAIN_PAGE: [Instruction; 256] = build_table(0);
/// The `0xCB` page instructions indexed by the op-code following `0xCB`.
pub static CB_PAGE: [Instruction; 256] = build_table(1);
/// The `0xED` page instructions indexed by the op-code following `0xED`.
pub static ED_PAGE: [Instruction; 256] = build_table(2);

impl Instruction {
    /// Decodes a main page op-code.
    #[inline]
    pub fn main(code: u8) -> Self {
        MAIN_PAGE[usize::from(code)]
    }

    /// Decodes an op-code following the `0xCB` prefix.
    #[inline]
    pub fn cb(code: u8) -> Self {
        CB_PAGE[usize::from(code)]
    }

    /// Decodes an op-code following the `0xED` prefix.
    #[inline]
    pub fn ed(code: u8) -> Self {
        ED_PAGE[usize::from(code)]
    }

    /// Returns the number of the immediate argument bytes following the op-code (0, 1 or 2).
    ///
    /// In the index mode a displacement byte may precede them, see [Instruction::has_displacement].
    pub fn immediate_len(self) -> u8 {
        use Instruction::*;
        match self {
            Djnz|Jr|JrCc(..)|Ld8Imm(..)|AluImm(..)|OutImmA|InAImm => 1,
            LdRpImm(..)|LdMemHl|LdHlMem|LdMemA|LdAMem|JpCc(..)|Jp|CallCc(..)|Call
            |LdMemRp(..)|LdRpMem(..) => 2,
            _ => 0
        }
    }

    /// Returns `true` if the instruction addresses memory via `(HL)`, so in the index mode
    /// it is followed by a signed displacement byte.
    pub fn has_displacement(self) -> bool {
        use Instruction::*;
        match self {
            Inc8(arg)|Dec8(arg)|Ld8Imm(arg)|Alu(_, arg)
            |Rot(_, arg)|Bit(_, arg)|Res(_, arg)|Set(_, arg) => arg.is_mem(),
            Ld8(dst, src) => dst.is_mem() || src.is_mem(),
            _ => false
        }
    }

    /// Returns `true` for the `0xCB`, `0xED`, `0xDD` and `0xFD` prefixes.
    pub fn is_prefix(self) -> bool {
        matches!(self, Instruction::PrefixCb|Instruction::PrefixEd|
                       Instruction::PrefixDd|Instruction::PrefixFd)
    }
}

/// The type that stores a copy of the instruction's full byte code.
pub type DecodedCode = ArrayVec<u8, 4>;

/// An instruction decoded from memory without executing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    /// The address of the effective instruction, after any redundant prefixes.
    pub pc: u16,
    /// The address of the next instruction.
    pub next_pc: u16,
    /// The number of redundant `0xDD`/`0xFD` prefixes skipped before `pc`.
    pub skipped: u16,
    /// The index mode the instruction is executed in.
    pub prefix: Option<Prefix>,
    /// The bytes of the effective instruction.
    pub code: DecodedCode,
    /// The decoded instruction.
    pub instruction: Instruction,
    /// The index displacement, if any.
    pub displacement: Option<i8>,
    /// The immediate argument, if any.
    pub immediate: Option<u16>,
}

/// Decodes the instruction at `pc` without altering any Cpu state.
///
/// Only [Bus::read_byte] is used. Returns [CpuError::PrefixRunaway] if the whole address space
/// starting at `pc` is filled with `0xDD`/`0xFD` prefixes.
pub fn decode_at<B: Bus + ?Sized>(bus: &mut B, pc: u16) -> Result<Decoded, CpuError> {
    let mut addr = pc;
    let mut prefix = None;
    let mut run: usize = 0;
    let mut code = bus.read_byte(addr);
    while let Some(pfx) = Prefix::from_code(code) {
        run += 1;
        if run >= MEMORY_SIZE {
            return Err(CpuError::PrefixRunaway { pc })
        }
        prefix = Some(pfx);
        addr = addr.wrapping_add(1);
        code = bus.read_byte(addr);
    }
    let mut skipped = run.saturating_sub(1);
    let mut bytes = DecodedCode::new();
    let mut start = addr;
    if let Some(pfx) = prefix {
        start = addr.wrapping_sub(1);
        bytes.push(pfx as u8);
    }
    bytes.push(code);
    addr = addr.wrapping_add(1);
    let mut displacement = None;
    let instruction = match Instruction::main(code) {
        Instruction::PrefixEd => {
            // the index mode is abandoned by 0xED
            if prefix.take().is_some() {
                bytes.remove(0);
                start = start.wrapping_add(1);
                skipped += 1;
            }
            let code = bus.read_byte(addr);
            bytes.push(code);
            addr = addr.wrapping_add(1);
            Instruction::ed(code)
        }
        Instruction::PrefixCb => {
            if prefix.is_some() {
                let d = bus.read_byte(addr);
                bytes.push(d);
                displacement = Some(d as i8);
                addr = addr.wrapping_add(1);
            }
            let code = bus.read_byte(addr);
            bytes.push(code);
            addr = addr.wrapping_add(1);
            Instruction::cb(code)
        }
        instr => {
            if prefix.is_some() && instr.has_displacement() {
                let d = bus.read_byte(addr);
                bytes.push(d);
                displacement = Some(d as i8);
                addr = addr.wrapping_add(1);
            }
            instr
        }
    };
    let immediate = match instruction.immediate_len() {
        0 => None,
        len => {
            let mut imm: u16 = 0;
            for shift in 0..len {
                let byte = bus.read_byte(addr);
                bytes.push(byte);
                imm |= u16::from(byte) << (shift * 8);
                addr = addr.wrapping_add(1);
            }
            Some(imm)
        }
    };
    Ok(Decoded {
        pc: start,
        next_pc: addr,
        skipped: skipped as u16,
        prefix,
        code: bytes,
        instruction,
        displacement,
        immediate
    })
}
