/*
    z80core: ZiLOG Z80 processor emulation engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Arithmetic, logic, bit and block operations.
//!
//! All Flags involved instructions use these functions to compute the new Flags state.
//! Each function takes the operands and the current Flags and returns the result with the new Flags.
use crate::cpu::{CpuFlags, Ops8, Rot};

const HALF8_MASK_HI: u8 = 0xF0;
const HALF8_MASK_LO: u8 = 0x0F;
const SIGN8: u8 = 0x80;
const SIGN16: u16 = 0x8000;

/// Applies one of the accumulator operations. `CP` returns `acc` unchanged.
#[inline]
pub fn alu8(op: Ops8, acc: u8, val: u8, flags: CpuFlags) -> (u8, CpuFlags) {
    match op {
        Ops8::ADD => add(acc, val, false),
        Ops8::ADC => add(acc, val, flags.cf()),
        Ops8::SUB => sub(acc, val, false),
        Ops8::SBC => sub(acc, val, flags.cf()),
        Ops8::AND => and(acc, val),
        Ops8::XOR => xor(acc, val),
        Ops8::OR  => or(acc, val),
        Ops8::CP  => (acc, cp(acc, val)),
    }
}

/// `ADD` when `cf` is `false`, `ADC` otherwise.
#[inline]
pub fn add(val: u8, add: u8, cf: bool) -> (u8, CpuFlags) {
    let sum = u16::from(val) + u16::from(add) + u16::from(cf);
    let res = sum as u8;
    let vf = (val ^ res) & (add ^ res) & SIGN8 != 0;
    (res, CpuFlags::mask_h_add(val, add, cf) |
          CpuFlags::mask_sxy(res) |
          CpuFlags::mask_cvz(sum > 0xFF, vf, res == 0))
}

/// `SUB` when `cf` is `false`, `SBC` otherwise.
#[inline]
pub fn sub(val: u8, sub: u8, cf: bool) -> (u8, CpuFlags) {
    let diff = u16::from(val).wrapping_sub(u16::from(sub)).wrapping_sub(u16::from(cf));
    let res = diff as u8;
    let vf = (val ^ sub) & (val ^ res) & SIGN8 != 0;
    (res, CpuFlags::mask_nh_sub(val, sub, cf) |
          CpuFlags::mask_sxy(res) |
          CpuFlags::mask_cvz(diff > 0xFF, vf, res == 0))
}

/// Compares like `SUB`, but bits 5 and 3 are copied from the operand.
#[inline]
pub fn cp(val: u8, cmp: u8) -> CpuFlags {
    let (_, flags) = sub(val, cmp, false);
    flags.with(CpuFlags::XY, CpuFlags::mask_xy(cmp))
}

#[inline]
pub fn and(val: u8, arg: u8) -> (u8, CpuFlags) {
    let res = val & arg;
    (res, CpuFlags::mask_bitops(res, true, false))
}

#[inline]
pub fn xor(val: u8, arg: u8) -> (u8, CpuFlags) {
    let res = val ^ arg;
    (res, CpuFlags::mask_bitops(res, false, false))
}

#[inline]
pub fn or(val: u8, arg: u8) -> (u8, CpuFlags) {
    let res = val | arg;
    (res, CpuFlags::mask_bitops(res, false, false))
}

/// Carry is preserved.
#[inline]
pub fn inc(val: u8, flags: CpuFlags) -> (u8, CpuFlags) {
    let res = val.wrapping_add(1);
    (res, (flags & CpuFlags::C) |
          CpuFlags::mask_sxy(res) |
          CpuFlags::mask_zero(res) |
          CpuFlags::mask_hf(val & HALF8_MASK_LO == HALF8_MASK_LO) |
          CpuFlags::mask_pvf(val == SIGN8 - 1))
}

/// Carry is preserved.
#[inline]
pub fn dec(val: u8, flags: CpuFlags) -> (u8, CpuFlags) {
    let res = val.wrapping_sub(1);
    (res, (flags & CpuFlags::C) |
          CpuFlags::N |
          CpuFlags::mask_sxy(res) |
          CpuFlags::mask_zero(res) |
          CpuFlags::mask_hf(val & HALF8_MASK_LO == 0) |
          CpuFlags::mask_pvf(val == SIGN8))
}

/// `ADD HL,rr`: `S`, `Z` and `PV` are preserved.
#[inline]
pub fn add16(val: u16, add: u16, flags: CpuFlags) -> (u16, CpuFlags) {
    let (res, cf) = val.overflowing_add(add);
    let [_, hi] = res.to_le_bytes();
    (res, flags.with(CpuFlags::XY|CpuFlags::H|CpuFlags::N|CpuFlags::C,
                     CpuFlags::mask_xy(hi) |
                     CpuFlags::mask_h_add16(val, add, false) |
                     CpuFlags::mask_carry(cf)))
}

#[inline]
pub fn adc16(val: u16, add: u16, flags: CpuFlags) -> (u16, CpuFlags) {
    let cf = flags.cf();
    let sum = u32::from(val) + u32::from(add) + u32::from(cf);
    let res = sum as u16;
    let [_, hi] = res.to_le_bytes();
    let vf = (val ^ res) & (add ^ res) & SIGN16 != 0;
    (res, CpuFlags::mask_h_add16(val, add, cf) |
          CpuFlags::mask_sxy(hi) |
          CpuFlags::mask_cvz(sum > 0xFFFF, vf, res == 0))
}

#[inline]
pub fn sbc16(val: u16, sub: u16, flags: CpuFlags) -> (u16, CpuFlags) {
    let cf = flags.cf();
    let diff = u32::from(val).wrapping_sub(u32::from(sub)).wrapping_sub(u32::from(cf));
    let res = diff as u16;
    let [_, hi] = res.to_le_bytes();
    let vf = (val ^ sub) & (val ^ res) & SIGN16 != 0;
    (res, CpuFlags::mask_nh_sub16(val, sub, cf) |
          CpuFlags::mask_sxy(hi) |
          CpuFlags::mask_cvz(diff > 0xFFFF, vf, res == 0))
}

#[inline]
pub fn neg(acc: u8) -> (u8, CpuFlags) {
    sub(0, acc, false)
}

#[inline]
pub fn cpl(acc: u8, flags: CpuFlags) -> (u8, CpuFlags) {
    let res = !acc;
    (res, flags.with(CpuFlags::XY|CpuFlags::H|CpuFlags::N,
                     CpuFlags::mask_xy(res)|CpuFlags::H|CpuFlags::N))
}

/// Bits 5 and 3 are copied from the accumulator.
#[inline]
pub fn scf(acc: u8, flags: CpuFlags) -> CpuFlags {
    flags.with(CpuFlags::XY|CpuFlags::H|CpuFlags::N|CpuFlags::C,
               CpuFlags::mask_xy(acc)|CpuFlags::C)
}

/// Bits 5 and 3 are copied from the accumulator, `H` gets the previous carry.
#[inline]
pub fn ccf(acc: u8, flags: CpuFlags) -> CpuFlags {
    let cf = flags.cf();
    flags.with(CpuFlags::XY|CpuFlags::H|CpuFlags::N|CpuFlags::C,
               CpuFlags::mask_xy(acc)|CpuFlags::mask_hf(cf)|CpuFlags::mask_carry(!cf))
}

#[inline]
pub fn daa(acc: u8, flags: CpuFlags) -> (u8, CpuFlags) {
    let low_nibble = acc & HALF8_MASK_LO;
    let hf0 = flags.hf();
    let nf = flags.nf();
    let mut cf = flags.cf();
    let mut diff = 0;
    if hf0 || low_nibble > 9 {
        diff |= 0x06;
    }
    if cf || acc > 0x99 {
        diff |= 0x60;
        cf = true;
    }
    let (res, hf) = if nf {
        (acc.wrapping_sub(diff), hf0 && low_nibble < 6)
    }
    else {
        (acc.wrapping_add(diff), low_nibble > 9)
    };
    (res, CpuFlags::mask_bitops(res, hf, cf) | CpuFlags::mask_nf(nf))
}

#[inline]
fn rot_acc(res: u8, cf: bool, flags: CpuFlags) -> (u8, CpuFlags) {
    (res, flags.with(CpuFlags::XY|CpuFlags::H|CpuFlags::N|CpuFlags::C,
                     CpuFlags::mask_xy(res)|CpuFlags::mask_carry(cf)))
}

#[inline]
pub fn rlca(acc: u8, flags: CpuFlags) -> (u8, CpuFlags) {
    rot_acc(acc.rotate_left(1), acc & SIGN8 != 0, flags)
}

#[inline]
pub fn rrca(acc: u8, flags: CpuFlags) -> (u8, CpuFlags) {
    rot_acc(acc.rotate_right(1), acc & 1 != 0, flags)
}

#[inline]
pub fn rla(acc: u8, flags: CpuFlags) -> (u8, CpuFlags) {
    rot_acc(acc << 1 | u8::from(flags.cf()), acc & SIGN8 != 0, flags)
}

#[inline]
pub fn rra(acc: u8, flags: CpuFlags) -> (u8, CpuFlags) {
    rot_acc(acc >> 1 | u8::from(flags.cf()) << 7, acc & 1 != 0, flags)
}

/// The `0xCB` page rotate and shift operations.
#[inline]
pub fn rot(op: Rot, val: u8, flags: CpuFlags) -> (u8, CpuFlags) {
    let carry_in = u8::from(flags.cf());
    let (res, cf) = match op {
        Rot::RLC => (val.rotate_left(1), val & SIGN8 != 0),
        Rot::RRC => (val.rotate_right(1), val & 1 != 0),
        Rot::RL  => (val << 1 | carry_in, val & SIGN8 != 0),
        Rot::RR  => (val >> 1 | carry_in << 7, val & 1 != 0),
        Rot::SLA => (val << 1, val & SIGN8 != 0),
        Rot::SRA => (val >> 1 | val & SIGN8, val & 1 != 0),
        Rot::SLL => (val << 1 | 1, val & SIGN8 != 0),
        Rot::SRL => (val >> 1, val & 1 != 0),
    };
    (res, CpuFlags::mask_bitops(res, false, cf))
}

/// Returns `(acc, mem, flags)`.
#[inline]
pub fn rld(acc: u8, mem: u8, flags: CpuFlags) -> (u8, u8, CpuFlags) {
    let res = (acc & HALF8_MASK_HI) | (mem >> 4);
    let mem = (mem << 4) | (acc & HALF8_MASK_LO);
    (res, mem, CpuFlags::mask_bitops(res, false, flags.cf()))
}

/// Returns `(acc, mem, flags)`.
#[inline]
pub fn rrd(acc: u8, mem: u8, flags: CpuFlags) -> (u8, u8, CpuFlags) {
    let res = (acc & HALF8_MASK_HI) | (mem & HALF8_MASK_LO);
    let mem = (acc << 4) | (mem >> 4);
    (res, mem, CpuFlags::mask_bitops(res, false, flags.cf()))
}

/// Tests bit `n` of `val`. Bits 5 and 3 are copied from `xy`: the tested value for registers
/// or the high byte of the effective address for memory operands.
#[inline]
pub fn bit(n: u8, val: u8, xy: u8, flags: CpuFlags) -> CpuFlags {
    debug_assert!(n <= 7);
    let res = val & (1 << n);
    let zf = if res == 0 { CpuFlags::Z|CpuFlags::PV } else { CpuFlags::empty() };
    CpuFlags::mask_sign(res) | CpuFlags::mask_xy(xy) | CpuFlags::H | (flags & CpuFlags::C) | zf
}

#[inline]
pub fn res(n: u8, val: u8) -> u8 {
    val & !(1 << n)
}

#[inline]
pub fn set(n: u8, val: u8) -> u8 {
    val | 1 << n
}

/// `LD A,I` and `LD A,R`: `PV` reflects `IFF2`.
#[inline]
pub fn ld_a_ir(val: u8, iff2: bool, flags: CpuFlags) -> CpuFlags {
    CpuFlags::mask_sxy(val) | CpuFlags::mask_zero(val) | CpuFlags::mask_pvf(iff2) | (flags & CpuFlags::C)
}

/// `IN r,(C)`.
#[inline]
pub fn in_c(val: u8, flags: CpuFlags) -> CpuFlags {
    CpuFlags::mask_bitops(val, false, flags.cf())
}

/// `LDI` family. `bc` is the counter after decrementing.
#[inline]
pub fn ldx(acc: u8, val: u8, bc: u16, flags: CpuFlags) -> CpuFlags {
    let n = val.wrapping_add(acc);
    flags.with(CpuFlags::XY|CpuFlags::H|CpuFlags::PV|CpuFlags::N,
               CpuFlags::mask_block_op_xy(n) | CpuFlags::mask_pvf(bc != 0))
}

/// `CPI` family. `bc` is the counter after decrementing.
#[inline]
pub fn cpx(acc: u8, val: u8, bc: u16, flags: CpuFlags) -> CpuFlags {
    let res = acc.wrapping_sub(val);
    let bits = CpuFlags::mask_nh_sub(acc, val, false) |
               CpuFlags::mask_sign(res) |
               CpuFlags::mask_zero(res) |
               CpuFlags::mask_pvf(bc != 0);
    // A - (HL) - H
    let n = res.wrapping_sub(u8::from(bits.hf()));
    bits | CpuFlags::mask_block_op_xy(n) | (flags & CpuFlags::C)
}

/// `INI` and `OUTI` families. `b` is the counter after decrementing, `k` is the adjusted `C`
/// for input or `L` for output.
#[inline]
pub fn iox(io: u8, b: u8, k: u8) -> CpuFlags {
    let (sum, hcf) = io.overflowing_add(k);
    CpuFlags::mask_sxy(b) |
    CpuFlags::mask_zero(b) |
    CpuFlags::mask_nf(io & SIGN8 != 0) |
    CpuFlags::mask_hcf(hcf) |
    CpuFlags::parity(sum & 7 ^ b)
}
