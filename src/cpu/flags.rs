/*
    z80core: ZiLOG Z80 processor emulation engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Cpu flags register bits definitions and flag helper methods.
use bitflags::bitflags;

bitflags! {
    /// Z80 [Cpu](crate::Cpu) Flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CpuFlags: u8 {
        /// Sign Flag.
        const S  = 0b1000_0000;
        /// Zero Flag.
        const Z  = 0b0100_0000;
        /// Undocumented bit 5 of the Flag.
        const Y  = 0b0010_0000;
        /// Half Carry Flag.
        const H  = 0b0001_0000;
        /// Undocumented bit 3 of the Flag.
        const X  = 0b0000_1000;
        /// Parity/Overflow Flag.
        const PV = 0b0000_0100;
        /// Add/Subtract Flag.
        const N  = 0b0000_0010;
        /// Carry Flag.
        const C  = 0b0000_0001;
        /// An alias of [CpuFlags::PV].
        const P  = Self::PV.bits();
        /// An alias of [CpuFlags::PV].
        const V  = Self::PV.bits();
        /// A mask of both undocumented Flag's bits 3 and 5. [CpuFlags::X] | [CpuFlags::Y].
        const XY = Self::X.bits() | Self::Y.bits();
        /// A mask of [CpuFlags::S] | [CpuFlags::X] | [CpuFlags::Y].
        const SXY = Self::S.bits() | Self::XY.bits();
    }
}

const H4: u8 = CpuFlags::H.bits();
const HMASK4: u8 = H4 - 1;
const H12: u16 = (H4 as u16) << 8;
const HMASK12: u16 = H12 - 1;

impl CpuFlags {
    /// Returns a value of the Sign Flag.
    #[inline]
    pub fn sf(self) -> bool {
        self.contains(CpuFlags::S)
    }

    /// Returns a value of the Zero Flag.
    #[inline]
    pub fn zf(self) -> bool {
        self.contains(CpuFlags::Z)
    }

    /// Returns a value of the Half Carry Flag.
    #[inline]
    pub fn hf(self) -> bool {
        self.contains(CpuFlags::H)
    }

    /// Returns a value of the Parity/Overflow Flag.
    #[inline]
    pub fn pvf(self) -> bool {
        self.contains(CpuFlags::PV)
    }

    /// Returns a value of the Add/Subtract Flag.
    #[inline]
    pub fn nf(self) -> bool {
        self.contains(CpuFlags::N)
    }

    /// Returns a value of the Carry Flag.
    #[inline]
    pub fn cf(self) -> bool {
        self.contains(CpuFlags::C)
    }

    /// Returns `self` with the flags given in `mask` replaced by the flags in `bits`.
    #[inline]
    pub fn with(self, mask: CpuFlags, bits: CpuFlags) -> Self {
        (self - mask) | (bits & mask)
    }

    /// Returns [CpuFlags::C] | [CpuFlags::V] | [CpuFlags::Z] depending on the arguments.
    #[inline]
    pub fn mask_cvz(cf: bool, vf: bool, zf: bool) -> Self {
        Self::mask_carry(cf) | Self::mask_pvf(vf) | Self::from_bool(CpuFlags::Z, zf)
    }

    /// Returns the [S][CpuFlags::S] Flag if the top-most bit of `res` is set.
    #[inline]
    pub fn mask_sign(res: u8) -> Self {
        Self::from_bits_retain(res & CpuFlags::S.bits())
    }

    /// Returns the [Z][CpuFlags::Z] Flag if `res` is 0.
    #[inline]
    pub fn mask_zero(res: u8) -> Self {
        Self::from_bool(CpuFlags::Z, res == 0)
    }

    /// Returns the [C][CpuFlags::C] Flag if `cf` is `true`.
    #[inline]
    pub fn mask_carry(cf: bool) -> Self {
        Self::from_bool(CpuFlags::C, cf)
    }

    /// Returns the [N][CpuFlags::N] Flag if `nf` is `true`.
    #[inline]
    pub fn mask_nf(nf: bool) -> Self {
        Self::from_bool(CpuFlags::N, nf)
    }

    /// Returns the [H][CpuFlags::H] Flag if `hf` is `true`.
    #[inline]
    pub fn mask_hf(hf: bool) -> Self {
        Self::from_bool(CpuFlags::H, hf)
    }

    /// Returns [H][CpuFlags::H] | [C][CpuFlags::C] if `hcf` is `true`.
    #[inline]
    pub fn mask_hcf(hcf: bool) -> Self {
        Self::from_bool(CpuFlags::H|CpuFlags::C, hcf)
    }

    /// Returns the [PV][CpuFlags::PV] Flag if `pvf` is `true`.
    #[inline]
    pub fn mask_pvf(pvf: bool) -> Self {
        Self::from_bool(CpuFlags::PV, pvf)
    }

    /// Returns the [PV][CpuFlags::PV] Flag if the number of bits set in `res` is even.
    #[inline]
    pub fn parity(res: u8) -> Self {
        Self::mask_pvf(res.count_ones() & 1 == 0)
    }

    /// Returns [X][CpuFlags::X] | [Y][CpuFlags::Y] copied from bits 3 and 5 of `res`.
    #[inline]
    pub fn mask_xy(res: u8) -> Self {
        Self::from_bits_retain(res & CpuFlags::XY.bits())
    }

    /// Returns [S][CpuFlags::S] | [X][CpuFlags::X] | [Y][CpuFlags::Y] copied from bits 7, 3 and 5 of `res`.
    #[inline]
    pub fn mask_sxy(res: u8) -> Self {
        Self::from_bits_retain(res & CpuFlags::SXY.bits())
    }

    /// Flags of the logic and shift operations: `S`, `Z`, `X`, `Y` and parity from `res`
    /// with the given `H` and `C`.
    #[inline]
    pub(crate) fn mask_bitops(res: u8, hf: bool, cf: bool) -> Self {
        Self::mask_sxy(res) | Self::mask_zero(res) | Self::parity(res) |
        Self::mask_hf(hf) | Self::mask_carry(cf)
    }

    #[inline]
    pub(crate) fn mask_h_add(tgt: u8, add: u8, cf: bool) -> Self {
        let half = (tgt & HMASK4) + (add & HMASK4) + u8::from(cf);
        Self::mask_hf(half & H4 != 0)
    }

    #[inline]
    pub(crate) fn mask_h_add16(tgt: u16, add: u16, cf: bool) -> Self {
        let half = (tgt & HMASK12) + (add & HMASK12) + u16::from(cf);
        Self::mask_hf(half & H12 != 0)
    }

    #[inline]
    pub(crate) fn mask_nh_sub(tgt: u8, sub: u8, cf: bool) -> Self {
        let half = (tgt & HMASK4).wrapping_sub(sub & HMASK4).wrapping_sub(u8::from(cf));
        CpuFlags::N | Self::mask_hf(half & H4 != 0)
    }

    #[inline]
    pub(crate) fn mask_nh_sub16(tgt: u16, sub: u16, cf: bool) -> Self {
        let half = (tgt & HMASK12).wrapping_sub(sub & HMASK12).wrapping_sub(u16::from(cf));
        CpuFlags::N | Self::mask_hf(half & H12 != 0)
    }

    /// The block transfer and compare `X`, `Y` recipe: bit 3 of `n` to `X`, bit 1 of `n` to `Y`.
    #[inline]
    pub(crate) fn mask_block_op_xy(n: u8) -> Self {
        Self::from_bits_retain(n & CpuFlags::X.bits() | n << 4 & CpuFlags::Y.bits())
    }

    #[inline]
    fn from_bool(flag: CpuFlags, on: bool) -> Self {
        if on { flag } else { CpuFlags::empty() }
    }
}
