/*
    z80core: ZiLOG Z80 processor emulation engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! This module contains cpu registers related building blocks and the stable register index scheme.
use core::convert::TryFrom;
#[cfg(feature = "serde")] use core::fmt;
#[cfg(feature = "serde")] use serde::{Serialize, Deserialize, Serializer, de::{
                                            self, Deserializer, Visitor, SeqAccess}};
use crate::CpuError;

/// The interrupt mode enum.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[repr(u8)]
pub enum InterruptMode {
    #[default]
    Mode0 = 0,
    Mode1 = 1,
    Mode2 = 2,
}

impl TryFrom<u8> for InterruptMode {
    type Error = CpuError;

    #[inline]
    fn try_from(im: u8) -> Result<Self, Self::Error> {
        match im {
            0 => Ok(InterruptMode::Mode0),
            1 => Ok(InterruptMode::Mode1),
            2 => Ok(InterruptMode::Mode2),
            _ => Err(CpuError::InvalidInterruptMode(im))
        }
    }
}

/// A register pair that can be treated as a single 16-bit register or as separate 8-bit
/// (MSB/LSB) registers.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, Debug)]
pub struct RegisterPair([u8;2]);

/// A block of BC, DE and HL registers.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Debug)]
pub(crate) struct GeneralRegisters {
    pub(crate) bc: RegisterPair,
    pub(crate) de: RegisterPair,
    pub(crate) hl: RegisterPair
}

/// A block of IX and IY registers.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Debug)]
pub(crate) struct IndexRegisters {
    pub(crate) ix: RegisterPair,
    pub(crate) iy: RegisterPair
}

impl RegisterPair {
    #[inline]
    pub fn get16(self) -> u16 {
        u16::from_le_bytes(self.0)
    }

    #[inline]
    pub fn set16(&mut self, val: u16) {
        self.0 = val.to_le_bytes();
    }

    #[inline]
    pub fn get8hi(self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn get8lo(self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn set8hi(&mut self, val: u8) {
        self.0[1] = val;
    }

    #[inline]
    pub fn set8lo(&mut self, val: u8) {
        self.0[0] = val;
    }

    /// Returns `(hi, lo)`.
    #[inline]
    pub fn get(self) -> (u8, u8) {
        let [lo, hi] = self.0;
        (hi, lo)
    }

    #[inline]
    pub fn set(&mut self, hi: u8, lo: u8) {
        self.0 = [lo, hi];
    }

    #[inline]
    pub fn inc16(&mut self) {
        self.set16(self.get16().wrapping_add(1));
    }

    #[inline]
    pub fn dec16(&mut self) {
        self.set16(self.get16().wrapping_sub(1));
    }

    /// Subtracts 1 from the 16-bit register and returns true if the result is 0.
    #[inline]
    pub fn dec16_is_zero(&mut self) -> bool {
        self.dec16();
        self.get16() == 0
    }
}

impl From<u16> for RegisterPair {
    fn from(uint: u16) -> Self {
        RegisterPair(uint.to_le_bytes())
    }
}

impl From<[u8;2]> for RegisterPair {
    fn from(pair: [u8;2]) -> Self {
        RegisterPair(pair)
    }
}

impl From<RegisterPair> for u16 {
    fn from(pair: RegisterPair) -> Self {
        pair.get16()
    }
}

macro_rules! index_enum_try_from {
    ($(#[$meta:meta])* $name:ident, $error:ident { $($(#[$vmeta:meta])* $var:ident = $val:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* $var = $val),*
        }

        impl $name {
            /// All variants in the index order.
            pub const ALL: &'static [$name] = &[$($name::$var),*];
        }

        impl TryFrom<u8> for $name {
            type Error = CpuError;

            #[inline]
            fn try_from(index: u8) -> Result<Self, Self::Error> {
                match index {
                    $($val => Ok($name::$var),)*
                    _ => Err(CpuError::$error(index))
                }
            }
        }

        impl From<$name> for u8 {
            #[inline]
            fn from(reg: $name) -> u8 {
                reg as u8
            }
        }
    };
}

index_enum_try_from! {
    /// The stable index of an 8-bit register.
    ///
    /// External snapshot loaders restore the processor state by writing these exact indices,
    /// so the numbering must never change.
    Reg, InvalidRegIndex {
        B = 0, C = 1, D = 2, E = 3, H = 4, L = 5, F = 6, A = 7,
        /// `B'`
        AltB = 8, AltC = 9, AltD = 10, AltE = 11, AltH = 12, AltL = 13, AltF = 14, AltA = 15,
        /// `IXh`
        XH = 16,
        /// `IXl`
        XL = 17,
        /// `IYh`
        YH = 18,
        /// `IYl`
        YL = 19,
        SPH = 20, SPL = 21, PCH = 22, PCL = 23,
        /// The interrupt page register.
        I = 24,
        /// The memory refresh register.
        R = 25,
        /// The packed interrupt state, see [pack_im_iff].
        ImIff = 26,
    }
}

index_enum_try_from! {
    /// The stable index of a 16-bit register pair.
    ///
    /// The pair of index `n` is composed of the 8-bit registers of [Reg] indices `2n` (MSB) and
    /// `2n + 1` (LSB), except `AF` and `AF'` which are composed of the accumulator (MSB) and
    /// the flags (LSB).
    RegPair, InvalidPairIndex {
        BC = 0, DE = 1, HL = 2, AF = 3,
        AltBC = 4, AltDE = 5, AltHL = 6, AltAF = 7,
        IX = 8, IY = 9, SP = 10, PC = 11,
    }
}

impl RegPair {
    /// Returns the `(MSB, LSB)` 8-bit registers the pair is composed of.
    pub fn halves(self) -> (Reg, Reg) {
        match self {
            RegPair::BC => (Reg::B, Reg::C),
            RegPair::DE => (Reg::D, Reg::E),
            RegPair::HL => (Reg::H, Reg::L),
            RegPair::AF => (Reg::A, Reg::F),
            RegPair::AltBC => (Reg::AltB, Reg::AltC),
            RegPair::AltDE => (Reg::AltD, Reg::AltE),
            RegPair::AltHL => (Reg::AltH, Reg::AltL),
            RegPair::AltAF => (Reg::AltA, Reg::AltF),
            RegPair::IX => (Reg::XH, Reg::XL),
            RegPair::IY => (Reg::YH, Reg::YL),
            RegPair::SP => (Reg::SPH, Reg::SPL),
            RegPair::PC => (Reg::PCH, Reg::PCL),
        }
    }
}

const IFF1_BIT: u8 = 0b0000_0001;
const IFF2_BIT: u8 = 0b0000_0010;
const IM_SHIFT: u32 = 2;
const IM_MASK: u8 = 0b0000_1100;

/// Packs the interrupt state into a single byte: `IFF1` in bit 0, `IFF2` in bit 1
/// and the interrupt mode in bits 2-3.
#[inline]
pub fn pack_im_iff(iff1: bool, iff2: bool, im: InterruptMode) -> u8 {
    (im as u8) << IM_SHIFT | if iff2 { IFF2_BIT } else { 0 } | if iff1 { IFF1_BIT } else { 0 }
}

/// Unpacks `(iff1, iff2, im)` from a byte created by [pack_im_iff].
///
/// Bits 4 to 7 are ignored. Returns an error if the interrupt mode bits hold the value 3.
#[inline]
pub fn unpack_im_iff(packed: u8) -> Result<(bool, bool, InterruptMode), CpuError> {
    let im = InterruptMode::try_from((packed & IM_MASK) >> IM_SHIFT)?;
    Ok((packed & IFF1_BIT != 0, packed & IFF2_BIT != 0, im))
}

#[cfg(feature = "serde")]
impl Serialize for RegisterPair {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where S: Serializer
    {
        serializer.serialize_u16(self.get16())
    }
}

#[cfg(feature = "serde")]
struct RegisterPairVisitor;

#[cfg(feature = "serde")]
impl<'de> Visitor<'de> for RegisterPairVisitor {
    type Value = RegisterPair;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an unsigned 16-bit integer, a tuple of 8-bit integers or a hex string")
    }

    fn visit_u16<E: de::Error>(self, value: u16) -> Result<Self::Value, E> {
        Ok(RegisterPair::from(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        u16::try_from(value).map(RegisterPair::from)
                            .map_err(|_| E::invalid_value(de::Unexpected::Signed(value), &self))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        u16::try_from(value).map(RegisterPair::from)
                            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(value), &self))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where A: SeqAccess<'de>
    {
        if let Some(lo) = seq.next_element::<u8>()? {
            if let Some(hi) = seq.next_element::<u8>()? {
                if seq.next_element::<u8>()?.is_none() {
                    return Ok(RegisterPair::from([lo, hi]))
                }
            }
        }
        Err(de::Error::custom("RegisterPair expects a tuple of two 8-bit integers"))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
        let body = s.strip_prefix('$')
                    .or_else(|| s.strip_prefix("0x"))
                    .unwrap_or(s);
        u16::from_str_radix(body, 16).map(RegisterPair::from)
                                     .map_err(|_| E::invalid_value(de::Unexpected::Str(s), &self))
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for RegisterPair {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where D: Deserializer<'de>
    {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(RegisterPairVisitor)
        }
        else {
            deserializer.deserialize_u16(RegisterPairVisitor)
        }
    }
}
