/*
    z80core: ZiLOG Z80 processor emulation engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Errors reported by the engine.
use core::fmt;

/// The error type returned by the [Cpu][crate::Cpu] operations and index conversions.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CpuError {
    /// The whole address space has been scanned starting at `pc` and only `0xDD`/`0xFD`
    /// prefixes were found, so no instruction could be decoded.
    PrefixRunaway {
        /// The program counter at which the prefix run started.
        pc: u16
    },
    /// A numeric 8-bit register index out of the stable index range.
    InvalidRegIndex(u8),
    /// A numeric register pair index out of the stable index range.
    InvalidPairIndex(u8),
    /// An interrupt mode other than 0, 1 or 2.
    InvalidInterruptMode(u8),
}

impl fmt::Display for CpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuError::PrefixRunaway { pc } => {
                write!(f, "no opcode follows the index prefixes starting at {:#06x}", pc)
            }
            CpuError::InvalidRegIndex(index) => write!(f, "invalid register index: {}", index),
            CpuError::InvalidPairIndex(index) => write!(f, "invalid register pair index: {}", index),
            CpuError::InvalidInterruptMode(im) => write!(f, "invalid interrupt mode: {}", im),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CpuError {}
