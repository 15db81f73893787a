/*
    z80core: ZiLOG Z80 processor emulation engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! This module defines the interface between a host and the [Cpu][crate::Cpu].
//!
//! The engine doesn't own any memory or devices. Every byte it reads or writes goes through the
//! [Bus] trait, which must be implemented by the host. The host is free to attach any side effects
//! to those accesses (screen memory, keyboard matrix, border color), the engine never interprets them.

/// T-state costs of the Cpu bus cycles.
pub mod cycles {
    /// An op-code fetch, NMI and HALT cycle T-states.
    pub const M1_CYCLE: i32 = 4;
    /// A memory read/write cycle T-states.
    pub const MEMRW_CYCLE: i32 = 3;
    /// A total number of T-states for an I/O cycle.
    pub const IO_CYCLE: i32 = 4;
    /// A maskable interrupt acknowledge cycle T-states.
    pub const IRQ_ACK_CYCLE: i32 = 6;
    /// T-states added by each repeating step of the block instructions.
    pub const BLOCK_REPEAT_CYCLE: i32 = 5;
}

/// The memory and I/O bus as seen by the Cpu.
///
/// All addresses are taken modulo 65536, there is no alignment requirement and every address
/// is readable and writable. The word accessors have default implementations composing two byte
/// accesses in the little-endian order.
pub trait Bus {
    /// Reads a byte from the memory at `addr`.
    fn read_byte(&mut self, addr: u16) -> u8;
    /// Writes a byte `val` to the memory at `addr`.
    fn write_byte(&mut self, addr: u16, val: u8);
    /// Reads a byte from the I/O `port`.
    ///
    /// The whole 16-bit address bus is being provided. The upper 8 bits are taken from either
    /// the accumulator or the `B` register, depending on the instruction.
    fn read_io(&mut self, port: u16) -> u8;
    /// Writes a byte `val` to the I/O `port`.
    fn write_io(&mut self, port: u16, val: u8);
    /// Reads a little-endian 16-bit word from the memory at `addr` and `addr + 1`.
    #[inline]
    fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.read_byte(addr);
        let hi = self.read_byte(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }
    /// Writes a little-endian 16-bit word to the memory at `addr` and `addr + 1`.
    #[inline]
    fn write_word(&mut self, addr: u16, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        self.write_byte(addr, lo);
        self.write_byte(addr.wrapping_add(1), hi);
    }
}

/// The size of the Cpu address space in bytes.
pub const MEMORY_SIZE: usize = 0x10000;

/// A flat 64KB RAM with an unconnected I/O space.
///
/// Reading from any I/O port yields `0xFF` and writes to ports are discarded.
#[derive(Clone, PartialEq, Eq)]
pub struct FlatMemory {
    mem: [u8; MEMORY_SIZE]
}

impl Default for FlatMemory {
    fn default() -> Self {
        FlatMemory { mem: [0; MEMORY_SIZE] }
    }
}

impl core::fmt::Debug for FlatMemory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlatMemory").finish_non_exhaustive()
    }
}

impl FlatMemory {
    /// Creates a new memory with the `program` loaded at address `0`.
    ///
    /// Bytes of `program` past the end of the address space are ignored.
    pub fn with_program(program: &[u8]) -> Self {
        let mut memory = FlatMemory::default();
        memory.load(0, program);
        memory
    }

    /// Copies `data` into the memory starting at `addr`, wrapping around the address space.
    pub fn load(&mut self, addr: u16, data: &[u8]) {
        for (offset, byte) in data.iter().take(MEMORY_SIZE).enumerate() {
            self.mem[usize::from(addr.wrapping_add(offset as u16))] = *byte;
        }
    }

    /// Returns the whole memory as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.mem
    }

    /// Returns the whole memory as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mem
    }
}

impl Bus for FlatMemory {
    #[inline]
    fn read_byte(&mut self, addr: u16) -> u8 {
        self.mem[usize::from(addr)]
    }
    #[inline]
    fn write_byte(&mut self, addr: u16, val: u8) {
        self.mem[usize::from(addr)] = val;
    }
    #[inline]
    fn read_io(&mut self, _port: u16) -> u8 {
        u8::MAX
    }
    #[inline]
    fn write_io(&mut self, _port: u16, _val: u8) {}
}
