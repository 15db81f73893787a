/*
    z80core: ZiLOG Z80 processor emulation engine.
    Copyright (C) 2019-2024  Rafal Michalski

    z80core is free software: you can redistribute it and/or modify it under
    the terms of the GNU Lesser General Public License (LGPL) as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    z80core is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Lesser General Public License for more details.

    You should have received a copy of the GNU Lesser General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.

    Author contact information: see Cargo.toml file, section [package.authors].
*/
/*! # Z80 core

`z80core` crate emulates the Zilog's Z80 processor at the instruction level, including the undocumented
flag bits, the undocumented instructions and the T-state timing of every instruction.

To build the crate with `no_std` support make sure to set `default-features` to `false` and select
the required features only.

```text
  _______
=|       |=
=|       |=        T-state budget
=|       |= <----- refilled by the driver
=|       |=
=|  Cpu  |=                    ___________
=|       |=                   |           |
=|  Z80  |= \                 |           |
=|       |= <--------------> =| Memory+Io |=:::::
=|       |= /                 |    Bus    |
=|       |=                   |___________|
=|       |=
=|_______|=
```

There are two important traits in this library:

* [Cpu] - an interface to the finite state machine that alters its state by executing the machine code
          instructions. [Z80] is its implementation.
* [Bus] - an interface to the host's memory and I/O devices that the [Cpu] is using to read from and write to.

The engine doesn't own any memory. The host implements [Bus] and attaches to it whatever side effects
its emulated computer requires. A flat 64KB RAM, [FlatMemory], is provided for convenience.

## Timing

The [Cpu] keeps a signed T-state budget. Every op-code fetch, memory and I/O access and every internal
operation decreases it by its documented cost. A driver sets the budget once per period with
[Cpu::set_tstate_budget] and calls [Cpu::execute_next_instruction] until the budget is exhausted,
or simply calls [Cpu::execute_with_budget]. Interrupts are requested between instructions with
[Cpu::interrupt] and [Cpu::non_maskable_interrupt].

## Disassembler support

[decode_at] decodes an instruction without altering any Cpu state. It shares the instruction tables
with the dispatcher, so both always agree on the instruction boundaries.

## Example

```
use z80core::*;
use opconsts::HALT_OPCODE;

const FIB_N: u8 = 24; // 1..=24

let mut memory = FlatMemory::with_program(&[
    0x21, 0x00, 0x00, // 0x0000 LD   HL, 0x0000
    0x11, 0x01, 0x00, // 0x0003 LD   DE, 0x0001
    0xEB,             // 0x0006 EX   DE, HL
    0x19,             // 0x0007 ADD  HL, DE
    0x10, 0xFC,       // 0x0008 DJNZ 0x0006
    HALT_OPCODE       // 0x000A HALT
]);
let mut cpu = Z80::new();
cpu.set_reg(Reg::B, FIB_N);
// Let's calculate a Fibbonacci number
while !cpu.is_halted() {
    cpu.execute_next_instruction(&mut memory)?;
}
// the content of the HL registers
assert_eq!(cpu.get_reg_pair(RegPair::HL), 46368); // Fib(24)
// the number of T-states spent
assert_eq!(-cpu.get_tstate_budget(), 10+10+(FIB_N as i32)*(4+11+13)-5+4);
# Ok::<(), CpuError>(())
```
*/
#![cfg_attr(not(feature = "std"), no_std)]

mod cpu;
mod error;
pub mod host;
pub mod z80;

pub use cpu::*;
pub use error::CpuError;
pub use host::{Bus, FlatMemory};
pub use z80::Z80;

/// An address of the NMI routine.
pub const NMI_RESTART: u16 = 0x66;
/// An address of the maskable interrupt routine in the interrupt modes 0 and 1.
pub const IRQ_RESTART: u16 = 0x38;

/// Selected Z80 opcodes.
pub mod opconsts {
    #[allow(unused_imports)]
    use crate::Prefix;
    /// Extended opcode prefix.
    pub const ED_PREFIX     : u8 = 0xED;
    /// Bit operations opcode prefix.
    pub const CB_PREFIX     : u8 = 0xCB;
    /// [Prefix::Xdd] prefix.
    pub const DD_PREFIX     : u8 = 0xDD;
    /// [Prefix::Yfd] prefix.
    pub const FD_PREFIX     : u8 = 0xFD;
    /// No operation.
    pub const NOP_OPCODE    : u8 = 0x00;
    /// Halt execution.
    pub const HALT_OPCODE   : u8 = 0x76;
    /// Disable interrupts.
    pub const DI_OPCODE     : u8 = 0xF3;
    /// Enable interrupts.
    pub const EI_OPCODE     : u8 = 0xFB;
    /// Return from subroutine.
    pub const RET_OPCODE    : u8 = 0xC9;
    /// The officially documented `RETI` opcode.
    pub const RETI_OPCODE_T2: (u8, u8) = (ED_PREFIX, 0x4D);
    /// The officially documented `RETN` opcode.
    pub const RETN_OPCODE_T2: (u8, u8) = (ED_PREFIX, 0x45);
    /// Call a subroutine.
    pub const CALL_OPCODE   : u8 = 0xCD;
    /// Branch to an absolute address.
    pub const JP_OPCODE     : u8 = 0xC3;
    /// Branch to a relative address.
    pub const JR_OPCODE     : u8 = 0x18;
    /// Call a system subroutine at `0x38`.
    pub const RST_38H_OPCODE: u8 = 0xFF;
    /// Base of the `RST p` opcode.
    ///
    /// Build instructions with: `RST_OPBASE|addr` where `addr` is one of:
    /// `0x00u8, 0x08, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38`.
    pub const RST_OPBASE    : u8 = 0b11_000_111;
    /// Decrement `B` and branch to a relative address unless `B=0`.
    pub const DJNZ_OPCODE   : u8 = 0x10;
}
