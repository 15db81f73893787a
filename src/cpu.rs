/*
    z80core: ZiLOG Z80 processor emulation engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! # [Cpu] trait is defined here.
mod decode;
mod flags;
mod registers;

use crate::host::Bus;
use crate::CpuError;
pub use decode::*;
pub use flags::*;
pub use registers::*;

/// The Cpu trait provides means to execute machine code or change the state of `self` at User's will.
///
/// Registers are addressed by the stable index enums [Reg] and [RegPair], so that snapshot
/// loaders can restore the exact processor state byte by byte.
pub trait Cpu: Clone + Default + PartialEq + Eq {
    /// Resets the Cpu to its power-on state.
    ///
    /// `PC` is set to `0`, `SP` to `0xFFFF`, interrupts are disabled, the interrupt mode is set
    /// to `0`, `I` and `R` are cleared and the HALT state is abandoned. The remaining registers
    /// hold undefined values after power-on: with the `rand` and `std` features enabled they
    /// are randomized, otherwise they are left untouched.
    fn reset(&mut self);
    /// Returns the current value of the program counter.
    fn get_pc(&self) -> u16;
    /// Sets the current value of the program counter.
    fn set_pc(&mut self, pc: u16);
    /// Returns the current value of the stack pointer.
    fn get_sp(&self) -> u16;
    /// Sets the current value of the stack pointer.
    fn set_sp(&mut self, sp: u16);
    /// Returns the Accumulator value as an unsigned 8-bit integer.
    fn get_acc(&self) -> u8;
    /// Sets the Accumulator value from an unsigned 8-bit integer.
    fn set_acc(&mut self, val: u8);
    /// Returns the current state of the Flags register.
    fn get_flags(&self) -> CpuFlags;
    /// Sets the current state of the Flags register.
    fn set_flags(&mut self, flags: CpuFlags);
    /// Sets or clears all the Flags selected by `mask`.
    fn set_flag(&mut self, mask: CpuFlags, on: bool) {
        let flags = self.get_flags();
        self.set_flags(if on { flags | mask } else { flags - mask });
    }
    /// Returns `true` if any of the Flags selected by `mask` is set.
    fn test_flag(&self, mask: CpuFlags) -> bool {
        self.get_flags().intersects(mask)
    }
    /// Increases the memory refresh counter, preserving the bit 7 of `R`.
    fn inc_r(&mut self);
    /// Returns the current value of the memory refresh register `R`.
    fn get_r(&self) -> u8;
    /// Sets the memory refresh register `R` value, all 8 bits are stored.
    fn set_r(&mut self, r: u8);
    /// Returns the current value of the interrupt page `I` register.
    fn get_i(&self) -> u8;
    /// Sets the current value of the interrupt page `I` register.
    fn set_i(&mut self, i: u8);
    /// Returns values of interrupt flip-flops `(iff1, iff2)`.
    fn get_iffs(&self) -> (bool, bool);
    /// Sets the values of interrupt flip-flops.
    fn set_iffs(&mut self, iff1: bool, iff2: bool);
    /// Returns the current interrupt mode.
    fn get_im(&self) -> InterruptMode;
    /// Sets the interrupt mode.
    fn set_im(&mut self, im: InterruptMode);
    /// Enters or leaves the HALT state. This happens instantly and doesn't affect the T-state budget.
    fn set_halt_state(&mut self, halt: bool);
    /// Returns `true` if the [Cpu] is in the HALT state.
    fn is_halted(&self) -> bool;
    /// Returns the content of the selected 8-bit register.
    fn get_reg(&self, reg: Reg) -> u8;
    /// Sets the content of the selected 8-bit register.
    ///
    /// # Panics
    /// Writing [Reg::ImIff] with the interrupt mode bits set to `3` panics.
    fn set_reg(&mut self, reg: Reg, val: u8);
    /// Returns the content of the selected register pair.
    ///
    /// For `AF` and `AF'` the accumulator is the most significant byte.
    fn get_reg_pair(&self, pair: RegPair) -> u16 {
        let (hi, lo) = pair.halves();
        u16::from_le_bytes([self.get_reg(lo), self.get_reg(hi)])
    }
    /// Sets the content of the selected register pair.
    fn set_reg_pair(&mut self, pair: RegPair, val: u16) {
        let (hi, lo) = pair.halves();
        let [vlo, vhi] = val.to_le_bytes();
        self.set_reg(hi, vhi);
        self.set_reg(lo, vlo);
    }
    /// Returns the content of the 8-bit register with the numeric `index`.
    ///
    /// # Panics
    /// Panics if `index` is not a valid [Reg] index.
    fn get_reg_at(&self, index: u8) -> u8 {
        match Reg::try_from(index) {
            Ok(reg) => self.get_reg(reg),
            Err(err) => panic!("{}", err)
        }
    }
    /// Sets the content of the 8-bit register with the numeric `index`.
    ///
    /// # Panics
    /// Panics if `index` is not a valid [Reg] index.
    fn set_reg_at(&mut self, index: u8, val: u8) {
        match Reg::try_from(index) {
            Ok(reg) => self.set_reg(reg, val),
            Err(err) => panic!("{}", err)
        }
    }
    /// Returns the content of the register pair with the numeric `index`.
    ///
    /// # Panics
    /// Panics if `index` is not a valid [RegPair] index.
    fn get_reg_pair_at(&self, index: u8) -> u16 {
        match RegPair::try_from(index) {
            Ok(pair) => self.get_reg_pair(pair),
            Err(err) => panic!("{}", err)
        }
    }
    /// Sets the content of the register pair with the numeric `index`.
    ///
    /// # Panics
    /// Panics if `index` is not a valid [RegPair] index.
    fn set_reg_pair_at(&mut self, index: u8, val: u16) {
        match RegPair::try_from(index) {
            Ok(pair) => self.set_reg_pair(pair, val),
            Err(err) => panic!("{}", err)
        }
    }
    /// Sets the T-state budget.
    fn set_tstate_budget(&mut self, ts: i32);
    /// Returns the remaining T-state budget. Every bus cycle and internal operation decreases it.
    fn get_tstate_budget(&self) -> i32;
    /// Requests a maskable interrupt.
    ///
    /// Returns `true` if the interrupt was accepted, that is if `IFF1` was set. Otherwise
    /// the Cpu state is left untouched.
    fn interrupt<B: Bus + ?Sized>(&mut self, bus: &mut B) -> bool;
    /// Triggers a non-maskable interrupt. `IFF1` is cleared while `IFF2` is left unchanged,
    /// so `RETN` can restore `IFF1` from it. The execution continues at [NMI_RESTART][crate::NMI_RESTART].
    fn non_maskable_interrupt<B: Bus + ?Sized>(&mut self, bus: &mut B);
    /// Executes a single instruction, or a single HALT cycle if the Cpu is halted.
    ///
    /// Redundant `0xDD`/`0xFD` prefixes are executed together with the instruction that
    /// follows them.
    ///
    /// # Errors
    /// Returns [CpuError::PrefixRunaway] if the whole address space starting at `PC`
    /// contains only the index prefixes.
    fn execute_next_instruction<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<(), CpuError>;
    /// Executes instructions while the T-state budget remains positive.
    ///
    /// The last instruction may overdraw the budget, the excess is left as a negative value.
    fn execute_with_budget<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<(), CpuError> {
        while self.get_tstate_budget() > 0 {
            self.execute_next_instruction(bus)?;
        }
        Ok(())
    }
}
