/*
    z80core: ZiLOG Z80 processor emulation engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! The instruction dispatcher of [Z80].
use log::{error, warn};
#[cfg(debug_assertions)] use log::{trace, log_enabled, Level};
use crate::host::{Bus, MEMORY_SIZE, cycles::*};
use super::internal::cycles::*;
use super::*;

#[cfg_attr(not(debug_assertions), allow(unused_variables))]
#[inline(always)]
fn trace_instruction(pc: u16, prefix: Option<Prefix>, instr: Instruction) {
    #[cfg(debug_assertions)]
    {
        if log_enabled!(Level::Trace) {
            match prefix {
                Some(pfx) => trace!("{:04x}: {} {:?}", pc, pfx, instr),
                None => trace!("{:04x}: {:?}", pc, instr)
            }
        }
    }
}

impl Z80 {
    /// Fetches, decodes and executes the next instruction.
    pub(super) fn step<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<(), CpuError> {
        if self.halt {
            self.inc_r();
            self.charge(M1_CYCLE);
            return Ok(())
        }
        let pc = self.pc.get16();
        let mut prefix = None;
        let mut run: usize = 0;
        let mut code = self.fetch_opcode(bus);
        while let Some(pfx) = Prefix::from_code(code) {
            run += 1;
            if run >= MEMORY_SIZE {
                error!("no opcode follows the index prefixes at {:04x}", pc);
                return Err(CpuError::PrefixRunaway { pc })
            }
            prefix = Some(pfx);
            code = self.fetch_opcode(bus);
        }
        match Instruction::main(code) {
            Instruction::PrefixCb => match prefix {
                None => {
                    let instr = Instruction::cb(self.fetch_opcode(bus));
                    trace_instruction(pc, None, instr);
                    self.execute(bus, None, instr);
                }
                Some(pfx) => {
                    let d = self.fetch_byte(bus);
                    // the op-code following the displacement is not an M1 cycle
                    let instr = Instruction::cb(self.fetch_byte(bus));
                    self.charge(NO_MREQ_X2);
                    trace_instruction(pc, prefix, instr);
                    self.execute_index_cb(bus, pfx, d, instr);
                }
            }
            Instruction::PrefixEd => {
                let code = self.fetch_opcode(bus);
                let instr = Instruction::ed(code);
                if instr == Instruction::EdNop {
                    warn!("undefined opcode ED {:02X} at {:04x}", code, pc);
                }
                trace_instruction(pc, None, instr);
                self.execute(bus, None, instr);
            }
            instr => {
                trace_instruction(pc, prefix, instr);
                self.execute(bus, prefix, instr);
            }
        }
        Ok(())
    }

    #[inline]
    fn alu<B: Bus + ?Sized>(&mut self, bus: &mut B, op: Ops8, arg: Option<Arg8>, prefix: Option<Prefix>) {
        let val = match arg {
            Some(arg) => self.read_arg8(bus, arg, prefix),
            None => self.fetch_byte(bus)
        };
        let (acc, flags) = ops::alu8(op, self.acc(), val, self.flags());
        self.set_acc_flags(acc, flags);
    }

    #[inline]
    fn acc_op(&mut self, op: fn(u8, CpuFlags) -> (u8, CpuFlags)) {
        let (acc, flags) = op(self.acc(), self.flags());
        self.set_acc_flags(acc, flags);
    }

    #[inline]
    fn call<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u16) {
        self.charge(NO_MREQ_X1);
        self.push16(bus, self.pc.get16());
        self.pc.set16(addr);
    }

    #[inline]
    fn ret<B: Bus + ?Sized>(&mut self, bus: &mut B) {
        let addr = self.pop16(bus);
        self.pc.set16(addr);
    }

    /// Executes an instruction of the main, `0xCB` or `0xED` page after its op-code has been fetched.
    ///
    /// `prefix` is the index mode of the main page instructions. The `0xCB` and `0xED` page
    /// instructions are always executed with `prefix` set to `None`.
    fn execute<B: Bus + ?Sized>(&mut self, bus: &mut B, prefix: Option<Prefix>, instr: Instruction) {
        use Instruction::*;
        match instr {
            Nop => {}
            ExAfAf => self.ex_af_af(),
            Djnz => {
                self.charge(NO_MREQ_X1);
                let d = self.fetch_byte(bus);
                let b = self.regs.bc.get8hi().wrapping_sub(1);
                self.regs.bc.set8hi(b);
                if b != 0 {
                    self.charge(NO_MREQ_X5);
                    self.jump_relative(d);
                }
            }
            Jr => {
                let d = self.fetch_byte(bus);
                self.charge(NO_MREQ_X5);
                self.jump_relative(d);
            }
            JrCc(cc) => {
                let d = self.fetch_byte(bus);
                if cc.is_satisfied(self.flags()) {
                    self.charge(NO_MREQ_X5);
                    self.jump_relative(d);
                }
            }
            LdRpImm(rp) => {
                let nn = self.fetch_word(bus);
                self.set_reg16(rp, prefix, nn);
            }
            AddHlRp(rp) => {
                self.charge(NO_MREQ_X7);
                let hl = self.hl_ref(prefix).get16();
                let (res, flags) = ops::add16(hl, self.get_reg16(rp, prefix), self.flags());
                self.hl_mut(prefix).set16(res);
                self.set_flags(flags);
            }
            LdIndA(rp) => {
                let addr = self.get_reg16(rp, None);
                self.write_mem(bus, addr, self.acc());
            }
            LdAInd(rp) => {
                let addr = self.get_reg16(rp, None);
                let val = self.read_mem(bus, addr);
                self.af.set8hi(val);
            }
            LdMemHl => {
                let nn = self.fetch_word(bus);
                let val = self.hl_ref(prefix).get16();
                self.write_mem16(bus, nn, val);
            }
            LdHlMem => {
                let nn = self.fetch_word(bus);
                let val = self.read_mem16(bus, nn);
                self.hl_mut(prefix).set16(val);
            }
            LdMemA => {
                let nn = self.fetch_word(bus);
                self.write_mem(bus, nn, self.acc());
            }
            LdAMem => {
                let nn = self.fetch_word(bus);
                let val = self.read_mem(bus, nn);
                self.af.set8hi(val);
            }
            IncRp(rp) => {
                self.charge(NO_MREQ_X2);
                let val = self.get_reg16(rp, prefix).wrapping_add(1);
                self.set_reg16(rp, prefix, val);
            }
            DecRp(rp) => {
                self.charge(NO_MREQ_X2);
                let val = self.get_reg16(rp, prefix).wrapping_sub(1);
                self.set_reg16(rp, prefix, val);
            }
            Inc8(arg) => self.modify_arg8(bus, arg, prefix, ops::inc),
            Dec8(arg) => self.modify_arg8(bus, arg, prefix, ops::dec),
            Ld8Imm(Arg8::Reg(reg)) => {
                let n = self.fetch_byte(bus);
                self.set_reg8(reg, prefix, n);
            }
            Ld8Imm(Arg8::MemHl) => {
                let addr = self.mem_operand_addr(bus, prefix, NO_MREQ_X2);
                let n = self.fetch_byte(bus);
                self.write_mem(bus, addr, n);
            }
            Rlca => self.acc_op(ops::rlca),
            Rrca => self.acc_op(ops::rrca),
            Rla  => self.acc_op(ops::rla),
            Rra  => self.acc_op(ops::rra),
            Daa  => self.acc_op(ops::daa),
            Cpl  => self.acc_op(ops::cpl),
            Scf  => self.set_flags(ops::scf(self.acc(), self.flags())),
            Ccf  => self.set_flags(ops::ccf(self.acc(), self.flags())),
            Halt => self.halt = true,
            // with a memory operand H and L are never the index register halves
            Ld8(Arg8::Reg(dst), Arg8::MemHl) => {
                let val = self.read_arg8(bus, Arg8::MemHl, prefix);
                self.set_reg8(dst, None, val);
            }
            Ld8(Arg8::MemHl, Arg8::Reg(src)) => {
                let addr = self.mem_operand_addr(bus, prefix, NO_MREQ_X5);
                self.write_mem(bus, addr, self.get_reg8(src, None));
            }
            Ld8(Arg8::Reg(dst), Arg8::Reg(src)) => {
                let val = self.get_reg8(src, prefix);
                self.set_reg8(dst, prefix, val);
            }
            Ld8(Arg8::MemHl, Arg8::MemHl) => unreachable!("0x76 is HALT"),
            Alu(op, arg) => self.alu(bus, op, Some(arg), prefix),
            AluImm(op) => self.alu(bus, op, None, prefix),
            RetCc(cc) => {
                self.charge(NO_MREQ_X1);
                if cc.is_satisfied(self.flags()) {
                    self.ret(bus);
                }
            }
            Pop(rp) => {
                let val = self.pop16(bus);
                self.set_stk_reg16(rp, prefix, val);
            }
            Ret => self.ret(bus),
            Exx => self.exx(),
            JpHl => self.pc.set16(self.hl_ref(prefix).get16()),
            LdSpHl => {
                self.charge(NO_MREQ_X2);
                self.sp.set16(self.hl_ref(prefix).get16());
            }
            JpCc(cc) => {
                let nn = self.fetch_word(bus);
                if cc.is_satisfied(self.flags()) {
                    self.pc.set16(nn);
                }
            }
            Jp => {
                let nn = self.fetch_word(bus);
                self.pc.set16(nn);
            }
            CallCc(cc) => {
                let nn = self.fetch_word(bus);
                if cc.is_satisfied(self.flags()) {
                    self.call(bus, nn);
                }
            }
            Call => {
                let nn = self.fetch_word(bus);
                self.call(bus, nn);
            }
            Push(rp) => {
                self.charge(NO_MREQ_X1);
                let val = self.get_stk_reg16(rp, prefix);
                self.push16(bus, val);
            }
            Rst(addr) => self.call(bus, u16::from(addr)),
            OutImmA => {
                let n = self.fetch_byte(bus);
                let acc = self.acc();
                self.write_io(bus, u16::from_le_bytes([n, acc]), acc);
            }
            InAImm => {
                let n = self.fetch_byte(bus);
                let val = self.read_io(bus, u16::from_le_bytes([n, self.acc()]));
                self.af.set8hi(val);
            }
            ExSpHl => {
                let sp = self.sp.get16();
                let val = self.read_mem16(bus, sp);
                self.charge(NO_MREQ_X1);
                let hl = self.hl_ref(prefix).get16();
                self.write_mem16(bus, sp, hl);
                self.charge(NO_MREQ_X2);
                self.hl_mut(prefix).set16(val);
            }
            ExDeHl => swap(&mut self.regs.de, &mut self.regs.hl),
            Di => self.set_iffs(false, false),
            Ei => self.set_iffs(true, true),
            PrefixCb|PrefixEd|PrefixDd|PrefixFd => unreachable!("prefixes are resolved by the dispatcher"),
            // 0xCB page
            Rot(op, arg) => self.modify_arg8(bus, arg, None, |val, flags| ops::rot(op, val, flags)),
            Bit(n, Arg8::Reg(reg)) => {
                let val = self.get_reg8(reg, None);
                self.set_flags(ops::bit(n, val, val & (1 << n), self.flags()));
            }
            Bit(n, Arg8::MemHl) => {
                let addr = self.regs.hl.get16();
                let val = self.read_mem(bus, addr);
                self.charge(NO_MREQ_X1);
                self.set_flags(ops::bit(n, val, addr.to_le_bytes()[1], self.flags()));
            }
            Res(n, arg) => self.modify_arg8(bus, arg, None, |val, flags| (ops::res(n, val), flags)),
            Set(n, arg) => self.modify_arg8(bus, arg, None, |val, flags| (ops::set(n, val), flags)),
            // 0xED page
            InC(reg) => {
                let val = self.read_io(bus, self.regs.bc.get16());
                if let Some(reg) = reg {
                    self.set_reg8(reg, None, val);
                }
                self.set_flags(ops::in_c(val, self.flags()));
            }
            OutC(reg) => {
                let val = reg.map_or(0, |reg| self.get_reg8(reg, None));
                self.write_io(bus, self.regs.bc.get16(), val);
            }
            SbcHlRp(rp) => {
                self.charge(NO_MREQ_X7);
                let (res, flags) = ops::sbc16(self.regs.hl.get16(), self.get_reg16(rp, None), self.flags());
                self.regs.hl.set16(res);
                self.set_flags(flags);
            }
            AdcHlRp(rp) => {
                self.charge(NO_MREQ_X7);
                let (res, flags) = ops::adc16(self.regs.hl.get16(), self.get_reg16(rp, None), self.flags());
                self.regs.hl.set16(res);
                self.set_flags(flags);
            }
            LdMemRp(rp) => {
                let nn = self.fetch_word(bus);
                let val = self.get_reg16(rp, None);
                self.write_mem16(bus, nn, val);
            }
            LdRpMem(rp) => {
                let nn = self.fetch_word(bus);
                let val = self.read_mem16(bus, nn);
                self.set_reg16(rp, None, val);
            }
            Neg => {
                let (acc, flags) = ops::neg(self.acc());
                self.set_acc_flags(acc, flags);
            }
            Retn => {
                self.iff1 = self.iff2;
                self.ret(bus);
            }
            Reti => self.ret(bus),
            Im(mode) => self.im = mode,
            LdIA => {
                self.charge(NO_MREQ_X1);
                self.i = self.acc();
            }
            LdRA => {
                self.charge(NO_MREQ_X1);
                self.r = self.acc();
            }
            LdAI => {
                self.charge(NO_MREQ_X1);
                let flags = ops::ld_a_ir(self.i, self.iff2, self.flags());
                self.set_acc_flags(self.i, flags);
            }
            LdAR => {
                self.charge(NO_MREQ_X1);
                let flags = ops::ld_a_ir(self.r, self.iff2, self.flags());
                self.set_acc_flags(self.r, flags);
            }
            Rrd => {
                let hl = self.regs.hl.get16();
                let mem = self.read_mem(bus, hl);
                self.charge(NO_MREQ_X4);
                let (acc, mem, flags) = ops::rrd(self.acc(), mem, self.flags());
                self.write_mem(bus, hl, mem);
                self.set_acc_flags(acc, flags);
            }
            Rld => {
                let hl = self.regs.hl.get16();
                let mem = self.read_mem(bus, hl);
                self.charge(NO_MREQ_X4);
                let (acc, mem, flags) = ops::rld(self.acc(), mem, self.flags());
                self.write_mem(bus, hl, mem);
                self.set_acc_flags(acc, flags);
            }
            Block(op) => self.block(bus, op),
            EdNop => {}
        }
    }

    /// Executes `DDCB d op` or `FDCB d op`.
    fn execute_index_cb<B: Bus + ?Sized>(&mut self, bus: &mut B, prefix: Prefix, d: u8, instr: Instruction) {
        let addr = self.hl_ref(Some(prefix)).get16().wrapping_add(d as i8 as i16 as u16);
        let val = self.read_mem(bus, addr);
        self.charge(NO_MREQ_X1);
        let flags = self.flags();
        let (res, flags, arg) = match instr {
            Instruction::Bit(n, _) => {
                self.set_flags(ops::bit(n, val, addr.to_le_bytes()[1], flags));
                return
            }
            Instruction::Rot(op, arg) => {
                let (res, flags) = ops::rot(op, val, flags);
                (res, flags, arg)
            }
            Instruction::Res(n, arg) => (ops::res(n, val), flags, arg),
            Instruction::Set(n, arg) => (ops::set(n, val), flags, arg),
            _ => unreachable!("the 0xCB page has only bit instructions")
        };
        self.write_mem(bus, addr, res);
        // the result is also copied to a register unless the register field is 6
        if let Arg8::Reg(reg) = arg {
            self.set_reg8(reg, None, res);
        }
        self.set_flags(flags);
    }

    fn block<B: Bus + ?Sized>(&mut self, bus: &mut B, BlockOp { kind, delta, repeat }: BlockOp) {
        let hl = self.regs.hl.get16();
        let flags = self.flags();
        let (flags, again) = match kind {
            BlockKind::Ld => {
                let val = self.read_mem(bus, hl);
                let de = self.regs.de.get16();
                self.write_mem(bus, de, val);
                self.charge(NO_MREQ_X2);
                self.regs.hl.set16(delta.apply(hl));
                self.regs.de.set16(delta.apply(de));
                let again = !self.regs.bc.dec16_is_zero();
                (ops::ldx(self.acc(), val, self.regs.bc.get16(), flags), again)
            }
            BlockKind::Cp => {
                let val = self.read_mem(bus, hl);
                self.charge(NO_MREQ_X5);
                self.regs.hl.set16(delta.apply(hl));
                let again = !self.regs.bc.dec16_is_zero();
                let flags = ops::cpx(self.acc(), val, self.regs.bc.get16(), flags);
                (flags, again && !flags.zf())
            }
            BlockKind::In => {
                self.charge(NO_MREQ_X1);
                let val = self.read_io(bus, self.regs.bc.get16());
                self.write_mem(bus, hl, val);
                self.regs.hl.set16(delta.apply(hl));
                let b = self.regs.bc.get8hi().wrapping_sub(1);
                self.regs.bc.set8hi(b);
                let k = delta.apply(u16::from(self.regs.bc.get8lo())) as u8;
                (ops::iox(val, b, k), b != 0)
            }
            BlockKind::Out => {
                self.charge(NO_MREQ_X1);
                let val = self.read_mem(bus, hl);
                let b = self.regs.bc.get8hi().wrapping_sub(1);
                self.regs.bc.set8hi(b);
                self.write_io(bus, self.regs.bc.get16(), val);
                let hl = delta.apply(hl);
                self.regs.hl.set16(hl);
                (ops::iox(val, b, hl as u8), b != 0)
            }
        };
        self.set_flags(flags);
        if repeat && again {
            self.charge(BLOCK_REPEAT_CYCLE);
            self.pc.set16(self.pc.get16().wrapping_sub(2));
        }
    }
}
