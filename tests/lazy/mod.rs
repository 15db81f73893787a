//! A reference Z80 engine with deferred Flags evaluation.
//!
//! The engine decodes op-codes straight from their bit fields and, instead of the Flags register,
//! remembers the operands of the last arithmetic operation. The Flags are computed only when
//! an instruction or the state comparison needs them.
use std::collections::BTreeMap;
use z80core::{pack_im_iff, Bus, Cpu, InterruptMode, Z80};

const SF: u8 = 0x80;
const ZF: u8 = 0x40;
const YF: u8 = 0x20;
const HF: u8 = 0x10;
const XF: u8 = 0x08;
const PF: u8 = 0x04;
const NF: u8 = 0x02;
const CF: u8 = 0x01;
const XYF: u8 = XF|YF;

/// The value every I/O port reads.
pub fn port_value(port: u16) -> u8 {
    let [lo, hi] = port.to_le_bytes();
    lo.rotate_left(3) ^ hi ^ 0x96
}

/// 64KB of memory recording every write, and a log of the port writes.
#[derive(Clone, Debug)]
pub struct Machine {
    pub mem: Vec<u8>,
    pub outs: Vec<(u16, u8)>,
    writes: BTreeMap<u16, u8>,
}

impl Machine {
    pub fn new(mem: Vec<u8>) -> Self {
        assert_eq!(mem.len(), 0x10000);
        Machine { mem, outs: Vec::new(), writes: BTreeMap::new() }
    }

    /// The last value written to each address.
    pub fn writes(&self) -> &BTreeMap<u16, u8> {
        &self.writes
    }

    fn peek(&self, addr: u16) -> u8 {
        self.mem[usize::from(addr)]
    }

    fn poke(&mut self, addr: u16, val: u8) {
        self.mem[usize::from(addr)] = val;
        self.writes.insert(addr, val);
    }
}

impl Bus for Machine {
    fn read_byte(&mut self, addr: u16) -> u8 {
        self.peek(addr)
    }
    fn write_byte(&mut self, addr: u16, val: u8) {
        self.poke(addr, val)
    }
    fn read_io(&mut self, port: u16) -> u8 {
        port_value(port)
    }
    fn write_io(&mut self, port: u16, val: u8) {
        self.outs.push((port, val))
    }
}

fn szxy(v: u8) -> u8 {
    (v & (SF|XYF)) | if v == 0 { ZF } else { 0 }
}

fn parity(v: u8) -> u8 {
    if v.count_ones() & 1 == 0 { PF } else { 0 }
}

fn szxyp(v: u8) -> u8 {
    szxy(v) | parity(v)
}

fn overflow(bits: u8) -> u8 {
    if bits & 0x80 != 0 { PF } else { 0 }
}

/// The pending Flags.
#[derive(Clone, Copy, Debug)]
enum Flags {
    Ready(u8),
    Add { a: u8, b: u8, c: u8 },
    Sub { a: u8, b: u8, c: u8 },
    Cmp { a: u8, b: u8 },
    Logic { res: u8, half: bool },
    Inc { res: u8, carry: u8 },
    Dec { res: u8, carry: u8 },
}

impl Flags {
    fn eval(self) -> u8 {
        match self {
            Flags::Ready(f) => f,
            Flags::Add { a, b, c } => {
                let wide = u16::from(a) + u16::from(b) + u16::from(c);
                let r = wide as u8;
                szxy(r) | (a ^ b ^ r) & HF | overflow((a ^ r) & (b ^ r)) | (wide >> 8) as u8
            }
            Flags::Sub { a, b, c } => {
                let wide = u16::from(a).wrapping_sub(u16::from(b)).wrapping_sub(u16::from(c));
                let r = wide as u8;
                szxy(r) | (a ^ b ^ r) & HF | overflow((a ^ b) & (a ^ r)) | NF | (wide >> 8) as u8 & CF
            }
            Flags::Cmp { a, b } => {
                Flags::Sub { a, b, c: 0 }.eval() & !XYF | b & XYF
            }
            Flags::Logic { res, half } => szxyp(res) | if half { HF } else { 0 },
            Flags::Inc { res, carry } => {
                szxy(res) | if res & 0x0F == 0 { HF } else { 0 }
                          | if res == 0x80 { PF } else { 0 }
                          | carry
            }
            Flags::Dec { res, carry } => {
                szxy(res) | if res & 0x0F == 0x0F { HF } else { 0 }
                          | if res == 0x7F { PF } else { 0 }
                          | NF | carry
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Hl {
    Hl,
    Ix,
    Iy
}

/// The reference engine state.
#[derive(Clone, Debug)]
pub struct Lazy80 {
    /// `B C D E H L - A` indexed by the `r` field.
    main: [u8; 8],
    flags: Flags,
    /// `B' C' D' E' H' L' F' A'`.
    alt: [u8; 8],
    ix: u16,
    iy: u16,
    sp: u16,
    pc: u16,
    i: u8,
    r: u8,
    iff1: bool,
    iff2: bool,
    im: u8,
    halted: bool,
    ts: i32,
}

impl Lazy80 {
    /// Copies the state of `cpu`. The elapsed T-states start from 0.
    pub fn from_cpu(cpu: &Z80) -> Self {
        let reg = |index: u8| cpu.get_reg_at(index);
        let pair = |hi: u8| u16::from_le_bytes([reg(hi + 1), reg(hi)]);
        let mut main: [u8; 8] = core::array::from_fn(|n| reg(n as u8));
        main[6] = 0;
        let (iff1, iff2) = cpu.get_iffs();
        Lazy80 {
            main,
            flags: Flags::Ready(reg(6)),
            alt: core::array::from_fn(|n| reg(8 + n as u8)),
            ix: pair(16),
            iy: pair(18),
            sp: pair(20),
            pc: pair(22),
            i: reg(24),
            r: reg(25),
            iff1,
            iff2,
            im: cpu.get_im() as u8,
            halted: cpu.is_halted(),
            ts: 0,
        }
    }

    /// Returns the registers in the order of the stable register indices.
    pub fn registers(&self) -> [u8; 27] {
        let mut regs = [0u8; 27];
        regs[..8].copy_from_slice(&self.main);
        regs[6] = self.f();
        regs[8..16].copy_from_slice(&self.alt);
        for (n, pair) in [self.ix, self.iy, self.sp, self.pc].into_iter().enumerate() {
            let [lo, hi] = pair.to_le_bytes();
            regs[16 + 2*n] = hi;
            regs[17 + 2*n] = lo;
        }
        regs[24] = self.i;
        regs[25] = self.r;
        let im = match self.im {
            0 => InterruptMode::Mode0,
            1 => InterruptMode::Mode1,
            _ => InterruptMode::Mode2
        };
        regs[26] = pack_im_iff(self.iff1, self.iff2, im);
        regs
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// T-states elapsed since the state was copied.
    pub fn elapsed(&self) -> i32 {
        self.ts
    }

    /// Replaces the Flags, e.g. after an instruction leaving some bits undefined.
    pub fn sync_flags(&mut self, f: u8) {
        self.flags = Flags::Ready(f);
    }

    pub fn interrupt(&mut self, m: &mut Machine) -> bool {
        if !self.iff1 {
            return false
        }
        self.iff1 = false;
        self.iff2 = false;
        self.halted = false;
        self.bump_r();
        self.ts += 7;
        let pc = self.pc;
        self.push(m, pc);
        self.pc = if self.im == 2 {
            self.rd16(m, u16::from_le_bytes([0xFF, self.i]))
        }
        else {
            0x38
        };
        true
    }

    pub fn nmi(&mut self, m: &mut Machine) {
        self.iff1 = false;
        self.halted = false;
        self.bump_r();
        self.ts += 5;
        let pc = self.pc;
        self.push(m, pc);
        self.pc = 0x66;
    }

    /// Executes one instruction.
    pub fn step(&mut self, m: &mut Machine) {
        if self.halted {
            self.bump_r();
            self.ts += 4;
            return
        }
        let mut idx = Hl::Hl;
        let mut op = self.m1(m);
        while op == 0xDD || op == 0xFD {
            idx = if op == 0xDD { Hl::Ix } else { Hl::Iy };
            op = self.m1(m);
        }
        match op {
            0xCB if idx != Hl::Hl => {
                let d = self.imm8(m);
                let op = self.imm8(m);
                self.ts += 2;
                self.index_cb(m, idx, d, op);
            }
            0xCB => {
                let op = self.m1(m);
                self.cb(m, op);
            }
            0xED => {
                let op = self.m1(m);
                self.ed(m, op);
            }
            _ => self.main(m, op, idx)
        }
    }

    fn f(&self) -> u8 {
        self.flags.eval()
    }

    fn set_f(&mut self, f: u8) {
        self.flags = Flags::Ready(f);
    }

    fn carry(&self) -> u8 {
        self.f() & CF
    }

    fn a(&self) -> u8 {
        self.main[7]
    }

    fn bump_r(&mut self) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(1) & 0x7F);
    }

    fn m1(&mut self, m: &Machine) -> u8 {
        let op = m.peek(self.pc);
        self.pc = self.pc.wrapping_add(1);
        self.bump_r();
        self.ts += 4;
        op
    }

    fn imm8(&mut self, m: &Machine) -> u8 {
        let n = m.peek(self.pc);
        self.pc = self.pc.wrapping_add(1);
        self.ts += 3;
        n
    }

    fn imm16(&mut self, m: &Machine) -> u16 {
        let lo = self.imm8(m);
        let hi = self.imm8(m);
        u16::from_le_bytes([lo, hi])
    }

    fn rd(&mut self, m: &Machine, addr: u16) -> u8 {
        self.ts += 3;
        m.peek(addr)
    }

    fn wr(&mut self, m: &mut Machine, addr: u16, v: u8) {
        self.ts += 3;
        m.poke(addr, v);
    }

    fn rd16(&mut self, m: &Machine, addr: u16) -> u16 {
        let lo = self.rd(m, addr);
        let hi = self.rd(m, addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    fn wr16(&mut self, m: &mut Machine, addr: u16, v: u16) {
        let [lo, hi] = v.to_le_bytes();
        self.wr(m, addr, lo);
        self.wr(m, addr.wrapping_add(1), hi);
    }

    fn port_in(&mut self, port: u16) -> u8 {
        self.ts += 4;
        port_value(port)
    }

    fn port_out(&mut self, m: &mut Machine, port: u16, v: u8) {
        self.ts += 4;
        m.outs.push((port, v));
    }

    fn push(&mut self, m: &mut Machine, v: u16) {
        let [lo, hi] = v.to_le_bytes();
        self.sp = self.sp.wrapping_sub(1);
        self.wr(m, self.sp, hi);
        self.sp = self.sp.wrapping_sub(1);
        self.wr(m, self.sp, lo);
    }

    fn pop(&mut self, m: &Machine) -> u16 {
        let lo = self.rd(m, self.sp);
        self.sp = self.sp.wrapping_add(1);
        let hi = self.rd(m, self.sp);
        self.sp = self.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }

    fn pair(&self, hi: usize) -> u16 {
        u16::from_le_bytes([self.main[hi + 1], self.main[hi]])
    }

    fn set_pair(&mut self, hi: usize, v: u16) {
        let [lo, h] = v.to_le_bytes();
        self.main[hi] = h;
        self.main[hi + 1] = lo;
    }

    fn hl(&self, idx: Hl) -> u16 {
        match idx {
            Hl::Hl => self.pair(4),
            Hl::Ix => self.ix,
            Hl::Iy => self.iy,
        }
    }

    fn set_hl(&mut self, idx: Hl, v: u16) {
        match idx {
            Hl::Hl => self.set_pair(4, v),
            Hl::Ix => self.ix = v,
            Hl::Iy => self.iy = v,
        }
    }

    fn get8(&self, r: u8, idx: Hl) -> u8 {
        match (r, idx) {
            (4|5, Hl::Ix|Hl::Iy) => {
                let [lo, hi] = self.hl(idx).to_le_bytes();
                if r == 4 { hi } else { lo }
            }
            _ => self.main[usize::from(r)]
        }
    }

    fn set8(&mut self, r: u8, idx: Hl, v: u8) {
        match (r, idx) {
            (4|5, Hl::Ix|Hl::Iy) => {
                let [lo, hi] = self.hl(idx).to_le_bytes();
                let pair = if r == 4 { [lo, v] } else { [v, hi] };
                self.set_hl(idx, u16::from_le_bytes(pair));
            }
            _ => self.main[usize::from(r)] = v
        }
    }

    fn rp(&self, p: u8, idx: Hl) -> u16 {
        match p {
            0 => self.pair(0),
            1 => self.pair(2),
            2 => self.hl(idx),
            _ => self.sp
        }
    }

    fn set_rp(&mut self, p: u8, idx: Hl, v: u16) {
        match p {
            0 => self.set_pair(0, v),
            1 => self.set_pair(2, v),
            2 => self.set_hl(idx, v),
            _ => self.sp = v
        }
    }

    fn rp2(&self, p: u8, idx: Hl) -> u16 {
        match p {
            3 => u16::from_le_bytes([self.f(), self.a()]),
            _ => self.rp(p, idx)
        }
    }

    fn set_rp2(&mut self, p: u8, idx: Hl, v: u16) {
        match p {
            3 => {
                let [f, a] = v.to_le_bytes();
                self.main[7] = a;
                self.set_f(f);
            }
            _ => self.set_rp(p, idx, v)
        }
    }

    fn cond(&self, y: u8) -> bool {
        let mask = match y >> 1 {
            0 => ZF,
            1 => CF,
            2 => PF,
            _ => SF
        };
        (self.f() & mask != 0) == (y & 1 == 1)
    }

    fn jr(&mut self, d: u8) {
        self.pc = self.pc.wrapping_add(d as i8 as u16);
    }

    /// Returns `HL` or `IX+d`/`IY+d`, in the latter case fetching `d` and adding `extra` T-states.
    fn mem_operand(&mut self, m: &Machine, idx: Hl, extra: i32) -> u16 {
        if idx == Hl::Hl {
            return self.pair(4)
        }
        let d = self.imm8(m);
        self.ts += extra;
        self.hl(idx).wrapping_add(d as i8 as u16)
    }

    fn alu(&mut self, y: u8, v: u8) {
        let a = self.a();
        match y {
            0|1 => {
                let c = if y == 1 { self.carry() } else { 0 };
                self.main[7] = a.wrapping_add(v).wrapping_add(c);
                self.flags = Flags::Add { a, b: v, c };
            }
            2|3 => {
                let c = if y == 3 { self.carry() } else { 0 };
                self.main[7] = a.wrapping_sub(v).wrapping_sub(c);
                self.flags = Flags::Sub { a, b: v, c };
            }
            4 => {
                self.main[7] = a & v;
                self.flags = Flags::Logic { res: a & v, half: true };
            }
            5 => {
                self.main[7] = a ^ v;
                self.flags = Flags::Logic { res: a ^ v, half: false };
            }
            6 => {
                self.main[7] = a | v;
                self.flags = Flags::Logic { res: a | v, half: false };
            }
            _ => self.flags = Flags::Cmp { a, b: v }
        }
    }

    fn main(&mut self, m: &mut Machine, op: u8, idx: Hl) {
        let (x, y, z) = (op >> 6, (op >> 3) & 7, op & 7);
        let (p, q) = (y >> 1, y & 1);
        match (x, z) {
            (0, 0) => match y {
                0 => {}
                1 => {
                    let f = self.f();
                    core::mem::swap(&mut self.main[7], &mut self.alt[7]);
                    self.set_f(self.alt[6]);
                    self.alt[6] = f;
                }
                2 => {
                    self.ts += 1;
                    let d = self.imm8(m);
                    self.main[0] = self.main[0].wrapping_sub(1);
                    if self.main[0] != 0 {
                        self.ts += 5;
                        self.jr(d);
                    }
                }
                3 => {
                    let d = self.imm8(m);
                    self.ts += 5;
                    self.jr(d);
                }
                _ => {
                    let d = self.imm8(m);
                    if self.cond(y - 4) {
                        self.ts += 5;
                        self.jr(d);
                    }
                }
            },
            (0, 1) if q == 0 => {
                let nn = self.imm16(m);
                self.set_rp(p, idx, nn);
            }
            (0, 1) => {
                self.ts += 7;
                let hl = self.hl(idx);
                let v = self.rp(p, idx);
                let wide = u32::from(hl) + u32::from(v);
                let res = wide as u16;
                let f = self.f() & (SF|ZF|PF)
                      | (res >> 8) as u8 & XYF
                      | ((hl ^ v ^ res) >> 8) as u8 & HF
                      | (wide >> 16) as u8;
                self.set_hl(idx, res);
                self.set_f(f);
            }
            (0, 2) => match (q, p) {
                (0, 0) => self.wr(m, self.pair(0), self.a()),
                (0, 1) => self.wr(m, self.pair(2), self.a()),
                (0, 2) => {
                    let nn = self.imm16(m);
                    self.wr16(m, nn, self.hl(idx));
                }
                (0, _) => {
                    let nn = self.imm16(m);
                    self.wr(m, nn, self.a());
                }
                (_, 0) => self.main[7] = self.rd(m, self.pair(0)),
                (_, 1) => self.main[7] = self.rd(m, self.pair(2)),
                (_, 2) => {
                    let nn = self.imm16(m);
                    let v = self.rd16(m, nn);
                    self.set_hl(idx, v);
                }
                _ => {
                    let nn = self.imm16(m);
                    self.main[7] = self.rd(m, nn);
                }
            },
            (0, 3) => {
                self.ts += 2;
                let v = self.rp(p, idx);
                let v = if q == 0 { v.wrapping_add(1) } else { v.wrapping_sub(1) };
                self.set_rp(p, idx, v);
            }
            (0, 4|5) => {
                let carry = self.carry();
                let step = |v: u8| if z == 4 { v.wrapping_add(1) } else { v.wrapping_sub(1) };
                let res = if y == 6 {
                    let addr = self.mem_operand(m, idx, 5);
                    let v = self.rd(m, addr);
                    self.ts += 1;
                    self.wr(m, addr, step(v));
                    step(v)
                }
                else {
                    let res = step(self.get8(y, idx));
                    self.set8(y, idx, res);
                    res
                };
                self.flags = if z == 4 { Flags::Inc { res, carry } } else { Flags::Dec { res, carry } };
            }
            (0, 6) if y == 6 => {
                let addr = self.mem_operand(m, idx, 2);
                let n = self.imm8(m);
                self.wr(m, addr, n);
            }
            (0, 6) => {
                let n = self.imm8(m);
                self.set8(y, idx, n);
            }
            (0, _) => self.acc_misc(y),
            (1, 6) if y == 6 => self.halted = true,
            (1, 6) => {
                let addr = self.mem_operand(m, idx, 5);
                self.main[usize::from(y)] = self.rd(m, addr);
            }
            (1, _) if y == 6 => {
                let addr = self.mem_operand(m, idx, 5);
                self.wr(m, addr, self.main[usize::from(z)]);
            }
            (1, _) => {
                let v = self.get8(z, idx);
                self.set8(y, idx, v);
            }
            (2, _) => {
                let v = if z == 6 {
                    let addr = self.mem_operand(m, idx, 5);
                    self.rd(m, addr)
                }
                else {
                    self.get8(z, idx)
                };
                self.alu(y, v);
            }
            (_, 0) => {
                self.ts += 1;
                if self.cond(y) {
                    self.pc = self.pop(m);
                }
            }
            (_, 1) if q == 0 => {
                let v = self.pop(m);
                self.set_rp2(p, idx, v);
            }
            (_, 1) => match p {
                0 => self.pc = self.pop(m),
                1 => {
                    for n in 0..6 {
                        core::mem::swap(&mut self.main[n], &mut self.alt[n]);
                    }
                }
                2 => self.pc = self.hl(idx),
                _ => {
                    self.ts += 2;
                    self.sp = self.hl(idx);
                }
            },
            (_, 2) => {
                let nn = self.imm16(m);
                if self.cond(y) {
                    self.pc = nn;
                }
            }
            (_, 3) => match y {
                0 => self.pc = self.imm16(m),
                2 => {
                    let n = self.imm8(m);
                    let a = self.a();
                    self.port_out(m, u16::from_le_bytes([n, a]), a);
                }
                3 => {
                    let n = self.imm8(m);
                    self.main[7] = self.port_in(u16::from_le_bytes([n, self.a()]));
                }
                4 => {
                    let sp = self.sp;
                    let v = self.rd16(m, sp);
                    self.ts += 1;
                    self.wr16(m, sp, self.hl(idx));
                    self.ts += 2;
                    self.set_hl(idx, v);
                }
                5 => {
                    let (de, hl) = (self.pair(2), self.pair(4));
                    self.set_pair(2, hl);
                    self.set_pair(4, de);
                }
                6 => {
                    self.iff1 = false;
                    self.iff2 = false;
                }
                7 => {
                    self.iff1 = true;
                    self.iff2 = true;
                }
                _ => unreachable!("0xCB is dispatched by the caller")
            },
            (_, 4) => {
                let nn = self.imm16(m);
                if self.cond(y) {
                    self.ts += 1;
                    let pc = self.pc;
                    self.push(m, pc);
                    self.pc = nn;
                }
            }
            (_, 5) if q == 0 => {
                self.ts += 1;
                let v = self.rp2(p, idx);
                self.push(m, v);
            }
            (_, 5) if p == 0 => {
                let nn = self.imm16(m);
                self.ts += 1;
                let pc = self.pc;
                self.push(m, pc);
                self.pc = nn;
            }
            (_, 5) => unreachable!("prefixes are dispatched by the caller"),
            (_, 6) => {
                let n = self.imm8(m);
                self.alu(y, n);
            }
            _ => {
                self.ts += 1;
                let pc = self.pc;
                self.push(m, pc);
                self.pc = u16::from(y) * 8;
            }
        }
    }

    fn acc_misc(&mut self, y: u8) {
        let a = self.a();
        let f = self.f();
        let keep = f & (SF|ZF|PF);
        match y {
            0 => {
                let r = a.rotate_left(1);
                self.main[7] = r;
                self.set_f(keep | r & XYF | r & CF);
            }
            1 => {
                let r = a.rotate_right(1);
                self.main[7] = r;
                self.set_f(keep | r & XYF | a & CF);
            }
            2 => {
                let r = a << 1 | f & CF;
                self.main[7] = r;
                self.set_f(keep | r & XYF | a >> 7);
            }
            3 => {
                let r = a >> 1 | (f & CF) << 7;
                self.main[7] = r;
                self.set_f(keep | r & XYF | a & CF);
            }
            4 => {
                let mut corr = 0u8;
                let mut carry = f & CF;
                if f & HF != 0 || a & 0x0F > 9 {
                    corr |= 0x06;
                }
                if carry != 0 || a > 0x99 {
                    corr |= 0x60;
                    carry = CF;
                }
                let r = if f & NF != 0 { a.wrapping_sub(corr) } else { a.wrapping_add(corr) };
                self.main[7] = r;
                self.set_f(szxyp(r) | (a ^ r) & HF | f & NF | carry);
            }
            5 => {
                let r = !a;
                self.main[7] = r;
                self.set_f(f & (SF|ZF|PF|CF) | HF | NF | r & XYF);
            }
            6 => self.set_f(keep | a & XYF | CF),
            _ => self.set_f(keep | a & XYF | (f & CF) << 4 | (f & CF) ^ CF),
        }
    }

    fn bitop(&mut self, x: u8, y: u8, v: u8) -> u8 {
        match x {
            0 => {
                let c = self.carry();
                let (r, out) = match y {
                    0 => (v.rotate_left(1), v >> 7),
                    1 => (v.rotate_right(1), v & 1),
                    2 => (v << 1 | c, v >> 7),
                    3 => (v >> 1 | c << 7, v & 1),
                    4 => (v << 1, v >> 7),
                    5 => ((v as i8 >> 1) as u8, v & 1),
                    6 => (v << 1 | 1, v >> 7),
                    _ => (v >> 1, v & 1),
                };
                self.set_f(szxyp(r) | out);
                r
            }
            2 => v & !(1 << y),
            _ => v | 1 << y
        }
    }

    fn bit(&mut self, n: u8, v: u8, xy: u8) {
        let t = v & (1 << n);
        let zp = if t == 0 { ZF|PF } else { 0 };
        let c = self.carry();
        self.set_f(t & SF | zp | HF | xy & XYF | c);
    }

    fn cb(&mut self, m: &mut Machine, op: u8) {
        let (x, y, z) = (op >> 6, (op >> 3) & 7, op & 7);
        if z == 6 {
            let hl = self.pair(4);
            let v = self.rd(m, hl);
            self.ts += 1;
            if x == 1 {
                self.bit(y, v, hl.to_le_bytes()[1]);
            }
            else {
                let r = self.bitop(x, y, v);
                self.wr(m, hl, r);
            }
        }
        else {
            let v = self.main[usize::from(z)];
            if x == 1 {
                self.bit(y, v, v & (1 << y));
            }
            else {
                self.main[usize::from(z)] = self.bitop(x, y, v);
            }
        }
    }

    fn index_cb(&mut self, m: &mut Machine, idx: Hl, d: u8, op: u8) {
        let (x, y, z) = (op >> 6, (op >> 3) & 7, op & 7);
        let addr = self.hl(idx).wrapping_add(d as i8 as u16);
        let v = self.rd(m, addr);
        self.ts += 1;
        if x == 1 {
            self.bit(y, v, addr.to_le_bytes()[1]);
            return
        }
        let r = self.bitop(x, y, v);
        self.wr(m, addr, r);
        if z != 6 {
            self.main[usize::from(z)] = r;
        }
    }

    fn ed(&mut self, m: &mut Machine, op: u8) {
        let (x, y, z) = (op >> 6, (op >> 3) & 7, op & 7);
        let (p, q) = (y >> 1, y & 1);
        match (x, z) {
            (1, 0) => {
                let v = self.port_in(self.pair(0));
                if y != 6 {
                    self.main[usize::from(y)] = v;
                }
                let c = self.carry();
                self.set_f(szxyp(v) | c);
            }
            (1, 1) => {
                let v = if y == 6 { 0 } else { self.main[usize::from(y)] };
                self.port_out(m, self.pair(0), v);
            }
            (1, 2) => {
                self.ts += 7;
                let hl = self.pair(4);
                let v = self.rp(p, Hl::Hl);
                let c = u32::from(self.carry());
                let (wide, ovf, nf) = if q == 0 {
                    let wide = u32::from(hl).wrapping_sub(u32::from(v)).wrapping_sub(c);
                    (wide, (hl ^ v) & (hl ^ wide as u16), NF)
                }
                else {
                    let wide = u32::from(hl) + u32::from(v) + c;
                    (wide, (hl ^ wide as u16) & (v ^ wide as u16), 0)
                };
                let res = wide as u16;
                let [_, hi] = res.to_le_bytes();
                let f = hi & (SF|XYF)
                      | if res == 0 { ZF } else { 0 }
                      | ((hl ^ v ^ res) >> 8) as u8 & HF
                      | overflow((ovf >> 8) as u8)
                      | nf
                      | (wide >> 16) as u8 & CF;
                self.set_pair(4, res);
                self.set_f(f);
            }
            (1, 3) => {
                let nn = self.imm16(m);
                if q == 0 {
                    self.wr16(m, nn, self.rp(p, Hl::Hl));
                }
                else {
                    let v = self.rd16(m, nn);
                    self.set_rp(p, Hl::Hl, v);
                }
            }
            (1, 4) => {
                let a = self.a();
                self.main[7] = 0u8.wrapping_sub(a);
                self.flags = Flags::Sub { a: 0, b: a, c: 0 };
            }
            (1, 5) => {
                if y != 1 {
                    self.iff1 = self.iff2;
                }
                self.pc = self.pop(m);
            }
            (1, 6) => {
                self.im = match y & 3 {
                    0|1 => 0,
                    2 => 1,
                    _ => 2
                };
            }
            (1, _) => match y {
                0 => {
                    self.ts += 1;
                    self.i = self.a();
                }
                1 => {
                    self.ts += 1;
                    self.r = self.a();
                }
                2|3 => {
                    self.ts += 1;
                    let v = if y == 2 { self.i } else { self.r };
                    let c = self.carry();
                    self.main[7] = v;
                    self.set_f(szxy(v) | if self.iff2 { PF } else { 0 } | c);
                }
                4|5 => {
                    let hl = self.pair(4);
                    let v = self.rd(m, hl);
                    self.ts += 4;
                    let a = self.a();
                    let (acc, mem) = if y == 4 {
                        (a & 0xF0 | v & 0x0F, a << 4 | v >> 4)
                    }
                    else {
                        (a & 0xF0 | v >> 4, v << 4 | a & 0x0F)
                    };
                    self.wr(m, hl, mem);
                    let c = self.carry();
                    self.main[7] = acc;
                    self.set_f(szxyp(acc) | c);
                }
                _ => {}
            },
            (2, 0..=3) if y >= 4 => self.block(m, y, z),
            _ => {}
        }
    }

    fn block(&mut self, m: &mut Machine, y: u8, z: u8) {
        let dec = y & 1 == 1;
        let repeat = y >= 6;
        let step = |v: u16| if dec { v.wrapping_sub(1) } else { v.wrapping_add(1) };
        let hl = self.pair(4);
        let again = match z {
            0 => {
                let v = self.rd(m, hl);
                let de = self.pair(2);
                self.wr(m, de, v);
                self.ts += 2;
                self.set_pair(4, step(hl));
                self.set_pair(2, step(de));
                let bc = self.pair(0).wrapping_sub(1);
                self.set_pair(0, bc);
                let n = v.wrapping_add(self.a());
                let f = self.f() & (SF|ZF|CF)
                      | (n & 0x02) << 4
                      | n & XF
                      | if bc != 0 { PF } else { 0 };
                self.set_f(f);
                bc != 0
            }
            1 => {
                let v = self.rd(m, hl);
                self.ts += 5;
                let a = self.a();
                let res = a.wrapping_sub(v);
                self.set_pair(4, step(hl));
                let bc = self.pair(0).wrapping_sub(1);
                self.set_pair(0, bc);
                let half = (a ^ v ^ res) & HF;
                let n = res.wrapping_sub(half >> 4);
                let f = res & SF
                      | if res == 0 { ZF } else { 0 }
                      | half
                      | NF
                      | if bc != 0 { PF } else { 0 }
                      | (n & 0x02) << 4
                      | n & XF
                      | self.carry();
                self.set_f(f);
                bc != 0 && res != 0
            }
            2 => {
                self.ts += 1;
                let v = self.port_in(self.pair(0));
                self.wr(m, hl, v);
                self.set_pair(4, step(hl));
                let b = self.main[0].wrapping_sub(1);
                self.main[0] = b;
                // H, PV, N and C are not modelled
                self.set_f(szxy(b));
                b != 0
            }
            _ => {
                self.ts += 1;
                let v = self.rd(m, hl);
                let b = self.main[0].wrapping_sub(1);
                self.main[0] = b;
                self.port_out(m, self.pair(0), v);
                self.set_pair(4, step(hl));
                self.set_f(szxy(b));
                b != 0
            }
        };
        if repeat && again {
            self.ts += 5;
            self.pc = self.pc.wrapping_sub(2);
        }
    }
}
