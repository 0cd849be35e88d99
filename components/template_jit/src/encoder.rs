//! x86-32 instruction encoding.
//!
//! Only the instructions the templates use are covered. Every emitter
//! returns the number of bytes it appended, or hands back a [`Relocation`] /
//! field position for jumps whose target is not known yet.

use crate::code_buffer::{CodeBuffer, Relocation};
use crate::registers::{Reg, BYTE_REGS};
use core_types::JitResult;

/// A memory operand `[base + index * scale + disp]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mem {
    /// Base register, absent for absolute addresses
    pub base: Option<Reg>,
    /// Index register and scale (1, 2, 4 or 8)
    pub index: Option<(Reg, u8)>,
    /// Displacement
    pub disp: i32,
}

impl Mem {
    /// `[base + disp]`
    pub fn base(base: Reg, disp: i32) -> Self {
        Self {
            base: Some(base),
            index: None,
            disp,
        }
    }

    /// `[ebp + disp]`, a frame slot.
    pub fn frame(disp: i32) -> Self {
        Self::base(Reg::Ebp, disp)
    }

    /// `[base + index * scale + disp]`
    pub fn indexed(base: Reg, index: Reg, scale: u8, disp: i32) -> Self {
        Self {
            base: Some(base),
            index: Some((index, scale)),
            disp,
        }
    }

    /// `[index * scale + disp]`
    pub fn scaled(index: Reg, scale: u8, disp: i32) -> Self {
        Self {
            base: None,
            index: Some((index, scale)),
            disp,
        }
    }

    /// `[disp]`, an absolute address.
    pub fn absolute(addr: i32) -> Self {
        Self {
            base: None,
            index: None,
            disp: addr,
        }
    }
}

/// A register or memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rm {
    /// Register direct
    Reg(Reg),
    /// Memory
    Mem(Mem),
}

impl From<Reg> for Rm {
    fn from(reg: Reg) -> Self {
        Rm::Reg(reg)
    }
}

impl From<Mem> for Rm {
    fn from(mem: Mem) -> Self {
        Rm::Mem(mem)
    }
}

/// Condition codes, numbered as in the `jcc` / `setcc` / `cmovcc` opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cond {
    /// Overflow
    O = 0,
    /// No overflow
    No,
    /// Below (unsigned <)
    B,
    /// Above or equal (unsigned >=)
    Ae,
    /// Equal
    E,
    /// Not equal
    Ne,
    /// Below or equal (unsigned <=)
    Be,
    /// Above (unsigned >)
    A,
    /// Sign
    S,
    /// No sign
    Ns,
    /// Parity (unordered after a float compare)
    P,
    /// No parity
    Np,
    /// Less (signed <)
    L,
    /// Greater or equal (signed >=)
    Ge,
    /// Less or equal (signed <=)
    Le,
    /// Greater (signed >)
    G,
}

impl Cond {
    /// The opposite condition.
    pub fn negate(self) -> Cond {
        Cond::from_code(self as u8 ^ 1)
    }

    /// Condition by its 4-bit code.
    pub fn from_code(code: u8) -> Cond {
        use Cond::*;
        const ALL: [Cond; 16] = [O, No, B, Ae, E, Ne, Be, A, S, Ns, P, Np, L, Ge, Le, G];
        ALL[(code & 0xf) as usize]
    }
}

/// Two-operand integer ALU operations (`/digit` of opcodes 0x81 / 0x83).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AluOp {
    /// `add`
    Add = 0,
    /// `or`
    Or = 1,
    /// `and`
    And = 4,
    /// `sub`
    Sub = 5,
    /// `xor`
    Xor = 6,
    /// `cmp`
    Cmp = 7,
}

/// Group-3 unary operations (`0xF7 /digit`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UnaryOp {
    /// Bitwise complement
    Not = 2,
    /// Two's complement negation
    Neg = 3,
    /// Unsigned `edx:eax = eax * rm`
    Mul = 4,
    /// Unsigned divide of `edx:eax`
    Div = 6,
    /// Signed divide of `edx:eax`
    Idiv = 7,
}

/// Shift operations (`0xD3 /digit`, `0xC1 /digit`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShiftOp {
    /// Shift left
    Shl = 4,
    /// Logical shift right
    Shr = 5,
    /// Arithmetic shift right
    Sar = 7,
}

/// SSE instructions of the form `op xmm/reg, xmm/reg/mem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SseOp {
    Movss,
    Movsd,
    Movups,
    Movaps,
    Addss,
    Addsd,
    Subss,
    Subsd,
    Mulss,
    Mulsd,
    Divss,
    Divsd,
    Ucomiss,
    Ucomisd,
    Comiss,
    Comisd,
    Cvtsi2sd,
    Cvtsi2ss,
    Cvttsd2si,
    Cvttss2si,
    Cvtss2sd,
    Cvtsd2ss,
    Cvtdq2pd,
    Cvtdq2ps,
    Cvttps2dq,
    Cvtps2pd,
    Cvtpd2ps,
    Xorps,
    Andps,
    Andnps,
    Orps,
    Addps,
    Addpd,
    Subps,
    Subpd,
    Mulps,
    Mulpd,
    Divps,
    Divpd,
    Minps,
    Minpd,
    Maxps,
    Maxpd,
    Sqrtps,
    Sqrtpd,
    Paddd,
    Psubd,
    Pmuludq,
    Pand,
    Por,
    Pxor,
    Pcmpeqd,
    Pcmpgtd,
    Punpckldq,
    Movhlps,
    Movhpd,
    Movlhps,
    Movd,
    Shufps,
    Shufpd,
    Pshufd,
    Cmpps,
    Cmppd,
}

impl SseOp {
    fn encoding(self) -> (Option<u8>, u8) {
        use SseOp::*;
        match self {
            Movss => (Some(0xf3), 0x10),
            Movsd => (Some(0xf2), 0x10),
            Movups => (None, 0x10),
            Movaps => (None, 0x28),
            Addss => (Some(0xf3), 0x58),
            Addsd => (Some(0xf2), 0x58),
            Subss => (Some(0xf3), 0x5c),
            Subsd => (Some(0xf2), 0x5c),
            Mulss => (Some(0xf3), 0x59),
            Mulsd => (Some(0xf2), 0x59),
            Divss => (Some(0xf3), 0x5e),
            Divsd => (Some(0xf2), 0x5e),
            Ucomiss => (None, 0x2e),
            Ucomisd => (Some(0x66), 0x2e),
            Comiss => (None, 0x2f),
            Comisd => (Some(0x66), 0x2f),
            Cvtsi2sd => (Some(0xf2), 0x2a),
            Cvtsi2ss => (Some(0xf3), 0x2a),
            Cvttsd2si => (Some(0xf2), 0x2c),
            Cvttss2si => (Some(0xf3), 0x2c),
            Cvtss2sd => (Some(0xf3), 0x5a),
            Cvtsd2ss => (Some(0xf2), 0x5a),
            Cvtdq2pd => (Some(0xf3), 0xe6),
            Cvtdq2ps => (None, 0x5b),
            Cvttps2dq => (Some(0xf3), 0x5b),
            Cvtps2pd => (None, 0x5a),
            Cvtpd2ps => (Some(0x66), 0x5a),
            Xorps => (None, 0x57),
            Andps => (None, 0x54),
            Andnps => (None, 0x55),
            Orps => (None, 0x56),
            Addps => (None, 0x58),
            Addpd => (Some(0x66), 0x58),
            Subps => (None, 0x5c),
            Subpd => (Some(0x66), 0x5c),
            Mulps => (None, 0x59),
            Mulpd => (Some(0x66), 0x59),
            Divps => (None, 0x5e),
            Divpd => (Some(0x66), 0x5e),
            Minps => (None, 0x5d),
            Minpd => (Some(0x66), 0x5d),
            Maxps => (None, 0x5f),
            Maxpd => (Some(0x66), 0x5f),
            Sqrtps => (None, 0x51),
            Sqrtpd => (Some(0x66), 0x51),
            Paddd => (Some(0x66), 0xfe),
            Psubd => (Some(0x66), 0xfa),
            Pmuludq => (Some(0x66), 0xf4),
            Pand => (Some(0x66), 0xdb),
            Por => (Some(0x66), 0xeb),
            Pxor => (Some(0x66), 0xef),
            Pcmpeqd => (Some(0x66), 0x76),
            Pcmpgtd => (Some(0x66), 0x66),
            Punpckldq => (Some(0x66), 0x62),
            Movhlps => (None, 0x12),
            Movhpd => (Some(0x66), 0x16),
            Movlhps => (None, 0x16),
            Movd => (Some(0x66), 0x6e),
            Shufps => (None, 0xc6),
            Shufpd => (Some(0x66), 0xc6),
            Pshufd => (Some(0x66), 0x70),
            Cmpps => (None, 0xc2),
            Cmppd => (Some(0x66), 0xc2),
        }
    }

    fn takes_imm8(self) -> bool {
        matches!(
            self,
            SseOp::Shufps | SseOp::Shufpd | SseOp::Pshufd | SseOp::Cmpps | SseOp::Cmppd
        )
    }
}

/// SSE stores of the form `op mem/reg, xmm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseStore {
    /// Store the low float
    Movss,
    /// Store the low double
    Movsd,
    /// Store all 128 bits, unaligned
    Movups,
    /// Move the low 32 bits into a general register or memory
    Movd,
}

impl SseStore {
    fn encoding(self) -> (Option<u8>, u8) {
        match self {
            SseStore::Movss => (Some(0xf3), 0x11),
            SseStore::Movsd => (Some(0xf2), 0x11),
            SseStore::Movups => (None, 0x11),
            SseStore::Movd => (Some(0x66), 0x7e),
        }
    }
}

fn fits_i8(value: i32) -> bool {
    i8::try_from(value).is_ok()
}

fn scale_bits(scale: u8) -> u8 {
    match scale {
        1 => 0,
        2 => 1,
        4 => 2,
        8 => 3,
        _ => panic!("invalid SIB scale {scale}"),
    }
}

/// Instruction emitter over a [`CodeBuffer`].
pub struct Encoder<'a> {
    buffer: &'a mut CodeBuffer,
}

impl<'a> Encoder<'a> {
    /// Emit into `buffer`.
    pub fn new(buffer: &'a mut CodeBuffer) -> Self {
        Self { buffer }
    }

    /// Current end of the emitted code.
    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    /// The underlying buffer, e.g. to resolve a relocation.
    pub fn buffer(&mut self) -> &mut CodeBuffer {
        self.buffer
    }

    fn measure(&mut self, emit: impl FnOnce(&mut Self) -> JitResult<()>) -> JitResult<usize> {
        let start = self.buffer.len();
        emit(self)?;
        Ok(self.buffer.len() - start)
    }

    fn modrm(&mut self, reg_field: u8, rm: Rm) -> JitResult<()> {
        let reg_field = (reg_field & 7) << 3;
        let mem = match rm {
            Rm::Reg(reg) => return self.buffer.emit_u8(0xc0 | reg_field | reg.encoding()),
            Rm::Mem(mem) => mem,
        };
        if let Some((index, _)) = mem.index {
            assert!(
                index != Reg::Esp && !index.is_xmm(),
                "{index} cannot be an index register"
            );
        }
        let Some(base) = mem.base else {
            match mem.index {
                None => self.buffer.emit_u8(reg_field | 0x05)?,
                Some((index, scale)) => {
                    self.buffer.emit_u8(reg_field | 0x04)?;
                    self.buffer
                        .emit_u8(scale_bits(scale) << 6 | index.encoding() << 3 | 0x05)?;
                }
            }
            return self.buffer.emit_u32(mem.disp as u32);
        };
        assert!(!base.is_xmm(), "{base} cannot be a base register");
        let (mode, disp_size) = if mem.disp == 0 && base != Reg::Ebp {
            (0x00, 0)
        } else if fits_i8(mem.disp) {
            (0x40, 1)
        } else {
            (0x80, 4)
        };
        match mem.index {
            None if base != Reg::Esp => self.buffer.emit_u8(mode | reg_field | base.encoding())?,
            index => {
                self.buffer.emit_u8(mode | reg_field | 0x04)?;
                let (index_bits, scale) = index.map_or((0x04, 1), |(index, scale)| (index.encoding(), scale));
                self.buffer
                    .emit_u8(scale_bits(scale) << 6 | index_bits << 3 | base.encoding())?;
            }
        }
        match disp_size {
            0 => Ok(()),
            1 => self.buffer.emit_u8(mem.disp as i8 as u8),
            _ => self.buffer.emit_u32(mem.disp as u32),
        }
    }

    fn general(reg: Reg) -> Reg {
        assert!(!reg.is_xmm(), "{reg} is not a general purpose register");
        reg
    }

    /// `mov dst, src`
    pub fn mov(&mut self, dst: Reg, src: impl Into<Rm>) -> JitResult<usize> {
        let src = src.into();
        self.measure(|e| {
            e.buffer.emit_u8(0x8b)?;
            e.modrm(Self::general(dst).encoding(), src)
        })
    }

    /// `mov [dst], src`
    pub fn mov_store(&mut self, dst: Mem, src: Reg) -> JitResult<usize> {
        self.measure(|e| {
            e.buffer.emit_u8(0x89)?;
            e.modrm(Self::general(src).encoding(), Rm::Mem(dst))
        })
    }

    /// `mov dst, imm32`
    pub fn mov_imm(&mut self, dst: Reg, imm: i32) -> JitResult<usize> {
        self.measure(|e| {
            e.buffer.emit_u8(0xb8 + Self::general(dst).encoding())?;
            e.buffer.emit_u32(imm as u32)
        })
    }

    /// `mov dword [dst], imm32`
    pub fn mov_mem_imm(&mut self, dst: Mem, imm: i32) -> JitResult<usize> {
        self.measure(|e| {
            e.buffer.emit_u8(0xc7)?;
            e.modrm(0, Rm::Mem(dst))?;
            e.buffer.emit_u32(imm as u32)
        })
    }

    /// `movsx`/`movzx dst, byte|word [src]`
    pub fn mov_extend(&mut self, dst: Reg, src: impl Into<Rm>, bits: u8, signed: bool) -> JitResult<usize> {
        let opcode = match (bits, signed) {
            (8, false) => 0xb6,
            (8, true) => 0xbe,
            (16, false) => 0xb7,
            (16, true) => 0xbf,
            _ => panic!("cannot extend from {bits} bits"),
        };
        let src = src.into();
        self.measure(|e| {
            e.buffer.emit_bytes(&[0x0f, opcode])?;
            e.modrm(Self::general(dst).encoding(), src)
        })
    }

    /// `mov byte|word [dst], src`
    pub fn mov_store_narrow(&mut self, dst: Mem, src: Reg, bits: u8) -> JitResult<usize> {
        self.measure(|e| match bits {
            8 => {
                assert!(BYTE_REGS.contains(src), "{src} has no low byte register");
                e.buffer.emit_u8(0x88)?;
                e.modrm(src.encoding(), Rm::Mem(dst))
            }
            16 => {
                e.buffer.emit_bytes(&[0x66, 0x89])?;
                e.modrm(Self::general(src).encoding(), Rm::Mem(dst))
            }
            _ => panic!("cannot store {bits} bits"),
        })
    }

    /// `op dst, src`
    pub fn alu(&mut self, op: AluOp, dst: Reg, src: impl Into<Rm>) -> JitResult<usize> {
        let src = src.into();
        self.measure(|e| {
            e.buffer.emit_u8((op as u8) << 3 | 0x03)?;
            e.modrm(Self::general(dst).encoding(), src)
        })
    }

    /// `op [dst], src`
    pub fn alu_store(&mut self, op: AluOp, dst: Mem, src: Reg) -> JitResult<usize> {
        self.measure(|e| {
            e.buffer.emit_u8((op as u8) << 3 | 0x01)?;
            e.modrm(Self::general(src).encoding(), Rm::Mem(dst))
        })
    }

    /// `op dst, imm`, using the sign-extended 8-bit form when it fits
    pub fn alu_imm(&mut self, op: AluOp, dst: impl Into<Rm>, imm: i32) -> JitResult<usize> {
        let dst = dst.into();
        self.measure(|e| {
            if fits_i8(imm) {
                e.buffer.emit_u8(0x83)?;
                e.modrm(op as u8, dst)?;
                e.buffer.emit_u8(imm as i8 as u8)
            } else {
                e.buffer.emit_u8(0x81)?;
                e.modrm(op as u8, dst)?;
                e.buffer.emit_u32(imm as u32)
            }
        })
    }

    /// `imul dst, src`
    pub fn imul(&mut self, dst: Reg, src: impl Into<Rm>) -> JitResult<usize> {
        let src = src.into();
        self.measure(|e| {
            e.buffer.emit_bytes(&[0x0f, 0xaf])?;
            e.modrm(Self::general(dst).encoding(), src)
        })
    }

    /// `not`/`neg`/`mul`/`div`/`idiv rm`
    pub fn unary(&mut self, op: UnaryOp, rm: impl Into<Rm>) -> JitResult<usize> {
        let rm = rm.into();
        self.measure(|e| {
            e.buffer.emit_u8(0xf7)?;
            e.modrm(op as u8, rm)
        })
    }

    /// `test rm, reg`
    pub fn test(&mut self, rm: impl Into<Rm>, reg: Reg) -> JitResult<usize> {
        let rm = rm.into();
        self.measure(|e| {
            e.buffer.emit_u8(0x85)?;
            e.modrm(Self::general(reg).encoding(), rm)
        })
    }

    /// `cdq`
    pub fn cdq(&mut self) -> JitResult<usize> {
        self.measure(|e| e.buffer.emit_u8(0x99))
    }

    /// `inc reg`
    pub fn inc(&mut self, reg: Reg) -> JitResult<usize> {
        self.measure(|e| e.buffer.emit_u8(0x40 + Self::general(reg).encoding()))
    }

    /// `inc dword [mem]`
    pub fn inc_mem(&mut self, mem: Mem) -> JitResult<usize> {
        self.measure(|e| {
            e.buffer.emit_u8(0xff)?;
            e.modrm(0, Rm::Mem(mem))
        })
    }

    /// `op rm, cl`
    pub fn shift_cl(&mut self, op: ShiftOp, rm: impl Into<Rm>) -> JitResult<usize> {
        let rm = rm.into();
        self.measure(|e| {
            e.buffer.emit_u8(0xd3)?;
            e.modrm(op as u8, rm)
        })
    }

    /// `op rm, imm8`
    pub fn shift_imm(&mut self, op: ShiftOp, rm: impl Into<Rm>, imm: u8) -> JitResult<usize> {
        let rm = rm.into();
        self.measure(|e| {
            e.buffer.emit_u8(0xc1)?;
            e.modrm(op as u8, rm)?;
            e.buffer.emit_u8(imm)
        })
    }

    /// `cmovcc dst, src`
    pub fn cmov(&mut self, cond: Cond, dst: Reg, src: impl Into<Rm>) -> JitResult<usize> {
        let src = src.into();
        self.measure(|e| {
            e.buffer.emit_bytes(&[0x0f, 0x40 | cond as u8])?;
            e.modrm(Self::general(dst).encoding(), src)
        })
    }

    /// `setcc reg8`
    pub fn setcc(&mut self, cond: Cond, reg: Reg) -> JitResult<usize> {
        assert!(BYTE_REGS.contains(reg), "{reg} has no low byte register");
        self.measure(|e| {
            e.buffer.emit_bytes(&[0x0f, 0x90 | cond as u8])?;
            e.modrm(0, Rm::Reg(reg))
        })
    }

    /// `bsr dst, src`
    pub fn bsr(&mut self, dst: Reg, src: impl Into<Rm>) -> JitResult<usize> {
        let src = src.into();
        self.measure(|e| {
            e.buffer.emit_bytes(&[0x0f, 0xbd])?;
            e.modrm(Self::general(dst).encoding(), src)
        })
    }

    /// `jcc rel8` with a fixed displacement.
    pub fn jcc_rel8(&mut self, cond: Cond, disp: i8) -> JitResult<usize> {
        self.measure(|e| e.buffer.emit_bytes(&[0x70 | cond as u8, disp as u8]))
    }

    /// `jcc rel8` to a later point of the same template.
    pub fn jcc_short(&mut self, cond: Cond) -> JitResult<Relocation> {
        self.buffer.emit_bytes(&[0x70 | cond as u8, 0])?;
        Ok(Relocation::after_jump(self.buffer))
    }

    /// `jmp rel8` to a later point of the same template.
    pub fn jmp_short(&mut self) -> JitResult<Relocation> {
        self.buffer.emit_bytes(&[0xeb, 0])?;
        Ok(Relocation::after_jump(self.buffer))
    }

    /// `jcc rel32`; returns the position of the displacement field.
    pub fn jcc_near(&mut self, cond: Cond) -> JitResult<usize> {
        self.buffer.emit_bytes(&[0x0f, 0x80 | cond as u8])?;
        let field = self.buffer.len();
        self.buffer.emit_u32(0)?;
        Ok(field)
    }

    /// `jmp rel32`; returns the position of the displacement field.
    pub fn jmp_near(&mut self) -> JitResult<usize> {
        self.buffer.emit_u8(0xe9)?;
        let field = self.buffer.len();
        self.buffer.emit_u32(0)?;
        Ok(field)
    }

    /// `push reg`
    pub fn push(&mut self, reg: Reg) -> JitResult<usize> {
        self.measure(|e| e.buffer.emit_u8(0x50 + Self::general(reg).encoding()))
    }

    /// `push imm`, using the 8-bit form when it fits
    pub fn push_imm(&mut self, imm: i32) -> JitResult<usize> {
        self.measure(|e| {
            if fits_i8(imm) {
                e.buffer.emit_bytes(&[0x6a, imm as i8 as u8])
            } else {
                e.buffer.emit_u8(0x68)?;
                e.buffer.emit_u32(imm as u32)
            }
        })
    }

    /// `push dword [mem]`
    pub fn push_mem(&mut self, mem: Mem) -> JitResult<usize> {
        self.measure(|e| {
            e.buffer.emit_u8(0xff)?;
            e.modrm(6, Rm::Mem(mem))
        })
    }

    /// `pop reg`
    pub fn pop(&mut self, reg: Reg) -> JitResult<usize> {
        self.measure(|e| e.buffer.emit_u8(0x58 + Self::general(reg).encoding()))
    }

    /// `call rm`
    pub fn call(&mut self, target: impl Into<Rm>) -> JitResult<usize> {
        let target = target.into();
        self.measure(|e| {
            e.buffer.emit_u8(0xff)?;
            e.modrm(2, target)
        })
    }

    /// `ret` or `ret imm16`
    pub fn ret(&mut self, pop_bytes: u16) -> JitResult<usize> {
        self.measure(|e| {
            if pop_bytes == 0 {
                e.buffer.emit_u8(0xc3)
            } else {
                e.buffer.emit_u8(0xc2)?;
                e.buffer.emit_u16(pop_bytes)
            }
        })
    }

    /// `lahf`
    pub fn lahf(&mut self) -> JitResult<usize> {
        self.measure(|e| e.buffer.emit_u8(0x9f))
    }

    /// `test ah, imm8`
    pub fn test_ah(&mut self, imm: u8) -> JitResult<usize> {
        // ah is encoded as register 4 in byte-sized operations
        self.measure(|e| e.buffer.emit_bytes(&[0xf6, 0xc4, imm]))
    }

    /// `op dst, src` for SSE operations
    pub fn sse(&mut self, op: SseOp, dst: Reg, src: impl Into<Rm>) -> JitResult<usize> {
        assert!(!op.takes_imm8(), "{op:?} needs an immediate");
        let src = src.into();
        self.measure(|e| e.sse_body(op, dst, src))
    }

    /// `op dst, src, imm8` for shuffles and packed compares
    pub fn sse_imm(&mut self, op: SseOp, dst: Reg, src: impl Into<Rm>, imm: u8) -> JitResult<usize> {
        assert!(op.takes_imm8(), "{op:?} takes no immediate");
        let src = src.into();
        self.measure(|e| {
            e.sse_body(op, dst, src)?;
            e.buffer.emit_u8(imm)
        })
    }

    fn sse_body(&mut self, op: SseOp, dst: Reg, src: Rm) -> JitResult<()> {
        let (prefix, opcode) = op.encoding();
        if let Some(prefix) = prefix {
            self.buffer.emit_u8(prefix)?;
        }
        self.buffer.emit_bytes(&[0x0f, opcode])?;
        self.modrm(dst.encoding(), src)
    }

    /// `op dst, src` for SSE stores
    pub fn sse_store(&mut self, op: SseStore, dst: impl Into<Rm>, src: Reg) -> JitResult<usize> {
        assert!(src.is_xmm(), "{src} is not an SSE register");
        let dst = dst.into();
        self.measure(|e| {
            let (prefix, opcode) = op.encoding();
            if let Some(prefix) = prefix {
                e.buffer.emit_u8(prefix)?;
            }
            e.buffer.emit_bytes(&[0x0f, opcode])?;
            e.modrm(src.encoding(), dst)
        })
    }

    /// `fstp qword [mem]`, popping a helper's x87 return value
    pub fn fstp_f64(&mut self, mem: Mem) -> JitResult<usize> {
        self.measure(|e| {
            e.buffer.emit_u8(0xdd)?;
            e.modrm(3, Rm::Mem(mem))
        })
    }

    /// `psrldq reg, imm8`
    pub fn psrldq(&mut self, reg: Reg, bytes: u8) -> JitResult<usize> {
        assert!(reg.is_xmm(), "{reg} is not an SSE register");
        self.measure(|e| {
            e.buffer.emit_bytes(&[0x66, 0x0f, 0x73])?;
            e.modrm(3, Rm::Reg(reg))?;
            e.buffer.emit_u8(bytes)
        })
    }
}
