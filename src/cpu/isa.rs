//! Reti instruction sets.
//!
//! Two variants share one set of operation families:
//! - Minimal ("Technische Informatik"): ACC, IN1, IN2, PC. Stores
//!   implicitly write the accumulator, no multiply/divide/modulo.
//! - Extended ("Betriebssysteme"): adds SP, BAF, DS, CS, explicit store
//!   sources, register-indirect LOADIN/STOREIN and MUL/DIV/MOD.
//!
//! Each variant is an opcode table mapping a mnemonic to an [`OpKind`]
//! and the argument kinds it expects. The parser resolves the arguments
//! and [`OpKind::bind`] turns them into a typed [`Op`].

use crate::cpu::registers::Register;
use serde::{Serialize, Deserialize};
use std::fmt;

/// Kind of a single instruction argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgKind {
    /// A register name.
    Register,
    /// A signed decimal immediate.
    Integer,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgKind::Register => f.write_str("register"),
            ArgKind::Integer => f.write_str("integer"),
        }
    }
}

/// A resolved instruction argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argument {
    Register(Register),
    Immediate(i64),
}

/// How a load/store computes its memory address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Addressing {
    /// `M[i]`
    Direct,
    /// `M[reg + i]`
    Indexed(Register),
}

impl Addressing {
    fn describe(self, offset: i64) -> String {
        match self {
            Addressing::Direct => format!("M[{}]", offset),
            Addressing::Indexed(reg) => format!("M[{} + {}]", reg, offset),
        }
    }
}

/// Arithmetic and bitwise functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluFunc {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Xor,
    And,
    Or,
}

impl AluFunc {
    pub const fn verb(self) -> &'static str {
        match self {
            AluFunc::Add => "addition",
            AluFunc::Sub => "subtraction",
            AluFunc::Mul => "multiplication",
            AluFunc::Div => "division",
            AluFunc::Mod => "modulo",
            AluFunc::Xor => "XOR",
            AluFunc::And => "AND",
            AluFunc::Or => "OR",
        }
    }
}

/// Second operand of an arithmetic instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// `M[i]`
    Memory(i64),
    /// `i`
    Immediate(i64),
    /// another register
    Register(Register),
}

/// Which form of an arithmetic opcode a table entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Form {
    Memory,
    Immediate,
    Register,
}

/// Jump condition, always tested against ACC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Always,
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
}

impl Condition {
    pub fn holds(self, acc: i64) -> bool {
        match self {
            Condition::Always => true,
            Condition::Eq => acc == 0,
            Condition::Ne => acc != 0,
            Condition::Le => acc <= 0,
            Condition::Ge => acc >= 0,
            Condition::Lt => acc < 0,
            Condition::Gt => acc > 0,
        }
    }

    /// Comparison operator, `""` for [`Condition::Always`].
    pub const fn symbol(self) -> &'static str {
        match self {
            Condition::Always => "",
            Condition::Eq => "==",
            Condition::Ne => "!=",
            Condition::Le => "<=",
            Condition::Ge => ">=",
            Condition::Lt => "<",
            Condition::Gt => ">",
        }
    }
}

/// Address base selected by a load/store opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Base {
    Direct,
    In1,
    In2,
    /// Base register given as the first argument.
    Explicit,
}

/// Canonical operation identifier stored in the opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    Load(Base),
    LoadImmediate,
    Store(Base),
    Move,
    Alu(AluFunc, Form),
    Jump(Condition),
    Nop,
}

/// A fully resolved, typed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// `dst := M[addr]`
    Load { mode: Addressing, dst: Register, offset: i64 },
    /// `dst := i`
    LoadImmediate { dst: Register, value: i64 },
    /// `M[addr] := src`
    Store { mode: Addressing, src: Register, offset: i64 },
    /// `dst := src`
    Move { src: Register, dst: Register },
    /// `dst := dst <func> operand`
    Alu { func: AluFunc, dst: Register, operand: Operand },
    /// `PC := PC + offset` if the condition holds
    Jump { cond: Condition, offset: i64 },
    Nop,
}

impl Op {
    /// The zero-offset unconditional jump that ends a program.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Op::Jump { cond: Condition::Always, offset: 0 })
    }

    /// Short human readable description used in runtime diagnostics.
    pub fn describe(&self) -> String {
        match *self {
            Op::Load { mode, dst, offset } => format!("load of {} into {}", mode.describe(offset), dst),
            Op::LoadImmediate { dst, value } => format!("load of immediate {} into {}", value, dst),
            Op::Store { mode, src, offset } => format!("store of {} into {}", src, mode.describe(offset)),
            Op::Move { src, dst } => format!("move from {} to {}", src, dst),
            Op::Alu { func, dst, operand } => match operand {
                Operand::Memory(i) => format!("{} of stored value M[{}] on {}", func.verb(), i, dst),
                Operand::Immediate(i) => format!("{} of immediate {} on {}", func.verb(), i, dst),
                Operand::Register(src) => format!("{} of register {} on {}", func.verb(), src, dst),
            },
            Op::Jump { cond: Condition::Always, offset } => format!("jump by {}", offset),
            Op::Jump { cond, offset } => format!("jump by {} if ACC {} 0", offset, cond.symbol()),
            Op::Nop => "no operation".into(),
        }
    }
}

impl OpKind {
    /// Build the typed operation from arguments already checked against
    /// the table entry's kinds. `None` if they do not match.
    pub fn bind(self, args: &[Argument]) -> Option<Op> {
        use Argument::{Immediate as Imm, Register as Reg};

        let op = match (self, args) {
            (OpKind::Load(Base::Explicit), [Reg(base), Reg(dst), Imm(i)]) => Op::Load {
                mode: Addressing::Indexed(*base),
                dst: *dst,
                offset: *i,
            },
            (OpKind::Load(base), [Reg(dst), Imm(i)]) => Op::Load {
                mode: implicit_base(base)?,
                dst: *dst,
                offset: *i,
            },
            (OpKind::LoadImmediate, [Reg(dst), Imm(i)]) => Op::LoadImmediate { dst: *dst, value: *i },
            (OpKind::Store(Base::Explicit), [Reg(base), Reg(src), Imm(i)]) => Op::Store {
                mode: Addressing::Indexed(*base),
                src: *src,
                offset: *i,
            },
            (OpKind::Store(base), [Reg(src), Imm(i)]) => Op::Store {
                mode: implicit_base(base)?,
                src: *src,
                offset: *i,
            },
            // Minimal set: the accumulator is the implicit source.
            (OpKind::Store(base), [Imm(i)]) => Op::Store {
                mode: implicit_base(base)?,
                src: Register::Acc,
                offset: *i,
            },
            (OpKind::Move, [Reg(src), Reg(dst)]) => Op::Move { src: *src, dst: *dst },
            (OpKind::Alu(func, Form::Memory), [Reg(dst), Imm(i)]) => Op::Alu {
                func,
                dst: *dst,
                operand: Operand::Memory(*i),
            },
            (OpKind::Alu(func, Form::Immediate), [Reg(dst), Imm(i)]) => Op::Alu {
                func,
                dst: *dst,
                operand: Operand::Immediate(*i),
            },
            (OpKind::Alu(func, Form::Register), [Reg(dst), Reg(src)]) => Op::Alu {
                func,
                dst: *dst,
                operand: Operand::Register(*src),
            },
            (OpKind::Jump(cond), [Imm(i)]) => Op::Jump { cond, offset: *i },
            (OpKind::Nop, []) => Op::Nop,
            _ => return None,
        };
        Some(op)
    }
}

fn implicit_base(base: Base) -> Option<Addressing> {
    match base {
        Base::Direct => Some(Addressing::Direct),
        Base::In1 => Some(Addressing::Indexed(Register::In1)),
        Base::In2 => Some(Addressing::Indexed(Register::In2)),
        Base::Explicit => None,
    }
}

/// One opcode table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub name: &'static str,
    pub kind: OpKind,
    pub args: &'static [ArgKind],
}

const fn opcode(name: &'static str, kind: OpKind, args: &'static [ArgKind]) -> Opcode {
    Opcode { name, kind, args }
}

const R: ArgKind = ArgKind::Register;
const I: ArgKind = ArgKind::Integer;

const JUMPS: [Opcode; 7] = [
    opcode("JUMP", OpKind::Jump(Condition::Always), &[I]),
    opcode("JUMP=", OpKind::Jump(Condition::Eq), &[I]),
    opcode("JUMP!=", OpKind::Jump(Condition::Ne), &[I]),
    opcode("JUMP<=", OpKind::Jump(Condition::Le), &[I]),
    opcode("JUMP>=", OpKind::Jump(Condition::Ge), &[I]),
    opcode("JUMP<", OpKind::Jump(Condition::Lt), &[I]),
    opcode("JUMP>", OpKind::Jump(Condition::Gt), &[I]),
];

macro_rules! alu_forms {
    ($mem:literal, $imm:literal, $reg:literal, $func:expr) => {
        [
            opcode($mem, OpKind::Alu($func, Form::Memory), &[R, I]),
            opcode($imm, OpKind::Alu($func, Form::Immediate), &[R, I]),
            opcode($reg, OpKind::Alu($func, Form::Register), &[R, R]),
        ]
    };
}

const ADD: [Opcode; 3] = alu_forms!("ADD", "ADDI", "ADDR", AluFunc::Add);
const SUB: [Opcode; 3] = alu_forms!("SUB", "SUBI", "SUBR", AluFunc::Sub);
const MUL: [Opcode; 3] = alu_forms!("MUL", "MULI", "MULR", AluFunc::Mul);
const DIV: [Opcode; 3] = alu_forms!("DIV", "DIVI", "DIVR", AluFunc::Div);
const MOD: [Opcode; 3] = alu_forms!("MOD", "MODI", "MODR", AluFunc::Mod);
const XOR: [Opcode; 3] = alu_forms!("OPLUS", "OPLUSI", "OPLUSR", AluFunc::Xor);
const AND: [Opcode; 3] = alu_forms!("AND", "ANDI", "ANDR", AluFunc::And);
const OR: [Opcode; 3] = alu_forms!("OR", "ORI", "ORR", AluFunc::Or);

static MINIMAL_OPCODES: [Opcode; 31] = [
    opcode("LOAD", OpKind::Load(Base::Direct), &[R, I]),
    opcode("LOADIN1", OpKind::Load(Base::In1), &[R, I]),
    opcode("LOADIN2", OpKind::Load(Base::In2), &[R, I]),
    opcode("LOADI", OpKind::LoadImmediate, &[R, I]),
    opcode("STORE", OpKind::Store(Base::Direct), &[I]),
    opcode("STOREIN1", OpKind::Store(Base::In1), &[I]),
    opcode("STOREIN2", OpKind::Store(Base::In2), &[I]),
    opcode("MOVE", OpKind::Move, &[R, R]),
    ADD[0], ADD[1], ADD[2],
    SUB[0], SUB[1], SUB[2],
    XOR[0], XOR[1], XOR[2],
    AND[0], AND[1], AND[2],
    OR[0], OR[1], OR[2],
    JUMPS[0], JUMPS[1], JUMPS[2], JUMPS[3], JUMPS[4], JUMPS[5], JUMPS[6],
    opcode("NOP", OpKind::Nop, &[]),
];

static EXTENDED_OPCODES: [Opcode; 42] = [
    opcode("LOAD", OpKind::Load(Base::Direct), &[R, I]),
    opcode("LOADIN1", OpKind::Load(Base::In1), &[R, I]),
    opcode("LOADIN2", OpKind::Load(Base::In2), &[R, I]),
    opcode("LOADIN", OpKind::Load(Base::Explicit), &[R, R, I]),
    opcode("LOADI", OpKind::LoadImmediate, &[R, I]),
    opcode("STORE", OpKind::Store(Base::Direct), &[R, I]),
    opcode("STOREIN1", OpKind::Store(Base::In1), &[R, I]),
    opcode("STOREIN2", OpKind::Store(Base::In2), &[R, I]),
    opcode("STOREIN", OpKind::Store(Base::Explicit), &[R, R, I]),
    opcode("MOVE", OpKind::Move, &[R, R]),
    ADD[0], ADD[1], ADD[2],
    SUB[0], SUB[1], SUB[2],
    MUL[0], MUL[1], MUL[2],
    DIV[0], DIV[1], DIV[2],
    MOD[0], MOD[1], MOD[2],
    XOR[0], XOR[1], XOR[2],
    AND[0], AND[1], AND[2],
    OR[0], OR[1], OR[2],
    JUMPS[0], JUMPS[1], JUMPS[2], JUMPS[3], JUMPS[4], JUMPS[5], JUMPS[6],
    opcode("NOP", OpKind::Nop, &[]),
];

const MINIMAL_REGISTERS: [Register; 4] = [Register::Acc, Register::In1, Register::In2, Register::Pc];

/// Register-set and opcode-table variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InstructionSet {
    /// 4 registers, implicit accumulator stores.
    Minimal,
    /// 8 registers, explicit stores, MUL/DIV/MOD.
    #[default]
    Extended,
}

impl InstructionSet {
    pub const fn name(self) -> &'static str {
        match self {
            InstructionSet::Minimal => "Reti (Technische Informatik)",
            InstructionSet::Extended => "Reti (Betriebssysteme)",
        }
    }

    /// Registers this variant defines, in display order.
    pub fn registers(self) -> &'static [Register] {
        match self {
            InstructionSet::Minimal => &MINIMAL_REGISTERS,
            InstructionSet::Extended => &Register::ALL,
        }
    }

    pub fn opcodes(self) -> &'static [Opcode] {
        match self {
            InstructionSet::Minimal => &MINIMAL_OPCODES,
            InstructionSet::Extended => &EXTENDED_OPCODES,
        }
    }

    pub fn has_register(self, reg: Register) -> bool {
        self.registers().contains(&reg)
    }

    /// Look up an opcode by mnemonic.
    pub fn opcode(self, name: &str, case_sensitive: bool) -> Option<&'static Opcode> {
        self.opcodes().iter().find(|op| names_match(op.name, name, case_sensitive))
    }

    /// Look up a register by name.
    pub fn register(self, name: &str, case_sensitive: bool) -> Option<Register> {
        self.registers()
            .iter()
            .copied()
            .find(|reg| names_match(reg.name(), name, case_sensitive))
    }

    /// Comma separated list of all mnemonics.
    pub fn opcode_names(self) -> String {
        join(self.opcodes().iter().map(|op| op.name))
    }

    /// Comma separated list of all register names.
    pub fn register_names(self) -> String {
        join(self.registers().iter().map(|reg| reg.name()))
    }
}

fn names_match(canonical: &str, candidate: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        canonical == candidate
    } else {
        canonical.eq_ignore_ascii_case(candidate)
    }
}

fn join<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample_args(kinds: &[ArgKind]) -> Vec<Argument> {
        kinds
            .iter()
            .map(|kind| match kind {
                ArgKind::Register => Argument::Register(Register::In1),
                ArgKind::Integer => Argument::Immediate(3),
            })
            .collect()
    }

    #[test]
    fn test_every_opcode_binds() {
        for isa in [InstructionSet::Minimal, InstructionSet::Extended] {
            for op in isa.opcodes() {
                assert!(
                    op.kind.bind(&sample_args(op.args)).is_some(),
                    "{} does not bind its own argument kinds",
                    op.name
                );
            }
        }
    }

    #[test]
    fn test_mnemonics_unique() {
        for isa in [InstructionSet::Minimal, InstructionSet::Extended] {
            let names: HashSet<_> = isa.opcodes().iter().map(|op| op.name).collect();
            assert_eq!(names.len(), isa.opcodes().len());
        }
    }

    #[test]
    fn test_variant_differences() {
        let min = InstructionSet::Minimal;
        let ext = InstructionSet::Extended;

        assert_eq!(min.registers().len(), 4);
        assert_eq!(ext.registers().len(), 8);
        assert!(!min.has_register(Register::Sp));

        for name in ["MUL", "DIVI", "MODR", "LOADIN", "STOREIN"] {
            assert!(min.opcode(name, true).is_none(), "{} in minimal set", name);
            assert!(ext.opcode(name, true).is_some(), "{} missing in extended set", name);
        }

        assert_eq!(min.opcode("STORE", true).map(|op| op.args), Some(&[I][..]));
        assert_eq!(ext.opcode("STORE", true).map(|op| op.args), Some(&[R, I][..]));
    }

    #[test]
    fn test_lookup_case() {
        let ext = InstructionSet::Extended;
        assert!(ext.opcode("loadi", false).is_some());
        assert!(ext.opcode("loadi", true).is_none());
        assert_eq!(ext.register("baf", false), Some(Register::Baf));
        assert_eq!(ext.register("baf", true), None);
        assert_eq!(InstructionSet::Minimal.register("SP", false), None);
    }

    #[test]
    fn test_minimal_store_uses_acc() {
        let store = InstructionSet::Minimal.opcode("STOREIN1", true).unwrap();
        assert_eq!(
            store.kind.bind(&[Argument::Immediate(4)]),
            Some(Op::Store {
                mode: Addressing::Indexed(Register::In1),
                src: Register::Acc,
                offset: 4
            })
        );
    }

    #[test]
    fn test_bind_rejects_wrong_shape() {
        assert_eq!(OpKind::Move.bind(&[Argument::Immediate(1)]), None);
        assert_eq!(OpKind::Nop.bind(&[Argument::Immediate(1)]), None);
        assert_eq!(OpKind::Load(Base::Explicit).bind(&sample_args(&[R, I])), None);
    }

    #[test]
    fn test_terminator() {
        assert!(Op::Jump { cond: Condition::Always, offset: 0 }.is_terminator());
        assert!(!Op::Jump { cond: Condition::Eq, offset: 0 }.is_terminator());
        assert!(!Op::Jump { cond: Condition::Always, offset: 1 }.is_terminator());
    }

    #[test]
    fn test_conditions() {
        assert!(Condition::Le.holds(0));
        assert!(!Condition::Lt.holds(0));
        assert!(Condition::Gt.holds(1));
        assert!(Condition::Ne.holds(-1));
    }
}
