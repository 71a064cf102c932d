//! Textual rendering of the IR. The analysis dumps print through these, so
//! the format is part of the observable output.

use std::fmt;

use crate::common::types::IrType;
use crate::ir::ir::{
    BasicBlock, BlockId, CmpOp, InstOrTerm, Instruction, IrBinOp, IrConst, IrFunction, IrUnaryOp,
    Operand, Terminator, Value,
};

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl fmt::Display for IrConst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrConst::I8(v) => write!(f, "{v}"),
            IrConst::I16(v) => write!(f, "{v}"),
            IrConst::I32(v) => write!(f, "{v}"),
            IrConst::I64(v) => write!(f, "{v}"),
            IrConst::F32(v) => write!(f, "{v}"),
            IrConst::F64(v) => write!(f, "{v}"),
            IrConst::Zero => write!(f, "0"),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(v) => write!(f, "{v}"),
            Operand::Const(c) => write!(f, "{c}"),
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IrType::I8 => "i8",
            IrType::I16 => "i16",
            IrType::I32 => "i32",
            IrType::I64 => "i64",
            IrType::U8 => "u8",
            IrType::U16 => "u16",
            IrType::U32 => "u32",
            IrType::U64 => "u64",
            IrType::F32 => "f32",
            IrType::F64 => "f64",
            IrType::Ptr => "ptr",
            IrType::Void => "void",
        };
        f.write_str(name)
    }
}

impl fmt::Display for IrBinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for IrUnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IrUnaryOp::Neg => "neg",
            IrUnaryOp::Not => "not",
        })
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Lt => "lt",
            CmpOp::Le => "le",
            CmpOp::Gt => "gt",
            CmpOp::Ge => "ge",
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::BinOp { dest, op, lhs, rhs, ty } => {
                write!(f, "{dest} = {op} {ty} {lhs}, {rhs}")
            }
            Instruction::UnaryOp { dest, op, src, ty } => write!(f, "{dest} = {op} {ty} {src}"),
            Instruction::Cmp { dest, op, lhs, rhs, ty } => {
                write!(f, "{dest} = cmp {op} {ty} {lhs}, {rhs}")
            }
            Instruction::Copy { dest, src } => write!(f, "{dest} = copy {src}"),
            Instruction::Load { dest, ptr, ty } => write!(f, "{dest} = load {ty}, {ptr}"),
            Instruction::Store { val, ptr } => write!(f, "store {val}, {ptr}"),
            Instruction::Call { dest, callee, args, .. } => {
                if let Some(dest) = dest {
                    write!(f, "{dest} = call {callee}(")?;
                } else {
                    write!(f, "call {callee}(")?;
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Instruction::Phi { dest, ty, incoming } => {
                write!(f, "{dest} = phi {ty}")?;
                for (i, (op, pred)) in incoming.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " [ {op}, {pred} ]")?;
                }
                Ok(())
            }
            Instruction::LandingPad { dest, ty } => write!(f, "{dest} = landingpad {ty}"),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Branch(target) => write!(f, "br {target}"),
            Terminator::CondBranch { cond, true_label, false_label } => {
                write!(f, "br {cond}, {true_label}, {false_label}")
            }
            Terminator::Return(Some(op)) => write!(f, "ret {op}"),
            Terminator::Return(None) => write!(f, "ret"),
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

impl fmt::Display for InstOrTerm<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstOrTerm::Inst(inst) => write!(f, "{inst}"),
            InstOrTerm::Term(term) => write!(f, "{term}"),
        }
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.label)?;
        for inst in &self.instructions {
            writeln!(f, "  {inst}")?;
        }
        writeln!(f, "  {}", self.terminator)
    }
}

impl fmt::Display for IrFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (i, (v, ty)) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}: {ty}")?;
        }
        writeln!(f, ") -> {} {{", self.return_type)?;
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        writeln!(f, "}}")
    }
}
