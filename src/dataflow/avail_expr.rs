//! Available-expressions analysis (forward).
//!
//! The domain is the set of binary-operator expressions computed anywhere in
//! the function. An expression is available at a point when every path from
//! the entry has computed it and no operand has been redefined since; the
//! meet is therefore intersection, and the initial condition is the full
//! domain.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::common::fx_hash::stable_hash;
use crate::dataflow::domain::{BitVector, Domain};
use crate::dataflow::framework::{DataFlowAnalysis, Forward, Framework};
use crate::ir::ir::{InstOrTerm, Instruction, IrBinOp, IrFunction, Operand, Value};

/// A binary-operator expression `(op, lhs, rhs)`.
///
/// For commutative operators the operand pair is unordered: `(op, a, b)`
/// equals `(op, b, a)` and both hash identically (the operand hashes are
/// combined with XOR, a symmetric combiner, in the commutative case only).
#[derive(Debug, Clone, Copy)]
pub struct Expression {
    op: IrBinOp,
    lhs: Operand,
    rhs: Operand,
}

impl Expression {
    pub fn new(op: IrBinOp, lhs: Operand, rhs: Operand) -> Self {
        Self { op, lhs, rhs }
    }

    /// The expression computed by `inst`, if it is a binary operator.
    pub fn from_inst(inst: &Instruction) -> Option<Self> {
        match inst {
            Instruction::BinOp { op, lhs, rhs, .. } => Some(Self::new(*op, *lhs, *rhs)),
            _ => None,
        }
    }

    /// Whether either operand is `value`.
    pub fn mentions(&self, value: Value) -> bool {
        self.lhs == Operand::Value(value) || self.rhs == Operand::Value(value)
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        if self.op != other.op {
            return false;
        }
        let straight = self.lhs == other.lhs && self.rhs == other.rhs;
        if self.op.is_commutative() {
            straight || (self.lhs == other.rhs && self.rhs == other.lhs)
        } else {
            straight
        }
    }
}

impl Eq for Expression {}

impl Hash for Expression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.op.hash(state);
        let lhs = stable_hash(&self.lhs);
        let rhs = stable_hash(&self.rhs);
        if self.op.is_commutative() {
            (lhs ^ rhs).hash(state);
        } else {
            lhs.hash(state);
            rhs.hash(state);
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}, {}]", self.op, self.lhs, self.rhs)
    }
}

pub struct AvailExpr;

impl DataFlowAnalysis for AvailExpr {
    type Element = Expression;
    type Dir = Forward;

    const NAME: &'static str = "avail_expr";

    fn initialize_domain(&self, domain: &mut Domain<Expression>, point: InstOrTerm<'_>) {
        if let Some(expr) = point.as_inst().and_then(Expression::from_inst) {
            domain.insert(expr);
        }
    }

    fn initial_condition(&self, domain: &Domain<Expression>) -> BitVector {
        domain.all_true()
    }

    fn boundary_condition(&self, domain: &Domain<Expression>) -> BitVector {
        domain.all_false()
    }

    fn meet(&self, domain: &Domain<Expression>, operands: &[&BitVector]) -> BitVector {
        let mut result = domain.all_true();
        for operand in operands {
            result &= operand.as_bitslice();
        }
        result
    }

    /// f(x) = gen ∪ (x − kill): the computed expression turns on, every
    /// expression mentioning the defined value turns off.
    fn transfer(
        &self,
        domain: &Domain<Expression>,
        point: InstOrTerm<'_>,
        input: &BitVector,
    ) -> BitVector {
        let mut out = input.clone();
        let Some(inst) = point.as_inst() else {
            return out;
        };
        if let Some(expr) = Expression::from_inst(inst) {
            if let Some(pos) = domain.position(&expr) {
                out.set(pos, true);
            }
        }
        if let Some(dest) = inst.dest() {
            for (i, expr) in domain.iter().enumerate() {
                if expr.mentions(dest) {
                    out.set(i, false);
                }
            }
        }
        out
    }
}

/// Run available expressions on `func` and dump the per-point sets to `out`.
/// The IR is never modified.
pub fn run(func: &IrFunction, out: &mut dyn fmt::Write) -> bool {
    let mut framework = Framework::new(func, AvailExpr);
    framework.solve();
    let _ = framework.print_inst_bv_map(out);
    false
}
