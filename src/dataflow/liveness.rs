//! Live-variable analysis (backward).
//!
//! The domain is every SSA value used as an operand anywhere in the function
//! (instruction results and parameters; constants carry no liveness). The
//! meet is union over successors, with one twist: a φ in a successor uses its
//! incoming value only along the matching edge, so values flowing in from
//! other predecessors are cleared before the union.

use std::fmt;

use crate::dataflow::domain::{BitVector, Domain};
use crate::dataflow::framework::{Backward, DataFlowAnalysis, Direction, Framework, MeetCx};
use crate::ir::ir::{InstOrTerm, Instruction, IrFunction, Operand, Value};

/// A domain element: one SSA value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable(pub Value);

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

pub struct Liveness;

impl DataFlowAnalysis for Liveness {
    type Element = Variable;
    type Dir = Backward;

    const NAME: &'static str = "liveness";

    fn initialize_domain(&self, domain: &mut Domain<Variable>, point: InstOrTerm<'_>) {
        point.for_each_operand(|op| {
            if let Operand::Value(v) = op {
                domain.insert(Variable(*v));
            }
        });
    }

    fn initial_condition(&self, domain: &Domain<Variable>) -> BitVector {
        domain.all_false()
    }

    fn boundary_condition(&self, domain: &Domain<Variable>) -> BitVector {
        domain.all_false()
    }

    fn meet(&self, domain: &Domain<Variable>, operands: &[&BitVector]) -> BitVector {
        let mut result = domain.all_false();
        for operand in operands {
            result |= operand.as_bitslice();
        }
        result
    }

    /// OUT[B] = ⋃ IN[S] over successors S, after clearing, per φ in S, the
    /// incoming values that arrive from predecessors other than B.
    fn meet_for_block(&self, cx: &MeetCx<'_, Variable>) -> BitVector {
        let mut result = cx.domain.all_false();
        let label = cx.func.blocks[cx.block].label;
        for &succ in Backward::meet_neighbours(cx.cfg, cx.block) {
            let mut succ_in = cx.states.boundary::<Backward>(succ).clone();
            for phi in cx.func.blocks[succ].phis() {
                let Instruction::Phi { incoming, .. } = phi else {
                    continue;
                };
                for (op, pred) in incoming {
                    if *pred == label {
                        continue;
                    }
                    if let Operand::Value(v) = op {
                        if let Some(pos) = cx.domain.position(&Variable(*v)) {
                            succ_in.set(pos, false);
                        }
                    }
                }
            }
            result |= succ_in.as_bitslice();
        }
        result
    }

    /// OUT = (IN − {def}) ∪ uses.
    fn transfer(
        &self,
        domain: &Domain<Variable>,
        point: InstOrTerm<'_>,
        input: &BitVector,
    ) -> BitVector {
        let mut out = input.clone();
        if let Some(dest) = point.dest() {
            if let Some(pos) = domain.position(&Variable(dest)) {
                out.set(pos, false);
            }
        }
        point.for_each_operand(|op| {
            if let Operand::Value(v) = op {
                if let Some(pos) = domain.position(&Variable(*v)) {
                    out.set(pos, true);
                }
            }
        });
        out
    }
}

/// Run liveness on `func` and dump the per-point sets to `out`. The IR is
/// never modified.
pub fn run(func: &IrFunction, out: &mut dyn fmt::Write) -> bool {
    let mut framework = Framework::new(func, Liveness);
    framework.solve();
    let _ = framework.print_inst_bv_map(out);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::IrType;
    use crate::ir::ir::{BasicBlock, BlockId, IrBinOp, IrConst, Terminator};

    fn value(n: u32) -> Operand {
        Operand::Value(Value(n))
    }

    fn binop(dest: u32, op: IrBinOp, lhs: Operand, rhs: Operand) -> Instruction {
        Instruction::BinOp { dest: Value(dest), op, lhs, rhs, ty: IrType::I32 }
    }

    /// Diamond: %3 is defined in the left arm and consumed only by the join
    /// φ along that arm, so it must not be live through the right arm.
    ///
    ///        bb0
    ///       /    \
    ///     bb1    bb2
    ///       \    /
    ///        bb3   %5 = phi [ %3, bb1 ], [ %4, bb2 ]
    #[test]
    fn test_phi_value_not_live_on_other_arm() {
        let mut func = IrFunction::new("f", IrType::I32, vec![IrType::I32, IrType::I32]);
        let mut b0 = BasicBlock::new(BlockId(0));
        b0.terminator = Terminator::CondBranch {
            cond: value(1),
            true_label: BlockId(1),
            false_label: BlockId(2),
        };
        let mut b1 = BasicBlock::new(BlockId(1));
        b1.instructions.push(binop(3, IrBinOp::Add, value(0), Operand::Const(IrConst::I32(1))));
        b1.terminator = Terminator::Branch(BlockId(3));
        let mut b2 = BasicBlock::new(BlockId(2));
        b2.instructions.push(binop(4, IrBinOp::Mul, value(0), Operand::Const(IrConst::I32(2))));
        b2.terminator = Terminator::Branch(BlockId(3));
        let mut b3 = BasicBlock::new(BlockId(3));
        b3.instructions.push(Instruction::Phi {
            dest: Value(5),
            ty: IrType::I32,
            incoming: vec![(value(3), BlockId(1)), (value(4), BlockId(2))],
        });
        b3.terminator = Terminator::Return(Some(value(5)));
        func.blocks.extend([b0, b1, b2, b3]);

        let mut framework = Framework::new(&func, Liveness);
        framework.solve();

        let v3 = framework.domain().position(&Variable(Value(3))).unwrap();
        let v4 = framework.domain().position(&Variable(Value(4))).unwrap();

        // Live out of the defining arm only: the φ adjustment clears %3 when
        // meeting from bb2 and %4 when meeting from bb1.
        let out_b1 = Liveness.meet_for_block(&MeetCx {
            func: &func,
            cfg: framework.cfg(),
            block: 1,
            domain: framework.domain(),
            states: framework.states(),
        });
        assert!(out_b1[v3]);
        assert!(!out_b1[v4]);

        let out_b2 = Liveness.meet_for_block(&MeetCx {
            func: &func,
            cfg: framework.cfg(),
            block: 2,
            domain: framework.domain(),
            states: framework.states(),
        });
        assert!(!out_b2[v3]);
        assert!(out_b2[v4]);

        // %3 is not live on entry to the right arm at all.
        assert!(!framework.states().get(2, 0)[v3]);
    }

    #[test]
    fn test_def_kills_liveness_above_definition() {
        // %2 = add %0, %1; ret %2: %2 is live between definition and use,
        // dead above its own definition.
        let mut func = IrFunction::new("f", IrType::I32, vec![IrType::I32, IrType::I32]);
        let mut b0 = BasicBlock::new(BlockId(0));
        b0.instructions.push(binop(2, IrBinOp::Add, value(0), value(1)));
        b0.terminator = Terminator::Return(Some(value(2)));
        func.blocks.push(b0);

        let mut framework = Framework::new(&func, Liveness);
        framework.solve();

        let v0 = framework.domain().position(&Variable(Value(0))).unwrap();
        let v2 = framework.domain().position(&Variable(Value(2))).unwrap();

        // IN of the terminator: %2 live.
        assert!(framework.states().get(0, 1)[v2]);
        // IN of the add: operands live, %2 dead (it is defined here).
        assert!(framework.states().get(0, 0)[v0]);
        assert!(!framework.states().get(0, 0)[v2]);
    }

    #[test]
    fn test_liveness_grows_through_loop() {
        // %0 is used inside the loop body, so it is live around the back
        // edge and on loop entry.
        let mut func = IrFunction::new("f", IrType::I32, vec![IrType::I32]);
        let mut b0 = BasicBlock::new(BlockId(0));
        b0.terminator = Terminator::Branch(BlockId(1));
        let mut b1 = BasicBlock::new(BlockId(1));
        b1.instructions.push(binop(1, IrBinOp::Add, value(0), Operand::Const(IrConst::I32(1))));
        b1.terminator = Terminator::CondBranch {
            cond: value(1),
            true_label: BlockId(1),
            false_label: BlockId(2),
        };
        let mut b2 = BasicBlock::new(BlockId(2));
        b2.terminator = Terminator::Return(None);
        func.blocks.extend([b0, b1, b2]);

        let mut framework = Framework::new(&func, Liveness);
        framework.solve();

        let v0 = framework.domain().position(&Variable(Value(0))).unwrap();
        // Live on entry to the loop header across the back edge, and out of
        // the pre-header.
        assert!(framework.states().get(1, 0)[v0]);
        assert!(framework.states().get(0, 0)[v0]);
        assert!(!framework.sweep());
    }

    #[test]
    fn test_constants_stay_out_of_domain() {
        let mut func = IrFunction::new("f", IrType::I32, vec![]);
        let mut b0 = BasicBlock::new(BlockId(0));
        b0.instructions.push(binop(
            0,
            IrBinOp::Add,
            Operand::Const(IrConst::I32(1)),
            Operand::Const(IrConst::I32(2)),
        ));
        b0.terminator = Terminator::Return(Some(value(0)));
        func.blocks.push(b0);

        let framework = Framework::new(&func, Liveness);
        // Only %0 (used by the return) enters the domain.
        assert_eq!(framework.domain().len(), 1);
        assert_eq!(framework.domain().position(&Variable(Value(0))), Some(0));
    }

    #[test]
    fn test_dump_format() {
        let mut func = IrFunction::new("f", IrType::I32, vec![IrType::I32]);
        let mut b0 = BasicBlock::new(BlockId(0));
        b0.instructions.push(binop(1, IrBinOp::Add, value(0), Operand::Const(IrConst::I32(1))));
        b0.terminator = Terminator::Return(Some(value(1)));
        func.blocks.push(b0);

        let mut out = String::new();
        assert!(!run(&func, &mut out));
        assert!(out.contains("Instruction: ret %1"));
        assert!(out.contains("\t{[%0],}") || out.contains("\t{[%1],}"));
    }
}
