//! Dominator tree over the CFG.
//!
//! Immediate dominators are computed with the iterative algorithm of Cooper,
//! Harvey and Kennedy: walk blocks in reverse postorder, intersecting the
//! dominator chains of processed predecessors, until nothing changes.

use crate::analysis::cfg::ControlFlowGraph;

pub struct DominatorTree {
    /// Immediate dominator per block. The entry block points at itself;
    /// unreachable blocks have no entry.
    idom: Vec<Option<usize>>,
}

impl DominatorTree {
    pub fn compute(cfg: &ControlFlowGraph) -> Self {
        let n = cfg.num_blocks();
        let mut idom: Vec<Option<usize>> = vec![None; n];
        if n == 0 {
            return Self { idom };
        }

        let entry = 0;
        let postorder = postorder_from(cfg, entry);
        let mut postorder_number = vec![0usize; n];
        for (number, &block) in postorder.iter().enumerate() {
            postorder_number[block] = number;
        }
        // Reverse postorder, entry first.
        let rpo: Vec<usize> = postorder.iter().rev().copied().collect();

        idom[entry] = Some(entry);
        let mut changed = true;
        while changed {
            changed = false;
            for &b in rpo.iter().skip(1) {
                let mut new_idom: Option<usize> = None;
                for &p in cfg.preds(b) {
                    if idom[p].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(cur) => intersect(p, cur, &idom, &postorder_number),
                    });
                }
                if new_idom.is_some() && idom[b] != new_idom {
                    idom[b] = new_idom;
                    changed = true;
                }
            }
        }

        Self { idom }
    }

    /// Whether `a` dominates `b`. Every block dominates itself. Blocks
    /// unreachable from the entry dominate nothing and are dominated by
    /// nothing but themselves.
    pub fn dominates(&self, a: usize, b: usize) -> bool {
        if a == b {
            return true;
        }
        let mut cur = b;
        while let Some(parent) = self.idom[cur] {
            if parent == cur {
                return false; // reached the entry
            }
            if parent == a {
                return true;
            }
            cur = parent;
        }
        false
    }

    /// Immediate dominator of `block`; `None` for the entry block and for
    /// unreachable blocks.
    pub fn idom(&self, block: usize) -> Option<usize> {
        match self.idom[block] {
            Some(parent) if parent != block => Some(parent),
            _ => None,
        }
    }
}

fn intersect(a: usize, b: usize, idom: &[Option<usize>], postorder_number: &[usize]) -> usize {
    // Both arguments are processed blocks, so their idom chains are set and
    // terminate at the entry.
    let up = |block: usize| match idom[block] {
        Some(parent) => parent,
        None => unreachable!("intersect reached an unprocessed block"),
    };
    let mut f1 = a;
    let mut f2 = b;
    while f1 != f2 {
        while postorder_number[f1] < postorder_number[f2] {
            f1 = up(f1);
        }
        while postorder_number[f2] < postorder_number[f1] {
            f2 = up(f2);
        }
    }
    f1
}

/// Iterative postorder DFS over successor edges.
fn postorder_from(cfg: &ControlFlowGraph, entry: usize) -> Vec<usize> {
    let n = cfg.num_blocks();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut stack: Vec<(usize, usize)> = vec![(entry, 0)];
    visited[entry] = true;
    while let Some((block, next_child)) = stack.pop() {
        let succs = cfg.succs(block);
        if next_child < succs.len() {
            stack.push((block, next_child + 1));
            let child = succs[next_child];
            if !visited[child] {
                visited[child] = true;
                stack.push((child, 0));
            }
        } else {
            order.push(block);
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::IrType;
    use crate::ir::ir::{BasicBlock, BlockId, IrFunction, Operand, Terminator, Value};

    fn block(label: u32, terminator: Terminator) -> BasicBlock {
        let mut b = BasicBlock::new(BlockId(label));
        b.terminator = terminator;
        b
    }

    fn cond(v: u32, t: u32, f: u32) -> Terminator {
        Terminator::CondBranch {
            cond: Operand::Value(Value(v)),
            true_label: BlockId(t),
            false_label: BlockId(f),
        }
    }

    /// bb0 -> {bb1, bb2} -> bb3
    fn diamond() -> IrFunction {
        let mut func = IrFunction::new("diamond", IrType::Void, vec![IrType::I32]);
        func.blocks.extend([
            block(0, cond(0, 1, 2)),
            block(1, Terminator::Branch(BlockId(3))),
            block(2, Terminator::Branch(BlockId(3))),
            block(3, Terminator::Return(None)),
        ]);
        func
    }

    #[test]
    fn test_diamond_dominance() {
        let func = diamond();
        let cfg = ControlFlowGraph::compute(&func);
        let dom = DominatorTree::compute(&cfg);

        assert!(dom.dominates(0, 1));
        assert!(dom.dominates(0, 2));
        assert!(dom.dominates(0, 3));
        // Neither arm dominates the join.
        assert!(!dom.dominates(1, 3));
        assert!(!dom.dominates(2, 3));
        assert!(dom.dominates(3, 3));
        assert_eq!(dom.idom(3), Some(0));
        assert_eq!(dom.idom(0), None);
    }

    #[test]
    fn test_loop_dominance() {
        // bb0 -> bb1 (header) -> bb2 (body) -> bb1; bb1 -> bb3 (exit)
        let mut func = IrFunction::new("loop", IrType::Void, vec![IrType::I32]);
        func.blocks.extend([
            block(0, Terminator::Branch(BlockId(1))),
            block(1, cond(0, 2, 3)),
            block(2, Terminator::Branch(BlockId(1))),
            block(3, Terminator::Return(None)),
        ]);
        let cfg = ControlFlowGraph::compute(&func);
        let dom = DominatorTree::compute(&cfg);

        assert!(dom.dominates(1, 2));
        assert!(dom.dominates(1, 3));
        assert!(!dom.dominates(2, 1));
        assert_eq!(dom.idom(2), Some(1));
    }

    #[test]
    fn test_unreachable_block() {
        let mut func = IrFunction::new("u", IrType::Void, vec![]);
        func.blocks.extend([
            block(0, Terminator::Return(None)),
            block(1, Terminator::Return(None)),
        ]);
        let cfg = ControlFlowGraph::compute(&func);
        let dom = DominatorTree::compute(&cfg);
        assert!(!dom.dominates(0, 1));
        assert!(dom.dominates(1, 1));
        assert_eq!(dom.idom(1), None);
    }
}
