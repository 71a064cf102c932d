//! Control-flow graph over block indices.
//!
//! Blocks are addressed by their position in `IrFunction::blocks`; edges come
//! from terminator targets. Built once per pass invocation and borrowed
//! read-only afterwards.

use crate::common::fx_hash::FxHashMap;
use crate::ir::ir::{BlockId, IrFunction};

pub struct ControlFlowGraph {
    preds: Vec<Vec<usize>>,
    succs: Vec<Vec<usize>>,
}

impl ControlFlowGraph {
    pub fn compute(func: &IrFunction) -> Self {
        let n = func.blocks.len();
        let block_index: FxHashMap<BlockId, usize> = func
            .blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.label, i))
            .collect();

        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut succs: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, block) in func.blocks.iter().enumerate() {
            for target in block.terminator.targets() {
                let Some(&t) = block_index.get(&target) else {
                    panic!("terminator of {} targets unknown block {target}", block.label);
                };
                // A cond-branch with both edges to one block contributes a
                // single CFG edge.
                if !succs[i].contains(&t) {
                    succs[i].push(t);
                }
                if !preds[t].contains(&i) {
                    preds[t].push(i);
                }
            }
        }
        Self { preds, succs }
    }

    pub fn num_blocks(&self) -> usize {
        self.preds.len()
    }

    pub fn preds(&self, block: usize) -> &[usize] {
        &self.preds[block]
    }

    pub fn succs(&self, block: usize) -> &[usize] {
        &self.succs[block]
    }
}
