//! Natural-loop discovery and loop-structure queries.
//!
//! A back edge is an edge `latch -> header` where the header dominates the
//! latch; the natural loop of a header is the union, over its back edges, of
//! the blocks that reach the latch without passing through the header. Loops
//! sharing a header are merged.

use smallvec::SmallVec;

use crate::analysis::cfg::ControlFlowGraph;
use crate::analysis::dominators::DominatorTree;
use crate::common::fx_hash::FxHashSet;

pub type LoopId = usize;

pub struct Loop {
    /// Header block index.
    pub header: usize,
    /// Member blocks, header first, then in discovery order.
    pub blocks: Vec<usize>,
    block_set: FxHashSet<usize>,
    /// Immediately enclosing loop, if any.
    pub parent: Option<LoopId>,
    /// Nesting depth; outermost loops have depth 1.
    pub depth: u32,
}

impl Loop {
    pub fn contains(&self, block: usize) -> bool {
        self.block_set.contains(&block)
    }
}

pub struct LoopInfo {
    loops: Vec<Loop>,
    /// Innermost loop per block.
    innermost: Vec<Option<LoopId>>,
}

impl LoopInfo {
    pub fn compute(cfg: &ControlFlowGraph, dom: &DominatorTree) -> Self {
        let n = cfg.num_blocks();

        // Collect back edges grouped by header, in block order.
        let mut headers: Vec<usize> = Vec::new();
        let mut latches: Vec<Vec<usize>> = Vec::new();
        for latch in 0..n {
            for &header in cfg.succs(latch) {
                if dom.dominates(header, latch) {
                    match headers.iter().position(|&h| h == header) {
                        Some(i) => latches[i].push(latch),
                        None => {
                            headers.push(header);
                            latches.push(vec![latch]);
                        }
                    }
                }
            }
        }

        let mut loops: Vec<Loop> = headers
            .iter()
            .zip(&latches)
            .map(|(&header, latches)| natural_loop(cfg, header, latches))
            .collect();

        // Parent = the smallest other loop containing the header.
        for i in 0..loops.len() {
            let mut parent: Option<LoopId> = None;
            for (j, candidate) in loops.iter().enumerate() {
                if i == j || !candidate.contains(loops[i].header) {
                    continue;
                }
                let better = match parent {
                    None => true,
                    Some(p) => candidate.blocks.len() < loops[p].blocks.len(),
                };
                if better {
                    parent = Some(j);
                }
            }
            loops[i].parent = parent;
        }
        for i in 0..loops.len() {
            let mut depth = 1;
            let mut cur = loops[i].parent;
            while let Some(p) = cur {
                depth += 1;
                cur = loops[p].parent;
            }
            loops[i].depth = depth;
        }

        // Innermost loop per block: the smallest loop containing it.
        let mut innermost: Vec<Option<LoopId>> = vec![None; n];
        for (id, lp) in loops.iter().enumerate() {
            for &b in &lp.blocks {
                let better = match innermost[b] {
                    None => true,
                    Some(cur) => lp.blocks.len() < loops[cur].blocks.len(),
                };
                if better {
                    innermost[b] = Some(id);
                }
            }
        }

        Self { loops, innermost }
    }

    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    pub fn get(&self, id: LoopId) -> &Loop {
        &self.loops[id]
    }

    /// The innermost loop containing `block`, if any.
    pub fn innermost_loop_of(&self, block: usize) -> Option<LoopId> {
        self.innermost[block]
    }

    /// Loop ids ordered innermost-first, so nested loops are optimized before
    /// their parents.
    pub fn ids_innermost_first(&self) -> Vec<LoopId> {
        let mut ids: Vec<LoopId> = (0..self.loops.len()).collect();
        ids.sort_by(|&a, &b| self.loops[b].depth.cmp(&self.loops[a].depth));
        ids
    }

    /// The unique pre-header: the single out-of-loop predecessor of the
    /// header, accepted only when its sole successor is the header.
    pub fn preheader(&self, cfg: &ControlFlowGraph, id: LoopId) -> Option<usize> {
        let lp = &self.loops[id];
        let mut outside = cfg.preds(lp.header).iter().filter(|&&p| !lp.contains(p));
        let candidate = *outside.next()?;
        if outside.next().is_some() {
            return None;
        }
        if cfg.succs(candidate) == [lp.header] {
            Some(candidate)
        } else {
            None
        }
    }

    /// Blocks outside the loop reachable by one edge from inside, in
    /// discovery order.
    pub fn exit_blocks(&self, cfg: &ControlFlowGraph, id: LoopId) -> SmallVec<[usize; 4]> {
        let lp = &self.loops[id];
        let mut exits: SmallVec<[usize; 4]> = SmallVec::new();
        for &b in &lp.blocks {
            for &s in cfg.succs(b) {
                if !lp.contains(s) && !exits.contains(&s) {
                    exits.push(s);
                }
            }
        }
        exits
    }
}

fn natural_loop(cfg: &ControlFlowGraph, header: usize, latches: &[usize]) -> Loop {
    let mut block_set = FxHashSet::default();
    let mut blocks = vec![header];
    block_set.insert(header);
    let mut worklist: Vec<usize> = Vec::new();
    for &latch in latches {
        if block_set.insert(latch) {
            blocks.push(latch);
            worklist.push(latch);
        }
    }
    while let Some(b) = worklist.pop() {
        for &p in cfg.preds(b) {
            if block_set.insert(p) {
                blocks.push(p);
                worklist.push(p);
            }
        }
    }
    Loop { header, blocks, block_set, parent: None, depth: 0 }
}
