//! Data-flow analysis framework.
//!
//! An analysis supplies a domain element type, a direction, initial and
//! boundary conditions, a meet operator, and a transfer function; the
//! framework owns the round-robin fixed-point iteration over the CFG and the
//! instruction/bit-vector dump.
//!
//! Termination relies on every transfer function being monotone on the
//! power-set lattice of the domain. The framework does not detect a
//! non-monotone transfer; supplying one may iterate forever.
//!
//! Direction is a compile-time tag: traversal orders, the meet operand set,
//! and the boundary point are pure functions of the tag type, so the two
//! shipped instantiations are fully monomorphized.

use std::fmt;
use std::hash::Hash;

use crate::analysis::cfg::ControlFlowGraph;
use crate::dataflow::domain::{BitVector, Domain};
use crate::ir::ir::{InstOrTerm, IrFunction};

/// Forward analyses visit blocks in program order and feed each block from
/// its predecessors.
pub struct Forward;

/// Backward analyses visit blocks in reverse program order, instructions
/// back-to-front, and feed each block from its successors.
pub struct Backward;

pub trait Direction {
    /// Block visit order over `num_blocks` block indices.
    fn block_order(num_blocks: usize) -> Vec<usize>;
    /// Point visit order within a block holding `num_points` program points.
    fn point_order(num_points: usize) -> Vec<usize>;
    /// Neighbour blocks whose boundary states are the meet operands.
    fn meet_neighbours(cfg: &ControlFlowGraph, block: usize) -> &[usize];
    /// The program point of a neighbour whose post-transfer state feeds the
    /// meet: the terminator for forward analyses, the first point for
    /// backward ones.
    fn boundary_point(num_points: usize) -> usize;
}

impl Direction for Forward {
    fn block_order(num_blocks: usize) -> Vec<usize> {
        (0..num_blocks).collect()
    }

    fn point_order(num_points: usize) -> Vec<usize> {
        (0..num_points).collect()
    }

    fn meet_neighbours(cfg: &ControlFlowGraph, block: usize) -> &[usize] {
        cfg.preds(block)
    }

    fn boundary_point(num_points: usize) -> usize {
        num_points - 1
    }
}

impl Direction for Backward {
    fn block_order(num_blocks: usize) -> Vec<usize> {
        (0..num_blocks).rev().collect()
    }

    fn point_order(num_points: usize) -> Vec<usize> {
        (0..num_points).rev().collect()
    }

    fn meet_neighbours(cfg: &ControlFlowGraph, block: usize) -> &[usize] {
        cfg.succs(block)
    }

    fn boundary_point(_num_points: usize) -> usize {
        0
    }
}

/// Post-transfer state per program point: the OUT-set for forward analyses,
/// the IN-set for backward ones.
pub struct BlockStates {
    states: Vec<Vec<BitVector>>,
}

impl BlockStates {
    fn init(func: &IrFunction, initial: &BitVector) -> Self {
        let states = func
            .blocks
            .iter()
            .map(|block| vec![initial.clone(); block.num_points()])
            .collect();
        Self { states }
    }

    pub fn get(&self, block: usize, point: usize) -> &BitVector {
        &self.states[block][point]
    }

    /// The neighbour-facing state of `block` for direction `D`.
    pub fn boundary<D: Direction>(&self, block: usize) -> &BitVector {
        let points = &self.states[block];
        &points[D::boundary_point(points.len())]
    }
}

/// Everything a block-local meet may consult.
pub struct MeetCx<'a, E> {
    pub func: &'a IrFunction,
    pub cfg: &'a ControlFlowGraph,
    pub block: usize,
    pub domain: &'a Domain<E>,
    pub states: &'a BlockStates,
}

pub trait DataFlowAnalysis {
    type Element: Clone + Eq + Hash + fmt::Display;
    type Dir: Direction;

    const NAME: &'static str;

    /// Seed the domain with the elements contributed by one program point.
    /// Called once per point before iteration; the domain never grows after.
    fn initialize_domain(&self, domain: &mut Domain<Self::Element>, point: InstOrTerm<'_>);

    /// The state every point is initialised to before the first sweep.
    fn initial_condition(&self, domain: &Domain<Self::Element>) -> BitVector;

    /// The input-side state of the traversal-entry block.
    fn boundary_condition(&self, domain: &Domain<Self::Element>) -> BitVector;

    /// Combine neighbour boundary states. Folding from the meet identity
    /// makes an empty operand set yield the identity itself.
    fn meet(&self, domain: &Domain<Self::Element>, operands: &[&BitVector]) -> BitVector;

    /// Block-local meet. The default collects each neighbour's boundary
    /// state and delegates to `meet`; override it when combining needs the
    /// block itself (liveness and its φ adjustment).
    fn meet_for_block(&self, cx: &MeetCx<'_, Self::Element>) -> BitVector {
        let operands: Vec<&BitVector> = Self::Dir::meet_neighbours(cx.cfg, cx.block)
            .iter()
            .map(|&n| cx.states.boundary::<Self::Dir>(n))
            .collect();
        self.meet(cx.domain, &operands)
    }

    /// Apply the transfer function of `point` to `input`. Must be monotone.
    fn transfer(
        &self,
        domain: &Domain<Self::Element>,
        point: InstOrTerm<'_>,
        input: &BitVector,
    ) -> BitVector;
}

pub struct Framework<'f, A: DataFlowAnalysis> {
    analysis: A,
    func: &'f IrFunction,
    cfg: ControlFlowGraph,
    domain: Domain<A::Element>,
    states: BlockStates,
}

impl<'f, A: DataFlowAnalysis> Framework<'f, A> {
    pub fn new(func: &'f IrFunction, analysis: A) -> Self {
        let cfg = ControlFlowGraph::compute(func);
        let mut domain = Domain::default();
        for block in &func.blocks {
            for point in block.points() {
                analysis.initialize_domain(&mut domain, point);
            }
        }
        let initial = analysis.initial_condition(&domain);
        let states = BlockStates::init(func, &initial);
        Self { analysis, func, cfg, domain, states }
    }

    pub fn domain(&self) -> &Domain<A::Element> {
        &self.domain
    }

    pub fn states(&self) -> &BlockStates {
        &self.states
    }

    pub fn cfg(&self) -> &ControlFlowGraph {
        &self.cfg
    }

    /// Iterate sweeps until no point's state changes.
    pub fn solve(&mut self) {
        let mut sweeps = 0u32;
        while self.sweep() {
            sweeps += 1;
            log::trace!("{}: sweep {} changed", A::NAME, sweeps);
        }
    }

    /// One sweep over the CFG in traversal order. Returns whether any state
    /// changed.
    pub(crate) fn sweep(&mut self) -> bool {
        let func = self.func;
        if func.blocks.is_empty() {
            return false;
        }
        let order = A::Dir::block_order(func.blocks.len());
        let entry = order[0];
        let mut changed = false;
        for &b in &order {
            let mut cur = if b == entry {
                self.analysis.boundary_condition(&self.domain)
            } else {
                self.analysis.meet_for_block(&MeetCx {
                    func,
                    cfg: &self.cfg,
                    block: b,
                    domain: &self.domain,
                    states: &self.states,
                })
            };
            let points: Vec<InstOrTerm<'_>> = func.blocks[b].points().collect();
            for p in A::Dir::point_order(points.len()) {
                let next = self.analysis.transfer(&self.domain, points[p], &cur);
                if next != self.states.states[b][p] {
                    changed = true;
                    self.states.states[b][p] = next.clone();
                }
                cur = next;
            }
        }
        changed
    }

    /// Dump the per-point masked domain sets, with the boundary condition or
    /// meet result at each block boundary.
    pub fn print_inst_bv_map(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "********************************************")?;
        writeln!(out, "* Instruction-BitVector Mapping             ")?;
        writeln!(out, "********************************************")?;
        for (b, block) in self.func.blocks.iter().enumerate() {
            for (p, point) in block.points().enumerate() {
                if p == 0 {
                    if A::Dir::meet_neighbours(&self.cfg, b).is_empty() {
                        let bc = self.analysis.boundary_condition(&self.domain);
                        writeln!(out, "BC:\t{}", self.domain.display_masked(&bc))?;
                    } else {
                        let meet = self.analysis.meet_for_block(&MeetCx {
                            func: self.func,
                            cfg: &self.cfg,
                            block: b,
                            domain: &self.domain,
                            states: &self.states,
                        });
                        writeln!(out, "MeetOp:\t{}", self.domain.display_masked(&meet))?;
                    }
                }
                writeln!(out, "Instruction: {point}")?;
                writeln!(out, "\t{}", self.domain.display_masked(self.states.get(b, p)))?;
            }
        }
        Ok(())
    }
}
