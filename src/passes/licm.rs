//! Loop-invariant code motion.
//!
//! Per loop: iteratively mark instructions whose operands are all literals,
//! parameters, out-of-loop definitions, or already-marked invariants; then
//! hoist the marked instructions, in mark order, to the loop pre-header.
//! Mark order is a topological order of the data dependencies among marked
//! instructions, so operands always land in the pre-header before their
//! users.
//!
//! Hoisting conditions, per instruction:
//! - its block dominates every exit block of the loop;
//! - it is the only assignment to its value in the loop and all in-loop uses
//!   are reached from it alone (both trivially true under SSA, kept as named
//!   predicates);
//! - every operand is defined outside the loop or was itself hoisted.
//!
//! An instruction is moved, not cloned, immediately before the pre-header's
//! terminator; its SSA identity and all uses stay valid.

use std::fmt;

use crate::analysis::cfg::ControlFlowGraph;
use crate::analysis::dominators::DominatorTree;
use crate::analysis::loop_info::{Loop, LoopId, LoopInfo};
use crate::common::fx_hash::{FxHashMap, FxHashSet};
use crate::ir::ir::{for_each_operand_in_instruction, Instruction, IrFunction, Operand, Value};

/// Run LICM on every loop of `func`, innermost loops first. Returns whether
/// any instruction moved.
pub fn run(func: &mut IrFunction, out: &mut dyn fmt::Write) -> bool {
    let cfg = ControlFlowGraph::compute(func);
    let dom = DominatorTree::compute(&cfg);
    let loop_info = LoopInfo::compute(&cfg, &dom);
    let mut changed = false;
    for id in loop_info.ids_innermost_first() {
        changed |= run_on_loop(func, &cfg, &dom, &loop_info, id, out);
    }
    changed
}

/// Run LICM on one loop. Does nothing without a unique pre-header.
pub fn run_on_loop(
    func: &mut IrFunction,
    cfg: &ControlFlowGraph,
    dom: &DominatorTree,
    loop_info: &LoopInfo,
    id: LoopId,
    out: &mut dyn fmt::Write,
) -> bool {
    let Some(preheader) = loop_info.preheader(cfg, id) else {
        return false;
    };
    let lp = loop_info.get(id);
    let def_block = def_blocks(func);

    // Invariance detection. Ordered: the list grows in dependency order.
    let mut marked: Vec<Value> = Vec::new();
    let mut marked_set: FxHashSet<Value> = FxHashSet::default();
    loop {
        let mut new_marks = false;
        for &b in &lp.blocks {
            // Instructions owned by a nested loop are handled by the nested
            // invocation.
            if loop_info.innermost_loop_of(b) != Some(id) {
                continue;
            }
            for inst in &func.blocks[b].instructions {
                let Some(dest) = inst.dest() else {
                    continue;
                };
                if marked_set.contains(&dest) {
                    continue;
                }
                if is_invariant(lp, &def_block, &marked_set, inst) {
                    log::trace!("licm: {inst} is invariant");
                    marked.push(dest);
                    marked_set.insert(dest);
                    new_marks = true;
                }
            }
        }
        if !new_marks {
            break;
        }
    }

    // Hoisting, in mark order.
    let exits = loop_info.exit_blocks(cfg, id);
    let mut hoisted: FxHashSet<Value> = FxHashSet::default();
    let mut moved = 0usize;
    for &dest in &marked {
        let parent = def_block[&dest];
        let index = match func.blocks[parent]
            .instructions
            .iter()
            .position(|inst| inst.dest() == Some(dest))
        {
            Some(index) => index,
            None => panic!(
                "licm: no instruction defining {dest} in {}",
                func.blocks[parent].label
            ),
        };
        let hoistable = {
            let inst = &func.blocks[parent].instructions[index];
            dominates_all_exits(dom, parent, &exits)
                && assigns_once_in_loop(dest)
                && uses_reached_only_from_def(dest)
                && operands_hoisted_or_outside(lp, &def_block, &hoisted, inst)
        };
        if !hoistable {
            continue;
        }
        let inst = func.blocks[parent].instructions.remove(index);
        let _ = writeln!(out, "licm: hoisted {moved}: {inst}");
        // Before the pre-header's terminator, i.e. at the end of its body.
        func.blocks[preheader].instructions.push(inst);
        hoisted.insert(dest);
        moved += 1;
    }

    let _ = writeln!(out, "licm: invariants marked: {}", marked.len());
    let _ = writeln!(out, "licm: instructions hoisted: {moved}");
    moved > 0
}

/// Defining block index per value. Parameters have no entry.
fn def_blocks(func: &IrFunction) -> FxHashMap<Value, usize> {
    let mut map = FxHashMap::default();
    for (block_idx, block) in func.blocks.iter().enumerate() {
        for inst in &block.instructions {
            if let Some(dest) = inst.dest() {
                map.insert(dest, block_idx);
            }
        }
    }
    map
}

/// Whether `inst` computes the same value on every iteration of `lp`.
///
/// The instruction must be safe to execute speculatively, must not read
/// memory, and must not be a landing pad; every operand must be a literal, a
/// parameter, an out-of-loop definition, or an already-marked invariant.
fn is_invariant(
    lp: &Loop,
    def_block: &FxHashMap<Value, usize>,
    marked: &FxHashSet<Value>,
    inst: &Instruction,
) -> bool {
    if !inst.is_safe_to_speculatively_execute() {
        return false;
    }
    if inst.may_read_memory() {
        return false;
    }
    if inst.is_landing_pad() {
        return false;
    }
    let mut operands_invariant = true;
    for_each_operand_in_instruction(inst, |op| {
        let Operand::Value(v) = op else {
            return; // literal constant
        };
        match def_block.get(v) {
            None => {} // function parameter
            Some(&b) if !lp.contains(b) => {}
            Some(_) if marked.contains(v) => {}
            Some(_) => operands_invariant = false,
        }
    });
    operands_invariant
}

fn dominates_all_exits(dom: &DominatorTree, block: usize, exits: &[usize]) -> bool {
    exits.iter().all(|&exit| dom.dominates(block, exit))
}

/// Under SSA a value has exactly one assignment, inside or outside any loop.
fn assigns_once_in_loop(_dest: Value) -> bool {
    true
}

/// Under SSA every use of a value is reached from its single definition.
fn uses_reached_only_from_def(_dest: Value) -> bool {
    true
}

/// Every value operand is defined outside the loop or already sits in the
/// pre-header.
fn operands_hoisted_or_outside(
    lp: &Loop,
    def_block: &FxHashMap<Value, usize>,
    hoisted: &FxHashSet<Value>,
    inst: &Instruction,
) -> bool {
    let mut ok = true;
    for_each_operand_in_instruction(inst, |op| {
        if let Operand::Value(v) = op {
            if let Some(&b) = def_block.get(v) {
                if lp.contains(b) && !hoisted.contains(v) {
                    ok = false;
                }
            }
        }
    });
    ok
}
