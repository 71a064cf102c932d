//! Function-information pass: per-function summary statistics for a module.

use std::fmt;

use crate::ir::ir::{Instruction, IrModule};

/// Print, for every function, its name, parameter count, call sites within
/// the module, block count, and instruction count (terminators included).
pub fn run(module: &IrModule, out: &mut dyn fmt::Write) -> fmt::Result {
    writeln!(out, "Functions Information Pass")?;
    writeln!(out, "{}", module.name)?;
    writeln!(out, "Name    # Args    # Calls    # Blocks    # Insts    ")?;
    for func in &module.functions {
        let calls = module
            .functions
            .iter()
            .flat_map(|f| &f.blocks)
            .flat_map(|b| &b.instructions)
            .filter(|inst| matches!(inst, Instruction::Call { callee, .. } if *callee == func.name))
            .count();
        let insts: usize = func.blocks.iter().map(|b| b.num_points()).sum();
        writeln!(
            out,
            "{}    {}    {}    {}    {}    ",
            func.name,
            func.params.len(),
            calls,
            func.blocks.len(),
            insts
        )?;
    }
    Ok(())
}
