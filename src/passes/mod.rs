pub mod function_info;
pub mod licm;
pub mod local_opts;

use std::fmt;

use crate::ir::ir::IrModule;

/// Run the optimization pipeline on every function of the module: local
/// rewrites first, then loop-invariant code motion. Returns whether anything
/// changed, so callers can decide to re-run dependent passes.
pub fn run_passes(module: &mut IrModule, out: &mut dyn fmt::Write) -> bool {
    let mut changed = false;
    for func in &mut module.functions {
        changed |= local_opts::run(func, out);
        changed |= licm::run(func, out);
    }
    changed
}
