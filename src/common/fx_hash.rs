//! Hash-map plumbing shared across the crate.
//!
//! Everything keyed by IR entities goes through the Fx hasher; the maps are
//! re-exported here so call sites stay uniform.

use std::hash::{Hash, Hasher};

pub use rustc_hash::{FxHashMap, FxHashSet, FxHasher};

/// Hash `value` to a `u64` with the Fx hasher.
///
/// Used where a hash has to be combined by hand, e.g. the symmetric operand
/// combiner for commutative expressions.
pub fn stable_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}
