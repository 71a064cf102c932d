//! Analysis domain: an ordered set of elements with stable bit positions.
//!
//! The domain is built once per function, before fixed-point iteration, and
//! never grows afterwards. Element `i` of the enumeration owns bit `i` of
//! every mask; `position` is a hash lookup over precomputed indices.

use std::fmt;
use std::hash::Hash;

use bitvec::prelude::*;

use crate::common::fx_hash::FxHashMap;

/// Mask over the domain. Bit `i` corresponds to the `i`-th inserted element.
pub type BitVector = BitVec;

pub struct Domain<E> {
    elements: Vec<E>,
    index: FxHashMap<E, usize>,
}

impl<E> Default for Domain<E> {
    fn default() -> Self {
        Self { elements: Vec::new(), index: FxHashMap::default() }
    }
}

impl<E: Clone + Eq + Hash> Domain<E> {
    /// Insert `element`, keeping the first position on re-insertion.
    pub fn insert(&mut self, element: E) {
        if !self.index.contains_key(&element) {
            self.index.insert(element.clone(), self.elements.len());
            self.elements.push(element);
        }
    }

    /// Bit position of `element`, or `None` when it was never inserted.
    pub fn position(&self, element: &E) -> Option<usize> {
        self.index.get(element).copied()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in bit order.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.elements.iter()
    }

    pub fn all_true(&self) -> BitVector {
        BitVector::repeat(true, self.elements.len())
    }

    pub fn all_false(&self) -> BitVector {
        BitVector::repeat(false, self.elements.len())
    }
}

impl<E: fmt::Display> Domain<E> {
    /// Display adapter for the subset of the domain selected by `mask`, in
    /// the `{e1,e3,}` shape of the analysis dumps.
    pub fn display_masked<'a>(&'a self, mask: &'a BitVector) -> MaskedDomain<'a, E> {
        assert_eq!(
            mask.len(),
            self.elements.len(),
            "mask width must equal the domain size"
        );
        MaskedDomain { domain: self, mask }
    }
}

pub struct MaskedDomain<'a, E> {
    domain: &'a Domain<E>,
    mask: &'a BitVector,
}

impl<E: fmt::Display> fmt::Display for MaskedDomain<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, element) in self.domain.elements.iter().enumerate() {
            if !self.mask[i] {
                continue;
            }
            write!(f, "{element},")?;
        }
        write!(f, "}}")
    }
}
