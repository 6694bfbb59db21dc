//! The branch store.
//!
//! A branch is one classical configuration in the represented superposition:
//! a value for every currently-allocated register, plus a complex amplitude.
//! The simulator holds branches as a plain `Vec`; nothing about the
//! representation benefits from a fancier structure since primitives must be
//! able to visit every branch regardless of register identity.

use std::collections::BTreeMap;

use num_complex::Complex64;

use crate::eint::EInt;

/// A monotonically increasing, never-reused register identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegId(pub(crate) u64);

impl std::fmt::Display for RegId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// One classical configuration, weighted by a complex amplitude.
#[derive(Debug, Clone)]
pub struct Branch {
    /// Complex amplitude of this configuration.
    pub amp: Complex64,
    regs: BTreeMap<RegId, EInt>,
}

impl Branch {
    /// The vacuum branch: no registers allocated, full amplitude.
    pub fn vacuum() -> Self {
        Branch {
            amp: Complex64::new(1.0, 0.0),
            regs: BTreeMap::new(),
        }
    }

    /// Read a register's current value. Panics if `id` is not allocated on
    /// this branch — every primitive operates only on register ids it has
    /// already allocated, so this is an internal invariant, not a user error.
    pub fn get(&self, id: RegId) -> EInt {
        *self
            .regs
            .get(&id)
            .unwrap_or_else(|| panic!("register {id} not allocated on this branch"))
    }

    /// Write a register's value.
    pub fn set(&mut self, id: RegId, value: EInt) {
        self.regs.insert(id, value);
    }

    /// Allocate a fresh register at zero.
    pub(crate) fn alloc(&mut self, id: RegId) {
        self.regs.insert(id, EInt::zero());
    }

    /// Deallocate a register, returning its last value.
    pub(crate) fn dealloc(&mut self, id: RegId) -> EInt {
        self.regs
            .remove(&id)
            .unwrap_or_else(|| panic!("register {id} not allocated on this branch"))
    }

    /// Two branches are structurally equal when every register field
    /// matches exactly (amplitude is excluded; this is about register
    /// content, not amplitude).
    pub fn structurally_eq(&self, other: &Branch) -> bool {
        self.regs == other.regs
    }

    /// Structural equality ignoring one register (used by uncompute
    /// routines that are about to fold that field away).
    pub fn structurally_eq_except(&self, other: &Branch, except: RegId) -> bool {
        if self.regs.len() != other.regs.len() {
            return false;
        }
        self.regs
            .iter()
            .filter(|(id, _)| **id != except)
            .all(|(id, v)| other.regs.get(id) == Some(v))
    }
}
