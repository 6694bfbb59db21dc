//! Allocation and deallocation of registers.

use crate::expr::Key;
use crate::expr::Val;
use crate::error::SimResult;
use crate::pile::PileName;
use crate::queue::Action;
use crate::Simulator;

impl Simulator {
    /// Allocate a fresh register backing `key`, zeroed on every branch.
    pub fn alloc(&mut self, key: &Key) -> SimResult<()> {
        if self.queues.record(Action::Alloc(key.clone())) {
            return Ok(());
        }
        self.assert_mutable(key)?;

        let id = self.new_reg_id();
        key.push(id);
        for branch in self.branches.iter_mut() {
            branch.alloc(id);
        }
        Ok(())
    }

    /// Deallocate `key`'s current register. The caller (typically `clean`)
    /// is responsible for having already zeroed it via `init_inv`; this
    /// routine does not itself check that (any violation shows
    /// up downstream as a normalization failure).
    pub fn alloc_inv(&mut self, key: &Key) -> SimResult<()> {
        if self.queues.record(Action::AllocInv(key.clone())) {
            return Ok(());
        }
        self.assert_mutable(key)?;

        let id = key.pop();
        for branch in self.branches.iter_mut() {
            branch.dealloc(id);
        }

        if !key.allocated() {
            if let Some(pile) = self.pile_lookup_stack.last() {
                let mut pile = pile.borrow_mut();
                if let Some(pos) = pile.iter().position(|k| k.id() == key.id()) {
                    pile.remove(pos);
                }
            }
        }
        Ok(())
    }

    /// Allocate a key and initialize it to `val` in one step — the ordinary
    /// way to create a register. Inside an open `garbage` scope, the new
    /// key is registered with that scope's pile.
    pub fn reg(&mut self, val: impl Into<Val>) -> SimResult<Key> {
        let key = self.key();

        if let Some(name) = self.garbage_stack.last().cloned() {
            let pile = self.pile_for(&name);
            pile.borrow_mut().push(key.clone());
        }

        self.alloc(&key)?;
        self.init(&key, val.into())?;
        Ok(key)
    }

    /// Verify `key` currently holds `val` and deallocate it — the ordinary
    /// way to destroy a register created with `reg`.
    pub fn clean(&mut self, key: &Key, val: impl Into<Val>) -> SimResult<()> {
        self.init_inv(key, val.into())?;
        self.alloc_inv(key)
    }

    pub(crate) fn pile_for(&self, name: &PileName) -> crate::pile::Pile {
        match name {
            PileName::Keyless => self
                .keyless_piles
                .last()
                .expect("keyless garbage scope is open")
                .clone(),
            PileName::Named(n) => self
                .named_piles
                .get(n)
                .expect("named pile registered on scope entry")
                .clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::Expr;
    use crate::Simulator;

    #[test]
    fn reg_then_clean_returns_to_the_vacuum() {
        let mut sim = Simulator::new();
        let a = sim.reg(7).unwrap();
        sim.clean(&a, 7).unwrap();
        assert!(!a.allocated());
    }

    #[test]
    fn clean_rejects_a_mismatched_expected_value() {
        let mut sim = Simulator::new();
        let a = sim.reg(7).unwrap();
        assert!(sim.clean(&a, 8).is_err());
    }

    #[test]
    fn mutating_a_controlled_key_is_rejected() {
        let mut sim = Simulator::new();
        let a = sim.reg(1).unwrap();
        let err = sim
            .q_if(Expr::reg(&a).eq(Expr::int(1)), |sim| sim.alloc_inv(&a))
            .unwrap_err();
        assert!(matches!(err, crate::SimError::Structural(_)));
    }
}
