//! `had`: Hadamard transform of a single bit.

use crate::error::{SimError, SimResult};
use crate::expr::{Expr, Key};
use crate::merge::insert_merging;
use crate::queue::Action;
use crate::Simulator;

impl Simulator {
    /// Apply a Hadamard to bit `bit` (LSB-indexed) of `key`, splitting each
    /// active branch into two and interfering where they recombine. Its
    /// own inverse.
    pub fn had(&mut self, key: &Key, bit: Expr) -> SimResult<()> {
        if self.queues.record(Action::Had(key.clone(), bit.clone())) {
            return Ok(());
        }
        self.assert_mutable(key)?;
        if bit.keys().contains(&key.id()) {
            return Err(SimError::structural(
                "can't hadamard variable in bit depending on itself",
            ));
        }

        let mut newbranches = Vec::new();
        for branch in std::mem::take(&mut self.branches) {
            if !self.controls.active(&branch) {
                insert_merging(&mut newbranches, branch);
                continue;
            }

            let idx = bit.eval(&branch).as_f64() as u32;
            let original = branch.get(key.index());

            let mut b0 = branch.clone();
            b0.amp /= std::f64::consts::SQRT_2;
            let mut v0 = original;
            v0.set_bit(idx, 0);
            b0.set(key.index(), v0);

            let mut b1 = branch.clone();
            b1.amp /= std::f64::consts::SQRT_2;
            let mut v1 = original;
            v1.set_bit(idx, 1);
            b1.set(key.index(), v1);
            if original.bit(idx) == 1 {
                b1.amp *= -1.0;
            }

            insert_merging(&mut newbranches, b0);
            insert_merging(&mut newbranches, b1);
        }
        self.branches = newbranches;
        self.prune();
        Ok(())
    }

    /// `had` is its own inverse.
    pub fn had_inv(&mut self, key: &Key, bit: Expr) -> SimResult<()> {
        self.had(key, bit)
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::Expr;
    use crate::Simulator;

    #[test]
    fn bit_expression_cannot_read_its_own_key() {
        let mut sim = Simulator::new();
        let a = sim.reg(0).unwrap();
        let err = sim.had(&a, Expr::reg(&a)).unwrap_err();
        assert!(matches!(err, crate::SimError::Structural(_)));
    }

    #[test]
    fn splits_one_branch_into_two() {
        let mut sim = Simulator::new();
        let a = sim.reg(0).unwrap();
        sim.had(&a, Expr::int(0)).unwrap();
        assert_eq!(sim.branches.len(), 2);
    }
}
