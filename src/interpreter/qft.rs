//! `qft`: quantum Fourier transform over a register's value mod `d`.

use num_complex::Complex64;

use crate::eint::EInt;
use crate::error::{SimError, SimResult};
use crate::expr::{Expr, Key};
use crate::merge::insert_merging;
use crate::queue::Action;
use crate::Simulator;

impl Simulator {
    /// Spread `key` uniformly over its residue class mod `d`, picking up a
    /// phase that depends on the original value. `inverse` selects the
    /// sign convention; calling with `inverse` flipped undoes the transform.
    pub fn qft(&mut self, key: &Key, d: Expr, inverse: bool) -> SimResult<()> {
        if self
            .queues
            .record(Action::Qft(key.clone(), d.clone(), inverse))
        {
            return Ok(());
        }
        self.assert_mutable(key)?;
        if d.keys().contains(&key.id()) {
            return Err(SimError::structural(
                "can't modify target based on expression that depends on target",
            ));
        }

        let mut newbranches = Vec::new();
        for branch in std::mem::take(&mut self.branches) {
            if !self.controls.active(&branch) {
                insert_merging(&mut newbranches, branch);
                continue;
            }

            let dval = d.eval(&branch).as_f64();
            if dval.fract() != 0.0 || dval as i128 <= 1 {
                return Err(SimError::semantic("qft must be over a positive integer"));
            }
            let dval = dval as i128;

            let original = branch.get(key.index());
            let base = original.value() - original.rem_floor(dval);

            for i in 0..dval {
                let mut nb = branch.clone();
                nb.amp *= 1.0 / (dval as f64).sqrt();

                let angle = original.value() as f64 * i as f64 * 2.0 * std::f64::consts::PI
                    / dval as f64;
                let phase = if inverse {
                    Complex64::from_polar(1.0, -angle)
                } else {
                    Complex64::from_polar(1.0, angle)
                };
                nb.amp *= phase;

                let mut v = EInt::new(i + base);
                v.sign = original.sign;
                nb.set(key.index(), v);
                insert_merging(&mut newbranches, nb);
            }
        }
        self.branches = newbranches;
        self.prune();
        Ok(())
    }

    /// Undo `qft(key, d, inverse)` by running it with the sign convention
    /// flipped.
    pub fn qft_inv(&mut self, key: &Key, d: Expr, inverse: bool) -> SimResult<()> {
        self.qft(key, d, !inverse)
    }
}
