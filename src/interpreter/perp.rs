//! `perp_init` / `perp_init_inv`: the perpendicular-bit reflection
//! primitives.
//!
//! `orth` is set to `1` on the component of a branch orthogonal to `val`
//! and `0` on the component parallel to it — a Householder reflection
//! around `val`, expressed branch-by-branch.

use std::collections::BTreeMap;

use crate::branch::Branch;
use crate::eint::EInt;
use crate::error::{SimError, SimResult};
use crate::expr::{Key, Val};
use crate::merge::insert_merging;
use crate::queue::Action;
use crate::Simulator;

fn check_distinct(vals: &[i128]) -> SimResult<()> {
    let mut seen = std::collections::BTreeSet::new();
    for v in vals {
        if !seen.insert(*v) {
            return Err(SimError::semantic(
                "superpositions can't contain repeated values",
            ));
        }
    }
    Ok(())
}

fn weighted_norm(map: &BTreeMap<i128, crate::expr::Expr>, branch: &Branch) -> f64 {
    map.values().map(|e| e.eval(branch).as_f64().powi(2)).sum()
}

impl Simulator {
    /// Set `orth` to `1` where `key` is perpendicular to `val`, `0` where
    /// it is parallel. `orth` must start at zero on every active branch.
    pub fn perp_init(&mut self, key: &Key, orth: &Key, val: Val) -> SimResult<()> {
        if self
            .queues
            .record(Action::PerpInit(key.clone(), orth.clone(), val.clone()))
        {
            return Ok(());
        }
        self.assert_mutable(orth)?;

        for branch in &self.branches {
            if self.controls.active(branch) && branch.get(orth.index()).value() != 0 {
                return Err(SimError::semantic("register already initialized"));
            }
        }

        match val {
            Val::Scalar(expr) => {
                if expr.is_float() {
                    return Err(SimError::type_error("can only reflect around integers"));
                }
                let mut branches = std::mem::take(&mut self.branches);
                for branch in branches.iter_mut() {
                    if self.controls.active(branch) {
                        let target = expr.eval(branch).as_int().expect("checked not-float above");
                        let differs = branch.get(key.index()) != target;
                        branch.set(orth.index(), EInt::new(differs as i128));
                    }
                }
                self.branches = branches;
                Ok(())
            }
            Val::Uniform(vals) => {
                check_distinct(&vals)?;
                let n = vals.len() as f64;

                let mut newbranches = Vec::new();
                for branch in std::mem::take(&mut self.branches) {
                    if !self.controls.active(&branch) {
                        newbranches.push(branch);
                        continue;
                    }
                    if !vals.contains(&branch.get(key.index()).value()) {
                        let mut b = branch;
                        b.set(orth.index(), EInt::new(1));
                        newbranches.push(b);
                        continue;
                    }

                    for &vj in &vals {
                        let mut amp0 = num_complex::Complex64::new(0.0, 0.0);
                        let mut amp1 = num_complex::Complex64::new(0.0, 0.0);
                        for &vi in &vals {
                            if branch.get(key.index()).value() == vi {
                                amp0 += branch.amp / n;
                                amp1 += branch.amp * (if vi == vj { 1.0 } else { 0.0 } - 1.0 / n);
                            }
                        }

                        let mut br0 = branch.clone();
                        br0.amp = amp0;
                        br0.set(key.index(), EInt::new(vj));

                        let mut br1 = branch.clone();
                        br1.amp = amp1;
                        br1.set(key.index(), EInt::new(vj));
                        br1.set(orth.index(), EInt::new(1));

                        insert_merging(&mut newbranches, br0);
                        insert_merging(&mut newbranches, br1);
                    }
                }
                self.branches = newbranches;
                self.prune();
                Ok(())
            }
            Val::Weighted(map) => {
                for e in map.values() {
                    if e.keys().contains(&key.id()) || e.keys().contains(&orth.id()) {
                        return Err(SimError::structural(
                            "can't measure target with state that depends on target",
                        ));
                    }
                }

                let mut newbranches = Vec::new();
                for branch in std::mem::take(&mut self.branches) {
                    if !self.controls.active(&branch) {
                        newbranches.push(branch);
                        continue;
                    }

                    let norm = weighted_norm(&map, &branch);
                    if norm.sqrt() < self.prune_threshold {
                        return Err(SimError::semantic("state from dictionary has norm 0"));
                    }

                    if !map.contains_key(&branch.get(key.index()).value()) {
                        let mut b = branch;
                        b.set(orth.index(), EInt::new(1));
                        newbranches.push(b);
                        continue;
                    }

                    for (&k1, e1) in &map {
                        let mut amp0 = num_complex::Complex64::new(0.0, 0.0);
                        let mut amp1 = num_complex::Complex64::new(0.0, 0.0);
                        for (&k2, e2) in &map {
                            if branch.get(key.index()).value() == k2 {
                                let proj = e2.eval(&branch).as_f64() * e1.eval(&branch).as_f64()
                                    / norm;
                                amp0 += branch.amp * proj;
                                amp1 += branch.amp * (if k1 == k2 { 1.0 } else { 0.0 } - proj);
                            }
                        }

                        let mut br0 = branch.clone();
                        br0.amp = amp0;
                        br0.set(key.index(), EInt::new(k1));

                        let mut br1 = branch.clone();
                        br1.amp = amp1;
                        br1.set(key.index(), EInt::new(k1));
                        br1.set(orth.index(), EInt::new(1));

                        insert_merging(&mut newbranches, br0);
                        insert_merging(&mut newbranches, br1);
                    }
                }
                self.branches = newbranches;
                self.prune();
                Ok(())
            }
        }
    }

    /// Undo `perp_init(key, orth, val)`.
    pub fn perp_init_inv(&mut self, key: &Key, orth: &Key, val: Val) -> SimResult<()> {
        if self
            .queues
            .record(Action::PerpInitInv(key.clone(), orth.clone(), val.clone()))
        {
            return Ok(());
        }
        self.assert_mutable(key)?;

        match val {
            Val::Scalar(expr) => {
                if expr.is_float() {
                    return Err(SimError::type_error("can only reflect around integers"));
                }
                let mut branches = std::mem::take(&mut self.branches);
                for branch in branches.iter_mut() {
                    let target = if self.controls.active(branch) {
                        EInt::new((branch.get(key.index()) != expr.eval(branch).as_int().expect("checked not-float above")) as i128)
                    } else {
                        EInt::zero()
                    };
                    if branch.get(orth.index()) != target {
                        return Err(SimError::semantic(
                            "failed to uncompute perpendicular bit",
                        ));
                    }
                    branch.set(key.index(), EInt::zero());
                }
                self.branches = branches;
                Ok(())
            }
            Val::Uniform(vals) => {
                check_distinct(&vals)?;
                let n = vals.len() as f64;

                let mut newbranches = Vec::new();
                for branch in std::mem::take(&mut self.branches) {
                    if !self.controls.active(&branch) {
                        if branch.get(orth.index()).value() != 0 {
                            return Err(SimError::semantic(
                                "failed to uncompute perpendicular bit",
                            ));
                        }
                        newbranches.push(branch);
                        continue;
                    }
                    if !vals.contains(&branch.get(key.index()).value()) {
                        if branch.get(orth.index()).value() != 1 {
                            return Err(SimError::semantic(
                                "failed to uncompute perpendicular bit",
                            ));
                        }
                        let mut b = branch;
                        b.set(orth.index(), EInt::zero());
                        newbranches.push(b);
                        continue;
                    }

                    for &vj in &vals {
                        let mut amp0 = num_complex::Complex64::new(0.0, 0.0);
                        let mut amp1 = num_complex::Complex64::new(0.0, 0.0);
                        for &vi in &vals {
                            if branch.get(key.index()).value() == vi {
                                amp0 += branch.amp / n;
                                amp1 += branch.amp * (if vi == vj { 1.0 } else { 0.0 } - 1.0 / n);
                            }
                        }

                        let mut br0 = branch.clone();
                        br0.amp = amp0;
                        br0.set(key.index(), EInt::new(vj));

                        let mut br1 = branch.clone();
                        br1.amp = amp1;
                        br1.set(key.index(), EInt::new(vj));
                        let flipped = 1 - branch.get(orth.index()).value();
                        br1.set(orth.index(), EInt::new(flipped));

                        insert_merging(&mut newbranches, br0);
                        insert_merging(&mut newbranches, br1);
                    }
                }
                self.branches = newbranches;
                self.prune();

                if self.branches.iter().any(|b| b.get(orth.index()).value() != 0) {
                    return Err(SimError::semantic(
                        "failed to uncompute perpendicular bit",
                    ));
                }
                Ok(())
            }
            Val::Weighted(map) => {
                for e in map.values() {
                    if e.keys().contains(&key.id()) || e.keys().contains(&orth.id()) {
                        return Err(SimError::structural(
                            "can't measure target with state that depends on target",
                        ));
                    }
                }

                let mut newbranches = Vec::new();
                for branch in std::mem::take(&mut self.branches) {
                    if !self.controls.active(&branch) {
                        if branch.get(orth.index()).value() != 0 {
                            return Err(SimError::semantic(
                                "failed to uncompute perpendicular bit",
                            ));
                        }
                        newbranches.push(branch);
                        continue;
                    }

                    let norm = weighted_norm(&map, &branch);
                    if norm.sqrt() < self.prune_threshold {
                        return Err(SimError::semantic("state from dictionary has norm 0"));
                    }

                    if !map.contains_key(&branch.get(key.index()).value()) {
                        if branch.get(orth.index()).value() != 1 {
                            return Err(SimError::semantic(
                                "failed to uncompute perpendicular bit",
                            ));
                        }
                        let mut b = branch;
                        b.set(orth.index(), EInt::zero());
                        newbranches.push(b);
                        continue;
                    }

                    for (&k1, e1) in &map {
                        let mut amp0 = num_complex::Complex64::new(0.0, 0.0);
                        let mut amp1 = num_complex::Complex64::new(0.0, 0.0);
                        for (&k2, e2) in &map {
                            if branch.get(key.index()).value() == k2 {
                                let proj = e2.eval(&branch).as_f64() * e1.eval(&branch).as_f64()
                                    / norm;
                                amp0 += branch.amp * proj;
                                amp1 += branch.amp * (if k1 == k2 { 1.0 } else { 0.0 } - proj);
                            }
                        }

                        let mut br0 = branch.clone();
                        br0.amp = amp0;
                        br0.set(key.index(), EInt::new(k1));

                        let mut br1 = branch.clone();
                        br1.amp = amp1;
                        br1.set(key.index(), EInt::new(k1));
                        let flipped = 1 - branch.get(orth.index()).value();
                        br1.set(orth.index(), EInt::new(flipped));

                        insert_merging(&mut newbranches, br0);
                        insert_merging(&mut newbranches, br1);
                    }
                }
                self.branches = newbranches;
                self.prune();

                if self.branches.iter().any(|b| b.get(orth.index()).value() != 0) {
                    return Err(SimError::semantic(
                        "failed to uncompute perpendicular bit",
                    ));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::expr::{Expr, Val};
    use crate::Simulator;

    #[test]
    fn perp_init_rejects_a_dict_value_that_reads_the_target() {
        let mut sim = Simulator::new();
        let key = sim.reg(0).unwrap();
        let orth = sim.reg(0).unwrap();
        let val = Val::Weighted(BTreeMap::from([(0, Expr::reg(&key))]));
        let err = sim.perp_init(&key, &orth, val).unwrap_err();
        assert!(matches!(err, crate::SimError::Structural(_)));
    }

    #[test]
    fn perp_init_rejects_a_dict_value_that_reads_orth() {
        let mut sim = Simulator::new();
        let key = sim.reg(0).unwrap();
        let orth = sim.reg(0).unwrap();
        let val = Val::Weighted(BTreeMap::from([(0, Expr::reg(&orth))]));
        let err = sim.perp_init(&key, &orth, val).unwrap_err();
        assert!(matches!(err, crate::SimError::Structural(_)));
    }

    #[test]
    fn perp_init_inv_rejects_a_dict_value_that_reads_the_target() {
        let mut sim = Simulator::new();
        let key = sim.reg(0).unwrap();
        let orth = sim.reg(0).unwrap();
        let val = Val::Weighted(BTreeMap::from([(0, Expr::reg(&key))]));
        let err = sim.perp_init_inv(&key, &orth, val).unwrap_err();
        assert!(matches!(err, crate::SimError::Structural(_)));
    }
}
