//! `init` / `init_inv`: the QRAM-polymorphic initialization primitives.

use std::collections::BTreeMap;

use crate::branch::Branch;
use crate::eint::EInt;
use crate::error::{SimError, SimResult};
use crate::expr::{Key, Val};
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

impl Simulator {
    /// Initialize a register currently at `0` to `val`.
    pub fn init(&mut self, key: &Key, val: Val) -> SimResult<()> {
        if self.queues.record(Action::Init(key.clone(), val.clone())) {
            return Ok(());
        }
        self.assert_mutable(key)?;

        for branch in &self.branches {
            if self.controls.active(branch) && branch.get(key.index()).value() != 0 {
                return Err(SimError::semantic("register already initialized"));
            }
        }

        match val {
            Val::Scalar(expr) => {
                if expr.is_float() {
                    return Err(SimError::type_error(
                        "quantum registers can only contain ints",
                    ));
                }
                let mut branches = std::mem::take(&mut self.branches);
                for branch in branches.iter_mut() {
                    if self.controls.active(branch) {
                        let v = expr
                            .eval(branch)
                            .as_int()
                            .expect("checked not-float above");
                        branch.set(key.index(), v);
                    }
                }
                self.branches = branches;
                Ok(())
            }
            Val::Uniform(vals) => {
                check_distinct(&vals)?;
                let n = vals.len();

                let mut newbranches = Vec::with_capacity(self.branches.len() * n.max(1));
                for branch in std::mem::take(&mut self.branches) {
                    if self.controls.active(&branch) {
                        for &v in &vals {
                            let mut nb = branch.clone();
                            nb.set(key.index(), EInt::new(v));
                            nb.amp /= (n as f64).sqrt();
                            newbranches.push(nb);
                        }
                    } else {
                        newbranches.push(branch);
                    }
                }
                self.branches = newbranches;
                Ok(())
            }
            Val::Weighted(map) => {
                let mut newbranches = Vec::new();
                for branch in std::mem::take(&mut self.branches) {
                    if self.controls.active(&branch) {
                        let norm = weighted_norm(&map, &branch);
                        if norm.sqrt() < self.prune_threshold {
                            return Err(SimError::semantic("state from dictionary has norm 0"));
                        }
                        for (&k, e) in &map {
                            let amp = e.eval(&branch).as_f64() / norm.sqrt();
                            if amp == 0.0 {
                                continue;
                            }
                            let mut nb = branch.clone();
                            nb.set(key.index(), EInt::new(k));
                            nb.amp *= amp;
                            newbranches.push(nb);
                        }
                    } else {
                        newbranches.push(branch);
                    }
                }
                self.branches = newbranches;
                Ok(())
            }
        }
    }

    /// Undo `init(key, val)`: verify the register matches the expected
    /// state and zero it.
    pub fn init_inv(&mut self, key: &Key, val: Val) -> SimResult<()> {
        if self.queues.record(Action::InitInv(key.clone(), val.clone())) {
            return Ok(());
        }
        self.assert_mutable(key)?;

        match val {
            Val::Scalar(expr) => {
                for branch in &self.branches {
                    let target = if self.controls.active(branch) {
                        expr.eval(branch)
                            .as_int()
                            .ok_or_else(|| SimError::type_error("quantum registers can only contain ints"))?
                    } else {
                        EInt::zero()
                    };
                    if branch.get(key.index()) != target {
                        return Err(SimError::semantic(format!(
                            "failed to uncompute: expected {target} but found {}",
                            branch.get(key.index())
                        )));
                    }
                }
                let mut branches = std::mem::take(&mut self.branches);
                for branch in branches.iter_mut() {
                    if self.controls.active(branch) {
                        branch.set(key.index(), EInt::zero());
                    }
                }
                self.branches = branches;
                Ok(())
            }
            Val::Uniform(vals) => {
                check_distinct(&vals)?;
                let n = vals.len();

                let mut untouched = Vec::new();
                let mut grouped: Vec<Branch> = Vec::new();
                for branch in &self.branches {
                    if !self.controls.active(branch) {
                        untouched.push(branch.clone());
                        continue;
                    }
                    if branch.get(key.index()).value() != vals[0] {
                        continue;
                    }
                    let mut b = branch.clone();
                    b.set(key.index(), EInt::zero());
                    grouped.push(b);
                }

                let active_count = self.branches.iter().filter(|b| self.controls.active(b)).count();
                if active_count != grouped.len() * n {
                    return Err(SimError::semantic("failed to clean superposition"));
                }

                for &v in &vals[1..] {
                    let mut found = vec![false; grouped.len()];
                    for branch in &self.branches {
                        if !self.controls.active(branch) {
                            continue;
                        }
                        if branch.get(key.index()).value() != v {
                            continue;
                        }
                        let mut matched = false;
                        for (j, g) in grouped.iter().enumerate() {
                            if found[j] {
                                continue;
                            }
                            if branch.structurally_eq_except(g, key.index())
                                && (branch.amp - g.amp).norm() <= self.structural_tolerance
                            {
                                found[j] = true;
                                matched = true;
                                break;
                            }
                        }
                        if !matched {
                            return Err(SimError::semantic("failed to clean superposition"));
                        }
                    }
                    if found.iter().filter(|f| **f).count() < grouped.len() {
                        return Err(SimError::semantic("failed to clean superposition"));
                    }
                }

                for b in grouped.iter_mut() {
                    b.amp *= (n as f64).sqrt();
                }
                grouped.extend(untouched);
                self.branches = grouped;
                Ok(())
            }
            Val::Weighted(map) => {
                let mut untouched = Vec::new();
                let mut check_branches: Vec<Branch> = Vec::new();
                let mut check_amps: Vec<num_complex::Complex64> = Vec::new();
                let mut newbranches = Vec::new();

                for branch in &self.branches {
                    if !self.controls.active(branch) {
                        untouched.push(branch.clone());
                        continue;
                    }

                    let k = branch.get(key.index()).value();
                    let dict_amp = map
                        .get(&k)
                        .ok_or_else(|| SimError::semantic("failed to clean QRAM"))?
                        .eval(branch)
                        .as_f64();
                    if dict_amp == 0.0 {
                        return Err(SimError::semantic("failed to clean QRAM"));
                    }

                    let norm = weighted_norm(&map, branch);
                    if norm.sqrt() < self.prune_threshold {
                        return Err(SimError::semantic("state from dictionary has norm 0"));
                    }

                    let amp = branch.amp / dict_amp * norm.sqrt();

                    let mut found = false;
                    for (i, cb) in check_branches.iter().enumerate() {
                        if branch.structurally_eq_except(cb, key.index()) {
                            if (check_amps[i] - amp).norm() > self.structural_tolerance {
                                return Err(SimError::semantic("failed to clean QRAM"));
                            }
                            found = true;
                            break;
                        }
                    }
                    if !found {
                        check_branches.push(branch.clone());
                        check_amps.push(amp);

                        let mut nb = branch.clone();
                        nb.set(key.index(), EInt::zero());
                        nb.amp = amp;
                        newbranches.push(nb);
                    }
                }

                newbranches.extend(untouched);
                self.branches = newbranches;
                Ok(())
            }
        }
    }
}

fn weighted_norm(map: &BTreeMap<i128, crate::expr::Expr>, branch: &Branch) -> f64 {
    map.values().map(|e| e.eval(branch).as_f64().powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use crate::expr::Expr;
    use crate::Simulator;

    #[test]
    fn init_rejects_a_float_expression() {
        let mut sim = Simulator::new();
        let a = sim.key();
        sim.alloc(&a).unwrap();
        let err = sim.init(&a, Expr::float(1.5).into()).unwrap_err();
        assert!(matches!(err, crate::SimError::Type(_)));
    }

    #[test]
    fn init_rejects_an_already_nonzero_register() {
        let mut sim = Simulator::new();
        let a = sim.reg(1).unwrap();
        assert!(sim.init(&a, Expr::int(2).into()).is_err());
    }

    #[test]
    fn uniform_init_rejects_repeated_values() {
        let mut sim = Simulator::new();
        let a = sim.key();
        sim.alloc(&a).unwrap();
        assert!(sim.init(&a, vec![1, 1, 2].into()).is_err());
    }
}
