//! Measurement, postselection, and printing.
//!
//! Every entry point here refuses to run while any reversible scope
//! (`inv`) is open — collapsing or observing the superposition mid-replay
//! would make the replay meaningless.

use num_complex::Complex64;

use crate::branch::RegId;
use crate::consts::{DIST_ROUNDING, PRINT_AMP_ROUNDING, PRINT_PROB_ROUNDING};
use crate::error::{SimError, SimResult};
use crate::expr::{Expr, Key, Val};
use crate::queue::Action;
use crate::Simulator;

fn round_to(x: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (x * scale).round() / scale
}

/// Every register id `expr` reads, resolved through its `Key` handles'
/// *current* allocation (controls are keys, but branch comparison
/// needs concrete register ids).
fn collect_regs(expr: &Expr, out: &mut Vec<RegId>) {
    match expr {
        Expr::ConstInt(_) | Expr::ConstFloat(_) => {}
        Expr::Reg(key) => out.push(key.index()),
        Expr::Bit(key, idx) => {
            out.push(key.index());
            collect_regs(idx, out);
        }
        Expr::Add(a, b)
        | Expr::Sub(a, b)
        | Expr::Mul(a, b)
        | Expr::Rem(a, b)
        | Expr::Eq(a, b)
        | Expr::Ne(a, b)
        | Expr::Lt(a, b)
        | Expr::Le(a, b)
        | Expr::Gt(a, b)
        | Expr::Ge(a, b)
        | Expr::And(a, b)
        | Expr::Or(a, b) => {
            collect_regs(a, out);
            collect_regs(b, out);
        }
        Expr::Neg(a) | Expr::Not(a) => collect_regs(a, out),
    }
}

impl Simulator {
    /// Assert no reversible scope is currently open ("all
    /// measurement operations reject invocation while any reversible scope
    /// is open").
    fn assert_top_level(&self) -> SimResult<()> {
        if !self.mode_stack.is_empty() {
            return Err(SimError::structural("can only measure at top level"));
        }
        Ok(())
    }

    /// The probability distribution of `exprs` (jointly, if more than one)
    /// over the current superposition, sorted by value. Returns, for each
    /// distinct outcome, its probability and the indices of the branches
    /// realizing it.
    pub fn dist(&self, exprs: &[Expr]) -> Vec<(Vec<f64>, f64, Vec<usize>)> {
        let mut values: Vec<Vec<f64>> = Vec::new();
        let mut configs: Vec<Vec<usize>> = Vec::new();
        let mut probs: Vec<f64> = Vec::new();

        for (i, branch) in self.branches.iter().enumerate() {
            let val: Vec<f64> = exprs
                .iter()
                .map(|e| round_to(e.eval(branch).as_f64(), DIST_ROUNDING))
                .collect();

            if let Some(idx) = values.iter().position(|v| v == &val) {
                configs[idx].push(i);
                probs[idx] += branch.amp.norm_sqr();
            } else {
                values.push(val);
                configs.push(vec![i]);
                probs.push(branch.amp.norm_sqr());
            }
        }

        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| {
            values[a]
                .partial_cmp(&values[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        order
            .into_iter()
            .map(|i| (values[i].clone(), probs[i], configs[i].clone()))
            .collect()
    }

    /// Sample a value for `exprs`, collapsing the superposition onto the
    /// branches that realize it.
    pub fn measure(&mut self, exprs: &[Expr]) -> SimResult<Vec<f64>> {
        self.assert_top_level()?;

        let dist = self.dist(exprs);
        let r: f64 = rand::random();
        let mut cumul = 0.0;
        let mut pick = dist.len() - 1;
        for (i, (_, prob, _)) in dist.iter().enumerate() {
            if cumul + prob > r {
                pick = i;
                break;
            }
            cumul += prob;
        }

        let (values, prob, configs) = &dist[pick];
        self.branches = configs.iter().map(|&i| self.branches[i].clone()).collect();
        let scale = prob.sqrt();
        for branch in self.branches.iter_mut() {
            branch.amp /= scale;
        }
        Ok(values.clone())
    }

    /// Collapse onto the branches where `expr` is nonzero, returning the
    /// surviving probability mass. Fails if none survive.
    pub fn postselect(&mut self, expr: &Expr) -> SimResult<f64> {
        self.assert_top_level()?;

        let mut newbranches = Vec::new();
        let mut prob = 0.0;
        for branch in &self.branches {
            if expr.eval(branch).is_nonzero() {
                prob += branch.amp.norm_sqr();
                newbranches.push(branch.clone());
            }
        }
        if newbranches.is_empty() {
            return Err(SimError::semantic("postselection failed"));
        }
        let scale = prob.sqrt();
        for branch in newbranches.iter_mut() {
            branch.amp /= scale;
        }
        self.branches = newbranches;
        Ok(prob)
    }

    /// Measure whether `key` currently holds `val`, collapsing accordingly.
    /// With `postselect` set, forces the named outcome (failing if its
    /// probability is below threshold) instead of sampling.
    pub fn measure_state(
        &mut self,
        key: &Key,
        val: Val,
        postselect: Option<bool>,
    ) -> SimResult<MeasureOutcome> {
        self.assert_top_level()?;
        self.assert_mutable(key)?;

        match val {
            Val::Scalar(expr) => {
                if expr.is_float() {
                    return Err(SimError::type_error(
                        "quantum registers can only contain ints",
                    ));
                }
                if expr.keys().contains(&key.id()) {
                    return Err(SimError::structural(
                        "can't measure target with state that depends on target",
                    ));
                }

                let mut prob = 0.0;
                for branch in &self.branches {
                    if branch.get(key.index()) == expr.eval(branch).as_int().expect("checked not-float above") {
                        prob += branch.amp.norm_sqr();
                    }
                }

                let outcome = self.resolve_outcome(prob, postselect)?;

                let newbranches: Vec<_> = self
                    .branches
                    .iter()
                    .filter(|b| {
                        (b.get(key.index()) == expr.eval(b).as_int().expect("checked not-float above")) == outcome
                    })
                    .cloned()
                    .collect();

                let collapsed_prob = if outcome { prob } else { 1.0 - prob };
                self.branches = newbranches;
                let scale = collapsed_prob.sqrt();
                for branch in self.branches.iter_mut() {
                    branch.amp /= scale;
                }

                Ok(MeasureOutcome { outcome, prob: collapsed_prob })
            }
            Val::Uniform(vals) => {
                let n = vals.len() as f64;

                let mut prob = Complex64::new(0.0, 0.0);
                for b1 in &self.branches {
                    for b2 in &self.branches {
                        for &vi in &vals {
                            for &vj in &vals {
                                if b1.get(key.index()).value() == vi
                                    && b2.get(key.index()).value() == vj
                                {
                                    prob += b1.amp * b2.amp.conj();
                                }
                            }
                        }
                    }
                }
                let prob = prob.re / n;

                let outcome = self.resolve_outcome(prob, postselect)?;

                let mut newbranches = Vec::new();
                for branch in &self.branches {
                    for &vj in &vals {
                        let mut amp = Complex64::new(0.0, 0.0);
                        for &vi in &vals {
                            if branch.get(key.index()).value() == vi {
                                if outcome {
                                    amp += branch.amp / n;
                                } else {
                                    amp += branch.amp
                                        * (if vi == vj { 1.0 } else { 0.0 } - 1.0 / n);
                                }
                            }
                        }
                        if amp == Complex64::new(0.0, 0.0) {
                            continue;
                        }
                        let mut br = branch.clone();
                        br.amp = amp;
                        br.set(key.index(), crate::eint::EInt::new(vj));
                        crate::merge::insert_merging(&mut newbranches, br);
                    }
                }

                let collapsed_prob = if outcome { prob } else { 1.0 - prob };
                self.branches = newbranches;
                let scale = collapsed_prob.sqrt();
                for branch in self.branches.iter_mut() {
                    branch.amp /= scale;
                }
                self.prune();

                Ok(MeasureOutcome { outcome, prob: collapsed_prob })
            }
            Val::Weighted(map) => {
                for e in map.values() {
                    if e.keys().contains(&key.id()) {
                        return Err(SimError::structural(
                            "can't measure target with state that depends on target",
                        ));
                    }
                }

                let mut controls_regs = Vec::new();
                for e in map.values() {
                    collect_regs(e, &mut controls_regs);
                }
                controls_regs.sort();
                controls_regs.dedup();

                let mut prob = Complex64::new(0.0, 0.0);
                for b1 in &self.branches {
                    for b2 in &self.branches {
                        let good = controls_regs.iter().all(|&r| b1.get(r) == b2.get(r));
                        if !good {
                            continue;
                        }

                        let norm: f64 = map.values().map(|e| e.eval(b1).as_f64().powi(2)).sum();
                        if norm.sqrt() < self.prune_threshold {
                            return Err(SimError::semantic("state from dictionary has norm 0"));
                        }

                        for (&k1, e1) in &map {
                            for (&k2, e2) in &map {
                                if b1.get(key.index()).value() == k1
                                    && b2.get(key.index()).value() == k2
                                {
                                    prob += b1.amp
                                        * b2.amp.conj()
                                        * e2.eval(b1).as_f64()
                                        * e1.eval(b1).as_f64()
                                        / norm;
                                }
                            }
                        }
                    }
                }
                let prob = prob.re;

                let outcome = self.resolve_outcome(prob, postselect)?;

                let mut newbranches = Vec::new();
                for branch in &self.branches {
                    let norm: f64 = map.values().map(|e| e.eval(branch).as_f64().powi(2)).sum();

                    for (&k1, e1) in &map {
                        let mut amp = Complex64::new(0.0, 0.0);
                        for (&k2, e2) in &map {
                            if branch.get(key.index()).value() == k2 {
                                let proj =
                                    e2.eval(branch).as_f64() * e1.eval(branch).as_f64() / norm;
                                if outcome {
                                    amp += branch.amp * proj;
                                } else {
                                    amp += branch.amp * (if k1 == k2 { 1.0 } else { 0.0 } - proj);
                                }
                            }
                        }
                        if amp == Complex64::new(0.0, 0.0) {
                            continue;
                        }
                        let mut br = branch.clone();
                        br.amp = amp;
                        br.set(key.index(), crate::eint::EInt::new(k1));
                        crate::merge::insert_merging(&mut newbranches, br);
                    }
                }

                let collapsed_prob = if outcome { prob } else { 1.0 - prob };
                self.branches = newbranches;
                let scale = collapsed_prob.sqrt();
                for branch in self.branches.iter_mut() {
                    branch.amp /= scale;
                }
                self.prune();

                Ok(MeasureOutcome { outcome, prob: collapsed_prob })
            }
        }
    }

    fn resolve_outcome(&self, prob: f64, postselect: Option<bool>) -> SimResult<bool> {
        match postselect {
            None => Ok(rand::random::<f64>() < prob),
            Some(want) => {
                if want && prob < self.prune_threshold {
                    return Err(SimError::semantic("postselection failed"));
                }
                if !want && prob > 1.0 - self.prune_threshold {
                    return Err(SimError::semantic("postselection failed"));
                }
                Ok(want)
            }
        }
    }

    /// Print the distribution of `exprs` (jointly, if more than one) as
    /// `<val> w.p. <prob>` lines.
    pub fn print(&mut self, exprs: &[Expr]) -> SimResult<()> {
        if self.queues.record(Action::Print(exprs.to_vec())) {
            return Ok(());
        }

        for (vals, prob, _) in self.dist(exprs) {
            let val_str = vals
                .iter()
                .map(|v| format_val(*v))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{val_str} w.p. {}", round_to(prob, PRINT_PROB_ROUNDING));
        }
        Ok(())
    }

    /// `print` is its own inverse.
    pub fn print_inv(&mut self, exprs: &[Expr]) -> SimResult<()> {
        self.print(exprs)
    }

    /// Print the per-branch amplitudes of `exprs` as `<val> w.a. <amp>, ...`
    /// lines, in a fixed format.
    pub fn print_amp(&mut self, exprs: &[Expr]) -> SimResult<()> {
        if self.queues.record(Action::PrintAmp(exprs.to_vec())) {
            return Ok(());
        }

        let mut values: Vec<Vec<f64>> = Vec::new();
        let mut amplitudes: Vec<Vec<Complex64>> = Vec::new();

        for branch in &self.branches {
            let val: Vec<f64> = exprs
                .iter()
                .map(|e| round_to(e.eval(branch).as_f64(), DIST_ROUNDING))
                .collect();
            if let Some(idx) = values.iter().position(|v| v == &val) {
                amplitudes[idx].push(branch.amp);
            } else {
                values.push(val);
                amplitudes.push(vec![branch.amp]);
            }
        }

        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| {
            values[a]
                .partial_cmp(&values[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for i in order {
            let val_str = values[i]
                .iter()
                .map(|v| format_val(*v))
                .collect::<Vec<_>>()
                .join(" ");
            let amps = amplitudes[i]
                .iter()
                .map(|a| show_amp(*a))
                .collect::<Vec<_>>()
                .join(", ");
            println!("{val_str} w.a. {amps}");
        }
        Ok(())
    }

    /// `print_amp` is its own inverse.
    pub fn print_amp_inv(&mut self, exprs: &[Expr]) -> SimResult<()> {
        self.print_amp(exprs)
    }
}

/// Outcome of `measure_state`: whether `key` was found to hold `val`, and
/// the probability mass of whichever branch was collapsed onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasureOutcome {
    pub outcome: bool,
    pub prob: f64,
}

fn format_val(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

fn show_amp(a: Complex64) -> String {
    let (r, phi) = a.to_polar();
    let r = round_to(r, PRINT_AMP_ROUNDING);
    if phi == 0.0 {
        return format!("{r}");
    }

    let rounded = round_to(phi / std::f64::consts::PI, 10);
    if round_to(rounded, 5) == rounded {
        let as_int = rounded as i64;
        if as_int == -1 || as_int == 1 {
            return format!("-{r}");
        } else if rounded == 0.5 {
            return format!("1j*{r}");
        } else if rounded == -0.5 {
            return format!("-1j*{r}");
        } else if rounded == 0.0 {
            return format!("{r}");
        } else {
            return format!("{r}*e^({rounded}*pi*i)");
        }
    }

    format!("{r}*e^(i*{phi})")
}
