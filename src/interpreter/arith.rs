//! Arithmetic operations for [`crate::Simulator::oper`]
//!
//! Each operation is a small pure function over register values rather
//! than a closure, so an `oper` call can be recorded on an action queue
//! and later inverted by opcode rather than by name-suffix convention.

use num_complex::Complex64;

use crate::eint::EInt;
use crate::error::{SimError, SimResult};
use crate::expr::{Expr, Key};
use crate::queue::Action;
use crate::Simulator;

/// A classical bijection `(current, rhs) -> next` used by `oper`, together
/// with its inverse. `Add`/`Sub`/`Xor` cover the common compound-assignment
/// forms (`+=`, `-=`, `^=`); `Custom` accepts any user-supplied bijection
/// pair for anything else.
#[derive(Clone, Copy)]
pub enum ArithOp {
    Add,
    Sub,
    Xor,
    Custom {
        name: &'static str,
        forward: fn(EInt, EInt) -> EInt,
        inverse: fn(EInt, EInt) -> EInt,
    },
}

impl std::fmt::Debug for ArithOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArithOp::Add => write!(f, "Add"),
            ArithOp::Sub => write!(f, "Sub"),
            ArithOp::Xor => write!(f, "Xor"),
            ArithOp::Custom { name, .. } => write!(f, "Custom({name})"),
        }
    }
}

impl ArithOp {
    /// Apply the forward direction: `cur op rhs`.
    pub fn apply(&self, cur: EInt, rhs: EInt) -> EInt {
        match self {
            ArithOp::Add => cur + rhs,
            ArithOp::Sub => cur - rhs,
            ArithOp::Xor => EInt::new(cur.value() ^ rhs.value()),
            ArithOp::Custom { forward, .. } => forward(cur, rhs),
        }
    }

    /// Apply the inverse direction: undoes `apply`.
    pub fn unapply(&self, cur: EInt, rhs: EInt) -> EInt {
        match self {
            ArithOp::Add => cur - rhs,
            ArithOp::Sub => cur + rhs,
            ArithOp::Xor => EInt::new(cur.value() ^ rhs.value()),
            ArithOp::Custom { inverse, .. } => inverse(cur, rhs),
        }
    }

    /// The opcode with `forward`/`inverse` swapped (`oper_inv`
    /// swaps `do`/`undo`).
    pub fn inverted(&self) -> ArithOp {
        match self {
            ArithOp::Add => ArithOp::Sub,
            ArithOp::Sub => ArithOp::Add,
            ArithOp::Xor => ArithOp::Xor,
            ArithOp::Custom {
                name,
                forward,
                inverse,
            } => ArithOp::Custom {
                name,
                forward: *inverse,
                inverse: *forward,
            },
        }
    }
}

impl Simulator {
    /// Mutate `key` on every active branch by `op`, applied against `expr`.
    /// `expr` may not read `key` itself.
    pub fn oper(&mut self, key: &Key, expr: Expr, op: ArithOp) -> SimResult<()> {
        if self
            .queues
            .record(Action::Oper(key.clone(), expr.clone(), op))
        {
            return Ok(());
        }
        self.assert_mutable(key)?;
        if expr.keys().contains(&key.id()) {
            return Err(SimError::structural(
                "can't modify target based on expression that depends on target",
            ));
        }

        let mut branches = std::mem::take(&mut self.branches);
        for branch in branches.iter_mut() {
            if self.controls.active(branch) {
                let rhs = expr
                    .eval(branch)
                    .as_int()
                    .ok_or_else(|| SimError::type_error("quantum registers can only contain ints"))?;
                let cur = branch.get(key.index());
                branch.set(key.index(), op.apply(cur, rhs));
            }
        }
        self.branches = branches;
        Ok(())
    }

    /// Undo `oper(key, expr, op)` by applying `op`'s inverse direction.
    pub fn oper_inv(&mut self, key: &Key, expr: Expr, op: ArithOp) -> SimResult<()> {
        if self
            .queues
            .record(Action::Oper(key.clone(), expr.clone(), op.inverted()))
        {
            return Ok(());
        }
        self.assert_mutable(key)?;
        if expr.keys().contains(&key.id()) {
            return Err(SimError::structural(
                "can't modify target based on expression that depends on target",
            ));
        }

        let mut branches = std::mem::take(&mut self.branches);
        for branch in branches.iter_mut() {
            if self.controls.active(branch) {
                let rhs = expr
                    .eval(branch)
                    .as_int()
                    .ok_or_else(|| SimError::type_error("quantum registers can only contain ints"))?;
                let cur = branch.get(key.index());
                branch.set(key.index(), op.unapply(cur, rhs));
            }
        }
        self.branches = branches;
        Ok(())
    }

    /// Multiply `amp` by `exp(i * theta)` on every active branch.
    pub fn phase(&mut self, theta: Expr) -> SimResult<()> {
        if self.queues.record(Action::Phase(theta.clone())) {
            return Ok(());
        }

        let mut branches = std::mem::take(&mut self.branches);
        for branch in branches.iter_mut() {
            if self.controls.active(branch) {
                let angle = theta.eval(branch).as_f64();
                branch.amp *= Complex64::from_polar(1.0, angle);
            }
        }
        self.branches = branches;
        Ok(())
    }

    /// Undo `phase(theta)` by negating the angle.
    pub fn phase_inv(&mut self, theta: Expr) -> SimResult<()> {
        self.phase(theta.neg())
    }

    /// `phase(theta * pi)`.
    pub fn phase_pi(&mut self, theta: Expr) -> SimResult<()> {
        self.phase(theta.mul(Expr::float(std::f64::consts::PI)))
    }

    /// `phase(2 * theta * pi)`.
    pub fn phase_2pi(&mut self, theta: Expr) -> SimResult<()> {
        self.phase(theta.mul(Expr::float(2.0 * std::f64::consts::PI)))
    }

    /// Flip bit `idx2` of `key` when bit `idx1` is 1. Its own
    /// inverse. `idx1`/`idx2` may not read `key`, and must not coincide.
    pub fn cnot(&mut self, key: &Key, idx1: Expr, idx2: Expr) -> SimResult<()> {
        if self
            .queues
            .record(Action::Cnot(key.clone(), idx1.clone(), idx2.clone()))
        {
            return Ok(());
        }
        self.assert_mutable(key)?;
        if idx1.keys().contains(&key.id()) || idx2.keys().contains(&key.id()) {
            return Err(SimError::structural(
                "can't modify target based on expression that depends on target",
            ));
        }

        let mut branches = std::mem::take(&mut self.branches);
        for branch in branches.iter_mut() {
            if self.controls.active(branch) {
                let i1 = idx1.eval(branch).as_f64() as u32;
                let i2 = idx2.eval(branch).as_f64() as u32;
                if i1 == i2 {
                    self.branches = branches;
                    return Err(SimError::structural(
                        "can't perform cnot from index to itself",
                    ));
                }
                let mut v = branch.get(key.index());
                if v.bit(i1) == 1 {
                    let flipped = 1 - v.bit(i2);
                    v.set_bit(i2, flipped);
                    branch.set(key.index(), v);
                }
            }
        }
        self.branches = branches;
        Ok(())
    }

    /// `cnot` is its own inverse.
    pub fn cnot_inv(&mut self, key: &Key, idx1: Expr, idx2: Expr) -> SimResult<()> {
        self.cnot(key, idx1, idx2)
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::Expr;
    use crate::Simulator;

    #[test]
    fn cnot_rejects_equal_indices() {
        let mut sim = Simulator::new();
        let a = sim.reg(3).unwrap();
        let err = sim.cnot(&a, Expr::int(0), Expr::int(0)).unwrap_err();
        assert!(matches!(err, crate::SimError::Structural(_)));
    }

    #[test]
    fn oper_add_then_sub_round_trips() {
        let mut sim = Simulator::new();
        let a = sim.reg(5).unwrap();
        sim.oper(&a, Expr::int(3), ArithOp::Add).unwrap();
        assert_eq!(sim.branches[0].get(a.index()).value(), 8);
        sim.oper_inv(&a, Expr::int(3), ArithOp::Add).unwrap();
        assert_eq!(sim.branches[0].get(a.index()).value(), 5);
    }
}
