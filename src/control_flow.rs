//! Reversible control-flow blocks: `inv`, `q_if`, `q_while`, `garbage`.
//!
//! Each takes its block body as a closure and runs enter/exit around it,
//! propagating the body's error (if any) ahead of any error from the exit
//! step itself.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{SimError, SimResult};
use crate::expr::{Expr, Key};
use crate::interpreter::arith::ArithOp;
use crate::interpreter::ScopeMode;
use crate::pile::PileName;
use crate::queue::Action;
use crate::Simulator;

impl Simulator {
    /// Run `body` and then replay everything it did, in reverse, with every
    /// primitive inverted. Measurement is forbidden anywhere inside.
    pub fn inv(&mut self, body: impl FnOnce(&mut Self) -> SimResult<()>) -> SimResult<()> {
        self.mode_stack.push(ScopeMode::Inv);
        self.queues.open_scope();

        let result = body(self);

        self.mode_stack.pop();
        let queue = self.queues.close_scope();

        let exit_result = self.call_all_inv(queue);
        result?;
        exit_result
    }

    /// Restrict `body` to branches where `expr` is nonzero.
    pub fn q_if(&mut self, expr: Expr, body: impl FnOnce(&mut Self) -> SimResult<()>) -> SimResult<()> {
        self.do_if(expr.clone())?;
        let result = body(self);
        let exit_result = self.do_if_inv(expr);
        result?;
        exit_result
    }

    pub(crate) fn do_if(&mut self, expr: Expr) -> SimResult<()> {
        if self.queues.record(Action::DoIf(expr.clone())) {
            return Ok(());
        }
        self.controls.push(expr);
        Ok(())
    }

    pub(crate) fn do_if_inv(&mut self, expr: Expr) -> SimResult<()> {
        if self.queues.record(Action::DoIfInv(expr)) {
            return Ok(());
        }
        self.controls.pop();
        Ok(())
    }

    /// Repeat `body`, each pass controlled on `expr`, until `expr` is zero
    /// on every active branch; `key` must be zero on entry and tracks how
    /// many passes each branch has taken so the inverse can replay the
    /// right number of times per branch.
    pub fn q_while(
        &mut self,
        expr: Expr,
        key: &Key,
        body: impl FnOnce(&mut Self) -> SimResult<()>,
    ) -> SimResult<()> {
        self.queues.open_scope();
        let result = body(self);
        let queue = self.queues.close_scope();
        let exit_result = self.do_while(queue, expr, key);
        result?;
        exit_result
    }

    pub(crate) fn do_while(&mut self, queue: Vec<Action>, expr: Expr, key: &Key) -> SimResult<()> {
        if self.queues.record(Action::DoWhile(queue.clone(), expr.clone(), key.clone())) {
            return Ok(());
        }
        self.assert_mutable(key)?;
        for branch in &self.branches {
            if self.controls.active(branch) && branch.get(key.index()).value() != 0 {
                return Err(SimError::semantic(
                    "while loop variable must be initialized to 0",
                ));
            }
        }
        if expr.keys().contains(&key.id()) {
            return Err(SimError::structural(
                "while loop expression cannot depend on loop variable",
            ));
        }

        let mut count: i128 = 0;
        loop {
            let done = self
                .branches
                .iter()
                .filter(|b| self.controls.active(b))
                .all(|b| !expr.eval(b).is_nonzero());
            if done {
                break;
            }

            let step_expr = expr.clone();
            self.q_if(step_expr, |sim| sim.oper(key, Expr::int(1), ArithOp::Add))?;

            let guard = Expr::reg(key).gt(Expr::int(count));
            let q = queue.clone();
            self.q_if(guard, |sim| sim.call_all(q))?;

            count += 1;
        }
        Ok(())
    }

    pub(crate) fn do_while_inv(&mut self, queue: Vec<Action>, expr: Expr, key: &Key) -> SimResult<()> {
        if self
            .queues
            .record(Action::DoWhileInv(queue.clone(), expr.clone(), key.clone()))
        {
            return Ok(());
        }
        self.assert_mutable(key)?;
        if expr.keys().contains(&key.id()) {
            return Err(SimError::structural(
                "while loop expression cannot depend on loop variable",
            ));
        }

        let mut count = self
            .branches
            .iter()
            .filter(|b| self.controls.active(b))
            .map(|b| b.get(key.index()).value())
            .max()
            .unwrap_or(0);

        loop {
            if count == 0 {
                break;
            }
            count -= 1;

            let guard = Expr::reg(key).gt(Expr::int(count));
            let q = queue.clone();
            self.q_if(guard, |sim| sim.call_all_inv(q))?;

            let step_expr = expr.clone();
            self.q_if(step_expr, |sim| sim.oper(key, Expr::int(1), ArithOp::Sub))?;
        }
        Ok(())
    }

    /// Run `body` collecting every key it `reg`s into a garbage pile — the
    /// keyless pile by default, or a named one that persists across calls.
    /// The keyless pile must be empty again by the time `body` returns.
    pub fn garbage(
        &mut self,
        name: Option<&str>,
        body: impl FnOnce(&mut Self) -> SimResult<()>,
    ) -> SimResult<()> {
        if name == Some("keyless") {
            return Err(SimError::structural(
                "'keyless' is a reserved garbage pile key",
            ));
        }
        let pile_name = PileName::from_opt(name);

        match &pile_name {
            PileName::Keyless => self.keyless_piles.push(Rc::new(RefCell::new(Vec::new()))),
            PileName::Named(n) => {
                self.named_piles
                    .entry(n.clone())
                    .or_insert_with(|| Rc::new(RefCell::new(Vec::new())));
            }
        }
        self.garbage_stack.push(pile_name.clone());
        self.queues.open_scope();

        let result = body(self);
        let queue = self.queues.close_scope();

        let pile = match &pile_name {
            PileName::Keyless => self
                .keyless_piles
                .pop()
                .expect("keyless garbage scope is open"),
            PileName::Named(n) => self
                .named_piles
                .get(n)
                .expect("named pile registered on scope entry")
                .clone(),
        };
        self.garbage_stack.pop();

        let exit_result = self.do_garbage(queue, pile, pile_name);
        result?;
        exit_result
    }

    pub(crate) fn do_garbage(
        &mut self,
        queue: Vec<Action>,
        pile: crate::pile::Pile,
        name: PileName,
    ) -> SimResult<()> {
        if self
            .queues
            .record(Action::DoGarbage(queue.clone(), pile.clone(), name.clone()))
        {
            return Ok(());
        }

        self.pile_lookup_stack.push(pile.clone());
        let result = self.call_all(queue);
        self.pile_lookup_stack.pop();
        result?;

        if name == PileName::Keyless && !pile.borrow().is_empty() {
            return Err(SimError::structural(
                "keyless garbage pile terminated non-empty",
            ));
        }
        Ok(())
    }

    pub(crate) fn do_garbage_inv(
        &mut self,
        queue: Vec<Action>,
        pile: crate::pile::Pile,
        name: PileName,
    ) -> SimResult<()> {
        if self
            .queues
            .record(Action::DoGarbageInv(queue.clone(), pile.clone(), name.clone()))
        {
            return Ok(());
        }

        self.queues.open_scope();
        let result = self.call_all_inv(queue);
        let rev_queue = self.queues.close_scope();
        result?;

        self.do_garbage(rev_queue, pile, name)
    }

    /// Assert a named garbage pile is currently empty. Its own inverse.
    pub fn assert_pile_clean(&mut self, name: PileName) -> SimResult<()> {
        if self.queues.record(Action::AssertPileClean(name.clone())) {
            return Ok(());
        }
        match name {
            // The keyless pile is transient: it exists only while a keyless
            // `garbage` scope is open, and `garbage` already requires it be
            // empty on exit, so there is nothing persistent to check here.
            PileName::Keyless => Ok(()),
            PileName::Named(n) => {
                if let Some(pile) = self.named_piles.get(&n) {
                    if !pile.borrow().is_empty() {
                        return Err(SimError::semantic(format!(
                            "garbage pile '{n}' is not clean"
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::Expr;
    use crate::interpreter::arith::ArithOp;
    use crate::Simulator;

    #[test]
    fn while_condition_cannot_depend_on_its_own_key() {
        let mut sim = Simulator::new();
        let counter = sim.reg(0).unwrap();
        let err = sim
            .q_while(Expr::reg(&counter).lt(Expr::int(3)), &counter, |sim| {
                sim.oper(&counter, Expr::int(1), ArithOp::Add)
            })
            .unwrap_err();
        assert!(matches!(err, crate::SimError::Structural(_)));
    }

    #[test]
    fn while_key_must_start_at_zero() {
        let mut sim = Simulator::new();
        let limit = sim.reg(3).unwrap();
        let key = sim.reg(1).unwrap();
        let err = sim
            .q_while(Expr::reg(&limit).gt(Expr::int(0)), &key, |sim| {
                sim.oper(&limit, Expr::int(1), ArithOp::Sub)
            })
            .unwrap_err();
        assert!(matches!(err, crate::SimError::Semantic(_)));
    }

    #[test]
    fn keyless_is_a_reserved_garbage_pile_name() {
        let mut sim = Simulator::new();
        let err = sim.garbage(Some("keyless"), |_| Ok(())).unwrap_err();
        assert!(matches!(err, crate::SimError::Structural(_)));
    }

    #[test]
    fn inv_replays_the_queued_inverse_even_when_the_body_errors() {
        let mut sim = Simulator::new();
        let a = sim.reg(0).unwrap();
        let err = sim
            .inv(|sim| {
                sim.oper(&a, Expr::int(5), ArithOp::Add)?;
                Err(crate::SimError::semantic("boom"))
            })
            .unwrap_err();
        assert!(matches!(err, crate::SimError::Semantic(_)));
        // the queued add was never run live, so the only thing that ever
        // touches the register is its inverted replay on the way out.
        assert_eq!(sim.branches[0].get(a.index()).value(), -5);
    }
}
