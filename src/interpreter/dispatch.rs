//! Replaying recorded [`Action`]s by opcode match, with inversion going
//! through `Action::inverted` rather than a separate code path per action.

use crate::error::SimResult;
use crate::queue::Action;
use crate::Simulator;

impl Simulator {
    /// Run a recorded action forward.
    pub(crate) fn call(&mut self, action: Action) -> SimResult<()> {
        match action {
            Action::Alloc(k) => self.alloc(&k),
            Action::AllocInv(k) => self.alloc_inv(&k),
            Action::Init(k, v) => self.init(&k, v),
            Action::InitInv(k, v) => self.init_inv(&k, v),
            Action::PerpInit(k, o, v) => self.perp_init(&k, &o, v),
            Action::PerpInitInv(k, o, v) => self.perp_init_inv(&k, &o, v),
            Action::Had(k, b) => self.had(&k, b),
            Action::Qft(k, d, inverse) => self.qft(&k, d, inverse),
            Action::Oper(k, e, op) => self.oper(&k, e, op),
            Action::Phase(theta) => self.phase(theta),
            Action::Cnot(k, i, j) => self.cnot(&k, i, j),
            Action::DoIf(e) => self.do_if(e),
            Action::DoIfInv(e) => self.do_if_inv(e),
            Action::DoWhile(q, e, k) => self.do_while(q, e, &k),
            Action::DoWhileInv(q, e, k) => self.do_while_inv(q, e, &k),
            Action::DoGarbage(q, p, n) => self.do_garbage(q, p, n),
            Action::DoGarbageInv(q, p, n) => self.do_garbage_inv(q, p, n),
            Action::AssertPileClean(n) => self.assert_pile_clean(n),
            Action::Print(exprs) => self.print(&exprs),
            Action::PrintAmp(exprs) => self.print_amp(&exprs),
        }
    }

    /// Run a recorded action's inverse, by opcode.
    pub(crate) fn call_inv(&mut self, action: Action) -> SimResult<()> {
        self.call(action.inverted())
    }

    /// Run a whole recorded queue forward, in order.
    pub(crate) fn call_all(&mut self, queue: Vec<Action>) -> SimResult<()> {
        for action in queue {
            self.call(action)?;
        }
        Ok(())
    }

    /// Run a whole recorded queue's inverse, in reverse order.
    pub(crate) fn call_all_inv(&mut self, queue: Vec<Action>) -> SimResult<()> {
        for action in queue.into_iter().rev() {
            self.call_inv(action)?;
        }
        Ok(())
    }
}
