//! The action queue stack and the deferred-execution opcode.
//!
//! Every primitive checks whether a queue is currently open (inside `inv`,
//! `q_while`'s body collection, or `garbage`); if so, it records its call as
//! an [`Action`] and returns without running. Inversion, while-body replay,
//! and garbage replay all consume a recorded queue. Inversion is by opcode
//! (`Action::inverted`), never by string manipulation of a name.

use crate::expr::{Expr, Key, Val};
use crate::interpreter::arith::ArithOp;
use crate::pile::{Pile, PileName};

/// One deferred primitive invocation.
#[derive(Clone, Debug)]
pub enum Action {
    Alloc(Key),
    AllocInv(Key),
    Init(Key, Val),
    InitInv(Key, Val),
    PerpInit(Key, Key, Val),
    PerpInitInv(Key, Key, Val),
    Had(Key, Expr),
    Qft(Key, Expr, bool),
    Oper(Key, Expr, ArithOp),
    Phase(Expr),
    Cnot(Key, Expr, Expr),
    DoIf(Expr),
    DoIfInv(Expr),
    DoWhile(Vec<Action>, Expr, Key),
    DoWhileInv(Vec<Action>, Expr, Key),
    DoGarbage(Vec<Action>, Pile, PileName),
    DoGarbageInv(Vec<Action>, Pile, PileName),
    AssertPileClean(PileName),
    Print(Vec<Expr>),
    PrintAmp(Vec<Expr>),
}

impl Action {
    /// Invert this action by opcode. Self-inverse opcodes (`Had`, `Cnot`,
    /// `Print`, `PrintAmp`, `AssertPileClean`) return an identical clone.
    pub fn inverted(self) -> Action {
        match self {
            Action::Alloc(k) => Action::AllocInv(k),
            Action::AllocInv(k) => Action::Alloc(k),
            Action::Init(k, v) => Action::InitInv(k, v),
            Action::InitInv(k, v) => Action::Init(k, v),
            Action::PerpInit(k, o, v) => Action::PerpInitInv(k, o, v),
            Action::PerpInitInv(k, o, v) => Action::PerpInit(k, o, v),
            Action::Had(k, b) => Action::Had(k, b),
            Action::Qft(k, d, inverse) => Action::Qft(k, d, !inverse),
            Action::Oper(k, e, op) => Action::Oper(k, e, op.inverted()),
            Action::Phase(theta) => Action::Phase(theta.neg()),
            Action::Cnot(k, i, j) => Action::Cnot(k, i, j),
            Action::DoIf(e) => Action::DoIfInv(e),
            Action::DoIfInv(e) => Action::DoIf(e),
            Action::DoWhile(q, e, k) => Action::DoWhileInv(q, e, k),
            Action::DoWhileInv(q, e, k) => Action::DoWhile(q, e, k),
            Action::DoGarbage(q, p, n) => Action::DoGarbageInv(q, p, n),
            Action::DoGarbageInv(q, p, n) => Action::DoGarbage(q, p, n),
            Action::AssertPileClean(n) => Action::AssertPileClean(n),
            Action::Print(e) => Action::Print(e),
            Action::PrintAmp(e) => Action::PrintAmp(e),
        }
    }
}

/// Stack of open action queues. Nested scopes (e.g. a `garbage` block
/// inside an `inv` block) each get their own queue; only the innermost one
/// records.
#[derive(Default)]
pub struct QueueStack {
    stack: Vec<Vec<Action>>,
}

impl QueueStack {
    pub fn new() -> Self {
        QueueStack { stack: Vec::new() }
    }

    pub fn is_open(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn open_scope(&mut self) {
        self.stack.push(Vec::new());
    }

    pub fn close_scope(&mut self) -> Vec<Action> {
        self.stack.pop().expect("queue stack underflow")
    }

    /// Record `action` on the innermost open queue, if any. Returns whether
    /// it was recorded (the forward
    /// primitive uses to short-circuit its own execution).
    pub fn record(&mut self, action: Action) -> bool {
        match self.stack.last_mut() {
            Some(queue) => {
                queue.push(action);
                true
            }
            None => false,
        }
    }
}
