//! Scenario tests exercising several modules together.

use float_cmp::approx_eq;

use crate::expr::Expr;
use crate::interpreter::arith::ArithOp;
use crate::Simulator;

fn prob_of(dist: &[(Vec<f64>, f64, Vec<usize>)], values: &[f64]) -> Option<f64> {
    dist.iter()
        .find(|(v, _, _)| v.as_slice() == values)
        .map(|(_, p, _)| *p)
}

#[test]
fn bell_pair_correlates_two_registers() {
    let mut sim = Simulator::new();
    let a = sim.reg(vec![0, 1]).unwrap();
    let b = sim.reg(0).unwrap();

    sim.q_if(Expr::reg(&a).eq(Expr::int(1)), |sim| {
        sim.oper(&b, Expr::int(1), ArithOp::Add)
    })
    .unwrap();

    let dist = sim.dist(&[Expr::reg(&a), Expr::reg(&b)]);
    assert_eq!(dist.len(), 2);
    assert!(approx_eq!(f64, prob_of(&dist, &[0.0, 0.0]).unwrap(), 0.5, epsilon = 1e-9));
    assert!(approx_eq!(f64, prob_of(&dist, &[1.0, 1.0]).unwrap(), 0.5, epsilon = 1e-9));
    assert!(prob_of(&dist, &[0.0, 1.0]).is_none());
    assert!(prob_of(&dist, &[1.0, 0.0]).is_none());
}

#[test]
fn double_hadamard_is_identity() {
    let mut sim = Simulator::new();
    let a = sim.reg(0).unwrap();

    sim.had(&a, Expr::int(0)).unwrap();
    assert_eq!(sim.branches.len(), 2);

    sim.had(&a, Expr::int(0)).unwrap();
    assert_eq!(sim.branches.len(), 1);

    let dist = sim.dist(&[Expr::reg(&a)]);
    assert_eq!(dist.len(), 1);
    assert_eq!(dist[0].0, vec![0.0]);
    assert!(approx_eq!(f64, dist[0].1, 1.0, epsilon = 1e-9));
}

#[test]
fn qft_spreads_register_over_its_modulus() {
    let mut sim = Simulator::new();
    let a = sim.reg(0).unwrap();

    sim.qft(&a, Expr::int(4), false).unwrap();

    let total: f64 = sim.branches.iter().map(|b| b.amp.norm_sqr()).sum();
    assert!(approx_eq!(f64, total, 1.0, epsilon = 1e-9));
    assert_eq!(sim.branches.len(), 4);

    sim.qft_inv(&a, Expr::int(4), false).unwrap();
    assert_eq!(sim.branches.len(), 1);
    assert_eq!(sim.branches[0].get(a.index()).value(), 0);
}

#[test]
fn measure_state_projects_onto_named_outcome() {
    let mut sim = Simulator::new();
    let a = sim.reg(vec![0, 1, 2, 3]).unwrap();

    let outcome = sim
        .measure_state(&a, Expr::int(1).into(), Some(true))
        .unwrap();
    assert!(outcome.outcome);
    assert!(approx_eq!(f64, outcome.prob, 0.25, epsilon = 1e-9));
    assert_eq!(sim.branches.len(), 1);
    assert_eq!(sim.branches[0].get(a.index()).value(), 1);
}

#[test]
fn while_loop_counts_bits_of_a_register() {
    // a = 0b101; walk its low three bits with a separate counter as the
    // loop key (the while condition may not itself depend on the key).
    let mut sim = Simulator::new();
    let a = sim.reg(5).unwrap();
    let count = sim.reg(0).unwrap();
    let remaining = sim.reg(3).unwrap();
    let idx = sim.reg(0).unwrap();

    sim.q_while(Expr::reg(&remaining).ne(Expr::int(0)), &idx, |sim| {
        let bitpos = Expr::reg(&idx).sub(Expr::int(1));
        sim.q_if(Expr::bit(&a, bitpos).eq(Expr::int(1)), |sim| {
            sim.oper(&count, Expr::int(1), ArithOp::Add)
        })?;
        sim.oper(&remaining, Expr::int(1), ArithOp::Sub)
    })
    .unwrap();

    assert_eq!(sim.branches[0].get(count.index()).value(), 2);
}

#[test]
fn garbage_scope_requires_ancilla_cleanup() {
    let mut sim = Simulator::new();
    let a = sim.reg(3).unwrap();
    let b = sim.reg(0).unwrap();

    sim.garbage(None, |sim| {
        let ancilla = sim.reg(Expr::reg(&a).into())?;
        sim.oper(&b, Expr::reg(&ancilla), ArithOp::Add)?;
        sim.clean(&ancilla, Expr::reg(&a).into())
    })
    .unwrap();

    assert_eq!(sim.branches[0].get(b.index()).value(), 3);
}

#[test]
fn postselect_rejects_impossible_condition() {
    let mut sim = Simulator::new();
    let a = sim.reg(0).unwrap();
    let err = sim.postselect(&Expr::reg(&a).eq(Expr::int(1)));
    assert!(err.is_err());
}
