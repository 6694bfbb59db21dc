//! Constructing a [`Simulator`]

use std::collections::BTreeMap;

use crate::branch::Branch;
use crate::consts::{PRUNE_THRESHOLD, STRUCTURAL_TOLERANCE};
use crate::controls::Controls;
use crate::queue::QueueStack;
use crate::Simulator;

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    /// A fresh simulator holding just the vacuum branch.
    pub fn new() -> Self {
        Simulator {
            branches: vec![Branch::vacuum()],
            reg_count: 0,
            next_key_id: 0,
            controls: Controls::new(),
            queues: QueueStack::new(),
            garbage_stack: Vec::new(),
            keyless_piles: Vec::new(),
            named_piles: BTreeMap::new(),
            pile_lookup_stack: Vec::new(),
            mode_stack: Vec::new(),
            prune_threshold: PRUNE_THRESHOLD,
            structural_tolerance: STRUCTURAL_TOLERANCE,
        }
    }

    /// A simulator with non-default pruning/structural-comparison
    /// tolerances, for tests that want to probe threshold boundary behavior.
    pub fn with_thresholds(prune_threshold: f64, structural_tolerance: f64) -> Self {
        Simulator {
            prune_threshold,
            structural_tolerance,
            ..Self::new()
        }
    }
}
