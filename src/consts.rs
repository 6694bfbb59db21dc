//! Simulator-wide tunable constants

/// Branches with amplitude magnitude below this are pruned, and it is the
/// minimum norm/probability treated as nonzero.
pub const PRUNE_THRESHOLD: f64 = 1e-10;

/// Absolute tolerance used when comparing amplitudes or branch fields for
/// structural equality (merge detection, uncompute verification).
pub const STRUCTURAL_TOLERANCE: f64 = 1e-10;

/// Decimal places floating-point expression values are rounded to before
/// being grouped in [`crate::measure::dist`].
pub const DIST_ROUNDING: i32 = 10;

/// Decimal places probabilities are rounded to for display in `print`.
pub const PRINT_PROB_ROUNDING: i32 = 5;

/// Decimal places amplitude magnitudes are rounded to for display in
/// `print_amp`.
pub const PRINT_AMP_ROUNDING: i32 = 5;
