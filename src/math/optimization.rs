pub mod canonical;
pub mod dual_simplex;
pub mod sensitivity;
pub mod tableau;

pub use canonical::{
    CanonicalForm, ColumnKind, Constraint, ConstraintKind, Direction, Problem, SignCheck,
    SignCheckEntry, SignStatus, SignTransformation, VariableSign, VariableTransformation,
};
pub use dual_simplex::{
    DualSimplexSolver, Phase, PivotChoice, PivotKind, PivotStep, ProblemSolution, SolveResult,
    SolveStatus,
};
pub use sensitivity::{Range, SensitivityAnalysis, WhatIf};
pub use tableau::Tableau;

/// Tolerance for feasibility (RHS) and optimality (reduced cost) sign tests.
pub const DEFAULT_FEASIBILITY_TOLERANCE: f64 = 1e-9;

/// Tolerance below which a pivot element or matrix entry counts as zero.
pub const DEFAULT_PIVOT_TOLERANCE: f64 = 1e-12;

/// Default pivot cap before a solve gives up with
/// [`SolveStatus::CycleLimitExceeded`].
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// How the dual phase picks its entering column on the pivot row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DualColumnRule {
    /// Only columns with `a_rj < 0` and `z_j < 0` qualify; the one minimizing
    /// `|z_j / a_rj|` enters. No qualifying column means the problem is
    /// reported infeasible.
    ///
    /// Under this rule `Infeasible` only says the dual phase stalled, not that
    /// the feasible region is empty: `max x1 - x2` with `x2 >= 1, x1 <= 5`
    /// stalls although its optimum is 4. Use [`DualColumnRule::MinimumRatio`]
    /// when an infeasibility report has to be conclusive.
    #[default]
    NegativeReducedCost,
    /// Every column with `a_rj < 0` qualifies. This is the classic rule for a
    /// dual-feasible tableau, e.g. after appending a cut to an optimal one.
    MinimumRatio,
}

/// Configuration shared by every tableau-based solver.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Sign tests on RHS values and reduced costs.
    pub feasibility_tolerance: f64,
    /// Pivot-nonzero checks and matrix inversion.
    pub pivot_tolerance: f64,
    /// Maximum number of pivots per solve.
    pub max_iterations: usize,
    /// Entering-column rule for the dual phase.
    pub dual_rule: DualColumnRule,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            feasibility_tolerance: DEFAULT_FEASIBILITY_TOLERANCE,
            pivot_tolerance: DEFAULT_PIVOT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            dual_rule: DualColumnRule::default(),
        }
    }
}

impl SolverConfig {
    pub fn with_feasibility_tolerance(mut self, tolerance: f64) -> Self {
        self.feasibility_tolerance = tolerance;
        self
    }

    pub fn with_pivot_tolerance(mut self, tolerance: f64) -> Self {
        self.pivot_tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_dual_rule(mut self, rule: DualColumnRule) -> Self {
        self.dual_rule = rule;
        self
    }
}
