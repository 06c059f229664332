//! Integer programming on top of the dual simplex: knapsack branch and bound,
//! general branch and bound over LP relaxations, and MIR cutting planes.

use std::fmt;

use num_traits::Float;

use crate::error::Result;
use crate::math::optimization::Problem;
use crate::output::OutputSink;

pub mod branch_and_bound;
pub mod knapsack;
pub mod mixed_integer_rounding;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone)]
pub struct ILPSolution {
    /// One value per problem variable; empty when no solution was found.
    pub values: Vec<f64>,
    pub objective_value: f64,
    pub status: ILPStatus,
    /// Search nodes (or cutting rounds) spent.
    pub nodes: usize,
}

impl ILPSolution {
    pub(crate) fn without_values(status: ILPStatus, objective_value: f64, nodes: usize) -> Self {
        Self {
            values: Vec::new(),
            objective_value,
            status,
            nodes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ILPStatus {
    Optimal,
    Infeasible,
    Unbounded,
    MaxIterationsReached,
}

impl fmt::Display for ILPStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ILPStatus::Optimal => "optimal",
            ILPStatus::Infeasible => "infeasible",
            ILPStatus::Unbounded => "unbounded",
            ILPStatus::MaxIterationsReached => "iteration limit reached",
        };
        write!(f, "{name}")
    }
}

pub trait ILPSolver {
    fn solve(&self, problem: &Problem, sink: &mut dyn OutputSink) -> Result<ILPSolution>;
}

/// `true` when `value` is within `tolerance` of an integer.
pub fn is_integral<T: Float>(value: T, tolerance: T) -> bool {
    (value - value.round()).abs() < tolerance
}

pub use branch_and_bound::BranchAndBoundSolver;
pub use knapsack::{BranchOptions, Knapsack, KnapsackSolution, KnapsackSolver};
pub use mixed_integer_rounding::{CutOutcome, CuttingPlaneGenerator, CuttingPlaneSolver, MirCut};
