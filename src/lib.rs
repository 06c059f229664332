//! Linear and integer programming with a teaching-style transcript: dual
//! simplex, sensitivity analysis, knapsack branch and bound and MIR cutting
//! planes.

pub mod error;
pub mod math;
pub mod output;
pub mod parse;

pub use error::{Error, Result};
pub use math::integer_linear::{ILPSolution, ILPSolver, ILPStatus};
pub use math::optimization::{DualSimplexSolver, Problem, SolverConfig};
pub use output::{BufferSink, NullSink, OutputSink, WriterSink};
