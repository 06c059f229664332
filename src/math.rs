pub mod integer_linear;
pub mod optimization;

pub use optimization::{
    CanonicalForm, Constraint, ConstraintKind, Direction, DualColumnRule, DualSimplexSolver,
    Problem, SensitivityAnalysis, SignTransformation, SolveResult, SolveStatus, SolverConfig,
    Tableau, VariableSign,
};

pub use integer_linear::{
    BranchAndBoundSolver, CuttingPlaneSolver, ILPSolution, ILPSolver, ILPStatus, Knapsack,
    KnapsackSolver,
};
