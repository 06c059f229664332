use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::math::integer_linear::{
    BranchAndBoundSolver, BranchOptions, CuttingPlaneSolver, ILPSolver, ILPStatus, Knapsack,
    KnapsackSolver,
};
use crate::math::optimization::{ConstraintKind, Problem, VariableSign};
use crate::output::NullSink;

fn knapsack_problem() -> Problem {
    Problem::maximize(vec![2.0, 3.0, 3.0, 5.0, 2.0, 4.0])
        .subject_to(
            vec![11.0, 8.0, 6.0, 14.0, 10.0, 10.0],
            ConstraintKind::Le,
            40.0,
        )
        .with_signs(vec![VariableSign::Binary; 6])
}

fn random_knapsack(rng: &mut StdRng) -> Knapsack {
    let n = rng.gen_range(1..=10);
    let values = (0..n).map(|_| rng.gen_range(1..=20) as f64).collect();
    let weights = (0..n).map(|_| rng.gen_range(1..=15) as f64).collect();
    let capacity = rng.gen_range(0..=40) as f64;
    Knapsack::new(values, weights, capacity).unwrap()
}

#[test]
fn test_bounded_search_matches_exhaustive_on_random_instances() {
    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..50 {
        let knapsack = random_knapsack(&mut rng);
        let naive = knapsack.solve_exhaustive();
        let bounded = knapsack.branch_and_bound(&BranchOptions::default(), &mut NullSink);
        let unpruned = knapsack.branch_and_bound(
            &BranchOptions {
                prune: false,
                ..BranchOptions::default()
            },
            &mut NullSink,
        );

        assert_eq!(bounded.best_value, naive.best_value);
        assert_eq!(unpruned.best_value, naive.best_value);
        assert!(bounded.total_weight <= knapsack.capacity());
        assert!(naive.total_weight <= knapsack.capacity());
    }
}

#[test]
fn test_knapsack_solvers_agree() {
    let problem = knapsack_problem();
    let solvers: Vec<(&str, Box<dyn ILPSolver>)> = vec![
        ("knapsack", Box::new(KnapsackSolver::default())),
        ("branch and bound", Box::new(BranchAndBoundSolver::default())),
    ];

    for (name, solver) in solvers {
        let solution = solver.solve(&problem, &mut NullSink).unwrap();
        assert_eq!(solution.status, ILPStatus::Optimal, "{name}");
        assert_abs_diff_eq!(solution.objective_value, 15.0, epsilon = 1e-6);
        let weight: f64 = solution
            .values
            .iter()
            .zip(&problem.constraints[0].coefficients)
            .map(|(x, w)| x * w)
            .sum();
        assert!(weight <= 40.0 + 1e-6, "{name}");
    }
}

#[test]
fn test_branch_and_bound_and_cuts_agree() {
    let problem = Problem::maximize(vec![0.0, 1.0])
        .subject_to(vec![3.0, 2.0], ConstraintKind::Le, 6.0)
        .subject_to(vec![-3.0, 2.0], ConstraintKind::Le, 0.0)
        .with_signs(vec![VariableSign::Integer; 2]);

    let branched = BranchAndBoundSolver::default().solve(&problem, &mut NullSink).unwrap();
    let cut = CuttingPlaneSolver::default().solve(&problem, &mut NullSink).unwrap();

    assert_eq!(branched.status, ILPStatus::Optimal);
    assert_eq!(cut.status, ILPStatus::Optimal);
    assert_abs_diff_eq!(branched.objective_value, 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(cut.objective_value, branched.objective_value, epsilon = 1e-6);
}

#[test]
fn test_branch_and_bound_and_cuts_agree_with_fractional_bounds() {
    let pure = Problem::maximize(vec![1.0, 1.0])
        .subject_to(vec![1.0, 0.0], ConstraintKind::Le, 1.5)
        .subject_to(vec![0.0, 1.0], ConstraintKind::Le, 2.0)
        .with_signs(vec![VariableSign::Integer; 2]);
    let mixed = Problem::maximize(vec![1.0, 1.0])
        .subject_to(vec![0.0, 1.0], ConstraintKind::Le, 0.5)
        .subject_to(vec![1.0, 0.0], ConstraintKind::Le, 1.5)
        .with_signs(vec![VariableSign::Integer, VariableSign::Positive]);

    for (problem, expected) in [(pure, 3.0), (mixed, 1.5)] {
        let branched = BranchAndBoundSolver::default().solve(&problem, &mut NullSink).unwrap();
        let cut = CuttingPlaneSolver::default().solve(&problem, &mut NullSink).unwrap();

        assert_eq!(branched.status, ILPStatus::Optimal);
        assert_eq!(cut.status, ILPStatus::Optimal);
        assert_abs_diff_eq!(branched.objective_value, expected, epsilon = 1e-6);
        assert_abs_diff_eq!(cut.objective_value, expected, epsilon = 1e-6);
        assert_abs_diff_eq!(cut.values[0], 1.0, epsilon = 1e-6);
    }
}

#[test]
fn test_minimization_branch_and_bound() {
    // min x1 + x2 with 2x1 + 2x2 >= 3: the relaxation gives 1.5, integers give 2
    let problem = Problem::minimize(vec![1.0, 1.0])
        .subject_to(vec![2.0, 2.0], ConstraintKind::Ge, 3.0)
        .with_signs(vec![VariableSign::Integer; 2]);

    let solution = BranchAndBoundSolver::default().solve(&problem, &mut NullSink).unwrap();
    assert_eq!(solution.status, ILPStatus::Optimal);
    assert_abs_diff_eq!(solution.objective_value, 2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(solution.values.iter().sum::<f64>(), 2.0, epsilon = 1e-6);
}

#[test]
fn test_knapsack_solver_rejects_minimization() {
    let problem = Problem::minimize(vec![1.0, 2.0]).subject_to(vec![1.0, 1.0], ConstraintKind::Le, 1.0);
    assert!(KnapsackSolver::default().solve(&problem, &mut NullSink).is_err());
}
