//! Dual simplex (feasibility restoration) followed by primal simplex
//! (optimization) on one tableau.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;
use crate::math::optimization::canonical::{
    CanonicalForm, Direction, Problem, SignCheck, SignTransformation,
};
use crate::math::optimization::tableau::Tableau;
use crate::math::optimization::{DualColumnRule, SolverConfig};
use crate::output::OutputSink;

/// States of a solve. `Dual` and `Primal` pivot; the rest are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Dual,
    Primal,
    Optimal,
    Infeasible,
    Unbounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    /// The pivot cap was reached before a terminal phase.
    CycleLimitExceeded,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::CycleLimitExceeded => "cycle limit exceeded",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotKind {
    Dual,
    Primal,
}

/// One recorded pivot.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotStep {
    pub kind: PivotKind,
    /// Tableau row (1-based, row 0 is the z-row).
    pub row: usize,
    pub column: usize,
    pub entering: String,
    pub leaving: String,
    /// `|z_j / a_rj|` for dual pivots, `rhs / a` for primal ones.
    pub ratio: f64,
}

/// Outcome of a pivot-selection rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PivotChoice {
    /// Nothing left to do in this phase.
    Finished,
    Pivot { row: usize, column: usize, ratio: f64 },
    /// Dual: no entering column for this row. Primal: no leaving row for this
    /// column.
    Blocked { index: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    pub status: SolveStatus,
    /// Value of every tableau column; non-basic columns are zero.
    pub variable_values: BTreeMap<usize, f64>,
    /// Objective in the caller's sense.
    pub objective_value: f64,
    /// The starting tableau followed by a snapshot after every pivot.
    pub tableau_history: Vec<Tableau>,
    pub pivots: Vec<PivotStep>,
}

impl SolveResult {
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    /// The last tableau of the run.
    pub fn final_tableau(&self) -> Option<&Tableau> {
        self.tableau_history.last()
    }

    pub fn value(&self, column: usize) -> f64 {
        self.variable_values.get(&column).copied().unwrap_or(0.0)
    }

    /// Values of columns `0..count` as a dense vector.
    pub fn values(&self, count: usize) -> Vec<f64> {
        (0..count).map(|j| self.value(j)).collect()
    }

    pub fn iterations(&self) -> usize {
        self.pivots.len()
    }
}

/// Result of [`DualSimplexSolver::solve_problem`], mapped back to the
/// original variables.
#[derive(Debug, Clone)]
pub struct ProblemSolution {
    pub status: SolveStatus,
    /// One value per original variable.
    pub values: Vec<f64>,
    pub objective_value: f64,
    pub sign_check: SignCheck,
    pub transformation: SignTransformation,
    pub canonical: CanonicalForm,
    pub result: SolveResult,
}

impl ProblemSolution {
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }
}

/// Tableau state of one run.
struct Run {
    tableau: Tableau,
    history: Vec<Tableau>,
    pivots: Vec<PivotStep>,
}

/// Dual simplex phase 1 plus primal simplex phase 2 for maximization
/// tableaus.
///
/// While some RHS is negative, dual pivots restore feasibility; afterwards
/// primal pivots remove negative reduced costs. Every pivot is announced on
/// the output sink and followed by the new tableau.
#[derive(Debug, Clone, Default)]
pub struct DualSimplexSolver {
    config: SolverConfig,
}

impl DualSimplexSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solves a canonical form from its slack/excess basis.
    ///
    /// Minimization forms are solved as `max -c` with the minimum-ratio dual
    /// rule, since their z-row starts dual feasible. The reported objective is
    /// converted back to the problem's sense.
    ///
    /// # Arguments
    ///
    /// * `form` - The canonical form to solve
    /// * `sink` - Receives the tableaus and pivot announcements
    ///
    /// # Returns
    ///
    /// The terminal status with values, objective and tableau history, or an
    /// error if a pivot turned out to be singular.
    ///
    /// # Examples
    ///
    /// ```
    /// use lpip::math::optimization::{CanonicalForm, ConstraintKind, DualSimplexSolver, Problem, SolveStatus};
    /// use lpip::output::NullSink;
    ///
    /// let problem = Problem::maximize(vec![3.0, 2.0])
    ///     .subject_to(vec![1.0, 2.0], ConstraintKind::Le, 10.0)
    ///     .subject_to(vec![2.0, 1.0], ConstraintKind::Le, 8.0);
    /// let form = CanonicalForm::from_problem(&problem).unwrap();
    /// let result = DualSimplexSolver::default().solve(&form, &mut NullSink).unwrap();
    ///
    /// assert_eq!(result.status, SolveStatus::Optimal);
    /// assert!((result.objective_value - 14.0).abs() < 1e-9);
    /// ```
    pub fn solve(&self, form: &CanonicalForm, sink: &mut dyn OutputSink) -> Result<SolveResult> {
        let rule = match form.direction() {
            Direction::Max => self.config.dual_rule,
            Direction::Min => DualColumnRule::MinimumRatio,
        };
        let mut result = self.run(form.initial_tableau()?, rule, sink)?;
        result.objective_value = form.report_objective(result.objective_value);
        if result.is_optimal() {
            report_optimum(&result, form.names(), sink);
        }
        Ok(result)
    }

    /// Re-solves a tableau from its declared basis, e.g. after rows were
    /// appended to an optimal tableau. The basic columns are first pivoted
    /// into unit form. The objective is reported in maximization sense.
    pub fn solve_tableau(&self, mut tableau: Tableau, sink: &mut dyn OutputSink) -> Result<SolveResult> {
        let basis = tableau.basis().to_vec();
        tableau.canonicalize_to_basis(&basis, self.config.pivot_tolerance)?;
        let result = self.run(tableau, self.config.dual_rule, sink)?;
        if result.is_optimal() {
            if let Some(last) = result.final_tableau() {
                report_optimum(&result, last.names(), sink);
            }
        }
        Ok(result)
    }

    /// Full pipeline: sign transformation, canonical form, simplex, and the
    /// mapping of the solution back to the original variables.
    pub fn solve_problem(&self, problem: &Problem, sink: &mut dyn OutputSink) -> Result<ProblemSolution> {
        let transformation = SignTransformation::apply(problem)?;
        if !transformation.is_identity() {
            transformation.describe(sink);
        }
        let canonical = CanonicalForm::from_problem(transformation.problem())?;
        canonical.describe(sink);

        let result = self.solve(&canonical, sink)?;
        let transformed_values = result.values(canonical.decision_count());
        let values = transformation.transform_solution_back(&transformed_values);
        let sign_check =
            transformation.verify_sign_restrictions(&values, self.config.feasibility_tolerance);
        if result.is_optimal() && !transformation.is_identity() {
            sign_check.write_to(sink);
        }

        Ok(ProblemSolution {
            status: result.status,
            objective_value: result.objective_value,
            values,
            sign_check,
            transformation,
            canonical,
            result,
        })
    }

    /// Dual pivot: the row with the most negative RHS (ties to the lowest
    /// row), then the column minimizing `|z_j / a_rj|` among those the rule
    /// admits (ties to the lowest column).
    pub fn select_dual_pivot(&self, tableau: &Tableau, rule: DualColumnRule) -> PivotChoice {
        let eps = self.config.feasibility_tolerance;
        let tie = self.config.pivot_tolerance;

        let mut row = None;
        let mut most_negative = -eps;
        for i in 1..=tableau.constraint_count() {
            let rhs = tableau.rhs(i);
            if rhs < most_negative {
                most_negative = rhs;
                row = Some(i);
            }
        }
        let Some(row) = row else {
            return PivotChoice::Finished;
        };

        let mut best: Option<(usize, f64)> = None;
        for (j, &z) in tableau.reduced_costs().iter().enumerate() {
            let a = tableau.get(row, j);
            let admitted = match rule {
                DualColumnRule::NegativeReducedCost => a < -eps && z < -eps,
                DualColumnRule::MinimumRatio => a < -eps,
            };
            if !admitted {
                continue;
            }
            let theta = (z / a).abs();
            if best.map_or(true, |(_, t)| theta < t - tie) {
                best = Some((j, theta));
            }
        }

        match best {
            Some((column, ratio)) => PivotChoice::Pivot { row, column, ratio },
            None => PivotChoice::Blocked { index: row },
        }
    }

    /// Primal pivot: the most negative reduced cost (ties to the lowest
    /// column), then the minimum ratio `rhs / a` over positive entries (ties
    /// to the lowest row).
    pub fn select_primal_pivot(&self, tableau: &Tableau) -> PivotChoice {
        let eps = self.config.feasibility_tolerance;
        let tie = self.config.pivot_tolerance;

        let mut column = None;
        let mut most_negative = -eps;
        for (j, &z) in tableau.reduced_costs().iter().enumerate() {
            if z < most_negative {
                most_negative = z;
                column = Some(j);
            }
        }
        let Some(column) = column else {
            return PivotChoice::Finished;
        };

        let mut best: Option<(usize, f64)> = None;
        for i in 1..=tableau.constraint_count() {
            let a = tableau.get(i, column);
            if a <= eps {
                continue;
            }
            let ratio = tableau.rhs(i) / a;
            if best.map_or(true, |(_, r)| ratio < r - tie) {
                best = Some((i, ratio));
            }
        }

        match best {
            Some((row, ratio)) => PivotChoice::Pivot { row, column, ratio },
            None => PivotChoice::Blocked { index: column },
        }
    }

    fn run(&self, tableau: Tableau, rule: DualColumnRule, sink: &mut dyn OutputSink) -> Result<SolveResult> {
        tableau.render(sink, "t-i", None);
        log::trace!("initial tableau\n{tableau}");

        let mut run = Run {
            history: vec![tableau.clone()],
            tableau,
            pivots: Vec::new(),
        };
        let mut phase = Phase::Dual;

        let status = loop {
            let (kind, choice) = match phase {
                Phase::Dual => (PivotKind::Dual, self.select_dual_pivot(&run.tableau, rule)),
                Phase::Primal => (PivotKind::Primal, self.select_primal_pivot(&run.tableau)),
                Phase::Optimal => break SolveStatus::Optimal,
                Phase::Infeasible => break SolveStatus::Infeasible,
                Phase::Unbounded => break SolveStatus::Unbounded,
            };

            match (kind, choice) {
                (PivotKind::Dual, PivotChoice::Finished) => {
                    sink.write_line("");
                    sink.write_line("Dual phase complete (no negative RHS). Switching to primal phase.");
                    phase = Phase::Primal;
                }
                (PivotKind::Dual, PivotChoice::Blocked { index }) => {
                    sink.write_line("");
                    sink.write_line(&format!(
                        "No valid entering column for row {index}. The problem is infeasible."
                    ));
                    phase = Phase::Infeasible;
                }
                (PivotKind::Primal, PivotChoice::Finished) => {
                    sink.write_line("");
                    sink.write_line("No negative reduced costs in z-row. Optimal tableau.");
                    phase = Phase::Optimal;
                }
                (PivotKind::Primal, PivotChoice::Blocked { index }) => {
                    sink.write_line("");
                    sink.write_line(&format!(
                        "All entries in pivot column {} are <= 0. The problem is unbounded.",
                        run.tableau.name(index)
                    ));
                    phase = Phase::Unbounded;
                }
                (kind, PivotChoice::Pivot { row, column, ratio }) => {
                    if run.pivots.len() >= self.config.max_iterations {
                        log::warn!(
                            "pivot limit of {} reached in {:?} phase",
                            self.config.max_iterations,
                            phase
                        );
                        sink.write_line("");
                        sink.write_line("Iteration limit reached before a terminal tableau.");
                        break SolveStatus::CycleLimitExceeded;
                    }
                    self.apply(&mut run, kind, row, column, ratio, sink)?;
                }
            }
        };

        log::info!(
            "simplex finished: {status} after {} pivots, z = {}",
            run.pivots.len(),
            run.tableau.objective_value()
        );

        let variable_values = run
            .tableau
            .basic_solution()
            .into_iter()
            .enumerate()
            .collect();
        Ok(SolveResult {
            status,
            variable_values,
            objective_value: run.tableau.objective_value(),
            tableau_history: run.history,
            pivots: run.pivots,
        })
    }

    fn apply(
        &self,
        run: &mut Run,
        kind: PivotKind,
        row: usize,
        column: usize,
        ratio: f64,
        sink: &mut dyn OutputSink,
    ) -> Result<()> {
        let step = PivotStep {
            kind,
            row,
            column,
            entering: run.tableau.name(column).to_string(),
            leaving: run.tableau.name(run.tableau.basis()[row - 1]).to_string(),
            ratio,
        };
        let tag = match kind {
            PivotKind::Dual => "Dual",
            PivotKind::Primal => "Primal",
        };
        log::debug!(
            "{tag} pivot at row {row}, column {column}: {} enters, {} leaves (ratio {ratio})",
            step.entering,
            step.leaving
        );
        sink.write_line("");
        sink.write_line(&format!(
            "[{tag}] Pivot: Entering = {}, Leaving = {}  (row {row}, col {}, θ={ratio:.3})",
            step.entering,
            step.leaving,
            column + 1
        ));

        run.tableau.pivot(row, column, self.config.pivot_tolerance)?;
        run.pivots.push(step);
        run.tableau
            .render(sink, &format!("t-{}", run.pivots.len() + 1), Some(column));
        log::trace!("after pivot {}\n{}", run.pivots.len(), run.tableau);
        run.history.push(run.tableau.clone());
        Ok(())
    }
}

fn report_optimum(result: &SolveResult, names: &[String], sink: &mut dyn OutputSink) {
    sink.start_section("Dual Simplex Optimal Solution");
    sink.write_line(&format!("Objective (Z) = {:.3}", result.objective_value));
    for (&column, &value) in &result.variable_values {
        if let Some(name) = names.get(column) {
            sink.write_line(&format!("{name} = {value:.3}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::optimization::canonical::{ConstraintKind, VariableSign};
    use crate::output::{BufferSink, NullSink};
    use approx::assert_abs_diff_eq;
    use std::error::Error;
    use std::result::Result;

    fn textbook() -> Problem {
        Problem::maximize(vec![3.0, 2.0])
            .subject_to(vec![1.0, 2.0], ConstraintKind::Le, 10.0)
            .subject_to(vec![2.0, 1.0], ConstraintKind::Le, 8.0)
    }

    #[test]
    fn test_textbook_lp() -> Result<(), Box<dyn Error>> {
        let form = CanonicalForm::from_problem(&textbook())?;
        let result = DualSimplexSolver::default().solve(&form, &mut NullSink)?;

        assert_eq!(result.status, SolveStatus::Optimal);
        assert_abs_diff_eq!(result.value(0), 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.value(1), 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.objective_value, 14.0, epsilon = 1e-9);
        assert!(result.pivots.iter().all(|p| p.kind == PivotKind::Primal));
        assert_eq!(result.tableau_history.len(), result.pivots.len() + 1);
        assert_eq!(result.final_tableau().map(|t| t.basis().to_vec()), Some(vec![1, 0]));
        Ok(())
    }

    #[test]
    fn test_ge_row_starts_in_dual_phase() -> Result<(), Box<dyn Error>> {
        let problem = textbook().subject_to(vec![1.0, 1.0], ConstraintKind::Ge, 2.0);
        let form = CanonicalForm::from_problem(&problem)?;
        let result = DualSimplexSolver::default().solve(&form, &mut NullSink)?;

        let first = &result.pivots[0];
        assert_eq!(first.kind, PivotKind::Dual);
        assert_eq!((first.row, first.column), (3, 1));
        assert_eq!(first.leaving, "e1");
        assert_abs_diff_eq!(first.ratio, 2.0, epsilon = 1e-12);

        assert_eq!(result.status, SolveStatus::Optimal);
        assert_abs_diff_eq!(result.objective_value, 14.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_unbounded_is_a_status() -> Result<(), Box<dyn Error>> {
        let problem = Problem::maximize(vec![1.0, 1.0]).subject_to(
            vec![1.0, -1.0],
            ConstraintKind::Le,
            1.0,
        );
        let form = CanonicalForm::from_problem(&problem)?;
        let result = DualSimplexSolver::default().solve(&form, &mut NullSink)?;

        assert_eq!(result.status, SolveStatus::Unbounded);
        assert_eq!(result.pivots.len(), 1);
        Ok(())
    }

    #[test]
    fn test_contradictory_bounds_are_infeasible() -> Result<(), Box<dyn Error>> {
        let problem = Problem::maximize(vec![1.0])
            .subject_to(vec![1.0], ConstraintKind::Le, 1.0)
            .subject_to(vec![1.0], ConstraintKind::Ge, 2.0);
        let form = CanonicalForm::from_problem(&problem)?;
        let mut sink = BufferSink::new();
        let result = DualSimplexSolver::default().solve(&form, &mut sink)?;

        assert_eq!(result.status, SolveStatus::Infeasible);
        assert!(sink.contents().contains("infeasible"));
        // history is kept for diagnostics
        assert_eq!(result.tableau_history.len(), 2);
        Ok(())
    }

    #[test]
    fn test_minimization_with_ge_rows() -> Result<(), Box<dyn Error>> {
        let problem = Problem::minimize(vec![2.0, 3.0])
            .subject_to(vec![1.0, 1.0], ConstraintKind::Ge, 4.0)
            .subject_to(vec![2.0, 1.0], ConstraintKind::Ge, 6.0);
        let form = CanonicalForm::from_problem(&problem)?;
        let result = DualSimplexSolver::default().solve(&form, &mut NullSink)?;

        assert_eq!(result.status, SolveStatus::Optimal);
        assert_abs_diff_eq!(result.value(0), 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.value(1), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.objective_value, 8.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_dual_pivots_never_increase_infeasibility() -> Result<(), Box<dyn Error>> {
        let problem = Problem::minimize(vec![2.0, 3.0])
            .subject_to(vec![1.0, 1.0], ConstraintKind::Ge, 4.0)
            .subject_to(vec![2.0, 1.0], ConstraintKind::Ge, 6.0);
        let form = CanonicalForm::from_problem(&problem)?;
        let result = DualSimplexSolver::default().solve(&form, &mut NullSink)?;

        let worst: Vec<f64> = result
            .tableau_history
            .iter()
            .map(|t| t.rhs_values().into_iter().fold(0.0, f64::min))
            .collect();
        for pair in worst.windows(2) {
            assert!(pair[1] >= pair[0] - 1e-12);
        }
        assert_abs_diff_eq!(worst[0], -6.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_optimal_z_row_is_non_negative() -> Result<(), Box<dyn Error>> {
        let problem = textbook().subject_to(vec![1.0, 1.0], ConstraintKind::Ge, 2.0);
        let form = CanonicalForm::from_problem(&problem)?;
        let solver = DualSimplexSolver::default();
        let result = solver.solve(&form, &mut NullSink)?;
        let last = result.final_tableau().ok_or("no tableau")?;

        let eps = solver.config().feasibility_tolerance;
        assert!(last.reduced_costs().iter().all(|&z| z >= -eps));
        for (i, &column) in last.basis().iter().enumerate() {
            assert!(last.is_unit_column(column, i + 1, 1e-9));
        }
        Ok(())
    }

    #[test]
    fn test_iteration_cap_is_reported() -> Result<(), Box<dyn Error>> {
        let form = CanonicalForm::from_problem(&textbook())?;
        let solver = DualSimplexSolver::new(SolverConfig::default().with_max_iterations(1));
        let result = solver.solve(&form, &mut NullSink)?;

        assert_eq!(result.status, SolveStatus::CycleLimitExceeded);
        assert_eq!(result.pivots.len(), 1);
        Ok(())
    }

    #[test]
    fn test_solve_problem_maps_negative_variable_back() -> Result<(), Box<dyn Error>> {
        // max -x1 + x2 with x1 <= 0, x2 <= 3, x1 >= -2: optimum at (-2, 3)
        let problem = Problem::maximize(vec![-1.0, 1.0])
            .subject_to(vec![0.0, 1.0], ConstraintKind::Le, 3.0)
            .subject_to(vec![1.0, 0.0], ConstraintKind::Ge, -2.0)
            .with_signs(vec![VariableSign::Negative, VariableSign::Positive]);
        let solution = DualSimplexSolver::default().solve_problem(&problem, &mut NullSink)?;

        assert!(solution.is_optimal());
        assert_abs_diff_eq!(solution.values[0], -2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(solution.values[1], 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(solution.objective_value, 5.0, epsilon = 1e-9);
        assert!(solution.sign_check.all_valid());
        Ok(())
    }

    #[test]
    fn test_solve_problem_recovers_negative_unrestricted_value() -> Result<(), Box<dyn Error>> {
        // max -x1 + x2 with x1 free, x2 <= 3, x1 >= -4: optimum at (-4, 3)
        let problem = Problem::maximize(vec![-1.0, 1.0])
            .subject_to(vec![0.0, 1.0], ConstraintKind::Le, 3.0)
            .subject_to(vec![1.0, 0.0], ConstraintKind::Ge, -4.0)
            .with_signs(vec![VariableSign::Unrestricted, VariableSign::Positive]);
        let solution = DualSimplexSolver::default().solve_problem(&problem, &mut NullSink)?;

        assert!(solution.is_optimal());
        assert_eq!(solution.canonical.decision_count(), 3);
        assert_abs_diff_eq!(solution.values[0], -4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(solution.values[1], 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(solution.objective_value, 7.0, epsilon = 1e-9);
        assert!(solution.sign_check.all_valid());
        Ok(())
    }

    #[test]
    fn test_solve_problem_binary_bound_binds() -> Result<(), Box<dyn Error>> {
        // max 3x1 + x2 with x1 binary, x1 + x2 <= 3: x1 stops at its bound
        let problem = Problem::maximize(vec![3.0, 1.0])
            .subject_to(vec![1.0, 1.0], ConstraintKind::Le, 3.0)
            .with_signs(vec![VariableSign::Binary, VariableSign::Positive]);
        let solution = DualSimplexSolver::default().solve_problem(&problem, &mut NullSink)?;

        assert!(solution.is_optimal());
        assert_eq!(solution.canonical.constraint_count(), 2);
        assert_abs_diff_eq!(solution.values[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(solution.values[1], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(solution.objective_value, 5.0, epsilon = 1e-9);
        assert!(solution.sign_check.all_valid());
        // The x1 <= 1 row's slack is non-basic, so the bound is tight.
        let slack = solution.canonical.decision_count() + 1;
        assert!(!solution.result.final_tableau().ok_or("no tableau")?.is_basic(slack));
        Ok(())
    }

    #[test]
    fn test_strict_dual_rule_stalls_where_minimum_ratio_solves() -> Result<(), Box<dyn Error>> {
        let problem = Problem::maximize(vec![1.0, -1.0])
            .subject_to(vec![0.0, 1.0], ConstraintKind::Ge, 1.0)
            .subject_to(vec![1.0, 0.0], ConstraintKind::Le, 5.0);

        let strict = DualSimplexSolver::default().solve_problem(&problem, &mut NullSink)?;
        assert_eq!(strict.status, SolveStatus::Infeasible);

        let ratio = DualSimplexSolver::new(
            SolverConfig::default().with_dual_rule(DualColumnRule::MinimumRatio),
        )
        .solve_problem(&problem, &mut NullSink)?;
        assert!(ratio.is_optimal());
        assert_abs_diff_eq!(ratio.objective_value, 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ratio.values[0], 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ratio.values[1], 1.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_transcript_names_pivots() -> Result<(), Box<dyn Error>> {
        let form = CanonicalForm::from_problem(&textbook())?;
        let mut sink = BufferSink::new();
        DualSimplexSolver::default().solve(&form, &mut sink)?;

        assert_eq!(
            sink.sections(),
            &["t-i", "t-2", "t-3", "Dual Simplex Optimal Solution"]
        );
        assert!(sink
            .contents()
            .contains("[Primal] Pivot: Entering = x1, Leaving = s2"));
        Ok(())
    }
}
