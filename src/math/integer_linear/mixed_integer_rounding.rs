use crate::error::Result;
use crate::math::integer_linear::{is_integral, ILPSolution, ILPSolver, ILPStatus};
use crate::math::optimization::{
    CanonicalForm, ColumnKind, Direction, DualColumnRule, DualSimplexSolver, Problem,
    SignTransformation, SolveResult, SolveStatus, SolverConfig, Tableau,
};
use crate::output::OutputSink;

/// A mixed-integer rounding cut `sum(coefficients[j] * x_j) <= rhs` over the
/// columns of the tableau it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct MirCut {
    /// Tableau row (1-based) the cut was derived from.
    pub row: usize,
    pub coefficients: Vec<f64>,
    pub rhs: f64,
    /// Fractional part of the source row's RHS.
    pub fraction: f64,
    /// Only integer columns appear in the cut, so its slack is integer too.
    pub integral_slack: bool,
}

impl MirCut {
    /// Renders the cut with the tableau's column names, skipping zero terms.
    pub fn describe(&self, names: &[String]) -> String {
        let terms: Vec<String> = self
            .coefficients
            .iter()
            .zip(names)
            .filter(|(c, _)| c.abs() > 0.0)
            .map(|(c, name)| format!("{c:.3}{name}"))
            .collect();
        format!("{} <= {:.3}", terms.join(" + "), self.rhs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CutOutcome {
    /// No row with an integer basic variable has a fractional RHS.
    NoCutNeeded,
    Cut(MirCut),
}

pub struct CuttingPlaneGenerator {
    tolerance: f64,
}

impl Default for CuttingPlaneGenerator {
    fn default() -> Self {
        Self::new(1e-6)
    }
}

impl CuttingPlaneGenerator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Fractional part in `[0, 1)`, snapped to zero within the tolerance on
    /// either side.
    pub fn fractional_part(&self, value: f64) -> f64 {
        let f = value - value.floor();
        if f < self.tolerance || 1.0 - f < self.tolerance {
            0.0
        } else {
            f
        }
    }

    /// Derives a cut from a tableau whose columns all take integer values.
    ///
    /// The source row is the one whose RHS fraction is closest to one half
    /// (ties go to the lowest row). With `f_j` the fractional parts of the
    /// row's coefficients and `f0` that of its RHS, the cut is
    /// `sum(-f_j * x_j) <= -f0`.
    pub fn generate(&self, tableau: &Tableau) -> CutOutcome {
        self.generate_mixed(tableau, &vec![true; tableau.variable_count()])
    }

    /// Derives a cut when only the columns flagged in `integer_columns` are
    /// integer valued.
    ///
    /// Only rows whose basic variable is integer are candidates. Integer
    /// columns contribute `-f_j` as in [`generate`](Self::generate); a
    /// continuous column with entry `a_j` contributes `-a_j` when positive
    /// and `f0 * a_j / (1 - f0)` when negative.
    pub fn generate_mixed(&self, tableau: &Tableau, integer_columns: &[bool]) -> CutOutcome {
        let is_integer = |column: usize| integer_columns.get(column).copied().unwrap_or(false);

        let mut chosen: Option<(usize, f64)> = None;
        for row in 1..=tableau.constraint_count() {
            if !is_integer(tableau.basis()[row - 1]) {
                continue;
            }
            let f0 = self.fractional_part(tableau.rhs(row));
            if f0 == 0.0 {
                continue;
            }
            let closer = match chosen {
                None => true,
                Some((_, best)) => (f0 - 0.5).abs() < (best - 0.5).abs() - self.tolerance,
            };
            if closer {
                chosen = Some((row, f0));
            }
        }

        let Some((row, fraction)) = chosen else {
            return CutOutcome::NoCutNeeded;
        };

        let mut integral_slack = true;
        let mut coefficients = vec![0.0; tableau.variable_count()];
        for (j, coefficient) in coefficients.iter_mut().enumerate() {
            let a = tableau.get(row, j);
            if tableau.is_basic(j) {
                continue;
            }
            if is_integer(j) {
                let f = self.fractional_part(a);
                if f != 0.0 {
                    *coefficient = -f;
                }
            } else if a.abs() >= self.tolerance {
                integral_slack = false;
                *coefficient = if a > 0.0 {
                    -a
                } else {
                    fraction * a / (1.0 - fraction)
                };
            }
        }

        CutOutcome::Cut(MirCut {
            row,
            coefficients,
            rhs: -fraction,
            fraction,
            integral_slack,
        })
    }

    /// Appends the cut as a new row with its own slack column. The result
    /// keeps the old basis plus the new slack, whose RHS is negative.
    pub fn apply(&self, tableau: &Tableau, cut: &MirCut, slack_name: &str) -> Result<Tableau> {
        let mut next = tableau.clone();
        next.append_row(&cut.coefficients, cut.rhs, slack_name)?;
        Ok(next)
    }
}

/// Result of a [`CuttingPlaneSolver`] run.
#[derive(Debug, Clone)]
pub struct CuttingPlaneResult {
    pub status: ILPStatus,
    /// One value per problem variable; empty when the run ended infeasible or
    /// unbounded.
    pub values: Vec<f64>,
    pub objective_value: f64,
    pub cuts: Vec<MirCut>,
    /// The last simplex run.
    pub result: SolveResult,
}

/// Solves the LP relaxation, then alternates MIR cuts and dual simplex
/// reoptimization until the integer variables are whole.
///
/// A problem without `Integer` or `Binary` signs is treated as a pure
/// integer program.
pub struct CuttingPlaneSolver {
    config: SolverConfig,
    generator: CuttingPlaneGenerator,
    max_rounds: usize,
}

impl Default for CuttingPlaneSolver {
    fn default() -> Self {
        Self::new(50, 1e-6)
    }
}

impl CuttingPlaneSolver {
    pub fn new(max_rounds: usize, tolerance: f64) -> Self {
        Self {
            config: SolverConfig::default(),
            generator: CuttingPlaneGenerator::new(tolerance),
            max_rounds,
        }
    }

    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Flags the canonical columns that are integer in every integer
    /// solution: integer decision columns, plus slack and excess columns of
    /// rows with integer coefficients on integer columns only and an integer
    /// RHS.
    fn integer_columns(
        &self,
        canonical: &CanonicalForm,
        transformed: &Problem,
        all_integer: bool,
    ) -> Vec<bool> {
        let tolerance = self.generator.tolerance;
        let decision = |j: usize| all_integer || transformed.sign(j).is_integral();
        let n = canonical.decision_count();

        canonical
            .columns()
            .iter()
            .map(|kind| match *kind {
                ColumnKind::Decision(j) => decision(j),
                ColumnKind::Slack(r) | ColumnKind::Excess(r) => {
                    let row = &canonical.cells()[r + 1];
                    let whole_terms = row[..n]
                        .iter()
                        .enumerate()
                        .all(|(j, &a)| a == 0.0 || (decision(j) && is_integral(a, tolerance)));
                    whole_terms && is_integral(row[row.len() - 1], tolerance)
                }
            })
            .collect()
    }

    pub fn run(&self, problem: &Problem, sink: &mut dyn OutputSink) -> Result<CuttingPlaneResult> {
        let transformation = SignTransformation::apply(problem)?;
        let canonical = CanonicalForm::from_problem(transformation.problem())?;
        canonical.describe(sink);

        let mut integer_vars = problem.integer_variables();
        let all_integer = integer_vars.is_empty();
        if all_integer {
            integer_vars = (0..problem.variable_count()).collect();
        }
        let mut integer_columns =
            self.integer_columns(&canonical, transformation.problem(), all_integer);
        let sense = match canonical.direction() {
            Direction::Max => 1.0,
            Direction::Min => -1.0,
        };

        let lp = DualSimplexSolver::new(self.config.clone());
        let reoptimizer =
            DualSimplexSolver::new(self.config.clone().with_dual_rule(DualColumnRule::MinimumRatio));
        let mut result = lp.solve(&canonical, sink)?;
        let mut cuts = Vec::new();

        let finish = |status, result: SolveResult, cuts: Vec<MirCut>, objective_value| {
            let values = transformation.transform_solution_back(&result.values(canonical.decision_count()));
            CuttingPlaneResult {
                status,
                values,
                objective_value,
                cuts,
                result,
            }
        };
        let give_up =
            |status, result: SolveResult, cuts: Vec<MirCut>, objective_value| CuttingPlaneResult {
                status,
                values: Vec::new(),
                objective_value,
                cuts,
                result,
            };

        let mut objective = result.objective_value;
        loop {
            match result.status {
                SolveStatus::Optimal => {}
                SolveStatus::Infeasible => {
                    log::info!("cutting planes: infeasible after {} cuts", cuts.len());
                    return Ok(give_up(ILPStatus::Infeasible, result, cuts, sense * f64::NEG_INFINITY));
                }
                SolveStatus::Unbounded => {
                    return Ok(give_up(ILPStatus::Unbounded, result, cuts, sense * f64::INFINITY));
                }
                SolveStatus::CycleLimitExceeded => {
                    return Ok(finish(ILPStatus::MaxIterationsReached, result, cuts, objective));
                }
            }

            let values =
                transformation.transform_solution_back(&result.values(canonical.decision_count()));
            if integer_vars
                .iter()
                .all(|&i| is_integral(values[i], self.generator.tolerance))
            {
                log::info!("cutting planes: integral after {} cuts", cuts.len());
                return Ok(finish(ILPStatus::Optimal, result, cuts, objective));
            }
            if cuts.len() >= self.max_rounds {
                log::warn!("cutting planes stopped after {} rounds", cuts.len());
                return Ok(finish(ILPStatus::MaxIterationsReached, result, cuts, objective));
            }

            let Some(tableau) = result.final_tableau().cloned() else {
                return Ok(give_up(ILPStatus::Infeasible, result, cuts, sense * f64::NEG_INFINITY));
            };
            let cut = match self.generator.generate_mixed(&tableau, &integer_columns) {
                CutOutcome::NoCutNeeded => {
                    sink.write_line("No cut needed");
                    return Ok(finish(ILPStatus::Optimal, result, cuts, objective));
                }
                CutOutcome::Cut(cut) => cut,
            };

            let slack = format!("c{}", cuts.len() + 1);
            sink.start_section(&format!("Cut {}", cuts.len() + 1));
            sink.write_line(&format!(
                "Source row {} (fraction {:.3}): {}",
                cut.row,
                cut.fraction,
                cut.describe(tableau.names())
            ));
            log::debug!("cut {} from row {}", cuts.len() + 1, cut.row);

            let next = self.generator.apply(&tableau, &cut, &slack)?;
            integer_columns.push(cut.integral_slack);
            cuts.push(cut);
            result = reoptimizer.solve_tableau(next, sink)?;
            objective = canonical.report_objective(result.objective_value);
        }
    }
}

impl ILPSolver for CuttingPlaneSolver {
    fn solve(&self, problem: &Problem, sink: &mut dyn OutputSink) -> Result<ILPSolution> {
        let outcome = self.run(problem, sink)?;
        let nodes = outcome.cuts.len() + 1;
        Ok(match outcome.status {
            ILPStatus::Optimal => ILPSolution {
                values: outcome.values,
                objective_value: outcome.objective_value,
                status: outcome.status,
                nodes,
            },
            status => ILPSolution::without_values(status, outcome.objective_value, nodes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::optimization::{ConstraintKind, VariableSign};
    use crate::output::{BufferSink, NullSink};
    use approx::assert_abs_diff_eq;

    fn triangle() -> Problem {
        Problem::maximize(vec![0.0, 1.0])
            .subject_to(vec![3.0, 2.0], ConstraintKind::Le, 6.0)
            .subject_to(vec![-3.0, 2.0], ConstraintKind::Le, 0.0)
    }

    #[test]
    fn test_fractional_part() {
        let generator = CuttingPlaneGenerator::default();
        assert_abs_diff_eq!(generator.fractional_part(1.5), 0.5);
        assert_abs_diff_eq!(generator.fractional_part(-0.25), 0.75);
        assert_eq!(generator.fractional_part(2.0 - 1e-12), 0.0);
    }

    #[test]
    fn test_first_cut() {
        let form = CanonicalForm::from_problem(&triangle()).unwrap();
        let result = DualSimplexSolver::default().solve(&form, &mut NullSink).unwrap();
        let tableau = result.final_tableau().unwrap();

        let CutOutcome::Cut(cut) = CuttingPlaneGenerator::default().generate(tableau) else {
            panic!("expected a cut");
        };
        let x2_row = tableau.basic_row(1).unwrap();
        assert_eq!(cut.row, x2_row);
        assert_abs_diff_eq!(cut.rhs, -0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(cut.coefficients[2], -0.25, epsilon = 1e-9);
        assert_abs_diff_eq!(cut.coefficients[3], -0.25, epsilon = 1e-9);
        assert_eq!(cut.coefficients[0], 0.0);
        assert_eq!(cut.coefficients[1], 0.0);
    }

    #[test]
    fn test_no_cut_needed() {
        let problem = Problem::maximize(vec![3.0, 2.0])
            .subject_to(vec![1.0, 2.0], ConstraintKind::Le, 10.0)
            .subject_to(vec![2.0, 1.0], ConstraintKind::Le, 8.0);
        let form = CanonicalForm::from_problem(&problem).unwrap();
        let result = DualSimplexSolver::default().solve(&form, &mut NullSink).unwrap();

        assert_eq!(
            CuttingPlaneGenerator::default().generate(result.final_tableau().unwrap()),
            CutOutcome::NoCutNeeded
        );
    }

    #[test]
    fn test_cutting_planes_reach_integer_point() {
        let mut sink = BufferSink::new();
        let outcome = CuttingPlaneSolver::default().run(&triangle(), &mut sink).unwrap();

        assert_eq!(outcome.status, ILPStatus::Optimal);
        assert_abs_diff_eq!(outcome.objective_value, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.values[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.values[1], 1.0, epsilon = 1e-9);
        assert_eq!(outcome.cuts.len(), 2);
        assert!(sink.sections().iter().any(|s| s == "Cut 1"));
    }

    #[test]
    fn test_round_cap() {
        let outcome = CuttingPlaneSolver::new(0, 1e-6).run(&triangle(), &mut NullSink).unwrap();
        assert_eq!(outcome.status, ILPStatus::MaxIterationsReached);
        assert!(outcome.cuts.is_empty());
    }

    #[test]
    fn test_fractional_bound_row_is_cut_through_continuous_slack() {
        // x1 <= 1.5 makes s1 fractional, so the cut must not round it.
        let problem = Problem::maximize(vec![1.0, 1.0])
            .subject_to(vec![1.0, 0.0], ConstraintKind::Le, 1.5)
            .subject_to(vec![0.0, 1.0], ConstraintKind::Le, 2.0);
        let outcome = CuttingPlaneSolver::default().run(&problem, &mut NullSink).unwrap();

        assert_eq!(outcome.status, ILPStatus::Optimal);
        assert_abs_diff_eq!(outcome.objective_value, 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.values[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.values[1], 2.0, epsilon = 1e-9);
        assert_eq!(outcome.cuts.len(), 1);
        assert_abs_diff_eq!(outcome.cuts[0].coefficients[2], -1.0, epsilon = 1e-9);
        assert!(!outcome.cuts[0].integral_slack);
    }

    #[test]
    fn test_mixed_problem_leaves_continuous_variable_alone() {
        let problem = Problem::maximize(vec![1.0, 1.0])
            .subject_to(vec![0.0, 1.0], ConstraintKind::Le, 0.5)
            .subject_to(vec![1.0, 0.0], ConstraintKind::Le, 1.5)
            .with_signs(vec![VariableSign::Integer, VariableSign::Positive]);
        let outcome = CuttingPlaneSolver::default().run(&problem, &mut NullSink).unwrap();

        assert_eq!(outcome.status, ILPStatus::Optimal);
        assert_abs_diff_eq!(outcome.objective_value, 1.5, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.values[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.values[1], 0.5, epsilon = 1e-9);
        assert_eq!(outcome.cuts.len(), 1);
        // Row 1 holds the continuous x2 and is never a source row.
        assert_ne!(outcome.cuts[0].row, 1);
    }

    #[test]
    fn test_generate_mixed_skips_rows_with_continuous_basic_variable() {
        let problem = Problem::maximize(vec![0.0, 1.0])
            .subject_to(vec![0.0, 1.0], ConstraintKind::Le, 0.5);
        let form = CanonicalForm::from_problem(&problem).unwrap();
        let result = DualSimplexSolver::default().solve(&form, &mut NullSink).unwrap();
        let tableau = result.final_tableau().unwrap();

        let generator = CuttingPlaneGenerator::default();
        assert_eq!(
            generator.generate_mixed(tableau, &[true, false, false]),
            CutOutcome::NoCutNeeded
        );
        assert!(matches!(generator.generate(tableau), CutOutcome::Cut(_)));
    }

    #[test]
    fn test_negative_continuous_entry_is_scaled() {
        // x1 - s1 = 0.5 with s1 continuous.
        let cells = vec![vec![0.0, 1.0, 0.5], vec![1.0, -1.0, 0.5]];
        let tableau =
            Tableau::with_basis(cells, vec!["x1".into(), "s1".into()], vec![0]).unwrap();
        let CutOutcome::Cut(cut) = CuttingPlaneGenerator::default().generate_mixed(&tableau, &[true, false])
        else {
            panic!("expected a cut");
        };
        assert_eq!(cut.coefficients[0], 0.0);
        assert_abs_diff_eq!(cut.coefficients[1], -1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cut.rhs, -0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_infeasible_run_reports_no_values() {
        // 2 x1 = 1 has no integer solution.
        let problem = Problem::maximize(vec![1.0]).subject_to(vec![2.0], ConstraintKind::Eq, 1.0);
        let outcome = CuttingPlaneSolver::default().run(&problem, &mut NullSink).unwrap();

        assert_eq!(outcome.status, ILPStatus::Infeasible);
        assert!(outcome.values.is_empty());
        assert_eq!(outcome.objective_value, f64::NEG_INFINITY);
    }

    #[test]
    fn test_cut_appends_basic_slack() {
        let form = CanonicalForm::from_problem(&triangle()).unwrap();
        let result = DualSimplexSolver::default().solve(&form, &mut NullSink).unwrap();
        let tableau = result.final_tableau().unwrap();
        let generator = CuttingPlaneGenerator::default();
        let CutOutcome::Cut(cut) = generator.generate(tableau) else {
            panic!("expected a cut");
        };

        let next = generator.apply(tableau, &cut, "c1").unwrap();
        assert_eq!(next.constraint_count(), 3);
        assert_eq!(next.name(4), "c1");
        assert_eq!(next.basis()[2], 4);
        assert_abs_diff_eq!(next.rhs(3), -0.5, epsilon = 1e-9);
    }
}
