//! Sensitivity analysis on an optimal basis.
//!
//! Everything is derived from the starting tableau and the optimal basis:
//! `B` (starting columns of the basic variables), `B⁻¹`, `cbv` and
//! `cbv·B⁻¹`. The optimal tableau is rebuilt from these matrices and must
//! agree with the tableau the simplex run ended on.

use std::fmt;

use ndarray::{s, Array1, Array2};

use crate::error::{Error, Result};
use crate::math::optimization::canonical::{
    CanonicalForm, ConstraintKind, Direction, Problem, SignTransformation,
};
use crate::math::optimization::dual_simplex::{DualSimplexSolver, SolveResult};
use crate::math::optimization::tableau::Tableau;
use crate::math::optimization::{DualColumnRule, SolverConfig};
use crate::output::OutputSink;

/// A closed interval; either end may be infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub lower: f64,
    pub upper: f64,
}

impl Range {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn is_bounded(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite()
    }

    fn negated(self) -> Self {
        Self::new(-self.upper, -self.lower)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = |v: f64| {
            if v == f64::INFINITY {
                "∞".to_string()
            } else if v == f64::NEG_INFINITY {
                "-∞".to_string()
            } else {
                format!("{v:.4}")
            }
        };
        write!(f, "[{}, {}]", end(self.lower), end(self.upper))
    }
}

/// Predicted effect of a change without re-solving.
#[derive(Debug, Clone, PartialEq)]
pub struct WhatIf {
    /// `(column, new value)` for each basic variable, in basis order.
    pub basic_values: Vec<(usize, f64)>,
    /// New objective in the problem's sense.
    pub objective_value: f64,
    /// All basic values stay non-negative.
    pub feasible: bool,
}

#[derive(Debug, Clone)]
pub struct SensitivityAnalysis {
    config: SolverConfig,
    direction: Direction,
    names: Vec<String>,
    basis: Vec<usize>,
    initial: Array2<f64>,
    revised: Array2<f64>,
    basis_matrix: Array2<f64>,
    basis_inverse: Array2<f64>,
    cbv: Array1<f64>,
    duals: Array1<f64>,
    row_signs: Vec<f64>,
    row_sources: Vec<usize>,
}

impl SensitivityAnalysis {
    /// Computes `B`, `B⁻¹`, `cbv`, `cbv·B⁻¹` and the rebuilt optimal tableau.
    ///
    /// # Arguments
    ///
    /// * `initial` - The starting tableau (z-row holds `-c` in max sense)
    /// * `basis` - The optimal basis, one column per constraint row
    /// * `direction` - Sense the reported values are converted to
    /// * `config` - Tolerances; `pivot_tolerance` governs the inversion
    ///
    /// # Returns
    ///
    /// The analysis, or `SingularBasis` when `B` cannot be inverted.
    pub fn new(initial: &Tableau, basis: &[usize], direction: Direction, config: &SolverConfig) -> Result<Self> {
        let m = initial.constraint_count();
        let n = initial.variable_count();
        if basis.len() != m {
            return Err(Error::dimension_mismatch(format!(
                "basis has {} entries for {m} constraint rows",
                basis.len()
            )));
        }
        if let Some(&bad) = basis.iter().find(|&&b| b >= n) {
            return Err(Error::out_of_range("basis column", bad, n));
        }

        let initial_matrix = Array2::from_shape_vec((m + 1, n + 1), initial.cells().concat())
            .map_err(|e| Error::dimension_mismatch(e.to_string()))?;

        let basis_matrix = Array2::from_shape_fn((m, m), |(i, k)| initial_matrix[[i + 1, basis[k]]]);
        let basis_inverse = invert(&basis_matrix, config.pivot_tolerance)?;
        let cbv: Array1<f64> = basis.iter().map(|&b| -initial_matrix[[0, b]]).collect();
        let duals = cbv.dot(&basis_inverse);

        let body = initial_matrix.slice(s![1.., ..]);
        let mut revised = Array2::<f64>::zeros((m + 1, n + 1));
        let z_row = duals.dot(&body) + &initial_matrix.row(0);
        revised.row_mut(0).assign(&z_row);
        revised.slice_mut(s![1.., ..]).assign(&basis_inverse.dot(&body));

        log::debug!("sensitivity: B^-1 computed for basis {basis:?}");
        log::trace!("cbv = {cbv}, cbv B^-1 = {duals}");

        Ok(Self {
            config: config.clone(),
            direction,
            names: initial.names().to_vec(),
            basis: basis.to_vec(),
            initial: initial_matrix,
            revised,
            basis_matrix,
            basis_inverse,
            cbv,
            duals,
            row_signs: vec![1.0; m],
            row_sources: (0..m).collect(),
        })
    }

    /// Builds the analysis from a finished solve of `form`.
    ///
    /// Fails with `NotOptimal` unless the run ended optimal. A rebuilt tableau
    /// that disagrees with the final one beyond `1e-6` is logged as a warning.
    pub fn from_solution(form: &CanonicalForm, result: &SolveResult, config: &SolverConfig) -> Result<Self> {
        if !result.is_optimal() {
            return Err(Error::NotOptimal);
        }
        let last = result.final_tableau().ok_or(Error::NotOptimal)?;
        let mut analysis = Self::new(&form.initial_tableau()?, last.basis(), form.direction(), config)?;
        analysis.row_signs = form.row_signs().to_vec();
        analysis.row_sources = form.row_sources().to_vec();

        let deviation = analysis.max_deviation(last);
        if deviation > 1e-6 {
            log::warn!("rebuilt optimal tableau deviates from the simplex result by {deviation:e}");
        }
        Ok(analysis)
    }

    /// Solves `problem` (after its sign transformation) and analyses the
    /// optimum. Columns refer to the canonical form of the transformed
    /// problem.
    pub fn analyze(problem: &Problem, config: &SolverConfig, sink: &mut dyn OutputSink) -> Result<Self> {
        let transformed = SignTransformation::apply(problem)?;
        let form = CanonicalForm::from_problem(transformed.problem())?;
        let result = DualSimplexSolver::new(config.clone()).solve(&form, sink)?;
        Self::from_solution(&form, &result, config)
    }

    pub fn constraint_count(&self) -> usize {
        self.basis.len()
    }

    pub fn variable_count(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn basis(&self) -> &[usize] {
        &self.basis
    }

    pub fn basis_matrix(&self) -> &Array2<f64> {
        &self.basis_matrix
    }

    pub fn basis_inverse(&self) -> &Array2<f64> {
        &self.basis_inverse
    }

    /// Objective coefficients of the basic variables (max sense).
    pub fn cbv(&self) -> &Array1<f64> {
        &self.cbv
    }

    /// `cbv·B⁻¹`, one entry per canonical row.
    pub fn dual_values(&self) -> &Array1<f64> {
        &self.duals
    }

    /// The optimal tableau rebuilt from `B⁻¹`.
    pub fn revised_tableau(&self) -> &Array2<f64> {
        &self.revised
    }

    pub fn to_tableau(&self) -> Result<Tableau> {
        let cells = self.revised.outer_iter().map(|row| row.to_vec()).collect();
        Tableau::with_basis(cells, self.names.clone(), self.basis.clone())
    }

    /// Largest absolute entry difference between the rebuilt tableau and
    /// `tableau`. Differing shapes give infinity.
    pub fn max_deviation(&self, tableau: &Tableau) -> f64 {
        if tableau.cells().len() != self.revised.nrows()
            || tableau.variable_count() + 1 != self.revised.ncols()
        {
            return f64::INFINITY;
        }
        tableau
            .cells()
            .iter()
            .flatten()
            .zip(self.revised.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    /// Objective value in the problem's sense.
    pub fn objective_value(&self) -> f64 {
        self.report(self.revised[[0, self.variable_count()]])
    }

    /// Current values of the basic variables, in basis order.
    pub fn basic_values(&self) -> Vec<f64> {
        let n = self.variable_count();
        self.revised.slice(s![1.., n]).to_vec()
    }

    /// Marginal objective change per unit of each canonical row's RHS, in the
    /// row's original orientation and the problem's sense.
    pub fn shadow_prices(&self) -> Vec<f64> {
        self.duals
            .iter()
            .zip(&self.row_signs)
            .map(|(&y, &sign)| self.report(y * sign))
            .collect()
    }

    /// How far a non-basic variable can be raised from zero before a basic
    /// variable hits zero: `[0, min rhs_i / -a_ij]` over negative entries.
    pub fn non_basic_variable_range(&self, column: usize) -> Result<Range> {
        self.check_non_basic(column)?;
        let n = self.variable_count();
        let eps = self.config.feasibility_tolerance;

        let upper = (1..=self.constraint_count())
            .filter(|&i| self.revised[[i, column]] < -eps)
            .map(|i| self.revised[[i, n]] / -self.revised[[i, column]])
            .fold(f64::INFINITY, f64::min);
        Ok(Range::new(0.0, upper))
    }

    /// Effect of fixing a non-basic variable at `value`.
    pub fn non_basic_value_effect(&self, column: usize, value: f64) -> Result<WhatIf> {
        self.check_non_basic(column)?;
        if value < 0.0 {
            return Err(Error::invalid_input("a non-basic variable cannot be negative"));
        }
        let n = self.variable_count();
        let deltas: Vec<f64> = (1..=self.constraint_count())
            .map(|i| -self.revised[[i, column]] * value)
            .collect();
        let z = self.revised[[0, n]] - self.revised[[0, column]] * value;
        Ok(self.what_if(&deltas, z))
    }

    /// Range over which a basic variable's value can move, bounded by the
    /// other basic variables through row `p` of `B⁻¹`.
    pub fn basic_variable_range(&self, column: usize) -> Result<Range> {
        let p = self.basic_position(column)?;
        let eps = self.config.feasibility_tolerance;
        let values = self.basic_values();
        let current = values[p];

        let mut max_increase = f64::INFINITY;
        let mut min_decrease = f64::NEG_INFINITY;
        for (i, &d) in self.basis_inverse.row(p).iter().enumerate() {
            if i == p || d.abs() <= eps {
                continue;
            }
            let ratio = values[i] / d;
            if d > 0.0 {
                max_increase = max_increase.min(ratio);
            } else {
                min_decrease = min_decrease.max(ratio);
            }
        }
        Ok(Range::new(
            (current + min_decrease).max(0.0),
            current + max_increase,
        ))
    }

    /// Values the RHS of canonical row `row` can take, in the row's original
    /// orientation, while `B⁻¹·b` stays non-negative.
    pub fn rhs_range(&self, row: usize) -> Result<Range> {
        self.check_row(row)?;
        let eps = self.config.feasibility_tolerance;
        let n = self.variable_count();
        let current = self.initial[[row + 1, n]];
        let values = self.basic_values();

        let mut decrease = f64::INFINITY;
        let mut increase = f64::INFINITY;
        for (i, &d) in self.basis_inverse.column(row).iter().enumerate() {
            if d > eps {
                decrease = decrease.min(values[i] / d);
            } else if d < -eps {
                increase = increase.min(values[i] / -d);
            }
        }
        let range = Range::new(current - decrease, current + increase);
        Ok(if self.row_signs[row] < 0.0 {
            range.negated()
        } else {
            range
        })
    }

    /// Effect of setting the RHS of canonical row `row` (original
    /// orientation) to `new_rhs`.
    pub fn rhs_change_effect(&self, row: usize, new_rhs: f64) -> Result<WhatIf> {
        self.check_row(row)?;
        let n = self.variable_count();
        let delta = self.row_signs[row] * new_rhs - self.initial[[row + 1, n]];
        let deltas: Vec<f64> = self
            .basis_inverse
            .column(row)
            .iter()
            .map(|d| d * delta)
            .collect();
        let z = self.revised[[0, n]] + self.duals[row] * delta;
        Ok(self.what_if(&deltas, z))
    }

    /// Objective coefficient range of a column, in the problem's sense, over
    /// which the current basis stays optimal.
    pub fn objective_coefficient_range(&self, column: usize) -> Result<Range> {
        let n = self.variable_count();
        if column >= n {
            return Err(Error::out_of_range("column", column, n));
        }
        let eps = self.config.feasibility_tolerance;
        let c = -self.initial[[0, column]];

        let range = match self.basis.iter().position(|&b| b == column) {
            None => Range::new(f64::NEG_INFINITY, c + self.revised[[0, column]]),
            Some(p) => {
                let mut low = f64::NEG_INFINITY;
                let mut high = f64::INFINITY;
                for k in (0..n).filter(|k| !self.basis.contains(k)) {
                    let a = self.revised[[p + 1, k]];
                    let z = self.revised[[0, k]];
                    if a > eps {
                        low = low.max(-z / a);
                    } else if a < -eps {
                        high = high.min(-z / a);
                    }
                }
                Range::new(c + low, c + high)
            }
        };
        Ok(match self.direction {
            Direction::Max => range,
            Direction::Min => range.negated(),
        })
    }

    /// Range of the starting coefficient `a[row][column]` of a non-basic
    /// column for which its reduced cost stays non-negative.
    pub fn constraint_coefficient_range(&self, column: usize, row: usize) -> Result<Range> {
        self.check_non_basic(column)?;
        self.check_row(row)?;
        let eps = self.config.feasibility_tolerance;
        let a = self.initial[[row + 1, column]];
        let z = self.revised[[0, column]];
        let y = self.duals[row];

        Ok(if y > eps {
            Range::new(a - z / y, f64::INFINITY)
        } else if y < -eps {
            Range::new(f64::NEG_INFINITY, a - z / y)
        } else {
            Range::new(f64::NEG_INFINITY, f64::INFINITY)
        })
    }

    /// Prices out a new activity with objective coefficient `cost` (problem
    /// sense) and one coefficient per problem constraint.
    ///
    /// Returns its z-row entry followed by its constraint-row entries in the
    /// optimal tableau. A negative z-row entry means the activity would
    /// improve the objective.
    pub fn add_activity(&self, cost: f64, coefficients: &[f64]) -> Result<Vec<f64>> {
        let column = self.canonical_column(coefficients)?;
        let c = match self.direction {
            Direction::Max => cost,
            Direction::Min => -cost,
        };
        let mut out = Vec::with_capacity(column.len() + 1);
        out.push(self.duals.dot(&column) - c);
        out.extend(self.basis_inverse.dot(&column));
        Ok(out)
    }

    /// Appends a constraint over the existing columns to the optimal tableau,
    /// expresses it in terms of the current basis and reoptimizes with the
    /// dual simplex.
    ///
    /// `>=` rows are negated before they are appended. Equality rows are not
    /// supported here and give `InvalidInput`.
    pub fn add_constraint(
        &self,
        coefficients: &[f64],
        kind: ConstraintKind,
        rhs: f64,
        sink: &mut dyn OutputSink,
    ) -> Result<SolveResult> {
        let sign = match kind {
            ConstraintKind::Le => 1.0,
            ConstraintKind::Ge => -1.0,
            ConstraintKind::Eq => {
                return Err(Error::invalid_input(
                    "equality rows cannot be added to an optimal tableau; add a <= and a >= row",
                ))
            }
        };
        let row: Vec<f64> = coefficients.iter().map(|a| sign * a).collect();

        let mut tableau = self.to_tableau()?;
        let slack = format!(
            "s{}",
            tableau.names().iter().filter(|name| name.starts_with('s')).count() + 1
        );
        let new_row = tableau.append_row(&row, sign * rhs, &slack)?;
        eliminate_basic_columns(&mut tableau, new_row, self.config.pivot_tolerance);
        tableau.render(sink, "Added constraint", None);

        let solver = DualSimplexSolver::new(self.config.clone().with_dual_rule(DualColumnRule::MinimumRatio));
        let mut result = solver.solve_tableau(tableau, sink)?;
        result.objective_value = self.report(result.objective_value);
        Ok(result)
    }

    /// Writes the matrices and the rebuilt tableau.
    pub fn describe(&self, sink: &mut dyn OutputSink) {
        write_matrix(sink, "cbv", &self.cbv.clone().insert_axis(ndarray::Axis(0)));
        write_matrix(sink, "B", &self.basis_matrix);
        write_matrix(sink, "B^-1", &self.basis_inverse);
        write_matrix(sink, "cbv B^-1", &self.duals.clone().insert_axis(ndarray::Axis(0)));
        if let Ok(tableau) = self.to_tableau() {
            tableau.render(sink, "Optimal Changing Table", None);
        }
    }

    /// Writes every range this analysis offers.
    pub fn report_ranges(&self, sink: &mut dyn OutputSink) {
        sink.start_section("Sensitivity Ranges");
        for (j, name) in self.names.iter().enumerate() {
            let value_range = if self.basis.contains(&j) {
                self.basic_variable_range(j)
            } else {
                self.non_basic_variable_range(j)
            };
            let cost_range = self.objective_coefficient_range(j);
            if let (Ok(value_range), Ok(cost_range)) = (value_range, cost_range) {
                sink.write_line(&format!("{name}: value {value_range}, cost {cost_range}"));
            }
        }
        for (row, price) in self.shadow_prices().into_iter().enumerate() {
            if let Ok(range) = self.rhs_range(row) {
                sink.write_line(&format!(
                    "row {}: shadow price {price:.4}, rhs {range}",
                    row + 1
                ));
            }
        }
    }

    fn what_if(&self, deltas: &[f64], z: f64) -> WhatIf {
        let eps = self.config.feasibility_tolerance;
        let basic_values: Vec<(usize, f64)> = self
            .basis
            .iter()
            .zip(self.basic_values())
            .zip(deltas)
            .map(|((&column, value), delta)| (column, value + delta))
            .collect();
        let feasible = basic_values.iter().all(|&(_, v)| v >= -eps);
        WhatIf {
            basic_values,
            objective_value: self.report(z),
            feasible,
        }
    }

    fn canonical_column(&self, coefficients: &[f64]) -> Result<Array1<f64>> {
        let expected = self.row_sources.iter().max().map_or(0, |&r| r + 1);
        if coefficients.len() != expected {
            return Err(Error::dimension_mismatch(format!(
                "activity has {} coefficients for {expected} constraints",
                coefficients.len()
            )));
        }
        Ok(self
            .row_sources
            .iter()
            .zip(&self.row_signs)
            .map(|(&source, &sign)| sign * coefficients[source])
            .collect())
    }

    fn report(&self, z: f64) -> f64 {
        match self.direction {
            Direction::Max => z,
            Direction::Min => -z,
        }
    }

    fn basic_position(&self, column: usize) -> Result<usize> {
        let n = self.variable_count();
        if column >= n {
            return Err(Error::out_of_range("column", column, n));
        }
        self.basis
            .iter()
            .position(|&b| b == column)
            .ok_or(Error::VariableNotBasic { column })
    }

    fn check_non_basic(&self, column: usize) -> Result<()> {
        let n = self.variable_count();
        if column >= n {
            return Err(Error::out_of_range("column", column, n));
        }
        if self.basis.contains(&column) {
            return Err(Error::VariableIsBasic { column });
        }
        Ok(())
    }

    fn check_row(&self, row: usize) -> Result<()> {
        let m = self.constraint_count();
        if row >= m {
            return Err(Error::out_of_range("row", row, m));
        }
        Ok(())
    }
}

/// Subtracts multiples of the basic rows so every basic column is zero in
/// `row`.
pub(crate) fn eliminate_basic_columns(tableau: &mut Tableau, row: usize, tolerance: f64) {
    let basis: Vec<(usize, usize)> = tableau
        .basis()
        .iter()
        .enumerate()
        .map(|(i, &b)| (i + 1, b))
        .filter(|&(i, _)| i != row)
        .collect();
    for (basic_row, column) in basis {
        let factor = tableau.get(row, column);
        if factor.abs() <= tolerance {
            continue;
        }
        let source = tableau.row(basic_row).to_vec();
        for (value, s) in tableau.row_mut(row).iter_mut().zip(source) {
            *value -= factor * s;
        }
    }
}

/// Gauss-Jordan inversion. A pivot at or below `tolerance` is swapped with
/// the first lower row that has a usable entry in that column.
pub fn invert(matrix: &Array2<f64>, tolerance: f64) -> Result<Array2<f64>> {
    let n = matrix.nrows();
    if matrix.ncols() != n {
        return Err(Error::dimension_mismatch(format!(
            "cannot invert a {}x{} matrix",
            n,
            matrix.ncols()
        )));
    }
    let mut a = matrix.clone();
    let mut inverse = Array2::<f64>::eye(n);

    for c in 0..n {
        if a[[c, c]].abs() <= tolerance {
            let swap = (c + 1..n)
                .find(|&r| a[[r, c]].abs() > tolerance)
                .ok_or(Error::SingularBasis { column: c })?;
            swap_rows(&mut a, c, swap);
            swap_rows(&mut inverse, c, swap);
        }

        let pivot = a[[c, c]];
        a.row_mut(c).mapv_inplace(|v| v / pivot);
        inverse.row_mut(c).mapv_inplace(|v| v / pivot);

        for r in 0..n {
            if r == c {
                continue;
            }
            let factor = a[[r, c]];
            if factor == 0.0 {
                continue;
            }
            let a_c = a.row(c).to_owned();
            let inv_c = inverse.row(c).to_owned();
            a.row_mut(r).scaled_add(-factor, &a_c);
            inverse.row_mut(r).scaled_add(-factor, &inv_c);
        }
    }
    Ok(inverse)
}

fn swap_rows(matrix: &mut Array2<f64>, a: usize, b: usize) {
    let row_a = matrix.row(a).to_owned();
    let row_b = matrix.row(b).to_owned();
    matrix.row_mut(a).assign(&row_b);
    matrix.row_mut(b).assign(&row_a);
}

fn write_matrix(sink: &mut dyn OutputSink, name: &str, matrix: &Array2<f64>) {
    sink.start_section(name);
    for row in matrix.outer_iter() {
        let line: Vec<String> = row.iter().map(|v| format!("{v:>10.4}")).collect();
        sink.write_line(&line.join(""));
    }
}
