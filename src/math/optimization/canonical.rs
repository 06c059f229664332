//! Problem model, sign-restriction transforms and canonical (slack/excess)
//! form.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::math::optimization::tableau::Tableau;
use crate::output::OutputSink;

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Max,
    Min,
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "max" => Ok(Direction::Max),
            "min" => Ok(Direction::Min),
            other => Err(Error::invalid_input(format!(
                "unknown direction `{other}`, expected `max` or `min`"
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Max => write!(f, "max"),
            Direction::Min => write!(f, "min"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Le,
    Ge,
    Eq,
}

impl FromStr for ConstraintKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "<=" | "≤" => Ok(ConstraintKind::Le),
            ">=" | "≥" => Ok(ConstraintKind::Ge),
            "=" | "==" => Ok(ConstraintKind::Eq),
            other => Err(Error::invalid_input(format!(
                "unknown constraint relation `{other}`"
            ))),
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::Le => write!(f, "<="),
            ConstraintKind::Ge => write!(f, ">="),
            ConstraintKind::Eq => write!(f, "="),
        }
    }
}

/// One constraint row `coefficients · x (<=|>=|=) rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub coefficients: Vec<f64>,
    pub kind: ConstraintKind,
    pub rhs: f64,
}

impl Constraint {
    pub fn new(coefficients: Vec<f64>, kind: ConstraintKind, rhs: f64) -> Self {
        Self {
            coefficients,
            kind,
            rhs,
        }
    }

    pub fn le(coefficients: Vec<f64>, rhs: f64) -> Self {
        Self::new(coefficients, ConstraintKind::Le, rhs)
    }

    pub fn ge(coefficients: Vec<f64>, rhs: f64) -> Self {
        Self::new(coefficients, ConstraintKind::Ge, rhs)
    }

    pub fn eq(coefficients: Vec<f64>, rhs: f64) -> Self {
        Self::new(coefficients, ConstraintKind::Eq, rhs)
    }

    /// Left-hand side evaluated at `x`.
    pub fn lhs(&self, x: &[f64]) -> f64 {
        self.coefficients.iter().zip(x).map(|(a, v)| a * v).sum()
    }

    /// Whether `x` satisfies the constraint within `tolerance`.
    pub fn is_satisfied(&self, x: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs(x);
        match self.kind {
            ConstraintKind::Le => lhs <= self.rhs + tolerance,
            ConstraintKind::Ge => lhs >= self.rhs - tolerance,
            ConstraintKind::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// Sign restriction of a decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariableSign {
    #[default]
    Positive,
    Negative,
    Unrestricted,
    Integer,
    Binary,
}

impl VariableSign {
    /// Integer and binary variables take whole values.
    pub fn is_integral(self) -> bool {
        matches!(self, VariableSign::Integer | VariableSign::Binary)
    }
}

impl fmt::Display for VariableSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariableSign::Positive => "positive",
            VariableSign::Negative => "negative",
            VariableSign::Unrestricted => "unrestricted",
            VariableSign::Integer => "integer",
            VariableSign::Binary => "binary",
        };
        write!(f, "{name}")
    }
}

/// A parsed linear or integer program.
///
/// `signs` may be left empty, in which case every variable is
/// [`VariableSign::Positive`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Problem {
    pub direction: Direction,
    pub objective: Vec<f64>,
    pub constraints: Vec<Constraint>,
    pub signs: Vec<VariableSign>,
}

impl Problem {
    pub fn new(direction: Direction, objective: Vec<f64>) -> Self {
        Self {
            direction,
            objective,
            constraints: Vec::new(),
            signs: Vec::new(),
        }
    }

    pub fn maximize(objective: Vec<f64>) -> Self {
        Self::new(Direction::Max, objective)
    }

    pub fn minimize(objective: Vec<f64>) -> Self {
        Self::new(Direction::Min, objective)
    }

    pub fn subject_to(mut self, coefficients: Vec<f64>, kind: ConstraintKind, rhs: f64) -> Self {
        self.constraints.push(Constraint::new(coefficients, kind, rhs));
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_signs(mut self, signs: Vec<VariableSign>) -> Self {
        self.signs = signs;
        self
    }

    /// Sets the restriction of one variable, filling the others with
    /// `Positive` if no signs were given yet.
    pub fn with_sign(mut self, index: usize, sign: VariableSign) -> Self {
        if self.signs.len() < self.objective.len() {
            self.signs.resize(self.objective.len(), VariableSign::Positive);
        }
        if let Some(slot) = self.signs.get_mut(index) {
            *slot = sign;
        }
        self
    }

    pub fn variable_count(&self) -> usize {
        self.objective.len()
    }

    pub fn sign(&self, index: usize) -> VariableSign {
        self.signs.get(index).copied().unwrap_or_default()
    }

    /// Indices of the variables restricted to whole values.
    pub fn integer_variables(&self) -> Vec<usize> {
        (0..self.variable_count())
            .filter(|&i| self.sign(i).is_integral())
            .collect()
    }

    /// Objective value at `x` in the problem's own sense.
    pub fn evaluate(&self, x: &[f64]) -> f64 {
        self.objective.iter().zip(x).map(|(c, v)| c * v).sum()
    }

    /// Checks that every row and the sign list agree with the objective's
    /// length and that all numbers are finite.
    pub fn validate(&self) -> Result<()> {
        let n = self.objective.len();
        if n == 0 {
            return Err(Error::dimension_mismatch("objective has no coefficients"));
        }
        if !self.objective.iter().all(|c| c.is_finite()) {
            return Err(Error::invalid_input("objective contains a non-finite value"));
        }
        for (i, constraint) in self.constraints.iter().enumerate() {
            if constraint.coefficients.len() != n {
                return Err(Error::dimension_mismatch(format!(
                    "constraint {} has {} coefficients, objective has {n}",
                    i + 1,
                    constraint.coefficients.len()
                )));
            }
            if !constraint.rhs.is_finite() || !constraint.coefficients.iter().all(|a| a.is_finite()) {
                return Err(Error::invalid_input(format!(
                    "constraint {} contains a non-finite value",
                    i + 1
                )));
            }
        }
        if !self.signs.is_empty() && self.signs.len() != n {
            return Err(Error::dimension_mismatch(format!(
                "{} sign restrictions for {n} variables",
                self.signs.len()
            )));
        }
        Ok(())
    }
}

/// How one original variable maps into the sign-transformed problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableTransformation {
    Positive { original: usize, column: usize },
    /// `x = -x'`.
    Negative { original: usize, column: usize },
    /// `x = x⁺ - x⁻`, stored in two adjacent columns.
    Unrestricted {
        original: usize,
        positive: usize,
        negative: usize,
    },
    Integer { original: usize, column: usize },
    /// Also contributes an `x <= 1` row.
    Binary { original: usize, column: usize },
}

impl VariableTransformation {
    pub fn original(&self) -> usize {
        match *self {
            VariableTransformation::Positive { original, .. }
            | VariableTransformation::Negative { original, .. }
            | VariableTransformation::Unrestricted { original, .. }
            | VariableTransformation::Integer { original, .. }
            | VariableTransformation::Binary { original, .. } => original,
        }
    }

    pub fn sign(&self) -> VariableSign {
        match self {
            VariableTransformation::Positive { .. } => VariableSign::Positive,
            VariableTransformation::Negative { .. } => VariableSign::Negative,
            VariableTransformation::Unrestricted { .. } => VariableSign::Unrestricted,
            VariableTransformation::Integer { .. } => VariableSign::Integer,
            VariableTransformation::Binary { .. } => VariableSign::Binary,
        }
    }

    /// Columns `(column, factor)` this variable occupies in the transformed
    /// problem; the original coefficient is multiplied by `factor`.
    fn images(&self) -> Vec<(usize, f64)> {
        match *self {
            VariableTransformation::Positive { column, .. }
            | VariableTransformation::Integer { column, .. }
            | VariableTransformation::Binary { column, .. } => vec![(column, 1.0)],
            VariableTransformation::Negative { column, .. } => vec![(column, -1.0)],
            VariableTransformation::Unrestricted {
                positive, negative, ..
            } => vec![(positive, 1.0), (negative, -1.0)],
        }
    }

    /// Value of the original variable given transformed values. Columns
    /// outside `values` read as zero.
    pub fn recover(&self, values: &[f64]) -> f64 {
        self.images()
            .into_iter()
            .map(|(column, factor)| factor * values.get(column).copied().unwrap_or(0.0))
            .sum()
    }
}

impl fmt::Display for VariableTransformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let x = self.original() + 1;
        match *self {
            VariableTransformation::Negative { column, .. } => {
                write!(f, "x{x} (negative) -> -x'{}", column + 1)
            }
            VariableTransformation::Unrestricted {
                positive, negative, ..
            } => write!(f, "x{x} (unrestricted) -> x'{} - x'{}", positive + 1, negative + 1),
            VariableTransformation::Positive { column, .. }
            | VariableTransformation::Integer { column, .. }
            | VariableTransformation::Binary { column, .. } => {
                write!(f, "x{x} ({}) -> x'{}", self.sign(), column + 1)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignStatus {
    Valid,
    /// A hard restriction (`>= 0` or `<= 0`) is violated.
    Invalid,
    /// An integrality restriction is not met; LP solves only relax it.
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignCheckEntry {
    pub index: usize,
    pub value: f64,
    pub sign: VariableSign,
    pub status: SignStatus,
}

/// Result of [`SignTransformation::verify_sign_restrictions`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignCheck {
    pub entries: Vec<SignCheckEntry>,
}

impl SignCheck {
    /// No hard restriction is violated. Warnings do not count.
    pub fn all_valid(&self) -> bool {
        self.entries.iter().all(|e| e.status != SignStatus::Invalid)
    }

    pub fn write_to(&self, sink: &mut dyn OutputSink) {
        sink.start_section("Verifying Variable Sign Restrictions");
        for entry in &self.entries {
            let status = match (entry.status, entry.sign) {
                (SignStatus::Valid, _) => "valid",
                (SignStatus::Invalid, VariableSign::Negative) => "invalid (should be <= 0)",
                (SignStatus::Invalid, _) => "invalid (should be >= 0)",
                (SignStatus::Warning, VariableSign::Binary) => "warning (should be 0 or 1)",
                (SignStatus::Warning, _) => "warning (should be integer)",
            };
            sink.write_line(&format!(
                "x{} = {:.4} ({}) - {status}",
                entry.index + 1,
                entry.value,
                entry.sign
            ));
        }
        sink.write_line(if self.all_valid() {
            "Overall: all sign restrictions satisfied"
        } else {
            "Overall: some sign restrictions violated"
        });
    }
}

/// The sign-restriction substitution applied before canonicalization.
///
/// The transformed problem has only non-negative variables. Integer and binary
/// columns keep their sign so integer methods can still find them.
#[derive(Debug, Clone, PartialEq)]
pub struct SignTransformation {
    transformed: Problem,
    transformations: Vec<VariableTransformation>,
}

impl SignTransformation {
    /// Substitutes every variable according to its sign restriction.
    ///
    /// Negative variables have their coefficients negated, unrestricted
    /// variables are split into two adjacent columns and every binary variable
    /// gets an `x <= 1` row after all original rows. The input is not
    /// modified.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem as parsed
    ///
    /// # Returns
    ///
    /// The transformation, or `DimensionMismatch` if the problem is malformed.
    pub fn apply(problem: &Problem) -> Result<Self> {
        problem.validate()?;

        let mut transformations = Vec::with_capacity(problem.variable_count());
        let mut next = 0;
        for original in 0..problem.variable_count() {
            let t = match problem.sign(original) {
                VariableSign::Positive => VariableTransformation::Positive {
                    original,
                    column: next,
                },
                VariableSign::Negative => VariableTransformation::Negative {
                    original,
                    column: next,
                },
                VariableSign::Integer => VariableTransformation::Integer {
                    original,
                    column: next,
                },
                VariableSign::Binary => VariableTransformation::Binary {
                    original,
                    column: next,
                },
                VariableSign::Unrestricted => VariableTransformation::Unrestricted {
                    original,
                    positive: next,
                    negative: next + 1,
                },
            };
            next += t.images().len();
            transformations.push(t);
        }
        let width = next;

        let spread = |coefficients: &[f64]| {
            let mut row = vec![0.0; width];
            for (t, &a) in transformations.iter().zip(coefficients) {
                for (column, factor) in t.images() {
                    row[column] = factor * a;
                }
            }
            row
        };

        let mut signs = vec![VariableSign::Positive; width];
        for t in &transformations {
            if let VariableTransformation::Integer { column, .. }
            | VariableTransformation::Binary { column, .. } = *t
            {
                signs[column] = t.sign();
            }
        }

        let mut constraints: Vec<Constraint> = problem
            .constraints
            .iter()
            .map(|c| Constraint::new(spread(&c.coefficients), c.kind, c.rhs))
            .collect();
        for t in &transformations {
            if let VariableTransformation::Binary { column, .. } = *t {
                let mut row = vec![0.0; width];
                row[column] = 1.0;
                constraints.push(Constraint::le(row, 1.0));
            }
        }

        let transformed = Problem {
            direction: problem.direction,
            objective: spread(&problem.objective),
            constraints,
            signs,
        };
        log::debug!(
            "sign transform: {} variables -> {} columns, {} rows",
            problem.variable_count(),
            width,
            transformed.constraints.len()
        );

        Ok(Self {
            transformed,
            transformations,
        })
    }

    /// The substituted problem, all variables non-negative.
    pub fn problem(&self) -> &Problem {
        &self.transformed
    }

    pub fn into_problem(self) -> Problem {
        self.transformed
    }

    pub fn transformations(&self) -> &[VariableTransformation] {
        &self.transformations
    }

    /// Whether the transformed problem is the original one: no substituted
    /// columns and no added bound rows.
    pub fn is_identity(&self) -> bool {
        self.transformations.iter().all(|t| {
            matches!(
                t,
                VariableTransformation::Positive { .. } | VariableTransformation::Integer { .. }
            )
        })
    }

    /// Maps values of the transformed columns back to original variables.
    pub fn transform_solution_back(&self, values: &[f64]) -> Vec<f64> {
        let mut original = vec![0.0; self.transformations.len()];
        for t in &self.transformations {
            original[t.original()] = t.recover(values);
        }
        original
    }

    /// Checks original-space values against their sign restrictions.
    pub fn verify_sign_restrictions(&self, values: &[f64], tolerance: f64) -> SignCheck {
        let entries = self
            .transformations
            .iter()
            .zip(values)
            .map(|(t, &value)| {
                let sign = t.sign();
                let status = match sign {
                    VariableSign::Positive if value < -tolerance => SignStatus::Invalid,
                    VariableSign::Negative if value > tolerance => SignStatus::Invalid,
                    VariableSign::Integer if (value - value.round()).abs() > tolerance => {
                        SignStatus::Warning
                    }
                    VariableSign::Binary
                        if value.abs() > tolerance && (value - 1.0).abs() > tolerance =>
                    {
                        SignStatus::Warning
                    }
                    _ => SignStatus::Valid,
                };
                SignCheckEntry {
                    index: t.original(),
                    value,
                    sign,
                    status,
                }
            })
            .collect();
        SignCheck { entries }
    }

    pub fn describe(&self, sink: &mut dyn OutputSink) {
        sink.start_section("Variable Transformations");
        for t in &self.transformations {
            sink.write_line(&t.to_string());
        }
    }
}

/// Role of a canonical-form column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Decision variable (index into the problem's objective).
    Decision(usize),
    /// Slack of the canonical row with this index.
    Slack(usize),
    /// Excess of the canonical row with this index.
    Excess(usize),
}

/// A problem in canonical form, ready to become the initial tableau.
///
/// Columns are the decision variables followed by one slack (`<=` rows) or
/// excess (`>=` rows) column per canonical row, in row order. `>=` rows are
/// negated so that each excess column enters with `+1`; the right-hand side
/// of such a row may then be negative, which is what the dual phase repairs.
/// Equality rows are expanded into a `<=` and `>=` pair.
///
/// Sign restrictions are not looked at here; apply a
/// [`SignTransformation`] first.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalForm {
    direction: Direction,
    decision_count: usize,
    cells: Vec<Vec<f64>>,
    names: Vec<String>,
    columns: Vec<ColumnKind>,
    row_signs: Vec<f64>,
    row_sources: Vec<usize>,
}

impl CanonicalForm {
    /// Builds the canonical form of `problem`.
    ///
    /// # Arguments
    ///
    /// * `problem` - A problem whose variables are all non-negative
    ///
    /// # Returns
    ///
    /// The canonical form, or `DimensionMismatch` when a constraint row's
    /// length disagrees with the objective.
    ///
    /// # Examples
    ///
    /// ```
    /// use lpip::math::optimization::{CanonicalForm, Problem, ConstraintKind};
    ///
    /// let problem = Problem::maximize(vec![3.0, 2.0])
    ///     .subject_to(vec![1.0, 2.0], ConstraintKind::Le, 10.0)
    ///     .subject_to(vec![1.0, 1.0], ConstraintKind::Ge, 2.0);
    /// let form = CanonicalForm::from_problem(&problem).unwrap();
    ///
    /// assert_eq!(form.names(), &["x1", "x2", "s1", "e1"]);
    /// assert_eq!(form.cells()[2], vec![-1.0, -1.0, 0.0, 1.0, -2.0]);
    /// ```
    pub fn from_problem(problem: &Problem) -> Result<Self> {
        problem.validate()?;
        let n = problem.variable_count();

        // (coefficients already sign-adjusted, rhs, sign, source row)
        let mut rows: Vec<(Vec<f64>, f64, f64, usize)> = Vec::new();
        for (source, constraint) in problem.constraints.iter().enumerate() {
            let le = (constraint.coefficients.clone(), constraint.rhs, 1.0, source);
            let ge = (
                constraint.coefficients.iter().map(|a| -a).collect(),
                -constraint.rhs,
                -1.0,
                source,
            );
            match constraint.kind {
                ConstraintKind::Le => rows.push(le),
                ConstraintKind::Ge => rows.push(ge),
                ConstraintKind::Eq => {
                    rows.push(le);
                    rows.push(ge);
                }
            }
        }
        let m = rows.len();
        let width = n + m;

        let mut names: Vec<String> = (1..=n).map(|k| format!("x{k}")).collect();
        let mut columns: Vec<ColumnKind> = (0..n).map(ColumnKind::Decision).collect();
        let (mut slacks, mut excesses) = (0, 0);
        for (r, (_, _, sign, _)) in rows.iter().enumerate() {
            if *sign > 0.0 {
                slacks += 1;
                names.push(format!("s{slacks}"));
                columns.push(ColumnKind::Slack(r));
            } else {
                excesses += 1;
                names.push(format!("e{excesses}"));
                columns.push(ColumnKind::Excess(r));
            }
        }

        let mut cells = Vec::with_capacity(m + 1);
        let mut z_row = vec![0.0; width + 1];
        for (j, &c) in problem.objective.iter().enumerate() {
            z_row[j] = match problem.direction {
                Direction::Max => -c,
                Direction::Min => c,
            };
        }
        cells.push(z_row);

        let mut row_signs = Vec::with_capacity(m);
        let mut row_sources = Vec::with_capacity(m);
        for (r, (coefficients, rhs, sign, source)) in rows.into_iter().enumerate() {
            let mut row = vec![0.0; width + 1];
            row[..n].copy_from_slice(&coefficients);
            row[n + r] = 1.0;
            row[width] = rhs;
            cells.push(row);
            row_signs.push(sign);
            row_sources.push(source);
        }

        log::debug!("canonical form: {m} rows, {width} columns");
        Ok(Self {
            direction: problem.direction,
            decision_count: n,
            cells,
            names,
            columns,
            row_signs,
            row_sources,
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn decision_count(&self) -> usize {
        self.decision_count
    }

    pub fn constraint_count(&self) -> usize {
        self.cells.len() - 1
    }

    pub fn column_count(&self) -> usize {
        self.names.len()
    }

    /// The initial tableau matrix, z-row first.
    pub fn cells(&self) -> &[Vec<f64>] {
        &self.cells
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[ColumnKind] {
        &self.columns
    }

    /// `+1` for rows kept as written, `-1` for negated (`>=`) rows.
    pub fn row_signs(&self) -> &[f64] {
        &self.row_signs
    }

    /// Problem constraint each canonical row came from.
    pub fn row_sources(&self) -> &[usize] {
        &self.row_sources
    }

    /// The slack and excess columns, one per row.
    pub fn initial_basis(&self) -> Vec<usize> {
        (0..self.constraint_count())
            .map(|r| self.decision_count + r)
            .collect()
    }

    pub fn initial_tableau(&self) -> Result<Tableau> {
        Tableau::with_basis(self.cells.clone(), self.names.clone(), self.initial_basis())
    }

    /// Converts the canonical (maximization) z value into the problem's sense.
    pub fn report_objective(&self, z: f64) -> f64 {
        match self.direction {
            Direction::Max => z,
            Direction::Min => -z,
        }
    }

    /// Writes the canonical equations.
    pub fn describe(&self, sink: &mut dyn OutputSink) {
        let width = self.column_count();
        sink.start_section("Canonical Form");

        let z_terms = format_terms(&self.cells[0][..width], &self.names, true);
        let head = match self.direction {
            Direction::Max => "max z",
            Direction::Min => "max -z",
        };
        sink.write_line(&format!("{head}{z_terms} = 0"));

        for row in self.cells.iter().skip(1) {
            let terms = format_terms(&row[..width], &self.names, false);
            sink.write_line(&format!("{terms} = {}", row[width]));
        }
    }
}

/// Renders `a1 x1 + a2 x2 ...` skipping zeros. With `continued`, the first
/// term also gets a leading ` + ` or ` - `.
fn format_terms(coefficients: &[f64], names: &[String], continued: bool) -> String {
    let mut out = String::new();
    for (&a, name) in coefficients.iter().zip(names) {
        if a == 0.0 {
            continue;
        }
        let magnitude = a.abs();
        let body = if magnitude == 1.0 {
            name.clone()
        } else {
            format!("{magnitude}{name}")
        };
        if out.is_empty() && !continued {
            if a < 0.0 {
                out.push('-');
            }
        } else {
            out.push_str(if a < 0.0 { " - " } else { " + " });
        }
        out.push_str(&body);
    }
    if out.is_empty() && !continued {
        out.push('0');
    }
    out
}
