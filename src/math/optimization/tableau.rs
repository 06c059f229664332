use std::fmt;

use crate::error::{Error, Result};
use crate::output::OutputSink;

/// A dense simplex tableau.
///
/// Row 0 is the objective ("z") row, rows `1..=m` are constraints. Columns
/// `0..n` are the structural, slack and excess variables and column `n` holds
/// the right-hand side. `basis[i]` is the column that is basic in row `i + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tableau {
    cells: Vec<Vec<f64>>,
    basis: Vec<usize>,
    names: Vec<String>,
}

impl Tableau {
    /// Builds a tableau and guesses its basis from the identity columns it
    /// already contains.
    ///
    /// Rows for which no identity column exists fall back to the lowest column
    /// indices not yet used; [`Tableau::canonicalize_to_basis`] reconciles
    /// such a guess with the matrix.
    pub fn new(cells: Vec<Vec<f64>>, names: Vec<String>) -> Result<Self> {
        let (m, n) = check_shape(&cells)?;
        let names = check_names(names, n)?;
        let basis = guess_basis(&cells, m, n);
        Ok(Self {
            cells,
            basis,
            names,
        })
    }

    /// Builds a tableau with an explicitly declared basis. The matrix is not
    /// modified; call [`Tableau::canonicalize_to_basis`] if the declared basic
    /// columns are not unit vectors yet.
    pub fn with_basis(cells: Vec<Vec<f64>>, names: Vec<String>, basis: Vec<usize>) -> Result<Self> {
        let (m, n) = check_shape(&cells)?;
        let names = check_names(names, n)?;
        check_basis(&basis, m, n)?;
        Ok(Self {
            cells,
            basis,
            names,
        })
    }

    /// Number of constraint rows `m`.
    pub fn constraint_count(&self) -> usize {
        self.cells.len() - 1
    }

    /// Number of variable columns `n` (the RHS column excluded).
    pub fn variable_count(&self) -> usize {
        self.cells[0].len() - 1
    }

    pub fn cells(&self) -> &[Vec<f64>] {
        &self.cells
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.cells[row]
    }

    pub fn get(&self, row: usize, column: usize) -> f64 {
        self.cells[row][column]
    }

    pub fn rhs(&self, row: usize) -> f64 {
        self.cells[row][self.variable_count()]
    }

    /// RHS values of the constraint rows.
    pub fn rhs_values(&self) -> Vec<f64> {
        let n = self.variable_count();
        self.cells.iter().skip(1).map(|row| row[n]).collect()
    }

    /// The z-row without its RHS entry.
    pub fn reduced_costs(&self) -> &[f64] {
        &self.cells[0][..self.variable_count()]
    }

    /// The z-row RHS, i.e. the objective value of the canonical
    /// (maximization) problem.
    pub fn objective_value(&self) -> f64 {
        self.rhs(0)
    }

    pub fn basis(&self) -> &[usize] {
        &self.basis
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, column: usize) -> &str {
        &self.names[column]
    }

    pub fn is_basic(&self, column: usize) -> bool {
        self.basis.contains(&column)
    }

    /// Tableau row (1-based) in which `column` is basic.
    pub fn basic_row(&self, column: usize) -> Option<usize> {
        self.basis.iter().position(|&b| b == column).map(|i| i + 1)
    }

    /// Current basic solution over all columns: basic columns take their row's
    /// RHS, everything else is zero.
    pub fn basic_solution(&self) -> Vec<f64> {
        let mut values = vec![0.0; self.variable_count()];
        for (i, &column) in self.basis.iter().enumerate() {
            values[column] = self.rhs(i + 1);
        }
        values
    }

    /// Divides `row` by the pivot element and eliminates `column` from every
    /// other row, z-row included. The basis records `column` as basic in `row`.
    pub fn pivot(&mut self, row: usize, column: usize, tolerance: f64) -> Result<()> {
        let m = self.constraint_count();
        let n = self.variable_count();
        if row == 0 || row > m {
            return Err(Error::out_of_range("pivot row", row, m + 1));
        }
        if column >= n {
            return Err(Error::out_of_range("pivot column", column, n));
        }

        let pivot = self.cells[row][column];
        if pivot.abs() <= tolerance {
            return Err(Error::SingularPivot {
                row,
                column,
                value: pivot,
            });
        }

        for value in self.cells[row].iter_mut() {
            *value /= pivot;
        }
        let pivot_row = self.cells[row].clone();

        for (i, current) in self.cells.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = current[column];
            if factor.abs() <= tolerance {
                continue;
            }
            for (value, &p) in current.iter_mut().zip(&pivot_row) {
                *value -= factor * p;
            }
        }

        // pivot column is exactly a unit vector
        for (i, current) in self.cells.iter_mut().enumerate() {
            current[column] = if i == row { 1.0 } else { 0.0 };
        }

        self.basis[row - 1] = column;
        Ok(())
    }

    /// Pivots once per row so that every declared basic column becomes a unit
    /// vector, the objective row included.
    pub fn canonicalize_to_basis(&mut self, basis: &[usize], tolerance: f64) -> Result<()> {
        check_basis(basis, self.constraint_count(), self.variable_count())?;
        for (i, &column) in basis.iter().enumerate() {
            self.pivot(i + 1, column, tolerance)?;
        }
        Ok(())
    }

    /// Whether `column` is 1 at `row` and zero at every other row, z-row
    /// included.
    pub fn is_unit_column(&self, column: usize, row: usize, tolerance: f64) -> bool {
        self.cells.iter().enumerate().all(|(i, current)| {
            let expected = if i == row { 1.0 } else { 0.0 };
            (current[column] - expected).abs() <= tolerance
        })
    }

    /// Appends a constraint row with a fresh slack column that becomes basic
    /// in the new row. Missing coefficients are padded with zeros.
    ///
    /// Returns the index of the new row.
    pub fn append_row(&mut self, coefficients: &[f64], rhs: f64, slack_name: &str) -> Result<usize> {
        let n = self.variable_count();
        if coefficients.len() > n {
            return Err(Error::dimension_mismatch(format!(
                "appended row has {} coefficients, tableau has {} columns",
                coefficients.len(),
                n
            )));
        }

        for row in self.cells.iter_mut() {
            row.insert(n, 0.0);
        }
        let mut row = vec![0.0; n + 2];
        row[..coefficients.len()].copy_from_slice(coefficients);
        row[n] = 1.0;
        row[n + 1] = rhs;
        self.cells.push(row);
        self.names.push(slack_name.to_string());
        self.basis.push(n);
        Ok(self.cells.len() - 1)
    }

    /// Replaces a constraint row, used when a freshly appended row has to be
    /// expressed in terms of the current basis.
    pub(crate) fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.cells[row]
    }

    /// Writes the tableau as a titled section. With `theta_column` set, a
    /// ratio column `rhs / a` is shown for rows with a positive entry.
    pub fn render(&self, sink: &mut dyn OutputSink, header: &str, theta_column: Option<usize>) {
        sink.start_section(header);
        for line in self.format_lines(theta_column) {
            sink.write_line(&line);
        }
    }

    fn format_lines(&self, theta_column: Option<usize>) -> Vec<String> {
        let n = self.variable_count();
        let mut lines = Vec::with_capacity(self.cells.len() + 1);

        let mut head = format!("{:<6}", "t");
        for name in &self.names {
            head.push_str(&format!("{name:>8}"));
        }
        head.push_str(&format!("{:>8}", "rhs"));
        if theta_column.is_some() {
            head.push_str(&format!("{:>8}", "θ"));
        }
        lines.push(head);

        for (i, row) in self.cells.iter().enumerate() {
            let label = if i == 0 { "z".to_string() } else { i.to_string() };
            let mut line = format!("{label:<6}");
            for &value in row {
                line.push_str(&format!("{:>8.3}", display_value(value)));
            }
            if let (Some(column), true) = (theta_column, i > 0) {
                let a = row[column];
                if a > 1e-12 {
                    line.push_str(&format!("{:>8.3}", display_value(row[n] / a)));
                } else {
                    line.push_str(&format!("{:>8}", "-"));
                }
            }
            lines.push(line);
        }
        lines
    }
}

impl fmt::Display for Tableau {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.format_lines(None) {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Avoids printing `-0.000`.
fn display_value(value: f64) -> f64 {
    if value.abs() < 5e-4 {
        0.0
    } else {
        value
    }
}

/// Default column names `x1 .. xn`.
pub fn default_names(n: usize) -> Vec<String> {
    (1..=n).map(|k| format!("x{k}")).collect()
}

fn check_shape(cells: &[Vec<f64>]) -> Result<(usize, usize)> {
    let width = match cells.first() {
        Some(row) if row.len() >= 2 => row.len(),
        Some(_) => {
            return Err(Error::dimension_mismatch(
                "tableau needs at least one variable column and a RHS column",
            ))
        }
        None => return Err(Error::dimension_mismatch("tableau has no objective row")),
    };
    if let Some((i, row)) = cells.iter().enumerate().find(|(_, row)| row.len() != width) {
        return Err(Error::dimension_mismatch(format!(
            "tableau row {i} has {} entries, expected {width}",
            row.len()
        )));
    }
    Ok((cells.len() - 1, width - 1))
}

fn check_names(names: Vec<String>, n: usize) -> Result<Vec<String>> {
    if names.is_empty() {
        return Ok(default_names(n));
    }
    if names.len() != n {
        return Err(Error::dimension_mismatch(format!(
            "{} column names for {n} columns",
            names.len()
        )));
    }
    Ok(names)
}

fn check_basis(basis: &[usize], m: usize, n: usize) -> Result<()> {
    if basis.len() != m {
        return Err(Error::dimension_mismatch(format!(
            "basis has {} entries for {m} constraint rows",
            basis.len()
        )));
    }
    for (i, &column) in basis.iter().enumerate() {
        if column >= n {
            return Err(Error::out_of_range("basis column", column, n));
        }
        if basis[..i].contains(&column) {
            return Err(Error::invalid_input(format!(
                "column {column} appears twice in the basis"
            )));
        }
    }
    Ok(())
}

/// Finds an identity column for each constraint row; rows left without one get
/// the lowest column indices not already used.
fn guess_basis(cells: &[Vec<f64>], m: usize, n: usize) -> Vec<usize> {
    const UNIT_TOLERANCE: f64 = 1e-9;

    let mut basis: Vec<Option<usize>> = vec![None; m];
    let mut used = vec![false; n];
    for column in 0..n {
        let mut one_row = None;
        let mut is_unit = true;
        for (i, row) in cells.iter().enumerate().skip(1) {
            let value = row[column];
            if (value - 1.0).abs() < UNIT_TOLERANCE && one_row.is_none() {
                one_row = Some(i - 1);
            } else if value.abs() > UNIT_TOLERANCE {
                is_unit = false;
                break;
            }
        }
        if let (true, Some(row)) = (is_unit, one_row) {
            if basis[row].is_none() {
                basis[row] = Some(column);
                used[column] = true;
            }
        }
    }

    let mut free = (0..n).filter(|&c| !used[c]).collect::<Vec<_>>().into_iter();
    basis
        .into_iter()
        .map(|slot| slot.or_else(|| free.next()).unwrap_or(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferSink;
    use approx::assert_relative_eq;

    fn sample() -> Tableau {
        Tableau::new(
            vec![
                vec![-3.0, -2.0, 0.0, 0.0, 0.0],
                vec![1.0, 2.0, 1.0, 0.0, 10.0],
                vec![2.0, 1.0, 0.0, 1.0, 8.0],
            ],
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_guesses_identity_basis() {
        let tableau = sample();
        assert_eq!(tableau.basis(), &[2, 3]);
        assert_eq!(tableau.constraint_count(), 2);
        assert_eq!(tableau.variable_count(), 4);
        assert_eq!(tableau.name(0), "x1");
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let result = Tableau::new(vec![vec![1.0, 0.0], vec![1.0]], Vec::new());
        assert!(matches!(result, Err(Error::DimensionMismatch(_))));
    }

    #[test]
    fn test_pivot_keeps_unit_columns() {
        let mut tableau = sample();
        tableau.pivot(2, 0, 1e-12).unwrap();
        tableau.pivot(1, 1, 1e-12).unwrap();

        assert_eq!(tableau.basis(), &[1, 0]);
        for (i, &column) in tableau.basis().iter().enumerate() {
            assert!(tableau.is_unit_column(column, i + 1, 1e-12));
        }
        assert_relative_eq!(tableau.objective_value(), 14.0, epsilon = 1e-12);
        assert_relative_eq!(tableau.get(0, 2), 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(tableau.get(0, 3), 4.0 / 3.0, epsilon = 1e-12);

        let x = tableau.basic_solution();
        assert_relative_eq!(x[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_canonicalize_matches_manual_pivots() {
        let mut manual = sample();
        manual.pivot(2, 0, 1e-12).unwrap();
        manual.pivot(1, 1, 1e-12).unwrap();

        let mut canonical = sample();
        canonical.canonicalize_to_basis(&[1, 0], 1e-12).unwrap();

        for (a, b) in manual.cells().iter().flatten().zip(canonical.cells().iter().flatten()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_pivot_is_singular() {
        let mut tableau = Tableau::new(
            vec![vec![-1.0, 0.0, 0.0], vec![0.0, 1.0, 4.0]],
            Vec::new(),
        )
        .unwrap();
        let result = tableau.pivot(1, 0, 1e-12);
        assert!(matches!(result, Err(Error::SingularPivot { row: 1, column: 0, .. })));
    }

    #[test]
    fn test_append_row_adds_basic_slack() {
        let mut tableau = sample();
        let row = tableau.append_row(&[1.0, 0.0], 3.0, "s3").unwrap();

        assert_eq!(row, 3);
        assert_eq!(tableau.variable_count(), 5);
        assert_eq!(tableau.basis(), &[2, 3, 4]);
        assert!(tableau.is_unit_column(4, 3, 0.0));
        assert_eq!(tableau.rhs(3), 3.0);
        assert_eq!(tableau.rhs(1), 10.0);
    }

    #[test]
    fn test_render_writes_header_and_theta() {
        let tableau = sample();
        let mut sink = BufferSink::new();
        tableau.render(&mut sink, "t-1", Some(0));

        assert_eq!(sink.sections(), &["t-1".to_string()]);
        let last = sink.lines().last().unwrap().to_string();
        assert!(last.starts_with('2'));
        assert!(last.trim_end().ends_with("4.000"));
    }
}
