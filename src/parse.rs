//! Text format for problems.
//!
//! ```text
//! # comment
//! max 3 2
//! 1 2 <= 10
//! 2 1 <= 8
//! int 1 2
//! ```
//!
//! The first line holds the direction and the objective coefficients. Every
//! constraint line lists one coefficient per variable, a relation (`<=`,
//! `>=` or `=`) and the right-hand side. Sign lines start with `pos`, `neg`,
//! `urs`, `int` or `bin` followed by 1-based variable indices; the bare
//! keyword applies to every variable. A line of one symbol per variable
//! (`+`, `-`, `urs`, `int`, `bin`) sets all signs at once.

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::math::optimization::{Constraint, ConstraintKind, Direction, Problem, VariableSign};

impl FromStr for Problem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_problem(s)
    }
}

/// Parses a problem; see the module docs for the format.
pub fn parse_problem(text: &str) -> Result<Problem> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, strip_comment(line).trim()))
        .filter(|(_, line)| !line.is_empty());

    let (first, header) = lines
        .next()
        .ok_or_else(|| Error::parse(1, "empty input, expected `max` or `min`"))?;
    let mut tokens = header.split_whitespace();
    let direction = tokens
        .next()
        .map(Direction::from_str)
        .transpose()
        .map_err(|e| Error::parse(first, e.to_string()))?
        .ok_or_else(|| Error::parse(first, "missing direction"))?;
    let objective = tokens
        .map(|t| number(first, t))
        .collect::<Result<Vec<_>>>()?;
    if objective.is_empty() {
        return Err(Error::parse(first, "objective has no coefficients"));
    }

    let n = objective.len();
    let mut problem = Problem::new(direction, objective);
    for (line_no, line) in lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if let Some(signs) = sign_line(line_no, &tokens, n)? {
            for (index, sign) in signs {
                problem = problem.with_sign(index, sign);
            }
        } else {
            problem = problem.with_constraint(constraint_line(line_no, &tokens, n)?);
        }
    }
    problem
        .validate()
        .map_err(|e| Error::parse(first, e.to_string()))?;
    Ok(problem)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(at) => &line[..at],
        None => line,
    }
}

fn number(line: usize, token: &str) -> Result<f64> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::parse(line, format!("`{token}` is not a number")))
}

fn keyword(token: &str) -> Option<VariableSign> {
    match token.to_ascii_lowercase().as_str() {
        "pos" | "+" => Some(VariableSign::Positive),
        "neg" | "-" => Some(VariableSign::Negative),
        "urs" => Some(VariableSign::Unrestricted),
        "int" => Some(VariableSign::Integer),
        "bin" => Some(VariableSign::Binary),
        _ => None,
    }
}

/// `None` when the line is not a sign line.
fn sign_line(line: usize, tokens: &[&str], n: usize) -> Result<Option<Vec<(usize, VariableSign)>>> {
    let Some(first) = tokens.first().and_then(|t| keyword(t)) else {
        return Ok(None);
    };

    // One symbol per variable.
    if tokens.len() == n && tokens.iter().all(|t| keyword(t).is_some()) && n > 1 {
        return Ok(Some(
            tokens
                .iter()
                .enumerate()
                .filter_map(|(i, t)| keyword(t).map(|sign| (i, sign)))
                .collect(),
        ));
    }

    if tokens.len() == 1 {
        return Ok(Some((0..n).map(|i| (i, first)).collect()));
    }
    tokens[1..]
        .iter()
        .map(|t| match t.parse::<usize>() {
            Ok(index) if (1..=n).contains(&index) => Ok((index - 1, first)),
            _ => Err(Error::parse(
                line,
                format!("`{t}` is not a variable index between 1 and {n}"),
            )),
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn constraint_line(line: usize, tokens: &[&str], n: usize) -> Result<Constraint> {
    let relation = tokens
        .iter()
        .position(|t| ConstraintKind::from_str(t).is_ok())
        .ok_or_else(|| Error::parse(line, "missing relation `<=`, `>=` or `=`"))?;
    let kind = ConstraintKind::from_str(tokens[relation]).map_err(|e| Error::parse(line, e.to_string()))?;

    let coefficients = tokens[..relation]
        .iter()
        .map(|t| number(line, t))
        .collect::<Result<Vec<_>>>()?;
    if coefficients.len() != n {
        return Err(Error::parse(
            line,
            format!("expected {n} coefficients, found {}", coefficients.len()),
        ));
    }
    let rhs = match &tokens[relation + 1..] {
        [rhs] => number(line, rhs)?,
        [] => return Err(Error::parse(line, "missing right-hand side")),
        _ => return Err(Error::parse(line, "unexpected tokens after the right-hand side")),
    };
    Ok(Constraint::new(coefficients, kind, rhs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_textbook() {
        let problem: Problem = "max 3 2\n1 2 <= 10\n2 1 <= 8\n".parse().unwrap();
        assert_eq!(problem.direction, Direction::Max);
        assert_eq!(problem.objective, vec![3.0, 2.0]);
        assert_eq!(problem.constraints.len(), 2);
        assert_eq!(problem.constraints[1], Constraint::le(vec![2.0, 1.0], 8.0));
        assert!(problem.signs.is_empty());
    }

    #[test]
    fn test_comments_blank_lines_and_signs() {
        let text = "# knapsack\nmax 2 3 3\n\n11 8 6 <= 20  # capacity\nbin\nint 2\n";
        let problem = parse_problem(text).unwrap();
        assert_eq!(problem.constraints.len(), 1);
        assert_eq!(
            problem.signs,
            vec![VariableSign::Binary, VariableSign::Integer, VariableSign::Binary]
        );
    }

    #[test]
    fn test_symbol_sign_line() {
        let problem = parse_problem("min 1 1 1\n1 1 1 >= 2\n+ - urs\n").unwrap();
        assert_eq!(problem.direction, Direction::Min);
        assert_eq!(problem.constraints[0].kind, ConstraintKind::Ge);
        assert_eq!(
            problem.signs,
            vec![
                VariableSign::Positive,
                VariableSign::Negative,
                VariableSign::Unrestricted
            ]
        );
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        assert_eq!(
            parse_problem("max 1 2\n1 2 3 <= 4\n").unwrap_err(),
            Error::parse(2, "expected 2 coefficients, found 3")
        );
        assert!(matches!(
            parse_problem("max 1 2\n\n1 x <= 4\n"),
            Err(Error::Parse { line: 3, .. })
        ));
        assert!(matches!(
            parse_problem("maximize 1\n"),
            Err(Error::Parse { line: 1, .. })
        ));
        assert!(matches!(
            parse_problem("max 1 2\n1 2 4\n"),
            Err(Error::Parse { line: 2, .. })
        ));
        assert!(matches!(
            parse_problem("max 1 2\nint 3\n"),
            Err(Error::Parse { line: 2, .. })
        ));
        assert!(matches!(parse_problem(""), Err(Error::Parse { line: 1, .. })));
    }
}
