use crate::error::Result;
use crate::math::integer_linear::{is_integral, ILPSolution, ILPSolver, ILPStatus};
use crate::math::optimization::{
    ConstraintKind, Direction, DualColumnRule, DualSimplexSolver, Problem, SolveStatus,
    SolverConfig,
};
use crate::output::{NullSink, OutputSink};

/// Depth-first branch and bound over dual-simplex LP relaxations.
///
/// Variables with an `Integer` or `Binary` sign must end up whole. A node
/// whose relaxation has a fractional value `v` at such a variable spawns the
/// children `x <= floor(v)` and `x >= ceil(v)`; the `<=` child is explored
/// first.
pub struct BranchAndBoundSolver {
    config: SolverConfig,
    max_nodes: usize,
    tolerance: f64,
}

/// One open node: the relaxation with its branching rows and a display label.
struct Node {
    problem: Problem,
    label: String,
}

impl Default for BranchAndBoundSolver {
    fn default() -> Self {
        Self::new(1000, 1e-6)
    }
}

impl BranchAndBoundSolver {
    /// # Arguments
    ///
    /// * `max_nodes` - Cap on the number of relaxations solved
    /// * `tolerance` - Distance from an integer still counted as integral
    pub fn new(max_nodes: usize, tolerance: f64) -> Self {
        Self {
            config: SolverConfig::default().with_dual_rule(DualColumnRule::MinimumRatio),
            max_nodes,
            tolerance,
        }
    }

    /// Replaces the configuration used for the relaxations.
    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    fn branch(&self, node: &Node, var_idx: usize, value: f64) -> (Node, Node) {
        let mut unit = vec![0.0; node.problem.variable_count()];
        unit[var_idx] = 1.0;
        let child = |k: usize| {
            if node.label.is_empty() {
                k.to_string()
            } else {
                format!("{}.{k}", node.label)
            }
        };

        let lower = Node {
            problem: node
                .problem
                .clone()
                .subject_to(unit.clone(), ConstraintKind::Le, value.floor()),
            label: child(1),
        };
        let upper = Node {
            problem: node
                .problem
                .clone()
                .subject_to(unit, ConstraintKind::Ge, value.ceil()),
            label: child(2),
        };
        (lower, upper)
    }
}

impl ILPSolver for BranchAndBoundSolver {
    fn solve(&self, problem: &Problem, sink: &mut dyn OutputSink) -> Result<ILPSolution> {
        problem.validate()?;
        let integer_vars = problem.integer_variables();
        let lp = DualSimplexSolver::new(self.config.clone());
        // Scores are compared in maximization sense.
        let sense = match problem.direction {
            Direction::Max => 1.0,
            Direction::Min => -1.0,
        };

        let mut best: Option<(f64, Vec<f64>)> = None;
        let mut nodes = vec![Node {
            problem: problem.clone(),
            label: String::new(),
        }];
        let mut explored = 0;
        let mut hit_limit = false;

        sink.start_section("Branch and Bound");
        while let Some(current) = nodes.pop() {
            if explored >= self.max_nodes {
                log::warn!("branch and bound stopped after {explored} nodes");
                hit_limit = true;
                break;
            }
            explored += 1;

            let name = if current.label.is_empty() {
                "root"
            } else {
                current.label.as_str()
            };
            let relaxation = lp.solve_problem(&current.problem, &mut NullSink)?;
            match relaxation.status {
                SolveStatus::Optimal => {}
                SolveStatus::Infeasible => {
                    sink.write_line(&format!("Node {name}: infeasible"));
                    continue;
                }
                SolveStatus::Unbounded => {
                    sink.write_line(&format!("Node {name}: unbounded"));
                    log::info!("branch and bound: relaxation at node {name} is unbounded");
                    return Ok(ILPSolution::without_values(
                        ILPStatus::Unbounded,
                        sense * f64::INFINITY,
                        explored,
                    ));
                }
                SolveStatus::CycleLimitExceeded => {
                    sink.write_line(&format!("Node {name}: cycle limit exceeded"));
                    hit_limit = true;
                    continue;
                }
            }

            let values: Vec<String> = relaxation.values.iter().map(|v| format!("{v:.3}")).collect();
            sink.write_line(&format!(
                "Node {name}: z = {:.3} at ({})",
                relaxation.objective_value,
                values.join(", ")
            ));

            let score = sense * relaxation.objective_value;
            if let Some((best_score, _)) = &best {
                if score <= best_score + self.tolerance {
                    sink.write_line("  pruned by bound");
                    continue;
                }
            }

            let first_fractional = integer_vars
                .iter()
                .map(|&i| (i, relaxation.values[i]))
                .find(|&(_, value)| !is_integral(value, self.tolerance));

            match first_fractional {
                None => {
                    sink.write_line("  new incumbent");
                    log::debug!("incumbent {} at node {name}", relaxation.objective_value);
                    best = Some((score, relaxation.values));
                }
                Some((var_idx, value)) => {
                    let (lower, upper) = self.branch(&current, var_idx, value);
                    sink.write_line(&format!(
                        "  branch on x{}: x{} <= {}  |  x{} >= {}",
                        var_idx + 1,
                        var_idx + 1,
                        value.floor(),
                        var_idx + 1,
                        value.ceil()
                    ));
                    nodes.push(upper);
                    nodes.push(lower);
                }
            }
        }

        match best {
            Some((score, values)) => {
                let rounded: Vec<f64> = values
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| if integer_vars.contains(&i) { v.round() } else { v })
                    .collect();
                log::info!("branch and bound: optimum {} after {explored} nodes", sense * score);
                Ok(ILPSolution {
                    values: rounded,
                    objective_value: sense * score,
                    status: if hit_limit {
                        ILPStatus::MaxIterationsReached
                    } else {
                        ILPStatus::Optimal
                    },
                    nodes: explored,
                })
            }
            None => Ok(ILPSolution::without_values(
                if hit_limit {
                    ILPStatus::MaxIterationsReached
                } else {
                    ILPStatus::Infeasible
                },
                sense * f64::NEG_INFINITY,
                explored,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::optimization::VariableSign;
    use crate::output::BufferSink;
    use approx::assert_abs_diff_eq;

    fn integer(problem: Problem) -> Problem {
        let n = problem.variable_count();
        problem.with_signs(vec![VariableSign::Integer; n])
    }

    #[test]
    fn test_simple_ilp() -> Result<()> {
        // max 5x1 + 4x2, relaxation optimum (3, 1.5) with z = 21
        let problem = integer(
            Problem::maximize(vec![5.0, 4.0])
                .subject_to(vec![6.0, 4.0], ConstraintKind::Le, 24.0)
                .subject_to(vec![1.0, 2.0], ConstraintKind::Le, 6.0),
        );

        let solver = BranchAndBoundSolver::new(1000, 1e-6);
        let solution = solver.solve(&problem, &mut NullSink)?;

        assert_eq!(solution.status, ILPStatus::Optimal);
        assert_abs_diff_eq!(solution.objective_value, 20.0, epsilon = 1e-6);
        assert_eq!(solution.values, vec![4.0, 0.0]);
        assert_eq!(solution.nodes, 5);
        Ok(())
    }

    #[test]
    fn test_infeasible_ilp() -> Result<()> {
        let problem = integer(
            Problem::maximize(vec![1.0, 1.0])
                .subject_to(vec![1.0, 1.0], ConstraintKind::Le, 5.0)
                .subject_to(vec![1.0, 1.0], ConstraintKind::Ge, 6.0),
        );

        let solution = BranchAndBoundSolver::default().solve(&problem, &mut NullSink)?;
        assert_eq!(solution.status, ILPStatus::Infeasible);
        assert!(solution.values.is_empty());
        Ok(())
    }

    #[test]
    fn test_continuous_problem_needs_one_node() -> Result<()> {
        let problem = Problem::maximize(vec![3.0, 2.0])
            .subject_to(vec![1.0, 2.0], ConstraintKind::Le, 10.0)
            .subject_to(vec![2.0, 1.0], ConstraintKind::Le, 8.0);

        let solution = BranchAndBoundSolver::default().solve(&problem, &mut NullSink)?;
        assert_eq!(solution.nodes, 1);
        assert_abs_diff_eq!(solution.objective_value, 14.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_node_limit() -> Result<()> {
        let problem = integer(
            Problem::maximize(vec![5.0, 4.0])
                .subject_to(vec![6.0, 4.0], ConstraintKind::Le, 24.0)
                .subject_to(vec![1.0, 2.0], ConstraintKind::Le, 6.0),
        );

        let solution = BranchAndBoundSolver::new(1, 1e-6).solve(&problem, &mut NullSink)?;
        assert_eq!(solution.status, ILPStatus::MaxIterationsReached);
        assert_eq!(solution.nodes, 1);
        Ok(())
    }

    #[test]
    fn test_transcript_labels_nodes() -> Result<()> {
        let problem = integer(
            Problem::maximize(vec![5.0, 4.0])
                .subject_to(vec![6.0, 4.0], ConstraintKind::Le, 24.0)
                .subject_to(vec![1.0, 2.0], ConstraintKind::Le, 6.0),
        );
        let mut sink = BufferSink::new();
        BranchAndBoundSolver::default().solve(&problem, &mut sink)?;

        assert!(sink.contents().contains("Node root: z = 21.000 at (3.000, 1.500)"));
        assert!(sink.contents().contains("branch on x2"));
        assert!(sink.contents().contains("Node 1.2"));
        Ok(())
    }
}
