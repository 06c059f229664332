//! 0/1 knapsack by branch and bound over the greedy (fractional) relaxation,
//! plus an exhaustive include/exclude baseline.

use std::collections::BTreeMap;

use bitvec::prelude::*;

use crate::error::{Error, Result};
use crate::math::integer_linear::{ILPSolution, ILPSolver, ILPStatus};
use crate::math::optimization::{ConstraintKind, Direction, Problem};
use crate::output::OutputSink;

/// Chosen items, one bit per item in input order.
pub type Selection = BitVec<u8, Msb0>;

const EPS: f64 = 1e-9;

#[cfg(feature = "parallel")]
const PARALLEL_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct KnapsackItem {
    pub index: usize,
    pub value: f64,
    pub weight: f64,
}

impl KnapsackItem {
    pub fn ratio(&self) -> f64 {
        self.value / self.weight
    }

    pub fn name(&self) -> String {
        format!("x{}", self.index + 1)
    }
}

/// What happened to a node once it was examined.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// Not examined (node limit hit first).
    Open,
    Infeasible,
    /// Bound could not beat the incumbent.
    Pruned,
    Branched { item: usize },
    Candidate { name: String, best: bool },
}

/// A search-tree node. Nodes live in an arena and refer to each other by
/// index.
#[derive(Debug, Clone, PartialEq)]
pub struct KnapsackNode {
    /// `""` for the root, then `1`, `2`, `1.1`, `1.2`, ...
    pub label: String,
    pub level: usize,
    pub profit: f64,
    pub weight: f64,
    pub bound: f64,
    /// Item index to its fixed 0/1 value.
    pub fixed: BTreeMap<usize, bool>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub outcome: NodeOutcome,
}

impl KnapsackNode {
    fn root() -> Self {
        Self {
            label: String::new(),
            level: 0,
            profit: 0.0,
            weight: 0.0,
            bound: 0.0,
            fixed: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
            outcome: NodeOutcome::Open,
        }
    }
}

/// Options for [`Knapsack::branch_and_bound`].
#[derive(Debug, Clone)]
pub struct BranchOptions {
    /// Skip nodes whose bound does not exceed the incumbent.
    pub prune: bool,
    pub max_nodes: usize,
}

impl Default for BranchOptions {
    fn default() -> Self {
        Self {
            prune: true,
            max_nodes: 100_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KnapsackSolution {
    pub best_value: f64,
    pub selection: Selection,
    pub total_weight: f64,
    /// The search tree; empty for the exhaustive search.
    pub nodes: Vec<KnapsackNode>,
    /// Arena indices of the finalized candidates, in discovery order.
    pub candidates: Vec<usize>,
    pub node_limit_reached: bool,
}

impl KnapsackSolution {
    pub fn selected_items(&self) -> Vec<usize> {
        self.selection.iter_ones().collect()
    }

    /// The selection as 0/1 values.
    pub fn values(&self) -> Vec<f64> {
        self.selection
            .iter()
            .map(|bit| if *bit { 1.0 } else { 0.0 })
            .collect()
    }
}

/// Greedy fill of the unfixed items in ratio order.
struct Fill {
    taken: Vec<usize>,
    profit: f64,
    /// First item that only partly fits, with the fitting fraction.
    fractional: Option<(usize, f64)>,
}

/// A 0/1 knapsack instance.
#[derive(Debug, Clone)]
pub struct Knapsack {
    items: Vec<KnapsackItem>,
    capacity: f64,
    order: Vec<usize>,
}

impl Knapsack {
    /// # Arguments
    ///
    /// * `values` - Profit of each item
    /// * `weights` - Weight of each item, strictly positive
    /// * `capacity` - Knapsack capacity
    ///
    /// # Returns
    ///
    /// The instance, `DimensionMismatch` when the lists differ in length or
    /// `InvalidInput` for non-positive weights and negative capacity.
    ///
    /// # Examples
    ///
    /// ```
    /// use lpip::math::integer_linear::knapsack::{BranchOptions, Knapsack};
    /// use lpip::output::NullSink;
    ///
    /// let knapsack = Knapsack::new(
    ///     vec![2.0, 3.0, 3.0, 5.0, 2.0, 4.0],
    ///     vec![11.0, 8.0, 6.0, 14.0, 10.0, 10.0],
    ///     40.0,
    /// ).unwrap();
    /// let solution = knapsack.branch_and_bound(&BranchOptions::default(), &mut NullSink);
    /// assert_eq!(solution.best_value, 15.0);
    /// ```
    pub fn new(values: Vec<f64>, weights: Vec<f64>, capacity: f64) -> Result<Self> {
        if values.len() != weights.len() {
            return Err(Error::dimension_mismatch(format!(
                "{} values for {} weights",
                values.len(),
                weights.len()
            )));
        }
        if !(capacity.is_finite() && capacity >= 0.0) {
            return Err(Error::invalid_input("capacity must be finite and non-negative"));
        }
        let items: Vec<KnapsackItem> = values
            .into_iter()
            .zip(weights)
            .enumerate()
            .map(|(index, (value, weight))| KnapsackItem {
                index,
                value,
                weight,
            })
            .collect();
        if let Some(item) = items
            .iter()
            .find(|item| !(item.weight.is_finite() && item.weight > 0.0 && item.value.is_finite()))
        {
            return Err(Error::invalid_input(format!(
                "item {} needs a positive weight and a finite value",
                item.name()
            )));
        }

        let mut order: Vec<usize> = (0..items.len()).collect();
        order.sort_by(|&a, &b| items[b].ratio().total_cmp(&items[a].ratio()));

        Ok(Self {
            items,
            capacity,
            order,
        })
    }

    /// Reads values from the objective and weights and capacity from the first
    /// constraint, which must be a `<=` row of a maximization problem.
    pub fn from_problem(problem: &Problem) -> Result<Self> {
        problem.validate()?;
        if problem.direction != Direction::Max {
            return Err(Error::invalid_input("a knapsack problem must be a maximization"));
        }
        let first = problem
            .constraints
            .first()
            .ok_or_else(|| Error::invalid_input("a knapsack problem needs a capacity constraint"))?;
        if first.kind != ConstraintKind::Le {
            return Err(Error::invalid_input("the capacity constraint must be a <= row"));
        }
        Self::new(problem.objective.clone(), first.coefficients.clone(), first.rhs)
    }

    pub fn items(&self) -> &[KnapsackItem] {
        &self.items
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Item indices by descending value/weight ratio, ties by index.
    pub fn ratio_order(&self) -> &[usize] {
        &self.order
    }

    fn fill(&self, fixed: &BTreeMap<usize, bool>, mut remaining: f64) -> Fill {
        let mut fill = Fill {
            taken: Vec::new(),
            profit: 0.0,
            fractional: None,
        };
        for &i in &self.order {
            if fixed.contains_key(&i) {
                continue;
            }
            let item = &self.items[i];
            if remaining + EPS >= item.weight {
                remaining -= item.weight;
                fill.profit += item.value;
                fill.taken.push(i);
            } else if remaining > EPS {
                fill.fractional = Some((i, remaining / item.weight));
                break;
            }
        }
        fill
    }

    /// LP-relaxation bound of a partial assignment: its profit plus the greedy
    /// fill of the remaining capacity, with fractional credit for the first
    /// item that does not fit.
    pub fn upper_bound(&self, fixed: &BTreeMap<usize, bool>, profit: f64, weight: f64) -> f64 {
        let fill = self.fill(fixed, self.capacity - weight);
        let credit = fill
            .fractional
            .map_or(0.0, |(i, fraction)| fraction * self.items[i].value);
        profit + fill.profit + credit
    }

    /// Depth-first branch and bound.
    ///
    /// Each node branches on the first item that only fits fractionally (or
    /// the first unfixed item in ratio order), fixing it to 0 and then to 1.
    /// A node whose greedy fill is all-integer is completed greedily and
    /// becomes a candidate; the incumbent changes only on strict improvement.
    pub fn branch_and_bound(&self, options: &BranchOptions, sink: &mut dyn OutputSink) -> KnapsackSolution {
        self.write_ratio_test(sink);
        self.write_model(sink);

        let mut arena = vec![KnapsackNode::root()];
        let mut stack = vec![0];
        let mut incumbent: Option<(f64, usize)> = None;
        let mut candidates = Vec::new();
        let mut node_limit_reached = false;

        sink.start_section("Sub-Problem");
        self.write_assignment(&arena[0], sink);

        while let Some(id) = stack.pop() {
            if arena.len() > options.max_nodes {
                log::warn!("knapsack search stopped at {} nodes", arena.len());
                node_limit_reached = true;
                break;
            }
            if id != 0 {
                sink.start_section(&format!("Sub-Problem {}", arena[id].label));
                self.write_assignment(&arena[id], sink);
            }

            if arena[id].weight > self.capacity + EPS {
                sink.write_line("Infeasible");
                arena[id].outcome = NodeOutcome::Infeasible;
                log::debug!("node {:?} infeasible", arena[id].label);
                continue;
            }

            let fill = self.fill(&arena[id].fixed, self.capacity - arena[id].weight);
            let credit = fill
                .fractional
                .map_or(0.0, |(i, fraction)| fraction * self.items[i].value);
            arena[id].bound = arena[id].profit + fill.profit + credit;

            if fill.fractional.is_none() {
                self.complete(&mut arena[id], &fill);
                let name = candidate_name(candidates.len());
                let best = incumbent.map_or(true, |(value, _)| arena[id].profit > value + EPS);
                if best {
                    incumbent = Some((arena[id].profit, id));
                }
                self.write_candidate(&arena[id], &name, best, sink);
                log::debug!(
                    "candidate {name} at node {:?} with profit {}",
                    arena[id].label,
                    arena[id].profit
                );
                arena[id].outcome = NodeOutcome::Candidate { name, best };
                candidates.push(id);
                continue;
            }

            if options.prune {
                if let Some((best, _)) = incumbent {
                    if arena[id].bound <= best + EPS {
                        sink.write_line(&format!(
                            "Pruned: bound {:.3} does not exceed best {best}",
                            arena[id].bound
                        ));
                        arena[id].outcome = NodeOutcome::Pruned;
                        continue;
                    }
                }
            }

            let item = match fill.fractional {
                Some((i, _)) => i,
                None => match self.order.iter().find(|&&i| !arena[id].fixed.contains_key(&i)) {
                    Some(&i) => i,
                    None => continue,
                },
            };

            let (zero, one) = self.children(&arena[id], id, item);
            sink.write_line(&format!(
                "Sub-P {}: x{} = 0    Sub-P {}: x{} = 1",
                zero.label,
                item + 1,
                one.label,
                item + 1
            ));
            sink.write_line(&"=".repeat(58));
            log::debug!("node {:?} branches on x{}", arena[id].label, item + 1);

            let zero_id = arena.len();
            arena.push(zero);
            arena.push(one);
            arena[id].children = vec![zero_id, zero_id + 1];
            arena[id].outcome = NodeOutcome::Branched { item };
            stack.push(zero_id + 1);
            stack.push(zero_id);
        }

        let (best_value, selection) = match incumbent {
            Some((value, id)) => (value, self.selection_of(&arena[id].fixed)),
            None => (0.0, bitvec![u8, Msb0; 0; self.items.len()]),
        };
        let solution = KnapsackSolution {
            total_weight: self.weight_of(&selection),
            best_value,
            selection,
            nodes: arena,
            candidates,
            node_limit_reached,
        };
        log::info!(
            "knapsack branch and bound: best {} over {} nodes",
            solution.best_value,
            solution.nodes.len()
        );
        self.write_final(&solution, sink);
        solution
    }

    /// Exhaustive include/exclude search with no bounding. Exponential in the
    /// item count; kept as a baseline for checking the branch and bound.
    ///
    /// With the `parallel` feature the first levels are split with
    /// `rayon::join`; every subtree owns its selection and results are
    /// combined after the join.
    pub fn solve_exhaustive(&self) -> KnapsackSolution {
        let empty = bitvec![u8, Msb0; 0; self.items.len()];
        let (best_value, selection) = self
            .exhaustive(0, 0.0, 0.0, empty.clone())
            .unwrap_or((0.0, empty));
        KnapsackSolution {
            total_weight: self.weight_of(&selection),
            best_value,
            selection,
            nodes: Vec::new(),
            candidates: Vec::new(),
            node_limit_reached: false,
        }
    }

    fn exhaustive(&self, level: usize, weight: f64, value: f64, selection: Selection) -> Option<(f64, Selection)> {
        if weight > self.capacity + EPS {
            return None;
        }
        let Some(item) = self.items.get(level) else {
            return Some((value, selection));
        };

        let mut with = selection.clone();
        with.set(level, true);
        let (include, exclude) = join(
            level,
            || self.exhaustive(level + 1, weight + item.weight, value + item.value, with),
            || self.exhaustive(level + 1, weight, value, selection),
        );
        match (include, exclude) {
            (Some(a), Some(b)) => Some(if b.0 > a.0 + EPS { b } else { a }),
            (a, b) => a.or(b),
        }
    }

    fn children(&self, node: &KnapsackNode, id: usize, item: usize) -> (KnapsackNode, KnapsackNode) {
        let label = |k: usize| {
            if node.label.is_empty() {
                k.to_string()
            } else {
                format!("{}.{k}", node.label)
            }
        };
        let child = |k: usize, chosen: bool| {
            let mut fixed = node.fixed.clone();
            fixed.insert(item, chosen);
            let (weight, profit) = if chosen {
                (node.weight + self.items[item].weight, node.profit + self.items[item].value)
            } else {
                (node.weight, node.profit)
            };
            KnapsackNode {
                label: label(k),
                level: node.level + 1,
                profit,
                weight,
                bound: 0.0,
                fixed,
                parent: Some(id),
                children: Vec::new(),
                outcome: NodeOutcome::Open,
            }
        };
        (child(1, false), child(2, true))
    }

    /// Fixes every unfixed item to its greedy value.
    fn complete(&self, node: &mut KnapsackNode, fill: &Fill) {
        for &i in &self.order {
            if node.fixed.contains_key(&i) {
                continue;
            }
            let take = fill.taken.contains(&i);
            node.fixed.insert(i, take);
            if take {
                node.profit += self.items[i].value;
                node.weight += self.items[i].weight;
            }
        }
    }

    fn selection_of(&self, fixed: &BTreeMap<usize, bool>) -> Selection {
        let mut selection = bitvec![u8, Msb0; 0; self.items.len()];
        for (&i, &chosen) in fixed {
            selection.set(i, chosen);
        }
        selection
    }

    fn weight_of(&self, selection: &Selection) -> f64 {
        selection.iter_ones().map(|i| self.items[i].weight).sum()
    }

    fn write_ratio_test(&self, sink: &mut dyn OutputSink) {
        sink.start_section("Ratio Test");
        sink.write_line("Item   z_i/c_i   Rank");
        let mut rank = vec![0; self.items.len()];
        for (r, &i) in self.order.iter().enumerate() {
            rank[i] = r + 1;
        }
        for item in &self.items {
            sink.write_line(&format!(
                "{}    {}/{} = {:.3}    {}",
                item.name(),
                item.value,
                item.weight,
                item.ratio(),
                rank[item.index]
            ));
        }
    }

    fn write_model(&self, sink: &mut dyn OutputSink) {
        sink.start_section("Integer Programming Model");
        let terms = |f: fn(&KnapsackItem) -> f64| {
            self.items
                .iter()
                .map(|item| format!("{}{}", f(item), item.name()))
                .collect::<Vec<_>>()
                .join(" + ")
        };
        sink.write_line(&format!("max z = {}", terms(|item| item.value)));
        sink.write_line(&format!("s.t {} <= {}", terms(|item| item.weight), self.capacity));
        sink.write_line("xi = 0 or 1");
    }

    /// Fixed items first (marked `*`), then the greedy fill of the rest.
    fn write_assignment(&self, node: &KnapsackNode, sink: &mut dyn OutputSink) {
        let mut remaining = self.capacity;
        for (&i, &chosen) in &node.fixed {
            let item = &self.items[i];
            if chosen {
                sink.write_line(&format!(
                    "* {} = 1    {}-{}={}",
                    item.name(),
                    remaining,
                    item.weight,
                    remaining - item.weight
                ));
                remaining -= item.weight;
            } else {
                sink.write_line(&format!("* {} = 0    {remaining}-0={remaining}", item.name()));
            }
        }
        for &i in &self.order {
            if node.fixed.contains_key(&i) {
                continue;
            }
            let item = &self.items[i];
            if remaining + EPS >= item.weight {
                sink.write_line(&format!(
                    "{} = 1    {}-{}={}",
                    item.name(),
                    remaining,
                    item.weight,
                    remaining - item.weight
                ));
                remaining -= item.weight;
            } else if remaining > EPS {
                sink.write_line(&format!(
                    "{} = {}/{}    {}-{}",
                    item.name(),
                    remaining,
                    item.weight,
                    remaining,
                    item.weight
                ));
                remaining = 0.0;
            } else {
                sink.write_line(&format!("{} = 0", item.name()));
            }
        }
    }

    fn write_candidate(&self, node: &KnapsackNode, name: &str, best: bool, sink: &mut dyn OutputSink) {
        let terms: Vec<String> = node
            .fixed
            .iter()
            .filter(|&(_, &chosen)| chosen)
            .map(|(&i, _)| self.items[i].value.to_string())
            .collect();
        if terms.is_empty() {
            sink.write_line("z = 0");
        } else {
            sink.write_line(&format!("z = {} = {}", terms.join(" + "), node.profit));
        }
        sink.write_line(&format!("Candidate {name}"));
        if best {
            sink.write_line("Best Candidate");
        }
    }

    fn write_final(&self, solution: &KnapsackSolution, sink: &mut dyn OutputSink) {
        sink.start_section("FINAL SOLUTION");
        sink.write_line(&format!("Maximum value: {}", solution.best_value));
        for (i, bit) in solution.selection.iter().enumerate() {
            sink.write_line(&format!("x{} = {}", i + 1, u8::from(*bit)));
        }
        sink.start_section("Verification");
        sink.write_line(&format!(
            "Total weight: {} (<= {})",
            solution.total_weight, self.capacity
        ));
        sink.write_line(&format!("Total value: {}", solution.best_value));
    }
}

/// `A`..`Z`, then `AA`, `AB`, ...
fn candidate_name(mut k: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (k % 26) as u8);
        if k < 26 {
            break;
        }
        k = k / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

#[cfg(feature = "parallel")]
fn join<A, B, RA, RB>(level: usize, a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    if level < PARALLEL_DEPTH {
        rayon::join(a, b)
    } else {
        (a(), b())
    }
}

#[cfg(not(feature = "parallel"))]
fn join<A, B, RA, RB>(_level: usize, a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA,
    B: FnOnce() -> RB,
{
    (a(), b())
}

/// [`ILPSolver`] adapter reading a knapsack from a [`Problem`].
#[derive(Debug, Clone, Default)]
pub struct KnapsackSolver {
    options: BranchOptions,
}

impl KnapsackSolver {
    pub fn new(max_nodes: usize, prune: bool) -> Self {
        Self {
            options: BranchOptions { prune, max_nodes },
        }
    }
}

impl ILPSolver for KnapsackSolver {
    fn solve(&self, problem: &Problem, sink: &mut dyn OutputSink) -> Result<ILPSolution> {
        let knapsack = Knapsack::from_problem(problem)?;
        let solution = knapsack.branch_and_bound(&self.options, sink);
        Ok(ILPSolution {
            values: solution.values(),
            objective_value: solution.best_value,
            status: if solution.node_limit_reached {
                ILPStatus::MaxIterationsReached
            } else {
                ILPStatus::Optimal
            },
            nodes: solution.nodes.len(),
        })
    }
}
