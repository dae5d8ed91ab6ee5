use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

use thiserror::Error;

use super::EffectUnit;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A unit or edge target outside `0..len`. Signed so that negative
    /// indices from configuration files are reported as-is.
    #[error("unit index {index} out of range (chain has {len} units)")]
    OutOfRange { index: i64, len: usize },

    #[error("connections of unit {unit} would create a cycle through unit {through}")]
    Cycle { unit: usize, through: usize },
}

/// A preset's signal chain: units addressed by dense 0-based index plus an
/// ordered list of downstream targets per unit.
///
/// Unit 0 is implicitly fed by the external input and every unit without
/// outgoing edges implicitly feeds the external output. Topology only changes
/// through [`ChainGraph::set_outgoing_edges`], which keeps the graph acyclic.
#[derive(Debug, Clone, Default)]
pub struct ChainGraph {
    units: Vec<EffectUnit>,
    edges: Vec<Vec<usize>>,
}

impl ChainGraph {
    /// Build a graph with no edges. Indices follow the order of `units`.
    pub fn new(units: impl IntoIterator<Item = EffectUnit>) -> Self {
        let units: Vec<EffectUnit> = units
            .into_iter()
            .enumerate()
            .map(|(i, mut unit)| {
                unit.set_index(i);
                unit
            })
            .collect();
        let edges = vec![Vec::new(); units.len()];
        ChainGraph { units, edges }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    #[allow(dead_code)]
    pub fn units(&self) -> &[EffectUnit] {
        &self.units
    }

    /// Replace the downstream targets of `unit`.
    ///
    /// Fails without touching the graph if any index is out of range or the new
    /// edges would close a cycle.
    pub fn set_outgoing_edges(
        &mut self,
        unit: usize,
        targets: impl IntoIterator<Item = usize>,
    ) -> Result<(), GraphError> {
        let len = self.len();
        let check = |index: usize| {
            if index < len {
                Ok(index)
            } else {
                Err(GraphError::OutOfRange {
                    index: i64::try_from(index).unwrap_or(i64::MAX),
                    len,
                })
            }
        };
        check(unit)?;
        let targets = targets
            .into_iter()
            .map(check)
            .collect::<Result<Vec<_>, _>>()?;

        let previous = std::mem::replace(&mut self.edges[unit], targets);
        if let Some(through) = self.find_cycle() {
            self.edges[unit] = previous;
            return Err(GraphError::Cycle { unit, through });
        }
        Ok(())
    }

    /// Downstream targets of `unit` in configuration order. Empty for terminal
    /// units and for indices outside the graph.
    pub fn outgoing_edges(&self, unit: usize) -> &[usize] {
        self.edges.get(unit).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Units with an edge into `unit`, ascending and without duplicates.
    pub fn incoming_edges(&self, unit: usize) -> Vec<usize> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, targets)| targets.contains(&unit))
            .map(|(source, _)| source)
            .collect()
    }

    #[allow(dead_code)]
    pub fn index_of(&self, unit: &EffectUnit) -> Option<usize> {
        self.units
            .iter()
            .position(|u| u.index() == unit.index() && u.identity() == unit.identity())
    }

    pub fn unit_at(&self, index: usize) -> Option<&EffectUnit> {
        self.units.get(index)
    }

    pub fn unit_at_mut(&mut self, index: usize) -> Option<&mut EffectUnit> {
        self.units.get_mut(index)
    }

    /// Units fed by the external input.
    pub fn inputs(&self) -> Vec<usize> {
        if self.is_empty() { Vec::new() } else { vec![0] }
    }

    /// Units feeding the external output (no outgoing edges).
    pub fn outputs(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| self.edges[i].is_empty())
            .collect()
    }

    /// Kahn ordering with ties broken by lowest index, so a plain chain comes
    /// out in index order.
    pub fn topological_order(&self) -> Vec<usize> {
        let mut in_degree = vec![0usize; self.len()];
        for targets in &self.edges {
            for &t in targets {
                in_degree[t] += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(Reverse(unit)) = ready.pop() {
            order.push(unit);
            for &t in &self.edges[unit] {
                in_degree[t] -= 1;
                if in_degree[t] == 0 {
                    ready.push(Reverse(t));
                }
            }
        }
        order
    }

    /// Text drawing of the chain, walking units by index from 0 and stopping at
    /// the first unit with no outgoing edges.
    ///
    /// Only faithful for strictly linear chains: with fan-out the walk still
    /// steps to `index + 1` rather than following the edges. Use the `Display`
    /// listing for branching presets.
    pub fn render(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let Some(first) = self.units.first() else {
            return lines;
        };
        lines.push(first.to_string());

        let mut current = 0;
        loop {
            let targets = self.outgoing_edges(current);
            if targets.is_empty() {
                break;
            }
            lines.push(vec!["   |"; targets.len()].join("        "));
            lines.push(
                targets
                    .iter()
                    .filter_map(|&t| self.unit_at(t))
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" "),
            );

            current += 1;
            if current >= self.len() {
                break;
            }
        }
        lines
    }

    /// Depth-first search for a back edge. Returns the unit where one was found.
    fn find_cycle(&self) -> Option<usize> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Active,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.len()];
        for root in 0..self.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            // (unit, next edge position)
            let mut stack = vec![(root, 0usize)];
            marks[root] = Mark::Active;
            while let Some((unit, next)) = stack.pop() {
                if let Some(&target) = self.edges[unit].get(next) {
                    stack.push((unit, next + 1));
                    match marks[target] {
                        Mark::Active => return Some(target),
                        Mark::Unvisited => {
                            marks[target] = Mark::Active;
                            stack.push((target, 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[unit] = Mark::Done;
                }
            }
        }
        None
    }
}

impl fmt::Display for ChainGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, unit) in self.topological_order().into_iter().enumerate() {
            if n > 0 {
                writeln!(f)?;
            }
            write!(f, "{} -> {:?}", self.units[unit], self.edges[unit])?;
        }
        Ok(())
    }
}
