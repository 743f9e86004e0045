//! Dependency graph and topological ordering.
//!
//! Kahn's algorithm with a deterministic tie-break: among nodes whose
//! dependencies are all satisfied, the one added first goes first. Used both
//! for the subsystem load order and for merging per-subsystem stage lists
//! into one global stage order.

use std::collections::{BTreeSet, HashMap};

/// Nodes of a graph that could not be ordered because they form a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    /// Cycle members in dependency order; the first also depends on the last.
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    names: Vec<String>,
    index: HashMap<String, usize>,
    successors: Vec<BTreeSet<usize>>,
    predecessors: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` if absent and returns its node id.
    pub fn add_node(&mut self, name: &str) -> usize {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        self.successors.push(BTreeSet::new());
        self.predecessors.push(BTreeSet::new());
        id
    }

    #[must_use]
    pub fn node(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[must_use]
    pub fn name(&self, id: usize) -> &str {
        &self.names[id]
    }

    /// Requires `before` to be ordered ahead of `after`.
    pub fn add_edge(&mut self, before: usize, after: usize) {
        self.successors[before].insert(after);
        self.predecessors[after].insert(before);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// A total order in which every node follows its dependencies.
    pub fn order(&self) -> Result<Vec<usize>, Cycle> {
        let mut indegree = self.indegrees();
        let mut ready: BTreeSet<usize> = (0..self.len()).filter(|&id| indegree[id] == 0).collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(id) = ready.pop_first() {
            order.push(id);
            for &next in &self.successors[id] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() == self.len() {
            Ok(order)
        } else {
            Err(self.find_cycle(&indegree))
        }
    }

    /// Groups nodes into waves; every node's dependencies lie in earlier waves.
    pub fn waves(&self) -> Result<Vec<Vec<usize>>, Cycle> {
        let mut indegree = self.indegrees();
        let mut wave: Vec<usize> = (0..self.len()).filter(|&id| indegree[id] == 0).collect();
        let mut waves = Vec::new();
        let mut placed = 0;

        while !wave.is_empty() {
            placed += wave.len();
            let mut next_wave = BTreeSet::new();
            for &id in &wave {
                for &next in &self.successors[id] {
                    indegree[next] -= 1;
                    if indegree[next] == 0 {
                        next_wave.insert(next);
                    }
                }
            }
            waves.push(wave);
            wave = next_wave.into_iter().collect();
        }

        if placed == self.len() {
            Ok(waves)
        } else {
            Err(self.find_cycle(&indegree))
        }
    }

    fn indegrees(&self) -> Vec<usize> {
        self.predecessors.iter().map(BTreeSet::len).collect()
    }

    /// Walks unresolved predecessors from the first unresolved node until a
    /// node repeats. Every unresolved node has an unresolved predecessor, so
    /// the walk always closes a loop.
    fn find_cycle(&self, indegree: &[usize]) -> Cycle {
        let unresolved = |id: usize| indegree[id] > 0;
        let Some(start) = (0..self.len()).find(|&id| unresolved(id)) else {
            return Cycle { members: Vec::new() };
        };

        let mut path = vec![start];
        let mut position = HashMap::from([(start, 0)]);
        let mut current = start;
        loop {
            let Some(&previous) = self.predecessors[current]
                .iter()
                .find(|&&id| unresolved(id))
            else {
                break;
            };
            if let Some(&at) = position.get(&previous) {
                let mut members: Vec<String> = path[at..]
                    .iter()
                    .rev()
                    .map(|&id| self.names[id].clone())
                    .collect();
                members.rotate_right(1);
                return Cycle { members };
            }
            position.insert(previous, path.len());
            path.push(previous);
            current = previous;
        }

        Cycle {
            members: path.iter().map(|&id| self.names[id].clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for node in nodes {
            graph.add_node(node);
        }
        for (before, after) in edges {
            let before = graph.add_node(before);
            let after = graph.add_node(after);
            graph.add_edge(before, after);
        }
        graph
    }

    fn names(graph: &DependencyGraph, order: &[usize]) -> Vec<String> {
        order.iter().map(|&id| graph.name(id).to_string()).collect()
    }

    #[test]
    fn independent_nodes_keep_insertion_order() {
        let graph = graph(&["c", "a", "b"], &[]);
        assert_eq!(names(&graph, &graph.order().unwrap()), ["c", "a", "b"]);
    }

    #[test]
    fn dependencies_come_first() {
        let graph = graph(&["render", "world", "core"], &[("core", "world"), ("world", "render")]);
        assert_eq!(
            names(&graph, &graph.order().unwrap()),
            ["core", "world", "render"]
        );
    }

    #[test]
    fn waves_group_independent_nodes() {
        let graph = graph(
            &["core", "blocks", "items", "recipes"],
            &[("core", "blocks"), ("core", "items"), ("blocks", "recipes"), ("items", "recipes")],
        );
        let waves: Vec<Vec<String>> = graph
            .waves()
            .unwrap()
            .iter()
            .map(|wave| names(&graph, wave))
            .collect();
        assert_eq!(waves, vec![vec!["core"], vec!["blocks", "items"], vec!["recipes"]]);
    }

    #[test]
    fn cycle_is_named_in_dependency_order() {
        let graph = graph(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "a"), ("c", "d")]);
        let cycle = graph.order().unwrap_err();
        assert_eq!(cycle.members, ["a", "b", "c"]);
        assert_eq!(graph.waves().unwrap_err(), cycle);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let graph = graph(&["a"], &[("a", "a")]);
        assert_eq!(graph.order().unwrap_err().members, ["a"]);
    }
}
