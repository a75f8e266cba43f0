// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Kahn's algorithm over a generic directed graph.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;

/// An error indicating that a cycle was detected in the graph.
///
/// `unresolved` lists the nodes that could not be scheduled, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<T> {
    /// Nodes left with a non-zero in-degree once every root was consumed.
    pub unresolved: Vec<T>,
}

impl<T: fmt::Debug> fmt::Display for CycleError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cycle detected between nodes {:?}", self.unresolved)
    }
}

impl<T: fmt::Debug> std::error::Error for CycleError<T> {}

/// Performs a topological sort on a generic directed graph.
///
/// The order is stable: among nodes that become ready at the same time, the one
/// declared first in `nodes` comes first. Edges that reference unknown nodes are
/// ignored.
///
/// # Arguments
///
/// * `nodes`: An iterator over the unique nodes in the graph.
/// * `edges`: An iterator over the directed edges, represented as `(parent, child)` tuples.
///
/// # Returns
///
/// * `Ok(Vec<T>)`: A vector of nodes in a valid topological order.
/// * `Err(CycleError)`: If the graph contains one or more cycles.
pub fn topological_sort<T>(
    nodes: impl IntoIterator<Item = T>,
    edges: impl IntoIterator<Item = (T, T)>,
) -> Result<Vec<T>, CycleError<T>>
where
    T: Copy + Eq + Hash,
{
    let node_list: Vec<T> = nodes.into_iter().collect();
    if node_list.is_empty() {
        return Ok(Vec::new());
    }

    let declaration: HashMap<T, usize> = node_list.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    let mut adjacency_list: HashMap<T, Vec<T>> = HashMap::new();
    let mut in_degree: Vec<usize> = vec![0; node_list.len()];

    // 1. Build adjacency list and in-degree counts from edges.
    for (parent, child) in edges {
        let (Some(_), Some(&child_idx)) = (declaration.get(&parent), declaration.get(&child)) else {
            continue;
        };
        adjacency_list.entry(parent).or_default().push(child);
        in_degree[child_idx] += 1;
    }

    // 2. Seed the queue with roots, in declaration order.
    let mut queue: VecDeque<T> = node_list
        .iter()
        .zip(&in_degree)
        .filter(|(_, degree)| **degree == 0)
        .map(|(node, _)| *node)
        .collect();

    // 3. Process the queue.
    let mut sorted_list = Vec::with_capacity(node_list.len());
    while let Some(parent_node) = queue.pop_front() {
        sorted_list.push(parent_node);
        if let Some(children) = adjacency_list.get(&parent_node) {
            for child_node in children {
                let degree = &mut in_degree[declaration[child_node]];
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*child_node);
                }
            }
        }
    }

    // 4. Check for cycles.
    if sorted_list.len() != node_list.len() {
        let unresolved = node_list
            .iter()
            .zip(&in_degree)
            .filter(|(_, degree)| **degree > 0)
            .map(|(node, _)| *node)
            .collect();
        Err(CycleError { unresolved })
    } else {
        Ok(sorted_list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_respects_edges() {
        let order = topological_sort([0, 1, 2, 3], [(2, 1), (1, 0), (3, 0)]).unwrap();
        let pos = |n: i32| order.iter().position(|x| *x == n).unwrap();
        assert!(pos(2) < pos(1));
        assert!(pos(1) < pos(0));
        assert!(pos(3) < pos(0));
    }

    #[test]
    fn test_sort_is_stable_for_independent_nodes() {
        let order = topological_sort([5, 3, 9], std::iter::empty()).unwrap();
        assert_eq!(order, vec![5, 3, 9]);
    }

    #[test]
    fn test_sort_reports_cycle_members() {
        let err = topological_sort([0, 1, 2], [(0, 1), (1, 2), (2, 1)]).unwrap_err();
        assert_eq!(err.unresolved, vec![1, 2]);
        assert!(err.to_string().contains("Cycle"));
    }

    #[test]
    fn test_sort_ignores_unknown_nodes() {
        let order = topological_sort([0, 1], [(0, 1), (7, 0)]).unwrap();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_sort_empty_graph() {
        let order: Vec<u8> = topological_sort(std::iter::empty(), std::iter::empty()).unwrap();
        assert!(order.is_empty());
    }
}
