//! Multi-source breadth-first level computation.

use std::collections::{BTreeMap, VecDeque};

use crossover_core::{LevelMap, NodeId};

use crate::store::{Adjacency, LevelUpdate};

/// Shortest hop count from the nearest root for every reachable node.
///
/// All roots start at level 0 and enter the queue once. Nodes are popped in
/// FIFO order and a destination keeps the first level assigned to it, which
/// in a breadth-first sweep is already the minimum over all roots.
pub fn compute_levels(roots: &[NodeId], adjacency: &Adjacency) -> LevelMap {
    let mut levels = LevelMap::with_capacity(roots.len());
    let mut queue = VecDeque::with_capacity(roots.len());

    for root in roots {
        if !levels.contains_key(root) {
            levels.insert(root.clone(), 0);
            queue.push_back(root.clone());
        }
    }

    while let Some(current) = queue.pop_front() {
        let next = levels.get(&current).copied().unwrap_or(0) + 1;
        let Some(destinations) = adjacency.get(&current) else {
            continue;
        };
        for to in destinations {
            if !levels.contains_key(to) {
                levels.insert(to.clone(), next);
                queue.push_back(to.clone());
            }
        }
    }

    levels
}

/// Group a level map into one update per distinct level, lowest first.
pub fn group_by_level(levels: &LevelMap) -> Vec<LevelUpdate> {
    let mut grouped: BTreeMap<u32, Vec<NodeId>> = BTreeMap::new();
    for (node, level) in levels {
        grouped.entry(*level).or_default().push(node.clone());
    }
    grouped
        .into_iter()
        .map(|(level, mut to_nodes)| {
            to_nodes.sort();
            LevelUpdate { level, to_nodes }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjacency(edges: &[(&str, &str)]) -> Adjacency {
        let mut adjacency = Adjacency::new();
        for (from, to) in edges {
            adjacency
                .entry(NodeId::from(*from))
                .or_default()
                .push(NodeId::from(*to));
        }
        adjacency
    }

    fn ids(names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|n| NodeId::from(*n)).collect()
    }

    fn level(levels: &LevelMap, node: &str) -> Option<u32> {
        levels.get(&NodeId::from(node)).copied()
    }

    #[test]
    fn test_chain_with_shortcut() {
        // R -> A -> B -> C and R -> C
        let adj = adjacency(&[("R", "A"), ("A", "B"), ("B", "C"), ("R", "C")]);
        let levels = compute_levels(&ids(&["R"]), &adj);

        assert_eq!(level(&levels, "R"), Some(0));
        assert_eq!(level(&levels, "A"), Some(1));
        assert_eq!(level(&levels, "B"), Some(2));
        assert_eq!(level(&levels, "C"), Some(1));
    }

    #[test]
    fn test_cycle_terminates() {
        let adj = adjacency(&[("R", "A"), ("A", "B"), ("B", "R"), ("B", "A")]);
        let levels = compute_levels(&ids(&["R"]), &adj);
        assert_eq!(levels.len(), 3);
        assert_eq!(level(&levels, "B"), Some(2));
    }

    #[test]
    fn test_multi_root_takes_nearest() {
        // R1 -> X -> Y, R2 -> Y
        let adj = adjacency(&[("R1", "X"), ("X", "Y"), ("R2", "Y")]);
        let levels = compute_levels(&ids(&["R1", "R2"]), &adj);
        assert_eq!(level(&levels, "Y"), Some(1));
        assert_eq!(level(&levels, "R2"), Some(0));
    }

    #[test]
    fn test_root_reachable_from_other_root_stays_zero() {
        let adj = adjacency(&[("R1", "R2")]);
        let levels = compute_levels(&ids(&["R1", "R2"]), &adj);
        assert_eq!(level(&levels, "R2"), Some(0));
    }

    #[test]
    fn test_duplicate_roots_enqueued_once() {
        let levels = compute_levels(&ids(&["R", "R"]), &Adjacency::new());
        assert_eq!(levels.len(), 1);
    }

    #[test]
    fn test_no_roots_yields_empty_map() {
        let adj = adjacency(&[("A", "B")]);
        assert!(compute_levels(&[], &adj).is_empty());
    }

    #[test]
    fn test_group_by_level_is_ordered() {
        let adj = adjacency(&[("R", "A"), ("R", "B"), ("A", "C")]);
        let updates = group_by_level(&compute_levels(&ids(&["R"]), &adj));

        assert_eq!(
            updates,
            vec![
                LevelUpdate { level: 0, to_nodes: ids(&["R"]) },
                LevelUpdate { level: 1, to_nodes: ids(&["A", "B"]) },
                LevelUpdate { level: 2, to_nodes: ids(&["C"]) },
            ]
        );
    }
}
