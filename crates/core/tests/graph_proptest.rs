//! Property-based tests for the dependency graph using proptest.

use covalent_core::{AtomKey, DependencyGraph};
use proptest::prelude::*;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
struct Node(u8);

fn key(n: u8) -> AtomKey {
    AtomKey::new(&Node(n), None)
}

proptest! {
    /// The mirror invariant holds after any script of edge operations.
    #[test]
    fn graph_stays_symmetric(script in prop::collection::vec((0u8..16, 0u8..16, 0u8..4), 0..200)) {
        let mut graph = DependencyGraph::new();
        for (a, b, op) in script {
            if a == b {
                continue;
            }
            match op {
                0 | 1 => graph.add_edge(&key(a), &key(b)),
                2 => graph.remove_edge(&key(a), &key(b)),
                _ => {
                    graph.remove_key(&key(a));
                }
            }
            prop_assert!(graph.is_symmetric());
        }
    }

    /// Detaching removes exactly the recorded upstream set, both ways.
    #[test]
    fn detach_returns_recorded_dependencies(upstreams in prop::collection::hash_set(0u8..32, 0..16)) {
        let mut graph = DependencyGraph::new();
        let child = key(255);
        for &upstream in &upstreams {
            graph.add_edge(&child, &key(upstream));
        }

        let detached = graph.detach_dependencies(&child);

        prop_assert_eq!(detached.len(), upstreams.len());
        for upstream in upstreams {
            prop_assert!(detached.contains(&key(upstream)));
            prop_assert!(!graph.children(&key(upstream)).map_or(false, |set| set.contains(&child)));
        }
        prop_assert!(graph.is_symmetric());
    }

    /// Removing a key leaves no edge referencing it in either map.
    #[test]
    fn remove_key_leaves_no_dangling_edges(
        edges in prop::collection::vec((0u8..12, 0u8..12), 0..60),
        victim in 0u8..12,
    ) {
        let mut graph = DependencyGraph::new();
        for (a, b) in edges {
            if a != b {
                graph.add_edge(&key(a), &key(b));
            }
        }

        graph.remove_key(&key(victim));

        for n in 0..12u8 {
            if let Some(set) = graph.dependencies(&key(n)) {
                prop_assert!(!set.contains(&key(victim)));
            }
            if let Some(set) = graph.children(&key(n)) {
                prop_assert!(!set.contains(&key(victim)));
            }
        }
        prop_assert!(graph.is_symmetric());
    }
}
