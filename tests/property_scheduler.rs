// tests/property_scheduler.rs

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use buildgraph::dag::{DependencyGraph, GraphScheduler, SchedulerOptions};
use buildgraph::task::Relations;
use buildgraph_test_utils::builders::{build_graph, dry_run_order};
use buildgraph_test_utils::fake_workers::RecordingFactory;
use proptest::prelude::*;

// Acyclic by construction: node N only depends on nodes 0..N-1.
fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<BTreeSet<usize>>> {
    (1..=max_nodes).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..n), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        if i == 0 {
                            BTreeSet::new()
                        } else {
                            deps.into_iter().map(|d| d % i).collect()
                        }
                    })
                    .collect()
            },
        )
    })
}

fn to_graph(deps: &[BTreeSet<usize>]) -> DependencyGraph<usize> {
    let graph = DependencyGraph::new();
    for (node, targets) in deps.iter().enumerate() {
        graph.add_node(node);
        for t in targets {
            graph.add_edge(node, *t);
        }
    }
    graph
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_node_runs_once_after_its_dependencies(
        deps in dag_strategy(12),
        concurrency in 1usize..4,
    ) {
        let factory = RecordingFactory::new();
        let scheduler = GraphScheduler::new(
            to_graph(&deps),
            factory.as_factory(),
            SchedulerOptions { concurrency, poll_interval: Duration::from_millis(10) },
        );
        let outcome = runtime().block_on(scheduler.run()).unwrap();
        prop_assert!(outcome.result.success);

        let ran = factory.ran();
        prop_assert_eq!(ran.len(), deps.len());
        let position: HashMap<usize, usize> =
            ran.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        prop_assert_eq!(position.len(), deps.len());
        for (node, targets) in deps.iter().enumerate() {
            for t in targets {
                prop_assert!(position[t] < position[&node], "{} ran before its dependency {}", node, t);
            }
        }
    }

    #[test]
    fn failed_nodes_block_everything_downstream(
        deps in dag_strategy(10),
        failing in proptest::collection::btree_set(0usize..10, 1..3),
    ) {
        let failing: HashSet<usize> = failing.into_iter().filter(|f| *f < deps.len()).collect();
        prop_assume!(!failing.is_empty());

        let factory = RecordingFactory::new().failing(failing.iter().copied());
        let scheduler = GraphScheduler::new(
            to_graph(&deps),
            factory.as_factory(),
            SchedulerOptions { concurrency: 2, poll_interval: Duration::from_millis(10) },
        );
        let outcome = runtime().block_on(scheduler.run()).unwrap();
        let ran: HashSet<usize> = factory.ran().into_iter().collect();

        // A node downstream of a failed node can never become free.
        let graph = to_graph(&deps);
        for f in &failing {
            let downstream: Vec<usize> = (0..deps.len())
                .filter(|n| n != f && graph.transitive_closure(*n).contains(f))
                .collect();
            for n in downstream {
                prop_assert!(!ran.contains(&n), "{} ran although {} failed upstream", n, f);
            }
        }
        if failing.iter().any(|f| ran.contains(f)) {
            prop_assert!(!outcome.result.success);
        }
    }

    #[test]
    fn depends_on_chains_resolve_in_dependency_order(len in 1usize..8) {
        let names: Vec<String> = (0..len).map(|i| format!("t{i}")).collect();
        let mut relations = Relations::new();
        for pair in names.windows(2) {
            relations.depends_on(pair[1].clone(), pair[0].clone());
        }
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let last = refs[len - 1];

        let graph = build_graph(&relations, &[last], &refs);
        prop_assert_eq!(dry_run_order(&graph), names);
    }
}
