// tests/graph_scheduler.rs

use std::collections::HashSet;
use std::time::Duration;

use buildgraph::dag::{DependencyGraph, GraphScheduler, SchedulerOptions};
use buildgraph::errors::BuildError;
use buildgraph_test_utils::fake_workers::RecordingFactory;
use buildgraph_test_utils::{init_tracing, with_timeout};

fn options(concurrency: usize) -> SchedulerOptions {
    SchedulerOptions {
        concurrency,
        poll_interval: Duration::from_millis(20),
    }
}

fn int_graph(edges: &[(i32, i32)]) -> DependencyGraph<i32> {
    let g = DependencyGraph::new();
    for (from, to) in edges {
        g.add_edge(*from, *to);
    }
    g
}

#[tokio::test]
async fn runs_every_node_once_in_dependency_order() {
    init_tracing();
    let g = DependencyGraph::new();
    g.add_edge("compile".to_string(), "runApt".to_string());
    g.add_edge("compile".to_string(), "generateVersion".to_string());

    let factory = RecordingFactory::new();
    let outcome = with_timeout(
        GraphScheduler::new(g, factory.as_factory(), options(1)).run(),
    )
    .await
    .unwrap();

    assert!(outcome.result.success);
    let ran = factory.ran();
    assert_eq!(ran.len(), 3);
    assert_eq!(ran.last().map(String::as_str), Some("compile"));
    assert_eq!(outcome.history.len(), 3);
}

#[tokio::test]
async fn failure_stops_dependents_but_not_in_flight_work() {
    init_tracing();
    // 2 and 3 depend on 1, 4 depends on 3, 10 depends on 4, 5 depends on 2.
    let g = int_graph(&[(2, 1), (3, 1), (4, 3), (10, 4), (5, 2)]);
    let factory = RecordingFactory::new().failing([3]);

    let outcome = with_timeout(GraphScheduler::new(g, factory.as_factory(), options(1)).run())
        .await
        .unwrap();

    assert!(!outcome.result.success);
    assert_eq!(outcome.result.error_message.as_deref(), Some("3 failed"));

    let ran: HashSet<i32> = factory.ran().into_iter().collect();
    assert!(ran.contains(&1) && ran.contains(&2) && ran.contains(&3));
    assert!(!ran.contains(&4));
    assert!(!ran.contains(&10));
    assert!(ran.is_subset(&HashSet::from([1, 2, 3, 5])));
}

#[tokio::test]
async fn independent_free_node_still_runs_after_failure() {
    init_tracing();
    // a depends on x; b is independent. Both x and b are free at the start.
    let g = DependencyGraph::new();
    g.add_edge("a".to_string(), "x".to_string());
    g.add_node("b".to_string());
    let factory = RecordingFactory::new().failing(["x".to_string()]);

    let outcome = with_timeout(GraphScheduler::new(g, factory.as_factory(), options(1)).run())
        .await
        .unwrap();

    assert!(!outcome.result.success);
    let ran: HashSet<String> = factory.ran().into_iter().collect();
    assert_eq!(ran, HashSet::from(["x".to_string(), "b".to_string()]));
}

#[tokio::test]
async fn first_failure_is_kept() {
    init_tracing();
    let g = DependencyGraph::new();
    for n in 1..=4 {
        g.add_node(n);
    }
    let factory = RecordingFactory::new().failing([1, 2, 3, 4]);

    let outcome = with_timeout(GraphScheduler::new(g, factory.as_factory(), options(1)).run())
        .await
        .unwrap();

    // Every node was already submitted, so all of them drain, but only one
    // failure is reported.
    assert!(!outcome.result.success);
    assert_eq!(factory.ran().len(), 4);
    let message = outcome.result.error_message.unwrap();
    assert!(
        (1..=4).any(|n| message == format!("{n} failed")),
        "unexpected message: {message}"
    );
}

#[tokio::test]
async fn fatal_worker_error_aborts_the_run() {
    init_tracing();
    let g = int_graph(&[(2, 1)]);
    let factory = RecordingFactory::new().fatal([1]);

    let err = with_timeout(GraphScheduler::new(g, factory.as_factory(), options(2)).run())
        .await
        .unwrap_err();

    match err {
        BuildError::WorkerFatal { worker, message } => {
            assert_eq!(worker, "1");
            assert!(message.contains("blew up"));
        }
        other => panic!("expected WorkerFatal, got {other:?}"),
    }
    assert_eq!(factory.ran(), vec![1]);
}

#[tokio::test]
async fn panicking_worker_aborts_the_run() {
    init_tracing();
    let g = int_graph(&[(2, 1)]);
    let factory = RecordingFactory::new().panicking([1]);

    let err = with_timeout(GraphScheduler::new(g, factory.as_factory(), options(2)).run())
        .await
        .unwrap_err();

    match err {
        BuildError::WorkerFatal { worker, message } => {
            assert_eq!(worker, "<unknown>");
            assert!(message.contains("panicked"), "unexpected message: {message}");
            assert!(message.contains("worker for 1 panicked"), "unexpected message: {message}");
        }
        other => panic!("expected WorkerFatal, got {other:?}"),
    }
    assert_eq!(factory.ran(), vec![1]);
}

#[tokio::test]
async fn cyclic_graph_stalls_instead_of_spinning() {
    init_tracing();
    let g = int_graph(&[(1, 2), (2, 1), (3, 1)]);
    g.add_node(4);
    let factory = RecordingFactory::new();

    let err = with_timeout(GraphScheduler::new(g, factory.as_factory(), options(1)).run())
        .await
        .unwrap_err();

    match err {
        BuildError::Stalled { remaining } => {
            assert_eq!(remaining, vec!["1", "2", "3"]);
        }
        other => panic!("expected Stalled, got {other:?}"),
    }
    assert_eq!(factory.ran(), vec![4]);
}

#[tokio::test]
async fn concurrency_bound_is_respected() {
    init_tracing();
    let g = DependencyGraph::new();
    for n in 0..8 {
        g.add_node(n);
    }
    let factory = RecordingFactory::new().with_delay(Duration::from_millis(30));

    let outcome = with_timeout(GraphScheduler::new(g, factory.as_factory(), options(3)).run())
        .await
        .unwrap();

    assert!(outcome.result.success);
    assert_eq!(factory.ran().len(), 8);
    assert!(factory.max_in_flight() <= 3);
    assert!(factory.max_in_flight() >= 2);
}

#[tokio::test]
async fn slow_workers_survive_poll_timeouts() {
    init_tracing();
    let g = int_graph(&[(2, 1)]);
    let factory = RecordingFactory::new().with_delay(Duration::from_millis(60));
    let opts = SchedulerOptions {
        concurrency: 1,
        poll_interval: Duration::from_millis(5),
    };

    let outcome = with_timeout(GraphScheduler::new(g, factory.as_factory(), opts).run())
        .await
        .unwrap();

    assert!(outcome.result.success);
    assert_eq!(factory.ran(), vec![1, 2]);
}

#[tokio::test]
async fn empty_graph_succeeds_immediately() {
    let g: DependencyGraph<i32> = DependencyGraph::new();
    let factory = RecordingFactory::new();

    let outcome = GraphScheduler::new(g, factory.as_factory(), options(1))
        .run()
        .await
        .unwrap();

    assert!(outcome.result.success);
    assert!(outcome.history.is_empty());
    assert_eq!(outcome.sequential_time(), Duration::ZERO);
}
