use std::sync::{Arc, Mutex};

use fleetly::Fleetly;

/// Sets up minimal logging for tests.
fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::DEBUG.into())
                .from_env_lossy(),
        )
        .with_ansi(cfg!(debug_assertions))
        .try_init();
}

/// Three-stage linear pipeline: generator source, scalar transform, scalar
/// sink collecting results for inspection after the run completes.
#[tokio::test]
async fn three_stage_pipeline_delivers_every_item_in_order() {
    init_test_logging();
    let mut graph: Fleetly<i64> = Fleetly::new();

    let source = graph.source_seq("numbers", || vec![1, 2, 3, 4, 5]);
    let doubled = graph.transform_scalar("double", |x| x * 2);

    let collected = Arc::new(Mutex::new(Vec::new()));
    let collected_writer = Arc::clone(&collected);
    let sink = graph.sink_scalar("collect", move |x| collected_writer.lock().unwrap().push(x));

    graph.connect(source, doubled).unwrap();
    graph.connect(doubled, sink).unwrap();

    graph.run().await.unwrap();

    assert_eq!(*collected.lock().unwrap(), vec![2, 4, 6, 8, 10]);
}

/// A transform with two upstream producers must see end-of-stream only once
/// both have finished, and must still forward every item from both.
#[tokio::test]
async fn fan_in_waits_for_every_upstream_eos() {
    let mut graph: Fleetly<i64> = Fleetly::new();

    let left = graph.source_seq("left", || vec![1, 2]);
    let right = graph.source_seq("right", || vec![10, 20]);
    let merge = graph.transform_scalar("identity", |x| x);

    let collected = Arc::new(Mutex::new(Vec::new()));
    let collected_writer = Arc::clone(&collected);
    let sink = graph.sink_scalar("collect", move |x| collected_writer.lock().unwrap().push(x));

    graph.connect(left, merge).unwrap();
    graph.connect(right, merge).unwrap();
    graph.connect(merge, sink).unwrap();

    graph.run().await.unwrap();

    let mut got = collected.lock().unwrap().clone();
    got.sort_unstable();
    assert_eq!(got, vec![1, 2, 10, 20]);
}

/// A transform that fans its output to two downstream sinks must deliver
/// every item to both.
#[tokio::test]
async fn fan_out_reaches_every_downstream_sink() {
    let mut graph: Fleetly<i64> = Fleetly::new();

    let source = graph.source_seq("numbers", || vec![1, 2, 3]);

    let collected_a = Arc::new(Mutex::new(Vec::new()));
    let writer_a = Arc::clone(&collected_a);
    let sink_a = graph.sink_scalar("sink-a", move |x| writer_a.lock().unwrap().push(x));

    let collected_b = Arc::new(Mutex::new(Vec::new()));
    let writer_b = Arc::clone(&collected_b);
    let sink_b = graph.sink_scalar("sink-b", move |x| writer_b.lock().unwrap().push(x));

    graph.connect(source, sink_a).unwrap();
    graph.connect(source, sink_b).unwrap();

    graph.run().await.unwrap();

    assert_eq!(*collected_a.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(*collected_b.lock().unwrap(), vec![1, 2, 3]);
}

/// `connect` rejects self-loops and edges that violate a stage's fixed role
/// before the graph is ever run.
#[tokio::test]
async fn connect_rejects_structurally_invalid_edges() {
    let mut graph: Fleetly<i64> = Fleetly::new();
    let source = graph.source_scalar("src", || 1);
    let sink = graph.sink_scalar("snk", |_| {});

    assert!(graph.connect(source, source).is_err());
    assert!(graph.connect(sink, source).is_err());
    assert!(graph.connect(source, sink).is_ok());
}

/// A cycle introduced via three transforms is rejected at `run()`, not left
/// to deadlock under the bounded queues.
#[tokio::test]
async fn run_rejects_cyclic_graphs() {
    let mut graph: Fleetly<i64> = Fleetly::new();
    let a = graph.transform_scalar("a", |x| x);
    let b = graph.transform_scalar("b", |x| x);
    let c = graph.transform_scalar("c", |x| x);

    graph.connect(a, b).unwrap();
    graph.connect(b, c).unwrap();
    graph.connect(c, a).unwrap();

    let err = graph.run().await.unwrap_err();
    assert!(matches!(err, fleetly::FleetlyError::Cyclic(_)));
}
