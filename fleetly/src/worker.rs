use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::error::FleetlyError;
use crate::graph::{Fleetly, NodeId};
use crate::stage::{SinkFn, Slot, SourceFn, StageBody, TransformFn};

/// Send an item to every outbound edge, dropping a closed edge rather than
/// failing the whole run: a downstream stage that has already exited (for
/// example a sink that stopped early) should not take its siblings down
/// with it.
async fn forward<T: Clone>(outbound: &[mpsc::Sender<Slot<T>>], item: T) {
    let Some((last, rest)) = outbound.split_last() else {
        return;
    };
    for tx in rest {
        let _ = tx.send(Slot::Item(item.clone())).await;
    }
    let _ = last.send(Slot::Item(item)).await;
}

async fn forward_eos<T>(outbound: &[mpsc::Sender<Slot<T>>]) {
    for tx in outbound {
        let _ = tx.send(Slot::Eos).await;
    }
}

async fn run_source<T: Clone + Send + 'static>(
    name: String,
    mut body: SourceFn<T>,
    outbound: Vec<mpsc::Sender<Slot<T>>>,
) -> Result<(), FleetlyError> {
    match &mut body {
        SourceFn::Scalar(f) => {
            let item = f();
            forward(&outbound, item).await;
        }
        SourceFn::Seq(f) => {
            for item in f() {
                forward(&outbound, item).await;
            }
        }
        SourceFn::AsyncScalar(f) => {
            let item = f().await;
            forward(&outbound, item).await;
        }
        SourceFn::AsyncSeq(f) => {
            let mut stream = f();
            while let Some(item) = stream.next().await {
                forward(&outbound, item).await;
            }
        }
    }
    tracing::debug!(stage = %name, "source exhausted");
    forward_eos(&outbound).await;
    Ok(())
}

/// Drain a stage's inbound queue, counting down `active` inbound edges as
/// each upstream producer signals `Eos`. The stage itself is done once
/// every inbound edge has closed, mirroring the extract/transform worker
/// loops of the engine this runtime generalizes.
async fn run_transform<T: Clone + Send + 'static>(
    name: String,
    mut body: TransformFn<T>,
    mut inbound_rx: mpsc::Receiver<Slot<T>>,
    mut active: usize,
    outbound: Vec<mpsc::Sender<Slot<T>>>,
) -> Result<(), FleetlyError> {
    if active == 0 {
        forward_eos(&outbound).await;
        return Ok(());
    }

    while let Some(slot) = inbound_rx.recv().await {
        match slot {
            Slot::Eos => {
                active -= 1;
                if active == 0 {
                    break;
                }
            }
            Slot::Item(item) => match &mut body {
                TransformFn::Scalar(f) => {
                    let out = f(item);
                    forward(&outbound, out).await;
                }
                TransformFn::Seq(f) => {
                    for out in f(item) {
                        forward(&outbound, out).await;
                    }
                }
                TransformFn::AsyncScalar(f) => {
                    let out = f(item).await;
                    forward(&outbound, out).await;
                }
                TransformFn::AsyncSeq(f) => {
                    let mut stream = f(item);
                    while let Some(out) = stream.next().await {
                        forward(&outbound, out).await;
                    }
                }
            },
        }
    }

    tracing::debug!(stage = %name, "transform exhausted");
    forward_eos(&outbound).await;
    Ok(())
}

async fn run_sink<T: Send + 'static>(
    name: String,
    mut body: SinkFn<T>,
    mut inbound_rx: mpsc::Receiver<Slot<T>>,
    mut active: usize,
) -> Result<(), FleetlyError> {
    if active == 0 {
        return Ok(());
    }

    while let Some(slot) = inbound_rx.recv().await {
        match slot {
            Slot::Eos => {
                active -= 1;
                if active == 0 {
                    break;
                }
            }
            Slot::Item(item) => match &mut body {
                SinkFn::Scalar(f) => f(item),
                SinkFn::AsyncScalar(f) => f(item).await,
            },
        }
    }

    tracing::debug!(stage = %name, "sink exhausted");
    Ok(())
}

/// Consume a built graph, spawning one task per stage and joining on all of
/// them. The first stage failure aborts every other in-flight task
/// (distilled spec §5 "fail fast").
pub(crate) async fn run_graph<T>(mut graph: Fleetly<T>) -> Result<(), FleetlyError>
where
    T: Clone + Send + 'static,
{
    let outbound_senders: Vec<Vec<mpsc::Sender<Slot<T>>>> = graph
        .nodes
        .iter()
        .map(|entry| {
            entry
                .outbound
                .iter()
                .map(|id| graph.nodes[id.0].inbound_tx.clone())
                .collect()
        })
        .collect();

    let inbound_counts: Vec<usize> = (0..graph.nodes.len())
        .map(|idx| graph.inbound_count(NodeId(idx)))
        .collect();

    let mut joins = JoinSet::new();

    for idx in 0..graph.nodes.len() {
        let entry = &mut graph.nodes[idx];
        let name = entry.name.clone();
        let body = entry.body.take().expect("stage body taken twice");
        let outbound = outbound_senders[idx].clone();
        let active = inbound_counts[idx];

        match body {
            StageBody::Source(source) => {
                joins.spawn(run_source(name, source, outbound));
            }
            StageBody::Transform(transform) => {
                let inbound_rx = entry.inbound_rx.take().expect("inbound taken twice");
                joins.spawn(run_transform(name, transform, inbound_rx, active, outbound));
            }
            StageBody::Sink(sink) => {
                let inbound_rx = entry.inbound_rx.take().expect("inbound taken twice");
                joins.spawn(run_sink(name, sink, inbound_rx, active));
            }
        }
    }

    let mut first_err = None;
    while let Some(joined) = joins.join_next().await {
        let result = joined.map_err(FleetlyError::from).and_then(|inner| inner);
        if let Err(err) = result {
            if first_err.is_none() {
                tracing::error!(error = %err, "stage failed, aborting remaining stages");
                joins.abort_all();
                first_err = Some(err);
            }
        }
    }

    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
