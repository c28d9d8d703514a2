use std::collections::{HashSet, VecDeque};
use std::future::Future;

use futures::stream::Stream;
use tokio::sync::mpsc;

use crate::error::FleetlyError;
use crate::stage::{SinkFn, SourceFn, StageBody, TransformFn};
use crate::worker;

/// Default inbound queue capacity for a newly created stage (distilled spec §3).
pub const DEFAULT_BUFFER: usize = 3;

/// Handle to a stage registered in a [`Fleetly`] graph.
///
/// Returned by every `source_*` / `transform_*` / `sink_*` constructor and
/// consumed by [`Fleetly::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

pub(crate) struct NodeEntry<T> {
    pub(crate) name: String,
    pub(crate) body: Option<StageBody<T>>,
    pub(crate) inbound_tx: mpsc::Sender<crate::stage::Slot<T>>,
    pub(crate) inbound_rx: Option<mpsc::Receiver<crate::stage::Slot<T>>>,
    pub(crate) outbound: Vec<NodeId>,
}

/// A dataflow graph over a single item type `T`.
///
/// Every stage in a given graph speaks the same item type; heterogeneous
/// per-edge types are out of scope for this runtime (see DESIGN.md "Open
/// Questions"). Construction is append-only: stages are registered with a
/// `source_*` / `transform_*` / `sink_*` constructor (fixing both its role
/// and its function shape, per §9 Design Notes), then wired together with
/// [`connect`](Fleetly::connect). Call [`run`](Fleetly::run) once building
/// is complete.
pub struct Fleetly<T> {
    pub(crate) nodes: Vec<NodeEntry<T>>,
}

impl<T> Default for Fleetly<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Fleetly<T> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn push_node(&mut self, name: impl Into<String>, body: StageBody<T>) -> NodeId {
        let (tx, rx) = mpsc::channel(DEFAULT_BUFFER);
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeEntry {
            name: name.into(),
            body: Some(body),
            inbound_tx: tx,
            inbound_rx: Some(rx),
            outbound: Vec::new(),
        });
        id
    }

    /// Name of a registered stage, used for diagnostics and diagrams.
    pub fn name(&self, node: NodeId) -> &str {
        &self.nodes[node.0].name
    }

    /// Override a stage's inbound queue capacity (default
    /// [`DEFAULT_BUFFER`]). Must be called before [`run`](Fleetly::run).
    pub fn set_capacity(&mut self, node: NodeId, capacity: usize) {
        let capacity = capacity.max(1);
        let entry = &mut self.nodes[node.0];
        let (tx, rx) = mpsc::channel(capacity);
        entry.inbound_tx = tx;
        entry.inbound_rx = Some(rx);
    }

    // ---- source constructors: zero-argument, called exactly once ----

    pub fn source_scalar(
        &mut self,
        name: impl Into<String>,
        f: impl FnMut() -> T + Send + 'static,
    ) -> NodeId {
        self.push_node(name, StageBody::Source(SourceFn::Scalar(Box::new(f))))
    }

    pub fn source_seq(
        &mut self,
        name: impl Into<String>,
        f: impl FnMut() -> Vec<T> + Send + 'static,
    ) -> NodeId {
        self.push_node(name, StageBody::Source(SourceFn::Seq(Box::new(f))))
    }

    pub fn source_scalar_async<Fut>(
        &mut self,
        name: impl Into<String>,
        mut f: impl FnMut() -> Fut + Send + 'static,
    ) -> NodeId
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        self.push_node(
            name,
            StageBody::Source(SourceFn::AsyncScalar(Box::new(move || Box::pin(f())))),
        )
    }

    pub fn source_seq_async<S>(
        &mut self,
        name: impl Into<String>,
        mut f: impl FnMut() -> S + Send + 'static,
    ) -> NodeId
    where
        S: Stream<Item = T> + Send + 'static,
    {
        self.push_node(
            name,
            StageBody::Source(SourceFn::AsyncSeq(Box::new(move || Box::pin(f())))),
        )
    }

    // ---- transform constructors: one argument, forwards its output ----

    pub fn transform_scalar(
        &mut self,
        name: impl Into<String>,
        f: impl FnMut(T) -> T + Send + 'static,
    ) -> NodeId {
        self.push_node(name, StageBody::Transform(TransformFn::Scalar(Box::new(f))))
    }

    pub fn transform_seq(
        &mut self,
        name: impl Into<String>,
        f: impl FnMut(T) -> Vec<T> + Send + 'static,
    ) -> NodeId {
        self.push_node(name, StageBody::Transform(TransformFn::Seq(Box::new(f))))
    }

    pub fn transform_scalar_async<Fut>(
        &mut self,
        name: impl Into<String>,
        mut f: impl FnMut(T) -> Fut + Send + 'static,
    ) -> NodeId
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        self.push_node(
            name,
            StageBody::Transform(TransformFn::AsyncScalar(Box::new(move |item| {
                Box::pin(f(item))
            }))),
        )
    }

    pub fn transform_seq_async<S>(
        &mut self,
        name: impl Into<String>,
        mut f: impl FnMut(T) -> S + Send + 'static,
    ) -> NodeId
    where
        S: Stream<Item = T> + Send + 'static,
    {
        self.push_node(
            name,
            StageBody::Transform(TransformFn::AsyncSeq(Box::new(move |item| {
                Box::pin(f(item))
            }))),
        )
    }

    // ---- sink constructors: one argument, side effect only ----

    pub fn sink_scalar(
        &mut self,
        name: impl Into<String>,
        f: impl FnMut(T) + Send + 'static,
    ) -> NodeId {
        self.push_node(name, StageBody::Sink(SinkFn::Scalar(Box::new(f))))
    }

    pub fn sink_scalar_async<Fut>(
        &mut self,
        name: impl Into<String>,
        mut f: impl FnMut(T) -> Fut + Send + 'static,
    ) -> NodeId
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.push_node(
            name,
            StageBody::Sink(SinkFn::AsyncScalar(Box::new(move |item| Box::pin(f(item))))),
        )
    }

    /// Connect `from -> to`: `to` is appended to `from`'s outbound list.
    ///
    /// Rejects self-loops, connecting into a source, and connecting out of
    /// a sink, all of which would be nonsensical given each stage's fixed
    /// role (see distilled spec §4.2 "Invariants enforced").
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), FleetlyError> {
        if from == to {
            return Err(FleetlyError::SelfLoop);
        }
        if self.nodes[to.0].body.as_ref().unwrap().is_source() {
            return Err(FleetlyError::SourceCannotHaveInbound(
                self.nodes[to.0].name.clone(),
            ));
        }
        if self.nodes[from.0].body.as_ref().unwrap().is_sink() {
            return Err(FleetlyError::SinkCannotHaveOutbound(
                self.nodes[from.0].name.clone(),
            ));
        }
        self.nodes[from.0].outbound.push(to);
        Ok(())
    }

    /// Number of edges pointing into `node`.
    pub(crate) fn inbound_count(&self, node: NodeId) -> usize {
        self.nodes
            .iter()
            .filter(|entry| entry.outbound.contains(&node))
            .count()
    }

    /// Cycle check via iterative DFS over the outbound adjacency (distilled
    /// spec §9 "Cyclic back-edges in dataflow": cycles are rejected at
    /// build time rather than left to deadlock under bounded queues).
    fn check_acyclic(&self) -> Result<(), FleetlyError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InStack,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];

        for start in 0..self.nodes.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }

            let mut stack = vec![(start, 0usize)];
            marks[start] = Mark::InStack;

            while let Some((node, next_child)) = stack.pop() {
                let outbound = &self.nodes[node].outbound;

                if next_child >= outbound.len() {
                    marks[node] = Mark::Done;
                    continue;
                }

                stack.push((node, next_child + 1));

                let child = outbound[next_child].0;
                match marks[child] {
                    Mark::InStack => {
                        return Err(FleetlyError::Cyclic(self.nodes[child].name.clone()));
                    }
                    Mark::Unvisited => {
                        marks[child] = Mark::InStack;
                        stack.push((child, 0));
                    }
                    Mark::Done => {}
                }
            }
        }

        Ok(())
    }

    /// Text serialization of the graph: entity declarations block, then a
    /// relations block (distilled spec §6.2). Must be called before
    /// [`run`](Fleetly::run), which consumes the graph.
    pub fn to_diagram(&self) -> String {
        let mut entities = String::new();
        let mut relations = String::new();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<usize> = (0..self.nodes.len()).collect();

        while let Some(idx) = queue.pop_front() {
            if !seen.insert(idx) {
                continue;
            }
            let entry = &self.nodes[idx];
            entities.push_str(&format!("entity {} {{\n", entry.name));
            entities.push_str(&format!(
                "  {}\n",
                entry.body.as_ref().unwrap().shape_label()
            ));
            entities.push_str("}\n");

            for out in &entry.outbound {
                relations.push_str(&format!("{} --> {}\n", entry.name, self.nodes[out.0].name));
            }
        }

        format!("@startuml\nheader fleetly\n\n{entities}\n{relations}@enduml\n")
    }
}

impl<T> Fleetly<T>
where
    T: Clone + Send + 'static,
{
    /// Spawn one cooperative task per stage and drive the graph to
    /// completion. Resolves once every sink has observed end-of-stream, or
    /// fails fast on the first stage failure (distilled spec §5).
    pub async fn run(self) -> Result<(), FleetlyError> {
        self.check_acyclic()?;
        worker::run_graph(self).await
    }
}
