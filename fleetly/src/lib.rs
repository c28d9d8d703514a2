//! Small streaming dataflow runtime.
//!
//! A [`Fleetly`] is a directed acyclic graph of stages over a single item
//! type `T`. Each stage is one of three roles — source, transform, sink —
//! and one of four function shapes — scalar, lazy-sequence, async scalar,
//! async lazy-sequence — fixed at construction time by the `source_*` /
//! `transform_*` / `sink_*` method used to build it. Stages run
//! concurrently as cooperative tasks, connected by bounded channels that
//! carry both payload items and an end-of-stream sentinel, giving the
//! whole graph natural back-pressure: a slow sink throttles every stage
//! upstream of it.
//!
//! ```no_run
//! # async fn run() -> Result<(), fleetly::FleetlyError> {
//! use fleetly::Fleetly;
//!
//! let mut graph: Fleetly<i64> = Fleetly::new();
//! let source = graph.source_seq("counter", || vec![1, 2, 3]);
//! let doubled = graph.transform_scalar("double", |x| x * 2);
//! let sink = graph.sink_scalar("print", |x| println!("{x}"));
//!
//! graph.connect(source, doubled)?;
//! graph.connect(doubled, sink)?;
//! graph.run().await
//! # }
//! ```

mod error;
mod graph;
mod stage;
mod worker;

pub use error::FleetlyError;
pub use graph::{Fleetly, NodeId, DEFAULT_BUFFER};
