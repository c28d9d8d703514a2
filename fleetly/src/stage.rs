use futures::future::BoxFuture;
use futures::stream::BoxStream;

/// Control token carried alongside payload items on a stage's inbound queue.
///
/// `Eos` is not a data payload; it is delivered through the same channel as
/// items to preserve per-edge ordering (see distilled spec §4.1).
#[derive(Clone)]
pub(crate) enum Slot<T> {
    Item(T),
    Eos,
}

/// A zero-argument stage function, called exactly once when the stage runs.
pub(crate) enum SourceFn<T> {
    Scalar(Box<dyn FnMut() -> T + Send>),
    Seq(Box<dyn FnMut() -> Vec<T> + Send>),
    AsyncScalar(Box<dyn FnMut() -> BoxFuture<'static, T> + Send>),
    AsyncSeq(Box<dyn FnMut() -> BoxStream<'static, T> + Send>),
}

/// A one-argument stage function invoked once per inbound item, forwarding
/// whatever it produces to every outbound edge.
pub(crate) enum TransformFn<T> {
    Scalar(Box<dyn FnMut(T) -> T + Send>),
    Seq(Box<dyn FnMut(T) -> Vec<T> + Send>),
    AsyncScalar(Box<dyn FnMut(T) -> BoxFuture<'static, T> + Send>),
    AsyncSeq(Box<dyn FnMut(T) -> BoxStream<'static, T> + Send>),
}

/// A one-argument stage function invoked once per inbound item purely for
/// its side effect; its return value is discarded and never forwarded.
///
/// Only the scalar and async-scalar shapes are accepted here: the distilled
/// spec's shape table has no "Load" entry for the lazy-sequence shapes, so
/// fleetly simply has no constructor that would let you build one (see
/// DESIGN.md).
pub(crate) enum SinkFn<T> {
    Scalar(Box<dyn FnMut(T) + Send>),
    AsyncScalar(Box<dyn FnMut(T) -> BoxFuture<'static, ()> + Send>),
}

pub(crate) enum StageBody<T> {
    Source(SourceFn<T>),
    Transform(TransformFn<T>),
    Sink(SinkFn<T>),
}

impl<T> StageBody<T> {
    /// Diagram shape tag, matching the distilled spec's `function` /
    /// `generator` / `coroutine` / `async generator` vocabulary (§6.2).
    pub(crate) fn shape_label(&self) -> &'static str {
        match self {
            StageBody::Source(SourceFn::Scalar(_))
            | StageBody::Transform(TransformFn::Scalar(_))
            | StageBody::Sink(SinkFn::Scalar(_)) => "function",
            StageBody::Source(SourceFn::Seq(_)) | StageBody::Transform(TransformFn::Seq(_)) => {
                "generator"
            }
            StageBody::Source(SourceFn::AsyncScalar(_))
            | StageBody::Transform(TransformFn::AsyncScalar(_))
            | StageBody::Sink(SinkFn::AsyncScalar(_)) => "coroutine",
            StageBody::Source(SourceFn::AsyncSeq(_))
            | StageBody::Transform(TransformFn::AsyncSeq(_)) => "async generator",
        }
    }

    pub(crate) fn is_source(&self) -> bool {
        matches!(self, StageBody::Source(_))
    }

    pub(crate) fn is_sink(&self) -> bool {
        matches!(self, StageBody::Sink(_))
    }
}
