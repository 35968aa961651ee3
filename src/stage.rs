use crate::stream::Stream;
use std::sync::Arc;

/// Which operator a stage is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Producer,
    Consumer,
    Scale,
    Fork,
    Mirror,
    LRFilter,
    Pipeline,
    /// Any stage defined outside this crate
    Custom,
}

/// A composable step: turns an input stream into an output stream.
///
/// `run` must return promptly; the work happens on threads it spawns. The
/// returned stream must close once `input` is closed and drained, and not
/// before. Operators in this crate cope with stages that close early, but a
/// stage that never closes stalls everything downstream of it.
///
/// `run` may be called several times, concurrently (see [`crate::Scale`]), so
/// each call wires up its own streams and workers.
pub trait Stage<T>: Send + Sync {
    /// Start the stage against `input` and return its output
    fn run(&self, input: Stream<T>) -> Stream<T>;

    fn kind(&self) -> StageKind {
        StageKind::Custom
    }

    /// Whether the stage generates values rather than transforming its input
    fn is_source(&self) -> bool {
        self.kind() == StageKind::Producer
    }

    /// Get a human-readable name for this stage
    fn name(&self) -> &str {
        "stage"
    }
}

/// Shared handle to a stage
pub type StageRef<T> = Arc<dyn Stage<T>>;

/// A position in a stage list. `None` is a missing stage; lists holding one are
/// rejected by [`crate::Pipeline::new`] and treated as pass-through elsewhere.
pub type StageSlot<T> = Option<StageRef<T>>;

/// Conversions from a concrete stage into the shared forms operators take
pub trait StageExt<T>: Stage<T> + Sized + 'static {
    fn shared(self) -> StageRef<T> {
        Arc::new(self)
    }

    fn slot(self) -> StageSlot<T> {
        Some(self.shared())
    }
}

impl<T, S: Stage<T> + 'static> StageExt<T> for S {}

pub(crate) fn has_nil_stage<T>(stages: &[StageSlot<T>]) -> bool {
    stages.iter().any(Option::is_none)
}

/// Adapts a plain function over streams into a stage
pub struct StageFn<F> {
    name: String,
    f: F,
}

impl<F> StageFn<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<T, F> Stage<T> for StageFn<F>
where
    F: Fn(Stream<T>) -> Stream<T> + Send + Sync,
{
    fn run(&self, input: Stream<T>) -> Stream<T> {
        (self.f)(input)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Shorthand for [`StageFn::new`] with a generic name
pub fn stage_fn<T, F>(f: F) -> StageFn<F>
where
    F: Fn(Stream<T>) -> Stream<T> + Send + Sync,
{
    StageFn::new("stage_fn", f)
}

/// A stage that hands its input back untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl<T> Stage<T> for Passthrough {
    fn run(&self, input: Stream<T>) -> Stream<T> {
        input
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::bounded;

    #[test]
    fn test_passthrough_stage() {
        let (tx, rx) = bounded(1);
        let out = Passthrough.run(rx.clone());
        assert!(out.same_stream(&rx));
        tx.send(3).unwrap();
        assert_eq!(out.recv(), Some(3));
    }

    #[test]
    fn test_stage_fn() {
        let stage = stage_fn(|input: Stream<i32>| input);
        let (_tx, rx) = bounded(1);
        assert!(stage.run(rx.clone()).same_stream(&rx));
        assert_eq!(Stage::<i32>::kind(&stage), StageKind::Custom);
        assert!(!Stage::<i32>::is_source(&stage));
    }

    #[test]
    fn test_nil_stage_detection() {
        let stages: Vec<StageSlot<i32>> = vec![Passthrough.slot(), None];
        assert!(has_nil_stage(&stages));
        assert!(!has_nil_stage(&stages[..1]));
    }
}
