use crate::branch::{merge_branches, spawn_worker};
use crate::metrics::StageMetrics;
use crate::pipeline::Pipeline;
use crate::stage::{Stage, StageKind, StageRef};
use crate::stream::{bounded, Stream};
use log::{debug, trace};
use std::fmt;
use std::sync::Arc;

/// Routing decision for an [`LRFilter`]: `true` sends a value left
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Left/right filter: routes each value to one of two pipelines depending on
/// a predicate, and merges what both pipelines emit.
///
/// Order is kept within each route, not across them.
pub struct LRFilter<T> {
    predicate: Option<Predicate<T>>,
    left: Arc<Pipeline<T>>,
    right: Arc<Pipeline<T>>,
    metrics: StageMetrics,
}

impl<T> fmt::Debug for LRFilter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LRFilter")
            .field("has_predicate", &self.predicate.is_some())
            .field("left_stages", &self.left.len())
            .field("right_stages", &self.right.len())
            .finish()
    }
}

impl<T: Send + 'static> LRFilter<T> {
    pub fn new<P>(predicate: P, left: Pipeline<T>, right: Pipeline<T>) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::from_predicate(Some(Arc::new(predicate)), left, right)
    }

    /// Without a predicate the filter passes its input through
    pub fn from_predicate(
        predicate: Option<Predicate<T>>,
        left: Pipeline<T>,
        right: Pipeline<T>,
    ) -> Self {
        Self {
            predicate,
            left: Arc::new(left),
            right: Arc::new(right),
            metrics: StageMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    fn routes_to_nothing(&self) -> bool {
        (self.left.is_empty() && self.right.is_empty())
            || (self.left.has_nil_stage() && self.right.has_nil_stage())
    }
}

impl<T: Send + 'static> Stage<T> for LRFilter<T> {
    fn run(&self, input: Stream<T>) -> Stream<T> {
        let Some(predicate) = self.predicate.as_ref() else {
            return input;
        };
        if self.routes_to_nothing() || input.is_detached() {
            return input;
        }

        let capacity = input.capacity();
        let (left_tx, left_rx) = bounded(capacity / 2 + 1);
        let (right_tx, right_rx) = bounded(capacity / 2 + 1);

        let left: StageRef<T> = self.left.clone();
        let right: StageRef<T> = self.right.clone();
        let output = merge_branches(
            vec![(left, left_rx), (right, right_rx)],
            capacity,
            &self.metrics,
            "lr_filter",
        );

        let predicate = Arc::clone(predicate);
        spawn_worker(&self.metrics, move || {
            let (mut lefts, mut rights) = (0u64, 0u64);
            for value in input {
                let sent = if predicate(&value) {
                    lefts += 1;
                    left_tx.send(value)
                } else {
                    rights += 1;
                    right_tx.send(value)
                };
                if sent.is_err() {
                    debug!("lr_filter: route closed, value discarded");
                }
            }
            trace!("lr_filter: routed {} left, {} right", lefts, rights);
        });

        output
    }

    fn kind(&self) -> StageKind {
        StageKind::LRFilter
    }

    fn name(&self) -> &str {
        "lr_filter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::Consumer;
    use crate::stage::StageExt;

    fn identity() -> Pipeline<i32> {
        Pipeline::unchecked(vec![Consumer::new(1, |v: i32| v).slot()])
    }

    fn doubled() -> Pipeline<i32> {
        Pipeline::unchecked(vec![Consumer::new(1, |v: i32| v * 2).slot()])
    }

    #[test]
    fn test_lr_filter_routes() {
        let filter = LRFilter::new(|v: &i32| *v < 0, identity(), doubled());
        let (tx, rx) = bounded(0);
        let out = filter.run(rx);

        tx.send(21).unwrap();
        assert_eq!(out.recv(), Some(42));

        tx.send(-7).unwrap();
        assert_eq!(out.recv(), Some(-7));

        tx.close();
        assert_eq!(out.recv(), None);
    }

    #[test]
    fn test_lr_filter_without_predicate_passthrough() {
        let filter = LRFilter::from_predicate(None, identity(), doubled());
        let (_tx, rx) = bounded(0);
        assert!(filter.run(rx.clone()).same_stream(&rx));
    }

    #[test]
    fn test_lr_filter_without_pipelines_passthrough() {
        let filter = LRFilter::new(|v: &i32| *v < 0, Pipeline::default(), Pipeline::default());
        let (_tx, rx) = bounded(0);
        assert!(filter.run(rx.clone()).same_stream(&rx));
    }

    #[test]
    fn test_lr_filter_invalid_pipelines_passthrough() {
        let broken = || Pipeline::unchecked(vec![Consumer::new(1, |v: i32| v).slot(), None]);
        let filter = LRFilter::new(|v: &i32| *v < 0, broken(), broken());
        let (_tx, rx) = bounded(0);
        assert!(filter.run(rx.clone()).same_stream(&rx));
    }

    #[test]
    fn test_lr_filter_debug_reports_routes() {
        let filter = LRFilter::new(|v: &i32| *v < 0, identity(), Pipeline::default());
        let rendered = format!("{:?}", filter);
        assert!(rendered.contains("left_stages: 1"));
        assert!(rendered.contains("right_stages: 0"));
    }

    #[test]
    fn test_lr_filter_single_empty_route_is_identity() {
        let filter = LRFilter::new(|v: &i32| *v < 0, Pipeline::default(), doubled());
        let (tx, rx) = bounded(0);
        let out = filter.run(rx);

        tx.send(-3).unwrap();
        assert_eq!(out.recv(), Some(-3));
        tx.send(3).unwrap();
        assert_eq!(out.recv(), Some(6));
        tx.close();
        assert_eq!(out.recv(), None);
    }
}
