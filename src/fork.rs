//! Fan-out operators: every branch sees a copy of the input and all branch
//! outputs are merged into one stream.
//!
//! [`Fork`] waits on every branch, so its slowest branch paces the upstream.
//! [`Mirror`] waits only on its primary branch; mirrors get what they can
//! take without holding the primary back.

use crate::branch::{merge_branches, spawn_worker};
use crate::config::PipelineConfig;
use crate::metrics::StageMetrics;
use crate::multiplex::{duplicate_tracked, Outlet};
use crate::stage::{has_nil_stage, Stage, StageKind, StageRef, StageSlot};
use crate::stream::{bounded, OverflowPolicy, Stream};
use log::{debug, trace};

/// Wire up one dedicated input per branch, start the duplicator and merge.
fn fan_out<T: Clone + Send + 'static>(
    input: Stream<T>,
    branches: Vec<(StageRef<T>, OverflowPolicy)>,
    metrics: &StageMetrics,
    label: &'static str,
) -> Stream<T> {
    let capacity = input.capacity();
    let count = branches.len();

    let mut outlets = Vec::with_capacity(count);
    let mut wired = Vec::with_capacity(count);
    for (stage, policy) in branches {
        let (writer, dedicated) = bounded(capacity);
        outlets.push(Outlet::new(writer, policy));
        wired.push((stage, dedicated));
    }

    let output = merge_branches(wired, capacity * count, metrics, label);

    let duplicator_metrics = metrics.clone();
    spawn_worker(metrics, move || {
        let delivery = duplicate_tracked(input, outlets, &duplicator_metrics);
        trace!(
            "{}: input closed after {} values, {} dropped",
            label,
            delivery.received,
            delivery.total_dropped()
        );
    });

    debug!("{}: started {} branches", label, count);
    output
}

/// Blocking fan-out: every branch receives every value.
pub struct Fork<T> {
    branches: Vec<StageSlot<T>>,
    metrics: StageMetrics,
}

impl<T: Clone + Send + 'static> Fork<T> {
    /// Create a fork over `branches`; a missing branch makes it pass-through
    pub fn new(branches: Vec<StageSlot<T>>) -> Self {
        Self {
            branches,
            metrics: StageMetrics::new(),
        }
    }

    /// Counters for this fork, including blocked sends
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }
}

impl<T: Clone + Send + 'static> Stage<T> for Fork<T> {
    fn run(&self, input: Stream<T>) -> Stream<T> {
        if self.branches.is_empty() || has_nil_stage(&self.branches) || input.is_detached() {
            return input;
        }

        let branches = self
            .branches
            .iter()
            .flatten()
            .map(|stage| (stage.clone(), OverflowPolicy::Block))
            .collect();
        fan_out(input, branches, &self.metrics, "fork")
    }

    fn kind(&self) -> StageKind {
        StageKind::Fork
    }

    fn name(&self) -> &str {
        "fork"
    }
}

/// Best-effort fan-out: the primary branch receives every value, mirrors
/// receive a value only if they can accept it under the mirror overflow
/// policy (by default: immediately, or never).
pub struct Mirror<T> {
    primary: StageSlot<T>,
    mirrors: Vec<StageSlot<T>>,
    overflow: OverflowPolicy,
    metrics: StageMetrics,
}

impl<T: Clone + Send + 'static> Mirror<T> {
    /// Create a mirror using the default overflow policy for mirrors
    pub fn new(primary: StageSlot<T>, mirrors: Vec<StageSlot<T>>) -> Self {
        Self {
            primary,
            mirrors,
            overflow: PipelineConfig::default().mirror_overflow,
            metrics: StageMetrics::new(),
        }
    }

    /// Set how mirrors treat a full input
    pub fn with_overflow(mut self, policy: OverflowPolicy) -> Self {
        self.overflow = policy;
        self
    }

    pub fn with_config(self, config: &PipelineConfig) -> Self {
        self.with_overflow(config.mirror_overflow)
    }

    /// Counters for this mirror, including values dropped for mirrors
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }
}

impl<T: Clone + Send + 'static> Stage<T> for Mirror<T> {
    fn run(&self, input: Stream<T>) -> Stream<T> {
        let Some(primary) = self.primary.as_ref() else {
            return input;
        };
        if has_nil_stage(&self.mirrors) || input.is_detached() {
            return input;
        }

        let branches = std::iter::once((primary.clone(), OverflowPolicy::Block))
            .chain(
                self.mirrors
                    .iter()
                    .flatten()
                    .map(|stage| (stage.clone(), self.overflow)),
            )
            .collect();
        fan_out(input, branches, &self.metrics, "mirror")
    }

    fn kind(&self) -> StageKind {
        StageKind::Mirror
    }

    fn name(&self) -> &str {
        "mirror"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::Consumer;
    use crate::stage::StageExt;

    fn double() -> StageSlot<i32> {
        Consumer::new(1, |v: i32| v * 2).slot()
    }

    #[test]
    fn test_fork_duplicates_to_every_branch() {
        let fork = Fork::new(vec![double(), double()]);
        let (tx, rx) = bounded(0);
        let out = fork.run(rx);

        tx.send(5).unwrap();
        tx.close();

        assert_eq!(out.recv(), Some(10));
        assert_eq!(out.recv(), Some(10));
        assert_eq!(out.recv(), None);
    }

    #[test]
    fn test_fork_no_branch_passthrough() {
        let fork = Fork::<i32>::new(vec![]);
        let (_tx, rx) = bounded(0);
        assert!(fork.run(rx.clone()).same_stream(&rx));
    }

    #[test]
    fn test_fork_nil_branch_passthrough() {
        let fork = Fork::new(vec![double(), None]);
        let (_tx, rx) = bounded(0);
        assert!(fork.run(rx.clone()).same_stream(&rx));
    }

    #[test]
    fn test_fork_detached_input() {
        let fork = Fork::new(vec![double(), double()]);
        assert!(fork.run(Stream::detached()).is_detached());
    }

    #[test]
    fn test_mirror_duplicates_when_idle() {
        let mirror = Mirror::new(double(), vec![double()]);
        let (tx, rx) = bounded(0);
        let out = mirror.run(rx);

        tx.send(5).unwrap();
        tx.close();

        let values: Vec<i32> = out.into_iter().collect();
        // The mirror may miss the value, the primary may not.
        assert!(values == vec![10] || values == vec![10, 10]);
    }

    #[test]
    fn test_mirror_without_primary_passthrough() {
        let mirror = Mirror::new(None, vec![double()]);
        let (_tx, rx) = bounded(0);
        assert!(mirror.run(rx.clone()).same_stream(&rx));
    }

    #[test]
    fn test_mirror_nil_mirror_passthrough() {
        let mirror = Mirror::new(double(), vec![None]);
        let (_tx, rx) = bounded(0);
        assert!(mirror.run(rx.clone()).same_stream(&rx));
    }

    #[test]
    fn test_mirror_without_mirrors_acts_as_fork() {
        let mirror = Mirror::new(double(), vec![]);
        let (tx, rx) = bounded(0);
        let out = mirror.run(rx);
        for i in 0..20 {
            tx.send(i).unwrap();
        }
        tx.close();
        assert_eq!(out.into_iter().count(), 20);
    }
}
