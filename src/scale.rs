use crate::branch::{close_when_done, forward, spawn_worker};
use crate::metrics::StageMetrics;
use crate::stage::{Stage, StageKind, StageSlot};
use crate::stream::{bounded, Stream};
use crossbeam::sync::WaitGroup;
use log::{debug, trace};

/// Runs several instances of one stage against the same input.
///
/// Replicas compete for input values and share one output sized to hold a
/// full input buffer per replica. Useful to parallelise a whole sub-pipeline
/// rather than a single function.
pub struct Scale<T> {
    replicas: usize,
    stage: StageSlot<T>,
    metrics: StageMetrics,
}

impl<T: Send + 'static> Scale<T> {
    /// Create a scale running `replicas` copies of `stage`
    pub fn new(replicas: usize, stage: StageSlot<T>) -> Self {
        Self {
            replicas,
            stage,
            metrics: StageMetrics::new(),
        }
    }

    /// Number of copies started per run
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Counters for this scale, including drained leftovers
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }
}

impl<T: Send + 'static> Stage<T> for Scale<T> {
    fn run(&self, input: Stream<T>) -> Stream<T> {
        let Some(stage) = self.stage.as_ref() else {
            return input;
        };
        if self.replicas == 0 || input.is_detached() {
            return input;
        }

        let (writer, output) = bounded(input.capacity() * self.replicas);
        let barrier = WaitGroup::new();

        for replica in 0..self.replicas {
            let stage = stage.clone();
            let input = input.clone();
            let writer = writer.clone();
            let barrier = barrier.clone();
            let metrics = self.metrics.clone();

            spawn_worker(&self.metrics, move || {
                let _slot = barrier;
                trace!("scale: replica {} of '{}' started", replica, stage.name());
                forward(stage.run(input), &writer, &metrics);
            });
        }

        // Replicas share the input, so leftovers are only drained once all of
        // them have stopped reading.
        close_when_done(writer, barrier, Some(input), &self.metrics, "scale");
        debug!("scale: started {} replicas of '{}'", self.replicas, stage.name());
        output
    }

    fn kind(&self) -> StageKind {
        StageKind::Scale
    }

    fn name(&self) -> &str {
        "scale"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::Consumer;
    use crate::stage::StageExt;
    use std::time::{Duration, Instant};

    #[test]
    fn test_scale_runs_in_parallel() {
        let slow = Consumer::new(1, |v: i32| {
            std::thread::sleep(Duration::from_millis(200));
            v
        });
        let scale = Scale::new(10, slow.slot());
        let (tx, rx) = bounded(0);
        let start = Instant::now();
        let out = scale.run(rx);

        for _ in 0..10 {
            tx.send(1).unwrap();
        }
        tx.close();
        assert_eq!(out.into_iter().count(), 10);

        // Serially this would take two seconds.
        assert!(start.elapsed() < Duration::from_millis(1000));
    }

    #[test]
    fn test_scale_output_capacity() {
        let scale = Scale::new(3, Consumer::new(1, |v: i32| v).slot());
        let (_tx, rx) = bounded(4);
        assert_eq!(scale.run(rx).capacity(), 12);
    }

    #[test]
    fn test_scale_zero_passthrough() {
        let scale = Scale::new(0, Consumer::new(1, |v: i32| v).slot());
        let (_tx, rx) = bounded(0);
        assert!(scale.run(rx.clone()).same_stream(&rx));
    }

    #[test]
    fn test_scale_nil_stage_passthrough() {
        let scale = Scale::<i32>::new(10, None);
        let (_tx, rx) = bounded(0);
        assert!(scale.run(rx.clone()).same_stream(&rx));
    }

    #[test]
    fn test_scale_detached_input() {
        let scale = Scale::new(2, Consumer::new(1, |v: i32| v).slot());
        assert!(scale.run(Stream::detached()).is_detached());
    }
}
