use crate::branch::{close_when_done, spawn_worker};
use crate::config::PipelineConfig;
use crate::metrics::StageMetrics;
use crate::multiplex::drain;
use crate::stage::{Stage, StageKind};
use crate::stream::{bounded, Stream};
use crossbeam::sync::WaitGroup;
use log::debug;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// One-to-one transformation applied by a [`Consumer`]
pub type Transform<T> = Arc<dyn Fn(T) -> T + Send + Sync>;

/// Applies a transform to every value with a pool of workers.
///
/// Workers compete for the shared input, so output order across workers is
/// not preserved. Each input value yields exactly one output value. The
/// transform must not panic: a panic ends its worker and the values it would
/// have handled are left to the remaining workers.
pub struct Consumer<T> {
    name: String,
    transform: Option<Transform<T>>,
    workers: usize,
    capacity: usize,
    metrics: StageMetrics,
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("name", &self.name)
            .field("has_transform", &self.transform.is_some())
            .field("workers", &self.workers)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T: Send + 'static> Consumer<T> {
    /// Create a consumer running `transform` on `workers` threads
    pub fn new<F>(workers: usize, transform: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        Self::from_transform(workers, Some(Arc::new(transform)))
    }

    /// Create a consumer from an optional transform. Without one the consumer
    /// passes its input through.
    pub fn from_transform(workers: usize, transform: Option<Transform<T>>) -> Self {
        Self {
            name: "consumer".to_string(),
            transform,
            workers,
            capacity: PipelineConfig::default().buffer_capacity,
            metrics: StageMetrics::new(),
        }
    }

    /// Name shown in logs and by [`Stage::name`]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the output buffer capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Take the output capacity from `config`
    pub fn with_config(self, config: &PipelineConfig) -> Self {
        self.with_capacity(config.buffer_capacity)
    }

    /// Number of worker threads started per run
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Counters shared by every run of this consumer
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }
}

impl<T: Send + 'static> Stage<T> for Consumer<T> {
    fn run(&self, input: Stream<T>) -> Stream<T> {
        let Some(transform) = self.transform.as_ref() else {
            return input;
        };
        if self.workers == 0 || input.is_detached() {
            return input;
        }

        let (writer, output) = bounded(self.capacity);
        let barrier = WaitGroup::new();

        for _ in 0..self.workers {
            let transform = Arc::clone(transform);
            let input = input.clone();
            let writer = writer.clone();
            let barrier = barrier.clone();
            let metrics = self.metrics.clone();

            spawn_worker(&self.metrics, move || {
                let _slot = barrier;
                for value in &input {
                    let start = Instant::now();
                    let result = transform(value);
                    metrics.record_latency(start.elapsed());

                    if writer.send(result).is_err() {
                        debug!("consumer: output reader went away, draining input");
                        metrics.record_drained(1 + drain(input.clone()));
                        return;
                    }
                    metrics.record_processed();
                }
            });
        }

        close_when_done(writer, barrier, None, &self.metrics, "consumer");
        debug!("consumer '{}': started {} workers", self.name, self.workers);
        output
    }

    fn kind(&self) -> StageKind {
        StageKind::Consumer
    }

    fn name(&self) -> &str {
        &self.name
    }
}
