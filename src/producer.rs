use crate::branch::{close_when_done, forward, spawn_worker};
use crate::config::PipelineConfig;
use crate::metrics::StageMetrics;
use crate::stage::{Stage, StageKind};
use crate::stream::{bounded, Stream};
use crossbeam::sync::WaitGroup;
use log::debug;
use std::fmt;
use std::sync::Arc;

/// Value source run by a [`Producer`].
///
/// It receives a cancellation stream and returns the stream of values it
/// generates. Closing the cancellation stream asks the generator to stop; the
/// generator must then close its own stream. It should also stop once a send
/// on its stream fails, which means nobody reads it anymore.
pub type Generator<T> = Arc<dyn Fn(Stream<T>) -> Stream<T> + Send + Sync>;

/// Entry stage that generates values instead of transforming its input.
///
/// Every worker runs its own invocation of the generator, and all of them feed
/// one output. The input is handed to the generators as their cancellation
/// signal; pass [`Stream::detached`] when there is none.
pub struct Producer<T> {
    name: String,
    generator: Option<Generator<T>>,
    workers: usize,
    capacity: usize,
    metrics: StageMetrics,
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("name", &self.name)
            .field("has_generator", &self.generator.is_some())
            .field("workers", &self.workers)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T: Send + 'static> Producer<T> {
    /// Create a producer running `generator` once per worker
    pub fn new<F>(workers: usize, generator: F) -> Self
    where
        F: Fn(Stream<T>) -> Stream<T> + Send + Sync + 'static,
    {
        Self::from_generator(workers, Some(Arc::new(generator)))
    }

    /// Without a generator the producer passes its input through
    pub fn from_generator(workers: usize, generator: Option<Generator<T>>) -> Self {
        Self::with_metrics(workers, generator, StageMetrics::new())
    }

    /// Producer whose workers each emit the values of a fresh iterator,
    /// stopping early once the cancellation stream closes.
    pub fn from_iter<F, I>(workers: usize, make_iter: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let metrics = StageMetrics::new();
        let emitter_metrics = metrics.clone();
        let generator = move |cancel: Stream<T>| {
            let (tx, rx) = bounded(0);
            let values = make_iter().into_iter();
            spawn_worker(&emitter_metrics, move || {
                for value in values {
                    if cancel.poll_closed() || tx.send(value).is_err() {
                        break;
                    }
                }
            });
            rx
        };
        Self::with_metrics(workers, Some(Arc::new(generator)), metrics)
    }

    fn with_metrics(workers: usize, generator: Option<Generator<T>>, metrics: StageMetrics) -> Self {
        Self {
            name: "producer".to_string(),
            generator,
            workers,
            capacity: PipelineConfig::default().buffer_capacity,
            metrics,
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

    /// Counters shared by every run of this producer
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }
}

impl<T: Send + 'static> Stage<T> for Producer<T> {
    fn run(&self, input: Stream<T>) -> Stream<T> {
        let Some(generator) = self.generator.as_ref() else {
            return input;
        };
        if self.workers == 0 {
            return input;
        }

        let (writer, output) = bounded(self.capacity);
        let barrier = WaitGroup::new();

        for _ in 0..self.workers {
            let generator = Arc::clone(generator);
            let cancel = input.clone();
            let writer = writer.clone();
            let barrier = barrier.clone();
            let metrics = self.metrics.clone();

            spawn_worker(&self.metrics, move || {
                let _slot = barrier;
                if !forward(generator(cancel), &writer, &metrics) {
                    debug!("producer: output reader went away, abandoning generated stream");
                }
            });
        }

        close_when_done(writer, barrier, None, &self.metrics, "producer");
        debug!("producer '{}': started {} workers", self.name, self.workers);
        output
    }

    fn kind(&self) -> StageKind {
        StageKind::Producer
    }

    fn name(&self) -> &str {
        &self.name
    }
}
