//! Worker plumbing shared by the operators: spawning, merging branch outputs
//! into one stream, and closing that stream behind a completion barrier.

use crate::metrics::StageMetrics;
use crate::multiplex::drain;
use crate::stage::StageRef;
use crate::stream::{bounded, Stream, StreamWriter, TryRecvError};
use crossbeam::sync::WaitGroup;
use log::{debug, trace, warn};
use std::thread;

/// Spawn a worker thread tracked by `metrics`.
pub(crate) fn spawn_worker<F>(metrics: &StageMetrics, work: F)
where
    F: FnOnce() + Send + 'static,
{
    let guard = metrics.worker();
    thread::spawn(move || {
        let _guard = guard;
        work();
    });
}

/// Copy `source` into `output` until `source` closes.
///
/// Returns `false` if `output` lost its readers first; `source` is then left
/// unread and dropped.
pub(crate) fn forward<T>(source: Stream<T>, output: &StreamWriter<T>, metrics: &StageMetrics) -> bool {
    for value in source {
        if output.send(value).is_err() {
            return false;
        }
        metrics.record_processed();
    }
    true
}

/// Close `output` once every clone of `barrier` has been dropped.
///
/// `pending`, when given, is drained afterwards if it still has a writer.
pub(crate) fn close_when_done<T: Send + 'static>(
    output: StreamWriter<T>,
    barrier: WaitGroup,
    pending: Option<Stream<T>>,
    metrics: &StageMetrics,
    label: &'static str,
) {
    let closer_metrics = metrics.clone();
    spawn_worker(metrics, move || {
        barrier.wait();
        trace!("{}: all workers finished, closing output", label);
        output.close();
        if let Some(pending) = pending {
            drain_if_open(pending, true, &closer_metrics, label);
        }
    });
}

/// Start a separate drain of `pending` unless it is already closed and empty,
/// so whoever writes into it is never left blocked.
pub(crate) fn drain_if_open<T: Send + 'static>(
    pending: Stream<T>,
    downstream_alive: bool,
    metrics: &StageMetrics,
    label: &'static str,
) {
    let already_taken = match pending.try_recv() {
        Err(TryRecvError::Disconnected) => return,
        Err(TryRecvError::Empty) => 0,
        Ok(_) => 1,
    };

    if downstream_alive {
        warn!(
            "{}: branch closed its output before its input was exhausted; draining the rest",
            label
        );
    } else {
        debug!("{}: output reader went away; draining the rest of the input", label);
    }

    let drain_metrics = metrics.clone();
    spawn_worker(metrics, move || {
        let discarded = already_taken + drain(pending);
        drain_metrics.record_drained(discarded);
    });
}

/// Run `stage` against its dedicated `input` and forward its output.
///
/// When the stage output ends while `input` still has a writer, the rest of
/// `input` is drained by a separate worker. The barrier slot is released as
/// soon as forwarding stops, independently of that drain.
pub(crate) fn spawn_branch<T: Send + 'static>(
    stage: StageRef<T>,
    input: Stream<T>,
    output: StreamWriter<T>,
    barrier: WaitGroup,
    metrics: &StageMetrics,
    label: &'static str,
) {
    let branch_metrics = metrics.clone();
    spawn_worker(metrics, move || {
        trace!("{}: branch '{}' started", label, stage.name());
        let pending = input.clone();
        let downstream_alive = forward(stage.run(input), &output, &branch_metrics);
        drop(output);
        drop(barrier);
        trace!("{}: branch '{}' finished", label, stage.name());
        drain_if_open(pending, downstream_alive, &branch_metrics, label);
    });
}

/// Run every branch against its own input and merge their outputs into one
/// stream of the given capacity, closed once all branches are done.
pub(crate) fn merge_branches<T: Send + 'static>(
    branches: Vec<(StageRef<T>, Stream<T>)>,
    capacity: usize,
    metrics: &StageMetrics,
    label: &'static str,
) -> Stream<T> {
    let (writer, output) = bounded(capacity);
    let barrier = WaitGroup::new();
    for (stage, input) in branches {
        spawn_branch(stage, input, writer.clone(), barrier.clone(), metrics, label);
    }
    close_when_done(writer, barrier, None, metrics, label);
    output
}
