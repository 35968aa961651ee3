//! Low-level helpers that consume one stream and feed zero or more others.
//!
//! The fan-out operators are built on these. They are public so hosts can wire
//! custom stages the same way.

use crate::metrics::StageMetrics;
use crate::stream::{OverflowPolicy, SendTimeoutError, Stream, StreamWriter, TrySendError};
use log::debug;

/// Consume and discard every value until `input` closes.
///
/// Returns the number of discarded values. A detached stream has no writer to
/// unblock, so it is returned from immediately.
pub fn drain<T>(input: Stream<T>) -> u64 {
    if input.is_detached() {
        return 0;
    }
    input.into_iter().fold(0, |count, _| count + 1)
}

/// Destination of a duplicator together with how it handles a full buffer
#[derive(Debug)]
pub struct Outlet<T> {
    writer: StreamWriter<T>,
    policy: OverflowPolicy,
}

impl<T> Outlet<T> {
    /// Outlet with an explicit overflow policy
    pub fn new(writer: StreamWriter<T>, policy: OverflowPolicy) -> Self {
        Self { writer, policy }
    }

    /// Outlet that waits for room on every value
    pub fn blocking(writer: StreamWriter<T>) -> Self {
        Self::new(writer, OverflowPolicy::Block)
    }

    /// Outlet that drops a value if it cannot be accepted immediately
    pub fn best_effort(writer: StreamWriter<T>) -> Self {
        Self::new(writer, OverflowPolicy::Drop)
    }

    fn deliver(&self, value: T, metrics: &StageMetrics) -> Outcome {
        match self.policy {
            OverflowPolicy::Block => match self.writer.try_send(value) {
                Ok(()) => Outcome::Delivered,
                Err(TrySendError::Full(value)) => {
                    metrics.record_block();
                    match self.writer.send(value) {
                        Ok(()) => Outcome::Delivered,
                        Err(_) => Outcome::Gone,
                    }
                }
                Err(TrySendError::Disconnected(_)) => Outcome::Gone,
            },
            OverflowPolicy::Drop => match self.writer.try_send(value) {
                Ok(()) => Outcome::Delivered,
                Err(TrySendError::Full(_)) => Outcome::Dropped,
                Err(TrySendError::Disconnected(_)) => Outcome::Gone,
            },
            OverflowPolicy::DropAfter(grace) => match self.writer.send_timeout(value, grace) {
                Ok(()) => Outcome::Delivered,
                Err(SendTimeoutError::Timeout(_)) => Outcome::Dropped,
                Err(SendTimeoutError::Disconnected(_)) => Outcome::Gone,
            },
        }
    }
}

enum Outcome {
    Delivered,
    Dropped,
    Gone,
}

/// What a duplicator did with the values it read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Values read from the input
    pub received: u64,
    /// Per outlet, values accepted
    pub delivered: Vec<u64>,
    /// Per outlet, values dropped because the outlet was full
    pub dropped: Vec<u64>,
}

impl Delivery {
    fn new(outlets: usize) -> Self {
        Self {
            received: 0,
            delivered: vec![0; outlets],
            dropped: vec![0; outlets],
        }
    }

    /// Total values dropped across all outlets
    pub fn total_dropped(&self) -> u64 {
        self.dropped.iter().sum()
    }
}

/// Copy every value of `input` to each outlet according to its policy, then
/// close every outlet once `input` closes.
///
/// Outlets see values in input order. An outlet whose readers are all gone is
/// closed and skipped from then on; the input keeps being consumed so the
/// upstream never stalls on a duplicator with nowhere to send.
pub fn duplicate<T: Clone>(input: Stream<T>, outlets: Vec<Outlet<T>>) -> Delivery {
    duplicate_tracked(input, outlets, &StageMetrics::new())
}

/// Full backpressure: every output gets every value, and the slowest output
/// paces the input.
pub fn duplicate_blocking<T: Clone>(input: Stream<T>, outputs: Vec<StreamWriter<T>>) -> Delivery {
    duplicate(input, outputs.into_iter().map(Outlet::blocking).collect())
}

/// Best effort: each output gets a value only if it can take it immediately.
/// The input is never held back by a full output.
pub fn duplicate_best_effort<T: Clone>(
    input: Stream<T>,
    outputs: Vec<StreamWriter<T>>,
) -> Delivery {
    duplicate(input, outputs.into_iter().map(Outlet::best_effort).collect())
}

pub(crate) fn duplicate_tracked<T: Clone>(
    input: Stream<T>,
    outlets: Vec<Outlet<T>>,
    metrics: &StageMetrics,
) -> Delivery {
    let mut delivery = Delivery::new(outlets.len());
    let mut slots: Vec<Option<Outlet<T>>> = outlets.into_iter().map(Some).collect();

    for value in input.iter() {
        delivery.received += 1;
        let Some(last) = slots.iter().rposition(Option::is_some) else {
            continue;
        };

        let mut value = Some(value);
        for idx in 0..=last {
            let Some(outlet) = slots[idx].as_ref() else {
                continue;
            };
            let item = if idx == last {
                value.take()
            } else {
                value.clone()
            };
            let Some(item) = item else {
                break;
            };

            match outlet.deliver(item, metrics) {
                Outcome::Delivered => delivery.delivered[idx] += 1,
                Outcome::Dropped => {
                    delivery.dropped[idx] += 1;
                    metrics.record_dropped(1);
                }
                Outcome::Gone => {
                    debug!("duplicate: outlet {} has no reader left, retiring it", idx);
                    slots[idx] = None;
                }
            }
        }
    }

    // Dropping the outlets closes every duplicated stream.
    drop(slots);
    delivery
}
