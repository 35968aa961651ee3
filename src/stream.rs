use crossbeam::channel::{self, Receiver, Sender};
use std::fmt;
use std::time::Duration;

pub use crossbeam::channel::{RecvTimeoutError, SendTimeoutError, TryRecvError, TrySendError};

/// Determines what a writer does when a destination stream is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Block until the destination accepts the value
    Block,
    /// Drop the value for this destination if it cannot be accepted right now
    Drop,
    /// Wait up to the given duration, then drop the value for this destination
    DropAfter(Duration),
}

/// Create a bounded stream with the given capacity.
///
/// A capacity of zero yields a rendezvous stream: every send waits for a
/// matching receive. The stream closes once every [`StreamWriter`] clone has
/// been closed or dropped.
pub fn bounded<T>(capacity: usize) -> (StreamWriter<T>, Stream<T>) {
    let (tx, rx) = channel::bounded(capacity);
    (StreamWriter { tx }, Stream { rx, detached: false })
}

/// Reading end of a bounded, closable FIFO stream.
///
/// Clones share the same underlying channel; each value is delivered to exactly
/// one reader.
pub struct Stream<T> {
    rx: Receiver<T>,
    detached: bool,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            detached: self.detached,
        }
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("detached", &self.detached)
            .finish()
    }
}

impl<T> Stream<T> {
    /// A stream with no writer behind it: it never yields a value and never
    /// closes. Stages treat a detached input as "no input" and pass it through
    /// untouched; a producer at the head of a pipeline reads it as a
    /// cancellation signal that never fires.
    pub fn detached() -> Self {
        Self {
            rx: channel::never(),
            detached: true,
        }
    }

    /// Whether this is a [`Stream::detached`] stream
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Block until a value arrives. Returns `None` once the stream is closed
    /// and drained.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Take a value if one is ready
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.rx.try_recv()
    }

    /// Wait up to `timeout` for a value
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Blocking iterator that ends when the stream is closed and drained
    pub fn iter(&self) -> channel::Iter<'_, T> {
        self.rx.iter()
    }

    /// Check whether the writing side has closed, discarding any values still
    /// buffered. Meant for cancellation streams whose values carry no meaning.
    pub fn poll_closed(&self) -> bool {
        if self.detached {
            return false;
        }
        loop {
            match self.rx.try_recv() {
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
    }

    /// Number of values currently buffered
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Check if no values are buffered
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Buffer capacity of the stream
    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(0)
    }

    /// Whether both handles read from the same underlying channel
    pub fn same_stream(&self, other: &Stream<T>) -> bool {
        self.detached == other.detached && self.rx.same_channel(&other.rx)
    }
}

impl<T> IntoIterator for Stream<T> {
    type Item = T;
    type IntoIter = channel::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rx.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Stream<T> {
    type Item = T;
    type IntoIter = channel::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rx.iter()
    }
}

/// Writing end of a stream. Closing (or dropping) the last clone closes the
/// stream for its readers.
pub struct StreamWriter<T> {
    tx: Sender<T>,
}

impl<T> Clone for StreamWriter<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> fmt::Debug for StreamWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamWriter")
            .field("len", &self.tx.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<T> StreamWriter<T> {
    /// Send a value, blocking while the stream is full.
    ///
    /// Fails, handing the value back, when every reader has gone away.
    pub fn send(&self, value: T) -> Result<(), T> {
        self.tx.send(value).map_err(|err| err.into_inner())
    }

    /// Send a value only if it can be accepted right now
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        self.tx.try_send(value)
    }

    /// Send a value, waiting at most `timeout` for room
    pub fn send_timeout(&self, value: T, timeout: Duration) -> Result<(), SendTimeoutError<T>> {
        self.tx.send_timeout(value, timeout)
    }

    /// Close this handle. The stream itself closes once every clone is closed.
    pub fn close(self) {
        drop(self);
    }

    /// Buffer capacity of the stream
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }

    /// Check if the buffer is full
    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }
}
