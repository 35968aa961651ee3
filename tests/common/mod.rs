#![allow(dead_code)]

use crossbeam::channel::RecvTimeoutError;
use std::thread;
use std::time::{Duration, Instant};
use stream_stages::StageMetrics;

/// Route `log` output through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Run `work` on a separate thread and panic if it has not finished within
/// `timeout`.
pub fn fail_if_timeout<F>(name: &str, timeout: Duration, work: F)
where
    F: FnOnce() + Send + 'static,
{
    let (done_tx, done_rx) = crossbeam::channel::bounded::<()>(1);
    thread::spawn(move || {
        work();
        let _ = done_tx.send(());
    });
    match done_rx.recv_timeout(timeout) {
        Ok(()) => {}
        Err(RecvTimeoutError::Timeout) => panic!("{} timed out (> {:?})", name, timeout),
        Err(RecvTimeoutError::Disconnected) => panic!("{} panicked", name),
    }
}

/// Wait until every worker tracked by `metrics` has returned
pub fn wait_until_idle(metrics: &StageMetrics, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if metrics.active_workers() == 0 {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}
