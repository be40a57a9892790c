// SPDX-License-Identifier: GPL-3.0-only
//! Capture threads behind code streams
//!
//! Camera and image-file scanners decode frames on a dedicated thread. The
//! [`CaptureLoopController`] owns that thread and is the [`StreamHandle`]
//! their code streams close. Closing never joins: it raises the stop flag,
//! wakes any [`StopToken::wait`] and lets the thread finish on its own, so the
//! UI task is not held up by a sleeping producer or a stalled device.

use super::types::StreamHandle;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Action returned by the loop body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// Stop flag shared between a controller and its thread
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        let (flag, _) = &*self.inner;
        flag.lock().map(|stopped| *stopped).unwrap_or(true)
    }

    /// Sleep up to `timeout`; returns true if stopped meanwhile
    pub fn wait(&self, timeout: Duration) -> bool {
        let (flag, wake) = &*self.inner;
        let Ok(guard) = flag.lock() else {
            return true;
        };
        match wake.wait_timeout_while(guard, timeout, |stopped| !*stopped) {
            Ok((stopped, _)) => *stopped,
            Err(_) => true,
        }
    }

    fn stop(&self) {
        let (flag, wake) = &*self.inner;
        if let Ok(mut stopped) = flag.lock() {
            *stopped = true;
        }
        wake.notify_all();
    }
}

/// A capture loop running on its own thread
pub struct CaptureLoopController {
    thread_handle: Option<JoinHandle<()>>,
    token: StopToken,
    name: String,
}

impl CaptureLoopController {
    /// Run `loop_fn` until it returns [`LoopAction::Stop`] or the controller
    /// is closed
    pub fn start<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut(&StopToken) -> LoopAction + Send + 'static,
    {
        Self::start_with_init(name, || Ok(()), move |_: &mut (), token| loop_fn(token))
    }

    /// Like [`start`](Self::start), with per-thread state built by `init_fn`
    ///
    /// If initialization fails the thread exits at once, dropping whatever
    /// channel sender the closures captured and so ending the stream.
    pub fn start_with_init<S, I, F>(name: &str, init_fn: I, mut loop_fn: F) -> Self
    where
        S: 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S, &StopToken) -> LoopAction + Send + 'static,
    {
        let token = StopToken::default();
        let thread_token = token.clone();
        let thread_name = name.to_string();

        info!(name, "Starting capture loop");
        let thread_handle = thread::spawn(move || {
            let mut state = match init_fn() {
                Ok(state) => state,
                Err(e) => {
                    warn!(name = %thread_name, error = %e, "Capture loop initialization failed");
                    return;
                }
            };

            while !thread_token.is_stopped() {
                if loop_fn(&mut state, &thread_token) == LoopAction::Stop {
                    debug!(name = %thread_name, "Capture loop finished");
                    break;
                }
            }
            info!(name = %thread_name, "Capture loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            token,
            name: name.to_string(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the thread and let go of it without waiting
    fn release(&mut self) {
        self.token.stop();
        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        if handle.is_finished() {
            if handle.join().is_err() {
                warn!(name = %self.name, "Capture loop thread panicked");
            }
        } else {
            debug!(name = %self.name, "Capture loop detached, exits on its next check");
        }
    }
}

impl StreamHandle for CaptureLoopController {
    fn close(&mut self) {
        self.release();
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Instant;

    fn wait_until_done(controller: &CaptureLoopController) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_loop_runs_until_stop() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let controller = CaptureLoopController::start("test-loop", move |_| {
            if counter_clone.fetch_add(1, Ordering::SeqCst) >= 10 {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        });

        wait_until_done(&controller);
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_close_returns_while_body_waits() {
        let mut controller = CaptureLoopController::start("test-wait", |token| {
            if token.wait(Duration::from_secs(30)) {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        });
        thread::sleep(Duration::from_millis(10));

        let started = Instant::now();
        StreamHandle::close(&mut controller);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(controller.token.is_stopped());

        // A second close is a no-op
        StreamHandle::close(&mut controller);
    }

    #[test]
    fn test_closed_loop_stops_running_its_body() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);
        let token = {
            let mut controller = CaptureLoopController::start("test-close", move |token| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                token.wait(Duration::from_millis(5));
                LoopAction::Continue
            });
            thread::sleep(Duration::from_millis(30));
            StreamHandle::close(&mut controller);
            controller.token.clone()
        };
        assert!(token.is_stopped());

        thread::sleep(Duration::from_millis(20));
        let settled = counter.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert!(settled > 0);
        assert_eq!(counter.load(Ordering::SeqCst), settled);
    }

    #[test]
    fn test_init_failure_skips_the_body() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);

        let controller = CaptureLoopController::start_with_init(
            "test-fail-init",
            || Err::<(), _>("no such device".to_string()),
            move |_: &mut (), _| {
                ran_clone.store(true, Ordering::SeqCst);
                LoopAction::Stop
            },
        );

        wait_until_done(&controller);
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_token_wait_times_out_without_stop() {
        let token = StopToken::default();
        assert!(!token.wait(Duration::from_millis(1)));
        token.stop();
        assert!(token.wait(Duration::from_secs(30)));
    }
}
