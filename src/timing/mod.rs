//! Microsecond-resolution periodic timer
//!
//! OS timers are typically millisecond-granular, which is not enough for
//! sub-millisecond outbound polling. [`MicroTimer`] trades one spinning CPU
//! core for precision: a dedicated thread busy-waits against a monotonic
//! clock on an absolute schedule (`next += interval`), so the callback rate
//! does not drift with callback duration.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Arguments passed to the timer callback on every delivered tick.
#[derive(Debug, Clone, Copy)]
pub struct TimerTick {
    /// Ticks scheduled since `start()`, including skipped ones
    pub count: u64,
    /// Microseconds elapsed since `start()` when the tick fired
    pub elapsed_us: i64,
    /// How late the tick fired relative to its ideal schedule
    pub late_by_us: i64,
    /// Duration of the previous callback invocation
    pub prev_callback_us: i64,
}

type TimerCallback = Box<dyn FnMut(TimerTick) + Send>;

/// High-resolution periodic callback source on a dedicated spin-wait thread.
///
/// `interval` and `ignore_late` are read atomically on every tick, so both
/// can be changed while the timer runs and take effect on the next tick
/// without restarting the thread.
pub struct MicroTimer {
    interval_us: Arc<AtomicU64>,
    ignore_late_us: Arc<AtomicU64>,
    callback: Arc<Mutex<Option<TimerCallback>>>,
    cancel: Mutex<Arc<AtomicBool>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread_id: Mutex<Option<ThreadId>>,
}

impl MicroTimer {
    pub fn new(interval_us: u64) -> Self {
        Self {
            interval_us: Arc::new(AtomicU64::new(interval_us)),
            ignore_late_us: Arc::new(AtomicU64::new(0)),
            callback: Arc::new(Mutex::new(None)),
            cancel: Mutex::new(Arc::new(AtomicBool::new(false))),
            handle: Mutex::new(None),
            thread_id: Mutex::new(None),
        }
    }

    /// Install the tick callback. Takes effect on the next delivered tick.
    pub fn on_tick(&self, callback: impl FnMut(TimerTick) + Send + 'static) {
        *self.callback.lock() = Some(Box::new(callback));
    }

    /// Tick interval in microseconds.
    pub fn interval_us(&self) -> u64 {
        self.interval_us.load(Ordering::Relaxed)
    }

    /// Change the interval; applies on the next tick even while running.
    pub fn set_interval_us(&self, interval_us: u64) {
        self.interval_us.store(interval_us, Ordering::Relaxed);
    }

    /// Lateness threshold beyond which a tick is skipped. 0 = never skip.
    pub fn set_ignore_late_us(&self, threshold_us: u64) {
        self.ignore_late_us.store(threshold_us, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the timer thread. Returns `false` if already running or the
    /// interval is zero.
    pub fn start(&self) -> bool {
        let mut handle = self.handle.lock();
        if handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
            return false;
        }
        if self.interval_us.load(Ordering::Relaxed) == 0 {
            return false;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        *self.cancel.lock() = cancel.clone();

        let interval = self.interval_us.clone();
        let ignore_late = self.ignore_late_us.clone();
        let callback = self.callback.clone();

        let spawned = thread::Builder::new()
            .name("nith-micro-timer".to_string())
            .spawn(move || spin_loop(interval, ignore_late, callback, cancel));
        match spawned {
            Ok(h) => {
                *self.thread_id.lock() = Some(h.thread().id());
                *handle = Some(h);
                true
            }
            Err(e) => {
                log::error!("Failed to spawn timer thread: {}", e);
                false
            }
        }
    }

    /// Signal cancellation and join the timer thread.
    ///
    /// Safe to call from within the tick callback: when invoked on the timer
    /// thread itself it only signals and returns without joining.
    pub fn stop(&self) {
        self.cancel.lock().store(true, Ordering::Relaxed);
        if *self.thread_id.lock() == Some(thread::current().id()) {
            return;
        }
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }

    /// Signal cancellation and poll for thread exit up to `timeout`.
    ///
    /// Returns whether the thread exited within the timeout.
    pub fn stop_and_wait(&self, timeout: Duration) -> bool {
        self.cancel.lock().store(true, Ordering::Relaxed);
        if *self.thread_id.lock() == Some(thread::current().id()) {
            return false;
        }
        let deadline = Instant::now() + timeout;
        loop {
            let finished = self
                .handle
                .lock()
                .as_ref()
                .map(|h| h.is_finished())
                .unwrap_or(true);
            if finished {
                if let Some(handle) = self.handle.lock().take() {
                    let _ = handle.join();
                }
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Drop for MicroTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spin_loop(
    interval_us: Arc<AtomicU64>,
    ignore_late_us: Arc<AtomicU64>,
    callback: Arc<Mutex<Option<TimerCallback>>>,
    cancel: Arc<AtomicBool>,
) {
    let start = Instant::now();
    let elapsed_us = || -> i64 { start.elapsed().as_micros() as i64 };

    let mut count: u64 = 0;
    let mut next_us: i64 = 0;
    let mut prev_callback_us: i64 = 0;

    while !cancel.load(Ordering::Relaxed) {
        let interval = interval_us.load(Ordering::Relaxed) as i64;
        let ignore_late = ignore_late_us.load(Ordering::Relaxed) as i64;

        next_us += interval.max(1);
        count += 1;

        let mut now_us;
        loop {
            now_us = elapsed_us();
            if now_us >= next_us || cancel.load(Ordering::Relaxed) {
                break;
            }
            std::hint::spin_loop();
        }
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        let late_by_us = now_us - next_us;
        if ignore_late > 0 && late_by_us >= ignore_late {
            // Schedule already advanced; just skip the callback.
            continue;
        }

        let before = elapsed_us();
        if let Some(cb) = callback.lock().as_mut() {
            cb(TimerTick {
                count,
                elapsed_us: now_us,
                late_by_us,
                prev_callback_us,
            });
        }
        prev_callback_us = elapsed_us() - before;
    }
}
