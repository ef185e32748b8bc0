//! Fixed-period tick loop with cooperative shutdown.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Drives a tick closure every `period` until it breaks, the shutdown flag is
/// raised, or `max_ticks` is reached.
#[derive(Debug, Clone)]
pub struct Scheduler {
    period: Duration,
    shutdown: Arc<AtomicBool>,
    max_ticks: Option<u64>,
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        Scheduler {
            period,
            shutdown: Arc::new(AtomicBool::new(false)),
            max_ticks: None,
        }
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Flag that stops the loop before the next tick once set.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Returns the number of ticks run.
    pub fn run<F>(&self, mut tick: F) -> u64
    where
        F: FnMut(u64) -> ControlFlow<()>,
    {
        let mut ticks = 0;
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            if self.max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }

            let started = Instant::now();
            ticks += 1;
            if tick(ticks).is_break() {
                break;
            }

            // Sleep in short slices so a shutdown request is seen promptly.
            let deadline = started + self.period;
            while !self.shutdown.load(Ordering::SeqCst) {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                thread::sleep((deadline - now).min(Duration::from_millis(100)));
            }
        }
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_max_ticks() {
        let scheduler = Scheduler::new(Duration::ZERO).with_max_ticks(Some(3));
        let mut seen = Vec::new();
        let ran = scheduler.run(|n| {
            seen.push(n);
            ControlFlow::Continue(())
        });
        assert_eq!(ran, 3);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn tick_can_break() {
        let scheduler = Scheduler::new(Duration::ZERO);
        let ran = scheduler.run(|n| {
            if n == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(ran, 2);
    }

    #[test]
    fn shutdown_flag_stops_loop() {
        let scheduler = Scheduler::new(Duration::from_secs(5));
        let flag = scheduler.shutdown_handle();
        let ran = scheduler.run(|_| {
            flag.store(true, Ordering::SeqCst);
            ControlFlow::Continue(())
        });
        assert_eq!(ran, 1);
    }

    #[test]
    fn preset_shutdown_runs_nothing() {
        let scheduler = Scheduler::new(Duration::ZERO);
        scheduler.shutdown_handle().store(true, Ordering::SeqCst);
        assert_eq!(scheduler.run(|_| ControlFlow::Continue(())), 0);
    }
}
