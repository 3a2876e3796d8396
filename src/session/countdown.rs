use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::config::Clock;

/// Owned countdown resource for one capture period
///
/// Ticks are delivered one at a time: the next tick is not scheduled until
/// the previous callback has returned. Cancelling (explicitly or by drop)
/// stops the task after the current callback; `expire` reports true exactly
/// once so the timeout transition cannot fire twice.
pub struct Countdown {
    stop_tx: Option<oneshot::Sender<()>>,
    expired: AtomicBool,
}

impl Countdown {
    /// Start ticking according to `clock`
    ///
    /// `on_tick` returns false to end the countdown.
    pub fn start<F, Fut>(clock: Clock, on_tick: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let period = match clock {
            Clock::Interval(period) => period,
            Clock::Manual => {
                return Self {
                    stop_tx: None,
                    expired: AtomicBool::new(false),
                }
            }
        };

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        if !on_tick().await {
                            break;
                        }
                    }
                }
            }

            debug!("Countdown task finished");
        });

        Self {
            stop_tx: Some(stop_tx),
            expired: AtomicBool::new(false),
        }
    }

    /// Mark the countdown as expired; true only for the first caller
    pub fn expire(&self) -> bool {
        !self.expired.swap(true, Ordering::SeqCst)
    }

    /// Stop scheduling ticks; no-op if already cancelled or expired
    pub fn cancel(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_expire_fires_once() {
        let countdown = Countdown::start(Clock::Manual, || async { true });
        assert!(countdown.expire());
        assert!(!countdown.expire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period_until_cancelled() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();

        let mut countdown = Countdown::start(Clock::Interval(Duration::from_secs(1)), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        countdown.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_can_end_countdown() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();

        let _countdown = Countdown::start(Clock::Interval(Duration::from_secs(1)), move || {
            let counter = counter.clone();
            async move { counter.fetch_add(1, Ordering::SeqCst) + 1 < 2 }
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }
}
