//! Capture scheduler.
//!
//! Free-running tick loop, armed and disarmed by the engine's
//! `scanning` watch. The scheduler only reads that flag; it never
//! touches engine state directly. While armed it captures a still on
//! every tick and delivers it as a frame-ready event — the engine's
//! single-flight guard decides whether the frame is used, so ticks are
//! never skipped or coalesced here.

use crate::camera::FrameSource;
use crate::engine::EngineHandle;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub async fn run_scheduler<S: FrameSource>(
    source: S,
    engine: EngineHandle,
    period: Duration,
    mut armed: watch::Receiver<bool>,
    cancel: CancellationToken,
) {
    loop {
        // Parked until armed.
        while !*armed.borrow() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("capture scheduler shutting down");
                    return;
                }
                changed = armed.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }

        // A fresh interval per arming: re-arming restarts the period
        // phase, it never resumes the old one. First tick lands one
        // full period after arming.
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        tracing::debug!(period_ms = period.as_millis() as u64, "capture scheduler armed");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("capture scheduler shutting down");
                    return;
                }
                changed = armed.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if !*armed.borrow() {
                        tracing::debug!("capture scheduler disarmed");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match source.capture().await {
                        Ok(image) => {
                            if engine.frame_ready(image).await.is_err() {
                                tracing::warn!("engine gone, capture scheduler exiting");
                                return;
                            }
                        }
                        // No retry or backoff: cadence is unconditional
                        // while armed.
                        Err(err) => {
                            tracing::warn!(error = %err, "frame capture failed, keeping cadence");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CaptureError;
    use crate::engine::spawn_engine;
    use crate::testutil::{FakeDirectory, FakeMatcher};
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingSource {
        captures: Arc<AtomicUsize>,
    }

    impl FrameSource for CountingSource {
        fn capture(&self) -> impl Future<Output = Result<Vec<u8>, CaptureError>> + Send {
            self.captures.fetch_add(1, Ordering::SeqCst);
            async { Ok(vec![0u8]) }
        }
    }

    fn harness() -> (EngineHandle, watch::Receiver<bool>) {
        let matcher = Arc::new(FakeMatcher::scripted(vec![]));
        let directory = Arc::new(FakeDirectory::default());
        spawn_engine(matcher, directory)
    }

    #[tokio::test]
    async fn test_no_ticks_while_disarmed() {
        let (engine, armed) = harness();
        let captures = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            captures: captures.clone(),
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_scheduler(
            source,
            engine,
            Duration::from_millis(10),
            armed,
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(captures.load(Ordering::SeqCst), 0);
        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_ticks_while_armed_and_stop_on_disarm() {
        let (engine, armed) = harness();
        let captures = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            captures: captures.clone(),
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_scheduler(
            source,
            engine.clone(),
            Duration::from_millis(10),
            armed,
            cancel.clone(),
        ));

        engine.start_scanning().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let while_armed = captures.load(Ordering::SeqCst);
        assert!(while_armed >= 3, "expected ticks while armed, got {while_armed}");

        engine.stop_scanning().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let at_disarm = captures.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(
            captures.load(Ordering::SeqCst),
            at_disarm,
            "no ticks may fire after disarm"
        );

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_first_tick_waits_a_full_period() {
        let (engine, armed) = harness();
        let captures = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            captures: captures.clone(),
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_scheduler(
            source,
            engine.clone(),
            Duration::from_millis(100),
            armed,
            cancel.clone(),
        ));

        engine.start_scanning().await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(
            captures.load(Ordering::SeqCst),
            0,
            "tick must not fire before one full period"
        );

        cancel.cancel();
        task.await.unwrap();
    }
}
