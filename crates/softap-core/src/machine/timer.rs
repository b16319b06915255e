// ── Auto-disable timer ──
//
// One pending alarm at a time. Each arm bumps the generation; a fire
// message whose generation no longer matches is ignored, so cancelling
// never races with a wake-up that is already queued.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Message;

#[derive(Default)]
pub(crate) struct AutoDisableTimer {
    generation: u64,
    pending: Option<CancellationToken>,
    deadline: Option<DateTime<Utc>>,
}

impl AutoDisableTimer {
    /// Replace any pending alarm with one firing after `after`.
    pub(crate) fn arm(
        &mut self,
        after: Duration,
        tx: &mpsc::UnboundedSender<Message>,
        parent: &CancellationToken,
    ) {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let token = parent.child_token();
        self.deadline = TimeDelta::from_std(after)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));
        debug!(secs = after.as_secs(), "auto-disable armed");

        let tx = tx.clone();
        let cancelled = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancelled.cancelled() => {}
                () = tokio::time::sleep(after) => {
                    let _ = tx.send(Message::AutoDisableFired { generation });
                }
            }
        });
        self.pending = Some(token);
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
            debug!("auto-disable cancelled");
        }
        self.deadline = None;
    }

    /// Consume a fire message. Returns `false` for a stale one.
    pub(crate) fn take_fired(&mut self, generation: u64) -> bool {
        if self.pending.is_none() || generation != self.generation {
            return false;
        }
        self.pending = None;
        self.deadline = None;
        true
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let root = CancellationToken::new();
        let mut timer = AutoDisableTimer::default();
        timer.arm(Duration::from_secs(60), &tx, &root);
        assert!(timer.is_armed());
        assert!(timer.deadline().is_some());

        tokio::time::sleep(Duration::from_secs(61)).await;
        let Some(Message::AutoDisableFired { generation }) = rx.recv().await else {
            panic!("expected a fire message");
        };
        assert!(timer.take_fired(generation));
        assert!(!timer.is_armed());
        assert!(!timer.take_fired(generation));
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_makes_earlier_fire_stale() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let root = CancellationToken::new();
        let mut timer = AutoDisableTimer::default();
        timer.arm(Duration::from_secs(10), &tx, &root);
        timer.arm(Duration::from_secs(20), &tx, &root);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let Some(Message::AutoDisableFired { generation }) = rx.recv().await else {
            panic!("expected a fire message");
        };
        assert!(timer.take_fired(generation));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let root = CancellationToken::new();
        let mut timer = AutoDisableTimer::default();
        timer.arm(Duration::from_secs(10), &tx, &root);
        timer.cancel();
        assert_eq!(timer.deadline(), None);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
    }
}
