// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session outbound FIFO with single-in-flight draining.
//!
//! Jobs are consumed in submission order. A failed send puts the job back at
//! the head and stops the drain, so nothing behind it overtakes it.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use switchboard_core::SwitchboardError;
use switchboard_core::types::{OutboundContent, SendReceipt};

/// A pending send.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundJob {
    /// Normalized recipient address.
    pub recipient: String,
    pub content: OutboundContent,
    pub enqueued_at: DateTime<Utc>,
}

impl OutboundJob {
    pub fn new(recipient: impl Into<String>, content: OutboundContent) -> Self {
        Self {
            recipient: recipient.into(),
            content,
            enqueued_at: Utc::now(),
        }
    }
}

/// Where drained jobs go.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    /// Whether sends may be attempted right now.
    fn is_ready(&self) -> bool;

    async fn dispatch(&self, job: &OutboundJob) -> Result<SendReceipt, SwitchboardError>;
}

/// How a drain call ended.
#[derive(Debug)]
pub enum DrainOutcome {
    /// The queue emptied.
    Drained { sent: usize },
    /// A send failed; the job is back at the head.
    Halted { sent: usize, error: SwitchboardError },
    /// The dispatcher stopped being ready mid-drain.
    NotReady { sent: usize },
    /// Another drain holds the queue.
    AlreadyDraining,
}

impl DrainOutcome {
    pub fn sent(&self) -> usize {
        match self {
            DrainOutcome::Drained { sent }
            | DrainOutcome::Halted { sent, .. }
            | DrainOutcome::NotReady { sent } => *sent,
            DrainOutcome::AlreadyDraining => 0,
        }
    }
}

/// FIFO buffer of [`OutboundJob`]s.
pub struct OutboundQueue {
    jobs: Mutex<VecDeque<OutboundJob>>,
    draining: AtomicBool,
    pacing: Duration,
}

/// Releases the drain flag on drop.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl OutboundQueue {
    /// Creates an empty queue that waits `pacing` between consecutive drained sends.
    pub fn new(pacing: Duration) -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            pacing,
        }
    }

    fn jobs(&self) -> std::sync::MutexGuard<'_, VecDeque<OutboundJob>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends a job and returns its 1-based position.
    pub fn push_back(&self, job: OutboundJob) -> usize {
        let mut jobs = self.jobs();
        jobs.push_back(job);
        jobs.len()
    }

    pub fn push_front(&self, job: OutboundJob) {
        self.jobs().push_front(job);
    }

    pub fn pop_front(&self) -> Option<OutboundJob> {
        self.jobs().pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Empty and not being drained.
    pub fn is_idle(&self) -> bool {
        !self.is_draining() && self.is_empty()
    }

    /// Snapshot of pending jobs, head first.
    pub fn pending(&self) -> Vec<OutboundJob> {
        self.jobs().iter().cloned().collect()
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    fn try_begin_drain(&self) -> Option<DrainGuard<'_>> {
        self.draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| DrainGuard(&self.draining))
    }

    /// Sends queued jobs through `dispatcher` until the queue empties, a send
    /// fails, or the dispatcher stops being ready.
    pub async fn drain(&self, dispatcher: &dyn JobDispatcher) -> DrainOutcome {
        let mut total = 0;
        loop {
            let outcome = match self.try_begin_drain() {
                Some(_guard) => self.drain_locked(dispatcher).await,
                None => return DrainOutcome::AlreadyDraining,
            };
            total += outcome.sent();

            // A job pushed between the last pop and the flag release saw the
            // queue as busy and did not start its own drain.
            let raced = matches!(outcome, DrainOutcome::Drained { .. })
                && !self.is_empty()
                && dispatcher.is_ready();
            if !raced {
                return match outcome {
                    DrainOutcome::Drained { .. } => DrainOutcome::Drained { sent: total },
                    DrainOutcome::Halted { error, .. } => DrainOutcome::Halted { sent: total, error },
                    DrainOutcome::NotReady { .. } => DrainOutcome::NotReady { sent: total },
                    DrainOutcome::AlreadyDraining => DrainOutcome::AlreadyDraining,
                };
            }
        }
    }

    async fn drain_locked(&self, dispatcher: &dyn JobDispatcher) -> DrainOutcome {
        let mut sent = 0;
        loop {
            if !dispatcher.is_ready() {
                return DrainOutcome::NotReady { sent };
            }
            let Some(job) = self.pop_front() else {
                return DrainOutcome::Drained { sent };
            };

            match dispatcher.dispatch(&job).await {
                Ok(receipt) => {
                    sent += 1;
                    debug!(
                        recipient = %job.recipient,
                        message_id = %receipt.message_id,
                        "queued message delivered"
                    );
                    if !self.is_empty() {
                        tokio::time::sleep(self.pacing).await;
                    }
                }
                Err(error) => {
                    warn!(
                        recipient = %job.recipient,
                        error = %error,
                        remaining = self.len() + 1,
                        "queued send failed, draining halted"
                    );
                    self.push_front(job);
                    return DrainOutcome::Halted { sent, error };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// Records dispatched recipients; fails the call numbered `fail_on`.
    struct Recorder {
        ready: AtomicBool,
        calls: AtomicUsize,
        fail_on: Option<usize>,
        delivered: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new(fail_on: Option<usize>) -> Self {
            Self {
                ready: AtomicBool::new(true),
                calls: AtomicUsize::new(0),
                fail_on,
                delivered: Mutex::new(Vec::new()),
            }
        }

        fn delivered(&self) -> Vec<String> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobDispatcher for Recorder {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn dispatch(&self, job: &OutboundJob) -> Result<SendReceipt, SwitchboardError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(n) == self.fail_on {
                return Err(SwitchboardError::transport("boom"));
            }
            self.delivered.lock().unwrap().push(job.recipient.clone());
            Ok(SendReceipt {
                message_id: format!("m{n}"),
            })
        }
    }

    fn job(to: &str) -> OutboundJob {
        OutboundJob::new(to, OutboundContent::text("hi"))
    }

    fn recipients(queue: &OutboundQueue) -> Vec<String> {
        queue.pending().into_iter().map(|j| j.recipient).collect()
    }

    #[test]
    fn push_back_reports_position() {
        let queue = OutboundQueue::new(Duration::ZERO);
        assert_eq!(queue.push_back(job("a")), 1);
        assert_eq!(queue.push_back(job("b")), 2);
        assert!(!queue.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn drains_in_fifo_order() {
        let queue = OutboundQueue::new(Duration::from_secs(1));
        for to in ["a", "b", "c"] {
            queue.push_back(job(to));
        }
        let recorder = Recorder::new(None);

        let outcome = queue.drain(&recorder).await;
        assert!(matches!(outcome, DrainOutcome::Drained { sent: 3 }));
        assert_eq!(recorder.delivered(), ["a", "b", "c"]);
        assert!(queue.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_separates_sends() {
        let queue = OutboundQueue::new(Duration::from_secs(1));
        for to in ["a", "b", "c"] {
            queue.push_back(job(to));
        }
        let start = tokio::time::Instant::now();
        queue.drain(&Recorder::new(None)).await;
        // Two gaps between three sends, none after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_job_returns_to_head() {
        let queue = OutboundQueue::new(Duration::ZERO);
        for to in ["a", "b", "c"] {
            queue.push_back(job(to));
        }
        let recorder = Recorder::new(Some(2));

        let outcome = queue.drain(&recorder).await;
        assert!(matches!(outcome, DrainOutcome::Halted { sent: 1, .. }));
        assert_eq!(recorder.delivered(), ["a"]);
        assert_eq!(recipients(&queue), ["b", "c"]);
        assert!(!queue.is_draining());
    }

    #[tokio::test]
    async fn not_ready_leaves_queue_untouched() {
        let queue = OutboundQueue::new(Duration::ZERO);
        queue.push_back(job("a"));
        let recorder = Recorder::new(None);
        recorder.ready.store(false, Ordering::SeqCst);

        let outcome = queue.drain(&recorder).await;
        assert!(matches!(outcome, DrainOutcome::NotReady { sent: 0 }));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_drain_is_rejected_while_first_runs() {
        let queue = Arc::new(OutboundQueue::new(Duration::from_secs(1)));
        queue.push_back(job("a"));
        queue.push_back(job("b"));
        let recorder = Arc::new(Recorder::new(None));

        let first = {
            let queue = queue.clone();
            let recorder = recorder.clone();
            tokio::spawn(async move { queue.drain(recorder.as_ref()).await })
        };
        // Let the first drain reach its pacing sleep.
        tokio::task::yield_now().await;
        assert!(queue.is_draining());
        let second = queue.drain(recorder.as_ref()).await;
        assert!(matches!(second, DrainOutcome::AlreadyDraining));

        let first = first.await.unwrap();
        assert_eq!(first.sent(), 2);
        assert_eq!(recorder.delivered(), ["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn jobs_added_mid_drain_are_delivered() {
        let queue = Arc::new(OutboundQueue::new(Duration::from_secs(1)));
        queue.push_back(job("a"));
        queue.push_back(job("b"));
        let recorder = Arc::new(Recorder::new(None));

        let handle = {
            let queue = queue.clone();
            let recorder = recorder.clone();
            tokio::spawn(async move { queue.drain(recorder.as_ref()).await })
        };
        tokio::task::yield_now().await;
        queue.push_back(job("c"));

        let outcome = handle.await.unwrap();
        assert_eq!(outcome.sent(), 3);
        assert_eq!(recorder.delivered(), ["a", "b", "c"]);
    }
}
