//! `JobHandle`: the cloneable front-end a caller holds for a running job.
//!
//! Status flows through a `watch` channel (always has a current value);
//! progress flows through a `broadcast` channel fed by an mpsc forwarding
//! task, so every progress update reaches every subscriber in order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch, Notify};

use crate::domain::job::{JobId, JobProgress, JobStatus};

/// Cooperative pause/cancel signalling checked at batch boundaries. Never
/// preempts a running task; the handler must call `check()`.
#[derive(Clone)]
pub struct JobControl {
    cancelled: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
}

impl JobControl {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Called at every batch boundary. Blocks while paused; returns
    /// `Err(Interrupt::Cancelled)` immediately or upon resume if cancelled.
    pub async fn check(&self) -> Result<(), Interrupt> {
        if self.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        while self.is_paused() {
            self.notify.notified().await;
            if self.is_cancelled() {
                return Err(Interrupt::Cancelled);
            }
        }
        Ok(())
    }
}

impl Default for JobControl {
    fn default() -> Self {
        Self::new()
    }
}

pub struct JobHandleInner {
    pub id: JobId,
    pub status_tx: watch::Sender<JobStatus>,
    pub progress_tx: broadcast::Sender<JobProgress>,
    pub control: JobControl,
}

#[derive(Clone)]
pub struct JobHandle {
    inner: Arc<JobHandleInner>,
}

impl JobHandle {
    pub fn new(id: JobId, initial_status: JobStatus, progress_buffer: usize) -> (Self, mpsc::UnboundedSender<JobProgress>) {
        let (status_tx, _) = watch::channel(initial_status);
        let (progress_tx, _) = broadcast::channel(progress_buffer);
        let (forward_tx, mut forward_rx) = mpsc::unbounded_channel::<JobProgress>();

        let broadcast_tx = progress_tx.clone();
        tokio::spawn(async move {
            while let Some(update) = forward_rx.recv().await {
                let _ = broadcast_tx.send(update);
            }
        });

        let handle = Self {
            inner: Arc::new(JobHandleInner {
                id,
                status_tx,
                progress_tx,
                control: JobControl::new(),
            }),
        };
        (handle, forward_tx)
    }

    pub fn id(&self) -> JobId {
        self.inner.id
    }

    pub fn status(&self) -> JobStatus {
        *self.inner.status_tx.borrow()
    }

    pub fn set_status(&self, status: JobStatus) {
        let _ = self.inner.status_tx.send(status);
    }

    pub fn subscribe_status(&self) -> watch::Receiver<JobStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<JobProgress> {
        self.inner.progress_tx.subscribe()
    }

    pub fn control(&self) -> JobControl {
        self.inner.control.clone()
    }

    pub fn pause(&self) {
        self.inner.control.pause();
    }

    pub fn resume(&self) {
        self.inner.control.resume();
    }

    pub fn cancel(&self) {
        self.inner.control.cancel();
    }

    /// Wait until the job reaches a terminal status.
    pub async fn wait(&self) -> JobStatus {
        let mut rx = self.subscribe_status();
        loop {
            if rx.borrow().is_terminal() {
                return *rx.borrow();
            }
            if rx.changed().await.is_err() {
                return self.status();
            }
        }
    }
}
