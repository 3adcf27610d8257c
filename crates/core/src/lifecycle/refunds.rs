//! Refund queue
//!
//! Refunds run on a single background worker so a slow or failing gateway
//! never holds up the cancellation that triggered them.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::models::Money;
use crate::payment::PaymentGateway;
use crate::storage::{BookingRepository, SharedStore};

/// Why a charge is being returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    /// The booking was cancelled; its payment record is updated afterwards
    Cancellation,
    /// The charge succeeded but the booking never committed
    Compensation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundJob {
    pub booking_id: Uuid,
    pub transaction_id: String,
    pub amount: Money,
    pub reason: RefundReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundStats {
    pub completed: u64,
    pub failed: u64,
    /// Jobs rejected because the queue was full or closed
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    completed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

enum RefundCommand {
    Refund(RefundJob),
    Flush(oneshot::Sender<()>),
}

/// Handle for submitting refunds to the worker
#[derive(Clone)]
pub struct RefundQueue {
    tx: mpsc::Sender<RefundCommand>,
    counters: Arc<Counters>,
}

impl RefundQueue {
    /// Start the worker. It stops once every queue handle is dropped.
    pub fn spawn<S>(
        store: SharedStore<S>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>)
    where
        S: BookingRepository + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(Counters::default());
        let worker = RefundWorker {
            store,
            gateway,
            clock,
            counters: Arc::clone(&counters),
        };
        let handle = tokio::spawn(worker.run(rx));
        (Self { tx, counters }, handle)
    }

    /// Queue a refund without waiting. Returns false if it could not be queued.
    pub fn enqueue(&self, job: RefundJob) -> bool {
        let booking_id = job.booking_id;
        match self.tx.try_send(RefundCommand::Refund(job)) {
            Ok(()) => {
                debug!(booking_id = %booking_id, "Refund queued");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                error!(booking_id = %booking_id, "Refund queue full, refund dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                error!(booking_id = %booking_id, "Refund worker stopped, refund dropped");
                false
            }
        }
    }

    /// Wait until every job queued before this call has been processed
    pub async fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(RefundCommand::Flush(ack_tx))
            .await
            .map_err(|_| Error::Internal("refund worker stopped".into()))?;
        ack_rx
            .await
            .map_err(|_| Error::Internal("refund worker stopped".into()))
    }

    pub fn stats(&self) -> RefundStats {
        RefundStats {
            completed: self.counters.completed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            dropped: self.counters.dropped.load(Ordering::SeqCst),
        }
    }
}

struct RefundWorker<S> {
    store: SharedStore<S>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    counters: Arc<Counters>,
}

impl<S: BookingRepository> RefundWorker<S> {
    async fn run(self, mut rx: mpsc::Receiver<RefundCommand>) {
        info!("Refund worker started");
        while let Some(command) = rx.recv().await {
            match command {
                RefundCommand::Refund(job) => self.process(job).await,
                RefundCommand::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        info!("Refund worker stopped");
    }

    async fn process(&self, job: RefundJob) {
        info!(
            booking_id = %job.booking_id,
            transaction_id = %job.transaction_id,
            amount = job.amount.cents(),
            reason = ?job.reason,
            "Processing refund"
        );

        let refund_id = match self.gateway.refund(&job.transaction_id, job.amount).await {
            Ok(id) => id,
            Err(reason) => {
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
                error!(
                    booking_id = %job.booking_id,
                    transaction_id = %job.transaction_id,
                    reason = %reason,
                    "Refund rejected by gateway"
                );
                return;
            }
        };

        if job.reason == RefundReason::Compensation {
            self.counters.completed.fetch_add(1, Ordering::SeqCst);
            info!(booking_id = %job.booking_id, refund_id = %refund_id, "Uncommitted charge refunded");
            return;
        }

        let now = self.clock.now();
        match self.store.with(|db| db.record_refund(job.booking_id, now)) {
            Ok(true) => {
                self.counters.completed.fetch_add(1, Ordering::SeqCst);
                info!(booking_id = %job.booking_id, refund_id = %refund_id, "Refund recorded");
            }
            Ok(false) => {
                self.counters.completed.fetch_add(1, Ordering::SeqCst);
                warn!(
                    booking_id = %job.booking_id,
                    refund_id = %refund_id,
                    "Refund issued but payment was not in a refundable state"
                );
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
                error!(
                    booking_id = %job.booking_id,
                    refund_id = %refund_id,
                    error = %e,
                    "Refund issued but could not be recorded"
                );
            }
        }
    }
}
