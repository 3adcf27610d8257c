//! Payment gateway seam and the mock processor used in place of a real one

use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Money, PaymentMethod, PaymentStatus};

pub type GatewayFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Result of a charge attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Approved {
        transaction_id: String,
        status: PaymentStatus,
    },
    Declined {
        reason: String,
    },
}

/// Abstraction over a payment processor
pub trait PaymentGateway: Send + Sync {
    /// Charge `amount` to the given instrument
    fn charge(&self, amount: Money, method: &PaymentMethod) -> GatewayFuture<ChargeOutcome>;

    /// Refund a previous charge. Returns the refund reference.
    fn refund(&self, transaction_id: &str, amount: Money) -> GatewayFuture<Result<String, String>>;
}

/// Simulated processor with fixed latency and an optional decline rate
#[derive(Debug)]
pub struct MockPaymentGateway {
    latency: Duration,
    decline_rate: f64,
    fail_refunds: bool,
    charges: Arc<AtomicU64>,
    refunds: Arc<AtomicU64>,
}

impl MockPaymentGateway {
    pub fn new(latency: Duration, decline_rate: f64) -> Self {
        Self {
            latency,
            decline_rate: decline_rate.clamp(0.0, 1.0),
            fail_refunds: false,
            charges: Arc::new(AtomicU64::new(0)),
            refunds: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Zero latency, never declines
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, 0.0)
    }

    /// Every refund attempt fails
    pub fn with_failing_refunds(mut self) -> Self {
        self.fail_refunds = true;
        self
    }

    /// Number of charge attempts seen
    pub fn charges(&self) -> u64 {
        self.charges.load(Ordering::SeqCst)
    }

    /// Number of refund attempts seen
    pub fn refunds(&self) -> u64 {
        self.refunds.load(Ordering::SeqCst)
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), 0.0)
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn charge(&self, amount: Money, method: &PaymentMethod) -> GatewayFuture<ChargeOutcome> {
        let latency = self.latency;
        let charges = Arc::clone(&self.charges);
        // Drawn here: the thread-local rng cannot live inside a Send future.
        let declined = self.decline_rate > 0.0 && rand::thread_rng().gen_bool(self.decline_rate);
        let method = method.method.clone();

        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            charges.fetch_add(1, Ordering::SeqCst);

            if declined {
                warn!(amount = amount.cents(), method = %method, "Mock payment declined");
                return ChargeOutcome::Declined {
                    reason: "Card declined".to_string(),
                };
            }

            let transaction_id = format!("txn_{}", Uuid::new_v4().simple());
            info!(
                amount = amount.cents(),
                method = %method,
                transaction_id = %transaction_id,
                "Mock payment processed"
            );
            ChargeOutcome::Approved {
                transaction_id,
                status: PaymentStatus::Completed,
            }
        })
    }

    fn refund(&self, transaction_id: &str, amount: Money) -> GatewayFuture<Result<String, String>> {
        let latency = self.latency;
        let refunds = Arc::clone(&self.refunds);
        let fail = self.fail_refunds;
        let transaction_id = transaction_id.to_string();

        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            refunds.fetch_add(1, Ordering::SeqCst);

            if fail {
                return Err(format!("refund rejected for {}", transaction_id));
            }

            let refund_id = format!("refund_{}", Uuid::new_v4().simple());
            info!(
                transaction_id = %transaction_id,
                refund_id = %refund_id,
                amount = amount.cents(),
                "Mock refund processed"
            );
            Ok(refund_id)
        })
    }
}
