//! Resilience wrapper around a broker gateway.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use tradekit_core::error::BrokerError;
use tradekit_core::traits::{
    BrokerGateway, BrokerPosition, OptionContract, OrderAck, OrderUpdate, Quote,
};
use tradekit_core::types::Order;

use crate::breaker::CircuitBreaker;
use crate::retry::RetryPolicy;

/// Wraps a gateway with a per-call deadline, bounded retry with backoff,
/// and a circuit breaker shared across all call types.
///
/// Order submission is the exception to retrying: a timed-out submit may
/// have reached the broker, so it surfaces [`BrokerError::Timeout`]
/// immediately and leaves resolution to reconciliation.
pub struct ResilientGateway {
    inner: Arc<dyn BrokerGateway>,
    policy: RetryPolicy,
    breaker: CircuitBreaker,
    call_timeout: Duration,
}

impl ResilientGateway {
    pub fn new(
        inner: Arc<dyn BrokerGateway>,
        policy: RetryPolicy,
        breaker: CircuitBreaker,
        call_timeout: Duration,
    ) -> Self {
        Self {
            inner,
            policy,
            breaker,
            call_timeout,
        }
    }

    fn check_breaker(&self) -> Result<(), BrokerError> {
        if self.breaker.is_allowed() {
            Ok(())
        } else {
            Err(BrokerError::Unavailable {
                cooldown_secs: self.breaker.remaining_cooldown().as_secs(),
            })
        }
    }

    async fn observe<T>(&self, result: Result<T, BrokerError>) -> Result<T, BrokerError> {
        match &result {
            Ok(_) => self.breaker.record_success(),
            // Bad credentials poison every subsequent call, so open at once
            Err(BrokerError::Auth(_)) => self.breaker.trip(),
            // Only transient faults indicate broker health; a rejection or
            // malformed request is the caller's problem, not an outage
            Err(err) if err.is_transient() => self.breaker.record_failure(),
            Err(_) => {}
        }
        result
    }

    /// Run one attempt under the call deadline.
    async fn attempt<T, F, Fut>(&self, f: F) -> Result<T, BrokerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, BrokerError>>,
    {
        match tokio::time::timeout(self.call_timeout, f()).await {
            Ok(result) => result,
            Err(_) => Err(BrokerError::Timeout),
        }
    }

    /// Retrying call for idempotent operations.
    async fn call<T, F, Fut>(&self, op: &str, f: F) -> Result<T, BrokerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, BrokerError>>,
    {
        self.check_breaker()?;

        let mut attempt = 0;
        loop {
            let result = self.observe(self.attempt(&f).await).await;
            match result {
                Ok(value) => return Ok(value),
                Err(err) => match self.policy.delay_for(attempt, &err) {
                    Some(delay) => {
                        warn!(op, attempt, error = %err, "broker call failed, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        self.check_breaker()?;
                    }
                    None => return Err(err),
                },
            }
        }
    }
}

#[async_trait]
impl BrokerGateway for ResilientGateway {
    async fn get_quote(&self, symbol: &str) -> Result<Quote, BrokerError> {
        self.call("get_quote", || self.inner.get_quote(symbol)).await
    }

    async fn get_options_chain(&self, symbol: &str) -> Result<Vec<OptionContract>, BrokerError> {
        self.call("get_options_chain", || self.inner.get_options_chain(symbol))
            .await
    }

    async fn submit_order(&self, order: &Order) -> Result<OrderAck, BrokerError> {
        self.check_breaker()?;

        let mut attempt = 0;
        loop {
            let result = self
                .observe(self.attempt(|| self.inner.submit_order(order)).await)
                .await;
            match result {
                Ok(ack) => return Ok(ack),
                // A timed-out submit may have been accepted; never resend
                Err(BrokerError::Timeout) => return Err(BrokerError::Timeout),
                Err(err) => match self.policy.delay_for(attempt, &err) {
                    Some(delay) => {
                        warn!(attempt, error = %err, "order submission failed, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        self.check_breaker()?;
                    }
                    None => return Err(err),
                },
            }
        }
    }

    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), BrokerError> {
        self.call("cancel_order", || self.inner.cancel_order(broker_order_id))
            .await
    }

    async fn order_status(&self, broker_order_id: &str) -> Result<OrderUpdate, BrokerError> {
        self.call("order_status", || self.inner.order_status(broker_order_id))
            .await
    }

    async fn lookup_order(
        &self,
        client_order_id: &str,
    ) -> Result<Option<(OrderAck, OrderUpdate)>, BrokerError> {
        self.call("lookup_order", || self.inner.lookup_order(client_order_id))
            .await
    }

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        self.call("get_positions", || self.inner.get_positions()).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
