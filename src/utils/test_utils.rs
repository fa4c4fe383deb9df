//! Test utilities shared by the service unit tests

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::errors::PriceError;
use crate::services::exchange::Exchange;
use crate::services::price_provider::{PriceProvider, PriceQuote};

/// Scripted price provider that counts how often it is called
///
/// Responses are served in order; the last one repeats once the script runs out.
pub struct ScriptedProvider {
    exchange: Exchange,
    responses: Mutex<VecDeque<Result<BigDecimal, PriceError>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new(exchange: Exchange, responses: Vec<Result<BigDecimal, PriceError>>) -> Self {
        Self {
            exchange,
            responses: Mutex::new(responses.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_prices(exchange: Exchange, prices: &[i64]) -> Self {
        Self::new(
            exchange,
            prices.iter().map(|&p| Ok(BigDecimal::from(p))).collect(),
        )
    }

    /// Handle to the call counter that stays valid after the provider is boxed
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl PriceProvider for ScriptedProvider {
    fn exchange(&self) -> Exchange {
        self.exchange
    }

    async fn fetch_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let response = {
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.pop_front()
            } else {
                responses.front().cloned()
            }
        };

        match response {
            Some(Ok(price)) => Ok(PriceQuote::new(self.exchange, symbol, price)),
            Some(Err(e)) => Err(e),
            None => Err(PriceError::Internal("no scripted response".to_string())),
        }
    }
}
