//! 재시도 래퍼 Provider.
//!
//! 주문 조회처럼 멱등한 요청에만 제한된 재시도를 적용합니다.
//! 주문 제출은 중복 주문 위험이 있으므로 재시도하지 않고 그대로 전달합니다.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use trader_core::{
    MarketPrecision, OrderExecutionProvider, OrderRequest, OrderResponse, OrderStatusInfo,
    ProviderError,
};

use crate::retry::{with_retry, RetryConfig};

/// 조회 요청에 재시도를 적용하는 Provider 래퍼.
pub struct RetryingProvider {
    inner: Arc<dyn OrderExecutionProvider>,
    config: RetryConfig,
}

impl RetryingProvider {
    /// 새 래퍼 생성.
    pub fn new(inner: Arc<dyn OrderExecutionProvider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl OrderExecutionProvider for RetryingProvider {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderResponse, ProviderError> {
        self.inner.place_order(request).await
    }

    async fn fetch_order(
        &self,
        order_id: &str,
        ticker: &str,
    ) -> Result<OrderStatusInfo, ProviderError> {
        with_retry(&self.config, || self.inner.fetch_order(order_id, ticker)).await
    }

    fn price_to_precision(&self, ticker: &str, price: Decimal) -> Result<Decimal, ProviderError> {
        self.inner.price_to_precision(ticker, price)
    }

    fn amount_to_precision(
        &self,
        ticker: &str,
        amount: Decimal,
    ) -> Result<Decimal, ProviderError> {
        self.inner.amount_to_precision(ticker, amount)
    }

    fn market_precision(&self, ticker: &str) -> Result<MarketPrecision, ProviderError> {
        self.inner.market_precision(ticker)
    }

    fn exchange_name(&self) -> &str {
        self.inner.exchange_name()
    }
}
