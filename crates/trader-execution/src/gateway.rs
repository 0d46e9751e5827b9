//! 주문 게이트웨이.
//!
//! 엔진이 사용하는 세 가지 주문 동작(진입, 조회, 청산)을 거래소 주문으로 변환합니다.
//!
//! - 진입: 항상 GTC 지정가. SHORT는 파생상품 거래소에서만 허용
//! - 청산: 항상 시장가. 파생상품 거래소에서는 reduce-only
//! - LONG → 매수 진입 / 매도 청산, SHORT → 매도 진입 / 매수 청산

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info};
use trader_core::{OrderExecutionProvider, OrderRequest, OrderStatusInfo, ProviderError, Side};

use crate::error::ExecutionError;
use crate::position::PositionSide;
use crate::precision::PrecisionAdapter;

/// 단일 심볼 주문 게이트웨이.
#[derive(Clone)]
pub struct OrderGateway {
    provider: Arc<dyn OrderExecutionProvider>,
    precision: PrecisionAdapter,
    symbol: String,
    is_derivatives: bool,
}

impl OrderGateway {
    /// 새 게이트웨이 생성.
    pub fn new(
        provider: Arc<dyn OrderExecutionProvider>,
        symbol: impl Into<String>,
        is_derivatives: bool,
    ) -> Self {
        let symbol = symbol.into();
        Self {
            precision: PrecisionAdapter::new(Arc::clone(&provider), symbol.clone()),
            provider,
            symbol,
            is_derivatives,
        }
    }

    /// 거래 심볼.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// 파생상품 거래소 여부.
    pub fn is_derivatives(&self) -> bool {
        self.is_derivatives
    }

    /// 거래소 이름.
    pub fn exchange_name(&self) -> &str {
        self.provider.exchange_name()
    }

    /// 정밀도 변환기.
    pub fn precision(&self) -> &PrecisionAdapter {
        &self.precision
    }

    /// 진입 주문 방향. 현물 거래소의 SHORT는 에러.
    pub fn entry_side(&self, side: PositionSide) -> Result<Side, ExecutionError> {
        if side == PositionSide::Short && !self.is_derivatives {
            return Err(ExecutionError::ShortNotAllowed);
        }
        Ok(side.entry_side())
    }

    /// 진입 지정가 주문 제출. 가격/수량은 이미 정밀도 보정된 값이어야 합니다.
    ///
    /// `client_order_id`는 거래소 주문과 포지션을 연결하는 식별자입니다.
    ///
    /// # Returns
    /// 거래소 주문번호
    pub async fn place_entry(
        &self,
        side: PositionSide,
        quantity: Decimal,
        price: Decimal,
        client_order_id: &str,
    ) -> Result<String, ExecutionError> {
        let order_side = self.entry_side(side)?;
        let request = OrderRequest::limit(&self.symbol, order_side, quantity, price)
            .with_client_order_id(client_order_id);

        let response = self.provider.place_order(&request).await?;
        info!(
            "[{}] 진입 주문 접수: {} {} {} @ {} (id={})",
            self.exchange_name(),
            self.symbol,
            order_side,
            quantity,
            price,
            response.order_no
        );
        Ok(response.order_no)
    }

    /// 주문 상태 조회.
    pub async fn query_order(&self, order_id: &str) -> Result<OrderStatusInfo, ProviderError> {
        self.provider.fetch_order(order_id, &self.symbol).await
    }

    /// 청산 시장가 주문 제출.
    ///
    /// 수량은 정밀도 변환기를 거쳐 제출되며, 파생상품 거래소에서는 reduce-only가 설정됩니다.
    ///
    /// # Returns
    /// 거래소가 보고한 평균 체결가 (없으면 None)
    pub async fn place_exit(
        &self,
        side: PositionSide,
        quantity: Decimal,
    ) -> Result<Option<Decimal>, ProviderError> {
        let quantity = self.precision.round_quantity(quantity);
        let request = OrderRequest::market(&self.symbol, side.exit_side(), quantity)
            .with_reduce_only(self.is_derivatives);

        let response = self.provider.place_order(&request).await?;
        debug!(
            "[{}] 청산 주문 체결: {} (avg={:?})",
            self.exchange_name(),
            response.order_no,
            response.avg_fill_price
        );
        Ok(response.avg_fill_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use trader_core::{OrderResponse, OrderStatusType, OrderType, TimeInForce};

    /// 제출된 주문을 기록하는 테스트용 Provider.
    #[derive(Default)]
    struct RecordingProvider {
        requests: Mutex<Vec<OrderRequest>>,
    }

    #[async_trait]
    impl OrderExecutionProvider for RecordingProvider {
        async fn place_order(
            &self,
            request: &OrderRequest,
        ) -> Result<OrderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(OrderResponse {
                order_no: "REC-1".to_string(),
                order_time: "000000".to_string(),
                avg_fill_price: None,
            })
        }

        async fn fetch_order(
            &self,
            order_id: &str,
            _ticker: &str,
        ) -> Result<OrderStatusInfo, ProviderError> {
            Ok(OrderStatusInfo {
                order_no: order_id.to_string(),
                status: OrderStatusType::Open,
                avg_fill_price: None,
                price: None,
                filled_quantity: Decimal::ZERO,
            })
        }

        fn exchange_name(&self) -> &str {
            "Recording"
        }
    }

    fn make_gateway(is_derivatives: bool) -> (Arc<RecordingProvider>, OrderGateway) {
        let provider = Arc::new(RecordingProvider::default());
        let gateway = OrderGateway::new(provider.clone(), "BTC/USDT", is_derivatives);
        (provider, gateway)
    }

    #[tokio::test]
    async fn test_long_entry_is_gtc_limit_buy() {
        let (provider, gateway) = make_gateway(false);
        let id = gateway
            .place_entry(PositionSide::Long, dec!(0.001), dec!(50000), "pos-1")
            .await
            .unwrap();
        assert_eq!(id, "REC-1");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].side, Side::Buy);
        assert_eq!(requests[0].order_type, OrderType::Limit);
        assert_eq!(requests[0].time_in_force, TimeInForce::GTC);
        assert_eq!(requests[0].price, Some(dec!(50000)));
        assert_eq!(requests[0].client_order_id.as_deref(), Some("pos-1"));
    }

    #[tokio::test]
    async fn test_short_entry_rejected_on_spot() {
        let (provider, gateway) = make_gateway(false);
        let result = gateway
            .place_entry(PositionSide::Short, dec!(0.001), dec!(50000), "pos-1")
            .await;
        assert_eq!(result, Err(ExecutionError::ShortNotAllowed));
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_short_entry_on_derivatives_sells() {
        let (provider, gateway) = make_gateway(true);
        gateway
            .place_entry(PositionSide::Short, dec!(0.001), dec!(50000), "pos-1")
            .await
            .unwrap();
        assert_eq!(provider.requests.lock().unwrap()[0].side, Side::Sell);
    }

    #[tokio::test]
    async fn test_exit_reduce_only_by_venue() {
        let (provider, gateway) = make_gateway(true);
        gateway.place_exit(PositionSide::Short, dec!(1)).await.unwrap();
        {
            let requests = provider.requests.lock().unwrap();
            assert_eq!(requests[0].side, Side::Buy);
            assert_eq!(requests[0].order_type, OrderType::Market);
            assert!(requests[0].reduce_only);
        }

        let (provider, gateway) = make_gateway(false);
        gateway.place_exit(PositionSide::Long, dec!(1)).await.unwrap();
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].side, Side::Sell);
        assert!(!requests[0].reduce_only);
    }

    #[tokio::test]
    async fn test_exit_quantity_is_rounded() {
        let (provider, gateway) = make_gateway(true);
        gateway
            .place_exit(PositionSide::Long, dec!(0.12345678))
            .await
            .unwrap();
        // 정밀도 API 미지원 → 기본 6자리 내림
        assert_eq!(provider.requests.lock().unwrap()[0].quantity, dec!(0.123456));
    }
}
