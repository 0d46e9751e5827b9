//! 페이퍼 트레이딩 거래소.
//!
//! 마감 캔들을 입력받아 주문을 가상으로 체결하는 `OrderExecutionProvider` 구현입니다.
//! 실제 거래소 없이 실행 엔진 전체 흐름(진입 → 체결 → 청산)을 재현할 때 사용합니다.
//!
//! # 체결 규칙
//!
//! - 지정가 매수: 캔들 저가가 지정가 이하이면 지정가로 체결
//! - 지정가 매도: 캔들 고가가 지정가 이상이면 지정가로 체결
//! - 시장가: 마지막 종가에 슬리피지를 적용하여 즉시 체결. 청산 판정 캔들의 종가이므로
//!   SL이 터치된 캔들이 손절가 위에서 마감하면 손절 청산이 이익으로 기록될 수 있음.
//!   `report_market_fills = false`이면 응답에 체결가를 싣지 않아, 엔진이 터치된
//!   TP/SL 가격으로 손익을 계산함
//! - 현물 시장(`contract = false`)에서는 `reduce_only` 주문을 거부

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use trader_core::{
    ClosedBar, MarketPrecision, OrderExecutionProvider, OrderRequest, OrderResponse,
    OrderStatusInfo, OrderStatusType, OrderType, ProviderError, Side,
};

/// 페이퍼 거래소 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// 거래소 이름 (로그용)
    pub name: String,
    /// 슬리피지율 (시장가 주문에 적용)
    pub slippage_rate: Decimal,
    /// 가격 소수점 자릿수
    pub price_decimals: u32,
    /// 수량 소수점 자릿수
    pub amount_decimals: u32,
    /// 파생상품 시장 여부 (reduce_only 허용)
    pub contract: bool,
    /// 거래소 정밀도 API 사용 가능 여부 (false면 정밀도 변환 요청이 실패)
    pub precision_api_available: bool,
    /// 시장가 주문 응답에 체결가 포함 여부 (주문 조회에는 항상 포함)
    #[serde(default = "default_true")]
    pub report_market_fills: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            name: "Paper".to_string(),
            slippage_rate: Decimal::ZERO,
            price_decimals: 2,
            amount_decimals: 6,
            contract: false,
            precision_api_available: true,
            report_market_fills: true,
        }
    }
}

impl PaperConfig {
    /// USDT-M 선물 기본 설정.
    pub fn derivatives() -> Self {
        Self {
            name: "PaperFutures".to_string(),
            contract: true,
            amount_decimals: 3,
            ..Default::default()
        }
    }

    /// 슬리피지율 설정.
    pub fn with_slippage(mut self, slippage_rate: Decimal) -> Self {
        self.slippage_rate = slippage_rate;
        self
    }

    /// 시장가 주문 응답의 체결가 보고 여부 설정.
    pub fn with_market_fill_reports(mut self, report: bool) -> Self {
        self.report_market_fills = report;
        self
    }
}

/// 페이퍼 주문 내부 표현.
#[derive(Debug, Clone)]
struct PaperOrder {
    order_no: String,
    ticker: String,
    side: Side,
    order_type: OrderType,
    quantity: Decimal,
    price: Option<Decimal>,
    status: OrderStatusType,
    avg_fill_price: Option<Decimal>,
    filled_quantity: Decimal,
}

impl PaperOrder {
    fn to_status_info(&self) -> OrderStatusInfo {
        OrderStatusInfo {
            order_no: self.order_no.clone(),
            status: self.status,
            avg_fill_price: self.avg_fill_price,
            price: self.price,
            filled_quantity: self.filled_quantity,
        }
    }

    fn fill(&mut self, price: Decimal) {
        self.status = OrderStatusType::Filled;
        self.avg_fill_price = Some(price);
        self.filled_quantity = self.quantity;
    }
}

/// 가변 상태.
#[derive(Debug, Default)]
struct PaperState {
    orders: HashMap<String, PaperOrder>,
    /// 심볼별 마지막 종가
    last_prices: HashMap<String, Decimal>,
    /// 제출된 주문 이력 (제출 순서)
    submitted: Vec<OrderRequest>,
    next_order_id: u64,
    /// 다음 N회 주문 제출을 실패시킴
    failing_places: u32,
    /// 다음 N회 주문 조회를 실패시킴
    failing_fetches: u32,
}

/// 캔들 기반 페이퍼 거래소.
pub struct PaperExchangeProvider {
    config: PaperConfig,
    state: RwLock<PaperState>,
}

impl PaperExchangeProvider {
    /// 새 페이퍼 거래소 생성.
    pub fn new(config: PaperConfig) -> Self {
        Self {
            config,
            state: RwLock::new(PaperState {
                next_order_id: 1,
                ..Default::default()
            }),
        }
    }

    /// 기본 설정(현물)으로 생성.
    pub fn with_defaults() -> Self {
        Self::new(PaperConfig::default())
    }

    /// 설정 조회.
    pub fn config(&self) -> &PaperConfig {
        &self.config
    }

    /// 마감 캔들 반영.
    ///
    /// 마지막 종가를 갱신하고, 캔들 범위에 닿은 미체결 지정가 주문을 체결합니다.
    /// 체결된 주문 수를 반환합니다.
    pub async fn on_bar(&self, ticker: &str, bar: &ClosedBar) -> usize {
        let mut state = self.state.write().await;
        state.last_prices.insert(ticker.to_string(), bar.close);

        let mut filled = 0;
        for order in state.orders.values_mut() {
            if order.ticker != ticker || order.status != OrderStatusType::Open {
                continue;
            }
            let Some(limit) = order.price else {
                continue;
            };
            let touched = match order.side {
                Side::Buy => bar.low <= limit,
                Side::Sell => bar.high >= limit,
            };
            if touched {
                order.fill(limit);
                filled += 1;
                info!(
                    "[{}] 지정가 체결: {} {} {} @ {}",
                    self.config.name, order.order_no, order.side, order.quantity, limit
                );
            }
        }
        filled
    }

    /// 마지막 종가 직접 설정.
    pub async fn set_last_price(&self, ticker: &str, price: Decimal) {
        self.state
            .write()
            .await
            .last_prices
            .insert(ticker.to_string(), price);
    }

    /// 미체결 주문 취소 (거래소 측 취소를 재현).
    pub async fn cancel_order(&self, order_id: &str) -> Result<(), ProviderError> {
        self.finish_unfilled(order_id, OrderStatusType::Canceled)
            .await
    }

    /// 미체결 주문 거부 (거래소 측 거부를 재현).
    pub async fn reject_order(&self, order_id: &str) -> Result<(), ProviderError> {
        self.finish_unfilled(order_id, OrderStatusType::Rejected)
            .await
    }

    /// 다음 `count`회 주문 제출을 네트워크 에러로 실패시킴.
    pub async fn fail_next_places(&self, count: u32) {
        self.state.write().await.failing_places = count;
    }

    /// 다음 `count`회 주문 조회를 네트워크 에러로 실패시킴.
    pub async fn fail_next_fetches(&self, count: u32) {
        self.state.write().await.failing_fetches = count;
    }

    /// 제출된 주문 이력.
    pub async fn submitted_orders(&self) -> Vec<OrderRequest> {
        self.state.read().await.submitted.clone()
    }

    async fn finish_unfilled(
        &self,
        order_id: &str,
        status: OrderStatusType,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| ProviderError::OrderNotFound(order_id.to_string()))?;
        if order.status != OrderStatusType::Open {
            return Err(ProviderError::Api(format!(
                "미체결 주문이 아님: {} ({:?})",
                order_id, order.status
            )));
        }
        order.status = status;
        debug!("[{}] 주문 종료: {} ({:?})", self.config.name, order_id, status);
        Ok(())
    }

    fn apply_slippage(&self, price: Decimal, side: Side) -> Decimal {
        let slippage = price * self.config.slippage_rate;
        match side {
            Side::Buy => price + slippage,
            Side::Sell => price - slippage,
        }
    }
}

#[async_trait]
impl OrderExecutionProvider for PaperExchangeProvider {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderResponse, ProviderError> {
        let mut state = self.state.write().await;

        if state.failing_places > 0 {
            state.failing_places -= 1;
            return Err(ProviderError::Network("Paper: 주문 제출 실패".to_string()));
        }
        if request.reduce_only && !self.config.contract {
            return Err(ProviderError::Api(
                "현물 시장은 reduceOnly 주문을 지원하지 않습니다".to_string(),
            ));
        }
        if request.quantity <= Decimal::ZERO {
            return Err(ProviderError::Api(format!(
                "유효하지 않은 수량: {}",
                request.quantity
            )));
        }

        let order_no = format!("PAPER-{:08}", state.next_order_id);
        state.next_order_id += 1;

        let mut order = PaperOrder {
            order_no: order_no.clone(),
            ticker: request.ticker.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            price: request.price,
            status: OrderStatusType::Open,
            avg_fill_price: None,
            filled_quantity: Decimal::ZERO,
        };

        match request.order_type {
            OrderType::Market => {
                let last = state
                    .last_prices
                    .get(&request.ticker)
                    .copied()
                    .ok_or_else(|| {
                        ProviderError::Api(format!("시세 없음: {}", request.ticker))
                    })?;
                order.fill(self.apply_slippage(last, request.side));
            }
            OrderType::Limit => {
                if request.price.is_none() {
                    return Err(ProviderError::Api("지정가 주문에 가격 필수".to_string()));
                }
            }
        }

        info!(
            "[{}] 주문 접수: {} {:?} {} {} @ {:?}",
            self.config.name,
            order_no,
            order.order_type,
            request.side,
            request.quantity,
            request.price
        );

        let avg_fill_price = match order.order_type {
            OrderType::Market if !self.config.report_market_fills => None,
            _ => order.avg_fill_price,
        };
        state.orders.insert(order_no.clone(), order);
        state.submitted.push(request.clone());

        Ok(OrderResponse {
            order_no,
            order_time: Utc::now().format("%H%M%S").to_string(),
            avg_fill_price,
        })
    }

    async fn fetch_order(
        &self,
        order_id: &str,
        _ticker: &str,
    ) -> Result<OrderStatusInfo, ProviderError> {
        let mut state = self.state.write().await;
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(ProviderError::Network("Paper: 주문 조회 실패".to_string()));
        }
        state
            .orders
            .get(order_id)
            .map(PaperOrder::to_status_info)
            .ok_or_else(|| ProviderError::OrderNotFound(order_id.to_string()))
    }

    fn price_to_precision(&self, _ticker: &str, price: Decimal) -> Result<Decimal, ProviderError> {
        if !self.config.precision_api_available {
            return Err(ProviderError::Network("Paper: 정밀도 조회 실패".to_string()));
        }
        Ok(price.round_dp_with_strategy(
            self.config.price_decimals,
            RoundingStrategy::MidpointAwayFromZero,
        ))
    }

    fn amount_to_precision(
        &self,
        _ticker: &str,
        amount: Decimal,
    ) -> Result<Decimal, ProviderError> {
        if !self.config.precision_api_available {
            return Err(ProviderError::Network("Paper: 정밀도 조회 실패".to_string()));
        }
        Ok(amount.round_dp_with_strategy(self.config.amount_decimals, RoundingStrategy::ToZero))
    }

    fn market_precision(&self, _ticker: &str) -> Result<MarketPrecision, ProviderError> {
        Ok(MarketPrecision {
            price: Some(self.config.price_decimals),
            amount: Some(self.config.amount_decimals),
            contract: self.config.contract,
        })
    }

    fn exchange_name(&self) -> &str {
        &self.config.name
    }
}
