//! 거래소 주문 실행 제공자 추상화.
//!
//! 실행 엔진이 거래소에 요구하는 최소 기능만을 정의합니다:
//! 주문 제출, 주문 조회, 가격/수량 정밀도 변환.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use super::{MarketPrecision, OrderRequest, OrderResponse, OrderStatusInfo};

/// 거래소 제공자 에러.
///
/// 엔진은 `Network`/`RateLimited`만 일시적 오류로 보고 조회를 재시도하며,
/// 나머지는 그대로 로그에 남기고 다음 캔들로 넘어갑니다.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// 연결 끊김, 타임아웃
    #[error("거래소 연결 실패: {0}")]
    Network(String),

    #[error("거래소 인증 실패: {0}")]
    Authentication(String),

    /// 거래소가 요청을 거부함 (잔고 부족, 최소 주문 수량 미달 등)
    #[error("거래소 요청 거부: {0}")]
    Api(String),

    #[error("거래소 요청 한도 초과")]
    RateLimited,

    #[error("주문 없음: {0}")]
    OrderNotFound(String),

    /// 거래소 응답 해석 실패
    #[error("거래소 응답 해석 실패: {0}")]
    Parse(String),

    /// 이 거래소 바인딩이 제공하지 않는 기능
    #[error("미지원 기능: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// 일시적 오류로 재시도할 수 있는지 여부.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited)
    }
}

/// 엔진이 거래소에 요구하는 주문 실행 기능.
///
/// 거래소별 주문 실행을 추상화합니다. 실행 엔진은 이 인터페이스에만 의존하며,
/// 각 거래소 바인딩(실거래, 페이퍼 등)이 이를 구현합니다.
///
/// # 구현 예시
///
/// ```ignore
/// #[async_trait]
/// impl OrderExecutionProvider for BinanceExchangeProvider {
///     async fn place_order(&self, request: &OrderRequest) -> Result<OrderResponse, ProviderError> {
///         // Binance API를 통한 주문 제출
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait OrderExecutionProvider: Send + Sync {
    /// 주문 제출.
    ///
    /// 지정가/시장가 주문을 거래소에 전달합니다. `reduce_only`는 파생상품
    /// 거래소에서만 의미가 있습니다.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Api`: 거래소 API 에러 (자금 부족, 수량 초과, 거부 등)
    /// - `ProviderError::Network`: 네트워크 연결 실패
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderResponse, ProviderError>;

    /// 주문 상태 조회.
    ///
    /// # Arguments
    ///
    /// * `order_id` - 조회할 주문번호
    /// * `ticker` - 종목 심볼
    ///
    /// # Errors
    ///
    /// - `ProviderError::OrderNotFound`: 존재하지 않는 주문
    /// - `ProviderError::Network`: 네트워크 연결 실패
    async fn fetch_order(
        &self,
        order_id: &str,
        ticker: &str,
    ) -> Result<OrderStatusInfo, ProviderError>;

    /// 거래소 규칙에 따른 가격 정밀도 변환.
    ///
    /// 기본적으로 `Unsupported` 에러를 반환하며, 호출자는 로컬 규칙으로 대체합니다.
    fn price_to_precision(&self, _ticker: &str, _price: Decimal) -> Result<Decimal, ProviderError> {
        Err(ProviderError::Unsupported(
            "이 거래소는 가격 정밀도 변환을 지원하지 않습니다".to_string(),
        ))
    }

    /// 거래소 규칙에 따른 수량 정밀도 변환.
    fn amount_to_precision(
        &self,
        _ticker: &str,
        _amount: Decimal,
    ) -> Result<Decimal, ProviderError> {
        Err(ProviderError::Unsupported(
            "이 거래소는 수량 정밀도 변환을 지원하지 않습니다".to_string(),
        ))
    }

    /// 심볼의 정적 정밀도 메타데이터.
    fn market_precision(&self, _ticker: &str) -> Result<MarketPrecision, ProviderError> {
        Err(ProviderError::Unsupported(
            "이 거래소는 시장 메타데이터를 제공하지 않습니다".to_string(),
        ))
    }

    /// 거래소 이름.
    fn exchange_name(&self) -> &str;
}
