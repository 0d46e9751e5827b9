//! 트레이딩 시스템 공용 도메인 타입.
//!
//! 이 crate는 다음을 제공합니다:
//! - 거래소 중립 주문 타입 (`OrderRequest`, `OrderStatusInfo` 등)
//! - 마감 캔들(`ClosedBar`) 및 시장 정밀도 메타데이터
//! - 거래소 주문 실행 추상화 (`OrderExecutionProvider`)

pub mod domain;

pub use domain::{
    ClosedBar, MarketPrecision, OrderExecutionProvider, OrderRequest, OrderResponse,
    OrderStatusInfo, OrderStatusType, OrderType, ProviderError, Side, TimeInForce,
};
