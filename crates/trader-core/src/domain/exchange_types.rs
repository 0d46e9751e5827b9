//! 거래소 중립 타입 정의.
//!
//! 다양한 거래소(Binance 현물/선물 등)의 데이터를
//! 통일된 형식으로 표현하기 위한 중립 타입입니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OrderStatusType;

// =============================================================================
// 마감 캔들
// =============================================================================

/// 마감된(완성된) 캔들 한 개.
///
/// 실행 엔진은 진행 중인 캔들을 보지 않으며, `ts`는 캔들 마감 시각입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedBar {
    /// 캔들 마감 시각
    pub ts: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
}

impl ClosedBar {
    /// 새 캔들 생성.
    pub fn new(
        ts: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> Self {
        Self {
            ts,
            open,
            high,
            low,
            close,
        }
    }
}

// =============================================================================
// 시장 정밀도
// =============================================================================

/// 심볼별 정밀도 메타데이터 (소수점 자릿수).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarketPrecision {
    /// 가격 소수점 자릿수 (미제공 시 None)
    pub price: Option<u32>,
    /// 수량 소수점 자릿수 (미제공 시 None)
    pub amount: Option<u32>,
    /// 계약(파생상품) 시장 여부
    #[serde(default)]
    pub contract: bool,
}

impl MarketPrecision {
    /// 가격/수량 자릿수로 생성.
    pub fn new(price: u32, amount: u32) -> Self {
        Self {
            price: Some(price),
            amount: Some(amount),
            contract: false,
        }
    }
}

// =============================================================================
// 주문 응답
// =============================================================================

/// 거래소 중립 주문 응답.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    /// 주문번호
    pub order_no: String,
    /// 주문시간 (HHMMSS 등)
    pub order_time: String,
    /// 평균 체결가 (즉시 체결된 시장가 주문 등, 거래소가 제공한 경우)
    #[serde(default)]
    pub avg_fill_price: Option<Decimal>,
}

// =============================================================================
// 주문 조회
// =============================================================================

/// 거래소 중립 주문 조회 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusInfo {
    /// 주문번호
    pub order_no: String,
    /// 주문 상태
    pub status: OrderStatusType,
    /// 평균 체결가
    pub avg_fill_price: Option<Decimal>,
    /// 주문 가격
    pub price: Option<Decimal>,
    /// 체결 수량
    pub filled_quantity: Decimal,
}

impl OrderStatusInfo {
    /// 보고용 체결가 (평균 체결가 → 주문가 순으로 사용).
    pub fn reported_price(&self) -> Option<Decimal> {
        self.avg_fill_price.or(self.price)
    }
}

// =============================================================================
// 테스트
// =============================================================================
