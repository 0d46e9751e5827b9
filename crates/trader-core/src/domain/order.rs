//! 주문 관련 타입.
//!
//! - `Side` - 거래소 주문 방향 (매수/매도)
//! - `OrderType`, `TimeInForce` - 주문 유형 및 유효 기간
//! - `OrderRequest` - 거래소 중립 주문 요청
//! - `OrderStatusType` - 거래소 주문 상태

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 거래소 주문 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl Side {
    /// 반대 방향.
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// 시장가
    Market,
    /// 지정가
    Limit,
}

/// 주문 유효 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    /// 취소 전까지 유효
    #[default]
    GTC,
    /// 즉시 체결, 잔량 취소
    IOC,
    /// 전량 체결 또는 취소
    FOK,
}

/// 거래소 중립 주문 요청.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// 거래 심볼 (예: "BTC/USDT")
    pub ticker: String,
    /// 주문 방향
    pub side: Side,
    /// 주문 유형
    pub order_type: OrderType,
    /// 주문 수량 (기초자산 단위)
    pub quantity: Decimal,
    /// 지정가 (시장가 주문은 None)
    pub price: Option<Decimal>,
    /// 유효 기간
    pub time_in_force: TimeInForce,
    /// 포지션 축소 전용 여부 (파생상품 거래소)
    #[serde(default)]
    pub reduce_only: bool,
    /// 클라이언트 주문 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    /// GTC 지정가 주문 생성.
    pub fn limit(ticker: impl Into<String>, side: Side, quantity: Decimal, price: Decimal) -> Self {
        Self {
            ticker: ticker.into(),
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            time_in_force: TimeInForce::GTC,
            reduce_only: false,
            client_order_id: None,
        }
    }

    /// 시장가 주문 생성.
    pub fn market(ticker: impl Into<String>, side: Side, quantity: Decimal) -> Self {
        Self {
            ticker: ticker.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            time_in_force: TimeInForce::GTC,
            reduce_only: false,
            client_order_id: None,
        }
    }

    /// 포지션 축소 전용 플래그 설정.
    pub fn with_reduce_only(mut self, reduce_only: bool) -> Self {
        self.reduce_only = reduce_only;
        self
    }

    /// 클라이언트 주문 ID 설정.
    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }
}

/// 거래소 주문 상태.
///
/// 거래소마다 상태 문자열이 다르므로 역직렬화 시 [`OrderStatusType::from_exchange_str`]로
/// 정규화합니다. 직렬화는 snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// 미체결
    Open,
    /// 부분 체결
    PartiallyFilled,
    /// 전량 체결 ("closed" 포함)
    Filled,
    /// 취소됨
    Canceled,
    /// 거부됨
    Rejected,
    /// 알 수 없는 상태
    Unknown,
}

impl OrderStatusType {
    /// 거래소 상태 문자열 정규화 (대소문자 무시).
    pub fn from_exchange_str(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "open" | "new" => Self::Open,
            "partially_filled" | "partiallyfilled" => Self::PartiallyFilled,
            "closed" | "filled" => Self::Filled,
            "canceled" | "cancelled" => Self::Canceled,
            "rejected" => Self::Rejected,
            _ => Self::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for OrderStatusType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_exchange_str(&raw))
    }
}
