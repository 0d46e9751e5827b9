//! 가격/수량 정밀도 변환.
//!
//! 거래소의 정밀도 규칙을 우선 사용하고, 거래소 호출이 실패하면
//! 시장 메타데이터의 소수점 자릿수로 내림(truncate)합니다.
//! 내림이므로 거래소가 받을 수 없는 값(올림된 가격/수량)을 만들지 않습니다.

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;
use trader_core::OrderExecutionProvider;

/// 메타데이터가 없을 때의 가격 소수점 자릿수.
pub const DEFAULT_PRICE_DECIMALS: u32 = 2;
/// 메타데이터가 없을 때의 수량 소수점 자릿수.
pub const DEFAULT_AMOUNT_DECIMALS: u32 = 6;

/// 소수점 `decimals` 자리 아래를 버림.
pub fn floor_to_decimals(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::ToNegativeInfinity)
}

/// 심볼 하나에 대한 정밀도 변환기.
#[derive(Clone)]
pub struct PrecisionAdapter {
    provider: Arc<dyn OrderExecutionProvider>,
    symbol: String,
}

impl PrecisionAdapter {
    /// 새 변환기 생성.
    pub fn new(provider: Arc<dyn OrderExecutionProvider>, symbol: impl Into<String>) -> Self {
        Self {
            provider,
            symbol: symbol.into(),
        }
    }

    /// 가격을 거래 가능한 정밀도로 변환.
    pub fn round_price(&self, price: Decimal) -> Decimal {
        match self.provider.price_to_precision(&self.symbol, price) {
            Ok(rounded) => rounded,
            Err(e) => {
                let decimals = self.fallback_price_decimals();
                debug!(symbol = %self.symbol, error = %e, decimals, "가격 정밀도 로컬 대체");
                floor_to_decimals(price, decimals)
            }
        }
    }

    /// 수량을 거래 가능한 정밀도로 변환.
    pub fn round_quantity(&self, quantity: Decimal) -> Decimal {
        match self.provider.amount_to_precision(&self.symbol, quantity) {
            Ok(rounded) => rounded,
            Err(e) => {
                let decimals = self.fallback_amount_decimals();
                debug!(symbol = %self.symbol, error = %e, decimals, "수량 정밀도 로컬 대체");
                floor_to_decimals(quantity, decimals)
            }
        }
    }

    fn fallback_price_decimals(&self) -> u32 {
        self.provider
            .market_precision(&self.symbol)
            .ok()
            .and_then(|m| m.price)
            .unwrap_or(DEFAULT_PRICE_DECIMALS)
    }

    fn fallback_amount_decimals(&self) -> u32 {
        self.provider
            .market_precision(&self.symbol)
            .ok()
            .and_then(|m| m.amount)
            .unwrap_or(DEFAULT_AMOUNT_DECIMALS)
    }
}
