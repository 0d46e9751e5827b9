//! 실행 엔진 에러 타입.
//!
//! 예상된 거절(신뢰도 부족, 보유 한도 초과)은 에러가 아니라 `Ok(None)`으로 표현합니다.

use rust_decimal::Decimal;
use thiserror::Error;
use trader_core::ProviderError;

/// 실행 엔진 에러.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutionError {
    #[error("유효하지 않은 포지션 방향: {0} (LONG 또는 SHORT)")]
    InvalidSide(String),
    #[error("현물 시장에서는 SHORT 진입을 지원하지 않습니다 (파생상품 거래소 필요)")]
    ShortNotAllowed,
    #[error("유효하지 않은 수량: {0}")]
    InvalidQuantity(Decimal),
    #[error("거래소 에러: {0}")]
    Gateway(#[from] ProviderError),
}

impl ExecutionError {
    /// 입력 검증 에러 여부 (주문을 시도하지 않은 경우).
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Gateway(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(ExecutionError::ShortNotAllowed.is_validation());
        assert!(ExecutionError::InvalidSide("BUY".to_string()).is_validation());
        assert!(ExecutionError::InvalidQuantity(Decimal::ZERO).is_validation());

        let err: ExecutionError = ProviderError::Network("timeout".to_string()).into();
        assert!(!err.is_validation());
        assert!(err.to_string().contains("timeout"));
    }
}
