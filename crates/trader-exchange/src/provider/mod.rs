//! OrderExecutionProvider 구현체.
//!
//! - [`PaperExchangeProvider`]: 마감 캔들 기반 가상 체결 거래소
//! - [`RetryingProvider`]: 주문 조회에 재시도를 적용하는 래퍼

mod paper;
mod retrying;

pub use paper::{PaperConfig, PaperExchangeProvider};
pub use retrying::RetryingProvider;
