//! 거래소 바인딩.
//!
//! `OrderExecutionProvider` trait의 구현체와 재시도 유틸리티를 제공합니다.
//!
//! - [`PaperExchangeProvider`]: 캔들 기반 가상 체결 거래소 (드라이런/테스트용)
//! - [`RetryingProvider`]: 조회 요청에 제한된 재시도를 적용하는 래퍼

pub mod provider;
pub mod retry;

pub use provider::{PaperConfig, PaperExchangeProvider, RetryingProvider};
pub use retry::{with_retry, Backoff, RetryConfig};
