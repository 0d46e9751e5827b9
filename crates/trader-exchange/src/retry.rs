//! 주문 조회 재시도 정책.
//!
//! 엔진은 캔들 하나마다 `poll`을 한 번 호출하므로, 재시도 대기 시간의 합이
//! 캔들 주기보다 길어지면 안 됩니다. 모든 정책은 재시도 횟수와 단일 대기 시간에
//! 상한을 가지며, [`RetryConfig::fits_within`]으로 최악의 누적 대기를 확인할 수 있습니다.
//!
//! # 예시
//!
//! ```rust,ignore
//! use trader_exchange::retry::{with_retry, RetryConfig};
//!
//! let config = RetryConfig::fast();
//! assert!(config.fits_within(Duration::from_secs(60)));
//! let status = with_retry(&config, || provider.fetch_order("123", "BTC/USDT")).await?;
//! ```

use std::{future::Future, time::Duration};

use tracing::{debug, warn};
use trader_core::ProviderError;

/// 대기 시간 증가 방식.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// 매번 `base_delay`
    Fixed,
    /// `base_delay * multiplier^attempt`
    Exponential { multiplier: f64 },
}

/// 재시도 설정.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 최대 재시도 횟수 (첫 시도 제외)
    pub max_retries: u32,
    /// 첫 재시도 전 대기 시간
    pub base_delay: Duration,
    /// 단일 대기 시간 상한
    pub max_delay: Duration,
    /// 대기 시간 증가 방식
    pub backoff: Backoff,
    /// ±25% 무작위 지연 추가 여부
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff: Backoff::Exponential { multiplier: 2.0 },
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// 짧은 캔들 주기용 (2회, 100ms부터, 최대 1초).
    pub fn fast() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            ..Default::default()
        }
    }

    /// 재시도 없음.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// `attempt`번째 재시도(0부터) 전 대기 시간. 지터 제외.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let delay = match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential { multiplier } => {
                let scaled = self.base_delay.as_secs_f64() * multiplier.powi(attempt as i32);
                if scaled.is_finite() && scaled >= 0.0 {
                    Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
                } else {
                    self.max_delay
                }
            }
        };
        delay.min(self.max_delay)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for(attempt);
        if !self.jitter {
            return delay;
        }
        let millis = delay.as_millis() as f64;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * millis * 0.25;
        Duration::from_millis((millis + jitter).max(0.0) as u64)
    }

    /// 모든 재시도가 실패할 때의 누적 대기 시간 (지터 제외).
    pub fn worst_case_delay(&self) -> Duration {
        (0..self.max_retries).map(|a| self.base_delay_for(a)).sum()
    }

    /// 지터를 포함한 최악의 누적 대기가 `budget` 이내인지 여부.
    pub fn fits_within(&self, budget: Duration) -> bool {
        let worst = self.worst_case_delay();
        let worst = if self.jitter { worst.mul_f64(1.25) } else { worst };
        worst <= budget
    }
}

/// 일시적 오류(`ProviderError::is_retryable`)에 한해 `operation`을 재시도합니다.
///
/// 그 외 에러는 즉시 반환하고, 재시도를 모두 소진하면 마지막 에러를 반환합니다.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, ProviderError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempts = attempt + 1, "재시도 후 성공");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            return Err(error);
        }
        if attempt >= config.max_retries {
            warn!(
                error = %error,
                attempts = attempt + 1,
                "재시도 한도 소진"
            );
            return Err(error);
        }

        let delay = config.delay_for(attempt);
        warn!(
            error = %error,
            attempt = attempt + 1,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            "일시적 오류, 재시도 대기"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fixed(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(10),
            backoff: Backoff::Fixed,
            jitter: false,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fixed(3), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ProviderError::Network("연결 끊김".to_string()))
            } else {
                Ok("filled")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "filled");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fixed(3), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::OrderNotFound("42".to_string()))
        })
        .await;

        assert_eq!(result, Err(ProviderError::OrderNotFound("42".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fixed(2), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::RateLimited)
        })
        .await;

        assert_eq!(result, Err(ProviderError::RateLimited));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_exponential_delays_are_capped() {
        let config = RetryConfig {
            jitter: false,
            ..Default::default()
        };
        assert_eq!(config.base_delay_for(0), Duration::from_millis(500));
        assert_eq!(config.base_delay_for(2), Duration::from_secs(2));
        assert_eq!(config.base_delay_for(10), Duration::from_secs(5));
        // 500ms + 1s + 2s
        assert_eq!(config.worst_case_delay(), Duration::from_millis(3500));
    }

    #[test]
    fn test_budget_check() {
        assert!(RetryConfig::no_retry().fits_within(Duration::ZERO));
        // fast: 100ms + 200ms, 지터 포함 최대 375ms
        assert!(RetryConfig::fast().fits_within(Duration::from_millis(400)));
        assert!(!RetryConfig::fast().fits_within(Duration::from_millis(300)));
        assert!(RetryConfig::default().fits_within(Duration::from_secs(60)));
    }
}
