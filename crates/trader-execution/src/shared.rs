//! 멀티 태스크 환경용 엔진 핸들.
//!
//! 레지스트리 전체를 하나의 비동기 Mutex로 보호합니다.
//! `poll`은 두 단계(체결 반영, 청산)를 하나의 잠금 안에서 수행하고,
//! `try_open`은 보유 한도 확인과 포지션 생성을 하나의 잠금 안에서 수행합니다.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{Mutex, MutexGuard};
use trader_core::{ClosedBar, OrderExecutionProvider};

use crate::config::EngineConfig;
use crate::engine::{EntryIntent, ExecutionEngine};
use crate::error::ExecutionError;
use crate::position::Position;
use crate::stats::EngineStats;

/// 공유 가능한 엔진 핸들.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<ExecutionEngine>>,
}

impl SharedEngine {
    pub fn new(engine: ExecutionEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Provider와 설정으로 바로 생성.
    pub fn from_provider(provider: Arc<dyn OrderExecutionProvider>, config: EngineConfig) -> Self {
        Self::new(ExecutionEngine::new(provider, config))
    }

    /// 보유 한도 확인 후 진입. 확인과 생성 사이에 다른 호출이 끼어들지 않습니다.
    pub async fn try_open(&self, intent: EntryIntent) -> Result<Option<Position>, ExecutionError> {
        let mut engine = self.inner.lock().await;
        engine.open(intent).await
    }

    /// 캔들 처리. 처리 중에는 다른 호출이 레지스트리를 볼 수 없습니다.
    pub async fn poll(&self, bar: &ClosedBar) {
        let mut engine = self.inner.lock().await;
        engine.poll(bar).await;
    }

    pub async fn can_open(&self) -> bool {
        self.inner.lock().await.can_open()
    }

    pub async fn stats(&self) -> EngineStats {
        self.inner.lock().await.stats()
    }

    pub async fn total_realized_pnl(&self) -> Decimal {
        self.inner.lock().await.total_realized_pnl()
    }

    /// 전체 포지션 스냅샷.
    pub async fn positions(&self) -> Vec<Position> {
        self.inner.lock().await.positions().to_vec()
    }

    /// 엔진 직접 잠금.
    pub async fn lock(&self) -> MutexGuard<'_, ExecutionEngine> {
        self.inner.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use trader_exchange::PaperExchangeProvider;

    use crate::position::PositionSide;

    fn intent() -> EntryIntent {
        EntryIntent::new(
            PositionSide::Long,
            dec!(100),
            dec!(90),
            dec!(120),
            dec!(0.01),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_concurrent_opens_respect_cap() {
        let provider = Arc::new(PaperExchangeProvider::with_defaults());
        let engine = SharedEngine::from_provider(
            provider.clone(),
            EngineConfig::new("BTC/USDT", false).with_max_open_positions(2),
        );

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move { engine.try_open(intent()).await }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                created += 1;
            }
        }

        assert_eq!(created, 2);
        assert_eq!(engine.positions().await.len(), 2);
        assert_eq!(provider.submitted_orders().await.len(), 2);
        assert!(!engine.can_open().await);
    }

    #[tokio::test]
    async fn test_shared_poll_updates_registry() {
        let provider = Arc::new(PaperExchangeProvider::with_defaults());
        let engine =
            SharedEngine::from_provider(provider.clone(), EngineConfig::new("BTC/USDT", false));
        engine.try_open(intent()).await.unwrap().unwrap();

        let bar = ClosedBar::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 1, 0).unwrap(),
            dec!(101),
            dec!(125),
            dec!(99),
            dec!(121),
        );
        provider.on_bar("BTC/USDT", &bar).await;
        engine.poll(&bar).await;

        let stats = engine.stats().await;
        assert_eq!(stats.closed_tp, 1);
        // 시장가 청산은 마지막 종가(121)로 체결
        assert_eq!(engine.total_realized_pnl().await, dec!(0.21));
    }
}
