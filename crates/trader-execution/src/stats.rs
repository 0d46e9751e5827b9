//! 포지션 통계.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::position::{CloseReason, Position, PositionStatus};

/// 포지션 상태별 집계.
///
/// 레지스트리에서 매번 다시 계산하며 캐시하지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    /// 진입 대기
    pub pending_entry: usize,
    /// 보유 중
    pub open: usize,
    /// 익절 종료
    pub closed_tp: usize,
    /// 손절 종료 (진입 취소 포함)
    pub closed_sl: usize,
    /// `closed_sl` 중 진입 주문 취소/거부 건수
    pub entry_canceled: usize,
    /// 종료된 포지션의 실현 손익 합계
    pub total_realized_pnl: Decimal,
}

impl EngineStats {
    /// 포지션 목록에서 통계 계산.
    pub fn from_positions<'a>(positions: impl IntoIterator<Item = &'a Position>) -> Self {
        let mut stats = Self::default();
        for position in positions {
            match position.status {
                PositionStatus::PendingEntry => stats.pending_entry += 1,
                PositionStatus::Open => stats.open += 1,
                PositionStatus::ClosedTp => stats.closed_tp += 1,
                PositionStatus::ClosedSl => stats.closed_sl += 1,
            }
            if position.close_reason == Some(CloseReason::EntryCanceled) {
                stats.entry_canceled += 1;
            }
            if position.status.is_terminal() {
                stats.total_realized_pnl += position.pnl.unwrap_or(Decimal::ZERO);
            }
        }
        stats
    }

    /// 실제 청산 중 익절 비율 (%). 진입 취소는 제외합니다.
    pub fn win_rate(&self) -> f64 {
        let exits = self.closed_tp + self.closed_sl.saturating_sub(self.entry_canceled);
        if exits == 0 {
            0.0
        } else {
            (self.closed_tp as f64 / exits as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, symbol: &str) {
        tracing::info!(
            symbol = symbol,
            pending_entry = self.pending_entry,
            open = self.open,
            closed_tp = self.closed_tp,
            closed_sl = self.closed_sl,
            entry_canceled = self.entry_canceled,
            win_rate = format!("{:.1}%", self.win_rate()),
            total_realized_pnl = %self.total_realized_pnl,
            "포지션 통계"
        );
    }
}

/// 주기적 통계 로그 제어.
///
/// 캔들 시각 기준으로 동작하므로 리플레이에서도 실시간과 같은 간격으로 출력됩니다.
#[derive(Debug, Clone)]
pub struct StatsReporter {
    interval: Duration,
    last_report: Option<DateTime<Utc>>,
}

impl Default for StatsReporter {
    fn default() -> Self {
        Self::new(Duration::minutes(5))
    }
}

impl StatsReporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_report: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 마지막 출력 이후 주기가 지났으면 출력하고 true 반환.
    ///
    /// 첫 호출은 기준 시각만 기록합니다.
    pub fn maybe_report(&mut self, now: DateTime<Utc>, stats: &EngineStats, symbol: &str) -> bool {
        match self.last_report {
            None => {
                self.last_report = Some(now);
                false
            }
            Some(last) if now - last >= self.interval => {
                stats.log_summary(symbol);
                self.last_report = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}
