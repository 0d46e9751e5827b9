//! 포지션 엔티티.
//!
//! 하나의 거래 의도(진입 주문)부터 종료(TP/SL 청산)까지를 표현합니다.
//!
//! ```text
//! PENDING_ENTRY --체결--------> OPEN
//! PENDING_ENTRY --취소/거부---> CLOSED_SL (pnl = 0)
//! OPEN ----------SL 터치(우선)-> CLOSED_SL
//! OPEN ----------TP 터치------> CLOSED_TP
//! ```
//!
//! 상태 전이는 단방향이며 종료 상태에서 다시 열리지 않습니다.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_core::{ClosedBar, Side};
use uuid::Uuid;

use crate::error::ExecutionError;

/// 포지션 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    /// 매수 포지션
    Long,
    /// 매도(공매도) 포지션
    Short,
}

impl PositionSide {
    /// 진입 주문 방향.
    pub fn entry_side(self) -> Side {
        match self {
            PositionSide::Long => Side::Buy,
            PositionSide::Short => Side::Sell,
        }
    }

    /// 청산 주문 방향 (진입의 반대).
    pub fn exit_side(self) -> Side {
        self.entry_side().opposite()
    }

    /// PnL 부호 (LONG = +1, SHORT = -1).
    pub fn sign(self) -> Decimal {
        match self {
            PositionSide::Long => Decimal::ONE,
            PositionSide::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

impl FromStr for PositionSide {
    type Err = ExecutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" => Ok(PositionSide::Long),
            "SHORT" => Ok(PositionSide::Short),
            _ => Err(ExecutionError::InvalidSide(s.to_string())),
        }
    }
}

/// 포지션 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    /// 진입 지정가 주문 미체결
    PendingEntry,
    /// 진입 체결, 청산 대기
    Open,
    /// 익절 청산
    ClosedTp,
    /// 손절 청산 (진입 주문 취소/거부 포함)
    ClosedSl,
}

impl PositionStatus {
    /// 종료 상태 여부.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ClosedTp | Self::ClosedSl)
    }

    /// 보유 한도에 포함되는 활성 상태 여부.
    pub fn is_active(self) -> bool {
        matches!(self, Self::PendingEntry | Self::Open)
    }
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PendingEntry => write!(f, "PENDING_ENTRY"),
            Self::Open => write!(f, "OPEN"),
            Self::ClosedTp => write!(f, "CLOSED_TP"),
            Self::ClosedSl => write!(f, "CLOSED_SL"),
        }
    }
}

/// 종료 사유.
///
/// 진입 주문 취소/거부는 외부적으로 `ClosedSl`로 보고되지만,
/// 실제 손절과 구분하기 위해 `EntryCanceled`로 기록합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// 익절가 터치
    TakeProfit,
    /// 손절가 터치
    StopLoss,
    /// 진입 주문이 체결 없이 종료
    EntryCanceled,
}

impl CloseReason {
    /// 외부에 보고되는 종료 상태.
    pub fn status(self) -> PositionStatus {
        match self {
            CloseReason::TakeProfit => PositionStatus::ClosedTp,
            CloseReason::StopLoss | CloseReason::EntryCanceled => PositionStatus::ClosedSl,
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::TakeProfit => write!(f, "TP"),
            CloseReason::StopLoss => write!(f, "SL"),
            CloseReason::EntryCanceled => write!(f, "ENTRY_CANCELED"),
        }
    }
}

/// 하나의 거래.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// 포지션 ID
    pub id: Uuid,
    /// 방향
    pub side: PositionSide,
    /// 진입가 (정밀도 보정, PnL 기준가)
    pub entry: Decimal,
    /// 손절가
    pub stop: Decimal,
    /// 익절가
    pub tp: Decimal,
    /// 수량 (기초자산 단위)
    pub size: Decimal,
    /// 생성 시점의 캔들 마감 시각
    pub opened_ts: DateTime<Utc>,
    /// 상태
    pub status: PositionStatus,
    /// 진입 주문번호
    pub entry_order_id: String,
    /// 거래소가 보고한 진입 체결가 (참고용, PnL 계산에 사용하지 않음)
    pub entry_fill_price: Option<Decimal>,
    /// 종료 사유
    pub close_reason: Option<CloseReason>,
    /// 종료 시각
    pub closed_ts: Option<DateTime<Utc>>,
    /// 청산가 (진입 취소 시 None)
    pub close_price: Option<Decimal>,
    /// 실현 손익 (종료 상태에서만 Some)
    pub pnl: Option<Decimal>,
}

impl Position {
    /// 진입 주문이 접수된 새 포지션.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn pending(
        id: Uuid,
        side: PositionSide,
        entry: Decimal,
        stop: Decimal,
        tp: Decimal,
        size: Decimal,
        opened_ts: DateTime<Utc>,
        entry_order_id: String,
    ) -> Self {
        Self {
            id,
            side,
            entry,
            stop,
            tp,
            size,
            opened_ts,
            status: PositionStatus::PendingEntry,
            entry_order_id,
            entry_fill_price: None,
            close_reason: None,
            closed_ts: None,
            close_price: None,
            pnl: None,
        }
    }

    /// 캔들 고가/저가 기준 청산 조건 판정.
    ///
    /// 같은 캔들에서 TP와 SL이 모두 터치되면 SL을 우선합니다.
    pub fn exit_trigger(&self, bar: &ClosedBar) -> Option<CloseReason> {
        let (hit_tp, hit_sl) = match self.side {
            PositionSide::Long => (bar.high >= self.tp, bar.low <= self.stop),
            PositionSide::Short => (bar.low <= self.tp, bar.high >= self.stop),
        };

        if hit_sl {
            Some(CloseReason::StopLoss)
        } else if hit_tp {
            Some(CloseReason::TakeProfit)
        } else {
            None
        }
    }

    /// 터치된 이론 청산가.
    pub fn trigger_level(&self, reason: CloseReason) -> Option<Decimal> {
        match reason {
            CloseReason::TakeProfit => Some(self.tp),
            CloseReason::StopLoss => Some(self.stop),
            CloseReason::EntryCanceled => None,
        }
    }

    /// 주어진 청산가에서의 손익 (quote 통화, 수수료 제외).
    pub fn pnl_at(&self, close_price: Decimal) -> Decimal {
        (close_price - self.entry) * self.side.sign() * self.size
    }

    /// PENDING_ENTRY → OPEN.
    pub(crate) fn mark_filled(&mut self, fill_price: Option<Decimal>) -> bool {
        if self.status != PositionStatus::PendingEntry {
            return false;
        }
        self.status = PositionStatus::Open;
        self.entry_fill_price = fill_price;
        true
    }

    /// PENDING_ENTRY → CLOSED_SL (pnl = 0, 청산가 없음).
    pub(crate) fn mark_entry_canceled(&mut self, ts: DateTime<Utc>) -> bool {
        if self.status != PositionStatus::PendingEntry {
            return false;
        }
        self.finish(CloseReason::EntryCanceled, None, Decimal::ZERO, ts);
        true
    }

    /// OPEN → CLOSED_TP / CLOSED_SL.
    pub(crate) fn mark_closed(
        &mut self,
        reason: CloseReason,
        close_price: Decimal,
        ts: DateTime<Utc>,
    ) -> bool {
        if self.status != PositionStatus::Open || reason == CloseReason::EntryCanceled {
            return false;
        }
        let pnl = self.pnl_at(close_price);
        self.finish(reason, Some(close_price), pnl, ts);
        true
    }

    fn finish(
        &mut self,
        reason: CloseReason,
        close_price: Option<Decimal>,
        pnl: Decimal,
        ts: DateTime<Utc>,
    ) {
        self.status = reason.status();
        self.close_reason = Some(reason);
        self.close_price = close_price;
        self.pnl = Some(pnl);
        self.closed_ts = Some(ts);
    }
}
