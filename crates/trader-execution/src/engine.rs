//! 포지션 생명주기 엔진.
//!
//! 외부 루프가 마감된 캔들마다 [`ExecutionEngine::poll`]을 호출하고,
//! 시그널이 있을 때 [`ExecutionEngine::open`]을 호출합니다.
//! 엔진은 스스로 시세를 조회하거나 스케줄링하지 않습니다.
//!
//! # 설계 원칙
//!
//! - **단일 진입 주문**: GTC 지정가 한 건으로 진입
//! - **캔들 기반 청산**: OCO/스톱 주문 없이 캔들 고가/저가로 TP/SL 터치를 판정하고 시장가 청산
//! - **SL 우선**: 같은 캔들에서 TP/SL이 모두 터치되면 SL로 처리
//! - **국소 복구**: 조회/청산 실패는 로그만 남기고 다음 `poll`에서 재시도

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};
use trader_core::{ClosedBar, OrderExecutionProvider, OrderStatusType};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::ExecutionError;
use crate::gateway::OrderGateway;
use crate::position::{Position, PositionSide, PositionStatus};
use crate::stats::EngineStats;

/// 진입 요청 (외부 시그널 오라클의 출력).
#[derive(Debug, Clone, PartialEq)]
pub struct EntryIntent {
    pub side: PositionSide,
    pub entry: Decimal,
    pub stop: Decimal,
    pub tp: Decimal,
    pub size: Decimal,
    /// 시그널이 발생한 캔들의 마감 시각
    pub ts: DateTime<Utc>,
    /// 시그널 신뢰도 (기본 1.0)
    pub confidence: f64,
}

impl EntryIntent {
    pub fn new(
        side: PositionSide,
        entry: Decimal,
        stop: Decimal,
        tp: Decimal,
        size: Decimal,
        ts: DateTime<Utc>,
    ) -> Self {
        Self {
            side,
            entry,
            stop,
            tp,
            size,
            ts,
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

/// 포지션 생명주기 엔진.
///
/// 모든 [`Position`]을 단독으로 소유하며, 레지스트리는 추가만 되고 삭제되지 않습니다.
pub struct ExecutionEngine {
    gateway: OrderGateway,
    config: EngineConfig,
    positions: Vec<Position>,
}

impl ExecutionEngine {
    /// 새 엔진 생성.
    pub fn new(provider: Arc<dyn OrderExecutionProvider>, config: EngineConfig) -> Self {
        let gateway = OrderGateway::new(provider, config.symbol.clone(), config.is_derivatives);
        Self {
            gateway,
            config,
            positions: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gateway(&self) -> &OrderGateway {
        &self.gateway
    }

    // ========================================================================
    // 진입 허가
    // ========================================================================

    /// 활성 포지션(진입 대기 + 보유) 수.
    pub fn active_count(&self) -> usize {
        self.positions
            .iter()
            .filter(|p| p.status.is_active())
            .count()
    }

    /// 새 포지션을 열 수 있는지 여부.
    pub fn can_open(&self) -> bool {
        self.active_count() < self.config.max_open_positions
    }

    /// 진입 주문 제출 후 포지션 생성.
    ///
    /// # Returns
    /// - `Ok(Some(position))`: 진입 주문 접수
    /// - `Ok(None)`: 신뢰도 부족, 보유 한도 초과, 주문 제출 실패
    /// - `Err(..)`: 입력 검증 실패 (현물 SHORT, 0 수량). 주문은 제출되지 않음
    pub async fn open(&mut self, intent: EntryIntent) -> Result<Option<Position>, ExecutionError> {
        if !(intent.confidence >= self.config.min_confidence) {
            warn!(
                symbol = %self.config.symbol,
                confidence = intent.confidence,
                min_confidence = self.config.min_confidence,
                "신뢰도 부족으로 진입 거절"
            );
            return Ok(None);
        }

        self.gateway.entry_side(intent.side)?;

        if !self.can_open() {
            warn!(
                symbol = %self.config.symbol,
                active = self.active_count(),
                max = self.config.max_open_positions,
                "보유 한도 초과로 진입 거절"
            );
            return Ok(None);
        }

        let precision = self.gateway.precision();
        let entry = precision.round_price(intent.entry);
        let stop = precision.round_price(intent.stop);
        let tp = precision.round_price(intent.tp);
        let size = precision.round_quantity(intent.size);

        if size <= Decimal::ZERO {
            return Err(ExecutionError::InvalidQuantity(size));
        }

        let id = Uuid::new_v4();
        let order_id = match self
            .gateway
            .place_entry(intent.side, size, entry, &id.to_string())
            .await
        {
            Ok(order_no) => order_no,
            Err(ExecutionError::Gateway(e)) => {
                error!(
                    symbol = %self.config.symbol,
                    side = %intent.side,
                    error = %e,
                    "진입 주문 실패"
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let position =
            Position::pending(id, intent.side, entry, stop, tp, size, intent.ts, order_id);
        info!(
            "[{}] 진입 대기: {} {} @ {} (SL {}, TP {}, id={})",
            self.config.symbol, position.side, position.size, entry, stop, tp, position.id
        );
        self.positions.push(position.clone());
        Ok(Some(position))
    }

    // ========================================================================
    // 캔들 처리
    // ========================================================================

    /// 마감된 캔들 하나를 처리합니다.
    ///
    /// 1. 진입 대기 포지션의 주문 상태를 조회해 체결/취소를 반영
    /// 2. 보유 포지션의 TP/SL 터치를 판정하고 시장가 청산
    ///
    /// 거래소 에러는 로그만 남기며, 해당 포지션은 다음 호출에서 다시 처리됩니다.
    pub async fn poll(&mut self, bar: &ClosedBar) {
        self.reconcile_entries(bar).await;
        self.process_exits(bar).await;
    }

    async fn reconcile_entries(&mut self, bar: &ClosedBar) {
        let Self {
            gateway,
            config,
            positions,
        } = self;

        for position in positions
            .iter_mut()
            .filter(|p| p.status == PositionStatus::PendingEntry)
        {
            let info = match gateway.query_order(&position.entry_order_id).await {
                Ok(info) => info,
                Err(e) => {
                    warn!(
                        symbol = %config.symbol,
                        order_id = %position.entry_order_id,
                        error = %e,
                        "진입 주문 조회 실패, 다음 캔들에서 재시도"
                    );
                    continue;
                }
            };

            match info.status {
                OrderStatusType::Filled => {
                    position.mark_filled(info.reported_price());
                    info!(
                        "[{}] 진입 체결: {} {} @ {} (체결가 {:?})",
                        config.symbol,
                        position.side,
                        position.size,
                        position.entry,
                        position.entry_fill_price
                    );
                }
                OrderStatusType::Canceled | OrderStatusType::Rejected => {
                    position.mark_entry_canceled(bar.ts);
                    warn!(
                        symbol = %config.symbol,
                        order_id = %position.entry_order_id,
                        status = ?info.status,
                        "진입 주문 종료 (미체결)"
                    );
                }
                OrderStatusType::Open | OrderStatusType::PartiallyFilled | OrderStatusType::Unknown => {
                    debug!(
                        order_id = %position.entry_order_id,
                        status = ?info.status,
                        "진입 주문 대기 중"
                    );
                }
            }
        }
    }

    async fn process_exits(&mut self, bar: &ClosedBar) {
        let Self {
            gateway,
            config,
            positions,
        } = self;

        for position in positions
            .iter_mut()
            .filter(|p| p.status == PositionStatus::Open)
        {
            let Some(reason) = position.exit_trigger(bar) else {
                continue;
            };
            // 청산가는 주문 전에 확정
            let Some(level) = position.trigger_level(reason) else {
                continue;
            };

            match gateway.place_exit(position.side, position.size).await {
                Ok(avg_fill_price) => {
                    let close_price = avg_fill_price.unwrap_or(level);
                    position.mark_closed(reason, close_price, bar.ts);
                    info!(
                        "[{}] 청산 {}: {} {} @ {} (진입 {}, PnL {})",
                        config.symbol,
                        reason,
                        position.side,
                        position.size,
                        close_price,
                        position.entry,
                        position.pnl.unwrap_or_default()
                    );
                }
                Err(e) => {
                    error!(
                        symbol = %config.symbol,
                        position_id = %position.id,
                        reason = %reason,
                        error = %e,
                        "청산 주문 실패, 다음 캔들에서 재시도"
                    );
                }
            }
        }
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 전체 포지션 (생성 순서).
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// ID로 포지션 조회.
    pub fn position(&self, id: Uuid) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    /// 진입 대기 또는 보유 중인 포지션.
    pub fn active_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.status.is_active())
    }

    /// 종료된 포지션의 실현 손익 합계.
    pub fn total_realized_pnl(&self) -> Decimal {
        self.positions
            .iter()
            .filter(|p| p.status.is_terminal())
            .filter_map(|p| p.pnl)
            .sum()
    }

    /// 상태별 통계.
    pub fn stats(&self) -> EngineStats {
        EngineStats::from_positions(&self.positions)
    }
}
