//! 포지션 생명주기 엔진.
//!
//! 이 crate는 다음을 제공합니다:
//! - 지정가 진입 주문과 체결 추적
//! - 마감 캔들 고가/저가 기반 TP/SL 판정 및 시장가 청산
//! - 진입 허가 (신뢰도, 보유 한도)
//! - 실현 손익 및 상태별 통계
//!
//! # 예제
//!
//! ```rust,ignore
//! use trader_execution::{EngineConfig, EntryIntent, ExecutionEngine, PositionSide};
//!
//! let mut engine = ExecutionEngine::new(provider, EngineConfig::from_env()?);
//!
//! // 마감 캔들마다
//! engine.poll(&bar).await;
//! if let Some(signal) = oracle.next(&bar) {
//!     let intent = EntryIntent::new(PositionSide::Long, entry, stop, tp, size, bar.ts)
//!         .with_confidence(signal.confidence);
//!     engine.open(intent).await?;
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod position;
pub mod precision;
pub mod shared;
pub mod stats;

// 주요 타입 재내보내기
pub use config::{ConfigError, EngineConfig};
pub use engine::{EntryIntent, ExecutionEngine};
pub use error::ExecutionError;
pub use gateway::OrderGateway;
pub use position::{CloseReason, Position, PositionSide, PositionStatus};
pub use precision::{floor_to_decimals, PrecisionAdapter};
pub use shared::SharedEngine;
pub use stats::{EngineStats, StatsReporter};
