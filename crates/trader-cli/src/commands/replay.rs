//! 리플레이 명령어.
//!
//! JSON Lines 파일의 마감 캔들과 시그널을 순서대로 엔진에 공급합니다.
//! 체결은 페이퍼 거래소가 담당합니다.
//!
//! # 입력 형식
//!
//! ```text
//! # bars.jsonl
//! {"ts":"2026-03-02T09:01:00Z","open":50000,"high":50100,"low":49900,"close":50050}
//!
//! # signals.jsonl
//! # ts: 시그널을 식별하는 구조 돌파 캔들 시각, seen_at: 시그널이 전달된 캔들 시각 (없으면 ts)
//! {"ts":"2026-03-02T09:01:00Z","side":"LONG","entry":50000,"stop":49500,"tp":51000,"confidence":0.72}
//! {"ts":"2026-03-02T09:01:00Z","seen_at":"2026-03-02T09:04:00Z","side":"LONG","entry":50000,"stop":49500,"tp":51000}
//! ```
//!
//! # 캔들 처리 순서
//!
//! 1. 페이퍼 거래소에 캔들 반영 (지정가 체결)
//! 2. `poll` (체결 반영, TP/SL 청산)
//! 3. 이 캔들에 전달된 시그널로 진입
//!    - 신뢰도 미달 시그널은 버림
//!    - 이미 진입을 시도한 `ts`의 시그널은 건너뜀
//!    - 보유 한도에 걸린 시그널은 표시하지 않으므로, 이후 캔들에 다시 전달되면 진입 가능
//!
//! # 청산 체결가
//!
//! 페이퍼 거래소는 시장가 청산을 청산 판정 캔들의 종가로 체결합니다. 손절가를 찍고
//! 위에서 마감한 캔들이면 `CLOSED_SL` 포지션의 손익이 양수일 수 있습니다.
//! `report_market_fills = false`(`--book-at-trigger`)이면 체결가를 보고하지 않아
//! 터치된 TP/SL 가격으로 손익을 계산합니다.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use trader_core::ClosedBar;
use trader_exchange::{PaperConfig, PaperExchangeProvider, RetryConfig, RetryingProvider};
use trader_execution::{
    EngineConfig, EngineStats, EntryIntent, ExecutionEngine, PositionSide, StatsReporter,
};

/// 리플레이 설정
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// 캔들 파일 경로
    pub bars_path: PathBuf,
    /// 시그널 파일 경로 (없으면 시그널 없이 진행)
    pub signals_path: Option<PathBuf>,
    /// 엔진 설정
    pub engine: EngineConfig,
    /// 시장가 슬리피지율
    pub slippage_rate: Decimal,
    /// 시장가 청산 체결가 보고 여부 (false면 TP/SL 가격으로 손익 계산)
    pub report_market_fills: bool,
    /// 통계 로그 주기 (캔들 시각 기준)
    pub stats_every: Duration,
}

/// 시그널 레코드.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalRecord {
    /// 시그널 식별 시각 (구조 돌파 캔들 마감)
    pub ts: DateTime<Utc>,
    /// 전달된 캔들 마감 시각 (없으면 `ts`)
    #[serde(default)]
    pub seen_at: Option<DateTime<Utc>>,
    pub side: String,
    pub entry: Decimal,
    pub stop: Decimal,
    pub tp: Decimal,
    /// 없으면 설정의 기본 수량
    #[serde(default)]
    pub size: Option<Decimal>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl SignalRecord {
    /// 시그널이 처리될 캔들 시각.
    pub fn delivered_at(&self) -> DateTime<Utc> {
        self.seen_at.unwrap_or(self.ts)
    }
}

/// 시그널 처리 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalOutcome {
    Opened,
    Rejected,
    Throttled,
}

/// 리플레이 결과 요약.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplaySummary {
    /// 처리한 캔들 수
    pub bars: usize,
    /// 읽은 시그널 수
    pub signals: usize,
    /// 이미 진입을 시도한 시그널이라 건너뛴 수
    pub throttled: usize,
    /// 진입 주문이 접수된 시그널 수
    pub opened: usize,
    /// 거절된 시그널 수 (한도, 신뢰도, 검증 실패, 주문 실패)
    pub rejected: usize,
    /// 최종 통계
    pub stats: EngineStats,
}

/// JSON Lines 읽기. 빈 줄과 `#` 주석은 무시합니다.
pub fn read_jsonl<T: DeserializeOwned>(reader: impl BufRead) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("{}번째 줄 읽기 실패", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record = serde_json::from_str(trimmed)
            .with_context(|| format!("{}번째 줄 파싱 실패: {}", idx + 1, trimmed))?;
        records.push(record);
    }
    Ok(records)
}

fn read_jsonl_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file =
        File::open(path).with_context(|| format!("파일을 열 수 없습니다: {}", path.display()))?;
    read_jsonl(BufReader::new(file)).with_context(|| format!("{}", path.display()))
}

/// 파일 기반 리플레이 실행.
pub async fn run_replay(config: ReplayConfig) -> Result<ReplaySummary> {
    let bars: Vec<ClosedBar> = read_jsonl_file(&config.bars_path)?;
    let signals: Vec<SignalRecord> = match &config.signals_path {
        Some(path) => read_jsonl_file(path)?,
        None => Vec::new(),
    };

    info!(
        bars = bars.len(),
        signals = signals.len(),
        symbol = %config.engine.symbol,
        derivatives = config.engine.is_derivatives,
        "리플레이 시작"
    );

    let summary = replay(
        &config.engine,
        paper_config(
            &config.engine,
            config.slippage_rate,
            config.report_market_fills,
        ),
        config.stats_every,
        bars,
        signals,
    )
    .await;
    summary.stats.log_summary(&config.engine.symbol);
    Ok(summary)
}

/// 엔진 설정에 맞는 페이퍼 거래소 설정.
pub fn paper_config(
    engine_config: &EngineConfig,
    slippage_rate: Decimal,
    report_market_fills: bool,
) -> PaperConfig {
    let base = if engine_config.is_derivatives {
        PaperConfig::derivatives()
    } else {
        PaperConfig::default()
    };
    base.with_slippage(slippage_rate)
        .with_market_fill_reports(report_market_fills)
}

/// 메모리의 캔들/시그널로 리플레이.
pub async fn replay(
    engine_config: &EngineConfig,
    paper_config: PaperConfig,
    stats_every: Duration,
    mut bars: Vec<ClosedBar>,
    signals: Vec<SignalRecord>,
) -> ReplaySummary {
    bars.sort_by_key(|bar| bar.ts);

    let retry = RetryConfig::fast();
    if let Some(interval) = bar_interval(&bars) {
        if !retry.fits_within(interval) {
            warn!(
                interval_secs = interval.as_secs(),
                worst_case_ms = retry.worst_case_delay().as_millis() as u64,
                "조회 재시도 대기가 캔들 주기보다 길 수 있습니다"
            );
        }
    }

    let paper = Arc::new(PaperExchangeProvider::new(paper_config));
    let provider = Arc::new(RetryingProvider::new(paper.clone(), retry));
    let mut engine = ExecutionEngine::new(provider, engine_config.clone());
    let mut reporter = StatsReporter::new(stats_every);

    let mut summary = ReplaySummary {
        signals: signals.len(),
        ..Default::default()
    };

    let mut by_ts: BTreeMap<DateTime<Utc>, Vec<SignalRecord>> = BTreeMap::new();
    for signal in signals {
        by_ts.entry(signal.delivered_at()).or_default().push(signal);
    }

    let mut last_signal_ts: Option<DateTime<Utc>> = None;

    for bar in &bars {
        paper.on_bar(&engine_config.symbol, bar).await;
        engine.poll(bar).await;
        summary.bars += 1;

        if let Some(pending) = by_ts.remove(&bar.ts) {
            for signal in pending {
                match apply_signal(&mut engine, engine_config, signal, &mut last_signal_ts).await {
                    SignalOutcome::Opened => summary.opened += 1,
                    SignalOutcome::Rejected => summary.rejected += 1,
                    SignalOutcome::Throttled => summary.throttled += 1,
                }
            }
        }

        reporter.maybe_report(bar.ts, &engine.stats(), &engine_config.symbol);
    }

    if !by_ts.is_empty() {
        warn!(
            count = by_ts.values().map(Vec::len).sum::<usize>(),
            "캔들 시각과 일치하지 않는 시그널이 있습니다"
        );
    }

    summary.stats = engine.stats();
    summary
}

/// 정렬된 캔들의 첫 간격. 캔들이 두 개 미만이거나 간격이 0 이하이면 None.
fn bar_interval(bars: &[ClosedBar]) -> Option<std::time::Duration> {
    match bars {
        [first, second, ..] => (second.ts - first.ts).to_std().ok().filter(|d| !d.is_zero()),
        _ => None,
    }
}

/// 시그널 하나로 진입 시도.
///
/// `last_signal_ts`는 보유 한도를 통과해 진입을 시도한 시그널에만 갱신됩니다.
async fn apply_signal(
    engine: &mut ExecutionEngine,
    config: &EngineConfig,
    signal: SignalRecord,
    last_signal_ts: &mut Option<DateTime<Utc>>,
) -> SignalOutcome {
    if !(signal.confidence >= config.min_confidence) {
        info!(
            ts = %signal.ts,
            confidence = signal.confidence,
            min_confidence = config.min_confidence,
            "신뢰도 부족, 시그널 버림"
        );
        return SignalOutcome::Rejected;
    }

    if *last_signal_ts == Some(signal.ts) {
        debug!(ts = %signal.ts, "이미 처리한 시그널 건너뜀");
        return SignalOutcome::Throttled;
    }

    if !engine.can_open() {
        info!(
            ts = %signal.ts,
            max = config.max_open_positions,
            "보유 한도 도달, 시그널 무시"
        );
        return SignalOutcome::Rejected;
    }

    let side: PositionSide = match signal.side.parse() {
        Ok(side) => side,
        Err(e) => {
            warn!(ts = %signal.ts, error = %e, "시그널 방향 오류");
            return SignalOutcome::Rejected;
        }
    };
    *last_signal_ts = Some(signal.ts);

    let intent = EntryIntent::new(
        side,
        signal.entry,
        signal.stop,
        signal.tp,
        signal.size.unwrap_or(config.default_size),
        signal.ts,
    )
    .with_confidence(signal.confidence);

    match engine.open(intent).await {
        Ok(Some(_)) => SignalOutcome::Opened,
        Ok(None) => SignalOutcome::Rejected,
        Err(e) => {
            warn!(ts = %signal.ts, error = %e, "진입 요청 거절");
            SignalOutcome::Rejected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, minute, 0).unwrap()
    }

    fn bar(minute: u32, low: Decimal, high: Decimal, close: Decimal) -> ClosedBar {
        ClosedBar::new(ts(minute), close, high, low, close)
    }

    fn signal(minute: u32, side: &str, confidence: f64) -> SignalRecord {
        SignalRecord {
            ts: ts(minute),
            seen_at: None,
            side: side.to_string(),
            entry: dec!(100),
            stop: dec!(90),
            tp: dec!(120),
            size: Some(dec!(1)),
            confidence,
        }
    }

    fn redelivered(mut record: SignalRecord, minute: u32) -> SignalRecord {
        record.seen_at = Some(ts(minute));
        record
    }

    fn spot_paper(config: &EngineConfig) -> PaperConfig {
        paper_config(config, Decimal::ZERO, true)
    }

    #[test]
    fn test_bar_interval() {
        let bars = vec![bar(1, dec!(99), dec!(101), dec!(100)), bar(6, dec!(99), dec!(101), dec!(100))];
        assert_eq!(bar_interval(&bars), Some(std::time::Duration::from_secs(300)));
        assert_eq!(bar_interval(&bars[..1]), None);
        assert!(RetryConfig::fast().fits_within(std::time::Duration::from_secs(300)));
    }

    #[test]
    fn test_read_jsonl_skips_blank_and_comments() {
        let input = r#"
# header
{"ts":"2026-03-02T09:01:00Z","open":100,"high":101,"low":99,"close":100.5}

{"ts":"2026-03-02T09:02:00Z","open":"100.5","high":"102","low":"100","close":"101"}
"#;
        let bars: Vec<ClosedBar> = read_jsonl(input.as_bytes()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, dec!(100.5));
        assert_eq!(bars[1].high, dec!(102));
    }

    #[test]
    fn test_read_jsonl_reports_line_number() {
        let input = "{\"ts\":\"2026-03-02T09:01:00Z\",\"side\":\"LONG\",\"entry\":1,\"stop\":1,\"tp\":1}\nnot json\n";
        let err = read_jsonl::<SignalRecord>(input.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("2번째 줄"));
    }

    #[test]
    fn test_signal_defaults() {
        let record: SignalRecord = serde_json::from_str(
            r#"{"ts":"2026-03-02T09:01:00Z","side":"short","entry":1,"stop":2,"tp":0.5}"#,
        )
        .unwrap();
        assert_eq!(record.confidence, 1.0);
        assert!(record.size.is_none());
    }

    #[tokio::test]
    async fn test_replay_round_trip() {
        let config = EngineConfig::new("BTC/USDT", false);
        let bars = vec![
            bar(0, dec!(101), dec!(103), dec!(102)),
            bar(1, dec!(99), dec!(102), dec!(101)),
            bar(2, dec!(110), dec!(121), dec!(120)),
        ];
        let signals = vec![signal(0, "LONG", 0.9)];

        let summary = replay(&config, spot_paper(&config), Duration::minutes(5), bars, signals).await;

        assert_eq!(summary.bars, 3);
        assert_eq!(summary.opened, 1);
        assert_eq!(summary.stats.closed_tp, 1);
        assert_eq!(summary.stats.total_realized_pnl, dec!(20));
    }

    #[tokio::test]
    async fn test_replay_throttles_and_rejects() {
        let config = EngineConfig::new("BTC/USDT", false);
        let bars = vec![
            bar(0, dec!(101), dec!(103), dec!(102)),
            bar(1, dec!(101), dec!(103), dec!(102)),
            bar(2, dec!(101), dec!(103), dec!(102)),
        ];
        let signals = vec![
            signal(0, "SHORT", 0.9),
            signal(0, "LONG", 0.9),
            signal(1, "LONG", 0.3),
            signal(2, "LONG", 0.9),
        ];

        let summary = replay(&config, spot_paper(&config), Duration::minutes(5), bars, signals).await;

        assert_eq!(summary.signals, 4);
        assert_eq!(summary.throttled, 1);
        // 현물 SHORT, 낮은 신뢰도
        assert_eq!(summary.rejected, 2);
        assert_eq!(summary.opened, 1);
        assert_eq!(summary.stats.pending_entry, 1);
        assert_eq!(summary.stats.closed_sl, 0);
    }

    #[tokio::test]
    async fn test_replay_respects_capacity() {
        let config = EngineConfig::new("BTC/USDT", false);
        let bars = vec![
            bar(0, dec!(101), dec!(103), dec!(102)),
            bar(1, dec!(101), dec!(103), dec!(102)),
        ];
        let signals = vec![signal(0, "LONG", 0.9), signal(1, "LONG", 0.9)];

        let summary = replay(&config, spot_paper(&config), Duration::minutes(5), bars, signals).await;
        assert_eq!(summary.opened, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.stats.pending_entry, 1);
    }

    #[tokio::test]
    async fn test_capacity_blocked_signal_can_open_when_redelivered() {
        let config = EngineConfig::new("BTC/USDT", false);
        let bars = vec![
            bar(0, dec!(101), dec!(103), dec!(102)),
            bar(1, dec!(99), dec!(102), dec!(101)),
            bar(2, dec!(110), dec!(121), dec!(120)),
            bar(3, dec!(101), dec!(103), dec!(102)),
            bar(4, dec!(101), dec!(103), dec!(102)),
        ];
        let blocked = signal(1, "LONG", 0.9);
        let signals = vec![
            signal(0, "LONG", 0.9),
            blocked.clone(),
            redelivered(blocked.clone(), 3),
            redelivered(blocked, 4),
        ];

        let summary = replay(&config, spot_paper(&config), Duration::minutes(5), bars, signals).await;

        // 1분: 보유 한도로 거절, 3분: 같은 시그널 재전달로 진입, 4분: 중복
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.opened, 2);
        assert_eq!(summary.throttled, 1);
        assert_eq!(summary.stats.closed_tp, 1);
        assert_eq!(summary.stats.pending_entry, 1);
    }

    #[tokio::test]
    async fn test_low_confidence_does_not_mark_signal() {
        let config = EngineConfig::new("BTC/USDT", false);
        let bars = vec![
            bar(0, dec!(101), dec!(103), dec!(102)),
            bar(1, dec!(101), dec!(103), dec!(102)),
        ];
        let weak = signal(0, "LONG", 0.3);
        let strong = SignalRecord {
            confidence: 0.9,
            ..redelivered(weak.clone(), 1)
        };

        let summary = replay(
            &config,
            spot_paper(&config),
            Duration::minutes(5),
            bars,
            vec![weak, strong],
        )
        .await;
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.throttled, 0);
        assert_eq!(summary.opened, 1);
    }

    #[tokio::test]
    async fn test_exit_fill_model() {
        let config = EngineConfig::new("BTC/USDT", false);
        let bars = vec![
            bar(0, dec!(101), dec!(103), dec!(102)),
            bar(1, dec!(99), dec!(102), dec!(101)),
            // 손절가 90을 찍고 138에 마감
            bar(2, dec!(85), dec!(139), dec!(138)),
        ];
        let signals = vec![signal(0, "LONG", 0.9)];

        let at_close = replay(
            &config,
            paper_config(&config, Decimal::ZERO, true),
            Duration::minutes(5),
            bars.clone(),
            signals.clone(),
        )
        .await;
        assert_eq!(at_close.stats.closed_sl, 1);
        assert_eq!(at_close.stats.total_realized_pnl, dec!(38));

        let at_trigger = replay(
            &config,
            paper_config(&config, Decimal::ZERO, false),
            Duration::minutes(5),
            bars,
            signals,
        )
        .await;
        assert_eq!(at_trigger.stats.closed_sl, 1);
        assert_eq!(at_trigger.stats.total_realized_pnl, dec!(-10));
    }
}
