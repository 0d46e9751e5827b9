//! 포지션 생명주기 엔진 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 캔들/시그널 리플레이 (현물, 환경변수 설정)
//! trader replay --bars data/btc_5m.jsonl --signals data/choch.jsonl
//!
//! # 선물 설정으로 리플레이, 1시간마다 통계 출력
//! trader replay --bars data/btc_5m.jsonl --signals data/choch.jsonl --derivatives --stats-every 60
//!
//! # 청산 손익을 TP/SL 가격으로 계산
//! trader replay --bars data/btc_5m.jsonl --signals data/choch.jsonl --book-at-trigger
//!
//! # TOML 설정 파일 사용
//! trader --config config/engine.toml replay --bars data/btc_5m.jsonl
//!
//! # 적용될 설정 확인
//! trader config
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trader_execution::EngineConfig;

mod commands;

use commands::replay::{run_replay, ReplayConfig};

#[derive(Parser)]
#[command(name = "trader")]
#[command(about = "반자동 매매 실행기 - 지정가 진입, 캔들 기반 TP/SL 청산", long_about = None)]
#[command(version)]
struct Cli {
    /// 로그 레벨 (RUST_LOG가 있으면 무시)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// 엔진 설정 파일 (TOML). 없으면 환경변수 사용
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// JSON Lines 캔들/시그널을 페이퍼 거래소로 리플레이
    Replay {
        /// 마감 캔들 파일 (JSON Lines)
        #[arg(short, long)]
        bars: PathBuf,

        /// 시그널 파일 (JSON Lines)
        #[arg(short, long)]
        signals: Option<PathBuf>,

        /// 파생상품 거래소로 실행 (SHORT 허용, reduce-only 청산)
        #[arg(long)]
        derivatives: bool,

        /// 시장가 슬리피지율 (예: 0.0005)
        #[arg(long, default_value = "0")]
        slippage: Decimal,

        /// 청산 손익을 캔들 종가 대신 터치된 TP/SL 가격으로 계산
        #[arg(long)]
        book_at_trigger: bool,

        /// 통계 로그 주기 (분, 캔들 시각 기준)
        #[arg(long, default_value = "5")]
        stats_every: i64,
    },

    /// 적용될 엔진 설정 출력
    Config,
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_toml_file(path)
            .with_context(|| format!("설정 파일 로드 실패: {}", path.display())),
        None => EngineConfig::from_env().context("환경변수 설정 로드 실패"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "trader={},trader_execution={},trader_exchange={}",
                    cli.log_level, cli.log_level, cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Replay {
            bars,
            signals,
            derivatives,
            slippage,
            book_at_trigger,
            stats_every,
        } => {
            if derivatives {
                config.is_derivatives = true;
            }
            info!(
                symbol = %config.symbol,
                exchange = %config.exchange,
                derivatives = config.is_derivatives,
                max_open_positions = config.max_open_positions,
                min_confidence = config.min_confidence,
                "엔진 설정"
            );

            let summary = run_replay(ReplayConfig {
                bars_path: bars,
                signals_path: signals,
                engine: config,
                slippage_rate: slippage,
                report_market_fills: !book_at_trigger,
                stats_every: Duration::minutes(stats_every.max(1)),
            })
            .await?;

            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
