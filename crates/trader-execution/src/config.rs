//! 실행 엔진 설정.
//!
//! 환경변수(`.env` 포함) 또는 TOML 파일에서 로드합니다.
//!
//! | 환경변수 | 기본값 | 설명 |
//! |---|---|---|
//! | `SYMBOL` | `BTC/USDT` | 거래 심볼 |
//! | `EXCHANGE` | `binance` | 거래소 ID (`binanceusdm`, `binancecoinm`은 파생상품) |
//! | `IS_DERIVATIVES` | 거래소 ID로 결정 | 파생상품 여부 강제 지정 |
//! | `MAX_OPEN_POS` | `1` | 동시 보유 한도 (대기 + 보유) |
//! | `MIN_CONFIDENCE` | `0.60` | 최소 시그널 신뢰도 |
//! | `DEFAULT_SIZE` | `0.001` | 기본 주문 수량 |

use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 파생상품(선물) 거래소 ID.
const DERIVATIVES_EXCHANGES: &[&str] = &["binanceusdm", "binancecoinm"];

/// 설정 에러.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("설정 파일 읽기 실패: {0}")]
    Io(#[from] std::io::Error),
    #[error("설정 파싱 실패: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("유효하지 않은 설정: {0}")]
    Invalid(String),
}

/// 실행 엔진 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 거래 심볼 (예: "BTC/USDT")
    pub symbol: String,
    /// 거래소 ID
    pub exchange: String,
    /// 파생상품 거래소 여부 (SHORT 허용, 청산 주문 reduce-only)
    pub is_derivatives: bool,
    /// 동시 보유 한도
    pub max_open_positions: usize,
    /// 최소 시그널 신뢰도 (0.0 ~ 1.0, 경계값 포함)
    pub min_confidence: f64,
    /// 기본 주문 수량 (기초자산 단위)
    pub default_size: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC/USDT".to_string(),
            exchange: "binance".to_string(),
            is_derivatives: false,
            max_open_positions: 1,
            min_confidence: 0.60,
            default_size: dec!(0.001),
        }
    }
}

impl EngineConfig {
    /// 심볼/거래소 유형만 지정한 기본 설정.
    pub fn new(symbol: impl Into<String>, is_derivatives: bool) -> Self {
        Self {
            symbol: symbol.into(),
            is_derivatives,
            ..Default::default()
        }
    }

    /// 보유 한도 지정.
    pub fn with_max_open_positions(mut self, max: usize) -> Self {
        self.max_open_positions = max;
        self
    }

    /// 최소 신뢰도 지정.
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// 거래소 ID가 파생상품 거래소인지 여부.
    pub fn is_derivatives_exchange(exchange: &str) -> bool {
        let exchange = exchange.trim().to_ascii_lowercase();
        DERIVATIVES_EXCHANGES.contains(&exchange.as_str())
    }

    /// 환경변수에서 설정 로드.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let exchange = std::env::var("EXCHANGE").unwrap_or(defaults.exchange);
        let is_derivatives =
            env_var_bool("IS_DERIVATIVES", Self::is_derivatives_exchange(&exchange));

        let config = Self {
            symbol: std::env::var("SYMBOL").unwrap_or(defaults.symbol),
            exchange,
            is_derivatives,
            max_open_positions: env_var_parse("MAX_OPEN_POS", defaults.max_open_positions),
            min_confidence: env_var_parse("MIN_CONFIDENCE", defaults.min_confidence),
            default_size: env_var_parse("DEFAULT_SIZE", defaults.default_size),
        };
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정 로드. 누락된 항목은 기본값을 사용합니다.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// TOML 문자열에서 설정 로드.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 설정 검증.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("symbol이 비어 있습니다".to_string()));
        }
        if self.max_open_positions == 0 {
            return Err(ConfigError::Invalid(
                "max_open_positions는 1 이상이어야 합니다".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_confidence는 0.0 ~ 1.0 범위여야 합니다: {}",
                self.min_confidence
            )));
        }
        if self.default_size <= Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "default_size는 0보다 커야 합니다: {}",
                self.default_size
            )));
        }
        Ok(())
    }
}

/// 환경변수 파싱 (실패 시 기본값)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}
