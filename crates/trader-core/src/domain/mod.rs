//! 도메인 모델.

mod exchange_provider;
mod exchange_types;
mod order;

pub use exchange_provider::{OrderExecutionProvider, ProviderError};
pub use exchange_types::{ClosedBar, MarketPrecision, OrderResponse, OrderStatusInfo};
pub use order::{OrderRequest, OrderStatusType, OrderType, Side, TimeInForce};
