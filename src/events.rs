//! Events emitted by engine operations
//!
//! Events are immutable records appended to the engine's event log on every
//! successful state-changing operation, consumable by external observers
//! and indexers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, OrderId, TradeId};

/// Custody taken in and a live order recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSubmitted {
    pub order_id: OrderId,
    pub trader: AccountId,
    pub asset: String,
    pub amount: Decimal,
}

/// Two orders settled against each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeExecuted {
    pub trade_id: TradeId,
    pub buyer: AccountId,
    pub seller: AccountId,
    pub matched_amount: Decimal,
    pub fee_amount: Decimal,
    /// Unix millis
    pub executed_at: i64,
}

/// Custody returned to the trader and the order removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub trader: AccountId,
    pub asset: String,
    pub amount: Decimal,
}

/// Fee rate changed by the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRateChanged {
    pub previous_rate: u32,
    pub new_rate: u32,
    pub changed_by: AccountId,
}

/// Enum wrapper for all engine events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    OrderSubmitted(OrderSubmitted),
    TradeExecuted(TradeExecuted),
    OrderCancelled(OrderCancelled),
    FeeRateChanged(FeeRateChanged),
}
