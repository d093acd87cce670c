//! Engine error taxonomy
//!
//! Every error is terminal for the operation that raised it: nothing is
//! retried internally and no partial effects are persisted on failure.

use thiserror::Error;

use crate::ids::OrderId;
use crate::ledger::TransferError;

/// Errors raised by settlement engine operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Order amount must be positive")]
    InvalidAmount,

    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: OrderId },

    #[error("Insufficient custody of {asset}: required {required}, available {available}")]
    InsufficientCustody {
        asset: String,
        required: String,
        available: String,
    },

    #[error("Custody transfer failed: {0}")]
    CustodyTransferFailed(#[from] TransferError),

    #[error("Unauthorized: caller is not permitted to perform this action")]
    Unauthorized,

    #[error("Fee rate out of range: {rate} (must be 0-100)")]
    FeeRateOutOfRange { rate: u32 },

    #[error("Reentrancy detected")]
    Reentrancy,

    #[error("Arithmetic overflow in settlement calculation")]
    Overflow,
}
