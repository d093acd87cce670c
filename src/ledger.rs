//! Asset ledger interface and in-memory implementation
//!
//! The ledger is the trusted external service that moves a quantity of a
//! named asset between an account's external balance and the engine's
//! custody. The engine only ever sees success or failure per transfer and
//! orders its own state mutations so that nothing is committed until every
//! transfer in an operation has succeeded.

use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

use crate::ids::AccountId;

/// Errors reported by an asset ledger.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    #[error("insufficient balance of {asset}: required {required}, available {available}")]
    InsufficientBalance {
        asset: String,
        required: String,
        available: String,
    },

    #[error("unknown account: {account_id}")]
    AccountUnknown { account_id: String },

    #[error("arithmetic overflow in balance update")]
    Overflow,
}

/// External asset-transfer mechanism.
///
/// A transfer may hand control to externally-defined logic before
/// returning; callers must not mutate their own state between issuing a
/// transfer and observing its result. Implementations are expected to run
/// inside the host's transaction so that a failed operation leaves no
/// partial transfers behind.
pub trait AssetLedger {
    /// Pull `amount` of `asset` from `from`'s external balance into the
    /// engine's custody.
    fn transfer_in(
        &mut self,
        from: &AccountId,
        asset: &str,
        amount: Decimal,
    ) -> Result<(), TransferError>;

    /// Push `amount` of `asset` from the engine's custody to `to`.
    fn transfer_out(
        &mut self,
        to: &AccountId,
        asset: &str,
        amount: Decimal,
    ) -> Result<(), TransferError>;

    /// The engine's own custodial balance of `asset`.
    fn balance_of(&self, asset: &str) -> Decimal;
}

/// In-memory asset ledger.
///
/// Tracks external balances per `(account, asset)` and the engine's custody
/// per asset, with checked arithmetic throughout. Used as the reference
/// implementation in tests and simulations.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    /// External balances: account -> (asset -> amount)
    external: HashMap<AccountId, HashMap<String, Decimal>>,
    /// Engine custody: asset -> amount
    custody: HashMap<String, Decimal>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            external: HashMap::new(),
            custody: HashMap::new(),
        }
    }

    /// Credit an account's external balance (funding helper).
    pub fn credit_external(
        &mut self,
        account: AccountId,
        asset: &str,
        amount: Decimal,
    ) -> Result<(), TransferError> {
        let balances = self.external.entry(account).or_default();
        let current = balances.entry(asset.to_string()).or_insert(Decimal::ZERO);
        *current = current.checked_add(amount).ok_or(TransferError::Overflow)?;
        Ok(())
    }

    /// An account's external balance of an asset.
    pub fn external_balance_of(&self, account: &AccountId, asset: &str) -> Decimal {
        self.external
            .get(account)
            .and_then(|balances| balances.get(asset))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn debit_external(
        &mut self,
        account: &AccountId,
        asset: &str,
        amount: Decimal,
    ) -> Result<(), TransferError> {
        let balances = self
            .external
            .get_mut(account)
            .ok_or_else(|| TransferError::AccountUnknown {
                account_id: account.to_string(),
            })?;

        let current = balances
            .get_mut(asset)
            .ok_or_else(|| TransferError::InsufficientBalance {
                asset: asset.to_string(),
                required: amount.to_string(),
                available: "0".to_string(),
            })?;

        if *current < amount {
            return Err(TransferError::InsufficientBalance {
                asset: asset.to_string(),
                required: amount.to_string(),
                available: current.to_string(),
            });
        }

        *current = current.checked_sub(amount).ok_or(TransferError::Overflow)?;
        Ok(())
    }
}

impl AssetLedger for InMemoryLedger {
    fn transfer_in(
        &mut self,
        from: &AccountId,
        asset: &str,
        amount: Decimal,
    ) -> Result<(), TransferError> {
        self.debit_external(from, asset, amount)?;

        let custody = self.custody.entry(asset.to_string()).or_insert(Decimal::ZERO);
        *custody = custody.checked_add(amount).ok_or(TransferError::Overflow)?;
        Ok(())
    }

    fn transfer_out(
        &mut self,
        to: &AccountId,
        asset: &str,
        amount: Decimal,
    ) -> Result<(), TransferError> {
        let custody =
            self.custody
                .get_mut(asset)
                .ok_or_else(|| TransferError::InsufficientBalance {
                    asset: asset.to_string(),
                    required: amount.to_string(),
                    available: "0".to_string(),
                })?;

        if *custody < amount {
            return Err(TransferError::InsufficientBalance {
                asset: asset.to_string(),
                required: amount.to_string(),
                available: custody.to_string(),
            });
        }

        *custody = custody.checked_sub(amount).ok_or(TransferError::Overflow)?;

        let balances = self.external.entry(*to).or_default();
        let current = balances.entry(asset.to_string()).or_insert(Decimal::ZERO);
        *current = current.checked_add(amount).ok_or(TransferError::Overflow)?;
        Ok(())
    }

    fn balance_of(&self, asset: &str) -> Decimal {
        self.custody.get(asset).copied().unwrap_or(Decimal::ZERO)
    }
}
