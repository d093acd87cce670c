//! Deterministic order identifier derivation
//!
//! An order's identifier is the SHA-256 digest of its defining attributes
//! `(trader, asset, amount)`. Derivation is a pure function: the same
//! attributes always produce the same identifier. This means a trader who
//! resubmits an identical order collides with their earlier one — the book
//! entry is overwritten while both deposits were taken, stranding the first
//! deposit's custody. The engine preserves this behavior rather than hiding
//! it; see the stranded-custody tests.

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::ids::{AccountId, OrderId};

/// Derive the identifier for an order from its defining attributes.
///
/// The amount is normalized before hashing so that representations with
/// trailing zeros (e.g. `60` and `60.00`) derive the same identifier.
pub fn derive(trader: &AccountId, asset: &str, amount: Decimal) -> OrderId {
    let mut hasher = Sha256::new();
    hasher.update(trader.as_uuid().as_bytes());
    hasher.update([0u8]);
    hasher.update(asset.as_bytes());
    hasher.update([0u8]);
    hasher.update(amount.normalize().to_string().as_bytes());
    OrderId::from_bytes(hasher.finalize().into())
}
