//! Custodial Order Matching & Settlement Engine
//!
//! This crate implements a custodial settlement core: it takes deposited
//! assets into custody on behalf of traders, records them as outstanding
//! orders, settles pairs of orders against each other with a configurable
//! fee, and returns unmatched custody on cancellation.
//!
//! # Modules
//! - `ids`: Account, trade, and order identifier types
//! - `identity`: Deterministic order identifier derivation
//! - `errors`: Engine error taxonomy
//! - `events`: Events emitted by engine operations
//! - `security`: Reentrancy guard and owner authority
//! - `book`: Keyed order store (insert/get/remove)
//! - `fees`: Fee policy with integer-percentage rates
//! - `ledger`: External asset ledger interface and in-memory implementation
//! - `engine`: Settlement engine orchestrating submit/execute/cancel

pub mod book;
pub mod engine;
pub mod errors;
pub mod events;
pub mod fees;
pub mod identity;
pub mod ids;
pub mod ledger;
pub mod security;
