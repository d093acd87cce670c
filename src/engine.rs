//! Settlement engine — submit, execute, cancel
//!
//! Orchestrates the custody lifecycle: deposits pull assets into custody
//! and record a live order, trade execution settles two orders against
//! each other with a fee to the authority, and cancellation returns
//! custody to the order's trader.
//!
//! Every operation follows checks-effects-interactions ordering in the
//! sense required here: all validation runs first, all ledger transfers
//! run next, and book/event mutations are committed only after every
//! transfer has succeeded. A transfer may hand control to external logic
//! before returning; the reentrancy guard rejects any attempt to re-enter
//! the engine during that window.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::book::{Order, OrderBook};
use crate::errors::EngineError;
use crate::events::{
    EngineEvent, FeeRateChanged, OrderCancelled, OrderSubmitted, TradeExecuted,
};
use crate::fees::FeePolicy;
use crate::identity;
use crate::ids::{AccountId, OrderId, TradeId};
use crate::ledger::AssetLedger;
use crate::security::{Authority, ReentrancyGuard};

/// How two orders settle against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementVariant {
    /// Match `min(buy, sell)`; the larger order keeps a residual. The fee
    /// is computed on the buy order's full amount, denominated in the buy
    /// asset, and paid entirely to the authority out of buy-side custody.
    MinFill,
    /// Always consume both orders in full regardless of amount mismatch.
    /// The fee is computed on the sum of both amounts and paid to the
    /// authority half in each asset, deducted from the payouts.
    FullCross,
}

/// Result of a successful trade execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub trade_id: TradeId,
    pub buyer: AccountId,
    pub seller: AccountId,
    /// Smaller of the two order amounts
    pub matched_amount: Decimal,
    pub fee_amount: Decimal,
}

/// A planned ledger transfer, executed only after all checks pass.
struct Payout {
    to: AccountId,
    asset: String,
    amount: Decimal,
}

/// A planned book mutation, applied only after all transfers succeed.
enum BookMutation {
    Remove(OrderId),
    Rewrite(Order),
}

/// Custodial settlement engine.
///
/// Runs one operation at a time to completion, including all ledger calls,
/// before the next may begin. No order is ever created, mutated, or
/// destroyed except through `submit`, `execute_trade`, and `cancel`.
#[derive(Debug)]
pub struct SettlementEngine<L: AssetLedger> {
    ledger: L,
    book: OrderBook,
    fees: FeePolicy,
    authority: Authority,
    variant: SettlementVariant,
    reentrancy_guard: ReentrancyGuard,
    /// Emitted events log (append-only)
    events: Vec<EngineEvent>,
}

impl<L: AssetLedger> SettlementEngine<L> {
    /// Create an engine with a fixed authority, initial fee rate, and
    /// settlement variant. Fails if the rate exceeds 100.
    pub fn new(
        ledger: L,
        authority: AccountId,
        fee_rate: u32,
        variant: SettlementVariant,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            ledger,
            book: OrderBook::new(),
            fees: FeePolicy::new(fee_rate)?,
            authority: Authority::new(authority),
            variant,
            reentrancy_guard: ReentrancyGuard::new(),
            events: Vec::new(),
        })
    }

    // ───────────────────────── Submit ─────────────────────────

    /// Deposit `amount` of `asset` from `trader` and record a live order.
    ///
    /// Custody is pulled in before the record is created; if the transfer
    /// fails, nothing is recorded. The identifier is derived from the
    /// order attributes, so a resubmission of identical attributes
    /// overwrites the earlier book entry while its deposit stays in
    /// custody with no live order attached.
    pub fn submit(
        &mut self,
        trader: AccountId,
        asset: &str,
        amount: Decimal,
    ) -> Result<OrderId, EngineError> {
        if !self.reentrancy_guard.acquire() {
            return Err(EngineError::Reentrancy);
        }
        let result = self.submit_inner(trader, asset, amount);
        self.reentrancy_guard.release();
        result
    }

    fn submit_inner(
        &mut self,
        trader: AccountId,
        asset: &str,
        amount: Decimal,
    ) -> Result<OrderId, EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount);
        }

        tracing::debug!(%trader, asset, %amount, "submitting order");
        self.ledger.transfer_in(&trader, asset, amount)?;

        let id = identity::derive(&trader, asset, amount);
        self.book.insert(Order {
            id,
            trader,
            asset: asset.to_string(),
            amount,
        });

        self.events.push(EngineEvent::OrderSubmitted(OrderSubmitted {
            order_id: id,
            trader,
            asset: asset.to_string(),
            amount,
        }));
        Ok(id)
    }

    // ───────────────────────── Execute ─────────────────────────

    /// Settle the orders at `buy_id` and `sell_id` against each other.
    ///
    /// All ledger transfers for one call form a single unit: if any check
    /// or transfer fails, no book mutation or event is observable.
    pub fn execute_trade(
        &mut self,
        buy_id: OrderId,
        sell_id: OrderId,
    ) -> Result<TradeReceipt, EngineError> {
        if !self.reentrancy_guard.acquire() {
            return Err(EngineError::Reentrancy);
        }
        let result = self.execute_trade_inner(buy_id, sell_id);
        self.reentrancy_guard.release();
        result
    }

    fn execute_trade_inner(
        &mut self,
        buy_id: OrderId,
        sell_id: OrderId,
    ) -> Result<TradeReceipt, EngineError> {
        let buy = self
            .book
            .get(&buy_id)
            .cloned()
            .ok_or(EngineError::OrderNotFound { order_id: buy_id })?;
        let sell = self
            .book
            .get(&sell_id)
            .cloned()
            .ok_or(EngineError::OrderNotFound { order_id: sell_id })?;

        // Custody may have been depleted by an earlier fee draw on the
        // same asset, so solvency is re-verified on every execution.
        self.check_order_solvency(&buy)?;
        self.check_order_solvency(&sell)?;

        let matched = buy.amount.min(sell.amount);
        let (fee, payouts, mutations) = match self.variant {
            SettlementVariant::MinFill => self.plan_min_fill(&buy, &sell, matched)?,
            SettlementVariant::FullCross => self.plan_full_cross(&buy, &sell)?,
        };

        // Every payout must be covered in aggregate before the first
        // transfer is issued, so a mid-batch failure cannot strand a
        // half-settled trade.
        self.check_aggregate_solvency(&payouts)?;

        for payout in &payouts {
            self.ledger
                .transfer_out(&payout.to, &payout.asset, payout.amount)?;
        }

        for mutation in mutations {
            match mutation {
                BookMutation::Remove(id) => {
                    self.book.remove(&id);
                }
                BookMutation::Rewrite(order) => {
                    self.book.insert(order);
                }
            }
        }

        let receipt = TradeReceipt {
            trade_id: TradeId::new(),
            buyer: buy.trader,
            seller: sell.trader,
            matched_amount: matched,
            fee_amount: fee,
        };

        tracing::info!(
            trade_id = %receipt.trade_id,
            buyer = %receipt.buyer,
            seller = %receipt.seller,
            matched = %matched,
            fee = %fee,
            "trade executed"
        );
        self.events.push(EngineEvent::TradeExecuted(TradeExecuted {
            trade_id: receipt.trade_id,
            buyer: receipt.buyer,
            seller: receipt.seller,
            matched_amount: matched,
            fee_amount: fee,
            executed_at: Utc::now().timestamp_millis(),
        }));
        Ok(receipt)
    }

    /// Min-fill: the smaller order is fully consumed, the larger keeps a
    /// residual. Payouts are not net of the fee; the fee is an additional
    /// draw on buy-side custody, which is why a residual buy order can
    /// later fail the solvency check.
    fn plan_min_fill(
        &self,
        buy: &Order,
        sell: &Order,
        matched: Decimal,
    ) -> Result<(Decimal, Vec<Payout>, Vec<BookMutation>), EngineError> {
        let fee = self.fees.compute_fee(buy.amount)?;

        let mut payouts = vec![
            Payout {
                to: sell.trader,
                asset: buy.asset.clone(),
                amount: matched,
            },
            Payout {
                to: buy.trader,
                asset: sell.asset.clone(),
                amount: matched,
            },
        ];
        if fee > Decimal::ZERO {
            payouts.push(Payout {
                to: *self.authority.account(),
                asset: buy.asset.clone(),
                amount: fee,
            });
        }

        let mut mutations = Vec::new();
        if buy.amount == sell.amount {
            mutations.push(BookMutation::Remove(buy.id));
            mutations.push(BookMutation::Remove(sell.id));
        } else if buy.amount < sell.amount {
            mutations.push(BookMutation::Remove(buy.id));
            mutations.push(BookMutation::Rewrite(Order {
                amount: sell.amount - matched,
                ..sell.clone()
            }));
        } else {
            mutations.push(BookMutation::Remove(sell.id));
            mutations.push(BookMutation::Rewrite(Order {
                amount: buy.amount - matched,
                ..buy.clone()
            }));
        }

        Ok((fee, payouts, mutations))
    }

    /// Full-cross: both orders are always fully consumed. The fee is
    /// computed on the sum of both amounts, halved (truncating), and paid
    /// to the authority once in each asset; each payout is net of the
    /// half-fee in its asset.
    fn plan_full_cross(
        &self,
        buy: &Order,
        sell: &Order,
    ) -> Result<(Decimal, Vec<Payout>, Vec<BookMutation>), EngineError> {
        let basis = buy
            .amount
            .checked_add(sell.amount)
            .ok_or(EngineError::Overflow)?;
        let fee = self.fees.compute_fee(basis)?;
        let half = (fee / Decimal::from(2)).floor();

        // A half-fee larger than a payout would drive it negative, which
        // the original's unsigned arithmetic would reject outright.
        if half > buy.amount || half > sell.amount {
            return Err(EngineError::Overflow);
        }

        let mut payouts = vec![
            Payout {
                to: buy.trader,
                asset: sell.asset.clone(),
                amount: sell.amount - half,
            },
            Payout {
                to: sell.trader,
                asset: buy.asset.clone(),
                amount: buy.amount - half,
            },
        ];
        if half > Decimal::ZERO {
            payouts.push(Payout {
                to: *self.authority.account(),
                asset: buy.asset.clone(),
                amount: half,
            });
            payouts.push(Payout {
                to: *self.authority.account(),
                asset: sell.asset.clone(),
                amount: half,
            });
        }

        let mutations = vec![BookMutation::Remove(buy.id), BookMutation::Remove(sell.id)];
        Ok((fee, payouts, mutations))
    }

    fn check_order_solvency(&self, order: &Order) -> Result<(), EngineError> {
        let available = self.ledger.balance_of(&order.asset);
        if available < order.amount {
            return Err(EngineError::InsufficientCustody {
                asset: order.asset.clone(),
                required: order.amount.to_string(),
                available: available.to_string(),
            });
        }
        Ok(())
    }

    fn check_aggregate_solvency(&self, payouts: &[Payout]) -> Result<(), EngineError> {
        let mut required: HashMap<&str, Decimal> = HashMap::new();
        for payout in payouts {
            let entry = required.entry(&payout.asset).or_insert(Decimal::ZERO);
            *entry = entry
                .checked_add(payout.amount)
                .ok_or(EngineError::Overflow)?;
        }
        for (asset, needed) in required {
            let available = self.ledger.balance_of(asset);
            if available < needed {
                return Err(EngineError::InsufficientCustody {
                    asset: asset.to_string(),
                    required: needed.to_string(),
                    available: available.to_string(),
                });
            }
        }
        Ok(())
    }

    // ───────────────────────── Cancel ─────────────────────────

    /// Return an order's custody to its trader and remove the record.
    ///
    /// Only the order's own trader may cancel it. If the refund transfer
    /// fails, the order remains live.
    pub fn cancel(&mut self, caller: AccountId, order_id: OrderId) -> Result<(), EngineError> {
        if !self.reentrancy_guard.acquire() {
            return Err(EngineError::Reentrancy);
        }
        let result = self.cancel_inner(caller, order_id);
        self.reentrancy_guard.release();
        result
    }

    fn cancel_inner(&mut self, caller: AccountId, order_id: OrderId) -> Result<(), EngineError> {
        let order = self
            .book
            .get(&order_id)
            .cloned()
            .ok_or(EngineError::OrderNotFound { order_id })?;

        if caller != order.trader {
            return Err(EngineError::Unauthorized);
        }

        tracing::debug!(%order_id, trader = %order.trader, "cancelling order");
        self.ledger
            .transfer_out(&order.trader, &order.asset, order.amount)?;

        self.book.remove(&order_id);
        self.events.push(EngineEvent::OrderCancelled(OrderCancelled {
            order_id,
            trader: order.trader,
            asset: order.asset,
            amount: order.amount,
        }));
        Ok(())
    }

    // ───────────────────────── Fee policy ─────────────────────────

    /// Replace the fee rate. Authority-only; the rate is bounded to 100.
    pub fn set_fee_rate(&mut self, caller: AccountId, new_rate: u32) -> Result<(), EngineError> {
        if !self.authority.is_owner(&caller) {
            return Err(EngineError::Unauthorized);
        }
        let previous_rate = self.fees.rate();
        self.fees.set_rate(new_rate)?;

        tracing::debug!(previous_rate, new_rate, "fee rate changed");
        self.events.push(EngineEvent::FeeRateChanged(FeeRateChanged {
            previous_rate,
            new_rate,
            changed_by: caller,
        }));
        Ok(())
    }

    // ───────────────────────── Queries ─────────────────────────

    /// Get a live order, if present.
    pub fn get_order(&self, id: &OrderId) -> Option<&Order> {
        self.book.get(id)
    }

    /// Current fee rate as a whole percentage.
    pub fn fee_rate(&self) -> u32 {
        self.fees.rate()
    }

    /// The authority account.
    pub fn authority(&self) -> &AccountId {
        self.authority.account()
    }

    /// The configured settlement variant.
    pub fn variant(&self) -> SettlementVariant {
        self.variant
    }

    /// Number of live orders.
    pub fn order_count(&self) -> usize {
        self.book.len()
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Get all emitted events.
    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    /// Drain all events (consume and clear).
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;

    fn engine_with_funds(
        variant: SettlementVariant,
        fee_rate: u32,
        funds: &[(AccountId, &str, i64)],
    ) -> SettlementEngine<InMemoryLedger> {
        let mut ledger = InMemoryLedger::new();
        for (account, asset, amount) in funds {
            ledger
                .credit_external(*account, asset, Decimal::from(*amount))
                .unwrap();
        }
        SettlementEngine::new(ledger, AccountId::new(), fee_rate, variant).unwrap()
    }

    #[test]
    fn test_submit_takes_custody_and_records_order() {
        let trader = AccountId::new();
        let mut engine =
            engine_with_funds(SettlementVariant::MinFill, 1, &[(trader, "BTC", 100)]);

        let id = engine.submit(trader, "BTC", Decimal::from(40)).unwrap();

        let order = engine.get_order(&id).unwrap();
        assert_eq!(order.trader, trader);
        assert_eq!(order.amount, Decimal::from(40));
        assert_eq!(engine.ledger().balance_of("BTC"), Decimal::from(40));
        assert_eq!(
            engine.ledger().external_balance_of(&trader, "BTC"),
            Decimal::from(60)
        );
    }

    #[test]
    fn test_submit_zero_amount_rejected() {
        let trader = AccountId::new();
        let mut engine =
            engine_with_funds(SettlementVariant::MinFill, 1, &[(trader, "BTC", 100)]);

        let result = engine.submit(trader, "BTC", Decimal::ZERO);
        assert_eq!(result, Err(EngineError::InvalidAmount));
        assert_eq!(engine.order_count(), 0);
    }

    #[test]
    fn test_submit_negative_amount_rejected() {
        let trader = AccountId::new();
        let mut engine =
            engine_with_funds(SettlementVariant::MinFill, 1, &[(trader, "BTC", 100)]);

        let result = engine.submit(trader, "BTC", Decimal::from(-5));
        assert_eq!(result, Err(EngineError::InvalidAmount));
    }

    #[test]
    fn test_submit_transfer_failure_records_nothing() {
        let trader = AccountId::new();
        let mut engine =
            engine_with_funds(SettlementVariant::MinFill, 1, &[(trader, "BTC", 10)]);

        let result = engine.submit(trader, "BTC", Decimal::from(50));
        assert!(matches!(
            result,
            Err(EngineError::CustodyTransferFailed(_))
        ));
        assert_eq!(engine.order_count(), 0);
        assert_eq!(engine.ledger().balance_of("BTC"), Decimal::ZERO);
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_submit_releases_guard_after_error() {
        let trader = AccountId::new();
        let mut engine =
            engine_with_funds(SettlementVariant::MinFill, 1, &[(trader, "BTC", 100)]);

        engine.submit(trader, "BTC", Decimal::ZERO).unwrap_err();
        // Guard was released — a valid submit still works
        engine.submit(trader, "BTC", Decimal::from(10)).unwrap();
        assert_eq!(engine.order_count(), 1);
    }

    #[test]
    fn test_execute_trade_unknown_order() {
        let mut engine = engine_with_funds(SettlementVariant::MinFill, 1, &[]);
        let missing = OrderId::from_bytes([9u8; 32]);

        let result = engine.execute_trade(missing, missing);
        assert_eq!(
            result,
            Err(EngineError::OrderNotFound { order_id: missing })
        );
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_cancel_requires_ownership() {
        let trader = AccountId::new();
        let stranger = AccountId::new();
        let mut engine =
            engine_with_funds(SettlementVariant::MinFill, 1, &[(trader, "BTC", 100)]);
        let id = engine.submit(trader, "BTC", Decimal::from(40)).unwrap();

        let result = engine.cancel(stranger, id);
        assert_eq!(result, Err(EngineError::Unauthorized));
        assert!(engine.get_order(&id).is_some(), "Order stays live");
    }

    #[test]
    fn test_cancel_refunds_and_removes() {
        let trader = AccountId::new();
        let mut engine =
            engine_with_funds(SettlementVariant::MinFill, 1, &[(trader, "BTC", 100)]);
        let id = engine.submit(trader, "BTC", Decimal::from(40)).unwrap();

        engine.cancel(trader, id).unwrap();

        assert!(engine.get_order(&id).is_none());
        assert_eq!(engine.ledger().balance_of("BTC"), Decimal::ZERO);
        assert_eq!(
            engine.ledger().external_balance_of(&trader, "BTC"),
            Decimal::from(100)
        );
    }

    #[test]
    fn test_cancel_twice_fails_second_time() {
        let trader = AccountId::new();
        let mut engine =
            engine_with_funds(SettlementVariant::MinFill, 1, &[(trader, "BTC", 100)]);
        let id = engine.submit(trader, "BTC", Decimal::from(40)).unwrap();

        engine.cancel(trader, id).unwrap();
        let result = engine.cancel(trader, id);
        assert_eq!(result, Err(EngineError::OrderNotFound { order_id: id }));
    }

    #[test]
    fn test_set_fee_rate_authority_only() {
        let mut engine = engine_with_funds(SettlementVariant::MinFill, 1, &[]);
        let authority = *engine.authority();

        let result = engine.set_fee_rate(AccountId::new(), 5);
        assert_eq!(result, Err(EngineError::Unauthorized));
        assert_eq!(engine.fee_rate(), 1, "Rate unchanged");

        engine.set_fee_rate(authority, 5).unwrap();
        assert_eq!(engine.fee_rate(), 5);
    }

    #[test]
    fn test_set_fee_rate_bounded() {
        let mut engine = engine_with_funds(SettlementVariant::MinFill, 1, &[]);
        let authority = *engine.authority();

        let result = engine.set_fee_rate(authority, 101);
        assert_eq!(result, Err(EngineError::FeeRateOutOfRange { rate: 101 }));
        assert_eq!(engine.fee_rate(), 1);
    }

    #[test]
    fn test_new_rejects_out_of_range_initial_rate() {
        let result = SettlementEngine::new(
            InMemoryLedger::new(),
            AccountId::new(),
            150,
            SettlementVariant::MinFill,
        );
        assert!(matches!(
            result,
            Err(EngineError::FeeRateOutOfRange { rate: 150 })
        ));
    }

    #[test]
    fn test_events_logged_per_operation() {
        let trader = AccountId::new();
        let mut engine =
            engine_with_funds(SettlementVariant::MinFill, 1, &[(trader, "BTC", 100)]);
        let authority = *engine.authority();

        let id = engine.submit(trader, "BTC", Decimal::from(40)).unwrap();
        engine.set_fee_rate(authority, 2).unwrap();
        engine.cancel(trader, id).unwrap();

        let events = engine.drain_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], EngineEvent::OrderSubmitted(_)));
        assert!(matches!(events[1], EngineEvent::FeeRateChanged(_)));
        assert!(matches!(events[2], EngineEvent::OrderCancelled(_)));
        assert!(engine.events().is_empty());
    }
}
