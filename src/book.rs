//! Order book — keyed storage for live orders
//!
//! A plain keyed store: insert overwrites, get reads, remove is idempotent.
//! No operation here performs validation; that is the settlement engine's
//! responsibility. An order is live if and only if its record is present.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::{AccountId, OrderId};

/// One outstanding custodial position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Deterministic identifier, unique per live order
    pub id: OrderId,
    /// Account entitled to the matched counter-asset or a refund
    pub trader: AccountId,
    /// Asset held in custody for this order
    pub asset: String,
    /// Remaining quantity in custody; strictly positive while live
    pub amount: Decimal,
}

/// Mapping from identifier to live order record.
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: HashMap<OrderId, Order>,
}

impl OrderBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self {
            orders: HashMap::new(),
        }
    }

    /// Insert an order, unconditionally overwriting any record at its id.
    ///
    /// Returns the displaced record, if any.
    pub fn insert(&mut self, order: Order) -> Option<Order> {
        self.orders.insert(order.id, order)
    }

    /// Get the record at an id, if present.
    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    /// Remove the record at an id. Idempotent; returns the removed record.
    pub fn remove(&mut self, id: &OrderId) -> Option<Order> {
        self.orders.remove(id)
    }

    /// Check whether a record exists at an id.
    pub fn contains(&self, id: &OrderId) -> bool {
        self.orders.contains_key(id)
    }

    /// Number of live orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Check whether the book is empty.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Iterate over all live orders.
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id_byte: u8, amount: i64) -> Order {
        Order {
            id: OrderId::from_bytes([id_byte; 32]),
            trader: AccountId::new(),
            asset: "BTC".to_string(),
            amount: Decimal::from(amount),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut book = OrderBook::new();
        let o = order(1, 10);
        let id = o.id;
        assert!(book.insert(o.clone()).is_none());
        assert_eq!(book.get(&id), Some(&o));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_insert_overwrites_existing() {
        let mut book = OrderBook::new();
        let first = order(1, 10);
        let mut second = order(1, 25);
        second.trader = first.trader;

        book.insert(first.clone());
        let displaced = book.insert(second.clone());

        assert_eq!(displaced, Some(first));
        assert_eq!(book.get(&second.id), Some(&second));
        assert_eq!(book.len(), 1, "Overwrite must not grow the book");
    }

    #[test]
    fn test_get_absent_returns_none() {
        let book = OrderBook::new();
        assert!(book.get(&OrderId::from_bytes([9u8; 32])).is_none());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut book = OrderBook::new();
        let o = order(1, 10);
        let id = o.id;
        book.insert(o);

        assert!(book.remove(&id).is_some());
        assert!(book.remove(&id).is_none(), "Second remove is a no-op");
        assert!(book.is_empty());
    }

    #[test]
    fn test_iter_visits_all_orders() {
        let mut book = OrderBook::new();
        book.insert(order(1, 10));
        book.insert(order(2, 20));
        let total: Decimal = book.iter().map(|o| o.amount).sum();
        assert_eq!(total, Decimal::from(30));
    }
}
