//! Pure holding transitions. Nothing here touches storage; the service
//! commits the returned effects atomically.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PortfolioError;
use crate::models::{Holding, Id, Order, OrderSide};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
}

impl OrderRequest {
    pub fn buy(quantity: Decimal, price: Decimal) -> Self {
        Self {
            side: OrderSide::Buy,
            quantity,
            price,
        }
    }

    pub fn sell(quantity: Decimal, price: Decimal) -> Self {
        Self {
            side: OrderSide::Sell,
            quantity,
            price,
        }
    }

    fn validate(&self) -> Result<(), PortfolioError> {
        if self.quantity <= Decimal::ZERO {
            return Err(PortfolioError::InvalidQuantity(self.quantity));
        }
        if self.price <= Decimal::ZERO {
            return Err(PortfolioError::InvalidPrice(self.price));
        }
        Ok(())
    }
}

/// Updated holding plus the order that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEffect {
    pub holding: Holding,
    pub order: Order,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEffect {
    Save(Holding),
    /// The holding was fully liquidated.
    Delete(Holding),
}

/// Average cost after adding `added_quantity` at `price` to a position.
/// Zero when the resulting quantity is not positive.
pub fn weighted_average_cost(
    quantity: Decimal,
    average_cost: Decimal,
    added_quantity: Decimal,
    price: Decimal,
) -> Decimal {
    let new_quantity = quantity + added_quantity;
    if new_quantity <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let total_cost = quantity * average_cost + added_quantity * price;
    total_cost.checked_div(new_quantity).unwrap_or(Decimal::ZERO)
}

/// Apply a buy or sell to a holding.
///
/// A sell larger than the position fails with `InsufficientQuantity`. A sell
/// down to zero keeps the holding at zero quantity.
pub fn apply_order(
    holding: &Holding,
    request: &OrderRequest,
    executed_at: DateTime<Utc>,
) -> Result<OrderEffect, PortfolioError> {
    request.validate()?;

    let cost_snapshot = holding.average_cost;
    let mut next = holding.clone();
    let profit_snapshot = match request.side {
        OrderSide::Buy => {
            next.average_cost = weighted_average_cost(
                holding.quantity,
                holding.average_cost,
                request.quantity,
                request.price,
            );
            next.quantity = holding.quantity + request.quantity;
            None
        }
        OrderSide::Sell => {
            if request.quantity > holding.quantity {
                return Err(PortfolioError::InsufficientQuantity {
                    held: holding.quantity,
                    requested: request.quantity,
                });
            }
            next.quantity = holding.quantity - request.quantity;
            Some((request.price - holding.average_cost) * request.quantity)
        }
    };

    let order = Order {
        id: Id::new(),
        holding_id: holding.id.clone(),
        side: request.side,
        quantity: request.quantity,
        price: request.price,
        executed_at,
        cost_snapshot,
        profit_snapshot,
    };

    Ok(OrderEffect {
        holding: next,
        order,
    })
}

/// Apply a raw quantity delta. Positive deltas buy at `price`; negative
/// deltas sell without touching the average cost and delete the holding when
/// it reaches exactly zero.
pub fn apply_transaction(
    owner_id: &Id,
    instrument_id: &Id,
    existing: Option<&Holding>,
    quantity: Decimal,
    price: Decimal,
) -> Result<TransactionEffect, PortfolioError> {
    if quantity.is_zero() {
        return Err(PortfolioError::InvalidQuantity(quantity));
    }

    if quantity > Decimal::ZERO {
        if price < Decimal::ZERO {
            return Err(PortfolioError::InvalidPrice(price));
        }
        let holding = match existing {
            Some(holding) => {
                let mut next = holding.clone();
                next.average_cost =
                    weighted_average_cost(holding.quantity, holding.average_cost, quantity, price);
                next.quantity = holding.quantity + quantity;
                next
            }
            None => Holding::new(owner_id.clone(), instrument_id.clone(), quantity, price),
        };
        return Ok(TransactionEffect::Save(holding));
    }

    let Some(holding) = existing else {
        return Err(PortfolioError::NoSuchHolding(instrument_id.to_string()));
    };
    let remaining = holding.quantity + quantity;
    if remaining < Decimal::ZERO {
        return Err(PortfolioError::InsufficientQuantity {
            held: holding.quantity,
            requested: -quantity,
        });
    }
    if remaining.is_zero() {
        return Ok(TransactionEffect::Delete(holding.clone()));
    }

    let mut next = holding.clone();
    next.quantity = remaining;
    Ok(TransactionEffect::Save(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
    }

    fn empty() -> Holding {
        Holding::empty(Id::from_string("owner"), Id::from_string("abc"))
    }

    #[test]
    fn buy_buy_sell_scenario() {
        let h0 = empty();

        let first = apply_order(&h0, &OrderRequest::buy(dec!(10), dec!(5.0)), now()).unwrap();
        assert_eq!(first.holding.quantity, dec!(10));
        assert_eq!(first.holding.average_cost, dec!(5));
        assert_eq!(first.order.cost_snapshot, dec!(0));
        assert_eq!(first.order.profit_snapshot, None);

        let second =
            apply_order(&first.holding, &OrderRequest::buy(dec!(10), dec!(7.0)), now()).unwrap();
        assert_eq!(second.holding.quantity, dec!(20));
        assert_eq!(second.holding.average_cost, dec!(6));
        assert_eq!(second.order.cost_snapshot, dec!(5));

        let sell =
            apply_order(&second.holding, &OrderRequest::sell(dec!(5), dec!(9.0)), now()).unwrap();
        assert_eq!(sell.holding.quantity, dec!(15));
        assert_eq!(sell.holding.average_cost, dec!(6));
        assert_eq!(sell.order.profit_snapshot, Some(dec!(15)));
        assert_eq!(sell.order.cost_snapshot, dec!(6));
        assert_eq!(sell.order.holding_id, h0.id);
    }

    #[test]
    fn average_cost_independent_of_batching() {
        let split = {
            let a = apply_order(&empty(), &OrderRequest::buy(dec!(3), dec!(10)), now()).unwrap();
            apply_order(&a.holding, &OrderRequest::buy(dec!(7), dec!(20)), now()).unwrap()
        };
        // Blended price: (3*10 + 7*20) / 10 = 17
        let batched = apply_order(&empty(), &OrderRequest::buy(dec!(10), dec!(17)), now()).unwrap();
        assert_eq!(split.holding.average_cost, batched.holding.average_cost);
        assert_eq!(split.holding.quantity, batched.holding.quantity);
    }

    #[test]
    fn oversell_is_rejected() {
        let holding = Holding::new(Id::new(), Id::new(), dec!(2), dec!(4));
        let err = apply_order(&holding, &OrderRequest::sell(dec!(3), dec!(5)), now()).unwrap_err();
        assert!(matches!(
            err,
            PortfolioError::InsufficientQuantity { held, requested }
                if held == dec!(2) && requested == dec!(3)
        ));
    }

    #[test]
    fn selling_everything_keeps_a_zero_holding() {
        let holding = Holding::new(Id::new(), Id::new(), dec!(2), dec!(4));
        let effect = apply_order(&holding, &OrderRequest::sell(dec!(2), dec!(3)), now()).unwrap();
        assert_eq!(effect.holding.quantity, Decimal::ZERO);
        assert_eq!(effect.holding.average_cost, dec!(4));
        assert_eq!(effect.order.profit_snapshot, Some(dec!(-2)));
    }

    #[test]
    fn order_rejects_non_positive_values() {
        let holding = empty();
        assert!(matches!(
            apply_order(&holding, &OrderRequest::buy(dec!(0), dec!(1)), now()),
            Err(PortfolioError::InvalidQuantity(_))
        ));
        assert!(matches!(
            apply_order(&holding, &OrderRequest::buy(dec!(1), dec!(-1)), now()),
            Err(PortfolioError::InvalidPrice(_))
        ));
    }

    #[test]
    fn weighted_average_guards_zero_quantity() {
        assert_eq!(weighted_average_cost(dec!(0), dec!(0), dec!(0), dec!(5)), Decimal::ZERO);
        assert_eq!(weighted_average_cost(dec!(1), dec!(2), dec!(1), dec!(4)), dec!(3));
    }

    #[test]
    fn transaction_creates_then_averages() {
        let owner = Id::from_string("owner");
        let fund = Id::from_string("fund");

        let TransactionEffect::Save(first) =
            apply_transaction(&owner, &fund, None, dec!(4), dec!(2)).unwrap()
        else {
            panic!("expected save");
        };
        assert_eq!(first.quantity, dec!(4));
        assert_eq!(first.average_cost, dec!(2));

        let TransactionEffect::Save(second) =
            apply_transaction(&owner, &fund, Some(&first), dec!(4), dec!(4)).unwrap()
        else {
            panic!("expected save");
        };
        assert_eq!(second.id, first.id);
        assert_eq!(second.quantity, dec!(8));
        assert_eq!(second.average_cost, dec!(3));
    }

    #[test]
    fn negative_transaction_reduces_then_deletes() {
        let owner = Id::from_string("owner");
        let fund = Id::from_string("fund");
        let holding = Holding::new(owner.clone(), fund.clone(), dec!(5), dec!(3));

        let TransactionEffect::Save(reduced) =
            apply_transaction(&owner, &fund, Some(&holding), dec!(-2), dec!(100)).unwrap()
        else {
            panic!("expected save");
        };
        assert_eq!(reduced.quantity, dec!(3));
        assert_eq!(reduced.average_cost, dec!(3));

        let effect = apply_transaction(&owner, &fund, Some(&reduced), dec!(-3), dec!(0)).unwrap();
        assert_eq!(effect, TransactionEffect::Delete(reduced.clone()));

        assert!(matches!(
            apply_transaction(&owner, &fund, Some(&reduced), dec!(-4), dec!(0)),
            Err(PortfolioError::InsufficientQuantity { .. })
        ));
    }

    #[test]
    fn negative_transaction_without_holding_fails() {
        let err = apply_transaction(&Id::new(), &Id::new(), None, dec!(-1), dec!(1)).unwrap_err();
        assert_eq!(err.kind(), "no_such_holding");
    }
}
