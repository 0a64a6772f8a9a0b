use rust_decimal::Decimal;
use serde::Serialize;

/// Mark-to-market view of one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionValuation {
    pub quantity: Decimal,
    pub average_cost: Decimal,
    /// Latest known price, or the average cost when no quote exists yet.
    pub price: Decimal,
    pub total_value: Decimal,
    pub cost_basis: Decimal,
    pub profit: Decimal,
    pub profit_percent: Decimal,
}

/// Value a position against the latest known price.
pub fn value_position(
    quantity: Decimal,
    average_cost: Decimal,
    latest_price: Option<Decimal>,
) -> PositionValuation {
    let price = latest_price.unwrap_or(average_cost);
    let total_value = quantity * price;
    let cost_basis = quantity * average_cost;
    let profit = total_value - cost_basis;

    PositionValuation {
        quantity,
        average_cost,
        price,
        total_value,
        cost_basis,
        profit,
        profit_percent: profit_percent(profit, cost_basis),
    }
}

/// `profit / cost_basis * 100`, or exactly zero when `cost_basis <= 0`.
pub fn profit_percent(profit: Decimal, cost_basis: Decimal) -> Decimal {
    if cost_basis <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    profit
        .checked_div(cost_basis)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
}
