use std::fmt;

use crate::error::{ensure_non_negative, MdpError};
use crate::model::MdpModel;
use crate::policy::Policy;
use crate::random::RandomStream;

/// Units moved through the stock during one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockOutcome {
    /// Quantity ordered or produced this period (the action).
    pub added: u32,
    /// Stock on hand after adding, capped at the maximum inventory.
    pub available: u32,
    pub demand: u32,
    pub sales: u32,
    /// Demand that could not be served. Lost, not back-ordered.
    pub unmet: u32,
    /// Stock carried into the next period.
    pub ending: u32,
}

impl fmt::Display for StockOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "available: {}, demand: {}, sales: {}, unmet: {}",
            self.available, self.demand, self.sales, self.unmet
        )
    }
}

/// Add `added` units to `inventory` (capped at `max_inventory`) and serve
/// `demand` from what is on hand.
pub fn settle(inventory: u32, added: u32, max_inventory: u32, demand: u32) -> StockOutcome {
    let available = inventory.saturating_add(added).min(max_inventory);
    let sales = available.min(demand);
    let unmet = demand.saturating_sub(available);
    StockOutcome {
        added,
        available,
        demand,
        sales,
        unmet,
        ending: available - sales,
    }
}

/// Prices and costs of a single-product stock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StockCosts {
    pub price: f64,
    /// Charged per unit ordered or produced.
    pub unit_cost: f64,
    /// Charged once whenever anything is ordered or produced.
    pub setup_cost: f64,
    pub holding_cost: f64,
    pub shortage_penalty: f64,
}

impl StockCosts {
    pub fn validated(self) -> Result<StockCosts, MdpError> {
        ensure_non_negative("price", self.price)?;
        ensure_non_negative("unit_cost", self.unit_cost)?;
        ensure_non_negative("setup_cost", self.setup_cost)?;
        ensure_non_negative("holding_cost", self.holding_cost)?;
        ensure_non_negative("shortage_penalty", self.shortage_penalty)?;
        Ok(self)
    }

    /// One-period profit.
    pub fn profit(&self, o: &StockOutcome) -> f64 {
        let setup = if o.added > 0 { self.setup_cost } else { 0.0 };
        self.price * f64::from(o.sales)
            - self.unit_cost * f64::from(o.added)
            - setup
            - self.holding_cost * f64::from(o.ending)
            - self.shortage_penalty * f64::from(o.unmet)
    }
}

/// Models whose action is a quantity added to a stock.
pub trait StockControl: MdpModel<Action = u32> {
    fn inventory(&self, state: &Self::State) -> u32;

    /// Largest quantity allowed in `state`.
    fn max_quantity(&self, state: &Self::State) -> u32;
}

/// Reorder-point rule: below `reorder_point`, bring stock up to
/// `order_up_to`, never exceeding the quantity allowed in the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderPolicy {
    pub reorder_point: u32,
    pub order_up_to: u32,
}

impl ReorderPolicy {
    /// Produce or order up to `target` whenever stock is below it.
    pub fn target(target: u32) -> ReorderPolicy {
        ReorderPolicy {
            reorder_point: target,
            order_up_to: target,
        }
    }
}

impl<M: StockControl> Policy<M> for ReorderPolicy {
    fn name(&self) -> &str {
        "reorder"
    }

    fn choose(
        &self,
        model: &M,
        state: &M::State,
        _rng: &mut RandomStream,
    ) -> Result<u32, MdpError> {
        let inventory = model.inventory(state);
        if inventory >= self.reorder_point {
            return Ok(0);
        }
        let gap = self.order_up_to.saturating_sub(inventory);
        Ok(gap.min(model.max_quantity(state)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    #[test_case(0, 3, 5, 1, 3, 1, 0, 2; "Partial sale")]
    #[test_case(2, 0, 5, 4, 2, 2, 2, 0; "Stockout")]
    #[test_case(4, 3, 5, 0, 5, 0, 0, 5; "Order capped at max")]
    #[test_case(0, 0, 5, 0, 0, 0, 0, 0; "Nothing happens")]
    fn settle_cases(
        inv: u32, added: u32, max: u32, demand: u32,
        available: u32, sales: u32, unmet: u32, ending: u32,
    ) {
        // Act
        let o = settle(inv, added, max, demand);
        // Assert
        assert_eq!(o.available, available);
        assert_eq!(o.sales, sales);
        assert_eq!(o.unmet, unmet);
        assert_eq!(o.ending, ending);
        assert_eq!(o.sales + o.ending, o.available);
    }

    #[test]
    fn profit_charges_the_full_order() {
        // Arrange: order 3 on top of 4 with a cap of 5, sell 2
        let costs = StockCosts {
            price: 5.0,
            unit_cost: 2.0,
            setup_cost: 0.0,
            holding_cost: 1.0,
            shortage_penalty: 4.0,
        };
        let o = settle(4, 3, 5, 2);
        // Act / Assert: 10 - 6 - 3
        assert_abs_diff_eq!(costs.profit(&o), 1.0);
    }

    #[test]
    fn setup_cost_only_when_adding() {
        let costs = StockCosts {
            price: 6.0,
            unit_cost: 2.0,
            setup_cost: 2.0,
            holding_cost: 1.0,
            shortage_penalty: 5.0,
        };
        // 6*2 - 2*2 - 2 - 1*1 = 5
        assert_abs_diff_eq!(costs.profit(&settle(1, 2, 8, 2)), 5.0);
        // 6*1 - 1*0 - 5*2 = -4
        assert_abs_diff_eq!(costs.profit(&settle(1, 0, 8, 3)), -4.0);
    }

    #[test]
    fn negative_costs_are_invalid() {
        let costs = StockCosts {
            price: 1.0,
            unit_cost: 1.0,
            setup_cost: -0.5,
            holding_cost: 1.0,
            shortage_penalty: 1.0,
        };
        assert!(costs.validated().is_err());
    }
}
