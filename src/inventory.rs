use std::fmt;

use serde::Deserialize;

use crate::error::MdpError;
use crate::model::{ensure_legal, MdpModel, Transition};
use crate::random::{RandomStream, WeightedOutcomes};
use crate::regime::{Regime, RegimeChain};
use crate::stock::{settle, ReorderPolicy, StockControl, StockCosts, StockOutcome};

/// Demand regime, itself a two-state Markov chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum DemandRegime {
    Low,
    High,
}

impl fmt::Display for DemandRegime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Regime for DemandRegime {
    const ALL: &'static [Self] = &[DemandRegime::Low, DemandRegime::High];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InventoryState {
    pub inventory: u32,
    pub regime: DemandRegime,
}

impl InventoryState {
    pub fn new(inventory: u32, regime: DemandRegime) -> InventoryState {
        InventoryState { inventory, regime }
    }
}

impl fmt::Display for InventoryState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.inventory, self.regime)
    }
}

/// Inventory control settings, read from the `[inventory]` table.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct InventoryConfig {
    pub max_inventory: u32,
    /// Largest order allowed while demand is low.
    pub max_order_low: u32,
    /// Largest order allowed while demand is high.
    pub max_order_high: u32,
    pub price: f64,
    pub order_cost: f64,
    pub holding_cost: f64,
    pub stockout_penalty: f64,
    /// Probability of keeping the current demand regime.
    pub regime_persistence: f64,
    /// Equally likely demand values in the low regime.
    pub low_demand: Vec<u32>,
    /// Equally likely demand values in the high regime.
    pub high_demand: Vec<u32>,
    pub reorder_point: u32,
    pub order_up_to: u32,
    pub start_inventory: u32,
    pub start_regime: DemandRegime,
    pub steps: usize,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        InventoryConfig {
            max_inventory: 6,
            max_order_low: 3,
            max_order_high: 3,
            price: 5.0,
            order_cost: 2.0,
            holding_cost: 1.0,
            stockout_penalty: 4.0,
            regime_persistence: 0.75,
            low_demand: vec![0, 1, 1, 2],
            high_demand: vec![1, 2, 3, 3, 4],
            reorder_point: 4,
            order_up_to: 4,
            start_inventory: 3,
            start_regime: DemandRegime::Low,
            steps: 12,
        }
    }
}

impl InventoryConfig {
    pub fn start_state(&self) -> InventoryState {
        InventoryState::new(self.start_inventory, self.start_regime)
    }

    pub fn heuristic(&self) -> ReorderPolicy {
        ReorderPolicy {
            reorder_point: self.reorder_point,
            order_up_to: self.order_up_to,
        }
    }
}

/// Single-product inventory with immediate delivery and lost sales.
#[derive(Debug, Clone)]
pub struct InventoryModel {
    max_inventory: u32,
    max_order_low: u32,
    max_order_high: u32,
    costs: StockCosts,
    low_demand: WeightedOutcomes<u32>,
    high_demand: WeightedOutcomes<u32>,
    regimes: RegimeChain<DemandRegime>,
}

impl InventoryModel {
    pub fn new(cfg: &InventoryConfig) -> Result<InventoryModel, MdpError> {
        if cfg.max_inventory == 0 {
            return Err(MdpError::invalid("max_inventory", 0, "must be positive"));
        }
        let costs = StockCosts {
            price: cfg.price,
            unit_cost: cfg.order_cost,
            setup_cost: 0.0,
            holding_cost: cfg.holding_cost,
            shortage_penalty: cfg.stockout_penalty,
        }
        .validated()?;

        Ok(InventoryModel {
            max_inventory: cfg.max_inventory,
            max_order_low: cfg.max_order_low,
            max_order_high: cfg.max_order_high,
            costs,
            low_demand: WeightedOutcomes::uniform(cfg.low_demand.clone())?,
            high_demand: WeightedOutcomes::uniform(cfg.high_demand.clone())?,
            regimes: RegimeChain::persistent("regime_persistence", cfg.regime_persistence)?,
        })
    }

    pub fn max_order(&self, regime: DemandRegime) -> u32 {
        match regime {
            DemandRegime::Low => self.max_order_low,
            DemandRegime::High => self.max_order_high,
        }
    }

    pub fn demand(&self, regime: DemandRegime) -> &WeightedOutcomes<u32> {
        match regime {
            DemandRegime::Low => &self.low_demand,
            DemandRegime::High => &self.high_demand,
        }
    }

    pub fn regimes(&self) -> &RegimeChain<DemandRegime> {
        &self.regimes
    }
}

impl MdpModel for InventoryModel {
    type State = InventoryState;
    type Action = u32;
    type Info = StockOutcome;

    fn name(&self) -> &'static str {
        "inventory"
    }

    fn legal_actions(&self, state: &InventoryState) -> Vec<u32> {
        (0..=self.max_order(state.regime)).collect()
    }

    fn is_legal(&self, state: &InventoryState, action: &u32) -> bool {
        *action <= self.max_order(state.regime)
    }

    fn contains(&self, state: &InventoryState) -> bool {
        state.inventory <= self.max_inventory
    }

    fn step(
        &self,
        state: &InventoryState,
        action: u32,
        rng: &mut RandomStream,
    ) -> Result<Transition<InventoryState, StockOutcome>, MdpError> {
        ensure_legal(self, state, &action)?;
        let demand = *self.demand(state.regime).sample(rng);
        let outcome = settle(state.inventory, action, self.max_inventory, demand);
        let regime = self.regimes.sample_next(state.regime, rng);
        Ok(Transition {
            next_state: InventoryState::new(outcome.ending, regime),
            reward: self.costs.profit(&outcome),
            info: outcome,
        })
    }
}

impl StockControl for InventoryModel {
    fn inventory(&self, state: &InventoryState) -> u32 {
        state.inventory
    }

    fn max_quantity(&self, state: &InventoryState) -> u32 {
        self.max_order(state.regime)
    }
}
