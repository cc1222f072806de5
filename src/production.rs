use std::fmt;

use serde::Deserialize;

use crate::error::MdpError;
use crate::model::{ensure_legal, MdpModel, Transition};
use crate::random::{RandomStream, WeightedOutcomes};
use crate::regime::{Regime, RegimeChain};
use crate::stock::{settle, ReorderPolicy, StockControl, StockCosts, StockOutcome};

/// Machine availability regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum CapacityRegime {
    LowCap,
    HighCap,
}

impl fmt::Display for CapacityRegime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Regime for CapacityRegime {
    const ALL: &'static [Self] = &[CapacityRegime::LowCap, CapacityRegime::HighCap];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProductionState {
    pub inventory: u32,
    pub capacity: CapacityRegime,
}

impl ProductionState {
    pub fn new(inventory: u32, capacity: CapacityRegime) -> ProductionState {
        ProductionState { inventory, capacity }
    }
}

impl fmt::Display for ProductionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.inventory, self.capacity)
    }
}

/// What happened during one production period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductionInfo {
    /// Capacity in force when the production decision was made.
    pub capacity: u32,
    pub stock: StockOutcome,
}

impl fmt::Display for ProductionInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "capacity: {}, produced: {}, {}",
            self.capacity, self.stock.added, self.stock
        )
    }
}

/// Production planning settings, read from the `[production]` table.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProductionConfig {
    pub max_inventory: u32,
    pub capacity_low: u32,
    pub capacity_high: u32,
    pub price: f64,
    pub production_cost: f64,
    /// Fixed changeover cost paid whenever anything is produced.
    pub setup_cost: f64,
    pub holding_cost: f64,
    pub backlog_penalty: f64,
    pub regime_persistence: f64,
    /// Equally likely demand values; demand does not depend on capacity.
    pub demand: Vec<u32>,
    pub target_inventory: u32,
    pub start_inventory: u32,
    pub start_regime: CapacityRegime,
    pub steps: usize,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        ProductionConfig {
            max_inventory: 8,
            capacity_low: 2,
            capacity_high: 5,
            price: 6.0,
            production_cost: 2.0,
            setup_cost: 2.0,
            holding_cost: 1.0,
            backlog_penalty: 5.0,
            regime_persistence: 0.75,
            demand: vec![0, 1, 2, 2, 3, 3, 4],
            target_inventory: 4,
            start_inventory: 3,
            start_regime: CapacityRegime::HighCap,
            steps: 12,
        }
    }
}

impl ProductionConfig {
    pub fn start_state(&self) -> ProductionState {
        ProductionState::new(self.start_inventory, self.start_regime)
    }

    pub fn heuristic(&self) -> ReorderPolicy {
        ReorderPolicy::target(self.target_inventory)
    }
}

/// Single-product production line with a capacity that switches between
/// two levels.
#[derive(Debug, Clone)]
pub struct ProductionModel {
    max_inventory: u32,
    capacity_low: u32,
    capacity_high: u32,
    costs: StockCosts,
    demand: WeightedOutcomes<u32>,
    regimes: RegimeChain<CapacityRegime>,
}

impl ProductionModel {
    pub fn new(cfg: &ProductionConfig) -> Result<ProductionModel, MdpError> {
        if cfg.max_inventory == 0 {
            return Err(MdpError::invalid("max_inventory", 0, "must be positive"));
        }
        if cfg.capacity_low > cfg.capacity_high {
            return Err(MdpError::invalid(
                "capacity_low",
                cfg.capacity_low,
                "must not exceed capacity_high",
            ));
        }
        let costs = StockCosts {
            price: cfg.price,
            unit_cost: cfg.production_cost,
            setup_cost: cfg.setup_cost,
            holding_cost: cfg.holding_cost,
            shortage_penalty: cfg.backlog_penalty,
        }
        .validated()?;

        Ok(ProductionModel {
            max_inventory: cfg.max_inventory,
            capacity_low: cfg.capacity_low,
            capacity_high: cfg.capacity_high,
            costs,
            demand: WeightedOutcomes::uniform(cfg.demand.clone())?,
            regimes: RegimeChain::persistent("regime_persistence", cfg.regime_persistence)?,
        })
    }

    pub fn capacity(&self, regime: CapacityRegime) -> u32 {
        match regime {
            CapacityRegime::LowCap => self.capacity_low,
            CapacityRegime::HighCap => self.capacity_high,
        }
    }

    pub fn demand(&self) -> &WeightedOutcomes<u32> {
        &self.demand
    }

    pub fn regimes(&self) -> &RegimeChain<CapacityRegime> {
        &self.regimes
    }
}

impl MdpModel for ProductionModel {
    type State = ProductionState;
    type Action = u32;
    type Info = ProductionInfo;

    fn name(&self) -> &'static str {
        "production"
    }

    fn legal_actions(&self, state: &ProductionState) -> Vec<u32> {
        (0..=self.capacity(state.capacity)).collect()
    }

    fn is_legal(&self, state: &ProductionState, action: &u32) -> bool {
        *action <= self.capacity(state.capacity)
    }

    fn contains(&self, state: &ProductionState) -> bool {
        state.inventory <= self.max_inventory
    }

    fn step(
        &self,
        state: &ProductionState,
        action: u32,
        rng: &mut RandomStream,
    ) -> Result<Transition<ProductionState, ProductionInfo>, MdpError> {
        ensure_legal(self, state, &action)?;
        let demand = *self.demand.sample(rng);
        let stock = settle(state.inventory, action, self.max_inventory, demand);
        let capacity = self.regimes.sample_next(state.capacity, rng);
        Ok(Transition {
            next_state: ProductionState::new(stock.ending, capacity),
            reward: self.costs.profit(&stock),
            info: ProductionInfo {
                capacity: self.capacity(state.capacity),
                stock,
            },
        })
    }
}

impl StockControl for ProductionModel {
    fn inventory(&self, state: &ProductionState) -> u32 {
        state.inventory
    }

    fn max_quantity(&self, state: &ProductionState) -> u32 {
        self.capacity(state.capacity)
    }
}
