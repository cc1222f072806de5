use std::fmt;

use serde::Deserialize;

use crate::error::MdpError;
use crate::model::{ensure_legal, MdpModel, Transition};
use crate::policy::Policy;
use crate::random::RandomStream;
use crate::regime::{Regime, RegimeChain};

/// Coarse wealth bucket, ordered from poorest to richest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum Wealth {
    Low,
    Mid,
    High,
}

impl fmt::Display for Wealth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Market {
    Bear,
    Bull,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Regime for Market {
    const ALL: &'static [Self] = &[Market::Bear, Market::Bull];
}

/// Target share of the risky asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Allocation {
    RiskOff,
    Balanced,
    RiskOn,
}

impl Allocation {
    pub const ALL: [Allocation; 3] = [Allocation::RiskOff, Allocation::Balanced, Allocation::RiskOn];
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortfolioState {
    pub wealth: Wealth,
    pub market: Market,
}

impl PortfolioState {
    pub fn new(wealth: Wealth, market: Market) -> PortfolioState {
        PortfolioState { wealth, market }
    }
}

impl fmt::Display for PortfolioState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.wealth, self.market)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortfolioInfo {
    /// Market regime the allocation was exposed to.
    pub market: Market,
    pub wealth_before: Wealth,
    pub wealth_after: Wealth,
}

impl fmt::Display for PortfolioInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "market: {}, wealth: {} -> {}",
            self.market, self.wealth_before, self.wealth_after
        )
    }
}

/// Portfolio settings, read from the `[portfolio]` table.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PortfolioConfig {
    pub market_persistence: f64,
    pub start_wealth: Wealth,
    pub start_market: Market,
    pub steps: usize,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        PortfolioConfig {
            market_persistence: 0.7,
            start_wealth: Wealth::Mid,
            start_market: Market::Bear,
            steps: 10,
        }
    }
}

impl PortfolioConfig {
    pub fn start_state(&self) -> PortfolioState {
        PortfolioState::new(self.start_wealth, self.start_market)
    }
}

/// Wealth moves to `candidate` with probability `p`, otherwise to `fallback`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct WealthMove {
    candidate: Wealth,
    p: f64,
    fallback: Wealth,
}

const fn shift(candidate: Wealth, p: f64, fallback: Wealth) -> WealthMove {
    WealthMove { candidate, p, fallback }
}

const fn stay(w: Wealth) -> WealthMove {
    shift(w, 1.0, w)
}

/// Wealth dynamics for an allocation held through one market period.
fn wealth_move(a: Allocation, m: Market, w: Wealth) -> WealthMove {
    use Allocation::*;
    use Market::*;
    use Wealth::{High, Low, Mid};

    match (a, m, w) {
        (RiskOff, _, Low) => shift(Mid, 0.4, Low),
        (RiskOff, _, Mid) => shift(High, 0.2, Mid),
        (RiskOff, _, High) => stay(High),

        (Balanced, Bull, Low) => shift(Mid, 0.7, Low),
        (Balanced, Bull, Mid) => shift(High, 0.5, Mid),
        (Balanced, Bull, High) => shift(High, 0.8, Mid),
        (Balanced, Bear, High) => shift(Mid, 0.5, High),
        (Balanced, Bear, Mid) => shift(Low, 0.3, Mid),
        (Balanced, Bear, Low) => stay(Low),

        (RiskOn, Bull, Low) => shift(Mid, 0.8, Low),
        (RiskOn, Bull, Mid) => shift(High, 0.7, Mid),
        (RiskOn, Bull, High) => stay(High),
        (RiskOn, Bear, High) => shift(Mid, 0.8, High),
        (RiskOn, Bear, Mid) => shift(Low, 0.6, Mid),
        (RiskOn, Bear, Low) => stay(Low),
    }
}

/// Toy asset allocation problem: wealth drifts with the allocation and a
/// bull/bear market regime. Fixed horizon.
#[derive(Debug, Clone)]
pub struct PortfolioModel {
    markets: RegimeChain<Market>,
}

impl PortfolioModel {
    pub fn new(cfg: &PortfolioConfig) -> Result<PortfolioModel, MdpError> {
        Ok(PortfolioModel {
            markets: RegimeChain::persistent("market_persistence", cfg.market_persistence)?,
        })
    }

    pub fn markets(&self) -> &RegimeChain<Market> {
        &self.markets
    }
}

impl MdpModel for PortfolioModel {
    type State = PortfolioState;
    type Action = Allocation;
    type Info = PortfolioInfo;

    fn name(&self) -> &'static str {
        "portfolio"
    }

    fn legal_actions(&self, _state: &PortfolioState) -> Vec<Allocation> {
        Allocation::ALL.to_vec()
    }

    fn step(
        &self,
        state: &PortfolioState,
        action: Allocation,
        rng: &mut RandomStream,
    ) -> Result<Transition<PortfolioState, PortfolioInfo>, MdpError> {
        ensure_legal(self, state, &action)?;
        let mv = wealth_move(action, state.market, state.wealth);
        let wealth = if rng.uniform() < mv.p {
            mv.candidate
        } else {
            mv.fallback
        };
        let market = self.markets.sample_next(state.market, rng);

        let reward = match wealth.cmp(&state.wealth) {
            std::cmp::Ordering::Greater => 1.0,
            std::cmp::Ordering::Less => -1.0,
            std::cmp::Ordering::Equal => 0.0,
        };
        Ok(Transition {
            next_state: PortfolioState::new(wealth, market),
            reward,
            info: PortfolioInfo {
                market: state.market,
                wealth_before: state.wealth,
                wealth_after: wealth,
            },
        })
    }
}

/// Cautious in bear markets, fully invested in bull markets.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegimePolicy;

impl Policy<PortfolioModel> for RegimePolicy {
    fn name(&self) -> &str {
        "regime"
    }

    fn choose(
        &self,
        _model: &PortfolioModel,
        state: &PortfolioState,
        _rng: &mut RandomStream,
    ) -> Result<Allocation, MdpError> {
        Ok(match state.market {
            Market::Bear => Allocation::RiskOff,
            Market::Bull => Allocation::RiskOn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EndReason, Engine};
    use crate::policy::RandomPolicy;
    use approx::assert_abs_diff_eq;
    use rand::rngs::mock::StepRng;
    use test_case::test_case;

    fn model() -> PortfolioModel {
        PortfolioModel::new(&PortfolioConfig::default()).unwrap()
    }

    #[test]
    fn move_probabilities_are_valid() {
        for a in Allocation::ALL {
            for &m in Market::ALL {
                for w in [Wealth::Low, Wealth::Mid, Wealth::High] {
                    let mv = wealth_move(a, m, w);
                    assert!((0.0..=1.0).contains(&mv.p));
                }
            }
        }
    }

    #[test_case(Allocation::RiskOn, Market::Bull, Wealth::Mid, Wealth::High, 1.0; "Risk on in bull climbs")]
    #[test_case(Allocation::RiskOn, Market::Bear, Wealth::Mid, Wealth::Low, -1.0; "Risk on in bear drops")]
    #[test_case(Allocation::RiskOff, Market::Bear, Wealth::High, Wealth::High, 0.0; "Risk off at the top holds")]
    #[test_case(Allocation::Balanced, Market::Bull, Wealth::High, Wealth::High, 0.0; "Balanced bull stays high")]
    fn low_draw_takes_candidate(
        a: Allocation, market: Market, before: Wealth, after: Wealth, reward: f64,
    ) {
        // Arrange: a draw of 0 always takes the candidate, and lands in the
        // first market band (Bear) from either regime
        let model = model();
        let mut rng = RandomStream::from_rng(StepRng::new(0, 0));
        // Act
        let t = model
            .step(&PortfolioState::new(before, market), a, &mut rng)
            .unwrap();
        // Assert
        assert_eq!(t.next_state, PortfolioState::new(after, Market::Bear));
        assert_abs_diff_eq!(t.reward, reward);
    }

    #[test]
    fn high_draw_takes_fallback_and_switches_market() {
        // Arrange: 0.875 exceeds both the move probability and persistence
        let model = model();
        let mut rng = RandomStream::from_rng(StepRng::new(7 << 61, 0));
        // Act
        let t = model
            .step(&PortfolioState::new(Wealth::Mid, Market::Bear), Allocation::Balanced, &mut rng)
            .unwrap();
        // Assert
        assert_eq!(t.next_state, PortfolioState::new(Wealth::Mid, Market::Bull));
        assert_abs_diff_eq!(t.reward, 0.0);
    }

    #[test]
    fn regime_policy_follows_market() {
        let model = model();
        let mut rng = RandomStream::seed(0);
        let bear = PortfolioState::new(Wealth::Mid, Market::Bear);
        let bull = PortfolioState::new(Wealth::Mid, Market::Bull);
        assert_eq!(RegimePolicy.choose(&model, &bear, &mut rng).unwrap(), Allocation::RiskOff);
        assert_eq!(RegimePolicy.choose(&model, &bull, &mut rng).unwrap(), Allocation::RiskOn);
    }

    #[test]
    fn rewards_track_wealth_changes() {
        let model = model();
        let mut rng = RandomStream::seed(9);
        let episode = Engine::new(10)
            .run(&model, &RandomPolicy, PortfolioConfig::default().start_state(), &mut rng)
            .unwrap();
        assert_eq!(episode.end_reason, EndReason::StepLimitReached);
        for step in episode.trajectory.steps() {
            let expected = match step.next_state.wealth.cmp(&step.state.wealth) {
                std::cmp::Ordering::Greater => 1.0,
                std::cmp::Ordering::Less => -1.0,
                std::cmp::Ordering::Equal => 0.0,
            };
            assert_eq!(step.reward, expected);
        }
    }
}
