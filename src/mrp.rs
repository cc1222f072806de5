//! The "student" Markov reward process: rewards belong to states and the
//! only decision is to carry on.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

use crate::error::{ensure_probability, MdpError};
use crate::model::{ensure_legal, MdpModel, Transition};
use crate::policy::Policy;
use crate::random::{RandomStream, WeightedOutcomes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Activity {
    Class1,
    Class2,
    Class3,
    Pass,
    Pub,
    Facebook,
    Sleep,
}

impl Activity {
    pub const ALL: [Activity; 7] = [
        Activity::Class1,
        Activity::Class2,
        Activity::Class3,
        Activity::Pass,
        Activity::Pub,
        Activity::Facebook,
        Activity::Sleep,
    ];

    /// Reward for spending a period in this state.
    pub fn reward(self) -> f64 {
        match self {
            Activity::Facebook => -1.0,
            Activity::Class1 | Activity::Class2 | Activity::Class3 => -2.0,
            Activity::Pub => 1.0,
            Activity::Pass => 10.0,
            Activity::Sleep => 0.0,
        }
    }

    /// Successors in sampling order; empty for the terminal state.
    fn successors(self) -> &'static [(Activity, f64)] {
        use Activity::*;
        match self {
            Facebook => &[(Facebook, 0.9), (Class1, 0.1)],
            Class1 => &[(Facebook, 0.5), (Class2, 0.5)],
            Class2 => &[(Class3, 0.8), (Sleep, 0.2)],
            Class3 => &[(Pass, 0.6), (Pub, 0.4)],
            Pub => &[(Class1, 0.2), (Class2, 0.4), (Class3, 0.4)],
            Pass => &[(Sleep, 1.0)],
            Sleep => &[],
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The single action of a reward process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Advance;

impl fmt::Display for Advance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "advance")
    }
}

/// The state that was left and the reward it paid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MrpInfo {
    pub left: Activity,
    pub reward: f64,
}

impl fmt::Display for MrpInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "R({}) = {}", self.left, self.reward)
    }
}

/// Reward process settings, read from the `[mrp]` table.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MrpConfig {
    pub gamma: f64,
    pub start: Activity,
    pub steps: usize,
}

impl Default for MrpConfig {
    fn default() -> Self {
        MrpConfig {
            gamma: 0.99,
            start: Activity::Class1,
            steps: 100,
        }
    }
}

/// Each step earns the reward of the state being left, so an episode's
/// rewards are R(s_0), R(s_1), ... up to the terminal Sleep (worth 0).
#[derive(Debug, Clone)]
pub struct MrpModel {
    gamma: f64,
    chains: HashMap<Activity, WeightedOutcomes<Activity>>,
}

impl MrpModel {
    pub fn new(cfg: &MrpConfig) -> Result<MrpModel, MdpError> {
        ensure_probability("gamma", cfg.gamma)?;
        let mut chains = HashMap::new();
        for a in Activity::ALL {
            let successors = a.successors();
            if !successors.is_empty() {
                chains.insert(a, WeightedOutcomes::new(successors.to_vec())?);
            }
        }
        Ok(MrpModel {
            gamma: cfg.gamma,
            chains,
        })
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn successors(&self, state: Activity) -> Option<&WeightedOutcomes<Activity>> {
        self.chains.get(&state)
    }
}

impl MdpModel for MrpModel {
    type State = Activity;
    type Action = Advance;
    type Info = MrpInfo;

    fn name(&self) -> &'static str {
        "mrp"
    }

    fn legal_actions(&self, state: &Activity) -> Vec<Advance> {
        if self.is_terminal(state) {
            return Vec::new();
        }
        vec![Advance]
    }

    fn step(
        &self,
        state: &Activity,
        action: Advance,
        rng: &mut RandomStream,
    ) -> Result<Transition<Activity, MrpInfo>, MdpError> {
        ensure_legal(self, state, &action)?;
        let chain = self
            .chains
            .get(state)
            .ok_or_else(|| MdpError::NoLegalActions {
                state: state.to_string(),
            })?;
        let reward = state.reward();
        Ok(Transition {
            next_state: *chain.sample(rng),
            reward,
            info: MrpInfo {
                left: *state,
                reward,
            },
        })
    }

    fn is_terminal(&self, state: &Activity) -> bool {
        !self.chains.contains_key(state)
    }
}

/// Follows the chain without consuming a draw.
#[derive(Debug, Default, Clone, Copy)]
pub struct Drift;

impl Policy<MrpModel> for Drift {
    fn name(&self) -> &str {
        "drift"
    }

    fn choose(
        &self,
        _model: &MrpModel,
        _state: &Activity,
        _rng: &mut RandomStream,
    ) -> Result<Advance, MdpError> {
        Ok(Advance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EndReason, Engine};
    use approx::assert_abs_diff_eq;
    use rand::rngs::mock::StepRng;

    fn model() -> MrpModel {
        MrpModel::new(&MrpConfig::default()).unwrap()
    }

    fn pinned(eighths: u64) -> RandomStream {
        RandomStream::from_rng(StepRng::new(eighths << 61, 0))
    }

    fn engine(model: &MrpModel) -> Engine {
        Engine::new(100).with_discount(model.gamma()).unwrap()
    }

    #[test]
    fn successor_tables_are_distributions() {
        let model = model();
        for a in Activity::ALL {
            match model.successors(a) {
                Some(chain) => {
                    let total: f64 = chain.probabilities().map(|(_, p)| p).sum();
                    assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
                }
                None => assert_eq!(a, Activity::Sleep),
            }
        }
    }

    #[test]
    fn middle_draws_pass_the_course() {
        // Arrange: every draw is 0.5, so Class1 -> Class2 -> Class3 -> Pass -> Sleep
        let model = model();
        let mut rng = pinned(4);
        // Act
        let episode = engine(&model)
            .run(&model, &Drift, Activity::Class1, &mut rng)
            .unwrap();
        // Assert
        let path: Vec<Activity> = episode.trajectory.steps().iter().map(|s| s.next_state).collect();
        assert_eq!(
            path,
            vec![Activity::Class2, Activity::Class3, Activity::Pass, Activity::Sleep]
        );
        assert_eq!(episode.end_reason, EndReason::Terminated);
        assert_abs_diff_eq!(episode.total_reward, 4.0);
        // -2 - 0.99*2 - 0.99^2*2 + 0.99^3*10
        assert_abs_diff_eq!(episode.discounted_return.unwrap(), 3.76279, epsilon = 1e-9);
    }

    #[test]
    fn high_draws_fall_asleep_early() {
        // Arrange: 0.875 takes the last branch, Class1 -> Class2 -> Sleep
        let model = model();
        let mut rng = pinned(7);
        // Act
        let episode = engine(&model)
            .run(&model, &Drift, Activity::Class1, &mut rng)
            .unwrap();
        // Assert
        assert_eq!(episode.trajectory.len(), 2);
        assert_eq!(episode.final_state(), Activity::Sleep);
        assert_abs_diff_eq!(episode.total_reward, -4.0);
        assert_abs_diff_eq!(episode.discounted_return.unwrap(), -3.98, epsilon = 1e-12);
        let last = episode.trajectory.last().unwrap();
        assert_eq!(last.info.left, Activity::Class2);
    }

    #[test]
    fn zero_draws_loop_on_facebook_until_the_bound() {
        let model = model();
        let mut rng = pinned(0);
        let episode = Engine::new(5)
            .run(&model, &Drift, Activity::Facebook, &mut rng)
            .unwrap();
        assert_eq!(episode.end_reason, EndReason::StepLimitReached);
        assert_eq!(episode.final_state(), Activity::Facebook);
        assert_abs_diff_eq!(episode.total_reward, -5.0);
        assert!(episode.discounted_return.is_none());
    }

    #[test]
    fn sleep_is_terminal() {
        // Arrange
        let model = model();
        let mut rng = RandomStream::seed(0);
        // Act
        let episode = engine(&model)
            .run(&model, &Drift, Activity::Sleep, &mut rng)
            .unwrap();
        // Assert
        assert!(model.legal_actions(&Activity::Sleep).is_empty());
        assert!(episode.trajectory.is_empty());
        assert_eq!(episode.end_reason, EndReason::Terminated);
        assert_eq!(episode.discounted_return, Some(0.0));
        assert!(matches!(
            model.step(&Activity::Sleep, Advance, &mut rng),
            Err(MdpError::IllegalAction { .. })
        ));
    }

    #[test]
    fn seeded_episodes_end_asleep_with_matching_return() {
        let model = model();
        for seed in 0..30 {
            let mut rng = RandomStream::seed(seed);
            let episode = engine(&model)
                .run(&model, &Drift, Activity::Class1, &mut rng)
                .unwrap();
            if episode.end_reason == EndReason::Terminated {
                assert_eq!(episode.final_state(), Activity::Sleep);
            }
            let mut g = 0.0;
            let mut weight = 1.0;
            for step in episode.trajectory.steps() {
                assert_abs_diff_eq!(step.reward, step.state.reward());
                g += weight * step.reward;
                weight *= 0.99;
            }
            assert_abs_diff_eq!(episode.discounted_return.unwrap(), g, epsilon = 1e-9);
        }
    }

    #[test]
    fn rejects_gamma_above_one() {
        let cfg = MrpConfig {
            gamma: 1.2,
            ..Default::default()
        };
        assert!(MrpModel::new(&cfg).is_err());
    }
}
