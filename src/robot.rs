use std::fmt;

use serde::Deserialize;

use crate::error::{ensure_non_negative, ensure_probability, MdpError};
use crate::model::{ensure_legal, MdpModel, Transition};
use crate::policy::Policy;
use crate::random::RandomStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Stability {
    Stable,
    Wobbly,
    Fallen,
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gait {
    /// Safer and slower.
    SmallStep,
    /// Faster and riskier.
    BigStep,
    /// Regain stability, possibly giving up ground.
    Recover,
}

impl Gait {
    pub const ALL: [Gait; 3] = [Gait::SmallStep, Gait::BigStep, Gait::Recover];
}

impl fmt::Display for Gait {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WalkerState {
    pub position: u32,
    pub stability: Stability,
}

impl WalkerState {
    pub fn new(position: u32, stability: Stability) -> WalkerState {
        WalkerState { position, stability }
    }
}

impl fmt::Display for WalkerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.position, self.stability)
    }
}

/// Sampled movement for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkInfo {
    /// Signed change in position after clamping to the track.
    pub progress: i64,
    pub stability: Stability,
    pub reached_goal: bool,
}

impl fmt::Display for WalkInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "progress: {:+}, stability: {}", self.progress, self.stability)?;
        if self.reached_goal {
            write!(f, ", goal reached")?;
        }
        Ok(())
    }
}

/// Robot walking settings, read from the `[robot]` table.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RobotConfig {
    pub goal: u32,
    /// Extra chance of falling on a slip while not Stable.
    pub wobbly_fall_bonus: f64,
    pub small_advance: f64,
    pub small_keep: f64,
    pub small_wobble: f64,
    pub big_advance_two: f64,
    pub big_advance_one: f64,
    pub big_wobble: f64,
    pub big_fall: f64,
    pub recover_slip_back: f64,
    pub recover_stable: f64,
    pub recover_wobbly: f64,
    pub progress_weight: f64,
    pub wobbly_penalty: f64,
    pub fall_penalty: f64,
    pub goal_bonus: f64,
    pub start_position: u32,
    pub start_stability: Stability,
    pub steps: usize,
}

impl Default for RobotConfig {
    fn default() -> Self {
        RobotConfig {
            goal: 10,
            wobbly_fall_bonus: 0.15,
            small_advance: 0.75,
            small_keep: 0.80,
            small_wobble: 0.15,
            big_advance_two: 0.70,
            big_advance_one: 0.20,
            big_wobble: 0.60,
            big_fall: 0.05,
            recover_slip_back: 0.40,
            recover_stable: 0.70,
            recover_wobbly: 0.25,
            progress_weight: 1.0,
            wobbly_penalty: 0.5,
            fall_penalty: 10.0,
            goal_bonus: 5.0,
            start_position: 0,
            start_stability: Stability::Stable,
            steps: 30,
        }
    }
}

impl RobotConfig {
    pub fn start_state(&self) -> WalkerState {
        WalkerState::new(self.start_position, self.start_stability)
    }

    fn validate(&self) -> Result<(), MdpError> {
        if self.goal == 0 {
            return Err(MdpError::invalid("goal", 0, "must be positive"));
        }
        for (name, p) in [
            ("wobbly_fall_bonus", self.wobbly_fall_bonus),
            ("small_advance", self.small_advance),
            ("small_keep", self.small_keep),
            ("small_wobble", self.small_wobble),
            ("big_advance_two", self.big_advance_two),
            ("big_advance_one", self.big_advance_one),
            ("big_wobble", self.big_wobble),
            ("big_fall", self.big_fall),
            ("recover_slip_back", self.recover_slip_back),
            ("recover_stable", self.recover_stable),
            ("recover_wobbly", self.recover_wobbly),
        ] {
            ensure_probability(name, p)?;
        }
        for (name, total) in [
            ("small_keep + small_wobble", self.small_keep + self.small_wobble),
            ("big_advance_two + big_advance_one", self.big_advance_two + self.big_advance_one),
            ("big_wobble + big_fall + wobbly_fall_bonus", self.big_wobble + self.big_fall + self.wobbly_fall_bonus),
            ("recover_stable + recover_wobbly", self.recover_stable + self.recover_wobbly),
        ] {
            if total > 1.0 + 1e-9 {
                return Err(MdpError::invalid(name, total, "probabilities must not exceed 1 in total"));
            }
        }
        ensure_non_negative("progress_weight", self.progress_weight)?;
        ensure_non_negative("wobbly_penalty", self.wobbly_penalty)?;
        ensure_non_negative("fall_penalty", self.fall_penalty)?;
        ensure_non_negative("goal_bonus", self.goal_bonus)?;
        Ok(())
    }
}

/// A one-dimensional walker trying to reach the goal without falling.
///
/// Episodes end when the walker falls or reaches the goal; terminal states
/// have no legal actions.
#[derive(Debug, Clone)]
pub struct RobotModel {
    cfg: RobotConfig,
}

impl RobotModel {
    pub fn new(cfg: &RobotConfig) -> Result<RobotModel, MdpError> {
        cfg.validate()?;
        Ok(RobotModel { cfg: cfg.clone() })
    }

    pub fn goal(&self) -> u32 {
        self.cfg.goal
    }

    fn wobble_factor(&self, stability: Stability) -> f64 {
        match stability {
            Stability::Stable => 0.0,
            _ => self.cfg.wobbly_fall_bonus,
        }
    }

    /// Position change drawn for `gait`, before clamping.
    fn sample_advance(&self, gait: Gait, rng: &mut RandomStream) -> i64 {
        let c = &self.cfg;
        let u = rng.uniform();
        match gait {
            Gait::SmallStep => i64::from(u < c.small_advance),
            Gait::BigStep if u < c.big_advance_two => 2,
            Gait::BigStep if u < c.big_advance_two + c.big_advance_one => 1,
            Gait::BigStep => 0,
            Gait::Recover if u < c.recover_slip_back => -1,
            Gait::Recover => 0,
        }
    }

    fn sample_stability(&self, gait: Gait, current: Stability, rng: &mut RandomStream) -> Stability {
        let c = &self.cfg;
        let wobble = self.wobble_factor(current);
        let v = rng.uniform();
        match gait {
            Gait::SmallStep if v < c.small_keep => current,
            Gait::SmallStep if v < c.small_keep + c.small_wobble => Stability::Wobbly,
            Gait::SmallStep => {
                if rng.uniform() < wobble {
                    Stability::Fallen
                } else {
                    Stability::Wobbly
                }
            }
            Gait::BigStep if v < c.big_wobble => Stability::Wobbly,
            Gait::BigStep if v < 1.0 - (c.big_fall + wobble) => current,
            Gait::BigStep => Stability::Fallen,
            Gait::Recover if v < c.recover_stable => Stability::Stable,
            Gait::Recover if v < c.recover_stable + c.recover_wobbly => Stability::Wobbly,
            Gait::Recover => Stability::Fallen,
        }
    }

    fn reward(&self, info: &WalkInfo) -> f64 {
        let c = &self.cfg;
        let mut r = c.progress_weight * info.progress as f64;
        match info.stability {
            Stability::Wobbly => r -= c.wobbly_penalty,
            Stability::Fallen => r -= c.fall_penalty,
            Stability::Stable => {}
        }
        if info.reached_goal {
            r += c.goal_bonus;
        }
        r
    }
}

impl MdpModel for RobotModel {
    type State = WalkerState;
    type Action = Gait;
    type Info = WalkInfo;

    fn name(&self) -> &'static str {
        "robot"
    }

    fn legal_actions(&self, state: &WalkerState) -> Vec<Gait> {
        if self.is_terminal(state) {
            return Vec::new();
        }
        Gait::ALL.to_vec()
    }

    fn contains(&self, state: &WalkerState) -> bool {
        state.position <= self.cfg.goal
    }

    fn step(
        &self,
        state: &WalkerState,
        action: Gait,
        rng: &mut RandomStream,
    ) -> Result<Transition<WalkerState, WalkInfo>, MdpError> {
        ensure_legal(self, state, &action)?;
        let advance = self.sample_advance(action, rng);
        let stability = self.sample_stability(action, state.stability, rng);

        let position = (i64::from(state.position) + advance).clamp(0, i64::from(self.cfg.goal)) as u32;
        let info = WalkInfo {
            progress: i64::from(position) - i64::from(state.position),
            stability,
            reached_goal: position == self.cfg.goal,
        };
        Ok(Transition {
            next_state: WalkerState::new(position, stability),
            reward: self.reward(&info),
            info,
        })
    }

    fn is_terminal(&self, state: &WalkerState) -> bool {
        state.stability == Stability::Fallen || state.position >= self.cfg.goal
    }
}

/// Recover while wobbly, otherwise take big steps.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkingPolicy;

impl Policy<RobotModel> for WalkingPolicy {
    fn name(&self) -> &str {
        "walking"
    }

    fn choose(
        &self,
        _model: &RobotModel,
        state: &WalkerState,
        _rng: &mut RandomStream,
    ) -> Result<Gait, MdpError> {
        Ok(match state.stability {
            Stability::Wobbly => Gait::Recover,
            _ => Gait::BigStep,
        })
    }
}
