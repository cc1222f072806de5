use tracing::{debug, info};

use crate::error::{ensure_probability, MdpError};
use crate::model::MdpModel;
use crate::policy::Policy;
use crate::random::RandomStream;
use crate::trajectory::{StepRecord, Trajectory};

/// Why an episode stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndReason {
    /// The model reported a terminal state.
    Terminated,
    /// The step bound was reached first.
    StepLimitReached,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EndReason::Terminated => write!(f, "terminated"),
            EndReason::StepLimitReached => write!(f, "step limit reached"),
        }
    }
}

/// Lifecycle of a rollout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EpisodeStatus {
    #[default]
    NotStarted,
    Running,
    Terminated,
    StepLimitReached,
}

impl EpisodeStatus {
    pub fn is_running(self) -> bool {
        matches!(self, EpisodeStatus::Running)
    }

    pub fn end_reason(self) -> Option<EndReason> {
        match self {
            EpisodeStatus::Terminated => Some(EndReason::Terminated),
            EpisodeStatus::StepLimitReached => Some(EndReason::StepLimitReached),
            EpisodeStatus::NotStarted | EpisodeStatus::Running => None,
        }
    }
}

/// A finished episode.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode<S, A, I> {
    pub initial_state: S,
    pub total_reward: f64,
    pub trajectory: Trajectory<S, A, I>,
    pub end_reason: EndReason,
    /// Set when the engine was given a discount factor.
    pub discounted_return: Option<f64>,
}

impl<S: Copy, A, I> Episode<S, A, I> {
    /// State the episode ended in; the initial state if no step was taken.
    pub fn final_state(&self) -> S {
        self.trajectory
            .last()
            .map_or(self.initial_state, |s| s.next_state)
    }
}

pub type EpisodeOf<M> =
    Episode<<M as MdpModel>::State, <M as MdpModel>::Action, <M as MdpModel>::Info>;

/// One in-progress episode, advanced a step at a time.
///
/// `NotStarted -> Running -> {Terminated, StepLimitReached}`. A start state
/// that is already terminal, or a step bound of zero, skips `Running`.
pub struct Rollout<'m, M: MdpModel> {
    model: &'m M,
    initial_state: M::State,
    state: M::State,
    max_steps: usize,
    status: EpisodeStatus,
    total_reward: f64,
    trajectory: Trajectory<M::State, M::Action, M::Info>,
}

impl<'m, M: MdpModel> Rollout<'m, M> {
    pub fn new(model: &'m M, initial_state: M::State, max_steps: usize) -> Rollout<'m, M> {
        Rollout {
            model,
            initial_state,
            state: initial_state,
            max_steps,
            status: EpisodeStatus::NotStarted,
            total_reward: 0.0,
            trajectory: Trajectory::new(),
        }
    }

    pub fn status(&self) -> EpisodeStatus {
        self.status
    }

    pub fn state(&self) -> &M::State {
        &self.state
    }

    pub fn steps_taken(&self) -> usize {
        self.trajectory.len()
    }

    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    /// Validate the initial state and leave `NotStarted`.
    ///
    /// # Errors
    ///
    /// `MdpError::InvalidParameter` if the initial state is outside the
    /// model's state space.
    pub fn start(&mut self) -> Result<EpisodeStatus, MdpError> {
        if self.status != EpisodeStatus::NotStarted {
            return Ok(self.status);
        }
        if !self.model.contains(&self.state) {
            return Err(MdpError::invalid(
                "initial state",
                self.state,
                "outside the model's state space",
            ));
        }
        self.status = self.next_status();
        Ok(self.status)
    }

    /// Take one step with `policy`. Does nothing unless the rollout is running.
    ///
    /// # Errors
    ///
    /// `MdpError::IllegalAction` when the policy picks an action that is not
    /// legal in the current state. Errors from the policy or the model are
    /// passed through unchanged.
    pub fn advance<P>(
        &mut self,
        policy: &P,
        rng: &mut RandomStream,
    ) -> Result<EpisodeStatus, MdpError>
    where
        P: Policy<M> + ?Sized,
    {
        if !self.status.is_running() {
            return Ok(self.status);
        }
        let state = self.state;
        let action = policy.choose(self.model, &state, rng)?;
        if !self.model.is_legal(&state, &action) {
            return Err(MdpError::IllegalAction {
                chooser: format!("policy `{}`", policy.name()),
                state: state.to_string(),
                action: action.to_string(),
            });
        }
        let t = self.model.step(&state, action, rng)?;

        let step = self.trajectory.len() + 1;
        debug!(
            step,
            state = %state,
            action = %action,
            reward = t.reward,
            next_state = %t.next_state,
            "step"
        );
        self.total_reward += t.reward;
        self.state = t.next_state;
        self.trajectory.push(StepRecord {
            step,
            state,
            action,
            reward: t.reward,
            next_state: t.next_state,
            info: t.info,
        });
        self.status = self.next_status();
        Ok(self.status)
    }

    /// The finished episode, or `None` while the rollout can still advance.
    pub fn into_episode(self) -> Option<EpisodeOf<M>> {
        let end_reason = self.status.end_reason()?;
        Some(self.finish(end_reason))
    }

    fn finish(self, end_reason: EndReason) -> EpisodeOf<M> {
        Episode {
            initial_state: self.initial_state,
            total_reward: self.total_reward,
            trajectory: self.trajectory,
            end_reason,
            discounted_return: None,
        }
    }

    fn next_status(&self) -> EpisodeStatus {
        if self.model.is_terminal(&self.state) {
            EpisodeStatus::Terminated
        } else if self.trajectory.len() >= self.max_steps {
            EpisodeStatus::StepLimitReached
        } else {
            EpisodeStatus::Running
        }
    }
}

/// Runs whole episodes up to a step bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Engine {
    max_steps: usize,
    discount: Option<f64>,
}

impl Engine {
    pub fn new(max_steps: usize) -> Engine {
        Engine {
            max_steps,
            discount: None,
        }
    }

    /// Also report `sum gamma^t r_t` for every episode.
    pub fn with_discount(self, gamma: f64) -> Result<Engine, MdpError> {
        ensure_probability("gamma", gamma)?;
        Ok(Engine {
            discount: Some(gamma),
            ..self
        })
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn discount(&self) -> Option<f64> {
        self.discount
    }

    /// Simulate one episode from `initial` under `policy`.
    ///
    /// The first error aborts the run; no partial episode is returned.
    pub fn run<M, P>(
        &self,
        model: &M,
        policy: &P,
        initial: M::State,
        rng: &mut RandomStream,
    ) -> Result<EpisodeOf<M>, MdpError>
    where
        M: MdpModel,
        P: Policy<M> + ?Sized,
    {
        let mut rollout = Rollout::new(model, initial, self.max_steps);
        let mut status = rollout.start()?;
        let end_reason = loop {
            match status.end_reason() {
                Some(reason) => break reason,
                None => status = rollout.advance(policy, rng)?,
            }
        };
        let steps = rollout.steps_taken();
        let mut episode = rollout.finish(end_reason);
        episode.discounted_return = self
            .discount
            .map(|gamma| episode.trajectory.discounted_reward(gamma));
        info!(
            model = model.name(),
            policy = policy.name(),
            steps,
            total_reward = episode.total_reward,
            discounted_return = ?episode.discounted_return,
            end = %episode.end_reason,
            "episode finished"
        );
        Ok(episode)
    }
}
