use std::fmt;

use crate::error::MdpError;
use crate::random::RandomStream;

/// Result of sampling one transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S, I> {
    pub next_state: S,
    pub reward: f64,
    pub info: I,
}

/// A small discrete MDP that can be simulated one step at a time.
///
/// States and actions are plain values. `step` consumes entropy from the
/// stream it is given and has no other side effect.
pub trait MdpModel {
    type State: Copy + PartialEq + fmt::Debug + fmt::Display;
    type Action: Copy + PartialEq + fmt::Debug + fmt::Display;
    /// Per-step details recorded next to the reward (demand, sales, ...).
    type Info: Clone + PartialEq + fmt::Debug + fmt::Display;

    fn name(&self) -> &'static str;

    fn legal_actions(&self, state: &Self::State) -> Vec<Self::Action>;

    fn is_legal(&self, state: &Self::State, action: &Self::Action) -> bool {
        self.legal_actions(state).contains(action)
    }

    /// Whether `state` lies inside the declared state space.
    fn contains(&self, _state: &Self::State) -> bool {
        true
    }

    /// Sample the successor of `state` under `action`.
    ///
    /// # Errors
    ///
    /// `MdpError::IllegalAction` when `action` is not legal in `state`.
    fn step(
        &self,
        state: &Self::State,
        action: Self::Action,
        rng: &mut RandomStream,
    ) -> Result<Transition<Self::State, Self::Info>, MdpError>;

    /// Fixed-horizon models never terminate on their own.
    fn is_terminal(&self, _state: &Self::State) -> bool {
        false
    }
}

/// Shared guard for `MdpModel::step` implementations.
pub(crate) fn ensure_legal<M: MdpModel + ?Sized>(
    model: &M,
    state: &M::State,
    action: &M::Action,
) -> Result<(), MdpError> {
    if model.is_legal(state, action) {
        return Ok(());
    }
    Err(MdpError::IllegalAction {
        chooser: "caller".to_string(),
        state: state.to_string(),
        action: action.to_string(),
    })
}
