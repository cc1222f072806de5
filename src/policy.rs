use crate::error::MdpError;
use crate::model::MdpModel;
use crate::random::RandomStream;

/// Chooses an action for the current state.
///
/// A policy never mutates the state or the model. It should return one of
/// `model.legal_actions(state)`; the engine rejects anything else.
pub trait Policy<M: MdpModel> {
    fn name(&self) -> &str;

    fn choose(
        &self,
        model: &M,
        state: &M::State,
        rng: &mut RandomStream,
    ) -> Result<M::Action, MdpError>;
}

/// Uniform draw over the legal actions, using the episode's stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPolicy;

impl<M: MdpModel> Policy<M> for RandomPolicy {
    fn name(&self) -> &str {
        "random"
    }

    fn choose(
        &self,
        model: &M,
        state: &M::State,
        rng: &mut RandomStream,
    ) -> Result<M::Action, MdpError> {
        let actions = model.legal_actions(state);
        rng.pick(&actions)
            .copied()
            .ok_or_else(|| MdpError::NoLegalActions {
                state: state.to_string(),
            })
    }
}

/// Adapts a plain function of the state into a policy.
pub struct FnPolicy<F> {
    name: String,
    f: F,
}

impl<F> FnPolicy<F> {
    pub fn new(name: &str, f: F) -> FnPolicy<F> {
        FnPolicy {
            name: name.to_string(),
            f,
        }
    }
}

impl<M, F> Policy<M> for FnPolicy<F>
where
    M: MdpModel,
    F: Fn(&M::State) -> M::Action,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn choose(
        &self,
        _model: &M,
        state: &M::State,
        _rng: &mut RandomStream,
    ) -> Result<M::Action, MdpError> {
        Ok((self.f)(state))
    }
}
