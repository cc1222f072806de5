use std::fmt;

use serde::Deserialize;

use crate::error::MdpError;
use crate::model::{ensure_legal, MdpModel, Transition};
use crate::policy::Policy;
use crate::random::RandomStream;

/// Cells of the line, left to right. E is the goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum Cell {
    A,
    B,
    C,
    D,
    E,
}

impl Cell {
    pub const ALL: [Cell; 5] = [Cell::A, Cell::B, Cell::C, Cell::D, Cell::E];

    fn index(self) -> usize {
        self as usize
    }

    fn neighbour(self, direction: Move) -> Cell {
        let i = match direction {
            Move::Left => self.index().saturating_sub(1),
            Move::Right => (self.index() + 1).min(Cell::ALL.len() - 1),
        };
        Cell::ALL[i]
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Left,
    Right,
}

impl Move {
    pub const ALL: [Move; 2] = [Move::Left, Move::Right];
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    Moved,
    /// Pushed against the left end.
    Blocked,
    Goal,
}

impl fmt::Display for Arrival {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Arrival::Moved => write!(f, "moved"),
            Arrival::Blocked => write!(f, "blocked"),
            Arrival::Goal => write!(f, "goal reached"),
        }
    }
}

/// Line walker settings, read from the `[line]` table.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LineConfig {
    pub start: Cell,
    pub steps: usize,
}

impl Default for LineConfig {
    fn default() -> Self {
        LineConfig {
            start: Cell::A,
            steps: 10,
        }
    }
}

/// Deterministic walk along A..E. Arriving at E pays 1 and ends the episode.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineModel;

impl MdpModel for LineModel {
    type State = Cell;
    type Action = Move;
    type Info = Arrival;

    fn name(&self) -> &'static str {
        "line"
    }

    fn legal_actions(&self, state: &Cell) -> Vec<Move> {
        if self.is_terminal(state) {
            return Vec::new();
        }
        Move::ALL.to_vec()
    }

    fn step(
        &self,
        state: &Cell,
        action: Move,
        _rng: &mut RandomStream,
    ) -> Result<Transition<Cell, Arrival>, MdpError> {
        ensure_legal(self, state, &action)?;
        let next = state.neighbour(action);
        let info = if next == Cell::E {
            Arrival::Goal
        } else if next == *state {
            Arrival::Blocked
        } else {
            Arrival::Moved
        };
        Ok(Transition {
            next_state: next,
            reward: if info == Arrival::Goal { 1.0 } else { 0.0 },
            info,
        })
    }

    fn is_terminal(&self, state: &Cell) -> bool {
        *state == Cell::E
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysRight;

impl Policy<LineModel> for AlwaysRight {
    fn name(&self) -> &str {
        "always-right"
    }

    fn choose(
        &self,
        _model: &LineModel,
        _state: &Cell,
        _rng: &mut RandomStream,
    ) -> Result<Move, MdpError> {
        Ok(Move::Right)
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

    #[test_case(Cell::A, Move::Left, Cell::A, 0.0; "Left end blocks")]
    #[test_case(Cell::A, Move::Right, Cell::B, 0.0; "Right from A")]
    #[test_case(Cell::C, Move::Left, Cell::B, 0.0; "Left from C")]
    #[test_case(Cell::D, Move::Right, Cell::E, 1.0; "Arriving at E pays")]
    fn moves_are_deterministic(from: Cell, m: Move, to: Cell, reward: f64) {
        let mut rng = RandomStream::seed(0);
        let t = LineModel.step(&from, m, &mut rng).unwrap();
        assert_eq!(t.next_state, to);
        assert_abs_diff_eq!(t.reward, reward);
    }

    #[test]
    fn always_right_reaches_goal_in_four_steps() {
        // Arrange
        let mut rng = RandomStream::seed(0);
        // Act
        let episode = Engine::new(10)
            .run(&LineModel, &AlwaysRight, Cell::A, &mut rng)
            .unwrap();
        // Assert
        let path: Vec<Cell> = episode.trajectory.steps().iter().map(|s| s.next_state).collect();
        assert_eq!(path, vec![Cell::B, Cell::C, Cell::D, Cell::E]);
        assert_eq!(episode.end_reason, EndReason::Terminated);
        assert_abs_diff_eq!(episode.total_reward, 1.0);
        assert_eq!(episode.trajectory.last().map(|s| s.info), Some(Arrival::Goal));
    }

    #[test]
    fn low_draws_pick_left_and_stall_at_the_bound() {
        // Arrange: a draw of 0 picks the first legal action, Left
        let mut rng = RandomStream::from_rng(StepRng::new(0, 0));
        // Act
        let episode = Engine::new(10)
            .run(&LineModel, &RandomPolicy, Cell::A, &mut rng)
            .unwrap();
        // Assert
        assert_eq!(episode.end_reason, EndReason::StepLimitReached);
        assert_eq!(episode.trajectory.len(), 10);
        assert_eq!(episode.final_state(), Cell::A);
        assert!(episode.trajectory.steps().iter().all(|s| s.info == Arrival::Blocked));
        assert_abs_diff_eq!(episode.total_reward, 0.0);
    }

    #[test]
    fn high_draws_pick_right() {
        let mut rng = RandomStream::from_rng(StepRng::new(7 << 61, 0));
        let episode = Engine::new(10)
            .run(&LineModel, &RandomPolicy, Cell::B, &mut rng)
            .unwrap();
        assert_eq!(episode.trajectory.len(), 3);
        assert_eq!(episode.final_state(), Cell::E);
    }

    #[test]
    fn goal_is_terminal() {
        let mut rng = RandomStream::seed(0);
        assert!(LineModel.legal_actions(&Cell::E).is_empty());
        let episode = Engine::new(10)
            .run(&LineModel, &AlwaysRight, Cell::E, &mut rng)
            .unwrap();
        assert!(episode.trajectory.is_empty());
        assert_eq!(episode.end_reason, EndReason::Terminated);
        assert!(matches!(
            LineModel.step(&Cell::E, Move::Right, &mut rng),
            Err(MdpError::IllegalAction { .. })
        ));
    }

    #[test]
    fn random_walks_stay_on_the_line() {
        for seed in 0..20 {
            let mut rng = RandomStream::seed(seed);
            let episode = Engine::new(10)
                .run(&LineModel, &RandomPolicy, Cell::A, &mut rng)
                .unwrap();
            assert!(episode.trajectory.len() <= 10);
            assert!(episode.total_reward == 0.0 || episode.total_reward == 1.0);
            if episode.end_reason == EndReason::Terminated {
                assert_eq!(episode.final_state(), Cell::E);
            }
        }
    }
}
