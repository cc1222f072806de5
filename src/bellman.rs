//! Bellman expectation backups for a single decision state.
//!
//! The values of every other state are fixed, so evaluating the policy is a
//! fixed-point iteration on one number.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{ensure_finite, ensure_probability, MdpError};

const SUM_TOLERANCE: f64 = 1e-9;

/// One entry of the joint table p(s', r | s, a).
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Outcome {
    pub next: String,
    pub reward: f64,
    pub prob: f64,
}

impl Outcome {
    fn new(next: &str, reward: f64, prob: f64) -> Outcome {
        Outcome {
            next: next.to_string(),
            reward,
            prob,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ActionTable {
    pub name: String,
    /// pi(a | s) under the evaluated policy.
    pub policy_prob: f64,
    pub outcomes: Vec<Outcome>,
}

/// Bellman evaluation settings, read from the `[bellman]` table.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BellmanConfig {
    pub gamma: f64,
    /// Name of the decision state. Outcomes that lead back to it use the
    /// current estimate instead of a fixed value.
    pub state: String,
    pub values: BTreeMap<String, f64>,
    pub actions: Vec<ActionTable>,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for BellmanConfig {
    fn default() -> Self {
        let values = [("s-2", 19.2), ("s-1", 16.5), ("s1", 18.1), ("s2", 16.2)]
            .into_iter()
            .map(|(s, v)| (s.to_string(), v))
            .collect();
        BellmanConfig {
            gamma: 0.95,
            state: "s0".to_string(),
            values,
            actions: vec![
                ActionTable {
                    name: "Left".to_string(),
                    policy_prob: 0.4,
                    outcomes: vec![
                        Outcome::new("s-2", 0.0, 0.34),
                        Outcome::new("s-2", 1.0, 0.05),
                        Outcome::new("s-2", 2.0, 0.17),
                        Outcome::new("s-1", 0.0, 0.17),
                        Outcome::new("s-1", 1.0, 0.23),
                        Outcome::new("s-1", 2.0, 0.04),
                    ],
                },
                ActionTable {
                    name: "Right".to_string(),
                    policy_prob: 0.6,
                    outcomes: vec![
                        Outcome::new("s1", 0.0, 0.12),
                        Outcome::new("s1", 1.0, 0.22),
                        Outcome::new("s1", 2.0, 0.20),
                        Outcome::new("s2", 0.0, 0.09),
                        Outcome::new("s2", 1.0, 0.32),
                        Outcome::new("s2", 2.0, 0.05),
                    ],
                },
            ],
            tolerance: 1e-12,
            max_iterations: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Iteration {
    /// 1-based.
    pub iter: usize,
    pub old: f64,
    pub new: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: f64,
    pub iterations: Vec<Iteration>,
    pub converged: bool,
}

/// Policy evaluation of one decision state with fixed successor values.
#[derive(Debug, Clone)]
pub struct SingleStateEvaluation {
    gamma: f64,
    state: String,
    values: BTreeMap<String, f64>,
    actions: Vec<ActionTable>,
}

impl SingleStateEvaluation {
    pub fn new(cfg: &BellmanConfig) -> Result<SingleStateEvaluation, MdpError> {
        ensure_probability("gamma", cfg.gamma)?;
        if cfg.actions.is_empty() {
            return Err(MdpError::invalid("actions", 0, "at least one action is required"));
        }
        for (s, v) in &cfg.values {
            ensure_finite(&format!("values[{s}]"), *v)?;
        }

        let mut policy_total = 0.0;
        for a in &cfg.actions {
            let name = format!("{}.policy_prob", a.name);
            policy_total += ensure_probability(&name, a.policy_prob)?;

            let mut total = 0.0;
            for o in &a.outcomes {
                total += ensure_probability(&format!("{}[{}]", a.name, o.next), o.prob)?;
                ensure_finite(&format!("{}[{}].reward", a.name, o.next), o.reward)?;
                if o.next != cfg.state && !cfg.values.contains_key(&o.next) {
                    return Err(MdpError::invalid(
                        format!("{}.outcomes", a.name),
                        &o.next,
                        "successor has no value",
                    ));
                }
            }
            if (total - 1.0).abs() > SUM_TOLERANCE {
                return Err(MdpError::invalid(
                    format!("{}.outcomes", a.name),
                    total,
                    "probabilities must sum to 1",
                ));
            }
        }
        if (policy_total - 1.0).abs() > SUM_TOLERANCE {
            return Err(MdpError::invalid(
                "policy_prob",
                policy_total,
                "must sum to 1 over the actions",
            ));
        }

        Ok(SingleStateEvaluation {
            gamma: cfg.gamma,
            state: cfg.state.clone(),
            values: cfg.values.clone(),
            actions: cfg.actions.clone(),
        })
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }

    pub fn actions(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.actions.iter().map(|a| (a.name.as_str(), a.policy_prob))
    }

    fn value_of(&self, next: &str, current: f64) -> f64 {
        if next == self.state {
            current
        } else {
            self.values.get(next).copied().unwrap_or_default()
        }
    }

    fn q(&self, a: &ActionTable, current: f64) -> f64 {
        a.outcomes
            .iter()
            .map(|o| o.prob * (o.reward + self.gamma * self.value_of(&o.next, current)))
            .sum()
    }

    /// Q(s, a) = sum p(s', r | s, a) (r + gamma V(s')), with `current` as
    /// the estimate of the decision state. `None` for an unknown action.
    pub fn q_value(&self, action: &str, current: f64) -> Option<f64> {
        self.actions
            .iter()
            .find(|a| a.name == action)
            .map(|a| self.q(a, current))
    }

    /// One expectation backup of V(s) under the fixed policy.
    pub fn bellman_update(&self, current: f64) -> f64 {
        self.actions
            .iter()
            .map(|a| a.policy_prob * self.q(a, current))
            .sum()
    }

    /// Iterate the backup from 0 until the change drops below `tolerance`.
    pub fn evaluate(&self, tolerance: f64, max_iterations: usize) -> Evaluation {
        let mut v = 0.0;
        let mut iterations = Vec::new();
        let mut converged = false;
        for iter in 1..=max_iterations {
            let new = self.bellman_update(v);
            let delta = (new - v).abs();
            iterations.push(Iteration {
                iter,
                old: v,
                new,
                delta,
            });
            v = new;
            if delta < tolerance {
                converged = true;
                break;
            }
        }
        Evaluation {
            value: v,
            iterations,
            converged,
        }
    }

    /// Action with the largest Q value; the later action wins ties.
    pub fn greedy_action(&self, current: f64) -> &str {
        self.actions
            .iter()
            .map(|a| (a.name.as_str(), self.q(a, current)))
            .max_by(|x, y| x.1.total_cmp(&y.1))
            .map(|(name, _)| name)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn default_eval() -> SingleStateEvaluation {
        SingleStateEvaluation::new(&BellmanConfig::default()).unwrap()
    }

    #[test]
    fn action_values() {
        let eval = default_eval();
        assert_abs_diff_eq!(eval.q_value("Left", 0.0).unwrap(), 17.8114, epsilon = 1e-9);
        assert_abs_diff_eq!(eval.q_value("Right", 0.0).unwrap(), 17.4047, epsilon = 1e-9);
        assert!(eval.q_value("Up", 0.0).is_none());
        assert_eq!(eval.greedy_action(0.0), "Left");
    }

    #[test]
    fn evaluation_converges_after_one_backup() {
        // Arrange
        let eval = default_eval();
        // Act
        let result = eval.evaluate(1e-12, 20);
        // Assert: no transition returns to s0, so the second backup is a no-op
        assert!(result.converged);
        assert_eq!(result.iterations.len(), 2);
        assert_abs_diff_eq!(result.value, 17.56738, epsilon = 1e-9);
        assert_abs_diff_eq!(result.iterations[0].old, 0.0);
        assert_abs_diff_eq!(result.iterations[0].delta, 17.56738, epsilon = 1e-9);
        assert_abs_diff_eq!(result.iterations[1].delta, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn self_loop_needs_several_backups() {
        // Arrange: V = 0.5 (1 + 0.9 V)  =>  V = 0.5 / 0.55
        let cfg = BellmanConfig {
            gamma: 0.9,
            state: "a".to_string(),
            values: [("b".to_string(), 0.0)].into_iter().collect(),
            actions: vec![ActionTable {
                name: "stay".to_string(),
                policy_prob: 1.0,
                outcomes: vec![Outcome::new("a", 1.0, 0.5), Outcome::new("b", 0.0, 0.5)],
            }],
            ..Default::default()
        };
        let eval = SingleStateEvaluation::new(&cfg).unwrap();
        // Act
        let result = eval.evaluate(1e-10, 200);
        // Assert
        assert!(result.converged);
        assert!(result.iterations.len() > 2);
        assert_abs_diff_eq!(result.value, 0.5 / 0.55, epsilon = 1e-8);
    }

    #[test]
    fn iteration_cap_reports_not_converged() {
        let eval = default_eval();
        let result = eval.evaluate(1e-12, 1);
        assert!(!result.converged);
        assert_eq!(result.iterations.len(), 1);
    }

    #[test]
    fn rejects_unbalanced_policy() {
        let mut cfg = BellmanConfig::default();
        cfg.actions[0].policy_prob = 0.5;
        assert!(matches!(
            SingleStateEvaluation::new(&cfg),
            Err(MdpError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn rejects_table_not_summing_to_one() {
        let mut cfg = BellmanConfig::default();
        cfg.actions[1].outcomes[0].prob = 0.2;
        let err = SingleStateEvaluation::new(&cfg).unwrap_err();
        assert!(err.to_string().contains("Right.outcomes"));
    }

    #[test]
    fn rejects_successor_without_value() {
        let mut cfg = BellmanConfig::default();
        cfg.values.remove("s2");
        assert!(matches!(
            SingleStateEvaluation::new(&cfg),
            Err(MdpError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn rejects_gamma_above_one() {
        let cfg = BellmanConfig {
            gamma: 1.5,
            ..Default::default()
        };
        assert!(SingleStateEvaluation::new(&cfg).is_err());
    }
}
