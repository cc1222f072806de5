use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::error::{ensure_finite, ensure_probability, MdpError};

/// Source of every random draw in an episode.
///
/// A stream is owned by exactly one rollout and passed explicitly to the
/// model and policy. Two streams seeded with the same value produce the same
/// draws for the same sequence of calls.
pub struct RandomStream {
    rng: Box<dyn RngCore>,
}

impl RandomStream {
    pub fn seed(value: u64) -> RandomStream {
        RandomStream {
            rng: Box::new(StdRng::seed_from_u64(value)),
        }
    }

    /// Wrap any generator, e.g. `rand::rngs::mock::StepRng` to pin draws in tests.
    pub fn from_rng<R: RngCore + 'static>(rng: R) -> RandomStream {
        RandomStream { rng: Box::new(rng) }
    }

    /// Next draw in [0, 1).
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    pub fn bernoulli(&mut self, p: f64) -> Result<bool, MdpError> {
        ensure_probability("p", p)?;
        Ok(self.uniform() < p)
    }

    /// One draw from an ad-hoc weighted table.
    pub fn choice<T: Clone>(&mut self, outcomes: &[(T, f64)]) -> Result<T, MdpError> {
        let table = WeightedOutcomes::new(outcomes.to_vec())?;
        Ok(table.sample(self).clone())
    }

    /// Uniform pick from a slice, `None` when it is empty.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let i = (self.uniform() * items.len() as f64) as usize;
        items.get(i.min(items.len() - 1))
    }

    /// Index into a cumulative distribution whose last entry is 1.
    pub(crate) fn sample_cumulative(&mut self, cumulative: &[f64]) -> usize {
        let u = self.uniform();
        cumulative
            .iter()
            .position(|&c| u < c)
            .unwrap_or(cumulative.len().saturating_sub(1))
    }
}

impl fmt::Debug for RandomStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RandomStream").finish_non_exhaustive()
    }
}

/// A validated discrete distribution over arbitrary outcomes.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedOutcomes<T> {
    outcomes: Vec<T>,
    cumulative: Vec<f64>,
}

impl<T> WeightedOutcomes<T> {
    /// Weights need not sum to one; they are normalised here.
    pub fn new(weighted: Vec<(T, f64)>) -> Result<WeightedOutcomes<T>, MdpError> {
        if weighted.is_empty() {
            return Err(MdpError::invalid("outcomes", "[]", "at least one outcome is required"));
        }
        let mut total = 0.0;
        for (_, w) in &weighted {
            ensure_finite("weight", *w)?;
            if *w < 0.0 {
                return Err(MdpError::invalid("weight", w, "weights must not be negative"));
            }
            total += w;
        }
        if total <= 0.0 {
            return Err(MdpError::invalid("weights", total, "weights must not all be zero"));
        }

        let mut running = 0.0;
        let mut outcomes = Vec::with_capacity(weighted.len());
        let mut cumulative = Vec::with_capacity(weighted.len());
        for (outcome, w) in weighted {
            running += w;
            outcomes.push(outcome);
            cumulative.push(running / total);
        }
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }
        Ok(WeightedOutcomes { outcomes, cumulative })
    }

    /// Every listed value is one equally likely outcome; repeats add weight.
    pub fn uniform(values: Vec<T>) -> Result<WeightedOutcomes<T>, MdpError> {
        WeightedOutcomes::new(values.into_iter().map(|v| (v, 1.0)).collect())
    }

    pub fn sample(&self, rng: &mut RandomStream) -> &T {
        &self.outcomes[rng.sample_cumulative(&self.cumulative)]
    }

    /// (outcome, probability) pairs in declaration order.
    pub fn probabilities(&self) -> impl Iterator<Item = (&T, f64)> + '_ {
        let mut previous = 0.0;
        self.outcomes.iter().zip(self.cumulative.iter()).map(move |(o, &c)| {
            let p = c - previous;
            previous = c;
            (o, p)
        })
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
