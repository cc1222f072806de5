/// One simulated transition, recorded exactly as it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord<S, A, I> {
    /// 1-based position in the episode.
    pub step: usize,
    pub state: S,
    pub action: A,
    pub reward: f64,
    pub next_state: S,
    pub info: I,
}

/// Ordered step records of one episode. Records are append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory<S, A, I> {
    steps: Vec<StepRecord<S, A, I>>,
}

impl<S, A, I> Default for Trajectory<S, A, I> {
    fn default() -> Self {
        Trajectory { steps: Vec::new() }
    }
}

impl<S, A, I> Trajectory<S, A, I> {
    pub fn new() -> Trajectory<S, A, I> {
        Trajectory::default()
    }

    pub(crate) fn push(&mut self, record: StepRecord<S, A, I>) {
        self.steps.push(record);
    }

    pub fn steps(&self) -> &[StepRecord<S, A, I>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&StepRecord<S, A, I>> {
        self.steps.last()
    }

    /// Sum of the recorded rewards, in step order.
    pub fn total_reward(&self) -> f64 {
        self.steps.iter().map(|s| s.reward).sum()
    }

    /// `r_1 + gamma r_2 + gamma^2 r_3 + ...` over the recorded rewards.
    pub fn discounted_reward(&self, gamma: f64) -> f64 {
        self.steps.iter().rev().fold(0.0, |g, s| s.reward + gamma * g)
    }
}
