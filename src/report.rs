use std::fmt::{self, Display};
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::engine::Episode;
use crate::error::MdpError;

/// Human readable episode summary: total, discounted return when known, end
/// reason, start state, then one line per step.
pub struct Report<'e, S, A, I> {
    episode: &'e Episode<S, A, I>,
}

impl<'e, S, A, I> Report<'e, S, A, I> {
    pub fn new(episode: &'e Episode<S, A, I>) -> Report<'e, S, A, I> {
        Report { episode }
    }
}

impl<S, A, I> Display for Report<'_, S, A, I>
where
    S: Display,
    A: Display,
    I: Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let episode = self.episode;
        writeln!(f, "Total reward: {:.2}", episode.total_reward)?;
        if let Some(g) = episode.discounted_return {
            writeln!(f, "Discounted return: {g:.3}")?;
        }
        writeln!(
            f,
            "Ended: {} after {} steps",
            episode.end_reason,
            episode.trajectory.len()
        )?;
        writeln!(f, "start  {}", episode.initial_state)?;
        for s in episode.trajectory.steps() {
            writeln!(
                f,
                "t={}  {}  action: {}  reward: {:.2}  {}",
                s.step, s.next_state, s.action, s.reward, s.info
            )?;
        }
        Ok(())
    }
}

pub fn render<S, A, I>(episode: &Episode<S, A, I>) -> String
where
    S: Display,
    A: Display,
    I: Display,
{
    Report::new(episode).to_string()
}

#[derive(Serialize, Debug, PartialEq)]
struct CsvRow {
    step: usize,
    state: String,
    action: String,
    reward: f64,
    next_state: String,
    details: String,
}

/// Write the trajectory as CSV with a header row.
pub fn write_csv<S, A, I, W>(episode: &Episode<S, A, I>, writer: W) -> Result<(), MdpError>
where
    S: Display,
    A: Display,
    I: Display,
    W: io::Write,
{
    let mut wtr = csv::Writer::from_writer(writer);
    for s in episode.trajectory.steps() {
        wtr.serialize(CsvRow {
            step: s.step,
            state: s.state.to_string(),
            action: s.action.to_string(),
            reward: s.reward,
            next_state: s.next_state.to_string(),
            details: s.info.to_string(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_csv<S, A, I>(episode: &Episode<S, A, I>, path: &Path) -> Result<(), MdpError>
where
    S: Display,
    A: Display,
    I: Display,
{
    let file = std::fs::File::create(path)?;
    write_csv(episode, io::BufWriter::new(file))
}
