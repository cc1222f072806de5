use thiserror::Error;

/// Everything that can stop a simulation run.
///
/// None of these are transient: they signal a bad configuration or a
/// policy that broke its contract, so callers propagate them unchanged.
#[derive(Debug, Error)]
pub enum MdpError {
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: &'static str,
    },

    #[error("illegal action {action} in state {state} (chosen by {chooser})")]
    IllegalAction {
        chooser: String,
        state: String,
        action: String,
    },

    #[error("no legal actions in state {state}")]
    NoLegalActions { state: String },

    #[error("unable to read configuration file: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl MdpError {
    pub fn invalid(name: impl Into<String>, value: impl ToString, reason: &'static str) -> Self {
        MdpError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason,
        }
    }
}

pub fn ensure_finite(name: &str, value: f64) -> Result<f64, MdpError> {
    if !value.is_finite() {
        return Err(MdpError::invalid(name, value, "must be a finite number"));
    }
    Ok(value)
}

/// Probabilities live in [0, 1].
pub fn ensure_probability(name: &str, p: f64) -> Result<f64, MdpError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(MdpError::invalid(name, p, "probability must be within [0, 1]"));
    }
    Ok(p)
}

/// Prices, costs and penalties may be zero but never negative.
pub fn ensure_non_negative(name: &str, value: f64) -> Result<f64, MdpError> {
    ensure_finite(name, value)?;
    if value < 0.0 {
        return Err(MdpError::invalid(name, value, "must not be negative"));
    }
    Ok(value)
}
