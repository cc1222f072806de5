use std::fmt;
use std::marker::PhantomData;

use ndarray::Array2;

use crate::error::{ensure_probability, MdpError};
use crate::random::RandomStream;

/// A hidden discrete mode with a fixed, ordered set of values.
pub trait Regime: Copy + Eq + fmt::Debug + fmt::Display + 'static {
    const ALL: &'static [Self];

    fn index(self) -> usize {
        Self::ALL.iter().position(|r| *r == self).unwrap_or(0)
    }
}

/// Discrete-time Markov chain over a regime.
///
/// Row `i` of the matrix holds the probabilities of moving from
/// `R::ALL[i]` to each regime in the next step.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeChain<R: Regime> {
    name: String,
    matrix: Array2<f64>,
    _regime: PhantomData<R>,
}

impl<R: Regime> RegimeChain<R> {
    pub fn from_matrix(name: &str, matrix: Array2<f64>) -> Result<RegimeChain<R>, MdpError> {
        let n = R::ALL.len();
        if matrix.dim() != (n, n) {
            return Err(MdpError::invalid(
                name,
                format!("{:?}", matrix.dim()),
                "transition matrix must be square over all regimes",
            ));
        }
        for (i, row) in matrix.rows().into_iter().enumerate() {
            for &p in row.iter() {
                ensure_probability(name, p)?;
            }
            let total: f64 = row.sum();
            if (total - 1.0).abs() > 1e-9 {
                return Err(MdpError::invalid(
                    format!("{name}[{}]", R::ALL[i]),
                    total,
                    "transition probabilities must sum to 1",
                ));
            }
        }
        Ok(RegimeChain {
            name: name.to_string(),
            matrix,
            _regime: PhantomData,
        })
    }

    /// Stay in the current regime with probability `stay`, otherwise switch
    /// uniformly to one of the others.
    pub fn persistent(name: &str, stay: f64) -> Result<RegimeChain<R>, MdpError> {
        ensure_probability(name, stay)?;
        let n = R::ALL.len();
        let switch = if n > 1 { (1.0 - stay) / (n - 1) as f64 } else { 0.0 };
        let matrix = Array2::from_shape_fn((n, n), |(i, j)| match (i == j, n) {
            (true, 1) => 1.0,
            (true, _) => stay,
            (false, _) => switch,
        });
        RegimeChain::from_matrix(name, matrix)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn prob(&self, from: R, to: R) -> f64 {
        self.matrix[[from.index(), to.index()]]
    }

    /// Consumes exactly one uniform draw.
    pub fn sample_next(&self, current: R, rng: &mut RandomStream) -> R {
        let u = rng.uniform();
        let mut acc = 0.0;
        for (j, p) in self.matrix.row(current.index()).iter().enumerate() {
            acc += p;
            if u < acc {
                return R::ALL[j];
            }
        }
        R::ALL[R::ALL.len() - 1]
    }
}

/// Matrix as a table, one row per current regime.
impl<R: Regime> fmt::Display for RegimeChain<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:>12}", "from \\ to")?;
        for r in R::ALL {
            write!(f, "{:>9}", r.to_string())?;
        }
        writeln!(f)?;
        for (i, row) in self.matrix.rows().into_iter().enumerate() {
            write!(f, "{:>10} |", R::ALL[i].to_string())?;
            for p in row {
                write!(f, "{p:9.3}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
