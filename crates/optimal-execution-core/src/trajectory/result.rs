use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::ExecutionResult;

/// Scalar summary statistics of an optimal trajectory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrajectoryStatistics {
    /// Expected transaction cost over the full execution.
    pub transaction_cost_expectation: f64,
    /// Variance of the transaction cost.
    pub transaction_cost_variance: f64,
    /// Time constant of the exponential holdings decay.
    pub characteristic_time: f64,
}

impl TrajectoryStatistics {
    pub fn new(
        transaction_cost_expectation: f64,
        transaction_cost_variance: f64,
        characteristic_time: f64,
    ) -> ExecutionResult<Self> {
        if !transaction_cost_expectation.is_finite() {
            return Err(ExecutionError::ConstructionFailure(
                "transaction cost expectation is not finite".into(),
            ));
        }
        if !transaction_cost_variance.is_finite() || transaction_cost_variance < 0.0 {
            return Err(ExecutionError::ConstructionFailure(
                "transaction cost variance is not finite and non-negative".into(),
            ));
        }
        if !characteristic_time.is_finite() || characteristic_time <= 0.0 {
            return Err(ExecutionError::ConstructionFailure(
                "characteristic time is not finite and positive".into(),
            ));
        }
        Ok(Self {
            transaction_cost_expectation,
            transaction_cost_variance,
            characteristic_time,
        })
    }
}

/// An executed (or planned) trading schedule: ordered time, holdings and
/// trade-rate sequences plus summary statistics. Pure data; all invariants
/// are enforced at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingTrajectory {
    pub times: Vec<f64>,
    pub holdings: Vec<f64>,
    pub trade_rates: Vec<f64>,
    pub statistics: TrajectoryStatistics,
}

impl TradingTrajectory {
    pub fn new(
        times: Vec<f64>,
        holdings: Vec<f64>,
        trade_rates: Vec<f64>,
        statistics: TrajectoryStatistics,
    ) -> ExecutionResult<Self> {
        if times.len() < 2 {
            return Err(ExecutionError::invalid(
                "times",
                "a trajectory needs at least 2 nodes",
            ));
        }
        if holdings.len() != times.len() || trade_rates.len() != times.len() {
            return Err(ExecutionError::ConstructionFailure(
                "times, holdings and trade_rates must have equal length".into(),
            ));
        }
        for (name, seq) in [
            ("times", &times),
            ("holdings", &holdings),
            ("trade_rates", &trade_rates),
        ] {
            if seq.iter().any(|v| !v.is_finite()) {
                return Err(ExecutionError::ConstructionFailure(format!(
                    "{name} sequence contains a non-finite value"
                )));
            }
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ExecutionError::ConstructionFailure(
                "time sequence is not strictly increasing".into(),
            ));
        }
        Ok(Self {
            times,
            holdings,
            trade_rates,
            statistics,
        })
    }

    pub fn node_count(&self) -> usize {
        self.times.len()
    }

    /// Holdings still on the book at the final node. Zero for closed-form
    /// static trajectories; a discretization residual for adaptive ones.
    pub fn terminal_holdings(&self) -> f64 {
        *self.holdings.last().unwrap_or(&0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> TrajectoryStatistics {
        TrajectoryStatistics::new(0.1, 0.05, 5.0).unwrap()
    }

    #[test]
    fn test_valid_trajectory() {
        let t = TradingTrajectory::new(
            vec![0.0, 1.0, 2.0],
            vec![1.0, 0.5, 0.0],
            vec![-0.5, -0.5, 0.0],
            stats(),
        )
        .unwrap();
        assert_eq!(t.node_count(), 3);
        assert_eq!(t.terminal_holdings(), 0.0);
    }

    #[test]
    fn test_rejects_single_node() {
        assert!(TradingTrajectory::new(vec![0.0], vec![1.0], vec![0.0], stats()).is_err());
    }

    #[test]
    fn test_rejects_length_mismatch() {
        assert!(
            TradingTrajectory::new(vec![0.0, 1.0], vec![1.0], vec![0.0, 0.0], stats()).is_err()
        );
    }

    #[test]
    fn test_rejects_nan_holdings() {
        assert!(TradingTrajectory::new(
            vec![0.0, 1.0],
            vec![1.0, f64::NAN],
            vec![-1.0, 0.0],
            stats(),
        )
        .is_err());
    }

    #[test]
    fn test_rejects_non_increasing_times() {
        assert!(TradingTrajectory::new(
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![-1.0, 0.0],
            stats(),
        )
        .is_err());
    }

    #[test]
    fn test_statistics_reject_nan() {
        assert!(TrajectoryStatistics::new(f64::NAN, 0.0, 1.0).is_err());
        assert!(TrajectoryStatistics::new(0.0, f64::INFINITY, 1.0).is_err());
        assert!(TrajectoryStatistics::new(0.0, 0.0, 0.0).is_err());
    }
}
