use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

use crate::error::ExecutionError;
use crate::ExecutionResult;

/// Mean-reverting Ornstein-Uhlenbeck dynamics for the latent market state:
/// `dm = -(m - mean) / relaxation_time dt + burstiness dW`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrnsteinUhlenbeck {
    /// Long-run level the state relaxes toward.
    pub mean: f64,
    /// Volatility of the latent state.
    pub burstiness: f64,
    /// Mean-reversion time constant (> 0).
    pub relaxation_time: f64,
}

impl OrnsteinUhlenbeck {
    pub fn new(mean: f64, burstiness: f64, relaxation_time: f64) -> ExecutionResult<Self> {
        if !mean.is_finite() {
            return Err(ExecutionError::invalid("mean", "must be finite"));
        }
        if !burstiness.is_finite() || burstiness < 0.0 {
            return Err(ExecutionError::invalid(
                "burstiness",
                "must be non-negative and finite",
            ));
        }
        if !relaxation_time.is_finite() || relaxation_time <= 0.0 {
            return Err(ExecutionError::invalid(
                "relaxation_time",
                "must be positive and finite",
            ));
        }
        Ok(Self {
            mean,
            burstiness,
            relaxation_time,
        })
    }

    /// The zero-mean variant used by the coordinated-variation model.
    pub fn zero_mean(burstiness: f64, relaxation_time: f64) -> ExecutionResult<Self> {
        Self::new(0.0, burstiness, relaxation_time)
    }

    /// Burstiness rescaled to relaxation-time units, the diffusion scale of
    /// the non-dimensional state equation.
    pub fn non_dimensional_burstiness(&self) -> f64 {
        self.burstiness * self.relaxation_time.sqrt()
    }
}

/// One realized market-state path: an ordered state value per time node.
/// Shared read-only with the adaptive generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStateSequence {
    pub states: Vec<f64>,
    pub time_step: f64,
}

impl MarketStateSequence {
    pub fn node_count(&self) -> usize {
        self.states.len()
    }
}

/// Simulate a discretized Euler-Maruyama path of the process.
///
/// Given the same seed and parameters, two runs produce bit-identical
/// sequences.
pub fn simulate(
    process: &OrnsteinUhlenbeck,
    initial_state: f64,
    time_step: f64,
    node_count: usize,
    seed: Option<u64>,
) -> ExecutionResult<MarketStateSequence> {
    if !initial_state.is_finite() {
        return Err(ExecutionError::invalid("initial_state", "must be finite"));
    }
    if !time_step.is_finite() || time_step <= 0.0 {
        return Err(ExecutionError::invalid(
            "time_step",
            "must be positive and finite",
        ));
    }
    if node_count < 2 {
        return Err(ExecutionError::invalid(
            "node_count",
            "must be at least 2",
        ));
    }

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let gaussian = Normal::new(0.0, 1.0).map_err(|e| ExecutionError::InvalidParameter {
        field: "gaussian".into(),
        reason: format!("Invalid Normal parameters: {e}"),
    })?;

    let shock_scale = process.burstiness * time_step.sqrt();
    let mut states = Vec::with_capacity(node_count);
    let mut state = initial_state;
    states.push(state);
    for _ in 1..node_count {
        let z: f64 = rng.sample(gaussian);
        state += -(state - process.mean) / process.relaxation_time * time_step + shock_scale * z;
        states.push(state);
    }

    Ok(MarketStateSequence { states, time_step })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SEED: u64 = 42;

    fn process() -> OrnsteinUhlenbeck {
        OrnsteinUhlenbeck::zero_mean(1.0, 1.0).unwrap()
    }

    // --- Validation ---

    #[test]
    fn test_rejects_zero_relaxation_time() {
        assert!(OrnsteinUhlenbeck::zero_mean(1.0, 0.0).is_err());
    }

    #[test]
    fn test_rejects_negative_burstiness() {
        assert!(OrnsteinUhlenbeck::zero_mean(-0.5, 1.0).is_err());
    }

    #[test]
    fn test_rejects_single_node() {
        assert!(simulate(&process(), 0.0, 0.2, 1, Some(SEED)).is_err());
    }

    #[test]
    fn test_rejects_non_positive_time_step() {
        assert!(simulate(&process(), 0.0, 0.0, 51, Some(SEED)).is_err());
        assert!(simulate(&process(), 0.0, -0.1, 51, Some(SEED)).is_err());
    }

    #[test]
    fn test_rejects_non_finite_initial_state() {
        assert!(simulate(&process(), f64::NAN, 0.2, 51, Some(SEED)).is_err());
    }

    // --- Reproducibility ---

    #[test]
    fn test_seeded_paths_bit_identical() {
        let a = simulate(&process(), -0.5, 0.2, 51, Some(SEED)).unwrap();
        let b = simulate(&process(), -0.5, 0.2, 51, Some(SEED)).unwrap();
        assert_eq!(a.states, b.states);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let a = simulate(&process(), -0.5, 0.2, 51, Some(SEED)).unwrap();
        let b = simulate(&process(), -0.5, 0.2, 51, Some(SEED + 1)).unwrap();
        assert_ne!(a.states, b.states);
    }

    // --- Dynamics ---

    #[test]
    fn test_path_starts_at_initial_state() {
        let path = simulate(&process(), -0.5, 0.2, 51, Some(SEED)).unwrap();
        assert_eq!(path.states[0], -0.5);
        assert_eq!(path.node_count(), 51);
    }

    #[test]
    fn test_zero_burstiness_is_deterministic_decay() {
        let p = OrnsteinUhlenbeck::zero_mean(0.0, 1.0).unwrap();
        let path = simulate(&p, 1.0, 0.1, 11, Some(SEED)).unwrap();
        // Pure relaxation: m[i+1] = m[i] (1 - dt / theta)
        let mut expected = 1.0;
        for &m in &path.states {
            assert!((m - expected).abs() < 1e-12);
            expected *= 0.9;
        }
    }

    #[test]
    fn test_mean_reversion_toward_long_run_level() {
        let p = OrnsteinUhlenbeck::new(2.0, 0.0, 1.0).unwrap();
        let path = simulate(&p, 0.0, 0.1, 201, Some(SEED)).unwrap();
        let last = *path.states.last().unwrap();
        assert!((last - 2.0).abs() < 1e-6, "state should relax to the mean");
    }

    #[test]
    fn test_stationary_spread_matches_theory() {
        // Long seeded path: sample std of the OU state should be near the
        // stationary value burstiness * sqrt(theta / 2).
        let path = simulate(&process(), 0.0, 0.05, 100_000, Some(SEED)).unwrap();
        let n = path.states.len() as f64;
        let mean = path.states.iter().sum::<f64>() / n;
        let var = path.states.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / n;
        let expected = 0.5; // beta^2 theta / 2
        assert!(
            (var - expected).abs() < 0.05,
            "sample var {var} vs stationary {expected}"
        );
    }

    #[test]
    fn test_non_dimensional_burstiness() {
        let p = OrnsteinUhlenbeck::zero_mean(0.5, 4.0).unwrap();
        assert!((p.non_dimensional_burstiness() - 1.0).abs() < 1e-12);
    }
}
