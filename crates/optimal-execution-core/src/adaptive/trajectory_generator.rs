//! Closed-loop adaptive trajectory generation.
//!
//! The trade rate at every node reacts to the realized market state: it is
//! the HJB-optimal feedback `v = -kappa g(m) c(tau, m) x` evaluated on the
//! evolved cost field, plus the analytic finite-horizon liquidation factor
//! that the field's zero terminal slice leaves out. Holdings forward-
//! integrate from the order size; the discretization leaves a terminal
//! residual that shrinks as the node count grows.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::dynamics::{simulate, OrnsteinUhlenbeck};
use crate::error::ExecutionError;
use crate::frontier::EfficientTrajectory;
use crate::hjb::{MarketCoupling, NonDimensionalCostEvolver, NonDimensionalCostField};
use crate::trajectory::{TradingTrajectory, TrajectoryStatistics};
use crate::types::{
    with_metadata, ComputationOutput, CoordinatedVariation, MeanVarianceObjective,
    OrderSpecification,
};
use crate::ExecutionResult;

/// Initial trade-rate condition for the first node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialTradeRate {
    /// Start from rest.
    Zero,
    /// Start at the static efficient trajectory's initial trade rate.
    Static,
}

/// Full construction surface of the adaptive generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveTrajectoryInput {
    /// Total quantity to execute.
    pub size: f64,
    /// Execution horizon in time units.
    pub execution_time: f64,
    /// Mean-variance risk aversion (>= 0).
    pub risk_aversion: f64,
    /// Reference (unmodulated) volatility.
    pub reference_volatility: f64,
    /// Reference (unmodulated) liquidity / impact coefficient.
    pub reference_liquidity: f64,
    /// Mean-reversion time constant of the latent market state.
    pub relaxation_time: f64,
    /// Volatility of the latent market state.
    pub burstiness: f64,
    /// Market state at the start of execution.
    pub initial_market_state: f64,
    /// Number of time nodes (>= 2).
    pub node_count: usize,
    /// Trade-rate condition at the first node.
    pub initial_trade_rate: InitialTradeRate,
    /// How the state couples into volatility and liquidity.
    pub coupling: MarketCoupling,
    /// RNG seed for the market-state path; None draws from entropy.
    pub seed: Option<u64>,
}

/// Output of the adaptive generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveTrajectoryOutput {
    pub trajectory: TradingTrajectory,
    /// The realized latent market state per time node.
    pub market_states: Vec<f64>,
    /// Holdings left at the horizon by the discretized policy.
    pub terminal_residual: f64,
    pub expected_cost: f64,
    pub cost_variance: f64,
    pub characteristic_time: f64,
    /// theta * sigma * sqrt(lambda / eta), the universal grid scaling.
    pub non_dimensional_risk_aversion: f64,
}

/// Weight of the state in the feedback policy: e^m when volatility and
/// liquidity move coordinately, e^(m/2) when only liquidity moves.
fn state_gain(coupling: MarketCoupling, state: f64) -> f64 {
    match coupling {
        MarketCoupling::Systemic => state.exp(),
        MarketCoupling::LiquidityOnly => (0.5 * state).exp(),
    }
}

/// Analytic finite-horizon part of the feedback rate.
///
/// The evolved field carries a zero terminal slice, so the
/// forced-liquidation singularity is carried here in closed form:
/// `kappa g (coth(z) - tanh(z))` with `z = mu g s_nd`, which collapses to
/// the risk-neutral `1 / s` feedback as z -> 0 and vanishes far from the
/// horizon.
fn horizon_rate_factor(kappa: f64, mu: f64, gain: f64, s_nd: f64, relaxation_time: f64) -> f64 {
    let z = mu * gain * s_nd;
    if z < 1e-8 {
        1.0 / (relaxation_time * s_nd)
    } else if z > 15.0 {
        0.0
    } else {
        // coth(z) - tanh(z) = 2 / sinh(2z)
        kappa * gain * 2.0 / (2.0 * z).sinh()
    }
}

/// Simulate a market-state path, evolve the cost field and walk the
/// closed-loop policy forward from the order size.
pub fn generate_adaptive_trajectory(
    input: &AdaptiveTrajectoryInput,
) -> ExecutionResult<ComputationOutput<AdaptiveTrajectoryOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.node_count < 2 {
        return Err(ExecutionError::invalid(
            "node_count",
            "must be at least 2",
        ));
    }

    let order = OrderSpecification::new(input.size, input.execution_time)?;
    let variation =
        CoordinatedVariation::new(input.reference_volatility, input.reference_liquidity)?;
    let objective = MeanVarianceObjective::new(input.risk_aversion)?;
    let process = OrnsteinUhlenbeck::zero_mean(input.burstiness, input.relaxation_time)?;

    let n = input.node_count;
    let dt = order.execution_time / (n - 1) as f64;
    let d_tau = dt / process.relaxation_time;

    let path = simulate(&process, input.initial_market_state, dt, n, input.seed)?;

    let kappa = objective.urgency(&variation);
    let mu = objective.non_dimensional_risk_aversion(&variation, process.relaxation_time);
    let field = NonDimensionalCostEvolver::new(process, input.coupling).evolve(mu, d_tau, n)?;

    let clamped_count = path
        .states
        .iter()
        .filter(|m| **m < field.state_min() || **m > field.state_max())
        .count();
    if clamped_count > 0 {
        warnings.push(format!(
            "{clamped_count} of {n} realized market states fell outside the evolved \
             state grid; boundary node values were used"
        ));
    }

    // The mean-state static trajectory supplies the Static initial rate and
    // the characteristic time.
    let static_trajectory = EfficientTrajectory::new(&order, &variation, &objective)?;

    let policy = ClosedLoopPolicy {
        field: &field,
        kappa,
        mu,
        relaxation_time: input.relaxation_time,
    };

    let mut times = Vec::with_capacity(n);
    let mut holdings = Vec::with_capacity(n);
    let mut trade_rates = Vec::with_capacity(n);
    let mut expected_cost = 0.0;
    let mut cost_variance = 0.0;

    let sigma = variation.reference_volatility;
    let eta = variation.reference_liquidity;
    let mut x = order.size;

    for i in 0..n {
        let t = i as f64 * dt;
        let m = path.states[i];
        let s = order.execution_time - t;

        let rate = if i == 0 {
            match input.initial_trade_rate {
                InitialTradeRate::Zero => 0.0,
                InitialTradeRate::Static => static_trajectory.trade_rate(0.0).max(-x / dt),
            }
        } else if i == n - 1 {
            // Horizon reached; whatever is left is the residual.
            0.0
        } else {
            // Per-step cap so holdings never cross zero.
            -policy.rate_factor(i, m, s / input.relaxation_time).min(1.0 / dt) * x
        };

        times.push(t);
        holdings.push(x);
        trade_rates.push(rate);

        if i < n - 1 {
            // Realized cost accrual under the state-modulated model.
            let sigma_sq = match input.coupling {
                MarketCoupling::Systemic => sigma * sigma * m.exp(),
                MarketCoupling::LiquidityOnly => sigma * sigma,
            };
            expected_cost += eta * (-m).exp() * rate * rate * dt;
            cost_variance += sigma_sq * x * x * dt;
            x += rate * dt;
        }
    }

    let terminal_residual = *holdings.last().unwrap_or(&0.0);
    let statistics = TrajectoryStatistics::new(
        expected_cost,
        cost_variance,
        static_trajectory.statistics.characteristic_time,
    )?;
    let trajectory = TradingTrajectory::new(times, holdings, trade_rates, statistics)?;

    let output = AdaptiveTrajectoryOutput {
        market_states: path.states,
        terminal_residual,
        expected_cost,
        cost_variance,
        characteristic_time: statistics.characteristic_time,
        non_dimensional_risk_aversion: mu,
        trajectory,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Adaptive Optimal Trajectory (Almgren 2012)",
        &serde_json::json!({
            "size": input.size,
            "execution_time": input.execution_time,
            "risk_aversion": input.risk_aversion,
            "relaxation_time": input.relaxation_time,
            "burstiness": input.burstiness,
            "initial_market_state": input.initial_market_state,
            "node_count": input.node_count,
            "initial_trade_rate": input.initial_trade_rate,
            "coupling": input.coupling,
            "seed": input.seed,
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// The feedback policy: borrows the evolved field, mutates nothing.
struct ClosedLoopPolicy<'a> {
    field: &'a NonDimensionalCostField,
    kappa: f64,
    mu: f64,
    relaxation_time: f64,
}

impl ClosedLoopPolicy<'_> {
    /// Positive liquidation-rate factor f with v = -f x at time node i,
    /// realized state m and non-dimensional remaining time s_nd.
    fn rate_factor(&self, time_node: usize, state: f64, s_nd: f64) -> f64 {
        let clamped = self.field.clamp_state(state);
        let gain = state_gain(self.field.coupling(), clamped);
        let evolved = self.kappa * self.field.trade_rate(time_node, state);
        evolved + horizon_rate_factor(self.kappa, self.mu, gain, s_nd, self.relaxation_time)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::{generate_static_trajectory, StaticTrajectoryInput};
    use pretty_assertions::assert_eq;

    const SEED: u64 = 42;

    fn basic_input() -> AdaptiveTrajectoryInput {
        AdaptiveTrajectoryInput {
            size: 1.0,
            execution_time: 10.0,
            risk_aversion: 0.04,
            reference_volatility: 1.0,
            reference_liquidity: 1.0,
            relaxation_time: 1.0,
            burstiness: 1.0,
            initial_market_state: -0.5,
            node_count: 51,
            initial_trade_rate: InitialTradeRate::Zero,
            coupling: MarketCoupling::Systemic,
            seed: Some(SEED),
        }
    }

    // --- Validation ---

    #[test]
    fn test_single_node_rejected() {
        let mut input = basic_input();
        input.node_count = 1;
        assert!(generate_adaptive_trajectory(&input).is_err());
    }

    #[test]
    fn test_zero_relaxation_time_rejected() {
        let mut input = basic_input();
        input.relaxation_time = 0.0;
        assert!(generate_adaptive_trajectory(&input).is_err());
    }

    #[test]
    fn test_negative_risk_aversion_rejected() {
        let mut input = basic_input();
        input.risk_aversion = -1.0;
        assert!(generate_adaptive_trajectory(&input).is_err());
    }

    #[test]
    fn test_coarse_grid_rejected_as_unstable() {
        let mut input = basic_input();
        input.node_count = 5; // d_tau = 2.5 relaxation times
        let err = generate_adaptive_trajectory(&input).unwrap_err();
        assert!(matches!(err, ExecutionError::UnstableConfiguration(_)));
    }

    // --- Reproducibility ---

    #[test]
    fn test_seeded_runs_identical() {
        let input = basic_input();
        let a = generate_adaptive_trajectory(&input).unwrap();
        let b = generate_adaptive_trajectory(&input).unwrap();
        assert_eq!(a.result.trajectory.holdings, b.result.trajectory.holdings);
        assert_eq!(a.result.market_states, b.result.market_states);
    }

    // --- Shape invariants ---

    #[test]
    fn test_holdings_start_at_size_and_never_increase() {
        let result = generate_adaptive_trajectory(&basic_input()).unwrap();
        let h = &result.result.trajectory.holdings;
        assert_eq!(h[0], 1.0);
        for w in h.windows(2) {
            assert!(w[1] <= w[0] + 1e-12, "holdings must not increase");
        }
        assert!(*h.last().unwrap() >= -1e-12);
    }

    #[test]
    fn test_zero_initialization_holds_through_first_step() {
        let result = generate_adaptive_trajectory(&basic_input()).unwrap();
        let out = &result.result;
        assert_eq!(out.trajectory.trade_rates[0], 0.0);
        assert_eq!(out.trajectory.holdings[1], 1.0);
    }

    #[test]
    fn test_static_initialization_trades_immediately() {
        let mut input = basic_input();
        input.initial_trade_rate = InitialTradeRate::Static;
        let result = generate_adaptive_trajectory(&input).unwrap();
        let out = &result.result;
        assert!(out.trajectory.trade_rates[0] < 0.0);
        assert!(out.trajectory.holdings[1] < 1.0);
    }

    #[test]
    fn test_residual_matches_last_holdings() {
        let result = generate_adaptive_trajectory(&basic_input()).unwrap();
        let out = &result.result;
        assert_eq!(
            out.terminal_residual,
            *out.trajectory.holdings.last().unwrap()
        );
    }

    // --- Discretization consistency ---

    #[test]
    fn test_residual_shrinks_with_node_count() {
        // Burstiness 0 keeps the path deterministic so the runs are
        // comparable across node counts.
        let mut residuals = Vec::new();
        for node_count in [26, 51, 101] {
            let mut input = basic_input();
            input.burstiness = 0.0;
            input.node_count = node_count;
            let result = generate_adaptive_trajectory(&input).unwrap();
            residuals.push(result.result.terminal_residual.abs());
        }
        assert!(
            residuals[1] <= residuals[0] + 1e-12 && residuals[2] <= residuals[1] + 1e-12,
            "residuals must not grow: {residuals:?}"
        );
        assert!(residuals[2] < 1e-6);
    }

    #[test]
    fn test_mean_state_recovers_static_trajectory() {
        // At the mean market state with no burstiness the feedback policy
        // is the static coth policy; the discretized walk should track the
        // closed-form holdings closely.
        let mut input = basic_input();
        input.burstiness = 0.0;
        input.initial_market_state = 0.0;
        let adaptive = generate_adaptive_trajectory(&input).unwrap();

        let static_result = generate_static_trajectory(&StaticTrajectoryInput {
            size: 1.0,
            execution_time: 10.0,
            risk_aversion: 0.04,
            reference_volatility: 1.0,
            reference_liquidity: 1.0,
            node_count: 51,
        })
        .unwrap();

        let ah = &adaptive.result.trajectory.holdings;
        let sh = &static_result.result.trajectory.holdings;
        for (i, (a, s)) in ah.iter().zip(sh.iter()).enumerate() {
            assert!(
                (a - s).abs() < 0.05,
                "node {i}: adaptive {a} vs static {s}"
            );
        }
    }

    #[test]
    fn test_risk_neutral_policy_is_linear() {
        // lambda = 0 makes the field vanish and the horizon factor reduce
        // to 1/s, which liquidates linearly and exactly.
        let mut input = basic_input();
        input.risk_aversion = 0.0;
        let result = generate_adaptive_trajectory(&input).unwrap();
        let h = &result.result.trajectory.holdings;
        for (i, v) in h.iter().enumerate() {
            // First interval holds (zero initialization), so the linear
            // ramp re-anchors over the remaining 50 intervals.
            if i >= 1 {
                let expected = 1.0 - (i as f64 - 1.0) / 49.0;
                assert!(
                    (v - expected).abs() < 1e-9,
                    "node {i}: {v} vs {expected}"
                );
            }
        }
        assert!(result.result.terminal_residual.abs() < 1e-9);
    }

    // --- Clamping ---

    #[test]
    fn test_far_out_of_grid_state_is_clamped_not_fatal() {
        let mut input = basic_input();
        input.initial_market_state = 25.0;
        let result = generate_adaptive_trajectory(&input).unwrap();
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("outside the evolved state grid")));
        for h in &result.result.trajectory.holdings {
            assert!(h.is_finite() && *h >= -1e-12);
        }
    }

    // --- Model variants and statistics ---

    #[test]
    fn test_liquidity_only_coupling_runs() {
        let mut input = basic_input();
        input.coupling = MarketCoupling::LiquidityOnly;
        let result = generate_adaptive_trajectory(&input).unwrap();
        assert!(result.result.expected_cost > 0.0);
        assert!(result.result.cost_variance > 0.0);
    }

    #[test]
    fn test_summary_statistics_finite_and_positive() {
        let result = generate_adaptive_trajectory(&basic_input()).unwrap();
        let out = &result.result;
        assert!(out.expected_cost > 0.0 && out.expected_cost.is_finite());
        assert!(out.cost_variance > 0.0 && out.cost_variance.is_finite());
        assert!((out.characteristic_time - 5.0).abs() < 1e-12);
        assert!((out.non_dimensional_risk_aversion - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_methodology_label() {
        let result = generate_adaptive_trajectory(&basic_input()).unwrap();
        assert!(result.methodology.contains("Almgren 2012"));
    }
}
