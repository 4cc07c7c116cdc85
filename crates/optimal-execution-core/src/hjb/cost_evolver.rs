//! Backward induction of the non-dimensional HJB cost field.
//!
//! With the value function quadratic in remaining holdings, the
//! mean-variance HJB reduces to a scalar PDE for the non-dimensional cost
//! c(tau, m) over non-dimensional time tau = t / relaxation_time and latent
//! market state m:
//!
//! ```text
//! -c_tau = R(m, c) - m c_m + (beta^2 / 2) c_mm
//! ```
//!
//! where the reaction term R carries the closed-form optimal trade rate:
//! `mu e^m (1 - c^2)` when the state modulates volatility and liquidity
//! coordinately (systemic), `mu (1 - e^m c^2)` when it modulates liquidity
//! only. mu is the non-dimensional risk aversion and beta the burstiness in
//! relaxation-time units. The terminal slice carries zero cost and zero
//! sensitivity; induction runs backward to time zero. Advection and
//! diffusion step explicitly under a CFL-bounded grid; the stiff Riccati
//! reaction integrates by its exact flow, so no step-size restriction
//! attaches to it.

use serde::{Deserialize, Serialize};

use crate::dynamics::OrnsteinUhlenbeck;
use crate::error::ExecutionError;
use crate::ExecutionResult;

/// How the latent market state couples into the impact/risk functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketCoupling {
    /// State modulates volatility and liquidity coordinately:
    /// sigma^2(m) = sigma^2 e^m, eta(m) = eta e^-m.
    Systemic,
    /// State modulates liquidity only: eta(m) = eta e^-m, sigma constant.
    LiquidityOnly,
}

/// Evolves the non-dimensional cost-expectation and cost-sensitivity
/// surfaces for one risk-aversion level.
#[derive(Debug, Clone)]
pub struct NonDimensionalCostEvolver {
    process: OrnsteinUhlenbeck,
    coupling: MarketCoupling,
}

/// The evolved (time-node, state-node) lattice. Owned by the evolver's
/// caller, consumed read-only by the adaptive generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonDimensionalCostField {
    coupling: MarketCoupling,
    time_step: f64,
    state_step: f64,
    state_min: f64,
    /// Cost expectation per [time node][state node].
    expectation: Vec<Vec<f64>>,
    /// Cost sensitivity (state gradient) per [time node][state node].
    sensitivity: Vec<Vec<f64>>,
}

impl NonDimensionalCostEvolver {
    pub fn new(process: OrnsteinUhlenbeck, coupling: MarketCoupling) -> Self {
        Self { process, coupling }
    }

    /// The standard coordinated-variation evolver.
    pub fn systemic(process: OrnsteinUhlenbeck) -> Self {
        Self::new(process, MarketCoupling::Systemic)
    }

    pub fn coupling(&self) -> MarketCoupling {
        self.coupling
    }

    /// Run the backward induction.
    ///
    /// `nd_risk_aversion` is mu = kappa * relaxation_time, `nd_time_step`
    /// the non-dimensional slice width, `time_nodes` the slice count. The
    /// state grid is chosen internally so the explicit step satisfies both
    /// the diffusion bound and the advection CFL condition; configurations
    /// for which no usable grid exists are rejected.
    pub fn evolve(
        &self,
        nd_risk_aversion: f64,
        nd_time_step: f64,
        time_nodes: usize,
    ) -> ExecutionResult<NonDimensionalCostField> {
        let mu = nd_risk_aversion;
        let d_tau = nd_time_step;

        if !mu.is_finite() || mu < 0.0 {
            return Err(ExecutionError::invalid(
                "nd_risk_aversion",
                "must be non-negative and finite",
            ));
        }
        if !d_tau.is_finite() || d_tau <= 0.0 {
            return Err(ExecutionError::invalid(
                "nd_time_step",
                "must be positive and finite",
            ));
        }
        if time_nodes < 2 {
            return Err(ExecutionError::invalid(
                "time_nodes",
                "must be at least 2",
            ));
        }
        if d_tau > 0.5 {
            return Err(ExecutionError::UnstableConfiguration(format!(
                "non-dimensional time step {d_tau} exceeds half a relaxation time; \
                 increase the node count or the relaxation time"
            )));
        }

        let beta = self.process.non_dimensional_burstiness();
        // Four stationary standard deviations of the state, with a floor so
        // a burstiness-free run still has a usable lattice.
        let state_max = (4.0 * beta / 2.0_f64.sqrt()).max(1.0);
        // Lower bounds on the spacing: diffusion number <= 1/8 and
        // advection CFL <= 1/2, keeping the explicit step monotone.
        let dm = (2.0 * beta * d_tau.sqrt()).max(2.0 * state_max * d_tau);
        let half = (state_max / dm).ceil() as usize;
        let state_nodes = 2 * half + 1;
        if state_nodes < 5 {
            return Err(ExecutionError::UnstableConfiguration(format!(
                "stable state grid degenerates to {state_nodes} nodes at \
                 non-dimensional time step {d_tau}"
            )));
        }
        // ceil() can push the outermost node past the CFL bound.
        if half as f64 * d_tau > 1.0 {
            return Err(ExecutionError::UnstableConfiguration(
                "advection CFL condition violated at the state-grid edge".into(),
            ));
        }
        let state_min = -(half as f64) * dm;

        let mut expectation = vec![vec![0.0; state_nodes]; time_nodes];
        let mut sensitivity = vec![vec![0.0; state_nodes]; time_nodes];

        // Terminal slice is all zeros; walk backward to time zero.
        for j in (0..time_nodes - 1).rev() {
            let (earlier, later) = expectation.split_at_mut(j + 1);
            let current = &mut earlier[j];
            let next = &later[0];

            for i in 0..state_nodes {
                let m = state_min + i as f64 * dm;

                // Upwind advection; the drift always points toward the
                // center of the grid, so the edges stay one-sided inward.
                let advection = if m > 0.0 && i > 0 {
                    -m * (next[i] - next[i - 1]) / dm
                } else if m < 0.0 && i < state_nodes - 1 {
                    -m * (next[i + 1] - next[i]) / dm
                } else {
                    0.0
                };
                let diffusion = if i > 0 && i < state_nodes - 1 {
                    0.5 * beta * beta * (next[i + 1] - 2.0 * next[i] + next[i - 1]) / (dm * dm)
                } else {
                    0.0
                };
                let c = next[i] + d_tau * (advection + diffusion);

                current[i] = match self.coupling {
                    MarketCoupling::Systemic => riccati_step(c, mu * m.exp(), 1.0, d_tau),
                    MarketCoupling::LiquidityOnly => riccati_step(c, mu, m.exp(), d_tau),
                };
            }

            for i in 0..state_nodes {
                sensitivity[j][i] = if i == 0 {
                    (expectation[j][1] - expectation[j][0]) / dm
                } else if i == state_nodes - 1 {
                    (expectation[j][i] - expectation[j][i - 1]) / dm
                } else {
                    (expectation[j][i + 1] - expectation[j][i - 1]) / (2.0 * dm)
                };
            }
        }

        Ok(NonDimensionalCostField {
            coupling: self.coupling,
            time_step: d_tau,
            state_step: dm,
            state_min,
            expectation,
            sensitivity,
        })
    }
}

/// Exact flow of the Riccati reaction `c' = a (1 - b c^2)` over one step.
///
/// The fixed point is 1/sqrt(b); the tanh branch approaches it from below,
/// the coth branch from above (reachable after diffusion mixes neighboring
/// state columns). Both are monotone in c and stable for any step size.
fn riccati_step(c: f64, a: f64, b: f64, h: f64) -> f64 {
    let s = b.sqrt();
    let y = s * c;
    if y < 1.0 {
        (y.atanh() + a * s * h).tanh() / s
    } else if y > 1.0 {
        // acoth(y) = atanh(1/y)
        1.0 / (((1.0 / y).atanh() + a * s * h).tanh() * s)
    } else {
        c
    }
}

impl NonDimensionalCostField {
    pub fn coupling(&self) -> MarketCoupling {
        self.coupling
    }

    pub fn time_nodes(&self) -> usize {
        self.expectation.len()
    }

    pub fn state_nodes(&self) -> usize {
        self.expectation.first().map_or(0, |s| s.len())
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn state_min(&self) -> f64 {
        self.state_min
    }

    pub fn state_max(&self) -> f64 {
        self.state_min + (self.state_nodes() - 1) as f64 * self.state_step
    }

    /// Clamp a realized state into the covered range. Out-of-range states
    /// fall back to the nearest boundary node, never extrapolate.
    pub fn clamp_state(&self, state: f64) -> f64 {
        state.clamp(self.state_min(), self.state_max())
    }

    fn interpolate(&self, slice: &[f64], state: f64) -> f64 {
        let pos = (state - self.state_min) / self.state_step;
        if pos <= 0.0 {
            return slice[0];
        }
        let last = slice.len() - 1;
        if pos >= last as f64 {
            return slice[last];
        }
        let i = pos.floor() as usize;
        let frac = pos - i as f64;
        slice[i] * (1.0 - frac) + slice[i + 1] * frac
    }

    /// Evolved cost expectation at a time node and (clamped) state.
    pub fn expectation(&self, time_node: usize, state: f64) -> f64 {
        self.interpolate(&self.expectation[time_node], state)
    }

    /// Evolved cost sensitivity (state gradient) at a time node and
    /// (clamped) state.
    pub fn sensitivity(&self, time_node: usize, state: f64) -> f64 {
        self.interpolate(&self.sensitivity[time_node], state)
    }

    /// Non-dimensional optimal trade-rate factor e^m c(tau, m), the
    /// closed-form minimizer of instantaneous cost plus continuation cost.
    pub fn trade_rate(&self, time_node: usize, state: f64) -> f64 {
        let m = self.clamp_state(state);
        m.exp() * self.expectation(time_node, m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evolver(burstiness: f64) -> NonDimensionalCostEvolver {
        let process = OrnsteinUhlenbeck::zero_mean(burstiness, 1.0).unwrap();
        NonDimensionalCostEvolver::systemic(process)
    }

    // --- Validation and stability guards ---

    #[test]
    fn test_rejects_negative_risk_aversion() {
        assert!(evolver(1.0).evolve(-0.1, 0.2, 51).is_err());
    }

    #[test]
    fn test_rejects_non_positive_time_step() {
        assert!(evolver(1.0).evolve(0.2, 0.0, 51).is_err());
    }

    #[test]
    fn test_rejects_single_time_node() {
        assert!(evolver(1.0).evolve(0.2, 0.2, 1).is_err());
    }

    #[test]
    fn test_rejects_coarse_time_step_as_unstable() {
        let err = evolver(1.0).evolve(0.2, 0.6, 11).unwrap_err();
        assert!(matches!(err, ExecutionError::UnstableConfiguration(_)));
    }

    #[test]
    fn test_rejects_degenerate_grid_as_unstable() {
        let err = evolver(1.0).evolve(0.2, 0.5, 11).unwrap_err();
        assert!(matches!(err, ExecutionError::UnstableConfiguration(_)));
    }

    // --- Field shape and terminal condition ---

    #[test]
    fn test_terminal_slice_is_zero() {
        let field = evolver(1.0).evolve(0.2, 0.2, 51).unwrap();
        let last = field.time_nodes() - 1;
        assert_eq!(field.expectation(last, 0.0), 0.0);
        assert_eq!(field.sensitivity(last, 0.0), 0.0);
        assert_eq!(field.trade_rate(last, 1.5), 0.0);
    }

    #[test]
    fn test_grid_is_symmetric_and_odd() {
        let field = evolver(1.0).evolve(0.2, 0.2, 51).unwrap();
        assert!(field.state_nodes() % 2 == 1);
        assert!((field.state_min() + field.state_max()).abs() < 1e-12);
        assert!(field.state_nodes() >= 5);
    }

    #[test]
    fn test_zero_risk_aversion_field_is_zero() {
        let field = evolver(1.0).evolve(0.0, 0.2, 51).unwrap();
        for j in 0..field.time_nodes() {
            assert_eq!(field.expectation(j, 0.0), 0.0);
            assert_eq!(field.expectation(j, field.state_max()), 0.0);
        }
    }

    // --- Dynamics of the evolved cost ---

    #[test]
    fn test_cost_grows_backward_from_horizon() {
        let field = evolver(1.0).evolve(0.2, 0.2, 51).unwrap();
        let mut previous = 0.0;
        for j in (0..field.time_nodes()).rev() {
            let c = field.expectation(j, 0.0);
            assert!(c >= previous, "cost must grow with remaining time");
            assert!(c <= 1.0 + 1e-9, "systemic cost saturates at 1");
            previous = c;
        }
        assert!(previous > 0.5, "far from the horizon the cost saturates");
    }

    #[test]
    fn test_burstiness_free_center_matches_riccati_solution() {
        // With zero burstiness and zero drift at m = 0 the center column is
        // the pure Riccati ODE, whose solution is tanh(mu * remaining); the
        // exact-flow step reproduces it to roundoff.
        let mu = 0.2;
        let d_tau = 0.2;
        let field = evolver(0.0).evolve(mu, d_tau, 51).unwrap();
        for j in 0..field.time_nodes() {
            let remaining = (field.time_nodes() - 1 - j) as f64 * d_tau;
            let exact = (mu * remaining).tanh();
            let got = field.expectation(j, 0.0);
            assert!(
                (got - exact).abs() < 1e-9,
                "node {j}: field {got} vs tanh {exact}"
            );
        }
    }

    #[test]
    fn test_field_values_bounded_and_finite() {
        let field = evolver(2.0).evolve(1.0, 0.1, 101).unwrap();
        for j in 0..field.time_nodes() {
            for i in 0..field.state_nodes() {
                let m = field.state_min() + i as f64 * (field.state_max() - field.state_min())
                    / (field.state_nodes() - 1) as f64;
                let c = field.expectation(j, m);
                assert!(c.is_finite() && (0.0..=1.0 + 1e-9).contains(&c));
            }
        }
    }

    #[test]
    fn test_liquidity_only_differs_from_systemic() {
        let process = OrnsteinUhlenbeck::zero_mean(1.0, 1.0).unwrap();
        let systemic = NonDimensionalCostEvolver::systemic(process)
            .evolve(0.5, 0.2, 26)
            .unwrap();
        let single = NonDimensionalCostEvolver::new(process, MarketCoupling::LiquidityOnly)
            .evolve(0.5, 0.2, 26)
            .unwrap();
        let m = systemic.state_max() / 2.0;
        assert!((systemic.expectation(0, m) - single.expectation(0, m)).abs() > 1e-4);
    }

    // --- Clamping ---

    #[test]
    fn test_out_of_range_state_clamps_to_boundary() {
        let field = evolver(1.0).evolve(0.2, 0.2, 51).unwrap();
        let hi = field.state_max();
        assert_eq!(field.expectation(0, hi + 100.0), field.expectation(0, hi));
        assert_eq!(field.sensitivity(0, -1e9), field.sensitivity(0, field.state_min()));
        assert_eq!(field.trade_rate(0, hi + 100.0), field.trade_rate(0, hi));
    }

    #[test]
    fn test_sensitivity_positive_for_systemic() {
        // Higher market state means faster liquidation is optimal, so the
        // cost surface rises in m away from the horizon.
        let field = evolver(1.0).evolve(0.5, 0.2, 51).unwrap();
        assert!(field.sensitivity(0, 0.0) > 0.0);
    }
}
