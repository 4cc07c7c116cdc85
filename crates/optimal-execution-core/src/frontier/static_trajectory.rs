use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::ExecutionError;
use crate::trajectory::{TradingTrajectory, TrajectoryStatistics};
use crate::types::{
    with_metadata, ComputationOutput, CoordinatedVariation, Curve, MeanVarianceObjective,
    OrderSpecification,
};
use crate::ExecutionResult;

// ---------------------------------------------------------------------------
// Hyperbolic helpers
// ---------------------------------------------------------------------------

fn coth(x: f64) -> f64 {
    1.0 / x.tanh()
}

/// csch^2(x) = 1 / sinh^2(x); underflows to 0 well before sinh overflows.
fn csch2(x: f64) -> f64 {
    if x > 20.0 {
        0.0
    } else {
        let s = x.sinh();
        1.0 / (s * s)
    }
}

// Below this value of kappa * T the exact hyperbolic forms lose digits to
// cancellation and the risk-neutral limits are accurate to O((kappa T)^2).
const RISK_NEUTRAL_CUTOFF: f64 = 1e-4;

// ---------------------------------------------------------------------------
// Continuous efficient trajectory
// ---------------------------------------------------------------------------

/// The continuous-time optimal trajectory on the mean-variance efficient
/// frontier: holdings decay as sinh(kappa (T - t)) / sinh(kappa T), where
/// kappa is the risk-aversion-scaled urgency. Holdings and trade rate are
/// two closed-form views of the same (size, kappa, horizon) triple, so the
/// trade rate is the exact analytic derivative of the holdings by
/// construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EfficientTrajectory {
    pub size: f64,
    pub execution_time: f64,
    /// Urgency kappa = sigma * sqrt(lambda / eta). Zero is risk-neutral.
    pub kappa: f64,
    pub statistics: TrajectoryStatistics,
}

impl EfficientTrajectory {
    pub fn new(
        order: &OrderSpecification,
        variation: &CoordinatedVariation,
        objective: &MeanVarianceObjective,
    ) -> ExecutionResult<Self> {
        let x0 = order.size;
        let t_total = order.execution_time;
        let kappa = objective.urgency(variation);
        let eta = variation.reference_liquidity;
        let sigma = variation.reference_volatility;

        let x = kappa * t_total;
        let (expectation, variance) = if x < RISK_NEUTRAL_CUTOFF {
            // Risk-neutral limits of the hyperbolic forms.
            (
                eta * x0 * x0 / t_total,
                sigma * sigma * x0 * x0 * t_total / 3.0,
            )
        } else {
            let ch = coth(x);
            let cs = csch2(x);
            (
                eta * x0 * x0 * kappa / 2.0 * (ch + x * cs),
                sigma * sigma * x0 * x0 / (2.0 * kappa) * (ch - x * cs),
            )
        };

        // The risk-neutral trajectory has no decay scale of its own; its
        // only time constant is the horizon.
        let characteristic_time = if kappa > 0.0 { 1.0 / kappa } else { t_total };

        if !expectation.is_finite() || !variance.is_finite() || !characteristic_time.is_finite() {
            return Err(ExecutionError::ConstructionFailure(
                "efficient trajectory produced a non-finite statistic".into(),
            ));
        }
        let statistics = TrajectoryStatistics::new(expectation, variance, characteristic_time)?;

        Ok(Self {
            size: x0,
            execution_time: t_total,
            kappa,
            statistics,
        })
    }

    /// Remaining holdings at time t.
    ///
    /// Evaluated in the exponential form
    /// `X e^(-kappa t) (1 - e^(-2 kappa (T - t))) / (1 - e^(-2 kappa T))`,
    /// which never overflows and is exactly 0 at t = T.
    pub fn holdings(&self, t: f64) -> f64 {
        let k = self.kappa;
        let t_total = self.execution_time;
        if k * t_total < RISK_NEUTRAL_CUTOFF {
            return self.size * (1.0 - t / t_total);
        }
        let numer = (-k * t).exp() * (1.0 - (-2.0 * k * (t_total - t)).exp());
        self.size * numer / (1.0 - (-2.0 * k * t_total).exp())
    }

    /// Instantaneous trade rate dh/dt at time t; the exact derivative of
    /// [`Self::holdings`].
    pub fn trade_rate(&self, t: f64) -> f64 {
        let k = self.kappa;
        let t_total = self.execution_time;
        if k * t_total < RISK_NEUTRAL_CUTOFF {
            return -self.size / t_total;
        }
        let numer = (-k * t).exp() + (k * (t - 2.0 * t_total)).exp();
        -self.size * k * numer / (1.0 - (-2.0 * k * t_total).exp())
    }
}

impl Curve for EfficientTrajectory {
    fn evaluate(&self, ordinate: f64) -> f64 {
        self.holdings(ordinate)
    }

    fn evaluate_derivative(&self, ordinate: f64, order: u32) -> f64 {
        match order {
            0 => self.holdings(ordinate),
            1 => self.trade_rate(ordinate),
            // h satisfies h'' = kappa^2 h, so higher orders recurse.
            n => self.kappa * self.kappa * self.evaluate_derivative(ordinate, n - 2),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Input for a static efficient-frontier trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticTrajectoryInput {
    /// Total quantity to execute.
    pub size: f64,
    /// Execution horizon in time units.
    pub execution_time: f64,
    /// Mean-variance risk aversion (>= 0).
    pub risk_aversion: f64,
    /// Reference (unmodulated) volatility.
    pub reference_volatility: f64,
    /// Reference (unmodulated) liquidity.
    pub reference_liquidity: f64,
    /// Number of discretization nodes (>= 2).
    pub node_count: usize,
}

/// Output of the static trajectory generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticTrajectoryOutput {
    pub trajectory: TradingTrajectory,
    pub expected_cost: f64,
    pub cost_variance: f64,
    pub characteristic_time: f64,
}

/// Compute the deterministic optimal trajectory for one risk-aversion level
/// and sample it on a uniform time grid.
pub fn generate_static_trajectory(
    input: &StaticTrajectoryInput,
) -> ExecutionResult<ComputationOutput<StaticTrajectoryOutput>> {
    let start = Instant::now();
    let warnings: Vec<String> = Vec::new();

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

    let continuous = EfficientTrajectory::new(&order, &variation, &objective)?;
    let trajectory = sample_trajectory(&continuous, input.node_count)?;

    let output = StaticTrajectoryOutput {
        expected_cost: continuous.statistics.transaction_cost_expectation,
        cost_variance: continuous.statistics.transaction_cost_variance,
        characteristic_time: continuous.statistics.characteristic_time,
        trajectory,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Static Efficient Trajectory (Almgren-Chriss 2000)",
        &serde_json::json!({
            "size": input.size,
            "execution_time": input.execution_time,
            "risk_aversion": input.risk_aversion,
            "node_count": input.node_count,
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn sample_trajectory(
    continuous: &EfficientTrajectory,
    node_count: usize,
) -> ExecutionResult<TradingTrajectory> {
    let dt = continuous.execution_time / (node_count - 1) as f64;
    let mut times = Vec::with_capacity(node_count);
    let mut holdings = Vec::with_capacity(node_count);
    let mut trade_rates = Vec::with_capacity(node_count);
    for i in 0..node_count {
        // Land on the horizon exactly so holdings close at 0.
        let t = if i == node_count - 1 {
            continuous.execution_time
        } else {
            i as f64 * dt
        };
        times.push(t);
        holdings.push(continuous.holdings(t));
        trade_rates.push(continuous.trade_rate(t));
    }
    TradingTrajectory::new(times, holdings, trade_rates, continuous.statistics)
}

// ---------------------------------------------------------------------------
// Efficient frontier sweep
// ---------------------------------------------------------------------------

/// Input for an efficient-frontier sweep over risk-aversion levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierInput {
    pub size: f64,
    pub execution_time: f64,
    pub reference_volatility: f64,
    pub reference_liquidity: f64,
    /// Risk-aversion levels to sweep, each >= 0.
    pub risk_aversions: Vec<f64>,
}

/// One point on the cost/variance efficient frontier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierPoint {
    pub risk_aversion: f64,
    pub expected_cost: f64,
    pub cost_variance: f64,
    pub characteristic_time: f64,
}

/// Sweep the efficient frontier: one closed-form trajectory per
/// risk-aversion level.
pub fn efficient_frontier(
    input: &FrontierInput,
) -> ExecutionResult<ComputationOutput<Vec<FrontierPoint>>> {
    let start = Instant::now();

    if input.risk_aversions.is_empty() {
        return Err(ExecutionError::invalid(
            "risk_aversions",
            "at least one risk-aversion level is required",
        ));
    }

    let order = OrderSpecification::new(input.size, input.execution_time)?;
    let variation =
        CoordinatedVariation::new(input.reference_volatility, input.reference_liquidity)?;

    let mut points = Vec::with_capacity(input.risk_aversions.len());
    for &lambda in &input.risk_aversions {
        let objective = MeanVarianceObjective::new(lambda)?;
        let trajectory = EfficientTrajectory::new(&order, &variation, &objective)?;
        points.push(FrontierPoint {
            risk_aversion: lambda,
            expected_cost: trajectory.statistics.transaction_cost_expectation,
            cost_variance: trajectory.statistics.transaction_cost_variance,
            characteristic_time: trajectory.statistics.characteristic_time,
        });
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Execution Efficient Frontier (Almgren-Chriss 2000)",
        &serde_json::json!({
            "size": input.size,
            "execution_time": input.execution_time,
            "points": input.risk_aversions.len(),
        }),
        vec![],
        elapsed,
        points,
    ))
}
