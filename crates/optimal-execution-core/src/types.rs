use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::ExecutionResult;

/// A single order to be worked over a fixed execution horizon.
///
/// Immutable for the lifetime of an optimization request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderSpecification {
    /// Total quantity to execute.
    pub size: f64,
    /// Execution horizon in time units.
    pub execution_time: f64,
}

impl OrderSpecification {
    pub fn new(size: f64, execution_time: f64) -> ExecutionResult<Self> {
        if !size.is_finite() {
            return Err(ExecutionError::invalid("size", "must be finite"));
        }
        if !execution_time.is_finite() || execution_time <= 0.0 {
            return Err(ExecutionError::invalid(
                "execution_time",
                "must be positive and finite",
            ));
        }
        Ok(Self {
            size,
            execution_time,
        })
    }
}

/// Coordinated-variation market model: a reference volatility and a
/// reference liquidity, jointly modulated by the latent market state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CoordinatedVariation {
    pub reference_volatility: f64,
    pub reference_liquidity: f64,
}

impl CoordinatedVariation {
    pub fn new(reference_volatility: f64, reference_liquidity: f64) -> ExecutionResult<Self> {
        if !reference_volatility.is_finite() || reference_volatility <= 0.0 {
            return Err(ExecutionError::invalid(
                "reference_volatility",
                "must be positive and finite",
            ));
        }
        if !reference_liquidity.is_finite() || reference_liquidity <= 0.0 {
            return Err(ExecutionError::invalid(
                "reference_liquidity",
                "must be positive and finite",
            ));
        }
        Ok(Self {
            reference_volatility,
            reference_liquidity,
        })
    }
}

/// Mean-variance execution objective: expected cost plus
/// `risk_aversion` times cost variance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MeanVarianceObjective {
    /// Risk aversion >= 0. Zero recovers the cost-minimizing trajectory.
    pub risk_aversion: f64,
}

impl MeanVarianceObjective {
    pub fn new(risk_aversion: f64) -> ExecutionResult<Self> {
        if !risk_aversion.is_finite() || risk_aversion < 0.0 {
            return Err(ExecutionError::invalid(
                "risk_aversion",
                "must be non-negative and finite",
            ));
        }
        Ok(Self { risk_aversion })
    }

    /// Mean-market-state liquidation rate kappa = sigma * sqrt(lambda / eta).
    ///
    /// The reciprocal is the characteristic time of the static trajectory.
    pub fn urgency(&self, variation: &CoordinatedVariation) -> f64 {
        variation.reference_volatility
            * (self.risk_aversion / variation.reference_liquidity).sqrt()
    }

    /// Non-dimensional risk aversion mu = kappa * relaxation_time.
    pub fn non_dimensional_risk_aversion(
        &self,
        variation: &CoordinatedVariation,
        relaxation_time: f64,
    ) -> f64 {
        self.urgency(variation) * relaxation_time
    }
}

/// Generic "evaluate a value and its derivatives at an ordinate"
/// capability, as provided by an external curve/term-structure layer.
/// The core never depends on how the curve is represented.
pub trait Curve {
    fn evaluate(&self, ordinate: f64) -> f64;

    /// Derivative of the given order at the ordinate. Order 0 is the value.
    fn evaluate_derivative(&self, ordinate: f64, order: u32) -> f64;
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}
