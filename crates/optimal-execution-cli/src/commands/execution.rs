use clap::{Args, ValueEnum};
use serde_json::Value;

use optimal_execution_core::adaptive::{
    generate_adaptive_trajectory, AdaptiveTrajectoryInput, InitialTradeRate,
};
use optimal_execution_core::frontier::{
    efficient_frontier, generate_static_trajectory, FrontierInput, StaticTrajectoryInput,
};
use optimal_execution_core::hjb::MarketCoupling;

use crate::input;

/// Arguments for a static efficient trajectory
#[derive(Args)]
pub struct StaticArgs {
    /// Path to a JSON file with the full input (overrides the flags below)
    #[arg(long)]
    pub input: Option<String>,

    /// Total quantity to execute
    #[arg(long, default_value_t = 1.0)]
    pub size: f64,

    /// Execution horizon in time units
    #[arg(long, default_value_t = 10.0)]
    pub execution_time: f64,

    /// Mean-variance risk aversion (0 is cost-minimizing)
    #[arg(long, default_value_t = 0.04)]
    pub risk_aversion: f64,

    /// Reference volatility
    #[arg(long, default_value_t = 1.0)]
    pub reference_volatility: f64,

    /// Reference liquidity (temporary impact coefficient)
    #[arg(long, default_value_t = 1.0)]
    pub reference_liquidity: f64,

    /// Number of time nodes in the sampled trajectory
    #[arg(long, default_value_t = 51)]
    pub node_count: usize,
}

/// Arguments for an adaptive closed-loop trajectory
#[derive(Args)]
pub struct AdaptiveArgs {
    /// Path to a JSON file with the full input (overrides the flags below)
    #[arg(long)]
    pub input: Option<String>,

    /// Total quantity to execute
    #[arg(long, default_value_t = 1.0)]
    pub size: f64,

    /// Execution horizon in time units
    #[arg(long, default_value_t = 10.0)]
    pub execution_time: f64,

    /// Mean-variance risk aversion
    #[arg(long, default_value_t = 0.04)]
    pub risk_aversion: f64,

    /// Reference volatility
    #[arg(long, default_value_t = 1.0)]
    pub reference_volatility: f64,

    /// Reference liquidity (temporary impact coefficient)
    #[arg(long, default_value_t = 1.0)]
    pub reference_liquidity: f64,

    /// Mean-reversion time constant of the market state
    #[arg(long, default_value_t = 1.0)]
    pub relaxation_time: f64,

    /// Volatility of the market state
    #[arg(long, default_value_t = 1.0)]
    pub burstiness: f64,

    /// Market state at the start of execution
    #[arg(long, default_value_t = -0.5, allow_hyphen_values = true)]
    pub initial_market_state: f64,

    /// Number of time nodes
    #[arg(long, default_value_t = 51)]
    pub node_count: usize,

    /// Trade-rate condition at the first node
    #[arg(long, value_enum, default_value_t = RateInitialization::Zero)]
    pub initial_trade_rate: RateInitialization,

    /// How the market state modulates volatility and liquidity
    #[arg(long, value_enum, default_value_t = CouplingChoice::Systemic)]
    pub coupling: CouplingChoice,

    /// RNG seed; omit to draw from entropy
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for an efficient-frontier sweep
#[derive(Args)]
pub struct FrontierArgs {
    /// Path to a JSON file with the full input (overrides the flags below)
    #[arg(long)]
    pub input: Option<String>,

    /// Total quantity to execute
    #[arg(long, default_value_t = 1.0)]
    pub size: f64,

    /// Execution horizon in time units
    #[arg(long, default_value_t = 10.0)]
    pub execution_time: f64,

    /// Reference volatility
    #[arg(long, default_value_t = 1.0)]
    pub reference_volatility: f64,

    /// Reference liquidity (temporary impact coefficient)
    #[arg(long, default_value_t = 1.0)]
    pub reference_liquidity: f64,

    /// Comma-separated risk-aversion levels to sweep
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "0.01,0.04,0.09,0.16,0.36,0.64,1.0"
    )]
    pub risk_aversions: Vec<f64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RateInitialization {
    Zero,
    Static,
}

impl From<RateInitialization> for InitialTradeRate {
    fn from(choice: RateInitialization) -> Self {
        match choice {
            RateInitialization::Zero => InitialTradeRate::Zero,
            RateInitialization::Static => InitialTradeRate::Static,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CouplingChoice {
    Systemic,
    LiquidityOnly,
}

impl From<CouplingChoice> for MarketCoupling {
    fn from(choice: CouplingChoice) -> Self {
        match choice {
            CouplingChoice::Systemic => MarketCoupling::Systemic,
            CouplingChoice::LiquidityOnly => MarketCoupling::LiquidityOnly,
        }
    }
}

pub fn run_static(args: StaticArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let st_input: StaticTrajectoryInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        StaticTrajectoryInput {
            size: args.size,
            execution_time: args.execution_time,
            risk_aversion: args.risk_aversion,
            reference_volatility: args.reference_volatility,
            reference_liquidity: args.reference_liquidity,
            node_count: args.node_count,
        }
    };
    let result = generate_static_trajectory(&st_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_adaptive(args: AdaptiveArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let ad_input: AdaptiveTrajectoryInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        AdaptiveTrajectoryInput {
            size: args.size,
            execution_time: args.execution_time,
            risk_aversion: args.risk_aversion,
            reference_volatility: args.reference_volatility,
            reference_liquidity: args.reference_liquidity,
            relaxation_time: args.relaxation_time,
            burstiness: args.burstiness,
            initial_market_state: args.initial_market_state,
            node_count: args.node_count,
            initial_trade_rate: args.initial_trade_rate.into(),
            coupling: args.coupling.into(),
            seed: args.seed,
        }
    };
    let result = generate_adaptive_trajectory(&ad_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_frontier(args: FrontierArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let fr_input: FrontierInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        if args.risk_aversions.is_empty() {
            return Err("--risk-aversions requires at least one level".into());
        }
        FrontierInput {
            size: args.size,
            execution_time: args.execution_time,
            reference_volatility: args.reference_volatility,
            reference_liquidity: args.reference_liquidity,
            risk_aversions: args.risk_aversions,
        }
    };
    let result = efficient_frontier(&fr_input)?;
    Ok(serde_json::to_value(result)?)
}
