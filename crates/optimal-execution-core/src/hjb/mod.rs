pub mod cost_evolver;

pub use cost_evolver::{MarketCoupling, NonDimensionalCostEvolver, NonDimensionalCostField};
