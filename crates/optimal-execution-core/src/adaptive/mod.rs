pub mod trajectory_generator;

pub use trajectory_generator::{
    generate_adaptive_trajectory, AdaptiveTrajectoryInput, AdaptiveTrajectoryOutput,
    InitialTradeRate,
};
