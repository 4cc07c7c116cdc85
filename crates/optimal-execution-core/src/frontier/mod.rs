pub mod static_trajectory;

pub use static_trajectory::{
    efficient_frontier, generate_static_trajectory, EfficientTrajectory, FrontierInput,
    FrontierPoint, StaticTrajectoryInput, StaticTrajectoryOutput,
};
