pub mod result;

pub use result::{TradingTrajectory, TrajectoryStatistics};
