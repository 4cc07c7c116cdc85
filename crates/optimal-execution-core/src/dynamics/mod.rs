pub mod ornstein_uhlenbeck;

pub use ornstein_uhlenbeck::{simulate, MarketStateSequence, OrnsteinUhlenbeck};
