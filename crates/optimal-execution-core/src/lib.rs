pub mod error;
pub mod trajectory;
pub mod types;

#[cfg(feature = "frontier")]
pub mod frontier;

#[cfg(feature = "adaptive")]
pub mod adaptive;

#[cfg(feature = "adaptive")]
pub mod dynamics;

#[cfg(feature = "adaptive")]
pub mod hjb;

pub use error::ExecutionError;
pub use types::*;

/// Standard result type for all trajectory-construction operations
pub type ExecutionResult<T> = Result<T, ExecutionError>;
