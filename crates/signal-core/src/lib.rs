pub mod block;
pub mod config;
pub mod expression;
pub mod observability;
pub mod signal;

// Minimal user-facing API: SignalBlock, BlockRegistry, Signal, Expression.
pub use block::{BlockError, BlockRegistry, LifecycleState, SignalBlock};
pub use config::{ConfigError, resolve_env_placeholders, resolve_env_str};
pub use expression::{Expression, ExpressionError};
pub use observability::{ObservabilitySettings, init_observability};
pub use signal::Signal;
