//! # Block SDK
//!
//! Blocks are the plugin units a host runtime drives. Each block implements [`SignalBlock`]
//! and receives ordered batches of [`Signal`]s.
//!
//! ## Lifecycle
//!
//! - **Configure** is construction: a registry factory turns a JSON payload into a ready block,
//!   or fails. A block value that exists is [`LifecycleState::Configured`].
//! - **Start** is optional; the default is a no-op.
//! - **Process** is called once per delivered batch. The host serializes delivery, so blocks
//!   take `&mut self` and need no locking. A single bad signal must never fail the batch.
//! - **Stop** releases whatever the block acquired during configuration and moves it to
//!   [`LifecycleState::Stopped`]. A stopped block rejects further work with
//!   [`BlockError::NotRunning`].
//!
//! ## Commands
//!
//! Blocks may expose named read-only operations (e.g. `quota`) through [`SignalBlock::invoke`].
//! Command results are JSON; failures propagate to the caller.

pub mod registry;

use serde::{Deserialize, Serialize};

use crate::signal::Signal;

pub use registry::BlockRegistry;

/// Lifecycle state of a constructed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Configured,
    Stopped,
}

/// Block error surfaced to the host.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BlockError {
    #[error("block error: {0}")]
    Other(String),
    #[error("invalid block config: {0}")]
    InvalidConfig(String),
    #[error("connection setup failed: {0}")]
    Connect(String),
    #[error("unknown block type: {0}")]
    UnknownBlockType(String),
    #[error("unknown command `{command}` for block type {block_type}")]
    UnknownCommand { block_type: String, command: String },
    #[error("command `{command}` failed: {message}")]
    Command { command: String, message: String },
    #[error("block {block_type} is not running")]
    NotRunning { block_type: String },
}

/// Sync block contract driven by the host runtime.
pub trait SignalBlock: Send {
    /// Registry key of this block kind.
    fn block_type(&self) -> &str;

    fn state(&self) -> LifecycleState;

    fn start(&mut self) -> Result<(), BlockError> {
        Ok(())
    }

    /// Handle one ordered batch. Per-signal failures are handled inside the block.
    fn process_signals(&mut self, signals: &[Signal]) -> Result<(), BlockError>;

    /// Names accepted by [`SignalBlock::invoke`].
    fn commands(&self) -> &[&'static str] {
        &[]
    }

    fn invoke(&self, command: &str) -> Result<serde_json::Value, BlockError> {
        Err(BlockError::UnknownCommand {
            block_type: self.block_type().to_string(),
            command: command.to_string(),
        })
    }

    fn stop(&mut self) -> Result<(), BlockError> {
        Ok(())
    }
}
