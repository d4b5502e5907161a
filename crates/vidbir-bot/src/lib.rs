//! Telegram bridge runtime for the vidbir intake service.
//!
//! Long-polls the Bot API and dispatches each update into the intake form,
//! the staff action handlers, or the relay engine.

pub mod bridge_runtime;

pub use bridge_runtime::{run_bridge, BridgeRuntime, BridgeRuntimeConfig};
