//! Hookwire Runtime - configuration, logging and the event pump.
//!
//! This crate provides:
//! - Layered configuration loading and validation ([`ConfigLoader`])
//! - Logging initialization ([`LoggingBuilder`])
//! - Runtime orchestration ([`HookwireRuntime`]) with a per-room
//!   [`EventPump`]
//!
//! ```rust,ignore
//! use hookwire_runtime::HookwireRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HookwireRuntime::builder().build()?;
//!     let (events, inbox) = runtime.event_channel();
//!
//!     // The chat sync client pushes InboundEvents into `events`.
//!     spawn_sync_client(events);
//!
//!     runtime.run(chat_sender(), inbox).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod pump;
pub mod runtime;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, HookwireConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use pump::{EventPump, PumpStats};
pub use runtime::{HookwireRuntime, RuntimeBuilder, wait_for_shutdown};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros and span helpers.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
