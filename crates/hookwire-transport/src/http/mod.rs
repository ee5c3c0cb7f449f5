//! HTTP webhook client.

mod client;

pub use client::{USER_AGENT, WebhookClient};
