//! # Plugin Test Utilities
//!
//! Shared test utilities for plugin client and middleware testing.
//!
//! This crate provides a programmable in-memory plugin client and a
//! decorator rig for exercising middleware chains without a real plugin
//! process.
//!
//! ## Modules
//!
//! - `client` - `TestClient`, a programmable `PluginClient` that records calls
//! - `fixtures` - Pre-built contexts, requests, and data responses
//! - `rig` - `DecoratorRig`, a test client wrapped in a middleware chain
//!
//! ## Usage
//!
//! ```rust,ignore
//! use plugin_test_utils::{fixtures, DecoratorRig};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let rig = DecoratorRig::new(middlewares);
//!     rig.client.on_query_data(|_ctx, _req| {
//!         Ok(fixtures::batch([("A", fixtures::downstream_error_response())]))
//!     });
//!
//!     let resp = rig
//!         .decorated
//!         .query_data(&CallContext::new(), &fixtures::query_data_request("my-plugin"))
//!         .await?;
//! }
//! ```

#![warn(clippy::pedantic)]

pub mod client;
pub mod fixtures;
pub mod rig;

pub use client::TestClient;
pub use rig::DecoratorRig;

/// Install a plain tracing subscriber for test output.
///
/// Safe to call from multiple tests; only the first call wins.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
