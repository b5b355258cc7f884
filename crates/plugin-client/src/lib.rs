//! Backend Plugin Client
//!
//! This library defines the client seam between the Beacon server and its
//! backend plugins (datasources and apps). A backend plugin supports four
//! operations:
//!
//! - Health check (`check_health`)
//! - Resource call (`call_resource`)
//! - Data query (`query_data`), a named batch of sub-queries
//! - Metrics collection (`collect_metrics`)
//!
//! The server never talks to a plugin directly: it talks to a
//! [`PluginClient`], which is assembled at startup by applying an explicit
//! ordered list of [`ClientMiddleware`] wrappers around the transport
//! client (see [`decorate`]). Middlewares are transparent: a caller cannot
//! distinguish a decorated client from a direct one.
//!
//! # Modules
//!
//! - [`client`] - The `PluginClient` trait, call context, and middleware composition
//! - [`context`] - Plugin identity and deployment target
//! - [`error`] - Client error types
//! - [`meta`] - Per-call request metadata shared along the middleware chain
//! - [`request`] - The four operation request/response shapes

#![warn(clippy::pedantic)]

pub mod client;
pub mod context;
pub mod error;
pub mod meta;
pub mod request;

pub use client::{decorate, CallContext, ClientMiddleware, ClientResult, Endpoint, PluginClient};
pub use context::{PluginContext, Target};
pub use error::PluginClientError;
pub use meta::{RequestMeta, StatusSource};
