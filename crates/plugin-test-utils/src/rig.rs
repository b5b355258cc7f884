//! Test client wrapped in a middleware chain.

use std::sync::Arc;

use plugin_client::{decorate, ClientMiddleware, PluginClient};

use crate::client::TestClient;

/// A [`TestClient`] decorated with a middleware chain.
///
/// Holds both ends of the chain: `decorated` is what a caller would invoke,
/// `client` is the inner test client for programming behavior and asserting
/// on what reached it.
pub struct DecoratorRig {
    /// The inner programmable client.
    pub client: Arc<TestClient>,
    /// The fully decorated client, first middleware outermost.
    pub decorated: Arc<dyn PluginClient>,
}

impl DecoratorRig {
    /// Wrap a fresh test client in the given middleware chain.
    #[must_use]
    pub fn new(middlewares: &[Arc<dyn ClientMiddleware>]) -> Self {
        let client = Arc::new(TestClient::new());
        let decorated = decorate(Arc::clone(&client) as Arc<dyn PluginClient>, middlewares);
        Self { client, decorated }
    }
}
