//! Execution environment boundary
//!
//! The pool never drives a browser itself. An [`Environment`] opens one
//! execution context per attempt, configured with the selected proxy, and the
//! pool hands that context to the task's handler before closing it again.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ProxySettings;

#[async_trait]
pub trait Environment: Send + Sync + 'static {
    /// Session type passed to handlers
    type Context: Send + 'static;

    /// Open a context routed through `proxy` when one is given.
    ///
    /// Proxy handshake failures and timeouts should surface as
    /// `PoolError::ProxyConnectivityFailure`.
    async fn open(&self, proxy: Option<&ProxySettings>) -> Result<Self::Context>;

    /// Dispose of a context. Called exactly once per successful `open`,
    /// including when the attempt is abandoned by `stop()`.
    async fn close(&self, context: Self::Context);
}
