//! The network side of the policy session.

use async_trait::async_trait;
use urlttl_core::{CachedResponse, Error};

use crate::request::Request;

/// Performs a request against the network.
///
/// Failures are returned unchanged to the session's caller; nothing is
/// cached for a failed request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &Request) -> Result<CachedResponse, Error>;
}
