//! Network reachability port.

use async_trait::async_trait;

/// Quick "is the network up" probe consulted before a download starts.
///
/// Implementations must resolve quickly and fail closed: any transport
/// error or timeout is reported as `false`, never as an error.
#[async_trait]
pub trait NetworkReachabilityPort: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Probe that always reports the network as reachable.
///
/// Useful for air-gapped setups talking only to a local backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReachable;

#[async_trait]
impl NetworkReachabilityPort for AlwaysReachable {
    async fn is_reachable(&self) -> bool {
        true
    }
}
