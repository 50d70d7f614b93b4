use crate::error::SourceError;
use crate::proxy::Proxy;
use async_trait::async_trait;

/// A remote listing of candidate proxies.
///
/// Implementations make a single request per call and never retry; an empty
/// list is a normal answer.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn list(&self) -> Result<Vec<Proxy>, SourceError>;
    fn name(&self) -> &str;
}
