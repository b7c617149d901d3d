use async_trait::async_trait;

use super::{ApiError, ApiRequest, ApiResponse};

/// Where responses come from: the remote service or the demo dataset.
///
/// `DataAccess` picks one implementation at startup and may hold a second
/// one as fallback.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short name for logs (`"live"`, `"demo"`).
    fn name(&self) -> &'static str;

    /// Run one request. Implementations return `Err` only for failures the
    /// caller may recover from by falling back; logical failures that are
    /// part of the response shape come back as `success: false`.
    async fn fetch(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}
