//! Page fetcher seam between the cache and the REST client.

use async_trait::async_trait;
use lectern_core::{FetchError, Page, PageRequest, QueryOptions, ServiceId};

/// Fetches one page of a list service.
///
/// The REST client implements this; tests use scripted fetchers. The cache
/// never calls the network by any other route.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(
        &self,
        service: &ServiceId,
        options: &QueryOptions,
        request: PageRequest,
    ) -> Result<Page, FetchError>;
}
