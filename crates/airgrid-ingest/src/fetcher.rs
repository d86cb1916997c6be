use airgrid_ads::{ADS_SOURCE, AdsClient, CamsRequest, FetchError};
use airgrid_core::{ByteStream, FetchRequest};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// An open download plus where it came from. Dropping `body` releases the
/// underlying connection.
pub struct FetchResult {
    pub body: ByteStream,
    pub source: String,
    pub extension: String,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchResult, FetchError>;
}

#[async_trait]
impl Fetcher for AdsClient {
    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchResult, FetchError> {
        let asset = AdsClient::fetch(self, &CamsRequest::from(*request), cancel).await?;
        Ok(FetchResult {
            body: asset.body,
            source: ADS_SOURCE.to_string(),
            extension: asset.extension,
        })
    }
}
