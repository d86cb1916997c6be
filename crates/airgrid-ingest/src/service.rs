use crate::errors::IngestError;
use crate::fetcher::Fetcher;
use airgrid_core::{FetchRequest, RunId};
use airgrid_store::{ObjectKey, ObjectStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquisition {
    pub key: ObjectKey,
    pub size: u64,
    pub etag: String,
}

pub struct AcquisitionService {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn ObjectStore>,
}

impl AcquisitionService {
    pub fn new(fetcher: Arc<dyn Fetcher>, store: Arc<dyn ObjectStore>) -> Self {
        Self { fetcher, store }
    }

    /// Fetches one dataset/date and writes it to `{source}/{dataset}/{date}/{run_id}.{ext}`.
    ///
    /// The run id is checked before anything else touches the network or the
    /// store. The download is streamed straight into the store and the stream
    /// is dropped on every return path.
    pub async fn acquire(
        &self,
        request: &FetchRequest,
        run_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Acquisition, IngestError> {
        let run_id = RunId::parse(run_id)?;
        info!(
            run_id = %run_id,
            dataset = %request.dataset,
            date = %request.date,
            "starting acquisition"
        );

        let fetched = self.fetcher.fetch(request, cancel).await.inspect_err(|err| {
            warn!(run_id = %run_id, step = %err.step, error = %err, "fetch failed");
        })?;

        let key = ObjectKey::new(
            fetched.source,
            request.dataset,
            request.date,
            run_id,
            fetched.extension,
        );
        let rendered = key.render();

        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }

        let stored = self
            .store
            .put_stream(&rendered, fetched.body)
            .await
            .map_err(|source| {
                warn!(key = %rendered, error = %source, "store write failed");
                IngestError::Store {
                    key: rendered.clone(),
                    source,
                }
            })?;

        info!(key = %rendered, size = stored.size, "acquisition stored");
        Ok(Acquisition {
            key,
            size: stored.size,
            etag: stored.etag,
        })
    }
}
