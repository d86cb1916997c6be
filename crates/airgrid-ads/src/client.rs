use crate::config::AdsConfig;
use crate::errors::{AdsError, FetchError, Step};
use crate::job::{AssetDescriptor, JobHandle, JobState, ResultsResponse};
use crate::request::CamsRequest;
use airgrid_core::ByteStream;
use futures::TryStreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Response, StatusCode};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const MAX_ERROR_BODY: usize = 512;

/// Result of a completed fetch. The caller owns `body`; dropping it closes
/// the download connection.
pub struct AssetStream {
    pub job_id: String,
    pub content_type: String,
    pub extension: String,
    pub body: ByteStream,
}

impl std::fmt::Debug for AssetStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStream")
            .field("job_id", &self.job_id)
            .field("content_type", &self.content_type)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct AdsClient {
    http: reqwest::Client,
    config: AdsConfig,
}

impl AdsClient {
    pub fn new(config: AdsConfig) -> Result<Self, AdsError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(AdsError::Client)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AdsConfig {
        &self.config
    }

    /// Submit, poll, resolve the result asset and open its download.
    pub async fn fetch(
        &self,
        request: &CamsRequest,
        cancel: &CancellationToken,
    ) -> Result<AssetStream, FetchError> {
        let job = cancellable(cancel, Step::Submit, self.submit(request))
            .await
            .map_err(FetchError::at(Step::Submit))?;

        let finished = self
            .poll_to_terminal(
                &job.job_id,
                self.config.poll_interval,
                self.config.poll_timeout,
                cancel,
            )
            .await
            .map_err(FetchError::at(Step::Status))?;

        let asset = cancellable(cancel, Step::Results, self.fetch_result_handle(&finished.job_id))
            .await
            .map_err(FetchError::at(Step::Results))?;

        info!(
            job_id = %finished.job_id,
            asset_url = %asset.href,
            asset_type = %asset.content_type,
            "downloading result asset"
        );
        let body = cancellable(cancel, Step::Download, self.download(&asset))
            .await
            .map_err(FetchError::at(Step::Download))?;

        Ok(AssetStream {
            job_id: finished.job_id,
            extension: asset.extension().to_string(),
            content_type: asset.content_type,
            body,
        })
    }

    pub async fn submit(&self, request: &CamsRequest) -> Result<JobHandle, AdsError> {
        info!(
            process = request.process(),
            dataset = %request.dataset,
            date = %request.date,
            "submitting execute request"
        );
        let url = format!(
            "{}/processes/{}/execution",
            self.base_url(),
            request.process()
        );
        let response = self
            .http
            .post(&url)
            .header(TOKEN_HEADER, &self.config.api_key)
            .header(ACCEPT, "application/json")
            .timeout(self.config.request_timeout)
            .json(&request.payload())
            .send()
            .await
            .map_err(AdsError::http(Step::Submit))?;

        let response = expect_status(response, Step::Submit, |s| s == StatusCode::CREATED).await?;
        let job = response
            .json::<JobHandle>()
            .await
            .map_err(AdsError::http(Step::Submit))?;

        info!(job_id = %job.job_id, status = %job.status, "execute request submitted");
        Ok(job)
    }

    pub async fn job_status(&self, job_id: &str) -> Result<JobHandle, AdsError> {
        let url = format!("{}/jobs/{job_id}", self.base_url());
        let response = self
            .http
            .get(&url)
            .header(TOKEN_HEADER, &self.config.api_key)
            .header(ACCEPT, "application/json")
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(AdsError::http(Step::Status))?;

        let response = expect_status(response, Step::Status, |s| s.is_success()).await?;
        response
            .json::<JobHandle>()
            .await
            .map_err(AdsError::http(Step::Status))
    }

    /// Polls `job_id` every `interval` until it reaches a terminal state.
    ///
    /// Stops without further requests once `deadline` elapses or `cancel`
    /// fires, including while a status request is in flight. Status errors
    /// are returned as-is; nothing is retried here.
    pub async fn poll_to_terminal(
        &self,
        job_id: &str,
        interval: Duration,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<JobHandle, AdsError> {
        let interval = interval.max(Duration::from_millis(1));
        let expired = tokio::time::sleep_until(Instant::now() + deadline);
        tokio::pin!(expired);

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let cancelled = || AdsError::Cancelled { step: Step::Status };
        let timed_out = || AdsError::DeadlineExceeded {
            job_id: job_id.to_string(),
            timeout: deadline,
        };

        let mut polls = 0u32;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = &mut expired => return Err(timed_out()),
                _ = ticker.tick() => {}
            }

            let job = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = &mut expired => return Err(timed_out()),
                job = self.job_status(job_id) => job?,
            };
            polls += 1;

            match job.status {
                JobState::Successful => {
                    info!(job_id = %job.job_id, polls, "job completed");
                    return Ok(job);
                }
                state if state.is_failure() => {
                    warn!(job_id = %job.job_id, status = %state, polls, "job reached a failed state");
                    return Err(AdsError::JobFailed {
                        job_id: job.job_id,
                        state,
                    });
                }
                state => {
                    debug!(job_id = %job.job_id, status = %state, polls, "job not completed yet");
                }
            }
        }
    }

    pub async fn fetch_result_handle(&self, job_id: &str) -> Result<AssetDescriptor, AdsError> {
        let url = format!("{}/jobs/{job_id}/results", self.base_url());
        let response = self
            .http
            .get(&url)
            .header(TOKEN_HEADER, &self.config.api_key)
            .header(ACCEPT, "application/json")
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(AdsError::http(Step::Results))?;

        let response = expect_status(response, Step::Results, |s| s.is_success()).await?;
        let results = response
            .json::<ResultsResponse>()
            .await
            .map_err(AdsError::http(Step::Results))?;
        Ok(results.asset.value)
    }

    /// Opens the asset download. The returned stream is not buffered.
    pub async fn download(&self, asset: &AssetDescriptor) -> Result<ByteStream, AdsError> {
        let response = self
            .http
            .get(&asset.href)
            .send()
            .await
            .map_err(AdsError::http(Step::Download))?;

        let response = expect_status(response, Step::Download, |s| s.is_success()).await?;
        Ok(Box::pin(
            response.bytes_stream().map_err(std::io::Error::other),
        ))
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
}

async fn expect_status(
    response: Response,
    step: Step,
    accept: impl FnOnce(StatusCode) -> bool,
) -> Result<Response, AdsError> {
    let status = response.status();
    if accept(status) {
        return Ok(response);
    }
    let mut message = response.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
    }
    Err(AdsError::Api {
        step,
        status: status.as_u16(),
        message,
    })
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    step: Step,
    operation: impl Future<Output = Result<T, AdsError>>,
) -> Result<T, AdsError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AdsError::Cancelled { step }),
        result = operation => result,
    }
}
