use crate::job::JobState;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// One HTTP round trip of the job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Submit,
    Status,
    Results,
    Download,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Status => "status",
            Self::Results => "results",
            Self::Download => "download",
        }
    }

    fn action(self) -> &'static str {
        match self {
            Self::Submit => "submit execute request",
            Self::Status => "wait for job completion",
            Self::Results => "get job results",
            Self::Download => "download asset",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AdsError {
    #[error("{step} endpoint returned status {status}: {message}")]
    Api {
        step: Step,
        status: u16,
        message: String,
    },
    #[error("job {job_id} failed with status: {state}")]
    JobFailed { job_id: String, state: JobState },
    #[error("job {job_id} did not finish within {timeout:?}")]
    DeadlineExceeded { job_id: String, timeout: Duration },
    #[error("cancelled during {step}")]
    Cancelled { step: Step },
    #[error("{step} request failed: {source}")]
    Http {
        step: Step,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl AdsError {
    pub(crate) fn http(step: Step) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Self::Http { step, source }
    }
}

/// Failure of the composed fetch, tagged with the lifecycle step that failed.
#[derive(Debug, Error)]
#[error("failed to {}: {source}", .step.action())]
pub struct FetchError {
    pub step: Step,
    #[source]
    pub source: AdsError,
}

impl FetchError {
    pub fn new(step: Step, source: AdsError) -> Self {
        Self { step, source }
    }

    pub(crate) fn at(step: Step) -> impl FnOnce(AdsError) -> Self {
        move |source| Self::new(step, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_names_the_step_and_keeps_the_cause() {
        let err = FetchError::new(
            Step::Status,
            AdsError::JobFailed {
                job_id: "fail-123".to_string(),
                state: JobState::Rejected,
            },
        );
        assert_eq!(
            err.to_string(),
            "failed to wait for job completion: job fail-123 failed with status: rejected"
        );
        let inner = std::error::Error::source(&err).expect("source");
        assert_eq!(
            inner.to_string(),
            "job fail-123 failed with status: rejected"
        );
    }

    #[test]
    fn api_error_reports_step_and_status() {
        let err = AdsError::Api {
            step: Step::Submit,
            status: 401,
            message: "invalid token".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "submit endpoint returned status 401: invalid token"
        );
    }
}
