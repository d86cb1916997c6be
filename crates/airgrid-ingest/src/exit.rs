use std::process::ExitCode;

/// Process exit status reported to the scheduler that launched the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    /// Bad configuration or input. Retrying the same invocation cannot help.
    ConfigError = 1,
    /// Runtime failure; a retry with a fresh run id may succeed.
    ApplicationError = 2,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}
