use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AdsConfig {
    pub base_url: String,
    pub api_key: String,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    /// Bounds each JSON round trip. Downloads only get `connect_timeout`.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl AdsConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            poll_interval: Duration::from_secs(10),
            poll_timeout: Duration::from_secs(30 * 60),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }
}
