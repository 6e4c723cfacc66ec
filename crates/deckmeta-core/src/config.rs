use std::time::Duration;

/// Pipeline configuration, fixed per process.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum pages kept when slicing a paginated document
    pub max_pages: usize,
    /// Delay between processing-state polls
    pub poll_interval: Duration,
    /// Upper bound on the total poll wait. `None` waits indefinitely,
    /// relying on the remote service to eventually resolve.
    pub max_poll_wait: Option<Duration>,
    /// Retries on transient generation errors, beyond the first attempt
    pub generate_retries: u32,
    /// Fixed delay between generation retry attempts
    pub retry_delay: Duration,
    /// Generation model identifier
    pub model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            poll_interval: Duration::from_secs(3),
            max_poll_wait: None,
            generate_retries: 3,
            retry_delay: Duration::from_secs(10),
            model: "gemini-2.0-flash".to_string(),
        }
    }
}
