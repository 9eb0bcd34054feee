use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use super::types::{api_error_message, GenerateRequest, GenerateResponse};
use super::AnalysisError;
use crate::config::AnalysisConfig;

/// Remote generative model abstraction (allows mocking).
///
/// Returns the model's output text, already unwrapped from the response
/// envelope.
pub trait GenerativeModel: Send + Sync {
    fn generate(&self, request: &GenerateRequest) -> Result<String, AnalysisError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Gemini `generateContent` client over blocking HTTP.
pub struct GeminiClient {
    api_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnalysisError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    fn map_send_error(&self, e: reqwest::Error) -> AnalysisError {
        if e.is_timeout() {
            AnalysisError::Transport(format!("Request timed out after {}s", self.timeout_secs))
        } else if e.is_connect() {
            AnalysisError::Transport(format!("Cannot reach model API at {}", self.api_url))
        } else {
            // reqwest errors can carry the full URL, key included
            AnalysisError::Transport(e.without_url().to_string())
        }
    }
}

impl GenerativeModel for GeminiClient {
    fn generate(&self, request: &GenerateRequest) -> Result<String, AnalysisError> {
        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AnalysisError::Transport(format!(
                "Gemini API error (status {}): {}",
                status.as_u16(),
                api_error_message(&body)
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| AnalysisError::MalformedResponse(e.without_url().to_string()))?;

        parsed.into_text()
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// One scripted reply: optional delay, then the outcome.
type MockStep = (Duration, Result<String, AnalysisError>);

/// Mock model for testing. Replays scripted replies in order and records
/// every request it receives.
pub struct MockModel {
    script: Mutex<VecDeque<MockStep>>,
    fallback: Option<String>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Model that always answers with the same text.
    pub fn constant(text: &str) -> Self {
        Self {
            fallback: Some(text.to_string()),
            ..Self::new()
        }
    }

    pub fn then_text(self, text: &str) -> Self {
        self.then(Duration::ZERO, Ok(text.to_string()))
    }

    pub fn then_error(self, error: AnalysisError) -> Self {
        self.then(Duration::ZERO, Err(error))
    }

    /// Reply after sleeping for `delay`.
    pub fn then_delayed(self, delay: Duration, reply: Result<String, AnalysisError>) -> Self {
        self.then(delay, reply)
    }

    fn then(self, delay: Duration, reply: Result<String, AnalysisError>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back((delay, reply));
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerativeModel for MockModel {
    fn generate(&self, request: &GenerateRequest) -> Result<String, AnalysisError> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request.clone());

        let step = self.script.lock().unwrap_or_else(|p| p.into_inner()).pop_front();
        match step {
            Some((delay, reply)) => {
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                reply
            }
            None => match &self.fallback {
                Some(text) => Ok(text.clone()),
                None => Err(AnalysisError::Transport("mock script exhausted".into())),
            },
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
