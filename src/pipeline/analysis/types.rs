//! Wire types for the Gemini `generateContent` API.

use serde::{Deserialize, Serialize};

use super::AnalysisError;

/// Output budget for plain-text extraction.
pub const EXTRACT_TEXT_MAX_TOKENS: u32 = 8192;
/// Output budget for claim analysis.
pub const CLAIM_ANALYSIS_MAX_TOKENS: u32 = 4096;
/// Output budget for text coherence checks.
pub const TEXT_COHERENCE_MAX_TOKENS: u32 = 2048;

// ═══════════════════════════════════════════
// Request
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

impl GenerateRequest {
    /// Single-turn request: instruction text, optionally followed by a document.
    pub fn new(prompt: &str, document: Option<InlineData>, max_output_tokens: u32) -> Self {
        let mut parts = vec![Part::Text {
            text: prompt.to_string(),
        }];
        if let Some(inline_data) = document {
            parts.push(Part::InlineData { inline_data });
        }
        Self {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig::with_max_tokens(max_output_tokens),
        }
    }

    /// The instruction text of the first part, if any.
    pub fn prompt(&self) -> Option<&str> {
        self.contents
            .first()
            .and_then(|c| c.parts.first())
            .and_then(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                Part::InlineData { .. } => None,
            })
    }

    /// The attached document payload, if any.
    pub fn inline_data(&self) -> Option<&InlineData> {
        self.contents
            .iter()
            .flat_map(|c| c.parts.iter())
            .find_map(|p| match p {
                Part::InlineData { inline_data } => Some(inline_data),
                Part::Text { .. } => None,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineData {
    pub mime_type: String,
    /// Standard base64, no data-URL prefix.
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

impl GenerationConfig {
    /// Near-deterministic sampling shared by every call.
    pub fn with_max_tokens(max_output_tokens: u32) -> Self {
        Self {
            temperature: 0.1,
            top_k: 32,
            top_p: 1.0,
            max_output_tokens,
        }
    }
}

// ═══════════════════════════════════════════
// Response
// ═══════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate.
    ///
    /// A missing candidate, content wrapper, or part is malformed. A part
    /// without text yields an empty string; blank output is the caller's call.
    pub fn into_text(self) -> Result<String, AnalysisError> {
        let content = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or_else(|| {
                AnalysisError::MalformedResponse("No text content found in the API response".into())
            })?;

        let part = content.parts.into_iter().next().ok_or_else(|| {
            AnalysisError::MalformedResponse("Response content has no parts".into())
        })?;

        Ok(part.text.unwrap_or_default())
    }
}

/// Error body returned with non-success statuses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
}

/// Best-effort message from an error body.
pub fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "Unknown error".to_string())
}
