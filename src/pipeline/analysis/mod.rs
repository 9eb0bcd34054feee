//! Analysis client: talks to the remote generative model.
//!
//! ```text
//! Document ─► transport tag + base64 ─► GenerateRequest ─► GenerativeModel
//!                                                              │
//!        AnalysisResult / ExtractedText ◄─ LenientJsonExtractor ◄┘
//! ```
//!
//! `GeminiClient` is the production model; `MockModel` replays scripted
//! replies for tests. JSON recovery lives in `parser` so it can be swapped
//! for strict schema validation without touching the HTTP code.

pub mod client;
pub mod gemini;
pub mod mime;
pub mod parser;
pub mod prompt;
pub mod types;

pub use client::*;
pub use gemini::*;
pub use mime::transport_tag;
pub use parser::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Network failure, timeout, or non-success HTTP status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response lacks the expected wrapper, or its JSON could not be parsed.
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("No text could be extracted from this document")]
    EmptyResult,
}
