use std::sync::Arc;
use std::time::Instant;

use base64::Engine;

use super::gemini::GenerativeModel;
use super::mime::transport_tag;
use super::parser::{
    decode_claim_analysis, decode_text_coherence, heuristic_coherence, JsonRecovery,
    LenientJsonExtractor, ParseOutcome,
};
use super::prompt::{build_coherence_prompt, CLAIM_ANALYSIS_PROMPT, EXTRACT_TEXT_PROMPT};
use super::types::{
    GenerateRequest, InlineData, CLAIM_ANALYSIS_MAX_TOKENS, EXTRACT_TEXT_MAX_TOKENS,
    TEXT_COHERENCE_MAX_TOKENS,
};
use super::AnalysisError;
use crate::models::{AnalysisResult, Document, ExtractedText, TextAnalysisResult};

/// Per-document claim analysis, the seam the pipeline depends on.
pub trait ClaimAnalyzer: Send + Sync {
    fn analyze_claim(&self, document: &Document) -> Result<AnalysisResult, AnalysisError>;
}

/// Document analysis over a [`GenerativeModel`].
///
/// Stateless apart from its model handle: no caching, one request per call.
pub struct AnalysisClient {
    model: Arc<dyn GenerativeModel>,
    recovery: Box<dyn JsonRecovery>,
}

impl AnalysisClient {
    /// Client using lenient JSON recovery.
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self::with_recovery(model, Box::new(LenientJsonExtractor::new()))
    }

    pub fn with_recovery(model: Arc<dyn GenerativeModel>, recovery: Box<dyn JsonRecovery>) -> Self {
        Self { model, recovery }
    }

    /// Plain text of a document, trimmed.
    pub fn extract_text(&self, document: &Document) -> Result<ExtractedText, AnalysisError> {
        let inline = encode_document(document);
        let _span = tracing::info_span!(
            "extract_text",
            model = self.model_name(),
            filename = %document.filename(),
            mime = %inline.mime_type,
            size = document.len(),
        )
        .entered();
        let start = Instant::now();

        let request = GenerateRequest::new(EXTRACT_TEXT_PROMPT, Some(inline), EXTRACT_TEXT_MAX_TOKENS);
        let text = self.model.generate(&request)?;
        let text = text.trim();
        if text.is_empty() {
            tracing::warn!(elapsed_ms = %start.elapsed().as_millis(), "Model returned no text");
            return Err(AnalysisError::EmptyResult);
        }

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = text.len(),
            "Text extraction complete"
        );
        Ok(ExtractedText {
            text: text.to_string(),
            filename: document.filename().to_string(),
        })
    }

    /// Structured fraud/consistency analysis. Unparseable output is an error.
    pub fn analyze_claim(&self, document: &Document) -> Result<AnalysisResult, AnalysisError> {
        let inline = encode_document(document);
        let _span = tracing::info_span!(
            "analyze_claim",
            model = self.model_name(),
            filename = %document.filename(),
            mime = %inline.mime_type,
            size = document.len(),
        )
        .entered();
        let start = Instant::now();

        let request =
            GenerateRequest::new(CLAIM_ANALYSIS_PROMPT, Some(inline), CLAIM_ANALYSIS_MAX_TOKENS);
        let raw = self.model.generate(&request)?;

        match decode_claim_analysis(self.recovery.as_ref(), &raw) {
            ParseOutcome::Parsed(result) => {
                tracing::info!(
                    elapsed_ms = %start.elapsed().as_millis(),
                    risk = %result.risk_level,
                    flags = result.flags.len(),
                    consistent = result.is_consistent,
                    "Claim analysis complete"
                );
                Ok(result)
            }
            ParseOutcome::ParseFailure { raw, reason } => {
                tracing::warn!(
                    elapsed_ms = %start.elapsed().as_millis(),
                    raw_len = raw.len(),
                    %reason,
                    "Claim analysis output could not be parsed"
                );
                Err(AnalysisError::MalformedResponse(reason))
            }
        }
    }

    /// Coherence check of already-extracted text.
    ///
    /// Never fails on unparseable output: a keyword heuristic over the raw
    /// reply stands in. Transport failures still propagate.
    pub fn analyze_text_coherence(&self, text: &str) -> Result<TextAnalysisResult, AnalysisError> {
        let _span = tracing::info_span!(
            "analyze_text_coherence",
            model = self.model_name(),
            text_len = text.len()
        )
        .entered();
        let start = Instant::now();

        let prompt = build_coherence_prompt(text);
        let request = GenerateRequest::new(&prompt, None, TEXT_COHERENCE_MAX_TOKENS);
        let raw = self.model.generate(&request)?;

        let result = match decode_text_coherence(self.recovery.as_ref(), &raw) {
            ParseOutcome::Parsed(result) => result,
            ParseOutcome::ParseFailure { raw, reason } => {
                tracing::warn!(%reason, "Coherence output unparseable, using keyword heuristic");
                heuristic_coherence(&raw)
            }
        };

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            coherent = result.is_coherent,
            degraded = result.degraded,
            "Coherence check complete"
        );
        Ok(result)
    }

    /// Model name recorded on every call's span.
    pub fn model_name(&self) -> &str {
        self.model.name()
    }
}

impl ClaimAnalyzer for AnalysisClient {
    fn analyze_claim(&self, document: &Document) -> Result<AnalysisResult, AnalysisError> {
        AnalysisClient::analyze_claim(self, document)
    }
}

/// Base64 payload plus transport tag.
fn encode_document(document: &Document) -> InlineData {
    InlineData {
        mime_type: transport_tag(document),
        data: base64::engine::general_purpose::STANDARD.encode(document.bytes()),
    }
}
