//! Recovery of structured data from loosely formatted model output.
//!
//! Two strategies implement [`JsonRecovery`]:
//! - [`LenientJsonExtractor`]: takes the span from the first `{` to the last
//!   `}` anywhere in the text (prose, code fences, and trailing notes are
//!   ignored).
//! - [`StrictJsonParser`]: the whole trimmed text must be one JSON object.
//!
//! Decoding into domain types is lenient on top of that: malformed flags
//! are skipped, numbers are accepted where strings are expected, and
//! confidence is clamped to 0..=100.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::AnalysisError;
use crate::models::{
    AnalysisResult, ExtractedData, Flag, FlagType, RiskLevel, Severity, TextAnalysisResult,
};

/// First `{` through last `}`, across newlines.
static JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Confidence assigned to keyword-derived coherence results.
const HEURISTIC_CONFIDENCE: f32 = 50.0;

// ═══════════════════════════════════════════
// Outcome
// ═══════════════════════════════════════════

/// Result of recovering a value from model output. The raw text is kept on
/// failure so callers can log it or derive a degraded result from it.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    Parsed(T),
    ParseFailure { raw: String, reason: String },
}

impl<T> ParseOutcome<T> {
    fn failure(raw: &str, reason: impl Into<String>) -> Self {
        Self::ParseFailure {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    /// Chain a fallible conversion, keeping the raw text on failure.
    pub fn and_then<U, F>(self, raw: &str, f: F) -> ParseOutcome<U>
    where
        F: FnOnce(T) -> Result<U, String>,
    {
        match self {
            Self::Parsed(v) => match f(v) {
                Ok(u) => ParseOutcome::Parsed(u),
                Err(reason) => ParseOutcome::failure(raw, reason),
            },
            Self::ParseFailure { raw, reason } => ParseOutcome::ParseFailure { raw, reason },
        }
    }

    /// Hard failure for callers that have no fallback.
    pub fn into_result(self) -> Result<T, AnalysisError> {
        match self {
            Self::Parsed(v) => Ok(v),
            Self::ParseFailure { reason, .. } => Err(AnalysisError::MalformedResponse(reason)),
        }
    }
}

// ═══════════════════════════════════════════
// Strategies
// ═══════════════════════════════════════════

/// Strategy for pulling a JSON object out of model text.
pub trait JsonRecovery: Send + Sync {
    fn recover(&self, text: &str) -> ParseOutcome<Value>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LenientJsonExtractor;

impl LenientJsonExtractor {
    pub fn new() -> Self {
        Self
    }

    /// The first-`{`-to-last-`}` span, if the text has one.
    pub fn find_json<'a>(&self, text: &'a str) -> Option<&'a str> {
        JSON_OBJECT.find(text).map(|m| m.as_str())
    }
}

impl JsonRecovery for LenientJsonExtractor {
    fn recover(&self, text: &str) -> ParseOutcome<Value> {
        let Some(candidate) = self.find_json(text) else {
            return ParseOutcome::failure(text, "No JSON object found in model output");
        };
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) if value.is_object() => ParseOutcome::Parsed(value),
            Ok(_) => ParseOutcome::failure(text, "Model output JSON is not an object"),
            Err(e) => ParseOutcome::failure(text, format!("Invalid JSON in model output: {e}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StrictJsonParser;

impl JsonRecovery for StrictJsonParser {
    fn recover(&self, text: &str) -> ParseOutcome<Value> {
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) if value.is_object() => ParseOutcome::Parsed(value),
            Ok(_) => ParseOutcome::failure(text, "Model output JSON is not an object"),
            Err(e) => ParseOutcome::failure(text, format!("Model output is not strict JSON: {e}")),
        }
    }
}

// ═══════════════════════════════════════════
// Decoding
// ═══════════════════════════════════════════

/// Decode claim analysis output. No fallback: anything unusable is a failure.
pub fn decode_claim_analysis(recovery: &dyn JsonRecovery, text: &str) -> ParseOutcome<AnalysisResult> {
    recovery.recover(text).and_then(text, claim_analysis_from_value)
}

/// Decode coherence output.
pub fn decode_text_coherence(
    recovery: &dyn JsonRecovery,
    text: &str,
) -> ParseOutcome<TextAnalysisResult> {
    recovery.recover(text).and_then(text, text_analysis_from_value)
}

/// Degraded coherence result built from the raw model text alone.
pub fn heuristic_coherence(raw: &str) -> TextAnalysisResult {
    let lowered = raw.to_lowercase();
    let mentions_problem = lowered.contains("issue") || lowered.contains("problem");
    TextAnalysisResult {
        is_coherent: !mentions_problem,
        discrepancies: Vec::new(),
        overall_assessment: raw.trim().to_string(),
        confidence: HEURISTIC_CONFIDENCE,
        degraded: true,
    }
}

fn claim_analysis_from_value(value: Value) -> Result<AnalysisResult, String> {
    let is_consistent = value
        .get("isConsistent")
        .and_then(Value::as_bool)
        .ok_or("Missing or non-boolean isConsistent")?;

    let risk_raw = value
        .get("riskLevel")
        .and_then(Value::as_str)
        .ok_or("Missing riskLevel")?;
    let risk_level =
        RiskLevel::from_str(risk_raw).map_err(|_| format!("Unknown riskLevel: {risk_raw}"))?;

    let flags: Vec<Flag> = value
        .get("flags")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(flag_from_value).collect())
        .unwrap_or_default();

    let extracted_data = value
        .get("extractedData")
        .filter(|v| v.is_object())
        .map(|v| ExtractedData {
            claim_amount: field_string(v, "claimAmount"),
            incident_date: field_string(v, "incidentDate"),
            policy_number: field_string(v, "policyNumber"),
            description: field_string(v, "description"),
        })
        .filter(|d| !d.is_empty());

    Ok(AnalysisResult {
        is_consistent,
        risk_level,
        confidence: confidence_from(value.get("confidence")),
        summary: field_string(&value, "summary").unwrap_or_default(),
        flags,
        extracted_data,
    })
}

fn text_analysis_from_value(value: Value) -> Result<TextAnalysisResult, String> {
    let is_coherent = value
        .get("isCoherent")
        .and_then(Value::as_bool)
        .ok_or("Missing or non-boolean isCoherent")?;

    let discrepancies: Vec<String> = value
        .get("discrepancies")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(scalar_string).collect())
        .unwrap_or_default();

    Ok(TextAnalysisResult {
        is_coherent,
        discrepancies,
        overall_assessment: field_string(&value, "overallAssessment").unwrap_or_default(),
        confidence: confidence_from(value.get("confidence")),
        degraded: false,
    })
}

/// A flag with unknown type or severity, or without a description, is
/// dropped rather than failing the whole analysis.
fn flag_from_value(value: &Value) -> Option<Flag> {
    let type_raw = value.get("type").and_then(Value::as_str)?;
    let severity_raw = value.get("severity").and_then(Value::as_str)?;
    let Some(description) = field_string(value, "description") else {
        tracing::debug!(flag_type = type_raw, "Skipping flag without description");
        return None;
    };

    let (Ok(flag_type), Ok(severity)) = (FlagType::from_str(type_raw), Severity::from_str(severity_raw))
    else {
        tracing::debug!(flag_type = type_raw, severity = severity_raw, "Skipping unrecognized flag");
        return None;
    };

    Some(Flag {
        flag_type,
        severity,
        description,
        details: field_string(value, "details"),
    })
}

fn field_string(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(scalar_string)
}

/// Strings and numbers as trimmed text; blanks, nulls, and containers as None.
fn scalar_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn confidence_from(value: Option<&Value>) -> f32 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(v) if v.is_finite() => v.clamp(0.0, 100.0) as f32,
        _ => 0.0,
    }
}
