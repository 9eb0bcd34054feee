//! Claim records and analysis results.
//!
//! Field names serialize in camelCase so snapshots stay compatible with the
//! browser history format (`analysisResult`, `isConsistent`, ...).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::document::Document;
use super::enums::{ClaimStatus, FlagType, RiskLevel, Severity};

// ═══════════════════════════════════════════
// Analysis output
// ═══════════════════════════════════════════

/// Structured result of analyzing one claim document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub is_consistent: bool,
    pub risk_level: RiskLevel,
    /// 0..=100
    pub confidence: f32,
    pub summary: String,
    /// Model output order, never re-sorted.
    #[serde(default)]
    pub flags: Vec<Flag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<ExtractedData>,
}

impl AnalysisResult {
    pub fn is_flagged(&self) -> bool {
        !self.flags.is_empty()
    }

    /// Consistent with nothing flagged.
    pub fn is_approved(&self) -> bool {
        self.is_consistent && self.flags.is_empty()
    }
}

/// One inconsistency or fraud indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Claim fields the model could read from the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ExtractedData {
    pub fn is_empty(&self) -> bool {
        self.claim_amount.is_none()
            && self.incident_date.is_none()
            && self.policy_number.is_none()
            && self.description.is_none()
    }
}

/// Plain-text extraction of a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedText {
    pub text: String,
    pub filename: String,
}

/// Coherence check over already-extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnalysisResult {
    pub is_coherent: bool,
    pub discrepancies: Vec<String>,
    pub overall_assessment: String,
    /// 0..=100
    pub confidence: f32,
    /// True when the model output could not be parsed and the result was
    /// derived from keywords in the raw text.
    #[serde(default)]
    pub degraded: bool,
}

// ═══════════════════════════════════════════
// Claim record
// ═══════════════════════════════════════════

/// One uploaded document's processing state and, once available, its result.
///
/// Status and result only change together through [`ClaimPatch`], so a
/// completed record always carries a result and any other status never does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRecord {
    id: String,
    filename: String,
    #[serde(skip)]
    document: Option<Arc<Document>>,
    status: ClaimStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    analysis_result: Option<AnalysisResult>,
}

impl ClaimRecord {
    /// New pending record for an accepted document.
    pub fn new(id: &str, document: Arc<Document>) -> Self {
        Self {
            id: id.to_string(),
            filename: document.filename().to_string(),
            document: Some(document),
            status: ClaimStatus::Pending,
            analysis_result: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn status(&self) -> ClaimStatus {
        self.status
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.analysis_result.as_ref()
    }

    /// Raw document handle. `None` for records reloaded from a snapshot.
    pub fn document(&self) -> Option<&Arc<Document>> {
        self.document.as_ref()
    }

    pub fn is_flagged(&self) -> bool {
        self.status == ClaimStatus::Completed
            && self.analysis_result.as_ref().is_some_and(AnalysisResult::is_flagged)
    }

    pub fn is_approved(&self) -> bool {
        self.status == ClaimStatus::Completed
            && self.analysis_result.as_ref().is_some_and(AnalysisResult::is_approved)
    }

    /// `result` present iff status is completed.
    pub fn is_consistent_state(&self) -> bool {
        (self.status == ClaimStatus::Completed) == self.analysis_result.is_some()
    }

    /// Copy of this record without the document handle, as persisted.
    pub fn detached(&self) -> Self {
        Self {
            document: None,
            ..self.clone()
        }
    }

    /// Shallow merge: every field set in the patch overwrites this record.
    pub fn apply(&mut self, patch: ClaimPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(result) = patch.analysis_result {
            self.analysis_result = result;
        }
    }

    /// Bring a record read from an untrusted snapshot back to a valid state.
    /// Returns true if anything changed.
    pub(crate) fn repair(&mut self) -> bool {
        if self.is_consistent_state() {
            return false;
        }
        if self.status == ClaimStatus::Completed {
            self.status = ClaimStatus::Error;
        } else {
            self.analysis_result = None;
        }
        true
    }
}

/// Partial update for a [`ClaimRecord`].
///
/// Status changes are only constructible together with the matching result
/// field, which keeps the status/result invariant under shallow merges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimPatch {
    status: Option<ClaimStatus>,
    analysis_result: Option<Option<AnalysisResult>>,
}

impl ClaimPatch {
    pub fn analyzing() -> Self {
        Self {
            status: Some(ClaimStatus::Analyzing),
            analysis_result: Some(None),
            ..Self::default()
        }
    }

    pub fn completed(result: AnalysisResult) -> Self {
        Self {
            status: Some(ClaimStatus::Completed),
            analysis_result: Some(Some(result)),
            ..Self::default()
        }
    }

    pub fn failed() -> Self {
        Self {
            status: Some(ClaimStatus::Error),
            analysis_result: Some(None),
            ..Self::default()
        }
    }

    /// Status this patch moves the record to, if any.
    pub fn status(&self) -> Option<ClaimStatus> {
        self.status
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn new_record_is_pending_without_result() {
        let rec = record("c-1");
        assert_eq!(rec.status(), ClaimStatus::Pending);
        assert!(rec.result().is_none());
        assert!(rec.document().is_some());
        assert_eq!(rec.filename(), "c-1.pdf");
        assert!(rec.is_consistent_state());
    }

    #[test]
    fn patches_keep_status_and_result_coupled() {
        let rec = completed("c-1", RiskLevel::Low, true, 0);
        assert_eq!(rec.status(), ClaimStatus::Completed);
        assert!(rec.result().is_some());
        assert!(rec.is_consistent_state());

        let rec = failed("c-2");
        assert_eq!(rec.status(), ClaimStatus::Error);
        assert!(rec.result().is_none());
        assert!(rec.is_consistent_state());
    }

    #[test]
    fn flagged_and_approved_are_exclusive() {
        let flagged = completed("a", RiskLevel::Medium, true, 1);
        let approved = completed("b", RiskLevel::Low, true, 0);
        let inconsistent = completed("c", RiskLevel::Low, false, 0);

        assert!(flagged.is_flagged() && !flagged.is_approved());
        assert!(approved.is_approved() && !approved.is_flagged());
        assert!(!inconsistent.is_approved() && !inconsistent.is_flagged());
        assert!(!failed("d").is_flagged());
    }

    #[test]
    fn serialized_record_omits_document_and_uses_camel_case() {
        let rec = completed("c-9", RiskLevel::High, false, 1);
        let json = serde_json::to_value(&rec).unwrap();

        assert_eq!(json["id"], "c-9");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["analysisResult"]["riskLevel"], "high");
        assert_eq!(json["analysisResult"]["isConsistent"], false);
        assert_eq!(json["analysisResult"]["flags"][0]["type"], "inconsistency");
        assert!(json.get("document").is_none());
    }

    #[test]
    fn browser_snapshot_entry_deserializes() {
        let raw = r#"{
            "id": "doc-0",
            "filename": "claim.pdf",
            "file": null,
            "status": "completed",
            "analysisResult": {
                "isConsistent": false,
                "riskLevel": "medium",
                "flags": [{"type": "amount_discrepancy", "severity": "high",
                           "description": "Totals differ", "details": "1200 vs 1500"}],
                "confidence": 72,
                "summary": "Amounts do not match",
                "extractedData": {"claimAmount": "$1,500"}
            }
        }"#;
        let rec: ClaimRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(rec.id(), "doc-0");
        assert!(rec.document().is_none());
        let result = rec.result().unwrap();
        assert_eq!(result.flags[0].flag_type, FlagType::AmountDiscrepancy);
        assert_eq!(result.flags[0].details.as_deref(), Some("1200 vs 1500"));
        assert_eq!(
            result.extracted_data.as_ref().unwrap().claim_amount.as_deref(),
            Some("$1,500")
        );
    }

    #[test]
    fn repair_fixes_invalid_combinations() {
        let mut orphan: ClaimRecord =
            serde_json::from_str(r#"{"id":"x","filename":"x.pdf","status":"completed"}"#).unwrap();
        assert!(!orphan.is_consistent_state());
        assert!(orphan.repair());
        assert_eq!(orphan.status(), ClaimStatus::Error);

        let mut stray = completed("y", RiskLevel::Low, true, 0);
        stray.status = ClaimStatus::Error;
        assert!(stray.repair());
        assert!(stray.result().is_none());

        let mut fine = record("z");
        assert!(!fine.repair());
    }

    #[test]
    fn detached_drops_document_only() {
        let rec = completed("c-1", RiskLevel::Low, true, 0);
        let detached = rec.detached();
        assert!(detached.document().is_none());
        assert_eq!(detached.id(), rec.id());
        assert_eq!(detached.result(), rec.result());
    }
}
