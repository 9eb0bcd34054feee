use serde::Serialize;

use crate::models::{ClaimRecord, ClaimStatus, RiskLevel};

/// High-risk share of completed records above which the batch reads high.
const HIGH_RISK_SHARE: f64 = 0.3;
/// Medium-risk share above which the batch reads medium.
const MEDIUM_RISK_SHARE: f64 = 0.5;

/// Aggregates over the current record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimStats {
    pub total: usize,
    pub processed: usize,
    pub flagged: usize,
    pub approved: usize,
    pub avg_risk: RiskLevel,
}

impl ClaimStats {
    pub fn from_records(records: &[ClaimRecord]) -> Self {
        Self {
            total: records.len(),
            processed: records
                .iter()
                .filter(|r| r.status() == ClaimStatus::Completed)
                .count(),
            flagged: records.iter().filter(|r| r.is_flagged()).count(),
            approved: records.iter().filter(|r| r.is_approved()).count(),
            avg_risk: average_risk(records),
        }
    }
}

/// Batch-level risk over completed records. No completed records reads low.
pub fn average_risk(records: &[ClaimRecord]) -> RiskLevel {
    let risks: Vec<RiskLevel> = records
        .iter()
        .filter(|r| r.status() == ClaimStatus::Completed)
        .filter_map(|r| r.result().map(|res| res.risk_level))
        .collect();

    let n = risks.len() as f64;
    if n == 0.0 {
        return RiskLevel::Low;
    }
    let high = risks.iter().filter(|r| **r == RiskLevel::High).count() as f64;
    let medium = risks.iter().filter(|r| **r == RiskLevel::Medium).count() as f64;

    if high > HIGH_RISK_SHARE * n {
        RiskLevel::High
    } else if medium > MEDIUM_RISK_SHARE * n {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}
