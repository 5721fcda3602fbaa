use serde::{Deserialize, Serialize};

use super::enums::{DocumentVerdict, VerdictStatus};
use super::limit::LimitRecord;
use super::measurement::NormalizedMeasurement;

/// Terminal compliance classification of one measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub measurement: NormalizedMeasurement,
    pub limit: Option<LimitRecord>,
    pub status: VerdictStatus,
}

/// Per-document roll-up of verdicts and anomalies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub compliant: usize,
    pub non_compliant: usize,
    pub limit_unavailable: usize,
    pub anomalies: usize,
    /// Part of the document was never sent to the model.
    #[serde(default)]
    pub input_truncated: bool,
    pub overall: DocumentVerdict,
}

impl ComplianceSummary {
    /// `input_truncated` means part of the document never reached the model,
    /// so the document cannot be called compliant.
    pub fn from_verdicts(
        verdicts: &[VerdictRecord],
        anomaly_count: usize,
        input_truncated: bool,
    ) -> Self {
        let count = |status: VerdictStatus| verdicts.iter().filter(|v| v.status == status).count();
        let compliant = count(VerdictStatus::Compliant);
        let non_compliant = count(VerdictStatus::NonCompliant);
        let limit_unavailable = count(VerdictStatus::LimitUnavailable);

        let overall = if non_compliant > 0 {
            DocumentVerdict::NonCompliant
        } else if limit_unavailable > 0 || anomaly_count > 0 || input_truncated {
            DocumentVerdict::Incomplete
        } else {
            DocumentVerdict::Compliant
        };

        Self {
            compliant,
            non_compliant,
            limit_unavailable,
            anomalies: anomaly_count,
            input_truncated,
            overall,
        }
    }
}
