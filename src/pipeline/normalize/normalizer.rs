use crate::models::{
    CandidateMeasurement, NormalizationAnomaly, NormalizationIssue, NormalizedMeasurement,
};

use super::value::{is_not_reported, ValueParser};
use super::vocabulary::CanonicalLookup;

/// Maps candidates onto canonical identifiers and integer values.
///
/// Every check runs even after one fails, so an anomaly lists all the
/// reasons a candidate was rejected.
pub struct Normalizer<'a> {
    lookup: &'a dyn CanonicalLookup,
    values: &'a ValueParser,
}

impl<'a> Normalizer<'a> {
    pub fn new(lookup: &'a dyn CanonicalLookup, values: &'a ValueParser) -> Self {
        Self { lookup, values }
    }

    /// `candidate_index` is the candidate's position in the document result.
    pub fn normalize(
        &self,
        candidate_index: usize,
        candidate: &CandidateMeasurement,
    ) -> Result<NormalizedMeasurement, NormalizationAnomaly> {
        let mut issues = Vec::new();

        let analyte = self
            .lookup
            .resolve_analyte(&candidate.analyte_raw)
            .map_err(|issue| issues.push(issue))
            .ok();

        let commodity = match candidate.commodity_raw.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() && !is_not_reported(raw) => self
                .lookup
                .resolve_commodity(raw)
                .map_err(|issue| issues.push(issue))
                .ok(),
            _ => {
                issues.push(NormalizationIssue::MissingCommodity);
                None
            }
        };

        let value = self
            .values
            .parse(&candidate.value_raw)
            .map_err(|issue| issues.push(issue))
            .ok();

        match (analyte, commodity, value) {
            (Some(analyte), Some(commodity), Some(value)) => Ok(NormalizedMeasurement {
                candidate_index,
                analyte,
                commodity,
                value,
            }),
            _ => Err(NormalizationAnomaly {
                candidate_index,
                analyte_raw: candidate.analyte_raw.clone(),
                issues,
            }),
        }
    }
}
