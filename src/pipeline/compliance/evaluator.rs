use crate::models::{LimitRecord, NormalizedMeasurement, VerdictRecord, VerdictStatus};

use super::limits::LimitLookup;

/// Classify one measurement against its resolved limit.
///
/// The limit itself is an allowed value: `value == max_residue_limit` is
/// `Compliant`. Pure; the inputs are copied into the returned record.
pub fn evaluate(measurement: &NormalizedMeasurement, limit: Option<&LimitRecord>) -> VerdictRecord {
    let status = match limit {
        None => VerdictStatus::LimitUnavailable,
        Some(l) if measurement.value <= l.max_residue_limit => VerdictStatus::Compliant,
        Some(_) => VerdictStatus::NonCompliant,
    };

    VerdictRecord {
        measurement: measurement.clone(),
        limit: limit.cloned(),
        status,
    }
}

/// Resolve the limit for `measurement` and evaluate it.
pub fn resolve_and_evaluate(
    limits: &dyn LimitLookup,
    measurement: &NormalizedMeasurement,
) -> VerdictRecord {
    let limit = limits.resolve(&measurement.analyte, &measurement.commodity);
    evaluate(measurement, limit)
}
