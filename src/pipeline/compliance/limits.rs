use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::models::{CanonicalAnalyteId, CanonicalCommodityId, LimitRecord};
use crate::pipeline::normalize::ValueParser;

use super::ReferenceDataError;

/// Limit cell text meaning the substance needs no limit for the commodity.
const NO_LIMIT_REQUIRED: &str = "no mrl required";

/// Exact-key lookup of the limit for an (analyte, commodity) pair.
///
/// `None` is a valid outcome, not an error: it becomes
/// `VerdictStatus::LimitUnavailable` at evaluation time.
pub trait LimitLookup {
    fn resolve(
        &self,
        analyte: &CanonicalAnalyteId,
        commodity: &CanonicalCommodityId,
    ) -> Option<&LimitRecord>;
}

/// Counts from loading a limit file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows: usize,
    pub loaded: usize,
    pub duplicates: usize,
    /// Rows reading "No MRL required", left out of the table.
    pub not_required: usize,
}

#[derive(Debug, Deserialize)]
struct LimitRow {
    analyte: String,
    commodity: String,
    max_residue_limit: String,
}

/// Read-only reference table, keyed by canonical (analyte, commodity).
#[derive(Debug, Clone, Default)]
pub struct LimitTable {
    records: BTreeMap<(CanonicalAnalyteId, CanonicalCommodityId), LimitRecord>,
    /// Pairs listed as needing no limit. Known names, but no record.
    exempt: BTreeSet<(CanonicalAnalyteId, CanonicalCommodityId)>,
}

impl LimitTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. Returns `false` for an identical duplicate; a duplicate
    /// key with a different limit is an error.
    pub fn insert(&mut self, record: LimitRecord) -> Result<bool, ReferenceDataError> {
        let key = record.key();
        match self.records.get(&key) {
            Some(existing) if existing.max_residue_limit == record.max_residue_limit => Ok(false),
            Some(existing) => Err(ReferenceDataError::ConflictingLimit {
                analyte: record.analyte.to_string(),
                commodity: record.commodity.to_string(),
                first: existing.max_residue_limit,
                second: record.max_residue_limit,
            }),
            None => {
                self.records.insert(key, record);
                Ok(true)
            }
        }
    }

    pub fn from_records(
        records: impl IntoIterator<Item = LimitRecord>,
    ) -> Result<Self, ReferenceDataError> {
        let mut table = Self::new();
        for record in records {
            table.insert(record)?;
        }
        Ok(table)
    }

    /// Load an `analyte|commodity|max_residue_limit` file (header row required).
    ///
    /// Limit cells follow the measurement value rules (`10*` reads as 10);
    /// fractional or non-numeric limits and non-canonical names fail the load.
    pub fn load(path: &Path, delimiter: u8) -> Result<(Self, LoadReport), ReferenceDataError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| ReferenceDataError::from_csv(path, e))?;

        let values = ValueParser::default();
        let mut table = Self::new();
        let mut report = LoadReport::default();

        for (index, row) in reader.deserialize::<LimitRow>().enumerate() {
            let line = index + 2;
            let row = row.map_err(|e| ReferenceDataError::from_csv(path, e))?;
            report.rows += 1;
            let invalid = |reason: String| ReferenceDataError::InvalidRow {
                path: path.to_path_buf(),
                line,
                reason,
            };

            let analyte = CanonicalAnalyteId::new(row.analyte).map_err(|e| invalid(e.to_string()))?;
            let commodity =
                CanonicalCommodityId::new(row.commodity).map_err(|e| invalid(e.to_string()))?;

            let limit_cell = row.max_residue_limit.trim_end_matches('*').trim();
            if limit_cell.eq_ignore_ascii_case(NO_LIMIT_REQUIRED) {
                let key = (analyte, commodity);
                if let Some(existing) = table.records.get(&key) {
                    return Err(exempt_with_limit(existing));
                }
                table.exempt.insert(key);
                report.not_required += 1;
                continue;
            }
            let max_residue_limit = values
                .parse(&row.max_residue_limit)
                .map_err(|issue| invalid(format!("limit: {}", issue.describe())))?;
            let record = LimitRecord {
                analyte,
                commodity,
                max_residue_limit,
            };
            if table.exempt.contains(&record.key()) {
                return Err(exempt_with_limit(&record));
            }

            if table.insert(record)? {
                report.loaded += 1;
            } else {
                report.duplicates += 1;
            }
        }

        tracing::info!(
            path = %path.display(),
            rows = report.rows,
            loaded = report.loaded,
            duplicates = report.duplicates,
            not_required = report.not_required,
            "Limit table loaded"
        );
        if table.is_empty() {
            tracing::warn!(path = %path.display(), "Limit table is empty; every verdict will be LimitUnavailable");
        }

        Ok((table, report))
    }

    pub fn records(&self) -> impl Iterator<Item = &LimitRecord> {
        self.records.values()
    }

    /// Pairs read as "No MRL required". They resolve to no limit.
    pub fn exempt_pairs(&self) -> impl Iterator<Item = &(CanonicalAnalyteId, CanonicalCommodityId)> {
        self.exempt.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn exempt_with_limit(record: &LimitRecord) -> ReferenceDataError {
    ReferenceDataError::ExemptWithLimit {
        analyte: record.analyte.to_string(),
        commodity: record.commodity.to_string(),
        limit: record.max_residue_limit,
    }
}

impl LimitLookup for LimitTable {
    fn resolve(
        &self,
        analyte: &CanonicalAnalyteId,
        commodity: &CanonicalCommodityId,
    ) -> Option<&LimitRecord> {
        self.records.get(&(analyte.clone(), commodity.clone()))
    }
}

/// Initialize-once handle on the reference table.
///
/// Concurrent callers of [`SharedLimits::get_or_load`] wait for the first
/// load and then share the same read-only table.
#[derive(Debug, Default)]
pub struct SharedLimits {
    cell: OnceCell<Arc<LimitTable>>,
}

impl SharedLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load<F>(&self, load: F) -> Result<Arc<LimitTable>, ReferenceDataError>
    where
        F: FnOnce() -> Result<LimitTable, ReferenceDataError>,
    {
        self.cell
            .get_or_try_init(|| load().map(Arc::new))
            .map(Arc::clone)
    }

    pub fn get(&self) -> Option<Arc<LimitTable>> {
        self.cell.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn write_table(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limits.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    fn record(analyte: &str, commodity: &str, limit: u64) -> LimitRecord {
        LimitRecord {
            analyte: CanonicalAnalyteId::new(analyte).unwrap(),
            commodity: CanonicalCommodityId::new(commodity).unwrap(),
            max_residue_limit: limit,
        }
    }

    #[test]
    fn loads_marker_terminated_limits_and_skips_no_mrl_rows() {
        let (_dir, path) = write_table(
            "analyte|commodity|max_residue_limit\n\
             Atrazine|Apple|10*\n\
             Glyphosate|Apple|15\n\
             Atrazine|Apple|10\n\
             Sulphur|Apple|No MRL required\n",
        );
        let (table, report) = LimitTable::load(&path, b'|').unwrap();
        assert_eq!(
            report,
            LoadReport {
                rows: 4,
                loaded: 2,
                duplicates: 1,
                not_required: 1,
            }
        );
        let atrazine = CanonicalAnalyteId::new("Atrazine").unwrap();
        let apple = CanonicalCommodityId::new("Apple").unwrap();
        assert_eq!(table.resolve(&atrazine, &apple).unwrap().max_residue_limit, 10);
        let sulphur = CanonicalAnalyteId::new("Sulphur").unwrap();
        assert!(table.resolve(&sulphur, &apple).is_none());
        assert_eq!(table.exempt_pairs().count(), 1);
    }

    #[test]
    fn resolution_is_exact_key_only() {
        let table = LimitTable::from_records([record("Atrazine", "Apple", 10)]).unwrap();
        let atrazine = CanonicalAnalyteId::new("Atrazine").unwrap();
        let pear = CanonicalCommodityId::new("Pear").unwrap();
        assert!(table.resolve(&atrazine, &pear).is_none());
    }

    #[test]
    fn conflicting_duplicate_fails() {
        let err = LimitTable::from_records([record("Atrazine", "Apple", 10), record("Atrazine", "Apple", 20)])
            .unwrap_err();
        assert!(matches!(
            err,
            ReferenceDataError::ConflictingLimit {
                first: 10,
                second: 20,
                ..
            }
        ));
    }

    #[test]
    fn fractional_limit_fails_with_line_number() {
        let (_dir, path) = write_table("analyte|commodity|max_residue_limit\nAtrazine|Apple|0.05*\n");
        let err = LimitTable::load(&path, b'|').unwrap_err();
        match err {
            ReferenceDataError::InvalidRow { line, reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("fractional"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn no_limit_row_and_numeric_row_for_same_pair_fail_in_either_order() {
        for contents in [
            "analyte|commodity|max_residue_limit\nSulphur|Apple|No MRL required\nSulphur|Apple|50*\n",
            "analyte|commodity|max_residue_limit\nSulphur|Apple|50*\nSulphur|Apple|No MRL required\n",
        ] {
            let (_dir, path) = write_table(contents);
            match LimitTable::load(&path, b'|') {
                Err(ReferenceDataError::ExemptWithLimit {
                    analyte, limit, ..
                }) => {
                    assert_eq!(analyte, "Sulphur");
                    assert_eq!(limit, 50);
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
    }

    #[test]
    fn non_canonical_name_fails() {
        let (_dir, path) = write_table("analyte|commodity|max_residue_limit\natrazine|Apple|1\n");
        assert!(matches!(
            LimitTable::load(&path, b'|'),
            Err(ReferenceDataError::InvalidRow { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LimitTable::load(&dir.path().join("absent.csv"), b'|').unwrap_err();
        assert!(matches!(err, ReferenceDataError::Io { .. }));
    }

    #[test]
    fn shared_limits_load_once_across_threads() {
        let shared = SharedLimits::new();
        let loads = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let table = shared
                        .get_or_load(|| {
                            loads.fetch_add(1, Ordering::SeqCst);
                            LimitTable::from_records([record("Atrazine", "Apple", 10)])
                        })
                        .unwrap();
                    assert_eq!(table.len(), 1);
                });
            }
        });

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(shared.get().is_some());
    }

    #[test]
    fn failed_load_can_be_retried() {
        let shared = SharedLimits::new();
        let first = shared.get_or_load(|| {
            Err(ReferenceDataError::ConflictingLimit {
                analyte: "A".into(),
                commodity: "B".into(),
                first: 1,
                second: 2,
            })
        });
        assert!(first.is_err());
        assert!(shared.get().is_none());
        let second = shared.get_or_load(|| Ok(LimitTable::new())).unwrap();
        assert!(second.is_empty());
    }
}
