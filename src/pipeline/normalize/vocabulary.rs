use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::models::{CanonicalAnalyteId, CanonicalCommodityId, NormalizationIssue};
use crate::pipeline::compliance::{LimitTable, ReferenceDataError};

/// Maps raw analyte and commodity names onto canonical identifiers.
///
/// Implementations must match exactly or case-insensitively, never fuzzily.
pub trait CanonicalLookup {
    fn resolve_analyte(&self, raw: &str) -> Result<CanonicalAnalyteId, NormalizationIssue>;
    fn resolve_commodity(&self, raw: &str) -> Result<CanonicalCommodityId, NormalizationIssue>;
}

/// Collapse internal whitespace runs to one space and trim.
fn collapse_whitespace(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

enum Lookup<T> {
    Found(T),
    Ambiguous(Vec<String>),
    Unknown,
}

#[derive(Debug, Clone)]
struct NameIndex<T> {
    exact: HashMap<String, T>,
    folded: HashMap<String, BTreeSet<T>>,
}

impl<T> Default for NameIndex<T> {
    fn default() -> Self {
        Self {
            exact: HashMap::new(),
            folded: HashMap::new(),
        }
    }
}

impl<T: Clone + Ord + AsRef<str>> NameIndex<T> {
    fn insert(&mut self, name: &str, canonical: T) -> Option<T> {
        let key = collapse_whitespace(name);
        self.folded
            .entry(key.to_lowercase())
            .or_default()
            .insert(canonical.clone());
        self.exact.insert(key, canonical)
    }

    fn find(&self, raw: &str) -> Lookup<T> {
        let key = collapse_whitespace(raw);
        if let Some(hit) = self.exact.get(&key) {
            return Lookup::Found(hit.clone());
        }
        match self.folded.get(&key.to_lowercase()) {
            Some(set) if set.len() == 1 => match set.iter().next() {
                Some(only) => Lookup::Found(only.clone()),
                None => Lookup::Unknown,
            },
            Some(set) if !set.is_empty() => {
                Lookup::Ambiguous(set.iter().map(|c| c.as_ref().to_string()).collect())
            }
            _ => Lookup::Unknown,
        }
    }

    fn len(&self) -> usize {
        self.exact.len()
    }
}

#[derive(Debug, Deserialize)]
struct AliasRow {
    kind: String,
    alias: String,
    canonical: String,
}

/// Canonical names plus their aliases.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    analytes: NameIndex<CanonicalAnalyteId>,
    commodities: NameIndex<CanonicalCommodityId>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every analyte and commodity named in the reference table, including
    /// pairs listed without a limit.
    pub fn from_limits(table: &LimitTable) -> Self {
        let mut vocabulary = Self::new();
        for record in table.records() {
            vocabulary.add_analyte(record.analyte.clone());
            vocabulary.add_commodity(record.commodity.clone());
        }
        for (analyte, commodity) in table.exempt_pairs() {
            vocabulary.add_analyte(analyte.clone());
            vocabulary.add_commodity(commodity.clone());
        }
        vocabulary
    }

    pub fn add_analyte(&mut self, canonical: CanonicalAnalyteId) {
        let name = canonical.as_str().to_string();
        self.analytes.insert(&name, canonical);
    }

    pub fn add_commodity(&mut self, canonical: CanonicalCommodityId) {
        let name = canonical.as_str().to_string();
        self.commodities.insert(&name, canonical);
    }

    /// Register `alias` for an analyte. An alias already bound to a different
    /// canonical name is rejected.
    pub fn add_analyte_alias(
        &mut self,
        alias: &str,
        canonical: CanonicalAnalyteId,
    ) -> Result<(), ReferenceDataError> {
        check_alias(&self.analytes, alias, &canonical)?;
        self.analytes.insert(alias, canonical);
        Ok(())
    }

    pub fn add_commodity_alias(
        &mut self,
        alias: &str,
        canonical: CanonicalCommodityId,
    ) -> Result<(), ReferenceDataError> {
        check_alias(&self.commodities, alias, &canonical)?;
        self.commodities.insert(alias, canonical);
        Ok(())
    }

    /// Load a `kind|alias|canonical` file (with header row) and return the
    /// number of aliases added.
    pub fn load_aliases(&mut self, path: &Path, delimiter: u8) -> Result<usize, ReferenceDataError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| ReferenceDataError::from_csv(path, e))?;

        let mut added = 0usize;
        for (index, row) in reader.deserialize::<AliasRow>().enumerate() {
            // Header is line 1.
            let line = index + 2;
            let row = row.map_err(|e| ReferenceDataError::from_csv(path, e))?;
            let invalid = |reason: String| ReferenceDataError::InvalidRow {
                path: path.to_path_buf(),
                line,
                reason,
            };

            match row.kind.to_lowercase().as_str() {
                "analyte" => {
                    let canonical = CanonicalAnalyteId::new(row.canonical)
                        .map_err(|e| invalid(e.to_string()))?;
                    self.add_analyte_alias(&row.alias, canonical)?;
                }
                "commodity" => {
                    let canonical = CanonicalCommodityId::new(row.canonical)
                        .map_err(|e| invalid(e.to_string()))?;
                    self.add_commodity_alias(&row.alias, canonical)?;
                }
                other => return Err(invalid(format!("unknown alias kind '{other}'"))),
            }
            added += 1;
        }

        tracing::info!(path = %path.display(), aliases = added, "Alias table loaded");
        Ok(added)
    }

    pub fn analyte_count(&self) -> usize {
        self.analytes.len()
    }

    pub fn commodity_count(&self) -> usize {
        self.commodities.len()
    }
}

fn check_alias<T: Clone + Ord + AsRef<str> + PartialEq>(
    index: &NameIndex<T>,
    alias: &str,
    canonical: &T,
) -> Result<(), ReferenceDataError> {
    match index.exact.get(&collapse_whitespace(alias)) {
        Some(existing) if existing != canonical => Err(ReferenceDataError::ConflictingAlias {
            alias: alias.to_string(),
            first: existing.as_ref().to_string(),
            second: canonical.as_ref().to_string(),
        }),
        _ => Ok(()),
    }
}

impl CanonicalLookup for Vocabulary {
    fn resolve_analyte(&self, raw: &str) -> Result<CanonicalAnalyteId, NormalizationIssue> {
        match self.analytes.find(raw) {
            Lookup::Found(id) => Ok(id),
            Lookup::Ambiguous(matches) => Err(NormalizationIssue::AmbiguousName {
                name: raw.to_string(),
                matches,
            }),
            Lookup::Unknown => Err(NormalizationIssue::UnknownAnalyte {
                name: raw.to_string(),
            }),
        }
    }

    fn resolve_commodity(&self, raw: &str) -> Result<CanonicalCommodityId, NormalizationIssue> {
        match self.commodities.find(raw) {
            Lookup::Found(id) => Ok(id),
            Lookup::Ambiguous(matches) => Err(NormalizationIssue::AmbiguousName {
                name: raw.to_string(),
                matches,
            }),
            Lookup::Unknown => Err(NormalizationIssue::UnknownCommodity {
                name: raw.to_string(),
            }),
        }
    }
}
