use serde::{Deserialize, Serialize};

use super::measurement::{CanonicalAnalyteId, CanonicalCommodityId};

/// One row of the reference maximum residue limit table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LimitRecord {
    pub analyte: CanonicalAnalyteId,
    pub commodity: CanonicalCommodityId,
    pub max_residue_limit: u64,
}

impl LimitRecord {
    pub fn key(&self) -> (CanonicalAnalyteId, CanonicalCommodityId) {
        (self.analyte.clone(), self.commodity.clone())
    }
}
