use crate::types::{Band, Mask, MosaicError, MosaicResult, Raster};
use ndarray::{Array2, Zip};
use num_traits::PrimInt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Test applied to a raw QA code for one condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaPredicate {
    /// Exact match against any of the listed composite codes
    Codes(BTreeSet<i64>),
    /// Bitwise flag at the given bit position (Sentinel-2 QA60 style)
    Bit(u32),
    /// Any code greater than or equal to the threshold
    AtLeast(i64),
}

impl QaPredicate {
    pub fn codes(codes: &[i64]) -> Self {
        QaPredicate::Codes(codes.iter().copied().collect())
    }

    /// True if `code` satisfies this predicate
    pub fn matches(&self, code: i64) -> bool {
        match self {
            QaPredicate::Codes(codes) => codes.contains(&code),
            QaPredicate::Bit(bit) => *bit < 63 && (code >> bit) & 1 == 1,
            QaPredicate::AtLeast(min) => code >= *min,
        }
    }
}

/// Named condition decoded from a QA band
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaCondition {
    pub name: String,
    pub predicate: QaPredicate,
}

/// Declarative code table for one sensor/product QA band.
///
/// Conditions are independent and may overlap: a code can satisfy several
/// conditions at once (e.g. `cloud` and `high_conf_cirrus`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaCodeTable {
    /// Product identifier (e.g. "LANDSAT8_SR")
    pub product: String,
    /// Name of the QA band this table decodes
    pub band: String,
    #[serde(default)]
    pub conditions: Vec<QaCondition>,
}

impl QaCodeTable {
    pub fn new(product: impl Into<String>, band: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            band: band.into(),
            conditions: Vec::new(),
        }
    }

    /// Add a condition matching any of `codes`
    pub fn with_codes(self, name: &str, codes: &[i64]) -> Self {
        self.with_condition(name, QaPredicate::codes(codes))
    }

    /// Add a condition set when `bit` is set
    pub fn with_bit(self, name: &str, bit: u32) -> Self {
        self.with_condition(name, QaPredicate::Bit(bit))
    }

    /// Add a condition set for codes >= `min`
    pub fn with_threshold(self, name: &str, min: i64) -> Self {
        self.with_condition(name, QaPredicate::AtLeast(min))
    }

    pub fn with_condition(mut self, name: &str, predicate: QaPredicate) -> Self {
        self.conditions.push(QaCondition {
            name: name.to_string(),
            predicate,
        });
        self
    }

    pub fn condition(&self, name: &str) -> Option<&QaCondition> {
        self.conditions.iter().find(|c| c.name == name)
    }

    pub fn condition_names(&self) -> Vec<&str> {
        self.conditions.iter().map(|c| c.name.as_str()).collect()
    }

    /// Names of every condition `code` satisfies, in table order
    pub fn decode(&self, code: i64) -> Vec<&str> {
        self.conditions
            .iter()
            .filter(|c| c.predicate.matches(code))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Parse a table from its JSON representation
    pub fn from_json(json: &str) -> MosaicResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> MosaicResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Decode every condition of `table` over a QA raster.
///
/// Returns one boolean raster per condition. Codes absent from the table (and
/// codes that do not fit in `i64`) match nothing.
pub fn classify<T: PrimInt>(qa: &Array2<T>, table: &QaCodeTable) -> BTreeMap<String, Mask> {
    log::debug!(
        "Classifying {}x{} QA raster with {} conditions from '{}'",
        qa.nrows(),
        qa.ncols(),
        table.conditions.len(),
        table.product
    );

    table
        .conditions
        .iter()
        .map(|condition| (condition.name.clone(), condition_mask(qa, &condition.predicate)))
        .collect()
}

fn condition_mask<T: PrimInt>(qa: &Array2<T>, predicate: &QaPredicate) -> Mask {
    qa.map(|&code| code.to_i64().map_or(false, |c| predicate.matches(c)))
}

/// Build the validity mask: a pixel is valid iff it matches none of `excluded`.
pub fn build_validity_mask<T: PrimInt>(
    qa: &Array2<T>,
    table: &QaCodeTable,
    excluded: &[&str],
) -> MosaicResult<Mask> {
    let predicates = excluded
        .iter()
        .map(|&name| {
            table
                .condition(name)
                .map(|c| &c.predicate)
                .ok_or_else(|| MosaicError::UnknownCondition {
                    condition: name.to_string(),
                    product: table.product.clone(),
                })
        })
        .collect::<MosaicResult<Vec<_>>>()?;

    let mut valid = Mask::from_elem(qa.dim(), true);
    for predicate in predicates {
        let flagged = condition_mask(qa, predicate);
        Zip::from(&mut valid).and(&flagged).for_each(|v, &f| *v = *v && !f);
    }

    log::debug!(
        "Validity mask from '{}' excluding {:?}: {} of {} pixels valid",
        table.product,
        excluded,
        valid.iter().filter(|&&v| v).count(),
        valid.len()
    );
    Ok(valid)
}

/// Return a copy of `raster` whose mask is its existing mask AND `mask`.
pub fn apply_mask(raster: &Raster, mask: &Mask) -> MosaicResult<Raster> {
    if mask.dim() != raster.dim() {
        return Err(MosaicError::DimensionMismatch {
            expected: raster.dim(),
            found: mask.dim(),
            context: format!("mask applied to raster '{}'", raster.id),
        });
    }

    let mut combined = raster.validity();
    Zip::from(&mut combined).and(mask).for_each(|c, &m| *c = *c && m);
    raster.clone().with_mask(combined)
}

/// Integer QA codes of a band stored in a raster (non-finite values become 0)
pub fn qa_codes(raster: &Raster, band: &str) -> MosaicResult<Array2<i64>> {
    Ok(to_codes(raster.band(band)?))
}

fn to_codes(band: &Band) -> Array2<i64> {
    band.map(|&v| if v.is_finite() { v.round() as i64 } else { 0 })
}

/// One QA band decoded with `table`, excluding the named conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskRule {
    pub table: QaCodeTable,
    pub excluded: Vec<String>,
}

impl MaskRule {
    pub fn new(table: QaCodeTable, excluded: &[&str]) -> Self {
        Self {
            table,
            excluded: excluded.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Validity mask for `raster` read from this rule's QA band
    pub fn validity_mask(&self, raster: &Raster) -> MosaicResult<Mask> {
        let codes = qa_codes(raster, &self.table.band)?;
        let excluded: Vec<&str> = self.excluded.iter().map(String::as_str).collect();
        build_validity_mask(&codes, &self.table, &excluded)
    }
}

/// Apply every rule to `raster`; a pixel stays valid only if all rules keep it.
pub fn mask_with_rules(raster: &Raster, rules: &[MaskRule]) -> MosaicResult<Raster> {
    let mut valid = Mask::from_elem(raster.dim(), true);
    for rule in rules {
        let rule_mask = rule.validity_mask(raster)?;
        Zip::from(&mut valid).and(&rule_mask).for_each(|v, &m| *v = *v && m);
    }
    apply_mask(raster, &valid)
}

/// Pixel count per condition, for diagnostics
pub fn condition_counts(classes: &BTreeMap<String, Mask>) -> BTreeMap<String, usize> {
    let counts: BTreeMap<String, usize> = classes
        .iter()
        .map(|(name, mask)| (name.clone(), mask.iter().filter(|&&v| v).count()))
        .collect();
    log::debug!("QA condition counts: {:?}", counts);
    counts
}
