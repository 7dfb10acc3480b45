//! Which height fields make a border row "complete".

use std::fmt;
use std::str::FromStr;

use super::record::{BuildingRecord, GROUND_PERCENTILES, ROOF_PERCENTILES};

/// One height percentile column.
///
/// Only built through [`HeightField::ground`], [`HeightField::roof`] or
/// parsing, so the index is always within its percentile list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeightField {
    kind: FieldKind,
    index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FieldKind {
    Ground,
    Roof,
}

impl HeightField {
    /// Ground percentile `index` of [`GROUND_PERCENTILES`].
    pub fn ground(index: usize) -> Option<HeightField> {
        (index < GROUND_PERCENTILES.len()).then_some(HeightField {
            kind: FieldKind::Ground,
            index,
        })
    }

    /// Roof percentile `index` of [`ROOF_PERCENTILES`].
    pub fn roof(index: usize) -> Option<HeightField> {
        (index < ROOF_PERCENTILES.len()).then_some(HeightField {
            kind: FieldKind::Roof,
            index,
        })
    }

    /// Every ground and roof percentile field.
    pub fn all() -> Vec<HeightField> {
        (0..GROUND_PERCENTILES.len())
            .filter_map(HeightField::ground)
            .chain((0..ROOF_PERCENTILES.len()).filter_map(HeightField::roof))
            .collect()
    }

    pub fn column(&self) -> String {
        match self.kind {
            FieldKind::Ground => format!("ground_{}", GROUND_PERCENTILES[self.index]),
            FieldKind::Roof => format!("roof_{}", ROOF_PERCENTILES[self.index]),
        }
    }

    pub fn value(&self, record: &BuildingRecord) -> Option<f32> {
        match self.kind {
            FieldKind::Ground => record.ground[self.index],
            FieldKind::Roof => record.roof[self.index],
        }
    }
}

impl fmt::Display for HeightField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.column())
    }
}

impl FromStr for HeightField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let find = |suffix: &str, labels: &[&str]| labels.iter().position(|l| *l == suffix);
        if let Some(rest) = s.strip_prefix("ground_") {
            if let Some(field) = find(rest, &GROUND_PERCENTILES).and_then(HeightField::ground) {
                return Ok(field);
            }
        }
        if let Some(rest) = s.strip_prefix("roof_") {
            if let Some(field) = find(rest, &ROOF_PERCENTILES).and_then(HeightField::roof) {
                return Ok(field);
            }
        }
        Err(format!("unknown height field '{}'", s))
    }
}

/// Completeness rule for preferring a new-coverage border row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePolicy {
    required: Vec<HeightField>,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            required: HeightField::all(),
        }
    }
}

impl MergePolicy {
    /// Policy requiring exactly `fields`. An empty list falls back to all.
    pub fn requiring(fields: Vec<HeightField>) -> Self {
        if fields.is_empty() {
            return Self::default();
        }
        Self { required: fields }
    }

    pub fn required(&self) -> &[HeightField] {
        &self.required
    }

    pub fn is_complete(&self, record: &BuildingRecord) -> bool {
        self.required.iter().all(|f| f.value(record).is_some())
    }
}
