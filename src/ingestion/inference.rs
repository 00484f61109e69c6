//! Column type inference over a bounded sample of records.
//!
//! Each column starts at the narrowest candidate type and only ever widens:
//!
//! ```text
//! Date -> Integer -> Double -> TimeOfDay -> Boolean -> String
//! ```
//!
//! A cell that fails the current candidate moves the column to the next candidate that
//! accepts it; earlier cells are not re-checked. A known type for a column name is tried
//! first. Missing-value indicator tokens are skipped and mark the column as
//! missing-value enabled.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::IngestionResult;
use crate::types::{ColumnDescriptor, ColumnSet, ColumnType, MvScope, RawCell, RawRecord};

use super::convert::can_convert;
use super::missing::{indicator_base, MissingValueIndicators, StaticIndicators};
use super::options::{HeaderHint, SourceOptions};
use super::pipeline::RecordSupplier;

/// A caller-provided type for a column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownType {
    /// Try this type first.
    Type(ColumnType),
    /// Keep the column as raw text; no inference.
    PassThrough,
}

impl From<ColumnType> for KnownType {
    fn from(t: ColumnType) -> Self {
        KnownType::Type(t)
    }
}

/// Records read ahead for inference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceSample {
    records: Vec<RawRecord>,
    exhausted: bool,
}

impl InferenceSample {
    /// Pull up to `max` records from `supplier`.
    pub fn collect(supplier: &mut dyn RecordSupplier, max: usize) -> IngestionResult<Self> {
        let mut records = Vec::with_capacity(max.min(1024));
        let mut exhausted = false;
        while records.len() < max {
            match supplier.next_record()? {
                Some(r) => records.push(r),
                None => {
                    exhausted = true;
                    break;
                }
            }
        }
        Ok(Self { records, exhausted })
    }

    pub fn from_records(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            exhausted: true,
        }
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when the supplier ran out before the sample filled up.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn into_records(self) -> Vec<RawRecord> {
        self.records
    }
}

/// Result of inference: the column set plus how many leading non-blank records are headers.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutcome {
    pub columns: ColumnSet,
    pub header_rows: usize,
}

pub struct TypeInferenceEngine {
    known_types: HashMap<String, KnownType>,
    indicators: Arc<dyn MissingValueIndicators>,
    mv_scope: Option<MvScope>,
    strict: bool,
    infer_types: bool,
}

impl Default for TypeInferenceEngine {
    fn default() -> Self {
        Self {
            known_types: HashMap::new(),
            indicators: Arc::new(StaticIndicators::none()),
            mv_scope: None,
            strict: false,
            infer_types: true,
        }
    }
}

impl TypeInferenceEngine {
    pub fn from_options(options: &SourceOptions) -> Self {
        Self {
            mv_scope: options.mv_scope.clone(),
            strict: options.strict_errors,
            infer_types: options.infer_types,
            ..Self::default()
        }
    }

    /// Known types keyed by column name (matched case-insensitively).
    pub fn with_known_types(mut self, known: &HashMap<String, KnownType>) -> Self {
        self.known_types = known
            .iter()
            .map(|(k, v)| (k.to_lowercase(), *v))
            .collect();
        self
    }

    pub fn with_indicators(mut self, indicators: Arc<dyn MissingValueIndicators>) -> Self {
        self.indicators = indicators;
        self
    }

    /// Infer column names and types from `sample`.
    pub fn infer(&self, sample: &InferenceSample, hint: HeaderHint) -> IngestionResult<InferenceOutcome> {
        let rows: Vec<&RawRecord> = sample
            .records()
            .iter()
            .filter(|r| !r.cells.iter().all(RawCell::is_blank))
            .collect();
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);

        let header_rows = match hint {
            HeaderHint::Present => usize::from(!rows.is_empty()),
            HeaderHint::Absent => 0,
            HeaderHint::Unknown => usize::from(self.first_row_is_header(&rows, width)),
        };
        let header = (header_rows == 1).then(|| rows[0]);
        let data = &rows[header_rows..];

        let mut columns = Vec::with_capacity(width);
        for index in 0..width {
            let name = header
                .map(|h| normalize_name(&h.get(index).to_text()))
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("column{index}"));
            let known = self.known_types.get(&name.to_lowercase()).copied();
            let inferred = self.infer_column(known, data.iter().map(|r| r.get(index)));

            let mut col = ColumnDescriptor::new(name, inferred.column_type);
            col.passthrough = inferred.passthrough;
            if inferred.mv_enabled {
                col.mv_enabled = true;
                col.mv_scope = self.mv_scope.clone();
            }
            columns.push(col);
        }
        pair_indicator_columns(&mut columns, self.mv_scope.as_ref());

        tracing::debug!(
            columns = columns.len(),
            header_rows,
            sampled = rows.len(),
            "inferred column set"
        );
        Ok(InferenceOutcome {
            columns: ColumnSet::try_new(columns, self.strict)?,
            header_rows,
        })
    }

    fn first_row_is_header(&self, rows: &[&RawRecord], width: usize) -> bool {
        match rows {
            [] => false,
            // Nothing to compare against: a lone row of plain labels is a header.
            [only] => only.cells.iter().filter(|c| !c.is_blank()).all(|c| {
                ColumnType::INFERENCE_ORDER[..5]
                    .iter()
                    .all(|t| !can_convert(c, *t))
            }),
            [first, rest @ ..] => (0..width).any(|index| {
                let cell = first.get(index);
                if cell.is_blank() {
                    return false;
                }
                let known = self.known_types_for_header_check(first, index);
                let provisional = self.infer_column(known, rest.iter().map(|r| r.get(index)));
                !provisional.passthrough && !can_convert(cell, provisional.column_type)
            }),
        }
    }

    // Known types are keyed by header name, which is only known if row 0 is a header.
    fn known_types_for_header_check(&self, first: &RawRecord, index: usize) -> Option<KnownType> {
        let candidate = normalize_name(&first.get(index).to_text()).to_lowercase();
        self.known_types
            .get(&candidate)
            .or_else(|| self.known_types.get(&format!("column{index}")))
            .copied()
    }

    fn infer_column<'a>(
        &self,
        known: Option<KnownType>,
        cells: impl Iterator<Item = &'a RawCell>,
    ) -> InferredColumn {
        let mut out = InferredColumn {
            column_type: ColumnType::String,
            mv_enabled: false,
            passthrough: false,
        };
        let known_type = match known {
            Some(KnownType::PassThrough) => {
                out.passthrough = true;
                return out;
            }
            Some(KnownType::Type(t)) => Some(t),
            None => None,
        };

        let mut candidates: Vec<ColumnType> = ColumnType::INFERENCE_ORDER.to_vec();
        if let Some(t) = known_type {
            candidates.retain(|c| *c != t);
            candidates.insert(0, t);
        }
        let infer = self.infer_types || known_type.is_some();

        let mut current = 0usize;
        let mut tested = false;
        for cell in cells {
            if let RawCell::Text(s) = cell {
                if self.indicators.is_valid_indicator(s.trim(), self.mv_scope.as_ref()) {
                    out.mv_enabled = true;
                    continue;
                }
            }
            if cell.is_blank() || !infer {
                continue;
            }
            tested = true;
            while current + 1 < candidates.len() && !can_convert(cell, candidates[current]) {
                current += 1;
            }
        }

        out.column_type = if tested {
            candidates[current]
        } else {
            known_type.unwrap_or(ColumnType::String)
        };
        out
    }
}

struct InferredColumn {
    column_type: ColumnType,
    mv_enabled: bool,
    passthrough: bool,
}

/// Trim and collapse internal whitespace runs to a single space.
pub(crate) fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Link `X_MVIndicator` columns to `X`; the data column becomes missing-value enabled.
pub(crate) fn pair_indicator_columns(columns: &mut [ColumnDescriptor], scope: Option<&MvScope>) {
    for i in 0..columns.len() {
        let Some(base) = indicator_base(&columns[i].name).map(str::to_string) else {
            continue;
        };
        let Some(j) = columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(&base))
        else {
            continue;
        };
        let data_name = columns[j].name.clone();
        let indicator = &mut columns[i];
        indicator.mv_indicator_of = Some(data_name);
        indicator.column_type = ColumnType::String;
        indicator.mv_scope = scope.cloned();
        let data = &mut columns[j];
        if !data.mv_enabled {
            data.mv_enabled = true;
            data.mv_scope = scope.cloned();
        }
    }
}
