// Data model for the expression cache analysis
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// The closed set of expression categories recognized in skin XML text.
///
/// Every category is matched by a bracketed-call form `$KEYWORD[payload]`;
/// the Variable category doubles as the caching indirection: an expression
/// wrapped inside a `$VAR[...]` payload counts as cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExpressionCategory {
    Variable,
    InfoLookup,
    Localization,
    VisibleCondition,
    EnableCondition,
}

pub const NUM_CATEGORIES: usize = 5;

impl ExpressionCategory {
    pub const ALL: [ExpressionCategory; NUM_CATEGORIES] = [
        ExpressionCategory::Variable,
        ExpressionCategory::InfoLookup,
        ExpressionCategory::Localization,
        ExpressionCategory::VisibleCondition,
        ExpressionCategory::EnableCondition,
    ];

    /// Keyword between `$` and `[` in the source text.
    pub fn keyword(&self) -> &'static str {
        match self {
            ExpressionCategory::Variable => "VAR",
            ExpressionCategory::InfoLookup => "INFO",
            ExpressionCategory::Localization => "LOCALIZE",
            ExpressionCategory::VisibleCondition => "VISIBLE",
            ExpressionCategory::EnableCondition => "ENABLE",
        }
    }

    /// Human-readable name used in report headings.
    pub fn label(&self) -> &'static str {
        match self {
            ExpressionCategory::Variable => "Variables ($VAR)",
            ExpressionCategory::InfoLookup => "Info lookups ($INFO)",
            ExpressionCategory::Localization => "Localizations ($LOCALIZE)",
            ExpressionCategory::VisibleCondition => "Visible conditions ($VISIBLE)",
            ExpressionCategory::EnableCondition => "Enable conditions ($ENABLE)",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ExpressionCategory::Variable => 0,
            ExpressionCategory::InfoLookup => 1,
            ExpressionCategory::Localization => 2,
            ExpressionCategory::VisibleCondition => 3,
            ExpressionCategory::EnableCondition => 4,
        }
    }
}

/// Integer cache ratio in percent, floored. Zero when nothing was counted.
pub fn cache_ratio(cached: u64, total: u64) -> u64 {
    if total == 0 {
        0
    } else {
        cached * 100 / total
    }
}

/// (total, cached) pair for one category.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CategoryCounts {
    pub total: u64,
    pub cached: u64,
}

impl CategoryCounts {
    pub fn ratio(&self) -> u64 {
        cache_ratio(self.cached, self.total)
    }
}

/// Per-category counters, indexed by `ExpressionCategory`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CountSet {
    counts: [CategoryCounts; NUM_CATEGORIES],
}

impl CountSet {
    pub fn get(&self, category: ExpressionCategory) -> CategoryCounts {
        self.counts[category.index()]
    }

    pub fn record(&mut self, category: ExpressionCategory, cached: bool) {
        let slot = &mut self.counts[category.index()];
        slot.total += 1;
        if cached {
            slot.cached += 1;
        }
    }

    pub fn merge(&mut self, other: &CountSet) {
        for (slot, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            slot.total += theirs.total;
            slot.cached += theirs.cached;
        }
    }

    /// Summed (total, cached) across all categories.
    pub fn combined(&self) -> CategoryCounts {
        let mut combined = CategoryCounts::default();
        for slot in &self.counts {
            combined.total += slot.total;
            combined.cached += slot.cached;
        }
        combined
    }
}

/// Scan result for a single file. Immutable once the scan pass produced it.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub counts: CountSet,
}

impl FileRecord {
    /// Combined cache ratio for this file across all categories.
    pub fn overall_ratio(&self) -> u64 {
        let combined = self.counts.combined();
        cache_ratio(combined.cached, combined.total)
    }
}

/// Running totals for the whole tree, folded from file records.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateTotals {
    pub files_scanned: usize,
    pub counts: CountSet,
}

impl AggregateTotals {
    pub fn fold(&mut self, record: &FileRecord) {
        self.files_scanned += 1;
        self.counts.merge(&record.counts);
    }

    pub fn overall_ratio(&self) -> u64 {
        let combined = self.counts.combined();
        cache_ratio(combined.cached, combined.total)
    }
}

/// Occurrence counter over payload strings, preserving first-seen order so
/// that ranking ties are stable across runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrequencyTable {
    entries: Vec<(String, u64)>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, payload: &str) {
        if let Some(&i) = self.index.get(payload) {
            self.entries[i].1 += 1;
        } else {
            self.index.insert(payload.to_string(), self.entries.len());
            self.entries.push((payload.to_string(), 1));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by count descending; equal counts keep first-seen order.
    pub fn ranked(&self) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .entries
            .iter()
            .map(|(payload, count)| (payload.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

/// Why a file was skipped during the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    PermissionDenied,
    InvalidEncoding,
    Io(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::PermissionDenied => write!(f, "permission denied"),
            SkipReason::InvalidEncoding => write!(f, "not valid UTF-8 text"),
            SkipReason::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

/// A non-fatal per-file failure, surfaced in the report's warnings section.
#[derive(Debug, Clone, Serialize)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub reason: SkipReason,
}
