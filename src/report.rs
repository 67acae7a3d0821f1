// Report assembly and rendering
//
// The report is a plain value produced by the scanner; rendering it to text
// or JSON is a separate step so the numbers can be asserted on without any
// I/O or output parsing.
use crate::models::{
    AggregateTotals, ExpressionCategory, FileRecord, FrequencyTable, ScanWarning,
};
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Overall ratios below this are a significant optimization opportunity.
pub const RATIO_SIGNIFICANT_BELOW: u64 = 80;
/// Overall ratios below this (but at least the significant bound) are a
/// moderate opportunity; anything at or above counts as well optimized.
pub const RATIO_MODERATE_BELOW: u64 = 90;

/// How many uncached patterns the standard report shows.
pub const TOP_UNCACHED_PATTERNS: usize = 20;
/// How many files the size ranking shows.
pub const TOP_FILES_BY_SIZE: usize = 10;

/// Size-tier thresholds for the file ranking.
pub const SIZE_MEDIUM_BYTES: u64 = 20 * 1024;
pub const SIZE_LARGE_BYTES: u64 = 50 * 1024;

pub fn size_tier(bytes: u64) -> &'static str {
    if bytes >= SIZE_LARGE_BYTES {
        "large"
    } else if bytes >= SIZE_MEDIUM_BYTES {
        "medium"
    } else {
        "small"
    }
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationTier {
    Significant,
    Moderate,
    WellOptimized,
}

impl OptimizationTier {
    pub fn for_ratio(overall_ratio: u64) -> Self {
        if overall_ratio < RATIO_SIGNIFICANT_BELOW {
            OptimizationTier::Significant
        } else if overall_ratio < RATIO_MODERATE_BELOW {
            OptimizationTier::Moderate
        } else {
            OptimizationTier::WellOptimized
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OptimizationTier::Significant => "significant optimization opportunity",
            OptimizationTier::Moderate => "moderate optimization opportunity",
            OptimizationTier::WellOptimized => "well optimized",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            OptimizationTier::Significant => {
                "Many expressions are evaluated directly. Wrap the most frequent \
                 $INFO lookups behind cached $VAR indirections."
            }
            OptimizationTier::Moderate => {
                "Caching is partial. Review the top uncached patterns below for \
                 lookups worth aliasing behind a $VAR."
            }
            OptimizationTier::WellOptimized => {
                "Most expressions already sit behind cached variables. No action \
                 needed."
            }
        }
    }
}

/// The analysis result for one tree. Write-once: the scanner builds it, the
/// renderers below only read it.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub root: PathBuf,
    pub records: Vec<FileRecord>,
    pub totals: AggregateTotals,
    pub uncached_info: FrequencyTable,
    pub warnings: Vec<ScanWarning>,
}

impl Report {
    pub fn overall_ratio(&self) -> u64 {
        self.totals.overall_ratio()
    }

    pub fn tier(&self) -> OptimizationTier {
        OptimizationTier::for_ratio(self.overall_ratio())
    }

    /// Records sorted by byte size descending; ties keep scan (path) order.
    pub fn records_by_size(&self) -> Vec<&FileRecord> {
        let mut ranked: Vec<&FileRecord> = self.records.iter().collect();
        ranked.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
        ranked
    }

    /// Render the full text report. `detailed` switches the frequency table
    /// from a top-N excerpt to the unabridged listing.
    pub fn render_text(&self, detailed: bool) -> String {
        let mut out = String::new();
        let rule = "=".repeat(64);

        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, " SKIN EXPRESSION CACHE ANALYSIS");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out);
        let _ = writeln!(out, "Root: {}", self.root.display());

        self.render_summary(&mut out);
        self.render_per_file(&mut out);
        self.render_uncached_patterns(&mut out, detailed);
        self.render_files_by_size(&mut out);
        self.render_recommendations(&mut out);
        self.render_warnings(&mut out);

        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn render_summary(&self, out: &mut String) {
        let _ = writeln!(out);
        let _ = writeln!(out, "--- Summary ---");
        let _ = writeln!(out);
        let _ = writeln!(out, "Files scanned: {}", self.totals.files_scanned);
        for category in ExpressionCategory::ALL {
            let counts = self.totals.counts.get(category);
            let _ = writeln!(
                out,
                "{:<32} total={:>6}  cached={:>6}  ratio={:>3}%",
                category.label(),
                counts.total,
                counts.cached,
                counts.ratio()
            );
        }
        let _ = writeln!(out, "Overall cache ratio: {}%", self.overall_ratio());
    }

    fn render_per_file(&self, out: &mut String) {
        let _ = writeln!(out);
        let _ = writeln!(out, "--- Per-File Detail ---");
        let _ = writeln!(out);

        if self.records.is_empty() {
            let _ = writeln!(out, "(no files scanned)");
            return;
        }

        for record in &self.records {
            let _ = writeln!(
                out,
                "{}  ({}, {})",
                record.path.display(),
                format_size(record.size_bytes),
                size_tier(record.size_bytes)
            );
            let mut any = false;
            for category in ExpressionCategory::ALL {
                let counts = record.counts.get(category);
                if counts.total == 0 {
                    continue;
                }
                any = true;
                let _ = writeln!(
                    out,
                    "  {:<30} total={:>5}  cached={:>5}  ratio={:>3}%",
                    category.label(),
                    counts.total,
                    counts.cached,
                    counts.ratio()
                );
            }
            if !any {
                let _ = writeln!(out, "  (no expressions)");
            } else {
                let _ = writeln!(out, "  file cache ratio: {}%", record.overall_ratio());
            }
        }
    }

    fn render_uncached_patterns(&self, out: &mut String, detailed: bool) {
        let _ = writeln!(out);
        if detailed {
            let _ = writeln!(out, "--- Uncached $INFO Patterns (full) ---");
        } else {
            let _ = writeln!(
                out,
                "--- Top {} Uncached $INFO Patterns ---",
                TOP_UNCACHED_PATTERNS
            );
        }
        let _ = writeln!(out);

        let ranked = self.uncached_info.ranked();
        if ranked.is_empty() {
            let _ = writeln!(out, "(none)");
            return;
        }

        let cutoff = if detailed {
            ranked.len()
        } else {
            TOP_UNCACHED_PATTERNS.min(ranked.len())
        };
        for (rank, (payload, count)) in ranked[..cutoff].iter().enumerate() {
            let _ = writeln!(out, "{:>3}. {:>5}x  {}", rank + 1, count, payload);
        }
    }

    fn render_files_by_size(&self, out: &mut String) {
        let _ = writeln!(out);
        let _ = writeln!(out, "--- Top {} Files by Size ---", TOP_FILES_BY_SIZE);
        let _ = writeln!(out);

        let ranked = self.records_by_size();
        if ranked.is_empty() {
            let _ = writeln!(out, "(none)");
            return;
        }

        for (rank, record) in ranked.iter().take(TOP_FILES_BY_SIZE).enumerate() {
            let _ = writeln!(
                out,
                "{:>3}. {:>10}  [{:<6}]  {}",
                rank + 1,
                format_size(record.size_bytes),
                size_tier(record.size_bytes),
                record.path.display()
            );
        }
    }

    fn render_recommendations(&self, out: &mut String) {
        let tier = self.tier();
        let _ = writeln!(out);
        let _ = writeln!(out, "--- Recommendations ---");
        let _ = writeln!(out);
        let _ = writeln!(out, "Overall cache ratio: {}%", self.overall_ratio());
        let _ = writeln!(out, "Status: {}", tier.label());
        let _ = writeln!(out, "{}", tier.advice());
    }

    fn render_warnings(&self, out: &mut String) {
        let _ = writeln!(out);
        let _ = writeln!(out, "--- Warnings ---");
        let _ = writeln!(out);
        if self.warnings.is_empty() {
            let _ = writeln!(out, "(none)");
            return;
        }
        for warning in &self.warnings {
            let _ = writeln!(out, "- {}: {}", warning.path.display(), warning.reason);
        }
    }

    /// Condensed stdout summary: category table plus recommendation tier.
    pub fn print_summary(&self) {
        println!("\n📊 Cache Analysis: {}\n", self.root.display());

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec!["Category", "Total", "Cached", "Ratio"]);
        for category in ExpressionCategory::ALL {
            let counts = self.totals.counts.get(category);
            table.add_row(vec![
                category.label().to_string(),
                counts.total.to_string(),
                counts.cached.to_string(),
                format!("{}%", counts.ratio()),
            ]);
        }
        println!("{table}");

        println!(
            "  Files scanned: {}   Overall ratio: {}%",
            self.totals.files_scanned,
            self.overall_ratio()
        );

        let tier = self.tier();
        let status = match tier {
            OptimizationTier::Significant => tier.label().red().bold(),
            OptimizationTier::Moderate => tier.label().yellow(),
            OptimizationTier::WellOptimized => tier.label().green(),
        };
        println!("  Status: {}", status);

        if !self.warnings.is_empty() {
            println!(
                "  {} {} file(s) skipped, see report warnings",
                "⚠".yellow(),
                self.warnings.len()
            );
        }
    }
}
