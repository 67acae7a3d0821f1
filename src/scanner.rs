// Directory scanning and per-file classification
use crate::models::{
    AggregateTotals, CountSet, ExpressionCategory, FileRecord, FrequencyTable, ScanWarning,
    SkipReason,
};
use crate::patterns::match_line;
use crate::report::Report;
use glob::Pattern;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Fatal scan failures. Per-file problems are not errors; they surface as
/// `ScanWarning` entries in the report instead.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("root directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("invalid suffix filter {pattern:?}: {source}")]
    BadFilter {
        pattern: String,
        source: glob::PatternError,
    },
}

/// Result of scanning one file: its record plus the uncached $INFO payloads
/// in the order they appeared, for the frequency table.
struct FileScan {
    record: FileRecord,
    uncached_info: Vec<String>,
}

#[derive(Debug)]
pub struct Scanner {
    root: PathBuf,
    filter: Pattern,
    show_progress: bool,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>, suffix_filter: &str) -> Result<Self, ScanError> {
        let filter = Pattern::new(suffix_filter).map_err(|source| ScanError::BadFilter {
            pattern: suffix_filter.to_string(),
            source,
        })?;
        Ok(Self {
            root: root.into(),
            filter,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Walk the tree, classify every matching file, and assemble the report.
    ///
    /// Aborts before producing anything when the root is missing; all other
    /// failures are per-file and non-fatal.
    pub fn scan(&self) -> Result<Report, ScanError> {
        if !self.root.is_dir() {
            return Err(ScanError::RootNotFound(self.root.clone()));
        }

        info!("Scanning {} for {}", self.root.display(), self.filter);

        let (files, mut warnings) = self.collect_files();
        debug!("{} candidate files after filtering", files.len());

        let progress = self.progress_bar(files.len() as u64);

        // Parallel per-file map; collect() preserves the sorted input order
        // so the sequential fold below stays deterministic.
        let scans: Vec<Result<FileScan, ScanWarning>> = files
            .par_iter()
            .map(|path| {
                let outcome = scan_file(path);
                progress.inc(1);
                outcome
            })
            .collect();
        progress.finish_and_clear();

        let mut records = Vec::new();
        let mut totals = AggregateTotals::default();
        let mut uncached_info = FrequencyTable::new();

        for scan in scans {
            match scan {
                Ok(file_scan) => {
                    totals.fold(&file_scan.record);
                    for payload in &file_scan.uncached_info {
                        uncached_info.record(payload);
                    }
                    records.push(file_scan.record);
                }
                Err(warning) => {
                    warn!("Skipping {}: {}", warning.path.display(), warning.reason);
                    warnings.push(warning);
                }
            }
        }

        info!(
            "Scanned {} files, {} skipped",
            totals.files_scanned,
            warnings.len()
        );

        Ok(Report {
            root: self.root.clone(),
            records,
            totals,
            uncached_info,
            warnings,
        })
    }

    /// Enumerate matching files, sorted lexicographically by path so every
    /// run processes them in the same order regardless of the filesystem.
    fn collect_files(&self) -> (Vec<PathBuf>, Vec<ScanWarning>) {
        let mut files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(false) {
            match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let name_matches = entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| self.filter.matches(name));
                    if name_matches {
                        files.push(entry.into_path());
                    }
                }
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    warnings.push(ScanWarning {
                        path,
                        reason: walk_error_reason(&err),
                    });
                }
            }
        }

        files.sort();
        (files, warnings)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        bar.set_style(
            ProgressStyle::with_template("{bar:30.cyan/dim} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    }
}

fn walk_error_reason(err: &walkdir::Error) -> SkipReason {
    match err.io_error() {
        Some(io_err) if io_err.kind() == io::ErrorKind::PermissionDenied => {
            SkipReason::PermissionDenied
        }
        _ => SkipReason::Io(err.to_string()),
    }
}

fn read_error_reason(err: &io::Error) -> SkipReason {
    match err.kind() {
        io::ErrorKind::PermissionDenied => SkipReason::PermissionDenied,
        _ => SkipReason::Io(err.to_string()),
    }
}

/// Classify every expression occurrence in one file. Non-text and unreadable
/// files come back as a warning, never an error.
fn scan_file(path: &Path) -> Result<FileScan, ScanWarning> {
    let bytes = fs::read(path).map_err(|err| ScanWarning {
        path: path.to_path_buf(),
        reason: read_error_reason(&err),
    })?;
    let size_bytes = bytes.len() as u64;

    let content = String::from_utf8(bytes).map_err(|_| ScanWarning {
        path: path.to_path_buf(),
        reason: SkipReason::InvalidEncoding,
    })?;

    let mut counts = CountSet::default();
    let mut uncached_info = Vec::new();

    for line in content.lines() {
        // Cheap pre-check: no `$` means no expression on this line
        if !line.contains('$') {
            continue;
        }
        for category in ExpressionCategory::ALL {
            for hit in match_line(line, category) {
                counts.record(category, hit.cached);
                if category == ExpressionCategory::InfoLookup && !hit.cached {
                    uncached_info.push(hit.payload);
                }
            }
        }
    }

    Ok(FileScan {
        record: FileRecord {
            path: path.to_path_buf(),
            size_bytes,
            counts,
        },
        uncached_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn scan(dir: &TempDir) -> Report {
        Scanner::new(dir.path(), "*.xml").unwrap().scan().unwrap()
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let scanner = Scanner::new("/nonexistent/skin/tree", "*.xml").unwrap();
        let err = scanner.scan().unwrap_err();
        assert!(matches!(err, ScanError::RootNotFound(_)));
    }

    #[test]
    fn test_fatal_scan_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");

        let scanner = Scanner::new(&missing, "*.xml").unwrap();
        assert!(scanner.scan().is_err());

        // A fatal run aborts before any output exists anywhere
        assert!(!dir.path().join("cache_analysis_report.txt").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_empty_tree_yields_zeroes() {
        let dir = TempDir::new().unwrap();
        let report = scan(&dir);

        assert_eq!(report.totals.files_scanned, 0);
        assert!(report.records.is_empty());
        assert!(report.warnings.is_empty());
        for category in ExpressionCategory::ALL {
            let counts = report.totals.counts.get(category);
            assert_eq!(counts.total, 0);
            assert_eq!(counts.ratio(), 0);
        }
    }

    #[test]
    fn test_uncached_info_then_wrapped_rescan() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "Home.xml",
            "<label>$INFO[Player.Title]</label>\n\
             <label>$INFO[Player.Title]</label>\n\
             <label>$INFO[Player.Title]</label>\n",
        );

        let report = scan(&dir);
        let info = report.totals.counts.get(ExpressionCategory::InfoLookup);
        assert_eq!(info.total, 3);
        assert_eq!(info.cached, 0);
        assert_eq!(info.ratio(), 0);

        // Wrap one occurrence behind a cached variable indirection
        write_file(
            &dir,
            "Home.xml",
            "<label>$INFO[Player.Title]</label>\n\
             <label>$INFO[Player.Title]</label>\n\
             <label>$VAR[Cache_Player_Title,$INFO[Player.Title]]</label>\n",
        );

        let report = scan(&dir);
        let info = report.totals.counts.get(ExpressionCategory::InfoLookup);
        assert_eq!(info.total, 3);
        assert_eq!(info.cached, 1);
        assert_eq!(info.ratio(), 33);
    }

    #[test]
    fn test_frequency_merges_across_files() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.xml", "$INFO[ListItem.Genre]\n$INFO[ListItem.Year]\n");
        write_file(&dir, "b.xml", "$INFO[ListItem.Genre]\n");

        let report = scan(&dir);
        let ranked = report.uncached_info.ranked();
        assert_eq!(ranked[0], ("ListItem.Genre", 2));
        assert_eq!(ranked[1], ("ListItem.Year", 1));
    }

    #[test]
    fn test_cached_info_stays_out_of_frequency_table() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "view.xml",
            "$VAR[Wrapped,$INFO[Player.Title]]\n$INFO[ListItem.Genre]\n",
        );

        let report = scan(&dir);
        let names: Vec<&str> = report
            .uncached_info
            .ranked()
            .iter()
            .map(|(p, _)| *p)
            .collect();
        assert_eq!(names, vec!["ListItem.Genre"]);
    }

    #[test]
    fn test_suffix_filter_skips_other_files() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "skin.xml", "$INFO[A]\n");
        write_file(&dir, "notes.txt", "$INFO[B]\n");

        let report = scan(&dir);
        assert_eq!(report.totals.files_scanned, 1);
        assert_eq!(
            report.totals.counts.get(ExpressionCategory::InfoLookup).total,
            1
        );
    }

    #[test]
    fn test_recursion_and_sorted_record_order() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "z.xml", "$INFO[A]\n");
        write_file(&dir, "sub/a.xml", "$INFO[B]\n");

        let report = scan(&dir);
        assert_eq!(report.records.len(), 2);
        let paths: Vec<&Path> = report.records.iter().map(|r| r.path.as_path()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[test]
    fn test_undecodable_file_is_warned_not_counted() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "good.xml", "$INFO[A]\n");
        fs::write(dir.path().join("binary.xml"), [0xff, 0xfe, 0x00, 0x24]).unwrap();

        let report = scan(&dir);
        assert_eq!(report.totals.files_scanned, 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].reason, SkipReason::InvalidEncoding);
        assert!(report.warnings[0].path.ends_with("binary.xml"));
    }

    #[test]
    fn test_rescan_is_deterministic() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "b.xml", "$INFO[X]\n$LOCALIZE[31000]\n");
        write_file(&dir, "a.xml", "$VAR[W,$INFO[X]]\n");
        write_file(&dir, "c.xml", "$VISIBLE[Player.HasMedia]\n$ENABLE[Player.HasMedia]\n");

        let first = scan(&dir).render_text(false);
        let second = scan(&dir).render_text(false);
        assert_eq!(first, second);
    }

    #[test]
    fn test_bad_filter_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = Scanner::new(dir.path(), "*.[xml").unwrap_err();
        assert!(matches!(err, ScanError::BadFilter { .. }));
    }
}
