//! Folder-level collection: parse every workbook under a root into one table.

use crate::error::{FlattenError, Result};
use crate::table::{Table, TableValue, TabularRecord};
use log::{info, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Column holding the path of the source file relative to the collection root.
pub const FILE_COLUMN: &str = "File";

#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub table: Table,
    pub succeeded: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// `.xlsx` files under `root`, sorted, without office lock files.
pub fn find_workbooks(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root.as_ref()) {
        let entry = entry.map_err(|e| FlattenError::IoError(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_lock_file = entry.file_name().to_string_lossy().starts_with("~$");
        let is_xlsx = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
        if is_xlsx && !is_lock_file {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// `path` relative to `root`, joined with `/` on every platform.
pub fn provenance(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Parses every workbook under `root` with `parser` and stacks the results, each row
/// tagged with its file. A file that fails contributes no rows and is listed in
/// [`BatchReport::failures`].
pub fn collect_folder<R, F>(root: impl AsRef<Path>, parser: F) -> Result<BatchReport>
where
    R: TabularRecord,
    F: Fn(&Path) -> Result<Vec<R>>,
{
    let root = root.as_ref();
    let mut tables = Vec::new();
    let mut report = BatchReport::default();

    for path in find_workbooks(root)? {
        match parser(&path) {
            Ok(records) => {
                let tag = TableValue::Text(provenance(root, &path));
                tables.push(Table::from_records(&records).with_column(FILE_COLUMN, tag));
                report.succeeded += 1;
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                report.failures.push(BatchFailure {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }

    report.table = if tables.is_empty() {
        Table::from_records::<R>(&[])
            .with_column(FILE_COLUMN, TableValue::Empty)
            .into_preferred_order()
    } else {
        Table::concat(tables)
    };
    info!(
        "Collected {} rows from {}: {} files parsed, {} failed",
        report.table.len(),
        root.display(),
        report.succeeded,
        report.failed()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NormalizedRecord;
    use std::fs;

    #[test]
    fn test_find_workbooks_filters_and_sorts() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("b/nested"))?;
        fs::write(dir.path().join("b/nested/z.xlsx"), b"")?;
        fs::write(dir.path().join("a.XLSX"), b"")?;
        fs::write(dir.path().join("~$a.xlsx"), b"")?;
        fs::write(dir.path().join("old.xls"), b"")?;
        fs::write(dir.path().join("notes.txt"), b"")?;

        let found: Vec<String> = find_workbooks(dir.path())?
            .iter()
            .map(|p| provenance(dir.path(), p))
            .collect();
        assert_eq!(found, vec!["a.XLSX", "b/nested/z.xlsx"]);
        Ok(())
    }

    #[test]
    fn test_failures_are_reported_not_raised() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("good.xlsx"), b"")?;
        fs::write(dir.path().join("bad.xlsx"), b"")?;

        let report = collect_folder(dir.path(), |path: &Path| {
            if path.ends_with("bad.xlsx") {
                return Err(FlattenError::MissingPart("xl/workbook.xml".to_string()));
            }
            Ok(vec![NormalizedRecord {
                value: Some(1.0),
                ..Default::default()
            }])
        })?;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed(), 1);
        assert!(report.failures[0].path.ends_with("bad.xlsx"));
        assert_eq!(report.table.len(), 1);
        assert_eq!(
            report.table.get(0, FILE_COLUMN),
            Some(&TableValue::Text("good.xlsx".to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_empty_folder_keeps_columns() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let report = collect_folder(dir.path(), |_: &Path| Ok(Vec::<NormalizedRecord>::new()))?;
        assert!(report.table.is_empty());
        assert_eq!(report.table.columns()[0], FILE_COLUMN);
        assert!(report.table.columns().iter().any(|c| c == "Value"));
        Ok(())
    }
}
