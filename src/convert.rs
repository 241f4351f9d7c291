//! In-place conversion of legacy `.xls` workbooks through an external office suite.

use crate::error::{FlattenError, Result};
use crate::layout::LayoutConfig;
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ConverterConfig {
    #[schemars(description = "Office suite executable accepting --headless --convert-to")]
    pub binary: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            binary: "libreoffice".to_string(),
        }
    }
}

impl LayoutConfig for ConverterConfig {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionReport {
    /// Paths of the `.xlsx` files written.
    pub converted: Vec<PathBuf>,
    /// Legacy files left in place.
    pub failed: Vec<PathBuf>,
}

/// Fails with [`FlattenError::ConverterUnavailable`] unless `<binary> --version` succeeds.
pub fn check_converter(config: &ConverterConfig) -> Result<()> {
    let unavailable = |details: String| FlattenError::ConverterUnavailable {
        binary: config.binary.clone(),
        details,
    };
    let output = Command::new(&config.binary)
        .arg("--version")
        .output()
        .map_err(|e| unavailable(e.to_string()))?;
    if !output.status.success() {
        return Err(unavailable(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    debug!(
        "Converter: {}",
        String::from_utf8_lossy(&output.stdout).trim()
    );
    Ok(())
}

/// Every `.xls` file under `root`, sorted.
pub fn find_legacy_workbooks(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root.as_ref()) {
        let entry = entry.map_err(|e| FlattenError::IoError(e.into()))?;
        let is_xls = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xls"));
        if entry.file_type().is_file() && is_xls {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Converts every legacy workbook under `root` next to its original, deleting the
/// original only once the new file exists. Per-file failures are logged and counted.
pub fn convert_legacy_workbooks(
    root: impl AsRef<Path>,
    config: &ConverterConfig,
) -> Result<ConversionReport> {
    check_converter(config)?;

    let mut report = ConversionReport::default();
    for path in find_legacy_workbooks(root)? {
        match convert_one(&path, config) {
            Ok(converted) => {
                debug!("Converted {}", path.display());
                report.converted.push(converted);
            }
            Err(e) => {
                warn!("Could not convert {}: {}", path.display(), e);
                report.failed.push(path);
            }
        }
    }

    info!(
        "Converted {} legacy workbooks, {} failed",
        report.converted.len(),
        report.failed.len()
    );
    Ok(report)
}

fn convert_one(path: &Path, config: &ConverterConfig) -> Result<PathBuf> {
    let folder = path.parent().unwrap_or_else(|| Path::new("."));
    let target = path.with_extension("xlsx");

    let output = Command::new(&config.binary)
        .args(["--headless", "--convert-to", "xlsx", "--outdir"])
        .arg(folder)
        .arg(path)
        .output()?;
    if !output.status.success() {
        return Err(FlattenError::IoError(std::io::Error::other(format!(
            "converter exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))));
    }
    if !target.exists() {
        return Err(FlattenError::MissingPart(target.display().to_string()));
    }

    std::fs::remove_file(path)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_converter_is_fatal() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("old.xls"), b"")?;
        let config = ConverterConfig {
            binary: "definitely-not-an-office-suite-4f1c".to_string(),
        };

        let err = convert_legacy_workbooks(dir.path(), &config).unwrap_err();
        assert!(matches!(err, FlattenError::ConverterUnavailable { .. }));
        assert!(dir.path().join("old.xls").exists());
        Ok(())
    }

    #[test]
    fn test_find_legacy_workbooks() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("2023"))?;
        fs::write(dir.path().join("2023/march.XLS"), b"")?;
        fs::write(dir.path().join("april.xls"), b"")?;
        fs::write(dir.path().join("april.xlsx"), b"")?;

        let found = find_legacy_workbooks(dir.path())?;
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| !p.ends_with("april.xlsx")));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_converts_in_place_and_keeps_failures() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let script = dir.path().join("fake-office");
        fs::write(
            &script,
            "#!/bin/sh\n\
             if [ \"$1\" = \"--version\" ]; then echo fake 1.0; exit 0; fi\n\
             case \"$6\" in *broken*) exit 1;; esac\n\
             name=$(basename \"$6\" .xls)\n\
             touch \"$5/$name.xlsx\"\n",
        )?;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;

        let data = dir.path().join("data");
        fs::create_dir(&data)?;
        fs::write(data.join("march.xls"), b"")?;
        fs::write(data.join("broken.xls"), b"")?;

        let config = ConverterConfig {
            binary: script.to_string_lossy().into_owned(),
        };
        let report = convert_legacy_workbooks(&data, &config)?;

        assert_eq!(report.converted, vec![data.join("march.xlsx")]);
        assert_eq!(report.failed, vec![data.join("broken.xls")]);
        assert!(!data.join("march.xls").exists());
        assert!(data.join("broken.xls").exists());
        Ok(())
    }
}
