//! Parallel loading of a definitions directory.
//!
//! Each `.admx` file and its `.adml` sibling form one content unit parsed on
//! tokio's blocking pool. A failing unit is reported and skipped; it never
//! aborts its siblings.

use futures::future::join_all;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::adml::parse_adml;
use crate::admx::parse_admx;
use crate::catalog::PolicyCatalog;
use crate::error::{AdmxError, AdmxResult};
use crate::types::{AdmlResources, AdmxFile};

pub const FALLBACK_LANGUAGE: &str = "en-US";

/// A content unit that could not be (fully) loaded.
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: AdmxError,
}

#[derive(Debug)]
pub struct LoadReport {
    pub catalog: PolicyCatalog,
    pub failures: Vec<LoadFailure>,
}

/// Load every `.admx` under `dir` with resources for `language`.
pub async fn load_directory(dir: &Path, language: &str) -> AdmxResult<LoadReport> {
    let paths = admx_paths(dir)?;
    info!("Loading {} definition files from {}", paths.len(), dir.display());

    let tasks = paths.iter().cloned().map(|path| {
        let language = language.to_string();
        tokio::task::spawn_blocking(move || load_unit(&path, &language))
    });
    let results = join_all(tasks).await;

    let mut files = Vec::new();
    let mut failures = Vec::new();
    for (path, joined) in paths.into_iter().zip(results) {
        match joined {
            Ok(Ok((file, adml_error))) => {
                if let Some(error) = adml_error {
                    failures.push(LoadFailure { path: path.clone(), error });
                }
                files.push(file);
            }
            Ok(Err(error)) => {
                warn!("Skipping {}: {}", path.display(), error);
                failures.push(LoadFailure { path, error });
            }
            Err(e) => failures.push(LoadFailure {
                path,
                error: AdmxError::Task(e.to_string()),
            }),
        }
    }

    Ok(LoadReport {
        catalog: PolicyCatalog::build(files),
        failures,
    })
}

/// Re-parse only the localized resources for `language`.
pub async fn reload_language(catalog: &mut PolicyCatalog, language: &str) -> Vec<LoadFailure> {
    let tasks = catalog.files().iter().map(|f| {
        let path = f.path.clone();
        let language = language.to_string();
        tokio::task::spawn_blocking(move || load_resources(&path, &language))
    });
    let results = join_all(tasks).await;

    let mut failures = Vec::new();
    let mut resources = Vec::with_capacity(results.len());
    for (file, joined) in catalog.files().iter().zip(results) {
        let loaded = match joined {
            Ok(r) => r,
            Err(e) => Err(AdmxError::Task(e.to_string())),
        };
        match loaded {
            Ok(res) => resources.push(res),
            Err(error) => {
                warn!("Resources for {} unavailable: {}", file.path.display(), error);
                failures.push(LoadFailure { path: file.path.clone(), error });
                resources.push(None);
            }
        }
    }
    catalog.apply_resources(resources);
    info!("Switched definitions language to {language}");
    failures
}

fn admx_paths(dir: &Path) -> AdmxResult<Vec<PathBuf>> {
    let io_err = |source: std::io::Error| AdmxError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_admx = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("admx"));
        if is_admx && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Parse one unit. An ADML failure is returned beside the structural data
/// rather than discarding it.
fn load_unit(path: &Path, language: &str) -> AdmxResult<(AdmxFile, Option<AdmxError>)> {
    let xml = read_xml(path)?;
    let mut file = parse_admx(&xml, path)?;
    let adml_error = match load_resources(path, language) {
        Ok(res) => {
            file.resources = res;
            None
        }
        Err(e) => {
            warn!("Resources for {} unavailable: {}", path.display(), e);
            Some(e)
        }
    };
    Ok((file, adml_error))
}

/// `<dir>/<language>/<stem>.adml`, then the fallback language.
pub fn adml_path(admx: &Path, language: &str) -> Option<PathBuf> {
    let dir = admx.parent()?;
    let file_name = format!("{}.adml", admx.file_stem()?.to_string_lossy());
    [language, FALLBACK_LANGUAGE]
        .iter()
        .map(|lang| dir.join(lang).join(&file_name))
        .find(|p| p.is_file())
}

fn load_resources(admx: &Path, language: &str) -> AdmxResult<Option<AdmlResources>> {
    let Some(path) = adml_path(admx, language) else {
        warn!("No {language} resources for {}", admx.display());
        return Ok(None);
    };
    let resolved_language = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or(language)
        .to_string();
    let xml = read_xml(&path)?;
    parse_adml(&xml, &path, &resolved_language).map(Some)
}

/// Read a definition file, honouring UTF-8 and UTF-16LE byte order marks.
fn read_xml(path: &Path) -> AdmxResult<String> {
    let bytes = fs::read(path).map_err(|source| AdmxError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16(&units)
            .map_err(|e| AdmxError::Xml(format!("{}: {}", path.display(), e)));
    }
    let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    String::from_utf8(body.to_vec())
        .map_err(|e| AdmxError::Xml(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn adml_path_falls_back_to_en_us() {
        let dir = TempDir::new().unwrap();
        let admx = dir.path().join("test.admx");
        fs::write(&admx, "").unwrap();
        fs::create_dir(dir.path().join("en-US")).unwrap();
        fs::write(dir.path().join("en-US").join("test.adml"), "").unwrap();

        assert_eq!(adml_path(&admx, "de-DE"), Some(dir.path().join("en-US").join("test.adml")));

        fs::create_dir(dir.path().join("de-DE")).unwrap();
        fs::write(dir.path().join("de-DE").join("test.adml"), "").unwrap();
        assert_eq!(adml_path(&admx, "de-DE"), Some(dir.path().join("de-DE").join("test.adml")));
    }

    #[test]
    fn read_xml_handles_byte_order_marks() {
        let dir = TempDir::new().unwrap();
        let utf8 = dir.path().join("a.xml");
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"<a/>");
        fs::write(&utf8, bytes).unwrap();
        assert_eq!(read_xml(&utf8).unwrap(), "<a/>");

        let utf16 = dir.path().join("b.xml");
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<b/>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        fs::write(&utf16, bytes).unwrap();
        assert_eq!(read_xml(&utf16).unwrap(), "<b/>");
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let err = admx_paths(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, AdmxError::Io { .. }));
    }
}
