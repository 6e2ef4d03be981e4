//! @acp:module "Package"
//! @acp:summary "Checklist bundles as named byte blobs over a directory, archive or memory"
//! @acp:domain engine
//! @acp:layer io
//!
//! A bundle is a flat set of named files: `config.json`, optional `$ref`
//! fragments, `data.json`, the derived `cachedFeatures.json`, templates,
//! reference documents and assets. On disk it is either a loose directory or a
//! zip archive with the [`BUNDLE_EXT`] extension.

pub mod schema;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{CheckmateError, Result};

pub use schema::{BundleSchema, TemplateDef, CACHE_FILE, CONFIG_FILE, DATA_FILE};

/// Archive extension for packed bundles
pub const BUNDLE_EXT: &str = "chlx";

/// @acp:summary "Named file access used by the project"
pub trait ResourceLoader: fmt::Debug + Send + Sync {
    /// Bundle name, without extension
    fn name(&self) -> &str;

    fn get(&self, name: &str) -> Option<&[u8]>;

    /// Store a file; directory bundles also write it through to disk
    fn set(&mut self, name: &str, data: Vec<u8>) -> Result<()>;

    /// File names in the bundle, sorted
    fn names(&self) -> Vec<&str>;

    /// Pack the bundle into an archive at `path`, returning the written path
    fn save_as(&mut self, path: &Path) -> Result<PathBuf>;

    /// Where the bundle is saved by default
    fn default_archive(&self) -> Option<PathBuf>;
}

/// Where the bundle was loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Directory(PathBuf),
    Archive(PathBuf),
    Memory,
}

/// @acp:summary "In-memory bundle with its origin"
#[derive(Debug, Clone)]
pub struct Package {
    name: String,
    source: Source,
    files: BTreeMap<String, Vec<u8>>,
}

impl Package {
    /// Open a bundle directory, an archive, or a bare name
    ///
    /// A bare name resolves to `<name>.chlx` first, then the `<name>`
    /// directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let archive = with_bundle_ext(path);
        let package = if path.is_file() {
            Self::from_archive(path)?
        } else if archive.is_file() {
            Self::from_archive(&archive)?
        } else if path.is_dir() {
            Self::from_dir(path)?
        } else {
            return Err(CheckmateError::NotFound(format!(
                "no bundle at {} or {}",
                path.display(),
                archive.display()
            )));
        };

        if package.get(CONFIG_FILE).is_none() {
            return Err(CheckmateError::Schema(format!(
                "{} has no {}",
                path.display(),
                CONFIG_FILE
            )));
        }
        Ok(package)
    }

    /// Read every file of a loose bundle directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut files = BTreeMap::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|e| CheckmateError::Other(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| CheckmateError::Other(e.to_string()))?;
            files.insert(entry_name(relative), fs::read(entry.path())?);
        }
        tracing::debug!(dir = %dir.display(), files = files.len(), "opened bundle directory");
        Ok(Self {
            name: bundle_name(dir),
            source: Source::Directory(dir.to_path_buf()),
            files,
        })
    }

    /// Read every entry of a bundle archive
    pub fn from_archive(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let mut package = Self::from_bytes(bundle_name(path), &data)?;
        package.source = Source::Archive(path.to_path_buf());
        Ok(package)
    }

    /// Unpack an archive held in memory
    pub fn from_bytes(name: impl Into<String>, data: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut files = BTreeMap::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().trim_start_matches("./").to_string();
            let mut content = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut content)?;
            files.insert(name, content);
        }
        Ok(Self {
            name: name.into(),
            source: Source::Memory,
            files,
        })
    }

    /// Build a bundle from in-memory files
    pub fn from_files<I, K, V>(name: impl Into<String>, files: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        Self {
            name: name.into(),
            source: Source::Memory,
            files: files
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Serialize the bundle as zip bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        write_archive(&mut buffer, &self.files)?;
        Ok(buffer.into_inner())
    }
}

impl ResourceLoader for Package {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    fn set(&mut self, name: &str, data: Vec<u8>) -> Result<()> {
        if let Source::Directory(dir) = &self.source {
            let target = dir.join(name);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &data)?;
        }
        self.files.insert(name.to_string(), data);
        Ok(())
    }

    fn names(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }

    fn save_as(&mut self, path: &Path) -> Result<PathBuf> {
        let target = with_bundle_ext(path);
        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        // Written beside the target and renamed, so a failed save leaves the
        // previous archive untouched
        let mut temp = tempfile::NamedTempFile::new_in(&parent)?;
        write_archive(temp.as_file_mut(), &self.files)?;
        temp.as_file_mut().flush()?;
        temp.persist(&target).map_err(|e| CheckmateError::Io(e.error))?;

        tracing::info!(path = %target.display(), files = self.files.len(), "saved bundle");
        self.name = bundle_name(&target);
        self.source = Source::Archive(target.clone());
        Ok(target)
    }

    fn default_archive(&self) -> Option<PathBuf> {
        match &self.source {
            Source::Archive(path) => Some(path.clone()),
            Source::Directory(dir) => Some(with_bundle_ext(dir)),
            Source::Memory => None,
        }
    }
}

fn write_archive<W: Write + std::io::Seek>(writer: W, files: &BTreeMap<String, Vec<u8>>) -> Result<()> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in files {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(data)?;
    }
    zip.finish()?;
    Ok(())
}

/// Append the bundle extension unless already present
pub fn with_bundle_ext(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == BUNDLE_EXT => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".");
            name.push(BUNDLE_EXT);
            PathBuf::from(name)
        }
    }
}

fn bundle_name(path: &Path) -> String {
    let name = match path.extension() {
        Some(ext) if ext == BUNDLE_EXT => path.file_stem(),
        _ => path.file_name(),
    };
    name.map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_string())
}

fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bundle_dir(temp: &TempDir) -> PathBuf {
        let dir = temp.path().join("wind");
        fs::create_dir_all(dir.join("fragments")).unwrap();
        fs::write(dir.join(CONFIG_FILE), r#"{"name": "Wind", "features": []}"#).unwrap();
        fs::write(dir.join("fragments/site.json"), "{}").unwrap();
        dir
    }

    #[test]
    fn test_open_directory_reads_nested_files() {
        let temp = TempDir::new().unwrap();
        let package = Package::open(bundle_dir(&temp)).unwrap();
        assert_eq!(package.name(), "wind");
        assert_eq!(package.names(), vec!["config.json", "fragments/site.json"]);
        assert_eq!(package.get("fragments/site.json"), Some(&b"{}"[..]));
    }

    #[test]
    fn test_directory_set_writes_through() {
        let temp = TempDir::new().unwrap();
        let dir = bundle_dir(&temp);
        let mut package = Package::open(&dir).unwrap();
        package.set(DATA_FILE, b"{}".to_vec()).unwrap();
        assert_eq!(fs::read(dir.join(DATA_FILE)).unwrap(), b"{}");
    }

    #[test]
    fn test_pack_and_reopen_by_name() {
        let temp = TempDir::new().unwrap();
        let dir = bundle_dir(&temp);
        let mut package = Package::open(&dir).unwrap();
        let target = package.save_as(&temp.path().join("packed")).unwrap();
        assert_eq!(target, temp.path().join("packed.chlx"));
        assert_eq!(package.source(), &Source::Archive(target.clone()));

        let reopened = Package::open(temp.path().join("packed")).unwrap();
        assert_eq!(reopened.name(), "packed");
        assert_eq!(reopened.names(), package.names());
        assert_eq!(reopened.get(CONFIG_FILE), package.get(CONFIG_FILE));
    }

    #[test]
    fn test_bundle_without_config_is_schema_error() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("empty");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("readme.md"), "x").unwrap();
        assert!(matches!(Package::open(&dir), Err(CheckmateError::Schema(_))));
    }

    #[test]
    fn test_missing_bundle_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = Package::open(temp.path().join("nothing")).unwrap_err();
        assert!(matches!(err, CheckmateError::NotFound(_)));
    }

    #[test]
    fn test_memory_bundle_round_trips_through_bytes() {
        let package = Package::from_files("mem", [(CONFIG_FILE, "{}"), ("a/b.txt", "hi")]);
        let bytes = package.to_bytes().unwrap();
        let unpacked = Package::from_bytes("mem", &bytes).unwrap();
        assert_eq!(unpacked.get("a/b.txt"), Some(&b"hi"[..]));
        assert_eq!(unpacked.default_archive(), None);
    }

    #[test]
    fn test_bundle_ext_is_appended_once() {
        assert_eq!(with_bundle_ext(Path::new("a/b")), PathBuf::from("a/b.chlx"));
        assert_eq!(with_bundle_ext(Path::new("a/b.chlx")), PathBuf::from("a/b.chlx"));
    }
}
