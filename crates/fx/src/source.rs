//! Locating technique files.
//!
//! Types:
//!
//! - `SourceProvider` abstracts where technique text comes from.
//! - `TechniqueLibrary` scans a directory tree for `.omwfx` files keyed by stem.
//! - `MemorySource` serves techniques from memory with synthetic timestamps.
//!
//! Functions:
//!
//! - `TechniqueLibrary::scan` walks the tree once; `rescan` refreshes it.
//! - `technique_file_name` yields the conventional relative path of a technique.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const SHADER_SUBDIR: &str = "shaders";
pub const SHADER_EXTENSION: &str = "omwfx";

pub fn technique_file_name(name: &str) -> String {
    format!("{SHADER_SUBDIR}/{name}.{SHADER_EXTENSION}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechniqueFile {
    pub path: PathBuf,
    pub contents: String,
    pub modified: Option<SystemTime>,
}

pub trait SourceProvider {
    /// Reads a technique by name, or `None` when it does not exist.
    fn load(&self, name: &str) -> Option<TechniqueFile>;

    fn modified(&self, name: &str) -> Option<SystemTime>;

    /// All technique names known to the provider, sorted.
    fn names(&self) -> Vec<String>;

    fn contains(&self, name: &str) -> bool {
        self.names().iter().any(|known| known == name)
    }
}

#[derive(Debug, Clone)]
pub struct TechniqueLibrary {
    root: PathBuf,
    files: BTreeMap<String, PathBuf>,
}

impl TechniqueLibrary {
    /// Recursively indexes `root`. A missing directory yields an empty
    /// library.
    pub fn scan(root: impl Into<PathBuf>) -> io::Result<Self> {
        let mut library = Self {
            root: root.into(),
            files: BTreeMap::new(),
        };
        library.rescan()?;
        Ok(library)
    }

    pub fn rescan(&mut self) -> io::Result<()> {
        self.files.clear();
        if !self.root.is_dir() {
            tracing::warn!(root = %self.root.display(), "technique directory does not exist");
            return Ok(());
        }
        let root = self.root.clone();
        self.walk(&root)?;
        tracing::debug!(
            root = %self.root.display(),
            techniques = self.files.len(),
            "indexed technique files"
        );
        Ok(())
    }

    fn walk(&mut self, dir: &Path) -> io::Result<()> {
        let mut entries = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .collect::<Vec<_>>();
        entries.sort();

        for path in entries {
            if path.is_dir() {
                self.walk(&path)?;
                continue;
            }
            let is_technique = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(SHADER_EXTENSION));
            if !is_technique {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(existing) = self.files.get(stem) {
                tracing::warn!(
                    technique = stem,
                    kept = %existing.display(),
                    ignored = %path.display(),
                    "duplicate technique name"
                );
                continue;
            }
            self.files.insert(stem.to_owned(), path.clone());
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl SourceProvider for TechniqueLibrary {
    fn load(&self, name: &str) -> Option<TechniqueFile> {
        let path = self.files.get(name)?;
        match fs::read_to_string(path) {
            Ok(contents) => Some(TechniqueFile {
                path: path.clone(),
                contents,
                modified: fs::metadata(path).and_then(|m| m.modified()).ok(),
            }),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "failed to read technique file");
                None
            }
        }
    }

    fn modified(&self, name: &str) -> Option<SystemTime> {
        let path = self.files.get(name)?;
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    fn names(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

/// In-memory provider; every write advances the file's timestamp.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<String, (String, SystemTime)>,
    clock: u64,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, contents: impl Into<String>) {
        let stamp = self.tick();
        self.files.insert(name.to_owned(), (contents.into(), stamp));
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.files.remove(name).is_some()
    }

    /// Bumps the timestamp without changing the contents.
    pub fn touch(&mut self, name: &str) {
        let stamp = self.tick();
        if let Some(entry) = self.files.get_mut(name) {
            entry.1 = stamp;
        }
    }

    fn tick(&mut self) -> SystemTime {
        self.clock += 1;
        SystemTime::UNIX_EPOCH + Duration::from_secs(self.clock)
    }
}

impl SourceProvider for MemorySource {
    fn load(&self, name: &str) -> Option<TechniqueFile> {
        let (contents, modified) = self.files.get(name)?;
        Some(TechniqueFile {
            path: PathBuf::from(technique_file_name(name)),
            contents: contents.clone(),
            modified: Some(*modified),
        })
    }

    fn modified(&self, name: &str) -> Option<SystemTime> {
        self.files.get(name).map(|(_, modified)| *modified)
    }

    fn names(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_indexes_nested_files_by_stem() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("extra");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("bloom.omwfx"), "technique {}").unwrap();
        fs::write(nested.join("vignette.omwfx"), "technique {}").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let library = TechniqueLibrary::scan(dir.path()).expect("scan");
        assert_eq!(library.names(), vec!["bloom", "vignette"]);
        assert!(library.contains("vignette"));
        let file = library.load("bloom").expect("load bloom");
        assert_eq!(file.contents, "technique {}");
        assert!(file.modified.is_some());
    }

    #[test]
    fn first_duplicate_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("a.omwfx"), "first").unwrap();
        fs::write(nested.join("a.omwfx"), "second").unwrap();

        let library = TechniqueLibrary::scan(dir.path()).unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(library.load("a").unwrap().contents, "first");
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = TechniqueLibrary::scan(dir.path().join("nope")).unwrap();
        assert!(library.is_empty());
        assert!(library.load("anything").is_none());
    }

    #[test]
    fn memory_source_advances_timestamps() {
        let mut source = MemorySource::new();
        source.insert("fog", "a");
        let first = source.modified("fog");
        source.touch("fog");
        assert!(source.modified("fog") > first);
        assert_eq!(
            source.load("fog").unwrap().path,
            PathBuf::from("shaders/fog.omwfx")
        );
    }
}
