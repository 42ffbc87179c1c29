//! Instance discovery for zip archives, directories, and loose files.
//!
//! Enumerates instance files whose basename matches the configured pattern
//! and reads each one on demand, so a single requested instance never
//! pulls the rest of an archive into memory.

use crate::error::{ConvertError, Result};
use crate::models::{RawBlob, instance_name_for};
use regex::Regex;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use zip::ZipArchive;

/// Kind of input an instance reference points into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Archive,
    Directory,
    File,
}

/// A resolvable reference to one instance file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRef {
    /// Entry `index` of the zip archive at `archive`
    ArchiveEntry {
        archive: PathBuf,
        index: usize,
        name: String,
    },
    /// Loose file on disk
    File(PathBuf),
}

impl EntryRef {
    /// Name the raw blob carries; the instance name is derived from it
    pub fn source_name(&self) -> String {
        match self {
            EntryRef::ArchiveEntry { name, .. } => name.clone(),
            EntryRef::File(path) => path.to_string_lossy().into_owned(),
        }
    }

    /// Output identifier the entry's artifacts will be written under
    pub fn instance_name(&self) -> String {
        instance_name_for(&self.source_name())
    }

    /// Read this entry as text, rejecting anything above `max_bytes`
    pub fn load(&self, max_bytes: u64) -> Result<RawBlob> {
        match self {
            EntryRef::ArchiveEntry {
                archive,
                index,
                name,
            } => {
                let mut zip = open_archive(archive)?;
                let entry = zip.by_index(*index).map_err(|e| {
                    ConvertError::archive(archive, format!("cannot open entry '{}': {}", name, e))
                })?;
                let declared = entry.size();
                if declared > max_bytes {
                    return Err(ConvertError::archive(
                        archive,
                        format!(
                            "entry '{}' is {} bytes, above the {} byte limit",
                            name, declared, max_bytes
                        ),
                    ));
                }
                let text = read_bounded(entry, max_bytes).map_err(|reason| {
                    ConvertError::archive(archive, format!("entry '{}': {}", name, reason))
                })?;
                Ok(RawBlob::new(name.clone(), &text))
            }
            EntryRef::File(path) => {
                let file = File::open(path)
                    .map_err(|e| ConvertError::archive(path, format!("cannot open file: {}", e)))?;
                let text = read_bounded(BufReader::new(file), max_bytes)
                    .map_err(|reason| ConvertError::archive(path, reason))?;
                Ok(RawBlob::new(path.to_string_lossy(), &text))
            }
        }
    }
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryRef::ArchiveEntry { archive, name, .. } => {
                write!(f, "{}!{}", archive.display(), name)
            }
            EntryRef::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Matching instance files inside one input path
#[derive(Debug)]
pub struct InstanceSource {
    path: PathBuf,
    kind: SourceKind,
    entries: Vec<EntryRef>,
    max_entry_bytes: u64,
}

impl InstanceSource {
    /// Resolve an input path into its matching entries.
    ///
    /// A directory is walked recursively; any other file is opened as a zip
    /// archive unless its own basename matches the pattern, in which case it
    /// is taken as a single loose instance file.
    pub fn open(path: &Path, pattern: &Regex, max_entry_bytes: u64) -> Result<Self> {
        if !path.exists() {
            return Err(ConvertError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let (kind, entries) = if path.is_dir() {
            (SourceKind::Directory, discover_directory(path, pattern)?)
        } else if basename_matches(path, pattern) {
            (SourceKind::File, vec![EntryRef::File(path.to_path_buf())])
        } else {
            (SourceKind::Archive, discover_archive(path, pattern)?)
        };

        if entries.is_empty() {
            return Err(ConvertError::EmptyInput {
                path: path.to_path_buf(),
                pattern: pattern_source(pattern),
            });
        }

        debug!(
            "Resolved {} matching instance(s) in {} ({:?})",
            entries.len(),
            path.display(),
            kind
        );

        Ok(Self {
            path: path.to_path_buf(),
            kind,
            entries,
            max_entry_bytes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn entries(&self) -> &[EntryRef] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<EntryRef> {
        self.entries
    }

    /// Lazily read the matching entries one at a time
    pub fn blobs(&self) -> impl Iterator<Item = Result<RawBlob>> + '_ {
        self.entries
            .iter()
            .map(move |entry| entry.load(self.max_entry_bytes))
    }
}

/// Read the first matching instance of `path` without touching the others
pub fn resolve_first(path: &Path, pattern: &Regex, max_entry_bytes: u64) -> Result<RawBlob> {
    let source = InstanceSource::open(path, pattern, max_entry_bytes)?;
    match source.blobs().next() {
        Some(blob) => blob,
        None => Err(ConvertError::EmptyInput {
            path: path.to_path_buf(),
            pattern: pattern_source(pattern),
        }),
    }
}

fn discover_directory(dir: &Path, pattern: &Regex) -> Result<Vec<EntryRef>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry
            .map_err(|e| ConvertError::archive(dir, format!("cannot walk directory: {}", e)))?;
        if entry.file_type().is_file() && basename_matches(entry.path(), pattern) {
            files.push(EntryRef::File(entry.path().to_path_buf()));
        }
    }

    Ok(files)
}

fn discover_archive(path: &Path, pattern: &Regex) -> Result<Vec<EntryRef>> {
    let mut zip = open_archive(path)?;
    let mut entries = Vec::new();

    for index in 0..zip.len() {
        let entry = zip.by_index_raw(index).map_err(|e| {
            ConvertError::archive(path, format!("cannot read entry {}: {}", index, e))
        })?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let base = name.rsplit(['/', '\\']).next().unwrap_or(&name);
        if pattern.is_match(base) {
            entries.push(EntryRef::ArchiveEntry {
                archive: path.to_path_buf(),
                index,
                name,
            });
        }
    }

    // Central directory order is arbitrary; sort by name for stable batches
    entries.sort_by(|a, b| a.source_name().cmp(&b.source_name()));
    Ok(entries)
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path)
        .map_err(|e| ConvertError::archive(path, format!("cannot open archive: {}", e)))?;
    ZipArchive::new(BufReader::new(file))
        .map_err(|e| ConvertError::archive(path, format!("not a readable zip archive: {}", e)))
}

/// Read at most `max_bytes` and decode as UTF-8
fn read_bounded(reader: impl Read, max_bytes: u64) -> std::result::Result<String, String> {
    let mut bytes = Vec::new();
    reader
        .take(max_bytes + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| format!("read failed: {}", e))?;

    if bytes.len() as u64 > max_bytes {
        return Err(format!("content exceeds the {} byte limit", max_bytes));
    }

    String::from_utf8(bytes).map_err(|e| format!("content is not valid UTF-8: {}", e))
}

fn basename_matches(path: &Path, pattern: &Regex) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| pattern.is_match(name))
}

/// Pattern as the user wrote it, without the anchoring wrapper
fn pattern_source(pattern: &Regex) -> String {
    let source = pattern.as_str();
    source
        .strip_prefix("^(?:")
        .and_then(|s| s.strip_suffix(")$"))
        .unwrap_or(source)
        .to_string()
}
