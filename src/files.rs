//! File organizer
//!
//! Sorts a directory into category folders, removes content-identical
//! duplicates, finds duplicates recursively and searches by name or
//! content. Every operation is confined to the configured allow-list,
//! which is checked before the directory is touched.
//!
//! Operations are synchronous; async callers run them on the blocking pool.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::FileSettings;
use crate::error::{Error, Result};

const HASH_CHUNK: usize = 4096;

/// Extension table, checked in order
const CATEGORIES: &[(&str, &[&str])] = &[
    ("documents", &["pdf", "doc", "docx", "txt", "rtf", "odt"]),
    ("images", &["jpg", "jpeg", "png", "gif", "bmp", "svg", "tiff"]),
    ("videos", &["mp4", "avi", "mov", "wmv", "flv", "mkv", "webm"]),
    ("audio", &["mp3", "wav", "flac", "aac", "ogg", "wma"]),
    ("archives", &["zip", "rar", "7z", "tar", "gz", "bz2"]),
    ("code", &["py", "js", "html", "css", "cpp", "java", "cs", "php"]),
    ("spreadsheets", &["xls", "xlsx", "csv", "ods"]),
    ("presentations", &["ppt", "pptx", "odp"]),
];

const OTHER: &str = "other";

/// Extensions whose content is searched as text
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "log", "json", "yaml", "yml", "toml", "xml", "html", "htm", "css", "js",
    "py", "rs", "ini", "cfg", "conf", "sh",
];

// ─────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────

/// Outcome of organizing one directory
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrganizeReport {
    pub directory: PathBuf,
    /// Destination paths per category
    pub organized_files: BTreeMap<String, Vec<String>>,
    pub removed_duplicates: Vec<String>,
    pub total_files: usize,
    /// Per-file failures; none of them abort the pass
    pub errors: Vec<String>,
    pub backup_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateReport {
    pub directory: PathBuf,
    pub duplicate_groups: usize,
    pub total_duplicates: usize,
    /// Content hash to the paths sharing it
    pub duplicates: BTreeMap<String, Vec<PathBuf>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Filename,
    Content,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub match_type: MatchType,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub pattern: String,
    pub count: usize,
    pub matches: Vec<SearchMatch>,
}

/// `{success, error?, timestamp, ...data}` rendering of a file operation
#[derive(Debug, Clone, Serialize)]
pub struct FileOpResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T> From<Result<T>> for FileOpResult<T> {
    fn from(result: Result<T>) -> Self {
        let (success, error, data) = match result {
            Ok(data) => (true, None, Some(data)),
            Err(e) => (false, Some(e.to_string()), None),
        };
        Self {
            success,
            error,
            timestamp: Utc::now(),
            data,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// File Organizer
// ─────────────────────────────────────────────────────────────────

pub struct FileOrganizer {
    enabled: bool,
    allowed_roots: Vec<PathBuf>,
    duplicate_check: bool,
    backup_before_organize: bool,
}

impl FileOrganizer {
    pub fn new(settings: &FileSettings) -> Self {
        Self {
            enabled: settings.allow_file_operations,
            allowed_roots: settings.allowed_directories.iter().map(PathBuf::from).collect(),
            duplicate_check: settings.duplicate_check_enabled,
            backup_before_organize: settings.backup_before_organize,
        }
    }

    /// Whether `dir` lies within an allowed root
    pub fn is_allowed(&self, dir: &Path) -> bool {
        if !self.enabled {
            return false;
        }
        let dir = resolve(dir);
        self.allowed_roots
            .iter()
            .any(|root| dir.starts_with(resolve(root)))
    }

    /// Allow-list first, then existence
    fn check_directory(&self, dir: &Path) -> Result<PathBuf> {
        if !self.enabled {
            return Err(Error::FileOperationsDisabled);
        }
        if !self.is_allowed(dir) {
            return Err(Error::DirectoryNotAllowed {
                path: dir.to_path_buf(),
            });
        }
        if !dir.is_dir() {
            return Err(Error::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }
        Ok(resolve(dir))
    }

    /// Sort the files directly inside `dir` by category
    pub fn organize(&self, dir: &Path, create_subdirs: bool) -> Result<OrganizeReport> {
        let dir = self.check_directory(dir)?;
        info!(directory = %dir.display(), create_subdirs, "Organizing directory");

        let mut report = OrganizeReport {
            directory: dir.clone(),
            ..Default::default()
        };

        if self.backup_before_organize {
            report.backup_path = Some(create_backup(&dir)?);
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(|e| Error::IoRead {
                path: dir.clone(),
                source: e,
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        // Hashes of files kept during this pass
        let mut retained: HashMap<String, PathBuf> = HashMap::new();

        for path in files {
            let name = file_name(&path);
            match self.organize_file(&dir, &path, create_subdirs, &mut retained) {
                Ok(Placement::Moved { category, target }) => {
                    report
                        .organized_files
                        .entry(category.to_string())
                        .or_default()
                        .push(target.display().to_string());
                    report.total_files += 1;
                }
                Ok(Placement::Duplicate { of }) => {
                    debug!(file = %name, original = %of.display(), "Removed duplicate");
                    report.removed_duplicates.push(format!("Removed duplicate: {}", name));
                    report.total_files += 1;
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "Failed to organize file");
                    report.errors.push(format!("Error processing {}: {}", name, e));
                }
            }
        }

        info!(
            directory = %dir.display(),
            files = report.total_files,
            duplicates = report.removed_duplicates.len(),
            errors = report.errors.len(),
            "Directory organized"
        );
        Ok(report)
    }

    fn organize_file(
        &self,
        dir: &Path,
        path: &Path,
        create_subdirs: bool,
        retained: &mut HashMap<String, PathBuf>,
    ) -> Result<Placement> {
        let category = category_for(path);
        let name = file_name(path);

        let hash = if self.duplicate_check {
            let hash = file_hash(path)?;
            if let Some(original) = retained.get(&hash) {
                let original = original.clone();
                remove(path)?;
                return Ok(Placement::Duplicate { of: original });
            }
            Some(hash)
        } else {
            None
        };

        let mut target = if create_subdirs {
            let target_dir = dir.join(category);
            fs::create_dir_all(&target_dir).map_err(|e| Error::IoWrite {
                path: target_dir.clone(),
                source: e,
            })?;
            target_dir.join(&name)
        } else {
            dir.join(format!("{}_{}", category, name))
        };

        if target.exists() {
            if self.duplicate_check && files_identical(path, &target)? {
                remove(path)?;
                return Ok(Placement::Duplicate { of: target });
            }
            target = next_free_name(&target);
        }

        fs::rename(path, &target)
            .map_err(|e| Error::file_operation(path, format!("move to {} failed: {}", target.display(), e)))?;

        if let Some(hash) = hash {
            retained.insert(hash, target.clone());
        }

        Ok(Placement::Moved { category, target })
    }

    /// Recursively group files by content hash
    pub fn find_duplicates(&self, dir: &Path) -> Result<DuplicateReport> {
        let dir = self.check_directory(dir)?;
        info!(directory = %dir.display(), "Scanning for duplicates");

        let mut by_hash: HashMap<String, Vec<PathBuf>> = HashMap::new();
        for entry in WalkDir::new(&dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            match file_hash(entry.path()) {
                Ok(hash) => by_hash.entry(hash).or_default().push(entry.into_path()),
                Err(e) => debug!(error = %e, "Skipping unreadable file"),
            }
        }

        let duplicates: BTreeMap<String, Vec<PathBuf>> =
            by_hash.into_iter().filter(|(_, paths)| paths.len() > 1).collect();
        let total_duplicates = duplicates.values().map(|paths| paths.len() - 1).sum();

        Ok(DuplicateReport {
            directory: dir,
            duplicate_groups: duplicates.len(),
            total_duplicates,
            duplicates,
        })
    }

    /// Case-insensitive name search, optionally into text file contents
    pub fn search(&self, dir: &Path, pattern: &str, include_content: bool) -> Result<SearchReport> {
        let dir = self.check_directory(dir)?;
        let needle = pattern.to_lowercase();

        let mut matches = Vec::new();
        for entry in WalkDir::new(&dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let name = file_name(path);

            let match_type = if name.to_lowercase().contains(&needle) {
                Some(MatchType::Filename)
            } else if include_content && is_text_file(path) && content_contains(path, &needle) {
                Some(MatchType::Content)
            } else {
                None
            };

            if let Some(match_type) = match_type {
                let meta = entry.metadata().ok();
                matches.push(SearchMatch {
                    path: path.to_path_buf(),
                    name,
                    size: meta.as_ref().map(|m| m.len()).unwrap_or(0),
                    modified: meta
                        .and_then(|m| m.modified().ok())
                        .map(DateTime::<Utc>::from),
                    match_type,
                });
            }
        }

        debug!(pattern, count = matches.len(), "File search completed");
        Ok(SearchReport {
            pattern: pattern.to_string(),
            count: matches.len(),
            matches,
        })
    }
}

enum Placement {
    Moved { category: &'static str, target: PathBuf },
    Duplicate { of: PathBuf },
}

// ─────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────

pub fn category_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return OTHER;
    };
    let ext = ext.to_lowercase();
    CATEGORIES
        .iter()
        .find(|(_, exts)| exts.contains(&ext.as_str()))
        .map(|(category, _)| *category)
        .unwrap_or(OTHER)
}

/// SHA-256 of the file content, hex encoded
pub fn file_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::IoRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_CHUNK];
    loop {
        let n = file.read(&mut buf).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn files_identical(a: &Path, b: &Path) -> Result<bool> {
    let size = |p: &Path| {
        fs::metadata(p).map(|m| m.len()).map_err(|e| Error::IoRead {
            path: p.to_path_buf(),
            source: e,
        })
    };
    if size(a)? != size(b)? {
        return Ok(false);
    }
    Ok(file_hash(a)? == file_hash(b)?)
}

/// `{stem}_{n}{.ext}` for the first n not already taken
fn next_free_name(target: &Path) -> PathBuf {
    let parent = target.parent().unwrap_or(Path::new("."));
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = target
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..)
        .map(|n| parent.join(format!("{}_{}{}", stem, n, ext)))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| target.to_path_buf())
}

fn create_backup(dir: &Path) -> Result<PathBuf> {
    let parent = dir.parent().unwrap_or(Path::new("."));
    let backup = parent.join(format!(
        "{}_backup_{}",
        file_name(dir),
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));

    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| Error::file_operation(dir, e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| Error::file_operation(entry.path(), e.to_string()))?;
        let dest = backup.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| Error::IoWrite {
                path: dest.clone(),
                source: e,
            })?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &dest).map_err(|e| Error::IoWrite {
                path: dest.clone(),
                source: e,
            })?;
        }
    }

    info!(backup = %backup.display(), "Backup created");
    Ok(backup)
}

fn remove(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| Error::file_operation(path, format!("remove failed: {}", e)))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn content_contains(path: &Path, needle: &str) -> bool {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).to_lowercase().contains(needle))
        .unwrap_or(false)
}

/// Canonical path when it exists, lexically normalized absolute path otherwise
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
