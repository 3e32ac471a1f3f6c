// ABOUTME: Persisted per-page sync records, read at start and written at end
// ABOUTME: File-backed store writes atomically; memory store keeps tests off disk

use crate::detect::{ChangeEntry, ChangeKind, ChangeSet};
use crate::storage::{write_atomic, PENDING_FILE_NAME};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

pub const STATE_VERSION: u32 = 1;

/// What a page looked like the last time it was synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Fingerprint {
    LastEdited(DateTime<Utc>),
    ContentHash(String),
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fingerprint::LastEdited(ts) => write!(f, "edited {}", ts.to_rfc3339()),
            Fingerprint::ContentHash(hash) => write!(f, "sha256 {}", &hash[..hash.len().min(12)]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Media key (URL without query string).
    pub source: String,
    /// File name inside the page's `images/` directory.
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub title: String,
    pub fingerprint: Fingerprint,
    /// Directory relative to the output root.
    pub output_dir: String,
    #[serde(default)]
    pub assets: Vec<AssetRecord>,
    /// Media keys whose download failed and should be retried.
    #[serde(default)]
    pub pending_assets: Vec<String>,
    pub synced_at: DateTime<Utc>,
}

impl SyncRecord {
    pub fn asset(&self, source: &str) -> Option<&AssetRecord> {
        self.assets.iter().find(|a| a.source == source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub version: u32,
    #[serde(default)]
    pub root_page_id: Option<String>,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pages: BTreeMap<String, SyncRecord>,
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState {
            version: STATE_VERSION,
            root_page_id: None,
            last_run: None,
            pages: BTreeMap::new(),
        }
    }
}

impl SyncState {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Structural checks beyond what serde enforces.
    fn validate(&self) -> std::result::Result<(), String> {
        if self.version != STATE_VERSION {
            return Err(format!(
                "unsupported state version {} (expected {})",
                self.version, STATE_VERSION
            ));
        }
        for (id, record) in &self.pages {
            if !is_relative(&record.output_dir) {
                return Err(format!(
                    "page {} has invalid output directory {:?}",
                    id, record.output_dir
                ));
            }
            for asset in &record.assets {
                if !is_file_name(&asset.file) {
                    return Err(format!(
                        "page {} has invalid asset file {:?}",
                        id, asset.file
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Non-empty path made only of normal components.
fn is_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Exactly one normal component: a bare file name.
fn is_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Pages written by a run whose commit never landed. Kept outside the state
/// file, which is itself committed, and folded into the next run's commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCommit {
    #[serde(default)]
    pub first_sync: bool,
    #[serde(default)]
    pub entries: Vec<ChangeEntry>,
    /// Paths relative to the output root.
    #[serde(default)]
    pub paths: Vec<String>,
}

impl PendingCommit {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.paths.is_empty()
    }

    /// Merge the pages `changes` wrote and the paths they touched. A later
    /// entry for the same page replaces the earlier one.
    pub fn absorb(&mut self, changes: &ChangeSet, touched: &[PathBuf], root: &Path) {
        if self.entries.is_empty() {
            self.first_sync = changes.first_sync;
        }
        for entry in changes.pending() {
            match self.entries.iter_mut().find(|e| e.page_id == entry.page_id) {
                Some(existing) => {
                    // A page first added in the uncommitted run is still new.
                    let kind = match existing.kind {
                        ChangeKind::New => ChangeKind::New,
                        _ => entry.kind,
                    };
                    *existing = ChangeEntry {
                        kind,
                        ..entry.clone()
                    };
                }
                None => self.entries.push(entry.clone()),
            }
        }
        for path in touched {
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let rel = rel.to_string_lossy().into_owned();
            if is_relative(&rel) && !self.paths.contains(&rel) {
                self.paths.push(rel);
            }
        }
    }

    pub fn changes(&self) -> ChangeSet {
        ChangeSet {
            entries: self.entries.clone(),
            first_sync: self.first_sync,
        }
    }

    pub fn absolute_paths(&self, root: &Path) -> Vec<PathBuf> {
        self.paths.iter().map(|p| root.join(p)).collect()
    }

    fn validate(&self) -> std::result::Result<(), String> {
        match self.paths.iter().find(|p| !is_relative(p)) {
            Some(bad) => Err(format!("pending commit names invalid path {:?}", bad)),
            None => Ok(()),
        }
    }
}

/// Durable home of the sync state and of any commit still owed from an
/// earlier run. `clear` removes both.
pub trait StateStore {
    fn load(&self) -> Result<SyncState>;
    fn save(&self, state: &SyncState) -> Result<()>;
    fn clear(&self) -> Result<()>;

    fn load_pending(&self) -> Result<Option<PendingCommit>>;
    fn save_pending(&self, pending: &PendingCommit) -> Result<()>;
    fn clear_pending(&self) -> Result<()>;
}

pub struct FileStateStore {
    path: PathBuf,
    pending_path: PathBuf,
    tmp_dir: PathBuf,
}

impl FileStateStore {
    pub fn new(path: PathBuf, tmp_dir: PathBuf) -> Self {
        FileStateStore {
            pending_path: path.with_file_name(PENDING_FILE_NAME),
            path,
            tmp_dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pending_path(&self) -> &Path {
        &self.pending_path
    }

    fn corrupt(&self, path: &Path, message: impl Into<String>) -> Error {
        Error::StateCorruption {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        fs::create_dir_all(&self.tmp_dir)?;
        let mut json = serde_json::to_string_pretty(value)?;
        json.push('\n');
        write_atomic(path, json.as_bytes(), &self.tmp_dir)
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<SyncState> {
        if !self.path.exists() {
            return Ok(SyncState::default());
        }
        let path = &self.path;
        let content = fs::read_to_string(path).map_err(|e| self.corrupt(path, e.to_string()))?;
        let state: SyncState =
            serde_json::from_str(&content).map_err(|e| self.corrupt(path, e.to_string()))?;
        state.validate().map_err(|m| self.corrupt(path, m))?;
        Ok(state)
    }

    fn save(&self, state: &SyncState) -> Result<()> {
        self.write_json(&self.path, state)
    }

    fn clear(&self) -> Result<()> {
        remove_if_exists(&self.path)?;
        self.clear_pending()
    }

    fn load_pending(&self) -> Result<Option<PendingCommit>> {
        let path = &self.pending_path;
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.corrupt(path, e.to_string())),
        };
        let pending: PendingCommit =
            serde_json::from_str(&content).map_err(|e| self.corrupt(path, e.to_string()))?;
        pending.validate().map_err(|m| self.corrupt(path, m))?;
        Ok(Some(pending))
    }

    fn save_pending(&self, pending: &PendingCommit) -> Result<()> {
        self.write_json(&self.pending_path, pending)
    }

    fn clear_pending(&self) -> Result<()> {
        remove_if_exists(&self.pending_path)
    }
}

/// In-memory store for tests and embedding.
#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<SyncState>>,
    pending: Mutex<Option<PendingCommit>>,
    saves: Mutex<usize>,
}

impl MemoryStateStore {
    pub fn with_state(state: SyncState) -> Self {
        MemoryStateStore {
            state: Mutex::new(Some(state)),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> Option<SyncState> {
        self.state.lock().ok().and_then(|s| s.clone())
    }

    pub fn pending(&self) -> Option<PendingCommit> {
        self.pending.lock().ok().and_then(|p| p.clone())
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<SyncState> {
        Ok(self.snapshot().unwrap_or_default())
    }

    fn save(&self, state: &SyncState) -> Result<()> {
        if let Ok(mut slot) = self.state.lock() {
            *slot = Some(state.clone());
        }
        if let Ok(mut n) = self.saves.lock() {
            *n += 1;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if let Ok(mut slot) = self.state.lock() {
            *slot = None;
        }
        self.clear_pending()
    }

    fn load_pending(&self) -> Result<Option<PendingCommit>> {
        Ok(self.pending())
    }

    fn save_pending(&self, pending: &PendingCommit) -> Result<()> {
        if let Ok(mut slot) = self.pending.lock() {
            *slot = Some(pending.clone());
        }
        Ok(())
    }

    fn clear_pending(&self) -> Result<()> {
        if let Ok(mut slot) = self.pending.lock() {
            *slot = None;
        }
        Ok(())
    }
}
