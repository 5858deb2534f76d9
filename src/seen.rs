use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;

/// Set of event ids that have already been announced. Never shrinks.
pub trait SeenStore: Send {
    fn contains(&self, video_id: &str) -> bool;

    /// Record `video_id`. Returns `false` when it was already present.
    fn insert(&mut self, video_id: &str) -> Result<bool>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-lifetime store. Forgotten on restart.
#[derive(Debug, Default)]
pub struct MemorySeenSet {
    ids: HashSet<String>,
}

impl MemorySeenSet {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SeenStore for MemorySeenSet {
    fn contains(&self, video_id: &str) -> bool {
        self.ids.contains(video_id)
    }

    fn insert(&mut self, video_id: &str) -> Result<bool> {
        Ok(self.ids.insert(video_id.to_string()))
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SeenLine {
    video_id: String,
    seen_at: String,
}

/// Append-only JSON-lines file, one record per announced id.
///
/// The whole file is loaded at open; each insert appends and flushes one line
/// before returning.
pub struct FileSeenStore {
    path: PathBuf,
    ids: HashSet<String>,
    file: File,
}

impl FileSeenStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut ids = HashSet::new();
        let mut torn_tail = false;

        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            torn_tail = !contents.is_empty() && !contents.ends_with('\n');
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                // A torn final write leaves a partial line; skip it.
                match serde_json::from_str::<SeenLine>(line) {
                    Ok(entry) => {
                        ids.insert(entry.video_id);
                    }
                    Err(e) => debug!("ignoring unreadable seen-store line: {e}"),
                }
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        // Terminate the partial line so the next record starts on its own.
        if torn_tail {
            file.write_all(b"\n")?;
            file.flush()?;
        }
        info!("Loaded {} seen id(s) from {}", ids.len(), path.display());
        Ok(Self { path, ids, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SeenStore for FileSeenStore {
    fn contains(&self, video_id: &str) -> bool {
        self.ids.contains(video_id)
    }

    fn insert(&mut self, video_id: &str) -> Result<bool> {
        if self.ids.contains(video_id) {
            return Ok(false);
        }
        let entry = SeenLine {
            video_id: video_id.to_string(),
            seen_at: Utc::now().to_rfc3339(),
        };
        let mut line = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.ids.insert(entry.video_id);
        Ok(true)
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Either store, picked at startup from config.
pub enum AnySeenStore {
    Memory(MemorySeenSet),
    File(FileSeenStore),
}

impl AnySeenStore {
    pub fn from_path(path: Option<&Path>) -> Result<Self> {
        Ok(match path {
            Some(p) => Self::File(FileSeenStore::open(p)?),
            None => Self::Memory(MemorySeenSet::new()),
        })
    }
}

impl SeenStore for AnySeenStore {
    fn contains(&self, video_id: &str) -> bool {
        match self {
            Self::Memory(s) => s.contains(video_id),
            Self::File(s) => s.contains(video_id),
        }
    }

    fn insert(&mut self, video_id: &str) -> Result<bool> {
        match self {
            Self::Memory(s) => s.insert(video_id),
            Self::File(s) => s.insert(video_id),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Memory(s) => s.len(),
            Self::File(s) => s.len(),
        }
    }
}
