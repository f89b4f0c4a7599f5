//! Write-through note store backed by a single JSON file.
//!
//! The whole collection is held in memory behind a `Mutex` and re-serialized
//! to disk on every mutation. A mutation is applied to a copy, the copy is
//! persisted, and only then does it replace the in-memory collection, so a
//! failed write leaves both memory and disk at the previous state.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use snapnote_core::error::{Result, SnapnoteError};
use snapnote_core::types::{NewNote, Note, NoteId, NoteUpdate};

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct NoteFileRef<'a> {
    version: u32,
    notes: &'a [Note],
}

#[derive(Deserialize)]
struct NoteFile {
    #[allow(dead_code)]
    version: u32,
    notes: Vec<Note>,
}

/// Accepted on-disk layouts: the versioned envelope, or a bare array of notes.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredLayout {
    Versioned(NoteFile),
    Bare(Vec<Note>),
}

/// Durable keyed collection of notes.
///
/// The in-memory vector keeps insertion order with the most recently added
/// note at index 0. [`NoteStore::list`] sorts newest-first by timestamp.
pub struct NoteStore {
    path: PathBuf,
    notes: Mutex<Vec<Note>>,
}

impl NoteStore {
    /// Open the store at `path`, loading any existing collection.
    ///
    /// A missing file yields an empty store. A malformed file is moved aside
    /// to `<path>.corrupt` and the store starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let notes = load_collection(&path);
        info!(path = %path.display(), count = notes.len(), "Note store opened");
        Self {
            path,
            notes: Mutex::new(notes),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a note with a fresh id and persist it before returning.
    pub fn add(&self, new_note: NewNote) -> Result<Note> {
        self.mutate(|notes| {
            let mut id = NoteId::generate();
            while notes.iter().any(|n| n.id == id) {
                id = NoteId::generate();
            }
            let note = new_note.into_note(id);
            notes.insert(0, note.clone());
            Ok(note)
        })
        .inspect(|note| info!(note_id = %note.id, title = %note.title, "Note added"))
    }

    /// Merge `update` into the note with `id`.
    pub fn update(&self, id: &NoteId, update: NoteUpdate) -> Result<Note> {
        self.mutate(|notes| {
            let note = notes
                .iter_mut()
                .find(|n| &n.id == id)
                .ok_or_else(|| not_found(id))?;
            update.apply(note);
            Ok(note.clone())
        })
        .inspect(|_| info!(note_id = %id, "Note updated"))
    }

    /// Permanently remove the note with `id`.
    pub fn delete(&self, id: &NoteId) -> Result<()> {
        self.mutate(|notes| {
            let index = notes
                .iter()
                .position(|n| &n.id == id)
                .ok_or_else(|| not_found(id))?;
            notes.remove(index);
            Ok(())
        })
        .inspect(|_| info!(note_id = %id, "Note deleted"))
    }

    /// Look up a note. A miss is a normal outcome, not an error.
    pub fn get_by_id(&self, id: &NoteId) -> Option<Note> {
        lock(&self.notes).iter().find(|n| &n.id == id).cloned()
    }

    /// All notes, newest first. Equal timestamps keep the newest insertion first.
    pub fn list(&self) -> Vec<Note> {
        let mut notes = lock(&self.notes).clone();
        notes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        notes
    }

    pub fn len(&self) -> usize {
        lock(&self.notes).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `f` to a copy of the collection, persist it, then commit.
    ///
    /// The lock is held across read-modify-write-persist so concurrent
    /// mutations cannot overwrite each other's snapshot. The collection is
    /// only ever replaced whole, so a poisoned guard still holds a
    /// consistent collection and is recovered.
    fn mutate<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Note>) -> Result<T>,
    {
        let mut guard = lock(&self.notes);
        let mut next = guard.clone();
        let out = f(&mut next)?;
        persist_collection(&self.path, &next)?;
        *guard = next;
        Ok(out)
    }
}

impl std::fmt::Debug for NoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteStore")
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn not_found(id: &NoteId) -> SnapnoteError {
    SnapnoteError::NotFound {
        id: id.to_string(),
    }
}

fn load_collection(path: &Path) -> Vec<Note> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No note file yet, starting empty");
            return Vec::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read note file, starting empty");
            return Vec::new();
        }
    };

    if content.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<StoredLayout>(&content) {
        Ok(StoredLayout::Versioned(file)) => file.notes,
        Ok(StoredLayout::Bare(notes)) => {
            info!(count = notes.len(), "Loaded unversioned note file");
            notes
        }
        Err(e) => {
            let aside = corrupt_path(path);
            warn!(
                path = %path.display(),
                moved_to = %aside.display(),
                error = %e,
                "Malformed note file, starting empty"
            );
            if let Err(e) = std::fs::rename(path, &aside) {
                warn!(error = %e, "Failed to move malformed note file aside");
            }
            Vec::new()
        }
    }
}

fn persist_collection(path: &Path, notes: &[Note]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let body = serde_json::to_vec_pretty(&NoteFileRef {
        version: FORMAT_VERSION,
        notes,
    })?;

    let tmp = sibling_path(path, "tmp");
    std::fs::write(&tmp, body).map_err(|e| {
        SnapnoteError::Storage(format!("Failed to write {}: {}", tmp.display(), e))
    })?;
    std::fs::rename(&tmp, path).map_err(|e| {
        SnapnoteError::Storage(format!("Failed to replace {}: {}", path.display(), e))
    })?;

    debug!(path = %path.display(), count = notes.len(), "Note collection persisted");
    Ok(())
}

fn corrupt_path(path: &Path) -> PathBuf {
    sibling_path(path, "corrupt")
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
