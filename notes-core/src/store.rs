//! Note persistence
//!
//! The store treats note content as an opaque markup string. Only the author
//! of a note may update or delete it.

use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::markup;

/// A stored note
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author: String,
}

impl Note {
    pub fn new(author: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            content: content.into(),
            author: author.into(),
        }
    }

    pub fn is_authored_by(&self, viewer: &str) -> bool {
        self.author == viewer
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("note {0} not found")]
    NotFound(Uuid),

    #[error("{viewer} is not the author of note {id}")]
    Unauthorized { id: Uuid, viewer: String },

    #[error("invalid note: {0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("bad note file {path}: {reason}")]
    Format { path: PathBuf, reason: String },
}

/// Check that a note is fit to be saved: a non-blank title and non-empty, well-formed content
pub fn validate_note(title: &str, content: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::Invalid("title is required".to_string()));
    }
    let doc = markup::parse(content).map_err(|err| StoreError::Invalid(err.to_string()))?;
    if doc.is_empty() {
        return Err(StoreError::Invalid("content is required".to_string()));
    }
    Ok(())
}

/// Persistence boundary for notes
pub trait NoteStore {
    fn list(&self) -> Result<Vec<Note>, StoreError>;
    fn load(&self, id: Uuid) -> Result<Note, StoreError>;
    fn create(&mut self, author: &str, title: &str, content: &str) -> Result<Note, StoreError>;
    fn update(&mut self, id: Uuid, viewer: &str, title: &str, content: &str) -> Result<Note, StoreError>;
    fn delete(&mut self, id: Uuid, viewer: &str) -> Result<(), StoreError>;
}

/// One TOML file per note in a directory
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    /// Open a store, creating the directory if needed
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create note directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.toml", id))
    }

    fn read(&self, path: &Path) -> Result<Note, StoreError> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|err| StoreError::Format {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    fn write(&self, note: &Note) -> Result<(), StoreError> {
        let path = self.path_for(note.id);
        let content = toml::to_string(note).map_err(|err| StoreError::Format {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        fs::write(&path, content)?;
        Ok(())
    }

    fn load_owned(&self, id: Uuid, viewer: &str) -> Result<Note, StoreError> {
        let note = self.load(id)?;
        if !note.is_authored_by(viewer) {
            return Err(StoreError::Unauthorized {
                id,
                viewer: viewer.to_string(),
            });
        }
        Ok(note)
    }
}

impl NoteStore for DirStore {
    fn list(&self) -> Result<Vec<Note>, StoreError> {
        let mut notes = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("toml") {
                notes.push(self.read(&path)?);
            }
        }
        notes.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(notes)
    }

    fn load(&self, id: Uuid) -> Result<Note, StoreError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(StoreError::NotFound(id));
        }
        self.read(&path)
    }

    fn create(&mut self, author: &str, title: &str, content: &str) -> Result<Note, StoreError> {
        let note = Note::new(author, title, content);
        self.write(&note)?;
        info!("created note {} ({})", note.id, note.title);
        Ok(note)
    }

    fn update(&mut self, id: Uuid, viewer: &str, title: &str, content: &str) -> Result<Note, StoreError> {
        let mut note = self.load_owned(id, viewer)?;
        note.title = title.to_string();
        note.content = content.to_string();
        self.write(&note)?;
        info!("updated note {}", id);
        Ok(note)
    }

    fn delete(&mut self, id: Uuid, viewer: &str) -> Result<(), StoreError> {
        self.load_owned(id, viewer)?;
        fs::remove_file(self.path_for(id))?;
        info!("deleted note {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_load_list() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let mut store = DirStore::open(dir.path())?;
        let b = store.create("ann", "B note", "<p>b</p>")?;
        let a = store.create("ann", "A note", "<p>a &amp; \"quoted\"</p>")?;

        assert_eq!(store.load(a.id)?, a);
        let titles: Vec<_> = store.list()?.into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["A note", "B note"]);
        assert_eq!(store.load(b.id)?.content, "<p>b</p>");
        Ok(())
    }

    #[test]
    fn test_only_author_may_change() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let mut store = DirStore::open(dir.path())?;
        let note = store.create("ann", "Mine", "<p>x</p>")?;

        assert!(matches!(
            store.update(note.id, "bob", "Stolen", "<p>y</p>"),
            Err(StoreError::Unauthorized { .. })
        ));
        assert!(matches!(store.delete(note.id, "bob"), Err(StoreError::Unauthorized { .. })));

        let updated = store.update(note.id, "ann", "Mine", "<p>y</p>")?;
        assert_eq!(updated.content, "<p>y</p>");
        store.delete(note.id, "ann")?;
        assert!(matches!(store.load(note.id), Err(StoreError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_corrupt_file_reports_format() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = DirStore::open(dir.path())?;
        let id = Uuid::new_v4();
        fs::write(dir.path().join(format!("{}.toml", id)), "not = [valid")?;
        assert!(matches!(store.load(id), Err(StoreError::Format { .. })));
        Ok(())
    }

    #[test]
    fn test_validate_note() {
        assert!(validate_note("Title", "<p>x</p>").is_ok());
        assert!(validate_note("  ", "<p>x</p>").is_err());
        assert!(validate_note("Title", "<p></p>").is_err());
        assert!(validate_note("Title", "").is_err());
        assert!(validate_note("Title", "<li>").is_err());
    }
}
