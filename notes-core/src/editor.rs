//! Editing sessions
//!
//! The author of a note gets an [`Editor`]: the document, a selection, the
//! command engine and undo history. Everyone else gets a [`Preview`], which
//! only parses and re-serializes the stored markup.

use log::{debug, info, warn};
use std::time::Instant;

use crate::commands::{self, query, Command};
use crate::config::Config;
use crate::doc::Document;
use crate::error::{Error, Result};
use crate::history::{self, EntryKind, History, HistoryEntry};
use crate::markup;
use crate::schema::{Alignment, MarkKind, MarkSet, NodeKind};
use crate::selection::{map_through_edit, Edit, Selection};

/// An editable session over one note's content
#[derive(Debug)]
pub struct Editor {
    doc: Document,
    selection: Selection,
    history: History,
    /// Marks for the next insertion, set by toggling a mark on a cursor
    stored_marks: Option<MarkSet>,
    saved: Document,
}

impl Editor {
    /// Open stored markup for editing
    pub fn open(markup: &str, config: &Config) -> Result<Self> {
        let doc = markup::parse(markup)?;
        info!("opened document with {} top-level blocks", doc.root().children.len());
        Ok(Self::with_document(doc, config))
    }

    pub fn with_document(doc: Document, config: &Config) -> Self {
        let selection = if config.editor.focus_end {
            Selection::at_end(&doc)
        } else {
            Selection::at_start(&doc)
        };
        Self {
            saved: doc.clone(),
            doc,
            selection,
            history: History::from_config(&config.history),
            stored_marks: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn stored_marks(&self) -> Option<MarkSet> {
        self.stored_marks
    }

    /// Move the selection. This closes any open typing entry.
    pub fn set_selection(&mut self, selection: Selection) {
        let clamped = selection.clamp(&self.doc);
        if clamped != selection {
            debug!("clamped selection {:?} to {:?}", selection, clamped);
        }
        self.selection = clamped;
        self.stored_marks = None;
        self.history.seal();
    }

    pub fn select_all(&mut self) {
        self.set_selection(Selection::all(&self.doc));
    }

    /// Run a command; returns whether the document changed
    pub fn execute(&mut self, command: Command) -> Result<bool> {
        self.execute_at(command, Instant::now())
    }

    /// Like [`Editor::execute`] with an explicit timestamp for coalescing
    pub fn execute_at(&mut self, command: Command, now: Instant) -> Result<bool> {
        let selection = self.selection.clamp(&self.doc);

        if let Command::ToggleMark(mark) = command {
            if selection.is_collapsed() {
                let current = self
                    .stored_marks
                    .unwrap_or_else(|| query::active_marks(&self.doc, &selection));
                self.stored_marks = Some(current.toggled(mark));
                debug!("stored marks now {:?}", self.stored_marks);
                return Ok(false);
            }
        }

        let result = match &command {
            Command::InsertText(text) => {
                debug!("applying {}", command.name());
                commands::insert_text_with_marks(&self.doc, &selection, text, self.stored_marks)
            }
            other => other.apply(&self.doc, &selection),
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("{} rejected: {}", command.name(), err);
                return Err(err);
            }
        };

        if outcome.doc == self.doc {
            self.selection = outcome.selection;
            return Ok(false);
        }

        // Typing commands that join, split or lift blocks are structural
        let step = history::diff(self.doc.root(), outcome.doc.root());
        let kind = if command.is_typing() && step.as_ref().is_some_and(|s| s.is_inline()) {
            EntryKind::Typing
        } else {
            EntryKind::Structural
        };
        self.history.record(HistoryEntry {
            kind,
            steps: step.into_iter().collect(),
            selection_before: selection,
            selection_after: outcome.selection.clone(),
            at: now,
        });
        if kind == EntryKind::Structural {
            self.history.seal();
        }

        self.doc = outcome.doc;
        self.selection = outcome.selection;
        self.stored_marks = None;
        Ok(true)
    }

    /// Undo the last entry; `false` when there is nothing to undo
    pub fn undo(&mut self) -> bool {
        let result = self.history.undo(&self.doc);
        self.restore(result)
    }

    /// Redo the last undone entry; `false` when there is nothing to redo
    pub fn redo(&mut self) -> bool {
        let result = self.history.redo(&self.doc);
        self.restore(result)
    }

    fn restore(&mut self, result: Result<(Document, Selection)>) -> bool {
        match result {
            Ok((doc, selection)) => {
                self.selection = selection.clamp(&doc);
                self.doc = doc;
                self.stored_marks = None;
                true
            }
            Err(Error::HistoryUnderflow(what)) => {
                debug!("nothing to {}", what);
                false
            }
            Err(err) => {
                warn!("history replay failed: {}", err);
                false
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Replace the whole content, as an undoable step
    pub fn set_content(&mut self, markup: &str) -> Result<()> {
        let doc = markup::parse(markup)?;
        if doc == self.doc {
            return Ok(());
        }
        let selection_after = map_through_edit(&doc, &self.selection, &Edit::ReplaceAll);
        self.history.record(HistoryEntry {
            kind: EntryKind::Structural,
            steps: history::diff(self.doc.root(), doc.root()).into_iter().collect(),
            selection_before: self.selection.clone(),
            selection_after: selection_after.clone(),
            at: Instant::now(),
        });
        self.history.seal();
        self.doc = doc;
        self.selection = selection_after;
        self.stored_marks = None;
        Ok(())
    }

    /// Current content as markup
    pub fn markup(&self) -> String {
        markup::serialize(&self.doc)
    }

    /// Whether the content differs from what was loaded or last saved
    pub fn has_changes(&self) -> bool {
        self.doc != self.saved
    }

    pub fn mark_saved(&mut self) {
        self.saved = self.doc.clone();
    }

    pub fn is_empty(&self) -> bool {
        self.doc.is_empty()
    }

    pub fn is_mark_active(&self, mark: MarkKind) -> bool {
        match self.stored_marks {
            Some(marks) => marks.contains(mark),
            None => query::is_mark_active(&self.doc, &self.selection, mark),
        }
    }

    pub fn is_block_active(&self, kind: NodeKind, level: Option<u8>) -> bool {
        query::is_block_active(&self.doc, &self.selection, kind, level)
    }

    pub fn active_alignment(&self) -> Option<Alignment> {
        query::active_alignment(&self.doc, &self.selection)
    }

    pub fn is_list_active(&self, kind: NodeKind) -> bool {
        query::is_list_active(&self.doc, &self.selection, kind)
    }
}

/// Read-only rendering of a note for non-authors
#[derive(Debug, Clone)]
pub struct Preview {
    doc: Document,
}

impl Preview {
    pub fn open(markup: &str) -> Result<Self> {
        Ok(Self {
            doc: markup::parse(markup)?,
        })
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Sanitized markup: only what the schema allows survives
    pub fn render(&self) -> String {
        markup::serialize(&self.doc)
    }

    pub fn plain_text(&self) -> String {
        self.doc.text_content()
    }
}

/// Session chosen by whether the viewer authored the note
#[derive(Debug)]
pub enum Session {
    Editing(Editor),
    Viewing(Preview),
}

impl Session {
    pub fn open(markup: &str, is_author: bool, config: &Config) -> Result<Self> {
        if is_author {
            Ok(Session::Editing(Editor::open(markup, config)?))
        } else {
            Ok(Session::Viewing(Preview::open(markup)?))
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, Session::Editing(_))
    }

    pub fn render(&self) -> String {
        match self {
            Session::Editing(editor) => editor.markup(),
            Session::Viewing(preview) => preview.render(),
        }
    }

    pub fn editor_mut(&mut self) -> Option<&mut Editor> {
        match self {
            Session::Editing(editor) => Some(editor),
            Session::Viewing(_) => None,
        }
    }
}
