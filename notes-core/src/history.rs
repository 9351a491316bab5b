//! Undo/redo history with typing coalescing
//!
//! Entries store subtree replacements rather than whole documents: each step
//! swaps one node at a path, so undo replays the `before` sides in reverse.

use log::debug;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::HistoryConfig;
use crate::doc::Document;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::schema::NodeKind;
use crate::selection::Selection;

/// Replacement of the node at `path`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplaceStep {
    pub path: Vec<usize>,
    pub before: Node,
    pub after: Node,
}

impl ReplaceStep {
    /// Whether the step only rewrites text inside one textblock
    pub fn is_inline(&self) -> bool {
        self.before.kind == self.after.kind
            && (self.before.kind.is_textblock() || self.before.kind == NodeKind::Text)
    }
}

/// Smallest single-node replacement turning `old` into `new`.
///
/// Descends while exactly one child differs; `None` when the trees are equal.
pub fn diff(old: &Node, new: &Node) -> Option<ReplaceStep> {
    if old == new {
        return None;
    }

    let mut path = Vec::new();
    let (mut a, mut b) = (old, new);
    loop {
        let same_shell = a.kind == b.kind
            && a.attrs == b.attrs
            && a.text == b.text
            && a.marks == b.marks
            && a.children.len() == b.children.len();
        if !same_shell {
            break;
        }
        let mut differing = a
            .children
            .iter()
            .zip(&b.children)
            .enumerate()
            .filter(|(_, (x, y))| x != y);
        match (differing.next(), differing.next()) {
            (Some((index, (x, y))), None) => {
                path.push(index);
                a = x;
                b = y;
            }
            _ => break,
        }
    }

    Some(ReplaceStep {
        path,
        before: a.clone(),
        after: b.clone(),
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    /// Text insertion or deletion; may coalesce with the previous entry
    Typing,
    /// Everything else; always its own entry
    Structural,
}

/// One user-visible edit
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub kind: EntryKind,
    pub steps: Vec<ReplaceStep>,
    pub selection_before: Selection,
    pub selection_after: Selection,
    pub at: Instant,
}

#[derive(Debug)]
pub struct History {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    depth: usize,
    coalesce_window: Duration,
    sealed: bool,
}

impl Default for History {
    fn default() -> Self {
        Self::from_config(&HistoryConfig::default())
    }
}

impl History {
    /// `depth` is at least one entry
    pub fn new(depth: usize, coalesce_window: Duration) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            depth: depth.max(1),
            coalesce_window,
            sealed: false,
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.depth, config.coalesce_window())
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Close the open entry so the next typing starts a new one
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.sealed = false;
    }

    /// Push an entry, clearing redo; consecutive typing may merge
    pub fn record(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        if entry.steps.is_empty() {
            return;
        }

        if let Some(last) = self.undo.back_mut() {
            let coalesce = !self.sealed
                && last.kind == EntryKind::Typing
                && entry.kind == EntryKind::Typing
                && entry.at.saturating_duration_since(last.at) <= self.coalesce_window
                && last.selection_after == entry.selection_before;
            if coalesce {
                last.steps.extend(entry.steps);
                last.selection_after = entry.selection_after;
                last.at = entry.at;
                return;
            }
        }

        self.undo.push_back(entry);
        self.sealed = false;
        while self.undo.len() > self.depth {
            self.undo.pop_front();
            debug!("history full, evicted oldest entry");
        }
    }

    /// Revert the newest entry, returning the restored document and selection
    pub fn undo(&mut self, doc: &Document) -> Result<(Document, Selection)> {
        let entry = self.undo.pop_back().ok_or(Error::HistoryUnderflow("undo"))?;
        match replay(doc, &entry, false) {
            Ok(restored) => {
                let selection = entry.selection_before.clone();
                self.redo.push(entry);
                self.sealed = true;
                Ok((restored, selection))
            }
            Err(err) => {
                self.undo.push_back(entry);
                Err(err)
            }
        }
    }

    /// Re-apply the most recently undone entry
    pub fn redo(&mut self, doc: &Document) -> Result<(Document, Selection)> {
        let entry = self.redo.pop().ok_or(Error::HistoryUnderflow("redo"))?;
        match replay(doc, &entry, true) {
            Ok(restored) => {
                let selection = entry.selection_after.clone();
                self.undo.push_back(entry);
                self.sealed = true;
                Ok((restored, selection))
            }
            Err(err) => {
                self.redo.push(entry);
                Err(err)
            }
        }
    }
}

fn replay(doc: &Document, entry: &HistoryEntry, forward: bool) -> Result<Document> {
    let mut doc = doc.clone();
    if forward {
        for step in &entry.steps {
            doc = doc.replace_node(&step.path, step.after.clone())?;
        }
    } else {
        for step in entry.steps.iter().rev() {
            doc = doc.replace_node(&step.path, step.before.clone())?;
        }
    }
    Ok(doc)
}
