//! Positions, selections and their mapping through edits
//!
//! A position is a node path plus a character offset. The canonical form
//! addresses a textblock (offset within its inline content) or an atom
//! (0 = before it, 1 = after it). Paths into a text node are accepted as input.

use crate::doc::Document;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::schema::NodeKind;

/// A point in the document
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub path: Vec<usize>,
    pub offset: usize,
}

impl Position {
    pub fn new(path: Vec<usize>, offset: usize) -> Self {
        Self { path, offset }
    }
}

/// A position resolved against a concrete tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPosition {
    /// Path of the textblock or atom
    pub block: Vec<usize>,
    pub kind: NodeKind,
    /// Index of the block among the document's leaf blocks
    pub leaf: usize,
    pub offset: usize,
    /// Inline length of the block
    pub len: usize,
}

impl ResolvedPosition {
    /// Canonical position
    pub fn position(&self) -> Position {
        Position::new(self.block.clone(), self.offset)
    }

    pub fn at_start(&self) -> bool {
        self.offset == 0
    }

    pub fn at_end(&self) -> bool {
        self.offset >= self.len
    }

    fn key(&self) -> (usize, usize) {
        (self.leaf, self.offset)
    }
}

/// Resolve a position, failing when it does not address the tree
pub fn resolve(doc: &Document, pos: &Position) -> Result<ResolvedPosition> {
    let invalid = || Error::InvalidSelection {
        path: pos.path.clone(),
        offset: pos.offset,
    };

    let node = doc.node(&pos.path).ok_or_else(invalid)?;
    let (block, offset) = if node.kind == NodeKind::Text {
        if pos.offset > node.inline_len() {
            return Err(invalid());
        }
        let (&index, parent) = pos.path.split_last().ok_or_else(invalid)?;
        let parent_node = doc.node(parent).ok_or_else(invalid)?;
        let before: usize = parent_node.children[..index].iter().map(Node::inline_len).sum();
        (parent.to_vec(), before + pos.offset)
    } else if node.kind.is_leaf_block() {
        if pos.offset > node.inline_len() {
            return Err(invalid());
        }
        (pos.path.clone(), pos.offset)
    } else {
        return Err(invalid());
    };

    let block_node = doc.node(&block).ok_or_else(invalid)?;
    let leaf = doc.leaf_blocks().binary_search(&block).map_err(|_| invalid())?;
    Ok(ResolvedPosition {
        kind: block_node.kind,
        len: block_node.inline_len(),
        block,
        leaf,
        offset,
    })
}

/// Nearest valid canonical position to `pos`.
///
/// Indices past the end of a node's children land at the end of its last leaf;
/// a path that stops at a container lands at the start of its first leaf.
pub fn clamp_position(doc: &Document, pos: &Position) -> Position {
    if let Ok(resolved) = resolve(doc, pos) {
        return resolved.position();
    }

    let mut node = doc.root();
    let mut path = Vec::new();
    let mut toward_end = false;
    for &index in &pos.path {
        if node.kind.is_leaf_block() || node.children.is_empty() {
            break;
        }
        let last = node.children.len() - 1;
        let index = if index > last {
            toward_end = true;
            last
        } else {
            index
        };
        path.push(index);
        node = &node.children[index];
        if toward_end {
            break;
        }
    }

    let mut descended = false;
    while !node.kind.is_leaf_block() && !node.children.is_empty() {
        let index = if toward_end { node.children.len() - 1 } else { 0 };
        path.push(index);
        node = &node.children[index];
        descended = true;
    }

    let len = node.inline_len();
    let offset = if toward_end {
        len
    } else if descended {
        0
    } else {
        pos.offset.min(len)
    };
    Position::new(path, offset)
}

/// An anchor/head pair; collapsed when both are equal
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Position,
    pub head: Position,
}

impl Selection {
    pub fn new(anchor: Position, head: Position) -> Self {
        Self { anchor, head }
    }

    /// A cursor
    pub fn collapsed(pos: Position) -> Self {
        Self {
            anchor: pos.clone(),
            head: pos,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    pub fn at_start(doc: &Document) -> Self {
        Self::collapsed(clamp_position(doc, &Position::new(Vec::new(), 0)))
    }

    pub fn at_end(doc: &Document) -> Self {
        Self::collapsed(end_of(doc))
    }

    /// Everything from the first leaf to the end of the last one
    pub fn all(doc: &Document) -> Self {
        let start = clamp_position(doc, &Position::new(Vec::new(), 0));
        Self::new(start, end_of(doc))
    }

    /// The same selection with both ends clamped into `doc`
    pub fn clamp(&self, doc: &Document) -> Self {
        Self {
            anchor: clamp_position(doc, &self.anchor),
            head: clamp_position(doc, &self.head),
        }
    }

    /// Both ends resolved, in document order
    pub fn range(&self, doc: &Document) -> Result<(ResolvedPosition, ResolvedPosition)> {
        let anchor = resolve(doc, &clamp_position(doc, &self.anchor))?;
        let head = resolve(doc, &clamp_position(doc, &self.head))?;
        if anchor.key() <= head.key() {
            Ok((anchor, head))
        } else {
            Ok((head, anchor))
        }
    }

    /// Record the selection as leaf indices so it survives restructuring
    pub fn bookmark(&self, doc: &Document) -> Result<Bookmark> {
        let anchor = resolve(doc, &clamp_position(doc, &self.anchor))?;
        let head = resolve(doc, &clamp_position(doc, &self.head))?;
        Ok(Bookmark {
            anchor: anchor.key(),
            head: head.key(),
        })
    }

    /// Map both ends through a structural edit
    pub fn map_through(&self, edit: &Edit) -> Self {
        Self {
            anchor: map_position(&self.anchor, edit),
            head: map_position(&self.head, edit),
        }
    }
}

fn end_of(doc: &Document) -> Position {
    clamp_position(doc, &Position::new(vec![usize::MAX], 0))
}

/// A selection stored as (leaf index, offset) pairs
///
/// Commands that wrap or unwrap blocks keep the leaf order intact, so the
/// bookmark resolves to the same text after the tree has been restructured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bookmark {
    pub anchor: (usize, usize),
    pub head: (usize, usize),
}

impl Bookmark {
    pub fn collapsed(leaf: usize, offset: usize) -> Self {
        Self {
            anchor: (leaf, offset),
            head: (leaf, offset),
        }
    }

    pub fn resolve(&self, doc: &Document) -> Selection {
        let leaves = doc.leaf_blocks();
        let place = |(leaf, offset): (usize, usize)| match leaves.get(leaf) {
            Some(path) => {
                let len = doc.node(path).map_or(0, Node::inline_len);
                Position::new(path.clone(), offset.min(len))
            }
            None => end_of(doc),
        };
        Selection::new(place(self.anchor), place(self.head))
    }
}

/// Structural edits that positions are mapped through
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Edit {
    InsertText { block: Vec<usize>, offset: usize, len: usize },
    DeleteText { block: Vec<usize>, from: usize, to: usize },
    InsertNode { parent: Vec<usize>, index: usize },
    RemoveNode { parent: Vec<usize>, index: usize },
    SplitBlock { block: Vec<usize>, offset: usize },
    /// The whole content was replaced; positions are clamped afterwards
    ReplaceAll,
}

/// Map a selection through an edit, clamping the result into `doc` (the tree after the edit).
pub fn map_through_edit(doc: &Document, selection: &Selection, edit: &Edit) -> Selection {
    selection.map_through(edit).clamp(doc)
}

/// Map a canonical position through an edit.
///
/// The result may need [`clamp_position`] when the edit removed the node it pointed into.
pub fn map_position(pos: &Position, edit: &Edit) -> Position {
    match edit {
        Edit::InsertText { block, offset, len } => {
            if pos.path == *block && pos.offset >= *offset {
                Position::new(pos.path.clone(), pos.offset + len)
            } else {
                pos.clone()
            }
        }
        Edit::DeleteText { block, from, to } => {
            if pos.path != *block || pos.offset <= *from {
                pos.clone()
            } else if pos.offset <= *to {
                Position::new(pos.path.clone(), *from)
            } else {
                Position::new(pos.path.clone(), pos.offset - (to - from))
            }
        }
        Edit::InsertNode { parent, index } => shift_sibling(pos, parent, *index, |i| i + 1),
        Edit::RemoveNode { parent, index } => {
            let depth = parent.len();
            if pos.path.len() > depth && pos.path.starts_with(parent) && pos.path[depth] == *index {
                let mut path = parent.clone();
                path.push(*index);
                Position::new(path, 0)
            } else {
                shift_sibling(pos, parent, *index + 1, |i| i - 1)
            }
        }
        Edit::SplitBlock { block, offset } => {
            let Some((&index, parent)) = block.split_last() else {
                return pos.clone();
            };
            if pos.path == *block && pos.offset >= *offset {
                let mut path = parent.to_vec();
                path.push(index + 1);
                Position::new(path, pos.offset - offset)
            } else {
                shift_sibling(pos, parent, index + 1, |i| i + 1)
            }
        }
        Edit::ReplaceAll => pos.clone(),
    }
}

/// Shift the child index under `parent` for positions at or after `from`.
fn shift_sibling(pos: &Position, parent: &[usize], from: usize, shift: impl Fn(usize) -> usize) -> Position {
    let depth = parent.len();
    if pos.path.len() > depth && pos.path.starts_with(parent) && pos.path[depth] >= from {
        let mut path = pos.path.clone();
        path[depth] = shift(path[depth]);
        Position::new(path, pos.offset)
    } else {
        pos.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::new(Node::document(vec![
            Node::paragraph(vec![Node::text("Hello "), Node::text("world")]),
            Node::bullet_list(vec![
                Node::list_item(vec![Node::paragraph(vec![Node::text("A")])]),
                Node::list_item(vec![Node::paragraph(vec![Node::text("B")])]),
            ]),
            Node::image("cat.png"),
        ]))
        .unwrap()
    }

    #[test]
    fn test_resolve_text_path() {
        let doc = sample();
        let resolved = resolve(&doc, &Position::new(vec![0, 1], 2)).unwrap();
        assert_eq!(resolved.block, vec![0]);
        assert_eq!(resolved.offset, 8);
        assert_eq!(resolved.leaf, 0);
        assert_eq!(resolved.len, 11);
    }

    #[test]
    fn test_resolve_atom() {
        let doc = sample();
        let resolved = resolve(&doc, &Position::new(vec![2], 1)).unwrap();
        assert_eq!(resolved.kind, NodeKind::Image);
        assert_eq!(resolved.leaf, 3);
        assert!(resolve(&doc, &Position::new(vec![2], 2)).is_err());
    }

    #[test]
    fn test_resolve_rejects_containers() {
        let doc = sample();
        assert!(matches!(
            resolve(&doc, &Position::new(vec![1], 0)),
            Err(Error::InvalidSelection { .. })
        ));
        assert!(resolve(&doc, &Position::new(vec![7], 0)).is_err());
    }

    #[test]
    fn test_clamp_past_end() {
        let doc = sample();
        assert_eq!(clamp_position(&doc, &Position::new(vec![9, 3], 4)), Position::new(vec![2], 1));
        assert_eq!(clamp_position(&doc, &Position::new(vec![1, 5, 0], 0)), Position::new(vec![1, 1, 0], 1));
    }

    #[test]
    fn test_clamp_offset_and_container() {
        let doc = sample();
        assert_eq!(clamp_position(&doc, &Position::new(vec![0], 99)), Position::new(vec![0], 11));
        assert_eq!(clamp_position(&doc, &Position::new(vec![1], 3)), Position::new(vec![1, 0, 0], 0));
    }

    #[test]
    fn test_all_and_range_order() {
        let doc = sample();
        let all = Selection::all(&doc);
        assert_eq!(all.anchor, Position::new(vec![0], 0));
        assert_eq!(all.head, Position::new(vec![2], 1));

        let backwards = Selection::new(Position::new(vec![1, 1, 0], 1), Position::new(vec![0], 2));
        let (from, to) = backwards.range(&doc).unwrap();
        assert_eq!(from.block, vec![0]);
        assert_eq!(to.block, vec![1, 1, 0]);
    }

    #[test]
    fn test_bookmark_survives_restructure() {
        let doc = sample();
        let sel = Selection::collapsed(Position::new(vec![1, 1, 0], 1));
        let bookmark = sel.bookmark(&doc).unwrap();
        let flat = Document::new(Node::document(vec![
            Node::paragraph(vec![Node::text("Hello world")]),
            Node::paragraph(vec![Node::text("A")]),
            Node::paragraph(vec![Node::text("B")]),
        ]))
        .unwrap();
        assert_eq!(bookmark.resolve(&flat).head, Position::new(vec![2], 1));
    }

    #[test]
    fn test_map_insert_text() {
        let edit = Edit::InsertText { block: vec![0], offset: 2, len: 3 };
        assert_eq!(map_position(&Position::new(vec![0], 2), &edit).offset, 5);
        assert_eq!(map_position(&Position::new(vec![0], 1), &edit).offset, 1);
        assert_eq!(map_position(&Position::new(vec![1], 4), &edit).offset, 4);
    }

    #[test]
    fn test_map_delete_text() {
        let edit = Edit::DeleteText { block: vec![0], from: 2, to: 5 };
        assert_eq!(map_position(&Position::new(vec![0], 4), &edit).offset, 2);
        assert_eq!(map_position(&Position::new(vec![0], 7), &edit).offset, 4);
    }

    #[test]
    fn test_map_node_edits() {
        let pos = Position::new(vec![1, 1, 0], 1);
        let inserted = map_position(&pos, &Edit::InsertNode { parent: vec![1], index: 0 });
        assert_eq!(inserted.path, vec![1, 2, 0]);

        let removed = map_position(&pos, &Edit::RemoveNode { parent: vec![1], index: 0 });
        assert_eq!(removed.path, vec![1, 0, 0]);

        let gone = map_position(&pos, &Edit::RemoveNode { parent: vec![1], index: 1 });
        assert_eq!(gone, Position::new(vec![1, 1], 0));
    }

    #[test]
    fn test_map_split_block() {
        let edit = Edit::SplitBlock { block: vec![0], offset: 5 };
        assert_eq!(map_position(&Position::new(vec![0], 7), &edit), Position::new(vec![1], 2));
        assert_eq!(map_position(&Position::new(vec![0], 3), &edit), Position::new(vec![0], 3));
        assert_eq!(map_position(&Position::new(vec![1, 0, 0], 1), &edit), Position::new(vec![2, 0, 0], 1));
    }
}
