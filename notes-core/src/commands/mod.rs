//! Command engine: editing operations as pure functions of (document, selection)
//!
//! Each command returns a new document and selection, or an error with the
//! input left untouched. Commands never panic on a stale selection; it is
//! clamped into the document first.

mod blocks;
mod edit;
mod lists;
mod marks;
pub mod query;

use log::debug;

pub use blocks::{set_alignment, set_block_kind, toggle_blockquote, toggle_heading};
pub use edit::{
    delete_backward, delete_selection, insert_node, insert_text, insert_text_with_marks, split_block,
};
pub use lists::{toggle_checked, toggle_list};
pub use marks::toggle_mark;

use crate::doc::Document;
use crate::error::Result;
use crate::node::Node;
use crate::schema::{Alignment, Attrs, MarkKind, NodeKind};
use crate::selection::{ResolvedPosition, Selection};

/// Result of a successful command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub doc: Document,
    pub selection: Selection,
}

impl Outcome {
    pub(crate) fn unchanged(doc: &Document, selection: &Selection) -> Self {
        Self {
            doc: doc.clone(),
            selection: selection.clone(),
        }
    }
}

/// Every editing operation the toolbar and keyboard can trigger
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    ToggleMark(MarkKind),
    SetBlockKind { kind: NodeKind, attrs: Attrs },
    ToggleHeading(u8),
    ToggleList(NodeKind),
    SetAlignment(Alignment),
    ToggleBlockquote,
    ToggleChecked,
    InsertNode(Node),
    InsertText(String),
    DeleteSelection,
    DeleteBackward,
    SplitBlock,
}

impl Command {
    pub fn apply(&self, doc: &Document, selection: &Selection) -> Result<Outcome> {
        debug!("applying {}", self.name());
        match self {
            Command::ToggleMark(mark) => toggle_mark(doc, selection, *mark),
            Command::SetBlockKind { kind, attrs } => set_block_kind(doc, selection, *kind, attrs),
            Command::ToggleHeading(level) => toggle_heading(doc, selection, *level),
            Command::ToggleList(kind) => toggle_list(doc, selection, *kind),
            Command::SetAlignment(alignment) => set_alignment(doc, selection, *alignment),
            Command::ToggleBlockquote => toggle_blockquote(doc, selection),
            Command::ToggleChecked => toggle_checked(doc, selection),
            Command::InsertNode(node) => insert_node(doc, selection, node),
            Command::InsertText(text) => insert_text(doc, selection, text),
            Command::DeleteSelection => delete_selection(doc, selection),
            Command::DeleteBackward => delete_backward(doc, selection),
            Command::SplitBlock => split_block(doc, selection),
        }
    }

    /// Typing commands may coalesce into a single undo step
    pub fn is_typing(&self) -> bool {
        matches!(
            self,
            Command::InsertText(_) | Command::DeleteSelection | Command::DeleteBackward
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::ToggleMark(_) => "toggle-mark",
            Command::SetBlockKind { .. } => "set-block-kind",
            Command::ToggleHeading(_) => "toggle-heading",
            Command::ToggleList(_) => "toggle-list",
            Command::SetAlignment(_) => "set-alignment",
            Command::ToggleBlockquote => "toggle-blockquote",
            Command::ToggleChecked => "toggle-checked",
            Command::InsertNode(_) => "insert-node",
            Command::InsertText(_) => "insert-text",
            Command::DeleteSelection => "delete-selection",
            Command::DeleteBackward => "delete-backward",
            Command::SplitBlock => "split-block",
        }
    }
}

/// What to do with one leaf block while rebuilding the tree
pub(crate) enum LeafEdit {
    Keep,
    Replace(Vec<Node>),
    Remove,
}

/// Rebuild the tree, letting `f` keep, replace or remove each leaf block.
///
/// Containers left without children are dropped, list items whose first
/// child is gone get an empty paragraph, and an emptied document gets one too.
pub(crate) fn map_leaves<F>(doc: &Document, mut f: F) -> Result<Document>
where
    F: FnMut(usize, &Node) -> LeafEdit,
{
    let mut counter = 0;
    let mut children = Vec::new();
    for child in &doc.root().children {
        children.extend(rebuild(child, &mut counter, &mut f));
    }
    if children.is_empty() {
        children.push(Node::paragraph(Vec::new()));
    }
    Document::new(doc.root().shallow().with_children(children))
}

fn rebuild<F>(node: &Node, counter: &mut usize, f: &mut F) -> Vec<Node>
where
    F: FnMut(usize, &Node) -> LeafEdit,
{
    if node.kind.is_leaf_block() {
        let index = *counter;
        *counter += 1;
        return match f(index, node) {
            LeafEdit::Keep => vec![node.clone()],
            LeafEdit::Replace(nodes) => nodes,
            LeafEdit::Remove => Vec::new(),
        };
    }

    let mut children = Vec::new();
    for child in &node.children {
        children.extend(rebuild(child, counter, f));
    }
    if children.is_empty() {
        return Vec::new();
    }
    if node.kind.is_list_item() && children[0].kind != NodeKind::Paragraph {
        children.insert(0, Node::paragraph(Vec::new()));
    }
    vec![node.shallow().with_children(children)]
}

/// Character range of a leaf covered by the resolved range `from..to`.
pub(crate) fn span(leaf: usize, node: &Node, from: &ResolvedPosition, to: &ResolvedPosition) -> (usize, usize) {
    let start = if leaf == from.leaf { from.offset } else { 0 };
    let end = if leaf == to.leaf { to.offset } else { node.inline_len() };
    (start, end.max(start))
}

pub(crate) fn in_range(leaf: usize, from: &ResolvedPosition, to: &ResolvedPosition) -> bool {
    leaf >= from.leaf && leaf <= to.leaf
}

/// Deepest common ancestor of two blocks whose kind satisfies `pred`.
pub(crate) fn common_ancestor(
    doc: &Document,
    a: &[usize],
    b: &[usize],
    pred: impl Fn(NodeKind) -> bool,
) -> Option<Vec<usize>> {
    let shared = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    (0..=shared)
        .rev()
        .map(|depth| &a[..depth])
        .find(|prefix| doc.node(prefix).is_some_and(|n| pred(n.kind)))
        .map(<[usize]>::to_vec)
}

/// Sibling range covering two blocks: `(parent, first, last)`.
///
/// Climbs out of lists, and out of list items when the range starts at
/// their first child, so that wrapping never splits an item from its list.
pub(crate) fn block_range(doc: &Document, from: &[usize], to: &[usize]) -> (Vec<usize>, usize, usize) {
    let max = from.len().min(to.len()).saturating_sub(1);
    let mut depth = 0;
    while depth < max && from[depth] == to[depth] {
        depth += 1;
    }
    let mut container = from[..depth].to_vec();
    let (mut a, mut b) = (
        from.get(depth).copied().unwrap_or(0),
        to.get(depth).copied().unwrap_or(0),
    );

    while let Some(node) = doc.node(&container) {
        let climb = node.kind.is_list() || (node.kind.is_list_item() && a == 0);
        if !climb {
            break;
        }
        match container.pop() {
            Some(index) => {
                a = index;
                b = index;
            }
            None => break,
        }
    }

    (container, a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Document {
        Document::new(Node::document(vec![
            Node::paragraph(vec![Node::text("intro")]),
            Node::bullet_list(vec![
                Node::list_item(vec![
                    Node::paragraph(vec![Node::text("A")]),
                    Node::bullet_list(vec![Node::list_item(vec![Node::paragraph(vec![Node::text("A1")])])]),
                ]),
                Node::list_item(vec![Node::paragraph(vec![Node::text("B")])]),
            ]),
        ]))
        .unwrap()
    }

    #[test]
    fn test_map_leaves_prunes_empty_containers() {
        let doc = nested();
        let out = map_leaves(&doc, |leaf, _| if leaf == 3 { LeafEdit::Remove } else { LeafEdit::Keep }).unwrap();
        assert_eq!(out.root().children[1].children.len(), 1);
    }

    #[test]
    fn test_map_leaves_repairs_items() {
        let doc = nested();
        let out = map_leaves(&doc, |leaf, _| if leaf == 1 { LeafEdit::Remove } else { LeafEdit::Keep }).unwrap();
        let item = out.node(&[1, 0]).unwrap();
        assert_eq!(item.children[0].kind, NodeKind::Paragraph);
        assert!(item.children[0].children.is_empty());
    }

    #[test]
    fn test_map_leaves_never_empties_document() {
        let out = map_leaves(&nested(), |_, _| LeafEdit::Remove).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_block_range_climbs_out_of_items() {
        let doc = nested();
        assert_eq!(block_range(&doc, &[1, 0, 0], &[1, 1, 0]), (vec![], 1, 1));
        assert_eq!(block_range(&doc, &[0], &[1, 1, 0]), (vec![], 0, 1));
        assert_eq!(block_range(&doc, &[1, 0, 1, 0, 0], &[1, 0, 1, 0, 0]), (vec![1, 0], 1, 1));
    }

    #[test]
    fn test_common_ancestor() {
        let doc = nested();
        let list = common_ancestor(&doc, &[1, 0, 1, 0, 0], &[1, 1, 0], NodeKind::is_list);
        assert_eq!(list, Some(vec![1]));
        let inner = common_ancestor(&doc, &[1, 0, 1, 0, 0], &[1, 0, 1, 0, 0], NodeKind::is_list);
        assert_eq!(inner, Some(vec![1, 0, 1]));
        assert_eq!(common_ancestor(&doc, &[0], &[1, 1, 0], NodeKind::is_list), None);
    }
}
