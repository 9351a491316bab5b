//! Document tree with schema-checked, copy-on-write mutations

use std::ops::Range;

use crate::error::{Error, Result};
use crate::node::{byte_index, normalize_inline, Node};
use crate::schema::{self, AttrKey, AttrValue, NodeKind};
use crate::selection::Position;

/// A validated document tree
///
/// Every mutation returns a new `Document`; when the result would break the
/// schema the error is returned and `self` is left as it was.
///
/// Equality is by content: neighbouring text runs with the same marks compare
/// equal to the single merged run, matching how they serialize.
#[derive(Clone, Debug)]
pub struct Document {
    root: Node,
}

impl Document {
    /// Wrap a root node, validating the whole tree
    pub fn new(root: Node) -> Result<Self> {
        if root.kind != NodeKind::Document {
            return Err(Error::schema(&[], root.kind, "the root must be a document"));
        }
        schema::validate(&root)?;
        Ok(Self { root })
    }

    /// A document holding a single empty paragraph
    pub fn empty() -> Self {
        Self {
            root: Node::document(vec![Node::paragraph(Vec::new())]),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    /// Node at a child-index path; the empty path is the root
    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        self.root.descendant(path)
    }

    /// Whether the document is just one empty paragraph
    pub fn is_empty(&self) -> bool {
        match self.root.children.as_slice() {
            [only] => only.kind == NodeKind::Paragraph && only.children.is_empty(),
            _ => false,
        }
    }

    /// Paths of all textblocks and atoms in document order
    pub fn leaf_blocks(&self) -> Vec<Vec<usize>> {
        let mut leaves = Vec::new();
        let mut path = Vec::new();
        collect_leaves(&self.root, &mut path, &mut leaves);
        leaves
    }

    /// Text of every textblock, one per line
    pub fn text_content(&self) -> String {
        self.leaf_blocks()
            .iter()
            .filter_map(|path| self.node(path))
            .filter(|node| node.kind.is_textblock())
            .map(Node::text_content)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Clone the tree, mutate the node at `path` and validate the result
    fn edit(&self, path: &[usize], f: impl FnOnce(&mut Node) -> Result<()>) -> Result<Self> {
        let mut root = self.root.clone();
        let target = root.descendant_mut(path).ok_or_else(|| missing(path))?;
        f(target)?;
        Self::new(root)
    }

    pub fn insert_child(&self, parent: &[usize], index: usize, node: Node) -> Result<Self> {
        self.edit(parent, |target| {
            if index > target.children.len() {
                return Err(out_of_range(parent, index));
            }
            target.children.insert(index, node);
            Ok(())
        })
    }

    pub fn remove_child(&self, parent: &[usize], index: usize) -> Result<Self> {
        self.edit(parent, |target| {
            if index >= target.children.len() {
                return Err(out_of_range(parent, index));
            }
            target.children.remove(index);
            Ok(())
        })
    }

    /// Replace the node at `path`; the empty path replaces the root
    pub fn replace_node(&self, path: &[usize], node: Node) -> Result<Self> {
        let Some((&index, parent)) = path.split_last() else {
            return Self::new(node);
        };
        self.edit(parent, |target| {
            let slot = target
                .children
                .get_mut(index)
                .ok_or_else(|| out_of_range(parent, index))?;
            *slot = node;
            Ok(())
        })
    }

    /// Splice `nodes` in place of the children in `range`
    pub fn replace_children(&self, parent: &[usize], range: Range<usize>, nodes: Vec<Node>) -> Result<Self> {
        self.edit(parent, |target| {
            if range.start > range.end || range.end > target.children.len() {
                return Err(out_of_range(parent, range.end));
            }
            target.children.splice(range, nodes);
            Ok(())
        })
    }

    pub fn set_attribute(&self, path: &[usize], key: AttrKey, value: AttrValue) -> Result<Self> {
        self.edit(path, |target| {
            target.attrs.insert(key, value);
            Ok(())
        })
    }

    pub fn remove_attribute(&self, path: &[usize], key: AttrKey) -> Result<Self> {
        self.edit(path, |target| {
            target.attrs.remove(&key);
            Ok(())
        })
    }

    /// Split the text node at `position` in two; a split at either end is a no-op
    pub fn split_text_node(&self, position: &Position) -> Result<Self> {
        let path = position.path.as_slice();
        let node = self.node(path).ok_or_else(|| missing(path))?;
        if node.kind != NodeKind::Text {
            return Err(Error::schema(path, node.kind, "only text nodes can be split"));
        }
        let len = node.inline_len();
        if position.offset > len {
            return Err(Error::InvalidSelection {
                path: path.to_vec(),
                offset: position.offset,
            });
        }
        if position.offset == 0 || position.offset == len {
            return Ok(self.clone());
        }

        let cut = byte_index(&node.text, position.offset);
        let mut left = node.shallow();
        left.text = node.text[..cut].to_string();
        let mut right = node.shallow();
        right.text = node.text[cut..].to_string();

        let Some((&index, parent)) = path.split_last() else {
            return Err(missing(path));
        };
        self.replace_children(parent, index..index + 1, vec![left, right])
    }

    /// Merge neighbouring text children of `path` that carry identical marks
    pub fn merge_adjacent_text_nodes(&self, path: &[usize]) -> Result<Self> {
        self.edit(path, |target| {
            let children = std::mem::take(&mut target.children);
            target.children = normalize_inline(children);
            Ok(())
        })
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        same_content(&self.root, &other.root)
    }
}

impl Eq for Document {}

fn same_content(a: &Node, b: &Node) -> bool {
    if a.kind != b.kind || a.attrs != b.attrs || a.text != b.text || a.marks != b.marks {
        return false;
    }
    if a.kind.is_textblock() {
        return a.children == b.children
            || normalize_inline(a.children.clone()) == normalize_inline(b.children.clone());
    }
    a.children.len() == b.children.len()
        && a.children.iter().zip(&b.children).all(|(x, y)| same_content(x, y))
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

fn collect_leaves(node: &Node, path: &mut Vec<usize>, leaves: &mut Vec<Vec<usize>>) {
    if node.kind.is_leaf_block() {
        leaves.push(path.clone());
        return;
    }
    for (index, child) in node.children.iter().enumerate() {
        path.push(index);
        collect_leaves(child, path, leaves);
        path.pop();
    }
}

fn missing(path: &[usize]) -> Error {
    Error::InvalidSelection {
        path: path.to_vec(),
        offset: 0,
    }
}

fn out_of_range(parent: &[usize], index: usize) -> Error {
    let mut path = parent.to_vec();
    path.push(index);
    missing(&path)
}
