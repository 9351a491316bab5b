//! Tree nodes and inline-content helpers

use crate::schema::{Alignment, AttrKey, AttrValue, Attrs, MarkKind, MarkSet, NodeKind};

/// A node of the document tree
///
/// Only `Text` nodes carry `text` and `marks`; every other kind keeps both empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub attrs: Attrs,
    pub children: Vec<Node>,
    pub text: String,
    pub marks: MarkSet,
}

impl Node {
    /// Create an empty node of the given kind
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attrs: Attrs::new(),
            children: Vec::new(),
            text: String::new(),
            marks: MarkSet::EMPTY,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::new(NodeKind::Text)
        }
    }

    pub fn document(children: Vec<Node>) -> Self {
        Self::new(NodeKind::Document).with_children(children)
    }

    pub fn paragraph(children: Vec<Node>) -> Self {
        Self::new(NodeKind::Paragraph).with_children(children)
    }

    pub fn heading(level: u8, children: Vec<Node>) -> Self {
        Self::new(NodeKind::Heading)
            .with_attr(AttrKey::Level, AttrValue::Int(u32::from(level)))
            .with_children(children)
    }

    pub fn bullet_list(items: Vec<Node>) -> Self {
        Self::new(NodeKind::BulletList).with_children(items)
    }

    pub fn ordered_list(items: Vec<Node>) -> Self {
        Self::new(NodeKind::OrderedList).with_children(items)
    }

    pub fn task_list(items: Vec<Node>) -> Self {
        Self::new(NodeKind::TaskList).with_children(items)
    }

    pub fn list_item(children: Vec<Node>) -> Self {
        Self::new(NodeKind::ListItem).with_children(children)
    }

    pub fn task_item(checked: bool, children: Vec<Node>) -> Self {
        Self::new(NodeKind::TaskItem)
            .with_attr(AttrKey::Checked, AttrValue::Bool(checked))
            .with_children(children)
    }

    pub fn blockquote(children: Vec<Node>) -> Self {
        Self::new(NodeKind::Blockquote).with_children(children)
    }

    pub fn horizontal_rule() -> Self {
        Self::new(NodeKind::HorizontalRule)
    }

    pub fn image(src: impl Into<String>) -> Self {
        Self::new(NodeKind::Image).with_attr(AttrKey::Src, AttrValue::Str(src.into()))
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn with_attr(mut self, key: AttrKey, value: AttrValue) -> Self {
        self.attrs.insert(key, value);
        self
    }

    pub fn with_marks(mut self, marks: MarkSet) -> Self {
        self.marks = marks;
        self
    }

    pub fn with_mark(self, mark: MarkKind) -> Self {
        let marks = self.marks.with(mark);
        self.with_marks(marks)
    }

    /// Copy of this node without its children
    pub fn shallow(&self) -> Self {
        Self {
            kind: self.kind,
            attrs: self.attrs.clone(),
            children: Vec::new(),
            text: self.text.clone(),
            marks: self.marks,
        }
    }

    pub fn attr(&self, key: AttrKey) -> Option<&AttrValue> {
        self.attrs.get(&key)
    }

    /// Heading level, if this node has one
    pub fn level(&self) -> Option<u8> {
        self.attr(AttrKey::Level)
            .and_then(AttrValue::as_int)
            .and_then(|l| u8::try_from(l).ok())
    }

    pub fn alignment(&self) -> Option<Alignment> {
        self.attr(AttrKey::TextAlign).and_then(AttrValue::as_align)
    }

    pub fn checked(&self) -> Option<bool> {
        self.attr(AttrKey::Checked).and_then(AttrValue::as_bool)
    }

    /// Walk down a child-index path
    pub fn descendant(&self, path: &[usize]) -> Option<&Node> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get(index))
    }

    pub(crate) fn descendant_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get_mut(index))
    }

    /// Length in characters of the content a position can address.
    ///
    /// Text counts its characters, a textblock the sum of its text, an atom is 1 wide.
    pub fn inline_len(&self) -> usize {
        match self.kind {
            NodeKind::Text => self.text.chars().count(),
            kind if kind.is_textblock() => self.children.iter().map(Node::inline_len).sum(),
            kind if kind.is_atom() => 1,
            _ => 0,
        }
    }

    /// Concatenated text of every text node below this one
    pub fn text_content(&self) -> String {
        if self.kind == NodeKind::Text {
            return self.text.clone();
        }
        self.children.iter().map(Node::text_content).collect()
    }
}

/// Byte index of the `chars`-th character of `s`, clamped to its end.
pub(crate) fn byte_index(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(i, _)| i)
}

/// Split inline content at a character offset.
pub(crate) fn split_inline(children: &[Node], at: usize) -> (Vec<Node>, Vec<Node>) {
    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut pos = 0;

    for child in children {
        let len = child.inline_len();
        if pos + len <= at {
            before.push(child.clone());
        } else if pos >= at {
            after.push(child.clone());
        } else {
            let cut = byte_index(&child.text, at - pos);
            let mut left = child.shallow();
            left.text = child.text[..cut].to_string();
            let mut right = child.shallow();
            right.text = child.text[cut..].to_string();
            before.push(left);
            after.push(right);
        }
        pos += len;
    }

    (before, after)
}

/// Inline content between two character offsets.
pub(crate) fn slice_inline(children: &[Node], from: usize, to: usize) -> Vec<Node> {
    let (head, _) = split_inline(children, to);
    split_inline(&head, from).1
}

/// Drop empty text and merge neighbouring runs that carry the same marks.
pub(crate) fn normalize_inline(children: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(children.len());
    for child in children {
        if child.kind == NodeKind::Text && child.text.is_empty() {
            continue;
        }
        if let Some(last) = out.last_mut() {
            if last.kind == NodeKind::Text && child.kind == NodeKind::Text && last.marks == child.marks {
                last.text.push_str(&child.text);
                continue;
            }
        }
        out.push(child);
    }
    out
}

/// Marks a character typed at `offset` would inherit.
///
/// Uses the run ending at the offset, or the first run when at the start.
pub(crate) fn marks_at(children: &[Node], offset: usize) -> MarkSet {
    let mut pos = 0;
    for child in children {
        let len = child.inline_len();
        if offset > pos && offset <= pos + len {
            return child.marks;
        }
        pos += len;
    }
    children.first().map_or(MarkSet::EMPTY, |c| c.marks)
}

/// Insert a text run at a character offset.
pub(crate) fn insert_inline(children: &[Node], at: usize, text: &str, marks: MarkSet) -> Vec<Node> {
    let (mut before, after) = split_inline(children, at);
    before.push(Node::text(text).with_marks(marks));
    before.extend(after);
    normalize_inline(before)
}
