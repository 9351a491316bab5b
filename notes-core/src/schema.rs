//! Schema registry: the closed set of node and mark kinds and their nesting rules
//!
//! Every tree mutation and the markup parser go through [`validate`], so a node
//! that breaks these rules never ends up inside a [`Document`](crate::Document).

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::node::Node;

/// Node kinds known to the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Document,
    Paragraph,
    Heading,
    BulletList,
    OrderedList,
    ListItem,
    TaskList,
    TaskItem,
    Blockquote,
    HorizontalRule,
    Image,
    Text,
}

impl NodeKind {
    /// Name used in diagnostics, matching the exchange format's node names.
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Heading => "heading",
            NodeKind::BulletList => "bulletList",
            NodeKind::OrderedList => "orderedList",
            NodeKind::ListItem => "listItem",
            NodeKind::TaskList => "taskList",
            NodeKind::TaskItem => "taskItem",
            NodeKind::Blockquote => "blockquote",
            NodeKind::HorizontalRule => "horizontalRule",
            NodeKind::Image => "image",
            NodeKind::Text => "text",
        }
    }

    /// Blocks holding inline text.
    pub fn is_textblock(self) -> bool {
        matches!(self, NodeKind::Paragraph | NodeKind::Heading)
    }

    /// Blocks without content of their own.
    pub fn is_atom(self) -> bool {
        matches!(self, NodeKind::HorizontalRule | NodeKind::Image)
    }

    /// Blocks a cursor can sit in: textblocks and atoms.
    pub fn is_leaf_block(self) -> bool {
        self.is_textblock() || self.is_atom()
    }

    pub fn is_list(self) -> bool {
        matches!(
            self,
            NodeKind::BulletList | NodeKind::OrderedList | NodeKind::TaskList
        )
    }

    pub fn is_list_item(self) -> bool {
        matches!(self, NodeKind::ListItem | NodeKind::TaskItem)
    }

    /// Item kind a list holds, `None` for non-list kinds.
    pub fn item_kind(self) -> Option<NodeKind> {
        match self {
            NodeKind::BulletList | NodeKind::OrderedList => Some(NodeKind::ListItem),
            NodeKind::TaskList => Some(NodeKind::TaskItem),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Character-level styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkKind {
    Bold,
    Italic,
    Strike,
}

impl MarkKind {
    pub const ALL: [MarkKind; 3] = [MarkKind::Bold, MarkKind::Italic, MarkKind::Strike];

    pub fn name(self) -> &'static str {
        match self {
            MarkKind::Bold => "bold",
            MarkKind::Italic => "italic",
            MarkKind::Strike => "strike",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        MarkKind::ALL.into_iter().find(|m| m.name() == name)
    }

    fn bit(self) -> u8 {
        match self {
            MarkKind::Bold => 0b001,
            MarkKind::Italic => 0b010,
            MarkKind::Strike => 0b100,
        }
    }
}

impl fmt::Display for MarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of marks; a mark is either present or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MarkSet(u8);

impl MarkSet {
    pub const EMPTY: MarkSet = MarkSet(0);

    pub fn all() -> Self {
        MarkKind::ALL.into_iter().collect()
    }

    pub fn from_bits(bits: u8) -> Self {
        MarkSet(bits & 0b111)
    }

    pub fn contains(self, mark: MarkKind) -> bool {
        self.0 & mark.bit() != 0
    }

    pub fn with(self, mark: MarkKind) -> Self {
        MarkSet(self.0 | mark.bit())
    }

    pub fn without(self, mark: MarkKind) -> Self {
        MarkSet(self.0 & !mark.bit())
    }

    pub fn toggled(self, mark: MarkKind) -> Self {
        MarkSet(self.0 ^ mark.bit())
    }

    pub fn intersection(self, other: MarkSet) -> Self {
        MarkSet(self.0 & other.0)
    }

    pub fn is_subset(self, other: MarkSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Marks in canonical order (bold, italic, strike).
    pub fn iter(self) -> impl Iterator<Item = MarkKind> {
        MarkKind::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl FromIterator<MarkKind> for MarkSet {
    fn from_iter<I: IntoIterator<Item = MarkKind>>(iter: I) -> Self {
        iter.into_iter().fold(MarkSet::EMPTY, MarkSet::with)
    }
}

/// Horizontal text alignment of a textblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub const ALL: [Alignment; 4] = [
        Alignment::Left,
        Alignment::Center,
        Alignment::Right,
        Alignment::Justify,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Alignment::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(name))
    }
}

/// Attribute names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttrKey {
    Level,
    TextAlign,
    Checked,
    Start,
    Src,
    Alt,
    Title,
}

impl AttrKey {
    pub fn name(self) -> &'static str {
        match self {
            AttrKey::Level => "level",
            AttrKey::TextAlign => "textAlign",
            AttrKey::Checked => "checked",
            AttrKey::Start => "start",
            AttrKey::Src => "src",
            AttrKey::Alt => "alt",
            AttrKey::Title => "title",
        }
    }
}

impl fmt::Display for AttrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttrValue {
    Int(u32),
    Bool(bool),
    Str(String),
    Align(Alignment),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<u32> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_align(&self) -> Option<Alignment> {
        match self {
            AttrValue::Align(v) => Some(*v),
            _ => None,
        }
    }
}

/// Attribute map of a node.
pub type Attrs = BTreeMap<AttrKey, AttrValue>;

/// Declares one attribute a node kind accepts.
#[derive(Debug, Clone, Copy)]
pub struct AttrSpec {
    pub key: AttrKey,
    pub required: bool,
    pub check: fn(&AttrValue) -> bool,
}

/// Child-count and first-child constraints of a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRule {
    pub min: usize,
    pub first: Option<NodeKind>,
}

fn is_level(value: &AttrValue) -> bool {
    matches!(value.as_int(), Some(1..=6))
}

fn is_align(value: &AttrValue) -> bool {
    value.as_align().is_some()
}

fn is_bool(value: &AttrValue) -> bool {
    value.as_bool().is_some()
}

fn is_int(value: &AttrValue) -> bool {
    value.as_int().is_some()
}

fn is_str(value: &AttrValue) -> bool {
    value.as_str().is_some()
}

/// Image sources must be non-empty and must not carry a script or inline-data scheme.
fn is_image_src(value: &AttrValue) -> bool {
    let Some(src) = value.as_str() else {
        return false;
    };
    let src = src.trim().to_ascii_lowercase();
    !src.is_empty()
        && !["javascript:", "vbscript:", "data:"]
            .iter()
            .any(|scheme| src.starts_with(scheme))
}

const TEXTBLOCK_ATTRS: &[AttrSpec] = &[AttrSpec {
    key: AttrKey::TextAlign,
    required: false,
    check: is_align,
}];

const HEADING_ATTRS: &[AttrSpec] = &[
    AttrSpec {
        key: AttrKey::Level,
        required: true,
        check: is_level,
    },
    AttrSpec {
        key: AttrKey::TextAlign,
        required: false,
        check: is_align,
    },
];

const ORDERED_LIST_ATTRS: &[AttrSpec] = &[AttrSpec {
    key: AttrKey::Start,
    required: false,
    check: is_int,
}];

const TASK_ITEM_ATTRS: &[AttrSpec] = &[AttrSpec {
    key: AttrKey::Checked,
    required: true,
    check: is_bool,
}];

const IMAGE_ATTRS: &[AttrSpec] = &[
    AttrSpec {
        key: AttrKey::Src,
        required: true,
        check: is_image_src,
    },
    AttrSpec {
        key: AttrKey::Alt,
        required: false,
        check: is_str,
    },
    AttrSpec {
        key: AttrKey::Title,
        required: false,
        check: is_str,
    },
];

/// Whether `child` may appear directly inside `parent`.
pub fn is_valid_child(parent: NodeKind, child: NodeKind) -> bool {
    use NodeKind::*;
    match parent {
        Document | Blockquote => matches!(
            child,
            Paragraph
                | Heading
                | BulletList
                | OrderedList
                | TaskList
                | Blockquote
                | HorizontalRule
                | Image
        ),
        Paragraph | Heading => child == Text,
        BulletList | OrderedList => child == ListItem,
        TaskList => child == TaskItem,
        ListItem | TaskItem => matches!(
            child,
            Paragraph | BulletList | OrderedList | TaskList | Blockquote | Image
        ),
        HorizontalRule | Image | Text => false,
    }
}

/// Attributes `kind` accepts, with their validity predicates.
pub fn allowed_attributes(kind: NodeKind) -> &'static [AttrSpec] {
    match kind {
        NodeKind::Paragraph => TEXTBLOCK_ATTRS,
        NodeKind::Heading => HEADING_ATTRS,
        NodeKind::OrderedList => ORDERED_LIST_ATTRS,
        NodeKind::TaskItem => TASK_ITEM_ATTRS,
        NodeKind::Image => IMAGE_ATTRS,
        _ => &[],
    }
}

/// Marks `kind` may carry.
pub fn allowed_marks(kind: NodeKind) -> MarkSet {
    match kind {
        NodeKind::Text => MarkSet::all(),
        _ => MarkSet::EMPTY,
    }
}

pub fn content_rule(kind: NodeKind) -> ContentRule {
    match kind {
        NodeKind::Document
        | NodeKind::BulletList
        | NodeKind::OrderedList
        | NodeKind::TaskList
        | NodeKind::Blockquote => ContentRule {
            min: 1,
            first: None,
        },
        NodeKind::ListItem | NodeKind::TaskItem => ContentRule {
            min: 1,
            first: Some(NodeKind::Paragraph),
        },
        _ => ContentRule {
            min: 0,
            first: None,
        },
    }
}

/// Check a single attribute assignment against the registry.
pub fn check_attribute(kind: NodeKind, key: AttrKey, value: &AttrValue) -> std::result::Result<(), String> {
    match allowed_attributes(kind).iter().find(|spec| spec.key == key) {
        None => Err(format!("attribute `{}` is not allowed on {}", key, kind)),
        Some(spec) if !(spec.check)(value) => {
            Err(format!("invalid value {:?} for attribute `{}`", value, key))
        }
        Some(_) => Ok(()),
    }
}

/// Longest child-index path a valid tree may contain
pub const MAX_DEPTH: usize = 100;

/// Validate a subtree, reporting the first offending node.
///
/// Trees nested deeper than [`MAX_DEPTH`] are rejected before they are walked.
pub fn validate(node: &Node) -> Result<()> {
    let mut path = Vec::new();
    validate_at(node, &mut path)
}

fn validate_at(node: &Node, path: &mut Vec<usize>) -> Result<()> {
    validate_shallow(node, path)?;

    for (index, child) in node.children.iter().enumerate() {
        path.push(index);
        if path.len() > MAX_DEPTH {
            return Err(Error::schema(path, child.kind, "nesting too deep"));
        }
        if !is_valid_child(node.kind, child.kind) {
            return Err(Error::schema(
                path,
                child.kind,
                format!("{} is not allowed inside {}", child.kind, node.kind),
            ));
        }
        validate_at(child, path)?;
        path.pop();
    }

    Ok(())
}

fn validate_shallow(node: &Node, path: &[usize]) -> Result<()> {
    let kind = node.kind;

    for (key, value) in &node.attrs {
        check_attribute(kind, *key, value).map_err(|reason| Error::schema(path, kind, reason))?;
    }
    for spec in allowed_attributes(kind).iter().filter(|spec| spec.required) {
        if !node.attrs.contains_key(&spec.key) {
            return Err(Error::schema(
                path,
                kind,
                format!("missing required attribute `{}`", spec.key),
            ));
        }
    }

    if !node.marks.is_subset(allowed_marks(kind)) {
        return Err(Error::schema(path, kind, "marks are only allowed on text"));
    }

    if kind == NodeKind::Text {
        if node.text.is_empty() {
            return Err(Error::schema(path, kind, "text nodes must not be empty"));
        }
    } else if !node.text.is_empty() {
        return Err(Error::schema(path, kind, "only text nodes carry text"));
    }

    let rule = content_rule(kind);
    if node.children.len() < rule.min {
        return Err(Error::schema(
            path,
            kind,
            format!("{} needs at least {} child node(s)", kind, rule.min),
        ));
    }
    if let Some(first) = rule.first {
        if node.children.first().map(|c| c.kind) != Some(first) {
            return Err(Error::schema(
                path,
                kind,
                format!("the first child of {} must be a {}", kind, first),
            ));
        }
    }

    Ok(())
}
