use log::debug;

use super::{block_range, common_ancestor, Outcome};
use crate::doc::Document;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::schema::{AttrKey, AttrValue, NodeKind};
use crate::selection::Selection;

/// Wrap the selected blocks in a list of `kind`, unwrap them when already in
/// one, or convert the enclosing list when it is of another kind.
pub fn toggle_list(doc: &Document, selection: &Selection, kind: NodeKind) -> Result<Outcome> {
    if !kind.is_list() {
        return Err(Error::schema(&[], kind, "not a list kind"));
    }

    let selection = selection.clamp(doc);
    let (from, to) = selection.range(doc)?;
    let bookmark = selection.bookmark(doc)?;

    let updated = match common_ancestor(doc, &from.block, &to.block, NodeKind::is_list) {
        Some(list_path) => {
            let depth = list_path.len();
            let list = doc
                .node(&list_path)
                .ok_or_else(|| Error::schema(&list_path, kind, "list vanished"))?;
            if list.kind == kind {
                debug!("unwrapping {} items", kind);
                unwrap_items(doc, &list_path, from.block[depth], to.block[depth])?
            } else {
                debug!("converting {} to {}", list.kind, kind);
                doc.replace_node(&list_path, convert_list(list, kind))?
            }
        }
        None => wrap_in_list(doc, &from.block, &to.block, kind)?,
    };

    Ok(Outcome {
        selection: bookmark.resolve(&updated),
        doc: updated,
    })
}

/// Check every touched task item, or uncheck them all when none is unchecked.
pub fn toggle_checked(doc: &Document, selection: &Selection) -> Result<Outcome> {
    let selection = selection.clamp(doc);
    let (from, to) = selection.range(doc)?;
    let leaves = doc.leaf_blocks();

    let mut items: Vec<Vec<usize>> = Vec::new();
    for path in leaves.iter().take(to.leaf + 1).skip(from.leaf) {
        let item = (0..path.len())
            .rev()
            .map(|depth| &path[..depth])
            .find(|prefix| doc.node(prefix).is_some_and(|n| n.kind == NodeKind::TaskItem));
        if let Some(item) = item {
            if !items.iter().any(|seen| seen == item) {
                items.push(item.to_vec());
            }
        }
    }
    if items.is_empty() {
        return Ok(Outcome::unchanged(doc, &selection));
    }

    let check = items
        .iter()
        .any(|path| doc.node(path).and_then(Node::checked) == Some(false));
    let mut updated = doc.clone();
    for path in &items {
        updated = updated.set_attribute(path, AttrKey::Checked, AttrValue::Bool(check))?;
    }

    Ok(Outcome {
        doc: updated,
        selection,
    })
}

/// An item of `item_kind`; task items start unchecked.
pub(crate) fn make_item(item_kind: NodeKind, children: Vec<Node>) -> Node {
    match item_kind {
        NodeKind::TaskItem => Node::task_item(false, children),
        _ => Node::list_item(children),
    }
}

/// Replace items `a..=b` of the list at `list_path` with their content,
/// splitting the list around them.
pub(crate) fn unwrap_items(doc: &Document, list_path: &[usize], a: usize, b: usize) -> Result<Document> {
    let list = doc
        .node(list_path)
        .ok_or_else(|| Error::schema(list_path, NodeKind::BulletList, "list vanished"))?;
    let Some((&index, parent)) = list_path.split_last() else {
        return Err(Error::schema(list_path, list.kind, "the root is not a list"));
    };

    let mut replacement = Vec::new();
    if a > 0 {
        replacement.push(list.shallow().with_children(list.children[..a].to_vec()));
    }
    for item in &list.children[a..=b] {
        replacement.extend(item.children.iter().cloned());
    }
    if b + 1 < list.children.len() {
        let mut rest = list.shallow().with_children(list.children[b + 1..].to_vec());
        rest.attrs.remove(&AttrKey::Start);
        replacement.push(rest);
    }

    doc.replace_children(parent, index..index + 1, replacement)
}

fn convert_item(item: &Node, item_kind: NodeKind) -> Node {
    if item.kind == item_kind {
        return item.clone();
    }
    make_item(item_kind, item.children.clone())
}

fn convert_list(list: &Node, kind: NodeKind) -> Node {
    let item_kind = kind.item_kind().unwrap_or(NodeKind::ListItem);
    let mut converted = Node::new(kind);
    if kind == NodeKind::OrderedList {
        if let Some(start) = list.attr(AttrKey::Start) {
            converted.attrs.insert(AttrKey::Start, start.clone());
        }
    }
    converted.children = list.children.iter().map(|item| convert_item(item, item_kind)).collect();
    converted
}

/// Wrap the sibling range covering `from..to` in a new list. Lists inside the
/// range donate their items; neighbouring lists of the same kind are joined.
///
/// Headings become paragraphs. Blockquotes, images and rules cannot start an
/// item, so they stay where they are and split the new list around them.
fn wrap_in_list(doc: &Document, from: &[usize], to: &[usize], kind: NodeKind) -> Result<Document> {
    let item_kind = kind.item_kind().unwrap_or(NodeKind::ListItem);
    let (parent_path, a, b) = block_range(doc, from, to);
    let parent = doc
        .node(&parent_path)
        .ok_or_else(|| Error::schema(&parent_path, kind, "no container to wrap in"))?;

    let mut replacement: Vec<Node> = Vec::new();
    let mut items = Vec::new();
    for block in &parent.children[a..=b] {
        if block.kind.is_list() {
            items.extend(block.children.iter().map(|item| convert_item(item, item_kind)));
        } else if block.kind.is_textblock() {
            items.push(make_item(item_kind, vec![as_paragraph(block)]));
        } else {
            flush_list(&mut replacement, &mut items, kind);
            replacement.push(block.clone());
        }
    }
    flush_list(&mut replacement, &mut items, kind);

    let (mut start, mut end) = (a, b + 1);
    if let Some(prev) = a.checked_sub(1).and_then(|i| parent.children.get(i)) {
        if let Some(first) = replacement.first_mut().filter(|n| n.kind == kind && prev.kind == kind) {
            first.attrs = prev.attrs.clone();
            first.children.splice(0..0, prev.children.iter().cloned());
            start -= 1;
        }
    }
    if let Some(next) = parent.children.get(end) {
        if let Some(last) = replacement.last_mut().filter(|n| n.kind == kind && next.kind == kind) {
            last.children.extend(next.children.iter().cloned());
            end += 1;
        }
    }

    debug!("wrapping blocks {}..{} of {:?} in {}", start, end, parent_path, kind);
    doc.replace_children(&parent_path, start..end, replacement)
}

/// Close the list being built, if it has any items
fn flush_list(out: &mut Vec<Node>, items: &mut Vec<Node>, kind: NodeKind) {
    if !items.is_empty() {
        out.push(Node::new(kind).with_children(std::mem::take(items)));
    }
}

/// Retype a textblock as a paragraph, keeping its text and alignment
fn as_paragraph(block: &Node) -> Node {
    let mut paragraph = Node::paragraph(block.children.clone());
    if let Some(align) = block.attr(AttrKey::TextAlign) {
        paragraph.attrs.insert(AttrKey::TextAlign, align.clone());
    }
    paragraph
}
