use super::query::is_block_active;
use super::{block_range, common_ancestor, in_range, map_leaves, LeafEdit, Outcome};
use crate::doc::Document;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::schema::{Alignment, AttrKey, AttrValue, Attrs, NodeKind};
use crate::selection::Selection;

/// Retype every textblock the selection touches.
///
/// Only paragraph and heading are valid targets. Alignment carries over.
pub fn set_block_kind(doc: &Document, selection: &Selection, kind: NodeKind, attrs: &Attrs) -> Result<Outcome> {
    if !kind.is_textblock() {
        return Err(Error::schema(&[], kind, "only paragraph and heading can be set as a block kind"));
    }

    let selection = selection.clamp(doc);
    let (from, to) = selection.range(doc)?;
    let doc = map_leaves(doc, |leaf, node| {
        if !in_range(leaf, &from, &to) || !node.kind.is_textblock() {
            return LeafEdit::Keep;
        }
        let mut block = Node::new(kind).with_children(node.children.clone());
        block.attrs = attrs.clone();
        if let Some(align) = node.attr(AttrKey::TextAlign) {
            block.attrs.entry(AttrKey::TextAlign).or_insert_with(|| align.clone());
        }
        LeafEdit::Replace(vec![block])
    })?;

    Ok(Outcome { doc, selection })
}

/// Turn the touched textblocks into headings of `level`, or back into
/// paragraphs when they already all are.
pub fn toggle_heading(doc: &Document, selection: &Selection, level: u8) -> Result<Outcome> {
    if is_block_active(doc, selection, NodeKind::Heading, Some(level)) {
        set_block_kind(doc, selection, NodeKind::Paragraph, &Attrs::new())
    } else {
        let mut attrs = Attrs::new();
        attrs.insert(AttrKey::Level, AttrValue::Int(u32::from(level)));
        set_block_kind(doc, selection, NodeKind::Heading, &attrs)
    }
}

/// Left alignment is the default and is stored as no attribute at all.
pub fn set_alignment(doc: &Document, selection: &Selection, alignment: Alignment) -> Result<Outcome> {
    let selection = selection.clamp(doc);
    let (from, to) = selection.range(doc)?;
    let doc = map_leaves(doc, |leaf, node| {
        if !in_range(leaf, &from, &to) || !node.kind.is_textblock() {
            return LeafEdit::Keep;
        }
        let mut block = node.clone();
        match alignment {
            Alignment::Left => block.attrs.remove(&AttrKey::TextAlign),
            other => block.attrs.insert(AttrKey::TextAlign, AttrValue::Align(other)),
        };
        LeafEdit::Replace(vec![block])
    })?;

    Ok(Outcome { doc, selection })
}

/// Lift the enclosing blockquote, or wrap the touched blocks in a new one.
pub fn toggle_blockquote(doc: &Document, selection: &Selection) -> Result<Outcome> {
    let selection = selection.clamp(doc);
    let (from, to) = selection.range(doc)?;
    let bookmark = selection.bookmark(doc)?;

    let updated = match common_ancestor(doc, &from.block, &to.block, |k| k == NodeKind::Blockquote) {
        Some(quote) => {
            let Some((&index, parent)) = quote.split_last() else {
                return Ok(Outcome::unchanged(doc, &selection));
            };
            let children = doc.node(&quote).map(|n| n.children.clone()).unwrap_or_default();
            doc.replace_children(parent, index..index + 1, children)?
        }
        None => {
            let (parent, a, b) = block_range(doc, &from.block, &to.block);
            let Some(container) = doc.node(&parent) else {
                return Ok(Outcome::unchanged(doc, &selection));
            };
            let wrapped = Node::blockquote(container.children[a..=b].to_vec());
            doc.replace_children(&parent, a..b + 1, vec![wrapped])?
        }
    };

    Ok(Outcome {
        selection: bookmark.resolve(&updated),
        doc: updated,
    })
}
