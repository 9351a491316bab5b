//! Active-state queries for toolbar buttons
//!
//! Queries never fail: a selection that cannot be resolved reports nothing active.

use super::{common_ancestor, span};
use crate::doc::Document;
use crate::node::{marks_at, slice_inline, Node};
use crate::schema::{Alignment, MarkKind, MarkSet, NodeKind};
use crate::selection::{ResolvedPosition, Selection};

/// Textblocks touched by the selection, with the range resolved
fn touched(doc: &Document, selection: &Selection) -> Option<(ResolvedPosition, ResolvedPosition, Vec<(usize, Node)>)> {
    let (from, to) = selection.range(doc).ok()?;
    let leaves = doc.leaf_blocks();
    let blocks = (from.leaf..=to.leaf)
        .filter_map(|leaf| {
            let node = leaves.get(leaf).and_then(|path| doc.node(path))?;
            node.kind.is_textblock().then(|| (leaf, node.clone()))
        })
        .collect();
    Some((from, to, blocks))
}

/// Marks shared by all selected text; for a cursor, the marks typing would inherit
pub fn active_marks(doc: &Document, selection: &Selection) -> MarkSet {
    let Some((from, to, blocks)) = touched(doc, selection) else {
        return MarkSet::EMPTY;
    };

    if from.leaf == to.leaf && from.offset == to.offset {
        return blocks
            .first()
            .map_or(MarkSet::EMPTY, |(_, node)| marks_at(&node.children, from.offset));
    }

    let mut shared: Option<MarkSet> = None;
    for (leaf, node) in &blocks {
        let (start, end) = span(*leaf, node, &from, &to);
        for run in slice_inline(&node.children, start, end) {
            shared = Some(shared.map_or(run.marks, |m| m.intersection(run.marks)));
        }
    }
    shared.unwrap_or(MarkSet::EMPTY)
}

pub fn is_mark_active(doc: &Document, selection: &Selection, mark: MarkKind) -> bool {
    active_marks(doc, selection).contains(mark)
}

/// Kind and heading level shared by every touched textblock
pub fn active_block(doc: &Document, selection: &Selection) -> Option<(NodeKind, Option<u8>)> {
    let (_, _, blocks) = touched(doc, selection)?;
    let mut kinds = blocks.iter().map(|(_, node)| (node.kind, node.level()));
    let first = kinds.next()?;
    kinds.all(|k| k == first).then_some(first)
}

pub fn is_block_active(doc: &Document, selection: &Selection, kind: NodeKind, level: Option<u8>) -> bool {
    match active_block(doc, selection) {
        Some((active, active_level)) => active == kind && (level.is_none() || active_level == level),
        None => false,
    }
}

/// Alignment shared by every touched textblock; no attribute reads as left
pub fn active_alignment(doc: &Document, selection: &Selection) -> Option<Alignment> {
    let (_, _, blocks) = touched(doc, selection)?;
    let mut aligns = blocks
        .iter()
        .map(|(_, node)| node.alignment().unwrap_or(Alignment::Left));
    let first = aligns.next()?;
    aligns.all(|a| a == first).then_some(first)
}

/// Kind of the innermost list enclosing the whole selection
pub fn active_list(doc: &Document, selection: &Selection) -> Option<NodeKind> {
    let (from, to) = selection.range(doc).ok()?;
    let path = common_ancestor(doc, &from.block, &to.block, NodeKind::is_list)?;
    doc.node(&path).map(|n| n.kind)
}

pub fn is_list_active(doc: &Document, selection: &Selection, kind: NodeKind) -> bool {
    active_list(doc, selection) == Some(kind)
}

pub fn is_in_blockquote(doc: &Document, selection: &Selection) -> bool {
    selection.range(doc).ok().is_some_and(|(from, to)| {
        common_ancestor(doc, &from.block, &to.block, |k| k == NodeKind::Blockquote).is_some()
    })
}
