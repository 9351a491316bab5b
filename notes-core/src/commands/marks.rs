use log::debug;

use super::{in_range, map_leaves, span, LeafEdit, Outcome};
use crate::doc::Document;
use crate::error::{Error, Result};
use crate::node::{normalize_inline, slice_inline, split_inline};
use crate::schema::{self, MarkKind, NodeKind};
use crate::selection::Selection;

/// Toggle a mark over the selected text.
///
/// If any selected text lacks the mark it is applied everywhere, otherwise it
/// is removed everywhere. A collapsed selection changes nothing here; the
/// editor keeps pending marks for the next insertion instead.
pub fn toggle_mark(doc: &Document, selection: &Selection, mark: MarkKind) -> Result<Outcome> {
    if !schema::allowed_marks(NodeKind::Text).contains(mark) {
        return Err(Error::schema(&[], NodeKind::Text, format!("mark `{}` is not allowed", mark)));
    }

    let selection = selection.clamp(doc);
    if selection.is_collapsed() {
        return Ok(Outcome::unchanged(doc, &selection));
    }

    let (from, to) = selection.range(doc)?;
    let leaves = doc.leaf_blocks();
    let mut any_text = false;
    let mut all_marked = true;
    for leaf in from.leaf..=to.leaf {
        let Some(node) = leaves.get(leaf).and_then(|path| doc.node(path)) else {
            continue;
        };
        if !node.kind.is_textblock() {
            continue;
        }
        let (start, end) = span(leaf, node, &from, &to);
        for run in slice_inline(&node.children, start, end) {
            any_text = true;
            all_marked &= run.marks.contains(mark);
        }
    }
    if !any_text {
        return Ok(Outcome::unchanged(doc, &selection));
    }

    let add = !all_marked;
    debug!("{} {} over leaves {}..={}", if add { "adding" } else { "removing" }, mark, from.leaf, to.leaf);

    let doc = map_leaves(doc, |leaf, node| {
        if !in_range(leaf, &from, &to) || !node.kind.is_textblock() {
            return LeafEdit::Keep;
        }
        let (start, end) = span(leaf, node, &from, &to);
        if start == end {
            return LeafEdit::Keep;
        }
        let (mut children, rest) = split_inline(&node.children, start);
        let (middle, after) = split_inline(&rest, end - start);
        children.extend(middle.into_iter().map(|run| {
            let marks = if add { run.marks.with(mark) } else { run.marks.without(mark) };
            run.with_marks(marks)
        }));
        children.extend(after);
        LeafEdit::Replace(vec![node.shallow().with_children(normalize_inline(children))])
    })?;

    Ok(Outcome { doc, selection })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::selection::Position;

    fn doc(children: Vec<Node>) -> Document {
        Document::new(Node::document(children)).unwrap()
    }

    fn select(a: (Vec<usize>, usize), b: (Vec<usize>, usize)) -> Selection {
        Selection::new(Position::new(a.0, a.1), Position::new(b.0, b.1))
    }

    #[test]
    fn test_bold_whole_paragraph() {
        let d = doc(vec![Node::paragraph(vec![Node::text("Hello")])]);
        let out = toggle_mark(&d, &select((vec![0], 0), (vec![0], 5)), MarkKind::Bold).unwrap();
        assert_eq!(
            out.doc.root().children[0].children,
            vec![Node::text("Hello").with_mark(MarkKind::Bold)]
        );
    }

    #[test]
    fn test_toggle_twice_restores() {
        let d = doc(vec![Node::paragraph(vec![Node::text("Hello world")])]);
        let sel = select((vec![0], 2), (vec![0], 7));
        let once = toggle_mark(&d, &sel, MarkKind::Italic).unwrap();
        assert_eq!(once.doc.root().children[0].children.len(), 3);
        let twice = toggle_mark(&once.doc, &once.selection, MarkKind::Italic).unwrap();
        assert_eq!(twice.doc, d);
    }

    #[test]
    fn test_mixed_selection_applies() {
        let d = doc(vec![Node::paragraph(vec![
            Node::text("ab").with_mark(MarkKind::Bold),
            Node::text("cd"),
        ])]);
        let out = toggle_mark(&d, &select((vec![0], 0), (vec![0], 4)), MarkKind::Bold).unwrap();
        assert_eq!(
            out.doc.root().children[0].children,
            vec![Node::text("abcd").with_mark(MarkKind::Bold)]
        );
    }

    #[test]
    fn test_spans_blocks_and_skips_atoms() {
        let d = doc(vec![
            Node::paragraph(vec![Node::text("one")]),
            Node::horizontal_rule(),
            Node::heading(2, vec![Node::text("two")]),
        ]);
        let out = toggle_mark(&d, &select((vec![0], 1), (vec![2], 2)), MarkKind::Strike).unwrap();
        let first = &out.doc.root().children[0].children;
        assert_eq!(first[1], Node::text("ne").with_mark(MarkKind::Strike));
        let last = &out.doc.root().children[2].children;
        assert_eq!(last[0], Node::text("tw").with_mark(MarkKind::Strike));
        assert_eq!(last[1], Node::text("o"));
    }

    #[test]
    fn test_collapsed_is_noop() {
        let d = doc(vec![Node::paragraph(vec![Node::text("Hello")])]);
        let sel = Selection::collapsed(Position::new(vec![0], 2));
        let out = toggle_mark(&d, &sel, MarkKind::Bold).unwrap();
        assert_eq!(out.doc, d);
        assert_eq!(out.selection, sel);
    }
}
