use log::debug;

use super::lists::{make_item, unwrap_items};
use super::{map_leaves, LeafEdit, Outcome};
use crate::doc::Document;
use crate::error::{Error, Result};
use crate::node::{insert_inline, marks_at, normalize_inline, split_inline, Node};
use crate::schema::{MarkSet, NodeKind};
use crate::selection::{resolve, Bookmark, Edit, Position, ResolvedPosition, Selection};

/// Insert text at the selection, replacing whatever is selected.
///
/// Inserted text inherits the marks of the text before the cursor.
pub fn insert_text(doc: &Document, selection: &Selection, text: &str) -> Result<Outcome> {
    insert_text_with_marks(doc, selection, text, None)
}

/// Insert text with explicit marks, or inherited ones when `marks` is `None`.
///
/// Newlines split the block, as if Enter had been pressed between lines.
pub fn insert_text_with_marks(
    doc: &Document,
    selection: &Selection,
    text: &str,
    marks: Option<MarkSet>,
) -> Result<Outcome> {
    let selection = selection.clamp(doc);
    let mut outcome = if selection.is_collapsed() {
        Outcome::unchanged(doc, &selection)
    } else {
        delete_selection(doc, &selection)?
    };

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            outcome = split_block(&outcome.doc, &outcome.selection)?;
        }
        let line = line.trim_end_matches('\r');
        if !line.is_empty() {
            outcome = insert_line(&outcome.doc, &outcome.selection, line, marks)?;
        }
    }

    Ok(outcome)
}

fn insert_line(doc: &Document, selection: &Selection, line: &str, marks: Option<MarkSet>) -> Result<Outcome> {
    let cursor = resolve(doc, &selection.head)?;
    let len = line.chars().count();

    if cursor.kind.is_atom() {
        let (parent, index) = split_path(&cursor.block)?;
        let at = index + cursor.offset;
        let paragraph = Node::paragraph(vec![Node::text(line).with_marks(marks.unwrap_or_default())]);
        let doc = doc.insert_child(parent, at, paragraph)?;
        let mut path = parent.to_vec();
        path.push(at);
        return Ok(Outcome {
            doc,
            selection: Selection::collapsed(Position::new(path, len)),
        });
    }

    let block = block_node(doc, &cursor)?;
    let marks = marks.unwrap_or_else(|| marks_at(&block.children, cursor.offset));
    let children = insert_inline(&block.children, cursor.offset, line, marks);
    let doc = doc.replace_node(&cursor.block, block.shallow().with_children(children))?;
    let edit = Edit::InsertText {
        block: cursor.block.clone(),
        offset: cursor.offset,
        len,
    };

    Ok(Outcome {
        doc,
        selection: selection.map_through(&edit),
    })
}

/// Remove the selected content, joining the first and last textblocks.
pub fn delete_selection(doc: &Document, selection: &Selection) -> Result<Outcome> {
    let selection = selection.clamp(doc);
    if selection.is_collapsed() {
        return Ok(Outcome::unchanged(doc, &selection));
    }
    let (from, to) = selection.range(doc)?;
    if from.leaf == to.leaf && from.offset == to.offset {
        return Ok(Outcome::unchanged(doc, &selection));
    }

    if from.leaf == to.leaf && from.kind.is_textblock() {
        let block = block_node(doc, &from)?;
        let (mut children, rest) = split_inline(&block.children, from.offset);
        let (_, after) = split_inline(&rest, to.offset - from.offset);
        children.extend(after);
        let updated = doc.replace_node(&from.block, block.shallow().with_children(normalize_inline(children)))?;
        let edit = Edit::DeleteText {
            block: from.block.clone(),
            from: from.offset,
            to: to.offset,
        };
        return Ok(Outcome {
            doc: updated,
            selection: Selection::collapsed(from.position()).map_through(&edit),
        });
    }

    debug!("deleting across leaves {}..={}", from.leaf, to.leaf);
    let tail = match (from.kind.is_textblock(), to.kind.is_textblock()) {
        (true, true) => Some(split_inline(&block_node(doc, &to)?.children, to.offset).1),
        _ => None,
    };
    let updated = map_leaves(doc, |leaf, node| {
        if leaf < from.leaf || leaf > to.leaf {
            return LeafEdit::Keep;
        }
        if leaf == from.leaf {
            if node.kind.is_atom() {
                return if from.offset == 0 { LeafEdit::Remove } else { LeafEdit::Keep };
            }
            let (mut head, _) = split_inline(&node.children, from.offset);
            if let Some(tail) = &tail {
                head.extend(tail.iter().cloned());
            }
            return LeafEdit::Replace(vec![node.shallow().with_children(normalize_inline(head))]);
        }
        if leaf == to.leaf {
            if tail.is_some() {
                return LeafEdit::Remove;
            }
            if node.kind.is_atom() {
                return if to.offset == 1 { LeafEdit::Remove } else { LeafEdit::Keep };
            }
            let (_, rest) = split_inline(&node.children, to.offset);
            return LeafEdit::Replace(vec![node.shallow().with_children(rest)]);
        }
        LeafEdit::Remove
    })?;

    let cursor = if from.kind.is_textblock() {
        Bookmark::collapsed(from.leaf, from.offset)
    } else if from.offset == 0 {
        Bookmark::collapsed(from.leaf, 0)
    } else {
        Bookmark::collapsed(from.leaf + 1, 0)
    };

    Ok(Outcome {
        selection: cursor.resolve(&updated),
        doc: updated,
    })
}

/// Backspace: delete the character before the cursor, or join with the block before.
///
/// At the start of a list item's first paragraph the item is lifted out of its list.
pub fn delete_backward(doc: &Document, selection: &Selection) -> Result<Outcome> {
    let selection = selection.clamp(doc);
    if !selection.is_collapsed() {
        return delete_selection(doc, &selection);
    }

    let cursor = resolve(doc, &selection.head)?;
    if cursor.offset > 0 {
        let from = Position::new(cursor.block.clone(), cursor.offset - 1);
        return delete_selection(doc, &Selection::new(from, cursor.position()));
    }

    let (parent, index) = split_path(&cursor.block)?;
    let parent_node = doc.node(parent).ok_or_else(|| missing(parent))?;
    if parent_node.kind.is_list_item() && index == 0 {
        let (list_path, item_index) = split_path(parent)?;
        let bookmark = selection.bookmark(doc)?;
        let updated = unwrap_items(doc, list_path, item_index, item_index)?;
        return Ok(Outcome {
            selection: bookmark.resolve(&updated),
            doc: updated,
        });
    }

    if cursor.leaf == 0 {
        return Ok(Outcome::unchanged(doc, &selection));
    }
    let leaves = doc.leaf_blocks();
    let prev_path = &leaves[cursor.leaf - 1];
    let prev = doc.node(prev_path).ok_or_else(|| missing(prev_path))?;
    let offset = if prev.kind.is_atom() { 0 } else { prev.inline_len() };
    let from = Position::new(prev_path.clone(), offset);
    delete_selection(doc, &Selection::new(from, cursor.position()))
}

/// Enter: split the block at the cursor.
///
/// In a list item this splits the item; on an empty item it leaves the list.
/// Splitting at the end of a heading continues with a paragraph.
pub fn split_block(doc: &Document, selection: &Selection) -> Result<Outcome> {
    let selection = selection.clamp(doc);
    let outcome = if selection.is_collapsed() {
        Outcome::unchanged(doc, &selection)
    } else {
        delete_selection(doc, &selection)?
    };
    let doc = &outcome.doc;
    let cursor = resolve(doc, &outcome.selection.head)?;
    let (parent_path, index) = split_path(&cursor.block)?;
    let parent = doc.node(parent_path).ok_or_else(|| missing(parent_path))?;

    if cursor.kind.is_atom() {
        let at = index + cursor.offset;
        let updated = doc.insert_child(parent_path, at, Node::paragraph(Vec::new()))?;
        let mut path = parent_path.to_vec();
        path.push(at);
        return Ok(Outcome {
            doc: updated,
            selection: Selection::collapsed(Position::new(path, 0)),
        });
    }

    let block = block_node(doc, &cursor)?;
    let (head, tail) = split_inline(&block.children, cursor.offset);

    if parent.kind.is_list_item() && index == 0 {
        let (list_path, item_index) = split_path(parent_path)?;
        if block.children.is_empty() && parent.children.len() == 1 {
            debug!("lifting empty {} out of its list", parent.kind);
            let bookmark = outcome.selection.bookmark(doc)?;
            let updated = unwrap_items(doc, list_path, item_index, item_index)?;
            return Ok(Outcome {
                selection: bookmark.resolve(&updated),
                doc: updated,
            });
        }

        let first = parent.shallow().with_children(vec![block.shallow().with_children(head)]);
        let mut rest = vec![block.shallow().with_children(tail)];
        rest.extend(parent.children[1..].iter().cloned());
        let second = make_item(parent.kind, rest);
        let updated = doc.replace_children(list_path, item_index..item_index + 1, vec![first, second])?;

        let mut path = list_path.to_vec();
        path.extend([item_index + 1, 0]);
        return Ok(Outcome {
            doc: updated,
            selection: Selection::collapsed(Position::new(path, 0)),
        });
    }

    let second = if block.kind == NodeKind::Heading && tail.is_empty() {
        Node::paragraph(Vec::new())
    } else {
        block.shallow().with_children(tail)
    };
    let first = block.shallow().with_children(head);
    let updated = doc.replace_children(parent_path, index..index + 1, vec![first, second])?;
    let edit = Edit::SplitBlock {
        block: cursor.block.clone(),
        offset: cursor.offset,
    };

    Ok(Outcome {
        doc: updated,
        selection: outcome.selection.map_through(&edit),
    })
}

/// Insert a block node at the cursor and move the cursor past it.
///
/// An empty textblock is replaced; otherwise the node goes before, after, or
/// into a split of the current block. A trailing atom gets an empty paragraph
/// after it so the cursor has somewhere to go.
pub fn insert_node(doc: &Document, selection: &Selection, node: &Node) -> Result<Outcome> {
    match node.kind {
        NodeKind::Text => return insert_text_with_marks(doc, selection, &node.text, Some(node.marks)),
        NodeKind::Document => {
            return Err(Error::schema(&[], node.kind, "a document cannot be inserted"));
        }
        _ => {}
    }

    let selection = selection.clamp(doc);
    let outcome = if selection.is_collapsed() {
        Outcome::unchanged(doc, &selection)
    } else {
        delete_selection(doc, &selection)?
    };
    let doc = &outcome.doc;
    let cursor = resolve(doc, &outcome.selection.head)?;
    let (parent_path, index) = split_path(&cursor.block)?;
    let parent = doc.node(parent_path).ok_or_else(|| missing(parent_path))?;
    let first_in_item = parent.kind.is_list_item() && index == 0;
    let block = block_node(doc, &cursor)?;

    let (updated, at) = if cursor.kind.is_atom() {
        let at = index + cursor.offset;
        (doc.insert_child(parent_path, at, node.clone())?, at)
    } else if block.children.is_empty() && !first_in_item {
        (doc.replace_node(&cursor.block, node.clone())?, index)
    } else if cursor.at_start() && !first_in_item {
        (doc.insert_child(parent_path, index, node.clone())?, index)
    } else if cursor.at_end() {
        (doc.insert_child(parent_path, index + 1, node.clone())?, index + 1)
    } else {
        let (head, tail) = split_inline(&block.children, cursor.offset);
        let pieces = vec![
            block.shallow().with_children(head),
            node.clone(),
            block.shallow().with_children(tail),
        ];
        (doc.replace_children(parent_path, index..index + 1, pieces)?, index + 1)
    };

    let siblings = updated.node(parent_path).map_or(0, |p| p.children.len());
    let updated = if node.kind.is_atom() && at + 1 == siblings {
        updated.insert_child(parent_path, at + 1, Node::paragraph(Vec::new()))?
    } else {
        updated
    };

    let mut node_path = parent_path.to_vec();
    node_path.push(at);
    let leaves = updated.leaf_blocks();
    let next = leaves
        .iter()
        .position(|p| p.as_slice() > node_path.as_slice() && !p.starts_with(&node_path));
    let selection = match next {
        Some(leaf) => Bookmark::collapsed(leaf, 0).resolve(&updated),
        None => Selection::at_end(&updated),
    };

    debug!("inserted {} at {:?}", node.kind, node_path);
    Ok(Outcome {
        doc: updated,
        selection,
    })
}

fn split_path(path: &[usize]) -> Result<(&[usize], usize)> {
    path.split_last()
        .map(|(&index, parent)| (parent, index))
        .ok_or_else(|| missing(path))
}

fn block_node<'a>(doc: &'a Document, cursor: &ResolvedPosition) -> Result<&'a Node> {
    doc.node(&cursor.block).ok_or_else(|| missing(&cursor.block))
}

fn missing(path: &[usize]) -> Error {
    Error::InvalidSelection {
        path: path.to_vec(),
        offset: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MarkKind;

    fn doc(children: Vec<Node>) -> Document {
        Document::new(Node::document(children)).unwrap()
    }

    fn para(text: &str) -> Node {
        if text.is_empty() {
            return Node::paragraph(vec![]);
        }
        Node::paragraph(vec![Node::text(text)])
    }

    fn cursor(path: Vec<usize>, offset: usize) -> Selection {
        Selection::collapsed(Position::new(path, offset))
    }

    #[test]
    fn test_type_into_empty_document() {
        let d = Document::empty();
        let out = insert_text(&d, &cursor(vec![0], 0), "Hello").unwrap();
        assert_eq!(out.doc.root().children, vec![para("Hello")]);
        assert_eq!(out.selection, cursor(vec![0], 5));
    }

    #[test]
    fn test_typing_inherits_marks() {
        let d = doc(vec![Node::paragraph(vec![Node::text("ab").with_mark(MarkKind::Bold)])]);
        let out = insert_text(&d, &cursor(vec![0], 2), "c").unwrap();
        assert_eq!(
            out.doc.root().children[0].children,
            vec![Node::text("abc").with_mark(MarkKind::Bold)]
        );
    }

    #[test]
    fn test_typing_replaces_selection() {
        let d = doc(vec![para("Hello world")]);
        let sel = Selection::new(Position::new(vec![0], 6), Position::new(vec![0], 11));
        let out = insert_text(&d, &sel, "there").unwrap();
        assert_eq!(out.doc.root().children, vec![para("Hello there")]);
        assert_eq!(out.selection, cursor(vec![0], 11));
    }

    #[test]
    fn test_multiline_text_splits() {
        let out = insert_text(&Document::empty(), &cursor(vec![0], 0), "one\ntwo").unwrap();
        assert_eq!(out.doc.root().children, vec![para("one"), para("two")]);
        assert_eq!(out.selection, cursor(vec![1], 3));
    }

    #[test]
    fn test_delete_across_blocks_joins() {
        let d = doc(vec![para("Hello"), Node::horizontal_rule(), para("world")]);
        let sel = Selection::new(Position::new(vec![0], 2), Position::new(vec![2], 3));
        let out = delete_selection(&d, &sel).unwrap();
        assert_eq!(out.doc.root().children, vec![para("Held")]);
        assert_eq!(out.selection, cursor(vec![0], 2));
    }

    #[test]
    fn test_delete_everything_leaves_empty_paragraph() {
        let d = doc(vec![para("a"), Node::bullet_list(vec![Node::list_item(vec![para("b")])])]);
        let out = delete_selection(&d, &Selection::all(&d)).unwrap();
        assert!(out.doc.is_empty());
        assert_eq!(out.selection, cursor(vec![0], 0));
    }

    #[test]
    fn test_backspace_char_and_join() {
        let d = doc(vec![para("ab"), para("cd")]);
        let out = delete_backward(&d, &cursor(vec![1], 1)).unwrap();
        assert_eq!(out.doc.root().children, vec![para("ab"), para("d")]);
        let out = delete_backward(&out.doc, &cursor(vec![1], 0)).unwrap();
        assert_eq!(out.doc.root().children, vec![para("abd")]);
        assert_eq!(out.selection, cursor(vec![0], 2));
    }

    #[test]
    fn test_backspace_at_start_is_noop() {
        let d = doc(vec![para("ab")]);
        let out = delete_backward(&d, &cursor(vec![0], 0)).unwrap();
        assert_eq!(out.doc, d);
    }

    #[test]
    fn test_backspace_removes_image() {
        let d = doc(vec![Node::image("a.png"), para("x")]);
        let out = delete_backward(&d, &cursor(vec![1], 0)).unwrap();
        assert_eq!(out.doc.root().children, vec![para("x")]);
        assert_eq!(out.selection, cursor(vec![0], 0));
    }

    #[test]
    fn test_backspace_lifts_list_item() {
        let d = doc(vec![Node::bullet_list(vec![
            Node::list_item(vec![para("A")]),
            Node::list_item(vec![para("B")]),
        ])]);
        let out = delete_backward(&d, &cursor(vec![0, 1, 0], 0)).unwrap();
        assert_eq!(
            out.doc.root().children,
            vec![Node::bullet_list(vec![Node::list_item(vec![para("A")])]), para("B")]
        );
        assert_eq!(out.selection, cursor(vec![1], 0));
    }

    #[test]
    fn test_enter_splits_paragraph() {
        let d = doc(vec![para("Hello")]);
        let out = split_block(&d, &cursor(vec![0], 2)).unwrap();
        assert_eq!(out.doc.root().children, vec![para("He"), para("llo")]);
        assert_eq!(out.selection, cursor(vec![1], 0));
    }

    #[test]
    fn test_enter_after_heading_gives_paragraph() {
        let d = doc(vec![Node::heading(1, vec![Node::text("T")])]);
        let out = split_block(&d, &cursor(vec![0], 1)).unwrap();
        assert_eq!(out.doc.root().children[1], para(""));
    }

    #[test]
    fn test_enter_in_list_item() {
        let d = doc(vec![Node::task_list(vec![Node::task_item(true, vec![para("ab")])])]);
        let out = split_block(&d, &cursor(vec![0, 0, 0], 1)).unwrap();
        let list = &out.doc.root().children[0];
        assert_eq!(list.children.len(), 2);
        assert_eq!(list.children[1], Node::task_item(false, vec![para("b")]));
        assert_eq!(out.selection, cursor(vec![0, 1, 0], 0));
    }

    #[test]
    fn test_enter_moves_nested_list_to_new_item() {
        let d = doc(vec![Node::bullet_list(vec![Node::list_item(vec![
            para("ab"),
            Node::bullet_list(vec![Node::list_item(vec![para("c")])]),
        ])])]);
        let out = split_block(&d, &cursor(vec![0, 0, 0], 2)).unwrap();
        let list = &out.doc.root().children[0];
        assert_eq!(list.children[0], Node::list_item(vec![para("ab")]));
        assert_eq!(list.children[1].children.len(), 2);
        assert_eq!(list.children[1].children[0], para(""));
    }

    #[test]
    fn test_enter_on_empty_item_leaves_list() {
        let d = doc(vec![Node::bullet_list(vec![
            Node::list_item(vec![para("A")]),
            Node::list_item(vec![para("")]),
        ])]);
        let out = split_block(&d, &cursor(vec![0, 1, 0], 0)).unwrap();
        assert_eq!(
            out.doc.root().children,
            vec![Node::bullet_list(vec![Node::list_item(vec![para("A")])]), para("")]
        );
        assert_eq!(out.selection, cursor(vec![1], 0));
    }

    #[test]
    fn test_insert_rule_into_empty_paragraph() {
        let out = insert_node(&Document::empty(), &cursor(vec![0], 0), &Node::horizontal_rule()).unwrap();
        assert_eq!(out.doc.root().children, vec![Node::horizontal_rule(), para("")]);
        assert_eq!(out.selection, cursor(vec![1], 0));
    }

    #[test]
    fn test_insert_image_mid_paragraph() {
        let d = doc(vec![para("abcd")]);
        let out = insert_node(&d, &cursor(vec![0], 2), &Node::image("x.png")).unwrap();
        assert_eq!(out.doc.root().children, vec![para("ab"), Node::image("x.png"), para("cd")]);
        assert_eq!(out.selection, cursor(vec![2], 0));
    }

    #[test]
    fn test_insert_heading_into_item_rejected() {
        let d = doc(vec![Node::bullet_list(vec![Node::list_item(vec![para("A")])])]);
        let err = insert_node(&d, &cursor(vec![0, 0, 0], 1), &Node::heading(1, vec![])).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation { .. }));
    }

    #[test]
    fn test_type_after_atom_creates_paragraph() {
        let d = doc(vec![Node::horizontal_rule()]);
        let out = insert_text(&d, &cursor(vec![0], 1), "x").unwrap();
        assert_eq!(out.doc.root().children, vec![Node::horizontal_rule(), para("x")]);
        assert_eq!(out.selection, cursor(vec![1], 1));
    }
}
