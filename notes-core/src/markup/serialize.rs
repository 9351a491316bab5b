use super::{escape_attr, escape_text, IMAGE_CLASS};
use crate::doc::Document;
use crate::node::{normalize_inline, Node};
use crate::schema::{AttrKey, AttrValue, MarkKind, NodeKind};

/// Render a document to its canonical markup
pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    for child in &doc.root().children {
        write_node(&mut out, child);
    }
    out
}

fn write_node(out: &mut String, node: &Node) {
    match node.kind {
        NodeKind::Document => write_children(out, node),
        NodeKind::Paragraph => write_textblock(out, "p", node),
        NodeKind::Heading => {
            let tag = format!("h{}", node.level().unwrap_or(1));
            write_textblock(out, &tag, node);
        }
        NodeKind::BulletList => wrap(out, "<ul>", "</ul>", node),
        NodeKind::OrderedList => {
            let open = match node.attr(AttrKey::Start).and_then(AttrValue::as_int) {
                Some(start) => format!("<ol start=\"{}\">", start),
                None => "<ol>".to_string(),
            };
            wrap(out, &open, "</ol>", node);
        }
        NodeKind::TaskList => wrap(out, "<ul data-type=\"taskList\">", "</ul>", node),
        NodeKind::ListItem => wrap(out, "<li>", "</li>", node),
        NodeKind::TaskItem => {
            let checked = node.checked().unwrap_or(false);
            let open = format!(
                "<li data-checked=\"{}\" data-type=\"taskItem\"><label><input type=\"checkbox\"{}><span></span></label><div>",
                checked,
                if checked { " checked=\"checked\"" } else { "" }
            );
            wrap(out, &open, "</div></li>", node);
        }
        NodeKind::Blockquote => wrap(out, "<blockquote>", "</blockquote>", node),
        NodeKind::HorizontalRule => out.push_str("<hr>"),
        NodeKind::Image => write_image(out, node),
        NodeKind::Text => write_text(out, node),
    }
}

fn write_children(out: &mut String, node: &Node) {
    for child in &node.children {
        write_node(out, child);
    }
}

fn wrap(out: &mut String, open: &str, close: &str, node: &Node) {
    out.push_str(open);
    write_children(out, node);
    out.push_str(close);
}

fn write_textblock(out: &mut String, tag: &str, node: &Node) {
    out.push('<');
    out.push_str(tag);
    if let Some(align) = node.alignment() {
        out.push_str(&format!(" style=\"text-align: {}\"", align.name()));
    }
    out.push('>');
    for child in normalize_inline(node.children.clone()) {
        write_text(out, &child);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn write_image(out: &mut String, node: &Node) {
    out.push_str(&format!("<img class=\"{}\"", IMAGE_CLASS));
    for (key, name) in [(AttrKey::Src, "src"), (AttrKey::Alt, "alt"), (AttrKey::Title, "title")] {
        if let Some(value) = node.attr(key).and_then(AttrValue::as_str) {
            out.push_str(&format!(" {}=\"{}\"", name, escape_attr(value)));
        }
    }
    out.push('>');
}

pub(crate) fn mark_tag(mark: MarkKind) -> &'static str {
    match mark {
        MarkKind::Bold => "strong",
        MarkKind::Italic => "em",
        MarkKind::Strike => "s",
    }
}

fn write_text(out: &mut String, node: &Node) {
    let marks: Vec<MarkKind> = node.marks.iter().collect();
    for mark in &marks {
        out.push('<');
        out.push_str(mark_tag(*mark));
        out.push('>');
    }
    out.push_str(&escape_text(&node.text).replace('\n', "<br>"));
    for mark in marks.iter().rev() {
        out.push_str("</");
        out.push_str(mark_tag(*mark));
        out.push('>');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Alignment;

    fn render(children: Vec<Node>) -> String {
        serialize(&Document::new(Node::document(children)).unwrap())
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(serialize(&Document::empty()), "<p></p>");
    }

    #[test]
    fn test_marks_nest_in_canonical_order() {
        let text = Node::text("x").with_mark(MarkKind::Strike).with_mark(MarkKind::Bold);
        assert_eq!(render(vec![Node::paragraph(vec![text])]), "<p><strong><s>x</s></strong></p>");
    }

    #[test]
    fn test_heading_alignment() {
        let heading = Node::heading(2, vec![Node::text("T")])
            .with_attr(AttrKey::TextAlign, AttrValue::Align(Alignment::Center));
        assert_eq!(render(vec![heading]), "<h2 style=\"text-align: center\">T</h2>");
    }

    #[test]
    fn test_task_list() {
        let list = Node::task_list(vec![
            Node::task_item(true, vec![Node::paragraph(vec![Node::text("done")])]),
            Node::task_item(false, vec![Node::paragraph(vec![])]),
        ]);
        assert_eq!(
            render(vec![list]),
            "<ul data-type=\"taskList\">\
             <li data-checked=\"true\" data-type=\"taskItem\"><label><input type=\"checkbox\" checked=\"checked\"><span></span></label><div><p>done</p></div></li>\
             <li data-checked=\"false\" data-type=\"taskItem\"><label><input type=\"checkbox\"><span></span></label><div><p></p></div></li>\
             </ul>"
        );
    }

    #[test]
    fn test_ordered_list_start_and_image() {
        let list = Node::ordered_list(vec![Node::list_item(vec![Node::paragraph(vec![Node::text("a")])])])
            .with_attr(AttrKey::Start, AttrValue::Int(3));
        let image = Node::image("a.png?x=1&y=\"2\"").with_attr(AttrKey::Alt, AttrValue::Str("cat".into()));
        assert_eq!(
            render(vec![list, Node::horizontal_rule(), image]),
            "<ol start=\"3\"><li><p>a</p></li></ol><hr>\
             <img class=\"tiptap-image\" src=\"a.png?x=1&amp;y=&quot;2&quot;\" alt=\"cat\">"
        );
    }

    #[test]
    fn test_text_is_escaped() {
        assert_eq!(
            render(vec![Node::paragraph(vec![Node::text("<script>&")])]),
            "<p>&lt;script&gt;&amp;</p>"
        );
    }

    #[test]
    fn test_equal_runs_render_as_one() {
        let runs = vec![
            Node::text("He").with_mark(MarkKind::Bold),
            Node::text("llo").with_mark(MarkKind::Bold),
            Node::text(" there"),
        ];
        assert_eq!(render(vec![Node::paragraph(runs)]), "<p><strong>Hello</strong> there</p>");
    }

    #[test]
    fn test_newline_renders_as_hard_break() {
        let text = Node::text("a\nb").with_mark(MarkKind::Italic);
        assert_eq!(render(vec![Node::paragraph(vec![text])]), "<p><em>a<br>b</em></p>");
    }
}
