use log::warn;
use std::iter::Peekable;
use std::vec::IntoIter;

use super::tokenizer::{tokenize, Token};
use crate::doc::Document;
use crate::error::{Error, Result};
use crate::node::{normalize_inline, Node};
use crate::schema::{Alignment, AttrKey, AttrValue, MarkKind, MarkSet, NodeKind, MAX_DEPTH};

/// Deepest element nesting the parser follows. Task items add a wrapper
/// `<div>` per level and marks add up to three tags, so every valid tree fits.
pub const MAX_NESTING: usize = 2 * MAX_DEPTH + 8;

/// Parse stored markup into a validated document.
///
/// Empty or whitespace-only input yields the empty document. Anything that
/// does not map onto a schema-valid tree fails as a whole with
/// [`Error::MalformedMarkup`] pointing at the offending node.
pub fn parse(markup: &str) -> Result<Document> {
    if markup.trim().is_empty() {
        return Ok(Document::empty());
    }

    let result = tokenize(markup).and_then(|tokens| {
        let mut parser = Parser {
            tokens: tokens.into_iter().peekable(),
            path: Vec::new(),
            depth: 0,
        };
        let mut children = Vec::new();
        parser.blocks(NodeKind::Document, None, &mut children)?;
        Document::new(Node::document(children)).map_err(|err| match err {
            Error::SchemaViolation { path, kind, reason } => Error::MalformedMarkup {
                path,
                node: kind.name().to_string(),
                reason,
            },
            other => other,
        })
    });

    if let Err(err) = &result {
        warn!("rejected markup: {}", err);
    }
    result
}

struct Parser {
    tokens: Peekable<IntoIter<Token>>,
    path: Vec<usize>,
    /// Open elements being parsed recursively
    depth: usize,
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn mark_for_tag(tag: &str) -> Option<MarkKind> {
    match tag {
        "strong" | "b" => Some(MarkKind::Bold),
        "em" | "i" => Some(MarkKind::Italic),
        "s" | "strike" | "del" => Some(MarkKind::Strike),
        _ => None,
    }
}

impl Parser {
    fn error(&self, node: &str, reason: impl Into<String>) -> Error {
        Error::malformed(&self.path, node, reason)
    }

    /// Run `f` one element deeper, failing past [`MAX_NESTING`]
    fn nested<T>(&mut self, tag: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(tag, "nesting too deep"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Parse block children into `out` until `</close>`, or end of input when `close` is `None`.
    ///
    /// Inside a task item the checkbox `<label>` is skipped and the content `<div>` unwrapped.
    fn blocks(&mut self, parent: NodeKind, close: Option<&str>, out: &mut Vec<Node>) -> Result<()> {
        loop {
            match self.tokens.next() {
                None => {
                    return match close {
                        None => Ok(()),
                        Some(tag) => Err(self.error(tag, "unexpected end of input")),
                    }
                }
                Some(Token::End { name }) => {
                    if close == Some(name.as_str()) {
                        return Ok(());
                    }
                    return Err(self.error(&name, format!("unexpected closing tag inside {}", parent)));
                }
                Some(Token::Text(text)) => {
                    if !text.trim().is_empty() {
                        return Err(self.error(parent.name(), format!("text is not allowed inside {}", parent)));
                    }
                }
                Some(Token::Start { name, .. }) if parent == NodeKind::TaskItem && name == "label" => {
                    self.skip_element("label")?;
                }
                Some(Token::Start { name, .. }) if parent == NodeKind::TaskItem && name == "div" => {
                    self.nested("div", |p| p.blocks(parent, Some("div"), out))?;
                }
                Some(Token::Start {
                    name,
                    attrs,
                    self_closing,
                }) => {
                    self.path.push(out.len());
                    let node = self.block(parent, &name, &attrs, self_closing)?;
                    self.path.pop();
                    out.push(node);
                }
            }
        }
    }

    fn block(&mut self, parent: NodeKind, name: &str, attrs: &[(String, String)], self_closing: bool) -> Result<Node> {
        let node = match name {
            "p" => {
                let node = self.textblock(Node::paragraph(Vec::new()), name, self_closing)?;
                self.with_alignment(node, name, attrs)?
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse().unwrap_or(1);
                let node = self.textblock(Node::heading(level, Vec::new()), name, self_closing)?;
                self.with_alignment(node, name, attrs)?
            }
            "ul" => {
                let kind = if attr(attrs, "data-type") == Some("taskList") {
                    NodeKind::TaskList
                } else {
                    NodeKind::BulletList
                };
                self.container(Node::new(kind), name, self_closing)?
            }
            "ol" => {
                let mut list = Node::ordered_list(Vec::new());
                if let Some(start) = attr(attrs, "start") {
                    let start: u32 = start
                        .trim()
                        .parse()
                        .map_err(|_| self.error(name, format!("invalid start `{}`", start)))?;
                    list.attrs.insert(AttrKey::Start, AttrValue::Int(start));
                }
                self.container(list, name, self_closing)?
            }
            "li" => {
                let item = if attr(attrs, "data-type") == Some("taskItem") {
                    Node::task_item(attr(attrs, "data-checked") == Some("true"), Vec::new())
                } else {
                    Node::list_item(Vec::new())
                };
                self.container(item, name, self_closing)?
            }
            "blockquote" => self.container(Node::blockquote(Vec::new()), name, self_closing)?,
            "hr" => Node::horizontal_rule(),
            "img" => {
                let mut image = Node::new(NodeKind::Image);
                for (key, attr_name) in [(AttrKey::Src, "src"), (AttrKey::Alt, "alt"), (AttrKey::Title, "title")] {
                    if let Some(value) = attr(attrs, attr_name) {
                        image.attrs.insert(key, AttrValue::Str(value.to_string()));
                    }
                }
                image
            }
            other => {
                return Err(self.error(other, format!("<{}> is not allowed inside {}", other, parent)));
            }
        };
        Ok(node)
    }

    fn container(&mut self, mut node: Node, tag: &str, self_closing: bool) -> Result<Node> {
        if !self_closing {
            self.nested(tag, |p| p.blocks(node.kind, Some(tag), &mut node.children))?;
        }
        Ok(node)
    }

    fn textblock(&mut self, mut node: Node, tag: &str, self_closing: bool) -> Result<Node> {
        if !self_closing {
            self.nested(tag, |p| p.inline(node.kind, tag, MarkSet::EMPTY, &mut node.children))?;
        }
        node.children = normalize_inline(std::mem::take(&mut node.children));
        Ok(node)
    }

    fn with_alignment(&self, node: Node, tag: &str, attrs: &[(String, String)]) -> Result<Node> {
        let Some(style) = attr(attrs, "style") else {
            return Ok(node);
        };
        for declaration in style.split(';') {
            let Some((property, value)) = declaration.split_once(':') else {
                continue;
            };
            if property.trim().eq_ignore_ascii_case("text-align") {
                let alignment = Alignment::from_name(value)
                    .ok_or_else(|| self.error(tag, format!("unknown alignment `{}`", value.trim())))?;
                return Ok(node.with_attr(AttrKey::TextAlign, AttrValue::Align(alignment)));
            }
        }
        Ok(node)
    }

    /// Collect text runs until `</close>`, accumulating marks from enclosing mark tags.
    fn inline(&mut self, parent: NodeKind, close: &str, marks: MarkSet, out: &mut Vec<Node>) -> Result<()> {
        loop {
            match self.tokens.next() {
                None => return Err(self.error(close, "unexpected end of input")),
                Some(Token::End { name }) => {
                    if name == close {
                        return Ok(());
                    }
                    return Err(self.error(&name, format!("unexpected closing tag inside {}", parent)));
                }
                Some(Token::Text(text)) => {
                    if !text.is_empty() {
                        // Source line breaks are whitespace; only <br> breaks a line
                        let text = text.replace("\r\n", " ").replace(|c: char| c == '\n' || c == '\r', " ");
                        out.push(Node::text(text).with_marks(marks));
                    }
                }
                Some(Token::Start { name, .. }) if name == "br" => {
                    out.push(Node::text("\n").with_marks(marks));
                }
                Some(Token::Start { name, self_closing, .. }) => match mark_for_tag(&name) {
                    Some(mark) => {
                        if !self_closing {
                            self.nested(&name, |p| p.inline(parent, &name, marks.with(mark), out))?;
                        }
                    }
                    None => {
                        self.path.push(out.len());
                        return Err(self.error(&name, format!("<{}> is not allowed inside {}", name, parent)));
                    }
                },
            }
        }
    }

    /// Skip an element and everything inside it.
    fn skip_element(&mut self, tag: &str) -> Result<()> {
        let mut depth = 0usize;
        loop {
            match self.tokens.next() {
                None => return Err(self.error(tag, "unexpected end of input")),
                Some(Token::Start { name, self_closing, .. }) if name == tag && !self_closing => depth += 1,
                Some(Token::End { name }) if name == tag => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                Some(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::serialize;

    fn para(text: &str) -> Node {
        Node::paragraph(vec![Node::text(text)])
    }

    #[test]
    fn test_blank_input_is_empty_document() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("  \n ").unwrap().is_empty());
        assert!(parse("<p></p>").unwrap().is_empty());
    }

    #[test]
    fn test_marks_and_aliases() {
        let doc = parse("<p>a<b>b<i>c</i></b><del>d</del></p>").unwrap();
        assert_eq!(
            doc.root().children[0].children,
            vec![
                Node::text("a"),
                Node::text("b").with_mark(MarkKind::Bold),
                Node::text("c").with_mark(MarkKind::Bold).with_mark(MarkKind::Italic),
                Node::text("d").with_mark(MarkKind::Strike),
            ]
        );
    }

    #[test]
    fn test_whitespace_between_blocks_ignored() {
        let doc = parse("<ul>\n  <li><p>A</p></li>\n</ul>\n").unwrap();
        assert_eq!(doc.root().children, vec![Node::bullet_list(vec![Node::list_item(vec![para("A")])])]);
    }

    #[test]
    fn test_task_item_markup() {
        let markup = "<ul data-type=\"taskList\"><li data-checked=\"true\" data-type=\"taskItem\"><label><input type=\"checkbox\" checked=\"checked\"><span></span></label><div><p>done</p></div></li></ul>";
        let doc = parse(markup).unwrap();
        assert_eq!(
            doc.root().children,
            vec![Node::task_list(vec![Node::task_item(true, vec![para("done")])])]
        );
        assert_eq!(serialize(&doc), markup);
    }

    #[test]
    fn test_alignment_style() {
        let doc = parse("<h3 style=\"color: red; text-align: right\">T</h3>").unwrap();
        assert_eq!(doc.root().children[0].alignment(), Some(Alignment::Right));
        assert!(parse("<p style=\"text-align: sideways\">x</p>").is_err());
    }

    #[test]
    fn test_entities_in_text_and_attributes() {
        let doc = parse("<p>1 &lt; 2 &amp;&amp; &copy;</p><img src=\"a.png?x=1&amp;y=2\" alt=\"&quot;cat&quot;\">").unwrap();
        assert_eq!(doc.root().children[0], para("1 < 2 && &copy;"));
        let image = &doc.root().children[1];
        assert_eq!(image.attr(AttrKey::Src).and_then(AttrValue::as_str), Some("a.png?x=1&y=2"));
        assert_eq!(image.attr(AttrKey::Alt).and_then(AttrValue::as_str), Some("\"cat\""));
    }

    #[test]
    fn test_rejects_list_item_outside_list() {
        match parse("<p>a</p><li><p>b</p></li>") {
            Err(Error::MalformedMarkup { path, node, .. }) => {
                assert_eq!(path, vec![1]);
                assert_eq!(node, "listItem");
            }
            other => panic!("expected malformed markup, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_tag_with_path() {
        match parse("<ul><li><p>a<span>b</span></p></li></ul>") {
            Err(Error::MalformedMarkup { path, node, .. }) => {
                assert_eq!(path, vec![0, 0, 0, 1]);
                assert_eq!(node, "span");
            }
            other => panic!("expected malformed markup, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_structural_problems() {
        assert!(parse("<p>unclosed").is_err());
        assert!(parse("<p>a</em></p>").is_err());
        assert!(parse("loose text").is_err());
        assert!(parse("<ul></ul>").is_err());
        assert!(parse("<img>").is_err());
        assert!(parse("<img src=\"javascript:alert(1)\">").is_err());
        assert!(parse("<ul><li><h1>x</h1></li></ul>").is_err());
    }

    #[test]
    fn test_ordered_list_start() {
        let doc = parse("<ol start=\"4\"><li><p>x</p></li></ol>").unwrap();
        assert_eq!(doc.root().children[0].attr(AttrKey::Start), Some(&AttrValue::Int(4)));
        assert!(parse("<ol start=\"four\"><li><p>x</p></li></ol>").is_err());
    }

    #[test]
    fn test_hard_break_is_newline_in_text() {
        let doc = parse("<p>line one<br>line <strong>two<br/>three</strong></p>").unwrap();
        assert_eq!(doc.root().children[0].text_content(), "line one\nline two\nthree");
        assert_eq!(
            serialize(&doc),
            "<p>line one<br>line <strong>two<br>three</strong></p>"
        );
        assert_eq!(parse(&serialize(&doc)).unwrap(), doc);
    }

    #[test]
    fn test_source_newlines_are_spaces() {
        let doc = parse("<p>one\ntwo\r\nthree</p>").unwrap();
        assert_eq!(doc.root().children[0].text_content(), "one two three");
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let deep = format!("{}<p>x</p>{}", "<blockquote>".repeat(2000), "</blockquote>".repeat(2000));
        match parse(&deep) {
            Err(Error::MalformedMarkup { reason, .. }) => assert!(reason.contains("nesting too deep")),
            other => panic!("expected malformed markup, got {:?}", other.map(|d| d.root().children.len())),
        }

        let marks = format!("<p>{}x{}</p>", "<strong>".repeat(5000), "</strong>".repeat(5000));
        assert!(matches!(parse(&marks), Err(Error::MalformedMarkup { .. })));

        // Within the markup limit but deeper than a document may be
        let quotes = MAX_DEPTH + 5;
        let tall = format!("{}<p>x</p>{}", "<blockquote>".repeat(quotes), "</blockquote>".repeat(quotes));
        match parse(&tall) {
            Err(Error::MalformedMarkup { path, reason, .. }) => {
                assert_eq!(path.len(), MAX_DEPTH + 1);
                assert_eq!(reason, "nesting too deep");
            }
            other => panic!("expected malformed markup, got {:?}", other.map(|d| d.root().children.len())),
        }
    }
}
