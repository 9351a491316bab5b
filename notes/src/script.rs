//! Editing scripts
//!
//! A script drives an [`Editor`] one action per line, the way the toolbar and
//! keyboard would. Blank lines and lines starting with `#` are ignored.
//!
//! ```text
//! type Groceries
//! heading 2
//! enter
//! task-list
//! type milk
//! select 0:0 0:9
//! bold
//! ```

use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use notes_core::schema::Attrs;
use notes_core::{Alignment, AttrKey, AttrValue, Command, Editor, MarkKind, Node, NodeKind, Position, Selection};

/// One parsed script line
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Run(Command),
    Select(Selection),
    SelectAll,
    Undo,
    Redo,
}

/// Parse a whole script, reporting the line number of the first bad line
pub fn parse_script(text: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some(step) = parse_line(line).with_context(|| format!("line {}: {}", idx + 1, line.trim()))? {
            steps.push(step);
        }
    }
    Ok(steps)
}

/// Parse one line; `None` for blanks and comments
pub fn parse_line(line: &str) -> Result<Option<Step>> {
    let line = line.trim_start();
    if line.trim().is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(' ') {
        Some((word, rest)) => (word, rest),
        None => (line.trim_end(), ""),
    };

    let step = match word {
        "type" => Step::Run(Command::InsertText(rest.replace("\\n", "\n"))),
        "bold" => Step::Run(Command::ToggleMark(MarkKind::Bold)),
        "italic" => Step::Run(Command::ToggleMark(MarkKind::Italic)),
        "strike" => Step::Run(Command::ToggleMark(MarkKind::Strike)),
        "heading" => {
            let level: u8 = rest.trim().parse().map_err(|_| anyhow!("heading needs a level 1-6"))?;
            Step::Run(Command::ToggleHeading(level))
        }
        "paragraph" => Step::Run(Command::SetBlockKind {
            kind: NodeKind::Paragraph,
            attrs: Attrs::new(),
        }),
        "bullet-list" => Step::Run(Command::ToggleList(NodeKind::BulletList)),
        "ordered-list" => Step::Run(Command::ToggleList(NodeKind::OrderedList)),
        "task-list" => Step::Run(Command::ToggleList(NodeKind::TaskList)),
        "align" => {
            let alignment =
                Alignment::from_name(rest).ok_or_else(|| anyhow!("unknown alignment '{}'", rest.trim()))?;
            Step::Run(Command::SetAlignment(alignment))
        }
        "blockquote" => Step::Run(Command::ToggleBlockquote),
        "hr" => Step::Run(Command::InsertNode(Node::horizontal_rule())),
        "image" => {
            let (src, alt) = match rest.trim().split_once(' ') {
                Some((src, alt)) => (src, Some(alt.trim())),
                None => (rest.trim(), None),
            };
            if src.is_empty() {
                bail!("image needs a source");
            }
            let mut image = Node::image(src);
            if let Some(alt) = alt.filter(|a| !a.is_empty()) {
                image = image.with_attr(AttrKey::Alt, AttrValue::Str(alt.to_string()));
            }
            Step::Run(Command::InsertNode(image))
        }
        "check" => Step::Run(Command::ToggleChecked),
        "delete" => Step::Run(Command::DeleteSelection),
        "backspace" => Step::Run(Command::DeleteBackward),
        "enter" => Step::Run(Command::SplitBlock),
        "undo" => Step::Undo,
        "redo" => Step::Redo,
        "select-all" => Step::SelectAll,
        "select" => {
            let mut parts = rest.split_whitespace();
            let anchor = parts
                .next()
                .ok_or_else(|| anyhow!("select needs a position"))
                .and_then(parse_position)?;
            let head = match parts.next() {
                Some(part) => parse_position(part)?,
                None => anchor.clone(),
            };
            Step::Select(Selection::new(anchor, head))
        }
        other => bail!("unknown action '{}'", other),
    };
    Ok(Some(step))
}

/// `1.0.2:5` is child 1, its child 0, its child 2, offset 5
fn parse_position(text: &str) -> Result<Position> {
    let (path, offset) = text
        .split_once(':')
        .ok_or_else(|| anyhow!("position '{}' must look like 0.1:3", text))?;
    let path = path
        .split('.')
        .map(|part| part.parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| anyhow!("bad path in position '{}'", text))?;
    let offset = offset
        .parse()
        .map_err(|_| anyhow!("bad offset in position '{}'", text))?;
    Ok(Position::new(path, offset))
}

/// Apply steps in order; returns how many changed the document
pub fn run(editor: &mut Editor, steps: Vec<Step>) -> Result<usize> {
    let mut changes = 0;
    for step in steps {
        debug!("script step {:?}", step);
        let changed = match step {
            Step::Run(command) => {
                let name = command.name();
                editor
                    .execute(command)
                    .with_context(|| format!("{} failed", name))?
            }
            Step::Select(selection) => {
                editor.set_selection(selection);
                false
            }
            Step::SelectAll => {
                editor.select_all();
                false
            }
            Step::Undo => editor.undo(),
            Step::Redo => editor.redo(),
        };
        if changed {
            changes += 1;
        }
    }
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notes_core::Config;

    #[test]
    fn test_parse_actions() -> Result<()> {
        assert_eq!(parse_line("bold")?, Some(Step::Run(Command::ToggleMark(MarkKind::Bold))));
        assert_eq!(parse_line("heading 3")?, Some(Step::Run(Command::ToggleHeading(3))));
        assert_eq!(
            parse_line("align Center")?,
            Some(Step::Run(Command::SetAlignment(Alignment::Center)))
        );
        assert_eq!(
            parse_line("type two\\nlines")?,
            Some(Step::Run(Command::InsertText("two\nlines".to_string())))
        );
        assert_eq!(parse_line("  # comment")?, None);
        assert_eq!(parse_line("")?, None);
        Ok(())
    }

    #[test]
    fn test_parse_select() -> Result<()> {
        assert_eq!(
            parse_line("select 0.1.0:3 2:0")?,
            Some(Step::Select(Selection::new(
                Position::new(vec![0, 1, 0], 3),
                Position::new(vec![2], 0)
            )))
        );
        assert_eq!(
            parse_line("select 1:4")?,
            Some(Step::Select(Selection::collapsed(Position::new(vec![1], 4))))
        );
        assert!(parse_line("select 1").is_err());
        assert!(parse_line("select x:1").is_err());
        Ok(())
    }

    #[test]
    fn test_bad_line_reports_number() {
        let err = parse_script("bold\n\nfrobnicate\n").unwrap_err();
        assert!(format!("{:#}", err).starts_with("line 3: frobnicate"));
    }

    #[test]
    fn test_image_with_alt() -> Result<()> {
        let expected = Node::image("cat.png").with_attr(AttrKey::Alt, AttrValue::Str("a cat".to_string()));
        assert_eq!(
            parse_line("image cat.png a cat")?,
            Some(Step::Run(Command::InsertNode(expected)))
        );
        assert!(parse_line("image").is_err());
        Ok(())
    }

    #[test]
    fn test_run_script() -> Result<()> {
        let mut editor = Editor::open("", &Config::default())?;
        let steps = parse_script(
            "type Groceries\n\
             heading 2\n\
             enter\n\
             task-list\n\
             type milk\n\
             check\n\
             undo\n",
        )?;
        let changes = run(&mut editor, steps)?;
        assert_eq!(changes, 7);
        assert_eq!(
            editor.markup(),
            "<h2>Groceries</h2><ul data-type=\"taskList\">\
             <li data-checked=\"false\" data-type=\"taskItem\"><label><input type=\"checkbox\"><span></span></label><div><p>milk</p></div></li>\
             </ul>"
        );
        Ok(())
    }

    #[test]
    fn test_rejected_command_stops_script() -> Result<()> {
        let mut editor = Editor::open("<ul><li><p>item</p></li></ul>", &Config::default())?;
        let steps = parse_script("heading 1\ntype never")?;
        assert!(run(&mut editor, steps).is_err());
        assert_eq!(editor.markup(), "<ul><li><p>item</p></li></ul>");
        Ok(())
    }
}
