//! notes - Create, edit and share rich-text notes from the command line

mod script;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use notes_core::store::validate_note;
use notes_core::{markup, Config, DirStore, Editor, NoteStore, Session};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Rich-text notes stored as Tiptap-compatible HTML
#[derive(Parser, Debug)]
#[command(name = "notes")]
#[command(version, about, long_about = None)]
struct Args {
    /// Note directory (defaults to the configured or platform data dir)
    #[arg(long, global = true, value_name = "DIR")]
    store: Option<PathBuf>,

    /// Who is acting; only a note's author may change it
    #[arg(long, global = true, env = "NOTES_USER", default_value = "me")]
    user: String,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Create a note from markup or an editing script
    New {
        #[arg(long)]
        title: String,
        /// Initial markup
        #[arg(long, conflicts_with = "script")]
        content: Option<String>,
        /// Editing script applied to an empty document ("-" for stdin)
        #[arg(long, value_name = "FILE")]
        script: Option<PathBuf>,
    },
    /// List all notes
    List,
    /// Print a note; non-authors see the read-only rendering
    Show {
        id: Uuid,
        /// Plain text instead of markup
        #[arg(long)]
        text: bool,
    },
    /// Apply an editing script to a note you authored
    Edit {
        id: Uuid,
        #[arg(long, value_name = "FILE")]
        script: PathBuf,
        /// Rename the note as well
        #[arg(long)]
        title: Option<String>,
    },
    /// Delete a note you authored
    Delete { id: Uuid },
    /// Validate markup and print its canonical form ("-" for stdin)
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = Config::load().context("Failed to load configuration")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Cmd::Check { file } = &args.command {
        return check(file, &mut out);
    }

    let dir = match args.store.clone().or_else(|| config.store.resolve_dir()) {
        Some(dir) => dir,
        None => bail!("No note directory: pass --store or set store.dir in the config file"),
    };
    let mut store = DirStore::open(&dir)?;
    execute(args.command, &args.user, &config, &mut store, &mut out)
}

fn execute(cmd: Cmd, user: &str, config: &Config, store: &mut impl NoteStore, out: &mut impl Write) -> Result<()> {
    match cmd {
        Cmd::New { title, content, script } => {
            let content = match (content, script) {
                (Some(markup), _) => markup,
                (None, Some(path)) => {
                    let mut editor = Editor::open("", config)?;
                    script::run(&mut editor, script::parse_script(&read_input(&path)?)?)?;
                    editor.markup()
                }
                (None, None) => bail!("Pass --content or --script"),
            };
            validate_note(&title, &content)?;
            let note = store.create(user, &title, &markup::serialize(&markup::parse(&content)?))?;
            writeln!(out, "{}", note.id)?;
        }
        Cmd::List => {
            for note in store.list()? {
                writeln!(out, "{}  {}  ({})", note.id, note.title, note.author)?;
            }
        }
        Cmd::Show { id, text } => {
            let note = store.load(id)?;
            let session = Session::open(&note.content, note.is_authored_by(user), config)
                .with_context(|| format!("Note {} has unreadable content", id))?;
            match (&session, text) {
                (Session::Editing(editor), true) => writeln!(out, "{}", editor.document().text_content())?,
                (Session::Viewing(preview), true) => writeln!(out, "{}", preview.plain_text())?,
                (_, false) => writeln!(out, "{}", session.render())?,
            }
        }
        Cmd::Edit { id, script, title } => {
            let note = store.load(id)?;
            let mut session = Session::open(&note.content, note.is_authored_by(user), config)?;
            let editor = match session.editor_mut() {
                Some(editor) => editor,
                None => bail!("{} is not the author of note {}", user, id),
            };
            let changes = script::run(editor, script::parse_script(&read_input(&script)?)?)?;
            let title = title.unwrap_or_else(|| note.title.clone());
            if changes == 0 && title == note.title {
                log::info!("script left note {} unchanged", id);
                return Ok(());
            }
            let content = editor.markup();
            validate_note(&title, &content)?;
            store.update(id, user, &title, &content)?;
            editor.mark_saved();
            writeln!(out, "{}", content)?;
        }
        Cmd::Delete { id } => {
            store.delete(id, user)?;
        }
        Cmd::Check { file } => check(&file, out)?,
    }
    Ok(())
}

fn check(path: &Path, out: &mut impl Write) -> Result<()> {
    let input = read_input(path)?;
    let doc = markup::parse(&input).with_context(|| format!("Invalid markup in {}", path.display()))?;
    writeln!(out, "{}", markup::serialize(&doc))?;
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        let cmd = Args::command();
        cmd.clone().debug_assert();
        assert_eq!(cmd.get_name(), "notes");
        assert!(cmd.get_author().is_none());
    }

    fn output(cmd: Cmd, user: &str, store: &mut DirStore) -> Result<String> {
        let mut out = Vec::new();
        execute(cmd, user, &Config::default(), store, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn test_new_show_edit() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = DirStore::open(dir.path())?;

        let id: Uuid = output(
            Cmd::New {
                title: "Plan".to_string(),
                content: Some("<P>draft</P>".to_string()),
                script: None,
            },
            "ann",
            &mut store,
        )?
        .trim()
        .parse()?;
        assert_eq!(store.load(id)?.content, "<p>draft</p>");

        let script_path = dir.path().join("edit.script");
        fs::write(&script_path, "select-all\nbold\n")?;
        let edited = output(
            Cmd::Edit {
                id,
                script: script_path,
                title: None,
            },
            "ann",
            &mut store,
        )?;
        assert_eq!(edited.trim(), "<p><strong>draft</strong></p>");

        let shown = output(Cmd::Show { id, text: true }, "bob", &mut store)?;
        assert_eq!(shown.trim(), "draft");
        Ok(())
    }

    #[test]
    fn test_non_author_cannot_edit_or_delete() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = DirStore::open(dir.path())?;
        let note = store.create("ann", "Mine", "<p>x</p>")?;
        let script_path = dir.path().join("edit.script");
        fs::write(&script_path, "type y\n")?;

        let edit = Cmd::Edit {
            id: note.id,
            script: script_path,
            title: None,
        };
        assert!(output(edit, "bob", &mut store).is_err());
        assert!(output(Cmd::Delete { id: note.id }, "bob", &mut store).is_err());
        assert_eq!(store.load(note.id)?.content, "<p>x</p>");
        Ok(())
    }

    #[test]
    fn test_new_rejects_empty_content() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = DirStore::open(dir.path())?;
        let result = output(
            Cmd::New {
                title: "Empty".to_string(),
                content: Some("<p></p>".to_string()),
                script: None,
            },
            "ann",
            &mut store,
        );
        assert!(result.is_err());
        assert!(store.list()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_check_canonicalizes() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("note.html");
        fs::write(&path, "<p><b>x</b><i>y</i></p>")?;
        let mut out = Vec::new();
        check(&path, &mut out)?;
        assert_eq!(String::from_utf8(out)?.trim(), "<p><strong>x</strong><em>y</em></p>");
        Ok(())
    }
}
