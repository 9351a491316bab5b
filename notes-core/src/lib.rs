//! Notes Core - Rich-text document model, editing commands, and markup
//!
//! This crate contains the editing core for notes, independent of any UI:
//! - Document tree validated against a fixed schema
//! - Selection model with position mapping and clamping
//! - Command engine (marks, block kinds, lists, alignment, text editing)
//! - Undo/redo history with typing coalescing
//! - Tiptap-compatible HTML serialization and parsing
//! - Configuration management and note storage

pub mod commands;
pub mod config;
pub mod doc;
pub mod editor;
pub mod error;
pub mod history;
pub mod markup;
pub mod node;
pub mod schema;
pub mod selection;
pub mod store;

// Re-export commonly used types
pub use commands::{Command, Outcome};
pub use config::Config;
pub use doc::Document;
pub use editor::{Editor, Preview, Session};
pub use error::{Error, Result};
pub use history::History;
pub use node::Node;
pub use schema::{Alignment, AttrKey, AttrValue, MarkKind, MarkSet, NodeKind};
pub use selection::{Position, Selection};
pub use store::{DirStore, Note, NoteStore, StoreError};
