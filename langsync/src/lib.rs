#![forbid(unsafe_code)]
//! Localization source engine.
//!
//! Turns structured localization files into a flat `key -> string` model and
//! back, decides which strings need translating, and plans how to batch them.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use langsync::{FormatType, LockStore, SerializeContext, create_parser, traits::Parser};
//!
//! let parser = create_parser(FormatType::Json);
//! let source = parser.parse_file("locales/en.json", "en")?;
//!
//! let lock = LockStore::open("i18n.lock");
//! let changes = lock.get_changes("locales/en.json", &source.document);
//! println!("{} key(s) to translate", changes.len());
//!
//! let target_path = langsync::locale_path::transform("locales/en.json", "en", "fr", ".");
//! let output = parser.serialize(&source.document, &SerializeContext::new("fr"))?;
//! std::fs::write(target_path, output)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Supported Formats
//!
//! - **JSON / YAML / ARB**: nested documents, flattened to dotted keys
//! - **Java properties, Apple `.strings`, `.stringsdict`, `.xcstrings`**
//! - **Android `strings.xml`, generic XML, XLIFF 1.2**
//! - **CSV, gettext PO**
//! - **SubRip, WebVTT**
//! - **HTML, Markdown, MDX**
//! - **TypeScript** modules exporting an object literal

pub mod chunk;
pub mod error;
pub mod flat;
pub mod formats;
pub mod literal;
pub mod locale_path;
pub mod lock;
pub mod traits;
pub mod types;

// Re-export most used types for easy consumption
pub use crate::{
    chunk::{Chunk, ChunkPlan, ChunkPlanner, PromptContext, estimate_tokens},
    error::Error,
    formats::{FormatParser, FormatType, create_parser, create_parser_by_id},
    lock::{Changes, LockStore, SharedLockStore, ValueChange, content_hash},
    types::{FlatDocument, LocalePair, ParseResult, SerializeContext, SideMetadata, TranslationUnit},
};
