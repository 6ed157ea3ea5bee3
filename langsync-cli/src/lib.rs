//! Commands of the `langsync` binary, exposed for testing.

pub mod backend;
pub mod cleanup;
pub mod config;
pub mod lockfile;
pub mod path_glob;
pub mod rekey;
pub mod run;
pub mod status;
pub mod validation;
pub mod workspace;

pub use backend::{BackendKind, PseudoBackend, TranslateRequest, TranslatedUnit, TranslationBackend};
pub use config::Config;
pub use workspace::{SourceFile, Workspace};
