//! Recovers source files from raw code-generation responses, including
//! truncated and malformed ones, and applies deterministic local fixes to the
//! recovered file set.

pub mod cli;
pub mod commands;
pub mod errors;
pub mod file_processing;
pub mod local_fix;
pub mod models;
pub mod parsing;
pub mod utils;

pub use errors::AppError;
pub use local_fix::{FixRequest, LocalFixEngine, SymbolTable};
pub use models::{
    BatchInfo, Dialect, FileAction, FileEntry, FixKind, LocalFixResult, ManifestEntry, ParseResult,
    Plan, PlanEntry, RecoveryStatus,
};
pub use parsing::{
    detect_dialect, is_complete, parse_response, plan_continuation, ContinuationRequest,
};
pub use utils::config::ParserConfig;
