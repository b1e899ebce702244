//! The recovery pipeline: detect the dialect, extract, cross-validate.

pub mod completeness;
pub mod continuation;
pub mod delimited;
pub mod detector;
pub mod envelope;
pub mod fallback;
pub mod patterns;
pub mod repair;
pub mod validator;

pub use completeness::is_complete;
pub use continuation::{plan_continuation, ContinuationRequest};
pub use detector::detect_dialect;
pub use validator::cross_validate;

use crate::models::{Dialect, ParseResult, ResultBuilder};
use crate::utils::config::ParserConfig;
use delimited::DelimitedExtractor;
use envelope::EnvelopeExtractor;
use fallback::FallbackExtractor;

/// One producer dialect's reader.
pub trait Extractor {
    fn dialect(&self) -> Dialect;

    /// Reads every file and metadata block it can find. Never fails; problems
    /// are recorded on the returned builder.
    fn extract(&self, raw: &str, config: &ParserConfig) -> ResultBuilder;
}

fn unrecognized(raw: &str) -> ResultBuilder {
    let mut builder = ResultBuilder::new(Dialect::Unknown);
    if raw.trim().is_empty() {
        builder.error("Response is empty");
    } else {
        builder.error("Response contains no recognizable files");
    }
    builder
}

/// Runs the extractor for an already known dialect.
pub fn extract_with(dialect: Dialect, raw: &str, config: &ParserConfig) -> ResultBuilder {
    match dialect {
        Dialect::EnvelopeV2 => EnvelopeExtractor::v2().extract(raw, config),
        Dialect::EnvelopeV1 => EnvelopeExtractor::v1().extract(raw, config),
        Dialect::DelimitedV2 => DelimitedExtractor::v2().extract(raw, config),
        Dialect::DelimitedV1 => DelimitedExtractor::v1().extract(raw, config),
        Dialect::Fallback => FallbackExtractor.extract(raw, config),
        Dialect::Unknown => unrecognized(raw),
    }
}

/// Turns a raw model response into a [`ParseResult`].
pub fn parse_response(raw: &str, config: &ParserConfig) -> ParseResult {
    let dialect = detect_dialect(raw, config);
    let mut builder = extract_with(dialect, raw, config);

    let mismatches = cross_validate(
        builder.manifest(),
        builder.plan(),
        builder.batch(),
        builder.files(),
    );
    for warning in mismatches {
        builder.warn(warning);
    }

    let result = builder.finish();
    log::info!(
        "Parsed {} response: {} file(s), {} incomplete, status {:?}",
        result.dialect(),
        result.files().len(),
        result.incomplete_paths().len(),
        result.status()
    );
    result
}
