use std::path::PathBuf;
use thiserror::Error;

/// Fatal, non-in-band failures: everything that keeps compilation from even
/// starting. Lexer/parser/generator diagnostics are deliberately *not*
/// represented here — those are collected alongside a (possibly partial)
/// result rather than aborting the pipeline, per the error-propagation
/// policy the rest of this crate follows.
#[derive(Debug, Error)]
pub enum Pl0Error {
    #[error("could not read source file {path}: {source}")]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
