use tally_oxide::PatternError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstrumentError {
    /// The file could not be parsed; it has to be served without instrumentation.
    #[error("failed to parse {file}: {message}")]
    Parse { file: String, message: String },
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
