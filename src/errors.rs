use thiserror::Error;

/// Errors raised by grouping, lookup, and diff operations.
///
/// Duplicate keys in a lookup index are deliberately not here: the later
/// node shadows the earlier one and a `tracing` warning is emitted instead.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GroupError {
    #[error("empty lookup path")]
    InvalidQuery,

    #[error("cannot descend below leaf node '{value}': {remaining} path segment(s) left")]
    LookupOnLeaf { value: String, remaining: usize },

    #[error(
        "multi-level fan-out grouping is ambiguous: name the fan-out dimensions with FanOut::Dims"
    )]
    AmbiguousMultiValuedConfig,

    #[error("cannot combine nodes from different dimensions: '{from}' vs '{to}'")]
    DimensionMismatch { from: String, to: String },
}

pub type GroupResult<T> = Result<T, GroupError>;
