use thiserror::Error;

/// Errors raised while preparing or running an analysis.
///
/// Faulting memory accesses in the analyzed program are not errors, they are
/// results, and are found in the [`Report`](crate::explorer::Report).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed input in `{0}`: {1}")]
    MalformedInput(String, String),
    #[error("Unknown identifier `{0}`")]
    UnknownIdentifier(String),
    #[error("Unknown struct or union `{0}`")]
    UnknownAggregate(String),
    #[error("`{0}` has no field `{1}`")]
    UnknownField(String, String),
    #[error("Unknown function `{0}`")]
    UnknownFunction(String),
    #[error("Unresolved label `{0}`")]
    UnresolvedLabel(String),
    #[error("Duplicate label `{0}`")]
    DuplicateLabel(String),
    #[error("Invalid layout: {0}")]
    Layout(String),
    #[error("Analysis error: {0}")]
    Analysis(String),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
}
