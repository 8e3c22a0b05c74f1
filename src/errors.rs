use thiserror::Error;

/// Errors surfaced by the tree engine.
///
/// `InvalidMoveToDescendant` and `PathOverflow` are the two named failures
/// the mutation algebra can produce by design; `Contract` covers malformed
/// input caught before any write; `Storage` wraps the adapter's own errors
/// verbatim.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("cannot move node {node} into its own subtree (target {target} is a descendant)")]
    InvalidMoveToDescendant { node: i64, target: i64 },

    /// Reserved for encoding-space exhaustion under a capped interval width.
    /// Unreachable with the tight (unbounded) interval scheme this crate
    /// uses; kept for API compatibility with callers that match on it.
    #[error("interval space exhausted for tree {0}")]
    PathOverflow(i32),

    #[error("invalid position token for this operation: {0}")]
    InvalidPosition(&'static str),

    #[error("malformed bulk record: {0}")]
    MalformedRecord(String),

    #[error("node {0} not found")]
    NodeNotFound(i64),

    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}
