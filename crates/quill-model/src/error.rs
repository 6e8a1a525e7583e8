use thiserror::Error;

/// A program that cannot be turned into an AST.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid program: {0}")]
    Json(#[from] serde_json::Error),

    #[error("empty name in `{0}`")]
    EmptyName(String),
}
