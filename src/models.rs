//! Core data types used throughout medgate.
//!
//! These types represent the users, chunks, and answers that flow through
//! the authentication and retrieval pipeline.

/// A user record as returned by the credential store adapter.
///
/// Immutable snapshot read on demand; the serving path never writes it.
#[derive(Debug, Clone)]
pub struct User {
    pub username: String,
    /// Salted argon2 hash in PHC string format. Never the raw password.
    pub password_hash: String,
}

/// A chunk of source text with its provenance.
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub id: String,
    /// The content domain the chunk came from (e.g. `"technical"`, `"diet"`).
    pub source_label: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// The result of one routed query.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Labels of the sources that contributed, in contribution order.
    pub sources: Vec<String>,
}

impl Answer {
    pub fn from_source(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: vec![source.into()],
        }
    }
}
