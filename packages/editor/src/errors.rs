//! Error types for the engine

use composer_schema::SchemaError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(#[from] crate::validate::ValidationError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] crate::workspace::LookupError),

    #[error("Mutation error: {0}")]
    Mutation(#[from] crate::mutations::MutationError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] crate::resolve::ResolveError),

    #[error("Migration error: {0}")]
    Migration(#[from] crate::migrations::MigrationError),

    #[error("Integrity error: {0}")]
    Integrity(#[from] crate::verify::IntegrityError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl EngineError {
    /// Hard stops mean the document itself is unusable, not that the edit was wrong
    pub fn is_hard_stop(&self) -> bool {
        matches!(self, EngineError::Integrity(_) | EngineError::Migration(_))
    }
}
