use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    #[error("Unknown theme: {0}")]
    UnknownTheme(String),

    #[error("Unknown theme token: {0}")]
    UnknownToken(String),

    #[error("Invalid theme token: {0}")]
    InvalidToken(String),

    #[error("Invalid property path: {0:?}")]
    InvalidPath(String),

    #[error("Schema cycle through component: {0}")]
    Cycle(String),

    #[error("Invalid catalog data: {0}")]
    InvalidData(String),
}

impl From<serde_json::Error> for SchemaError {
    fn from(e: serde_json::Error) -> Self {
        SchemaError::InvalidData(e.to_string())
    }
}
