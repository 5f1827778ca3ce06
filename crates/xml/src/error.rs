use thiserror::Error;

/// Errors from the streaming XML walker (C3).
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("malformed XML at byte offset {offset}: {message}")]
    MalformedXml { offset: usize, message: String },

    #[error("unexpected end of document inside <{element}>")]
    UnexpectedEof { element: String },
}
