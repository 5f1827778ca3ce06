use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Walk(#[from] clinxml_xml::WalkError),

    #[error("unexpected end of document inside <{element}>")]
    UnexpectedEof { element: String },

    #[error("{element} at {path} is missing required field `{field}`")]
    MissingRequiredElement {
        element: String,
        path: String,
        field: String,
    },
}
