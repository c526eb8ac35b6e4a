use geofilter_eval::FilterError;

/// Errors reading or writing filter documents.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The document is not well-formed XML.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    /// An element was recognized but its tree could not be built.
    #[error(transparent)]
    Filter(#[from] FilterError),
    /// A recognized element is missing content or has too much of it.
    #[error("malformed <{element}>: {message}")]
    Malformed { element: String, message: String },
    /// A numeric attribute or text could not be read.
    #[error("<{element}> expects a number, found '{text}'")]
    InvalidNumber { element: String, text: String },
    /// The document holds no filter element at all.
    #[error("document contains no filter")]
    NoFilter,
}

impl CodecError {
    pub(crate) fn malformed(element: &str, message: impl Into<String>) -> Self {
        CodecError::Malformed {
            element: element.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
