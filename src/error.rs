pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed index, block framing or data-file header.
    #[error("format error: {0}")]
    Format(String),

    /// The contig has no mapping in the reference genome.
    #[error("unknown contig: {0}")]
    UnknownContig(String),

    /// The contig is valid for the genome but has no entry in this index.
    #[error("contig not in index: {0}")]
    ContigNotInIndex(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Operation is invalid for the record's cardinality.
    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short machine-readable name of the error kind.
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Format(_) => "FormatError",
            Error::UnknownContig(_) => "UnknownContigError",
            Error::ContigNotInIndex(_) => "ContigNotInIndexError",
            Error::Unsupported(_) => "UnsupportedError",
            Error::Constraint(_) => "ConstraintError",
            Error::InvalidInput(_) => "InvalidInput",
            Error::NotFound(_) => "NotFound",
            Error::Io(_) | Error::Internal(_) => "InternalError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_names() {
        assert_eq!(Error::Format("x".into()).error_type(), "FormatError");
        assert_eq!(
            Error::ContigNotInIndex("chr7".into()).error_type(),
            "ContigNotInIndexError"
        );
        assert_eq!(Error::Internal("x".into()).error_type(), "InternalError");
    }

    #[test]
    fn test_display_includes_message() {
        let err = Error::UnknownContig("junk".to_string());
        assert_eq!(err.to_string(), "unknown contig: junk");
    }
}
