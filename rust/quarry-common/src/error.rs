use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Returns `true` if the error indicates that the stored index data cannot be
    /// trusted: damaged bytes, an unknown format or a checksum failure.
    ///
    /// Such errors are never transient; the affected segment should be treated as
    /// unusable by the caller.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::CorruptIndex { .. }
                | ErrorKind::IndexFormatTooOld { .. }
                | ErrorKind::IndexFormatTooNew { .. }
                | ErrorKind::ChecksumMismatch { .. }
        )
    }

    pub fn corrupt_index(resource: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::CorruptIndex {
                resource: resource.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn not_implemented(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::NotImplemented {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("not yet implemented: {message}")]
    NotImplemented { message: String },

    #[error("corrupt index '{resource}': {message}")]
    CorruptIndex { resource: String, message: String },

    #[error(
        "index format too old for '{resource}': version {version} (supported {min}..={max})"
    )]
    IndexFormatTooOld {
        resource: String,
        version: u32,
        min: u32,
        max: u32,
    },

    #[error(
        "index format too new for '{resource}': version {version} (supported {min}..={max})"
    )]
    IndexFormatTooNew {
        resource: String,
        version: u32,
        min: u32,
        max: u32,
    },

    #[error("checksum mismatch for '{resource}': expected {expected:#018x}, actual {actual:#018x}")]
    ChecksumMismatch {
        resource: String,
        expected: u64,
        actual: u64,
    },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(_: std::convert::Infallible) -> Self {
        Error::invalid_operation("conversion")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_classification() {
        assert!(Error::corrupt_index("seg.frq", "docs out of order").is_corruption());
        let too_new: Error = ErrorKind::IndexFormatTooNew {
            resource: "seg.tim".into(),
            version: 7,
            min: 0,
            max: 1,
        }
        .into();
        assert!(too_new.is_corruption());
        assert!(!Error::invalid_operation("merge").is_corruption());
        let io = Error::from(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert!(!io.is_corruption());
    }

    #[test]
    fn test_error_is_pointer_sized() {
        assert_eq!(std::mem::size_of::<Error>(), std::mem::size_of::<usize>());
    }

    #[test]
    fn test_display() {
        let e = Error::corrupt_index("_0.frq", "read past EOF");
        assert_eq!(e.to_string(), "corrupt index '_0.frq': read past EOF");
    }
}
