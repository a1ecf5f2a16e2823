use std::fmt;

/// Error type for node encoding and page storage operations.
///
/// Each variant represents a distinct error condition with a unique error code for easier debugging
/// and error handling in callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A slot index outside the range allowed by the node header.
    /// Error code: 1000
    IndexOutOfRange(String),
    /// A computed byte range that does not lie inside the page buffer.
    /// Error code: 2000
    OutOfBounds(String),
    /// Appending an entry would exceed the page capacity.
    /// Error code: 3000
    PageFull(String),
    /// Key or value longer than the configured maximum.
    /// Error code: 4000
    TooLarge(String),
    /// Malformed page content (unknown node type, decreasing offsets).
    /// Error code: 5000
    Corrupted(String),
    /// Invalid page configuration or a buffer of the wrong size.
    /// Error code: 6000
    Config(String),
    /// Page store failure (unknown page, store exhausted).
    /// Error code: 7000
    Storage(String),
}

impl Error {
    /// Returns the error code associated with this error variant.
    ///
    /// # Examples
    /// ```
    /// use bnode::errors::Error;
    /// let err = Error::PageFull("no room for entry".to_string());
    /// assert_eq!(err.code(), 3000);
    /// ```
    pub fn code(&self) -> u32 {
        match self {
            Error::IndexOutOfRange(_) => 1000,
            Error::OutOfBounds(_) => 2000,
            Error::PageFull(_) => 3000,
            Error::TooLarge(_) => 4000,
            Error::Corrupted(_) => 5000,
            Error::Config(_) => 6000,
            Error::Storage(_) => 7000,
        }
    }

    /// Returns a human-readable error category for this error variant.
    pub fn category(&self) -> &'static str {
        match self {
            Error::IndexOutOfRange(_) => "Index Out Of Range",
            Error::OutOfBounds(_) => "Out Of Bounds",
            Error::PageFull(_) => "Page Full",
            Error::TooLarge(_) => "Too Large",
            Error::Corrupted(_) => "Corrupted Page",
            Error::Config(_) => "Configuration",
            Error::Storage(_) => "Storage",
        }
    }

    fn message(&self) -> &str {
        match self {
            Error::IndexOutOfRange(msg)
            | Error::OutOfBounds(msg)
            | Error::PageFull(msg)
            | Error::TooLarge(msg)
            | Error::Corrupted(msg)
            | Error::Config(msg)
            | Error::Storage(msg) => msg,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code(), self.category(), self.message())
    }
}

impl std::error::Error for Error {}

/// Convenience macro to create an `Error` with a formatted message.
///
/// # Examples
/// ```
/// use bnode::err;
/// let err = err!(IndexOutOfRange, "index {} >= nkeys {}", 3, 3);
/// assert_eq!(err.code(), 1000);
/// assert_eq!(err.to_string(), "[1000] Index Out Of Range: index 3 >= nkeys 3");
/// ```
#[macro_export]
macro_rules! err {
    ($variant:ident, $msg:expr) => {
        $crate::errors::Error::$variant($msg.to_string())
    };
    ($variant:ident, $fmt:expr, $($arg:tt)*) => {
        $crate::errors::Error::$variant(format!($fmt, $($arg)*))
    };
}
