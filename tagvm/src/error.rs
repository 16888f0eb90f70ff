use std::error::Error;
use std::fmt;

use blockalloc::BlockError;
use genheap::AllocError;

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    BadAllocationRequest,
    OutOfMemory,
    BoundsError,
    /// No method bound for the message, directly or through delegation
    DispatchMiss(String),
    /// A container access width other than a byte, native int or word
    UnsupportedWidth(usize),
    UnknownType(usize),
    TypeError(String),
}

/// A runtime error type
#[derive(Debug, PartialEq)]
pub struct RuntimeError {
    kind: ErrorKind,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind) -> RuntimeError {
        RuntimeError { kind }
    }

    pub fn error_kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ErrorKind::OutOfMemory => write!(f, "Out of memory!"),
            ErrorKind::BadAllocationRequest => {
                write!(f, "An invalid memory size allocation was requested!")
            }
            ErrorKind::BoundsError => write!(f, "Indexing bounds error"),
            ErrorKind::DispatchMiss(ref message) => {
                write!(f, "No method bound for message '{}'", message)
            }
            ErrorKind::UnsupportedWidth(width) => {
                write!(f, "Unsupported container access width {}", width)
            }
            ErrorKind::UnknownType(tag) => write!(f, "No type registered with tag {}", tag),
            ErrorKind::TypeError(ref reason) => write!(f, "Type error: {}", reason),
        }
    }
}

/// Convert from BlockError
impl From<BlockError> for RuntimeError {
    fn from(other: BlockError) -> RuntimeError {
        match other {
            BlockError::OOM => RuntimeError::new(ErrorKind::OutOfMemory),
            BlockError::BadRequest => RuntimeError::new(ErrorKind::BadAllocationRequest),
        }
    }
}

/// Convert from AllocError
impl From<AllocError> for RuntimeError {
    fn from(other: AllocError) -> RuntimeError {
        match other {
            AllocError::OOM => RuntimeError::new(ErrorKind::OutOfMemory),
            AllocError::BadRequest => RuntimeError::new(ErrorKind::BadAllocationRequest),
        }
    }
}

impl Error for RuntimeError {}

/// Convert _to_ std::fmt::Error
impl From<RuntimeError> for fmt::Error {
    fn from(_other: RuntimeError) -> fmt::Error {
        fmt::Error
    }
}

/// Convenience shorthand function for building a type error
pub fn err_type(reason: &str) -> RuntimeError {
    RuntimeError::new(ErrorKind::TypeError(String::from(reason)))
}

/// Convenience shorthand function for building a bounds error
pub fn err_bounds() -> RuntimeError {
    RuntimeError::new(ErrorKind::BoundsError)
}

/// Convenience shorthand function for building a dispatch miss
pub fn err_dispatch(message: &str) -> RuntimeError {
    RuntimeError::new(ErrorKind::DispatchMiss(String::from(message)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_alloc_error() {
        let err = RuntimeError::from(AllocError::OOM);
        assert!(*err.error_kind() == ErrorKind::OutOfMemory);

        let err = RuntimeError::from(BlockError::BadRequest);
        assert!(*err.error_kind() == ErrorKind::BadAllocationRequest);
    }

    #[test]
    fn test_display() {
        assert!(format!("{}", err_dispatch("greet")) == "No method bound for message 'greet'");
        assert!(
            format!("{}", RuntimeError::new(ErrorKind::UnsupportedWidth(3)))
                == "Unsupported container access width 3"
        );
    }

    #[test]
    fn test_every_kind_displays() {
        let kinds = vec![
            ErrorKind::BadAllocationRequest,
            ErrorKind::OutOfMemory,
            ErrorKind::BoundsError,
            ErrorKind::DispatchMiss(String::from("m")),
            ErrorKind::UnsupportedWidth(5),
            ErrorKind::UnknownType(99),
            ErrorKind::TypeError(String::from("t")),
        ];

        for kind in kinds {
            assert!(!format!("{}", RuntimeError::new(kind)).is_empty());
        }
    }
}
