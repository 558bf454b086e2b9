//! Error types and stable numeric error codes

use ipnet::IpNet;
use std::fmt;

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    InvalidPrefix = 3,
    PrefixNotFound = 12,
    DuplicatePrefix = 13,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Success => "Success",
            ErrorCode::InvalidPrefix => "Invalid prefix",
            ErrorCode::DuplicatePrefix => "Duplicate prefix",
            ErrorCode::PrefixNotFound => "Prefix not found",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures surfaced by the trie and its textual entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed address text or a length outside `0..=bitwidth`.
    InvalidPrefix(String),
    /// The exact prefix already holds a value and overwrite was not requested.
    DuplicatePrefix(IpNet),
    /// Delete of a prefix that holds no value.
    PrefixNotFound(IpNet),
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidPrefix(_) => ErrorCode::InvalidPrefix,
            Error::DuplicatePrefix(_) => ErrorCode::DuplicatePrefix,
            Error::PrefixNotFound(_) => ErrorCode::PrefixNotFound,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidPrefix(s) => write!(f, "invalid prefix: {s:?}"),
            Error::DuplicatePrefix(net) => write!(f, "prefix {net} already present"),
            Error::PrefixNotFound(net) => write!(f, "prefix {net} not found"),
        }
    }
}

impl std::error::Error for Error {}

pub fn map_error<T>(res: &Result<T, Error>) -> ErrorCode {
    match res {
        Ok(_) => ErrorCode::Success,
        Err(e) => e.code(),
    }
}
